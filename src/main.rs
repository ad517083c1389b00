//! Intcode VM - CLI Entry Point
//!
//! Commands:
//! - `intcode-vm run <program>` - Run a program until it halts
//! - `intcode-vm step <program>` - Step through a program interactively
//! - `intcode-vm disasm <program>` - Disassemble a program
//! - `intcode-vm amplify <program>` - Run an amplifier chain
//! - `intcode-vm network <program>` - Run a packet network
//! - `intcode-vm test` - Built-in self-test

use clap::{Parser, Subcommand};
use intcode::{Machine, RunLimits, StepResult, Word};
use std::io::BufRead;
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "intcode-vm")]
#[command(author = "Yigit")]
#[command(version = "0.1.0")]
#[command(about = "An Intcode virtual machine")]
struct Cli {
    /// Log machine transitions (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// JSON file with execution limits (max_steps, max_rounds)
    #[arg(long, global = true)]
    limits: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a program until it halts
    Run {
        /// Path to the comma-separated program listing
        program: String,
        /// Input values, comma-separated
        #[arg(short, long, value_delimiter = ',', allow_hyphen_values = true)]
        input: Vec<Word>,
        /// Text to feed as ASCII input (a newline is appended)
        #[arg(short, long)]
        ascii: Option<String>,
        /// Patch memory before running, as ADDR=VALUE (repeatable)
        #[arg(short, long)]
        poke: Vec<String>,
        /// Maximum number of instructions to execute
        #[arg(short, long)]
        max_steps: Option<u64>,
        /// Print each instruction and log at trace level
        #[arg(short, long)]
        trace: bool,
        /// Write the final machine state as JSON
        #[arg(short, long)]
        dump: Option<String>,
    },
    /// Step through a program one instruction at a time
    Step {
        /// Path to the program listing
        program: String,
        /// Input values, comma-separated
        #[arg(short, long, value_delimiter = ',', allow_hyphen_values = true)]
        input: Vec<Word>,
    },
    /// Disassemble a program listing
    Disasm {
        /// Path to the program listing
        program: String,
    },
    /// Run an amplifier chain
    Amplify {
        /// Path to the program listing
        program: String,
        /// Phase settings, one per amplifier
        #[arg(short, long, value_delimiter = ',', default_value = "0,1,2,3,4")]
        phases: Vec<Word>,
        /// Loop the last amplifier back into the first
        #[arg(short, long)]
        feedback: bool,
        /// Try every ordering of the phases and report the best
        #[arg(short, long)]
        search: bool,
    },
    /// Run a packet network of machines
    Network {
        /// Path to the program listing
        program: String,
        /// Number of nodes
        #[arg(short, long, default_value = "50")]
        size: usize,
        /// Wait for the NAT to deliver the same Y twice instead of the first NAT packet
        #[arg(short, long)]
        repeat: bool,
    },
    /// Run the built-in self-test
    Test,
}

fn main() {
    let cli = Cli::parse();
    let trace = matches!(cli.command, Some(Commands::Run { trace: true, .. }));
    init_logging(cli.verbose, trace);

    let limits = load_limits(cli.limits.as_deref());

    match cli.command {
        Some(Commands::Run { program, input, ascii, poke, max_steps, trace, dump }) => {
            let limits = RunLimits {
                max_steps: max_steps.unwrap_or(limits.max_steps),
                ..limits
            };
            run_program(&program, &input, ascii.as_deref(), &poke, limits, trace, dump.as_deref());
        }
        Some(Commands::Step { program, input }) => {
            step_program(&program, &input);
        }
        Some(Commands::Disasm { program }) => {
            disassemble_file(&program);
        }
        Some(Commands::Amplify { program, phases, feedback, search }) => {
            amplify(&program, &phases, feedback, search, limits);
        }
        Some(Commands::Network { program, size, repeat }) => {
            run_network(&program, size, repeat, limits);
        }
        Some(Commands::Test) => {
            run_self_test();
        }
        None => {
            println!("Intcode VM v0.1.0");
            println!();
            println!("Use --help for available commands");
        }
    }
}

/// Filter used when `RUST_LOG` is not set.
fn default_filter(verbose: bool, trace: bool) -> &'static str {
    if trace {
        "intcode=trace,intcode_vm=debug"
    } else if verbose {
        "intcode=debug,intcode_vm=debug"
    } else {
        "warn"
    }
}

fn init_logging(verbose: bool, trace: bool) {
    let default = default_filter(verbose, trace);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_limits(path: Option<&str>) -> RunLimits {
    let Some(path) = path else {
        return RunLimits::default();
    };

    let text = std::fs::read_to_string(path)
        .unwrap_or_else(|e| fail(&format!("Failed to read limits {}: {}", path, e)));
    RunLimits::from_json(&text)
        .unwrap_or_else(|e| fail(&format!("Invalid limits {}: {}", path, e)))
}

fn load_program(path: &str) -> Vec<Word> {
    match intcode::load_listing(path) {
        Ok(program) => {
            debug!(path, words = program.len(), "program loaded");
            program
        }
        Err(e) => fail(&format!("Failed to load program: {}", e)),
    }
}

fn fail(message: &str) -> ! {
    error!("{}", message);
    eprintln!("❌ {}", message);
    std::process::exit(1);
}

fn parse_poke(spec: &str) -> Option<(usize, Word)> {
    let (addr, value) = spec.split_once('=')?;
    Some((addr.trim().parse().ok()?, value.trim().parse().ok()?))
}

fn run_program(
    path: &str,
    input: &[Word],
    ascii: Option<&str>,
    pokes: &[String],
    limits: RunLimits,
    trace: bool,
    dump: Option<&str>,
) {
    use intcode::program::disasm::disassemble_instruction;

    println!("🔧 Running: {}", path);

    let program = load_program(path);
    let mut machine = Machine::new(&program);

    for spec in pokes {
        match parse_poke(spec) {
            Some((addr, value)) => machine.poke(addr, value),
            None => fail(&format!("Bad --poke {:?}, expected ADDR=VALUE", spec)),
        }
    }

    machine.push_inputs(input.iter().copied());
    if let Some(text) = ascii {
        machine.push_ascii(text);
        machine.push_ascii("\n");
    }

    println!();
    println!("━━━ Execution ━━━");

    let mut outcome = StepResult::Continue;
    while outcome == StepResult::Continue && machine.steps() < limits.max_steps {
        let pc = machine.program_counter();
        if trace {
            let (text, _) = disassemble_instruction(machine.memory().as_slice(), pc);
            println!("{:04}: {:<28} rb={}", pc, text, machine.relative_base());
        }

        match machine.step() {
            Ok(result) => outcome = result,
            Err(e) => fail(&format!("Machine error: {}", e)),
        }
    }

    let output = machine.drain_output();

    println!();
    println!("━━━ Result ━━━");
    println!("Steps:     {}", machine.steps());
    println!("PC:        {}", machine.program_counter());
    println!("RB:        {}", machine.relative_base());
    println!("memory[0]: {}", machine.peek(0));
    print_output(&output, ascii.is_some());

    if let Some(path) = dump {
        let json = match serde_json::to_string_pretty(&machine) {
            Ok(json) => json,
            Err(e) => fail(&format!("Failed to serialize machine: {}", e)),
        };
        if let Err(e) = std::fs::write(path, json) {
            fail(&format!("Failed to write {}: {}", path, e));
        }
        println!("✓ Saved state to {}", path);
    }

    match outcome {
        StepResult::Halted => {}
        StepResult::Blocked => fail(&format!(
            "Deadlock: blocked on input at pc={} with no input left",
            machine.program_counter()
        )),
        StepResult::Continue => {
            println!();
            println!("⚠️  Reached step limit ({}). Use --max-steps to increase.", limits.max_steps);
        }
    }
}

fn is_ascii_value(value: Word) -> bool {
    (0..128).contains(&value)
}

fn print_output(output: &[Word], ascii: bool) {
    if ascii && !output.is_empty() {
        let text: String = output
            .iter()
            .filter(|&&v| is_ascii_value(v))
            .map(|&v| v as u8 as char)
            .collect();
        println!("Output (text):");
        println!("{}", text);
        // A non-ASCII value is the program's answer.
        if let Some(last) = output.iter().rev().find(|&&v| !is_ascii_value(v)) {
            println!("Output (value): {}", last);
        }
    } else {
        let values = output.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(",");
        println!("Output:    [{}]", values);
    }
}

fn step_program(path: &str, input: &[Word]) {
    use intcode::program::disasm::disassemble_instruction;

    let program = load_program(path);
    let mut machine = Machine::new(&program);
    machine.push_inputs(input.iter().copied());

    println!("🔍 Stepping: {}", path);
    println!("Enter: step   c: continue   i N: push input   q: quit");

    let stdin = std::io::stdin();
    let mut lines = stdin.lock().lines();
    let mut stepping = true;

    loop {
        let pc = machine.program_counter();
        let (text, _) = disassemble_instruction(machine.memory().as_slice(), pc);

        if stepping {
            println!("{:04}: {:<28} rb={} in={:?}", pc, text, machine.relative_base(),
                machine.input().iter().collect::<Vec<_>>());
            let Some(Ok(line)) = lines.next() else {
                break;
            };
            let line = line.trim();
            if line == "q" {
                break;
            }
            if line == "c" {
                stepping = false;
            }
            if let Some(value) = line.strip_prefix("i ") {
                match value.trim().parse::<Word>() {
                    Ok(v) => machine.push_input(v),
                    Err(_) => println!("not a number: {}", value),
                }
                continue;
            }
        }

        match machine.step() {
            Ok(StepResult::Continue) => {}
            Ok(StepResult::Halted) => {
                println!("✓ Halted after {} steps", machine.steps());
                break;
            }
            Ok(StepResult::Blocked) => {
                println!("⏸  Waiting for input (use `i N`)");
                stepping = true;
            }
            Err(e) => fail(&format!("Machine error: {}", e)),
        }

        while let Some(value) = machine.try_pop_output() {
            println!("→ {}", value);
        }
    }
}

fn disassemble_file(path: &str) {
    println!("📖 Disassembling: {}", path);
    println!();

    let program = load_program(path);
    println!("{}", intcode::disassemble(&program));
}

fn amplify(path: &str, phases: &[Word], feedback: bool, search: bool, limits: RunLimits) {
    use intcode::orchestrate::{best_phase_setting, Pipeline};

    let program = load_program(path);
    println!("🔊 Amplifiers: {} ({})", phases.len(), if feedback { "feedback" } else { "chain" });

    if search {
        match best_phase_setting(&program, phases, feedback, limits.max_rounds) {
            Ok((order, signal)) => {
                println!("Best phases: {:?}", order);
                println!("Signal:      {}", signal);
            }
            Err(e) => fail(&format!("Amplifier error: {}", e)),
        }
        return;
    }

    let signal = Pipeline::new(&program, phases, feedback)
        .and_then(|pipeline| pipeline.run(0, limits.max_rounds));
    match signal {
        Ok(signal) => println!("Signal: {}", signal),
        Err(e) => fail(&format!("Amplifier error: {}", e)),
    }
}

fn run_network(path: &str, size: usize, repeat: bool, limits: RunLimits) {
    use intcode::Network;

    let program = load_program(path);
    println!("🌐 Network: {} nodes", size);

    let mut network = Network::new(&program, size);
    let packet = if repeat {
        network.first_repeated_nat_delivery(limits.max_rounds)
    } else {
        network.first_nat_packet(limits.max_rounds)
    };

    match packet {
        Ok(packet) => {
            println!("Rounds: {}", network.rounds());
            println!("Packet: X={} Y={}", packet.x, packet.y);
        }
        Err(e) => fail(&format!("Network error: {}", e)),
    }
}

fn run_self_test() {
    use intcode::orchestrate::Pipeline;

    println!("━━━ Intcode VM Self-Test ━━━");
    println!();

    let mut passed = 0;
    let mut failed = 0;

    let mut check = |name: &str, ok: bool| {
        if ok {
            println!("{}... ✓", name);
            passed += 1;
        } else {
            println!("{}... ✗", name);
            failed += 1;
        }
    };

    // Test 1: add in place
    let mut m = Machine::new(&[1, 0, 0, 0, 99]);
    check("Add in place", m.run_to_halt() == Ok(2));

    // Test 2: immediate multiply
    let mut m = Machine::new(&[1002, 4, 3, 4, 33]);
    check("Immediate multiply", m.run_to_halt().is_ok() && m.peek(4) == 99);

    // Test 3: echo
    let mut m = Machine::new(&[3, 0, 4, 0, 99]);
    m.push_input(17);
    check("Echo input", m.run_to_halt().is_ok() && m.drain_output() == vec![17]);

    // Test 4: quine
    let quine = [109, 1, 204, -1, 1001, 100, 1, 100, 1008, 100, 16, 101, 1006, 101, 0, 99];
    let mut m = Machine::new(&quine);
    check("Quine", m.run_to_halt().is_ok() && m.drain_output() == quine);

    // Test 5: negative immediate
    let mut m = Machine::new(&[1101, 100, -1, 4, 0]);
    check("Negative immediate", m.run_to_halt().is_ok() && m.peek(4) == 99);

    // Test 6: suspension on input
    let mut m = Machine::new(&[3, 0, 4, 0, 99]);
    let blocked = m.step() == Ok(StepResult::Blocked);
    m.push_input(5);
    let resumed = m.step() == Ok(StepResult::Continue) && m.step() == Ok(StepResult::Continue);
    check("Blocked input resumes", blocked && resumed && m.try_pop_output() == Some(5));

    // Test 7: feedback loop
    let feedback = [
        3, 26, 1001, 26, -4, 26, 3, 27, 1002, 27, 2, 27, 1, 27, 26, 27, 4, 27, 1001, 28, -1, 28,
        1005, 28, 6, 99, 0, 0, 5,
    ];
    let signal = Pipeline::new(&feedback, &[9, 8, 7, 6, 5], true).and_then(|p| p.run(0, 100_000));
    check("Feedback amplifiers", signal == Ok(139629729));

    println!();
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("Results: {} passed, {} failed", passed, failed);

    if failed == 0 {
        println!("✓ All tests passed!");
    } else {
        std::process::exit(1);
    }
}
