use intcode::orchestrate::{best_phase_setting, OrchestrateError, Pipeline, Scheduler};
use intcode::{parse_listing, Machine, StepResult, Word};

fn listing(text: &str) -> Vec<Word> {
    parse_listing(text).unwrap()
}

#[test]
fn chain_of_five_amplifiers() {
    let program = listing("3,23,3,24,1002,24,10,24,1002,23,-1,23,101,5,23,23,1,24,23,23,4,23,99,0,0");
    let signal = Pipeline::new(&program, &[0, 1, 2, 3, 4], false)
        .unwrap()
        .run(0, 10_000)
        .unwrap();
    assert_eq!(signal, 54321);
}

#[test]
fn feedback_loop_with_inner_branching() {
    let program = listing(
        "3,52,1001,52,-5,52,3,53,1,52,56,54,1007,54,5,55,1005,55,26,1001,54,\
         -5,54,1105,1,12,1,53,54,53,1008,54,0,55,1001,55,1,55,2,53,55,53,4,\
         53,1001,56,-1,56,1005,56,6,99,0,0,0,0,10",
    );

    let signal = Pipeline::new(&program, &[9, 7, 8, 5, 6], true)
        .unwrap()
        .run(0, 100_000)
        .unwrap();
    assert_eq!(signal, 18216);

    let (order, best) = best_phase_setting(&program, &[5, 6, 7, 8, 9], true, 100_000).unwrap();
    assert_eq!(order, vec![9, 7, 8, 5, 6]);
    assert_eq!(best, 18216);
}

#[test]
fn chain_stage_starved_of_input_reports_which_stage() {
    // Each stage is given a phase and one signal; a third read starves.
    let program = [3, 20, 3, 21, 3, 22, 4, 22, 99];
    let err = Pipeline::new(&program, &[1, 2], false)
        .unwrap()
        .run(0, 100)
        .unwrap_err();
    assert!(matches!(err, OrchestrateError::Machine { index: 0, .. }));
}

#[test]
fn hand_driven_round_robin_feedback() {
    // Two machines that each add one and pass the value on, five times.
    // counter at 30: starts at 5, jnz loops while non-zero.
    let program = [
        3, 31, // 0: in @31
        1001, 31, 1, 31, // 2: add @31, #1, @31
        4, 31, // 6: out @31
        1001, 30, -1, 30, // 8: add @30, #-1, @30
        1005, 30, 0, // 12: jnz @30, #0
        99, // 15
        0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, //
        5, 0, // 30, 31
    ];

    let mut a = Machine::new(&program);
    let mut b = Machine::new(&program);
    a.push_input(0);

    let mut rounds = 0;
    while !(a.is_halted() && b.is_halted()) {
        rounds += 1;
        assert!(rounds < 1000, "no progress");

        a.step().unwrap();
        while let Some(v) = a.try_pop_output() {
            b.push_input(v);
        }
        b.step().unwrap();
        while let Some(v) = b.try_pop_output() {
            a.push_input(v);
        }
    }

    // The last value b emitted went to a's input and was never read.
    assert_eq!(a.input().iter().copied().collect::<Vec<_>>(), vec![10]);
}

#[test]
fn blocked_machine_resumes_after_arbitrary_delay() {
    let mut m = Machine::new(&[3, 7, 4, 7, 99, 0, 0, 0]);
    for _ in 0..100 {
        assert_eq!(m.step().unwrap(), StepResult::Blocked);
    }
    let before = m.clone();

    m.push_input(123);
    assert_eq!(m.resume().unwrap(), StepResult::Halted);
    assert_eq!(m.drain_output(), vec![123]);
    assert_eq!(before.program_counter(), 0);
    assert_eq!(before.steps(), 0);
}

#[test]
fn scheduler_keeps_unrouted_output() {
    let mut sched = Scheduler::new(vec![Machine::new(&[104, 1, 104, 2, 99])]);
    sched.run(10).unwrap();
    assert_eq!(sched.last_output(0), Some(2));
    assert_eq!(sched.machine(0).unwrap().output().len(), 2);
}
