//! Program listing format.
//!
//! An Intcode program is written as a single line of comma-separated
//! integers:
//! - Whitespace around values (including newlines) is ignored
//! - A single trailing comma is tolerated
//! - Lines starting with `;` are comments

use crate::machine::Word;
use std::path::Path;
use thiserror::Error;

/// Parse a comma-separated program listing.
pub fn parse_listing(source: &str) -> Result<Vec<Word>, ListingError> {
    let body: String = source
        .lines()
        .filter(|line| !line.trim_start().starts_with(';'))
        .collect::<Vec<_>>()
        .join("\n");

    let body = body.trim();
    if body.is_empty() {
        return Err(ListingError::Empty);
    }
    let body = body.strip_suffix(',').unwrap_or(body);

    body.split(',')
        .enumerate()
        .map(|(index, token)| {
            let token = token.trim();
            token.parse::<Word>().map_err(|_| ListingError::ParseError {
                index,
                token: token.to_string(),
            })
        })
        .collect()
}

/// Load a program listing from disk.
pub fn load_listing<P: AsRef<Path>>(path: P) -> Result<Vec<Word>, ListingError> {
    let source = std::fs::read_to_string(path.as_ref())
        .map_err(|e| ListingError::IoError(format!("{}: {}", path.as_ref().display(), e)))?;
    parse_listing(&source)
}

/// Format a program as a comma-separated listing.
pub fn format_listing(program: &[Word]) -> String {
    program
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

/// Errors that can occur while reading a listing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ListingError {
    #[error("I/O error: {0}")]
    IoError(String),

    #[error("parse error at value {index}: {token:?} is not an integer")]
    ParseError { index: usize, token: String },

    #[error("listing contains no values")]
    Empty,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple() {
        assert_eq!(parse_listing("1,0,0,0,99").unwrap(), vec![1, 0, 0, 0, 99]);
    }

    #[test]
    fn test_parse_whitespace_and_trailing_comma() {
        let listing = " 1101, 100,\n-1,4,0,\n";
        assert_eq!(parse_listing(listing).unwrap(), vec![1101, 100, -1, 4, 0]);
    }

    #[test]
    fn test_parse_comments() {
        let listing = "; day 5 sample\n3,0,4,0,99\n";
        assert_eq!(parse_listing(listing).unwrap(), vec![3, 0, 4, 0, 99]);
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(parse_listing("  \n"), Err(ListingError::Empty));
        assert_eq!(
            parse_listing("1,,2"),
            Err(ListingError::ParseError { index: 1, token: String::new() })
        );
        assert_eq!(
            parse_listing("1,x"),
            Err(ListingError::ParseError { index: 1, token: "x".into() })
        );
    }

    #[test]
    fn test_format_listing() {
        let program = [109, 1, 204, -1, 99];
        let text = format_listing(&program);
        assert_eq!(text, "109,1,204,-1,99");
        assert_eq!(parse_listing(&text).unwrap(), program);
    }

    #[test]
    fn test_load_missing_file() {
        let err = load_listing("/nonexistent/intcode/program.txt").unwrap_err();
        assert!(matches!(err, ListingError::IoError(_)));
    }
}
