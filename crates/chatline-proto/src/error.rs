//! Line parsing errors.

use thiserror::Error;

/// Why a line could not be turned into a command.
///
/// Parsing never fails on chat input after authentication; these errors only
/// describe protocol commands that were recognized but malformed, or lines
/// that are not commands at all in the pre-authentication phase.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Line was empty after trimming
    #[error("empty line")]
    Empty,

    /// First token is not a known command
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    /// Known command with the wrong number of arguments
    #[error("{command}: expected {expected} arguments, got {got}")]
    BadArity {
        /// Command keyword as it appears on the wire
        command: &'static str,
        /// Human-readable expectation (e.g. "2", "at least 4")
        expected: &'static str,
        /// Number of arguments actually supplied
        got: usize,
    },
}
