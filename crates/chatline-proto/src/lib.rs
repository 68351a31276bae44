//! Chatline wire protocol.
//!
//! Newline-delimited UTF-8 text over a byte stream, at most [`MAX_LINE_LEN`]
//! bytes per line. Every line is one command; the first whitespace-separated
//! token selects it. The protocol has two phases, and the same line can mean
//! different things in each:
//!
//! - Before authentication, only [`PreAuthCommand`] lines are understood.
//!   Anything else is dropped by the server.
//! - After authentication, [`ChatCommand`] classifies every non-empty line.
//!   Unrecognized input is a public chat message.
//!
//! Server output is modelled by [`ServerReply`], whose `Display` impl is the
//! exact wire line (without the trailing newline).
//!
//! ```text
//!  client                                server
//!    │                 LOGIN                 │
//!    │<──────────────────────────────────────│
//!    │ CHECKID alice                         │
//!    │──────────────────────────────────────>│
//!    │                 IDOK                  │
//!    │<──────────────────────────────────────│
//!    │ REGISTER alice pw Alice a@example.org │
//!    │──────────────────────────────────────>│
//!    │            REGISTERSUCCESS            │
//!    │<──────────────────────────────────────│
//!    │ LOGIN alice pw                        │
//!    │──────────────────────────────────────>│
//!    │          NAMEACCEPTED alice           │
//!    │<──────────────────────────────────────│
//! ```

#![forbid(unsafe_code)]

mod command;
mod error;
mod reply;

pub use command::{ChatCommand, PreAuthCommand, Registration};
pub use error::ParseError;
pub use reply::{RegFailReason, ServerReply};

/// Default TCP port the server listens on.
pub const DEFAULT_PORT: u16 = 59001;

/// Longest accepted input line in bytes, excluding the terminator.
///
/// Longer lines are dropped by the server without being parsed.
pub const MAX_LINE_LEN: usize = 4096;
