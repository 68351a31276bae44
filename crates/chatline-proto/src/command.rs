//! Client-to-server commands.
//!
//! Each phase gets its own closed enum so the server can match exhaustively
//! instead of probing string prefixes.

use std::fmt;

use crate::error::ParseError;

/// Account fields supplied by `REGISTER <id> <pw> <name> <email>`.
///
/// No field contains whitespace: the wire format splits on it, and the
/// account file reuses the same single-space layout.
#[derive(Clone, PartialEq, Eq)]
pub struct Registration {
    /// Requested login name
    pub identity: String,
    /// Plaintext password, hashed before it is stored
    pub password: String,
    /// Name shown to other users
    pub display_name: String,
    /// Contact address
    pub email: String,
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("identity", &self.identity)
            .field("password", &"<redacted>")
            .field("display_name", &self.display_name)
            .field("email", &self.email)
            .finish()
    }
}

/// Commands understood before the connection has authenticated.
#[derive(Clone, PartialEq, Eq)]
pub enum PreAuthCommand {
    /// `CHECKID <id>`: ask whether an identity is still free
    CheckId {
        /// Identity being checked (rest of the line)
        identity: String,
    },
    /// `REGISTER <id> <pw> <name> <email>`: create an account
    Register(Registration),
    /// `LOGIN <id> <pw>`: authenticate and open a session
    Login {
        /// Login name
        identity: String,
        /// Plaintext password
        password: String,
    },
    /// `CANCELREGISTER`: user backed out of the registration form
    CancelRegister,
}

impl fmt::Debug for PreAuthCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CheckId { identity } => {
                f.debug_struct("CheckId").field("identity", identity).finish()
            },
            Self::Register(registration) => f.debug_tuple("Register").field(registration).finish(),
            Self::Login { identity, .. } => f
                .debug_struct("Login")
                .field("identity", identity)
                .field("password", &"<redacted>")
                .finish(),
            Self::CancelRegister => f.write_str("CancelRegister"),
        }
    }
}

impl PreAuthCommand {
    /// Wire keyword for `CHECKID`.
    pub const CHECK_ID: &'static str = "CHECKID";
    /// Wire keyword for `REGISTER`.
    pub const REGISTER: &'static str = "REGISTER";
    /// Wire keyword for `LOGIN`.
    pub const LOGIN: &'static str = "LOGIN";
    /// Wire keyword for `CANCELREGISTER`.
    pub const CANCEL_REGISTER: &'static str = "CANCELREGISTER";

    /// Parse one input line.
    ///
    /// Surrounding whitespace is ignored. `REGISTER` tolerates trailing
    /// tokens after the email; `LOGIN` requires exactly two arguments.
    pub fn parse(line: &str) -> Result<Self, ParseError> {
        let line = line.trim();
        if line.is_empty() {
            return Err(ParseError::Empty);
        }

        let (keyword, rest) = split_keyword(line);

        match keyword {
            Self::CHECK_ID => {
                let identity = rest.trim();
                if identity.is_empty() {
                    return Err(ParseError::BadArity {
                        command: Self::CHECK_ID,
                        expected: "1",
                        got: 0,
                    });
                }
                Ok(Self::CheckId { identity: identity.to_string() })
            },
            Self::REGISTER => {
                let args: Vec<&str> = rest.split_whitespace().collect();
                match args.as_slice() {
                    [identity, password, display_name, email, ..] => {
                        Ok(Self::Register(Registration {
                            identity: (*identity).to_string(),
                            password: (*password).to_string(),
                            display_name: (*display_name).to_string(),
                            email: (*email).to_string(),
                        }))
                    },
                    _ => Err(ParseError::BadArity {
                        command: Self::REGISTER,
                        expected: "at least 4",
                        got: args.len(),
                    }),
                }
            },
            Self::LOGIN => {
                let args: Vec<&str> = rest.split_whitespace().collect();
                match args.as_slice() {
                    [identity, password] => Ok(Self::Login {
                        identity: (*identity).to_string(),
                        password: (*password).to_string(),
                    }),
                    _ => Err(ParseError::BadArity {
                        command: Self::LOGIN,
                        expected: "2",
                        got: args.len(),
                    }),
                }
            },
            Self::CANCEL_REGISTER if rest.trim().is_empty() => Ok(Self::CancelRegister),
            Self::CANCEL_REGISTER => Err(ParseError::BadArity {
                command: Self::CANCEL_REGISTER,
                expected: "0",
                got: rest.split_whitespace().count(),
            }),
            other => Err(ParseError::UnknownCommand(other.to_string())),
        }
    }
}

/// Commands understood once the connection is authenticated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    /// `LOGOUT`: end the session
    Logout,
    /// `/w <target> <text>`: private message to one user
    Whisper {
        /// Recipient identity
        target: String,
        /// Message body
        text: String,
    },
    /// Any other line: public message to everyone
    Say(String),
}

impl ChatCommand {
    /// Wire keyword for `LOGOUT`.
    pub const LOGOUT: &'static str = "LOGOUT";
    /// Wire keyword for whispers.
    pub const WHISPER: &'static str = "/w";

    /// Classify one input line.
    ///
    /// The only failures are an empty line and a `/w` missing its target or
    /// text; every other line is public chat.
    pub fn parse(line: &str) -> Result<Self, ParseError> {
        let line = line.trim();
        if line.is_empty() {
            return Err(ParseError::Empty);
        }

        if line == Self::LOGOUT {
            return Ok(Self::Logout);
        }

        let (keyword, rest) = split_keyword(line);
        if keyword != Self::WHISPER {
            return Ok(Self::Say(line.to_string()));
        }

        let (target, text) = split_keyword(rest.trim_start());
        let text = text.trim();
        if target.is_empty() || text.is_empty() {
            let got = usize::from(!target.is_empty()) + usize::from(!text.is_empty());
            return Err(ParseError::BadArity { command: Self::WHISPER, expected: "2", got });
        }

        Ok(Self::Whisper { target: target.to_string(), text: text.to_string() })
    }
}

/// Split off the first whitespace-delimited token.
fn split_keyword(line: &str) -> (&str, &str) {
    line.split_once(char::is_whitespace).unwrap_or((line, ""))
}
