//! Server-to-client lines.

use std::fmt;

/// Reason attached to `REGFAIL`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegFailReason {
    /// Identity is already registered
    DuplicateId,
    /// `REGISTER` line did not carry four fields
    BadFormat,
    /// Server could not complete the registration (entropy or disk failure)
    ServerError,
}

impl fmt::Display for RegFailReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::DuplicateId => "DuplicateID",
            Self::BadFormat => "BadFormat",
            Self::ServerError => "ServerError",
        })
    }
}

/// Every line the server can send.
///
/// `Display` renders the wire form without a trailing newline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerReply {
    /// Prompt the client to log in or register
    Login,
    /// Login succeeded; carries the accepted identity
    NameAccepted(String),
    /// `CHECKID` target is free
    IdOk,
    /// `CHECKID` target is taken
    IdUsed,
    /// Account created
    RegisterSuccess,
    /// Account not created
    RegFail(RegFailReason),
    /// `LOGIN` named an identity with no account
    NeedRegister,
    /// `LOGIN` password did not match
    LoginFail,
    /// `LOGIN` identity already has a live session
    AlreadyLoggedIn,
    /// Acknowledges `LOGOUT`; the server closes the connection next
    Bye,
    /// Text to display in the chat window
    Message(String),
}

impl ServerReply {
    /// Public chat line from `sender`.
    pub fn chat(sender: &str, text: &str) -> Self {
        Self::Message(format!("{sender}: {text}"))
    }

    /// Notice that `identity` opened a session.
    pub fn joined(identity: &str) -> Self {
        Self::Message(format!("{identity} has joined"))
    }

    /// Notice that `identity` closed its session.
    pub fn left(identity: &str) -> Self {
        Self::Message(format!("{identity} has left"))
    }

    /// Whisper as delivered to its recipient.
    pub fn whisper_from(sender: &str, text: &str) -> Self {
        Self::Message(format!("(whisper from {sender}) {text}"))
    }

    /// Local echo of a whisper, shown to its sender.
    pub fn whisper_to(target: &str, text: &str) -> Self {
        Self::Message(format!("(whisper to {target}) {text}"))
    }

    /// Whisper target has no open session.
    pub fn whisper_target_missing(target: &str) -> Self {
        Self::Message(format!("No user named {target} is online"))
    }

    /// `/w` was missing its target or text.
    pub fn whisper_usage() -> Self {
        Self::Message("Whisper usage: /w <user> <message>".to_string())
    }
}

impl fmt::Display for ServerReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Login => f.write_str("LOGIN"),
            Self::NameAccepted(identity) => write!(f, "NAMEACCEPTED {identity}"),
            Self::IdOk => f.write_str("IDOK"),
            Self::IdUsed => f.write_str("IDUSED"),
            Self::RegisterSuccess => f.write_str("REGISTERSUCCESS"),
            Self::RegFail(reason) => write!(f, "REGFAIL {reason}"),
            Self::NeedRegister => f.write_str("NEEDREGISTER"),
            Self::LoginFail => f.write_str("LOGINFAIL"),
            Self::AlreadyLoggedIn => f.write_str("ALREADYLOGGEDIN"),
            Self::Bye => f.write_str("BYE"),
            Self::Message(text) => write!(f, "MESSAGE {text}"),
        }
    }
}
