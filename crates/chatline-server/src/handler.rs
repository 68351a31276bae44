//! Per-connection protocol state machine.
//!
//! # State Machine
//!
//! ```text
//! ┌─────────┐   LOGIN ok    ┌───────────────┐
//! │ PreAuth │──────────────>│ Authenticated │
//! └─────────┘               └───────────────┘
//!      │                            │
//!      │ EOF / I/O error            │ LOGOUT / EOF / I/O error / overflow
//!      ↓                            ↓
//! ┌────────┐                   ┌────────┐
//! │ Closed │                   │ Closed │ (after session cleanup)
//! └────────┘                   └────────┘
//! ```
//!
//! In `PreAuth` the handler answers CHECKID, REGISTER, LOGIN and
//! CANCELREGISTER, and drops anything else. Failures are replies; the client
//! can retry without reconnecting. Leaving `PreAuth` without logging in has
//! no registry side effects.
//!
//! Leaving `Authenticated` by any path runs cleanup exactly once: close the
//! registry entry, then announce the departure to everyone still connected.

use std::sync::Arc;

use chatline_proto::{
    ChatCommand, MAX_LINE_LEN, ParseError, PreAuthCommand, RegFailReason, Registration,
    ServerReply,
};
use futures::StreamExt;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::FramedRead;

use crate::{
    accounts::{AccountStore, AuthError, RegisterError},
    error::ServerError,
    line_codec::{InboundLine, LineCodec},
    outbound::{self, OutboundHandle},
    registry::{SessionError, SessionRegistry},
    router::{MessageRouter, WhisperOutcome},
    storage::AccountStorage,
};

/// Protocol phase of one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Connected, not logged in
    PreAuth,
    /// Logged in with a registered session
    Authenticated,
    /// Finished; no further input is read
    Closed,
}

/// Shared services a connection works against.
pub struct ConnectionContext<S: AccountStorage> {
    /// Registered accounts
    pub accounts: Arc<AccountStore<S>>,
    /// Live sessions
    pub registry: Arc<SessionRegistry>,
    /// Broadcast and whisper delivery
    pub router: MessageRouter,
    /// Lines buffered per session before it counts as stalled
    pub outbound_capacity: usize,
}

impl<S: AccountStorage> Clone for ConnectionContext<S> {
    fn clone(&self) -> Self {
        Self {
            accounts: Arc::clone(&self.accounts),
            registry: Arc::clone(&self.registry),
            router: self.router.clone(),
            outbound_capacity: self.outbound_capacity,
        }
    }
}

/// How a chat loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Exit {
    /// LOGOUT or end of stream; let the writer drain
    Graceful,
    /// Outbound queue overflowed; drop whatever is still queued
    Evicted,
}

/// Framed client input.
type Inbound<R> = FramedRead<R, LineCodec>;

enum ChatEvent {
    Line(Option<String>),
    Overflow,
}

/// Drive one connection from the `LOGIN` prompt until it closes.
///
/// Returns once the socket's write side has been released.
pub async fn serve_connection<R, W, S>(
    session_id: u64,
    reader: R,
    writer: W,
    ctx: ConnectionContext<S>,
) -> Result<(), ServerError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
    S: AccountStorage,
{
    let (handle, rx) = outbound::channel(session_id, ctx.outbound_capacity);
    let writer_task = tokio::spawn(outbound::write_lines(rx, writer));

    let mut lines = FramedRead::new(reader, LineCodec::new(MAX_LINE_LEN));
    let mut conn = Connection::new(handle, ctx);

    let result = conn.run(&mut lines).await;
    let exit = conn.exit;
    drop(conn);

    if exit == Exit::Evicted {
        writer_task.abort();
    } else {
        match writer_task.await {
            Ok(Ok(())) => {},
            Ok(Err(e)) => tracing::debug!(error = %e, "writer stopped early"),
            Err(e) => tracing::debug!(error = %e, "writer task failed"),
        }
    }

    result
}

struct Connection<S: AccountStorage> {
    state: ConnectionState,
    /// Last identity asked about with CHECKID on this connection
    pending_registration: Option<String>,
    outbound: OutboundHandle,
    ctx: ConnectionContext<S>,
    exit: Exit,
}

impl<S: AccountStorage> Connection<S> {
    fn new(outbound: OutboundHandle, ctx: ConnectionContext<S>) -> Self {
        Self {
            state: ConnectionState::PreAuth,
            pending_registration: None,
            outbound,
            ctx,
            exit: Exit::Graceful,
        }
    }

    async fn run<R>(&mut self, lines: &mut Inbound<R>) -> Result<(), ServerError>
    where
        R: AsyncRead + Unpin,
    {
        let identity = match self.pre_auth(lines).await {
            Ok(Some(identity)) => identity,
            Ok(None) => {
                self.state = ConnectionState::Closed;
                return Ok(());
            },
            Err(e) => {
                self.state = ConnectionState::Closed;
                return Err(e);
            },
        };

        let result = self.chat(&identity, lines).await;
        self.cleanup(&identity);
        result
    }

    async fn pre_auth<R>(
        &mut self,
        lines: &mut Inbound<R>,
    ) -> Result<Option<String>, ServerError>
    where
        R: AsyncRead + Unpin,
    {
        self.reply(ServerReply::Login).await?;

        while let Some(line) = next_line(lines).await? {
            let command = match PreAuthCommand::parse(&line) {
                Ok(command) => command,
                Err(ParseError::Empty) => continue,
                Err(ParseError::BadArity { command: PreAuthCommand::REGISTER, .. }) => {
                    self.reply(ServerReply::RegFail(RegFailReason::BadFormat)).await?;
                    continue;
                },
                Err(e) => {
                    tracing::debug!(error = %e, "dropping pre-auth line");
                    continue;
                },
            };

            if let Some(identity) = self.dispatch_pre_auth(command).await? {
                return Ok(Some(identity));
            }
        }

        tracing::debug!("connection closed before login");
        Ok(None)
    }

    /// Answer one pre-auth command. `Some(identity)` once logged in.
    async fn dispatch_pre_auth(
        &mut self,
        command: PreAuthCommand,
    ) -> Result<Option<String>, ServerError> {
        match command {
            PreAuthCommand::CheckId { identity } => {
                let reply = if self.ctx.accounts.exists(&identity) {
                    ServerReply::IdUsed
                } else {
                    ServerReply::IdOk
                };
                self.pending_registration = Some(identity);
                self.reply(reply).await?;
            },
            PreAuthCommand::Register(registration) => {
                let reply = self.register(&registration);
                self.reply(reply).await?;
            },
            PreAuthCommand::Login { identity, password } => {
                return self.login(&identity, &password).await;
            },
            PreAuthCommand::CancelRegister => {
                self.reply(ServerReply::Login).await?;
            },
        }
        Ok(None)
    }

    fn register(&mut self, registration: &Registration) -> ServerReply {
        if self.pending_registration.as_deref() != Some(registration.identity.as_str()) {
            tracing::debug!(
                identity = %registration.identity,
                "registration without a matching CHECKID on this connection"
            );
        }

        match self.ctx.accounts.try_register(
            &registration.identity,
            &registration.password,
            &registration.display_name,
            &registration.email,
        ) {
            Ok(()) => {
                tracing::info!(identity = %registration.identity, "account registered");
                self.pending_registration = None;
                ServerReply::RegisterSuccess
            },
            Err(RegisterError::DuplicateIdentity(_)) => {
                ServerReply::RegFail(RegFailReason::DuplicateId)
            },
            Err(RegisterError::InvalidField { .. }) => {
                ServerReply::RegFail(RegFailReason::BadFormat)
            },
            Err(e @ (RegisterError::Entropy(_) | RegisterError::Storage(_))) => {
                tracing::error!(
                    identity = %registration.identity,
                    error = %e,
                    "registration failed"
                );
                ServerReply::RegFail(RegFailReason::ServerError)
            },
        }
    }

    /// Authenticate and open the session. `Some(identity)` on success; on
    /// failure the reason has already been sent.
    async fn login(
        &mut self,
        identity: &str,
        password: &str,
    ) -> Result<Option<String>, ServerError> {
        let record = match self.ctx.accounts.authenticate(identity, password) {
            Ok(record) => record,
            Err(AuthError::AccountUnknown(_)) => {
                self.reply(ServerReply::NeedRegister).await?;
                return Ok(None);
            },
            Err(AuthError::PasswordMismatch(_)) => {
                tracing::info!(identity, "login failed: wrong password");
                self.reply(ServerReply::LoginFail).await?;
                return Ok(None);
            },
        };

        let accepted = ServerReply::NameAccepted(record.identity.clone()).to_string();
        let permit = self.outbound.reserve().await?;
        let opened = self.ctx.registry.try_open_with(
            &record.identity,
            self.outbound.clone(),
            move |_| permit.send(accepted),
        );

        match opened {
            Ok(()) => {
                self.state = ConnectionState::Authenticated;
                tracing::info!(identity = %record.identity, "logged in");
                self.ctx.router.broadcast(&ServerReply::joined(&record.identity));
                Ok(Some(record.identity))
            },
            Err(SessionError::AlreadyActive(_)) => {
                tracing::info!(identity, "login refused: already logged in elsewhere");
                self.reply(ServerReply::AlreadyLoggedIn).await?;
                Ok(None)
            },
        }
    }

    async fn chat<R>(
        &mut self,
        identity: &str,
        lines: &mut Inbound<R>,
    ) -> Result<(), ServerError>
    where
        R: AsyncRead + Unpin,
    {
        loop {
            let event = tokio::select! {
                line = next_line(lines) => ChatEvent::Line(line?),
                () = self.outbound.overflowed() => ChatEvent::Overflow,
            };

            let line = match event {
                ChatEvent::Line(Some(line)) => line,
                ChatEvent::Line(None) => {
                    tracing::info!(identity, "connection closed by peer");
                    return Ok(());
                },
                ChatEvent::Overflow => {
                    tracing::warn!(identity, "outbound queue overflowed, closing connection");
                    self.exit = Exit::Evicted;
                    return Ok(());
                },
            };

            match ChatCommand::parse(&line) {
                Ok(ChatCommand::Logout) => {
                    self.reply(ServerReply::Bye).await?;
                    tracing::info!(identity, "logged out");
                    return Ok(());
                },
                Ok(ChatCommand::Whisper { target, text }) => {
                    let echo = match self.ctx.router.whisper(identity, &target, &text) {
                        WhisperOutcome::Delivered => ServerReply::whisper_to(&target, &text),
                        WhisperOutcome::TargetMissing => {
                            ServerReply::whisper_target_missing(&target)
                        },
                    };
                    self.reply(echo).await?;
                },
                Ok(ChatCommand::Say(text)) => {
                    self.ctx.router.broadcast(&ServerReply::chat(identity, &text));
                },
                Err(ParseError::Empty) => {},
                Err(ParseError::BadArity { command: ChatCommand::WHISPER, .. }) => {
                    self.reply(ServerReply::whisper_usage()).await?;
                },
                Err(e) => tracing::debug!(error = %e, "dropping chat line"),
            }
        }
    }

    fn cleanup(&mut self, identity: &str) {
        debug_assert_eq!(self.state, ConnectionState::Authenticated);

        self.ctx.registry.close(identity);
        self.ctx.router.broadcast(&ServerReply::left(identity));
        self.state = ConnectionState::Closed;

        tracing::info!(identity, "session closed");
    }

    async fn reply(&self, reply: ServerReply) -> Result<(), ServerError> {
        self.outbound.send(reply.to_string()).await
    }
}

/// Next complete line, skipping lines over the length cap.
///
/// Cancel-safe: nothing is lost if the future is dropped before it resolves.
async fn next_line<R>(lines: &mut Inbound<R>) -> Result<Option<String>, ServerError>
where
    R: AsyncRead + Unpin,
{
    while let Some(item) = lines.next().await {
        match item? {
            InboundLine::Line(line) => return Ok(Some(line)),
            InboundLine::Oversize => {
                tracing::warn!(max = MAX_LINE_LEN, "dropping line over the length limit");
            },
        }
    }
    Ok(None)
}
