//! Login state and the one-request-at-a-time chat cycle.
//!
//! The controller is owned by the presentation loop. `submit_message` spawns
//! the network call as a task and hands back a [`PendingReply`]; the loop
//! awaits it alongside its other input and returns the outcome through
//! [`SessionController::complete`]. Until then further submissions are
//! refused with [`SessionError::Busy`].
//!
//! A `PendingReply` dropped before it resolves is not lost: the request keeps
//! running and its outcome is settled by the controller on the next
//! [`SessionController::submit_message`] (or [`SessionController::reap_abandoned`]).

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;

use crate::auth::CredentialStore;
use crate::config::Settings;
use crate::constants::messages;
use crate::error::{AuthError, ChatFailure, SessionError};
use crate::history::{HistoryEntry, HistoryLog, Period};
use crate::llm::ChatBackend;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    LoggedOut,
    LoggedIn { username: String },
    AwaitingReply { username: String, message: String },
}

/// Events for the presentation layer to render.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    RegisterResult { ok: bool, message: String },
    LoginResult { ok: bool, username: String, message: String },
    ReplyReceived { message: String, reply: String },
    /// Rendered as an error, never as a reply.
    RequestFailed { message: String, failure: ChatFailure },
    HistoryLoaded { period: Period, entries: Vec<HistoryEntry> },
}

/// The finished result of one request.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplyOutcome {
    pub message: String,
    pub result: Result<String, ChatFailure>,
}

type ReplyTask = JoinHandle<Result<String, ChatFailure>>;

/// A request running on its own task. Resolves to a [`ReplyOutcome`].
pub struct PendingReply {
    message: String,
    handle: Option<ReplyTask>,
    abandoned: UnboundedSender<ReplyOutcome>,
}

impl PendingReply {
    fn spawn(
        backend: Arc<dyn ChatBackend>,
        message: String,
        abandoned: UnboundedSender<ReplyOutcome>,
    ) -> Self {
        let request = message.clone();
        let handle = tokio::spawn(async move { backend.send(&request).await });
        Self {
            message,
            handle: Some(handle),
            abandoned,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Future for PendingReply {
    type Output = ReplyOutcome;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = &mut *self;
        let Some(handle) = this.handle.as_mut() else {
            return Poll::Ready(ReplyOutcome {
                message: this.message.clone(),
                result: Err(ChatFailure::transport("reply already taken")),
            });
        };
        match Pin::new(handle).poll(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(joined) => {
                this.handle = None;
                Poll::Ready(ReplyOutcome {
                    message: std::mem::take(&mut this.message),
                    result: task_result(joined),
                })
            }
        }
    }
}

impl Drop for PendingReply {
    fn drop(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        let message = std::mem::take(&mut self.message);
        let abandoned = self.abandoned.clone();

        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                tracing::debug!("pending reply dropped, finishing it in the background");
                runtime.spawn(async move {
                    let result = task_result(handle.await);
                    let _ = abandoned.send(ReplyOutcome { message, result });
                });
            }
            Err(_) => {
                handle.abort();
                let _ = abandoned.send(ReplyOutcome {
                    message,
                    result: Err(ChatFailure::transport("request abandoned")),
                });
            }
        }
    }
}

fn task_result(
    joined: Result<Result<String, ChatFailure>, tokio::task::JoinError>,
) -> Result<String, ChatFailure> {
    joined.unwrap_or_else(|e| Err(ChatFailure::transport(format!("request task failed: {e}"))))
}

pub struct SessionController {
    store: CredentialStore,
    data_dir: PathBuf,
    backend: Arc<dyn ChatBackend>,
    state: SessionState,
    history: Option<HistoryLog>,
    events: Option<UnboundedSender<SessionEvent>>,
    abandoned_tx: UnboundedSender<ReplyOutcome>,
    abandoned_rx: UnboundedReceiver<ReplyOutcome>,
}

impl SessionController {
    pub fn new(
        store: CredentialStore,
        data_dir: impl Into<PathBuf>,
        backend: Arc<dyn ChatBackend>,
    ) -> Self {
        let (abandoned_tx, abandoned_rx) = mpsc::unbounded_channel();
        Self {
            store,
            data_dir: data_dir.into(),
            backend,
            state: SessionState::LoggedOut,
            history: None,
            events: None,
            abandoned_tx,
            abandoned_rx,
        }
    }

    pub fn from_settings(settings: &Settings, backend: Arc<dyn ChatBackend>) -> Self {
        Self::new(settings.credential_store(), settings.data_dir(), backend)
    }

    pub fn with_events(mut self, events: UnboundedSender<SessionEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn username(&self) -> Option<&str> {
        match &self.state {
            SessionState::LoggedOut => None,
            SessionState::LoggedIn { username } | SessionState::AwaitingReply { username, .. } => {
                Some(username)
            }
        }
    }

    pub fn is_awaiting_reply(&self) -> bool {
        matches!(self.state, SessionState::AwaitingReply { .. })
    }

    fn emit(&self, event: SessionEvent) {
        if let Some(ref tx) = self.events {
            let _ = tx.send(event);
        }
    }

    pub fn register(&self, username: &str, password: &str) -> Result<(), SessionError> {
        let result = trimmed_credentials(username, password)
            .and_then(|(username, password)| self.store.register(username, password));

        let message = match &result {
            Ok(()) => messages::REGISTER_OK.to_string(),
            Err(e) => e.to_string(),
        };
        self.emit(SessionEvent::RegisterResult {
            ok: result.is_ok(),
            message,
        });
        result.map_err(SessionError::from)
    }

    pub fn login(&mut self, username: &str, password: &str) -> Result<(), SessionError> {
        if self.state != SessionState::LoggedOut {
            let err = SessionError::AlreadyLoggedIn;
            self.emit(SessionEvent::LoginResult {
                ok: false,
                username: username.trim().to_string(),
                message: err.to_string(),
            });
            return Err(err);
        }

        let result = trimmed_credentials(username, password).and_then(|(username, password)| {
            self.store.verify(username, password).map(|()| username)
        });

        match result {
            Ok(username) => {
                tracing::info!(user = username, "logged in");
                let username = username.to_string();
                self.history = Some(HistoryLog::new(&self.data_dir, &username));
                self.state = SessionState::LoggedIn {
                    username: username.clone(),
                };
                self.emit(SessionEvent::LoginResult {
                    ok: true,
                    username,
                    message: messages::LOGIN_OK.to_string(),
                });
                Ok(())
            }
            Err(e) => {
                tracing::info!(user = username.trim(), "login rejected: {e}");
                self.emit(SessionEvent::LoginResult {
                    ok: false,
                    username: username.trim().to_string(),
                    message: e.to_string(),
                });
                Err(e.into())
            }
        }
    }

    /// Replace the logged-in user's password after checking the old one.
    pub fn change_password(&self, old_password: &str, new_password: &str) -> Result<(), SessionError> {
        let username = self.username().ok_or(SessionError::NotLoggedIn)?;
        let new_password = new_password.trim();
        if new_password.is_empty() {
            return Err(AuthError::EmptyCredentials.into());
        }
        self.store
            .change_password(username, old_password.trim(), new_password)?;
        Ok(())
    }

    /// Start a request for `text`. Whitespace-only text is ignored and yields
    /// `Ok(None)`. Must be called from within a Tokio runtime.
    pub fn submit_message(&mut self, text: &str) -> Result<Option<PendingReply>, SessionError> {
        self.reap_abandoned();
        let username = match &self.state {
            SessionState::LoggedOut => return Err(SessionError::NotLoggedIn),
            SessionState::AwaitingReply { .. } => return Err(SessionError::Busy),
            SessionState::LoggedIn { username } => username.clone(),
        };

        let message = text.trim();
        if message.is_empty() {
            return Ok(None);
        }

        tracing::debug!(user = %username, "submitting message ({} chars)", message.chars().count());
        self.state = SessionState::AwaitingReply {
            username,
            message: message.to_string(),
        };
        Ok(Some(PendingReply::spawn(
            Arc::clone(&self.backend),
            message.to_string(),
            self.abandoned_tx.clone(),
        )))
    }

    /// Settle requests whose `PendingReply` was dropped and has since
    /// finished, exactly as `complete` would. Returns how many were settled.
    pub fn reap_abandoned(&mut self) -> usize {
        let mut settled = 0;
        while let Ok(outcome) = self.abandoned_rx.try_recv() {
            if self.complete(outcome).is_ok() {
                settled += 1;
            }
        }
        settled
    }

    /// Finish the outstanding request. Successful replies are recorded in the
    /// history; failures are only reported.
    pub fn complete(&mut self, outcome: ReplyOutcome) -> Result<(), SessionError> {
        let username = match &self.state {
            SessionState::AwaitingReply { username, .. } => username.clone(),
            _ => return Err(SessionError::NotAwaitingReply),
        };
        self.state = SessionState::LoggedIn { username };

        match outcome.result {
            Ok(reply) => {
                if let Some(ref history) = self.history {
                    history.append(&outcome.message, &reply);
                }
                self.emit(SessionEvent::ReplyReceived {
                    message: outcome.message,
                    reply,
                });
            }
            Err(failure) => {
                tracing::info!("request failed: {failure}");
                self.emit(SessionEvent::RequestFailed {
                    message: outcome.message,
                    failure,
                });
            }
        }
        Ok(())
    }

    /// History for `period`, or the current month when `None`.
    pub fn get_history(&self, period: Option<&Period>) -> Result<Vec<HistoryEntry>, SessionError> {
        let history = self.history_log()?;
        let period = period.copied().unwrap_or_else(Period::current);
        let entries = history.read(Some(&period));
        self.emit(SessionEvent::HistoryLoaded {
            period,
            entries: entries.clone(),
        });
        Ok(entries)
    }

    pub fn list_periods(&self) -> Result<Vec<Period>, SessionError> {
        Ok(self.history_log()?.list_periods())
    }

    fn history_log(&self) -> Result<&HistoryLog, SessionError> {
        match (&self.state, &self.history) {
            (SessionState::LoggedOut, _) | (_, None) => Err(SessionError::NotLoggedIn),
            (_, Some(history)) => Ok(history),
        }
    }
}

fn trimmed_credentials<'a>(
    username: &'a str,
    password: &'a str,
) -> Result<(&'a str, &'a str), AuthError> {
    let username = username.trim();
    let password = password.trim();
    if username.is_empty() || password.is_empty() {
        return Err(AuthError::EmptyCredentials);
    }
    Ok((username, password))
}
