use aibox_core::constants::messages;
use aibox_core::{
    ChatBackend, PendingReply, ReplyOutcome, SessionController, SessionError, SessionEvent,
    Settings,
};
use anyhow::{bail, Context, Result};
use crossterm::style::{Color, Stylize};
use std::io::Write;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::commands::{handle_command, CommandResult};
use crate::input::InputReader;
use crate::theme::Theme;

pub async fn run(
    settings: Settings,
    user: Option<String>,
    prompt: Option<String>,
    theme: Theme,
) -> Result<()> {
    let backend: Arc<dyn ChatBackend> = Arc::new(settings.build_client()?);
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<SessionEvent>();
    let mut session = SessionController::from_settings(&settings, backend).with_events(event_tx);
    let mut input = InputReader::spawn().context("failed to start input reader")?;
    let ui = Ui { theme };

    tracing::debug!(theme = ui.theme.name, "data directory: {}", session.data_dir().display());

    if !login(&mut session, &mut input, &mut event_rx, &ui, user).await? {
        return Ok(());
    }

    match prompt {
        Some(prompt) => run_single_prompt(&mut session, &mut event_rx, &ui, &prompt).await,
        None => chat_loop(&mut session, &mut input, &mut event_rx, &ui).await,
    }
}

/// Login/register menu. Returns `false` when the user quits instead.
async fn login(
    session: &mut SessionController,
    input: &mut InputReader,
    events: &mut mpsc::UnboundedReceiver<SessionEvent>,
    ui: &Ui,
    mut user: Option<String>,
) -> Result<bool> {
    loop {
        let action = if user.is_some() {
            "login".to_string()
        } else {
            ui.prompt("[l]ogin, [r]egister, [q]uit > ");
            match input.next_line().await? {
                Some(line) => line.trim().to_lowercase(),
                None => return Ok(false),
            }
        };

        let registering = match action.as_str() {
            "l" | "login" => false,
            "r" | "register" => true,
            "q" | "quit" => return Ok(false),
            "" => continue,
            other => {
                ui.error(&format!("Unknown choice '{other}'."));
                continue;
            }
        };

        let username = match user.take() {
            Some(username) => username,
            None => {
                ui.prompt("Username: ");
                match input.next_line().await? {
                    Some(username) => username,
                    None => return Ok(false),
                }
            }
        };
        ui.prompt("Password: ");
        let Some(password) = input.secret().await? else {
            return Ok(false);
        };

        // Failures arrive as events; the loop just offers the menu again.
        let result = if registering {
            session.register(&username, &password)
        } else {
            session.login(&username, &password)
        };
        ui.render_events(events);

        if !registering && result.is_ok() {
            return Ok(true);
        }
    }
}

pub async fn run_single_prompt(
    session: &mut SessionController,
    events: &mut mpsc::UnboundedReceiver<SessionEvent>,
    ui: &Ui,
    prompt: &str,
) -> Result<()> {
    let Some(pending) = session.submit_message(prompt)? else {
        bail!("prompt is empty");
    };
    let outcome = pending.await;
    let failed = outcome.result.is_err();
    session.complete(outcome)?;
    ui.render_events(events);

    if failed {
        bail!("request failed");
    }
    Ok(())
}

async fn chat_loop(
    session: &mut SessionController,
    input: &mut InputReader,
    events: &mut mpsc::UnboundedReceiver<SessionEvent>,
    ui: &Ui,
) -> Result<()> {
    ui.muted("Type a message, or /help for commands.");
    let mut pending: Option<PendingReply> = None;
    let mut show_prompt = true;

    loop {
        if show_prompt && pending.is_none() {
            ui.prompt(&format!("{}> ", session.username().unwrap_or_default()));
            show_prompt = false;
        }

        tokio::select! {
            outcome = wait_for(&mut pending) => {
                pending = None;
                session.complete(outcome)?;
                ui.render_events(events);
                show_prompt = true;
            }
            line = input.next_line() => {
                let Some(line) = line? else { break };
                show_prompt = true;

                match handle_command(&line) {
                    CommandResult::NotACommand => match session.submit_message(&line) {
                        Ok(Some(request)) => {
                            ui.muted("Generating reply...");
                            pending = Some(request);
                        }
                        Ok(None) => {}
                        Err(SessionError::Busy) => {
                            ui.error("Still waiting for the previous reply; message not sent.");
                        }
                        Err(e) => ui.error(&e.to_string()),
                    },
                    CommandResult::Quit => break,
                    CommandResult::Message(msg) => ui.info(&msg),
                    CommandResult::ShowHistory(period) => {
                        session.get_history(period.as_ref())?;
                        ui.render_events(events);
                    }
                    CommandResult::ListPeriods => {
                        let periods = session.list_periods()?;
                        if periods.is_empty() {
                            ui.muted("No history saved yet.");
                        } else {
                            let names: Vec<String> = periods.iter().map(|p| p.to_string()).collect();
                            ui.info(&names.join("\n"));
                        }
                    }
                    CommandResult::WhoAmI => {
                        ui.info(&format!("Logged in as {}", session.username().unwrap_or_default()));
                    }
                    CommandResult::ChangePassword => change_password(session, input, ui).await?,
                }
            }
        }
    }

    if let Some(request) = pending.take() {
        ui.muted("Waiting for the last reply...");
        session.complete(request.await)?;
        ui.render_events(events);
    }
    Ok(())
}

async fn wait_for(pending: &mut Option<PendingReply>) -> ReplyOutcome {
    match pending {
        Some(request) => request.await,
        None => std::future::pending().await,
    }
}

async fn change_password(
    session: &SessionController,
    input: &mut InputReader,
    ui: &Ui,
) -> Result<()> {
    ui.prompt("Current password: ");
    let Some(old) = input.secret().await? else { return Ok(()) };
    ui.prompt("New password: ");
    let Some(new) = input.secret().await? else { return Ok(()) };
    ui.prompt("Repeat new password: ");
    let Some(confirm) = input.secret().await? else { return Ok(()) };

    if new != confirm {
        ui.error("Passwords do not match.");
        return Ok(());
    }
    match session.change_password(&old, &new) {
        Ok(()) => ui.success(messages::PASSWORD_CHANGED),
        Err(e) => ui.error(&format!("Password not changed: {e}")),
    }
    Ok(())
}

pub struct Ui {
    theme: Theme,
}

impl Ui {
    fn paint(&self, text: &str, color: Color) -> String {
        if self.theme.styled {
            text.with(color).to_string()
        } else {
            text.to_string()
        }
    }

    fn prompt(&self, text: &str) {
        print!("{}", self.paint(text, self.theme.accent));
        let _ = std::io::stdout().flush();
    }

    fn info(&self, text: &str) {
        println!("{text}");
    }

    fn muted(&self, text: &str) {
        println!("{}", self.paint(text, self.theme.muted));
    }

    fn success(&self, text: &str) {
        println!("{}", self.paint(text, self.theme.success));
    }

    fn error(&self, text: &str) {
        println!("{}", self.paint(text, self.theme.error));
    }

    fn render_events(&self, events: &mut mpsc::UnboundedReceiver<SessionEvent>) {
        while let Ok(event) = events.try_recv() {
            self.render(event);
        }
    }

    fn render(&self, event: SessionEvent) {
        match event {
            SessionEvent::RegisterResult { ok: true, .. } => {
                self.success("Account created, you can log in now.");
            }
            SessionEvent::RegisterResult { ok: false, message } => {
                self.error(&format!("Registration failed: {message}"));
            }
            SessionEvent::LoginResult { ok: true, username, .. } => {
                self.success(&format!("Welcome, {username}."));
            }
            SessionEvent::LoginResult { ok: false, message, .. } => {
                self.error(&format!("Login failed: {message}"));
            }
            SessionEvent::ReplyReceived { reply, .. } => {
                println!(
                    "{} {}\n",
                    self.paint("AI:", self.theme.assistant_color),
                    self.paint(&reply, self.theme.assistant_color)
                );
            }
            SessionEvent::RequestFailed { failure, .. } => {
                self.error(&format!("{failure}\n"));
            }
            SessionEvent::HistoryLoaded { period, entries } => {
                if entries.is_empty() {
                    self.muted(&format!("No history for {period}."));
                    return;
                }
                for entry in entries {
                    self.muted(&format!("[{}]", entry.timestamp));
                    println!("{} {}", self.paint("You:", self.theme.user_color), entry.user);
                    println!("{} {}\n", self.paint("AI:", self.theme.assistant_color), entry.ai);
                }
            }
        }
    }
}
