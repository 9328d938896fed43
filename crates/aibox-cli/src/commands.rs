use aibox_core::Period;

/// Result of processing a slash command.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandResult {
    /// Display a message to the user.
    Message(String),
    /// Quit the application.
    Quit,
    /// Show the history of a month (current month when `None`).
    ShowHistory(Option<Period>),
    /// List months that have history.
    ListPeriods,
    /// Change the logged-in user's password.
    ChangePassword,
    /// Show who is logged in.
    WhoAmI,
    /// Not a command - treat as regular input.
    NotACommand,
}

pub fn handle_command(input: &str) -> CommandResult {
    let input = input.trim();
    let parts: Vec<&str> = input.splitn(2, ' ').collect();
    let cmd = parts[0];
    let arg = parts.get(1).map(|s| s.trim()).unwrap_or("");

    match cmd {
        "/help" | "/h" => show_help(),
        "/exit" | "/quit" | "/q" => CommandResult::Quit,

        "/history" => {
            if arg.is_empty() {
                CommandResult::ShowHistory(None)
            } else {
                match arg.parse::<Period>() {
                    Ok(period) => CommandResult::ShowHistory(Some(period)),
                    Err(e) => CommandResult::Message(format!("{e}\nUsage: /history [YYYY-MM]")),
                }
            }
        }
        "/periods" | "/months" => CommandResult::ListPeriods,
        "/passwd" | "/password" => CommandResult::ChangePassword,
        "/whoami" => CommandResult::WhoAmI,
        "/version" => CommandResult::Message(format!("aibox v{}", env!("CARGO_PKG_VERSION"))),

        _ => {
            if input.starts_with('/') {
                CommandResult::Message(format!("Unknown command: {cmd}. Type /help for commands."))
            } else {
                CommandResult::NotACommand
            }
        }
    }
}

fn show_help() -> CommandResult {
    let help_text = "\
aibox commands

  /history [YYYY-MM]   Show chat history (current month by default)
  /periods             List months with saved history
  /passwd              Change your password
  /whoami              Show the logged-in user
  /version             Show version information
  /help, /h            Show this help message
  /exit, /quit, /q     Quit

Anything else is sent to the model. Only one message is answered at a time.";

    CommandResult::Message(help_text.into())
}
