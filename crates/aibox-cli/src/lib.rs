// Library interface for aibox-cli so integration tests can reach the
// command parser and theme without going through the binary.

#[path = "commands.rs"]
pub mod commands;

#[path = "theme.rs"]
pub mod theme;

pub use commands::{handle_command, CommandResult};
pub use theme::Theme;
