use anyhow::{anyhow, Result};
use clap::Parser;
use std::path::PathBuf;

mod app;
mod commands;
mod input;
mod theme;

#[derive(Parser)]
#[command(name = "aibox")]
#[command(about = "aibox - chat with a remote model from your terminal")]
#[command(version)]
struct Cli {
    /// Send a single message after logging in and exit
    #[arg(short, long)]
    prompt: Option<String>,

    /// Log in as this user instead of showing the menu
    #[arg(short, long)]
    user: Option<String>,

    /// Model to request
    #[arg(short, long)]
    model: Option<String>,

    /// Chat completions URL
    #[arg(long)]
    endpoint: Option<String>,

    /// Directory holding users.json and the history tree
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Settings file (defaults to the platform config dir)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Color theme (dark, light, plain)
    #[arg(long, default_value = "dark")]
    theme: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let mut settings = match cli.config {
        Some(ref path) => aibox_core::Settings::load_from(path),
        None => aibox_core::Settings::load(),
    };

    if let Some(ref model) = cli.model {
        settings.llm.model = model.clone();
    }
    if let Some(ref endpoint) = cli.endpoint {
        settings.llm.endpoint = endpoint.clone();
    }
    if let Some(ref data_dir) = cli.data_dir {
        settings.storage.data_dir = Some(data_dir.clone());
    }

    let theme = theme::Theme::by_name(&cli.theme).ok_or_else(|| {
        anyhow!(
            "unknown theme '{}', expected one of: {}",
            cli.theme,
            theme::Theme::all_names().join(", ")
        )
    })?;

    app::run(settings, cli.user, cli.prompt, theme).await
}
