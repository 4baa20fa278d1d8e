//! skillconnect: command-line client for the SkillConnect service
//!
//! Every command runs through a [`Session`], so mutations take the same
//! optimistic path as an interactive client and any failure notices are
//! printed after the result.

mod commands;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use skillconnect_sdk::gateway::{CredentialSource, StaticCredential};
use skillconnect_sdk::notice::drain;
use skillconnect_sdk::{logging, ClientConfig, Session};
use tracing::{debug, info};

use commands::Command;

#[derive(Parser)]
#[command(name = "skillconnect")]
#[command(about = "Command-line client for the SkillConnect learning platform")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "skillconnect.toml")]
    config: PathBuf,

    /// Signed-in user
    #[arg(short, long, env = "SKILLCONNECT_USER_ID")]
    user_id: i64,

    /// Bearer token (defaults to the one saved in the state directory)
    #[arg(long, env = "SKILLCONNECT_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(Some("skillconnect_cli=info,skillconnect_sdk=warn"), cli.json_logs);

    let config = ClientConfig::load(&cli.config)?.apply_env();
    debug!(config = %cli.config.display(), api = %config.api.base_url, "Configuration loaded");

    let credentials = cli
        .token
        .map(|token| Arc::new(StaticCredential::new(token)) as Arc<dyn CredentialSource>);
    let session = Session::from_config(config, cli.user_id, credentials)?;
    let mut notices = session.notifier().subscribe();

    let output = commands::execute(&session, cli.command).await;

    for notice in drain(&mut notices) {
        eprintln!("[{:?}] {}", notice.level, notice.message);
    }

    match output {
        Ok(text) => {
            if !text.is_empty() {
                println!("{}", text);
            }
            info!("Done");
            Ok(())
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use skillconnect_sdk::model::LearningStatus;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_status_parses_display_names() {
        let cli = Cli::try_parse_from([
            "skillconnect",
            "--user-id",
            "7",
            "update-status",
            "3",
            "almost complete",
        ])
        .unwrap();
        match cli.command {
            Command::UpdateStatus { update_id, status } => {
                assert_eq!(update_id, 3);
                assert_eq!(status, LearningStatus::AlmostComplete);
            }
            other => panic!("unexpected command: {:?}", other),
        }

        assert!(Cli::try_parse_from(["skillconnect", "-u", "7", "update-status", "3", "done"]).is_err());
    }
}
