pub mod build_info;
pub mod chat;
pub mod cli;
pub mod config;
pub mod error;
pub mod gateway;
pub mod input;
pub mod logging;
pub mod model;
pub mod photo;
pub mod providers;
pub mod setup;

use std::env;
use std::io;
use std::path::PathBuf;

use tracing::warn;

use cli::{Cli, USAGE};
use error::ClaiError;
use gateway::OpenAiBackend;
use setup::{Command, Prepared, Session};

pub async fn run() -> Result<(), ClaiError> {
    let get_var = |key: &str| env::var(key).ok();

    let cli = Cli::parse_args(env::args())?;
    let home = home_dir();
    let resolved = setup::resolve_config(&cli, &home, get_var)?;
    let piped = input::read_piped_stdin()?;

    match setup::prepare(resolved, cli.args, piped.as_deref(), get_var)? {
        Prepared::Help => print!("{USAGE}"),
        Prepared::Version(info) => println!("{info}"),
        Prepared::Run(session) => execute(session).await?,
    }
    Ok(())
}

async fn execute(session: Session) -> Result<(), ClaiError> {
    let (command, prompt) = session.command()?;
    let backend = OpenAiBackend::new(session.api.clone())?;
    let mut stdout = io::stdout();

    match command {
        Command::Query => {
            session.chat.query(&backend, &prompt, &mut stdout).await?;
        }
        Command::Photo => {
            session.photo.query(&backend, &prompt, &mut stdout).await?;
        }
    }
    Ok(())
}

fn home_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| {
        warn!("failed to determine home directory, using current directory");
        PathBuf::from(".")
    })
}
