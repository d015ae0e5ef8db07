use std::path::{Path, PathBuf};

use tracing::debug;

use crate::build_info::BuildInfo;
use crate::chat::{ChatQuerier, previous_conversation_path};
use crate::cli::Cli;
use crate::config::{
    ApiSettings, Defaults, EffectiveConfig, config_dir, config_file_path, debug_enabled,
    load_file_config, resolve,
};
use crate::error::ClaiError;
use crate::input::{Assembled, assemble};
use crate::photo::PhotoQuerier;
use crate::providers::openai::{chat_url, images_url};

/// Resolved configuration plus the home directory it was resolved against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub config: EffectiveConfig,
    pub home: PathBuf,
    pub debug: bool,
}

/// Applies flags over `~/.clai/config.yaml` over built-in defaults.
pub fn resolve_config(
    cli: &Cli,
    home: &Path,
    get_var: impl Fn(&str) -> Option<String>,
) -> Result<Resolved, ClaiError> {
    let defaults = Defaults::for_home(home);
    let flags = cli.flag_values(&defaults)?;
    let config_path = config_file_path(home);
    let file = load_file_config(&config_path)?;
    let config = resolve(&defaults, flags, file.as_ref());
    let debug = debug_enabled(get_var);

    debug!(
        config_path = %config_path.display(),
        config_file_found = file.is_some(),
        chat_model = %config.chat_model,
        photo_model = %config.photo_model,
        picture_dir = %config.picture_dir.display(),
        "resolved configuration"
    );
    if debug {
        println!("debug: config: {config:#?}");
    }

    Ok(Resolved {
        config,
        home: home.to_path_buf(),
        debug,
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Query,
    Photo,
}

impl Command {
    fn parse(token: &str) -> Option<Self> {
        match token {
            "q" | "query" => Some(Self::Query),
            "p" | "photo" => Some(Self::Photo),
            _ => None,
        }
    }
}

/// Ready-to-run invocation: credentials, both client descriptors and the
/// final argument list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub api: ApiSettings,
    pub chat: ChatQuerier,
    pub photo: PhotoQuerier,
    pub args: Vec<String>,
}

impl Session {
    /// Splits the argument list into its command and the space-joined prompt.
    pub fn command(&self) -> Result<(Command, String), ClaiError> {
        let (first, rest) = self.args.split_first().ok_or(ClaiError::NoPrompt)?;
        let command =
            Command::parse(first).ok_or_else(|| ClaiError::UnknownCommand(first.clone()))?;
        let prompt = rest.join(" ");
        if prompt.trim().is_empty() {
            return Err(ClaiError::NoPrompt);
        }
        Ok((command, prompt))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prepared {
    Help,
    Version(BuildInfo),
    Run(Session),
}

/// Merges piped stdin into the arguments, then builds the session. Help and
/// version do not need an API key.
pub fn prepare(
    resolved: Resolved,
    args: Vec<String>,
    piped: Option<&str>,
    get_var: impl Fn(&str) -> Option<String>,
) -> Result<Prepared, ClaiError> {
    let Resolved {
        config,
        home,
        debug,
    } = resolved;

    let args = match assemble(args, piped, &config.stdin_replace)? {
        Assembled::Help => return Ok(Prepared::Help),
        Assembled::Version => {
            return BuildInfo::current()
                .map(Prepared::Version)
                .ok_or(ClaiError::BuildInfoUnavailable);
        }
        Assembled::Args(args) => args,
    };
    if debug {
        println!("debug: args: {args:?}");
    }

    let api = ApiSettings::from_env_with(get_var)?;
    debug!(api = ?api, arg_count = args.len(), "prepared session");

    let chat = ChatQuerier {
        url: chat_url(&api.base_url),
        model: config.chat_model,
        system_prompt: config.system_prompt,
        raw: config.print_raw,
        reply_mode: config.reply_mode,
        conversation_path: previous_conversation_path(&config_dir(&home)),
    };
    let photo = PhotoQuerier {
        url: images_url(&api.base_url),
        model: config.photo_model,
        prompt_format: config.photo_prompt_format,
        photo_dir: config.picture_dir,
        photo_prefix: config.picture_prefix,
        raw: config.print_raw,
    };

    Ok(Prepared::Run(Session {
        api,
        chat,
        photo,
        args,
    }))
}
