use std::path::PathBuf;

use clap::Parser;

use crate::config::{Defaults, FlagPair, FlagValues, return_non_default};
use crate::error::ClaiError;

pub const USAGE: &str = "clai - command line artificial intelligence

Usage: clai [flags] <command> <prompt...>

Commands:
  q, query     Send a prompt to the chat model
  p, photo     Generate an image from the prompt
  h, help      Print this help
  v, version   Print version info

Flags:
  --cm, --chat-model <MODEL>      Chat model to use (default: gpt-4-turbo-preview)
  --pm, --photo-model <MODEL>     Photo model to use (default: dall-e-3)
  --pd, --photo-dir <DIR>         Directory for generated images (default: $HOME/Pictures)
  --pp, --photo-prefix <PREFIX>   Filename prefix for generated images (default: clai)
  -r, --raw                       Print output without formatting
  --re, --reply                   Continue the previous conversation
  -I, --replace <TOKEN>           Replace TOKEN in the prompt with piped stdin

Piped stdin is appended to the prompt when only a command is given:
  git diff | clai q
  git diff | clai -I {} q 'write a commit message for: {}'
  cat notes.txt | clai -I {} q 'summarize {} in three bullets'

Config file: $HOME/.clai/config.yaml (fields: query, photo, chat_model,
photo_model, picture_dir, picture_prefix, raw)

Environment:
  OPENAI_API_KEY    required for queries
  DEBUG             print resolved configuration when truthy
";

pub const CHAT_MODEL_FLAGS: FlagPair = FlagPair {
    short: "--cm",
    long: "--chat-model",
};
pub const PHOTO_MODEL_FLAGS: FlagPair = FlagPair {
    short: "--pm",
    long: "--photo-model",
};
pub const PICTURE_DIR_FLAGS: FlagPair = FlagPair {
    short: "--pd",
    long: "--photo-dir",
};
pub const PICTURE_PREFIX_FLAGS: FlagPair = FlagPair {
    short: "--pp",
    long: "--photo-prefix",
};
pub const RAW_FLAGS: FlagPair = FlagPair {
    short: "-r",
    long: "--raw",
};
pub const REPLY_FLAGS: FlagPair = FlagPair {
    short: "--re",
    long: "--reply",
};
pub const REPLACE_FLAGS: FlagPair = FlagPair {
    short: "-I",
    long: "--replace",
};

/// Long flag names that may also be written with a single dash.
const SINGLE_DASH_LONGS: &[&str] = &[
    "cm",
    "chat-model",
    "pm",
    "photo-model",
    "pd",
    "photo-dir",
    "pp",
    "photo-prefix",
    "raw",
    "re",
    "reply",
    "replace",
];

/// Flags that consume the following argument as their value.
const VALUE_FLAGS: &[&str] = &[
    "--cm",
    "--chat-model",
    "--pm",
    "--photo-model",
    "--pd",
    "--photo-dir",
    "--pp",
    "--photo-prefix",
    "--replace",
    "-I",
];

const HELP_SPELLINGS: &[&str] = &["-h", "-help", "--help"];
const VERSION_SPELLINGS: &[&str] = &["-v", "-version", "--version"];

#[derive(Debug, Clone, Default, Parser)]
#[command(
    name = "clai",
    disable_help_flag = true,
    disable_version_flag = true,
    override_usage = "clai [flags] <command> <prompt...>"
)]
pub struct Cli {
    #[arg(long = "cm", value_name = "MODEL")]
    pub cm: Option<String>,
    #[arg(long = "chat-model", value_name = "MODEL")]
    pub chat_model: Option<String>,

    #[arg(long = "pm", value_name = "MODEL")]
    pub pm: Option<String>,
    #[arg(long = "photo-model", value_name = "MODEL")]
    pub photo_model: Option<String>,

    #[arg(long = "pd", value_name = "DIR")]
    pub pd: Option<PathBuf>,
    #[arg(long = "photo-dir", value_name = "DIR")]
    pub photo_dir: Option<PathBuf>,

    #[arg(long = "pp", value_name = "PREFIX")]
    pub pp: Option<String>,
    #[arg(long = "photo-prefix", value_name = "PREFIX")]
    pub photo_prefix: Option<String>,

    #[arg(short = 'r')]
    pub r: bool,
    #[arg(long = "raw")]
    pub raw: bool,

    #[arg(long = "re")]
    pub re: bool,
    #[arg(long = "reply")]
    pub reply: bool,

    #[arg(short = 'I', value_name = "TOKEN")]
    pub replace_short: Option<String>,
    #[arg(long = "replace", value_name = "TOKEN")]
    pub replace: Option<String>,

    /// Command followed by the prompt.
    #[arg(value_name = "ARGS", trailing_var_arg = true)]
    pub args: Vec<String>,
}

impl Cli {
    /// Parses process arguments, the first item being the binary name.
    pub fn parse_args<I>(argv: I) -> Result<Self, ClaiError>
    where
        I: IntoIterator<Item = String>,
    {
        Ok(Self::try_parse_from(normalize_args(argv))?)
    }

    /// Collapses each flag pair, rejecting pairs where both sides were set.
    pub fn flag_values(&self, defaults: &Defaults) -> Result<FlagValues, ClaiError> {
        let or_default = |value: &Option<String>, default: &String| {
            value.clone().unwrap_or_else(|| default.clone())
        };
        let dir_or_default = |value: &Option<PathBuf>| {
            value
                .clone()
                .unwrap_or_else(|| defaults.picture_dir.clone())
        };

        Ok(FlagValues {
            chat_model: return_non_default(
                or_default(&self.cm, &defaults.chat_model),
                or_default(&self.chat_model, &defaults.chat_model),
                defaults.chat_model.clone(),
                CHAT_MODEL_FLAGS,
            )?,
            photo_model: return_non_default(
                or_default(&self.pm, &defaults.photo_model),
                or_default(&self.photo_model, &defaults.photo_model),
                defaults.photo_model.clone(),
                PHOTO_MODEL_FLAGS,
            )?,
            picture_dir: return_non_default(
                dir_or_default(&self.pd),
                dir_or_default(&self.photo_dir),
                defaults.picture_dir.clone(),
                PICTURE_DIR_FLAGS,
            )?,
            picture_prefix: return_non_default(
                or_default(&self.pp, &defaults.picture_prefix),
                or_default(&self.photo_prefix, &defaults.picture_prefix),
                defaults.picture_prefix.clone(),
                PICTURE_PREFIX_FLAGS,
            )?,
            stdin_replace: return_non_default(
                or_default(&self.replace_short, &defaults.stdin_replace),
                or_default(&self.replace, &defaults.stdin_replace),
                defaults.stdin_replace.clone(),
                REPLACE_FLAGS,
            )?,
            print_raw: return_non_default(self.r, self.raw, defaults.print_raw, RAW_FLAGS)?,
            reply_mode: return_non_default(self.re, self.reply, defaults.reply_mode, REPLY_FLAGS)?,
        })
    }
}

/// Rewrites single-dash long flags (`-cm`) to `--cm` and a trailing help or
/// version flag to its bare token. Stops at the first positional or `--`.
pub fn normalize_args<I>(argv: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut argv = argv.into_iter();
    let mut out: Vec<String> = argv.next().into_iter().collect();
    let rest: Vec<String> = argv.collect();

    let mut rest = rest.into_iter();
    let mut expects_value = false;
    while let Some(arg) = rest.next() {
        if expects_value {
            expects_value = false;
            out.push(arg);
            continue;
        }
        if rest.as_slice().is_empty() {
            if HELP_SPELLINGS.contains(&arg.as_str()) {
                out.push("help".to_string());
                break;
            }
            if VERSION_SPELLINGS.contains(&arg.as_str()) {
                out.push("version".to_string());
                break;
            }
        }
        if arg == "--" || !arg.starts_with('-') {
            out.push(arg);
            break;
        }

        let normalized = match arg.strip_prefix('-') {
            Some(name) if !name.starts_with('-') => {
                let (flag, inline_value) = match name.split_once('=') {
                    Some((flag, value)) => (flag, Some(value)),
                    None => (name, None),
                };
                if SINGLE_DASH_LONGS.contains(&flag) {
                    match inline_value {
                        Some(value) => format!("--{flag}={value}"),
                        None => format!("--{flag}"),
                    }
                } else {
                    arg.clone()
                }
            }
            _ => arg.clone(),
        };

        expects_value = !normalized.contains('=') && VALUE_FLAGS.contains(&normalized.as_str());
        out.push(normalized);
    }
    out.extend(rest);
    out
}
