use std::io::{self, IsTerminal, Read};

use tracing::debug;

use crate::error::ClaiError;

const HELP_TOKENS: &[&str] = &["h", "help", "-h", "-help"];
const VERSION_TOKENS: &[&str] = &["v", "version", "-v", "-version"];

/// What the argument list asks for once stdin has been taken into account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Assembled {
    Help,
    Version,
    Args(Vec<String>),
}

/// Reads all of stdin when it is not a terminal. Empty input counts as no
/// input, which covers closed or redirected-but-empty stdin.
pub fn read_piped_stdin() -> Result<Option<String>, ClaiError> {
    let stdin = io::stdin();
    if stdin.is_terminal() {
        return Ok(None);
    }
    read_piped(stdin.lock())
}

pub fn read_piped(mut reader: impl Read) -> Result<Option<String>, ClaiError> {
    let mut buffer = Vec::new();
    reader.read_to_end(&mut buffer).map_err(ClaiError::Stdin)?;
    if buffer.is_empty() {
        return Ok(None);
    }

    let text = String::from_utf8(buffer)
        .map_err(|err| ClaiError::Stdin(io::Error::new(io::ErrorKind::InvalidData, err)))?;
    debug!(piped_len = text.len(), "read piped stdin");
    Ok(Some(text))
}

pub fn assemble(
    args: Vec<String>,
    piped: Option<&str>,
    replace_token: &str,
) -> Result<Assembled, ClaiError> {
    let Some(piped) = piped else {
        return assemble_without_pipe(args);
    };

    let mut args = args;
    if args.len() == 1 {
        args.extend(piped.split(' ').map(str::to_string));
    }

    if !replace_token.is_empty() {
        for arg in args.iter_mut() {
            if arg.contains(replace_token) {
                *arg = arg.replace(replace_token, piped);
            }
        }
    }

    debug!(arg_count = args.len(), replace_token = %replace_token, "merged piped stdin into args");
    Ok(Assembled::Args(args))
}

fn assemble_without_pipe(args: Vec<String>) -> Result<Assembled, ClaiError> {
    if let [only] = args.as_slice() {
        if HELP_TOKENS.contains(&only.as_str()) {
            return Ok(Assembled::Help);
        }
        if VERSION_TOKENS.contains(&only.as_str()) {
            return Ok(Assembled::Version);
        }
    }

    if args.is_empty() {
        return Err(ClaiError::NoPrompt);
    }
    Ok(Assembled::Args(args))
}
