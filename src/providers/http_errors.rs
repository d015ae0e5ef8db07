use anyhow::anyhow;
use serde::Deserialize;
use std::error::Error as StdError;
use std::io::ErrorKind;

fn error_chain_matches(
    err: &(dyn StdError + 'static),
    kind: ErrorKind,
    needle: &str,
) -> bool {
    let mut current: Option<&(dyn StdError + 'static)> = Some(err);
    while let Some(source) = current {
        if let Some(io_err) = source.downcast_ref::<std::io::Error>()
            && io_err.kind() == kind
        {
            return true;
        }

        if source.to_string().to_ascii_lowercase().contains(needle) {
            return true;
        }

        current = source.source();
    }

    false
}

pub(crate) fn api_request_error(
    err: reqwest::Error,
    api_url: &str,
    timeout_secs: u64,
) -> anyhow::Error {
    if err.is_timeout() || error_chain_matches(&err, ErrorKind::TimedOut, "timed out") {
        return anyhow!(
            "API request timed out after {}s while calling '{}'. \
             Increase CLAI_TIMEOUT_SECS or try again later.",
            timeout_secs,
            api_url
        );
    }

    if err.is_connect() {
        if error_chain_matches(&err, ErrorKind::ConnectionRefused, "connection refused") {
            return anyhow!(
                "Connection refused by API at '{}'. Check OPENAI_BASE_URL.",
                api_url
            );
        }

        return anyhow!(
            "Failed to connect to API at '{}'. \
             Check OPENAI_BASE_URL and network connectivity.",
            api_url
        );
    }

    anyhow!("Failed to call API at '{}': {}", api_url, err)
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// Prefers the `error.message` field of an API error body over the raw text.
pub(crate) fn api_status_error(status: reqwest::StatusCode, body: &str) -> anyhow::Error {
    match serde_json::from_str::<ApiErrorBody>(body) {
        Ok(parsed) => anyhow!("API request failed with status {}: {}", status, parsed.error.message),
        Err(_) => anyhow!("API request failed with status {}: {}", status, body),
    }
}
