use anyhow::{Context, Result, anyhow};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::ApiSettings;
use crate::model::{ChatCompletion, GeneratedImage, Message, TokenUsage};
use crate::providers::http_errors::{api_request_error, api_status_error};

const IMAGE_SIZE: &str = "1024x1024";
const IMAGE_RESPONSE_FORMAT: &str = "b64_json";

#[derive(Debug, Serialize)]
struct ChatRequestBody<'a> {
    model: &'a str,
    messages: &'a [Message],
}

#[derive(Debug, Deserialize)]
struct ChatResponseBody {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<TokenUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Serialize)]
struct ImageRequestBody<'a> {
    model: &'a str,
    prompt: &'a str,
    n: u32,
    size: &'a str,
    response_format: &'a str,
}

#[derive(Debug, Deserialize)]
struct ImageResponseBody {
    data: Vec<ImageData>,
}

#[derive(Debug, Deserialize)]
struct ImageData {
    b64_json: Option<String>,
    #[serde(default)]
    revised_prompt: Option<String>,
}

pub fn chat_url(base_url: &str) -> String {
    format!("{}/v1/chat/completions", base_url.trim_end_matches('/'))
}

pub fn images_url(base_url: &str) -> String {
    format!("{}/v1/images/generations", base_url.trim_end_matches('/'))
}

async fn post_json<B, R>(client: &Client, settings: &ApiSettings, api_url: &str, body: &B) -> Result<R>
where
    B: Serialize + ?Sized,
    R: for<'de> Deserialize<'de>,
{
    let response = client
        .post(api_url)
        .bearer_auth(&settings.api_key)
        .json(body)
        .send()
        .await
        .map_err(|err| {
            warn!(api_url = %api_url, error = %err, "api request failed");
            api_request_error(err, api_url, settings.timeout_secs)
        })?;

    if !response.status().is_success() {
        let status = response.status();
        let response_body = response
            .text()
            .await
            .unwrap_or_else(|_| "<failed to read response body>".to_string());
        warn!(
            api_url = %api_url,
            status = %status,
            response_body_len = response_body.len(),
            "api returned non-success status"
        );
        return Err(api_status_error(status, &response_body));
    }

    response
        .json()
        .await
        .with_context(|| format!("Failed to parse response from '{api_url}'"))
}

pub async fn chat(
    client: &Client,
    settings: &ApiSettings,
    api_url: &str,
    model: &str,
    messages: &[Message],
) -> Result<ChatCompletion> {
    debug!(
        api_url = %api_url,
        model = %model,
        message_count = messages.len(),
        "sending chat completion request"
    );

    let parsed: ChatResponseBody = post_json(
        client,
        settings,
        api_url,
        &ChatRequestBody { model, messages },
    )
    .await?;

    let content = parsed
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| anyhow!("Chat response from '{}' contained no message", api_url))?;
    debug!(model = %model, response_len = content.len(), "received chat completion");

    Ok(ChatCompletion {
        content,
        usage: parsed.usage,
    })
}

pub async fn generate_image(
    client: &Client,
    settings: &ApiSettings,
    api_url: &str,
    model: &str,
    prompt: &str,
) -> Result<GeneratedImage> {
    debug!(
        api_url = %api_url,
        model = %model,
        prompt_len = prompt.len(),
        "sending image generation request"
    );

    let parsed: ImageResponseBody = post_json(
        client,
        settings,
        api_url,
        &ImageRequestBody {
            model,
            prompt,
            n: 1,
            size: IMAGE_SIZE,
            response_format: IMAGE_RESPONSE_FORMAT,
        },
    )
    .await?;

    let image = parsed
        .data
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("Image response from '{}' contained no data", api_url))?;
    let encoded = image
        .b64_json
        .ok_or_else(|| anyhow!("Image response from '{}' contained no b64_json", api_url))?;
    let bytes = STANDARD
        .decode(encoded.trim())
        .context("Failed to decode generated image")?;
    debug!(model = %model, image_bytes = bytes.len(), "received generated image");

    Ok(GeneratedImage {
        bytes,
        revised_prompt: image.revised_prompt,
    })
}
