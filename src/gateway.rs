use anyhow::{Context, Result};
use reqwest::Client;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use crate::config::ApiSettings;
use crate::model::{ChatCompletion, GeneratedImage, Message};
use crate::providers::openai;

pub struct ChatRequest<'a> {
    pub url: &'a str,
    pub model: &'a str,
    pub messages: &'a [Message],
}

pub struct ImageRequest<'a> {
    pub url: &'a str,
    pub model: &'a str,
    pub prompt: &'a str,
}

pub type ApiFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + 'a>>;

/// Remote side of the queriers. Lets tests swap the HTTP client for a stub.
pub trait ApiBackend {
    fn chat<'a>(&'a self, request: ChatRequest<'a>) -> ApiFuture<'a, ChatCompletion>;
    fn generate_image<'a>(&'a self, request: ImageRequest<'a>) -> ApiFuture<'a, GeneratedImage>;
}

pub struct OpenAiBackend {
    client: Client,
    settings: ApiSettings,
}

impl OpenAiBackend {
    pub fn new(settings: ApiSettings) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .context("Failed to initialize HTTP client")?;
        Ok(Self { client, settings })
    }
}

impl ApiBackend for OpenAiBackend {
    fn chat<'a>(&'a self, request: ChatRequest<'a>) -> ApiFuture<'a, ChatCompletion> {
        Box::pin(async move {
            openai::chat(
                &self.client,
                &self.settings,
                request.url,
                request.model,
                request.messages,
            )
            .await
        })
    }

    fn generate_image<'a>(&'a self, request: ImageRequest<'a>) -> ApiFuture<'a, GeneratedImage> {
        Box::pin(async move {
            openai::generate_image(
                &self.client,
                &self.settings,
                request.url,
                request.model,
                request.prompt,
            )
            .await
        })
    }
}
