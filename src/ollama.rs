use std::pin::Pin;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use futures_util::{Stream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// Fragments of a model reply, in arrival order.
pub type ReplyStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Anything that can turn a prompt into a streamed reply.
#[async_trait]
pub trait InferenceClient: Send + Sync {
    async fn stream(&self, prompt: &str) -> Result<ReplyStream>;
}

#[derive(Serialize)]
struct OllamaRequest {
    model: String,
    prompt: String,
    stream: bool,
}

/// One NDJSON line of a streamed `/api/generate` body.
#[derive(Deserialize, Debug, PartialEq)]
struct OllamaChunk {
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct OllamaModel {
    name: String,
}

#[derive(Deserialize)]
struct OllamaModelsResponse {
    models: Vec<OllamaModel>,
}

/// Reassembles newline-delimited records from arbitrarily split byte chunks.
#[derive(Default)]
pub struct NdjsonBuffer {
    buf: Vec<u8>,
}

impl NdjsonBuffer {
    pub fn push(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Next complete, non-empty line, if one is buffered.
    pub fn next_line(&mut self) -> Option<String> {
        while let Some(pos) = self.buf.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=pos).collect();
            let text = String::from_utf8_lossy(&line).trim().to_string();
            if !text.is_empty() {
                return Some(text);
            }
        }
        None
    }

    /// Whatever is left once the body has ended without a trailing newline.
    pub fn finish(&mut self) -> Option<String> {
        let text = String::from_utf8_lossy(&self.buf).trim().to_string();
        self.buf.clear();
        (!text.is_empty()).then_some(text)
    }
}

fn parse_chunk(line: &str) -> Result<OllamaChunk> {
    let chunk: OllamaChunk = serde_json::from_str(line)?;
    if let Some(error) = &chunk.error {
        return Err(anyhow!("Ollama error: {}", error));
    }
    Ok(chunk)
}

#[derive(Clone)]
pub struct OllamaClient {
    client: Client,
    base_url: String,
    model: String,
}

impl OllamaClient {
    pub fn new(base_url: &str, model: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub async fn list_models(&self) -> Result<Vec<String>> {
        let url = format!("{}/api/tags", self.base_url);

        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(anyhow!("Failed to list models: {}", response.status()));
        }

        let models_response: OllamaModelsResponse = response.json().await?;
        let model_names: Vec<String> = models_response
            .models
            .into_iter()
            .map(|model| model.name)
            .collect();

        Ok(model_names)
    }
}

#[async_trait]
impl InferenceClient for OllamaClient {
    async fn stream(&self, prompt: &str) -> Result<ReplyStream> {
        let url = format!("{}/api/generate", self.base_url);

        let request = OllamaRequest {
            model: self.model.clone(),
            prompt: prompt.to_string(),
            stream: true,
        };

        let response = self.client.post(&url).json(&request).send().await?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "Ollama request failed with status: {}. \
                 Make sure Ollama is running with: ollama serve",
                response.status()
            ));
        }

        Ok(reply_stream(response.bytes_stream()))
    }
}

/// Turn a streamed `/api/generate` body into reply fragments.
///
/// Reading stops at the first record with `done: true`; anything after it is
/// ignored. A body that ends before such a record is an error.
pub fn reply_stream<S, B, E>(body: S) -> ReplyStream
where
    S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Into<anyhow::Error> + Send + 'static,
{
    let out = async_stream::try_stream! {
        let mut lines = NdjsonBuffer::default();
        let mut done = false;

        futures_util::pin_mut!(body);
        while let Some(bytes) = body.next().await {
            let bytes = bytes.map_err(Into::<anyhow::Error>::into)?;
            lines.push(bytes.as_ref());
            while let Some(line) = lines.next_line() {
                let chunk = parse_chunk(&line)?;
                if !chunk.response.is_empty() {
                    yield chunk.response;
                }
                if chunk.done {
                    done = true;
                    break;
                }
            }
            if done {
                break;
            }
        }

        // final record without a trailing newline
        if !done {
            if let Some(line) = lines.finish() {
                let chunk = parse_chunk(&line)?;
                if !chunk.response.is_empty() {
                    yield chunk.response;
                }
                done = chunk.done;
            }
        }

        if !done {
            Err::<(), _>(anyhow!("Ollama stream ended before the reply was complete"))?;
        }
    };

    Box::pin(out)
}
