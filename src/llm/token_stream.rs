use anyhow::{Context, Result};
use async_trait::async_trait;
use futures_util::stream::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use std::time::Duration;

use crate::config::LlmConfig;

pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Anything that can turn a prompt into a stream of generated text fragments.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn token_stream(&self, prompt: &str) -> Result<TokenStream>;
}

/// Streaming chat model reached over HTTP (Ollama or OpenAI-compatible).
pub struct ChatModel {
    client: reqwest::Client,
    config: LlmConfig,
}

impl ChatModel {
    pub fn new(client: reqwest::Client, config: LlmConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl TokenSource for ChatModel {
    async fn token_stream(&self, prompt: &str) -> Result<TokenStream> {
        match self.config.provider.as_str() {
            "ollama" => stream_ollama(&self.client, &self.config, prompt).await,
            "openai" => stream_openai(&self.client, &self.config, prompt).await,
            other => anyhow::bail!("Unsupported LLM provider: {other}"),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct StreamMessage {
    role: String,
    content: String,
}

fn user_message(prompt: &str) -> Vec<StreamMessage> {
    vec![StreamMessage {
        role: "user".to_string(),
        content: prompt.to_string(),
    }]
}

// ─── Ollama streaming ────────────────────────────────────

#[derive(Serialize)]
struct OllamaStreamRequest {
    model: String,
    messages: Vec<StreamMessage>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
}

#[derive(Deserialize)]
struct OllamaStreamChunk {
    message: StreamMessage,
    done: bool,
}

async fn stream_ollama(
    client: &reqwest::Client,
    config: &LlmConfig,
    prompt: &str,
) -> Result<TokenStream> {
    let url = format!("{}/api/chat", config.base_url);

    let req = OllamaStreamRequest {
        model: config.chat_model.clone(),
        messages: user_message(prompt),
        stream: true,
        options: OllamaOptions {
            temperature: config.temperature,
        },
    };

    let resp = client
        .post(&url)
        .timeout(Duration::from_secs(300))
        .json(&req)
        .send()
        .await
        .context("Failed to connect to Ollama for query expansion")?;

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        anyhow::bail!("Ollama chat API returned {status}: {body}");
    }

    let stream = stream_lines(resp.bytes_stream()).filter_map(|line_result| async move {
        match line_result {
            Ok(line) => parse_ollama_line(&line),
            Err(e) => Some(Err(e)),
        }
    });

    Ok(Box::pin(stream))
}

/// Parse a single Ollama NDJSON line. `None` means skip (empty content or done).
fn parse_ollama_line(line: &str) -> Option<Result<String>> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    match serde_json::from_str::<OllamaStreamChunk>(line) {
        Ok(chunk) => {
            if chunk.done || chunk.message.content.is_empty() {
                return None;
            }
            Some(Ok(chunk.message.content))
        }
        Err(e) => Some(Err(anyhow::anyhow!("Failed to parse Ollama chunk: {e}"))),
    }
}

// ─── OpenAI streaming ────────────────────────────────────

#[derive(Serialize)]
struct OpenAiStreamRequest {
    model: String,
    messages: Vec<StreamMessage>,
    stream: bool,
    temperature: f32,
}

#[derive(Deserialize)]
struct OpenAiStreamChunk {
    choices: Vec<OpenAiStreamChoice>,
}

#[derive(Deserialize)]
struct OpenAiStreamChoice {
    delta: OpenAiStreamDelta,
}

#[derive(Deserialize)]
struct OpenAiStreamDelta {
    content: Option<String>,
}

async fn stream_openai(
    client: &reqwest::Client,
    config: &LlmConfig,
    prompt: &str,
) -> Result<TokenStream> {
    let url = format!("{}/v1/chat/completions", config.base_url);

    let req = OpenAiStreamRequest {
        model: config.chat_model.clone(),
        messages: user_message(prompt),
        stream: true,
        temperature: config.temperature,
    };

    let resp = client
        .post(&url)
        .timeout(Duration::from_secs(300))
        .header(
            "Authorization",
            format!("Bearer {}", config.api_key.as_deref().unwrap_or("")),
        )
        .json(&req)
        .send()
        .await
        .context("Failed to connect to OpenAI for query expansion")?;

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        anyhow::bail!("OpenAI chat API returned {status}: {body}");
    }

    let stream = stream_lines(resp.bytes_stream()).filter_map(|line_result| async move {
        match line_result {
            Ok(line) => parse_openai_line(&line),
            Err(e) => Some(Err(e)),
        }
    });

    Ok(Box::pin(stream))
}

/// Parse a single OpenAI SSE line. `None` means skip (non-data lines,
/// `[DONE]`, role-only chunks).
fn parse_openai_line(line: &str) -> Option<Result<String>> {
    let line = line.trim();
    let data = line.strip_prefix("data: ")?.trim();

    if data == "[DONE]" {
        return None;
    }

    match serde_json::from_str::<OpenAiStreamChunk>(data) {
        Ok(chunk) => {
            let content = chunk
                .choices
                .first()
                .and_then(|c| c.delta.content.clone())
                .unwrap_or_default();
            if content.is_empty() {
                return None;
            }
            Some(Ok(content))
        }
        Err(e) => Some(Err(anyhow::anyhow!("Failed to parse OpenAI chunk: {e}"))),
    }
}

// ─── Line buffering ──────────────────────────────────────

/// Convert a byte stream into a stream of complete, non-blank lines.
///
/// Bytes are buffered raw and only decoded once a full line is available,
/// so multi-byte characters split across reads survive intact.
pub(crate) fn stream_lines<E>(
    byte_stream: impl Stream<Item = std::result::Result<bytes::Bytes, E>> + Send + 'static,
) -> impl Stream<Item = Result<String>> + Send
where
    E: std::fmt::Display,
{
    futures_util::stream::unfold(
        (Box::pin(byte_stream), Vec::<u8>::new()),
        |(mut stream, mut buffer)| async move {
            loop {
                if let Some(newline_pos) = buffer.iter().position(|&b| b == b'\n') {
                    let rest = buffer.split_off(newline_pos + 1);
                    let mut line = std::mem::replace(&mut buffer, rest);
                    line.pop();
                    match decode_line(line) {
                        Ok(line) if line.trim().is_empty() => continue,
                        decoded => return Some((decoded, (stream, buffer))),
                    }
                }

                match stream.next().await {
                    Some(Ok(bytes)) => buffer.extend_from_slice(&bytes),
                    Some(Err(e)) => {
                        return Some((
                            Err(anyhow::anyhow!("Stream read error: {e}")),
                            (stream, buffer),
                        ));
                    }
                    None => {
                        if buffer.is_empty() {
                            return None;
                        }
                        match decode_line(std::mem::take(&mut buffer)) {
                            Ok(line) if line.trim().is_empty() => return None,
                            decoded => return Some((decoded, (stream, buffer))),
                        }
                    }
                }
            }
        },
    )
}

fn decode_line(bytes: Vec<u8>) -> Result<String> {
    String::from_utf8(bytes).context("Stream contained invalid UTF-8")
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use futures_util::stream;

    #[test]
    fn test_parse_ollama_chunk() {
        let line = r#"{"message":{"role":"assistant","content":"ML basics"},"done":false}"#;
        assert_eq!(parse_ollama_line(line).unwrap().unwrap(), "ML basics");
    }

    #[test]
    fn test_parse_ollama_done() {
        let line = r#"{"message":{"role":"assistant","content":""},"done":true}"#;
        assert!(parse_ollama_line(line).is_none());
    }

    #[test]
    fn test_parse_ollama_malformed() {
        assert!(parse_ollama_line("not valid json{{{").unwrap().is_err());
    }

    #[test]
    fn test_parse_openai_data_line() {
        let line = r#"data: {"choices":[{"delta":{"content":"neural\n"}}]}"#;
        assert_eq!(parse_openai_line(line).unwrap().unwrap(), "neural\n");
    }

    #[test]
    fn test_parse_openai_done_and_role_only() {
        assert!(parse_openai_line("data: [DONE]").is_none());
        let role_only = r#"data: {"choices":[{"delta":{"role":"assistant"}}]}"#;
        assert!(parse_openai_line(role_only).is_none());
    }

    #[test]
    fn test_parse_openai_non_data_line() {
        assert!(parse_openai_line("event: message").is_none());
        assert!(parse_openai_line("").is_none());
    }

    #[test]
    fn test_parse_openai_malformed() {
        assert!(parse_openai_line("data: {broken json").unwrap().is_err());
    }

    #[tokio::test]
    async fn test_stream_lines_reassembles_split_lines() {
        let parts: Vec<Result<Bytes, std::io::Error>> = vec![
            Ok(Bytes::from_static(b"first li")),
            Ok(Bytes::from_static(b"ne\n\nsecond\nthi")),
            Ok(Bytes::from_static(b"rd")),
        ];
        let lines: Vec<String> = stream_lines(stream::iter(parts))
            .map(|l| l.unwrap())
            .collect()
            .await;
        assert_eq!(lines, vec!["first line", "second", "third"]);
    }

    #[tokio::test]
    async fn test_stream_lines_keeps_characters_split_across_reads() {
        let parts: Vec<Result<Bytes, std::io::Error>> = vec![
            Ok(Bytes::from_static(b"caf\xC3")),
            Ok(Bytes::from_static(b"\xA9\nrust \xF0\x9F")),
            Ok(Bytes::from_static(b"\xA6")),
            Ok(Bytes::from_static(b"\x80 crab")),
        ];
        let lines: Vec<String> = stream_lines(stream::iter(parts))
            .map(|l| l.unwrap())
            .collect()
            .await;
        assert_eq!(lines, vec!["café", "rust 🦀 crab"]);
    }

    #[tokio::test]
    async fn test_stream_lines_rejects_invalid_utf8_line() {
        let parts: Vec<Result<Bytes, std::io::Error>> = vec![
            Ok(Bytes::from_static(b"bad \xFF\n")),
            Ok(Bytes::from_static(b"good\n")),
        ];
        let lines: Vec<Result<String>> = stream_lines(stream::iter(parts)).collect().await;
        assert!(lines[0].is_err());
        assert_eq!(lines[1].as_ref().unwrap(), "good");
    }

    #[tokio::test]
    async fn test_stream_lines_surfaces_read_errors() {
        let parts: Vec<Result<Bytes, std::io::Error>> = vec![
            Ok(Bytes::from_static(b"ok\n")),
            Err(std::io::Error::other("reset")),
        ];
        let lines: Vec<Result<String>> = stream_lines(stream::iter(parts)).collect().await;
        assert_eq!(lines.len(), 2);
        assert!(lines[1].as_ref().unwrap_err().to_string().contains("reset"));
    }
}
