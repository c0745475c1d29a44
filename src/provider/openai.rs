use super::error::check_status;
use super::sse::{spawn_fragment_stream, Decoded};
use super::{FragmentStream, Provider, ProviderError, ProviderFuture, ProviderKind};
use serde::{Deserialize, Serialize};

/// Chat completions client for any OpenAI-compatible server.
///
/// Serves both the remote OpenAI API and a local Ollama server; only the
/// base URL, the credential and the reported [`ProviderKind`] differ.
#[derive(Debug, Clone)]
pub struct OpenAiCompatible {
    http: reqwest::Client,
    kind: ProviderKind,
    api_base: String,
    api_key: Option<String>,
    model: String,
}

impl OpenAiCompatible {
    pub fn new(
        http: reqwest::Client,
        kind: ProviderKind,
        api_base: impl Into<String>,
        api_key: Option<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            http,
            kind,
            api_base: api_base.into(),
            api_key,
            model: model.into(),
        }
    }

    fn url(&self) -> String {
        format!("{}/chat/completions", self.api_base.trim_end_matches('/'))
    }

    async fn send(&self, payload: String, stream: bool) -> Result<reqwest::Response, ProviderError> {
        let body = ChatCompletionRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: payload,
            }],
            stream,
        };

        let mut req = self.http.post(self.url()).json(&body);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        tracing::debug!(provider = %self.kind, model = %self.model, stream, "sending chat completion");
        let resp = req.send().await.map_err(ProviderError::from_transport)?;
        check_status(resp, &self.model).await
    }
}

impl Provider for OpenAiCompatible {
    fn name(&self) -> &'static str {
        match self.kind {
            ProviderKind::Ollama => "ollama",
            _ => "openai",
        }
    }

    fn kind(&self) -> ProviderKind {
        self.kind
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn complete(&self, payload: String) -> ProviderFuture<String> {
        let this = self.clone();
        Box::pin(async move {
            let resp = this.send(payload, false).await?;
            let bytes = resp.bytes().await.map_err(ProviderError::from_transport)?;
            let parsed: ChatCompletionResponse = serde_json::from_slice(&bytes)
                .map_err(|e| ProviderError::Decode(format!("chat completion JSON: {e}")))?;

            let choice = parsed
                .choices
                .into_iter()
                .next()
                .ok_or_else(|| ProviderError::Decode("chat completion has no choices".to_string()))?;
            Ok(choice.message.content.unwrap_or_default())
        })
    }

    fn stream(&self, payload: String) -> ProviderFuture<FragmentStream> {
        let this = self.clone();
        Box::pin(async move {
            let resp = this.send(payload, true).await?;
            let model = this.model.clone();
            Ok(spawn_fragment_stream(resp, move |data| decode_chunk(data, &model)))
        })
    }
}

/// Decode one streamed chat completion chunk.
///
/// A chunk without delta content still yields a (possibly empty) fragment so
/// the stream keeps its shape.
pub(crate) fn decode_chunk(data: &str, model: &str) -> Result<Decoded, ProviderError> {
    if data.trim() == "[DONE]" {
        return Ok(Decoded::Done);
    }

    let chunk: ChatCompletionChunk = serde_json::from_str(data)
        .map_err(|e| ProviderError::Decode(format!("chat completion chunk JSON: {e}")))?;

    if let Some(err) = chunk.error {
        let not_found = err.code.as_deref() == Some("model_not_found")
            || err.message.contains("not found");
        return Err(if not_found {
            ProviderError::ModelNotFound {
                model: model.to_string(),
                message: err.message,
            }
        } else {
            ProviderError::Decode(format!("stream error: {}", err.message))
        });
    }

    let text = chunk
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.delta.content)
        .unwrap_or_default();
    Ok(Decoded::Fragment(text))
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
    #[serde(default)]
    error: Option<StreamErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: Delta,
}

#[derive(Debug, Default, Deserialize)]
struct Delta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    code: Option<String>,
}
