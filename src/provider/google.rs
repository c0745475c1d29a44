use super::error::check_status;
use super::sse::{spawn_fragment_stream, Decoded};
use super::{FragmentStream, Provider, ProviderError, ProviderFuture, ProviderKind};
use reqwest::Url;
use serde::{Deserialize, Serialize};

/// Generative Language API client bound to a single model.
///
/// Unlike the chat completions clients, the model is part of the endpoint
/// path, so it has to be known when the client is built.
#[derive(Debug, Clone)]
pub struct GoogleProvider {
    http: reqwest::Client,
    api_key: Option<String>,
    api_base: Url,
    model: String,
}

impl GoogleProvider {
    /// Build a client for `model`, installing `api_key` into it.
    ///
    /// A missing key is not an error here; the API rejects the request later.
    pub fn new(
        http: reqwest::Client,
        api_base: &str,
        api_key: Option<String>,
        model: &str,
    ) -> Result<Self, ProviderError> {
        let base = if api_base.ends_with('/') {
            api_base.to_string()
        } else {
            format!("{api_base}/")
        };
        let api_base = Url::parse(&base)
            .map_err(|e| ProviderError::Decode(format!("invalid Google API base URL {base}: {e}")))?;

        let model = model.strip_prefix("models/").unwrap_or(model).to_string();

        Ok(Self {
            http,
            api_key,
            api_base,
            model,
        })
    }

    fn build_url(&self, stream: bool) -> Result<Url, ProviderError> {
        // Docs: https://ai.google.dev/api/rest/v1beta/models/streamGenerateContent
        let method = if stream {
            "streamGenerateContent"
        } else {
            "generateContent"
        };
        let mut url = self
            .api_base
            .join(&format!("v1beta/models/{}:{method}", self.model))
            .map_err(|e| ProviderError::Decode(format!("invalid model name {}: {e}", self.model)))?;

        if let Some(key) = &self.api_key {
            url.query_pairs_mut().append_pair("key", key);
        }
        if stream {
            url.query_pairs_mut().append_pair("alt", "sse");
        }
        Ok(url)
    }

    async fn send(&self, payload: String, stream: bool) -> Result<reqwest::Response, ProviderError> {
        let url = self.build_url(stream)?;
        let body = GenerateContentRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part { text: Some(payload) }],
            }],
        };

        tracing::debug!(model = %self.model, stream, "sending generateContent");
        let resp = self
            .http
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(ProviderError::from_transport)?;
        check_status(resp, &self.model).await
    }
}

impl Provider for GoogleProvider {
    fn name(&self) -> &'static str {
        "google"
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Google
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn complete(&self, payload: String) -> ProviderFuture<String> {
        let this = self.clone();
        Box::pin(async move {
            let resp = this.send(payload, false).await?;
            let bytes = resp.bytes().await.map_err(ProviderError::from_transport)?;
            let parsed: GenerateContentResponse = serde_json::from_slice(&bytes)
                .map_err(|e| ProviderError::Decode(format!("generateContent JSON: {e}")))?;
            extract_text(&parsed).ok_or_else(|| {
                ProviderError::Decode("response has no text (empty or blocked candidate)".to_string())
            })
        })
    }

    fn stream(&self, payload: String) -> ProviderFuture<FragmentStream> {
        let this = self.clone();
        Box::pin(async move {
            let resp = this.send(payload, true).await?;
            Ok(spawn_fragment_stream(resp, decode_event))
        })
    }
}

fn decode_event(data: &str) -> Result<Decoded, ProviderError> {
    let parsed: GenerateContentResponse = serde_json::from_str(data)
        .map_err(|e| ProviderError::Decode(format!("failed to parse SSE JSON: {e}")))?;
    Ok(match extract_text(&parsed) {
        Some(text) => Decoded::Fragment(text),
        None => Decoded::Skip,
    })
}

#[derive(Debug, Clone, Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

fn extract_text(r: &GenerateContentResponse) -> Option<String> {
    // Concatenate all text parts of the first candidate.
    let cand = r.candidates.first()?;
    let content = cand.content.as_ref()?;
    let mut out = String::new();
    for p in &content.parts {
        if let Some(t) = &p.text {
            out.push_str(t);
        }
    }
    if out.is_empty() { None } else { Some(out) }
}
