use super::ProviderError;
use futures_core::stream::BoxStream;
use std::fmt;
use std::str::FromStr;

/// Lazily produced response fragments; concatenated in order they form the
/// full response text.
pub type FragmentStream = BoxStream<'static, Result<String, ProviderError>>;

/// Boxed future returned by [`Provider`](super::Provider) methods.
pub type ProviderFuture<T> =
    std::pin::Pin<Box<dyn std::future::Future<Output = Result<T, ProviderError>> + Send>>;

/// The closed set of supported backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    /// Remote OpenAI chat completions API.
    OpenAi,
    /// Google Generative Language API.
    Google,
    /// Local Ollama server through its OpenAI-compatible endpoint.
    Ollama,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 3] = [ProviderKind::OpenAi, ProviderKind::Google, ProviderKind::Ollama];

    pub fn as_str(self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Google => "google",
            ProviderKind::Ollama => "ollama",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(ProviderKind::OpenAi),
            "google" => Ok(ProviderKind::Google),
            "ollama" => Ok(ProviderKind::Ollama),
            _ => Err(ProviderError::UnsupportedProvider(s.to_string())),
        }
    }
}

/// One generation call: which backend, which model, and the already
/// serialized prompt payload.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub provider: ProviderKind,
    pub model: String,
    pub payload: String,
}
