//! Provider credentials.
//!
//! Presence is not checked here: a missing key is sent as no key and the
//! backend's authentication error is what the user sees.

use crate::config::Config;
use crate::provider::ProviderKind;

pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";
pub const GOOGLE_API_KEY_ENV: &str = "GOOGLE_API_KEY";

/// Ollama ignores the key, but the OpenAI wire protocol expects one.
pub const OLLAMA_PLACEHOLDER_KEY: &str = "ollama";

/// Resolve the credential for `kind` from the process environment, falling
/// back to the config file.
pub fn resolve(kind: ProviderKind, cfg: Option<&Config>) -> Option<String> {
    resolve_with(kind, cfg, |name| std::env::var(name).ok())
}

/// Same as [`resolve`] with an explicit environment lookup.
pub fn resolve_with(
    kind: ProviderKind,
    cfg: Option<&Config>,
    env: impl Fn(&str) -> Option<String>,
) -> Option<String> {
    match kind {
        ProviderKind::OpenAi => env(OPENAI_API_KEY_ENV)
            .filter(|k| !k.is_empty())
            .or_else(|| cfg.and_then(|c| c.openai.api_key.clone())),
        ProviderKind::Google => env(GOOGLE_API_KEY_ENV)
            .filter(|k| !k.is_empty())
            .or_else(|| cfg.and_then(|c| c.google.api_key.clone())),
        ProviderKind::Ollama => Some(OLLAMA_PLACEHOLDER_KEY.to_string()),
    }
}
