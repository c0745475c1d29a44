use super::openai::OpenAiCompatible;
use super::{Provider, ProviderError, ProviderKind};
use crate::config::Config;
use crate::credentials;

pub const OPENAI_API_BASE: &str = "https://api.openai.com/v1";
pub const GOOGLE_API_BASE: &str = "https://generativelanguage.googleapis.com/";
pub const OLLAMA_API_BASE: &str = "http://localhost:11434/v1";

/// Base URLs for every backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub openai: String,
    pub google: String,
    pub ollama: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            openai: OPENAI_API_BASE.to_string(),
            google: GOOGLE_API_BASE.to_string(),
            ollama: OLLAMA_API_BASE.to_string(),
        }
    }
}

impl Endpoints {
    /// Defaults, overridden by any `base_url` set in the config file.
    pub fn from_config(cfg: Option<&Config>) -> Self {
        let mut endpoints = Self::default();
        if let Some(cfg) = cfg {
            if let Some(url) = &cfg.openai.base_url {
                endpoints.openai = url.clone();
            }
            if let Some(url) = &cfg.google.base_url {
                endpoints.google = url.clone();
            }
            if let Some(url) = &cfg.ollama.base_url {
                endpoints.ollama = url.clone();
            }
        }
        endpoints
    }
}

/// Builds a fresh client handle per request.
#[derive(Debug, Clone, Default)]
pub struct ClientFactory {
    endpoints: Endpoints,
    keys: Keys,
}

#[derive(Debug, Clone, Default)]
struct Keys {
    openai: Option<String>,
    google: Option<String>,
}

impl ClientFactory {
    /// Factory resolving credentials from the environment and `cfg`.
    pub fn from_config(cfg: Option<&Config>) -> Self {
        Self {
            endpoints: Endpoints::from_config(cfg),
            keys: Keys {
                openai: credentials::resolve(ProviderKind::OpenAi, cfg),
                google: credentials::resolve(ProviderKind::Google, cfg),
            },
        }
    }

    /// Factory with explicit endpoints and keys.
    pub fn new(endpoints: Endpoints, openai_key: Option<String>, google_key: Option<String>) -> Self {
        Self {
            endpoints,
            keys: Keys {
                openai: openai_key,
                google: google_key,
            },
        }
    }

    /// Build a client for `kind` with `model` bound into it.
    ///
    /// Every backend receives the model here, even though only Google needs
    /// it before the call is made.
    pub fn build(
        &self,
        kind: ProviderKind,
        model: &str,
    ) -> Result<Box<dyn Provider + Send + Sync>, ProviderError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(ProviderError::Http)?;

        tracing::debug!(provider = %kind, model, "building client");

        match kind {
            ProviderKind::OpenAi => Ok(Box::new(OpenAiCompatible::new(
                http,
                kind,
                self.endpoints.openai.clone(),
                self.keys.openai.clone(),
                model,
            ))),
            ProviderKind::Google => {
                #[cfg(feature = "google")]
                {
                    let p = super::google::GoogleProvider::new(
                        http,
                        &self.endpoints.google,
                        self.keys.google.clone(),
                        model,
                    )?;
                    Ok(Box::new(p))
                }
                #[cfg(not(feature = "google"))]
                {
                    let _ = http;
                    Err(ProviderError::UnsupportedProvider(
                        "google (not enabled in this build)".to_string(),
                    ))
                }
            }
            ProviderKind::Ollama => Ok(Box::new(OpenAiCompatible::new(
                http,
                kind,
                self.endpoints.ollama.clone(),
                Some(credentials::OLLAMA_PLACEHOLDER_KEY.to_string()),
                model,
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackendConfig;

    #[test]
    fn every_kind_builds_a_matching_handle() {
        let factory = ClientFactory::new(Endpoints::default(), None, None);
        for kind in ProviderKind::ALL {
            let client = factory.build(kind, "some-model").unwrap();
            assert_eq!(client.kind(), kind);
            assert_eq!(client.name(), kind.as_str());
            assert_eq!(client.model(), "some-model");
        }
    }

    #[test]
    fn ollama_defaults_to_local_endpoint() {
        assert_eq!(Endpoints::default().ollama, "http://localhost:11434/v1");
    }

    #[test]
    fn config_overrides_base_urls() {
        let cfg = Config {
            ollama: BackendConfig {
                api_key: None,
                base_url: Some("http://gpu-box:11434/v1".into()),
            },
            ..Default::default()
        };
        let endpoints = Endpoints::from_config(Some(&cfg));
        assert_eq!(endpoints.ollama, "http://gpu-box:11434/v1");
        assert_eq!(endpoints.openai, OPENAI_API_BASE);
    }
}
