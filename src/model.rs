use crate::provider::ProviderKind;

/// Model used when neither the CLI nor the config names one.
pub const DEFAULT_MODEL: &str = "gpt-4o";

/// Google's stand-in for [`DEFAULT_MODEL`].
pub const GOOGLE_DEFAULT_MODEL: &str = "gemini-1.5-flash-latest";

/// Map the requested model to one the provider understands.
///
/// Only the universal default is aliased (for Google); every other name,
/// valid or not, passes through untouched.
pub fn resolve_model(provider: ProviderKind, requested: &str) -> String {
    match provider {
        ProviderKind::Google if requested == DEFAULT_MODEL => GOOGLE_DEFAULT_MODEL.to_string(),
        _ => requested.to_string(),
    }
}
