mod error;
pub mod factory;
#[cfg(feature = "google")]
pub mod google;
pub mod openai;
mod sse;
mod types;

pub use error::ProviderError;
pub use factory::{ClientFactory, Endpoints};
pub use types::{FragmentStream, GenerationRequest, ProviderFuture, ProviderKind};

/// Provider interface.
///
/// A handle is built per request with its model already bound, so both
/// operations only take the serialized payload.
pub trait Provider {
    fn name(&self) -> &'static str;

    fn kind(&self) -> ProviderKind;

    /// Model the handle was built for.
    fn model(&self) -> &str;

    /// One-shot completion.
    fn complete(&self, payload: String) -> ProviderFuture<String>;

    /// Start streaming a response.
    fn stream(&self, payload: String) -> ProviderFuture<FragmentStream>;
}
