//! Generation dispatch.
//!
//! Routes a [`GenerationRequest`] to the backend it names and returns either
//! the whole response or a fragment stream. The dispatcher keeps no state
//! between calls; a client handle is built for every request and dropped
//! with it.

use crate::model::resolve_model;
use crate::provider::{ClientFactory, FragmentStream, GenerationRequest, ProviderError, ProviderKind};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;

pub const OLLAMA_MODEL_NOT_FOUND: &str =
    "Error: Ollama model not found. Use command `ollama list` to see available models in your system.";

/// Receives user-facing diagnostics emitted while dispatching.
pub type DiagnosticSink = Arc<dyn Fn(&str) + Send + Sync>;

pub struct Dispatcher {
    factory: ClientFactory,
    diagnostics: DiagnosticSink,
}

impl Dispatcher {
    /// Dispatcher printing diagnostics to stderr.
    pub fn new(factory: ClientFactory) -> Self {
        Self {
            factory,
            diagnostics: Arc::new(|msg: &str| eprintln!("{msg}")),
        }
    }

    pub fn with_diagnostics(mut self, sink: DiagnosticSink) -> Self {
        self.diagnostics = sink;
        self
    }

    /// One-shot completion.
    pub async fn complete(&self, req: &GenerationRequest) -> Result<String, ProviderError> {
        let model = resolve_model(req.provider, &req.model);
        let client = self.factory.build(req.provider, &model)?;

        tracing::debug!(provider = client.name(), model = client.model(), "dispatching completion");
        client.complete(req.payload.clone()).await
    }

    /// Streaming completion.
    ///
    /// For the local provider a missing model is reported through the
    /// diagnostic sink and the stream simply ends; every other error is
    /// returned as is.
    pub async fn stream(&self, req: &GenerationRequest) -> Result<FragmentStream, ProviderError> {
        let model = resolve_model(req.provider, &req.model);
        let client = self.factory.build(req.provider, &model)?;

        tracing::debug!(provider = client.name(), model = client.model(), "dispatching stream");
        let started = client.stream(req.payload.clone()).await;

        if req.provider != ProviderKind::Ollama {
            return started;
        }

        match started {
            Ok(stream) => Ok(self.guard_local_stream(stream)),
            Err(e) if e.is_model_not_found() => {
                self.report_model_not_found(&e);
                let empty: FragmentStream = Box::pin(tokio_stream::empty());
                Ok(empty)
            }
            Err(e) => Err(e),
        }
    }

    /// Forward `inner`, ending it quietly on a mid-stream model-not-found.
    fn guard_local_stream(&self, mut inner: FragmentStream) -> FragmentStream {
        let (tx, rx) = mpsc::channel::<Result<String, ProviderError>>(64);
        let diagnostics = self.diagnostics.clone();

        tokio::spawn(async move {
            while let Some(item) = inner.next().await {
                match item {
                    Err(e) if e.is_model_not_found() => {
                        tracing::warn!(error = %e, "local model not found");
                        diagnostics(OLLAMA_MODEL_NOT_FOUND);
                        return;
                    }
                    item => {
                        if tx.send(item).await.is_err() {
                            return;
                        }
                    }
                }
            }
        });

        Box::pin(ReceiverStream::new(rx))
    }

    fn report_model_not_found(&self, e: &ProviderError) {
        tracing::warn!(error = %e, "local model not found");
        (self.diagnostics)(OLLAMA_MODEL_NOT_FOUND);
    }
}
