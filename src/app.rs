use crate::cli::Args;
use crate::config::Config;
use crate::dispatch::Dispatcher;
use crate::document::{PromptDocument, Serializer};
use crate::model::DEFAULT_MODEL;
use crate::provider::{
    ClientFactory, FragmentStream, GenerationRequest, ProviderError, ProviderKind,
};
use crate::render::{self, Renderer};
use anyhow::Context;
use std::io::Write;
use std::sync::Arc;
use std::time::Instant;
use tokio_stream::StreamExt;

/// Effective options after merging CLI flags, config and defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub provider: ProviderKind,
    pub model: String,
    pub serializer: Serializer,
}

pub fn resolve_settings(args: &Args, cfg: Option<&Config>) -> anyhow::Result<Settings> {
    let provider = match args.provider {
        Some(p) => p,
        None => match cfg.and_then(|c| c.provider.as_deref()) {
            Some(name) => name.parse::<ProviderKind>().context("invalid provider in config")?,
            None => ProviderKind::OpenAi,
        },
    };

    let model = args
        .model
        .clone()
        .or_else(|| cfg.and_then(|c| c.model.clone()))
        .unwrap_or_else(|| DEFAULT_MODEL.to_string());

    let serializer = match args.serializer {
        Some(s) => s,
        None => match cfg.and_then(|c| c.serializer.as_deref()) {
            Some(name) => name.parse::<Serializer>().context("invalid serializer in config")?,
            None => Serializer::Xml,
        },
    };

    Ok(Settings {
        provider,
        model,
        serializer,
    })
}

/// Render the prompt file, send it, and print the response.
pub async fn run(args: Args, cfg: Option<Config>) -> anyhow::Result<()> {
    let settings = resolve_settings(&args, cfg.as_ref())?;
    tracing::debug!(?settings, "resolved settings");

    let doc = PromptDocument::from_file(&args.file)?;
    let payload = doc.serialize(settings.serializer)?;

    let req = GenerationRequest {
        provider: settings.provider,
        model: settings.model,
        payload,
    };

    let dispatcher = Dispatcher::new(ClientFactory::from_config(cfg.as_ref()))
        .with_diagnostics(Arc::new(render::print_diagnostic));
    let mut renderer = Renderer::stdout(args.raw);

    let now = Instant::now();
    let outcome = if args.stream {
        stream_response(&dispatcher, &req, &mut renderer).await
    } else {
        sync_response(&dispatcher, &req, &mut renderer).await
    };

    if let Err(e) = outcome {
        let is_connection = e
            .downcast_ref::<ProviderError>()
            .is_some_and(ProviderError::is_connection);
        if is_connection {
            tracing::debug!(error = ?e, "connection failure");
            render::print_diagnostic(render::CONNECTION_ERROR);
            return Ok(());
        }
        return Err(e);
    }

    renderer.elapsed(now.elapsed())?;
    Ok(())
}

async fn sync_response<W: Write>(
    dispatcher: &Dispatcher,
    req: &GenerationRequest,
    renderer: &mut Renderer<W>,
) -> anyhow::Result<()> {
    let text = dispatcher.complete(req).await?;
    renderer.response(&text)?;
    Ok(())
}

async fn stream_response<W: Write>(
    dispatcher: &Dispatcher,
    req: &GenerationRequest,
    renderer: &mut Renderer<W>,
) -> anyhow::Result<()> {
    let mut stream = dispatcher.stream(req).await?;

    renderer.begin_stream()?;
    let forwarded = forward(&mut stream, renderer).await;
    // The panel is closed before any error reaches the diagnostic printer.
    renderer.end_stream()?;
    forwarded
}

async fn forward<W: Write>(
    stream: &mut FragmentStream,
    renderer: &mut Renderer<W>,
) -> anyhow::Result<()> {
    while let Some(item) = stream.next().await {
        let fragment = item?;
        renderer.fragment(&fragment)?;
    }
    Ok(())
}
