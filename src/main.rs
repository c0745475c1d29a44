use clap::Parser;
use promptml_cli::{app, cli, config, paths};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so `--raw` output stays pipeable.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = cli::Args::parse();

    let config_path = paths::config_path()?;
    let cfg = config::Config::load_optional(&config_path)?;
    tracing::debug!(?config_path, ?cfg, "resolved config");

    app::run(args, cfg).await
}
