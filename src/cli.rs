use crate::document::Serializer;
use crate::provider::ProviderKind;
use clap::Parser;
use std::path::PathBuf;

/// Run PromptML files against popular generative AI providers
#[derive(Debug, Parser)]
#[command(name = "promptml")]
#[command(version)]
#[command(
    about = "A Command Line Interface (CLI) tool to run Prompt Markup Language (PromptML) files with popular Generative AI models",
    after_help = "For more details of composing PromptML files, visit: https://promptml.org/"
)]
pub struct Args {
    /// Path to the PromptML (.pml) file
    #[arg(short = 'f', long = "file", value_name = "FILE")]
    pub file: PathBuf,

    /// Model to use for the completion (default: config/model or "gpt-4o")
    #[arg(short = 'm', long = "model")]
    pub model: Option<String>,

    /// Serializer for the prompt payload (default: config/serializer or "xml")
    #[arg(short = 's', long = "serializer", value_enum)]
    pub serializer: Option<Serializer>,

    /// GenAI provider: openai, google or ollama (default: config/provider or "openai")
    #[arg(short = 'p', long = "provider")]
    pub provider: Option<ProviderKind>,

    /// Stream chunks of the response as they arrive
    #[arg(long = "stream")]
    pub stream: bool,

    /// Print the raw response (best for saving into files or piping)
    #[arg(long = "raw")]
    pub raw: bool,
}
