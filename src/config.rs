use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

#[derive(Parser, Debug)]
#[command(author, version, about = "Kidney CT scan classifier: HTTP service and CLI")]
#[command(args_conflicts_with_subcommands = true)]
pub struct Cli {
    #[command(flatten)]
    pub model: ModelArgs,

    /// Serve settings used when no subcommand is given
    #[command(flatten)]
    pub serve: ServeArgs,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Args, Debug, Clone)]
pub struct ModelArgs {
    /// Path to the ONNX model artifact
    #[arg(long = "model", env = "MODEL_PATH", default_value = "Kidney.onnx", global = true)]
    pub model_path: PathBuf,

    /// Path to the JSON label map (index -> class name)
    #[arg(long = "labels", env = "LABELS_PATH", default_value = "labels.json", global = true)]
    pub labels_path: PathBuf,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the HTTP service (default)
    Serve(ServeArgs),

    /// Classify image files or directories of images
    Predict(PredictArgs),

    /// Load the model and print its summary
    Info,
}

#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    #[arg(long, env = "PORT", default_value_t = 5000)]
    pub port: u16,

    /// Largest accepted request body, in bytes
    #[arg(long, env = "MAX_UPLOAD_BYTES", default_value_t = DEFAULT_MAX_UPLOAD_BYTES)]
    pub max_upload_bytes: usize,

    /// Defer loading the model until the first request
    #[arg(long)]
    pub lazy: bool,
}

#[derive(Args, Debug, Clone)]
pub struct PredictArgs {
    /// Image files, or directories containing .jpg/.jpeg/.png files
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// Print results as JSON instead of a report
    #[arg(long)]
    pub json: bool,
}
