//! mathscrap server and CLI
//!
//! Recognizes photographed math expressions and validates them, either for
//! local files or over HTTP.
//!
//! # Usage
//!
//! ## CLI Mode
//! ```bash
//! mathscrap-server process --file quadratic.png --file integral.jpg --output json
//! mathscrap-server process --file scan.png --formula-model models/formula.onnx --formula-tokenizer models/tokenizer.json
//! ```
//!
//! ## Server Mode
//! ```bash
//! mathscrap-server serve --port 8080 --config pipeline.json
//! ```

mod cli;
mod config;
mod server;

use clap::{Parser, Subcommand};
use config::PipelineArgs;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "mathscrap-server")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Math expression recognition and validation via CLI or HTTP server", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process local images as one job
    Process {
        /// Image file to process (repeatable)
        #[arg(long = "file", required = true)]
        files: Vec<PathBuf>,

        /// Free-text context passed through to the result
        #[arg(long)]
        context: Option<String>,

        /// Output format (json, pretty)
        #[arg(long, default_value = "pretty")]
        output: String,

        #[command(flatten)]
        pipeline: PipelineArgs,
    },
    /// Start the HTTP server
    Serve {
        /// Port to listen on
        #[arg(long, short, default_value = "8080", env = "MATHSCRAP_PORT")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "0.0.0.0", env = "MATHSCRAP_HOST")]
        host: String,

        #[command(flatten)]
        pipeline: PipelineArgs,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    mathscrap::utils::init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Process {
            files,
            context,
            output,
            pipeline,
        } => {
            let config = pipeline.pipeline_config()?;
            info!("Processing {} file(s)", files.len());
            cli::process_files(files, context, config, &output).await?;
        }
        Commands::Serve {
            port,
            host,
            pipeline,
        } => {
            let config = server::ServerConfig {
                pipeline: pipeline.pipeline_config()?,
                host,
                port,
            };

            info!("Starting server on {}:{}", config.host, config.port);
            server::run_server(config).await?;
        }
    }

    Ok(())
}
