//! Axon OCR server and batch CLI.
//!
//! # Usage
//!
//! ## Server mode
//! ```bash
//! axon-ocr-server serve --model-dir models --port 8080
//! ```
//!
//! ## Batch mode
//! ```bash
//! axon-ocr-server batch 3 --images-dir images --model-dir models --output-dir results
//! ```

mod batch;
mod config;
mod coordinator;
mod errors;
mod files;
mod ocr;
mod pdf;
mod server;

use clap::{Parser, Subcommand};
use config::{ModelFamily, OcrConfig, ServerConfig};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "axon-ocr-server")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "OCR processing via HTTP server or batch CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Root directory with model families and the dictionary
        #[arg(long = "model-dir", env = "AXON_MODEL_DIR")]
        model_dir: PathBuf,

        /// Model family to load
        #[arg(long = "model", value_enum, default_value_t = ModelFamily::Server)]
        model: ModelFamily,

        /// Character dictionary path (default: <model-dir>/ppocrv5_dict.txt)
        #[arg(long = "dict-path", env = "AXON_DICT_PATH")]
        dict_path: Option<PathBuf>,

        /// Host to bind to
        #[arg(long, default_value = "0.0.0.0", env = "AXON_HOST")]
        host: String,

        /// Port to listen on
        #[arg(long, short, default_value = "8080", env = "AXON_PORT")]
        port: u16,

        /// Visualization output directory
        #[arg(long = "vis-dir", default_value = "output/vis")]
        vis_dir: PathBuf,

        /// Disable SSL certificate verification for URL downloads
        #[arg(long = "no-verify-ssl")]
        no_verify_ssl: bool,
    },
    /// Process a directory of images repeatedly and report timings
    Batch {
        /// Runs per image
        #[arg(default_value = "3")]
        runs: usize,

        /// Directory of input images
        #[arg(long = "images-dir", default_value = "images")]
        images_dir: PathBuf,

        /// Root directory with model families and the dictionary
        #[arg(long = "model-dir", env = "AXON_MODEL_DIR")]
        model_dir: PathBuf,

        /// Model family to load
        #[arg(long = "model", value_enum, default_value_t = ModelFamily::Server)]
        model: ModelFamily,

        /// Character dictionary path (default: <model-dir>/ppocrv5_dict.txt)
        #[arg(long = "dict-path")]
        dict_path: Option<PathBuf>,

        /// Enable document unwarping during the run
        #[arg(long)]
        uvdoc: bool,

        /// Output directory for JSON results and visualizations
        #[arg(long = "output-dir", default_value = "benchmark/results")]
        output_dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    axon_ocr::utils::init_tracing();

    let cli = Cli::parse();
    match cli.command {
        Commands::Serve {
            model_dir,
            model,
            dict_path,
            host,
            port,
            vis_dir,
            no_verify_ssl,
        } => {
            let config = ServerConfig {
                ocr: OcrConfig {
                    model_dir,
                    family: model,
                    dict_path,
                    ort: Default::default(),
                },
                host,
                port,
                vis_dir,
                no_verify_ssl,
            };
            info!("starting server on {}:{}", config.host, config.port);
            server::run_server(config).await
        }
        Commands::Batch {
            runs,
            images_dir,
            model_dir,
            model,
            dict_path,
            uvdoc,
            output_dir,
        } => {
            let runs = if runs < 1 { 3 } else { runs };
            let config = OcrConfig {
                model_dir,
                family: model,
                dict_path,
                ort: Default::default(),
            };
            let code = batch::run_batch(&config, &images_dir, &output_dir, runs, uvdoc)?;
            if code != 0 {
                std::process::exit(code);
            }
            Ok(())
        }
    }
}
