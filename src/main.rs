use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};

use gcs_image_uploader::config::{self, UploaderConfig};
use gcs_image_uploader::image_processor;
use gcs_image_uploader::node::{NodeInputs, NodeRegistry, STORAGE_GCP_NODE_ID};
use gcs_image_uploader::storage::{GcsConnector, LocalConnector, StorageConnector};
use gcs_image_uploader::uploader::{UiPayload, UploadRequest, Uploader};

#[derive(Parser, Debug)]
#[command(name = "gcs-image-uploader", version, about)]
struct Cli {
    /// Configuration file (defaults to the per-user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upload a local file, or render images to PNG and upload them
    Upload(UploadArgs),
    /// List registered nodes and their input schema as JSON
    Nodes,
    /// Run a registered node with host-style JSON inputs
    Execute {
        #[arg(long, default_value = STORAGE_GCP_NODE_ID)]
        node: String,
        /// JSON file holding the node inputs
        #[arg(long)]
        inputs: PathBuf,
        /// Store into this directory instead of Cloud Storage
        #[arg(long)]
        local_root: Option<PathBuf>,
    },
    /// Print the effective configuration
    Config {
        /// Write the defaults to the config file
        #[arg(long)]
        init: bool,
    },
}

#[derive(Args, Debug)]
struct UploadArgs {
    #[arg(long)]
    bucket: String,
    /// Object key prefix; the key is "{prefix}/{filename}"
    #[arg(long)]
    folder_prefix: Option<String>,
    /// Service-account JSON key; empty uses application default credentials
    #[arg(long, default_value = "")]
    credentials: String,
    /// File name prefix for rendered frames
    #[arg(long, default_value = "file")]
    file_name: String,
    /// Existing file to upload as-is
    #[arg(long)]
    local_file: Option<String>,
    /// Image files to render as a batch
    #[arg(long = "image")]
    images: Vec<PathBuf>,
    #[arg(long)]
    output_dir: Option<PathBuf>,
    /// Upload every rendered frame instead of only the first
    #[arg(long)]
    all_frames: bool,
    /// Store into this directory instead of Cloud Storage
    #[arg(long)]
    local_root: Option<PathBuf>,
}

fn connector_for(local_root: Option<PathBuf>) -> Arc<dyn StorageConnector> {
    match local_root {
        Some(root) => Arc::new(LocalConnector::new(root).create_buckets(true)),
        None => Arc::new(GcsConnector::new()),
    }
}

fn print_payload(payload: &UiPayload) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(payload)?);
    Ok(())
}

async fn upload(mut config: UploaderConfig, args: UploadArgs) -> anyhow::Result<()> {
    if let Some(dir) = args.output_dir {
        config.output_directory = Some(dir);
    }
    if args.all_frames {
        config.upload_all_frames = true;
    }

    let images = args
        .images
        .iter()
        .map(|path| image_processor::load_frame(path))
        .collect::<Result<Vec<_>, _>>()
        .context("Failed to load input images")?;

    let request = UploadRequest {
        file_name_prefix: args.file_name,
        bucket_name: args.bucket,
        bucket_folder_prefix: args
            .folder_prefix
            .unwrap_or_else(|| config.default_folder_prefix.clone()),
        credentials_path: args.credentials,
        local_file_path: args.local_file,
        images: Some(images),
    };

    let uploader = Uploader::from_config(&config, connector_for(args.local_root))?;
    let result = uploader.run(&request).await?;
    print_payload(&result.into())
}

async fn execute(
    config: UploaderConfig,
    node: &str,
    inputs: PathBuf,
    local_root: Option<PathBuf>,
) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(&inputs)
        .with_context(|| format!("Failed to read {}", inputs.display()))?;
    let inputs: NodeInputs = serde_json::from_str(&raw).context("Invalid node inputs")?;

    let node = NodeRegistry::with_defaults().create(node, &config, connector_for(local_root))?;
    let payload = node.execute(inputs).await?;
    print_payload(&payload)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let (config, config_error) = match config::load_config(cli.config.as_deref()) {
        Ok(config) => (config, None),
        Err(e) => (UploaderConfig::default(), Some(e)),
    };

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.log_level.as_str()),
    )
    .init();

    // `config --init` must work even when the target file does not exist yet
    let writing_defaults = matches!(cli.command, Command::Config { init: true });
    if let Some(e) = config_error.filter(|_| !writing_defaults) {
        log::error!("Failed to load configuration: {}", e);
        return Err(e.into());
    }

    log::debug!("Starting GCS Image Uploader");

    match cli.command {
        Command::Upload(args) => upload(config, args).await,
        Command::Nodes => {
            let nodes = NodeRegistry::with_defaults().describe();
            println!("{}", serde_json::to_string_pretty(&nodes)?);
            Ok(())
        }
        Command::Execute {
            node,
            inputs,
            local_root,
        } => execute(config, &node, inputs, local_root).await,
        Command::Config { init } => {
            if init {
                let path = config::save_config(&UploaderConfig::default(), cli.config.as_deref())?;
                println!("Wrote default configuration to {}", path.display());
            } else {
                println!("{}", serde_json::to_string_pretty(&config)?);
            }
            Ok(())
        }
    }
}
