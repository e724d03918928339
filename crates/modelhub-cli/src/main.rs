//! Model Hub CLI - command-line client for the gateway API
//!
//! Examples:
//!   modelhub health                          # Check the gateway
//!   modelhub models list                     # List registered models
//!   modelhub generate "Tell me a story"      # Text generation
//!   modelhub vision pipeline photo.jpg       # Detection + description

use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};

/// Local model hub gateway client
#[derive(Parser)]
#[command(
    name = "modelhub",
    about = "Client for the local model hub gateway",
    version = env!("CARGO_PKG_VERSION"),
    arg_required_else_help = true,
    propagate_version = true,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Gateway URL
    #[arg(
        long,
        global = true,
        value_name = "URL",
        default_value = "http://127.0.0.1:8080",
        env = "MODELHUB_URL"
    )]
    server: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Check gateway health and loaded models
    Health,

    /// Show gateway runtime information
    Info,

    /// Hub registry operations
    Models {
        #[command(subcommand)]
        command: ModelsCommands,
    },

    /// Generate text from a prompt
    Generate {
        /// Prompt text
        prompt: String,

        /// Model identifier
        #[arg(short, long, default_value = "tinyllama-1b-q4")]
        model: String,

        /// Maximum tokens to generate
        #[arg(long, default_value = "150")]
        max_tokens: u32,

        /// Sampling temperature
        #[arg(long, default_value = "0.7")]
        temperature: f32,

        /// Nucleus sampling threshold
        #[arg(long, default_value = "0.9")]
        top_p: f32,
    },

    /// Vision operations
    Vision {
        #[command(subcommand)]
        command: VisionCommands,
    },
}

#[derive(Subcommand)]
enum ModelsCommands {
    /// List registered model cards
    List,

    /// Show one model card
    Get {
        /// Model card id
        id: String,
    },

    /// Register a model card from a JSON file
    Register {
        /// Path to the model card JSON
        card: PathBuf,
    },
}

#[derive(Subcommand)]
enum VisionCommands {
    /// Load a vision model ahead of time
    Preload {
        /// Model identifier
        #[arg(short, long, default_value = "llava-v1.6-7b-q4")]
        model: String,
    },

    /// Describe an image with the vision model
    Analyze {
        /// Image file
        image: PathBuf,

        /// Prompt sent with the image
        #[arg(short, long, default_value = "What's in this image?")]
        prompt: String,

        /// Model identifier
        #[arg(short, long, default_value = "llava-v1.6-7b-q4")]
        model: String,

        /// Maximum tokens to generate
        #[arg(long, default_value = "150")]
        max_tokens: u32,
    },

    /// Run the detection + description pipeline on an image
    Pipeline {
        /// Image file
        image: PathBuf,

        /// Prompt sent with the image
        #[arg(short, long, default_value = "What's in this image?")]
        prompt: String,

        /// Model identifier
        #[arg(short, long, default_value = "llava-v1.6-7b-q4")]
        model: String,

        /// Maximum tokens to generate
        #[arg(long, default_value = "150")]
        max_tokens: u32,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.server.trim_end_matches('/').to_string();

    match cli.command {
        Commands::Health => {
            let body = get_json(&client, &format!("{base}/api/v1/health")).await?;
            print_json(&body);
        }
        Commands::Info => {
            let body = get_json(&client, &format!("{base}/api/v1/info")).await?;
            print_json(&body);
        }
        Commands::Models { command } => match command {
            ModelsCommands::List => {
                let body = get_json(&client, &format!("{base}/api/v1/hub/models")).await?;
                print_json(&body);
            }
            ModelsCommands::Get { id } => {
                let body = get_json(&client, &format!("{base}/api/v1/hub/models/{id}")).await?;
                print_json(&body);
            }
            ModelsCommands::Register { card } => {
                let raw = tokio::fs::read_to_string(&card)
                    .await
                    .with_context(|| format!("Cannot read {}", card.display()))?;
                let card: serde_json::Value = serde_json::from_str(&raw)
                    .context("Model card file is not valid JSON")?;

                let response = client
                    .post(format!("{base}/api/v1/hub/models"))
                    .json(&card)
                    .send()
                    .await?;
                let body = into_json(response).await?;
                print_json(&body);
            }
        },
        Commands::Generate {
            prompt,
            model,
            max_tokens,
            temperature,
            top_p,
        } => {
            let response = client
                .post(format!("{base}/api/v1/generate"))
                .json(&serde_json::json!({
                    "model": model,
                    "prompt": prompt,
                    "max_tokens": max_tokens,
                    "temperature": temperature,
                    "top_p": top_p,
                }))
                .send()
                .await?;
            let body = into_json(response).await?;
            print_json(&body);
        }
        Commands::Vision { command } => match command {
            VisionCommands::Preload { model } => {
                let response = client
                    .post(format!("{base}/api/v1/vision/preload"))
                    .json(&serde_json::json!({ "model": model }))
                    .send()
                    .await?;
                let body = into_json(response).await?;
                print_json(&body);
            }
            VisionCommands::Analyze {
                image,
                prompt,
                model,
                max_tokens,
            } => {
                let form = vision_form(&image, &prompt, &model, max_tokens).await?;
                let response = client
                    .post(format!("{base}/api/v1/vision/analyze"))
                    .multipart(form)
                    .send()
                    .await?;
                let body = into_json(response).await?;
                print_json(&body);
            }
            VisionCommands::Pipeline {
                image,
                prompt,
                model,
                max_tokens,
            } => {
                let form = vision_form(&image, &prompt, &model, max_tokens).await?;
                let response = client
                    .post(format!("{base}/api/v1/vision/pipeline"))
                    .multipart(form)
                    .send()
                    .await?;
                let body = into_json(response).await?;
                print_json(&body);
            }
        },
    }

    Ok(())
}

async fn vision_form(
    image: &PathBuf,
    prompt: &str,
    model: &str,
    max_tokens: u32,
) -> anyhow::Result<reqwest::multipart::Form> {
    let bytes = tokio::fs::read(image)
        .await
        .with_context(|| format!("Cannot read {}", image.display()))?;
    let filename = image
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());

    Ok(reqwest::multipart::Form::new()
        .part(
            "image",
            reqwest::multipart::Part::bytes(bytes).file_name(filename),
        )
        .text("prompt", prompt.to_string())
        .text("model", model.to_string())
        .text("max_tokens", max_tokens.to_string()))
}

async fn get_json(client: &reqwest::Client, url: &str) -> anyhow::Result<serde_json::Value> {
    let response = client.get(url).send().await?;
    into_json(response).await
}

async fn into_json(response: reqwest::Response) -> anyhow::Result<serde_json::Value> {
    let status = response.status();
    let body: serde_json::Value = response
        .json()
        .await
        .context("Gateway returned a non-JSON response")?;

    if !status.is_success() {
        bail!("Gateway error ({status}): {body}");
    }
    Ok(body)
}

fn print_json(value: &serde_json::Value) {
    match serde_json::to_string_pretty(value) {
        Ok(pretty) => println!("{pretty}"),
        Err(_) => println!("{value}"),
    }
}
