use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use gallery_media::cdn::DeliveryOptions;
use gallery_media::models::{AssetRef, Backend, Category, Config, UploadFile, UploadOptions};
use gallery_media::MediaGateway;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "gallery-media")]
#[command(about = "Manage gallery media assets on the CDN and the local store")]
struct CliArgs {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Upload an image file.
    Upload {
        path: PathBuf,
        #[arg(long, default_value = "gallery")]
        category: String,
        #[arg(long)]
        owner: Option<String>,
    },
    /// Delete an asset by URL, local id, or CDN public id.
    Delete {
        #[arg(value_name = "ASSET", value_parser = parse_asset_ref)]
        asset: AssetRef,
    },
    /// Print the delivery URL of an asset, optionally transformed.
    Url {
        #[arg(value_name = "ASSET", value_parser = parse_asset_ref)]
        asset: AssetRef,
        #[arg(long)]
        width: Option<u32>,
        #[arg(long)]
        height: Option<u32>,
        #[arg(long)]
        crop: Option<String>,
    },
    /// Copy a locally stored file to the CDN.
    Migrate {
        id: i64,
        #[arg(long)]
        category: Option<String>,
    },
}

/// Digits are local ids, absolute or rooted paths are URLs, anything else is a CDN public id.
fn parse_asset_ref(input: &str) -> std::result::Result<AssetRef, String> {
    let input = input.trim();
    if input.is_empty() {
        return Err("Asset reference must not be empty".to_string());
    }
    if input.chars().all(|c| c.is_ascii_digit()) {
        return Ok(AssetRef::Stored {
            identifier: input.to_string(),
            backend: Backend::Local,
        });
    }
    if input.contains("://") || input.starts_with('/') {
        return Ok(AssetRef::Url(input.to_string()));
    }
    Ok(AssetRef::Stored {
        identifier: input.to_string(),
        backend: Backend::Remote,
    })
}

fn mime_type_for(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());
    match extension.as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        Some("avif") => "image/avif",
        Some("svg") => "image/svg+xml",
        _ => "application/octet-stream",
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run(gateway: MediaGateway, command: Command) -> Result<()> {
    match command {
        Command::Upload {
            path,
            category,
            owner,
        } => {
            let data = tokio::fs::read(&path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let name = path
                .file_name()
                .and_then(|name| name.to_str())
                .unwrap_or("upload");
            let file = UploadFile::new(data, mime_type_for(&path), name);
            let options = UploadOptions {
                category: Category::resolve(&category),
                owner_id: owner,
                ..UploadOptions::default()
            };
            let asset = gateway.upload(file, &options).await?;
            print_json(&asset)
        }
        Command::Delete { asset } => {
            let outcome = gateway.delete_asset(&asset).await?;
            print_json(&outcome)
        }
        Command::Url {
            asset,
            width,
            height,
            crop,
        } => {
            let url = if width.is_none() && height.is_none() && crop.is_none() {
                gateway.delivery_url(&asset).await?
            } else {
                let options = DeliveryOptions {
                    width,
                    height,
                    crop,
                    ..DeliveryOptions::default()
                };
                gateway.optimized_url(&asset, &options).await?
            };
            println!("{}", url);
            Ok(())
        }
        Command::Migrate { id, category } => {
            let asset = gateway
                .migrate(id, category.as_deref().map(Category::resolve))
                .await?;
            print_json(&asset)
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gallery_media=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = CliArgs::parse();

    let gateway = match Config::from_env() {
        Ok(config) => match MediaGateway::from_config(&config).await {
            Ok(gateway) => gateway,
            Err(e) => {
                error!("Failed to initialize gateway: {}", e);
                std::process::exit(1);
            }
        },
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };
    info!(
        "Preferred backend: {}",
        gateway.selection().preferred()
    );

    match run(gateway, args.command).await {
        Ok(()) => Ok(()),
        Err(e) => {
            error!("Command failed: {:#}", e);
            std::process::exit(1);
        }
    }
}
