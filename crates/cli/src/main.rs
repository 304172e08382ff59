//! Invocation client for the time-series preprocessor
//!
//! Sends one payload to a serving endpoint and prints the raw response body.

mod client;
mod config;
mod output;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use client::{EndpointClient, InvokeRequest};
use std::path::PathBuf;

const DEFAULT_ENDPOINT_URL: &str = "http://localhost:8080";
const DEFAULT_MEDIA_TYPE: &str = "text/csv";

/// Invoke a time-series preprocessor endpoint
#[derive(Parser)]
#[command(name = "invoke-endpoint")]
#[command(author, version, about = "Invoke a time-series preprocessor endpoint", long_about = None)]
pub struct Cli {
    /// Endpoint base URL (can also be set via INVOKE_ENDPOINT_URL env var)
    #[arg(long, env = "INVOKE_ENDPOINT_URL")]
    pub endpoint_url: Option<String>,

    /// Enable verbose output
    #[arg(long, short)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Send a payload and print the response body
    Invoke {
        /// Endpoint name
        endpoint_name: String,

        /// Inline payload, e.g. "2013-12-02 21:15:00, 75"
        #[arg(conflicts_with = "body_file")]
        payload: Option<String>,

        /// Read the payload from a file
        #[arg(long)]
        body_file: Option<PathBuf>,

        /// Trace ID forwarded as custom attributes
        #[arg(long)]
        custom_attributes: Option<String>,

        /// MIME type of the payload
        #[arg(long)]
        content_type: Option<String>,

        /// Desired MIME type of the response
        #[arg(long)]
        accept: Option<String>,
    },

    /// Check whether the endpoint is ready
    Ping,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = config::Config::load()?;

    let endpoint_url = cli
        .endpoint_url
        .clone()
        .or_else(|| config.endpoint_url.clone())
        .unwrap_or_else(|| DEFAULT_ENDPOINT_URL.to_string());
    let client = EndpointClient::new(&endpoint_url)?;

    match cli.command {
        Commands::Invoke {
            endpoint_name,
            payload,
            body_file,
            custom_attributes,
            content_type,
            accept,
        } => {
            let body = match (payload, body_file) {
                (Some(payload), _) => payload.into_bytes(),
                (None, Some(path)) => std::fs::read(&path)
                    .with_context(|| format!("Failed to read {}", path.display()))?,
                (None, None) => anyhow::bail!("Provide a payload or --body-file"),
            };

            let request = InvokeRequest {
                endpoint_name,
                content_type: content_type
                    .or(config.content_type)
                    .unwrap_or_else(|| DEFAULT_MEDIA_TYPE.to_string()),
                accept: accept
                    .or(config.accept)
                    .unwrap_or_else(|| DEFAULT_MEDIA_TYPE.to_string()),
                custom_attributes,
                body,
            };

            if cli.verbose {
                output::print_info(&format!(
                    "POST {} endpoint={} content-type={} accept={}",
                    endpoint_url, request.endpoint_name, request.content_type, request.accept
                ));
            }

            let response = client.invoke(&request).await?;
            if cli.verbose {
                output::print_info(&output::describe(&response));
            }

            if !response.status.is_success() {
                output::print_error(&format!(
                    "{}: {}",
                    response.status,
                    String::from_utf8_lossy(&response.body)
                ));
                std::process::exit(1);
            }
            output::print_body(&response)?;
        }
        Commands::Ping => {
            if client.ping().await? {
                output::print_success(&format!("{} is ready", endpoint_url));
            } else {
                output::print_error(&format!("{} is not ready", endpoint_url));
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
