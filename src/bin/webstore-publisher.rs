//! Web Store Publisher CLI
//!
//! Uploads a browser extension package and publishes it

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::collections::HashMap;
use std::path::PathBuf;
use std::process;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use tracing_subscriber::EnvFilter;
use webstore_publisher::core::{
    ConfigLoadOptions, ConfigLoader, HttpConfig, PollingConfig, Poller, PublishTarget,
    PublisherConfig, StoreError,
};
use webstore_publisher::orchestration::{Pipeline, PublishRequest};
use webstore_publisher::security::{
    CLIENT_ID_VAR, CLIENT_SECRET_VAR, Credentials, REFRESH_TOKEN_VAR, Redactor,
};
use webstore_publisher::store::WebStoreClient;

/// Upload and publish browser extensions to a web store
#[derive(Parser)]
#[command(name = "webstore-publisher")]
#[command(version)]
#[command(about = "Upload and publish browser extensions to a web store", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (defaults to ./.webstore-publisher.{yaml,yml,toml})
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Log HTTP statuses and response bodies
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log tokens unmasked (only together with --verbose)
    #[arg(long, global = true)]
    reveal_secrets: bool,

    /// Seconds between upload status checks
    #[arg(long, global = true, value_name = "SECS")]
    poll_interval: Option<u64>,

    /// Give up waiting for the upload after this many seconds (0 = never)
    #[arg(long, global = true, value_name = "SECS")]
    poll_timeout: Option<u64>,

    /// Give up waiting for the upload after this many status checks
    #[arg(long, global = true, value_name = "N")]
    max_poll_attempts: Option<u32>,

    /// Connection timeout in seconds
    #[arg(long, global = true, value_name = "SECS")]
    connect_timeout: Option<u64>,
}

#[derive(Args)]
struct CredentialArgs {
    /// OAuth2 client id
    #[arg(long, env = CLIENT_ID_VAR, hide_env_values = true)]
    client_id: String,

    /// OAuth2 client secret
    #[arg(long, env = CLIENT_SECRET_VAR, hide_env_values = true)]
    client_secret: String,

    /// OAuth2 refresh token
    #[arg(long, env = REFRESH_TOKEN_VAR, hide_env_values = true)]
    refresh_token: String,
}

impl CredentialArgs {
    fn into_credentials(self) -> Result<Credentials, StoreError> {
        Credentials::new(self.client_id, self.client_secret, self.refresh_token)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Upload a package and publish it
    Publish {
        #[command(flatten)]
        credentials: CredentialArgs,

        /// Store item id of the extension
        #[arg(long, env = "EXTENSION_ID")]
        extension_id: String,

        /// Package path or glob pattern matching exactly one file
        #[arg(long, env = "ZIP_PATH")]
        zip_path: String,

        /// Publish to trusted testers only
        #[arg(long)]
        tester_only: bool,

        /// Upload without publishing
        #[arg(long)]
        upload_only: bool,

        /// Succeed when the item is already in review
        #[arg(long)]
        allow_review_pending: bool,
    },

    /// Verify credentials by exchanging them for an access token
    CheckCredentials {
        #[command(flatten)]
        credentials: CredentialArgs,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let exit_code = match run(cli).await {
        Ok(exit_code) => exit_code,
        Err(e) => {
            report_error(&e);
            2
        }
    };

    process::exit(exit_code);
}

fn init_tracing(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("{}={},warn", env!("CARGO_CRATE_NAME"), level))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn report_error(error: &anyhow::Error) {
    eprintln!("\n❌ Error");
    eprintln!("{:#}", error);

    if let Some(store_error) = error.downcast_ref::<StoreError>() {
        eprintln!("Code: {}", store_error.code());

        let actions = store_error.suggested_actions();
        if !actions.is_empty() {
            eprintln!("\nSuggested actions:");
            for action in actions {
                eprintln!("  - {}", action);
            }
        }
    }
}

async fn run(cli: Cli) -> Result<i32> {
    let reveal = cli.reveal_secrets && cli.verbose;
    if cli.reveal_secrets && !cli.verbose {
        warn!("--reveal-secrets has no effect without --verbose");
    }

    let config = ConfigLoader::load(ConfigLoadOptions {
        project_path: std::env::current_dir()?,
        explicit_path: cli.config.clone(),
        cli_args: Some(cli_config(&cli)),
        env: std::env::vars().collect::<HashMap<_, _>>(),
    })
    .await?;

    let validation = ConfigLoader::validate(&config);
    if !validation.valid {
        eprintln!("{}", ConfigLoader::format_validation_result(&validation));
        return Ok(2);
    }
    for warning in &validation.warnings {
        warn!("[{}] {}", warning.field, warning.message);
    }

    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling.");
            signal_token.cancel();
        }
    });

    match cli.command {
        Commands::Publish {
            credentials,
            extension_id,
            zip_path,
            tester_only,
            upload_only,
            allow_review_pending,
        } => {
            let credentials = credentials.into_credentials()?;
            let pipeline = build_pipeline(&config, &credentials, reveal, cancel)?;
            let defaults = config.publish_defaults();

            let request = PublishRequest {
                extension_id,
                package: zip_path,
                target: PublishTarget::from_tester_only(
                    tester_only || defaults.tester_only.unwrap_or(false),
                ),
                upload_only: upload_only || defaults.upload_only.unwrap_or(false),
                allow_review_pending: allow_review_pending
                    || defaults.allow_review_pending.unwrap_or(false),
            };

            let report = pipeline.run(&credentials, &request).await?;

            println!("{}", report.summary());
            if let Some(message) = &report.review_pending {
                warn!("Store message: {}", message);
            }

            if report.success {
                println!("\n✅ Publishing completed successfully!");
                Ok(0)
            } else {
                println!("\n❌ Publishing failed");
                for error in &report.errors {
                    eprintln!("  - {}", error);
                }
                Ok(1)
            }
        }
        Commands::CheckCredentials { credentials } => {
            let credentials = credentials.into_credentials()?;
            let pipeline = build_pipeline(&config, &credentials, reveal, cancel)?;

            let token = pipeline.check_credentials(&credentials).await?;

            match token.expires_in() {
                Some(expires_in) => println!(
                    "\n✅ Credentials are valid (access token expires in {}s)",
                    expires_in.as_secs()
                ),
                None => println!("\n✅ Credentials are valid"),
            }
            Ok(0)
        }
    }
}

/// Command-line overrides, the highest config layer
fn cli_config(cli: &Cli) -> PublisherConfig {
    let mut config = PublisherConfig::default();

    if cli.poll_interval.is_some() || cli.poll_timeout.is_some() || cli.max_poll_attempts.is_some()
    {
        config.polling = Some(PollingConfig {
            interval_secs: cli.poll_interval,
            max_attempts: cli.max_poll_attempts,
            timeout_secs: cli.poll_timeout,
        });
    }

    if cli.connect_timeout.is_some() {
        config.http = Some(HttpConfig {
            connect_timeout_secs: cli.connect_timeout,
            ..Default::default()
        });
    }

    config
}

fn build_pipeline(
    config: &PublisherConfig,
    credentials: &Credentials,
    reveal: bool,
    cancel: CancellationToken,
) -> Result<Pipeline, StoreError> {
    let client = WebStoreClient::new(
        config.backend(),
        config.http_settings(),
        Redactor::for_credentials(credentials, reveal),
        Poller::new(config.poll_options()),
    )?;

    Ok(Pipeline::with_cancellation(Box::new(client), cancel))
}
