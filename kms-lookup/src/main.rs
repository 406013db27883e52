//! KMS Lookup
//!
//! Lists the key names a KMS exposes and tests connectivity to it.

use anyhow::{bail, ensure, Context, Result};
use clap::{Parser, Subcommand};
use kms_client::{KeyNameMatch, KmsClient, PasswordCipher};
use kms_lookup_config::{env_map, AUTH_TYPE, PROVIDER, USERNAME};
use kms_lookup_logging::{init, LogFormat};
use kms_lookup_types::remote_exception::render_error;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "kms-lookup")]
#[command(version)]
#[command(about = "List KMS key names and test KMS connectivity")]
struct Cli {
    /// Provider location, overrides KMS_LOOKUP_PROVIDER
    #[arg(long, global = true)]
    provider: Option<String>,

    /// User name, overrides KMS_LOOKUP_USERNAME
    #[arg(long, global = true)]
    username: Option<String>,

    /// `kerberos` or `simple`, overrides KMS_LOOKUP_AUTHTYPE
    #[arg(long, global = true)]
    auth_type: Option<String>,

    /// Emit JSON log lines instead of console output
    #[arg(long, global = true)]
    json_logs: bool,

    /// Give up on the whole call after this many seconds
    #[arg(long, global = true)]
    timeout_secs: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the key names the KMS knows about
    ListKeys {
        /// Only names starting with this prefix
        #[arg(long, default_value = "")]
        prefix: String,

        /// Names to leave out (repeatable)
        #[arg(long)]
        exclude: Vec<String>,
    },
    /// Check that a key list can be retrieved
    TestConnection {
        #[arg(long, default_value = "kms")]
        service: String,
    },
    /// Encrypt a password with KMS_LOOKUP_MASTER_KEY for storage in the configuration
    EncryptPassword {
        plain: String,
    },
}

fn connection_map(cli: &Cli) -> Result<HashMap<String, String>> {
    let mut configs = env_map().context("Failed to read KMS_LOOKUP_* environment")?;

    let overrides = [
        (PROVIDER, &cli.provider),
        (USERNAME, &cli.username),
        (AUTH_TYPE, &cli.auth_type),
    ];
    for (key, value) in overrides {
        if let Some(value) = value {
            configs.insert(key.to_string(), value.clone());
        }
    }

    Ok(configs)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let format = if cli.json_logs {
        LogFormat::Json
    } else {
        LogFormat::Console
    };
    init(format, "kms-lookup", "info");

    let limit = cli.timeout_secs.map(Duration::from_secs);

    match &cli.command {
        Command::EncryptPassword { plain } => {
            let cipher = PasswordCipher::from_env().context("Master key unavailable")?;
            println!("{}", cipher.encrypt(plain).context("Failed to encrypt password")?);
        }
        Command::ListKeys { prefix, exclude } => {
            let client = KmsClient::from_configs("kms", &connection_map(&cli)?)
                .context("Invalid KMS configuration")?;

            let criteria = KeyNameMatch::new()
                .with_prefix(prefix.trim())
                .excluding(exclude.iter().cloned());

            let outcome = match limit {
                Some(limit) => {
                    client
                        .discovery()
                        .discover_with_timeout(&criteria, limit)
                        .await
                }
                None => client.discovery().discover(&criteria).await,
            };

            let keys = match outcome.into_result() {
                Ok(keys) => keys,
                Err(e) => {
                    let (status, body) = render_error(e.http_status(), &e)?;
                    println!("{}", serde_json::to_string_pretty(&body)?);
                    return Err(e).context(format!("Key discovery failed with HTTP {}", status));
                }
            };

            match keys {
                Some(keys) => {
                    info!(count = keys.len(), "Key names retrieved");
                    for key in keys {
                        println!("{}", key);
                    }
                }
                None => bail!("No KMS endpoint returned a key list"),
            }
        }
        Command::TestConnection { service } => {
            let client = KmsClient::from_configs(service, &connection_map(&cli)?)
                .context("Invalid KMS configuration")?;

            let report = match limit {
                Some(limit) => match tokio::time::timeout(limit, client.test_connection()).await {
                    Ok(report) => report,
                    Err(_) => bail!("Connection test timed out after {}s", limit.as_secs()),
                },
                None => client.test_connection().await,
            };

            println!("{}", serde_json::to_string_pretty(&report.to_json()?)?);
            if !report.connectivity_status {
                warn!(service = %service, "Connection test failed");
            }
            ensure!(report.connectivity_status, "{}", report.message);
        }
    }

    Ok(())
}
