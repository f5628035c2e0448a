//! Courier CLI
//!
//! Sends personalized messages to a contact sheet through a browser session
//! driven over WebDriver, writing every outcome to an append-only audit log.
//!
//! Usage:
//!   courier send contacts.csv            # Log in, then deliver to every contact
//!   courier preview contacts.csv         # Show what would be sent; touches nothing
//!   courier check                        # Probe internet and the WebDriver endpoint
//!
//! A chromedriver-compatible server must be listening on the WebDriver URL
//! (default http://localhost:9515) for `send`.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use courier::drivers;
use courier::{
    deep_link, open_contact_source, render, AuditLog, ComposeMode, ConnectivityGuard, Contact,
    CourierConfig, Orchestrator, PhoneNormalizer, WebDriverSession,
};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

mod logging;
mod output;

use output::PreviewRow;

#[derive(Parser)]
#[command(name = "courier", version)]
#[command(about = "Paced, audited delivery of personalized messages")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug)]
struct GlobalArgs {
    /// YAML configuration file; built-in defaults apply when omitted
    #[arg(long, short = 'c', global = true, env = "COURIER_CONFIG")]
    config: Option<PathBuf>,

    /// WebDriver endpoint (e.g. a local chromedriver)
    #[arg(long, global = true, env = "COURIER_WEBDRIVER_URL")]
    webdriver_url: Option<String>,

    /// Audit log CSV; appended to, never truncated
    #[arg(long, global = true, env = "COURIER_AUDIT_LOG")]
    audit_log: Option<PathBuf>,

    /// Country code assumed for ten-digit local numbers
    #[arg(long, global = true)]
    country_code: Option<String>,

    /// How the message reaches the chat: keystrokes or prefill
    #[arg(long, global = true, value_parser = ComposeMode::from_str)]
    compose_mode: Option<ComposeMode>,

    /// Also write logs to a daily rolling file in this directory
    #[arg(long, global = true, env = "COURIER_LOG_DIR")]
    log_dir: Option<PathBuf>,
}

impl GlobalArgs {
    fn load_config(&self) -> Result<CourierConfig> {
        let mut config = CourierConfig::load(self.config.as_deref())
            .context("Failed to load configuration")?;

        if let Some(url) = &self.webdriver_url {
            config.webdriver_url = url.clone();
        }
        if let Some(path) = &self.audit_log {
            config.audit_log = path.clone();
        }
        if let Some(code) = &self.country_code {
            config.default_country_code = code.trim_start_matches('+').to_string();
        }
        if let Some(mode) = self.compose_mode {
            config.compose_mode = mode;
        }

        config.validate().context("Invalid configuration")?;
        Ok(config)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Deliver a message to every contact in the file
    Send(ContactsArgs),
    /// Show normalized numbers, rendered messages and links without sending
    Preview(ContactsArgs),
    /// Check internet connectivity and the WebDriver endpoint
    Check,
}

#[derive(Args, Debug)]
struct ContactsArgs {
    /// Contact sheet (.xlsx, .xls, .csv or .json)
    contacts: PathBuf,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Load .env if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let _log_guard = logging::init_logging(cli.global.log_dir.as_deref())?;
    let config = cli.global.load_config()?;

    match cli.command {
        Commands::Send(args) => send(config, &args.contacts).await,
        Commands::Preview(args) => preview(&config, &args.contacts),
        Commands::Check => check(&config).await,
    }
}

fn load_contacts(path: &Path) -> Result<Vec<Contact>> {
    let source = open_contact_source(path)
        .with_context(|| format!("Cannot read contacts from {}", path.display()))?;
    source
        .read_contacts()
        .with_context(|| format!("Cannot read contacts from {}", source.describe()))
}

async fn send(config: CourierConfig, contacts_path: &Path) -> Result<()> {
    let contacts = load_contacts(contacts_path)?;
    if contacts.is_empty() {
        warn!(path = %contacts_path.display(), "No contacts found; nothing to send");
        return Ok(());
    }

    let audit_path = config.audit_log.clone();
    let audit = AuditLog::open(&audit_path).context("Failed to open audit log")?;

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        warn!("Interrupt received; finishing the current contact, then stopping (press Ctrl-C again to exit now)");
        interrupt.cancel();
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Second interrupt received; exiting without waiting for the current contact");
            std::process::exit(130);
        }
    });

    let guard = ConnectivityGuard::from_config(&config.connectivity, cancel)
        .map_err(anyhow::Error::msg)
        .context("Failed to set up connectivity probe")?;

    info!(
        contacts = contacts.len(),
        webdriver_url = %config.webdriver_url,
        compose_mode = ?config.compose_mode,
        locators_version = %config.locators.version,
        "Starting delivery run"
    );
    let driver = drivers::connect(&config)
        .await
        .context("Failed to start browser session")?;

    let summary = Orchestrator::new(driver, guard, audit, config)
        .run(contacts)
        .await
        .context("Delivery run aborted")?;

    output::print_summary(&summary, &audit_path);
    Ok(())
}

fn preview(config: &CourierConfig, contacts_path: &Path) -> Result<()> {
    let contacts = load_contacts(contacts_path)?;
    let normalizer = PhoneNormalizer::new(config.default_country_code.clone());

    let rows: Vec<PreviewRow> = contacts
        .iter()
        .enumerate()
        .map(|(index, contact)| {
            let position = index + 1;
            let name = contact.display_name();
            let Some(raw_phone) = contact.phone().filter(|_| !contact.is_missing_data()) else {
                return PreviewRow::Skip {
                    position,
                    name,
                    reason: courier::orchestrator::MISSING_DATA_REASON.to_string(),
                };
            };
            let phone = normalizer.normalize(raw_phone);
            let message = render(
                &contact.message_template,
                &contact.given_name,
                &contact.family_name,
            );
            let text = match config.compose_mode {
                ComposeMode::Prefill => Some(message.as_str()),
                ComposeMode::Keystrokes => None,
            };
            let link = deep_link(&config.messaging_base_url, &phone, text);
            PreviewRow::Send {
                position,
                name,
                phone: phone.to_string(),
                message,
                link,
            }
        })
        .collect();

    output::print_preview(&rows);
    Ok(())
}

async fn check(config: &CourierConfig) -> Result<()> {
    let guard = ConnectivityGuard::from_config(&config.connectivity, CancellationToken::new())
        .map_err(anyhow::Error::msg)
        .context("Failed to set up connectivity probe")?;

    let internet = guard
        .check_once()
        .await
        .map(|()| "reachable".to_string());
    output::print_check("Internet", &guard.target(), &internet);

    let webdriver = WebDriverSession::status(&config.webdriver_url)
        .await
        .map_err(|e| e.to_string());
    output::print_check("WebDriver", &config.webdriver_url, &webdriver);

    if internet.is_err() || webdriver.is_err() {
        anyhow::bail!("Environment check failed");
    }
    Ok(())
}
