//! Command-line driver for the payment workflow.
//!
//! Runs one card-present charge end to end against the simulated terminal:
//! discover a reader, connect it, create the intent, collect and confirm.

mod console;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::Parser;
use tapline_core::{Currency, DiscoveryMethod, LocationId, Reader, ReaderId};
use tapline_terminal::SdkError;
use tapline_terminal::mock::{MockLocation, MockTerminal};
use tapline_workflow::{PaymentWorkflow, WorkflowConfig};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::console::ConsolePrompt;

/// Reader reported by the simulated discovery.
const SIMULATED_READER_ID: &str = "SIMULATOR-LOCAL-MOBILE";

/// Location the simulated location services resolve to.
const SIMULATED_LOCATION_ID: &str = "tml_simulated";

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Amount to charge in major units, e.g. "10.00"
    #[arg(default_value = "10.00")]
    amount: String,

    /// JSON workflow configuration file
    #[arg(long, env = "TAPLINE_CONFIG")]
    config: Option<PathBuf>,

    /// Currency to charge
    #[arg(long, env = "TAPLINE_CURRENCY")]
    currency: Option<Currency>,

    /// Terminal location to connect the reader to
    #[arg(long, env = "TAPLINE_LOCATION_ID")]
    location_id: Option<LocationId>,

    /// How to look for readers (localMobile, bluetoothScan, internet)
    #[arg(long, env = "TAPLINE_DISCOVERY_METHOD")]
    discovery_method: Option<DiscoveryMethod>,

    /// Seconds to wait for a reader to be discovered
    #[arg(long, env = "TAPLINE_READER_TIMEOUT")]
    reader_timeout: Option<u64>,

    /// Simulate a declined card during collection
    #[arg(long)]
    decline: bool,

    /// Answer prompts on stdin instead of dismissing them
    #[arg(long)]
    interactive: bool,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn read_config_file(path: &Path) -> Result<WorkflowConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("invalid config file {}", path.display()))
}

/// Load the configuration file, if any, and apply command-line overrides.
///
/// The command-line driver only talks to the simulator, so `simulated` is
/// always forced on.
fn load_config(cli: &Cli) -> Result<WorkflowConfig> {
    let mut config = match cli.config.as_deref() {
        Some(path) => read_config_file(path)?,
        None => WorkflowConfig::default(),
    };

    if let Some(currency) = cli.currency {
        config = config.currency(currency);
    }
    if let Some(method) = cli.discovery_method {
        config = config.discovery_method(method);
    }
    if let Some(location_id) = cli.location_id.clone() {
        config = config.location_id(location_id);
    }
    if let Some(secs) = cli.reader_timeout {
        config.reader_wait_timeout_secs = secs;
    }

    Ok(config.with_simulated(true))
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;
    info!(
        currency = %config.currency,
        discovery_method = %config.discovery_method,
        "Starting simulated charge"
    );

    let reader = Reader::discovered(ReaderId::new(SIMULATED_READER_ID)?, config.discovery_method)
        .with_label("Simulated reader")
        .simulated();
    let (terminal, terminal_handle) = MockTerminal::with_simulated_readers(vec![reader]);
    let (location, location_handle) = MockLocation::granted();
    location_handle.set_location_id(Some(LocationId::new(SIMULATED_LOCATION_ID)?));
    if cli.decline {
        terminal_handle.fail_next_collect(SdkError::declined("Your card was declined."));
    }

    let workflow = PaymentWorkflow::new(
        terminal,
        location,
        ConsolePrompt::new(cli.interactive),
        config,
    );

    workflow.initialize().await?;
    workflow.start_discovery().await?;
    let candidate = workflow.wait_for_reader().await?;
    info!(reader_id = %candidate.id, "Reader discovered");

    let connected = workflow.connect_reader().await?;
    let intent = workflow.create_intent_from_input(&cli.amount).await?;
    info!(
        reader_id = %connected.id,
        intent_id = ?intent.id,
        amount = intent.amount.minor_units(),
        "Charging"
    );

    let outcome = workflow.collect_payment().await;
    if let Err(e) = workflow.disconnect_reader().await {
        error!("Failed to disconnect reader: {}", e);
    }

    let confirmed = outcome?;
    if !confirmed.is_confirmed() {
        bail!("payment ended in status {}", confirmed.status);
    }
    println!("{}", serde_json::to_string_pretty(&confirmed)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    run(cli).await.inspect_err(|e| error!("Charge failed: {:#}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("tapline").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_defaults() {
        let cli = parse(&[]);
        assert_eq!(cli.amount, "10.00");
        assert!(!cli.decline);

        let config = load_config(&cli).unwrap();
        assert!(config.simulated);
        assert_eq!(config.currency, Currency::Usd);
        assert_eq!(config.discovery_method, DiscoveryMethod::LocalMobile);
    }

    #[test]
    fn test_flags_override_config() {
        let cli = parse(&[
            "42.50",
            "--location-id",
            "tml_cli",
            "--discovery-method",
            "bluetoothScan",
            "--reader-timeout",
            "5",
        ]);
        assert_eq!(cli.amount, "42.50");

        let config = load_config(&cli).unwrap();
        assert_eq!(config.location_id.as_ref().unwrap().as_str(), "tml_cli");
        assert_eq!(config.discovery_method, DiscoveryMethod::BluetoothScan);
        assert_eq!(config.reader_wait_timeout_duration(), Duration::from_secs(5));
    }

    #[test]
    fn test_invalid_flag_values_rejected() {
        let bad_method = ["tapline", "--discovery-method", "usb"];
        assert!(Cli::try_parse_from(bad_method).is_err());

        let bad_currency = ["tapline", "--currency", "eur"];
        assert!(Cli::try_parse_from(bad_currency).is_err());
    }

    #[test]
    fn test_missing_config_file() {
        let cli = parse(&["--config", "/nonexistent/tapline.json"]);
        let err = load_config(&cli).unwrap_err();
        assert!(err.to_string().contains("failed to read config file"));
    }

    #[tokio::test]
    async fn test_simulated_charge_succeeds() {
        run(parse(&["3.50"])).await.unwrap();
    }

    #[tokio::test]
    async fn test_declined_charge_fails() {
        let err = run(parse(&["--decline"])).await.unwrap_err();
        assert!(err.to_string().contains("declined"));
    }
}
