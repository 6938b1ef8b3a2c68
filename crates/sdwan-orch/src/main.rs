//! sdwan-create-vpn - provision one tunnel from the command line.
//!
//! Runs the orchestrator against the static topology from the config file
//! and an in-memory flow table. The outcome is printed as a single line;
//! details go to the log on stderr.

use anyhow::Context;
use clap::Parser;
use sdwan_orch::memory::{InMemoryFlowRuleStore, LocalCoreService};
use sdwan_orch::{SdwanConfig, SdwanOrch};
use sdwan_types::EtherType;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const CREATE_OK: &str = "Create VPN OK! you can check logs";
const CREATE_FAIL: &str = "Create VPN Fail! you can check logs";

/// Create an SD-WAN VPN tunnel between two sites
#[derive(Parser, Debug)]
#[command(name = "sdwan-create-vpn")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Tenant that owns the tunnel
    #[arg(value_name = "TenantName")]
    tenant_name: String,

    /// Source site, e.g. of:0000000000000001/1
    #[arg(value_name = "Source-Site")]
    source_site: String,

    /// Destination site, e.g. of:0000000000000002/1
    #[arg(value_name = "Destination-Site")]
    destination_site: String,

    /// Payload protocol: arp, ipv4, ipv6, mpls, or a numeric ethertype
    #[arg(value_name = "Network-Protocol-type")]
    network_protocol_type: String,

    /// Configuration file
    #[arg(short = 'c', long, default_value = SdwanConfig::DEFAULT_PATH)]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,

    /// Print the installed flow rules as JSON after a successful create
    #[arg(long)]
    dump_flows: bool,
}

fn init_logging(args: &Args) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true);

    if args.json_logs {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn run(args: &Args) -> anyhow::Result<()> {
    let protocol: EtherType = args
        .network_protocol_type
        .parse()
        .with_context(|| format!("unsupported protocol '{}'", args.network_protocol_type))?;
    if protocol.is_novel() {
        info!(protocol = %protocol, "Using novel protocol");
    }

    let config = SdwanConfig::load_or_default(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    config.validate()?;

    let store = Arc::new(InMemoryFlowRuleStore::new());
    let orch = SdwanOrch::activate(
        config.orch_config(),
        &LocalCoreService::new(),
        Arc::new(config.static_topology()),
        store.clone(),
    )
    .await?;

    let tunnel = orch
        .create_vpn(
            &args.tenant_name,
            &args.source_site,
            &args.destination_site,
            protocol,
        )
        .await?;

    info!(
        tenant = tunnel.tenant(),
        forward_hops = ?tunnel.forward_hops(),
        backward_hops = ?tunnel.backward_hops(),
        "Tunnel ready"
    );

    if args.dump_flows {
        let rules = store.rules();
        println!("{}", serde_json::to_string_pretty(&rules)?);
    }

    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(&args);

    match run(&args).await {
        Ok(()) => println!("{}", CREATE_OK),
        Err(e) => {
            error!("Create VPN failed: {:#}", e);
            println!("{}", CREATE_FAIL);
        }
    }

    ExitCode::SUCCESS
}
