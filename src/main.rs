use clap::{Parser, Subcommand};
use linksteer::config;
use linksteer::packet::{Family, PacketMeta};
use linksteer::telemetry::{init_logging, LogConfig};
use std::net::IpAddr;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "linksteer")]
#[command(about = "ACL-based multi-link forwarding engine")]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "linksteer.toml", global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the configuration without building the engine
    Validate,
    /// Build the engine and print its state
    Show,
    /// Push one synthetic packet through the datapath
    Simulate {
        /// Source address
        #[arg(long)]
        src: IpAddr,
        /// Destination address
        #[arg(long)]
        dst: IpAddr,
        /// IP protocol number
        #[arg(long, default_value_t = 6)]
        protocol: u8,
        #[arg(long)]
        src_port: Option<u16>,
        #[arg(long)]
        dst_port: Option<u16>,
        /// RX interface index
        #[arg(long)]
        rx_interface: u32,
        /// DSCP codepoint
        #[arg(long, default_value_t = 0)]
        dscp: u8,
    },
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(&cli) {
        eprintln!("[ERROR] {}", e);
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> linksteer::Result<()> {
    let cfg = config::load(&cli.config)?;

    let log_config = cfg.logging.as_ref().map(|l| LogConfig {
        level: l.level.clone(),
        format: l.format.clone(),
    });
    init_logging(log_config.as_ref());

    let result = config::validate(&cfg);
    result.print_diagnostics();
    if result.has_errors() {
        return Err(linksteer::Error::Config("validation failed".into()));
    }

    match &cli.command {
        Commands::Validate => {
            info!("{} is valid", cli.config.display());
        }
        Commands::Show => {
            let engine = config::build_engine(&cfg)?;
            show(&engine);
        }
        Commands::Simulate {
            src,
            dst,
            protocol,
            src_port,
            dst_port,
            rx_interface,
            dscp,
        } => {
            let engine = config::build_engine(&cfg)?;
            let mut meta = PacketMeta::new(*src, *dst, *protocol, *rx_interface);
            if let (Some(sp), Some(dp)) = (src_port, dst_port) {
                meta = meta.with_ports(*sp, *dp);
            }
            meta = meta.with_dscp(*dscp);

            let decision = engine.process_packet(&meta);
            println!(
                "next:{} adj:{} policy_applied:{} policy:{}",
                decision.next,
                decision.adj,
                decision.policy_applied,
                decision
                    .policy_id
                    .map(|id| id.to_string())
                    .unwrap_or_else(|| "-".to_string()),
            );
        }
    }
    Ok(())
}

fn show(engine: &linksteer::dataplane::Engine) {
    println!("links:");
    for link in engine.links_dump() {
        println!(
            " {}: sw_if_index={} label={} adj={} up={} loss={} delay={} jitter={}",
            link.family,
            link.sw_if_index,
            link.label,
            link.adj.map(|a| a.to_string()).unwrap_or_else(|| "-".into()),
            link.up,
            link.quality.loss,
            link.quality.delay,
            link.quality.jitter,
        );
        println!(
            "   hits:{} misses:{} enforced_hits:{} enforced_misses:{}",
            link.hits, link.misses, link.enforced_hits, link.enforced_misses
        );
    }

    println!("policies:");
    for policy in engine.policies_dump() {
        println!(
            " policy:{} acl:{} refs:{}",
            policy.policy_id, policy.acl_id, policy.ref_count
        );
        println!(
            "  counters: matched:{} applied:{} fallback:{} dropped:{} default route:{}",
            policy.matched, policy.applied, policy.fallback, policy.dropped, policy.default_route
        );
        println!("  {}", policy.action);
    }
    if let Some(action) = engine.policies().default_route_action() {
        println!("default_route_action:\n  {}", action);
    }

    println!("attachments:");
    for att in engine.attachments_dump(None) {
        println!(
            " {}: interface={} policy={} priority={}",
            att.family, att.sw_if_index, att.policy_id, att.priority
        );
    }

    for family in [Family::V4, Family::V6] {
        let adjs = engine.default_route_dump(family);
        if !adjs.is_empty() {
            println!("default route adjacencies ({}): {:?}", family, adjs);
        }
    }
}
