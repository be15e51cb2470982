use anyhow::Context;
use colored::Colorize;
use ringstore_cluster::StaticRing;
use ringstore_server::{NodeConfig, RingStoreNode};

use crate::cli::*;

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Serve(args) => cmd_serve(args).await,
        Command::Config(args) => cmd_config(args),
        Command::Lookup(args) => cmd_lookup(args, &cli.format),
    }
}

/// Load the config file (or defaults) and apply command-line overrides.
fn resolve_config(args: NodeArgs) -> anyhow::Result<NodeConfig> {
    let mut config = match &args.config {
        Some(path) => NodeConfig::load(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => NodeConfig::default(),
    };
    if let Some(rpc_addr) = args.rpc_addr {
        config.rpc_addr = rpc_addr;
    }
    if let Some(http_addr) = args.http_addr {
        config.http_addr = http_addr;
    }
    if !args.members.is_empty() {
        config.members = args.members;
    }
    if let Some(n) = args.vnodes_per_host {
        config.vnodes_per_host = n;
    }
    if let Some(n) = args.replicas {
        config.replicas = n;
    }
    if let Some(ms) = args.rpc_timeout {
        config.rpc_timeout = ms;
    }
    if args.data_dir.is_some() {
        config.data_dir = args.data_dir;
    }
    if args.no_heal {
        config.heal_on_inconsistent = false;
    }
    config.validate()?;
    Ok(config)
}

async fn cmd_serve(args: ServeArgs) -> anyhow::Result<()> {
    let config = resolve_config(args.node)?;
    let node = RingStoreNode::new(config).start().await?;
    println!(
        "{} RingStore node {} (http: {})",
        "✓".green().bold(),
        node.host().bold(),
        node.http_addr().to_string().cyan()
    );
    tokio::signal::ctrl_c()
        .await
        .context("waiting for ctrl-c")?;
    println!("Shutting down...");
    node.shutdown().await?;
    Ok(())
}

fn cmd_config(args: ConfigArgs) -> anyhow::Result<()> {
    let config = resolve_config(args.node)?;
    print!("{}", config.to_toml()?);
    Ok(())
}

fn cmd_lookup(args: LookupArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let config = resolve_config(args.node)?;
    let n = args.count.unwrap_or(config.replicas);
    let members = config.members_with(&config.rpc_addr);
    let ring = StaticRing::new(members.as_slice(), config.vnodes_per_host);
    let vnodes = ring.replicas(n, args.key.as_bytes())?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&vnodes)?),
        OutputFormat::Text => {
            println!(
                "Key {} on a ring of {} vnodes ({} hosts):",
                args.key.yellow().bold(),
                ring.len(),
                members.len()
            );
            for (i, vnode) in vnodes.iter().enumerate() {
                println!("  {}. {}  {}", i + 1, vnode.string_id().dimmed(), vnode.host.cyan());
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_defaults() {
        let args = NodeArgs {
            rpc_addr: Some("10.0.0.1:7000".into()),
            members: vec!["10.0.0.1:7000".into(), "10.0.0.2:7000".into()],
            replicas: Some(2),
            no_heal: true,
            ..NodeArgs::default()
        };
        let config = resolve_config(args).unwrap();
        assert_eq!(config.rpc_addr, "10.0.0.1:7000");
        assert_eq!(config.members.len(), 2);
        assert_eq!(config.replicas, 2);
        assert!(!config.heal_on_inconsistent);
        assert_eq!(config.vnodes_per_host, NodeConfig::default().vnodes_per_host);
    }

    #[test]
    fn invalid_override_is_rejected() {
        let args = NodeArgs {
            replicas: Some(0),
            ..NodeArgs::default()
        };
        assert!(resolve_config(args).is_err());
    }

    #[test]
    fn lookup_runs_offline() {
        let args = LookupArgs {
            key: "mytestkey".into(),
            count: Some(3),
            node: NodeArgs::default(),
        };
        assert!(cmd_lookup(args, &OutputFormat::Json).is_ok());
    }

    #[test]
    fn lookup_beyond_ring_size_fails() {
        let args = LookupArgs {
            key: "k".into(),
            count: Some(100),
            node: NodeArgs::default(),
        };
        assert!(cmd_lookup(args, &OutputFormat::Text).is_err());
    }
}
