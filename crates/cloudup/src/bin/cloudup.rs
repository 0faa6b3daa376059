//! Cloudup CLI - reconcile GCE forwarding rules and manage Octavia load balancers.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use cto_cloudup::fi::terraform::TerraformTarget;
use cto_cloudup::fi::{run_delta, Task};
use cto_cloudup::providers::openstack::{DeleteLoadBalancerOpts, ListLoadBalancersOpts};
use cto_cloudup::{
    ForwardingRule, ForwardingRuleSpec, GceApiTarget, GceCloud, GceConfig, OpenstackCloud,
    OpenstackConfig,
};

/// Cloudup CLI - declarative cloud resource reconciliation.
#[derive(Parser)]
#[command(name = "cloudup")]
#[command(about = "Reconcile cloud resources against a desired state")]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long, default_value = "false")]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render forwarding rules as Terraform JSON.
    Terraform {
        /// YAML file with a list of forwarding rules.
        #[arg(long)]
        input: PathBuf,

        /// GCP project for the provider block.
        #[arg(long, env = "GCE_PROJECT")]
        project: String,

        /// GCP region for the provider block.
        #[arg(long, env = "GCE_REGION")]
        region: String,

        /// Write to this file instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Show the changes `apply` would make.
    Plan {
        /// YAML file with a list of forwarding rules.
        #[arg(long)]
        input: PathBuf,
    },

    /// Create or update forwarding rules through the compute API.
    Apply {
        /// YAML file with a list of forwarding rules.
        #[arg(long)]
        input: PathBuf,
    },

    /// List Octavia load balancers.
    LbList {
        /// Only load balancers with this name.
        #[arg(long)]
        name: Option<String>,
    },

    /// Delete an Octavia load balancer and wait until it is gone.
    LbDelete {
        /// Load balancer ID.
        #[arg(long)]
        id: String,

        /// Also delete listeners, pools and members.
        #[arg(long, default_value = "false")]
        cascade: bool,
    },
}

fn load_rules(path: &Path) -> Result<Vec<ForwardingRule>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let specs: Vec<ForwardingRuleSpec> = serde_yaml::from_str(&raw)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    specs
        .into_iter()
        .map(|spec| {
            let name = spec.name.clone();
            ForwardingRule::try_from(spec)
                .with_context(|| format!("Invalid forwarding rule {name:?}"))
        })
        .collect()
}

/// Cancel `token` on Ctrl-C so retries and operation polls stop early.
fn cancel_on_ctrl_c(token: &CancellationToken) {
    let token = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling");
            token.cancel();
        }
    });
}

fn gce_cloud(cancel: &CancellationToken) -> Result<GceCloud> {
    let config = GceConfig::from_env().context("Failed to load GCE configuration")?;
    Ok(GceCloud::from_config(&config)
        .context("Failed to create GCE client")?
        .with_cancellation(cancel.clone()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cancel = CancellationToken::new();
    cancel_on_ctrl_c(&cancel);

    match cli.command {
        Commands::Terraform {
            input,
            project,
            region,
            output,
        } => {
            let rules = load_rules(&input)?;
            let target = TerraformTarget::new();
            target.add_google_provider(&project, &region).await;
            for rule in &rules {
                run_delta(rule, None, &target)
                    .await
                    .with_context(|| format!("Failed to render {}", rule.name))?;
            }
            let json = target.to_json().await?;
            match output {
                Some(path) => {
                    std::fs::write(&path, json)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    info!(path = %path.display(), rules = rules.len(), "Wrote Terraform JSON");
                }
                None => println!("{json}"),
            }
        }

        Commands::Plan { input } => {
            let rules = load_rules(&input)?;
            let cloud = gce_cloud(&cancel)?;
            for rule in &rules {
                match rule.find(&cloud).await? {
                    None => {
                        println!("+ {} {} (create)", ForwardingRule::KIND, rule.name);
                    }
                    Some(actual) => {
                        let changes = ForwardingRule::build_changes(&actual, rule);
                        if changes == ForwardingRule::default() {
                            println!("  {} {} (no changes)", ForwardingRule::KIND, rule.name);
                        } else {
                            println!("~ {} {}", ForwardingRule::KIND, rule.name);
                            print!("{}", serde_yaml::to_string(&changes)?);
                        }
                    }
                }
            }
        }

        Commands::Apply { input } => {
            let rules = load_rules(&input)?;
            let cloud = gce_cloud(&cancel)?;
            let target = GceApiTarget::new(cloud.clone());
            for rule in &rules {
                run_delta(rule, Some(&cloud), &target)
                    .await
                    .with_context(|| format!("Failed to apply {}", rule.name))?;
            }
            info!(rules = rules.len(), "Apply complete");
        }

        Commands::LbList { name } => {
            let config =
                OpenstackConfig::from_env().context("Failed to load OpenStack configuration")?;
            let cloud = OpenstackCloud::from_config(&config)?.with_cancellation(cancel.clone());
            let lbs = cloud
                .list_lbs(&ListLoadBalancersOpts {
                    name,
                    ..Default::default()
                })
                .await?;
            println!(
                "\n{:<38} {:<24} {:<16} {:<10}",
                "ID", "NAME", "VIP", "STATUS"
            );
            println!("{}", "-".repeat(90));
            for lb in lbs {
                println!(
                    "{:<38} {:<24} {:<16} {:<10}",
                    lb.id, lb.name, lb.vip_address, lb.provisioning_status
                );
            }
        }

        Commands::LbDelete { id, cascade } => {
            let config =
                OpenstackConfig::from_env().context("Failed to load OpenStack configuration")?;
            let cloud = OpenstackCloud::from_config(&config)?.with_cancellation(cancel.clone());
            info!(id = %id, cascade, "Deleting load balancer");
            cloud
                .delete_lb(&id, DeleteLoadBalancerOpts { cascade })
                .await
                .with_context(|| format!("Failed to delete load balancer {id}"))?;
            info!(id = %id, "Load balancer deleted");
        }
    }

    Ok(())
}
