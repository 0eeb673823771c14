use anyhow::{Context, Result, bail};
use clap::Parser;
use log::info;
use std::path::PathBuf;

use routesim::config::{CostModel, SimConfig};
use routesim::network::{Network, Topology};
use routesim::protocol::ProtocolKind;
use routesim::verify;

#[derive(Parser)]
#[command(name = "routesim", about = "Tick-based distance-vector / link-state routing simulator")]
struct Cli {
    /// Routing algorithm: dv or ls
    #[arg(short, long, default_value = "dv")]
    algorithm: ProtocolKind,

    /// Topology JSON file; the built-in eight-router network otherwise
    #[arg(long)]
    topology: Option<PathBuf>,

    /// Simulation config JSON file
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(short = 't', long)]
    simtime: Option<u64>,

    /// Per-link packet loss probability
    #[arg(long)]
    loss: Option<f64>,

    #[arg(long)]
    seed: Option<u64>,

    /// Every link costs 1 instead of its length
    #[arg(long)]
    unit_costs: bool,

    #[arg(long, requires = "destination")]
    source: Option<String>,

    #[arg(long, requires = "source")]
    destination: Option<String>,

    /// Print every router's tables as JSON after the run
    #[arg(long)]
    dump_tables: bool,
}

impl Cli {
    fn sim_config(&self) -> Result<SimConfig> {
        let mut config = match &self.config {
            Some(path) => SimConfig::load(path)
                .with_context(|| format!("loading config from {}", path.display()))?,
            None => SimConfig::default(),
        };
        if let Some(simtime) = self.simtime {
            config.sim_time = simtime;
        }
        if let Some(loss) = self.loss {
            config.loss_prob = loss;
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if self.unit_costs {
            config.cost_model = CostModel::Unit;
        }
        config.validate()?;
        Ok(config)
    }

    fn topology(&self) -> Result<Topology> {
        match &self.topology {
            Some(path) => Topology::load(path)
                .with_context(|| format!("loading topology from {}", path.display())),
            None => Ok(Topology::demo()),
        }
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let config = cli.sim_config()?;
    let topology = cli.topology()?;
    info!(
        "Using {} routing on {} nodes, {} links",
        cli.algorithm,
        topology.nodes.len(),
        topology.links.len()
    );

    match (&cli.source, &cli.destination) {
        (Some(source), Some(destination)) => {
            let delivery = verify::verify_pair(&topology, &config, cli.algorithm, source, destination)
                .with_context(|| format!("verifying {} -> {}", source, destination))?;
            println!(
                "{} -> {}: {} (cost {:.3}, delivered at {})",
                source,
                destination,
                delivery.path.join(" -> "),
                delivery.cost,
                delivery.finish
            );
        }
        (None, None) => {
            let deliveries = verify::verify_routes(&topology, &config, cli.algorithm)
                .context("route verification failed")?;
            println!("All {} routes verified", deliveries.len());
        }
        _ => bail!("--source and --destination must be given together"),
    }

    if cli.dump_tables {
        let mut network = Network::build(&topology, &config, cli.algorithm)?;
        network.step(config.sim_time)?;
        let tables = serde_json::to_string_pretty(&network.snapshot())?;
        println!("{}", tables);
    }

    Ok(())
}
