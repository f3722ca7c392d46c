use std::error::Error;

use clap::{Parser, Subcommand, ValueEnum};
use rand::{rngs::StdRng, Rng, SeedableRng};

use city_graph::{grid_city, populate, CityGraph, GridConfig};
use location_anonymity::{
    AnonymizationEngine, CentroidMode, DensityAdaptiveK, EngineOptions, ExperimentError,
    ExperimentLog, ExperimentRunner, FixedK, KSelector, RunOutcome, RunRecord, SamplingStrategy,
    TieBreak, DEFAULT_RUNS,
};

#[derive(Parser)]
#[command(name = "anon-sim")]
#[command(about = "Batch k-anonymity experiments over a synthetic street grid")]
struct Cli {
    /// Intersections per grid side
    #[arg(long, default_value_t = 5)]
    grid_size: usize,

    /// Probability of a diagonal shortcut at every other intersection
    #[arg(long, default_value_t = 0.0)]
    diagonal_chance: f64,

    /// Users dropped onto the grid
    #[arg(short, long, default_value_t = 30)]
    users: u32,

    /// Queries per batch
    #[arg(short = 'n', long, default_value_t = DEFAULT_RUNS)]
    runs: usize,

    /// Seed driving population placement and target draws
    #[arg(short, long, default_value_t = 0)]
    seed: u64,

    /// Hop radius of the density probe
    #[arg(long, default_value_t = 1)]
    depth: u32,

    /// Pool targets are drawn from
    #[arg(long, value_enum, default_value = "all")]
    sampling: SamplingArg,

    /// Weigh the published location by member occupancy
    #[arg(long)]
    weighted_centroid: bool,

    /// Visit same-layer nodes in descending id order
    #[arg(long)]
    descending_ids: bool,

    /// Spread the batch over a thread pool
    #[arg(long)]
    parallel: bool,

    #[command(subcommand)]
    mode: Mode,
}

#[derive(Subcommand)]
enum Mode {
    /// Sweep one batch per fixed k
    Fixed {
        /// k values to sweep
        #[arg(short, long, num_args = 1.., value_delimiter = ',', default_values_t = vec![2, 3, 5, 7])]
        k: Vec<u32>,
    },

    /// One batch with the density-adaptive policy
    Adaptive {
        /// Density below which a neighborhood counts as sparse
        #[arg(long, default_value_t = 4)]
        low: u64,

        /// Density from which a neighborhood counts as dense
        #[arg(long, default_value_t = 10)]
        high: u64,

        /// k required in sparse neighborhoods
        #[arg(long, default_value_t = 10)]
        k_sparse: u32,

        /// k required in medium neighborhoods
        #[arg(long, default_value_t = 5)]
        k_medium: u32,

        /// k required in dense neighborhoods
        #[arg(long, default_value_t = 2)]
        k_dense: u32,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SamplingArg {
    /// Every node
    All,
    /// Nodes with at least one user
    Occupied,
}

impl From<SamplingArg> for SamplingStrategy {
    fn from(arg: SamplingArg) -> Self {
        match arg {
            SamplingArg::All => SamplingStrategy::AllNodes,
            SamplingArg::Occupied => SamplingStrategy::OccupiedNodes,
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    let config = GridConfig {
        size: cli.grid_size,
        diagonal_chance: cli.diagonal_chance,
    };
    let mut rng = StdRng::seed_from_u64(cli.seed);
    let (mut nodes, edges) = grid_city(&config, &mut rng)?;
    populate(&mut nodes, cli.users, &mut rng)?;
    let graph = CityGraph::new(&nodes, &edges)?;

    println!(
        "city: {} nodes, {} edges, {} users (seed {})",
        graph.node_count(),
        graph.edge_count(),
        graph.total_occupancy(),
        cli.seed
    );

    let options = EngineOptions {
        depth: cli.depth,
        tie_break: if cli.descending_ids {
            TieBreak::DescendingId
        } else {
            TieBreak::AscendingId
        },
        centroid: if cli.weighted_centroid {
            CentroidMode::OccupancyWeighted
        } else {
            CentroidMode::Unweighted
        },
    };
    let sampling = SamplingStrategy::from(cli.sampling);

    match cli.mode {
        Mode::Fixed { k } => {
            for k in k {
                println!("\n====== fixed k = {k} ======");
                let engine = AnonymizationEngine::new(FixedK::new(k)?, options);
                let runner = ExperimentRunner::new(engine, sampling);
                let log = run(&runner, &graph, cli.runs, cli.parallel, &mut rng)?;
                report(&log, None)?;
            }
        }
        Mode::Adaptive {
            low,
            high,
            k_sparse,
            k_medium,
            k_dense,
        } => {
            println!("\n====== adaptive k ======");
            let policy = DensityAdaptiveK::new(low, high, k_sparse, k_medium, k_dense)?;
            let engine = AnonymizationEngine::new(policy, options);
            let runner = ExperimentRunner::new(engine, sampling);
            let log = run(&runner, &graph, cli.runs, cli.parallel, &mut rng)?;
            report(&log, Some(&policy))?;
        }
    }
    Ok(())
}

fn run<S: KSelector + Sync>(
    runner: &ExperimentRunner<S, SamplingStrategy>,
    graph: &CityGraph,
    runs: usize,
    parallel: bool,
    rng: &mut StdRng,
) -> Result<ExperimentLog, ExperimentError> {
    if parallel {
        runner.run_batch_parallel(graph, runs, rng.random())
    } else {
        runner.run_batch(graph, runs, rng)
    }
}

fn report(log: &ExperimentLog, policy: Option<&DensityAdaptiveK>) -> Result<(), Box<dyn Error>> {
    for record in log.records() {
        print_record(record, policy);
    }
    let summary = serde_json::to_string_pretty(&log.aggregate())?;
    println!("{summary}");
    Ok(())
}

fn print_record(record: &RunRecord, policy: Option<&DensityAdaptiveK>) {
    let run = record.run + 1;
    let target = record.target;
    match &record.outcome {
        RunOutcome::Anonymized {
            density,
            selected_k,
            region,
            location_error,
            ..
        } => println!(
            "Run {run:02} | target={target} | density={} | k={selected_k} | region={} | error={location_error:.3}",
            banded(*density, policy),
            region.len(),
        ),
        RunOutcome::Exhausted {
            density,
            selected_k,
            component_size,
            reachable_occupancy,
        } => println!(
            "Run {run:02} | target={target} | density={} | k={selected_k} | exhausted: {reachable_occupancy} users over {component_size} nodes",
            banded(*density, policy),
        ),
        RunOutcome::Failed { error } => {
            println!("Run {run:02} | target={target} | failed: {error}");
        }
    }
}

fn banded(density: u64, policy: Option<&DensityAdaptiveK>) -> String {
    match policy {
        Some(policy) => format!("{density} ({})", policy.band(density)),
        None => density.to_string(),
    }
}
