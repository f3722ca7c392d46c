use geo::{Distance, Euclidean};
use itertools::{Itertools, MinMaxResult};
use rand::{rngs::StdRng, Rng, SeedableRng};
use rayon::prelude::*;
use serde::Serialize;
use thiserror::Error;

use city_graph::{CityGraph, Id};

use crate::{AnonymityError, AnonymizationEngine, KSelector};

/// Batch size used when the caller does not pick one.
pub const DEFAULT_RUNS: usize = 20;

#[derive(Debug, Error, PartialEq)]
pub enum ExperimentError {
    #[error("a batch needs at least one run")]
    NoRuns,

    #[error("sampling produced no candidate targets")]
    NoCandidates,
}

/// Chooses which nodes a batch may query.
///
/// Occupancy is frozen while a batch runs, so the candidate pool is
/// computed once up front and targets are drawn from it uniformly.
pub trait TargetSampler {
    fn candidates(&self, graph: &CityGraph) -> Vec<Id>;
}

/// Built-in target pools.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum SamplingStrategy {
    /// Every node of the graph.
    #[default]
    AllNodes,
    /// Only nodes hosting at least one user.
    OccupiedNodes,
}

impl TargetSampler for SamplingStrategy {
    fn candidates(&self, graph: &CityGraph) -> Vec<Id> {
        match self {
            Self::AllNodes => graph.all_nodes().map(|node| node.id).collect(),
            Self::OccupiedNodes => graph
                .all_nodes()
                .filter(|node| node.occupancy > 0)
                .map(|node| node.id)
                .collect(),
        }
    }
}

/// What a single run produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum RunOutcome {
    /// The query was answered with a covering region.
    Anonymized {
        density: u64,
        selected_k: u32,
        /// Region members in visit order.
        region: Vec<Id>,
        region_occupancy: u64,
        /// Euclidean distance from the target coordinate to the
        /// published location.
        location_error: f64,
        /// Bounding box area of the region.
        region_area: f64,
    },
    /// The reachable component ran out of users below the required k.
    Exhausted {
        density: u64,
        selected_k: u32,
        component_size: usize,
        reachable_occupancy: u64,
    },
    /// The query never reached expansion.
    Failed { error: String },
}

impl RunOutcome {
    /// A covered run ended with a region meeting its threshold.
    pub fn is_covered(&self) -> bool {
        matches!(self, Self::Anonymized { .. })
    }
}

/// One row of a batch log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunRecord {
    /// Position in the batch, starting at 0.
    pub run: usize,
    /// Queried node.
    pub target: Id,
    pub outcome: RunOutcome,
}

/// Ordered, append-only record of one batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExperimentLog {
    records: Vec<RunRecord>,
}

impl ExperimentLog {
    pub fn records(&self) -> &[RunRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Collapses the log into batch statistics.
    ///
    /// Region size, location error and area are averaged over covered
    /// runs; k statistics cover every run that got as far as selecting
    /// one. Coverage is the covered fraction of all runs.
    pub fn aggregate(&self) -> BatchSummary {
        let mut covered = 0usize;
        let mut exhausted = 0usize;
        let mut failed = 0usize;
        let mut sizes = Vec::new();
        let mut errors = Vec::new();
        let mut areas = Vec::new();
        let mut ks = Vec::new();

        for record in &self.records {
            match &record.outcome {
                RunOutcome::Anonymized {
                    selected_k,
                    region,
                    location_error,
                    region_area,
                    ..
                } => {
                    covered += 1;
                    sizes.push(region.len());
                    errors.push(*location_error);
                    areas.push(*region_area);
                    ks.push(*selected_k);
                }
                RunOutcome::Exhausted { selected_k, .. } => {
                    exhausted += 1;
                    ks.push(*selected_k);
                }
                RunOutcome::Failed { .. } => failed += 1,
            }
        }

        let (min_region_size, max_region_size) = minmax_or(&sizes, 0);
        let (min_selected_k, max_selected_k) = minmax_or(&ks, 0);
        BatchSummary {
            runs: self.records.len(),
            covered,
            exhausted,
            failed,
            coverage: ratio(covered, self.records.len()),
            min_region_size,
            mean_region_size: mean(sizes.iter().map(|&s| s as f64)),
            max_region_size,
            mean_location_error: mean(errors.iter().copied()),
            mean_region_area: mean(areas.iter().copied()),
            min_selected_k,
            mean_selected_k: mean(ks.iter().map(|&k| f64::from(k))),
            max_selected_k,
        }
    }
}

/// Aggregate view of one batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchSummary {
    pub runs: usize,
    pub covered: usize,
    pub exhausted: usize,
    pub failed: usize,
    /// Covered fraction of all runs.
    pub coverage: f64,
    pub min_region_size: usize,
    pub mean_region_size: f64,
    pub max_region_size: usize,
    pub mean_location_error: f64,
    pub mean_region_area: f64,
    pub min_selected_k: u32,
    pub mean_selected_k: f64,
    pub max_selected_k: u32,
}

fn ratio(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}

fn mean(values: impl ExactSizeIterator<Item = f64>) -> f64 {
    let count = values.len();
    if count == 0 {
        0.0
    } else {
        values.sum::<f64>() / count as f64
    }
}

fn minmax_or<T: Copy + PartialOrd>(values: &[T], empty: T) -> (T, T) {
    match values.iter().copied().minmax() {
        MinMaxResult::NoElements => (empty, empty),
        MinMaxResult::OneElement(value) => (value, value),
        MinMaxResult::MinMax(min, max) => (min, max),
    }
}

/// Drives batches of anonymization queries over a frozen snapshot.
#[derive(Debug, Clone)]
pub struct ExperimentRunner<S, T> {
    engine: AnonymizationEngine<S>,
    sampler: T,
}

impl<S: KSelector, T: TargetSampler> ExperimentRunner<S, T> {
    pub fn new(engine: AnonymizationEngine<S>, sampler: T) -> Self {
        Self { engine, sampler }
    }

    /// Runs `runs` queries against `graph`, drawing targets with `rng`.
    ///
    /// Per-run failures are recorded and the batch keeps going; only a
    /// batch that cannot start at all is an error.
    pub fn run_batch(
        &self,
        graph: &CityGraph,
        runs: usize,
        rng: &mut impl Rng,
    ) -> Result<ExperimentLog, ExperimentError> {
        let candidates = self.batch_candidates(graph, runs)?;
        let mut log = ExperimentLog::default();
        for run in 0..runs {
            let target = candidates[rng.random_range(0..candidates.len())];
            log.records.push(self.one_run(graph, run, target));
        }
        Ok(log)
    }

    /// Parallel batch. Every run owns an rng stream derived from `seed`,
    /// so the log is identical across invocations no matter how the work
    /// gets scheduled.
    pub fn run_batch_parallel(
        &self,
        graph: &CityGraph,
        runs: usize,
        seed: u64,
    ) -> Result<ExperimentLog, ExperimentError>
    where
        S: Sync,
        T: Sync,
    {
        let candidates = self.batch_candidates(graph, runs)?;
        let mut master = StdRng::seed_from_u64(seed);
        let sub_seeds: Vec<u64> = (0..runs).map(|_| master.random()).collect();

        let records = sub_seeds
            .into_par_iter()
            .enumerate()
            .map(|(run, sub_seed)| {
                let mut rng = StdRng::seed_from_u64(sub_seed);
                let target = candidates[rng.random_range(0..candidates.len())];
                self.one_run(graph, run, target)
            })
            .collect();
        Ok(ExperimentLog { records })
    }

    fn batch_candidates(
        &self,
        graph: &CityGraph,
        runs: usize,
    ) -> Result<Vec<Id>, ExperimentError> {
        if runs == 0 {
            return Err(ExperimentError::NoRuns);
        }
        let candidates = self.sampler.candidates(graph);
        if candidates.is_empty() {
            return Err(ExperimentError::NoCandidates);
        }
        Ok(candidates)
    }

    fn one_run(&self, graph: &CityGraph, run: usize, target: Id) -> RunRecord {
        let outcome = match self.engine.anonymize(graph, target) {
            Ok(result) => match graph.coord(target) {
                Ok(coord) => RunOutcome::Anonymized {
                    density: result.density,
                    selected_k: result.effective_k,
                    location_error: Euclidean.distance(coord, result.region.anonymized),
                    region_area: result.region.bbox_area(),
                    region_occupancy: result.region.occupancy,
                    region: result.region.members,
                },
                Err(error) => RunOutcome::Failed {
                    error: error.to_string(),
                },
            },
            Err(AnonymityError::Unsatisfiable {
                density,
                selected_k,
                reachable_occupancy,
                component_size,
            }) => RunOutcome::Exhausted {
                density,
                selected_k,
                component_size,
                reachable_occupancy,
            },
            Err(error @ AnonymityError::Graph(_)) => RunOutcome::Failed {
                error: error.to_string(),
            },
        };
        RunRecord {
            run,
            target,
            outcome,
        }
    }
}
