use serde::Serialize;
use thiserror::Error;

use city_graph::{CityGraph, GraphError, Id};

use crate::{
    expand_region, local_density, CentroidMode, ExpandOptions, ExpansionError, KSelector, Region,
    TieBreak,
};

#[derive(Debug, Error, PartialEq)]
pub enum AnonymityError {
    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(
        "k of {selected_k}, chosen at density {density}, exceeds the {reachable_occupancy} users reachable over {component_size} nodes"
    )]
    Unsatisfiable {
        density: u64,
        selected_k: u32,
        reachable_occupancy: u64,
        component_size: usize,
    },
}

/// Knobs shared by every query an engine answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EngineOptions {
    /// Hop radius of the density probe.
    pub depth: u32,
    pub tie_break: TieBreak,
    pub centroid: CentroidMode,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            depth: 1,
            tie_break: TieBreak::AscendingId,
            centroid: CentroidMode::Unweighted,
        }
    }
}

/// Everything a single query produces.
#[derive(Debug, Clone, PartialEq)]
pub struct Anonymization {
    pub region: Region,
    /// Anonymity requirement the selector chose.
    pub effective_k: u32,
    /// Local density the choice was based on.
    pub density: u64,
}

/// Answers anonymization queries: probe density, pick k, grow a region.
///
/// Holds no per-query state, so one engine can serve any number of
/// queries against any number of graph snapshots.
#[derive(Debug, Clone)]
pub struct AnonymizationEngine<S> {
    selector: S,
    options: EngineOptions,
}

impl<S: KSelector> AnonymizationEngine<S> {
    pub fn new(selector: S, options: EngineOptions) -> Self {
        Self { selector, options }
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Hides `target` inside a region covering at least the selected k
    /// users.
    pub fn anonymize(
        &self,
        graph: &CityGraph,
        target: Id,
    ) -> Result<Anonymization, AnonymityError> {
        let density = local_density(graph, target, self.options.depth)?;
        let effective_k = self.selector.select(density);
        let expand = ExpandOptions {
            tie_break: self.options.tie_break,
            centroid: self.options.centroid,
        };
        let region =
            expand_region(graph, target, effective_k, &expand).map_err(|error| match error {
                ExpansionError::Graph(source) => AnonymityError::Graph(source),
                ExpansionError::UnsatisfiableK {
                    required_k,
                    reachable_occupancy,
                    component_size,
                } => AnonymityError::Unsatisfiable {
                    density,
                    selected_k: required_k,
                    reachable_occupancy,
                    component_size,
                },
            })?;
        Ok(Anonymization {
            region,
            effective_k,
            density,
        })
    }
}
