use std::collections::HashSet;

use geo::{BoundingRect, Centroid};
use geo_types::{point, MultiPoint, Point};
use serde::Serialize;
use thiserror::Error;

use city_graph::{CityGraph, GraphError, Id};

#[derive(Debug, Error, PartialEq)]
pub enum ExpansionError {
    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(
        "required k {required_k} exceeds the {reachable_occupancy} users reachable over {component_size} nodes"
    )]
    UnsatisfiableK {
        required_k: u32,
        reachable_occupancy: u64,
        component_size: usize,
    },
}

/// Visit order among nodes at the same hop distance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum TieBreak {
    #[default]
    AscendingId,
    DescendingId,
}

/// How the anonymized location is derived from the member coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum CentroidMode {
    /// Plain mean; every member weighs the same.
    #[default]
    Unweighted,
    /// Members weigh as many times as they have users.
    OccupancyWeighted,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExpandOptions {
    pub tie_break: TieBreak,
    pub centroid: CentroidMode,
}

/// Connected set of nodes hiding a target among at least k users.
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    /// Member ids in the order expansion visited them; the target comes
    /// first.
    pub members: Vec<Id>,
    /// Coordinate of each member, aligned with `members`.
    pub coords: Vec<Point<f64>>,
    /// Users covered by the region.
    pub occupancy: u64,
    /// Location published in place of the target coordinate.
    pub anonymized: Point<f64>,
}

impl Region {
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, id: Id) -> bool {
        self.members.contains(&id)
    }

    /// Area of the axis-aligned bounding box around the members.
    pub fn bbox_area(&self) -> f64 {
        self.coords
            .iter()
            .copied()
            .collect::<MultiPoint<_>>()
            .bounding_rect()
            .map_or(0.0, |rect| rect.width() * rect.height())
    }
}

/// Grows a region outwards from `target` until it covers `required_k`
/// users.
///
/// Nodes are visited breadth first, one hop layer at a time, each layer
/// ordered by `options.tie_break`; growth stops on the first node that
/// lifts the running occupancy sum to `required_k`. Nodes after that one,
/// same layer included, stay outside the region. Exhausting the reachable
/// component below the threshold is an error, not a smaller region.
pub fn expand_region(
    graph: &CityGraph,
    target: Id,
    required_k: u32,
    options: &ExpandOptions,
) -> Result<Region, ExpansionError> {
    let required = u64::from(required_k);
    let mut members = Vec::new();
    let mut coords = Vec::new();
    let mut weights = Vec::new();
    let mut sum = 0u64;

    let mut seen = HashSet::from([target]);
    let mut layer = vec![target];

    while !layer.is_empty() {
        for &id in &layer {
            let node = graph.node(id)?;
            members.push(id);
            coords.push(node.coord);
            weights.push(node.occupancy);
            sum += u64::from(node.occupancy);
            if sum >= required {
                let anonymized = anonymized_location(&coords, &weights, options.centroid);
                return Ok(Region {
                    members,
                    coords,
                    occupancy: sum,
                    anonymized,
                });
            }
        }

        let mut next = Vec::new();
        for &id in &layer {
            for neighbor in graph.neighbors(id)? {
                if seen.insert(neighbor) {
                    next.push(neighbor);
                }
            }
        }
        next.sort_unstable();
        if options.tie_break == TieBreak::DescendingId {
            next.reverse();
        }
        layer = next;
    }

    Err(ExpansionError::UnsatisfiableK {
        required_k,
        reachable_occupancy: sum,
        component_size: members.len(),
    })
}

fn anonymized_location(coords: &[Point<f64>], weights: &[u32], mode: CentroidMode) -> Point<f64> {
    match mode {
        CentroidMode::Unweighted => unweighted_centroid(coords),
        CentroidMode::OccupancyWeighted => {
            let total: u64 = weights.iter().map(|&w| u64::from(w)).sum();
            // a zero-occupancy region falls back to the plain mean
            if total == 0 {
                return unweighted_centroid(coords);
            }
            let (x, y) = coords
                .iter()
                .zip(weights)
                .fold((0.0, 0.0), |(x, y), (coord, &weight)| {
                    let w = f64::from(weight);
                    (x + coord.x() * w, y + coord.y() * w)
                });
            point! {x: x / total as f64, y: y / total as f64}
        }
    }
}

fn unweighted_centroid(coords: &[Point<f64>]) -> Point<f64> {
    coords
        .iter()
        .copied()
        .collect::<MultiPoint<_>>()
        .centroid()
        // coords always holds at least the target
        .unwrap_or(point! {x: 0.0, y: 0.0})
}
