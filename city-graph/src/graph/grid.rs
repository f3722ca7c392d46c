use rand::Rng;
use serde::Serialize;
use thiserror::Error;

use geo_types::point;

use crate::{Id, Node, Nodes};

#[derive(Debug, Error, PartialEq)]
pub enum GridError {
    #[error("diagonal chance {0} is outside [0, 1]")]
    DiagonalChance(f64),

    #[error("grid has no intersections")]
    EmptyGrid,
}

/// Layout of a synthetic square street grid.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct GridConfig {
    /// Intersections per side.
    pub size: usize,
    /// Probability of a diagonal shortcut at every other intersection.
    pub diagonal_chance: f64,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            size: 5,
            diagonal_chance: 0.0,
        }
    }
}

/// Builds a square street grid of `size * size` intersections.
///
/// Intersection `(row, col)` gets id `row * size + col` and coordinate
/// `(col, row)`; streets connect horizontal neighbors, avenues vertical
/// ones. Every other intersection may additionally get a diagonal shortcut
/// to its lower right neighbor, drawn with `diagonal_chance`. A chance of
/// zero draws nothing from `rng`.
pub fn grid_city(
    config: &GridConfig,
    rng: &mut impl Rng,
) -> Result<(Nodes, Vec<(Id, Id)>), GridError> {
    if !(0.0..=1.0).contains(&config.diagonal_chance) {
        return Err(GridError::DiagonalChance(config.diagonal_chance));
    }
    if config.size == 0 {
        return Err(GridError::EmptyGrid);
    }

    let size = config.size;
    let id_at = |row: usize, col: usize| (row * size + col) as Id;

    let nodes: Nodes = (0..size)
        .flat_map(|row| {
            (0..size).map(move |col| Node {
                id: id_at(row, col),
                coord: point! {x: col as f64, y: row as f64},
                occupancy: 0,
            })
        })
        .collect();

    let mut edges = Vec::with_capacity(2 * size * (size - 1));
    for row in 0..size {
        for col in 0..size {
            if col + 1 < size {
                edges.push((id_at(row, col), id_at(row, col + 1)));
            }
            if row + 1 < size {
                edges.push((id_at(row, col), id_at(row + 1, col)));
            }
        }
    }

    if config.diagonal_chance > 0.0 {
        for row in (0..size.saturating_sub(1)).step_by(2) {
            for col in (0..size - 1).step_by(2) {
                if rng.random_bool(config.diagonal_chance) {
                    edges.push((id_at(row, col), id_at(row + 1, col + 1)));
                }
            }
        }
    }

    Ok((nodes, edges))
}

/// Drops `users` onto the table one at a time, each on a node drawn
/// uniformly at random.
pub fn populate(nodes: &mut Nodes, users: u32, rng: &mut impl Rng) -> Result<(), GridError> {
    if nodes.is_empty() {
        return Err(GridError::EmptyGrid);
    }
    for _ in 0..users {
        let at = rng.random_range(0..nodes.len());
        nodes.occupancy[at] += 1;
    }
    Ok(())
}
