use std::collections::{HashSet, VecDeque};

use city_graph::{CityGraph, GraphError, Id};

/// Sums occupancy over `target` and every node within `depth` hops of it.
///
/// Distance is hop count over edges, the same metric region expansion
/// uses. Each node is counted once; `depth` 0 reads the target alone.
pub fn local_density(graph: &CityGraph, target: Id, depth: u32) -> Result<u64, GraphError> {
    let mut sum = u64::from(graph.occupancy(target)?);
    let mut seen = HashSet::from([target]);
    let mut frontier = VecDeque::from([(target, 0u32)]);

    while let Some((id, hops)) = frontier.pop_front() {
        if hops == depth {
            continue;
        }
        for neighbor in graph.neighbors(id)? {
            if seen.insert(neighbor) {
                sum += u64::from(graph.occupancy(neighbor)?);
                frontier.push_back((neighbor, hops + 1));
            }
        }
    }
    Ok(sum)
}
