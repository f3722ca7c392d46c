use std::collections::HashMap;

use itertools::Itertools;
use petgraph::graph::{NodeIndex, UnGraph};
use thiserror::Error;

use geo_types::Point;

use crate::{Id, Node, Nodes};

#[derive(Debug, Error, PartialEq)]
pub enum GraphError {
    #[error("node {0} is not part of the graph")]
    InvalidNode(Id),

    #[error("node {0} appears more than once in the table")]
    DuplicateNode(Id),

    #[error("edge ({0}, {1}) references a node that is not in the table")]
    DanglingEdge(Id, Id),

    #[error("edge ({0}, {0}) is a self loop")]
    SelfLoop(Id),

    #[error("edge ({0}, {1}) appears more than once")]
    DuplicateEdge(Id, Id),
}

/// Read-only connectivity snapshot over a [`Nodes`] table.
///
/// Edges are undirected, symmetric and duplicate free; occupancy is copied
/// out of the table at construction and never changes afterwards, so a
/// snapshot can be shared by any number of concurrent queries.
#[derive(Debug, Clone)]
pub struct CityGraph {
    graph: UnGraph<Node, ()>,
    index: HashMap<Id, NodeIndex>,
}

impl CityGraph {
    /// Builds a snapshot from a node table and an undirected edge list.
    ///
    /// Rejects duplicate node ids, edges mentioning unknown nodes, self
    /// loops and edges listed twice (in either orientation).
    pub fn new(nodes: &Nodes, edges: &[(Id, Id)]) -> Result<Self, GraphError> {
        let mut graph = UnGraph::<Node, ()>::with_capacity(nodes.len(), edges.len());
        let mut index = HashMap::<Id, NodeIndex>::with_capacity(nodes.len());

        for ((&id, &coord), &occupancy) in nodes
            .id
            .iter()
            .zip(nodes.coord.iter())
            .zip(nodes.occupancy.iter())
        {
            let ix = graph.add_node(Node {
                id,
                coord,
                occupancy,
            });
            if index.insert(id, ix).is_some() {
                return Err(GraphError::DuplicateNode(id));
            }
        }

        for &(a, b) in edges {
            if a == b {
                return Err(GraphError::SelfLoop(a));
            }
            let ia = *index.get(&a).ok_or(GraphError::DanglingEdge(a, b))?;
            let ib = *index.get(&b).ok_or(GraphError::DanglingEdge(a, b))?;
            if graph.contains_edge(ia, ib) {
                return Err(GraphError::DuplicateEdge(a, b));
            }
            graph.add_edge(ia, ib, ());
        }

        Ok(Self { graph, index })
    }

    fn node_index(&self, id: Id) -> Result<NodeIndex, GraphError> {
        self.index
            .get(&id)
            .copied()
            .ok_or(GraphError::InvalidNode(id))
    }

    pub fn contains(&self, id: Id) -> bool {
        self.index.contains_key(&id)
    }

    /// Ids adjacent to `id`, in ascending order.
    pub fn neighbors(&self, id: Id) -> Result<Vec<Id>, GraphError> {
        let ix = self.node_index(id)?;
        Ok(self
            .graph
            .neighbors(ix)
            .map(|n| self.graph[n].id)
            .sorted_unstable()
            .collect())
    }

    pub fn occupancy(&self, id: Id) -> Result<u32, GraphError> {
        Ok(self.graph[self.node_index(id)?].occupancy)
    }

    pub fn coord(&self, id: Id) -> Result<Point<f64>, GraphError> {
        Ok(self.graph[self.node_index(id)?].coord)
    }

    pub fn node(&self, id: Id) -> Result<&Node, GraphError> {
        Ok(&self.graph[self.node_index(id)?])
    }

    /// All nodes in table order.
    pub fn all_nodes(&self) -> impl Iterator<Item = &Node> + '_ {
        self.graph.node_weights()
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Sum of user counts over every node of the snapshot.
    pub fn total_occupancy(&self) -> u64 {
        self.graph
            .node_weights()
            .map(|n| u64::from(n.occupancy))
            .sum()
    }
}
