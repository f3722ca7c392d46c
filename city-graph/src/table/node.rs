use geo_types::Point;

use crate::{default, Id};

use super::*;

#[derive(Debug, Clone, Copy)]
pub struct NodeKey(pub Id);

/// One intersection of the city: where it sits and how many users are
/// currently assigned to it. Occupancy is written during population setup
/// and treated as frozen once a [`crate::CityGraph`] snapshot is taken.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Node {
    pub id: Id,
    pub coord: Point<f64>,
    pub occupancy: u32,
}

#[derive(Debug, Default, Clone)]
pub struct Nodes {
    pub id: Vec<Id>, // Primary key
    pub coord: Vec<Point<f64>>,
    pub occupancy: Vec<u32>,
}

impl Nodes {
    pub fn len(&self) -> usize {
        self.id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.id.is_empty()
    }
}

impl FromIterator<Node> for Nodes {
    fn from_iter<I: IntoIterator<Item = Node>>(iter: I) -> Self {
        let mut slf: Self = default();
        slf.insert_many(iter);
        slf
    }
}

impl Insertable<Node> for Nodes {
    type Key = NodeKey;

    fn insert(&mut self, data: Node) -> Self::Key {
        // Does not insert duplicates; node ids are caller supplied
        if self.id.iter().any(|&id| id == data.id) {
            return NodeKey(data.id);
        }

        self.id.push(data.id);
        self.coord.push(data.coord);
        self.occupancy.push(data.occupancy);

        NodeKey(data.id)
    }
}

impl Queryable<NodeKey> for Nodes {
    fn find_index(&self, key: &NodeKey) -> Option<usize> {
        self.id.iter().position(|&x| x == key.0)
    }
}
