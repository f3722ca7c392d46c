pub mod node;
pub use node::*;

/// Type T is insertable into Self
pub trait Insertable<Data> {
    type Key;
    /// Insert Data into Self
    fn insert(&mut self, data: Data) -> Self::Key;
    /// Insert many Data into Self
    fn insert_many<I: IntoIterator<Item = Data>>(&mut self, data: I) -> Vec<Self::Key> {
        data.into_iter().map(|x| self.insert(x)).collect()
    }
}

/// Type Key is queryable from Self
pub trait Queryable<Key> {
    /// Find the index of T in Self
    fn find_index(&self, key: &Key) -> Option<usize>;
    /// Find many indecies of T in Self
    fn find_many_indexes(&self, keys: &[Key]) -> Vec<Option<usize>> {
        keys.iter().map(|x| self.find_index(x)).collect()
    }
}
