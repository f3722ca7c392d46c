pub mod table;
pub use table::*;

pub mod graph;
pub use graph::*;

#[inline]
pub(crate) fn default<T: Default>() -> T {
    T::default()
}

pub type Id = u64;
