mod city_graph;
pub use city_graph::*;

mod grid;
pub use grid::*;
