pub mod density;
pub use density::*;

pub mod selector;
pub use selector::*;

pub mod region;
pub use region::*;

pub mod engine;
pub use engine::*;

pub mod experiment;
pub use experiment::*;
