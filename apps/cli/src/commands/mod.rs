pub mod evaluate;
pub mod graph;
pub mod suggest;
pub mod validate;
