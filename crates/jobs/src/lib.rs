pub mod prune;
pub mod runner;

pub use prune::PruneJob;
pub use runner::JobRunner;
