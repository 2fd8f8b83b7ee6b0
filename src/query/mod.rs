pub mod freshness;
pub mod orchestrator;
pub mod protocol;
