pub mod config;
pub mod error;
pub mod facilities;
pub mod outputs;
pub mod pipelines;
pub mod report;
pub mod watersheds;
