//! Infrastructure layer: job queue engine, pipelines, stores.

pub mod jobs;
pub mod pipelines;
pub mod stores;

#[cfg(test)]
mod integration_tests;
