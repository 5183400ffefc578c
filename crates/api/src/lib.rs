//! `jobtrail-api` — HTTP surface over the tracker and its job queue.

pub mod app;
pub mod config;
