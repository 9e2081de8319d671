//! Persistence layer for the data-quality execution engine.
//!
//! This crate owns the PostgreSQL schema and every query against it. It has
//! no knowledge of connectors, cron scheduling, or alert delivery -- those
//! live in `dqe-core` and call back into the functions here.

pub mod config;
pub mod models;
pub mod pool;
pub mod queries;
