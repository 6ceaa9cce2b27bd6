//! Ingestion fabric that harvests wind and weather observations from
//! heterogeneous upstream sources and normalises them into a canonical
//! station-and-measurement store.
//!
//! This crate is organised as a library (the ingestion engine, admin jobs,
//! scheduler and adapter contract) plus a thin `main.rs` binary that wires
//! configuration, logging and the CLI around it. See `DESIGN.md` for the
//! grounding of each module against the winds.mobi Python implementation
//! this crate was distilled from.

pub mod adapters;
pub mod admin;
pub mod cache;
pub mod config;
pub mod engine;
pub mod errors;
pub mod geo;
pub mod key_value_stores;
pub mod scheduler;
pub mod store;
pub mod units;
