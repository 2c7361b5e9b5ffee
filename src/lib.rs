//! Course Advisor - tiered query routing and prerequisite-graph resolution
//! for academic advising.

pub mod ai;
pub mod catalog;
pub mod classify;
pub mod compose;
pub mod config;
pub mod display;
pub mod engine;
pub mod graph;
pub mod router;
pub mod safety;
pub mod server;
