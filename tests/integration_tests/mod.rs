//! Integration tests module
//!
//! End-to-end tests for swarmcrawl against the in-memory coordination store:
//! - Frontier dedup and no-loss guarantees
//! - Distribution strategies
//! - Worker liveness
//! - Complete take → fetch → store → submit loop

pub mod distribution_test;
pub mod end_to_end_test;
pub mod fixtures;
pub mod frontier_test;
