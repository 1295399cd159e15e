//! rrofdma-sim: In-memory BSS for exercising the scheduler
//!
//! This crate provides:
//! - Scenario files describing a BSS (channel, TXOPs, stations and queues)
//! - A simple HE timing model
//! - `SimulatedBss`, implementing every collaborator trait of rrofdma-core

pub mod bss;
pub mod scenario;
pub mod timing;

pub use bss::SimulatedBss;
pub use scenario::{FrameScenario, Scenario, StationScenario, TxopScenario};
