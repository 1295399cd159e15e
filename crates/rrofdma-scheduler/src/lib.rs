//! rrofdma-scheduler: Round-robin OFDMA scheduler
//!
//! This crate decides, once per transmission opportunity:
//! - which stations are served in a DL MU PPDU (round-robin selection)
//! - how the channel is split into RUs and assigned to them
//! - whether the opportunity is DL OFDMA, UL OFDMA or single-user

pub mod finalizer;
pub mod packer;
pub mod scheduler;
pub mod selector;
pub mod strategy;

pub use packer::{Candidate, ClassifiedBatch, LegacyPacking, Packing};
pub use scheduler::OfdmaScheduler;
pub use strategy::{strategy_for, GreedyPacking, PackingStrategy};
