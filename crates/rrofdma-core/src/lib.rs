//! rrofdma-core: Core types and traits for the rrofdma scheduler
//!
//! This crate provides the fundamental types used throughout rrofdma:
//! - Station identities, TIDs and access categories
//! - HE resource units and the per-bandwidth RU table
//! - TX vectors, TX parameters and trigger frames
//! - Traffic classes and the injected classifier
//! - Traits for the MAC/PHY collaborators
//! - Configuration types
//! - Error handling

pub mod config;
pub mod error;
pub mod mac;
pub mod ru;
pub mod traffic;
pub mod tx;
pub mod wifi;

pub use config::*;
pub use error::*;
pub use mac::*;
pub use ru::*;
pub use traffic::*;
pub use tx::*;
pub use wifi::*;
