//! Core types and utilities for volkeep.
//!
//! This crate provides the foundational types shared by every volkeep crate:
//!
//! - **Names**: parsing of observed volume names into group and period suffix
//! - **Volume types**: intervals, replication settings, permissions, access policies
//! - **Error types**: Common error definitions shared across crates
//!
//! # Example
//!
//! ```
//! use volkeep_core::{volume_name, ObservedName};
//!
//! let name = volume_name("logs", "20240105");
//! assert_eq!(name, "logs_20240105");
//!
//! let observed = ObservedName::parse(&name);
//! assert_eq!(observed.group(), "logs");
//! assert_eq!(observed.suffix_value(), Some(20_240_105));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod names;
pub mod types;

pub use error::{CoreError, Result};
pub use names::{volume_name, ObservedName};
pub use types::{
    AccessPolicy, AccountingEntityType, CreationInterval, CredentialRef, FsPermission,
    ReplicationType, VolumeInstance, VolumeProperties,
};
