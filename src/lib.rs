//! hostdb - machine inventory with a CLI-shaped command API.
//!
//! The crate is organised leaf-first:
//!
//! - [`model`]: inventory records (machines and their sub-resources)
//! - [`storage`]: the [`storage::ResourceRepository`] and its redb implementation
//! - [`virt`]: pluggable virtualization backends
//! - [`form`]: input schemas shared by describe and execute
//! - [`command`]: command registry and dispatcher
//! - [`delete`]: the delete handlers for each item
//! - [`api`]: HTTP surface

pub mod api;
pub mod auth;
pub mod command;
pub mod config;
pub mod delete;
pub mod error;
pub mod form;
pub mod model;
pub mod storage;
pub mod virt;

pub use error::{Error, Result};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
