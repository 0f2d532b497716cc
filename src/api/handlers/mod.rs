//! HTTP request handlers.

pub mod commands;
pub mod delete;
pub mod health;
