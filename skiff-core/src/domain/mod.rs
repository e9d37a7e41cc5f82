//! Core domain types
//!
//! This module contains the core domain structures used across Skiff services.
//! These types are shared between the node daemon (which persists them) and
//! the client/CLI (which display them).

pub mod app;
pub mod job;
pub mod node;
