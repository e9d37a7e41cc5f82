//! Skiff Core
//!
//! Core types and abstractions for the Skiff cluster control plane.
//!
//! This crate contains:
//! - Domain types: Core cluster entities (Node, Job, App)
//! - DTOs: Data transfer objects exchanged between nodes, the CLI and users
//! - Header names used for peer, gateway and registration authentication
//! - Backoff arithmetic for the registration and heartbeat loops

pub mod backoff;
pub mod domain;
pub mod dto;
pub mod headers;
