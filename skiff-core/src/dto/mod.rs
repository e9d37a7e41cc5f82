//! Data Transfer Objects for inter-service communication
//!
//! This module contains DTOs used for communication between Skiff nodes,
//! the CLI and other API consumers. DTOs are lightweight request/response
//! bodies; domain entities live in [`crate::domain`].

pub mod app;
pub mod error;
pub mod node;
