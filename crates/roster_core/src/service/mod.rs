//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into use-case level APIs.
//! - Keep boundary adapters decoupled from storage details.

pub mod assignment_service;
pub mod directory_service;
