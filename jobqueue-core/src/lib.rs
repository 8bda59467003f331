//! Job Queue Core
//!
//! Core types and validation for the job queue control-plane client.
//!
//! This crate contains:
//! - Domain types: the job record, its closed enums, runtime settings,
//!   component specifications, data-plane configuration and orchestration
//!   matching results
//! - DTOs: new-job input, job results, metrics and patches sent back to the API
//! - Definitions: the validators that turn raw JSON into typed records
//!
//! Nothing in here performs I/O. Remote collaborators live in `jobqueue-client`.

#[macro_use]
mod macros;

pub mod definition;
pub mod domain;
pub mod dto;
pub mod error;
pub mod normalize;
pub mod timestamp;

pub use error::{Result, ValidationError};
