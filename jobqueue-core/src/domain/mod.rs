//! Core domain types
//!
//! This module contains the structures shared by every part of the client:
//! the job record and its enums, runtime settings, component specifications,
//! data-plane configuration and orchestration matching results.

pub mod component;
pub mod data_plane;
pub mod job;
pub mod job_type;
pub mod orchestration;
pub mod runtime;
