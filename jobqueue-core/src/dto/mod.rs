//! Data Transfer Objects
//!
//! Shapes exchanged with the Queue API that are not full job records: the
//! new-job request and the result, metrics and patch payloads a job sends
//! back when it finishes.

pub mod job;
pub mod result;
