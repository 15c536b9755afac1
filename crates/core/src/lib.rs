//! Core business logic for flock.
//!
//! Services wrap the repositories of `flock-db` with validation, id
//! generation and logging. Writes take a [`flock_db::UnitOfWork`] and never
//! commit on their own; [`SearchService::begin`] opens a unit whose
//! committed changes are mirrored into the search index.

pub mod services;

pub use services::*;
