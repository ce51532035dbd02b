//! Classroom Rehearsal API Library Crate
//!
//! This library contains the web service around the rehearsal core:
//! configuration, the application state, HTTP handlers, the two-phase event
//! stream, and routing. The `api` binary is a thin wrapper around it.

pub mod config;
pub mod handlers;
pub mod models;
pub mod router;
pub mod state;
pub mod stream;
