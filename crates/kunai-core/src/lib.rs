//! Core types of the kunai calendar mutation engine: the event data model, the
//! field diff engine, configuration and core errors.

pub mod config;
pub mod diff;
pub mod error;
pub mod model;
pub mod types;
