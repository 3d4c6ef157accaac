//! localgw CLI library.
//!
//! Subcommand handlers, template discovery, and logging setup for the
//! `localgw` binary.

pub mod commands;
pub mod discovery;
pub mod logging;
