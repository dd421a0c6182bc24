//! Annoroute CLI library.
//!
//! Each invocation loads the state directory snapshot, runs one command
//! against an in-process `AnnotationService`, and writes the snapshot back.
//!
//! # Modules
//!
//! - `cli` - argument definitions using clap
//! - `commands` - command handlers

pub mod cli;
pub mod commands;
