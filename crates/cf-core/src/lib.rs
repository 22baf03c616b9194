//! # cf-core
//!
//! Core types shared by every CalibFit crate.
//!
//! This crate provides:
//! - the workspace-wide [`Error`] taxonomy and [`Result`] alias
//! - the cell [`Value`] model used by stratified observation tables

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::{Value, ValueKey};
