//! # cf-frame
//!
//! Stratified observation tables for CalibFit.
//!
//! An [`ObservationTable`] is a set of rows whose columns split into
//! *stratifiers* (columns identifying a comparison group, never null) and
//! *channels* (measured or derived quantities). Every transform returns a new
//! table obeying the same split; column buffers are shared until written.
//!
//! ## Modules
//!
//! - [`table`]: construction, accessors, grouping, equality
//! - [`filter`]: row predicates and channel trimming
//! - [`join`]: `merge`, `find_missing_tuples`, outer joins
//! - [`stratified`]: the [`Stratified`] capability for wrapper table types
//! - [`io`]: CSV files and one-channel-per-file directories
//! - [`batch`]: Arrow `RecordBatch` import/export

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod batch;
pub mod filter;
pub mod io;
pub mod join;
pub mod stratified;
pub mod table;

pub use filter::{Comparator, Condition};
pub use join::MissingTuples;
pub use stratified::Stratified;
pub use table::{Column, Groups, ObservationTable};
