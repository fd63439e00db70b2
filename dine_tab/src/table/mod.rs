//! Physical restaurant tables.
//!
//! Tables are set up by the restaurant outside this crate. The registry reads
//! them to seed a new tab's capacity and to show which tables are taken.

pub mod models;
pub mod registry;

pub use models::{Table, TableOccupancy, TableState};
pub use registry::TableRegistry;
