//! The storage engine (spec.md §3/§4.4): rows, hash indexes, tables,
//! databases and the JSON catalog.

pub mod catalog;
pub mod database;
pub mod table;

pub use catalog::Catalog;
pub use database::Database;
pub use table::{Row, Table};
