pub mod analytics;
pub mod domain;
pub mod table;

pub use domain::{DispatchRow, Observation, PtuRow};
pub use table::{load_table, write_table, TableError, TableRow};
