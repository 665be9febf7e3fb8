pub mod csv_table;

pub use csv_table::{prepare_rows, CsvTableSink};
