use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::{de::DeserializeOwned, Serialize};

/// A flattened row that can be persisted in a table file.
pub trait TableRow: Serialize + DeserializeOwned {
    /// Natural identity of the row: parent id plus interval start.
    fn natural_key(&self) -> String;
}

#[derive(thiserror::Error, Debug)]
pub enum TableError {
    #[error("table io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("table csv error: {0}")]
    Csv(#[from] csv::Error),
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> TableError + '_ {
    move |source| TableError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Load every row of a persisted table, in file order.
pub fn load_table<R: DeserializeOwned>(path: &Path) -> Result<Vec<R>, TableError> {
    let file = fs::File::open(path).map_err(io_error(path))?;
    let mut rdr = csv::Reader::from_reader(file);

    let mut rows = Vec::new();
    for result in rdr.deserialize() {
        rows.push(result?);
    }
    Ok(rows)
}

/// Write the full table in one go.
///
/// Rows go to a sibling `.partial` file which is renamed over `path` only
/// after the last row is flushed, so readers never observe a half-written
/// table.
pub fn write_table<R: Serialize>(path: &Path, rows: &[R]) -> Result<usize, TableError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_error(parent))?;
    }

    let partial = partial_path(path);
    let written = write_rows(&partial, rows);
    if written.is_err() {
        let _ = fs::remove_file(&partial);
        return written;
    }

    fs::rename(&partial, path).map_err(io_error(path))?;
    written
}

fn write_rows<R: Serialize>(path: &Path, rows: &[R]) -> Result<usize, TableError> {
    let mut wtr = csv::Writer::from_path(path)?;
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush().map_err(io_error(path))?;
    Ok(rows.len())
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".partial");
    path.with_file_name(name)
}
