//! Command implementations for strata-cmd

use anyhow::{Context, Result};
use std::sync::Arc;
use strata_io::{FileReader, ReadAt};

use crate::utils::validate_file_exists;

pub mod generate;
pub mod inspect;
pub mod read;

/// Opens a local file as a positional reader.
pub fn open_file(path: &str) -> Result<Arc<dyn ReadAt>> {
    validate_file_exists(path)?;
    let reader =
        FileReader::open(path).with_context(|| format!("Failed to open file: {path}"))?;
    Ok(Arc::new(reader))
}
