//! Read command implementation

use anyhow::{Context, Result};
use arrow::util::pretty::print_batches;
use strata_reader::{ChunkedReaderBuilder, ReadLimits};

use crate::{commands::open_file, utils::format_size};

pub struct ReadArgs {
    pub config: Option<String>,
    pub output_limit: Option<u64>,
    pub input_limit: Option<u64>,
    pub skip: u64,
    pub num_rows: Option<u64>,
    pub columns: Option<Vec<String>>,
    pub head: usize,
    pub paths: Vec<String>,
}

/// Per-chunk line of the read report.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkReport {
    pub rows: usize,
    pub bytes: usize,
    pub rows_per_source: Vec<u64>,
}

pub fn run(args: ReadArgs) -> Result<()> {
    let head = args.head;
    let mut total_rows = 0;
    let reports = read(args, |index, chunk| {
        println!(
            "chunk {index}: {} rows, {}, per source {:?}",
            chunk.num_rows(),
            format_size(chunk.batch.get_array_memory_size() as u64),
            chunk.rows_per_source
        );
        total_rows += chunk.num_rows();
        if head > 0 && chunk.num_rows() > 0 {
            print_batches(&[chunk.batch.slice(0, head.min(chunk.num_rows()))])?;
        }
        Ok(())
    })?;
    println!("{} chunks, {total_rows} rows", reports.len());
    Ok(())
}

/// Loads the limits: the config file first, then explicit overrides.
pub fn load_limits(args: &ReadArgs) -> Result<ReadLimits> {
    let mut limits = match &args.config {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config: {path}"))?;
            ReadLimits::from_json(&json).with_context(|| format!("Invalid config: {path}"))?
        }
        None => ReadLimits::default(),
    };
    if let Some(limit) = args.output_limit {
        limits.output_size_limit = limit;
    }
    if let Some(limit) = args.input_limit {
        limits.input_size_limit = limit;
    }
    Ok(limits)
}

/// Runs the chunked reader, calling `on_chunk` for every chunk.
pub fn read(
    args: ReadArgs,
    mut on_chunk: impl FnMut(usize, &strata_reader::ReadChunk) -> Result<()>,
) -> Result<Vec<ChunkReport>> {
    let limits = load_limits(&args)?;
    log::debug!("read limits: {limits:?}");

    let mut builder = ChunkedReaderBuilder::new()
        .with_limits(limits)
        .with_skip_rows(args.skip);
    for path in &args.paths {
        builder = builder.with_sources([open_file(path)?]);
    }
    if let Some(num_rows) = args.num_rows {
        builder = builder.with_num_rows(num_rows);
    }
    if let Some(columns) = args.columns {
        builder = builder.with_columns(columns);
    }

    let mut reader = builder.build().context("Failed to open the read session")?;
    let mut reports = Vec::new();
    while reader.has_next() {
        let chunk = reader.read_chunk()?;
        on_chunk(reports.len(), &chunk)?;
        reports.push(ChunkReport {
            rows: chunk.num_rows(),
            bytes: chunk.batch.get_array_memory_size(),
            rows_per_source: chunk.rows_per_source,
        });
    }
    Ok(reports)
}
