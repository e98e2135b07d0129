//! Generate command implementation

use anyhow::{Context, Result};
use clap::ValueEnum;
use strata_format::Codec;
use strata_testkit::{FileBuilder, Shape, generate_batch};

use crate::utils::format_size;

/// Nesting shape of the generated columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ShapeArg {
    Flat,
    Strings,
    Struct,
    List,
    StructOfList,
    ListOfStruct,
}

impl From<ShapeArg> for Shape {
    fn from(shape: ShapeArg) -> Shape {
        match shape {
            ShapeArg::Flat => Shape::Flat,
            ShapeArg::Strings => Shape::Strings,
            ShapeArg::Struct => Shape::Struct,
            ShapeArg::List => Shape::List,
            ShapeArg::StructOfList => Shape::StructOfList,
            ShapeArg::ListOfStruct => Shape::ListOfStruct,
        }
    }
}

pub struct GenerateArgs {
    pub shape: ShapeArg,
    pub rows: usize,
    pub codec: Codec,
    pub rows_per_row_group: usize,
    pub rows_per_page: usize,
    pub seed: u64,
    pub output: String,
}

pub fn run(args: GenerateArgs) -> Result<()> {
    let shape = Shape::from(args.shape);
    let batch = generate_batch(shape, args.rows, args.seed)
        .with_context(|| format!("Failed to generate {:?} data", args.shape))?;
    let builder = FileBuilder::new(shape.schema())
        .with_codec(args.codec)
        .with_rows_per_row_group(args.rows_per_row_group)
        .with_rows_per_page(args.rows_per_page);
    let file = builder.build_batch(&batch)?;
    std::fs::write(&args.output, &file)
        .with_context(|| format!("Failed to write file: {}", args.output))?;
    println!(
        "Wrote {} rows ({}) to {}",
        args.rows,
        format_size(file.len() as u64),
        args.output
    );
    Ok(())
}
