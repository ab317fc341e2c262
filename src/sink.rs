// src/sink.rs

use arrow::{csv::WriterBuilder, record_batch::RecordBatch};
use parquet::{arrow::ArrowWriter, basic::Compression, file::properties::WriterProperties};
use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};
use tracing::{error, info};

use crate::config::OutputFormat;
use crate::error::Result;

/// Write `batch` verbatim to `{dir}/{name}.{csv|parquet}`, replacing any
/// previous file. Written to a temp file first, then renamed.
pub fn write_interim(
    dir: impl AsRef<Path>,
    name: &str,
    batch: &RecordBatch,
    format: OutputFormat,
) -> Result<PathBuf> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir)?;

    let ext = match format {
        OutputFormat::Csv => "csv",
        OutputFormat::Parquet => "parquet",
    };
    let path = dir.join(format!("{}.{}", name, ext));
    let tmp_path = dir.join(format!(".{}.{}.tmp", name, ext));
    let written: Result<()> = File::create(&tmp_path)
        .map_err(Into::into)
        .and_then(|file| write_file(file, batch, format))
        .and_then(|()| fs::rename(&tmp_path, &path).map_err(Into::into));
    if let Err(e) = written {
        error!(path = %tmp_path.display(), "interim write failed: {}", e);
        let _ = fs::remove_file(&tmp_path);
        return Err(e);
    }

    info!(path = %path.display(), rows = batch.num_rows(), "wrote interim table");
    Ok(path)
}

fn write_file(file: File, batch: &RecordBatch, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Csv => {
            let mut writer = WriterBuilder::new()
                .with_header(true)
                .build(BufWriter::new(file));
            writer.write(batch)?;
            writer.into_inner().flush()?;
        }
        OutputFormat::Parquet => {
            let props = WriterProperties::builder()
                .set_compression(Compression::SNAPPY)
                .build();
            let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))?;
            writer.write(batch)?;
            writer.close()?;
        }
    }
    Ok(())
}
