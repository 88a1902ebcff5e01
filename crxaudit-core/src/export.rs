// CSV export and resumable batch planning

use crate::error::Result;
use crate::record::{CSV_COLUMNS, NormalizedRecord};
use std::fs::File;
use std::io::Write;
use std::ops::Range;
use std::path::{Path, PathBuf};

pub const DEFAULT_BATCH_SIZE: usize = 10_000;

/// Write records with the fixed header to any writer.
pub fn write_records<W: Write>(writer: W, records: &[NormalizedRecord]) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(CSV_COLUMNS)?;
    for record in records {
        csv_writer.write_record(record.csv_row())?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Write records to `path`. The file only appears under its final name once
/// it is complete, so an interrupted run never leaves a batch that looks done.
pub fn write_csv(path: &Path, records: &[NormalizedRecord]) -> Result<()> {
    let partial = path.with_extension("csv.partial");
    write_records(File::create(&partial)?, records)?;
    std::fs::rename(&partial, path)?;
    Ok(())
}

/// One slice of the catalog and the dump file it is written to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchPlan {
    pub index: usize,
    pub range: Range<usize>,
    pub output: PathBuf,
}

impl BatchPlan {
    pub fn file_name(&self) -> String {
        batch_file_name(self.index)
    }

    /// Batches whose dump already exists are skipped on resume.
    pub fn is_done(&self) -> bool {
        self.output.exists()
    }
}

pub fn batch_file_name(index: usize) -> String {
    format!("dump{}.csv", index)
}

/// Cut `total` items into `batch_size` slices, each bound to
/// `output_dir/dump{N}.csv`.
pub fn plan_batches(total: usize, batch_size: usize, output_dir: &Path) -> Vec<BatchPlan> {
    let batch_size = batch_size.max(1);
    (0..total.div_ceil(batch_size))
        .map(|index| {
            let start = index * batch_size;
            BatchPlan {
                index,
                range: start..(start + batch_size).min(total),
                output: output_dir.join(batch_file_name(index)),
            }
        })
        .collect()
}
