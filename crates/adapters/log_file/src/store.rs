//! Date-partitioned, buffered log files.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::NaiveDate;

use domisafe_app::ports::RecordLog;
use domisafe_domain::error::DomiSafeError;
use domisafe_domain::record::{Category, Payload};
use domisafe_domain::time::{self, Timestamp};

use crate::error::LogStoreError;

struct Partition {
    date: NaiveDate,
    writer: BufWriter<File>,
}

/// Append-only log with one open file per category.
///
/// Every append first runs the rotate-if-needed guard: when the record's
/// UTC date differs from the open partition's date, the old partition is
/// flushed and closed and the new day's file is opened in append mode.
pub struct DailyLogStore {
    dir: PathBuf,
    partitions: Mutex<HashMap<Category, Partition>>,
}

impl DailyLogStore {
    /// Open a store rooted at `dir`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns [`LogStoreError::Io`] when the directory cannot be created.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, LogStoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        tracing::debug!(dir = %dir.display(), "log store opened");
        Ok(Self {
            dir,
            partitions: Mutex::new(HashMap::new()),
        })
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the partition file for `category` on `date`.
    #[must_use]
    pub fn partition_path(&self, category: Category, date: NaiveDate) -> PathBuf {
        self.dir
            .join(format!("{}_{}.txt", date.format("%Y%m%d"), category.as_str()))
    }

    /// Currently open partitions, sorted by category.
    #[must_use]
    pub fn open_partitions(&self) -> Vec<(Category, NaiveDate)> {
        let mut open: Vec<_> = self
            .partitions()
            .iter()
            .map(|(category, partition)| (*category, partition.date))
            .collect();
        open.sort();
        open
    }

    /// Append one already-encoded line to the partition of `category` for
    /// the UTC date of `timestamp`.
    ///
    /// # Errors
    ///
    /// - [`LogStoreError::Rotation`] when the day's partition cannot be opened.
    /// - [`LogStoreError::Io`] when the write or the rotation flush fails.
    ///   A partition whose write failed is closed and reopened by the next
    ///   append.
    pub fn append_line(
        &self,
        category: Category,
        timestamp: &Timestamp,
        line: &str,
    ) -> Result<(), LogStoreError> {
        let mut partitions = self.partitions();
        let partition = self.rotate_if_needed(&mut partitions, category, time::partition_date(timestamp))?;
        let mut record = String::with_capacity(line.len() + 1);
        record.push_str(line);
        record.push('\n');
        if let Err(err) = partition.writer.write_all(record.as_bytes()) {
            tracing::warn!(error = %err, %category, "log write failed, closing partition");
            partitions.remove(&category);
            return Err(err.into());
        }
        Ok(())
    }

    /// Flush every open partition.
    ///
    /// # Errors
    ///
    /// Returns the first I/O error; the remaining partitions are still flushed.
    pub fn flush_all(&self) -> Result<(), LogStoreError> {
        let mut first_error = None;
        for (category, partition) in self.partitions().iter_mut() {
            if let Err(err) = partition.writer.flush() {
                tracing::warn!(error = %err, %category, "log flush failed");
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), |err| Err(err.into()))
    }

    /// Flush and close every open partition.
    ///
    /// # Errors
    ///
    /// Returns the flush error, if any. Partitions are closed regardless.
    pub fn close(&self) -> Result<(), LogStoreError> {
        let result = self.flush_all();
        self.partitions().clear();
        result
    }

    fn rotate_if_needed<'a>(
        &self,
        partitions: &'a mut HashMap<Category, Partition>,
        category: Category,
        date: NaiveDate,
    ) -> Result<&'a mut Partition, LogStoreError> {
        if let Some(open) = partitions.get_mut(&category)
            && open.date != date
        {
            // Keep the old partition open when its data cannot be flushed.
            open.writer.flush()?;
            tracing::info!(%category, from = %open.date, to = %date, "rotating log partition");
            partitions.remove(&category);
        }

        match partitions.entry(category) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let path = self.partition_path(category, date);
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&path)
                    .map_err(|source| LogStoreError::Rotation {
                        path: path.clone(),
                        source,
                    })?;
                tracing::debug!(path = %path.display(), "log partition opened");
                Ok(entry.insert(Partition {
                    date,
                    writer: BufWriter::new(file),
                }))
            }
        }
    }

    fn partitions(&self) -> MutexGuard<'_, HashMap<Category, Partition>> {
        self.partitions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl RecordLog for DailyLogStore {
    fn append(&self, payload: &Payload) -> Result<(), DomiSafeError> {
        let line = payload.to_line().map_err(LogStoreError::from)?;
        self.append_line(payload.category(), &payload.timestamp(), &line)?;
        Ok(())
    }

    fn flush(&self) -> Result<(), DomiSafeError> {
        self.flush_all()?;
        Ok(())
    }
}

impl Drop for DailyLogStore {
    fn drop(&mut self) {
        if let Err(err) = self.flush_all() {
            tracing::warn!(error = %err, "log flush on drop failed");
        }
    }
}
