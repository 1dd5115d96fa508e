//! Daily-rotating CSV journal with clean feature flag handling.
//!
//! One file per local calendar day, named `<prefix><YYYY-MM-DD>.csv`. Rows are
//! appended and synced to disk one at a time; the header is written only when
//! a file is created empty, so restarting the logger on the same day keeps
//! appending to the existing file.
use crate::error::{AppResult, DaqError};
use crate::measurement::{Metric, SensorReading};
use chrono::NaiveDate;
use std::path::{Path, PathBuf};

/// Header of the leading timestamp column.
pub const TIMESTAMP_HEADER: &str = "Timestamp";

/// Column headers in file order.
pub fn header() -> Vec<&'static str> {
    std::iter::once(TIMESTAMP_HEADER)
        .chain(Metric::ALL.iter().map(|metric| metric.column_header()))
        .collect()
}

/// Two-decimal rendering in shortest form; missing values are empty.
pub fn format_value(value: Option<f64>) -> String {
    match value {
        Some(value) => {
            let rounded = (value * 100.0).round() / 100.0;
            // avoid "-0"
            let rounded = if rounded == 0.0 { 0.0 } else { rounded };
            rounded.to_string()
        }
        None => String::new(),
    }
}

fn file_name(prefix: &str, date: NaiveDate) -> String {
    format!("{}{}.csv", prefix, date.format("%Y-%m-%d"))
}

// ============================================================================
// CSV Journal
// ============================================================================

#[cfg(feature = "storage_csv")]
mod csv_enabled {
    use super::*;
    use crate::config::check_timestamp_format;
    use std::fs::{File, OpenOptions};
    use tracing::{debug, info};

    struct OpenDay {
        date: NaiveDate,
        path: PathBuf,
        writer: csv::Writer<File>,
    }

    /// Append-only CSV files, one per local day.
    pub struct CsvJournal {
        folder: PathBuf,
        prefix: String,
        timestamp_format: String,
        current: Option<OpenDay>,
    }

    impl CsvJournal {
        /// Prepare a journal in `folder`, creating the folder if needed.
        ///
        /// No file is opened until the first [`append`](Self::append).
        pub fn create(
            folder: impl Into<PathBuf>,
            prefix: impl Into<String>,
            timestamp_format: impl Into<String>,
        ) -> AppResult<Self> {
            let folder = folder.into();
            let timestamp_format = timestamp_format.into();
            check_timestamp_format(&timestamp_format)?;
            std::fs::create_dir_all(&folder)
                .map_err(|source| DaqError::journal(&folder, source))?;
            info!(folder = %folder.display(), "CSV journal initialized");
            Ok(Self {
                folder,
                prefix: prefix.into(),
                timestamp_format,
                current: None,
            })
        }

        /// Folder holding the daily files.
        pub fn folder(&self) -> &Path {
            &self.folder
        }

        /// Date of the open file, if any.
        pub fn current_date(&self) -> Option<NaiveDate> {
            self.current.as_ref().map(|day| day.date)
        }

        /// File receiving rows stamped on `date`.
        pub fn path_for(&self, date: NaiveDate) -> PathBuf {
            self.folder.join(file_name(&self.prefix, date))
        }

        /// Write one row into the file of the reading's local date.
        ///
        /// On failure the open handle is dropped; the next call reopens it.
        pub fn append(&mut self, reading: &SensorReading) -> AppResult<()> {
            let result = self.write_row(reading);
            if result.is_err() {
                self.current = None;
            }
            result
        }

        fn write_row(&mut self, reading: &SensorReading) -> AppResult<()> {
            let date = reading.timestamp().date_naive();
            if self.current_date() != Some(date) {
                self.rotate(date)?;
            }
            let timestamp = reading.timestamp().format(&self.timestamp_format).to_string();
            let day = match self.current.as_mut() {
                Some(day) => day,
                None => return Err(DaqError::Configuration("journal has no open file".into())),
            };

            let record = std::iter::once(timestamp)
                .chain(reading.iter().map(|(_, value)| format_value(value)));
            day.writer
                .write_record(record)
                .map_err(|err| DaqError::journal(&day.path, err))?;
            day.writer
                .flush()
                .map_err(|err| DaqError::journal(&day.path, err))?;
            day.writer
                .get_ref()
                .sync_data()
                .map_err(|err| DaqError::journal(&day.path, err))?;
            debug!(path = %day.path.display(), present = reading.present(), "row appended");
            Ok(())
        }

        fn rotate(&mut self, date: NaiveDate) -> AppResult<()> {
            self.close()?;
            let path = self.path_for(date);
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .map_err(|source| DaqError::journal(&path, source))?;
            let is_new = file
                .metadata()
                .map_err(|source| DaqError::journal(&path, source))?
                .len()
                == 0;

            let mut writer = csv::WriterBuilder::new()
                .has_headers(false)
                .from_writer(file);
            if is_new {
                writer
                    .write_record(header())
                    .map_err(|err| DaqError::journal(&path, err))?;
            }
            info!(path = %path.display(), new_file = is_new, "journal file opened");
            self.current = Some(OpenDay { date, path, writer });
            Ok(())
        }

        /// Flush and sync the open file, then release it.
        pub fn close(&mut self) -> AppResult<()> {
            if let Some(mut day) = self.current.take() {
                day.writer
                    .flush()
                    .map_err(|err| DaqError::journal(&day.path, err))?;
                day.writer
                    .get_ref()
                    .sync_all()
                    .map_err(|err| DaqError::journal(&day.path, err))?;
                info!(path = %day.path.display(), "journal file closed");
            }
            Ok(())
        }
    }
}

#[cfg(not(feature = "storage_csv"))]
mod csv_disabled {
    use super::*;

    /// Stand-in refusing every write when CSV support is compiled out.
    pub struct CsvJournal {
        folder: PathBuf,
        prefix: String,
    }

    impl CsvJournal {
        /// Always `FeatureNotEnabled`.
        pub fn create(
            _folder: impl Into<PathBuf>,
            _prefix: impl Into<String>,
            _timestamp_format: impl Into<String>,
        ) -> AppResult<Self> {
            Err(DaqError::FeatureNotEnabled("storage_csv".to_string()))
        }

        /// Folder holding the daily files.
        pub fn folder(&self) -> &Path {
            &self.folder
        }

        /// Always `None`.
        pub fn current_date(&self) -> Option<NaiveDate> {
            None
        }

        /// File receiving rows stamped on `date`.
        pub fn path_for(&self, date: NaiveDate) -> PathBuf {
            self.folder.join(file_name(&self.prefix, date))
        }

        /// Always `FeatureNotEnabled`.
        pub fn append(&mut self, _reading: &SensorReading) -> AppResult<()> {
            Err(DaqError::FeatureNotEnabled("storage_csv".to_string()))
        }

        /// Nothing to close.
        pub fn close(&mut self) -> AppResult<()> {
            Ok(())
        }
    }
}

#[cfg(feature = "storage_csv")]
pub use csv_enabled::CsvJournal;

#[cfg(not(feature = "storage_csv"))]
pub use csv_disabled::CsvJournal;
