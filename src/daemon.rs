//! The outer acquisition loop.
//!
//! `LoggerDaemon` owns the acquisition cycle and the journal. Each iteration
//! runs one cycle, appends the row, then sleeps for the configured interval.
//! Shutdown is only observed at the sleep boundary, so a cycle in progress is
//! always finished and written before the journal is closed.

use crate::acquisition::{AcquisitionCycle, CycleReport};
use crate::config::Settings;
use crate::data::CsvJournal;
use crate::error::AppResult;
use crate::error_recovery::RetryPolicy;
use crate::hardware::SensorSuite;
use chrono::{DateTime, Local};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

/// Source of row timestamps.
pub trait Clock: Send {
    /// Current local time.
    fn now(&self) -> DateTime<Local>;
}

/// Local wall clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// Whether [`LoggerDaemon::run`] is looping.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DaemonState {
    /// Inside the run loop.
    Running,
    /// Not started yet, or shut down.
    Stopped,
}

/// Timed loop of acquisition cycles feeding the journal.
pub struct LoggerDaemon {
    cycle: AcquisitionCycle,
    journal: CsvJournal,
    interval: Duration,
    clock: Box<dyn Clock>,
    last_timestamp: Option<DateTime<Local>>,
    rows_written: u64,
    state: DaemonState,
}

impl LoggerDaemon {
    /// Wire the daemon from validated settings.
    ///
    /// Fails if the validation limits are inconsistent or the data folder
    /// cannot be created.
    pub fn new(settings: &Settings, suite: SensorSuite) -> AppResult<Self> {
        let policy = settings.validation_policy()?;
        let retry = RetryPolicy::from(settings.hardware.retry);
        let cycle = AcquisitionCycle::new(suite, &settings.hardware.channels, policy, retry);
        let journal = CsvJournal::create(
            &settings.logger.data_folder,
            settings.logger.file_prefix.as_str(),
            settings.logger.timestamp_format.as_str(),
        )?;
        Ok(Self::with_parts(
            cycle,
            journal,
            settings.log_interval(),
            Box::new(SystemClock),
        ))
    }

    /// Assemble a daemon from prepared parts, starting stopped.
    pub fn with_parts(
        cycle: AcquisitionCycle,
        journal: CsvJournal,
        interval: Duration,
        clock: Box<dyn Clock>,
    ) -> Self {
        Self {
            cycle,
            journal,
            interval,
            clock,
            last_timestamp: None,
            rows_written: 0,
            state: DaemonState::Stopped,
        }
    }

    /// Current loop state.
    pub fn state(&self) -> DaemonState {
        self.state
    }

    /// Sleep between cycles.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Rows successfully appended since construction.
    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }

    /// The journal rows go to.
    pub fn journal(&self) -> &CsvJournal {
        &self.journal
    }

    /// Timestamp for the next row, never earlier than the previous one.
    fn next_timestamp(&mut self) -> DateTime<Local> {
        let now = self.clock.now();
        let timestamp = match self.last_timestamp {
            Some(last) if now < last => {
                warn!(now = %now, previous = %last, "clock stepped backwards, reusing previous timestamp");
                last
            }
            _ => now,
        };
        self.last_timestamp = Some(timestamp);
        timestamp
    }

    /// One cycle and one append.
    ///
    /// A journal failure is logged and returned; the cycle's report is lost
    /// with it but the daemon stays usable.
    pub async fn tick(&mut self) -> AppResult<CycleReport> {
        let timestamp = self.next_timestamp();
        let report = self.cycle.run(timestamp).await;
        if let Err(err) = self.journal.append(&report.reading) {
            error!(error = %err, "failed to append row");
            return Err(err);
        }
        self.rows_written += 1;
        debug!(rows = self.rows_written, "row written");
        Ok(report)
    }

    /// Run until `shutdown` resolves, then close the journal.
    pub async fn run<F>(&mut self, shutdown: F) -> AppResult<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        self.state = DaemonState::Running;
        info!(interval_secs = self.interval.as_secs_f64(), "logger running");

        while self.state == DaemonState::Running {
            // errors are already logged by tick
            let _ = self.tick().await;

            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!("shutdown requested");
                    self.state = DaemonState::Stopped;
                }
                _ = sleep(self.interval) => {}
            }
        }

        self.stop()
    }

    /// Close the journal and mark the daemon stopped.
    pub fn stop(&mut self) -> AppResult<()> {
        self.state = DaemonState::Stopped;
        self.journal.close()?;
        info!(rows = self.rows_written, "logger stopped");
        Ok(())
    }
}

#[cfg(all(test, feature = "storage_csv"))]
mod tests {
    use super::*;
    use crate::config::ChannelsConfig;
    use crate::error::DaqError;
    use crate::validation::ValidationPolicy;
    use chrono::TimeZone;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use tempfile::tempdir;

    struct ScriptedClock(RefCell<VecDeque<DateTime<Local>>>);

    impl Clock for ScriptedClock {
        fn now(&self) -> DateTime<Local> {
            let mut times = self.0.borrow_mut();
            if times.len() > 1 {
                times.pop_front().unwrap()
            } else {
                *times.front().unwrap()
            }
        }
    }

    fn daemon(folder: &std::path::Path, times: Vec<DateTime<Local>>) -> LoggerDaemon {
        let cycle = AcquisitionCycle::new(
            SensorSuite::simulated(),
            &ChannelsConfig::default(),
            ValidationPolicy::disabled(),
            RetryPolicy::no_retry(),
        );
        let journal = CsvJournal::create(folder, "sensor_data_", "%Y-%m-%d %H:%M:%S").unwrap();
        LoggerDaemon::with_parts(
            cycle,
            journal,
            Duration::from_millis(5),
            Box::new(ScriptedClock(RefCell::new(times.into()))),
        )
    }

    fn at(hour: u32, minute: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 6, 1, hour, minute, 0).unwrap()
    }

    #[tokio::test]
    async fn test_backwards_clock_reuses_previous_timestamp() {
        let dir = tempdir().unwrap();
        let mut daemon = daemon(dir.path(), vec![at(12, 0), at(11, 59), at(12, 1)]);

        let first = daemon.tick().await.unwrap();
        let second = daemon.tick().await.unwrap();
        let third = daemon.tick().await.unwrap();

        assert_eq!(first.reading.timestamp(), at(12, 0));
        assert_eq!(second.reading.timestamp(), at(12, 0));
        assert_eq!(third.reading.timestamp(), at(12, 1));
        assert_eq!(daemon.rows_written(), 3);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let dir = tempdir().unwrap();
        let mut daemon = daemon(dir.path(), vec![at(8, 0)]);

        daemon.run(sleep(Duration::from_millis(30))).await.unwrap();

        assert_eq!(daemon.state(), DaemonState::Stopped);
        assert!(daemon.rows_written() >= 1);
        let contents =
            std::fs::read_to_string(dir.path().join("sensor_data_2024-06-01.csv")).unwrap();
        assert_eq!(contents.lines().count() as u64, daemon.rows_written() + 1);
    }

    #[tokio::test]
    async fn test_tick_survives_journal_error() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("sensor_data_2024-06-01.csv");
        std::fs::create_dir(&blocker).unwrap();
        let mut daemon = daemon(dir.path(), vec![at(9, 0), at(9, 1)]);

        let err = daemon.tick().await.unwrap_err();
        assert!(matches!(err, DaqError::Journal { .. }), "got {err}");
        assert_eq!(daemon.rows_written(), 0);
        assert_eq!(daemon.state(), DaemonState::Stopped);
        assert_eq!(daemon.journal().current_date(), None);

        std::fs::remove_dir(&blocker).unwrap();
        let report = daemon.tick().await.unwrap();
        assert_eq!(report.reading.timestamp(), at(9, 1));
        assert_eq!(daemon.rows_written(), 1);
        daemon.stop().unwrap();

        let contents = std::fs::read_to_string(&blocker).unwrap();
        assert_eq!(contents.lines().count(), 2);
    }

    #[tokio::test]
    async fn test_run_keeps_going_after_journal_error() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("sensor_data_2024-06-01.csv");
        std::fs::create_dir(&blocker).unwrap();
        let mut daemon = daemon(dir.path(), vec![at(10, 0)]);

        let unblock = blocker.clone();
        daemon
            .run(async move {
                sleep(Duration::from_millis(20)).await;
                std::fs::remove_dir(&unblock).unwrap();
                sleep(Duration::from_millis(30)).await;
            })
            .await
            .unwrap();

        assert_eq!(daemon.state(), DaemonState::Stopped);
        assert!(daemon.rows_written() >= 1);
        let contents = std::fs::read_to_string(&blocker).unwrap();
        // failed ticks are not counted
        assert_eq!(contents.lines().count() as u64, daemon.rows_written() + 1);
    }

    #[tokio::test]
    async fn test_ready_shutdown_still_writes_one_row() {
        let dir = tempdir().unwrap();
        let mut daemon = daemon(dir.path(), vec![at(8, 0)]);
        daemon.run(std::future::ready(())).await.unwrap();
        assert_eq!(daemon.rows_written(), 1);
        assert_eq!(daemon.journal().current_date(), None);
    }
}
