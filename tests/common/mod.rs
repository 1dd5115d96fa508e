//! Shared fixtures: scripted sensors and a daemon writing into a temp folder.
#![allow(dead_code)]

use async_trait::async_trait;
use env_daq::config::Settings;
use env_daq::daemon::LoggerDaemon;
use env_daq::error::SensorError;
use env_daq::hardware::{AnalogConverter, Barometer, Hygrometer, SensorSuite};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Probe answering from two queues; the last entry repeats forever.
pub struct ScriptedHygrometer {
    temperature: VecDeque<Result<f64, SensorError>>,
    humidity: VecDeque<Result<f64, SensorError>>,
    pub calls: Arc<AtomicU32>,
}

impl ScriptedHygrometer {
    pub fn new(
        temperature: Vec<Result<f64, SensorError>>,
        humidity: Vec<Result<f64, SensorError>>,
    ) -> Self {
        Self {
            temperature: temperature.into(),
            humidity: humidity.into(),
            calls: Arc::new(AtomicU32::new(0)),
        }
    }

    pub fn steady(temperature: f64, humidity: f64) -> Self {
        Self::new(vec![Ok(temperature)], vec![Ok(humidity)])
    }
}

fn next<T: Clone>(queue: &mut VecDeque<T>) -> T {
    if queue.len() > 1 {
        queue.pop_front().unwrap()
    } else {
        queue.front().cloned().unwrap()
    }
}

#[async_trait(?Send)]
impl Hygrometer for ScriptedHygrometer {
    async fn read_temperature(&mut self) -> Result<f64, SensorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        next(&mut self.temperature)
    }

    async fn read_humidity(&mut self) -> Result<f64, SensorError> {
        next(&mut self.humidity)
    }
}

pub struct FixedBarometer(pub Result<f64, SensorError>);

#[async_trait(?Send)]
impl Barometer for FixedBarometer {
    async fn read_pressure(&mut self) -> Result<f64, SensorError> {
        self.0.clone()
    }
}

/// Converter returning one fixed code per channel, or a fixed error.
pub struct FixedConverter(pub Result<[u16; 8], SensorError>);

impl FixedConverter {
    /// Soil dry, full light, rain plate dry.
    pub fn dry_and_bright() -> Self {
        Self(Ok([930, 0, 1023, 0, 0, 0, 0, 0]))
    }
}

#[async_trait(?Send)]
impl AnalogConverter for FixedConverter {
    async fn read_raw(&mut self, channel: u8) -> Result<u16, SensorError> {
        self.0.clone().map(|codes| codes[usize::from(channel)])
    }
}

pub fn suite(
    hygrometer: ScriptedHygrometer,
    barometer: FixedBarometer,
    converter: FixedConverter,
) -> SensorSuite {
    SensorSuite {
        hygrometer: Box::new(hygrometer),
        barometer: Box::new(barometer),
        converter: Box::new(converter),
    }
}

/// Settings writing into `folder`, temperature limited to [-10, 50] and
/// pressure to [300, 1100], `attempts` tries per sensor without delay.
pub fn settings(folder: &Path, attempts: u32) -> Settings {
    let toml = format!(
        r#"
        [logger]
        data_folder = '{}'
        log_interval = 1

        [validation]
        enabled = true

        [validation.limits.temperature]
        min = -10.0
        max = 50.0

        [validation.limits.humidity]
        min = 0.0
        max = 100.0

        [validation.limits.pressure]
        min = 300.0
        max = 1100.0

        [hardware]
        backend = "simulated"

        [hardware.retry]
        attempts = {}
        delay_ms = 0
        "#,
        folder.display(),
        attempts
    );
    Settings::from_toml_str(&toml).unwrap()
}

pub fn daemon(folder: &Path, suite: SensorSuite) -> LoggerDaemon {
    LoggerDaemon::new(&settings(folder, 1), suite).unwrap()
}

/// The only CSV file in `folder`.
pub fn journal_file(folder: &Path) -> PathBuf {
    let mut files: Vec<PathBuf> = std::fs::read_dir(folder)
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "csv"))
        .collect();
    assert_eq!(files.len(), 1, "expected one journal file, found {files:?}");
    files.remove(0)
}

/// Data rows of the journal, split into fields, header excluded.
pub fn rows(folder: &Path) -> Vec<Vec<String>> {
    let contents = std::fs::read_to_string(journal_file(folder)).unwrap();
    let mut lines = contents.lines();
    assert!(lines.next().unwrap().starts_with("Timestamp,"));
    lines
        .map(|line| line.split(',').map(str::to_string).collect())
        .collect()
}
