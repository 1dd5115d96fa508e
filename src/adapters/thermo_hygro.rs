//! Temperature and humidity probe.

use super::MetricOutcome;
use crate::error::SensorError;
use crate::error_recovery::{retry_transient, RetryPolicy};
use crate::hardware::Hygrometer;
use crate::measurement::Metric;

/// Temperature and humidity from one probe.
///
/// Temperature is read first. If the probe does not answer at all both
/// metrics are lost; a humidity-only failure leaves temperature intact.
pub struct ThermoHygroAdapter {
    probe: Box<dyn Hygrometer>,
}

impl ThermoHygroAdapter {
    /// Metrics filled, in column order.
    pub const METRICS: [Metric; 2] = [Metric::Temperature, Metric::Humidity];

    /// Adapter over `probe`.
    pub fn new(probe: Box<dyn Hygrometer>) -> Self {
        Self { probe }
    }

    /// Read temperature, then humidity.
    pub async fn read(&mut self, retry: &RetryPolicy) -> Result<Vec<MetricOutcome>, SensorError> {
        let temperature =
            retry_transient(self.probe.as_mut(), retry, |probe| probe.read_temperature()).await?;
        let humidity =
            retry_transient(self.probe.as_mut(), retry, |probe| probe.read_humidity()).await;

        Ok(vec![
            (Metric::Temperature, Ok(temperature)),
            (Metric::Humidity, humidity),
        ])
    }
}
