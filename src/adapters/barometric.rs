//! Barometric pressure and the altitude estimate.

use super::MetricOutcome;
use crate::error::SensorError;
use crate::error_recovery::{retry_transient, RetryPolicy};
use crate::hardware::Barometer;
use crate::measurement::Metric;

/// Reference pressure for the altitude estimate.
pub const SEA_LEVEL_PRESSURE_HPA: f64 = 1013.25;

/// International barometric formula, metres above the reference level.
pub fn altitude_from_pressure(pressure_hpa: f64) -> f64 {
    44330.0 * (1.0 - (pressure_hpa / SEA_LEVEL_PRESSURE_HPA).powf(1.0 / 5.255))
}

/// Pressure plus the altitude derived from it.
pub struct BarometricAdapter {
    barometer: Box<dyn Barometer>,
}

impl BarometricAdapter {
    /// Metrics filled, in column order.
    pub const METRICS: [Metric; 2] = [Metric::Pressure, Metric::Altitude];

    /// Adapter over `barometer`.
    pub fn new(barometer: Box<dyn Barometer>) -> Self {
        Self { barometer }
    }

    /// Read pressure once and derive altitude from it.
    pub async fn read(&mut self, retry: &RetryPolicy) -> Result<Vec<MetricOutcome>, SensorError> {
        let pressure =
            retry_transient(self.barometer.as_mut(), retry, |sensor| sensor.read_pressure())
                .await?;
        if !pressure.is_finite() || pressure <= 0.0 {
            return Err(SensorError::InvalidData(format!(
                "pressure {} hPa",
                pressure
            )));
        }

        Ok(vec![
            (Metric::Pressure, Ok(pressure)),
            (Metric::Altitude, Ok(altitude_from_pressure(pressure))),
        ])
    }
}
