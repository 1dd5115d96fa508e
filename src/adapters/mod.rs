//! Sensor adapter implementations
//!
//! Each adapter wraps one physical sensing concern and turns driver output into
//! metric values. The set is closed: every row is built from exactly these
//! variants, so the metric coverage is checked at compile time by the `match`
//! in [`SensorAdapter::read`].
//!
//! The three analog adapters do not own the converter. The acquisition cycle
//! owns it and lends it to each of them in turn.

pub mod analog;
pub mod barometric;
pub mod thermo_hygro;

pub use analog::AnalogAdapter;
pub use barometric::{altitude_from_pressure, BarometricAdapter, SEA_LEVEL_PRESSURE_HPA};
pub use thermo_hygro::ThermoHygroAdapter;

use crate::error::SensorError;
use crate::error_recovery::RetryPolicy;
use crate::hardware::AnalogConverter;
use crate::measurement::Metric;

/// Result of one metric produced by an adapter that reached its sensor.
pub type MetricOutcome = (Metric, Result<f64, SensorError>);

/// The closed set of sensor adapters.
pub enum SensorAdapter {
    /// Temperature and humidity.
    ThermoHygro(ThermoHygroAdapter),
    /// Pressure and altitude.
    Barometric(BarometricAdapter),
    /// One converter channel.
    Analog(AnalogAdapter),
}

impl SensorAdapter {
    /// Short name used in log records.
    pub fn name(&self) -> &'static str {
        match self {
            SensorAdapter::ThermoHygro(_) => "thermo_hygro",
            SensorAdapter::Barometric(_) => "barometric",
            SensorAdapter::Analog(adapter) => adapter.metric().key(),
        }
    }

    /// Metrics this adapter fills.
    pub fn metrics(&self) -> &[Metric] {
        match self {
            SensorAdapter::ThermoHygro(_) => &ThermoHygroAdapter::METRICS,
            SensorAdapter::Barometric(_) => &BarometricAdapter::METRICS,
            SensorAdapter::Analog(adapter) => std::slice::from_ref(adapter.metric_ref()),
        }
    }

    /// Read the sensor once, retrying transient faults per `retry`.
    ///
    /// `Err` means the whole adapter failed and every metric in
    /// [`metrics`](Self::metrics) is missing for this cycle. `Ok` may still
    /// carry individual metric failures.
    pub async fn read(
        &mut self,
        converter: &mut (dyn AnalogConverter + 'static),
        retry: &RetryPolicy,
    ) -> Result<Vec<MetricOutcome>, SensorError> {
        match self {
            SensorAdapter::ThermoHygro(adapter) => adapter.read(retry).await,
            SensorAdapter::Barometric(adapter) => adapter.read(retry).await,
            SensorAdapter::Analog(adapter) => adapter.read(converter, retry).await,
        }
    }
}
