//! One sample-validate cycle over every adapter.
//!
//! Adapters are read in a fixed order and independently of each other: a
//! failure in one never prevents the others from being read. The cycle always
//! produces a [`SensorReading`], possibly with every metric missing, together
//! with the list of faults it saw along the way.

use crate::adapters::{AnalogAdapter, BarometricAdapter, SensorAdapter, ThermoHygroAdapter};
use crate::config::ChannelsConfig;
use crate::error::SensorError;
use crate::error_recovery::RetryPolicy;
use crate::hardware::{AnalogConverter, SensorSuite};
use crate::measurement::{Metric, SensorReading};
use crate::validation::{Rejection, ValidationPolicy, Verdict};
use chrono::{DateTime, Local};
use tracing::{debug, warn};

/// Why one or more metrics are missing from a row.
#[derive(Clone, Debug, PartialEq)]
pub enum FaultKind {
    /// The sensor failed or returned unusable data.
    Sensor(SensorError),
    /// The value read fine but failed validation.
    Rejected(Rejection),
}

/// A fault observed during a cycle.
#[derive(Clone, Debug, PartialEq)]
pub struct Fault {
    /// Name of the adapter that produced it.
    pub adapter: &'static str,
    /// Metrics left missing, including values derived from them.
    pub metrics: Vec<Metric>,
    /// What went wrong.
    pub kind: FaultKind,
}

/// Result of one cycle.
#[derive(Clone, Debug, PartialEq)]
pub struct CycleReport {
    /// The row to journal.
    pub reading: SensorReading,
    /// Faults in adapter order.
    pub faults: Vec<Fault>,
}

impl CycleReport {
    /// True when every metric was read and accepted.
    pub fn is_clean(&self) -> bool {
        self.faults.is_empty()
    }
}

/// The adapter set plus the policies applied to every reading.
pub struct AcquisitionCycle {
    adapters: Vec<SensorAdapter>,
    converter: Box<dyn AnalogConverter>,
    policy: ValidationPolicy,
    retry: RetryPolicy,
}

impl AcquisitionCycle {
    /// Build the standard adapter set on top of `suite`.
    pub fn new(
        suite: SensorSuite,
        channels: &ChannelsConfig,
        policy: ValidationPolicy,
        retry: RetryPolicy,
    ) -> Self {
        let adapters = vec![
            SensorAdapter::ThermoHygro(ThermoHygroAdapter::new(suite.hygrometer)),
            SensorAdapter::Barometric(BarometricAdapter::new(suite.barometer)),
            SensorAdapter::Analog(AnalogAdapter::new(
                Metric::SoilMoisture,
                channels.soil_moisture,
            )),
            SensorAdapter::Analog(AnalogAdapter::new(Metric::Light, channels.light)),
            SensorAdapter::Analog(AnalogAdapter::new(Metric::Rain, channels.rain)),
        ];
        Self {
            adapters,
            converter: suite.converter,
            policy,
            retry,
        }
    }

    /// Adapters in read order.
    pub fn adapters(&self) -> &[SensorAdapter] {
        &self.adapters
    }

    /// Validation applied to every value.
    pub fn policy(&self) -> &ValidationPolicy {
        &self.policy
    }

    /// Read every adapter once and assemble the row for `timestamp`.
    pub async fn run(&mut self, timestamp: DateTime<Local>) -> CycleReport {
        let mut reading = SensorReading::empty(timestamp);
        let mut faults = Vec::new();

        for adapter in self.adapters.iter_mut() {
            let name = adapter.name();
            match adapter.read(self.converter.as_mut(), &self.retry).await {
                Ok(outcomes) => {
                    for (metric, outcome) in outcomes {
                        match outcome.and_then(|value| finite(metric, value)) {
                            Ok(value) => match self.policy.check(metric, value) {
                                Verdict::Accept(value) => reading.set(metric, value),
                                Verdict::Reject(rejection) => {
                                    warn!(
                                        adapter = name,
                                        metric = %metric,
                                        value,
                                        bounds = %rejection.bounds,
                                        reason = %rejection.reason,
                                        "reading rejected"
                                    );
                                    faults.push(Fault {
                                        adapter: name,
                                        metrics: with_dependents(metric),
                                        kind: FaultKind::Rejected(rejection),
                                    });
                                }
                            },
                            Err(error) => {
                                warn!(adapter = name, metric = %metric, %error, "metric unavailable");
                                faults.push(Fault {
                                    adapter: name,
                                    metrics: with_dependents(metric),
                                    kind: FaultKind::Sensor(error),
                                });
                            }
                        }
                    }
                }
                Err(error) => {
                    warn!(adapter = name, %error, "sensor read failed");
                    faults.push(Fault {
                        adapter: name,
                        metrics: adapter.metrics().to_vec(),
                        kind: FaultKind::Sensor(error),
                    });
                }
            }
        }

        // a derived value never outlives the value it was computed from
        for metric in Metric::ALL {
            if let Some(source) = metric.derived_from() {
                if reading.get(source).is_none() {
                    reading.clear(metric);
                }
            }
        }

        debug!(
            present = reading.present(),
            faults = faults.len(),
            "cycle complete"
        );
        CycleReport { reading, faults }
    }
}

fn with_dependents(metric: Metric) -> Vec<Metric> {
    std::iter::once(metric).chain(metric.dependents()).collect()
}

fn finite(metric: Metric, value: f64) -> Result<f64, SensorError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(SensorError::InvalidData(format!("{} is {}", metric, value)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::Barometer;
    use crate::validation::Limits;
    use async_trait::async_trait;
    use std::collections::HashMap;

    fn now() -> DateTime<Local> {
        Local::now()
    }

    /// Reads 5 hPa, a plausible number but not a plausible pressure.
    struct LowBarometer;

    #[async_trait(?Send)]
    impl Barometer for LowBarometer {
        async fn read_pressure(&mut self) -> Result<f64, SensorError> {
            Ok(5.0)
        }
    }

    #[tokio::test]
    async fn test_simulated_suite_fills_every_metric() {
        let mut cycle = AcquisitionCycle::new(
            SensorSuite::simulated(),
            &ChannelsConfig::default(),
            ValidationPolicy::disabled(),
            RetryPolicy::no_retry(),
        );
        let report = cycle.run(now()).await;
        assert!(report.is_clean(), "faults: {:?}", report.faults);
        assert_eq!(report.reading.present(), Metric::COUNT);
        for (metric, value) in report.reading.iter() {
            let value = value.unwrap();
            match metric {
                Metric::SoilMoisture | Metric::Light | Metric::Rain => {
                    assert!((0.0..=100.0).contains(&value), "{metric} = {value}")
                }
                _ => {}
            }
        }
    }

    #[tokio::test]
    async fn test_rejected_pressure_drops_altitude() {
        let mut limits = HashMap::new();
        limits.insert(Metric::Pressure, Limits::new(300.0, 1100.0));
        let mut cycle = AcquisitionCycle::new(
            SensorSuite {
                barometer: Box::new(LowBarometer),
                ..SensorSuite::simulated()
            },
            &ChannelsConfig::default(),
            ValidationPolicy::new(true, limits),
            RetryPolicy::no_retry(),
        );
        let report = cycle.run(now()).await;
        assert_eq!(report.reading.get(Metric::Pressure), None);
        assert_eq!(report.reading.get(Metric::Altitude), None);
        assert_eq!(report.reading.present(), Metric::COUNT - 2);
        assert_eq!(report.faults.len(), 1);
        assert_eq!(
            report.faults[0].metrics,
            vec![Metric::Pressure, Metric::Altitude]
        );
        assert!(matches!(report.faults[0].kind, FaultKind::Rejected(_)));
    }

    #[tokio::test]
    async fn test_rejection_leaves_metric_missing() {
        let mut limits = HashMap::new();
        limits.insert(Metric::Temperature, Limits::new(-40.0, -30.0));
        let mut cycle = AcquisitionCycle::new(
            SensorSuite::simulated(),
            &ChannelsConfig::default(),
            ValidationPolicy::new(true, limits),
            RetryPolicy::no_retry(),
        );
        let report = cycle.run(now()).await;
        assert_eq!(report.reading.get(Metric::Temperature), None);
        assert!(report.reading.get(Metric::Humidity).is_some());
        assert!(report.reading.get(Metric::Altitude).is_some());
        assert_eq!(report.faults.len(), 1);
        assert_eq!(report.faults[0].metrics, vec![Metric::Temperature]);
        assert!(matches!(report.faults[0].kind, FaultKind::Rejected(_)));
    }

    #[test]
    fn test_non_finite_is_invalid() {
        assert!(finite(Metric::Humidity, f64::NAN).is_err());
        assert_eq!(finite(Metric::Humidity, 41.0), Ok(41.0));
    }
}
