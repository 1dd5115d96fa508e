//! Row-level data model: the fixed metric set and one cycle's reading.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One logged quantity. Declaration order is the CSV column order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    /// Air temperature in °C
    Temperature,
    /// Relative humidity in %
    Humidity,
    /// Soil moisture in % (0 = dry)
    SoilMoisture,
    /// Light level in %
    Light,
    /// Rain level in % (0 = dry)
    Rain,
    /// Barometric pressure in hPa
    Pressure,
    /// Altitude in metres, derived from pressure
    Altitude,
}

impl Metric {
    /// Number of metrics in a row.
    pub const COUNT: usize = 7;

    /// Every metric, in column order.
    pub const ALL: [Metric; Metric::COUNT] = [
        Metric::Temperature,
        Metric::Humidity,
        Metric::SoilMoisture,
        Metric::Light,
        Metric::Rain,
        Metric::Pressure,
        Metric::Altitude,
    ];

    /// Key used in configuration files and log fields.
    pub fn key(self) -> &'static str {
        match self {
            Metric::Temperature => "temperature",
            Metric::Humidity => "humidity",
            Metric::SoilMoisture => "soil_moisture",
            Metric::Light => "light",
            Metric::Rain => "rain",
            Metric::Pressure => "pressure",
            Metric::Altitude => "altitude",
        }
    }

    /// Column title written to the journal header.
    pub fn column_header(self) -> &'static str {
        match self {
            Metric::Temperature => "Temperature (°C)",
            Metric::Humidity => "Humidity (%)",
            Metric::SoilMoisture => "Soil Moisture (%)",
            Metric::Light => "Light Level (%)",
            Metric::Rain => "Rain Level (%)",
            Metric::Pressure => "Pressure (hPa)",
            Metric::Altitude => "Altitude (m)",
        }
    }

    /// Metric this one is computed from, if it is not measured directly.
    pub fn derived_from(self) -> Option<Metric> {
        match self {
            Metric::Altitude => Some(Metric::Pressure),
            _ => None,
        }
    }

    /// Metrics computed from this one.
    pub fn dependents(self) -> impl Iterator<Item = Metric> {
        Metric::ALL
            .into_iter()
            .filter(move |metric| metric.derived_from() == Some(self))
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Metric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Metric::ALL
            .into_iter()
            .find(|metric| metric.key() == s)
            .ok_or_else(|| {
                let known: Vec<&str> = Metric::ALL.iter().map(|m| m.key()).collect();
                format!("Unknown metric '{}'. Must be one of: {}", s, known.join(", "))
            })
    }
}

/// Values gathered during one acquisition cycle.
///
/// The timestamp is taken once per cycle and shared by every metric in the
/// row. A metric is `None` when its adapter failed or validation rejected it.
#[derive(Clone, Debug, PartialEq)]
pub struct SensorReading {
    timestamp: DateTime<Local>,
    values: [Option<f64>; Metric::COUNT],
}

impl SensorReading {
    /// An all-missing reading stamped with `timestamp`.
    pub fn empty(timestamp: DateTime<Local>) -> Self {
        Self {
            timestamp,
            values: [None; Metric::COUNT],
        }
    }

    /// Time the cycle started.
    pub fn timestamp(&self) -> DateTime<Local> {
        self.timestamp
    }

    /// Value of `metric`, `None` if missing.
    pub fn get(&self, metric: Metric) -> Option<f64> {
        self.values[metric.index()]
    }

    /// Record an accepted value.
    pub fn set(&mut self, metric: Metric, value: f64) {
        self.values[metric.index()] = Some(value);
    }

    /// Mark `metric` missing.
    pub fn clear(&mut self, metric: Metric) {
        self.values[metric.index()] = None;
    }

    /// `(metric, value)` pairs in column order.
    pub fn iter(&self) -> impl Iterator<Item = (Metric, Option<f64>)> + '_ {
        Metric::ALL.into_iter().map(move |m| (m, self.get(m)))
    }

    /// Number of metrics that carry a value.
    pub fn present(&self) -> usize {
        self.values.iter().filter(|v| v.is_some()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_metric_keys_round_trip() {
        for metric in Metric::ALL {
            assert_eq!(metric.key().parse::<Metric>(), Ok(metric));
        }
        assert!("wind_speed".parse::<Metric>().is_err());
    }

    #[test]
    fn test_altitude_depends_on_pressure() {
        assert_eq!(Metric::Altitude.derived_from(), Some(Metric::Pressure));
        assert_eq!(
            Metric::Pressure.dependents().collect::<Vec<_>>(),
            vec![Metric::Altitude]
        );
        assert_eq!(Metric::Temperature.dependents().count(), 0);
    }

    #[test]
    fn test_empty_reading_has_no_values() {
        let ts = Local.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let reading = SensorReading::empty(ts);
        assert_eq!(reading.present(), 0);
        assert_eq!(reading.timestamp(), ts);
        assert!(reading.iter().all(|(_, v)| v.is_none()));
    }

    #[test]
    fn test_zero_is_a_value() {
        let ts = Local.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let mut reading = SensorReading::empty(ts);
        reading.set(Metric::Rain, 0.0);
        assert_eq!(reading.get(Metric::Rain), Some(0.0));
        assert_eq!(reading.present(), 1);

        reading.clear(Metric::Rain);
        assert_eq!(reading.get(Metric::Rain), None);
    }
}
