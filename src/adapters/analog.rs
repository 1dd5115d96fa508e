//! Soil moisture, light and rain from converter channels.

use super::MetricOutcome;
use crate::config::{ChannelCalibration, MAX_ADC_CODE};
use crate::error::SensorError;
use crate::error_recovery::{retry_transient, RetryPolicy};
use crate::hardware::AnalogConverter;
use crate::measurement::Metric;

/// One converter channel rescaled to 0-100 %.
pub struct AnalogAdapter {
    metric: Metric,
    calibration: ChannelCalibration,
}

impl AnalogAdapter {
    /// Adapter filling `metric` from the channel in `calibration`.
    pub fn new(metric: Metric, calibration: ChannelCalibration) -> Self {
        Self {
            metric,
            calibration,
        }
    }

    /// Metric this channel fills.
    pub fn metric(&self) -> Metric {
        self.metric
    }

    pub(crate) fn metric_ref(&self) -> &Metric {
        &self.metric
    }

    /// Channel and calibration points.
    pub fn calibration(&self) -> ChannelCalibration {
        self.calibration
    }

    /// Linear map of `code` from `empty` (0 %) to `full` (100 %), clamped.
    pub fn percent(&self, code: u16) -> Result<f64, SensorError> {
        if code > MAX_ADC_CODE {
            return Err(SensorError::InvalidData(format!(
                "code {} exceeds {}",
                code, MAX_ADC_CODE
            )));
        }
        let empty = f64::from(self.calibration.empty);
        let full = f64::from(self.calibration.full);
        let percent = (f64::from(code) - empty) / (full - empty) * 100.0;
        Ok(percent.clamp(0.0, 100.0))
    }

    /// Convert the channel once, retrying transient faults.
    pub async fn read(
        &mut self,
        converter: &mut (dyn AnalogConverter + 'static),
        retry: &RetryPolicy,
    ) -> Result<Vec<MetricOutcome>, SensorError> {
        let channel = self.calibration.channel;
        let code = retry_transient(converter, retry, move |adc| adc.read_raw(channel)).await?;
        Ok(vec![(self.metric, Ok(self.percent(code)?))])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn soil() -> AnalogAdapter {
        AnalogAdapter::new(
            Metric::SoilMoisture,
            ChannelCalibration {
                channel: 0,
                empty: 930,
                full: 415,
            },
        )
    }

    #[test]
    fn test_inverted_scale_end_points() {
        let adapter = soil();
        assert_eq!(adapter.percent(930).unwrap(), 0.0);
        assert_eq!(adapter.percent(415).unwrap(), 100.0);
        let mid = adapter.percent(672).unwrap();
        assert!((mid - 50.097).abs() < 0.001, "mid was {mid}");
    }

    #[test]
    fn test_clamps_outside_calibration() {
        let adapter = soil();
        assert_eq!(adapter.percent(1023).unwrap(), 0.0);
        assert_eq!(adapter.percent(0).unwrap(), 100.0);
    }

    #[test]
    fn test_direct_scale() {
        let adapter = AnalogAdapter::new(
            Metric::Light,
            ChannelCalibration {
                channel: 1,
                empty: 0,
                full: 1023,
            },
        );
        assert_eq!(adapter.percent(0).unwrap(), 0.0);
        assert_eq!(adapter.percent(1023).unwrap(), 100.0);
    }

    #[test]
    fn test_code_above_ten_bits_is_invalid() {
        assert!(matches!(
            soil().percent(1024),
            Err(SensorError::InvalidData(_))
        ));
    }
}
