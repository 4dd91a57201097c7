//! Admission checks for incoming updates

use alert_engine::AlertError;
use chrono::{DateTime, Utc};
use geo_kernel::{GeoError, GeoPoint};
use serde::Deserialize;
use storage::StorageError;
use thiserror::Error;

/// Errors on the ingest path
#[derive(Debug, Error)]
pub enum IngestError {
    /// Missing required field
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    /// Value out of allowed range
    #[error("{field} value {value} is out of range [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    /// Caller lacks access to the vehicle's owning scope
    #[error("Not authorised for vehicle {0}")]
    Unauthorized(String),

    /// Deadline exceeded on a durable step; retryable
    #[error("Deadline exceeded during {0}")]
    Timeout(&'static str),

    #[error(transparent)]
    Store(#[from] StorageError),

    #[error(transparent)]
    Alert(#[from] AlertError),
}

impl From<GeoError> for IngestError {
    fn from(err: GeoError) -> Self {
        match err {
            GeoError::LatitudeOutOfRange(value) => IngestError::OutOfRange {
                field: "latitude",
                value,
                min: -90.0,
                max: 90.0,
            },
            GeoError::LongitudeOutOfRange(value) => IngestError::OutOfRange {
                field: "longitude",
                value,
                min: -180.0,
                max: 180.0,
            },
        }
    }
}

/// A location update as posted by a device.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationUpdate {
    pub vehicle_id: String,
    #[serde(default)]
    pub driver_id: Option<String>,
    #[serde(default)]
    pub shipment_id: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub speed: Option<f64>,
    #[serde(default)]
    pub heading: Option<f64>,
    #[serde(default)]
    pub accuracy: Option<f64>,
    #[serde(default)]
    pub altitude: Option<f64>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

/// A telemetry update as posted by a device.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryUpdate {
    pub vehicle_id: String,
    #[serde(default)]
    pub engine_status: Option<String>,
    #[serde(default)]
    pub fuel_level: Option<f64>,
    #[serde(default)]
    pub odometer: Option<f64>,
    #[serde(default)]
    pub engine_temperature: Option<f64>,
    #[serde(default)]
    pub battery_voltage: Option<f64>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

/// Admit a location update: id present, coordinates in range, numeric
/// fields sane. Returns the validated position.
pub fn admit_location(update: &LocationUpdate) -> Result<GeoPoint, IngestError> {
    if update.vehicle_id.trim().is_empty() {
        return Err(IngestError::MissingField("vehicleId"));
    }
    let position = GeoPoint::new(update.latitude, update.longitude)?;
    if let Some(speed) = update.speed {
        require_range("speed", speed, 0.0, 1_000.0)?;
    }
    if let Some(accuracy) = update.accuracy {
        require_range("accuracy", accuracy, 0.0, 100_000.0)?;
    }
    if let Some(heading) = update.heading {
        if !heading.is_finite() {
            return Err(IngestError::OutOfRange {
                field: "heading",
                value: heading,
                min: 0.0,
                max: 360.0,
            });
        }
    }
    Ok(position)
}

/// Admit a telemetry update.
pub fn admit_telemetry(update: &TelemetryUpdate) -> Result<(), IngestError> {
    if update.vehicle_id.trim().is_empty() {
        return Err(IngestError::MissingField("vehicleId"));
    }
    if let Some(fuel) = update.fuel_level {
        require_range("fuelLevel", fuel, 0.0, 100.0)?;
    }
    if let Some(odometer) = update.odometer {
        require_range("odometer", odometer, 0.0, 10_000_000.0)?;
    }
    if let Some(temp) = update.engine_temperature {
        require_range("engineTemperature", temp, -60.0, 300.0)?;
    }
    if let Some(voltage) = update.battery_voltage {
        require_range("batteryVoltage", voltage, 0.0, 60.0)?;
    }
    Ok(())
}

fn require_range(
    field: &'static str,
    value: f64,
    min: f64,
    max: f64,
) -> Result<(), IngestError> {
    if !value.is_finite() || value < min || value > max {
        return Err(IngestError::OutOfRange {
            field,
            value,
            min,
            max,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update(lat: f64, lon: f64) -> LocationUpdate {
        LocationUpdate {
            vehicle_id: "T1".to_string(),
            driver_id: None,
            shipment_id: None,
            latitude: lat,
            longitude: lon,
            speed: None,
            heading: None,
            accuracy: None,
            altitude: None,
            timestamp: None,
        }
    }

    #[test]
    fn admits_boundary_coordinates() {
        assert!(admit_location(&update(90.0, 180.0)).is_ok());
        assert!(admit_location(&update(-90.0, -180.0)).is_ok());
    }

    #[test]
    fn rejects_out_of_range_coordinates() {
        let err = admit_location(&update(90.0001, 0.0)).unwrap_err();
        assert!(matches!(
            err,
            IngestError::OutOfRange {
                field: "latitude",
                ..
            }
        ));
    }

    #[test]
    fn rejects_blank_vehicle_id() {
        let mut u = update(18.52, 73.85);
        u.vehicle_id = "  ".to_string();
        assert!(matches!(
            admit_location(&u).unwrap_err(),
            IngestError::MissingField("vehicleId")
        ));
    }

    #[test]
    fn rejects_negative_speed() {
        let mut u = update(18.52, 73.85);
        u.speed = Some(-1.0);
        assert!(matches!(
            admit_location(&u).unwrap_err(),
            IngestError::OutOfRange { field: "speed", .. }
        ));
    }

    #[test]
    fn telemetry_fuel_level_is_percent() {
        let mut t = TelemetryUpdate {
            vehicle_id: "T1".to_string(),
            engine_status: None,
            fuel_level: Some(50.0),
            odometer: None,
            engine_temperature: None,
            battery_voltage: None,
            timestamp: None,
        };
        assert!(admit_telemetry(&t).is_ok());
        t.fuel_level = Some(120.0);
        assert!(admit_telemetry(&t).is_err());
    }

    #[test]
    fn update_parses_camel_case_json() {
        let u: LocationUpdate = serde_json::from_str(
            r#"{"vehicleId":"T1","latitude":18.52,"longitude":73.85,"speed":40.5}"#,
        )
        .unwrap();
        assert_eq!(u.vehicle_id, "T1");
        assert_eq!(u.speed, Some(40.5));
        assert!(u.timestamp.is_none());
    }
}
