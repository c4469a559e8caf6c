use std::env;

use crate::error::DispatchError;

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    pub event_buffer_size: usize,
    pub sos_ledger_capacity: usize,
    pub start_radius_km: f64,
    pub radius_step_km: f64,
    pub max_radius_km: f64,
    pub default_speed_kmh: f64,
    pub shift_rotation_hours: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_port: 3000,
            log_level: "info".to_string(),
            event_buffer_size: 1024,
            sos_ledger_capacity: 100_000,
            start_radius_km: 10.0,
            radius_step_km: 10.0,
            max_radius_km: 50.0,
            default_speed_kmh: 40.0,
            // Weekly rotation unless overridden.
            shift_rotation_hours: 168,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, DispatchError> {
        let _ = dotenvy::dotenv();
        let defaults = Self::default();

        Ok(Self {
            http_port: parse_or_default("HTTP_PORT", defaults.http_port)?,
            log_level: env::var("LOG_LEVEL").unwrap_or(defaults.log_level),
            event_buffer_size: parse_or_default("EVENT_BUFFER_SIZE", defaults.event_buffer_size)?,
            sos_ledger_capacity: parse_or_default(
                "SOS_LEDGER_CAPACITY",
                defaults.sos_ledger_capacity,
            )?,
            start_radius_km: parse_or_default("START_RADIUS_KM", defaults.start_radius_km)?,
            radius_step_km: parse_or_default("RADIUS_STEP_KM", defaults.radius_step_km)?,
            max_radius_km: parse_or_default("MAX_RADIUS_KM", defaults.max_radius_km)?,
            default_speed_kmh: parse_or_default("DEFAULT_SPEED_KMH", defaults.default_speed_kmh)?,
            shift_rotation_hours: parse_or_default(
                "SHIFT_ROTATION_HOURS",
                defaults.shift_rotation_hours,
            )?,
        })
    }
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, DispatchError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|err| DispatchError::Internal(format!("invalid {key}: {err}"))),
        Err(_) => Ok(default),
    }
}
