use std::time::Duration;

pub const DEFAULT_GEOCODING_URL: &str = "https://geocoding-api.open-meteo.com/v1/search";
pub const DEFAULT_FORECAST_URL: &str = "https://api.open-meteo.com/v1/forecast";

/// Server identity reported during the `initialize` handshake.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub name: String,
    pub version: String,
    /// Longest accepted line on the transport, in bytes.
    pub max_frame_bytes: usize,
    pub weather: WeatherConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: "weather-mcp".into(),
            version: env!("CARGO_PKG_VERSION").into(),
            max_frame_bytes: crate::transport::DEFAULT_MAX_FRAME_BYTES,
            weather: WeatherConfig::default(),
        }
    }
}

/// Endpoints and limits for the outbound weather calls.
#[derive(Debug, Clone)]
pub struct WeatherConfig {
    pub geocoding_url: String,
    pub forecast_url: String,
    /// Applies to each call separately, not to the geocode+forecast pair.
    pub timeout: Duration,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            geocoding_url: DEFAULT_GEOCODING_URL.into(),
            forecast_url: DEFAULT_FORECAST_URL.into(),
            timeout: Duration::from_secs(10),
        }
    }
}
