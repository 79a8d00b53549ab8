pub mod open_meteo;
pub mod tool;

use async_trait::async_trait;

use crate::error::{NetworkError, NotFoundError, ToolError};
use crate::types::{ForecastData, GeoLocation};

/// Outbound weather lookups. Each call is bounded by a timeout and is never
/// retried here; a caller that wants retries does them itself.
#[async_trait]
pub trait WeatherApi: Send + Sync {
    /// Resolve a free-text city name. Zero matches is `ResolveError::NotFound`,
    /// not a network failure.
    async fn resolve_city(&self, city: &str) -> Result<GeoLocation, ResolveError>;

    async fn fetch_forecast(&self, location: GeoLocation) -> Result<ForecastData, NetworkError>;
}

/// Blanket impl so `Box<dyn WeatherApi>` can be handed to the tool directly.
#[async_trait]
impl WeatherApi for Box<dyn WeatherApi> {
    async fn resolve_city(&self, city: &str) -> Result<GeoLocation, ResolveError> {
        (**self).resolve_city(city).await
    }

    async fn fetch_forecast(&self, location: GeoLocation) -> Result<ForecastData, NetworkError> {
        (**self).fetch_forecast(location).await
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error(transparent)]
    NotFound(#[from] NotFoundError),
    #[error(transparent)]
    Network(#[from] NetworkError),
}

impl From<ResolveError> for ToolError {
    fn from(e: ResolveError) -> Self {
        match e {
            ResolveError::NotFound(e) => ToolError::NotFound(e),
            ResolveError::Network(e) => e.into(),
        }
    }
}

/// Geocode, then fetch. The forecast stage only runs when geocoding produced
/// a location.
pub async fn lookup_forecast<A: WeatherApi + ?Sized>(
    api: &A,
    city: &str,
) -> Result<ForecastData, ToolError> {
    let location = api
        .resolve_city(city)
        .await
        .map_err(|e| ToolError::from(e).for_input(city))?;
    api.fetch_forecast(location)
        .await
        .map_err(|e| ToolError::from(e).for_input(city))
}

pub use open_meteo::OpenMeteoClient;
pub use tool::{weather_tool, GetWeatherTool, GET_WEATHER};
