use async_trait::async_trait;
use serde::Deserialize;

use super::{lookup_forecast, WeatherApi};
use crate::error::ToolError;
use crate::schema::{Param, ParameterSchema, ValidationError};
use crate::tools::{ToolDef, ToolHandler};
use crate::types::ValidatedArgs;

pub const GET_WEATHER: &str = "get weather";

#[derive(Deserialize)]
struct WeatherArgs {
    city: String,
}

/// Looks up the current conditions and today's hourly temperatures for a
/// city and returns the forecast as pretty-printed JSON.
pub struct GetWeatherTool<A> {
    api: A,
}

impl<A: WeatherApi> GetWeatherTool<A> {
    pub fn new(api: A) -> Self {
        Self { api }
    }

    pub fn schema() -> ParameterSchema {
        ParameterSchema::new().param(Param::string("city").describe("City name").non_empty())
    }
}

#[async_trait]
impl<A: WeatherApi> ToolHandler for GetWeatherTool<A> {
    async fn call(&self, args: ValidatedArgs) -> Result<String, ToolError> {
        let WeatherArgs { city } = args
            .deserialize()
            .map_err(|e| ValidationError::single("city", e.to_string()))?;
        let city = city.trim();

        let forecast = lookup_forecast(&self.api, city).await?;
        Ok(forecast.to_pretty_json())
    }
}

/// The `get weather` tool, ready to register.
pub fn weather_tool<A: WeatherApi + 'static>(api: A) -> ToolDef {
    ToolDef::new(
        GET_WEATHER,
        "Get the weather for a given city",
        GetWeatherTool::<A>::schema(),
        GetWeatherTool::new(api),
    )
}
