use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use crate::error::{NetworkError, NotFoundError};
use crate::types::{ForecastData, GeoLocation};
use crate::weather::{ResolveError, WeatherApi};

/// In-memory weather backend. Clones share counters.
#[derive(Clone, Default)]
pub struct MockWeather {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    cities: Vec<(String, GeoLocation)>,
    geocoded: Mutex<Vec<String>>,
    forecast_calls: AtomicUsize,
    forecast_timeouts: AtomicUsize,
}

impl MockWeather {
    pub fn paris() -> Self {
        Self {
            inner: Arc::new(Inner {
                cities: vec![(
                    "Paris".into(),
                    GeoLocation {
                        latitude: 48.85341,
                        longitude: 2.3488,
                    },
                )],
                ..Inner::default()
            }),
        }
    }

    /// The next `n` forecast calls fail with a timeout.
    pub fn time_out_next_forecasts(&self, n: usize) {
        self.inner.forecast_timeouts.store(n, Ordering::SeqCst);
    }

    pub fn geocoded(&self) -> Vec<String> {
        self.inner.geocoded.lock().unwrap().clone()
    }

    pub fn geocode_calls(&self) -> usize {
        self.inner.geocoded.lock().unwrap().len()
    }

    pub fn forecast_calls(&self) -> usize {
        self.inner.forecast_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WeatherApi for MockWeather {
    async fn resolve_city(&self, city: &str) -> Result<GeoLocation, ResolveError> {
        self.inner.geocoded.lock().unwrap().push(city.to_string());
        self.inner
            .cities
            .iter()
            .find(|(name, _)| name == city)
            .map(|(_, loc)| *loc)
            .ok_or_else(|| NotFoundError::city(city).into())
    }

    async fn fetch_forecast(&self, location: GeoLocation) -> Result<ForecastData, NetworkError> {
        self.inner.forecast_calls.fetch_add(1, Ordering::SeqCst);

        let pending = self.inner.forecast_timeouts.load(Ordering::SeqCst);
        if pending > 0 {
            self.inner.forecast_timeouts.store(pending - 1, Ordering::SeqCst);
            return Err(NetworkError::Timeout {
                service: "forecast",
                timeout: Duration::from_secs(10),
            });
        }

        Ok(ForecastData(json!({
            "latitude": location.latitude,
            "longitude": location.longitude,
            "current": {"temperature_2m": 14.2, "precipitation": 0.0, "is_day": 1, "rain": 0.0},
            "hourly": {"temperature_2m": [11.0, 11.4, 12.1]}
        })))
    }
}
