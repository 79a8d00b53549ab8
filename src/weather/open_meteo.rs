use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::{ResolveError, WeatherApi};
use crate::config::WeatherConfig;
use crate::error::{NetworkError, NotFoundError};
use crate::types::{ForecastData, GeoLocation};

const GEOCODING: &str = "geocoding";
const FORECAST: &str = "forecast";

/// Upstream error pages can be large HTML documents; only this much of one
/// is kept in the error.
const MAX_ERROR_BODY_CHARS: usize = 200;

/// Open-Meteo geocoding + forecast client. One `reqwest::Client` is shared by
/// both calls; its timeout bounds each request individually.
pub struct OpenMeteoClient {
    client: reqwest::Client,
    config: WeatherConfig,
}

impl OpenMeteoClient {
    pub fn new(config: WeatherConfig) -> Result<Self, NetworkError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| NetworkError::Request {
                service: GEOCODING,
                reason: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self { client, config })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        service: &'static str,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, NetworkError> {
        let resp = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| self.classify(service, e))?;

        let status = resp.status();
        let text = resp.text().await.map_err(|e| self.classify(service, e))?;

        if !status.is_success() {
            return Err(NetworkError::Status {
                service,
                status: status.as_u16(),
                body: truncate_body(&text),
            });
        }

        serde_json::from_str(&text).map_err(|e| NetworkError::Parse {
            service,
            reason: e.to_string(),
        })
    }

    fn classify(&self, service: &'static str, e: reqwest::Error) -> NetworkError {
        if e.is_timeout() {
            NetworkError::Timeout {
                service,
                timeout: self.config.timeout,
            }
        } else {
            NetworkError::Request {
                service,
                reason: e.to_string(),
            }
        }
    }
}

fn truncate_body(text: &str) -> String {
    let mut chars = text.trim().chars();
    let mut kept: String = chars.by_ref().take(MAX_ERROR_BODY_CHARS).collect();
    if chars.next().is_some() {
        kept.push_str("...");
    }
    kept
}

#[derive(Deserialize)]
struct GeocodingResponse {
    // Open-Meteo omits the key entirely when nothing matches.
    #[serde(default)]
    results: Vec<GeocodingMatch>,
}

#[derive(Deserialize)]
struct GeocodingMatch {
    #[serde(default)]
    name: Option<String>,
    latitude: f64,
    longitude: f64,
}

#[async_trait]
impl WeatherApi for OpenMeteoClient {
    async fn resolve_city(&self, city: &str) -> Result<GeoLocation, ResolveError> {
        let query = [
            ("name", city.to_string()),
            ("count", "1".to_string()),
            ("language", "en".to_string()),
            ("format", "json".to_string()),
        ];
        let parsed: GeocodingResponse = self
            .get_json(GEOCODING, &self.config.geocoding_url, &query)
            .await?;

        let Some(hit) = parsed.results.into_iter().next() else {
            return Err(NotFoundError::city(city).into());
        };

        debug!(
            city,
            matched = hit.name.as_deref().unwrap_or(""),
            latitude = hit.latitude,
            longitude = hit.longitude,
            "geocoded city"
        );
        Ok(GeoLocation {
            latitude: hit.latitude,
            longitude: hit.longitude,
        })
    }

    async fn fetch_forecast(&self, location: GeoLocation) -> Result<ForecastData, NetworkError> {
        let query = [
            ("latitude", location.latitude.to_string()),
            ("longitude", location.longitude.to_string()),
            ("hourly", "temperature_2m".to_string()),
            (
                "current",
                "temperature_2m,precipitation,is_day,rain".to_string(),
            ),
            ("forecast_days", "1".to_string()),
        ];
        self.get_json(FORECAST, &self.config.forecast_url, &query)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Minimal HTTP/1.1 responder. Records each request target and answers
    /// via `route`; `None` means hold the connection open without replying.
    async fn fake_server(
        route: impl Fn(&str) -> Option<(u16, String)> + Send + Sync + 'static,
    ) -> (String, Arc<Mutex<Vec<String>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_task = seen.clone();
        let route = Arc::new(route);

        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                let seen = seen_task.clone();
                let route = route.clone();
                tokio::spawn(async move {
                    let mut buf = Vec::new();
                    let mut chunk = [0u8; 1024];
                    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
                        match socket.read(&mut chunk).await {
                            Ok(0) | Err(_) => return,
                            Ok(n) => buf.extend_from_slice(&chunk[..n]),
                        }
                    }
                    let head = String::from_utf8_lossy(&buf).to_string();
                    let target = head.split_whitespace().nth(1).unwrap_or("").to_string();
                    seen.lock().unwrap().push(target.clone());

                    match route(&target) {
                        Some((status, body)) => {
                            let resp = format!(
                                "HTTP/1.1 {status} X\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                                body.len()
                            );
                            let _ = socket.write_all(resp.as_bytes()).await;
                            let _ = socket.shutdown().await;
                        }
                        None => {
                            tokio::time::sleep(Duration::from_secs(30)).await;
                        }
                    }
                });
            }
        });

        (format!("http://{addr}"), seen)
    }

    fn client_for(base: &str, timeout: Duration) -> OpenMeteoClient {
        OpenMeteoClient::new(WeatherConfig {
            geocoding_url: format!("{base}/v1/search"),
            forecast_url: format!("{base}/v1/forecast"),
            timeout,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn resolves_first_match() {
        let (base, seen) = fake_server(|_| {
            Some((
                200,
                json!({"results": [
                    {"name": "Paris", "latitude": 48.85341, "longitude": 2.3488},
                    {"name": "Paris", "latitude": 33.66, "longitude": -95.55}
                ]})
                .to_string(),
            ))
        })
        .await;

        let client = client_for(&base, Duration::from_secs(5));
        let loc = client.resolve_city("Paris").await.unwrap();
        assert_eq!(loc.latitude, 48.85341);
        assert_eq!(loc.longitude, 2.3488);

        let target = seen.lock().unwrap()[0].clone();
        assert!(target.starts_with("/v1/search?"));
        assert!(target.contains("name=Paris"));
        assert!(target.contains("count=1"));
    }

    #[tokio::test]
    async fn city_name_is_url_encoded() {
        let (base, seen) = fake_server(|_| Some((200, json!({"results": []}).to_string()))).await;

        let client = client_for(&base, Duration::from_secs(5));
        let _ = client.resolve_city("New York & Co").await;

        let target = seen.lock().unwrap()[0].clone();
        assert!(target.contains("name=New+York+%26+Co"));
    }

    #[tokio::test]
    async fn missing_results_is_not_found() {
        let (base, _) = fake_server(|_| Some((200, json!({"generationtime_ms": 0.4}).to_string()))).await;

        let client = client_for(&base, Duration::from_secs(5));
        let err = client.resolve_city("Nonexistent City XYZ").await.unwrap_err();
        match err {
            ResolveError::NotFound(e) => assert_eq!(e.query, "Nonexistent City XYZ"),
            other => panic!("expected not found, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_results_is_not_found() {
        let (base, _) = fake_server(|_| Some((200, json!({"results": []}).to_string()))).await;

        let client = client_for(&base, Duration::from_secs(5));
        let err = client.resolve_city("Nowhere").await.unwrap_err();
        assert!(matches!(err, ResolveError::NotFound(_)));
    }

    #[tokio::test]
    async fn forecast_passes_payload_through() {
        let payload = json!({
            "latitude": 48.86,
            "current": {"temperature_2m": 14.2, "rain": 0.0, "is_day": 1},
            "hourly": {"temperature_2m": [10.1, 10.4]}
        });
        let body = payload.to_string();
        let (base, seen) = fake_server(move |_| Some((200, body.clone()))).await;

        let client = client_for(&base, Duration::from_secs(5));
        let data = client
            .fetch_forecast(GeoLocation {
                latitude: 48.86,
                longitude: 2.35,
            })
            .await
            .unwrap();
        assert_eq!(data.0, payload);

        let target = seen.lock().unwrap()[0].clone();
        assert!(target.starts_with("/v1/forecast?"));
        assert!(target.contains("latitude=48.86"));
        assert!(target.contains("longitude=2.35"));
        assert!(target.contains("hourly=temperature_2m"));
        assert!(target.contains("forecast_days=1"));
    }

    #[tokio::test]
    async fn http_error_status() {
        let (base, _) = fake_server(|_| Some((503, "{\"reason\":\"down\"}".into()))).await;

        let client = client_for(&base, Duration::from_secs(5));
        let err = client
            .fetch_forecast(GeoLocation {
                latitude: 0.0,
                longitude: 0.0,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, NetworkError::Status { status: 503, service: "forecast", .. }));
    }

    #[tokio::test]
    async fn large_error_page_is_truncated() {
        let page = format!("<html>{}</html>", "x".repeat(10_000));
        let (base, _) = fake_server(move |_| Some((502, page.clone()))).await;

        let client = client_for(&base, Duration::from_secs(5));
        let err = client.resolve_city("Paris").await.unwrap_err();
        let ResolveError::Network(NetworkError::Status { status, body, .. }) = err else {
            panic!("expected status error, got {err:?}");
        };
        assert_eq!(status, 502);
        assert_eq!(body.chars().count(), MAX_ERROR_BODY_CHARS + 3);
        assert!(body.starts_with("<html>xxx"));
        assert!(body.ends_with("..."));
    }

    #[tokio::test]
    async fn unparseable_body() {
        let (base, _) = fake_server(|_| Some((200, "not json".into()))).await;

        let client = client_for(&base, Duration::from_secs(5));
        let err = client.resolve_city("Paris").await.unwrap_err();
        assert!(matches!(
            err,
            ResolveError::Network(NetworkError::Parse { service: "geocoding", .. })
        ));
    }

    #[tokio::test]
    async fn slow_forecast_times_out() {
        let (base, _) = fake_server(|_| None).await;

        let client = client_for(&base, Duration::from_millis(200));
        let started = std::time::Instant::now();
        let err = client
            .fetch_forecast(GeoLocation {
                latitude: 1.0,
                longitude: 2.0,
            })
            .await
            .unwrap_err();

        assert!(matches!(err, NetworkError::Timeout { service: "forecast", .. }));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn connection_refused_is_request_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = client_for(&format!("http://{addr}"), Duration::from_secs(2));
        let err = client.resolve_city("Paris").await.unwrap_err();
        assert!(matches!(
            err,
            ResolveError::Network(NetworkError::Request { .. })
        ));
    }
}
