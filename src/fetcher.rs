//! Upstream client for the disease.sh COVID-19 API.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Url;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{DashError, Result};
use crate::models::{CountrySelection, CountrySnapshot, HistoricalAll};
use crate::state::Config;

const USER_AGENT: &str = concat!("covidash/", env!("CARGO_PKG_VERSION"));

/// Number of days of global history fetched for the chart.
pub const HISTORY_WINDOW_DAYS: u32 = 120;

/// Where the controller gets its data from.
///
/// Implemented by [`DiseaseClient`] for the real API and by stubs in tests.
pub trait StatsSource: Send + Sync + 'static {
    /// `GET /v3/covid-19/countries`
    fn countries(&self) -> impl Future<Output = Result<Vec<CountrySnapshot>>> + Send;

    /// `GET /v3/covid-19/all`
    fn worldwide(&self) -> impl Future<Output = Result<CountrySnapshot>> + Send;

    /// `GET /v3/covid-19/countries/{code}`
    fn country(&self, code: &str) -> impl Future<Output = Result<CountrySnapshot>> + Send;

    /// `GET /v3/covid-19/historical/all?lastdays={last_days}`
    fn historical_all(&self, last_days: u32) -> impl Future<Output = Result<HistoricalAll>> + Send;
}

/// Fetches the snapshot for whatever `selection` points at.
pub async fn fetch_snapshot<S: StatsSource>(
    source: &S,
    selection: &CountrySelection,
) -> Result<CountrySnapshot> {
    match selection {
        CountrySelection::Worldwide => source.worldwide().await,
        CountrySelection::Country(code) => source.country(code).await,
    }
}

#[derive(Debug, Clone)]
pub struct DiseaseClient {
    client: reqwest::Client,
    base_url: Url,
}

impl DiseaseClient {
    pub fn new(config: &Config) -> Result<Self> {
        let mut headers = HeaderMap::new();
        if let Some(key) = config.api_key.as_deref() {
            info!("API key found, sending it as '{}'", config.api_key_header);
            let name = HeaderName::from_bytes(config.api_key_header.as_bytes())?;
            let mut value = HeaderValue::from_str(key)?;
            value.set_sensitive(true);
            headers.insert(name, value);
        }

        let base_url = Url::parse(&config.api_base_url)
            .map_err(|e| DashError::InvalidBaseUrl(format!("{}: {}", config.api_base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(DashError::InvalidBaseUrl(config.api_base_url.clone()));
        }

        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self { client, base_url })
    }

    /// Appends percent-encoded path segments to the base URL.
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| DashError::InvalidBaseUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        debug!("Fetching {}", url);
        let body = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        Ok(serde_json::from_str(&body)?)
    }
}

impl StatsSource for DiseaseClient {
    async fn countries(&self) -> Result<Vec<CountrySnapshot>> {
        let url = self.endpoint(&["v3", "covid-19", "countries"])?;
        let path = url.path().to_string();
        let countries: Vec<CountrySnapshot> = self.get_json(url).await?;
        if countries.is_empty() {
            return Err(DashError::EmptyResult(path));
        }
        Ok(countries)
    }

    async fn worldwide(&self) -> Result<CountrySnapshot> {
        let url = self.endpoint(&["v3", "covid-19", "all"])?;
        self.get_json(url).await
    }

    async fn country(&self, code: &str) -> Result<CountrySnapshot> {
        let url = self.endpoint(&["v3", "covid-19", "countries", code])?;
        self.get_json(url).await
    }

    async fn historical_all(&self, last_days: u32) -> Result<HistoricalAll> {
        let mut url = self.endpoint(&["v3", "covid-19", "historical", "all"])?;
        url.query_pairs_mut()
            .append_pair("lastdays", &last_days.to_string());
        self.get_json(url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Path;
    use axum::http::{HeaderMap as AxumHeaders, StatusCode};
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::json;

    /// Serves canned upstream responses on an ephemeral port.
    async fn spawn_upstream() -> String {
        let app = Router::new()
            .route(
                "/v3/covid-19/countries",
                get(|| async {
                    Json(json!([
                        {"country": "Kenya", "countryInfo": {"iso2": "KE", "lat": 1, "long": 38}, "cases": 10},
                        {"country": "USA", "countryInfo": {"iso2": "US", "lat": 38, "long": -97}, "cases": 99}
                    ]))
                }),
            )
            .route(
                "/v3/covid-19/countries/{code}",
                get(|Path(code): Path<String>| async move {
                    if code == "KE" {
                        Ok(Json(json!({"country": "Kenya", "countryInfo": {"iso2": "KE", "lat": 1, "long": 38}, "cases": 10})))
                    } else {
                        Err(StatusCode::NOT_FOUND)
                    }
                }),
            )
            .route(
                "/v3/covid-19/all",
                get(|headers: AxumHeaders| async move {
                    let cases = if headers.contains_key("x-rapidapi-key") { 2 } else { 1 };
                    Json(json!({"cases": cases, "todayCases": 5}))
                }),
            )
            .route(
                "/v3/covid-19/historical/all",
                get(|| async {
                    (
                        [("content-type", "application/json")],
                        r#"{"cases": {"9/30/20": 1, "10/1/20": 4}, "deaths": {}, "recovered": {}}"#,
                    )
                }),
            );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn client_for(base_url: String, api_key: Option<&str>) -> DiseaseClient {
        let config = Config {
            api_base_url: base_url,
            api_key: api_key.map(str::to_string),
            ..Config::default()
        };
        DiseaseClient::new(&config).unwrap()
    }

    #[tokio::test]
    async fn test_fetches_country_list() {
        let client = client_for(spawn_upstream().await, None);
        let countries = client.countries().await.unwrap();
        assert_eq!(countries.len(), 2);
        assert_eq!(countries[1].iso_code(), Some("US"));
    }

    #[tokio::test]
    async fn test_fetch_snapshot_by_selection() {
        let client = client_for(spawn_upstream().await, None);
        let world = fetch_snapshot(&client, &CountrySelection::Worldwide)
            .await
            .unwrap();
        assert_eq!(world.cases, 1);
        let kenya = fetch_snapshot(&client, &CountrySelection::Country("KE".into()))
            .await
            .unwrap();
        assert_eq!(kenya.name, "Kenya");
    }

    #[tokio::test]
    async fn test_not_found_is_http_error() {
        let client = client_for(spawn_upstream().await, None);
        let err = client.country("ZZ").await.unwrap_err();
        assert!(matches!(err, DashError::HttpRequest(_)));
    }

    #[tokio::test]
    async fn test_api_key_header_is_sent() {
        let client = client_for(spawn_upstream().await, Some("secret"));
        assert_eq!(client.worldwide().await.unwrap().cases, 2);
    }

    #[tokio::test]
    async fn test_history_keeps_order() {
        let client = client_for(spawn_upstream().await, None);
        let history = client.historical_all(HISTORY_WINDOW_DAYS).await.unwrap();
        assert_eq!(history.cases[0].date, "9/30/20");
        assert_eq!(history.cases[1].date, "10/1/20");
    }

    #[test]
    fn test_invalid_header_name_rejected() {
        let config = Config {
            api_key: Some("secret".into()),
            api_key_header: "bad header".into(),
            ..Config::default()
        };
        assert!(matches!(
            DiseaseClient::new(&config),
            Err(DashError::InvalidHeaderName(_))
        ));
    }

    #[test]
    fn test_endpoint_encodes_segments() {
        let client = client_for("http://localhost:8201/".into(), None);
        let url = client
            .endpoint(&["v3", "covid-19", "countries", "S. Korea/x"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:8201/v3/covid-19/countries/S.%20Korea%2Fx"
        );
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        for base in ["not a url", "mailto:ops@example.com"] {
            let config = Config {
                api_base_url: base.into(),
                ..Config::default()
            };
            assert!(matches!(
                DiseaseClient::new(&config),
                Err(DashError::InvalidBaseUrl(_))
            ));
        }
    }
}
