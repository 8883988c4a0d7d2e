use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Instant;

use crate::geocode::{
    self, AddressComponents, AddressInput, GeoResult, GeocodeError, ProviderInfo, ResolutionOptions,
};

use super::state::AppState;

// ─── Error response ──────────────────────────────────────────────

#[derive(Serialize)]
struct ApiErrorBody {
    error: String,
    code: u16,
}

#[derive(Debug)]
pub(super) struct ApiError(pub(super) StatusCode, pub(super) String);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiErrorBody {
            error: self.1,
            code: self.0.as_u16(),
        };
        (self.0, Json(body)).into_response()
    }
}

fn api_error(status: StatusCode, msg: impl Into<String>) -> ApiError {
    ApiError(status, msg.into())
}

fn status_for(err: &GeocodeError) -> StatusCode {
    match err {
        GeocodeError::EmptyQuery | GeocodeError::UnknownProvider(_) | GeocodeError::ProviderDisabled(_) => {
            StatusCode::BAD_REQUEST
        }
        GeocodeError::Fetch { .. } => StatusCode::BAD_GATEWAY,
    }
}

impl From<GeocodeError> for ApiError {
    fn from(err: GeocodeError) -> Self {
        api_error(status_for(&err), err.to_string())
    }
}

/// Run a blocking resolution off the async runtime.
async fn run_blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, GeocodeError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
        .map_err(ApiError::from)
}

// ─── GET /api/geocode ────────────────────────────────────────────

#[derive(Deserialize, Default)]
pub struct GeocodeQuery {
    pub q: Option<String>,
    pub street: Option<String>,
    pub city: Option<String>,
    pub region: Option<String>,
    pub postal_code: Option<String>,
    pub country_name: Option<String>,
    /// ISO country code for the request.
    pub country: Option<String>,
    pub provider: Option<String>,
    pub cache: Option<bool>,
}

impl GeocodeQuery {
    fn input(&self) -> Result<AddressInput, ApiError> {
        let parts = AddressComponents {
            street_address: self.street.clone(),
            city: self.city.clone(),
            region: self.region.clone(),
            postal_code: self.postal_code.clone(),
            country: self.country_name.clone(),
        };
        match (self.q.as_deref().map(str::trim).filter(|q| !q.is_empty()), parts.is_empty()) {
            (Some(_), false) => Err(api_error(
                StatusCode::BAD_REQUEST,
                "Give either 'q' or address parts, not both",
            )),
            (Some(q), true) => Ok(AddressInput::Query(q.to_string())),
            (None, _) => Ok(AddressInput::Components(parts)),
        }
    }

    fn options(&self) -> ResolutionOptions {
        ResolutionOptions {
            provider: self.provider.clone(),
            country_code: self.country.clone(),
            use_cache: self.cache.unwrap_or(true),
            timeout: None,
        }
    }
}

pub async fn geocode(
    State(state): State<Arc<AppState>>,
    Query(params): Query<GeocodeQuery>,
) -> Result<Json<GeoResult>, ApiError> {
    let start = Instant::now();
    let input = params.input()?;
    let opts = params.options();

    let result = run_blocking(move || state.resolver.resolve(input, &opts)).await?;

    tracing::info!(
        provider = %result.provider,
        coordinates = result.has_coordinates(),
        elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
        "GET /api/geocode"
    );
    Ok(Json(result))
}

// ─── POST /api/record ────────────────────────────────────────────

#[derive(Deserialize, Default)]
pub struct RecordQuery {
    pub country: Option<String>,
    pub provider: Option<String>,
}

#[derive(Serialize)]
pub struct RecordResponse {
    pub record: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<GeoResult>,
}

pub async fn geocode_record(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RecordQuery>,
    Json(mut record): Json<Map<String, Value>>,
) -> Result<Json<RecordResponse>, ApiError> {
    let opts = ResolutionOptions {
        provider: params.provider,
        country_code: params.country,
        use_cache: true,
        timeout: None,
    };

    let response = run_blocking(move || {
        let result = geocode::geocode_record(&state.resolver, &state.fields, &mut record, &opts)?;
        Ok(RecordResponse { record, result })
    })
    .await?;
    Ok(Json(response))
}

// ─── GET /api/providers ──────────────────────────────────────────

pub async fn provider_list(State(state): State<Arc<AppState>>) -> Json<Vec<ProviderInfo>> {
    Json(state.resolver.registry().iter().map(ProviderInfo::from).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geocode::{FetchError, Fetcher, FieldMap, ProviderRegistry, Resolver, Setup};
    use serde_json::json;
    use std::time::Duration;

    struct Fixed(Result<&'static str, FetchError>);

    impl Fetcher for Fixed {
        fn fetch(&self, _url: &str, _timeout: Option<Duration>) -> Result<String, FetchError> {
            self.0.clone().map(str::to_string)
        }
    }

    fn state(outcome: Result<&'static str, FetchError>) -> Arc<AppState> {
        let resolver = Resolver::new(
            ProviderRegistry::builtin().unwrap(),
            Setup::default(),
            Arc::new(Fixed(outcome)),
        );
        Arc::new(AppState {
            resolver,
            fields: FieldMap::default(),
        })
    }

    #[tokio::test]
    async fn test_geocode_ok() {
        let params = GeocodeQuery {
            q: Some("SW1A 1AA".into()),
            country: Some("GB".into()),
            ..Default::default()
        };
        let Json(result) = geocode(State(state(Ok("<Lat>51.5</Lat><Lon>-0.14</Lon>"))), Query(params))
            .await
            .unwrap();
        assert_eq!(result.provider, "multimap");
        assert_eq!(result.lat.as_deref(), Some("51.5"));
    }

    #[tokio::test]
    async fn test_geocode_structured() {
        let params = GeocodeQuery {
            city: Some("Mountain View".into()),
            region: Some("CA".into()),
            ..Default::default()
        };
        let Json(result) = geocode(State(state(Ok("<x/>"))), Query(params)).await.unwrap();
        assert_eq!(result.key, "Mountain View, CA");
        assert_eq!(result.provider, "google");
        assert!(!result.has_coordinates());
    }

    #[tokio::test]
    async fn test_geocode_empty_query_is_bad_request() {
        let err = geocode(State(state(Ok("<x/>"))), Query(GeocodeQuery::default()))
            .await
            .unwrap_err();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_geocode_query_with_parts_is_bad_request() {
        let params = GeocodeQuery {
            q: Some("Berlin".into()),
            city: Some("Munich".into()),
            ..Default::default()
        };
        let err = geocode(State(state(Ok("<x/>"))), Query(params)).await.unwrap_err();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);
        assert!(err.1.contains("not both"));
    }

    #[tokio::test]
    async fn test_geocode_unknown_provider_is_bad_request() {
        let params = GeocodeQuery {
            q: Some("Berlin".into()),
            provider: Some("mapquest".into()),
            ..Default::default()
        };
        let err = geocode(State(state(Ok("<x/>"))), Query(params)).await.unwrap_err();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);
        assert!(err.1.contains("mapquest"));
    }

    #[tokio::test]
    async fn test_geocode_fetch_failure_is_bad_gateway() {
        let params = GeocodeQuery {
            q: Some("Berlin".into()),
            ..Default::default()
        };
        let err = geocode(State(state(Err(FetchError::Status(500)))), Query(params))
            .await
            .unwrap_err();
        assert_eq!(err.0, StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_record_endpoint() {
        let record = match json!({"city": "Sunnyvale", "geo_lat": null, "geo_long": null}) {
            Value::Object(m) => m,
            _ => unreachable!(),
        };
        let params = RecordQuery {
            provider: Some("yahoo".into()),
            ..Default::default()
        };
        let Json(resp) = geocode_record(
            State(state(Ok("<Latitude>37.37</Latitude><Longitude>-122.04</Longitude>"))),
            Query(params),
            Json(record),
        )
        .await
        .unwrap();
        assert_eq!(resp.record["geo_lat"], "37.37");
        assert_eq!(resp.result.unwrap().provider, "yahoo");
    }

    #[tokio::test]
    async fn test_provider_list() {
        let Json(list) = provider_list(State(state(Ok("")))).await;
        let names: Vec<_> = list.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["google", "multimap", "yahoo"]);
    }
}
