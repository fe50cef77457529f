use crate::domain::error::ErrorResponse;
use crate::observability::propagators::HyperHeaderExtractor;
use crate::repository::AssetRepository;
use crate::response_handler::{transform, ResultResponse};
use crate::service::{
    create_asset, delete_asset, get_asset, get_asset_content, list_assets, replace_asset,
};
use http_body_util::{combinators::BoxBody, BodyExt, Full};
use hyper::body::Bytes;
use hyper::header::CONTENT_TYPE;
use hyper::{Method, Request, Response, StatusCode};
use opentelemetry::Context;
use std::sync::Arc;
use tracing::{instrument, warn};
use tracing_opentelemetry::OpenTelemetrySpanExt;

/// Routes as the reference desktop client addresses them.
const API_PREFIX: &str = "/api";

#[derive(Debug, PartialEq, Eq)]
enum Route<'a> {
    Status,
    List,
    Add,
    Update(&'a str),
    Delete(&'a str),
    Get(&'a str),
    Content(&'a str),
    Unknown,
}

fn route<'a>(method: &Method, path: &'a str) -> Route<'a> {
    let path = match path.strip_prefix(API_PREFIX) {
        Some(rest) if rest.starts_with('/') => rest,
        _ => path,
    };
    let segments: Vec<&str> = path.trim_matches('/').split('/').collect();
    match (method, segments.as_slice()) {
        (&Method::GET, ["private", "status"]) => Route::Status,
        (&Method::GET, ["images", "all"]) => Route::List,
        (&Method::POST, ["images", "add"]) => Route::Add,
        (&Method::PUT, ["images", "update", id]) => Route::Update(id),
        (&Method::DELETE, ["images", "delete", id]) => Route::Delete(id),
        (&Method::GET, ["images", id]) => Route::Get(id),
        (&Method::GET, ["images", id, "content"]) => Route::Content(id),
        _ => Route::Unknown,
    }
}

fn parse_id(raw: &str) -> Result<i64, ErrorResponse> {
    raw.parse::<i64>()
        .map_err(|_| ErrorResponse::validation(format!("invalid id: {raw}")))
}

#[instrument(skip(req, repository), fields(method = %req.method(), path = %req.uri().path()))]
pub async fn router<R: AssetRepository>(
    req: Request<hyper::body::Incoming>,
    repository: Arc<R>,
) -> ResultResponse {
    let context: Context = opentelemetry::global::get_text_map_propagator(|propagator| {
        propagator.extract(&HyperHeaderExtractor(req.headers()))
    });
    tracing::Span::current().set_parent(context);

    let path = req.uri().path().to_string();
    let content_type = req
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);

    match route(req.method(), &path) {
        Route::Status => match repository.ping().await {
            Ok(()) => Ok(Response::new(full("OK"))),
            Err(e) => {
                warn!("Status check failed: {e}");
                let mut unavailable = Response::new(full("Image store unavailable"));
                *unavailable.status_mut() = StatusCode::SERVICE_UNAVAILABLE;
                Ok(unavailable)
            }
        },
        Route::List => transform(list_assets(repository.as_ref()).await),
        Route::Add => {
            let body = req.into_body().into_data_stream();
            transform(create_asset(repository.as_ref(), content_type.as_deref(), body).await)
        }
        Route::Update(raw_id) => match parse_id(raw_id) {
            Ok(id) => {
                let body = req.into_body().into_data_stream();
                transform(
                    replace_asset(repository.as_ref(), id, content_type.as_deref(), body).await,
                )
            }
            Err(e) => transform(Err(e)),
        },
        Route::Delete(raw_id) => match parse_id(raw_id) {
            Ok(id) => transform(delete_asset(repository.as_ref(), id).await),
            Err(e) => transform(Err(e)),
        },
        Route::Get(raw_id) => match parse_id(raw_id) {
            Ok(id) => transform(get_asset(repository.as_ref(), id).await),
            Err(e) => transform(Err(e)),
        },
        Route::Content(raw_id) => match parse_id(raw_id) {
            Ok(id) => transform(get_asset_content(repository.as_ref(), id).await),
            Err(e) => transform(Err(e)),
        },
        Route::Unknown => {
            let mut not_found = Response::new(full("Endpoint not found"));
            *not_found.status_mut() = StatusCode::NOT_FOUND;
            Ok(not_found)
        }
    }
}

pub fn full<T: Into<Bytes>>(chunk: T) -> BoxBody<Bytes, hyper::Error> {
    Full::new(chunk.into())
        .map_err(|never| match never {})
        .boxed()
}
