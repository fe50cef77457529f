use crate::domain::asset::Asset;
use crate::domain::server_timing::ServerTiming;
use crate::domain::upload::FALLBACK_CONTENT_TYPE;
use crate::domain::{AssetReply, Outcome};
use crate::router::full;
use crate::service::InternalResponse;
use http_body_util::combinators::BoxBody;
use hyper::body::Bytes;
use hyper::header::HeaderValue;
use hyper::http::response::Builder;
use hyper::{Response, StatusCode};
use serde::Serialize;
use std::error;
use std::time::Instant;
use tracing::{instrument, warn};

const CONTENT_TYPE_HEADER_NAME: &str = "content-type";
const CONTENT_LENGTH_HEADER_NAME: &str = "content-length";
const JSON_CONTENT_TYPE: &str = "application/json";
const CACHE_CONTROL_HEADER_NAME: &str = "cache-control";
const CACHE_CONTROL_HEADER_VALUE: &str = "no-cache";
const SERVER_TIMING_HEADER_NAME: &str = "Server-Timing";

pub type ResultResponse =
    Result<Response<BoxBody<Bytes, hyper::Error>>, Box<dyn error::Error + Send + Sync>>;

#[instrument(skip(response))]
pub fn transform(response: InternalResponse) -> ResultResponse {
    match response {
        Ok(AssetReply {
            outcome,
            mut server_timing,
        }) => match outcome {
            Outcome::Created(asset) | Outcome::Replaced(asset) | Outcome::Found(asset) => {
                json(&asset, &mut server_timing)
            }
            Outcome::Catalog(assets) => json(&assets, &mut server_timing),
            Outcome::Content(asset) => content(asset, &server_timing),
            Outcome::Removed => Ok(with_timing(
                Response::builder().status(StatusCode::NO_CONTENT),
                &server_timing,
            )
            .body(full(Bytes::new()))?),
        },
        Err(e) => Ok(e.handle()?),
    }
}

fn json<T: Serialize>(value: &T, server_timing: &mut ServerTiming) -> ResultResponse {
    let serialization_timer = Instant::now();
    let body = serde_json::to_vec(value)?;
    server_timing.record("ser", serialization_timer);

    Ok(with_timing(Response::builder().status(StatusCode::OK), server_timing)
        .header(CONTENT_TYPE_HEADER_NAME, JSON_CONTENT_TYPE)
        .header(CONTENT_LENGTH_HEADER_NAME, body.len())
        .body(full(body))?)
}

/// The stored bytes, verbatim, under the stored media type. A stored type that
/// is not a legal header value is served as the generic binary type.
fn content(asset: Asset, server_timing: &ServerTiming) -> ResultResponse {
    let media_type = HeaderValue::from_str(&asset.content_type).unwrap_or_else(|_| {
        warn!(
            "Image {} has an unusable content type {:?}",
            asset.id, asset.content_type
        );
        HeaderValue::from_static(FALLBACK_CONTENT_TYPE)
    });
    Ok(with_timing(Response::builder().status(StatusCode::OK), server_timing)
        .header(CONTENT_TYPE_HEADER_NAME, media_type)
        .header(CACHE_CONTROL_HEADER_NAME, CACHE_CONTROL_HEADER_VALUE)
        .header(CONTENT_LENGTH_HEADER_NAME, asset.data.len())
        .body(full(asset.data))?)
}

fn with_timing(builder: Builder, server_timing: &ServerTiming) -> Builder {
    if server_timing.is_empty() {
        builder
    } else {
        builder.header(SERVER_TIMING_HEADER_NAME, server_timing.to_string())
    }
}
