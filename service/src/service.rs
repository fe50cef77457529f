use crate::domain::error::ErrorResponse;
use crate::domain::server_timing::ServerTiming;
use crate::domain::upload::Upload;
use crate::domain::{AssetReply, Outcome};
use crate::multipart::read_upload;
use crate::repository::AssetRepository;
use futures_util::Stream;
use hyper::body::Bytes;
use std::error;
use std::time::Instant;
use tracing::{debug, instrument};

pub type InternalResponse = Result<AssetReply, ErrorResponse>;

/// Reads the payload to completion before the store is touched, so a slow or
/// aborted transfer never holds a connection.
async fn receive<S, E>(
    content_type: Option<&str>,
    body: S,
    server_timing: &mut ServerTiming,
) -> Result<Upload, ErrorResponse>
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Into<Box<dyn error::Error + Send + Sync>> + 'static,
{
    let transfer_timer = Instant::now();
    let upload = read_upload(content_type, body).await?;
    server_timing.record("xfer", transfer_timer);
    Ok(upload)
}

#[instrument(skip(repository))]
pub async fn list_assets<R: AssetRepository>(repository: &R) -> InternalResponse {
    let mut server_timing = ServerTiming::default();
    let db_timer = Instant::now();
    let assets = repository.list().await?;
    server_timing.record("db", db_timer);

    debug!("Listing {} images", assets.len());
    Ok(AssetReply {
        outcome: Outcome::Catalog(assets),
        server_timing,
    })
}

#[instrument(skip(repository))]
pub async fn get_asset<R: AssetRepository>(repository: &R, id: i64) -> InternalResponse {
    let mut server_timing = ServerTiming::default();
    let db_timer = Instant::now();
    let asset = repository.get(id).await?;
    server_timing.record("db", db_timer);

    Ok(AssetReply {
        outcome: Outcome::Found(asset),
        server_timing,
    })
}

#[instrument(skip(repository))]
pub async fn get_asset_content<R: AssetRepository>(repository: &R, id: i64) -> InternalResponse {
    let mut server_timing = ServerTiming::default();
    let db_timer = Instant::now();
    let asset = repository.get(id).await?;
    server_timing.record("db", db_timer);

    Ok(AssetReply {
        outcome: Outcome::Content(asset),
        server_timing,
    })
}

#[instrument(skip(repository, body))]
pub async fn create_asset<R, S, E>(
    repository: &R,
    content_type: Option<&str>,
    body: S,
) -> InternalResponse
where
    R: AssetRepository,
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Into<Box<dyn error::Error + Send + Sync>> + 'static,
{
    let mut server_timing = ServerTiming::default();
    let upload = receive(content_type, body, &mut server_timing).await?;

    let db_timer = Instant::now();
    let asset = repository.insert(upload).await?;
    server_timing.record("db", db_timer);

    Ok(AssetReply {
        outcome: Outcome::Created(asset),
        server_timing,
    })
}

#[instrument(skip(repository, body))]
pub async fn replace_asset<R, S, E>(
    repository: &R,
    id: i64,
    content_type: Option<&str>,
    body: S,
) -> InternalResponse
where
    R: AssetRepository,
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Into<Box<dyn error::Error + Send + Sync>> + 'static,
{
    let mut server_timing = ServerTiming::default();
    // Unknown ids are reported before the payload is read. The UPDATE below
    // stays authoritative if the row is deleted during the transfer.
    let lookup_timer = Instant::now();
    if !repository.exists(id).await? {
        return Err(ErrorResponse::NotFoundError { id });
    }
    server_timing.record("lookup", lookup_timer);

    let upload = receive(content_type, body, &mut server_timing).await?;

    let db_timer = Instant::now();
    let asset = repository.replace(id, upload).await?;
    server_timing.record("db", db_timer);

    Ok(AssetReply {
        outcome: Outcome::Replaced(asset),
        server_timing,
    })
}

#[instrument(skip(repository))]
pub async fn delete_asset<R: AssetRepository>(repository: &R, id: i64) -> InternalResponse {
    let mut server_timing = ServerTiming::default();
    let db_timer = Instant::now();
    repository.delete(id).await?;
    server_timing.record("db", db_timer);

    Ok(AssetReply {
        outcome: Outcome::Removed,
        server_timing,
    })
}
