use crate::domain::error::ErrorResponse;
use crate::domain::upload::{Upload, MAX_UPLOAD_BYTES};
use futures_util::Stream;
use hyper::body::Bytes;
use multer::{Constraints, Multipart, SizeLimit};
use std::error;
use tracing::{debug, instrument, warn};

/// The form field carrying the payload.
pub const FILE_FIELD: &str = "file";

/// Room for boundaries, part headers and extra form fields. The whole request
/// is capped at `MAX_UPLOAD_BYTES + ENVELOPE_BYTES`; only the `file` part
/// counts against `MAX_UPLOAD_BYTES`.
const ENVELOPE_BYTES: u64 = 1024 * 1024;

/// Streams a `multipart/form-data` body and collects the `file` part into an
/// `Upload`. Bytes past the size limit are read and discarded rather than
/// buffered, so the client gets a clean 400 instead of a reset connection.
#[instrument(skip(body))]
pub async fn read_upload<S, E>(content_type: Option<&str>, body: S) -> Result<Upload, ErrorResponse>
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Into<Box<dyn error::Error + Send + Sync>> + 'static,
{
    let boundary = content_type
        .and_then(|ct| multer::parse_boundary(ct).ok())
        .ok_or_else(|| {
            debug!("Request is not multipart/form-data: {content_type:?}");
            ErrorResponse::validation("file required")
        })?;

    let constraints = Constraints::new()
        .size_limit(SizeLimit::new().whole_stream(MAX_UPLOAD_BYTES as u64 + ENVELOPE_BYTES));
    let mut multipart = Multipart::with_constraints(body, boundary, constraints);

    let mut upload: Option<Upload> = None;
    let mut oversized = false;
    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, oversized))?
    {
        if upload.is_some() || oversized || field.name() != Some(FILE_FIELD) {
            continue;
        }
        let name = field.file_name().unwrap_or(FILE_FIELD).to_string();
        let declared_content_type = field.content_type().map(|mime| mime.to_string());

        let mut data: Vec<u8> = Vec::new();
        let mut received = 0usize;
        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(|e| multipart_error(e, received > MAX_UPLOAD_BYTES))?
        {
            received += chunk.len();
            if received <= MAX_UPLOAD_BYTES {
                data.extend_from_slice(&chunk);
            }
        }
        debug!("Read {received} bytes for {name}");

        if received > MAX_UPLOAD_BYTES {
            oversized = true;
        } else {
            upload = Some(Upload::new(name, declared_content_type, data));
        }
    }

    if oversized {
        return Err(ErrorResponse::validation("file too large"));
    }
    upload
        .ok_or_else(|| ErrorResponse::validation("file required"))?
        .validate()
}

/// `file_oversized` tells whether the `file` part alone had already passed its
/// limit when the request cap was hit.
fn multipart_error(err: multer::Error, file_oversized: bool) -> ErrorResponse {
    match err {
        multer::Error::StreamSizeExceeded { .. } if file_oversized => {
            ErrorResponse::validation("file too large")
        }
        multer::Error::StreamSizeExceeded { limit } => {
            debug!("Request exceeded {limit} bytes outside the file part");
            ErrorResponse::validation("request too large")
        }
        other => {
            warn!("Could not read multipart body: {other}");
            ErrorResponse::validation(format!("malformed multipart body: {other}"))
        }
    }
}
