use crate::domain::asset::Asset;
use crate::multipart::FILE_FIELD;
use crate::observability::propagators::HyperHeaderInjector;
use hyper::HeaderMap;
use reqwest::multipart::{Form, Part};
use reqwest::{RequestBuilder, Response, StatusCode};
use std::error;
use std::fmt::{Display, Formatter};
use tracing::{debug, info, instrument};
use tracing_opentelemetry::OpenTelemetrySpanExt;

#[derive(Debug)]
pub enum ClientError {
    /// The service answered with a non-success status.
    Status { status: StatusCode, message: String },
    /// The request never produced a usable response.
    Transport(reqwest::Error),
}

impl Display for ClientError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ClientError::Status { status, message } => write!(f, "{status}: {message}"),
            ClientError::Transport(e) => write!(f, "request failed: {e}"),
        }
    }
}

impl error::Error for ClientError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            ClientError::Status { .. } => None,
            ClientError::Transport(e) => Some(e),
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        ClientError::Transport(e)
    }
}

impl ClientError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ClientError::Status { status, .. } => Some(*status),
            ClientError::Transport(e) => e.status(),
        }
    }
}

/// Consumer side of the image API. Sends payloads as the multipart `file`
/// field and hands back bytes exactly as stored; rendering is up to the caller.
#[derive(Debug, Clone)]
pub struct AssetClient {
    http: reqwest::Client,
    base_url: String,
}

impl AssetClient {
    /// `base_url` is the origin, with or without the `/api` prefix, e.g.
    /// `http://localhost:8080`.
    pub fn new(base_url: &str) -> Result<AssetClient, ClientError> {
        info!("Initializing image client for {base_url}.");
        let http = reqwest::Client::builder().build()?;
        Ok(AssetClient {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/images/{path}", self.base_url)
    }

    #[instrument(skip(self))]
    pub async fn list(&self) -> Result<Vec<Asset>, ClientError> {
        let response = send(self.http.get(self.url("all"))).await?;
        Ok(response.json().await?)
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: i64) -> Result<Asset, ClientError> {
        let response = send(self.http.get(self.url(&id.to_string()))).await?;
        Ok(response.json().await?)
    }

    /// The raw stored bytes and their media type.
    #[instrument(skip(self))]
    pub async fn content(&self, id: i64) -> Result<(String, Vec<u8>), ClientError> {
        let response = send(self.http.get(self.url(&format!("{id}/content")))).await?;
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let bytes = response.bytes().await?;
        Ok((content_type, bytes.to_vec()))
    }

    #[instrument(skip(self, data), fields(bytes = data.len()))]
    pub async fn upload(
        &self,
        name: &str,
        content_type: Option<&str>,
        data: Vec<u8>,
    ) -> Result<Asset, ClientError> {
        let form = file_form(name, content_type, data)?;
        let response = send(self.http.post(self.url("add")).multipart(form)).await?;
        Ok(response.json().await?)
    }

    #[instrument(skip(self, data), fields(bytes = data.len()))]
    pub async fn replace(
        &self,
        id: i64,
        name: &str,
        content_type: Option<&str>,
        data: Vec<u8>,
    ) -> Result<Asset, ClientError> {
        let form = file_form(name, content_type, data)?;
        let request = self.http.put(self.url(&format!("update/{id}"))).multipart(form);
        let response = send(request).await?;
        Ok(response.json().await?)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: i64) -> Result<(), ClientError> {
        send(self.http.delete(self.url(&format!("delete/{id}")))).await?;
        Ok(())
    }
}

fn file_form(name: &str, content_type: Option<&str>, data: Vec<u8>) -> Result<Form, ClientError> {
    let part = Part::bytes(data).file_name(name.to_string());
    let part = match content_type {
        Some(content_type) => part.mime_str(content_type)?,
        None => part,
    };
    Ok(Form::new().part(FILE_FIELD, part))
}

/// Attaches the current trace context and maps non-2xx answers to errors.
async fn send(request: RequestBuilder) -> Result<Response, ClientError> {
    let mut headers = HeaderMap::new();
    let context = tracing::Span::current().context();
    opentelemetry::global::get_text_map_propagator(|propagator| {
        propagator.inject_context(&context, &mut HyperHeaderInjector(&mut headers))
    });

    let response = request.headers(headers).send().await?;
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    debug!("Image service answered {status}: {message}");
    Err(ClientError::Status { status, message })
}
