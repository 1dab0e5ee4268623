//! Shared HTTP plumbing for provider adapters.

use std::path::Path;
use std::time::Duration;

use futures::StreamExt;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Response, StatusCode};
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::error::ProviderFailure;
use crate::outcome::Artifact;

/// Longest error body kept in a failure reason.
const MAX_ERROR_BODY: usize = 300;

/// Build the client shared by all adapters.
pub fn build_client(timeout: Duration) -> Result<Client, ProviderFailure> {
    Client::builder()
        .timeout(timeout)
        .user_agent(concat!("reelsmith/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| ProviderFailure::permanent(format!("failed to build HTTP client: {}", e)))
}

/// Classify a non-success HTTP status.
///
/// Client errors that will not change on retry are permanent; rate limits,
/// request timeouts and server errors are transient.
pub fn classify_status(status: StatusCode, body: &str) -> ProviderFailure {
    let body = body.trim();
    let body = match body.char_indices().nth(MAX_ERROR_BODY) {
        Some((cut, _)) => &body[..cut],
        None => body,
    };
    let reason = if body.is_empty() {
        format!("HTTP {}", status)
    } else {
        format!("HTTP {}: {}", status, body)
    };

    match status.as_u16() {
        408 | 429 => ProviderFailure::transient(reason),
        s if s >= 500 => ProviderFailure::server_error(reason),
        _ => ProviderFailure::permanent(reason),
    }
}

/// Classify a transport error. Connection and timeout errors are transient.
pub fn classify_request_error(error: reqwest::Error) -> ProviderFailure {
    if error.is_timeout() {
        ProviderFailure::transient(format!("request timed out: {}", error))
    } else if error.is_connect() || error.is_request() || error.is_body() {
        ProviderFailure::transient(format!("connection failed: {}", error))
    } else if error.is_builder() {
        ProviderFailure::permanent(format!("invalid request: {}", error))
    } else {
        ProviderFailure::transient(error.to_string())
    }
}

/// Return the response if its status is a success, the classified failure otherwise.
pub async fn check_status(response: Response) -> Result<Response, ProviderFailure> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(classify_status(status, &body))
}

/// Content type header without parameters.
pub fn content_type(response: &Response) -> Option<String> {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(';').next().unwrap_or(v).trim().to_lowercase())
}

/// Stream a response body to `output`.
pub async fn write_response(response: Response, output: &Path) -> Result<Artifact, ProviderFailure> {
    let content_type = content_type(&response);
    let mut file = create_output(output).await?;
    let mut stream = response.bytes_stream();
    let mut written: u64 = 0;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(classify_request_error)?;
        file.write_all(&chunk).await.map_err(io_failure)?;
        written += chunk.len() as u64;
    }
    file.flush().await.map_err(io_failure)?;

    debug!("Wrote {} bytes to {}", written, output.display());

    let artifact = Artifact::new(output, written);
    Ok(match content_type {
        Some(ct) => artifact.with_content_type(ct),
        None => artifact,
    })
}

/// Write an in-memory body to `output`.
pub async fn write_bytes(output: &Path, bytes: &[u8]) -> Result<Artifact, ProviderFailure> {
    let mut file = create_output(output).await?;
    file.write_all(bytes).await.map_err(io_failure)?;
    file.flush().await.map_err(io_failure)?;
    Ok(Artifact::new(output, bytes.len() as u64))
}

async fn create_output(output: &Path) -> Result<tokio::fs::File, ProviderFailure> {
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(io_failure)?;
    }
    tokio::fs::File::create(output).await.map_err(io_failure)
}

/// Local disk errors are not the provider's fault but may clear up.
pub fn io_failure(error: std::io::Error) -> ProviderFailure {
    ProviderFailure::transient(format!("failed to write artifact: {}", error))
}

/// Strip a trailing slash so paths can be appended with `/`.
pub fn trim_base(base_url: impl Into<String>) -> String {
    base_url.into().trim_end_matches('/').to_string()
}
