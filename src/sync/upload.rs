//! One-shot uploads to Dropbox's `files/upload` endpoint.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::error::{FailureKind, ValidationError};
use crate::state::credentials::Credential;

/// Dropbox content endpoint for single-request uploads
pub const UPLOAD_ENDPOINT: &str = "https://content.dropboxapi.com/2/files/upload";

/// Remote folder every export lands in
pub const REMOTE_FOLDER: &str = "/PhotoAnnotations";

const UNKNOWN_ERROR: &str = "Unknown error";

#[derive(Error, Debug)]
pub enum UploadError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error("Dropbox sync failed: {summary}")]
    Rejected { status: u16, summary: String },

    #[error("Failed to sync to Dropbox. Please check your connection. ({0})")]
    Connectivity(#[from] reqwest::Error),

    #[error("Dropbox returned an unreadable response: {0}")]
    InvalidResponse(#[from] serde_json::Error),
}

impl UploadError {
    pub fn kind(&self) -> FailureKind {
        match self {
            UploadError::Invalid(_) => FailureKind::Validation,
            UploadError::Rejected { .. } => FailureKind::Upload,
            UploadError::Connectivity(_) | UploadError::InvalidResponse(_) => {
                FailureKind::Connectivity
            }
        }
    }
}

/// File metadata returned by Dropbox after a successful upload
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UploadedFile {
    /// Final name, which differs from the requested one after an autorename
    pub name: String,
    #[serde(default)]
    pub path_display: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
}

#[derive(Serialize)]
struct UploadArg<'a> {
    path: &'a str,
    mode: &'a str,
    autorename: bool,
}

#[derive(Deserialize)]
struct ErrorBody {
    error_summary: Option<String>,
}

/// HTTP client for the upload endpoint. One instance serves every caller.
#[derive(Debug, Clone)]
pub struct UploadClient {
    client: reqwest::Client,
    endpoint: String,
    folder: String,
}

impl Default for UploadClient {
    fn default() -> Self {
        Self::new(UPLOAD_ENDPOINT, REMOTE_FOLDER)
    }
}

impl UploadClient {
    /// Create a client for `endpoint`, uploading into `folder`.
    ///
    /// `folder` should look like `/PhotoAnnotations` (a trailing slash is ignored).
    pub fn new(endpoint: impl Into<String>, folder: impl Into<String>) -> Self {
        let folder = folder.into();
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            folder: folder.trim_end_matches('/').to_string(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Remote path a file name will be uploaded to
    pub fn remote_path(&self, filename: &str) -> String {
        format!("{}/{}", self.folder, filename)
    }

    /// Upload `image` as `filename`.
    ///
    /// A single request: nothing is retried, queued or timed out here, and a
    /// failure leaves it to the caller whether to try again.
    pub async fn upload(
        &self,
        image: Vec<u8>,
        filename: &str,
        credential: &Credential,
    ) -> Result<UploadedFile, UploadError> {
        if credential.token().trim().is_empty() {
            return Err(ValidationError::EmptyCredential.into());
        }

        let path = self.remote_path(filename);
        let arg = api_arg_header(&path)?;

        info!(endpoint = %self.endpoint, path = %path, bytes = image.len(), "uploading to Dropbox");
        let resp = self
            .client
            .post(&self.endpoint)
            .bearer_auth(credential.token())
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .header("Dropbox-API-Arg", arg)
            .body(image)
            .send()
            .await
            .inspect_err(|e| error!(error = %e, "Dropbox upload error"))?;

        let status = resp.status();
        let body = resp
            .bytes()
            .await
            .inspect_err(|e| error!(error = %e, "Dropbox upload error"))?;

        if !status.is_success() {
            let summary = serde_json::from_slice::<ErrorBody>(&body)
                .ok()
                .and_then(|e| e.error_summary)
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| UNKNOWN_ERROR.to_string());

            warn!(status = status.as_u16(), summary = %summary, "upload rejected");
            return Err(UploadError::Rejected {
                status: status.as_u16(),
                summary,
            });
        }

        let uploaded: UploadedFile = serde_json::from_slice(&body)
            .inspect_err(|e| error!(error = %e, "unreadable upload response"))?;
        info!(name = %uploaded.name, "upload complete");
        Ok(uploaded)
    }
}

/// JSON for the `Dropbox-API-Arg` header.
///
/// HTTP header values must be ASCII, so anything outside it is written as
/// `\uXXXX` (surrogate pairs above the BMP), which is still valid JSON.
pub fn api_arg_header(path: &str) -> Result<String, serde_json::Error> {
    let json = serde_json::to_string(&UploadArg {
        path,
        mode: "add",
        autorename: true,
    })?;

    let mut escaped = String::with_capacity(json.len());
    for c in json.chars() {
        if c.is_ascii() && c != '\u{7f}' {
            escaped.push(c);
        } else {
            let mut units = [0u16; 2];
            for unit in c.encode_utf16(&mut units) {
                escaped.push_str(&format!("\\u{:04x}", unit));
            }
        }
    }
    Ok(escaped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::Mutex;

    /// A request as seen by the fake endpoint
    #[derive(Debug, Default, Clone)]
    struct Captured {
        request_line: String,
        headers: Vec<(String, String)>,
        body: Vec<u8>,
    }

    impl Captured {
        fn header(&self, name: &str) -> Option<&str> {
            self.headers
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v.as_str())
        }
    }

    async fn read_request(stream: &mut tokio::net::TcpStream) -> Captured {
        let mut raw = Vec::new();
        let mut chunk = [0u8; 4096];

        let header_end = loop {
            let n = stream.read(&mut chunk).await.unwrap();
            assert!(n > 0, "client closed before sending headers");
            raw.extend_from_slice(&chunk[..n]);
            if let Some(pos) = raw.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos;
            }
        };

        let head = String::from_utf8_lossy(&raw[..header_end]).to_string();
        let mut lines = head.split("\r\n");
        let request_line = lines.next().unwrap_or_default().to_string();
        let headers: Vec<(String, String)> = lines
            .filter_map(|line| line.split_once(':'))
            .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
            .collect();

        let length: usize = headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
            .and_then(|(_, v)| v.parse().ok())
            .unwrap_or(0);

        let mut body = raw[header_end + 4..].to_vec();
        while body.len() < length {
            let n = stream.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            body.extend_from_slice(&chunk[..n]);
        }

        Captured {
            request_line,
            headers,
            body,
        }
    }

    /// Serve one canned response; returns the endpoint URL and the captured request
    async fn serve_once(status: &'static str, body: &'static str) -> (String, Arc<Mutex<Captured>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/2/files/upload", listener.local_addr().unwrap());
        let captured = Arc::new(Mutex::new(Captured::default()));
        let sink = captured.clone();

        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let request = read_request(&mut stream).await;
            *sink.lock().await = request;

            let response = format!(
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            stream.write_all(response.as_bytes()).await.unwrap();
            stream.shutdown().await.ok();
        });

        (url, captured)
    }

    fn credential() -> Credential {
        Credential::new("test-token").unwrap()
    }

    #[tokio::test]
    async fn test_success_reports_server_name() {
        let (url, captured) = serve_once("200 OK", r#"{"name": "foo.jpg"}"#).await;
        let client = UploadClient::new(url, REMOTE_FOLDER);

        let uploaded = client
            .upload(vec![0xFF, 0xD8, 0xFF, 0xD9], "PM-1_Dana_1700000000000.jpg", &credential())
            .await
            .unwrap();
        assert_eq!(uploaded.name, "foo.jpg");
        assert_eq!(uploaded.path_display, None);

        let request = captured.lock().await.clone();
        assert!(request.request_line.starts_with("POST /2/files/upload"));
        assert_eq!(request.header("authorization"), Some("Bearer test-token"));
        assert_eq!(request.header("content-type"), Some("application/octet-stream"));
        assert_eq!(request.body, vec![0xFF, 0xD8, 0xFF, 0xD9]);

        let arg: serde_json::Value =
            serde_json::from_str(request.header("dropbox-api-arg").unwrap()).unwrap();
        assert_eq!(arg["path"], "/PhotoAnnotations/PM-1_Dana_1700000000000.jpg");
        assert_eq!(arg["mode"], "add");
        assert_eq!(arg["autorename"], true);
    }

    #[tokio::test]
    async fn test_conflict_reports_summary() {
        let (url, _) = serve_once("409 Conflict", r#"{"error_summary": "path/conflict"}"#).await;
        let client = UploadClient::new(url, REMOTE_FOLDER);

        let err = client.upload(vec![1, 2, 3], "a.jpg", &credential()).await.unwrap_err();
        assert_eq!(err.kind(), FailureKind::Upload);
        assert!(err.to_string().contains("path/conflict"));
        assert!(matches!(err, UploadError::Rejected { status: 409, .. }));
    }

    #[tokio::test]
    async fn test_error_without_summary_is_unknown() {
        let (url, _) = serve_once("500 Internal Server Error", "oops").await;
        let client = UploadClient::new(url, REMOTE_FOLDER);

        let err = client.upload(vec![1], "a.jpg", &credential()).await.unwrap_err();
        match err {
            UploadError::Rejected { status, summary } => {
                assert_eq!(status, 500);
                assert_eq!(summary, UNKNOWN_ERROR);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unreadable_success_body_is_connectivity() {
        let (url, _) = serve_once("200 OK", "<html>proxy</html>").await;
        let client = UploadClient::new(url, REMOTE_FOLDER);

        let err = client.upload(vec![1], "a.jpg", &credential()).await.unwrap_err();
        assert_eq!(err.kind(), FailureKind::Connectivity);
    }

    #[tokio::test]
    async fn test_network_error_is_connectivity_without_retry() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/2/files/upload", listener.local_addr().unwrap());
        let connections = Arc::new(AtomicUsize::new(0));
        let counter = connections.clone();

        // accept and hang up without answering
        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else { break };
                counter.fetch_add(1, Ordering::SeqCst);
                drop(stream);
            }
        });

        let client = UploadClient::new(url, REMOTE_FOLDER);
        let err = client.upload(vec![1, 2], "a.jpg", &credential()).await.unwrap_err();
        assert!(matches!(err, UploadError::Connectivity(_)));
        assert_eq!(err.kind(), FailureKind::Connectivity);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(connections.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_refused_connection_is_connectivity() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/2/files/upload", listener.local_addr().unwrap());
        drop(listener);

        let client = UploadClient::new(url, REMOTE_FOLDER);
        let err = client.upload(vec![1], "a.jpg", &credential()).await.unwrap_err();
        assert_eq!(err.kind(), FailureKind::Connectivity);
    }

    #[test]
    fn test_api_arg_is_ascii_json() {
        let header = api_arg_header("/PhotoAnnotations/PM-1_Zoë_Øst_📷.jpg").unwrap();
        assert!(header.is_ascii());

        let parsed: serde_json::Value = serde_json::from_str(&header).unwrap();
        assert_eq!(parsed["path"], "/PhotoAnnotations/PM-1_Zoë_Øst_📷.jpg");
        assert_eq!(parsed["mode"], "add");
        assert_eq!(parsed["autorename"], true);
    }

    #[test]
    fn test_remote_path_ignores_trailing_slash() {
        let client = UploadClient::new(UPLOAD_ENDPOINT, "/PhotoAnnotations/");
        assert_eq!(client.remote_path("a.jpg"), "/PhotoAnnotations/a.jpg");
        assert_eq!(UploadClient::default().endpoint(), UPLOAD_ENDPOINT);
    }
}
