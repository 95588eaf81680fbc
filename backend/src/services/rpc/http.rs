//! JSON-over-HTTP stubs for the book and user services
//!
//! Every call is `POST {base}/rpc/{Method}` with a JSON body. Failures come
//! back as a non-2xx status with a `{code, message}` body where `code` is an
//! [`RpcStatus`] name. `SearchBooks` answers with newline-delimited JSON so
//! hits can be consumed as they arrive.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncBufReadExt;
use tokio_stream::wrappers::LinesStream;
use tokio_util::io::StreamReader;
use tracing::{debug, warn};
use url::Url;

use super::{
    BOOK_SERVICE, BookRecord, BookServiceClient, BookStream, BorrowReply, BorrowRequest,
    HistoryReply, HistoryRequest, RegisterReply, RegisterRequest, RelatedIds, ReturnReply,
    ReturnRequest, RpcError, RpcStatus, SearchRequest, USER_SERVICE, UserRecord,
    UserServiceClient,
};

// ============================================================================
// Envelopes
// ============================================================================

#[derive(Serialize)]
struct IdRequest<'a> {
    id: &'a str,
}

#[derive(Serialize)]
struct IdsRequest<'a> {
    ids: &'a [String],
}

#[derive(Deserialize)]
struct Found<T> {
    found: bool,
    #[serde(default = "Option::default")]
    entity: Option<T>,
}

#[derive(Deserialize)]
struct Batch<T> {
    #[serde(default = "Vec::default")]
    entities: Vec<T>,
}

#[derive(Deserialize)]
struct ErrorBody {
    code: String,
    #[serde(default)]
    message: String,
}

// ============================================================================
// Transport
// ============================================================================

/// Shared plumbing for one backend
pub struct RpcTransport {
    service: &'static str,
    base_url: Url,
    client: Client,
}

impl RpcTransport {
    pub fn new(service: &'static str, base_url: &str, timeout: Duration) -> Result<Self> {
        // A trailing slash keeps `join` from replacing the last path segment
        let normalized = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{}/", base_url)
        };
        let base_url = Url::parse(&normalized)
            .with_context(|| format!("Invalid {} URL: {}", service, base_url))?;

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            service,
            base_url,
            client,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, RpcError> {
        self.base_url
            .join(path)
            .map_err(|e| RpcError::internal(self.service, format!("Bad endpoint {}: {}", path, e)))
    }

    async fn send<Req: Serialize + ?Sized>(&self, method: &str, body: &Req) -> Result<Response, RpcError> {
        let url = self.endpoint(&format!("rpc/{}", method))?;
        debug!(service = self.service, method, "RPC call");

        let resp = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| transport_error(self.service, e))?;

        if resp.status().is_success() {
            Ok(resp)
        } else {
            Err(status_error(self.service, resp).await)
        }
    }

    async fn call<Req, Resp>(&self, method: &str, body: &Req) -> Result<Resp, RpcError>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let resp = self.send(method, body).await?;
        resp.json::<Resp>()
            .await
            .map_err(|e| transport_error(self.service, e))
    }

    async fn ping(&self) -> Result<(), RpcError> {
        let url = self.endpoint("healthz")?;
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| transport_error(self.service, e))?;
        if resp.status().is_success() {
            Ok(())
        } else {
            Err(status_error(self.service, resp).await)
        }
    }
}

/// Classify a reqwest failure
fn transport_error(service: &'static str, e: reqwest::Error) -> RpcError {
    let status = if e.is_timeout() {
        RpcStatus::DeadlineExceeded
    } else if e.is_decode() {
        RpcStatus::Internal
    } else {
        RpcStatus::Unavailable
    };
    RpcError::new(service, status, e.to_string())
}

/// Status implied by the HTTP code when the body carries none
pub(crate) fn status_for_http(code: StatusCode) -> RpcStatus {
    match code {
        StatusCode::NOT_FOUND => RpcStatus::NotFound,
        StatusCode::CONFLICT => RpcStatus::AlreadyExists,
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => RpcStatus::InvalidArgument,
        StatusCode::PRECONDITION_FAILED => RpcStatus::FailedPrecondition,
        StatusCode::UNAUTHORIZED => RpcStatus::Unauthenticated,
        StatusCode::FORBIDDEN => RpcStatus::PermissionDenied,
        StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE => RpcStatus::Unavailable,
        StatusCode::GATEWAY_TIMEOUT | StatusCode::REQUEST_TIMEOUT => RpcStatus::DeadlineExceeded,
        _ => RpcStatus::Internal,
    }
}

async fn status_error(service: &'static str, resp: Response) -> RpcError {
    let code = resp.status();
    let text = resp.text().await.unwrap_or_default();
    match serde_json::from_str::<ErrorBody>(&text) {
        Ok(body) => {
            let status = match RpcStatus::from_name(&body.code) {
                RpcStatus::Unknown => status_for_http(code),
                status => status,
            };
            RpcError::new(service, status, body.message)
        }
        Err(_) => RpcError::new(service, status_for_http(code), format!("HTTP {}: {}", code, text)),
    }
}

// ============================================================================
// Book service
// ============================================================================

pub struct HttpBookClient {
    transport: RpcTransport,
}

impl HttpBookClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            transport: RpcTransport::new(BOOK_SERVICE, base_url, timeout)?,
        })
    }
}

#[async_trait]
impl BookServiceClient for HttpBookClient {
    async fn get_book(&self, id: &str) -> Result<Option<BookRecord>, RpcError> {
        let found: Found<BookRecord> = self.transport.call("GetBook", &IdRequest { id }).await?;
        Ok(found.entity.filter(|_| found.found))
    }

    async fn get_books(&self, ids: &[String]) -> Result<Vec<BookRecord>, RpcError> {
        let batch: Batch<BookRecord> = self
            .transport
            .call("BatchGetBooks", &IdsRequest { ids })
            .await?;
        Ok(batch.entities)
    }

    async fn search_books(&self, request: SearchRequest) -> Result<BookStream, RpcError> {
        let resp = self.transport.send("SearchBooks", &request).await?;

        let bytes = resp.bytes_stream().map_err(std::io::Error::other);
        let lines = LinesStream::new(StreamReader::new(bytes).lines());

        let hits = lines
            .filter_map(|line| async move {
                match line {
                    Ok(line) if line.trim().is_empty() => None,
                    Ok(line) => Some(serde_json::from_str::<BookRecord>(&line).map_err(|e| {
                        RpcError::internal(BOOK_SERVICE, format!("Malformed search hit: {}", e))
                    })),
                    Err(e) => {
                        warn!(error = %e, "Search stream interrupted");
                        Some(Err(RpcError::unavailable(BOOK_SERVICE, e.to_string())))
                    }
                }
            })
            .boxed();

        Ok(hits)
    }

    async fn list_borrower_ids(&self, book_id: &str) -> Result<RelatedIds, RpcError> {
        self.transport
            .call("GetBorrowers", &IdRequest { id: book_id })
            .await
    }

    async fn borrow_book(&self, request: BorrowRequest) -> Result<BorrowReply, RpcError> {
        self.transport.call("BorrowBook", &request).await
    }

    async fn return_book(&self, request: ReturnRequest) -> Result<ReturnReply, RpcError> {
        self.transport.call("ReturnBook", &request).await
    }

    async fn borrow_history(&self, request: HistoryRequest) -> Result<HistoryReply, RpcError> {
        self.transport.call("BorrowHistory", &request).await
    }

    async fn ping(&self) -> Result<(), RpcError> {
        self.transport.ping().await
    }
}

// ============================================================================
// User service
// ============================================================================

pub struct HttpUserClient {
    transport: RpcTransport,
}

impl HttpUserClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            transport: RpcTransport::new(USER_SERVICE, base_url, timeout)?,
        })
    }
}

#[async_trait]
impl UserServiceClient for HttpUserClient {
    async fn get_user(&self, id: &str) -> Result<Option<UserRecord>, RpcError> {
        let found: Found<UserRecord> = self.transport.call("GetUser", &IdRequest { id }).await?;
        Ok(found.entity.filter(|_| found.found))
    }

    async fn get_users(&self, ids: &[String]) -> Result<Vec<UserRecord>, RpcError> {
        let batch: Batch<UserRecord> = self
            .transport
            .call("BatchGetUsers", &IdsRequest { ids })
            .await?;
        Ok(batch.entities)
    }

    async fn register_user(&self, request: RegisterRequest) -> Result<RegisterReply, RpcError> {
        self.transport.call("RegisterUser", &request).await
    }

    async fn ping(&self) -> Result<(), RpcError> {
        self.transport.ping().await
    }
}
