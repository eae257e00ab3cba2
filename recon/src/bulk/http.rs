use bytes::Bytes;
use futures::StreamExt;
use futures::stream::{self, BoxStream};
use recon_config::shared::{ExportConfig, SourceConfig};
use reqwest::header::HeaderMap;
use reqwest::{Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::bail;
use crate::bulk::base::{ByteStream, ExportJobClient, ExportJobHandle};
use crate::error::{ErrorKind, ReconError, ReconResult};
use crate::recon_error;

/// Response header naming the next result page.
const LOCATOR_HEADER: &str = "Sforce-Locator";

/// Locator value sent when no further page exists.
const LAST_PAGE_LOCATOR: &str = "null";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateJobRequest<'a> {
    operation: &'static str,
    query: &'a str,
}

/// Lifecycle states reported for a query job.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
enum JobState {
    Open,
    UploadComplete,
    InProgress,
    JobComplete,
    Failed,
    Aborted,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobInfo {
    id: String,
    state: JobState,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    number_records_processed: Option<u64>,
}

#[derive(Debug)]
struct Inner {
    client: reqwest::Client,
    /// `{instance_url}/services/data/v{api_version}/jobs/query`.
    jobs_url: String,
    access_token: SecretString,
    /// Deadline of submit and status requests. Result pages only use it as an idle timeout.
    request_timeout: Duration,
    poll_interval: Duration,
    poll_timeout: Duration,
}

/// [`ExportJobClient`] for a Bulk API 2.0 query endpoint.
#[derive(Debug, Clone)]
pub struct HttpExportJobClient {
    inner: Arc<Inner>,
}

impl HttpExportJobClient {
    /// Builds a client for the configured instance.
    ///
    /// The client itself has no overall deadline: result pages may stream for far longer than
    /// `request_timeout_ms`, so they are only cut off after that long without receiving data.
    pub fn new(source: &SourceConfig, export: &ExportConfig) -> ReconResult<Self> {
        let request_timeout = Duration::from_millis(source.request_timeout_ms);
        let client = reqwest::Client::builder()
            .connect_timeout(request_timeout)
            .read_timeout(request_timeout)
            .build()
            .map_err(|err| {
                recon_error!(
                    ErrorKind::ConfigError,
                    "HTTP client could not be built",
                    err.to_string(),
                    source: err
                )
            })?;

        let jobs_url = format!(
            "{}/services/data/v{}/jobs/query",
            source.instance_url.trim_end_matches('/'),
            source.api_version
        );

        Ok(Self {
            inner: Arc::new(Inner {
                client,
                jobs_url,
                access_token: source.access_token.clone(),
                request_timeout,
                poll_interval: Duration::from_millis(export.poll_interval_ms),
                poll_timeout: Duration::from_millis(export.poll_timeout_ms),
            }),
        })
    }
}

impl ExportJobClient for HttpExportJobClient {
    type Handle = HttpExportJob;

    async fn submit(&self, query: &str) -> ReconResult<HttpExportJob> {
        let response = self
            .inner
            .client
            .post(&self.inner.jobs_url)
            .timeout(self.inner.request_timeout)
            .bearer_auth(self.inner.access_token.expose_secret())
            .json(&CreateJobRequest {
                operation: "query",
                query,
            })
            .send()
            .await?;

        let response = check_status(response, ErrorKind::JobSubmissionRejected).await?;
        let job: JobInfo = serde_json::from_slice(&response.bytes().await?)?;

        info!(job_id = %job.id, state = ?job.state, "export job submitted");

        Ok(HttpExportJob {
            id: job.id,
            inner: self.inner.clone(),
        })
    }
}

/// Query job submitted through [`HttpExportJobClient`].
#[derive(Debug)]
pub struct HttpExportJob {
    id: String,
    inner: Arc<Inner>,
}

impl HttpExportJob {
    async fn fetch_info(&self) -> ReconResult<JobInfo> {
        let response = self
            .inner
            .client
            .get(format!("{}/{}", self.inner.jobs_url, self.id))
            .timeout(self.inner.request_timeout)
            .bearer_auth(self.inner.access_token.expose_secret())
            .send()
            .await?;

        let response = check_status(response, ErrorKind::JobFailed).await?;

        Ok(serde_json::from_slice(&response.bytes().await?)?)
    }

    async fn wait_for_completion(&self) -> ReconResult<()> {
        let started = Instant::now();

        loop {
            let info = self.fetch_info().await?;
            match info.state {
                JobState::JobComplete => {
                    info!(
                        job_id = %self.id,
                        records = info.number_records_processed.unwrap_or_default(),
                        "export job completed"
                    );
                    return Ok(());
                }
                JobState::Failed | JobState::Aborted => {
                    bail!(
                        ErrorKind::JobFailed,
                        "Export job did not complete",
                        format!(
                            "job {} ended in state {:?}: {}",
                            self.id,
                            info.state,
                            info.error_message.as_deref().unwrap_or("no error message")
                        )
                    );
                }
                state => debug!(job_id = %self.id, ?state, "export job still running"),
            }

            if started.elapsed() >= self.inner.poll_timeout {
                bail!(
                    ErrorKind::JobTimeout,
                    "Export job did not complete in time",
                    format!(
                        "job {} still running after {} ms",
                        self.id,
                        self.inner.poll_timeout.as_millis()
                    )
                );
            }

            tokio::time::sleep(self.inner.poll_interval).await;
        }
    }
}

impl ExportJobHandle for HttpExportJob {
    fn id(&self) -> &str {
        &self.id
    }

    async fn open_stream(self) -> ReconResult<ByteStream> {
        self.wait_for_completion().await?;

        Ok(result_pages(self.inner, self.id))
    }
}

/// Where the result reader stands across paginated responses.
enum PageCursor {
    Fetch {
        locator: Option<String>,
        page: usize,
        needs_newline: bool,
    },
    Read {
        body: BoxStream<'static, reqwest::Result<Bytes>>,
        next_locator: Option<String>,
        page: usize,
        header: HeaderSkip,
        last_byte: Option<u8>,
    },
    Finished,
}

/// Streams every result page of a job as one logical CSV document.
///
/// Each page repeats the header line; it is kept for the first page only. A page not ending in
/// a newline is terminated before the next page begins.
fn result_pages(inner: Arc<Inner>, job_id: String) -> ByteStream {
    let start = PageCursor::Fetch {
        locator: None,
        page: 0,
        needs_newline: false,
    };

    stream::try_unfold(start, move |mut cursor| {
        let inner = inner.clone();
        let job_id = job_id.clone();

        async move {
            loop {
                cursor = match cursor {
                    PageCursor::Finished => return Ok::<_, ReconError>(None),
                    PageCursor::Fetch {
                        locator,
                        page,
                        needs_newline,
                    } => {
                        let response = fetch_page(&inner, &job_id, locator.as_deref()).await?;
                        let next_locator = next_locator(response.headers());
                        debug!(job_id = %job_id, page, "reading export result page");

                        let next = PageCursor::Read {
                            body: response.bytes_stream().boxed(),
                            next_locator,
                            page,
                            header: if page == 0 {
                                HeaderSkip::Keep
                            } else {
                                HeaderSkip::Skipping
                            },
                            last_byte: None,
                        };

                        if needs_newline {
                            return Ok(Some((Bytes::from_static(b"\n"), next)));
                        }
                        next
                    }
                    PageCursor::Read {
                        mut body,
                        next_locator,
                        page,
                        mut header,
                        mut last_byte,
                    } => match body.next().await {
                        Some(Ok(chunk)) => {
                            let chunk = header.strip(chunk);
                            if let Some(byte) = chunk.last() {
                                last_byte = Some(*byte);
                            }

                            let next = PageCursor::Read {
                                body,
                                next_locator,
                                page,
                                header,
                                last_byte,
                            };
                            if !chunk.is_empty() {
                                return Ok(Some((chunk, next)));
                            }
                            next
                        }
                        Some(Err(err)) => {
                            return Err(recon_error!(
                                ErrorKind::StreamReadFailed,
                                "Export result stream failed",
                                format!("job {job_id}, page {page}: {err}"),
                                source: err
                            ));
                        }
                        None => match next_locator {
                            Some(locator) => PageCursor::Fetch {
                                locator: Some(locator),
                                page: page + 1,
                                needs_newline: last_byte.is_some_and(|byte| byte != b'\n'),
                            },
                            None => PageCursor::Finished,
                        },
                    },
                };
            }
        }
    })
    .boxed()
}

async fn fetch_page(inner: &Inner, job_id: &str, locator: Option<&str>) -> ReconResult<Response> {
    let mut request = inner
        .client
        .get(format!("{}/{job_id}/results", inner.jobs_url))
        .bearer_auth(inner.access_token.expose_secret());
    if let Some(locator) = locator {
        request = request.query(&[("locator", locator)]);
    }

    let response = request.send().await.map_err(|err| {
        recon_error!(
            ErrorKind::StreamReadFailed,
            "Export result page could not be fetched",
            err.to_string(),
            source: err
        )
    })?;

    check_status(response, ErrorKind::StreamReadFailed).await
}

/// Returns the locator of the next page, or [`None`] on the last page.
fn next_locator(headers: &HeaderMap) -> Option<String> {
    headers
        .get(LOCATOR_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty() && *value != LAST_PAGE_LOCATOR)
        .map(str::to_string)
}

/// Maps unsuccessful responses to errors.
///
/// Client errors are reported with `client_error_kind`; server errors are treated as transient
/// connection failures.
async fn check_status(response: Response, client_error_kind: ErrorKind) -> ReconResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<unable to read body>".to_string());

    Err(status_error(status, client_error_kind, body))
}

fn status_error(status: StatusCode, client_error_kind: ErrorKind, body: String) -> ReconError {
    let detail = format!("status {status}: {body}");
    if status.is_server_error() {
        recon_error!(
            ErrorKind::SourceConnectionFailed,
            "Export service is unavailable",
            detail = detail
        )
    } else {
        recon_error!(
            client_error_kind,
            "Export service rejected the request",
            detail = detail
        )
    }
}

/// Drops the header line repeated at the start of every page after the first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HeaderSkip {
    Keep,
    Skipping,
}

impl HeaderSkip {
    fn strip(&mut self, chunk: Bytes) -> Bytes {
        if *self == HeaderSkip::Keep {
            return chunk;
        }

        match chunk.iter().position(|byte| *byte == b'\n') {
            Some(newline) => {
                *self = HeaderSkip::Keep;
                chunk.slice(newline + 1..)
            }
            None => Bytes::new(),
        }
    }
}
