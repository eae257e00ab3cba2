use bytes::Bytes;
use futures::StreamExt;
use futures::stream;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::info;

use crate::bulk::base::{ByteStream, ExportJobClient, ExportJobHandle};
use crate::bulk::query::queried_object;
use crate::error::{ErrorKind, ReconResult};
use crate::{bail, recon_error};

/// How an export of one object behaves once submitted.
#[derive(Debug, Clone, Default)]
pub struct ScriptedExport {
    chunks: Vec<Bytes>,
    chunk_delay: Option<Duration>,
    fails_after_chunks: bool,
    stalls_after_chunks: bool,
    rejects_submission: bool,
}

impl ScriptedExport {
    /// Export delivering `text` as a single chunk.
    pub fn from_text(text: &str) -> Self {
        Self::from_chunks([Bytes::copy_from_slice(text.as_bytes())])
    }

    /// Export delivering exactly the given chunks.
    pub fn from_chunks<I, B>(chunks: I) -> Self
    where
        I: IntoIterator<Item = B>,
        B: Into<Bytes>,
    {
        Self {
            chunks: chunks.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Waits `delay` before every chunk.
    pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = Some(delay);
        self
    }

    /// Ends the stream with a transport error after the chunks.
    pub fn failing(mut self) -> Self {
        self.fails_after_chunks = true;
        self
    }

    /// Never ends the stream after the chunks.
    pub fn stalled(mut self) -> Self {
        self.stalls_after_chunks = true;
        self
    }

    /// Rejects the submission as the service does for an unknown object.
    pub fn rejected(mut self) -> Self {
        self.rejects_submission = true;
        self
    }

    fn into_stream(self) -> ByteStream {
        let delay = self.chunk_delay;
        let chunks = stream::iter(self.chunks).then(move |chunk| async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            Ok(chunk)
        });

        let failure = stream::iter(self.fails_after_chunks.then(|| {
            Err(recon_error!(
                ErrorKind::StreamReadFailed,
                "Export result stream failed",
                "connection reset by peer"
            ))
        }));

        let tail: ByteStream = if self.stalls_after_chunks {
            stream::pending().boxed()
        } else {
            stream::empty().boxed()
        };

        chunks.chain(failure).chain(tail).boxed()
    }
}

#[derive(Debug, Default)]
struct Inner {
    exports: HashMap<String, ScriptedExport>,
    submitted: Vec<String>,
    next_job: u64,
}

/// In-memory [`ExportJobClient`] serving scripted exports.
///
/// Exports are registered per queried object; a query naming an unregistered object is
/// rejected. Every submitted query is recorded, in order.
#[derive(Debug, Clone, Default)]
pub struct MemoryExportJobClient {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryExportJobClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the export served for queries on `object`.
    pub async fn with_export(self, object: impl Into<String>, export: ScriptedExport) -> Self {
        self.inner
            .lock()
            .await
            .exports
            .insert(object.into(), export);
        self
    }

    /// Returns the queries submitted so far.
    pub async fn submitted_queries(&self) -> Vec<String> {
        self.inner.lock().await.submitted.clone()
    }
}

impl ExportJobClient for MemoryExportJobClient {
    type Handle = MemoryExportJob;

    async fn submit(&self, query: &str) -> ReconResult<MemoryExportJob> {
        let mut inner = self.inner.lock().await;
        inner.submitted.push(query.to_string());

        let object = queried_object(query).unwrap_or_default();
        let Some(export) = inner.exports.get(object).cloned() else {
            bail!(
                ErrorKind::JobSubmissionRejected,
                "Export service rejected the request",
                format!("sObject type '{object}' is not supported")
            );
        };

        if export.rejects_submission {
            bail!(
                ErrorKind::JobSubmissionRejected,
                "Export service rejected the request",
                format!("INSUFFICIENT_ACCESS on '{object}'")
            );
        }

        inner.next_job += 1;
        let id = format!("memory-job-{}", inner.next_job);
        info!(job_id = %id, object, "memory export job submitted");

        Ok(MemoryExportJob { id, export })
    }
}

/// Job created by [`MemoryExportJobClient`].
#[derive(Debug)]
pub struct MemoryExportJob {
    id: String,
    export: ScriptedExport,
}

impl ExportJobHandle for MemoryExportJob {
    fn id(&self) -> &str {
        &self.id
    }

    async fn open_stream(self) -> ReconResult<ByteStream> {
        Ok(self.export.into_stream())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;

    #[tokio::test]
    async fn serves_registered_exports_and_records_queries() {
        let client = MemoryExportJobClient::new()
            .with_export("Account", ScriptedExport::from_chunks(["a", "b"]))
            .await;

        let job = client.submit("select Id from Account").await.unwrap();
        let chunks: Vec<Bytes> = job.open_stream().await.unwrap().try_collect().await.unwrap();

        assert_eq!(chunks, vec![Bytes::from("a"), Bytes::from("b")]);
        assert_eq!(
            client.submitted_queries().await,
            vec!["select Id from Account".to_string()]
        );
    }

    #[tokio::test]
    async fn unknown_objects_are_rejected() {
        let client = MemoryExportJobClient::new();

        let err = client.submit("select Id from Missing__c").await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::JobSubmissionRejected);
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn failing_export_ends_with_a_stream_error() {
        let client = MemoryExportJobClient::new()
            .with_export("Account", ScriptedExport::from_text("Id\n").failing())
            .await;

        let job = client.submit("select Id from Account").await.unwrap();
        let mut stream = job.open_stream().await.unwrap();

        assert!(stream.next().await.unwrap().is_ok());
        assert_eq!(
            stream.next().await.unwrap().unwrap_err().kind(),
            ErrorKind::StreamReadFailed
        );
    }
}
