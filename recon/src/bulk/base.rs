use bytes::Bytes;
use futures::Stream;
use std::future::Future;
use std::pin::Pin;

use crate::error::ReconResult;

/// Finite, forward-only stream of raw result bytes.
///
/// Chunk boundaries are arbitrary. The end of the stream is signaled by the stream itself
/// ending; an `Err` item is a transport failure after which no more items are read.
pub type ByteStream = Pin<Box<dyn Stream<Item = ReconResult<Bytes>> + Send>>;

/// Service accepting queries as asynchronous bulk export jobs.
///
/// Implementations must report network-level failures with
/// [`crate::error::ErrorKind::SourceConnectionFailed`] and rejections by the service with
/// [`crate::error::ErrorKind::JobSubmissionRejected`], so callers can tell a retryable
/// failure from a query that will never succeed.
pub trait ExportJobClient {
    /// Handle to a submitted job.
    type Handle: ExportJobHandle + Send + 'static;

    /// Submits `query` as a new export job.
    fn submit(&self, query: &str) -> impl Future<Output = ReconResult<Self::Handle>> + Send;
}

/// Submitted export job whose results can be streamed once.
pub trait ExportJobHandle {
    /// Identifier assigned to the job by the service.
    fn id(&self) -> &str;

    /// Waits for the job to complete and opens its result stream.
    ///
    /// Fails with [`crate::error::ErrorKind::JobTimeout`] when the job does not complete within
    /// the configured poll timeout and with [`crate::error::ErrorKind::JobFailed`] when the
    /// service reports the job as failed or aborted.
    fn open_stream(self) -> impl Future<Output = ReconResult<ByteStream>> + Send;
}
