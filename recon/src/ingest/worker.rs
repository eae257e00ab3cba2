use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, error, info, info_span};

use crate::bulk::{ByteStream, ExportJobHandle};
use crate::error::{ErrorKind, ReconResult};
use crate::ingest::lines::LineBuffer;
use crate::ingest::rows::RowSink;
use crate::ingest::state::{StreamName, StreamState};
use crate::recon_error;
use crate::types::{DecodeRecord, RecordMap};

/// Consumes the result stream of one export job into a [`RecordMap`].
#[derive(Debug)]
pub struct IngestionWorker<H> {
    name: StreamName,
    job: H,
}

impl<H> IngestionWorker<H>
where
    H: ExportJobHandle + Send + 'static,
{
    pub fn new(name: StreamName, job: H) -> Self {
        Self { name, job }
    }

    /// Spawns the worker on the current runtime.
    ///
    /// The worker waits for the job to complete, opens its stream and ingests it. Whatever the
    /// outcome, the returned handle's state reaches a terminal phase when the task ends.
    pub fn start<R: DecodeRecord>(self) -> IngestionWorkerHandle<R> {
        let state = StreamState::new(self.name);
        let span = info_span!("ingestion", stream = %self.name, job_id = %self.job.id());

        let task_state = state.clone();
        let guard = FailOnDrop(state.clone());
        let handle = tokio::spawn(
            async move {
                let _guard = guard;
                let result = run(self.job, &task_state).await;
                match &result {
                    Ok(records) => {
                        info!(
                            records = records.len(),
                            bytes = task_state.bytes_read(),
                            rejected = task_state.rejected_rows(),
                            "export stream drained"
                        );
                        task_state.mark_done();
                    }
                    Err(err) => {
                        error!(error = %err, "export stream failed");
                        task_state.mark_failed();
                    }
                }

                result
            }
            .instrument(span),
        );

        IngestionWorkerHandle { state, handle }
    }
}

/// Marks the stream failed if the task ends without reaching a terminal phase, which happens
/// when it panics or is aborted.
struct FailOnDrop(StreamState);

impl Drop for FailOnDrop {
    fn drop(&mut self) {
        self.0.mark_failed();
    }
}

async fn run<H, R>(job: H, state: &StreamState) -> ReconResult<RecordMap<R>>
where
    H: ExportJobHandle,
    R: DecodeRecord,
{
    let stream = job.open_stream().await?;
    ingest_stream(stream, state).await
}

/// Reads `stream` to its end, decoding every complete line as soon as it is available.
///
/// The first line is the header and is discarded. An unterminated last line is processed once
/// the stream ends. A transport error aborts ingestion and the partial map is dropped.
pub async fn ingest_stream<R: DecodeRecord>(
    mut stream: ByteStream,
    state: &StreamState,
) -> ReconResult<RecordMap<R>> {
    let mut lines = LineBuffer::new();
    let mut sink = RowSink::<R>::new();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        state.add_bytes(chunk.len());
        lines.push(&chunk);

        while let Some(line) = lines.next_line() {
            sink.accept(&line);
        }
        state.set_counts(sink.record_count(), sink.rejected_rows());
    }

    let pending_bytes = lines.pending_bytes();
    if pending_bytes > 0 {
        debug!(
            stream = %state.name(),
            pending_bytes,
            "processing unterminated last line"
        );
    }

    if let Some(line) = lines.finish() {
        sink.accept(&line);
    }
    state.set_counts(sink.record_count(), sink.rejected_rows());

    Ok(sink.into_records())
}

/// Handle to a running [`IngestionWorker`].
#[derive(Debug)]
pub struct IngestionWorkerHandle<R> {
    state: StreamState,
    handle: JoinHandle<ReconResult<RecordMap<R>>>,
}

impl<R> IngestionWorkerHandle<R> {
    pub fn state(&self) -> &StreamState {
        &self.state
    }

    /// Stops the worker if it is still running.
    pub fn abort(&self) {
        self.handle.abort();
    }

    /// Waits for the worker and takes ownership of the map it built.
    pub async fn wait(self) -> ReconResult<RecordMap<R>> {
        match self.handle.await {
            Ok(result) => result,
            Err(err) if err.is_cancelled() => Err(recon_error!(
                ErrorKind::InvalidState,
                "Ingestion worker was aborted",
                self.state.name()
            )),
            Err(err) => Err(recon_error!(
                ErrorKind::IngestionWorkerPanic,
                "Ingestion worker panicked",
                format!("{} stream: {err}", self.state.name()),
                source: err
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bulk::memory::{MemoryExportJobClient, ScriptedExport};
    use crate::bulk::ExportJobClient;
    use crate::ingest::state::StreamPhase;
    use crate::types::{LegacyRecord, MigratedRecord};
    use bytes::Bytes;
    use futures::stream;

    const LEGACY_EXPORT: &str =
        "\"Id\",\"CreatedById\"\n\"a1\",\"u1\"\n\"a2\",\"u2\"\n\"a1\",\"u3\"\n\"\",\"\",\n";

    fn byte_stream(chunks: Vec<Bytes>) -> ByteStream {
        stream::iter(chunks.into_iter().map(Ok)).boxed()
    }

    fn split_every(text: &str, size: usize) -> Vec<Bytes> {
        text.as_bytes()
            .chunks(size)
            .map(Bytes::copy_from_slice)
            .collect()
    }

    #[tokio::test]
    async fn chunking_does_not_change_the_resulting_map() {
        let whole = ingest_stream::<LegacyRecord>(
            byte_stream(vec![Bytes::from_static(LEGACY_EXPORT.as_bytes())]),
            &StreamState::new(StreamName::Legacy),
        )
        .await
        .unwrap();

        for size in [1, 2, 3, 7, 16] {
            let chunked = ingest_stream::<LegacyRecord>(
                byte_stream(split_every(LEGACY_EXPORT, size)),
                &StreamState::new(StreamName::Legacy),
            )
            .await
            .unwrap();

            assert_eq!(chunked, whole, "chunk size {size}");
        }

        assert_eq!(whole.len(), 2);
        assert_eq!(whole.get("a1").map(|r| r.created_by.as_str()), Some("u3"));
    }

    #[tokio::test]
    async fn unterminated_last_line_is_flushed() {
        let state = StreamState::new(StreamName::Migrated);
        let records = ingest_stream::<MigratedRecord>(
            byte_stream(vec![Bytes::from_static(b"Id,Origin_Id__c\nm1,a1\nm2,a2")]),
            &state,
        )
        .await
        .unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(state.record_count(), 2);
        assert_eq!(state.bytes_read(), 27);
    }

    #[tokio::test]
    async fn worker_marks_state_done_and_returns_map() {
        let client = MemoryExportJobClient::new()
            .with_export("Legacy__c", ScriptedExport::from_text(LEGACY_EXPORT))
            .await;
        let job = client.submit("select Id from Legacy__c").await.unwrap();

        let handle = IngestionWorker::new(StreamName::Legacy, job).start::<LegacyRecord>();
        let state = handle.state().clone();
        let records = handle.wait().await.unwrap();

        assert_eq!(state.phase(), StreamPhase::Done);
        assert_eq!(records.len(), 2);
    }

    #[tokio::test]
    async fn transport_error_marks_state_failed() {
        let client = MemoryExportJobClient::new()
            .with_export(
                "Legacy__c",
                ScriptedExport::from_text(LEGACY_EXPORT).failing(),
            )
            .await;
        let job = client.submit("select Id from Legacy__c").await.unwrap();

        let handle = IngestionWorker::new(StreamName::Legacy, job).start::<LegacyRecord>();
        let state = handle.state().clone();
        let err = handle.wait().await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::StreamReadFailed);
        assert_eq!(state.phase(), StreamPhase::Failed);
    }

    #[tokio::test]
    async fn aborted_worker_is_marked_failed() {
        let client = MemoryExportJobClient::new()
            .with_export("Legacy__c", ScriptedExport::from_text("Id\n").stalled())
            .await;
        let job = client.submit("select Id from Legacy__c").await.unwrap();

        let handle = IngestionWorker::new(StreamName::Legacy, job).start::<LegacyRecord>();
        let state = handle.state().clone();
        handle.abort();
        let err = handle.wait().await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidState);
        assert!(state.is_failed());
    }
}
