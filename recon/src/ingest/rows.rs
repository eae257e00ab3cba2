use csv::{ReaderBuilder, StringRecord};
use tracing::debug;

use crate::types::{DecodeRecord, RawRecord, RecordMap};

/// What happened to a line handed to a [`RowSink`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowOutcome {
    /// The first line of the stream, discarded unconditionally.
    Header,
    /// A new record was inserted.
    Inserted,
    /// A record with the same id was replaced.
    Replaced,
    /// An empty line or a row with an empty id, discarded silently.
    Sentinel,
    /// The line could not be parsed or decoded and was skipped.
    Rejected,
}

/// Decodes lines into typed records and accumulates them by id.
#[derive(Debug)]
pub struct RowSink<R> {
    header_seen: bool,
    records: RecordMap<R>,
    rejected: u64,
}

impl<R: DecodeRecord> RowSink<R> {
    pub fn new() -> Self {
        Self {
            header_seen: false,
            records: RecordMap::new(),
            rejected: 0,
        }
    }

    /// Processes one line, without its terminator.
    pub fn accept(&mut self, line: &[u8]) -> RowOutcome {
        if !self.header_seen {
            self.header_seen = true;
            return RowOutcome::Header;
        }

        if line.is_empty() {
            return RowOutcome::Sentinel;
        }

        let raw = match parse_fields(line) {
            Ok(Some(raw)) => raw,
            Ok(None) => return RowOutcome::Sentinel,
            Err(err) => {
                debug!(error = %err, "skipping unparsable row");
                self.rejected += 1;
                return RowOutcome::Rejected;
            }
        };

        let Some(record) = R::decode(&raw) else {
            debug!(fields = raw.len(), "skipping row rejected by decoder");
            self.rejected += 1;
            return RowOutcome::Rejected;
        };

        if is_sentinel_id(record.id()) {
            return RowOutcome::Sentinel;
        }

        match self.records.insert(record) {
            Some(_) => RowOutcome::Replaced,
            None => RowOutcome::Inserted,
        }
    }

    /// Number of distinct ids accepted so far.
    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    pub fn rejected_rows(&self) -> u64 {
        self.rejected
    }

    pub fn into_records(self) -> RecordMap<R> {
        self.records
    }
}

impl<R: DecodeRecord> Default for RowSink<R> {
    fn default() -> Self {
        Self::new()
    }
}

/// Bulk exports terminate with an empty line and may emit a row whose id is a quoted empty
/// string; neither identifies a record.
fn is_sentinel_id(id: &str) -> bool {
    id.is_empty() || id == "\"\""
}

fn parse_fields(line: &[u8]) -> Result<Option<RawRecord>, csv::Error> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(line);

    let mut fields = StringRecord::new();
    if reader.read_record(&mut fields)? {
        Ok(Some(RawRecord::new(fields)))
    } else {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{LegacyRecord, MigratedRecord};

    #[test]
    fn header_and_sentinel_rows_are_discarded() {
        let mut sink = RowSink::<LegacyRecord>::new();

        assert_eq!(sink.accept(br#""Id","CreatedById""#), RowOutcome::Header);
        assert_eq!(sink.accept(br#""001",,"005""#), RowOutcome::Inserted);
        assert_eq!(sink.accept(br#""","","#), RowOutcome::Sentinel);
        assert_eq!(sink.accept(b""), RowOutcome::Sentinel);

        let records = sink.into_records();
        assert_eq!(records.len(), 1);
        assert_eq!(
            records.get("001"),
            Some(&LegacyRecord {
                id: "001".to_string(),
                created_by: String::new(),
            })
        );
    }

    #[test]
    fn header_is_discarded_even_when_it_looks_like_data() {
        let mut sink = RowSink::<LegacyRecord>::new();

        assert_eq!(sink.accept(b"a1,u1"), RowOutcome::Header);
        assert_eq!(sink.accept(b"a2,u2"), RowOutcome::Inserted);
        assert_eq!(sink.record_count(), 1);
    }

    #[test]
    fn quoted_commas_stay_inside_fields() {
        let mut sink = RowSink::<MigratedRecord>::new();
        sink.accept(b"Id,Origin_Id__c");
        sink.accept(br#""m1","a,b""#);

        let records = sink.into_records();
        assert_eq!(
            records.get("m1").and_then(|r| r.original_id.as_deref()),
            Some("a,b")
        );
    }

    #[test]
    fn invalid_utf8_rows_are_rejected_and_counted() {
        let mut sink = RowSink::<LegacyRecord>::new();
        sink.accept(b"Id,CreatedById");

        assert_eq!(sink.accept(b"\xff\xfe,u1"), RowOutcome::Rejected);
        assert_eq!(sink.accept(b"a1,u1"), RowOutcome::Inserted);
        assert_eq!(sink.rejected_rows(), 1);
        assert_eq!(sink.record_count(), 1);
    }

    #[test]
    fn duplicate_ids_report_replacement() {
        let mut sink = RowSink::<LegacyRecord>::new();
        sink.accept(b"Id,CreatedById");
        sink.accept(b"a1,u1");

        assert_eq!(sink.accept(b"a1,u2"), RowOutcome::Replaced);
        assert_eq!(
            sink.into_records().get("a1").map(|r| r.created_by.as_str()),
            Some("u2")
        );
    }
}
