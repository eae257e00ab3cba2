//! Typed records flowing through a reconciliation run.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt;

use csv::StringRecord;

/// Fields decoded from one delimited line of an export stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord(StringRecord);

impl RawRecord {
    pub fn new(fields: StringRecord) -> Self {
        Self(fields)
    }

    /// Returns the field at `index`, if the line has that many fields.
    pub fn field(&self, index: usize) -> Option<&str> {
        self.0.get(index)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'a> FromIterator<&'a str> for RawRecord {
    fn from_iter<T: IntoIterator<Item = &'a str>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Decodes a [`RawRecord`] into a typed record keyed by its identifier.
///
/// Returning [`None`] rejects the row, which is skipped without failing the stream.
pub trait DecodeRecord: Sized + Send + 'static {
    fn decode(raw: &RawRecord) -> Option<Self>;

    /// Identifier the record is keyed by. Field 0 of every export row.
    fn id(&self) -> &str;
}

/// Record of the legacy dataset: an id and the user who created it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyRecord {
    pub id: String,
    /// Owner id, possibly empty when the export left the column blank.
    pub created_by: String,
}

impl DecodeRecord for LegacyRecord {
    fn decode(raw: &RawRecord) -> Option<Self> {
        Some(Self {
            id: raw.field(0)?.to_string(),
            created_by: raw.field(1).unwrap_or_default().to_string(),
        })
    }

    fn id(&self) -> &str {
        &self.id
    }
}

/// Record of the migrated dataset, pointing back to its legacy id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigratedRecord {
    pub id: String,
    /// Legacy id this record originates from; [`None`] when the field is empty.
    pub original_id: Option<String>,
}

impl DecodeRecord for MigratedRecord {
    fn decode(raw: &RawRecord) -> Option<Self> {
        let original_id = raw
            .field(1)
            .filter(|value| !value.is_empty())
            .map(str::to_string);

        Some(Self {
            id: raw.field(0)?.to_string(),
            original_id,
        })
    }

    fn id(&self) -> &str {
        &self.id
    }
}

/// One output row: a migrated id and, if a legacy match exists, its owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinedRow {
    pub id: String,
    pub created_by: Option<String>,
}

/// Records keyed by id, iterated in the order ids were first inserted.
///
/// Inserting an existing id replaces the record in place, so the last row observed for an id
/// wins while the id keeps its original position.
#[derive(Clone, PartialEq, Eq)]
pub struct RecordMap<R> {
    positions: HashMap<String, usize>,
    records: Vec<R>,
}

impl<R: DecodeRecord> RecordMap<R> {
    pub fn new() -> Self {
        Self {
            positions: HashMap::new(),
            records: Vec::new(),
        }
    }

    /// Inserts `record`, returning the record it replaced.
    pub fn insert(&mut self, record: R) -> Option<R> {
        match self.positions.entry(record.id().to_string()) {
            Entry::Occupied(entry) => {
                Some(std::mem::replace(&mut self.records[*entry.get()], record))
            }
            Entry::Vacant(entry) => {
                entry.insert(self.records.len());
                self.records.push(record);
                None
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<&R> {
        self.positions.get(id).map(|&position| &self.records[position])
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &R> {
        self.records.iter()
    }
}

impl<R: DecodeRecord> Default for RecordMap<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: fmt::Debug> fmt::Debug for RecordMap<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.records.iter()).finish()
    }
}
