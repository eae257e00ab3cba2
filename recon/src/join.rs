use crate::types::{JoinedRow, LegacyRecord, MigratedRecord, RecordMap};

/// Rows produced by [`reconcile`] with match statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinOutcome {
    pub rows: Vec<JoinedRow>,
    pub matched: usize,
    pub unmatched: usize,
}

/// Left-joins migrated records onto legacy records by origin id.
///
/// Emits exactly one row per migrated record, in the order records were first seen. A record
/// whose origin id is absent, or not present in `legacy`, gets no owner.
pub fn reconcile(
    legacy: &RecordMap<LegacyRecord>,
    migrated: &RecordMap<MigratedRecord>,
) -> JoinOutcome {
    let mut rows = Vec::with_capacity(migrated.len());
    let mut matched = 0;

    for record in migrated.iter() {
        let created_by = record
            .original_id
            .as_deref()
            .and_then(|origin| legacy.get(origin))
            .map(|owner| owner.created_by.clone());

        if created_by.is_some() {
            matched += 1;
        }

        rows.push(JoinedRow {
            id: record.id.clone(),
            created_by,
        });
    }

    JoinOutcome {
        unmatched: rows.len() - matched,
        rows,
        matched,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn legacy(records: &[(&str, &str)]) -> RecordMap<LegacyRecord> {
        let mut map = RecordMap::new();
        for (id, created_by) in records {
            map.insert(LegacyRecord {
                id: id.to_string(),
                created_by: created_by.to_string(),
            });
        }
        map
    }

    fn migrated(records: &[(&str, Option<&str>)]) -> RecordMap<MigratedRecord> {
        let mut map = RecordMap::new();
        for (id, original_id) in records {
            map.insert(MigratedRecord {
                id: id.to_string(),
                original_id: original_id.map(str::to_string),
            });
        }
        map
    }

    #[test]
    fn every_migrated_record_yields_one_row() {
        let legacy = legacy(&[("a1", "u1"), ("a2", "u2")]);
        let migrated = migrated(&[("m1", Some("a2")), ("m2", Some("zz")), ("m3", None)]);

        let outcome = reconcile(&legacy, &migrated);

        assert_eq!(
            outcome.rows,
            vec![
                JoinedRow {
                    id: "m1".to_string(),
                    created_by: Some("u2".to_string()),
                },
                JoinedRow {
                    id: "m2".to_string(),
                    created_by: None,
                },
                JoinedRow {
                    id: "m3".to_string(),
                    created_by: None,
                },
            ]
        );
        assert_eq!(outcome.matched, 1);
        assert_eq!(outcome.unmatched, 2);
    }

    #[test]
    fn matched_legacy_owner_may_be_empty() {
        let outcome = reconcile(
            &legacy(&[("a1", "")]),
            &migrated(&[("m1", Some("a1"))]),
        );

        assert_eq!(outcome.rows[0].created_by.as_deref(), Some(""));
        assert_eq!(outcome.matched, 1);
    }

    #[test]
    fn empty_inputs_produce_no_rows() {
        let outcome = reconcile(&RecordMap::new(), &RecordMap::new());

        assert!(outcome.rows.is_empty());
        assert_eq!(outcome.unmatched, 0);
    }
}
