use recon_config::shared::QueryConfig;

use crate::dataset::DatasetPair;

/// The two queries issued for one reconciliation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportQueries {
    /// Ids and owners of the legacy dataset.
    pub legacy: String,
    /// Ids and origin ids of migrated records that carry an origin.
    pub migrated: String,
}

impl ExportQueries {
    pub fn new(pair: &DatasetPair, config: &QueryConfig) -> Self {
        Self {
            legacy: format!("select Id,{} from {}", config.owner_field, pair.legacy_name),
            migrated: format!(
                "select Id,{origin} from {name} where {origin} !=null",
                origin = config.origin_field,
                name = pair.name,
            ),
        }
    }
}

/// Returns the object named by the `from` clause of `query`, if any.
pub fn queried_object(query: &str) -> Option<&str> {
    let mut tokens = query.split_whitespace();
    tokens.find(|token| token.eq_ignore_ascii_case("from"))?;
    tokens.next()
}
