use recon_config::shared::DatasetMapping;

use crate::bail;
use crate::error::{ErrorKind, ReconResult};

/// Migrated datasets supported out of the box, with the legacy dataset each was migrated from.
const BUILTIN_MAPPINGS: &[(&str, &str)] = &[
    ("ULTEST__DataTest2__c", "ULTEST__DataTest__c"),
    ("cgcloud__Fund__c", "ACCL__Fund__c"),
    ("cgcloud__Payment__c", "ACCL__Payment__c"),
    ("cgcloud__Promotion__c", "ACCL__Promotion__c"),
    ("cgcloud__Tactic__c", "ACCL__Tactic__c"),
    ("CGT_StandardReport__c", "TPM_StandardReport__c"),
    ("CGT_UserCustomerProduct__c", "TPM_UserCustomerProduct__c"),
];

/// A resolved migrated dataset and its legacy counterpart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetPair {
    pub name: String,
    pub legacy_name: String,
}

/// Table of supported migrated datasets.
#[derive(Debug, Clone)]
pub struct DatasetCatalog {
    mappings: Vec<DatasetMapping>,
}

impl DatasetCatalog {
    pub fn builtin() -> Self {
        Self {
            mappings: BUILTIN_MAPPINGS
                .iter()
                .map(|(name, legacy_name)| DatasetMapping::new(*name, *legacy_name))
                .collect(),
        }
    }

    /// Adds `extra` to the table. A mapping for an already supported name replaces its legacy
    /// counterpart without changing its position.
    pub fn with_mappings(mut self, extra: impl IntoIterator<Item = DatasetMapping>) -> Self {
        for mapping in extra {
            match self.mappings.iter_mut().find(|m| m.name == mapping.name) {
                Some(existing) => existing.legacy_name = mapping.legacy_name,
                None => self.mappings.push(mapping),
            }
        }
        self
    }

    /// Resolves `name`, matched exactly.
    ///
    /// Fails with [`ErrorKind::UnsupportedDataset`] whose detail lists every supported name, one
    /// per line.
    pub fn resolve(&self, name: &str) -> ReconResult<DatasetPair> {
        let Some(mapping) = self.mappings.iter().find(|m| m.name == name) else {
            bail!(
                ErrorKind::UnsupportedDataset,
                "Dataset is not supported",
                detail = self.supported_names().join("\n")
            );
        };

        Ok(DatasetPair {
            name: mapping.name.clone(),
            legacy_name: mapping.legacy_name.clone(),
        })
    }

    pub fn supported_names(&self) -> Vec<&str> {
        self.mappings.iter().map(|m| m.name.as_str()).collect()
    }
}

impl Default for DatasetCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_builtin_datasets() {
        let pair = DatasetCatalog::builtin().resolve("cgcloud__Tactic__c").unwrap();

        assert_eq!(
            pair,
            DatasetPair {
                name: "cgcloud__Tactic__c".to_string(),
                legacy_name: "ACCL__Tactic__c".to_string(),
            }
        );
    }

    #[test]
    fn unsupported_names_list_every_supported_name() {
        let err = DatasetCatalog::builtin().resolve("Unknown__c").unwrap_err();

        assert_eq!(err.kind(), ErrorKind::UnsupportedDataset);
        insta::assert_snapshot!(err.detail().unwrap(), @r"
        ULTEST__DataTest2__c
        cgcloud__Fund__c
        cgcloud__Payment__c
        cgcloud__Promotion__c
        cgcloud__Tactic__c
        CGT_StandardReport__c
        CGT_UserCustomerProduct__c
        ");
    }

    #[test]
    fn lookup_is_case_sensitive() {
        assert!(DatasetCatalog::builtin().resolve("CGCLOUD__FUND__C").is_err());
    }

    #[test]
    fn configured_mappings_extend_and_override_the_table() {
        let catalog = DatasetCatalog::builtin().with_mappings([
            DatasetMapping::new("Custom__c", "Legacy_Custom__c"),
            DatasetMapping::new("cgcloud__Fund__c", "Other_Fund__c"),
        ]);

        assert_eq!(
            catalog.resolve("cgcloud__Fund__c").unwrap().legacy_name,
            "Other_Fund__c"
        );
        assert_eq!(
            catalog.resolve("Custom__c").unwrap().legacy_name,
            "Legacy_Custom__c"
        );
        assert_eq!(catalog.supported_names().len(), 8);
        assert_eq!(catalog.supported_names()[1], "cgcloud__Fund__c");
    }
}
