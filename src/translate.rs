use std::collections::BTreeMap;

use crate::domain::FieldMap;
use crate::error::Rejection;

/// CMIP5-era CORDEX field names and their CMIP6-era equivalents.
pub const CMIP5_TO_CMIP6: [(&str, &str); 10] = [
    ("CORDEX_domain", "domain_id"),
    ("rcm_name", "source_id"),
    ("rcm_version", "version_realization"),
    ("institute", "institution_id"),
    ("driving_institute", "driving_institution_id"),
    ("driving_model", "driving_source_id"),
    ("experiment", "driving_experiment_id"),
    ("ensemble", "driving_variant_label"),
    ("variable", "variable_id"),
    ("product", "activity_id"),
];

/// Renames legacy field keys through a fixed table.
#[derive(Debug, Clone)]
pub struct Translator {
    mapping: BTreeMap<String, String>,
}

impl Default for Translator {
    fn default() -> Self {
        Self::cmip5_to_cmip6()
    }
}

impl Translator {
    pub fn new(mapping: BTreeMap<String, String>) -> Self {
        Self { mapping }
    }

    pub fn cmip5_to_cmip6() -> Self {
        Self::new(
            CMIP5_TO_CMIP6
                .iter()
                .map(|(from, to)| (from.to_string(), to.to_string()))
                .collect(),
        )
    }

    pub fn rename<'a>(&'a self, key: &'a str) -> &'a str {
        self.mapping.get(key).map(String::as_str).unwrap_or(key)
    }

    /// Renames every mapped key and keeps every other key as is.
    ///
    /// Two source keys landing on the same name would lose a value, so that
    /// case is a [`Rejection::TranslationConflict`] naming the target keys.
    pub fn translate(&self, fields: FieldMap) -> Result<FieldMap, Rejection> {
        let mut translated = FieldMap::new();
        let mut conflicts = Vec::new();
        for (key, value) in fields {
            let target = self.rename(&key).to_string();
            if translated.insert(target.clone(), value).is_some() && !conflicts.contains(&target) {
                conflicts.push(target);
            }
        }
        if conflicts.is_empty() {
            Ok(translated)
        } else {
            Err(Rejection::TranslationConflict { fields: conflicts })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn translate_renames_legacy_keys() {
        let fields: FieldMap = [
            ("rcm_name", "RACMO22E"),
            ("institute", "KNMI"),
            ("driving_model", "EC-EARTH"),
            ("CORDEX_domain", "EUR-11"),
            ("frequency", "mon"),
        ]
        .iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect();

        let translated = Translator::default().translate(fields).unwrap();
        assert_eq!(translated.get("source_id"), Some("RACMO22E"));
        assert_eq!(translated.get("institution_id"), Some("KNMI"));
        assert_eq!(translated.get("driving_source_id"), Some("EC-EARTH"));
        assert_eq!(translated.get("domain_id"), Some("EUR-11"));
        assert_eq!(translated.get("frequency"), Some("mon"));
        assert!(!translated.contains("rcm_name"));
        assert_eq!(translated.len(), 5);
    }

    #[test]
    fn duplicate_keys_pass_through() {
        let fields: FieldMap = [("rcm_name_2".to_string(), "RACMO22E".to_string())]
            .into_iter()
            .collect();
        let translated = Translator::default().translate(fields.clone()).unwrap();
        assert_eq!(translated, fields);
    }

    #[test]
    fn renaming_onto_an_existing_key_is_rejected() {
        let fields: FieldMap = [
            ("variable".to_string(), "pr".to_string()),
            ("variable_id".to_string(), "tas".to_string()),
            ("frequency".to_string(), "mon".to_string()),
        ]
        .into_iter()
        .collect();
        let rejection = Translator::default().translate(fields).unwrap_err();
        assert_eq!(
            rejection,
            Rejection::TranslationConflict {
                fields: vec!["variable_id".to_string()]
            }
        );
        assert_eq!(rejection.kind(), "translation-conflict");
    }

    #[test]
    fn custom_table_mapping_two_keys_together_is_rejected() {
        let translator = Translator::new(BTreeMap::from([
            ("model".to_string(), "source_id".to_string()),
            ("rcm".to_string(), "source_id".to_string()),
        ]));
        let fields: FieldMap = [
            ("model".to_string(), "A".to_string()),
            ("rcm".to_string(), "B".to_string()),
        ]
        .into_iter()
        .collect();
        assert!(translator.translate(fields).is_err());
    }

    #[test]
    fn custom_table() {
        let translator = Translator::new(BTreeMap::from([(
            "model".to_string(),
            "source_id".to_string(),
        )]));
        assert_eq!(translator.rename("model"), "source_id");
        assert_eq!(translator.rename("frequency"), "frequency");
    }
}
