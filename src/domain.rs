use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};

use crate::error::{CatalogError, Rejection};

/// Catalog columns in output order.
pub const COLUMNS: [&str; 15] = [
    "project_id",
    "mip_era",
    "activity_id",
    "domain_id",
    "institution_id",
    "driving_source_id",
    "driving_experiment_id",
    "driving_variant_label",
    "source_id",
    "version_realization",
    "frequency",
    "version",
    "time_range",
    "variable_id",
    "path",
];

pub const MIP_ERA: &str = "mip_era";
pub const TIME_RANGE: &str = "time_range";

/// Suffix marking a filename field that duplicates a directory field.
pub const DUPLICATE_SUFFIX: &str = "_2";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MipEra {
    #[serde(rename = "CMIP5")]
    Cmip5,
    #[serde(rename = "CMIP6")]
    Cmip6,
}

impl MipEra {
    pub fn as_str(&self) -> &'static str {
        match self {
            MipEra::Cmip5 => "CMIP5",
            MipEra::Cmip6 => "CMIP6",
        }
    }

    /// Derives the era from a project tag such as `CORDEX-CMIP6`.
    pub fn from_project_tag(project: &str) -> Result<Self, CatalogError> {
        let suffix = project.rsplit('-').next().unwrap_or(project);
        suffix
            .parse()
            .map_err(|_| CatalogError::InvalidMipEra(project.to_string()))
    }
}

impl fmt::Display for MipEra {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MipEra {
    type Err = CatalogError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "CMIP5" => Ok(MipEra::Cmip5),
            "CMIP6" => Ok(MipEra::Cmip6),
            _ => Err(CatalogError::InvalidMipEra(value.to_string())),
        }
    }
}

/// Field name to value mapping extracted from one path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldMap(BTreeMap<String, String>);

impl FieldMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(name.into(), value.into())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(key, value)| (key.as_str(), value.as_str()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

impl IntoIterator for FieldMap {
    type Item = (String, String);
    type IntoIter = std::collections::btree_map::IntoIter<String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl FromIterator<(String, String)> for FieldMap {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// One accepted file in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DrsRecord {
    pub project_id: String,
    pub mip_era: MipEra,
    pub activity_id: String,
    pub domain_id: String,
    pub institution_id: String,
    pub driving_source_id: String,
    pub driving_experiment_id: String,
    pub driving_variant_label: String,
    pub source_id: String,
    pub version_realization: String,
    pub frequency: String,
    pub version: String,
    pub time_range: Option<String>,
    pub variable_id: String,
    pub path: Utf8PathBuf,
}

impl DrsRecord {
    /// Builds a record from a canonical (CMIP6-vocabulary) field map.
    ///
    /// Every column except `time_range` must be present and non-empty; an
    /// empty `time_range` is treated as absent.
    pub fn from_fields(fields: &FieldMap, path: &Utf8Path) -> Result<Self, Rejection> {
        let missing = COLUMNS
            .iter()
            .filter(|column| !matches!(**column, TIME_RANGE | "path"))
            .filter(|column| fields.get(column).is_none_or(str::is_empty))
            .map(|column| column.to_string())
            .collect::<Vec<_>>();
        if !missing.is_empty() {
            return Err(Rejection::IncompleteRecord { missing });
        }

        let take = |name: &str| fields.get(name).unwrap_or_default().to_string();
        let mip_era = fields
            .get(MIP_ERA)
            .and_then(|value| value.parse().ok())
            .ok_or_else(|| Rejection::IncompleteRecord {
                missing: vec![MIP_ERA.to_string()],
            })?;

        Ok(Self {
            project_id: take("project_id"),
            mip_era,
            activity_id: take("activity_id"),
            domain_id: take("domain_id"),
            institution_id: take("institution_id"),
            driving_source_id: take("driving_source_id"),
            driving_experiment_id: take("driving_experiment_id"),
            driving_variant_label: take("driving_variant_label"),
            source_id: take("source_id"),
            version_realization: take("version_realization"),
            frequency: take("frequency"),
            version: take("version"),
            time_range: fields
                .get(TIME_RANGE)
                .filter(|value| !value.is_empty())
                .map(str::to_string),
            variable_id: take("variable_id"),
            path: path.to_path_buf(),
        })
    }

    /// Cell values in [`COLUMNS`] order; an absent time range is empty.
    pub fn values(&self) -> [&str; 15] {
        [
            &self.project_id,
            self.mip_era.as_str(),
            &self.activity_id,
            &self.domain_id,
            &self.institution_id,
            &self.driving_source_id,
            &self.driving_experiment_id,
            &self.driving_variant_label,
            &self.source_id,
            &self.version_realization,
            &self.frequency,
            &self.version,
            self.time_range.as_deref().unwrap_or(""),
            &self.variable_id,
            self.path.as_str(),
        ]
    }
}
