//! Declarative DRS templates and the per-project registry.
//!
//! A template is an ordered list of directory segments followed by an ordered
//! list of underscore-separated filename tokens. Each segment or token holds
//! one or more named fields joined by `-`. Filename fields named `<field>_2`
//! repeat the directory field `<field>` and are cross-checked by
//! [`crate::consistency`].
//!
//! Templates are compiled into a single anchored regular expression once, at
//! registration time.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::domain::{DUPLICATE_SUFFIX, FieldMap, MIP_ERA, MipEra, TIME_RANGE};
use crate::error::CatalogError;

pub const CORDEX_CMIP5: &str = "CORDEX-CMIP5";
pub const CORDEX_CMIP6: &str = "CORDEX-CMIP6";

const DIRECTORY_FIELD: &str = "[^/]+";
const DIRECTORY_PART: &str = "[^-/]+";
const FILENAME_FIELD: &str = "[^_/]+";
const FILENAME_PART: &str = "[^-_/]+";
const TIME_RANGE_FIELD: &str = "[^_/.]+";

/// Institute acronyms that contain `-` and would otherwise be split in the
/// middle of a combined `institute-model` token.
pub fn default_compound_institutes() -> Vec<String> {
    [
        "MPI-M",
        "CNRM-CERFACS",
        "NOAA-GFDL",
        "CSIRO-QCCCE",
        "CSIRO-BOM",
        "NIMR-KMA",
        "NASA-GISS",
        "NASA-GMAO",
        "LASG-CESS",
        "LASG-IAP",
        "NSF-DOE-NCAR",
        "COLA-CFS",
        "IPSL-INERIS",
        "RMIB-UGent",
        "CLMcom-BTU",
        "CLMcom-CMCC",
        "CLMcom-DWD",
        "CLMcom-ETH",
        "CLMcom-HZG",
        "CLMcom-KIT",
    ]
    .iter()
    .map(|name| name.to_string())
    .collect()
}

/// Pattern for an institute field: a known compound institute, else the text
/// up to the next `-`.
pub fn institute_pattern(compound: &[String]) -> String {
    let mut names = compound
        .iter()
        .filter(|name| !name.is_empty())
        .map(|name| regex::escape(name))
        .collect::<Vec<_>>();
    names.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
    names.dedup();
    names.push(FILENAME_PART.to_string());
    names.join("|")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
}

impl FieldSpec {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            pattern: None,
        }
    }

    pub fn with_pattern(name: &str, pattern: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            pattern: Some(pattern.into()),
        }
    }
}

/// One directory level or one filename token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "SegmentEntry", into = "SegmentEntry")]
pub struct Segment {
    pub fields: Vec<FieldSpec>,
}

impl Segment {
    pub fn field(name: &str) -> Self {
        Self {
            fields: vec![FieldSpec::new(name)],
        }
    }

    pub fn compound(fields: Vec<FieldSpec>) -> Self {
        Self { fields }
    }

    fn label(&self) -> String {
        self.fields
            .iter()
            .map(|field| field.name.as_str())
            .collect::<Vec<_>>()
            .join("-")
    }
}

/// Config form of a segment: `"driving_institute-driving_model"` or a list of
/// field objects when patterns need overriding.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum SegmentEntry {
    Shorthand(String),
    Detailed(Vec<FieldSpec>),
}

impl From<SegmentEntry> for Segment {
    fn from(entry: SegmentEntry) -> Self {
        match entry {
            SegmentEntry::Shorthand(value) => Segment {
                fields: value.split('-').map(FieldSpec::new).collect(),
            },
            SegmentEntry::Detailed(fields) => Segment { fields },
        }
    }
}

impl From<Segment> for SegmentEntry {
    fn from(segment: Segment) -> Self {
        if segment.fields.iter().all(|field| field.pattern.is_none()) {
            SegmentEntry::Shorthand(segment.label())
        } else {
            SegmentEntry::Detailed(segment.fields)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrsTemplate {
    pub project: String,
    /// Overrides the era derived from the project tag suffix.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mip_era: Option<MipEra>,
    pub directory: Vec<Segment>,
    pub filename: Vec<Segment>,
    #[serde(default = "default_time_range")]
    pub time_range: Option<FieldSpec>,
    #[serde(default = "default_extension")]
    pub extension: String,
}

fn default_time_range() -> Option<FieldSpec> {
    Some(FieldSpec::new(TIME_RANGE))
}

fn default_extension() -> String {
    ".nc".to_string()
}

impl DrsTemplate {
    /// CMIP6-era CORDEX layout.
    pub fn cordex_cmip6() -> Self {
        let directory = [
            "project_id",
            "activity_id",
            "domain_id",
            "institution_id",
            "driving_source_id",
            "driving_experiment_id",
            "driving_variant_label",
            "source_id",
            "version_realization",
            "frequency",
            "variable_id",
            "version",
        ];
        let filename = [
            "variable_id_2",
            "domain_id_2",
            "driving_source_id_2",
            "driving_experiment_id_2",
            "driving_variant_label_2",
            "institution_id_2",
            "source_id_2",
            "version_realization_2",
            "frequency_2",
        ];
        Self {
            project: CORDEX_CMIP6.to_string(),
            mip_era: None,
            directory: directory.iter().map(|name| Segment::field(name)).collect(),
            filename: filename.iter().map(|name| Segment::field(name)).collect(),
            time_range: default_time_range(),
            extension: default_extension(),
        }
    }

    /// CMIP5-era CORDEX layout, with the legacy field vocabulary.
    pub fn cordex_cmip5(compound_institutes: &[String]) -> Self {
        let institute = institute_pattern(compound_institutes);
        let directory = vec![
            Segment::field("project_id"),
            Segment::field("product"),
            Segment::field("CORDEX_domain"),
            Segment::field("institute"),
            Segment::compound(vec![
                FieldSpec::with_pattern("driving_institute", institute.clone()),
                FieldSpec::new("driving_model"),
            ]),
            Segment::field("experiment"),
            Segment::field("ensemble"),
            Segment::field("rcm_name"),
            Segment::field("rcm_version"),
            Segment::field("frequency"),
            Segment::field("variable"),
            Segment::field("version"),
        ];
        let filename = vec![
            Segment::field("variable_2"),
            Segment::field("CORDEX_domain_2"),
            Segment::compound(vec![
                FieldSpec::with_pattern("driving_institute_2", institute.clone()),
                FieldSpec::new("driving_model_2"),
            ]),
            Segment::field("experiment_2"),
            Segment::field("ensemble_2"),
            Segment::compound(vec![
                FieldSpec::with_pattern("institute_2", institute),
                FieldSpec::new("rcm_name_2"),
            ]),
            Segment::field("rcm_version_2"),
            Segment::field("frequency_2"),
        ];
        Self {
            project: CORDEX_CMIP5.to_string(),
            mip_era: None,
            directory,
            filename,
            time_range: default_time_range(),
            extension: default_extension(),
        }
    }

    /// Human-readable layout, e.g. `project_id/.../variable_id_2_..._frequency_2[_time_range].nc`.
    pub fn layout(&self) -> String {
        let mut out = self
            .directory
            .iter()
            .map(Segment::label)
            .collect::<Vec<_>>()
            .join("/");
        out.push('/');
        out.push_str(
            &self
                .filename
                .iter()
                .map(Segment::label)
                .collect::<Vec<_>>()
                .join("_"),
        );
        if let Some(time_range) = &self.time_range {
            let _ = write!(out, "[_{}]", time_range.name);
        }
        out.push_str(&self.extension);
        out
    }

    /// Validates the template and compiles it into a matcher.
    pub fn compile(self) -> Result<CompiledTemplate, CatalogError> {
        let invalid = |reason: String| CatalogError::InvalidTemplate {
            project: self.project.clone(),
            reason,
        };

        if self.directory.is_empty() {
            return Err(invalid("no directory segments".to_string()));
        }
        if self.filename.is_empty() {
            return Err(invalid("no filename tokens".to_string()));
        }
        if self.extension.is_empty() {
            return Err(invalid("empty file extension".to_string()));
        }
        let mip_era = match self.mip_era {
            Some(era) => era,
            None => MipEra::from_project_tag(&self.project)?,
        };

        let mut names = Vec::new();
        for segment in self.directory.iter().chain(&self.filename) {
            if segment.fields.is_empty() {
                return Err(invalid("segment without fields".to_string()));
            }
            names.extend(segment.fields.iter().map(|field| field.name.as_str()));
        }
        if let Some(time_range) = &self.time_range {
            names.push(time_range.name.as_str());
        }
        for name in &names {
            if !is_identifier(name) {
                return Err(invalid(format!("field name {name:?} is not an identifier")));
            }
            if *name == MIP_ERA {
                return Err(invalid(format!(
                    "{MIP_ERA} is derived from the project tag and cannot be captured"
                )));
            }
        }
        let mut seen = names.clone();
        seen.sort_unstable();
        if let Some(pair) = seen.windows(2).find(|pair| pair[0] == pair[1]) {
            return Err(invalid(format!("field {} appears twice", pair[0])));
        }

        let mut duplicates = Vec::new();
        for segment in &self.filename {
            for field in &segment.fields {
                let Some(primary) = field.name.strip_suffix(DUPLICATE_SUFFIX) else {
                    continue;
                };
                if !names.contains(&primary) {
                    return Err(invalid(format!(
                        "{} has no {primary} field to be checked against",
                        field.name
                    )));
                }
                duplicates.push((primary.to_string(), field.name.clone()));
            }
        }

        let source = self.regex_source();
        let regex = Regex::new(&source).map_err(|err| CatalogError::InvalidPattern {
            project: self.project.clone(),
            reason: err.to_string(),
        })?;

        Ok(CompiledTemplate {
            template: self,
            mip_era,
            regex,
            duplicates,
        })
    }

    fn regex_source(&self) -> String {
        // Anchored at the end; any number of parent directories may precede.
        let mut source = String::from(r"(?s)^(?:.*/)?");
        let directory = self
            .directory
            .iter()
            .map(|segment| segment_source(segment, DIRECTORY_FIELD, DIRECTORY_PART))
            .collect::<Vec<_>>();
        source.push_str(&directory.join("/"));
        source.push('/');
        let filename = self
            .filename
            .iter()
            .map(|segment| segment_source(segment, FILENAME_FIELD, FILENAME_PART))
            .collect::<Vec<_>>();
        source.push_str(&filename.join("_"));
        if let Some(time_range) = &self.time_range {
            let pattern = time_range.pattern.as_deref().unwrap_or(TIME_RANGE_FIELD);
            let _ = write!(source, "(?:_(?P<{}>(?:{pattern})))?", time_range.name);
        }
        source.push_str(&regex::escape(&self.extension));
        source.push('$');
        source
    }
}

fn segment_source(segment: &Segment, whole: &str, part: &str) -> String {
    let last = segment.fields.len().saturating_sub(1);
    segment
        .fields
        .iter()
        .enumerate()
        .map(|(idx, field)| {
            let default = if idx == last { whole } else { part };
            let pattern = field.pattern.as_deref().unwrap_or(default);
            format!("(?P<{}>(?:{pattern}))", field.name)
        })
        .collect::<Vec<_>>()
        .join("-")
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(ch) if ch.is_ascii_alphabetic() || ch == '_')
        && chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
}

/// A validated template ready to match paths.
#[derive(Debug, Clone)]
pub struct CompiledTemplate {
    template: DrsTemplate,
    mip_era: MipEra,
    regex: Regex,
    duplicates: Vec<(String, String)>,
}

impl CompiledTemplate {
    pub fn project(&self) -> &str {
        &self.template.project
    }

    pub fn mip_era(&self) -> MipEra {
        self.mip_era
    }

    pub fn template(&self) -> &DrsTemplate {
        &self.template
    }

    /// `(primary, duplicate)` field name pairs cross-checked by the template.
    pub fn duplicates(&self) -> &[(String, String)] {
        &self.duplicates
    }

    /// Matches `path` against the template.
    ///
    /// Returns every captured field plus `mip_era`, which always comes from
    /// the template's project tag and never from the path itself.
    pub fn parse(&self, path: &str) -> Option<FieldMap> {
        let captures = self.regex.captures(path)?;
        let mut fields = FieldMap::new();
        for name in self.regex.capture_names().flatten() {
            if let Some(value) = captures.name(name) {
                fields.insert(name, value.as_str());
            }
        }
        fields.insert(MIP_ERA, self.mip_era.as_str());
        Some(fields)
    }
}

/// Templates keyed by project tag.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    templates: BTreeMap<String, CompiledTemplate>,
}

impl Registry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// The two CORDEX layouts with the default compound institute list.
    pub fn cordex() -> Result<Self, CatalogError> {
        Self::with_compound_institutes(&default_compound_institutes())
    }

    pub fn with_compound_institutes(compound: &[String]) -> Result<Self, CatalogError> {
        let mut registry = Self::empty();
        registry.register(DrsTemplate::cordex_cmip5(compound))?;
        registry.register(DrsTemplate::cordex_cmip6())?;
        Ok(registry)
    }

    /// Compiles and adds a template, replacing any previous one for the
    /// same project.
    pub fn register(&mut self, template: DrsTemplate) -> Result<(), CatalogError> {
        let compiled = template.compile()?;
        self.templates
            .insert(compiled.project().to_string(), compiled);
        Ok(())
    }

    pub fn template(&self, project: &str) -> Result<&CompiledTemplate, CatalogError> {
        self.templates
            .get(project)
            .ok_or_else(|| CatalogError::UnknownProject(project.to_string()))
    }

    pub fn projects(&self) -> impl Iterator<Item = &str> {
        self.templates.keys().map(String::as_str)
    }

    pub fn templates(&self) -> impl Iterator<Item = &CompiledTemplate> {
        self.templates.values()
    }
}
