use std::collections::BTreeMap;
use std::io::{Read, Write};

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::consistency;
use crate::domain::{COLUMNS, DrsRecord, FieldMap, MipEra};
use crate::error::{CatalogError, Rejection};
use crate::registry::{CompiledTemplate, Registry};
use crate::translate::Translator;
use crate::walker::PathSource;

/// Ordered set of accepted records. No key, no de-duplication.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Catalog {
    records: Vec<DrsRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedPath {
    pub path: Utf8PathBuf,
    #[serde(flatten)]
    pub rejection: Rejection,
}

/// Outcome of scanning one root for one project.
#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub project: String,
    pub root: Utf8PathBuf,
    pub catalog: Catalog,
    pub rejected: Vec<RejectedPath>,
}

/// One row of the human-readable dataset overview: every catalog column
/// except variable, time range and path, plus the variables found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatasetSummary {
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
    pub variables: Vec<String>,
}

/// Runs matcher, consistency check and translation over discovered paths.
#[derive(Debug, Clone)]
pub struct CatalogBuilder {
    registry: Registry,
    translator: Translator,
}

impl CatalogBuilder {
    pub fn new(registry: Registry, translator: Translator) -> Self {
        Self {
            registry,
            translator,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Matches a single path against the template of `project`.
    ///
    /// `Ok(None)` means the path does not fit the layout; only an unknown
    /// project is an error.
    pub fn parse(&self, path: &str, project: &str) -> Result<Option<FieldMap>, CatalogError> {
        let template = self.registry.template(project)?;
        let fields = template.parse(path);
        if fields.is_none() {
            warn!("no match for {project} layout, ignoring {path}");
        }
        Ok(fields)
    }

    /// Parses, checks and normalizes one path into a catalog record.
    ///
    /// The consistency check runs on the untranslated fields, translation
    /// only for CMIP5-era templates.
    pub fn evaluate(
        &self,
        template: &CompiledTemplate,
        path: &Utf8Path,
    ) -> Result<DrsRecord, Rejection> {
        let fields = template.parse(path.as_str()).ok_or_else(|| Rejection::NoMatch {
            project: template.project().to_string(),
        })?;

        let mismatches = consistency::check(&fields);
        if !mismatches.is_empty() {
            return Err(Rejection::FieldInconsistency { mismatches });
        }

        let fields = match template.mip_era() {
            MipEra::Cmip5 => self.translator.translate(fields)?,
            MipEra::Cmip6 => fields,
        };
        DrsRecord::from_fields(&fields, path)
    }

    /// Scans `root` for `project` files and assembles the accepted records.
    ///
    /// Individual bad files never fail the build; they end up in
    /// [`ScanReport::rejected`].
    pub fn build<S: PathSource + ?Sized>(
        &self,
        source: &S,
        root: &Utf8Path,
        project: &str,
    ) -> Result<ScanReport, CatalogError> {
        let template = self.registry.template(project)?;
        let mut catalog = Catalog::default();
        let mut rejected = Vec::new();

        for path in source.discover(root)? {
            debug!("parsing {path}");
            match self.evaluate(template, &path) {
                Ok(record) => catalog.push(record),
                Err(rejection) => {
                    warn!("ignoring {path}: {} ({rejection})", rejection.kind());
                    rejected.push(RejectedPath { path, rejection });
                }
            }
        }

        info!(
            "{project}: {} records accepted, {} rejected under {root}",
            catalog.len(),
            rejected.len()
        );
        Ok(ScanReport {
            project: project.to_string(),
            root: root.to_path_buf(),
            catalog,
            rejected,
        })
    }
}

impl Catalog {
    pub fn new(records: Vec<DrsRecord>) -> Self {
        Self { records }
    }

    pub fn push(&mut self, record: DrsRecord) {
        self.records.push(record);
    }

    /// Appends every record of `other`, keeping duplicates.
    pub fn concat(&mut self, other: Catalog) {
        self.records.extend(other.records);
    }

    pub fn records(&self) -> &[DrsRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records sorted by their full column tuple, for order-insensitive
    /// comparison of two scans.
    pub fn sorted_records(&self) -> Vec<&DrsRecord> {
        let mut records = self.records.iter().collect::<Vec<_>>();
        records.sort();
        records
    }

    /// Groups records by dataset and lists the variables of each group in
    /// first-seen order. Groups come out sorted by their key columns.
    pub fn summarize(&self) -> Vec<DatasetSummary> {
        let mut groups = BTreeMap::<[&str; 12], (MipEra, Vec<String>)>::new();
        for record in &self.records {
            let key: [&str; 12] = [
                &record.project_id,
                record.mip_era.as_str(),
                &record.activity_id,
                &record.domain_id,
                &record.institution_id,
                &record.driving_source_id,
                &record.driving_experiment_id,
                &record.driving_variant_label,
                &record.source_id,
                &record.version_realization,
                &record.frequency,
                &record.version,
            ];
            let (_, variables) = groups
                .entry(key)
                .or_insert_with(|| (record.mip_era, Vec::new()));
            if !variables.contains(&record.variable_id) {
                variables.push(record.variable_id.clone());
            }
        }

        groups
            .into_iter()
            .map(|(key, (mip_era, variables))| DatasetSummary {
                project_id: key[0].to_string(),
                mip_era,
                activity_id: key[2].to_string(),
                domain_id: key[3].to_string(),
                institution_id: key[4].to_string(),
                driving_source_id: key[5].to_string(),
                driving_experiment_id: key[6].to_string(),
                driving_variant_label: key[7].to_string(),
                source_id: key[8].to_string(),
                version_realization: key[9].to_string(),
                frequency: key[10].to_string(),
                version: key[11].to_string(),
                variables,
            })
            .collect()
    }

    /// Writes a header line in [`COLUMNS`] order followed by one row per
    /// record. An absent time range is an empty cell.
    pub fn write_csv<W: Write>(&self, writer: W) -> std::io::Result<()> {
        let mut writer = csv::Writer::from_writer(writer);
        writer.write_record(COLUMNS)?;
        for record in &self.records {
            writer.write_record(record.values())?;
        }
        writer.flush()
    }

    /// Reads a table produced by [`Catalog::write_csv`].
    ///
    /// Columns are located by header name, so their order does not matter;
    /// extra columns are ignored.
    pub fn read_csv<R: Read>(reader: R) -> Result<Self, CatalogError> {
        let mut reader = csv::Reader::from_reader(reader);
        let headers = reader.headers().map_err(csv_error)?.clone();
        if let Some(column) = COLUMNS
            .iter()
            .find(|column| !headers.iter().any(|name| name == **column))
        {
            return Err(CatalogError::CatalogFormat(format!("missing column {column}")));
        }

        let mut records = Vec::new();
        for (idx, row) in reader.deserialize::<FieldMap>().enumerate() {
            let fields = row.map_err(csv_error)?;
            let path = Utf8Path::new(fields.get("path").unwrap_or_default());
            let record = DrsRecord::from_fields(&fields, path).map_err(|rejection| {
                CatalogError::CatalogFormat(format!("row {}: {rejection}", idx + 2))
            })?;
            records.push(record);
        }
        Ok(Self { records })
    }
}

fn csv_error(err: csv::Error) -> CatalogError {
    if err.is_io_error() {
        CatalogError::Filesystem(err.to_string())
    } else {
        CatalogError::CatalogFormat(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::walker::MemoryPaths;

    const CMIP6_FILE: &str = "CORDEX-CMIP6/DD/EUR-12/GERICS/ERA5/evaluation/r1i1p1f1/REMO2020/v1-r1/mon/tas/v20241120/tas_EUR-12_ERA5_evaluation_r1i1p1f1_GERICS_REMO2020_v1-r1_mon_197901-198812.nc";

    fn builder() -> CatalogBuilder {
        CatalogBuilder::new(Registry::cordex().unwrap(), Translator::default())
    }

    fn record(variable: &str, frequency: &str, path: &str) -> DrsRecord {
        DrsRecord {
            project_id: "CORDEX-CMIP6".to_string(),
            mip_era: MipEra::Cmip6,
            activity_id: "DD".to_string(),
            domain_id: "EUR-12".to_string(),
            institution_id: "GERICS".to_string(),
            driving_source_id: "ERA5".to_string(),
            driving_experiment_id: "evaluation".to_string(),
            driving_variant_label: "r1i1p1f1".to_string(),
            source_id: "REMO2020".to_string(),
            version_realization: "v1-r1".to_string(),
            frequency: frequency.to_string(),
            version: "v20241120".to_string(),
            time_range: None,
            variable_id: variable.to_string(),
            path: Utf8PathBuf::from(path),
        }
    }

    #[test]
    fn parse_unknown_project_is_an_error() {
        let err = builder().parse(CMIP6_FILE, "CORDEX-CMIP7").unwrap_err();
        assert_matches!(err, CatalogError::UnknownProject(_));
    }

    #[test]
    fn parse_no_match_is_none() {
        let fields = builder().parse("tas_mon.nc", "CORDEX-CMIP6").unwrap();
        assert!(fields.is_none());
    }

    #[test]
    fn evaluate_rejects_inconsistent_filename() {
        let builder = builder();
        let template = builder.registry().template("CORDEX-CMIP6").unwrap();
        let path = CMIP6_FILE.replace("_GERICS_", "_CLMcom_");
        let rejection = builder
            .evaluate(template, Utf8Path::new(&path))
            .unwrap_err();
        assert_matches!(rejection, Rejection::FieldInconsistency { ref mismatches }
            if mismatches.len() == 1 && mismatches[0].field == "institution_id");
    }

    #[test]
    fn build_keeps_accepted_and_reports_rejected() {
        let source = MemoryPaths::new([
            format!("/data/{CMIP6_FILE}"),
            "/data/CORDEX-CMIP6/broken/tas.nc".to_string(),
        ]);
        let report = builder()
            .build(&source, Utf8Path::new("/data"), "CORDEX-CMIP6")
            .unwrap();
        assert_eq!(report.catalog.len(), 1);
        assert_eq!(report.rejected.len(), 1);
        assert_matches!(report.rejected[0].rejection, Rejection::NoMatch { .. });
        assert_eq!(report.catalog.records()[0].source_id, "REMO2020");
    }

    #[test]
    fn concat_keeps_duplicates() {
        let mut catalog = Catalog::new(vec![record("tas", "mon", "a.nc")]);
        catalog.concat(Catalog::new(vec![record("tas", "mon", "a.nc")]));
        assert_eq!(catalog.len(), 2);
    }

    #[test]
    fn summarize_groups_variables() {
        let catalog = Catalog::new(vec![
            record("tas", "mon", "a.nc"),
            record("pr", "mon", "b.nc"),
            record("tas", "mon", "c.nc"),
            record("tas", "day", "d.nc"),
        ]);
        let summary = catalog.summarize();
        assert_eq!(summary.len(), 2);
        assert_eq!(summary[0].frequency, "day");
        assert_eq!(summary[0].variables, vec!["tas".to_string()]);
        assert_eq!(summary[1].frequency, "mon");
        assert_eq!(
            summary[1].variables,
            vec!["tas".to_string(), "pr".to_string()]
        );
    }

    #[test]
    fn csv_header_and_empty_time_range() {
        let catalog = Catalog::new(vec![record("orog", "fx", "/data/orog.nc")]);
        let mut out = Vec::new();
        catalog.write_csv(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next().unwrap(), COLUMNS.join(","));
        assert_eq!(
            lines.next().unwrap(),
            "CORDEX-CMIP6,CMIP6,DD,EUR-12,GERICS,ERA5,evaluation,r1i1p1f1,REMO2020,v1-r1,fx,v20241120,,orog,/data/orog.nc"
        );
    }

    #[test]
    fn csv_reads_back_with_quoting() {
        let mut tricky = record("tas", "mon", "/data/with,comma/\"q\".nc");
        tricky.time_range = Some("197901-198812".to_string());
        let catalog = Catalog::new(vec![tricky, record("pr", "day", "/data/pr.nc")]);
        let mut out = Vec::new();
        catalog.write_csv(&mut out).unwrap();
        let loaded = Catalog::read_csv(out.as_slice()).unwrap();
        assert_eq!(loaded, catalog);
    }

    #[test]
    fn csv_reads_columns_by_name() {
        let mut columns = COLUMNS.to_vec();
        columns.reverse();
        let expected = record("tas", "mon", "/x.nc");
        let mut values = expected.values().to_vec();
        values.reverse();
        let text = format!("{}\n{}\n", columns.join(","), values.join(","));
        let loaded = Catalog::read_csv(text.as_bytes()).unwrap();
        assert_eq!(loaded.records()[0], expected);
    }

    #[test]
    fn csv_keeps_newlines_inside_quoted_cells() {
        let catalog = Catalog::new(vec![record("tas", "mon", "/data/two\nlines.nc")]);
        let mut out = Vec::new();
        catalog.write_csv(&mut out).unwrap();
        let loaded = Catalog::read_csv(out.as_slice()).unwrap();
        assert_eq!(loaded.records()[0].path, Utf8PathBuf::from("/data/two\nlines.nc"));
    }

    #[test]
    fn csv_empty_required_cell_is_an_error() {
        let mut values = record("tas", "mon", "/x.nc").values().map(str::to_string);
        values[8] = String::new();
        let text = format!("{}\n{}\n", COLUMNS.join(","), values.join(","));
        let err = Catalog::read_csv(text.as_bytes()).unwrap_err();
        assert_matches!(err, CatalogError::CatalogFormat(ref msg)
            if msg.starts_with("row 2") && msg.contains("source_id"));
    }

    #[test]
    fn csv_missing_column_is_an_error() {
        let err = Catalog::read_csv("project_id,mip_era\n".as_bytes()).unwrap_err();
        assert_matches!(err, CatalogError::CatalogFormat(ref msg) if msg.contains("activity_id"));
    }
}
