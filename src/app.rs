use std::time::{Duration, Instant};

use camino::Utf8Path;
use serde::Serialize;

use crate::catalog::{Catalog, CatalogBuilder, DatasetSummary, RejectedPath};
use crate::config::ScanTarget;
use crate::domain::{DrsRecord, FieldMap, MipEra};
use crate::error::{CatalogError, Rejection};
use crate::store;
use crate::walker::PathSource;

#[derive(Debug, Clone, Serialize)]
pub struct ScanResult {
    pub generated_at: String,
    pub projects: Vec<ProjectScan>,
    pub rejected: Vec<RejectedPath>,
    #[serde(skip)]
    pub catalog: Catalog,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProjectScan {
    pub project: String,
    pub root: String,
    pub accepted: usize,
    pub rejected: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ParseResult {
    pub path: String,
    pub project: String,
    pub fields: Option<FieldMap>,
    pub record: Option<DrsRecord>,
    pub rejection: Option<Rejection>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SummaryResult {
    pub catalog: String,
    pub records: usize,
    pub datasets: Vec<DatasetSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProjectInfo {
    pub project: String,
    pub mip_era: MipEra,
    pub layout: String,
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

pub struct App<W: PathSource> {
    builder: CatalogBuilder,
    walker: W,
}

impl<W: PathSource> App<W> {
    pub fn new(builder: CatalogBuilder, walker: W) -> Self {
        Self { builder, walker }
    }

    /// Scans every target in order and concatenates the per-project
    /// catalogs. Targets are checked against the registry before any
    /// filesystem access.
    pub fn scan(
        &self,
        targets: &[ScanTarget],
        sink: &dyn ProgressSink,
    ) -> Result<ScanResult, CatalogError> {
        for target in targets {
            self.builder.registry().template(&target.project)?;
        }

        let mut catalog = Catalog::default();
        let mut projects = Vec::new();
        let mut rejected = Vec::new();
        for target in targets {
            sink.event(ProgressEvent {
                message: format!("phase=Scan; {} under {}", target.project, target.root),
                elapsed: None,
            });
            let started = Instant::now();
            let report = self
                .builder
                .build(&self.walker, &target.root, &target.project)?;
            sink.event(ProgressEvent {
                message: format!(
                    "phase=Scan; {}: {} accepted, {} rejected",
                    report.project,
                    report.catalog.len(),
                    report.rejected.len()
                ),
                elapsed: Some(started.elapsed()),
            });

            projects.push(ProjectScan {
                project: report.project,
                root: report.root.to_string(),
                accepted: report.catalog.len(),
                rejected: report.rejected.len(),
            });
            catalog.concat(report.catalog);
            rejected.extend(report.rejected);
        }

        Ok(ScanResult {
            generated_at: chrono::Utc::now().to_rfc3339(),
            projects,
            rejected,
            catalog,
        })
    }

    /// Scans and writes the merged catalog to `output`.
    pub fn build_catalog(
        &self,
        targets: &[ScanTarget],
        output: &Utf8Path,
        sink: &dyn ProgressSink,
    ) -> Result<ScanResult, CatalogError> {
        let result = self.scan(targets, sink)?;
        sink.event(ProgressEvent {
            message: format!("phase=Write; {} records to {output}", result.catalog.len()),
            elapsed: None,
        });
        store::write_catalog(output, &result.catalog)?;
        Ok(result)
    }

    /// Runs the full per-path pipeline on one path without touching the
    /// filesystem.
    pub fn parse_path(&self, path: &str, project: &str) -> Result<ParseResult, CatalogError> {
        let template = self.builder.registry().template(project)?;
        let fields = template.parse(path);
        let (record, rejection) = match self.builder.evaluate(template, Utf8Path::new(path)) {
            Ok(record) => (Some(record), None),
            Err(rejection) => (None, Some(rejection)),
        };
        Ok(ParseResult {
            path: path.to_string(),
            project: project.to_string(),
            fields,
            record,
            rejection,
        })
    }

    pub fn summarize(
        &self,
        catalog_path: &Utf8Path,
        sink: &dyn ProgressSink,
    ) -> Result<SummaryResult, CatalogError> {
        sink.event(ProgressEvent {
            message: format!("phase=Read; {catalog_path}"),
            elapsed: None,
        });
        let catalog = store::read_catalog(catalog_path)?;
        Ok(SummaryResult {
            catalog: catalog_path.to_string(),
            records: catalog.len(),
            datasets: catalog.summarize(),
        })
    }

    pub fn projects(&self) -> Vec<ProjectInfo> {
        self.builder
            .registry()
            .templates()
            .map(|template| ProjectInfo {
                project: template.project().to_string(),
                mip_era: template.mip_era(),
                layout: template.template().layout(),
            })
            .collect()
    }
}
