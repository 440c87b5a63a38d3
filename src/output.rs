use std::io::{self, Write};

use serde::Serialize;

use crate::app::{ParseResult, ProgressEvent, ProgressSink, ProjectInfo, ScanResult, SummaryResult};

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Interactive,
    NonInteractive,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_scan(result: &ScanResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_parse(result: &ParseResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_summary(result: &SummaryResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_projects(result: &[ProjectInfo]) -> io::Result<()> {
        Self::print_json(&result)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, _event: ProgressEvent) {}
}

const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const RED: &str = "\x1b[31m";
const RESET: &str = "\x1b[0m";

/// Colored human-readable output on stdout, progress on stderr.
pub struct TextOutput;

impl TextOutput {
    pub fn print_scan(result: &ScanResult, output: &str) -> io::Result<()> {
        let mut stdout = io::stdout().lock();
        writeln!(stdout, "{CYAN}catalog summary{RESET}")?;
        for project in &result.projects {
            writeln!(
                stdout,
                "{GREEN}{}: {} files accepted{RESET} {YELLOW}({} rejected){RESET} under {}",
                project.project, project.accepted, project.rejected, project.root
            )?;
        }
        for rejected in &result.rejected {
            writeln!(
                stdout,
                "{RED}  rejected {}: {}{RESET}",
                rejected.path, rejected.rejection
            )?;
        }
        writeln!(
            stdout,
            "{CYAN}{} records written to {output}{RESET}",
            result.catalog.len()
        )
    }

    pub fn print_parse(result: &ParseResult) -> io::Result<()> {
        let mut stdout = io::stdout().lock();
        match (&result.record, &result.rejection) {
            (Some(record), _) => {
                writeln!(stdout, "{GREEN}accepted as {}{RESET}", record.mip_era)?;
                let values = record.values();
                for (column, value) in crate::domain::COLUMNS.iter().zip(values) {
                    writeln!(stdout, "  {column:<22} {value}")?;
                }
            }
            (None, Some(rejection)) => {
                writeln!(stdout, "{RED}rejected: {rejection}{RESET}")?;
                if let Some(fields) = &result.fields {
                    for (name, value) in fields.iter() {
                        writeln!(stdout, "  {name:<24} {value}")?;
                    }
                }
            }
            (None, None) => {}
        }
        Ok(())
    }

    pub fn print_summary(result: &SummaryResult) -> io::Result<()> {
        let mut stdout = io::stdout().lock();
        writeln!(
            stdout,
            "{CYAN}{}: {} records, {} datasets{RESET}",
            result.catalog,
            result.records,
            result.datasets.len()
        )?;
        for dataset in &result.datasets {
            writeln!(
                stdout,
                "{GREEN}{} {} {} {}/{} {} {} {} {} {}{RESET}: {}",
                dataset.mip_era,
                dataset.domain_id,
                dataset.institution_id,
                dataset.source_id,
                dataset.version_realization,
                dataset.driving_source_id,
                dataset.driving_experiment_id,
                dataset.driving_variant_label,
                dataset.frequency,
                dataset.version,
                dataset.variables.join(", ")
            )?;
        }
        Ok(())
    }

    pub fn print_projects(projects: &[ProjectInfo]) -> io::Result<()> {
        let mut stdout = io::stdout().lock();
        for project in projects {
            writeln!(stdout, "{CYAN}{} ({}){RESET}", project.project, project.mip_era)?;
            writeln!(stdout, "  {}", project.layout)?;
        }
        Ok(())
    }
}

impl ProgressSink for TextOutput {
    fn event(&self, event: ProgressEvent) {
        match event.elapsed {
            Some(elapsed) => eprintln!("{} ({:.1}s)", event.message, elapsed.as_secs_f64()),
            None => eprintln!("{}", event.message),
        }
    }
}
