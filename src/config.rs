use std::fmt;
use std::fs;
use std::str::FromStr;

use camino::Utf8PathBuf;
use directories::BaseDirs;
use serde::{Deserialize, Serialize};

use crate::error::CatalogError;
use crate::registry::{DrsTemplate, Registry, default_compound_institutes};

pub const CONFIG_FILE: &str = "cordex-catalog.json";
pub const DEFAULT_CATALOG: &str = "catalog.csv";

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub output: Option<String>,
    #[serde(default)]
    pub projects: Vec<ProjectEntry>,
    #[serde(default)]
    pub compound_institutes: Option<Vec<String>>,
    #[serde(default)]
    pub templates: Vec<DrsTemplate>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ProjectEntry {
    Shorthand(String),
    Detailed(ProjectEntryObject),
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ProjectEntryObject {
    pub project: String,
    pub root: String,
}

/// A project family and the directory holding its DRS tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanTarget {
    pub project: String,
    pub root: Utf8PathBuf,
}

impl ScanTarget {
    pub fn new(project: impl Into<String>, root: impl Into<Utf8PathBuf>) -> Self {
        Self {
            project: project.into(),
            root: root.into(),
        }
    }
}

impl fmt::Display for ScanTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.project, self.root)
    }
}

impl FromStr for ScanTarget {
    type Err = CatalogError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (project, root) = value
            .trim()
            .split_once('=')
            .ok_or_else(|| CatalogError::InvalidTarget(value.to_string()))?;
        let (project, root) = (project.trim(), root.trim());
        if project.is_empty() || root.is_empty() {
            return Err(CatalogError::InvalidTarget(value.to_string()));
        }
        Ok(Self::new(project, root))
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    pub output: Utf8PathBuf,
    pub targets: Vec<ScanTarget>,
    pub registry: Registry,
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads the config at `path`, else `cordex-catalog.json` in the current
    /// directory, else the per-user config file.
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, CatalogError> {
        let config_path = match path {
            Some(path) => Utf8PathBuf::from(path),
            None => Self::locate().ok_or(CatalogError::MissingConfig)?,
        };
        Self::resolve_config(Self::read(&config_path)?)
    }

    /// Like [`ConfigLoader::resolve`], but an absent default config yields
    /// the built-in CORDEX registry and no scan targets.
    pub fn resolve_or_default(path: Option<&str>) -> Result<ResolvedConfig, CatalogError> {
        match Self::resolve(path) {
            Err(CatalogError::MissingConfig) => Self::resolve_config(Config::default()),
            other => other,
        }
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, CatalogError> {
        let schema_version = config.schema_version.unwrap_or(1);
        let compound = config
            .compound_institutes
            .unwrap_or_else(default_compound_institutes);

        let mut registry = Registry::with_compound_institutes(&compound)?;
        for template in config.templates {
            registry.register(template)?;
        }

        let targets = config
            .projects
            .into_iter()
            .map(|entry| match entry {
                ProjectEntry::Shorthand(value) => value.parse::<ScanTarget>(),
                ProjectEntry::Detailed(obj) => Ok(ScanTarget::new(obj.project, obj.root)),
            })
            .collect::<Result<Vec<_>, CatalogError>>()?;
        for target in &targets {
            registry.template(&target.project)?;
        }

        Ok(ResolvedConfig {
            schema_version,
            output: Utf8PathBuf::from(config.output.as_deref().unwrap_or(DEFAULT_CATALOG)),
            targets,
            registry,
        })
    }

    fn locate() -> Option<Utf8PathBuf> {
        let local = Utf8PathBuf::from(CONFIG_FILE);
        if local.as_std_path().exists() {
            return Some(local);
        }
        BaseDirs::new()
            .and_then(|dirs| {
                Utf8PathBuf::from_path_buf(
                    dirs.config_dir().join("cordex-catalog").join(CONFIG_FILE),
                )
                .ok()
            })
            .filter(|path| path.as_std_path().exists())
    }

    fn read(path: &Utf8PathBuf) -> Result<Config, CatalogError> {
        let content = fs::read_to_string(path.as_std_path())
            .map_err(|_| CatalogError::ConfigRead(path.clone()))?;
        serde_json::from_str(&content).map_err(|err| CatalogError::ConfigParse(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn parse_config_shorthand() {
        let config = Config {
            projects: vec![ProjectEntry::Shorthand(
                "CORDEX-CMIP6=/mnt/sim_data/CORDEX-CMIP6".to_string(),
            )],
            ..Config::default()
        };

        let resolved = ConfigLoader::resolve_config(config).unwrap();
        assert_eq!(resolved.schema_version, 1);
        assert_eq!(resolved.output, Utf8PathBuf::from(DEFAULT_CATALOG));
        assert_eq!(
            resolved.targets,
            vec![ScanTarget::new("CORDEX-CMIP6", "/mnt/sim_data/CORDEX-CMIP6")]
        );
    }

    #[test]
    fn config_rejects_unknown_project() {
        let config = Config {
            projects: vec![ProjectEntry::Detailed(ProjectEntryObject {
                project: "CORDEX-CMIP7".to_string(),
                root: "/data".to_string(),
            })],
            ..Config::default()
        };
        let err = ConfigLoader::resolve_config(config).unwrap_err();
        assert_matches!(err, CatalogError::UnknownProject(_));
    }

    #[test]
    fn scan_target_parse() {
        let target: ScanTarget = "CORDEX-CMIP5 = /aux/cordex-cmip5".parse().unwrap();
        assert_eq!(target.project, "CORDEX-CMIP5");
        assert_eq!(target.root, Utf8PathBuf::from("/aux/cordex-cmip5"));
        assert_eq!(target.to_string(), "CORDEX-CMIP5=/aux/cordex-cmip5");

        let err = "CORDEX-CMIP5".parse::<ScanTarget>().unwrap_err();
        assert_matches!(err, CatalogError::InvalidTarget(_));
        let err = "=/data".parse::<ScanTarget>().unwrap_err();
        assert_matches!(err, CatalogError::InvalidTarget(_));
    }
}
