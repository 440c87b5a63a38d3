use std::fs;
use std::io::BufWriter;

use camino::Utf8Path;
use tempfile::Builder;

use crate::catalog::Catalog;
use crate::error::CatalogError;

/// Writes the catalog next to `path` and renames it into place, so readers
/// never see a half-written table.
pub fn write_catalog(path: &Utf8Path, catalog: &Catalog) -> Result<(), CatalogError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent,
        _ => Utf8Path::new("."),
    };
    fs::create_dir_all(parent.as_std_path())
        .map_err(|err| CatalogError::Filesystem(err.to_string()))?;
    let temp = Builder::new()
        .prefix("cordex-catalog")
        .suffix(".csv.tmp")
        .tempfile_in(parent.as_std_path())
        .map_err(|err| CatalogError::Filesystem(err.to_string()))?;
    catalog
        .write_csv(BufWriter::new(temp.as_file()))
        .map_err(|err| CatalogError::Filesystem(format!("write {path}: {err}")))?;
    temp.persist(path.as_std_path())
        .map_err(|err| CatalogError::Filesystem(err.to_string()))?;
    Ok(())
}

pub fn read_catalog(path: &Utf8Path) -> Result<Catalog, CatalogError> {
    let file = fs::File::open(path.as_std_path())
        .map_err(|err| CatalogError::Filesystem(format!("open {path}: {err}")))?;
    Catalog::read_csv(file)
}

#[cfg(test)]
mod tests {
    use camino::Utf8PathBuf;

    use super::*;
    use crate::domain::{DrsRecord, MipEra};

    #[test]
    fn write_then_read_catalog_file() {
        let temp = tempfile::tempdir().unwrap();
        let dir = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        let path = dir.join("out/catalog.csv");
        let record = DrsRecord {
            project_id: "CORDEX".to_string(),
            mip_era: MipEra::Cmip5,
            activity_id: "output".to_string(),
            domain_id: "EUR-11".to_string(),
            institution_id: "KNMI".to_string(),
            driving_source_id: "EC-EARTH".to_string(),
            driving_experiment_id: "historical".to_string(),
            driving_variant_label: "r12i1p1".to_string(),
            source_id: "RACMO22E".to_string(),
            version_realization: "v1".to_string(),
            frequency: "mon".to_string(),
            version: "v20160620".to_string(),
            time_range: Some("195001-195012".to_string()),
            variable_id: "pr".to_string(),
            path: Utf8PathBuf::from("/aux/pr.nc"),
        };
        let catalog = Catalog::new(vec![record]);

        write_catalog(&path, &catalog).unwrap();
        write_catalog(&path, &catalog).unwrap();
        assert_eq!(read_catalog(&path).unwrap(), catalog);

        let leftovers = std::fs::read_dir(dir.join("out").as_std_path())
            .unwrap()
            .count();
        assert_eq!(leftovers, 1);
    }
}
