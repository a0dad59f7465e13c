//! Catalog validation.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use grove_core::catalog::Catalog;
use serde::Serialize;

use crate::error::{read_file, Result, ToolError};

/// Counts from a catalog that passed validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogSummary {
    /// File the catalog was read from.
    pub path: PathBuf,
    /// Catalog name.
    pub name: String,
    /// Producer tiers.
    pub producers: usize,
    /// Automation units.
    pub automation_units: usize,
    /// Upgrades of every owner.
    pub upgrades: usize,
}

impl CatalogSummary {
    fn new(path: &Path, catalog: &Catalog) -> Self {
        Self {
            path: path.to_path_buf(),
            name: catalog.name().to_string(),
            producers: catalog.producers().len(),
            automation_units: catalog.automation_units().len(),
            upgrades: catalog.upgrades().len(),
        }
    }
}

/// Load and validate one catalog file.
///
/// # Errors
///
/// Returns an error if the file cannot be read, parsed or validated.
pub fn load_catalog(path: &Path) -> Result<Arc<Catalog>> {
    let text = read_file(path)?;
    let catalog = Catalog::from_ron(&text, &path.display().to_string())?;
    Ok(Arc::new(catalog))
}

/// Validate a catalog file, or every `.ron` file in a directory.
///
/// # Errors
///
/// Returns the first failure, or [`ToolError::NoCatalogs`] for a directory
/// without catalog files.
pub fn validate_path(path: &Path) -> Result<Vec<CatalogSummary>> {
    if !path.is_dir() {
        let catalog = load_catalog(path)?;
        return Ok(vec![CatalogSummary::new(path, &catalog)]);
    }

    let entries = std::fs::read_dir(path).map_err(|source| ToolError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|ext| ext == "ron"))
        .collect();
    files.sort();
    if files.is_empty() {
        return Err(ToolError::NoCatalogs(path.to_path_buf()));
    }

    files
        .iter()
        .map(|file| {
            tracing::debug!(path = %file.display(), "Validating catalog");
            load_catalog(file).map(|catalog| CatalogSummary::new(file, &catalog))
        })
        .collect()
}
