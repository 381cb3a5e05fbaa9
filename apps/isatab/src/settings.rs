//! # Settings
//!
//! Loading of tab options, investigation context and table files from disk.
//!
//! - Tab options come from a TOML file (`--config`, else `isatab.toml` in the
//!   working directory when present, else defaults).
//! - Investigation context is a JSON or TOML registry document, chosen by
//!   file extension.
//! - Every input path is canonicalized and size-checked before it is read.

use isatab_core::{IsaError, Registry, TabOptions, TableKind};
use std::path::{Path, PathBuf};

/// Config file picked up from the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "isatab.toml";

// =============================================================================
// FILE SIZE LIMITS
// =============================================================================

/// Maximum size of a study or assay table (100 MB).
pub const MAX_TABLE_FILE_SIZE: u64 = 100 * 1024 * 1024;

/// Maximum size of a graph JSON document (500 MB).
///
/// Graph documents repeat qualifier names per node, so they outgrow tables.
pub const MAX_GRAPH_FILE_SIZE: u64 = 500 * 1024 * 1024;

/// Maximum size of a canonical graph snapshot (200 MB).
pub const MAX_SNAPSHOT_FILE_SIZE: u64 = 200 * 1024 * 1024;

/// Maximum size of a config or context file (10 MB).
pub const MAX_SETTINGS_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Validate file size before reading.
fn validate_file_size(path: &Path, max_size: u64) -> Result<(), IsaError> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| IsaError::IoError(format!("Cannot read file metadata: {}", e)))?;

    if metadata.len() > max_size {
        return Err(IsaError::IoError(format!(
            "File size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            max_size
        )));
    }
    Ok(())
}

/// Canonicalize an input path and require a regular file.
pub fn validate_file_path(path: &Path) -> Result<PathBuf, IsaError> {
    let canonical = path.canonicalize().map_err(|e| {
        IsaError::IoError(format!("Invalid file path '{}': {}", path.display(), e))
    })?;

    if !canonical.is_file() {
        return Err(IsaError::IoError(format!(
            "Path '{}' is not a regular file",
            path.display()
        )));
    }

    Ok(canonical)
}

/// Canonicalize the parent of an output path.
///
/// The file itself need not exist; its directory must.
pub fn validate_output_path(path: &Path) -> Result<PathBuf, IsaError> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let canonical_parent = parent.canonicalize().map_err(|e| {
        IsaError::IoError(format!(
            "Invalid output directory '{}': {}",
            parent.display(),
            e
        ))
    })?;

    if !canonical_parent.is_dir() {
        return Err(IsaError::IoError(format!(
            "Output directory '{}' is not a valid directory",
            parent.display()
        )));
    }

    let filename = path
        .file_name()
        .ok_or_else(|| IsaError::IoError("Output path has no filename".to_string()))?;

    Ok(canonical_parent.join(filename))
}

/// Read a whole UTF-8 file after path and size validation.
pub fn read_text(path: &Path, max_size: u64) -> Result<String, IsaError> {
    let validated = validate_file_path(path)?;
    validate_file_size(&validated, max_size)?;
    std::fs::read_to_string(&validated)
        .map_err(|e| IsaError::IoError(format!("Read '{}': {}", path.display(), e)))
}

/// Read a whole binary file after path and size validation.
pub fn read_bytes(path: &Path, max_size: u64) -> Result<Vec<u8>, IsaError> {
    let validated = validate_file_path(path)?;
    validate_file_size(&validated, max_size)?;
    std::fs::read(&validated)
        .map_err(|e| IsaError::IoError(format!("Read '{}': {}", path.display(), e)))
}

/// Write a whole file after output-path validation.
pub fn write_file(path: &Path, contents: impl AsRef<[u8]>) -> Result<PathBuf, IsaError> {
    let validated = validate_output_path(path)?;
    std::fs::write(&validated, contents)
        .map_err(|e| IsaError::IoError(format!("Write '{}': {}", path.display(), e)))?;
    Ok(validated)
}

// =============================================================================
// LOADERS
// =============================================================================

/// Load tab options.
///
/// An explicit path must exist. Without one, `isatab.toml` in the working
/// directory is used when present; otherwise defaults apply.
pub fn load_options(explicit: Option<&Path>) -> Result<TabOptions, IsaError> {
    let path = match explicit {
        Some(p) => p.to_path_buf(),
        None => {
            let fallback = PathBuf::from(DEFAULT_CONFIG_FILE);
            if !fallback.is_file() {
                tracing::debug!("no {} found, using default tab options", DEFAULT_CONFIG_FILE);
                return Ok(TabOptions::default());
            }
            fallback
        }
    };

    let text = read_text(&path, MAX_SETTINGS_FILE_SIZE)?;
    let options: TabOptions = toml::from_str(&text).map_err(|e| {
        IsaError::SerializationError(format!("Config '{}': {}", path.display(), e))
    })?;
    tracing::debug!(config = %path.display(), ?options, "tab options loaded");
    Ok(options)
}

/// Load the investigation context: ontology sources, protocols, study
/// factors and study sample names.
///
/// `.toml` files are parsed as TOML, anything else as JSON. No path yields
/// an empty registry; protocols referenced by tables are then synthesized.
pub fn load_context(path: Option<&Path>) -> Result<Registry, IsaError> {
    let Some(path) = path else {
        return Ok(Registry::new());
    };

    let text = read_text(path, MAX_SETTINGS_FILE_SIZE)?;
    let is_toml = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));

    let registry: Registry = if is_toml {
        toml::from_str(&text).map_err(|e| {
            IsaError::SerializationError(format!("Context '{}': {}", path.display(), e))
        })?
    } else {
        serde_json::from_str(&text).map_err(|e| {
            IsaError::SerializationError(format!("Context '{}': {}", path.display(), e))
        })?
    };

    tracing::debug!(
        context = %path.display(),
        protocols = registry.protocols().count(),
        factors = registry.factors().count(),
        sources = registry.sources().count(),
        "investigation context loaded"
    );
    Ok(registry)
}

/// Table kind from an explicit flag, else from the file name.
///
/// ISA-Tab names assay tables `a_*.txt`; everything else is read as a study.
pub fn infer_kind(explicit: Option<TableKind>, path: &Path) -> TableKind {
    explicit.unwrap_or_else(|| {
        let is_assay = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with("a_") || n.starts_with("A_"));
        if is_assay {
            TableKind::Assay
        } else {
            TableKind::Study
        }
    })
}

// =============================================================================
// TESTS
// =============================================================================
