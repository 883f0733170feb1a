//! Auxiliary file copying for environments loaded from disk
//!
//! Thumbnails and files referenced by `File` elements live next to the
//! environment, not inside it. Copying them is best effort: a missing file is
//! skipped, a failed copy is logged, and neither stops the melt.

use anyhow::{Context, Result};
use std::path::{Component, Path, PathBuf};

use crate::model::{Environment, SubmodelElement};

/// Result of copying one auxiliary file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuxOutcome {
    Copied(PathBuf),
    /// Nothing to copy: the source does not exist or is not a local path
    Skipped,
    /// The copy was attempted and failed; the message is already logged
    Failed(String),
}

/// Default thumbnail paths of every shell
pub fn thumbnail_paths(env: &Environment) -> Vec<&str> {
    env.asset_administration_shells
        .iter()
        .flatten()
        .filter_map(|shell| shell.asset_information.as_ref())
        .filter_map(|asset| asset.default_thumbnail.as_ref())
        .map(|thumbnail| thumbnail.path.as_str())
        .filter(|path| !path.is_empty())
        .collect()
}

/// Values of every `File` element, in document order
pub fn supplementary_paths(env: &Environment) -> Vec<&str> {
    let mut paths = Vec::new();
    for sm in env.submodels.iter().flatten() {
        collect_file_values(sm.submodel_elements.as_deref().unwrap_or_default(), &mut paths);
    }
    paths
}

fn collect_file_values<'a>(elements: &'a [SubmodelElement], paths: &mut Vec<&'a str>) {
    for element in elements {
        match element {
            SubmodelElement::File(file) => {
                if let Some(value) = file.value.as_deref().filter(|v| !v.is_empty()) {
                    paths.push(value);
                }
            }
            SubmodelElement::Operation(operation) => {
                let variables = [
                    &operation.input_variables,
                    &operation.output_variables,
                    &operation.inoutput_variables,
                ];
                for variable in variables.into_iter().flatten().flatten() {
                    if let Some(value) = &variable.value {
                        collect_file_values(std::slice::from_ref(value.as_ref()), paths);
                    }
                }
            }
            other => collect_file_values(other.children(), paths),
        }
    }
}

/// Map a document path onto a location below `root`.
///
/// URLs and paths escaping the root resolve to `None`.
fn local_path(root: &Path, document_path: &str) -> Option<PathBuf> {
    if document_path.contains("://") {
        return None;
    }
    let relative = Path::new(document_path.trim_start_matches('/'));
    let escapes = relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if escapes {
        return None;
    }
    Some(root.join(relative))
}

fn copy_file(source: &Path, target: &Path) -> Result<()> {
    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    std::fs::copy(source, target)
        .with_context(|| format!("Failed to copy {} to {}", source.display(), target.display()))?;
    Ok(())
}

/// Copy one document-relative file from `source_root` into `target_root`
pub fn copy_auxiliary(source_root: &Path, document_path: &str, target_root: &Path) -> AuxOutcome {
    let (Some(source), Some(target)) = (
        local_path(source_root, document_path),
        local_path(target_root, document_path),
    ) else {
        return AuxOutcome::Skipped;
    };

    if !source.is_file() {
        tracing::debug!(path = document_path, "auxiliary file not present, skipping");
        return AuxOutcome::Skipped;
    }

    match copy_file(&source, &target) {
        Ok(()) => {
            tracing::debug!(path = document_path, "copied auxiliary file");
            AuxOutcome::Copied(target)
        }
        Err(err) => {
            tracing::warn!(path = document_path, "auxiliary copy failed: {:#}", err);
            AuxOutcome::Failed(format!("{:#}", err))
        }
    }
}

/// Copy every thumbnail and `File` element target of an environment
pub fn copy_environment_files(
    env: &Environment,
    source_root: &Path,
    target_root: &Path,
) -> Vec<(String, AuxOutcome)> {
    thumbnail_paths(env)
        .into_iter()
        .chain(supplementary_paths(env))
        .map(|path| (path.to_string(), copy_auxiliary(source_root, path, target_root)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_collects_nested_file_values() {
        let env = Environment::from_value(json!({
            "assetAdministrationShells": [{
                "id": "urn:aas:1",
                "assetInformation": {"assetKind": "Instance", "defaultThumbnail": {"path": "/thumb.png"}}
            }],
            "submodels": [{
                "id": "S1",
                "submodelElements": [
                    {"modelType": "File", "value": "/aasx/manual.pdf"},
                    {"modelType": "SubmodelElementCollection", "value": [
                        {"modelType": "File", "value": "/aasx/drawing.dxf"}
                    ]},
                    {"modelType": "Operation", "inputVariables": [
                        {"value": {"modelType": "File", "value": "/aasx/input.csv"}}
                    ]},
                    {"modelType": "File"}
                ]
            }]
        }))
        .unwrap();

        assert_eq!(thumbnail_paths(&env), vec!["/thumb.png"]);
        assert_eq!(
            supplementary_paths(&env),
            vec!["/aasx/manual.pdf", "/aasx/drawing.dxf", "/aasx/input.csv"]
        );
    }

    #[test]
    fn test_urls_and_escaping_paths_are_skipped() {
        let root = Path::new("/tmp/source");
        assert!(local_path(root, "https://example.com/a.pdf").is_none());
        assert!(local_path(root, "../../etc/passwd").is_none());
        assert_eq!(local_path(root, "/aasx/a.pdf"), Some(root.join("aasx/a.pdf")));
    }

    #[test]
    fn test_missing_source_is_skipped() {
        let outcome = copy_auxiliary(
            Path::new("/nonexistent-source-root"),
            "/aasx/missing.pdf",
            Path::new("/nonexistent-target-root"),
        );
        assert_eq!(outcome, AuxOutcome::Skipped);
    }
}
