//! # aas-melt - AAS environment to relational records
//!
//! Flattens Asset Administration Shell environments (shells, submodels,
//! concept descriptions and their nested submodel elements) into ordered
//! batches of relational records, keeping value types through separate
//! string, integer, double and reference tables.
//!
//! ## Modules
//!
//! - **model**: the parsed environment tree
//! - **melt**: walking, record building, value coercion, and sinks
//! - **files**: best-effort copying of thumbnails and supplementary files
//!
//! ## Quick Start
//!
//! ```rust
//! use aas_melt::melt::{AasMelter, ConceptCache, MeltConfig, MemorySink};
//! use aas_melt::model::Environment;
//! use serde_json::json;
//!
//! # fn main() -> anyhow::Result<()> {
//! let env = Environment::from_value(json!({
//!     "submodels": [{
//!         "id": "urn:sm:nameplate",
//!         "submodelElements": [
//!             {"modelType": "Property", "idShort": "Year", "valueType": "xs:int", "value": "2024"}
//!         ]
//!     }]
//! }))?;
//!
//! let melter = AasMelter::new(MeltConfig::default());
//! let mut cache = ConceptCache::new();
//! let batch = melter.melt(&env, &mut cache)?;
//!
//! let mut sink = MemorySink::new();
//! batch.persist(&mut sink)?;
//! // env, sm, sme and ivalue rows
//! assert_eq!(sink.committed().len(), 4);
//! # Ok(())
//! # }
//! ```

use std::io::Read;

pub mod error;
pub mod files;
pub mod melt;
pub mod model;

// Re-export commonly used types for convenience
pub use error::MeltError;
pub use melt::{AasMelter, Batch, ConceptCache, MeltConfig, Record, RecordSink};
pub use model::Environment;

/// Parse one environment from a reader, melt it, and commit it to a sink.
///
/// On a failed commit the concept descriptions this document introduced are
/// removed from the cache again, so later documents do not link to records
/// that were never stored. Returns the number of records committed.
pub fn melt_reader<R: Read, S: RecordSink + ?Sized>(
    reader: R,
    source: Option<&str>,
    melter: &AasMelter,
    cache: &mut ConceptCache,
    sink: &mut S,
) -> Result<usize, MeltError> {
    let env: Option<Environment> = serde_json::from_reader(reader).map_err(MeltError::Document)?;
    let env = env.unwrap_or_default();
    let batch = melter.melt_source(source, &env, cache)?;

    if let Err(err) = batch.persist(sink) {
        cache.forget(&batch);
        return Err(err);
    }

    tracing::info!(
        source = source.unwrap_or("<reader>"),
        records = batch.len(),
        "committed environment"
    );
    Ok(batch.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::melt::MemorySink;

    #[test]
    fn test_basic_melting() {
        let input = r#"{
            "assetAdministrationShells": [{
                "idShort": "Pump",
                "id": "urn:aas:pump",
                "submodels": [{"type": "ModelReference", "keys": [{"type": "Submodel", "value": "urn:sm:1"}]}]
            }],
            "submodels": [{
                "id": "urn:sm:1",
                "submodelElements": [
                    {"modelType": "Property", "idShort": "Speed", "valueType": "xs:double", "value": "1450.5"}
                ]
            }]
        }"#;

        let melter = AasMelter::new(MeltConfig::default());
        let mut cache = ConceptCache::new();
        let mut sink = MemorySink::new();
        let count = melt_reader(input.as_bytes(), Some("pump.json"), &melter, &mut cache, &mut sink).unwrap();

        // env, aas, sm, sme, dvalue
        assert_eq!(count, 5);
        assert_eq!(sink.table("dvalue").count(), 1);
    }

    #[test]
    fn test_malformed_document_is_reported() {
        let melter = AasMelter::new(MeltConfig::default());
        let mut sink = MemorySink::new();
        let result = melt_reader(
            "{not json".as_bytes(),
            None,
            &melter,
            &mut ConceptCache::new(),
            &mut sink,
        );
        assert!(matches!(result, Err(MeltError::Document(_))));
        assert!(sink.committed().is_empty());
    }

    #[test]
    fn test_null_entries_do_not_lose_the_document() {
        let input = r#"{
            "submodels": [null, {
                "id": "S2",
                "submodelElements": [null, {"modelType": "Property", "idShort": "Speed", "value": "fast"}]
            }]
        }"#;

        let melter = AasMelter::new(MeltConfig::default());
        let mut sink = MemorySink::new();
        let count = melt_reader(input.as_bytes(), None, &melter, &mut ConceptCache::new(), &mut sink).unwrap();

        // env, sm, sme, svalue
        assert_eq!(count, 4);
        assert_eq!(sink.table("sm").count(), 1);

        let count = melt_reader("null".as_bytes(), None, &melter, &mut ConceptCache::new(), &mut sink).unwrap();
        assert_eq!(count, 1);
    }
}
