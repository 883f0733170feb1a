use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::Timestamps;

/// Represents a unique identifier for a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub u64);

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Physical storage column family of a scalar value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueFamily {
    #[serde(rename = "S")]
    String,
    #[serde(rename = "I")]
    Integer,
    #[serde(rename = "D")]
    Double,
}

impl ValueFamily {
    pub fn tag(self) -> &'static str {
        match self {
            ValueFamily::String => "S",
            ValueFamily::Integer => "I",
            ValueFamily::Double => "D",
        }
    }
}

/// Bookkeeping times copied from the source node as-is
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordTimes {
    pub time_stamp_create: Option<DateTime<Utc>>,
    pub time_stamp: Option<DateTime<Utc>>,
    pub time_stamp_tree: Option<DateTime<Utc>>,
    pub time_stamp_delete: Option<DateTime<Utc>>,
}

impl From<&Timestamps> for RecordTimes {
    fn from(source: &Timestamps) -> Self {
        RecordTimes {
            time_stamp_create: source.time_stamp_create,
            time_stamp: source.time_stamp,
            time_stamp_tree: source.time_stamp_tree,
            time_stamp_delete: source.time_stamp_delete,
        }
    }
}

/// Naming and documentation columns shared by every record kind.
///
/// List-valued columns hold compact JSON text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Descriptive {
    pub id_short: Option<String>,
    pub category: Option<String>,
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub extensions: Option<String>,
}

/// Administrative block columns
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Administration {
    pub version: Option<String>,
    pub revision: Option<String>,
    pub creator: Option<String>,
    pub template_id: Option<String>,
    pub a_embedded_data_specifications: Option<String>,
}

/// Semantic columns carried by submodels and their elements
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Semantics {
    pub semantic_id: Option<String>,
    pub supplemental_semantic_ids: Option<String>,
    pub qualifiers: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentRecord {
    pub id: RecordId,
    pub path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConceptDescriptionRecord {
    pub id: RecordId,
    pub identifier: String,
    #[serde(flatten)]
    pub descriptive: Descriptive,
    pub is_case_of: Option<String>,
    pub embedded_data_specifications: Option<String>,
    #[serde(flatten)]
    pub administration: Administration,
    #[serde(flatten)]
    pub times: RecordTimes,
}

/// Ties an environment to a concept description, new or previously stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConceptLink {
    pub environment: RecordId,
    pub concept_description: RecordId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShellRecord {
    pub id: RecordId,
    pub environment: RecordId,
    pub identifier: String,
    #[serde(flatten)]
    pub descriptive: Descriptive,
    pub embedded_data_specifications: Option<String>,
    pub derived_from: Option<String>,
    #[serde(flatten)]
    pub administration: Administration,
    pub asset_kind: Option<String>,
    pub specific_asset_ids: Option<String>,
    pub global_asset_id: Option<String>,
    pub asset_type: Option<String>,
    pub default_thumbnail_path: Option<String>,
    pub default_thumbnail_content_type: Option<String>,
    #[serde(flatten)]
    pub times: RecordTimes,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmodelRecord {
    pub id: RecordId,
    pub environment: RecordId,
    /// Owning shell; `None` means the environment owns the submodel directly
    pub shell: Option<RecordId>,
    pub identifier: String,
    #[serde(flatten)]
    pub descriptive: Descriptive,
    pub kind: Option<String>,
    #[serde(flatten)]
    pub semantics: Semantics,
    pub embedded_data_specifications: Option<String>,
    #[serde(flatten)]
    pub administration: Administration,
    #[serde(flatten)]
    pub times: RecordTimes,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementRecord {
    pub id: RecordId,
    pub submodel: RecordId,
    pub parent: Option<RecordId>,
    /// Kind tag, prefixed with the operation variable group when inside one
    pub sme_type: String,
    /// Family holding the authoritative scalar value, if any
    pub t_value: Option<ValueFamily>,
    #[serde(flatten)]
    pub descriptive: Descriptive,
    #[serde(flatten)]
    pub semantics: Semantics,
    pub embedded_data_specifications: Option<String>,
    #[serde(flatten)]
    pub times: RecordTimes,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StringValue {
    pub element: RecordId,
    pub value: String,
    pub annotation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegerValue {
    pub element: RecordId,
    pub value: i64,
    pub annotation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoubleValue {
    pub element: RecordId,
    pub value: f64,
    pub annotation: Option<String>,
}

/// A serialized object-valued attribute such as a relationship endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceValue {
    pub element: RecordId,
    pub attribute: String,
    pub value: serde_json::Value,
}

/// One row destined for the persistence sink
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Record {
    Environment(EnvironmentRecord),
    ConceptDescription(ConceptDescriptionRecord),
    ConceptLink(ConceptLink),
    Shell(ShellRecord),
    Submodel(SubmodelRecord),
    Element(ElementRecord),
    StringValue(StringValue),
    IntegerValue(IntegerValue),
    DoubleValue(DoubleValue),
    ReferenceValue(ReferenceValue),
}

impl Record {
    /// Table name the record is stored under
    pub fn table(&self) -> &'static str {
        match self {
            Record::Environment(_) => "env",
            Record::ConceptDescription(_) => "cd",
            Record::ConceptLink(_) => "env_cd",
            Record::Shell(_) => "aas",
            Record::Submodel(_) => "sm",
            Record::Element(_) => "sme",
            Record::StringValue(_) => "svalue",
            Record::IntegerValue(_) => "ivalue",
            Record::DoubleValue(_) => "dvalue",
            Record::ReferenceValue(_) => "ovalue",
        }
    }

    /// Element a value record belongs to
    pub fn value_owner(&self) -> Option<RecordId> {
        match self {
            Record::StringValue(v) => Some(v.element),
            Record::IntegerValue(v) => Some(v.element),
            Record::DoubleValue(v) => Some(v.element),
            Record::ReferenceValue(v) => Some(v.element),
            _ => None,
        }
    }
}

/// Records produced from one environment, in emission order.
///
/// The batch is owned exclusively by the caller until it is persisted.
#[derive(Debug, Clone)]
pub struct Batch {
    environment: RecordId,
    records: Vec<Record>,
    cached_identifiers: Vec<String>,
}

impl Batch {
    pub(crate) fn new(environment: EnvironmentRecord) -> Self {
        Batch {
            environment: environment.id,
            records: vec![Record::Environment(environment)],
            cached_identifiers: Vec::new(),
        }
    }

    pub(crate) fn append(&mut self, record: Record) {
        self.records.push(record);
    }

    pub(crate) fn note_cached(&mut self, identifier: String) {
        self.cached_identifiers.push(identifier);
    }

    pub fn environment(&self) -> RecordId {
        self.environment
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn into_records(self) -> Vec<Record> {
        self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Concept description identifiers this batch added to the cache
    pub fn cached_identifiers(&self) -> &[String] {
        &self.cached_identifiers
    }

    pub fn concept_descriptions(&self) -> impl Iterator<Item = &ConceptDescriptionRecord> {
        self.records.iter().filter_map(|r| match r {
            Record::ConceptDescription(cd) => Some(cd),
            _ => None,
        })
    }

    pub fn concept_links(&self) -> impl Iterator<Item = &ConceptLink> {
        self.records.iter().filter_map(|r| match r {
            Record::ConceptLink(link) => Some(link),
            _ => None,
        })
    }

    pub fn shells(&self) -> impl Iterator<Item = &ShellRecord> {
        self.records.iter().filter_map(|r| match r {
            Record::Shell(shell) => Some(shell),
            _ => None,
        })
    }

    pub fn submodels(&self) -> impl Iterator<Item = &SubmodelRecord> {
        self.records.iter().filter_map(|r| match r {
            Record::Submodel(sm) => Some(sm),
            _ => None,
        })
    }

    pub fn elements(&self) -> impl Iterator<Item = &ElementRecord> {
        self.records.iter().filter_map(|r| match r {
            Record::Element(sme) => Some(sme),
            _ => None,
        })
    }

    /// All value records attached to one element
    pub fn values_of(&self, element: RecordId) -> impl Iterator<Item = &Record> {
        self.records
            .iter()
            .filter(move |r| r.value_owner() == Some(element))
    }
}

/// Configuration for the melting process
#[derive(Debug, Clone)]
pub struct MeltConfig {
    /// Shells whose short name contains this text (any case) are not stored,
    /// and neither are submodels only they reference
    pub exclusion_marker: String,

    /// Log a warning when a value lands in a different family than declared
    pub warn_on_fallback: bool,

    /// Store empty list attributes as absent instead of `[]`
    pub skip_empty_lists: bool,
}

impl Default for MeltConfig {
    fn default() -> Self {
        MeltConfig {
            exclusion_marker: String::from("globalsecurity"),
            warn_on_fallback: true,
            skip_empty_lists: true,
        }
    }
}

impl MeltConfig {
    pub fn is_excluded_shell(&self, id_short: Option<&str>) -> bool {
        if self.exclusion_marker.is_empty() {
            return false;
        }
        let marker = self.exclusion_marker.to_lowercase();
        id_short
            .map(|name| name.to_lowercase().contains(&marker))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_exclusion_marker_ignores_case() {
        let config = MeltConfig::default();
        assert!(config.is_excluded_shell(Some("GlobalSecurity_Admin")));
        assert!(config.is_excluded_shell(Some("myGLOBALSECURITY")));
        assert!(!config.is_excluded_shell(Some("Pump")));
        assert!(!config.is_excluded_shell(None));
    }

    #[test]
    fn test_empty_marker_excludes_nothing() {
        let config = MeltConfig {
            exclusion_marker: String::new(),
            ..MeltConfig::default()
        };
        assert!(!config.is_excluded_shell(Some("GlobalSecurity")));
    }

    #[test]
    fn test_record_serializes_flat() {
        let record = Record::StringValue(StringValue {
            element: RecordId(7),
            value: "on".to_string(),
            annotation: Some("en".to_string()),
        });

        assert_eq!(record.table(), "svalue");
        assert_eq!(
            serde_json::to_value(&record).unwrap(),
            json!({"element": 7, "value": "on", "annotation": "en"})
        );
    }

    #[test]
    fn test_value_family_tags() {
        assert_eq!(ValueFamily::String.tag(), "S");
        assert_eq!(ValueFamily::Integer.tag(), "I");
        assert_eq!(serde_json::to_value(ValueFamily::Double).unwrap(), json!("D"));
    }
}
