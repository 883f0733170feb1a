//! Parsed AAS environment tree
//!
//! These types mirror the AAS v3 JSON serialization closely enough to be
//! deserialized straight from an environment file. Every attribute the melter
//! reads is optional: the tree only has to be well-formed enough to traverse.
//!
//! The four `timeStamp*` fields are a server-side extension of the format and
//! are carried through untouched.

pub mod element;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::MeltError;

pub use element::{
    AnnotatedRelationshipElement, BasicEventElement, Blob, Capability, Direction, ElementKind,
    ElementMeta, Entity, EntityType, File, MultiLanguageProperty, Operation, OperationVariable,
    Property, Range, ReferenceElement, RelationshipElement, StateOfEvent, SubmodelElement,
    SubmodelElementCollection, SubmodelElementList,
};

/// Root of one loaded document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Environment {
    #[serde(default, deserialize_with = "skip_nulls", skip_serializing_if = "Option::is_none")]
    pub asset_administration_shells: Option<Vec<AssetAdministrationShell>>,
    #[serde(default, deserialize_with = "skip_nulls", skip_serializing_if = "Option::is_none")]
    pub submodels: Option<Vec<Submodel>>,
    #[serde(default, deserialize_with = "skip_nulls", skip_serializing_if = "Option::is_none")]
    pub concept_descriptions: Option<Vec<ConceptDescription>>,
}

impl Environment {
    /// Parse an environment from JSON text.
    ///
    /// An element whose `modelType` is not one of the known kinds is rejected
    /// here, before any record is built.
    pub fn from_json(text: &str) -> Result<Self, MeltError> {
        let env: Option<Environment> = serde_json::from_str(text).map_err(MeltError::Document)?;
        Ok(env.unwrap_or_default())
    }

    /// Parse an environment from an already-decoded JSON value.
    ///
    /// A `null` document is an empty environment.
    pub fn from_value(value: serde_json::Value) -> Result<Self, MeltError> {
        let env: Option<Environment> = serde_json::from_value(value).map_err(MeltError::Document)?;
        Ok(env.unwrap_or_default())
    }
}

/// Deserialize an optional list, dropping `null` entries instead of failing
/// the whole document on them
pub(crate) fn skip_nulls<'de, D, T>(deserializer: D) -> Result<Option<Vec<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    let Some(items) = Option::<Vec<Option<T>>>::deserialize(deserializer)? else {
        return Ok(None);
    };

    let total = items.len();
    let kept: Vec<T> = items.into_iter().flatten().collect();
    if kept.len() < total {
        tracing::debug!(skipped = total - kept.len(), "skipping null list entries");
    }
    Ok(Some(kept))
}

/// The four server-side bookkeeping times shared by every identifiable node
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timestamps {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_stamp_create: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_stamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_stamp_tree: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_stamp_delete: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetAdministrationShell {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Vec<Extension>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_short: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<Vec<LangString>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<Vec<LangString>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub administration: Option<AdministrativeInformation>,
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedded_data_specifications: Option<Vec<EmbeddedDataSpecification>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub derived_from: Option<Reference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_information: Option<AssetInformation>,
    #[serde(default, deserialize_with = "skip_nulls", skip_serializing_if = "Option::is_none")]
    pub submodels: Option<Vec<Reference>>,
    #[serde(flatten)]
    pub timestamps: Timestamps,
}

impl AssetAdministrationShell {
    /// First-key values of every submodel reference this shell lists
    pub fn submodel_keys(&self) -> impl Iterator<Item = &str> {
        self.submodels
            .iter()
            .flatten()
            .filter_map(|reference| reference.first_key_value())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submodel {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Vec<Extension>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_short: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<Vec<LangString>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<Vec<LangString>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub administration: Option<AdministrativeInformation>,
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<ModellingKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semantic_id: Option<Reference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supplemental_semantic_ids: Option<Vec<Reference>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qualifiers: Option<Vec<Qualifier>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedded_data_specifications: Option<Vec<EmbeddedDataSpecification>>,
    #[serde(default, deserialize_with = "skip_nulls", skip_serializing_if = "Option::is_none")]
    pub submodel_elements: Option<Vec<SubmodelElement>>,
    #[serde(flatten)]
    pub timestamps: Timestamps,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConceptDescription {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Vec<Extension>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_short: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<Vec<LangString>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<Vec<LangString>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub administration: Option<AdministrativeInformation>,
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedded_data_specifications: Option<Vec<EmbeddedDataSpecification>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_case_of: Option<Vec<Reference>>,
    #[serde(flatten)]
    pub timestamps: Timestamps,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModellingKind {
    Instance,
    Template,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReferenceTypes {
    ExternalReference,
    ModelReference,
}

/// A reference made of an ordered key chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reference {
    #[serde(rename = "type")]
    pub reference_type: ReferenceTypes,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referred_semantic_id: Option<Box<Reference>>,
    #[serde(default)]
    pub keys: Vec<Key>,
}

impl Reference {
    pub fn first_key_value(&self) -> Option<&str> {
        self.keys
            .first()
            .map(|key| key.value.as_str())
            .filter(|value| !value.is_empty())
    }

    /// The single identifier this reference stands for.
    ///
    /// Only a one-key reference resolves; longer key chains point into a
    /// model rather than at a global identifier.
    pub fn as_identifier(&self) -> Option<&str> {
        match self.keys.as_slice() {
            [key] if !key.value.is_empty() => Some(key.value.as_str()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Key {
    #[serde(rename = "type")]
    pub key_type: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LangString {
    pub language: String,
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdministrativeInformation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedded_data_specifications: Option<Vec<EmbeddedDataSpecification>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creator: Option<Reference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssetKind {
    Type,
    Instance,
    NotApplicable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetInformation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_kind: Option<AssetKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global_asset_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specific_asset_ids: Option<Vec<SpecificAssetId>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_thumbnail: Option<Resource>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpecificAssetId {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semantic_id: Option<Reference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supplemental_semantic_ids: Option<Vec<Reference>>,
    pub name: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_subject_id: Option<Reference>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Extension {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semantic_id: Option<Reference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supplemental_semantic_ids: Option<Vec<Reference>>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_type: Option<DataTypeDefXsd>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refers_to: Option<Vec<Reference>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Qualifier {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semantic_id: Option<Reference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supplemental_semantic_ids: Option<Vec<Reference>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(rename = "type")]
    pub qualifier_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_type: Option<DataTypeDefXsd>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_id: Option<Reference>,
}

/// Data specification content is stored opaquely, so it stays untyped
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbeddedDataSpecification {
    pub data_specification: Reference,
    #[serde(default)]
    pub data_specification_content: serde_json::Value,
}

/// XML Schema value types a scalar element may declare
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataTypeDefXsd {
    #[serde(rename = "xs:anyURI")]
    AnyUri,
    #[serde(rename = "xs:base64Binary")]
    Base64Binary,
    #[serde(rename = "xs:boolean")]
    Boolean,
    #[serde(rename = "xs:byte")]
    Byte,
    #[serde(rename = "xs:date")]
    Date,
    #[serde(rename = "xs:dateTime")]
    DateTime,
    #[serde(rename = "xs:decimal")]
    Decimal,
    #[serde(rename = "xs:double")]
    Double,
    #[serde(rename = "xs:duration")]
    Duration,
    #[serde(rename = "xs:float")]
    Float,
    #[serde(rename = "xs:gDay")]
    GDay,
    #[serde(rename = "xs:gMonth")]
    GMonth,
    #[serde(rename = "xs:gMonthDay")]
    GMonthDay,
    #[serde(rename = "xs:gYear")]
    GYear,
    #[serde(rename = "xs:gYearMonth")]
    GYearMonth,
    #[serde(rename = "xs:hexBinary")]
    HexBinary,
    #[serde(rename = "xs:int")]
    Int,
    #[serde(rename = "xs:integer")]
    Integer,
    #[serde(rename = "xs:long")]
    Long,
    #[serde(rename = "xs:negativeInteger")]
    NegativeInteger,
    #[serde(rename = "xs:nonNegativeInteger")]
    NonNegativeInteger,
    #[serde(rename = "xs:nonPositiveInteger")]
    NonPositiveInteger,
    #[serde(rename = "xs:positiveInteger")]
    PositiveInteger,
    #[serde(rename = "xs:short")]
    Short,
    #[serde(rename = "xs:string")]
    String,
    #[serde(rename = "xs:time")]
    Time,
    #[serde(rename = "xs:unsignedByte")]
    UnsignedByte,
    #[serde(rename = "xs:unsignedInt")]
    UnsignedInt,
    #[serde(rename = "xs:unsignedLong")]
    UnsignedLong,
    #[serde(rename = "xs:unsignedShort")]
    UnsignedShort,
}

impl DataTypeDefXsd {
    /// The lexical name used in documents, e.g. `xs:int`
    pub fn name(self) -> &'static str {
        match self {
            DataTypeDefXsd::AnyUri => "xs:anyURI",
            DataTypeDefXsd::Base64Binary => "xs:base64Binary",
            DataTypeDefXsd::Boolean => "xs:boolean",
            DataTypeDefXsd::Byte => "xs:byte",
            DataTypeDefXsd::Date => "xs:date",
            DataTypeDefXsd::DateTime => "xs:dateTime",
            DataTypeDefXsd::Decimal => "xs:decimal",
            DataTypeDefXsd::Double => "xs:double",
            DataTypeDefXsd::Duration => "xs:duration",
            DataTypeDefXsd::Float => "xs:float",
            DataTypeDefXsd::GDay => "xs:gDay",
            DataTypeDefXsd::GMonth => "xs:gMonth",
            DataTypeDefXsd::GMonthDay => "xs:gMonthDay",
            DataTypeDefXsd::GYear => "xs:gYear",
            DataTypeDefXsd::GYearMonth => "xs:gYearMonth",
            DataTypeDefXsd::HexBinary => "xs:hexBinary",
            DataTypeDefXsd::Int => "xs:int",
            DataTypeDefXsd::Integer => "xs:integer",
            DataTypeDefXsd::Long => "xs:long",
            DataTypeDefXsd::NegativeInteger => "xs:negativeInteger",
            DataTypeDefXsd::NonNegativeInteger => "xs:nonNegativeInteger",
            DataTypeDefXsd::NonPositiveInteger => "xs:nonPositiveInteger",
            DataTypeDefXsd::PositiveInteger => "xs:positiveInteger",
            DataTypeDefXsd::Short => "xs:short",
            DataTypeDefXsd::String => "xs:string",
            DataTypeDefXsd::Time => "xs:time",
            DataTypeDefXsd::UnsignedByte => "xs:unsignedByte",
            DataTypeDefXsd::UnsignedInt => "xs:unsignedInt",
            DataTypeDefXsd::UnsignedLong => "xs:unsignedLong",
            DataTypeDefXsd::UnsignedShort => "xs:unsignedShort",
        }
    }
}
