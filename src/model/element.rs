//! Submodel elements as a closed sum type
//!
//! The `modelType` field selects the variant; anything outside the known set
//! fails deserialization instead of reaching the melter.

use serde::{Deserialize, Serialize};

use super::{
    skip_nulls, DataTypeDefXsd, EmbeddedDataSpecification, Extension, LangString, Qualifier, Reference,
    SpecificAssetId, Timestamps,
};

/// Attributes shared by every submodel element
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementMeta {
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
    pub semantic_id: Option<Reference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supplemental_semantic_ids: Option<Vec<Reference>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qualifiers: Option<Vec<Qualifier>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedded_data_specifications: Option<Vec<EmbeddedDataSpecification>>,
    #[serde(flatten)]
    pub timestamps: Timestamps,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "modelType")]
pub enum SubmodelElement {
    RelationshipElement(RelationshipElement),
    AnnotatedRelationshipElement(AnnotatedRelationshipElement),
    Property(Property),
    MultiLanguageProperty(MultiLanguageProperty),
    Range(Range),
    ReferenceElement(ReferenceElement),
    Blob(Blob),
    File(File),
    Capability(Capability),
    SubmodelElementList(SubmodelElementList),
    SubmodelElementCollection(SubmodelElementCollection),
    Entity(Entity),
    BasicEventElement(BasicEventElement),
    Operation(Operation),
}

/// Every node kind the melter can meet below a submodel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    Relationship,
    AnnotatedRelationship,
    Property,
    MultiLanguageProperty,
    Range,
    ReferenceElement,
    Blob,
    File,
    Capability,
    SubmodelElementList,
    SubmodelElementCollection,
    Entity,
    BasicEventElement,
    Operation,
}

impl ElementKind {
    /// Short storage tag
    pub fn tag(self) -> &'static str {
        match self {
            ElementKind::Relationship => "Rel",
            ElementKind::AnnotatedRelationship => "RelA",
            ElementKind::Property => "Prop",
            ElementKind::MultiLanguageProperty => "MLP",
            ElementKind::Range => "Range",
            ElementKind::Blob => "Blob",
            ElementKind::File => "File",
            ElementKind::ReferenceElement => "Ref",
            ElementKind::Capability => "Cap",
            ElementKind::SubmodelElementList => "SML",
            ElementKind::SubmodelElementCollection => "SMC",
            ElementKind::Entity => "Ent",
            ElementKind::BasicEventElement => "Evt",
            ElementKind::Operation => "Opr",
        }
    }

    /// Kinds whose record becomes the parent of the elements nested in it
    pub fn is_container(self) -> bool {
        matches!(
            self,
            ElementKind::AnnotatedRelationship
                | ElementKind::SubmodelElementList
                | ElementKind::SubmodelElementCollection
                | ElementKind::Entity
                | ElementKind::Operation
        )
    }
}

impl SubmodelElement {
    pub fn kind(&self) -> ElementKind {
        match self {
            SubmodelElement::RelationshipElement(_) => ElementKind::Relationship,
            SubmodelElement::AnnotatedRelationshipElement(_) => ElementKind::AnnotatedRelationship,
            SubmodelElement::Property(_) => ElementKind::Property,
            SubmodelElement::MultiLanguageProperty(_) => ElementKind::MultiLanguageProperty,
            SubmodelElement::Range(_) => ElementKind::Range,
            SubmodelElement::ReferenceElement(_) => ElementKind::ReferenceElement,
            SubmodelElement::Blob(_) => ElementKind::Blob,
            SubmodelElement::File(_) => ElementKind::File,
            SubmodelElement::Capability(_) => ElementKind::Capability,
            SubmodelElement::SubmodelElementList(_) => ElementKind::SubmodelElementList,
            SubmodelElement::SubmodelElementCollection(_) => ElementKind::SubmodelElementCollection,
            SubmodelElement::Entity(_) => ElementKind::Entity,
            SubmodelElement::BasicEventElement(_) => ElementKind::BasicEventElement,
            SubmodelElement::Operation(_) => ElementKind::Operation,
        }
    }

    pub fn meta(&self) -> &ElementMeta {
        match self {
            SubmodelElement::RelationshipElement(e) => &e.meta,
            SubmodelElement::AnnotatedRelationshipElement(e) => &e.meta,
            SubmodelElement::Property(e) => &e.meta,
            SubmodelElement::MultiLanguageProperty(e) => &e.meta,
            SubmodelElement::Range(e) => &e.meta,
            SubmodelElement::ReferenceElement(e) => &e.meta,
            SubmodelElement::Blob(e) => &e.meta,
            SubmodelElement::File(e) => &e.meta,
            SubmodelElement::Capability(e) => &e.meta,
            SubmodelElement::SubmodelElementList(e) => &e.meta,
            SubmodelElement::SubmodelElementCollection(e) => &e.meta,
            SubmodelElement::Entity(e) => &e.meta,
            SubmodelElement::BasicEventElement(e) => &e.meta,
            SubmodelElement::Operation(e) => &e.meta,
        }
    }

    /// Directly nested elements in document order.
    ///
    /// Operations are not covered: their variables are visited group by group.
    pub fn children(&self) -> &[SubmodelElement] {
        let children = match self {
            SubmodelElement::AnnotatedRelationshipElement(e) => e.annotations.as_deref(),
            SubmodelElement::SubmodelElementList(e) => e.value.as_deref(),
            SubmodelElement::SubmodelElementCollection(e) => e.value.as_deref(),
            SubmodelElement::Entity(e) => e.statements.as_deref(),
            _ => None,
        };
        children.unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipElement {
    #[serde(flatten)]
    pub meta: ElementMeta,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first: Option<Reference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub second: Option<Reference>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotatedRelationshipElement {
    #[serde(flatten)]
    pub meta: ElementMeta,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first: Option<Reference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub second: Option<Reference>,
    #[serde(default, deserialize_with = "skip_nulls", skip_serializing_if = "Option::is_none")]
    pub annotations: Option<Vec<SubmodelElement>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Property {
    #[serde(flatten)]
    pub meta: ElementMeta,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_type: Option<DataTypeDefXsd>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_id: Option<Reference>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultiLanguageProperty {
    #[serde(flatten)]
    pub meta: ElementMeta,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Vec<LangString>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_id: Option<Reference>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Range {
    #[serde(flatten)]
    pub meta: ElementMeta,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_type: Option<DataTypeDefXsd>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceElement {
    #[serde(flatten)]
    pub meta: ElementMeta,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Reference>,
}

/// Blob content stays in its base64 text form
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Blob {
    #[serde(flatten)]
    pub meta: ElementMeta,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct File {
    #[serde(flatten)]
    pub meta: ElementMeta,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Capability {
    #[serde(flatten)]
    pub meta: ElementMeta,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmodelElementList {
    #[serde(flatten)]
    pub meta: ElementMeta,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_relevant: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semantic_id_list_element: Option<Reference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_value_list_element: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_type_list_element: Option<DataTypeDefXsd>,
    #[serde(default, deserialize_with = "skip_nulls", skip_serializing_if = "Option::is_none")]
    pub value: Option<Vec<SubmodelElement>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmodelElementCollection {
    #[serde(flatten)]
    pub meta: ElementMeta,
    #[serde(default, deserialize_with = "skip_nulls", skip_serializing_if = "Option::is_none")]
    pub value: Option<Vec<SubmodelElement>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntityType {
    CoManagedEntity,
    SelfManagedEntity,
}

impl EntityType {
    pub fn name(self) -> &'static str {
        match self {
            EntityType::CoManagedEntity => "CoManagedEntity",
            EntityType::SelfManagedEntity => "SelfManagedEntity",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    #[serde(flatten)]
    pub meta: ElementMeta,
    #[serde(default, deserialize_with = "skip_nulls", skip_serializing_if = "Option::is_none")]
    pub statements: Option<Vec<SubmodelElement>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<EntityType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global_asset_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specific_asset_ids: Option<Vec<SpecificAssetId>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Input,
    Output,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StateOfEvent {
    On,
    Off,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BasicEventElement {
    #[serde(flatten)]
    pub meta: ElementMeta,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed: Option<Reference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<Direction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<StateOfEvent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_topic: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_broker: Option<Reference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_update: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_interval: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_interval: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    #[serde(flatten)]
    pub meta: ElementMeta,
    #[serde(default, deserialize_with = "skip_nulls", skip_serializing_if = "Option::is_none")]
    pub input_variables: Option<Vec<OperationVariable>>,
    #[serde(default, deserialize_with = "skip_nulls", skip_serializing_if = "Option::is_none")]
    pub output_variables: Option<Vec<OperationVariable>>,
    #[serde(default, deserialize_with = "skip_nulls", skip_serializing_if = "Option::is_none")]
    pub inoutput_variables: Option<Vec<OperationVariable>>,
}

/// Wrapper around the element an operation takes or returns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationVariable {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Box<SubmodelElement>>,
}
