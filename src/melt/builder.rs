//! Mapping from document nodes to records
//!
//! List-valued attributes are stored as compact JSON text; object-valued
//! element attributes become `ReferenceValue` records holding the JSON value
//! itself. Scalars go through the coercion engine.

use serde::Serialize;

use crate::error::{MeltError, Result};
use crate::melt::coerce::{coerce, reconcile_range, Coerced, ScalarValue};
use crate::melt::types::{
    Administration, ConceptDescriptionRecord, Descriptive, DoubleValue, ElementRecord,
    IntegerValue, MeltConfig, Record, RecordId, RecordTimes, ReferenceValue, Semantics,
    ShellRecord, StringValue, SubmodelRecord, ValueFamily,
};
use crate::model::{
    AdministrativeInformation, AssetAdministrationShell, ConceptDescription, DataTypeDefXsd,
    ElementMeta, Extension, LangString, Qualifier, Reference, Submodel, SubmodelElement,
};

/// Builds records for individual nodes; owns no traversal state
pub struct RecordBuilder<'a> {
    config: &'a MeltConfig,
}

/// An element record together with the value records it owns
#[derive(Debug)]
pub struct BuiltElement {
    pub record: ElementRecord,
    pub values: Vec<Record>,
}

impl<'a> RecordBuilder<'a> {
    pub fn new(config: &'a MeltConfig) -> Self {
        RecordBuilder { config }
    }

    /// Encode a list attribute as JSON text
    fn encode_list<T: Serialize>(
        &self,
        attribute: &'static str,
        list: Option<&[T]>,
    ) -> Result<Option<String>> {
        match list {
            None => Ok(None),
            Some([]) if self.config.skip_empty_lists => Ok(None),
            Some(items) => serde_json::to_string(items)
                .map(Some)
                .map_err(|source| MeltError::Serialize { attribute, source }),
        }
    }

    fn encode<T: Serialize>(&self, attribute: &'static str, value: Option<&T>) -> Result<Option<String>> {
        value
            .map(|v| {
                serde_json::to_string(v).map_err(|source| MeltError::Serialize { attribute, source })
            })
            .transpose()
    }

    fn descriptive(
        &self,
        id_short: Option<&String>,
        category: Option<&String>,
        display_name: Option<&Vec<LangString>>,
        description: Option<&Vec<LangString>>,
        extensions: Option<&Vec<Extension>>,
    ) -> Result<Descriptive> {
        Ok(Descriptive {
            id_short: id_short.cloned(),
            category: category.cloned(),
            display_name: self.encode_list("displayName", display_name.map(Vec::as_slice))?,
            description: self.encode_list("description", description.map(Vec::as_slice))?,
            extensions: self.encode_list("extensions", extensions.map(Vec::as_slice))?,
        })
    }

    fn administration(&self, admin: Option<&AdministrativeInformation>) -> Result<Administration> {
        let Some(admin) = admin else {
            return Ok(Administration::default());
        };
        Ok(Administration {
            version: admin.version.clone(),
            revision: admin.revision.clone(),
            creator: self.encode("creator", admin.creator.as_ref())?,
            template_id: admin.template_id.clone(),
            a_embedded_data_specifications: self.encode_list(
                "administration.embeddedDataSpecifications",
                admin.embedded_data_specifications.as_deref(),
            )?,
        })
    }

    fn semantics(
        &self,
        semantic_id: Option<&Reference>,
        supplemental: Option<&Vec<Reference>>,
        qualifiers: Option<&Vec<Qualifier>>,
    ) -> Result<Semantics> {
        Ok(Semantics {
            semantic_id: semantic_id
                .and_then(Reference::as_identifier)
                .map(str::to_string),
            supplemental_semantic_ids: self
                .encode_list("supplementalSemanticIds", supplemental.map(Vec::as_slice))?,
            qualifiers: self.encode_list("qualifiers", qualifiers.map(Vec::as_slice))?,
        })
    }

    pub fn concept_description(
        &self,
        id: RecordId,
        cd: &ConceptDescription,
    ) -> Result<ConceptDescriptionRecord> {
        Ok(ConceptDescriptionRecord {
            id,
            identifier: cd.id.clone(),
            descriptive: self.descriptive(
                cd.id_short.as_ref(),
                cd.category.as_ref(),
                cd.display_name.as_ref(),
                cd.description.as_ref(),
                cd.extensions.as_ref(),
            )?,
            is_case_of: self.encode_list("isCaseOf", cd.is_case_of.as_deref())?,
            embedded_data_specifications: self.encode_list(
                "embeddedDataSpecifications",
                cd.embedded_data_specifications.as_deref(),
            )?,
            administration: self.administration(cd.administration.as_ref())?,
            times: RecordTimes::from(&cd.timestamps),
        })
    }

    pub fn shell(
        &self,
        id: RecordId,
        environment: RecordId,
        shell: &AssetAdministrationShell,
    ) -> Result<ShellRecord> {
        let asset = shell.asset_information.as_ref();
        let thumbnail = asset.and_then(|a| a.default_thumbnail.as_ref());

        Ok(ShellRecord {
            id,
            environment,
            identifier: shell.id.clone(),
            descriptive: self.descriptive(
                shell.id_short.as_ref(),
                shell.category.as_ref(),
                shell.display_name.as_ref(),
                shell.description.as_ref(),
                shell.extensions.as_ref(),
            )?,
            embedded_data_specifications: self.encode_list(
                "embeddedDataSpecifications",
                shell.embedded_data_specifications.as_deref(),
            )?,
            derived_from: self.encode("derivedFrom", shell.derived_from.as_ref())?,
            administration: self.administration(shell.administration.as_ref())?,
            asset_kind: asset.and_then(|a| a.asset_kind).map(|kind| format!("{:?}", kind)),
            specific_asset_ids: self.encode_list(
                "specificAssetIds",
                asset.and_then(|a| a.specific_asset_ids.as_deref()),
            )?,
            global_asset_id: asset.and_then(|a| a.global_asset_id.clone()),
            asset_type: asset.and_then(|a| a.asset_type.clone()),
            default_thumbnail_path: thumbnail.map(|t| t.path.clone()),
            default_thumbnail_content_type: thumbnail.and_then(|t| t.content_type.clone()),
            times: RecordTimes::from(&shell.timestamps),
        })
    }

    pub fn submodel(
        &self,
        id: RecordId,
        environment: RecordId,
        shell: Option<RecordId>,
        sm: &Submodel,
    ) -> Result<SubmodelRecord> {
        Ok(SubmodelRecord {
            id,
            environment,
            shell,
            identifier: sm.id.clone(),
            descriptive: self.descriptive(
                sm.id_short.as_ref(),
                sm.category.as_ref(),
                sm.display_name.as_ref(),
                sm.description.as_ref(),
                sm.extensions.as_ref(),
            )?,
            kind: sm.kind.map(|kind| format!("{:?}", kind)),
            semantics: self.semantics(
                sm.semantic_id.as_ref(),
                sm.supplemental_semantic_ids.as_ref(),
                sm.qualifiers.as_ref(),
            )?,
            embedded_data_specifications: self.encode_list(
                "embeddedDataSpecifications",
                sm.embedded_data_specifications.as_deref(),
            )?,
            administration: self.administration(sm.administration.as_ref())?,
            times: RecordTimes::from(&sm.timestamps),
        })
    }

    /// Build the record for one element plus its value records.
    ///
    /// `sme_type` is the already-prefixed kind tag.
    pub fn element(
        &self,
        id: RecordId,
        submodel: RecordId,
        parent: Option<RecordId>,
        sme_type: String,
        element: &SubmodelElement,
    ) -> Result<BuiltElement> {
        let meta: &ElementMeta = element.meta();
        let mut values = ValueSink::new(id, meta.id_short.as_deref(), self.config.warn_on_fallback);
        self.element_values(element, &mut values)?;

        let record = ElementRecord {
            id,
            submodel,
            parent,
            sme_type,
            t_value: values.family,
            descriptive: self.descriptive(
                meta.id_short.as_ref(),
                meta.category.as_ref(),
                meta.display_name.as_ref(),
                meta.description.as_ref(),
                meta.extensions.as_ref(),
            )?,
            semantics: self.semantics(
                meta.semantic_id.as_ref(),
                meta.supplemental_semantic_ids.as_ref(),
                meta.qualifiers.as_ref(),
            )?,
            embedded_data_specifications: self.encode_list(
                "embeddedDataSpecifications",
                meta.embedded_data_specifications.as_deref(),
            )?,
            times: RecordTimes::from(&meta.timestamps),
        };

        Ok(BuiltElement {
            record,
            values: values.records,
        })
    }

    fn element_values(&self, element: &SubmodelElement, out: &mut ValueSink<'_>) -> Result<()> {
        match element {
            SubmodelElement::RelationshipElement(rel) => {
                out.reference("First", rel.first.as_ref())?;
                out.reference("Second", rel.second.as_ref())?;
            }
            SubmodelElement::AnnotatedRelationshipElement(rel) => {
                out.reference("First", rel.first.as_ref())?;
                out.reference("Second", rel.second.as_ref())?;
            }
            SubmodelElement::Property(prop) => {
                out.reference("ValueId", prop.value_id.as_ref())?;
                if let Some(coerced) = coerce(prop.value.as_deref(), prop.value_type) {
                    out.warn_if_fell_back(&coerced, prop.value_type);
                    let annotation = prop.value_type.map(|t| t.name().to_string());
                    out.scalar(coerced.value, annotation);
                }
            }
            SubmodelElement::MultiLanguageProperty(mlp) => {
                out.reference("ValueId", mlp.value_id.as_ref())?;
                for text in mlp.value.iter().flatten() {
                    if let Some(coerced) = coerce(Some(text.text.as_str()), Some(DataTypeDefXsd::String)) {
                        out.scalar(coerced.value, Some(text.language.clone()));
                    }
                }
            }
            SubmodelElement::Range(range) => {
                out.reference("ValueType", range.value_type.as_ref())?;
                let min = coerce(range.min.as_deref(), range.value_type);
                let max = coerce(range.max.as_deref(), range.value_type);
                for bound in min.iter().chain(max.iter()) {
                    out.warn_if_fell_back(bound, range.value_type);
                }
                if let Some(reconciled) = reconcile_range(min, max) {
                    if let Some(value) = reconciled.min {
                        out.scalar(value, Some("Min".to_string()));
                    }
                    if let Some(value) = reconciled.max {
                        out.scalar(value, Some("Max".to_string()));
                    }
                }
            }
            SubmodelElement::ReferenceElement(reference) => {
                out.reference("Value", reference.value.as_ref())?;
            }
            SubmodelElement::Blob(blob) => {
                out.content(blob.value.as_deref(), blob.content_type.as_deref());
            }
            SubmodelElement::File(file) => {
                out.content(file.value.as_deref(), file.content_type.as_deref());
            }
            SubmodelElement::Capability(_) => {}
            SubmodelElement::SubmodelElementList(list) => {
                out.reference("OrderRelevant", list.order_relevant.as_ref())?;
                out.reference("SemanticIdListElement", list.semantic_id_list_element.as_ref())?;
                out.reference("TypeValueListElement", list.type_value_list_element.as_ref())?;
                out.reference("ValueTypeListElement", list.value_type_list_element.as_ref())?;
            }
            SubmodelElement::SubmodelElementCollection(_) => {}
            SubmodelElement::Entity(entity) => {
                if let Some(coerced) = coerce(entity.global_asset_id.as_deref(), Some(DataTypeDefXsd::String)) {
                    let annotation = entity.entity_type.map(|t| t.name().to_string());
                    out.scalar(coerced.value, annotation);
                }
                out.reference("SpecificAssetIds", entity.specific_asset_ids.as_ref())?;
            }
            SubmodelElement::BasicEventElement(evt) => {
                out.reference("Observed", evt.observed.as_ref())?;
                out.reference("Direction", evt.direction.as_ref())?;
                out.reference("State", evt.state.as_ref())?;
                out.reference("MessageTopic", evt.message_topic.as_ref())?;
                out.reference("MessageBroker", evt.message_broker.as_ref())?;
                out.reference("LastUpdate", evt.last_update.as_ref())?;
                out.reference("MinInterval", evt.min_interval.as_ref())?;
                out.reference("MaxInterval", evt.max_interval.as_ref())?;
            }
            SubmodelElement::Operation(_) => {}
        }
        Ok(())
    }
}

/// Collects the value records of one element and tracks its family
struct ValueSink<'e> {
    element: RecordId,
    id_short: Option<&'e str>,
    warn_on_fallback: bool,
    family: Option<ValueFamily>,
    records: Vec<Record>,
}

impl<'e> ValueSink<'e> {
    fn new(element: RecordId, id_short: Option<&'e str>, warn_on_fallback: bool) -> Self {
        ValueSink {
            element,
            id_short,
            warn_on_fallback,
            family: None,
            records: Vec::new(),
        }
    }

    fn reference<T: Serialize>(&mut self, attribute: &'static str, value: Option<&T>) -> Result<()> {
        let Some(value) = value else {
            return Ok(());
        };
        let value = serde_json::to_value(value)
            .map_err(|source| MeltError::Serialize { attribute, source })?;
        self.records.push(Record::ReferenceValue(ReferenceValue {
            element: self.element,
            attribute: attribute.to_string(),
            value,
        }));
        Ok(())
    }

    fn scalar(&mut self, value: ScalarValue, annotation: Option<String>) {
        self.family = Some(value.family());
        let element = self.element;
        let record = match value {
            ScalarValue::String(value) => Record::StringValue(StringValue {
                element,
                value,
                annotation,
            }),
            ScalarValue::Integer(value) => Record::IntegerValue(IntegerValue {
                element,
                value,
                annotation,
            }),
            ScalarValue::Double(value) => Record::DoubleValue(DoubleValue {
                element,
                value,
                annotation,
            }),
        };
        self.records.push(record);
    }

    /// Blob and File content: stored unless both value and content type are absent
    fn content(&mut self, value: Option<&str>, content_type: Option<&str>) {
        let value = value.unwrap_or_default();
        let content_type = content_type.filter(|c| !c.is_empty());
        if value.is_empty() && content_type.is_none() {
            return;
        }
        self.scalar(
            ScalarValue::String(value.to_string()),
            content_type.map(str::to_string),
        );
    }

    fn warn_if_fell_back(&self, coerced: &Coerced, declared: Option<DataTypeDefXsd>) {
        if self.warn_on_fallback && coerced.fell_back() {
            tracing::warn!(
                element = self.id_short.unwrap_or("<unnamed>"),
                declared = declared.map(DataTypeDefXsd::name).unwrap_or("xs:string"),
                stored_as = coerced.family().tag(),
                "value does not fit its declared type"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn build(element: serde_json::Value) -> BuiltElement {
        let element: SubmodelElement = serde_json::from_value(element).unwrap();
        let config = MeltConfig::default();
        RecordBuilder::new(&config)
            .element(RecordId(1), RecordId(0), None, element.kind().tag().to_string(), &element)
            .unwrap()
    }

    #[test]
    fn test_property_integer_value() {
        let built = build(json!({
            "modelType": "Property",
            "idShort": "Count",
            "valueType": "xs:int",
            "value": "42"
        }));

        assert_eq!(built.record.t_value, Some(ValueFamily::Integer));
        assert_eq!(
            built.values,
            vec![Record::IntegerValue(IntegerValue {
                element: RecordId(1),
                value: 42,
                annotation: Some("xs:int".to_string()),
            })]
        );
    }

    #[test]
    fn test_property_without_value_has_no_family() {
        let built = build(json!({"modelType": "Property", "valueType": "xs:double"}));
        assert_eq!(built.record.t_value, None);
        assert!(built.values.is_empty());
    }

    #[test]
    fn test_range_promotes_to_double_with_bound_annotations() {
        let built = build(json!({
            "modelType": "Range",
            "valueType": "xs:int",
            "min": "1",
            "max": "2.5"
        }));

        assert_eq!(built.record.t_value, Some(ValueFamily::Double));
        let doubles: Vec<_> = built
            .values
            .iter()
            .filter_map(|r| match r {
                Record::DoubleValue(d) => Some((d.value, d.annotation.clone().unwrap())),
                _ => None,
            })
            .collect();
        assert_eq!(doubles, vec![(1.0, "Min".to_string()), (2.5, "Max".to_string())]);

        let value_type = built.values.iter().find_map(|r| match r {
            Record::ReferenceValue(o) if o.attribute == "ValueType" => Some(o.value.clone()),
            _ => None,
        });
        assert_eq!(value_type, Some(json!("xs:int")));
    }

    #[test]
    fn test_range_only_min_text() {
        let built = build(json!({"modelType": "Range", "valueType": "xs:int", "min": "abc"}));

        assert_eq!(built.record.t_value, Some(ValueFamily::String));
        let strings: Vec<_> = built
            .values
            .iter()
            .filter_map(|r| match r {
                Record::StringValue(s) => Some(s),
                _ => None,
            })
            .collect();
        assert_eq!(strings.len(), 1);
        assert_eq!(strings[0].value, "abc");
        assert_eq!(strings[0].annotation.as_deref(), Some("Min"));
    }

    #[test]
    fn test_relationship_endpoints() {
        let built = build(json!({
            "modelType": "RelationshipElement",
            "first": {"type": "ModelReference", "keys": [{"type": "Submodel", "value": "a"}]},
            "second": {"type": "ModelReference", "keys": [{"type": "Submodel", "value": "b"}]}
        }));

        let attributes: Vec<_> = built
            .values
            .iter()
            .filter_map(|r| match r {
                Record::ReferenceValue(o) => Some(o.attribute.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(attributes, vec!["First", "Second"]);
        assert_eq!(built.record.t_value, None);
    }

    #[test]
    fn test_multi_language_property_skips_empty_texts() {
        let built = build(json!({
            "modelType": "MultiLanguageProperty",
            "value": [
                {"language": "en", "text": "Pump"},
                {"language": "de", "text": ""},
                {"language": "fr", "text": "Pompe"}
            ]
        }));

        let texts: Vec<_> = built
            .values
            .iter()
            .filter_map(|r| match r {
                Record::StringValue(s) => Some((s.annotation.clone().unwrap(), s.value.clone())),
                _ => None,
            })
            .collect();
        assert_eq!(
            texts,
            vec![("en".to_string(), "Pump".to_string()), ("fr".to_string(), "Pompe".to_string())]
        );
        assert_eq!(built.record.t_value, Some(ValueFamily::String));
    }

    #[test]
    fn test_file_with_content_type_only() {
        let built = build(json!({"modelType": "File", "contentType": "application/pdf"}));
        assert_eq!(
            built.values,
            vec![Record::StringValue(StringValue {
                element: RecordId(1),
                value: String::new(),
                annotation: Some("application/pdf".to_string()),
            })]
        );

        let empty = build(json!({"modelType": "Blob"}));
        assert!(empty.values.is_empty());
    }

    #[test]
    fn test_entity_asset_and_specific_ids() {
        let built = build(json!({
            "modelType": "Entity",
            "entityType": "SelfManagedEntity",
            "globalAssetId": "urn:asset:7",
            "specificAssetIds": [{"name": "serial", "value": "X1"}]
        }));

        assert!(built.values.contains(&Record::StringValue(StringValue {
            element: RecordId(1),
            value: "urn:asset:7".to_string(),
            annotation: Some("SelfManagedEntity".to_string()),
        })));
        assert!(built.values.iter().any(|r| matches!(
            r,
            Record::ReferenceValue(o) if o.attribute == "SpecificAssetIds"
        )));
    }

    #[test]
    fn test_event_element_attributes() {
        let built = build(json!({
            "modelType": "BasicEventElement",
            "direction": "output",
            "state": "on",
            "messageTopic": "pump/status",
            "minInterval": "PT1S"
        }));

        let attributes: Vec<_> = built
            .values
            .iter()
            .filter_map(|r| match r {
                Record::ReferenceValue(o) => Some((o.attribute.as_str(), o.value.clone())),
                _ => None,
            })
            .collect();
        assert_eq!(
            attributes,
            vec![
                ("Direction", json!("output")),
                ("State", json!("on")),
                ("MessageTopic", json!("pump/status")),
                ("MinInterval", json!("PT1S")),
            ]
        );
    }

    #[test]
    fn test_common_fields_and_semantic_id() {
        let built = build(json!({
            "modelType": "Capability",
            "idShort": "Weld",
            "category": "PARAMETER",
            "displayName": [{"language": "en", "text": "Welding"}],
            "semanticId": {"type": "ExternalReference", "keys": [{"type": "GlobalReference", "value": "urn:cap:weld"}]},
            "qualifiers": []
        }));

        let record = built.record;
        assert_eq!(record.sme_type, "Cap");
        assert_eq!(record.descriptive.id_short.as_deref(), Some("Weld"));
        assert_eq!(record.descriptive.category.as_deref(), Some("PARAMETER"));
        assert_eq!(
            record.descriptive.display_name.as_deref(),
            Some(r#"[{"language":"en","text":"Welding"}]"#)
        );
        assert_eq!(record.semantics.semantic_id.as_deref(), Some("urn:cap:weld"));
        assert_eq!(record.semantics.qualifiers, None);
        assert_eq!(record.times, RecordTimes::default());
    }
}
