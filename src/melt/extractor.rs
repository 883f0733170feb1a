use std::cell::RefCell;

use indexmap::map::Entry;
use indexmap::IndexMap;

use crate::error::Result;
use crate::melt::builder::RecordBuilder;
use crate::melt::cache::ConceptCache;
use crate::melt::types::{Batch, ConceptLink, EnvironmentRecord, MeltConfig, Record, RecordId};
use crate::model::{Environment, OperationVariable, SubmodelElement};

pub const INPUT_PREFIX: &str = "In-";
pub const OUTPUT_PREFIX: &str = "Out-";
pub const INOUTPUT_PREFIX: &str = "IO-";

/// Where an element sits while it is being melted.
///
/// Each level gets its own copy, so leaving a container restores the
/// previous parent and operation group without any bookkeeping.
#[derive(Debug, Clone, Copy)]
struct ElementContext {
    submodel: RecordId,
    parent: Option<RecordId>,
    prefix: &'static str,
}

impl ElementContext {
    fn root(submodel: RecordId) -> Self {
        ElementContext {
            submodel,
            parent: None,
            prefix: "",
        }
    }

    fn child_of(self, parent: RecordId) -> Self {
        ElementContext {
            parent: Some(parent),
            ..self
        }
    }

    fn in_group(self, prefix: &'static str) -> Self {
        ElementContext { prefix, ..self }
    }
}

/// Owner registered for a submodel identifier; `None` marks an excluded one
type SubmodelOwners = IndexMap<String, Option<RecordId>>;

/// The core melter that flattens an environment tree into records
pub struct AasMelter {
    config: MeltConfig,
    id_counter: RefCell<u64>,
}

impl AasMelter {
    pub fn new(config: MeltConfig) -> Self {
        AasMelter {
            config,
            id_counter: RefCell::new(0),
        }
    }

    pub fn config(&self) -> &MeltConfig {
        &self.config
    }

    /// Record ids keep counting across documents so a shared cache stays valid
    fn next_id(&self) -> RecordId {
        let mut counter = self.id_counter.borrow_mut();
        *counter += 1;
        RecordId(*counter)
    }

    /// Melt an environment into a batch of records
    pub fn melt(&self, env: &Environment, cache: &mut ConceptCache) -> Result<Batch> {
        self.melt_source(None, env, cache)
    }

    /// Melt an environment, remembering where it was loaded from
    pub fn melt_source(
        &self,
        source: Option<&str>,
        env: &Environment,
        cache: &mut ConceptCache,
    ) -> Result<Batch> {
        let builder = RecordBuilder::new(&self.config);
        let mut batch = Batch::new(EnvironmentRecord {
            id: self.next_id(),
            path: source.map(str::to_string),
        });

        let walked = self.melt_nodes(&builder, env, cache, &mut batch);
        release_on_error(walked, cache, &batch)?;

        tracing::debug!(
            source = source.unwrap_or("<memory>"),
            records = batch.len(),
            "melted environment"
        );
        Ok(batch)
    }

    fn melt_nodes(
        &self,
        builder: &RecordBuilder<'_>,
        env: &Environment,
        cache: &mut ConceptCache,
        batch: &mut Batch,
    ) -> Result<()> {
        self.melt_concept_descriptions(builder, env, cache, batch)?;
        let owners = self.melt_shells(builder, env, batch)?;
        self.melt_submodels(builder, env, &owners, batch)
    }

    fn melt_concept_descriptions(
        &self,
        builder: &RecordBuilder<'_>,
        env: &Environment,
        cache: &mut ConceptCache,
        batch: &mut Batch,
    ) -> Result<()> {
        let Some(concept_descriptions) = &env.concept_descriptions else {
            return Ok(());
        };

        for cd in concept_descriptions.iter().filter(|cd| !cd.id.is_empty()) {
            let record_id = match cache.get(&cd.id) {
                Some(existing) => existing,
                None => {
                    let id = self.next_id();
                    let record = builder.concept_description(id, cd)?;
                    batch.append(Record::ConceptDescription(record));
                    cache.insert(cd.id.clone(), id);
                    batch.note_cached(cd.id.clone());
                    id
                }
            };
            batch.append(Record::ConceptLink(ConceptLink {
                environment: batch.environment(),
                concept_description: record_id,
            }));
        }

        Ok(())
    }

    /// Store the shells and register who owns each referenced submodel.
    ///
    /// Excluded shells are not stored; their submodel keys are registered
    /// without an owner unless a stored shell claims them.
    fn melt_shells(
        &self,
        builder: &RecordBuilder<'_>,
        env: &Environment,
        batch: &mut Batch,
    ) -> Result<SubmodelOwners> {
        let mut owners = SubmodelOwners::new();
        let Some(shells) = &env.asset_administration_shells else {
            return Ok(owners);
        };

        for shell in shells {
            let owner = if self.config.is_excluded_shell(shell.id_short.as_deref()) {
                tracing::debug!(shell = %shell.id, "excluding shell and its submodels");
                None
            } else {
                let id = self.next_id();
                batch.append(Record::Shell(builder.shell(id, batch.environment(), shell)?));
                Some(id)
            };

            for key in shell.submodel_keys() {
                match owners.entry(key.to_string()) {
                    Entry::Vacant(entry) => {
                        entry.insert(owner);
                    }
                    Entry::Occupied(mut entry) => {
                        if entry.get().is_none() && owner.is_some() {
                            entry.insert(owner);
                        }
                    }
                }
            }
        }

        Ok(owners)
    }

    fn melt_submodels(
        &self,
        builder: &RecordBuilder<'_>,
        env: &Environment,
        owners: &SubmodelOwners,
        batch: &mut Batch,
    ) -> Result<()> {
        let Some(submodels) = &env.submodels else {
            return Ok(());
        };

        for sm in submodels {
            let shell = match owners.get(&sm.id) {
                Some(None) => {
                    tracing::debug!(submodel = %sm.id, "dropping submodel of excluded shell");
                    continue;
                }
                Some(Some(shell)) => Some(*shell),
                None => None,
            };

            let id = self.next_id();
            batch.append(Record::Submodel(builder.submodel(id, batch.environment(), shell, sm)?));

            if let Some(elements) = &sm.submodel_elements {
                self.melt_elements(builder, elements, ElementContext::root(id), batch)?;
            }
        }

        Ok(())
    }

    fn melt_elements(
        &self,
        builder: &RecordBuilder<'_>,
        elements: &[SubmodelElement],
        ctx: ElementContext,
        batch: &mut Batch,
    ) -> Result<()> {
        for element in elements {
            self.melt_element(builder, element, ctx, batch)?;
        }
        Ok(())
    }

    /// Emit an element, its values, then everything nested in it (pre-order)
    fn melt_element(
        &self,
        builder: &RecordBuilder<'_>,
        element: &SubmodelElement,
        ctx: ElementContext,
        batch: &mut Batch,
    ) -> Result<()> {
        let id = self.next_id();
        let sme_type = format!("{}{}", ctx.prefix, element.kind().tag());
        let built = builder.element(id, ctx.submodel, ctx.parent, sme_type, element)?;

        batch.append(Record::Element(built.record));
        for value in built.values {
            batch.append(value);
        }

        if !element.kind().is_container() {
            return Ok(());
        }

        let inner = ctx.child_of(id);
        match element {
            SubmodelElement::Operation(operation) => {
                let groups = [
                    (INPUT_PREFIX, &operation.input_variables),
                    (OUTPUT_PREFIX, &operation.output_variables),
                    (INOUTPUT_PREFIX, &operation.inoutput_variables),
                ];
                for (prefix, variables) in groups {
                    for variable in variables.iter().flatten() {
                        self.melt_operation_variable(builder, variable, inner.in_group(prefix), batch)?;
                    }
                }
            }
            other => self.melt_elements(builder, other.children(), inner, batch)?,
        }

        Ok(())
    }

    /// Operation variables add no record of their own, only their group prefix
    fn melt_operation_variable(
        &self,
        builder: &RecordBuilder<'_>,
        variable: &OperationVariable,
        ctx: ElementContext,
        batch: &mut Batch,
    ) -> Result<()> {
        match &variable.value {
            Some(value) => self.melt_element(builder, value, ctx, batch),
            None => Ok(()),
        }
    }
}

/// A batch that is never returned must not leave its concept descriptions
/// in the cache
fn release_on_error<T>(result: Result<T>, cache: &mut ConceptCache, batch: &Batch) -> Result<T> {
    if result.is_err() {
        cache.forget(batch);
    }
    result
}
