//! # Batch Compiler
//!
//! The front door: a [`CompileInput`] of descriptors goes in, a
//! [`CompileReport`] of generated files and per-descriptor errors comes
//! out. Compilation is partial-failure-tolerant; one bad descriptor
//! never takes the batch down with it.

use crate::assembly::Assembly;
use crate::codegen::{
    selector_order, CollectionGenerator, ContainerGenerator, MutationGenerator, SelectorGenerator,
    TableGenerator,
};
use crate::descriptor::{
    CollectionDescriptor, CrossSourceSelector, LiveQuery, MutationDescriptor,
    StateContainerDescriptor, TableDescriptor,
};
use crate::error::{CompileError, ReferenceKind};
use crate::naming;
use crate::resolve::ResolveContext;
use crate::validate;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Everything one compilation run works on.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompileInput {
    pub tables: Vec<TableDescriptor>,
    pub collections: Vec<CollectionDescriptor>,
    pub mutations: Vec<MutationDescriptor>,
    pub global_queries: Vec<LiveQuery>,
    pub containers: Vec<StateContainerDescriptor>,
    pub selectors: Vec<CrossSourceSelector>,
}

impl CompileInput {
    /// Parse a full input document, tolerating malformed elements: each
    /// bad element becomes a [`CompileError::Malformed`] and the rest of
    /// its section still parses.
    pub fn from_json(json: &str) -> (Self, Vec<CompileError>) {
        let mut errors = Vec::new();
        let value: serde_json::Value = match serde_json::from_str(json) {
            Ok(value) => value,
            Err(err) => {
                errors.push(CompileError::Malformed {
                    path: "$".to_string(),
                    message: err.to_string(),
                });
                return (Self::default(), errors);
            }
        };
        let mut value = match value {
            serde_json::Value::Object(map) => map,
            _ => {
                errors.push(CompileError::Malformed {
                    path: "$".to_string(),
                    message: "input document must be a JSON object".to_string(),
                });
                return (Self::default(), errors);
            }
        };

        let input = Self {
            tables: parse_elements(value.remove("tables"), "tables", &mut errors),
            collections: parse_elements(value.remove("collections"), "collections", &mut errors),
            mutations: parse_elements(value.remove("mutations"), "mutations", &mut errors),
            global_queries: parse_elements(
                value.remove("globalQueries"),
                "globalQueries",
                &mut errors,
            ),
            containers: parse_elements(value.remove("containers"), "containers", &mut errors),
            selectors: parse_elements(value.remove("selectors"), "selectors", &mut errors),
        };
        (input, errors)
    }
}

/// What a compilation run produced: relative path -> file text, plus
/// every error encountered along the way.
#[derive(Debug, Default)]
pub struct CompileReport {
    pub files: BTreeMap<String, String>,
    pub errors: Vec<CompileError>,
}

impl CompileReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Compile a batch of descriptors into TypeScript source files.
pub fn compile(input: &CompileInput) -> CompileReport {
    let mut errors: Vec<CompileError> = Vec::new();
    let mut files: BTreeMap<String, String> = BTreeMap::new();
    let mut assembly = Assembly::new();

    let total = input.tables.len()
        + input.collections.len()
        + input.mutations.len()
        + input.global_queries.len()
        + input.containers.len()
        + input.selectors.len();
    tracing::info!("[DASC] Phase 1: Validating {total} descriptors");

    let tables = validate_batch(
        &input.tables,
        "tables",
        &mut errors,
        |t, path, errs| validate::validate_table(t, path, errs),
        |t| t.name.as_str(),
    );
    let collections = validate_batch(
        &input.collections,
        "collections",
        &mut errors,
        |c, path, errs| validate::validate_collection(c, path, errs),
        |c| c.name.as_str(),
    );
    let mutations = validate_batch(
        &input.mutations,
        "mutations",
        &mut errors,
        |m, path, errs| validate::validate_mutation(m, path, errs),
        |m| m.name.as_str(),
    );
    let global_queries = validate_batch(
        &input.global_queries,
        "globalQueries",
        &mut errors,
        |q, path, errs| validate::validate_live_query(q, path, errs),
        |q| q.name.as_str(),
    );
    let containers = validate_batch(
        &input.containers,
        "containers",
        &mut errors,
        |c, path, errs| validate::validate_container(c, path, errs),
        |c| c.name.as_str(),
    );
    let selectors = validate_batch(
        &input.selectors,
        "selectors",
        &mut errors,
        |s, path, errs| validate::validate_cross_selector(s, path, errs),
        |s| s.name.as_str(),
    );

    // Container selector references resolve across the whole batch; a
    // container with a dangling reference is aborted, not half-emitted.
    let mut ref_errors = Vec::new();
    validate::validate_selector_references(&containers, &mut ref_errors);
    let containers: Vec<&StateContainerDescriptor> = containers
        .into_iter()
        .filter(|container| {
            let prefix = format!("container '{}' ", container.name);
            !ref_errors.iter().any(|err| {
                matches!(err, CompileError::UnresolvedReference { descriptor, .. }
                    if descriptor.starts_with(&prefix))
            })
        })
        .collect();
    errors.extend(ref_errors);

    tracing::info!("[DASC] Phase 2: Resolving cross-descriptor references");
    let global_queries: Vec<&LiveQuery> = global_queries
        .into_iter()
        .filter(|query| {
            let anchor = query.from.primary_collection().unwrap_or_default();
            let known = collections.iter().any(|c| c.name == anchor);
            if !known {
                errors.push(CompileError::unresolved(
                    format!("global query '{}'", query.name),
                    ReferenceKind::Collection,
                    anchor,
                ));
            }
            known
        })
        .collect();
    let mut ctx = ResolveContext::new(&tables, &collections, &containers, &global_queries);

    tracing::info!("[DASC] Phase 3: Compiling {} table schemas", tables.len());
    for table in &tables {
        let generator = TableGenerator::new(table);
        match generator.generate() {
            Ok(source) => {
                files.insert(generator.output_path(), source);
                assembly.schema_stems.push(naming::table_file_stem(&table.name));
            }
            Err(err) => errors.push(err),
        }
    }

    tracing::info!(
        "[DASC] Phase 4: Compiling {} collections and {} mutations",
        collections.len(),
        mutations.len()
    );
    for collection in &collections {
        let descriptor = format!("collection '{}'", collection.name);
        let table = match ctx.table(&collection.schema, &descriptor) {
            Ok(table) => table,
            Err(err) => {
                errors.push(err);
                continue;
            }
        };
        let generator =
            CollectionGenerator::new(collection, table, ctx.global_queries_for(&collection.name));
        match generator.generate() {
            Ok(source) => {
                files.insert(generator.output_path(), source);
                assembly.collection_stems.push(collection.name.clone());
            }
            Err(err) => errors.push(err),
        }
    }
    for mutation in &mutations {
        let descriptor = format!("mutation '{}'", mutation.name);
        let table = ctx
            .collection(&mutation.collection, &descriptor)
            .and_then(|collection| ctx.table(&collection.schema, &descriptor));
        let table = match table {
            Ok(table) => table,
            Err(err) => {
                errors.push(err);
                continue;
            }
        };
        let generator = MutationGenerator::new(mutation, table);
        match generator.generate() {
            Ok(source) => {
                files.insert(generator.output_path(), source);
                assembly.mutation_stems.push(mutation.name.clone());
            }
            Err(err) => errors.push(err),
        }
    }

    tracing::info!(
        "[DASC] Phase 5: Compiling {} state containers",
        containers.len()
    );
    for container in &containers {
        let generator = ContainerGenerator::new(container);
        match generator.generate() {
            Ok(source) => {
                files.insert(generator.output_path(), source);
                assembly.record_container(container);
            }
            Err(err) => errors.push(err),
        }
    }

    tracing::info!(
        "[DASC] Phase 6: Compiling {} cross-source selectors",
        selectors.len()
    );
    let owned_selectors: Vec<CrossSourceSelector> =
        selectors.iter().map(|s| (*s).clone()).collect();
    let (order, cycle_errors) = selector_order(&owned_selectors);
    errors.extend(cycle_errors);
    for index in order {
        let selector = &owned_selectors[index];
        let generator = SelectorGenerator::new(selector, &ctx);
        match generator.generate() {
            Ok((info, source)) => {
                files.insert(generator.output_path(), source);
                assembly.selector_stems.push(info.file_stem.clone());
                ctx.register_selector(selector.name.clone(), info);
            }
            Err(err) => errors.push(err),
        }
    }

    tracing::info!("[DASC] Phase 7: Assembling store, provider, and barrels");
    assembly.emit(&mut files);

    tracing::info!(
        "[DASC] Compilation finished: {} files, {} errors",
        files.len(),
        errors.len()
    );
    CompileReport { files, errors }
}

/// Compile a table batch on its own.
pub fn compile_tables(tables: &[TableDescriptor]) -> CompileReport {
    compile(&CompileInput {
        tables: tables.to_vec(),
        ..CompileInput::default()
    })
}

/// Compile a collection batch against the tables its schemas reference.
pub fn compile_collections(tables: &[TableDescriptor], batch: &CollectionBatch) -> CompileReport {
    compile(&CompileInput {
        tables: tables.to_vec(),
        collections: batch.collections.clone(),
        mutations: batch.mutations.clone(),
        global_queries: batch.global_queries.clone(),
        ..CompileInput::default()
    })
}

/// Compile a state container batch on its own.
pub fn compile_containers(containers: &[StateContainerDescriptor]) -> CompileReport {
    compile(&CompileInput {
        containers: containers.to_vec(),
        ..CompileInput::default()
    })
}

/// Compile cross-source selectors against the descriptors they reference.
/// `context` supplies the tables, collections, and containers the selector
/// inputs resolve through; its own selectors are replaced by `selectors`.
pub fn compile_selectors(
    selectors: &[CrossSourceSelector],
    context: &CompileInput,
) -> CompileReport {
    compile(&CompileInput {
        selectors: selectors.to_vec(),
        ..context.clone()
    })
}

/// Run one validator over a section, dropping descriptors that fail and
/// duplicate names within the section.
fn validate_batch<'a, T>(
    items: &'a [T],
    section: &str,
    errors: &mut Vec<CompileError>,
    validate: impl Fn(&T, &str, &mut Vec<CompileError>),
    name_of: impl Fn(&T) -> &str,
) -> Vec<&'a T> {
    let mut valid = Vec::new();
    let mut seen: BTreeSet<&str> = BTreeSet::new();
    for (i, item) in items.iter().enumerate() {
        let path = format!("{section}[{i}]");
        let mut errs = Vec::new();
        validate(item, &path, &mut errs);
        if !seen.insert(name_of(item)) {
            errs.push(CompileError::validation(
                format!("{path}.name"),
                format!("duplicate name '{}' in {section}", name_of(item)),
            ));
        }
        if errs.is_empty() {
            valid.push(item);
        } else {
            errors.extend(errs);
        }
    }
    valid
}

fn parse_elements<T: DeserializeOwned>(
    value: Option<serde_json::Value>,
    path: &str,
    errors: &mut Vec<CompileError>,
) -> Vec<T> {
    let Some(value) = value else {
        return Vec::new();
    };
    let serde_json::Value::Array(elements) = value else {
        errors.push(CompileError::Malformed {
            path: path.to_string(),
            message: "expected a JSON array".to_string(),
        });
        return Vec::new();
    };
    elements
        .into_iter()
        .enumerate()
        .filter_map(|(i, element)| match serde_json::from_value(element) {
            Ok(parsed) => Some(parsed),
            Err(err) => {
                errors.push(CompileError::Malformed {
                    path: format!("{path}[{i}]"),
                    message: err.to_string(),
                });
                None
            }
        })
        .collect()
}

/// Parse a standalone JSON array of table descriptors.
pub fn parse_table_batch(json: &str) -> (Vec<TableDescriptor>, Vec<CompileError>) {
    parse_array(json, "tables")
}

/// Parse a standalone JSON array of state container descriptors.
pub fn parse_container_batch(json: &str) -> (Vec<StateContainerDescriptor>, Vec<CompileError>) {
    parse_array(json, "containers")
}

/// Parse a standalone JSON array of cross-source selector descriptors.
pub fn parse_selector_batch(json: &str) -> (Vec<CrossSourceSelector>, Vec<CompileError>) {
    parse_array(json, "selectors")
}

/// A collection batch document: collections plus the mutations and
/// global queries that ride along with them.
#[derive(Debug, Default)]
pub struct CollectionBatch {
    pub collections: Vec<CollectionDescriptor>,
    pub mutations: Vec<MutationDescriptor>,
    pub global_queries: Vec<LiveQuery>,
}

/// Parse a collection batch document:
/// `{ "collections": [...], "mutations": [...], "globalQueries": [...] }`.
pub fn parse_collection_batch(json: &str) -> (CollectionBatch, Vec<CompileError>) {
    let mut errors = Vec::new();
    let value: serde_json::Value = match serde_json::from_str(json) {
        Ok(value) => value,
        Err(err) => {
            errors.push(CompileError::Malformed {
                path: "$".to_string(),
                message: err.to_string(),
            });
            return (CollectionBatch::default(), errors);
        }
    };
    let mut value = match value {
        serde_json::Value::Object(map) => map,
        _ => {
            errors.push(CompileError::Malformed {
                path: "$".to_string(),
                message: "collection batch must be a JSON object".to_string(),
            });
            return (CollectionBatch::default(), errors);
        }
    };
    let batch = CollectionBatch {
        collections: parse_elements(value.remove("collections"), "collections", &mut errors),
        mutations: parse_elements(value.remove("mutations"), "mutations", &mut errors),
        global_queries: parse_elements(
            value.remove("globalQueries"),
            "globalQueries",
            &mut errors,
        ),
    };
    (batch, errors)
}

fn parse_array<T: DeserializeOwned>(json: &str, path: &str) -> (Vec<T>, Vec<CompileError>) {
    let mut errors = Vec::new();
    let value: serde_json::Value = match serde_json::from_str(json) {
        Ok(value) => value,
        Err(err) => {
            errors.push(CompileError::Malformed {
                path: path.to_string(),
                message: err.to_string(),
            });
            return (Vec::new(), errors);
        }
    };
    let parsed = parse_elements(Some(value), path, &mut errors);
    (parsed, errors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn malformed_elements_do_not_take_the_batch_down() {
        let (tables, errors) = parse_table_batch(
            r#"[
                { "name": "Order", "columns": [{ "name": "status", "type": "string" }] },
                { "name": "Broken", "columns": "nope" }
            ]"#,
        );
        assert_eq!(tables.len(), 1);
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], CompileError::Malformed { .. }));
    }

    #[test]
    fn duplicate_names_drop_the_later_descriptor() {
        let input: CompileInput = serde_json::from_value(json!({
            "tables": [
                { "name": "Order", "columns": [{ "name": "status", "type": "string" }] },
                { "name": "Order", "columns": [{ "name": "other", "type": "string" }] }
            ]
        }))
        .unwrap();
        let report = compile(&input);
        assert_eq!(report.errors.len(), 1);
        assert!(report.files.contains_key("schemas/order.ts"));
    }

    #[test]
    fn collection_with_unknown_schema_is_skipped() {
        let input: CompileInput = serde_json::from_value(json!({
            "collections": [{
                "name": "orders",
                "schema": "Order",
                "source": { "type": "localPersisted", "key": "orders" }
            }]
        }))
        .unwrap();
        let report = compile(&input);
        assert!(!report.files.contains_key("collections/orders.ts"));
        assert!(report.errors.iter().any(|e| matches!(
            e,
            CompileError::UnresolvedReference { kind: ReferenceKind::Table, .. }
        )));
    }

    #[test]
    fn global_query_needs_a_known_anchor_collection() {
        let input: CompileInput = serde_json::from_value(json!({
            "globalQueries": [{ "name": "ghostQuery", "from": "ghosts" }]
        }))
        .unwrap();
        let report = compile(&input);
        assert!(report.errors.iter().any(|e| matches!(
            e,
            CompileError::UnresolvedReference { kind: ReferenceKind::Collection, .. }
        )));
    }

    #[test]
    fn per_batch_entry_points_compile_standalone_sections() {
        let (tables, errors) = parse_table_batch(
            r#"[{ "name": "Order", "columns": [{ "name": "status", "type": "string" }] }]"#,
        );
        assert!(errors.is_empty());
        let report = compile_tables(&tables);
        assert!(report.is_clean());
        assert!(report.files.contains_key("schemas/order.ts"));

        let (containers, errors) = parse_container_batch(
            r#"[{ "name": "ui", "initialState": [{ "name": "open", "type": "boolean" }] }]"#,
        );
        assert!(errors.is_empty());
        let report = compile_containers(&containers);
        assert!(report.is_clean());
        assert!(report.files.contains_key("containers/ui.ts"));
    }

    #[test]
    fn store_and_provider_are_always_assembled() {
        let report = compile(&CompileInput::default());
        assert!(report.files.contains_key("store.ts"));
        assert!(report.files.contains_key("provider.tsx"));
        assert!(report.is_clean());
    }
}
