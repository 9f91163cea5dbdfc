//! # Descriptor Validation
//!
//! Structural validation applied before any compilation begins. Each
//! check pushes a [`CompileError::Validation`] carrying the offending
//! descriptor's path; a descriptor with errors is dropped from the batch
//! without affecting its siblings.

use crate::descriptor::{
    AggregateOp, CollectionDescriptor, CrossSourceSelector, FilterCondition, InputSource,
    LiveQuery, MutationDescriptor, OutputShape, SelectorDescriptor, SelectorInputRef,
    StateContainerDescriptor, TableDescriptor, TransformOperation,
};
use crate::error::CompileError;
use crate::naming;
use std::collections::BTreeSet;

/// Validate one table descriptor. Identifier failures here are fatal for
/// the table: the Table Compiler refuses to emit partial files.
pub fn validate_table(table: &TableDescriptor, path: &str, errs: &mut Vec<CompileError>) {
    if !naming::is_pascal_case(&table.name) {
        errs.push(CompileError::validation(
            format!("{path}.name"),
            format!("table name '{}' must be PascalCase", table.name),
        ));
    }
    if !naming::is_identifier(&table.primary_key) {
        errs.push(CompileError::validation(
            format!("{path}.primaryKey"),
            format!("primary key '{}' is not a valid identifier", table.primary_key),
        ));
    }

    let mut seen = BTreeSet::new();
    for (i, column) in table.columns.iter().enumerate() {
        if !naming::is_identifier(&column.name) {
            errs.push(CompileError::validation(
                format!("{path}.columns[{i}].name"),
                format!("column name '{}' is not a valid identifier", column.name),
            ));
        }
        if !seen.insert(column.name.as_str()) {
            errs.push(CompileError::validation(
                format!("{path}.columns[{i}].name"),
                format!("duplicate column '{}'", column.name),
            ));
        }
        if let Some(constraints) = &column.constraints {
            if constraints.one_of.as_ref().is_some_and(Vec::is_empty) {
                errs.push(CompileError::validation(
                    format!("{path}.columns[{i}].constraints.enum"),
                    "enum constraint must list at least one value",
                ));
            }
        }
    }

    let field_names: BTreeSet<String> = table
        .effective_fields()
        .into_iter()
        .map(|f| f.name)
        .collect();
    for (i, index) in table.indexes.iter().enumerate() {
        if index.columns.is_empty() {
            errs.push(CompileError::validation(
                format!("{path}.indexes[{i}].columns"),
                "index must cover at least one column",
            ));
        }
        for column in &index.columns {
            if !field_names.contains(column) {
                errs.push(CompileError::validation(
                    format!("{path}.indexes[{i}].columns"),
                    format!("index references unknown column '{column}'"),
                ));
            }
        }
    }
}

fn validate_condition(condition: &FilterCondition, path: &str, errs: &mut Vec<CompileError>) {
    let has_value = condition.value.is_some();
    let has_ref = condition.value_from.is_some();
    if condition.operator.takes_value() {
        if has_value == has_ref {
            errs.push(CompileError::validation(
                path,
                format!(
                    "operator '{:?}' requires exactly one of value/valueFrom",
                    condition.operator
                ),
            ));
        }
    } else if has_value || has_ref {
        errs.push(CompileError::validation(
            path,
            format!("operator '{:?}' takes no comparison value", condition.operator),
        ));
    }
}

/// Validate one live query (collection-owned or global).
pub fn validate_live_query(query: &LiveQuery, path: &str, errs: &mut Vec<CompileError>) {
    if !naming::is_lower_camel(&query.name) {
        errs.push(CompileError::validation(
            format!("{path}.name"),
            format!("live query name '{}' must be lowerCamel", query.name),
        ));
    }
    if query.from.primary_collection().is_none() {
        errs.push(CompileError::validation(
            format!("{path}.from"),
            "live query must name at least one source collection",
        ));
    }
    for (i, condition) in query.conditions.iter().enumerate() {
        validate_condition(condition, &format!("{path}.where[{i}]"), errs);
    }
}

/// Validate one collection descriptor.
pub fn validate_collection(
    collection: &CollectionDescriptor,
    path: &str,
    errs: &mut Vec<CompileError>,
) {
    if !naming::is_lower_camel(&collection.name) {
        errs.push(CompileError::validation(
            format!("{path}.name"),
            format!("collection name '{}' must be lowerCamel", collection.name),
        ));
    }
    for (i, query) in collection.live_queries.iter().enumerate() {
        validate_live_query(query, &format!("{path}.liveQueries[{i}]"), errs);
    }
}

/// Validate one mutation descriptor.
pub fn validate_mutation(mutation: &MutationDescriptor, path: &str, errs: &mut Vec<CompileError>) {
    if !naming::is_lower_camel(&mutation.name) {
        errs.push(CompileError::validation(
            format!("{path}.name"),
            format!("mutation name '{}' must be lowerCamel", mutation.name),
        ));
    }
    if mutation.method.trim().is_empty() {
        errs.push(CompileError::validation(
            format!("{path}.method"),
            "mutation method must not be empty",
        ));
    }
}

/// Validate one state container descriptor.
pub fn validate_container(
    container: &StateContainerDescriptor,
    path: &str,
    errs: &mut Vec<CompileError>,
) {
    if !naming::is_lower_camel(&container.name) {
        errs.push(CompileError::validation(
            format!("{path}.name"),
            format!("container name '{}' must be lowerCamel", container.name),
        ));
    }

    let mut field_names = BTreeSet::new();
    for (i, field) in container.initial_state.iter().enumerate() {
        if !naming::is_identifier(&field.name) {
            errs.push(CompileError::validation(
                format!("{path}.initialState[{i}].name"),
                format!("state field '{}' is not a valid identifier", field.name),
            ));
        }
        if !field_names.insert(field.name.as_str()) {
            errs.push(CompileError::validation(
                format!("{path}.initialState[{i}].name"),
                format!("duplicate state field '{}'", field.name),
            ));
        }
    }

    for (i, reducer) in container.reducers.iter().enumerate() {
        if !naming::is_identifier(&reducer.name) {
            errs.push(CompileError::validation(
                format!("{path}.reducers[{i}].name"),
                format!("reducer name '{}' is not a valid identifier", reducer.name),
            ));
        }
        for field in &reducer.modifies {
            if !field_names.contains(field.as_str()) {
                errs.push(CompileError::validation(
                    format!("{path}.reducers[{i}].modifies"),
                    format!("reducer '{}' modifies unknown field '{field}'", reducer.name),
                ));
            }
        }
    }

    for (i, op) in container.async_operations.iter().enumerate() {
        if !naming::is_identifier(&op.name) {
            errs.push(CompileError::validation(
                format!("{path}.asyncOperations[{i}].name"),
                format!("async operation name '{}' is not a valid identifier", op.name),
            ));
        }
        for (phase, fields) in [
            ("onPending", &op.on_pending),
            ("onFulfilled", &op.on_fulfilled),
            ("onRejected", &op.on_rejected),
        ] {
            for field in fields {
                if !field_names.contains(field.as_str()) {
                    errs.push(CompileError::validation(
                        format!("{path}.asyncOperations[{i}].{phase}"),
                        format!("operation '{}' patches unknown field '{field}'", op.name),
                    ));
                }
            }
        }
    }

    for (i, selector) in container.selectors.iter().enumerate() {
        if !naming::is_identifier(selector.name()) {
            errs.push(CompileError::validation(
                format!("{path}.selectors[{i}].name"),
                format!("selector name '{}' is not a valid identifier", selector.name()),
            ));
        }
        if let SelectorDescriptor::Simple { path: state_path, .. } = selector {
            let root = state_path.split('.').next().unwrap_or_default();
            if !field_names.contains(root) {
                errs.push(CompileError::validation(
                    format!("{path}.selectors[{i}].path"),
                    format!("path '{state_path}' does not start at a declared state field"),
                ));
            }
        }
    }
}

/// Closed-set check for container selector references: derived inputs and
/// parameterized base selectors must resolve among the declared selectors
/// across all containers. Unresolved references are generation-time
/// errors, never runtime ones.
pub fn validate_selector_references(
    containers: &[&StateContainerDescriptor],
    errs: &mut Vec<CompileError>,
) {
    let resolve = |container_name: &str, selector_name: &str| -> bool {
        containers
            .iter()
            .any(|c| c.name == container_name && c.selector(selector_name).is_some())
    };

    for container in containers {
        for selector in &container.selectors {
            let descriptor = format!("container '{}' selector '{}'", container.name, selector.name());
            match selector {
                SelectorDescriptor::Derived { inputs, .. } => {
                    for input in inputs {
                        let (target_container, target) = match input {
                            SelectorInputRef::Local(name) => (container.name.as_str(), name.as_str()),
                            SelectorInputRef::Foreign {
                                container,
                                selector,
                            } => (container.as_str(), selector.as_str()),
                        };
                        if !resolve(target_container, target) {
                            errs.push(CompileError::unresolved(
                                &descriptor,
                                crate::error::ReferenceKind::Selector,
                                format!("{target_container}.{target}"),
                            ));
                        }
                    }
                }
                SelectorDescriptor::Parameterized { base_selector, .. } => {
                    if !resolve(&container.name, base_selector) {
                        errs.push(CompileError::unresolved(
                            &descriptor,
                            crate::error::ReferenceKind::Selector,
                            format!("{}.{base_selector}", container.name),
                        ));
                    }
                }
                SelectorDescriptor::Simple { .. } => {}
            }
        }
    }
}

fn validate_aggregation(
    op: AggregateOp,
    field: Option<&String>,
    path: &str,
    errs: &mut Vec<CompileError>,
) {
    if op.takes_field() && field.is_none() {
        errs.push(CompileError::validation(
            path,
            format!("aggregation '{op:?}' requires a field"),
        ));
    }
}

/// Validate one cross-source selector descriptor.
pub fn validate_cross_selector(
    selector: &CrossSourceSelector,
    path: &str,
    errs: &mut Vec<CompileError>,
) {
    if !naming::is_selector_name(&selector.name) {
        errs.push(CompileError::validation(
            format!("{path}.name"),
            format!(
                "selector name '{}' must match select<UpperCamel>",
                selector.name
            ),
        ));
    }
    if selector.inputs.is_empty() {
        errs.push(CompileError::validation(
            format!("{path}.inputs"),
            "selector must declare at least one input",
        ));
    }

    let mut input_names = BTreeSet::new();
    for (i, input) in selector.inputs.iter().enumerate() {
        if !naming::is_identifier(&input.name) {
            errs.push(CompileError::validation(
                format!("{path}.inputs[{i}].name"),
                format!("input name '{}' is not a valid identifier", input.name),
            ));
        }
        if !input_names.insert(input.name.as_str()) {
            errs.push(CompileError::validation(
                format!("{path}.inputs[{i}].name"),
                format!("duplicate input name '{}'", input.name),
            ));
        }
        if let InputSource::Slice { slice } = &input.source {
            let parts: Vec<&str> = slice.split('.').collect();
            if parts.len() != 2 || !parts.iter().all(|p| naming::is_identifier(p)) {
                errs.push(CompileError::validation(
                    format!("{path}.inputs[{i}].slice"),
                    format!("slice path '{slice}' must be 'container.field'"),
                ));
            }
        }
    }

    for (i, op) in selector.pipeline.iter().enumerate() {
        if let TransformOperation::Filter {
            operator,
            value,
            value_from,
            ..
        } = op
        {
            let condition = FilterCondition {
                field: String::new(),
                operator: *operator,
                value: value.clone(),
                value_from: value_from.clone(),
            };
            validate_condition(&condition, &format!("{path}.pipeline[{i}]"), errs);
        }
        if let TransformOperation::Map { fields } = op {
            if fields.is_empty() {
                errs.push(CompileError::validation(
                    format!("{path}.pipeline[{i}].fields"),
                    "map must produce at least one field",
                ));
            }
        }
    }

    match &selector.output {
        OutputShape::Aggregation { op, field, .. } => {
            validate_aggregation(*op, field.as_ref(), &format!("{path}.output"), errs);
        }
        OutputShape::Object { fields } => {
            if fields.is_empty() {
                errs.push(CompileError::validation(
                    format!("{path}.output.fields"),
                    "object output must declare at least one field",
                ));
            }
            for (i, field) in fields.iter().enumerate() {
                validate_aggregation(
                    field.op,
                    field.field.as_ref(),
                    &format!("{path}.output.fields[{i}]"),
                    errs,
                );
            }
        }
        OutputShape::Array | OutputShape::Single => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn pascal_case_table_name_is_enforced() {
        let table: TableDescriptor = serde_json::from_value(json!({
            "name": "order",
            "columns": [{ "name": "status", "type": "string" }]
        }))
        .unwrap();
        let mut errs = Vec::new();
        validate_table(&table, "tables[0]", &mut errs);
        assert_eq!(errs.len(), 1);
        assert!(matches!(errs[0], CompileError::Validation { .. }));
    }

    #[test]
    fn condition_value_arity_is_checked() {
        let query: LiveQuery = serde_json::from_value(json!({
            "name": "bad",
            "from": "orders",
            "where": [
                { "field": "status", "operator": "eq" },
                { "field": "deletedAt", "operator": "isNull", "value": 1 }
            ]
        }))
        .unwrap();
        let mut errs = Vec::new();
        validate_live_query(&query, "q", &mut errs);
        assert_eq!(errs.len(), 2);
    }

    #[test]
    fn reducer_modifies_must_name_declared_fields() {
        let container: StateContainerDescriptor = serde_json::from_value(json!({
            "name": "ui",
            "initialState": [{ "name": "open", "type": "boolean" }],
            "reducers": [{ "name": "toggle", "modifies": ["missing"] }]
        }))
        .unwrap();
        let mut errs = Vec::new();
        validate_container(&container, "containers[0]", &mut errs);
        assert_eq!(errs.len(), 1);
    }

    #[test]
    fn selector_name_and_slice_path_rules() {
        let selector: CrossSourceSelector = serde_json::from_value(json!({
            "name": "activeOrders",
            "inputs": [{ "name": "status", "slice": "selectedStatus" }],
            "output": { "type": "array" }
        }))
        .unwrap();
        let mut errs = Vec::new();
        validate_cross_selector(&selector, "selectors[0]", &mut errs);
        assert_eq!(errs.len(), 2);
    }

    #[test]
    fn aggregation_field_requirements() {
        let selector: CrossSourceSelector = serde_json::from_value(json!({
            "name": "selectRevenue",
            "inputs": [{ "name": "orders", "collection": "orders" }],
            "output": { "type": "aggregation", "op": "sum" }
        }))
        .unwrap();
        let mut errs = Vec::new();
        validate_cross_selector(&selector, "selectors[0]", &mut errs);
        assert_eq!(errs.len(), 1);
    }
}
