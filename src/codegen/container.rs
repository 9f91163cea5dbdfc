//! # State-Container Compiler
//!
//! Compiles a [`StateContainerDescriptor`] into a Redux-Toolkit-shaped
//! slice file: typed state shape, initial-state literal, one mutation
//! per reducer, one thunk per async operation, and one exported
//! accessor per selector.

use crate::descriptor::{
    AsyncOperation, Computation, ComputationOp, ParamOp, ReducerDescriptor, SelectorDescriptor,
    SelectorInputRef, StateContainerDescriptor, StateField,
};
use crate::emit::{render_file, CodeWriter, ImportSet};
use crate::error::Result;
use crate::naming;
use crate::typemap;

pub struct ContainerGenerator<'a> {
    container: &'a StateContainerDescriptor,
}

impl<'a> ContainerGenerator<'a> {
    pub fn new(container: &'a StateContainerDescriptor) -> Self {
        Self { container }
    }

    pub fn output_path(&self) -> String {
        format!("containers/{}.ts", self.container.name)
    }

    fn state_type(&self) -> String {
        format!("{}State", naming::pascal(&self.container.name))
    }

    pub fn generate(&self) -> Result<String> {
        tracing::debug!(
            "[CODEGEN] Generating state container {}",
            self.container.name
        );

        let mut imports = ImportSet::new();
        imports.named("@reduxjs/toolkit", "createSlice");
        if !self.container.reducers.is_empty() {
            imports.type_only("@reduxjs/toolkit", "PayloadAction");
        }
        if !self.container.async_operations.is_empty() {
            imports.named("@reduxjs/toolkit", "createAsyncThunk");
        }
        if !self.container.selectors.is_empty() {
            imports.type_only("../store", "RootState");
        }

        let mut w = CodeWriter::new();
        self.write_state_shape(&mut w);
        w.blank();
        self.write_initial_state(&mut w);

        for op in &self.container.async_operations {
            w.blank();
            self.write_thunk(&mut w, op);
        }

        w.blank();
        self.write_slice(&mut w);
        w.blank();
        self.write_exports(&mut w);

        if !self.container.selectors.is_empty() {
            w.blank();
            w.line("// Selectors");
            for selector in &self.container.selectors {
                w.blank();
                self.write_selector(&mut w, &mut imports, selector);
            }
        }

        Ok(render_file(&imports, &w.finish()))
    }

    fn write_state_shape(&self, w: &mut CodeWriter) {
        if !self.container.description.is_empty() {
            w.line(format!("/** {} */", self.container.description));
        }
        w.open(format!("export interface {} {{", self.state_type()));
        for field in &self.container.initial_state {
            w.line(format!("{}: {};", field.name, typemap::state_ts_type(&field.ty)));
        }
        w.close("}");
    }

    fn write_initial_state(&self, w: &mut CodeWriter) {
        w.open(format!("const initialState: {} = {{", self.state_type()));
        for field in &self.container.initial_state {
            let value = match &field.default {
                Some(default) => typemap::ts_literal(default),
                None => typemap::state_default_literal(&field.ty).to_string(),
            };
            w.line(format!("{}: {value},", field.name));
        }
        w.close("};");
    }

    fn write_thunk(&self, w: &mut CodeWriter, op: &AsyncOperation) {
        let container = &self.container.name;
        if !op.description.is_empty() {
            w.line(format!("/** {} */", op.description));
        }
        w.open(format!("export const {} = createAsyncThunk(", op.name));
        w.line(format!("\"{container}/{}\",", op.name));

        let has_body = !op.method.eq_ignore_ascii_case("GET");
        if has_body {
            w.open("async (payload: unknown) => {");
            w.open(format!("const response = await fetch(\"{}\", {{", op.endpoint));
            w.line(format!("method: \"{}\",", op.method));
            w.line("headers: { \"Content-Type\": \"application/json\" },");
            w.line("body: JSON.stringify(payload),");
            w.close("});");
        } else {
            w.open("async () => {");
            w.line(format!(
                "const response = await fetch(\"{}\", {{ method: \"GET\" }});",
                op.endpoint
            ));
        }
        w.open("if (!response.ok) {");
        w.line(format!("throw new Error(`{} failed: ${{response.status}}`);", op.name));
        w.close("}");
        w.line("return response.json();");
        w.close("}");
        w.close(");");
    }

    fn write_slice(&self, w: &mut CodeWriter) {
        let container = &self.container.name;
        w.open(format!("const {container}Slice = createSlice({{"));
        w.line(format!("name: \"{container}\","));
        w.line("initialState,");

        if self.container.reducers.is_empty() {
            w.line("reducers: {},");
        } else {
            w.open("reducers: {");
            for reducer in &self.container.reducers {
                self.write_reducer(w, reducer);
            }
            w.close("},");
        }

        if !self.container.async_operations.is_empty() {
            w.open("extraReducers: (builder) => {");
            w.open("builder");
            for op in &self.container.async_operations {
                self.write_lifecycle_cases(w, op);
            }
            w.dedent();
            w.line(";");
            w.close("},");
        }
        w.close("});");
    }

    fn write_reducer(&self, w: &mut CodeWriter, reducer: &ReducerDescriptor) {
        let state_type = self.state_type();
        if !reducer.description.is_empty() {
            w.line(format!("/** {} */", reducer.description));
        }
        // The modifies list is declarative documentation, not an
        // enforced contract.
        if !reducer.modifies.is_empty() {
            w.line(format!("/** Modifies: {} */", reducer.modifies.join(", ")));
        }

        match reducer.modifies.as_slice() {
            [] => {
                w.open(format!("{}(state) {{", reducer.name));
                w.line("// no declared fields to modify");
                w.line("void state;");
                w.close("},");
            }
            [field] => {
                w.open(format!(
                    "{}(state, action: PayloadAction<{state_type}[\"{field}\"]>) {{",
                    reducer.name
                ));
                w.line(format!("state.{field} = action.payload;"));
                w.close("},");
            }
            fields => {
                w.open(format!(
                    "{}(state, action: PayloadAction<Partial<{state_type}>>) {{",
                    reducer.name
                ));
                for field in fields {
                    w.open(format!("if (action.payload.{field} !== undefined) {{"));
                    w.line(format!("state.{field} = action.payload.{field};"));
                    w.close("}");
                }
                w.close("},");
            }
        }
    }

    /// Pending sets `loading`-named fields true and clears `error`-named
    /// fields; fulfilled assigns the payload to the declared data fields
    /// and flips loading fields back; rejected records the failure
    /// message and flips loading fields back.
    fn write_lifecycle_cases(&self, w: &mut CodeWriter, op: &AsyncOperation) {
        w.open(format!(".addCase({}.pending, (state) => {{", op.name));
        for field in &op.on_pending {
            if StateField::is_loading_field(field) {
                w.line(format!("state.{field} = true;"));
            } else if StateField::is_error_field(field) {
                w.line(format!("state.{field} = null;"));
            }
        }
        w.close("})");

        let data_fields: Vec<&String> = op
            .on_fulfilled
            .iter()
            .filter(|f| !StateField::is_loading_field(f) && !StateField::is_error_field(f))
            .collect();
        w.open(format!(
            ".addCase({}.fulfilled, (state, action) => {{",
            op.name
        ));
        for field in &op.on_fulfilled {
            if StateField::is_loading_field(field) {
                w.line(format!("state.{field} = false;"));
            }
        }
        match data_fields.as_slice() {
            [] => {}
            [field] => w.line(format!("state.{field} = action.payload;")),
            fields => {
                for field in fields {
                    w.line(format!("state.{field} = action.payload.{field};"));
                }
            }
        }
        w.close("})");

        w.open(format!(
            ".addCase({}.rejected, (state, action) => {{",
            op.name
        ));
        for field in &op.on_rejected {
            if StateField::is_loading_field(field) {
                w.line(format!("state.{field} = false;"));
            } else if StateField::is_error_field(field) {
                w.line(format!(
                    "state.{field} = action.error.message ?? \"request failed\";"
                ));
            }
        }
        w.close("})");
    }

    fn write_exports(&self, w: &mut CodeWriter) {
        let container = &self.container.name;
        if !self.container.reducers.is_empty() {
            let names: Vec<&str> = self
                .container
                .reducers
                .iter()
                .map(|r| r.name.as_str())
                .collect();
            w.line(format!(
                "export const {{ {} }} = {container}Slice.actions;",
                names.join(", ")
            ));
        }
        w.line(format!("export default {container}Slice.reducer;"));
    }

    /// Accessor name for a selector input, importing foreign containers'
    /// qualified accessors instead of reaching into their state paths.
    fn input_accessor(&self, input: &SelectorInputRef, imports: &mut ImportSet) -> String {
        match input {
            SelectorInputRef::Local(name) => {
                naming::container_selector_accessor(&self.container.name, name)
            }
            SelectorInputRef::Foreign {
                container,
                selector,
            } => {
                let accessor = naming::container_selector_accessor(container, selector);
                imports.named(format!("./{container}"), accessor.clone());
                accessor
            }
        }
    }

    fn write_selector(
        &self,
        w: &mut CodeWriter,
        imports: &mut ImportSet,
        selector: &SelectorDescriptor,
    ) {
        let container = &self.container.name;
        match selector {
            SelectorDescriptor::Simple {
                name,
                description,
                path,
            } => {
                if !description.is_empty() {
                    w.line(format!("/** {description} */"));
                }
                w.line(format!(
                    "export const {} = (state: RootState) => state.{container}.{path};",
                    naming::container_selector_accessor(container, name)
                ));
            }
            SelectorDescriptor::Derived {
                name,
                description,
                inputs,
                computation,
            } => {
                imports.named("@reduxjs/toolkit", "createSelector");
                if !description.is_empty() {
                    w.line(format!("/** {description} */"));
                }
                let accessors: Vec<String> = inputs
                    .iter()
                    .map(|input| self.input_accessor(input, imports))
                    .collect();
                let args: Vec<String> = inputs
                    .iter()
                    .map(|input| input.selector_name().to_string())
                    .collect();

                w.open(format!(
                    "export const {} = createSelector(",
                    naming::container_selector_accessor(container, name)
                ));
                w.line(format!("[{}],", accessors.join(", ")));
                write_computation(w, &args, computation);
                w.close(");");
            }
            SelectorDescriptor::Parameterized {
                name,
                description,
                params,
                base_selector,
                computation,
            } => {
                imports.named("@reduxjs/toolkit", "createSelector");
                if !description.is_empty() {
                    w.line(format!("/** {description} */"));
                }
                let base = naming::container_selector_accessor(container, base_selector);
                let arg_list: Vec<String> =
                    params.iter().map(|p| format!("{}: unknown", p.name)).collect();
                let param = params.first().map(|p| p.name.as_str()).unwrap_or("value");

                let body = match (computation.op, computation.field.as_deref()) {
                    (ParamOp::Filter, Some(field)) => {
                        format!("items.filter((item: any) => item.{field} === {param})")
                    }
                    (ParamOp::Filter, None) => {
                        format!("items.filter((item: any) => item === {param})")
                    }
                    (ParamOp::Find, Some(field)) => {
                        format!("items.find((item: any) => item.{field} === {param}) ?? null")
                    }
                    (ParamOp::Find, None) => {
                        format!("items.find((item: any) => item === {param}) ?? null")
                    }
                    (ParamOp::Includes, Some(field)) => {
                        format!("items.some((item: any) => item.{field} === {param})")
                    }
                    (ParamOp::Includes, None) => format!("items.includes({param})"),
                };

                w.open(format!(
                    "export const {} = ({}) =>",
                    naming::parameterized_selector_factory(container, name),
                    arg_list.join(", ")
                ));
                w.open(format!("createSelector([{base}], (items: any[]) =>"));
                w.line(body);
                w.close(");");
                w.dedent();
            }
        }
    }
}

/// Write the result function of a derived selector. The first input is
/// the primary stream; for `filter`/`find` with no literal value, a
/// second input supplies the comparison value.
fn write_computation(w: &mut CodeWriter, args: &[String], computation: &Computation) {
    let arg_list = args.join(", ");
    let primary = args.first().cloned().unwrap_or_default();
    let field = computation.field.as_deref();
    let value = computation
        .value
        .as_ref()
        .map(typemap::ts_literal)
        .or_else(|| args.get(1).cloned());

    let predicate = |field: &str| -> String {
        match &value {
            Some(value) => format!("item.{field} === {value}"),
            None => format!("Boolean(item.{field})"),
        }
    };

    match computation.op {
        ComputationOp::Identity => {
            w.line(format!("({arg_list}) => {primary}"));
        }
        ComputationOp::Count => {
            w.line(format!("({arg_list}) => {primary}.length"));
        }
        ComputationOp::Sum => {
            let field = field.unwrap_or("value");
            w.line(format!(
                "({arg_list}) => {primary}.reduce((acc: number, item: any) => acc + (item.{field} ?? 0), 0)"
            ));
        }
        ComputationOp::Filter => match field {
            Some(field) => w.line(format!(
                "({arg_list}) => {primary}.filter((item: any) => {})",
                predicate(field)
            )),
            None => w.line(format!("({arg_list}) => {primary}.filter(Boolean)")),
        },
        ComputationOp::Map => {
            let field = field.unwrap_or("value");
            w.line(format!(
                "({arg_list}) => {primary}.map((item: any) => item.{field})"
            ));
        }
        ComputationOp::Find => {
            let field = field.unwrap_or("value");
            w.line(format!(
                "({arg_list}) => {primary}.find((item: any) => {}) ?? null",
                predicate(field)
            ));
        }
        ComputationOp::Sort => {
            let field = field.unwrap_or("value");
            w.line(format!(
                "({arg_list}) => [...{primary}].sort((a: any, b: any) => (a.{field} < b.{field} ? -1 : a.{field} > b.{field} ? 1 : 0))"
            ));
        }
        ComputationOp::GroupBy => {
            let field = field.unwrap_or("value");
            w.open(format!(
                "({arg_list}) => {primary}.reduce((acc: Record<string, any[]>, item: any) => {{"
            ));
            w.line(format!("const key = String(item.{field});"));
            w.line("(acc[key] = acc[key] ?? []).push(item);");
            w.line("return acc;");
            w.close("}, {})");
        }
        ComputationOp::Combine => {
            w.line(format!("({arg_list}) => ({{ {arg_list} }})"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ui_container() -> StateContainerDescriptor {
        serde_json::from_value(json!({
            "name": "ui",
            "description": "Local UI state",
            "initialState": [
                { "name": "selectedStatus", "type": { "nullable": "string" } },
                { "name": "statuses", "type": { "list": "string" } },
                { "name": "loading", "type": "boolean" },
                { "name": "error", "type": { "nullable": "string" } },
                { "name": "limit", "type": "number", "default": 25 }
            ],
            "reducers": [
                { "name": "setSelectedStatus", "modifies": ["selectedStatus"] },
                { "name": "applyView", "modifies": ["selectedStatus", "limit"] }
            ],
            "asyncOperations": [{
                "name": "fetchStatuses",
                "endpoint": "/api/statuses",
                "onPending": ["loading", "error"],
                "onFulfilled": ["loading", "statuses"],
                "onRejected": ["loading", "error"]
            }],
            "selectors": [
                { "name": "selectedStatus", "path": "selectedStatus" },
                { "name": "statuses", "path": "statuses" },
                {
                    "name": "statusCount",
                    "inputs": ["statuses"],
                    "computation": { "op": "count" }
                },
                {
                    "name": "hasStatus",
                    "params": [{ "name": "status" }],
                    "baseSelector": "statuses",
                    "computation": { "op": "includes" }
                }
            ]
        }))
        .unwrap()
    }

    #[test]
    fn initial_state_uses_type_table_defaults() {
        let source = ContainerGenerator::new(&ui_container()).generate().unwrap();
        assert!(source.contains("selectedStatus: null,"));
        assert!(source.contains("statuses: [],"));
        assert!(source.contains("loading: false,"));
        assert!(source.contains("error: null,"));
        // Declared default wins over the type table.
        assert!(source.contains("limit: 25,"));
    }

    #[test]
    fn state_shape_matches_value_types() {
        let source = ContainerGenerator::new(&ui_container()).generate().unwrap();
        assert!(source.contains("export interface UiState {"));
        assert!(source.contains("selectedStatus: string | null;"));
        assert!(source.contains("statuses: string[];"));
    }

    #[test]
    fn single_field_reducer_takes_the_field_payload() {
        let source = ContainerGenerator::new(&ui_container()).generate().unwrap();
        assert!(source.contains(
            "setSelectedStatus(state, action: PayloadAction<UiState[\"selectedStatus\"]>) {"
        ));
        assert!(source.contains("state.selectedStatus = action.payload;"));
        assert!(source.contains("/** Modifies: selectedStatus */"));
    }

    #[test]
    fn multi_field_reducer_takes_partial_state() {
        let source = ContainerGenerator::new(&ui_container()).generate().unwrap();
        assert!(source.contains("applyView(state, action: PayloadAction<Partial<UiState>>) {"));
        assert!(source.contains("if (action.payload.limit !== undefined) {"));
    }

    #[test]
    fn lifecycle_cases_follow_field_conventions() {
        let source = ContainerGenerator::new(&ui_container()).generate().unwrap();
        assert!(source.contains(".addCase(fetchStatuses.pending, (state) => {"));
        assert!(source.contains("state.loading = true;"));
        assert!(source.contains("state.error = null;"));
        assert!(source.contains("state.statuses = action.payload;"));
        assert!(source.contains("state.error = action.error.message ?? \"request failed\";"));
    }

    #[test]
    fn selectors_export_qualified_accessors() {
        let source = ContainerGenerator::new(&ui_container()).generate().unwrap();
        assert!(source.contains(
            "export const selectUiSelectedStatus = (state: RootState) => state.ui.selectedStatus;"
        ));
        assert!(source.contains("export const selectUiStatusCount = createSelector("));
        assert!(source.contains("(statuses) => statuses.length"));
        assert!(source.contains("export const makeSelectUiHasStatus = (status: unknown) =>"));
        assert!(source.contains("items.includes(status)"));
    }

    #[test]
    fn foreign_inputs_import_qualified_accessor() {
        let container: StateContainerDescriptor = serde_json::from_value(json!({
            "name": "dashboard",
            "initialState": [{ "name": "open", "type": "boolean" }],
            "selectors": [{
                "name": "summary",
                "inputs": [
                    { "container": "orders", "selector": "visibleOrders" },
                    { "container": "ui", "selector": "selectedStatus" }
                ],
                "computation": { "op": "combine" }
            }]
        }))
        .unwrap();
        let source = ContainerGenerator::new(&container).generate().unwrap();
        assert!(source.contains("import { selectOrdersVisibleOrders } from \"./orders\";"));
        assert!(source.contains("import { selectUiSelectedStatus } from \"./ui\";"));
        assert!(source.contains("(visibleOrders, selectedStatus) => ({ visibleOrders, selectedStatus })"));
    }
}
