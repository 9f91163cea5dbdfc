//! # Derived-State Compiler
//!
//! Compiles a [`CrossSourceSelector`] into one of two code shapes. When
//! every input is a state slice the derivation lives entirely inside the
//! store and compiles to a pure memoized selector. The moment any input
//! is reactive (a collection, or another compiled selector) the
//! derivation must run inside React, so it compiles to a hook that binds
//! each input with the matching subscription primitive and recomputes
//! through `useMemo`.

use crate::codegen::collection::collection_export;
use crate::descriptor::{
    AggregateOp, ComputeOp, CrossSourceSelector, FilterOperator, InputSource, MappedField,
    OutputShape, SelectorInput, SortDirection, TransformOperation, ValueRef,
};
use crate::emit::{render_file, CodeWriter, ImportSet};
use crate::error::{CompileError, Result};
use crate::naming;
use crate::resolve::{CompiledSelectorInfo, ResolveContext, StateAccessor};
use crate::typemap;
use std::collections::BTreeMap;

/// Which code shape a cross-source selector compiles to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// `createSelector` over store accessors; no React in sight.
    PureMemoized,
    /// A `use<Name>` hook binding reactive inputs, folded with `useMemo`.
    ReactiveHook,
}

/// The strategy decision is a pure function of the input kinds: only an
/// all-slice selector can stay outside React.
pub fn strategy_for(inputs: &[SelectorInput]) -> Strategy {
    let all_slices = inputs
        .iter()
        .all(|input| matches!(input.source, InputSource::Slice { .. }));
    if all_slices {
        Strategy::PureMemoized
    } else {
        Strategy::ReactiveHook
    }
}

pub struct SelectorGenerator<'a> {
    selector: &'a CrossSourceSelector,
    ctx: &'a ResolveContext<'a>,
}

impl<'a> SelectorGenerator<'a> {
    pub fn new(selector: &'a CrossSourceSelector, ctx: &'a ResolveContext<'a>) -> Self {
        Self { selector, ctx }
    }

    pub fn output_path(&self) -> String {
        format!(
            "selectors/{}.ts",
            naming::selector_file_stem(&self.selector.name)
        )
    }

    /// Generate the selector file and the registration record later
    /// selectors compose against.
    pub fn generate(&self) -> Result<(CompiledSelectorInfo, String)> {
        let strategy = strategy_for(&self.selector.inputs);
        tracing::debug!(
            "[CODEGEN] Generating {} as {:?}",
            self.selector.name,
            strategy
        );
        match strategy {
            Strategy::PureMemoized => self.generate_pure(),
            Strategy::ReactiveHook => self.generate_hook(),
        }
    }

    fn import_accessor(&self, accessor: &StateAccessor, imports: &mut ImportSet) {
        match accessor {
            StateAccessor::Named {
                accessor,
                container,
                ..
            } => {
                imports.named(format!("../containers/{container}"), accessor.clone());
            }
            StateAccessor::Inline { .. } => {
                imports.type_only("../store", "RootState");
            }
        }
    }

    fn generate_pure(&self) -> Result<(CompiledSelectorInfo, String)> {
        let name = &self.selector.name;
        let mut imports = ImportSet::new();

        // Declared inputs first, then any valueFrom references the
        // pipeline needs, each becoming one more memoized input.
        let mut bindings: Vec<(String, StateAccessor)> = Vec::new();
        for input in &self.selector.inputs {
            let InputSource::Slice { slice } = &input.source else {
                return Err(CompileError::CodeGeneration {
                    name: name.clone(),
                    message: "pure strategy requires slice inputs only".to_string(),
                });
            };
            let accessor = self.ctx.state_accessor(&slice_value_ref(slice, name)?, name)?;
            self.import_accessor(&accessor, &mut imports);
            bindings.push((input.name.clone(), accessor));
        }
        for value_ref in self.selector.pipeline_value_refs() {
            let accessor = self.ctx.state_accessor(value_ref, name)?;
            if bindings.iter().any(|(arg, _)| arg == accessor.ident()) {
                continue;
            }
            self.import_accessor(&accessor, &mut imports);
            bindings.push((accessor.ident().to_string(), accessor));
        }
        let args: Vec<String> = bindings.iter().map(|(arg, _)| arg.clone()).collect();

        let mut w = CodeWriter::new();
        if !self.selector.description.is_empty() {
            w.line(format!("/** {} */", self.selector.description));
        }

        if self.selector.memoize == Some(false) {
            imports.type_only("../store", "RootState");
            w.open(format!("export const {name} = (state: RootState) => {{"));
            for (arg, accessor) in &bindings {
                w.line(format!("const {arg} = {};", direct_read(accessor)));
            }
            self.write_pipeline_body(&mut w, &args);
            w.close("};");
        } else {
            imports.named("@reduxjs/toolkit", "createSelector");
            let accessors: Vec<String> = bindings.iter().map(|(_, a)| a.expr()).collect();
            w.open(format!("export const {name} = createSelector("));
            w.line(format!("[{}],", accessors.join(", ")));
            w.open(format!("({}) => {{", args.join(", ")));
            self.write_pipeline_body(&mut w, &args);
            w.close("}");
            w.close(");");
        }

        let info = CompiledSelectorInfo {
            export: name.clone(),
            file_stem: naming::selector_file_stem(name),
            strategy: Strategy::PureMemoized,
        };
        Ok((info, render_file(&imports, &w.finish())))
    }

    fn generate_hook(&self) -> Result<(CompiledSelectorInfo, String)> {
        let name = &self.selector.name;
        let hook = naming::hook_name(name);
        let mut imports = ImportSet::new();
        imports.named("react", "useMemo");

        let mut w = CodeWriter::new();
        let mut deps: Vec<String> = Vec::new();
        let mut uses_use_selector = false;

        if !self.selector.description.is_empty() {
            w.line(format!("/** {} */", self.selector.description));
        }
        w.open(format!("export function {hook}() {{"));

        for input in &self.selector.inputs {
            match &input.source {
                InputSource::Slice { slice } => {
                    let accessor =
                        self.ctx.state_accessor(&slice_value_ref(slice, name)?, name)?;
                    self.import_accessor(&accessor, &mut imports);
                    uses_use_selector = true;
                    w.line(format!(
                        "const {} = useSelector({});",
                        input.name,
                        accessor.expr()
                    ));
                    push_dep(&mut deps, &input.name);
                }
                InputSource::Collection { collection, query } => {
                    imports.named("@tanstack/react-db", "useLiveQuery");
                    self.ctx.collection(collection, name)?;
                    match query {
                        Some(query_name) => {
                            let query = self.ctx.live_query(collection, query_name, name)?;
                            imports
                                .named(format!("../collections/{collection}"), query.name.clone());
                            let value_refs = query.value_refs();
                            if value_refs.is_empty() {
                                w.line(format!(
                                    "const {{ data: {} }} = useLiveQuery({});",
                                    input.name, query.name
                                ));
                            } else {
                                // Bind the query's template parameters from
                                // local state before instantiating it.
                                let mut params: Vec<String> = Vec::new();
                                for value_ref in value_refs {
                                    let accessor = self.ctx.state_accessor(value_ref, name)?;
                                    let ident = accessor.ident().to_string();
                                    if !deps.contains(&ident) {
                                        self.import_accessor(&accessor, &mut imports);
                                        uses_use_selector = true;
                                        w.line(format!(
                                            "const {ident} = useSelector({});",
                                            accessor.expr()
                                        ));
                                        push_dep(&mut deps, &ident);
                                    }
                                    if !params.contains(&ident) {
                                        params.push(ident);
                                    }
                                }
                                let params = params.join(", ");
                                w.line(format!(
                                    "const {}Query = useMemo(() => {}({params}), [{params}]);",
                                    input.name, query.name
                                ));
                                w.line(format!(
                                    "const {{ data: {} }} = useLiveQuery({}Query);",
                                    input.name, input.name
                                ));
                            }
                        }
                        None => {
                            let export = collection_export(collection);
                            imports.named(format!("../collections/{collection}"), export.clone());
                            w.line(format!(
                                "const {{ data: {} }} = useLiveQuery((q) => q.from({{ item: {export} }}));",
                                input.name
                            ));
                        }
                    }
                    push_dep(&mut deps, &input.name);
                }
                InputSource::Selector { selector } => {
                    let info = self.ctx.compiled_selector(selector, name)?;
                    imports.named(format!("./{}", info.file_stem), info.export.clone());
                    match info.strategy {
                        Strategy::ReactiveHook => {
                            w.line(format!("const {} = {}();", input.name, info.export));
                        }
                        Strategy::PureMemoized => {
                            uses_use_selector = true;
                            w.line(format!(
                                "const {} = useSelector({});",
                                input.name, info.export
                            ));
                        }
                    }
                    push_dep(&mut deps, &input.name);
                }
            }
        }

        for value_ref in self.selector.pipeline_value_refs() {
            let accessor = self.ctx.state_accessor(value_ref, name)?;
            let ident = accessor.ident().to_string();
            if deps.contains(&ident) {
                continue;
            }
            self.import_accessor(&accessor, &mut imports);
            uses_use_selector = true;
            w.line(format!("const {ident} = useSelector({});", accessor.expr()));
            push_dep(&mut deps, &ident);
        }

        if uses_use_selector {
            imports.named("react-redux", "useSelector");
        }

        let arg_names: Vec<String> = self
            .selector
            .inputs
            .iter()
            .map(|i| i.name.clone())
            .collect();
        w.blank();
        w.open("return useMemo(() => {");
        self.write_pipeline_body(&mut w, &arg_names);
        w.close(format!("}}, [{}]);", deps.join(", ")));
        w.close("}");

        let info = CompiledSelectorInfo {
            export: hook,
            file_stem: naming::selector_file_stem(name),
            strategy: Strategy::ReactiveHook,
        };
        Ok((info, render_file(&imports, &w.finish())))
    }

    /// Shared pipeline body: seed `items` from the primary input, apply
    /// each transform in order, then shape the return value.
    fn write_pipeline_body(&self, w: &mut CodeWriter, args: &[String]) {
        let primary = args.first().cloned().unwrap_or_default();
        // Live-query data is undefined until the first snapshot and a
        // nullable slice starts null.
        w.line(format!("let items: any = {primary} ?? [];"));

        for op in &self.selector.pipeline {
            self.write_transform(w, op);
        }
        self.write_output(w);
    }

    fn write_transform(&self, w: &mut CodeWriter, op: &TransformOperation) {
        match op {
            TransformOperation::Filter {
                field,
                operator,
                value,
                value_from,
            } => {
                let rhs = match (value_from, value) {
                    (Some(value_ref), _) => value_ref.selector.clone(),
                    (None, Some(value)) => typemap::ts_literal(value),
                    (None, None) => "null".to_string(),
                };
                w.line(format!(
                    "items = items.filter((item: any) => {});",
                    js_comparison(field, *operator, &rhs)
                ));
            }
            TransformOperation::Map { fields } => {
                let parts: Vec<String> = fields.iter().map(mapped_field_expr).collect();
                w.line(format!(
                    "items = items.map((item: any) => ({{ {} }}));",
                    parts.join(", ")
                ));
            }
            TransformOperation::Sort { field, direction } => {
                let (lt, gt) = match direction {
                    SortDirection::Asc => ("-1", "1"),
                    SortDirection::Desc => ("1", "-1"),
                };
                w.line(format!(
                    "items = [...items].sort((a: any, b: any) => (a.{field} < b.{field} ? {lt} : a.{field} > b.{field} ? {gt} : 0));"
                ));
            }
            TransformOperation::Slice { start, end } => {
                let start = start.unwrap_or(0);
                match end {
                    Some(end) => w.line(format!("items = items.slice({start}, {end});")),
                    None => w.line(format!("items = items.slice({start});")),
                }
            }
            TransformOperation::GroupBy { field } => {
                w.open(
                    "items = items.reduce((acc: Record<string, any[]>, item: any) => {",
                );
                w.line(format!("const key = String(item.{field});"));
                w.line("(acc[key] = acc[key] ?? []).push(item);");
                w.line("return acc;");
                w.close("}, {});");
            }
            TransformOperation::Unique { field } => match field {
                // Keyed dedupe keeps the last item seen per distinct value.
                Some(field) => w.line(format!(
                    "items = Array.from(new Map(items.map((item: any) => [item.{field}, item])).values());"
                )),
                None => w.line("items = Array.from(new Set(items));"),
            },
        }
    }

    fn write_output(&self, w: &mut CodeWriter) {
        match &self.selector.output {
            OutputShape::Array => w.line("return items;"),
            OutputShape::Single => w.line("return items.length > 0 ? items[0] : null;"),
            OutputShape::Aggregation { op, field, initial } => {
                w.line(format!(
                    "return {};",
                    aggregate_expr(*op, field.as_deref(), initial.as_ref())
                ));
            }
            OutputShape::Object { fields } => {
                w.open("return {");
                for field in fields {
                    w.line(format!(
                        "{}: {},",
                        field.name,
                        aggregate_expr(field.op, field.field.as_deref(), None)
                    ));
                }
                w.close("};");
            }
        }
    }
}

fn push_dep(deps: &mut Vec<String>, ident: &str) {
    if !deps.iter().any(|d| d == ident) {
        deps.push(ident.to_string());
    }
}

/// Parse a `container.field` slice path into a resolvable reference.
fn slice_value_ref(path: &str, descriptor: &str) -> Result<ValueRef> {
    let mut parts = path.splitn(2, '.');
    match (parts.next(), parts.next()) {
        (Some(container), Some(field)) if !container.is_empty() && !field.is_empty() => {
            Ok(ValueRef {
                container: container.to_string(),
                selector: field.to_string(),
            })
        }
        _ => Err(CompileError::validation(
            format!("selector '{descriptor}'"),
            format!("slice path '{path}' must be 'container.field'"),
        )),
    }
}

fn direct_read(accessor: &StateAccessor) -> String {
    match accessor {
        StateAccessor::Named { accessor, .. } => format!("{accessor}(state)"),
        StateAccessor::Inline { container, field } => format!("state.{container}.{field}"),
    }
}

/// JavaScript comparison for one pipeline filter, mirroring the
/// query-builder comparator table.
fn js_comparison(field: &str, operator: FilterOperator, rhs: &str) -> String {
    match operator {
        FilterOperator::Eq => format!("item.{field} === {rhs}"),
        FilterOperator::Neq => format!("item.{field} !== {rhs}"),
        FilterOperator::Gt => format!("item.{field} > {rhs}"),
        FilterOperator::Gte => format!("item.{field} >= {rhs}"),
        FilterOperator::Lt => format!("item.{field} < {rhs}"),
        FilterOperator::Lte => format!("item.{field} <= {rhs}"),
        FilterOperator::In => format!("{rhs}.includes(item.{field})"),
        FilterOperator::NotIn => format!("!{rhs}.includes(item.{field})"),
        FilterOperator::Contains => format!("String(item.{field}).includes({rhs})"),
        FilterOperator::StartsWith => format!("String(item.{field}).startsWith({rhs})"),
        FilterOperator::EndsWith => format!("String(item.{field}).endsWith({rhs})"),
        FilterOperator::IsNull => format!("item.{field} == null"),
        FilterOperator::IsNotNull => format!("item.{field} != null"),
    }
}

fn mapped_field_expr(field: &MappedField) -> String {
    match field {
        MappedField::Passthrough(name) => format!("{name}: item.{name}"),
        MappedField::Renamed { field, alias } => format!("{alias}: item.{field}"),
        MappedField::Computed {
            name,
            compute,
            args,
        } => {
            let reads: Vec<String> = args.iter().map(|a| format!("item.{a}")).collect();
            let expr = match compute {
                ComputeOp::Concat => format!("[{}].join(\" \")", reads.join(", ")),
                ComputeOp::Sum => reads.join(" + "),
                ComputeOp::Multiply => reads.join(" * "),
                ComputeOp::Format => format!(
                    "String({})",
                    reads.first().cloned().unwrap_or_else(|| "\"\"".to_string())
                ),
            };
            format!("{name}: {expr}")
        }
    }
}

fn aggregate_expr(op: AggregateOp, field: Option<&str>, initial: Option<&serde_json::Value>) -> String {
    let field = field.unwrap_or("value");
    let sum = format!("items.reduce((acc: number, item: any) => acc + (item.{field} ?? 0), 0)");
    match op {
        AggregateOp::Count => "items.length".to_string(),
        AggregateOp::Sum => sum,
        AggregateOp::Avg => format!("(items.length === 0 ? 0 : {sum} / items.length)"),
        AggregateOp::Min => format!(
            "(items.length > 0 ? Math.min(...items.map((item: any) => item.{field})) : null)"
        ),
        AggregateOp::Max => format!(
            "(items.length > 0 ? Math.max(...items.map((item: any) => item.{field})) : null)"
        ),
        AggregateOp::First => "(items.length > 0 ? items[0] : null)".to_string(),
        AggregateOp::Last => "(items.length > 0 ? items[items.length - 1] : null)".to_string(),
        AggregateOp::Reduce => format!(
            "items.reduce((acc: any, item: any) => acc + item.{field}, {})",
            initial.map(typemap::ts_literal).unwrap_or_else(|| "0".to_string())
        ),
    }
}

/// Compilation order for a batch of cross-source selectors: composed
/// selectors come before their dependents. Cycles are reported as errors
/// and their members are left out of the order; selectors composing a
/// cycle member later fail resolution instead of looping forever.
pub fn selector_order(selectors: &[CrossSourceSelector]) -> (Vec<usize>, Vec<CompileError>) {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Unvisited,
        InProgress,
        Done,
        Cyclic,
    }

    fn visit(
        i: usize,
        selectors: &[CrossSourceSelector],
        index: &BTreeMap<&str, usize>,
        marks: &mut [Mark],
        stack: &mut Vec<usize>,
        order: &mut Vec<usize>,
        errors: &mut Vec<CompileError>,
    ) {
        match marks[i] {
            Mark::Done | Mark::Cyclic => return,
            Mark::InProgress => {
                let start = stack.iter().position(|&s| s == i).unwrap_or(0);
                let mut path: Vec<String> = stack[start..]
                    .iter()
                    .map(|&s| selectors[s].name.clone())
                    .collect();
                path.push(selectors[i].name.clone());
                for &member in &stack[start..] {
                    marks[member] = Mark::Cyclic;
                }
                errors.push(CompileError::DependencyCycle { path });
                return;
            }
            Mark::Unvisited => {}
        }

        marks[i] = Mark::InProgress;
        stack.push(i);
        for dep in selectors[i].composed_selectors() {
            if let Some(&j) = index.get(dep) {
                visit(j, selectors, index, marks, stack, order, errors);
            }
        }
        stack.pop();

        if marks[i] == Mark::InProgress {
            marks[i] = Mark::Done;
            order.push(i);
        }
    }

    let index: BTreeMap<&str, usize> = selectors
        .iter()
        .enumerate()
        .map(|(i, s)| (s.name.as_str(), i))
        .collect();
    let mut marks = vec![Mark::Unvisited; selectors.len()];
    let mut stack = Vec::new();
    let mut order = Vec::new();
    let mut errors = Vec::new();

    for i in 0..selectors.len() {
        visit(
            i,
            selectors,
            &index,
            &mut marks,
            &mut stack,
            &mut order,
            &mut errors,
        );
    }
    (order, errors)
}
