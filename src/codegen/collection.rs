//! # Collection Compiler
//!
//! Compiles a [`CollectionDescriptor`] into a reactive-collection setup
//! plus one chained live-query expression per declared query, and each
//! [`MutationDescriptor`] into an optimistic write wrapper.

use crate::descriptor::{
    CollectionDescriptor, CollectionSource, FieldSelection, FilterCondition, FilterOperator,
    LiveQuery, MutationDescriptor, MutationKind, QueryFrom, SortDirection, TableDescriptor,
};
use crate::emit::{render_file, CodeWriter, ImportSet};
use crate::error::Result;
use crate::naming;
use crate::typemap;
use std::collections::BTreeSet;

const DB_MODULE: &str = "@tanstack/react-db";

/// Export identifier for a collection: `orders` -> `ordersCollection`.
pub fn collection_export(name: &str) -> String {
    if name.ends_with("Collection") {
        name.to_string()
    } else {
        format!("{name}Collection")
    }
}

pub struct CollectionGenerator<'a> {
    collection: &'a CollectionDescriptor,
    table: &'a TableDescriptor,
    /// Global queries anchored on this collection, appended after its own.
    global_queries: Vec<&'a LiveQuery>,
}

impl<'a> CollectionGenerator<'a> {
    pub fn new(
        collection: &'a CollectionDescriptor,
        table: &'a TableDescriptor,
        global_queries: Vec<&'a LiveQuery>,
    ) -> Self {
        Self {
            collection,
            table,
            global_queries,
        }
    }

    pub fn output_path(&self) -> String {
        format!("collections/{}.ts", self.collection.name)
    }

    pub fn generate(&self) -> Result<String> {
        tracing::debug!(
            "[CODEGEN] Generating collection setup for {}",
            self.collection.name
        );

        let mut imports = ImportSet::new();
        imports.named(DB_MODULE, "createCollection");
        let schema_module = format!("../schemas/{}", naming::table_file_stem(&self.table.name));
        imports.named(schema_module.as_str(), format!("{}Schema", self.table.name));
        imports.type_only(schema_module.as_str(), self.table.name.as_str());

        let mut w = CodeWriter::new();
        self.write_setup(&mut w, &mut imports);

        let queries: Vec<&LiveQuery> = self
            .collection
            .live_queries
            .iter()
            .chain(self.global_queries.iter().copied())
            .collect();
        if !queries.is_empty() {
            w.blank();
            w.line("// Live queries");
            imports.named(DB_MODULE, "createLiveQueryCollection");
            for query in queries {
                w.blank();
                write_live_query(&mut w, &mut imports, query, &self.collection.name);
            }
        }

        Ok(render_file(&imports, &w.finish()))
    }

    fn write_setup(&self, w: &mut CodeWriter, imports: &mut ImportSet) {
        let export = collection_export(&self.collection.name);
        let item = &self.table.name;
        let get_key = format!("(item: {item}) => item.{}", self.table.primary_key);

        if !self.collection.description.is_empty() {
            w.line(format!("/** {} */", self.collection.description));
        }
        match &self.collection.source {
            CollectionSource::Query {
                endpoint,
                query_key,
                poll_interval,
            } => {
                imports.named("@tanstack/query-db-collection", "queryCollectionOptions");
                imports.named("../provider", "queryClient");
                w.open(format!("export const {export} = createCollection("));
                w.open("queryCollectionOptions({");
                w.line(format!("queryKey: [\"{query_key}\"],"));
                w.open("queryFn: async () => {");
                w.line(format!("const response = await fetch(\"{endpoint}\");"));
                w.line(format!("return (await response.json()) as {item}[];"));
                w.close("},");
                w.line("queryClient,");
                w.line(format!("getKey: {get_key},"));
                w.line(format!("schema: {item}Schema,"));
                if let Some(interval) = poll_interval {
                    w.line(format!("refetchInterval: {interval},"));
                }
                w.close("})");
                w.close(");");
            }
            CollectionSource::ExternalSync { table, filter } => {
                imports.named("@tanstack/electric-db-collection", "electricCollectionOptions");
                w.open(format!("export const {export} = createCollection("));
                w.open("electricCollectionOptions({");
                w.open("shapeOptions: {");
                w.line("url: \"/sync/v1/shape\",");
                match filter {
                    Some(filter) => w.line(format!(
                        "params: {{ table: \"{table}\", where: {} }},",
                        typemap::ts_literal(&serde_json::Value::String(filter.clone()))
                    )),
                    None => w.line(format!("params: {{ table: \"{table}\" }},")),
                }
                w.close("},");
                w.line(format!("getKey: {get_key},"));
                w.line(format!("schema: {item}Schema,"));
                w.close("})");
                w.close(");");
            }
            CollectionSource::LocalPersisted { key } => {
                imports.named(DB_MODULE, "localStorageCollectionOptions");
                w.open(format!("export const {export} = createCollection("));
                w.open("localStorageCollectionOptions({");
                w.line(format!("storageKey: \"{key}\","));
                w.line(format!("getKey: {get_key},"));
                w.line(format!("schema: {item}Schema,"));
                w.close("})");
                w.close(");");
            }
            CollectionSource::Unknown => {
                imports.named(DB_MODULE, "localOnlyCollectionOptions");
                w.line("// NOTE: unsupported source type - emitting an empty local collection stub");
                w.open(format!("export const {export} = createCollection("));
                w.open("localOnlyCollectionOptions({");
                w.line(format!("getKey: {get_key},"));
                w.line(format!("schema: {item}Schema,"));
                w.close("})");
                w.close(");");
            }
        }
    }
}

/// Aliases in scope for a live query's callbacks.
fn query_aliases(query: &LiveQuery) -> Vec<String> {
    let mut aliases = match &query.from {
        QueryFrom::Collection(_) => vec!["item".to_string()],
        QueryFrom::Aliased(entries) => entries.iter().map(|e| e.alias.clone()).collect(),
    };
    for join in &query.joins {
        aliases.push(join.alias.clone().unwrap_or_else(|| join.collection.clone()));
    }
    aliases
}

fn scope_pattern(aliases: &[String]) -> String {
    format!("({{ {} }})", aliases.join(", "))
}

/// `status` -> `item.status`; dotted paths pass through untouched.
fn field_ref(field: &str, primary_alias: &str) -> String {
    if field.contains('.') {
        field.to_string()
    } else {
        format!("{primary_alias}.{field}")
    }
}

/// Render one `where` condition as a query-builder expression, mapping
/// the operator through the fixed comparator table. Returns the
/// expression and records the builder functions it needs.
fn builder_condition(
    condition: &FilterCondition,
    primary_alias: &str,
    ops_used: &mut BTreeSet<&'static str>,
) -> String {
    let lhs = field_ref(&condition.field, primary_alias);

    // valueFrom conditions reference a factory parameter, never a literal.
    let rhs = match (&condition.value_from, &condition.value) {
        (Some(value_ref), _) => value_ref.selector.clone(),
        (None, Some(value)) => typemap::ts_literal(value),
        (None, None) => String::new(),
    };
    let rhs_is_ref = condition.value_from.is_some();

    let pattern = |prefix: &str, suffix: &str| -> String {
        if rhs_is_ref {
            format!("`{prefix}${{{rhs}}}{suffix}`")
        } else {
            let raw = condition
                .value
                .as_ref()
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or_else(|| rhs.trim_matches('"').to_string());
            format!("\"{prefix}{raw}{suffix}\"")
        }
    };

    match condition.operator {
        FilterOperator::Eq => {
            ops_used.insert("eq");
            format!("eq({lhs}, {rhs})")
        }
        FilterOperator::Neq => {
            ops_used.insert("not");
            ops_used.insert("eq");
            format!("not(eq({lhs}, {rhs}))")
        }
        FilterOperator::Gt => {
            ops_used.insert("gt");
            format!("gt({lhs}, {rhs})")
        }
        FilterOperator::Gte => {
            ops_used.insert("gte");
            format!("gte({lhs}, {rhs})")
        }
        FilterOperator::Lt => {
            ops_used.insert("lt");
            format!("lt({lhs}, {rhs})")
        }
        FilterOperator::Lte => {
            ops_used.insert("lte");
            format!("lte({lhs}, {rhs})")
        }
        FilterOperator::In => {
            ops_used.insert("inArray");
            format!("inArray({lhs}, {rhs})")
        }
        FilterOperator::NotIn => {
            ops_used.insert("not");
            ops_used.insert("inArray");
            format!("not(inArray({lhs}, {rhs}))")
        }
        FilterOperator::Contains => {
            ops_used.insert("like");
            format!("like({lhs}, {})", pattern("%", "%"))
        }
        FilterOperator::StartsWith => {
            ops_used.insert("like");
            format!("like({lhs}, {})", pattern("", "%"))
        }
        FilterOperator::EndsWith => {
            ops_used.insert("like");
            format!("like({lhs}, {})", pattern("%", ""))
        }
        FilterOperator::IsNull => {
            ops_used.insert("isNull");
            format!("isNull({lhs})")
        }
        FilterOperator::IsNotNull => {
            ops_used.insert("not");
            ops_used.insert("isNull");
            format!("not(isNull({lhs}))")
        }
    }
}

fn write_live_query(
    w: &mut CodeWriter,
    imports: &mut ImportSet,
    query: &LiveQuery,
    owning_collection: &str,
) {
    let aliases = query_aliases(query);
    let primary_alias = aliases[0].clone();
    let scope = scope_pattern(&aliases);
    let mut ops_used: BTreeSet<&'static str> = BTreeSet::new();

    // Parameterized queries are templates: valueFrom bindings arrive at
    // call time once the referenced local state is available.
    let mut params: Vec<String> = Vec::new();
    for value_ref in query.value_refs() {
        if !params.contains(&value_ref.selector) {
            params.push(value_ref.selector.clone());
        }
    }

    if !query.description.is_empty() {
        w.line(format!("/** {} */", query.description));
    }
    if params.is_empty() {
        w.open(format!(
            "export const {} = createLiveQueryCollection((q) =>",
            query.name
        ));
    } else {
        let args: Vec<String> = params.iter().map(|p| format!("{p}: unknown")).collect();
        w.open(format!(
            "export const {} = ({}) =>",
            query.name,
            args.join(", ")
        ));
        w.open("createLiveQueryCollection((q) =>");
    }
    w.open("q");

    match &query.from {
        QueryFrom::Collection(name) => {
            let export = collection_export(name);
            if name != owning_collection {
                imports.named(format!("../collections/{name}"), export.clone());
            }
            w.line(format!(".from({{ {primary_alias}: {export} }})"));
        }
        QueryFrom::Aliased(entries) => {
            let bindings: Vec<String> = entries
                .iter()
                .map(|e| {
                    let export = collection_export(&e.collection);
                    if e.collection != owning_collection {
                        imports.named(format!("../collections/{}", e.collection), export.clone());
                    }
                    format!("{}: {export}", e.alias)
                })
                .collect();
            w.line(format!(".from({{ {} }})", bindings.join(", ")));
        }
    }

    for join in &query.joins {
        let alias = join.alias.clone().unwrap_or_else(|| join.collection.clone());
        let export = collection_export(&join.collection);
        if join.collection != owning_collection {
            imports.named(format!("../collections/{}", join.collection), export.clone());
        }
        ops_used.insert("eq");
        let left = field_ref(&join.on.left, &primary_alias);
        let right = field_ref(&join.on.right, &alias);
        w.line(format!(
            ".join({{ {alias}: {export} }}, {scope} => eq({left}, {right}))"
        ));
    }

    for condition in &query.conditions {
        if let Some(value_ref) = &condition.value_from {
            w.line(format!(
                "// valueFrom: {}.{}",
                value_ref.container, value_ref.selector
            ));
        }
        let expr = builder_condition(condition, &primary_alias, &mut ops_used);
        w.line(format!(".where({scope} => {expr})"));
    }

    if !query.select.is_empty() {
        let fields: Vec<String> = query
            .select
            .iter()
            .map(|selection: &FieldSelection| {
                format!(
                    "{}: {}",
                    selection.output_name(),
                    field_ref(selection.source_field(), &primary_alias)
                )
            })
            .collect();
        w.line(format!(".select({scope} => ({{ {} }}))", fields.join(", ")));
    }

    for sort in &query.order_by {
        let direction = match sort.direction {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        };
        w.line(format!(
            ".orderBy({scope} => {}, \"{direction}\")",
            field_ref(&sort.field, &primary_alias)
        ));
    }
    if let Some(limit) = query.limit {
        w.line(format!(".limit({limit})"));
    }
    if let Some(offset) = query.offset {
        w.line(format!(".offset({offset})"));
    }

    w.dedent();
    if params.is_empty() {
        w.close(");");
    } else {
        w.close(");");
        w.dedent();
    }

    for op in ops_used {
        imports.named(DB_MODULE, op);
    }
}

pub struct MutationGenerator<'a> {
    mutation: &'a MutationDescriptor,
    table: &'a TableDescriptor,
}

impl<'a> MutationGenerator<'a> {
    pub fn new(mutation: &'a MutationDescriptor, table: &'a TableDescriptor) -> Self {
        Self { mutation, table }
    }

    pub fn output_path(&self) -> String {
        format!("mutations/{}.ts", self.mutation.name)
    }

    pub fn generate(&self) -> Result<String> {
        let mutation = self.mutation;
        let item = &self.table.name;
        let export = collection_export(&mutation.collection);
        let schema_module = format!("../schemas/{}", naming::table_file_stem(&self.table.name));

        let mut imports = ImportSet::new();
        imports.named(
            format!("../collections/{}", mutation.collection),
            export.clone(),
        );
        imports.named("../provider", "queryClient");

        let pk = &self.table.primary_key;
        let pk_ts = typemap::ts_type(self.table.primary_key_field().ty);

        let (arg, arg_ty, returns) = match mutation.kind {
            MutationKind::Insert => ("input", format!("New{item}"), format!("Promise<{item}>")),
            MutationKind::Update => ("input", format!("{item}Update"), format!("Promise<{item}>")),
            MutationKind::Delete => ("id", pk_ts.to_string(), "Promise<void>".to_string()),
        };
        match mutation.kind {
            MutationKind::Insert => {
                imports.type_only(schema_module.as_str(), format!("New{item}"));
                imports.type_only(schema_module.as_str(), item.as_str());
            }
            MutationKind::Update => {
                imports.type_only(schema_module.as_str(), format!("{item}Update"));
                imports.type_only(schema_module.as_str(), item.as_str());
            }
            MutationKind::Delete => {}
        }

        let mut w = CodeWriter::new();
        if !mutation.description.is_empty() {
            w.line(format!("/** {} */", mutation.description));
        }
        w.open(format!(
            "export async function {}({arg}: {arg_ty}): {returns} {{",
            mutation.name
        ));

        if mutation.optimistic {
            w.line("// Optimistic local write, reconciled by the sync layer.");
            match mutation.kind {
                MutationKind::Insert => w.line(format!("{export}.insert({arg} as {item});")),
                MutationKind::Update => w.line(format!(
                    "{export}.update({arg}.{pk}, (draft) => Object.assign(draft, {arg}));"
                )),
                MutationKind::Delete => w.line(format!("{export}.delete({arg});")),
            }
        }

        w.open(format!("const response = await fetch(\"{}\", {{", mutation.endpoint));
        w.line(format!("method: \"{}\",", mutation.method));
        w.line("headers: { \"Content-Type\": \"application/json\" },");
        match mutation.kind {
            MutationKind::Delete => w.line(format!("body: JSON.stringify({{ {pk}: {arg} }}),")),
            _ => w.line(format!("body: JSON.stringify({arg}),")),
        }
        w.close("});");

        w.open("if (!response.ok) {");
        w.line(format!(
            "throw new Error(`{} failed: ${{response.status}}`);",
            mutation.name
        ));
        w.close("}");

        if !matches!(mutation.kind, MutationKind::Delete) {
            w.line(format!("const result = (await response.json()) as {item};"));
        }

        if let Some(on_success) = &mutation.on_success {
            for key in &on_success.invalidate {
                w.line(format!(
                    "await queryClient.invalidateQueries({{ queryKey: [\"{key}\"] }});"
                ));
            }
            for key in &on_success.refetch {
                w.line(format!(
                    "await queryClient.refetchQueries({{ queryKey: [\"{key}\"] }});"
                ));
            }
        }

        if !matches!(mutation.kind, MutationKind::Delete) {
            w.line("return result;");
        }
        w.close("}");

        Ok(render_file(&imports, &w.finish()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn order_table() -> TableDescriptor {
        serde_json::from_value(json!({
            "name": "Order",
            "columns": [
                { "name": "status", "type": "string" },
                { "name": "total", "type": "number" }
            ]
        }))
        .unwrap()
    }

    fn orders_collection(source: serde_json::Value) -> CollectionDescriptor {
        serde_json::from_value(json!({
            "name": "orders",
            "schema": "Order",
            "source": source,
            "liveQueries": [{
                "name": "openOrders",
                "from": "orders",
                "where": [{ "field": "status", "operator": "eq", "value": "open" }],
                "orderBy": [{ "field": "total", "direction": "desc" }],
                "limit": 20
            }]
        }))
        .unwrap()
    }

    #[test]
    fn query_source_emits_fetch_backed_collection() {
        let table = order_table();
        let collection = orders_collection(json!({
            "type": "query",
            "endpoint": "/api/orders",
            "queryKey": "orders",
            "pollInterval": 30000
        }));
        let source = CollectionGenerator::new(&collection, &table, Vec::new())
            .generate()
            .unwrap();
        assert!(source.contains("export const ordersCollection = createCollection("));
        assert!(source.contains("queryKey: [\"orders\"],"));
        assert!(source.contains("const response = await fetch(\"/api/orders\");"));
        assert!(source.contains("getKey: (item: Order) => item.id,"));
        assert!(source.contains("refetchInterval: 30000,"));
    }

    #[test]
    fn live_query_chains_in_fixed_order() {
        let table = order_table();
        let collection = orders_collection(json!({
            "type": "localPersisted",
            "key": "app.orders"
        }));
        let source = CollectionGenerator::new(&collection, &table, Vec::new())
            .generate()
            .unwrap();

        let from = source.find(".from({ item: ordersCollection })").unwrap();
        let where_pos = source
            .find(".where(({ item }) => eq(item.status, \"open\"))")
            .unwrap();
        let order_pos = source
            .find(".orderBy(({ item }) => item.total, \"desc\")")
            .unwrap();
        let limit = source.find(".limit(20)").unwrap();
        assert!(from < where_pos && where_pos < order_pos && order_pos < limit);
    }

    #[test]
    fn value_from_query_becomes_a_factory() {
        let table = order_table();
        let collection: CollectionDescriptor = serde_json::from_value(json!({
            "name": "orders",
            "schema": "Order",
            "source": { "type": "externalSync", "table": "orders" },
            "liveQueries": [{
                "name": "ordersByStatus",
                "from": "orders",
                "where": [{
                    "field": "status",
                    "operator": "eq",
                    "valueFrom": { "container": "ui", "selector": "selectedStatus" }
                }]
            }]
        }))
        .unwrap();
        let source = CollectionGenerator::new(&collection, &table, Vec::new())
            .generate()
            .unwrap();
        assert!(source.contains("export const ordersByStatus = (selectedStatus: unknown) =>"));
        assert!(source.contains("// valueFrom: ui.selectedStatus"));
        assert!(source.contains("eq(item.status, selectedStatus)"));
        // The reference is a template parameter, not an inlined literal.
        assert!(!source.contains("eq(item.status, \"selectedStatus\")"));
    }

    #[test]
    fn unknown_source_soft_degrades_to_stub() {
        let table = order_table();
        let collection: CollectionDescriptor = serde_json::from_value(json!({
            "name": "orders",
            "schema": "Order",
            "source": { "type": "grpcFeed" }
        }))
        .unwrap();
        let source = CollectionGenerator::new(&collection, &table, Vec::new())
            .generate()
            .unwrap();
        assert!(source.contains("unsupported source type"));
        assert!(source.contains("localOnlyCollectionOptions"));
    }

    #[test]
    fn insert_mutation_is_optimistic_and_invalidates() {
        let table = order_table();
        let mutation: MutationDescriptor = serde_json::from_value(json!({
            "name": "createOrder",
            "collection": "orders",
            "type": "insert",
            "endpoint": "/api/orders",
            "method": "POST",
            "onSuccess": { "invalidate": ["orders"] }
        }))
        .unwrap();
        let source = MutationGenerator::new(&mutation, &table).generate().unwrap();
        assert!(source.contains("export async function createOrder(input: NewOrder): Promise<Order> {"));
        assert!(source.contains("ordersCollection.insert(input as Order);"));
        assert!(source.contains("method: \"POST\","));
        assert!(source.contains("await queryClient.invalidateQueries({ queryKey: [\"orders\"] });"));
    }

    #[test]
    fn non_optimistic_delete_skips_local_write() {
        let table = order_table();
        let mutation: MutationDescriptor = serde_json::from_value(json!({
            "name": "deleteOrder",
            "collection": "orders",
            "type": "delete",
            "endpoint": "/api/orders",
            "method": "DELETE",
            "optimistic": false
        }))
        .unwrap();
        let source = MutationGenerator::new(&mutation, &table).generate().unwrap();
        assert!(source.contains("export async function deleteOrder(id: string): Promise<void> {"));
        assert!(!source.contains("ordersCollection.delete(id);"));
    }
}
