//! End-to-end compilation tests: full descriptor batches in, generated
//! TypeScript out.

use dasc::{compile, CompileError, CompileInput, ReferenceKind};
use serde_json::json;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn app_input() -> CompileInput {
    serde_json::from_value(json!({
        "tables": [{
            "name": "Order",
            "description": "Customer orders",
            "columns": [
                {
                    "name": "status",
                    "type": "string",
                    "constraints": { "enum": ["open", "shipped", "closed"] }
                },
                { "name": "customerId", "type": "uuid" },
                { "name": "total", "type": "number", "constraints": { "min": 0 } }
            ],
            "indexes": [{ "columns": ["status"] }],
            "timestamps": true
        }],
        "collections": [{
            "name": "orders",
            "schema": "Order",
            "source": { "type": "externalSync", "table": "orders" },
            "liveQueries": [
                {
                    "name": "openOrders",
                    "from": "orders",
                    "where": [{ "field": "status", "operator": "eq", "value": "open" }],
                    "orderBy": [{ "field": "total", "direction": "desc" }]
                },
                {
                    "name": "ordersByStatus",
                    "from": "orders",
                    "where": [{
                        "field": "status",
                        "operator": "eq",
                        "valueFrom": { "container": "ui", "selector": "selectedStatus" }
                    }]
                }
            ]
        }],
        "mutations": [{
            "name": "createOrder",
            "collection": "orders",
            "type": "insert",
            "endpoint": "/api/orders",
            "method": "POST",
            "onSuccess": { "invalidate": ["orders"] }
        }],
        "containers": [{
            "name": "ui",
            "initialState": [
                { "name": "selectedStatus", "type": { "nullable": "string" } },
                { "name": "limit", "type": "number", "default": 50 }
            ],
            "reducers": [{ "name": "setSelectedStatus", "modifies": ["selectedStatus"] }],
            "selectors": [{ "name": "selectedStatus", "path": "selectedStatus" }]
        }],
        "selectors": [
            {
                "name": "selectFilteredOrders",
                "inputs": [
                    { "name": "orders", "collection": "orders", "query": "ordersByStatus" },
                    { "name": "limit", "slice": "ui.limit" }
                ],
                "pipeline": [
                    { "op": "sort", "field": "total", "direction": "desc" },
                    { "op": "unique", "field": "customerId" }
                ],
                "output": { "type": "array" }
            },
            {
                "name": "selectStatusLabel",
                "inputs": [{ "name": "selectedStatus", "slice": "ui.selectedStatus" }],
                "output": { "type": "single" }
            }
        ]
    }))
    .unwrap()
}

#[test]
fn full_app_compiles_cleanly() {
    init_tracing();
    let report = compile(&app_input());
    assert!(report.is_clean(), "unexpected errors: {:?}", report.errors);

    for path in [
        "schemas/order.ts",
        "schemas/index.ts",
        "collections/orders.ts",
        "collections/index.ts",
        "mutations/createOrder.ts",
        "mutations/index.ts",
        "containers/ui.ts",
        "containers/index.ts",
        "selectors/filteredOrders.ts",
        "selectors/statusLabel.ts",
        "selectors/index.ts",
        "store.ts",
        "provider.tsx",
    ] {
        assert!(report.files.contains_key(path), "missing {path}");
    }
}

#[test]
fn table_field_order_is_identical_across_representations() {
    init_tracing();
    let report = compile(&app_input());
    let schema = &report.files["schemas/order.ts"];

    let order = ["status", "customerId", "total", "id", "createdAt", "updatedAt"];
    for section_start in ["OrderSchema = z.object({", "export interface Order {"] {
        let section = &schema[schema.find(section_start).unwrap()..];
        let mut last = 0;
        for field in order {
            let pos = section.find(&format!("{field}:")).unwrap();
            assert!(pos > last || last == 0, "{field} out of order");
            last = pos;
        }
    }
    assert!(schema.contains("CREATE TABLE IF NOT EXISTS \"order\" ("));
    assert!(schema.contains("CHECK (\"status\" IN ('open', 'shipped', 'closed'))"));
}

#[test]
fn container_defaults_follow_declared_then_type_table() {
    init_tracing();
    let report = compile(&app_input());
    let container = &report.files["containers/ui.ts"];
    assert!(container.contains("selectedStatus: null,"));
    assert!(container.contains("limit: 50,"));
    assert!(container.contains(
        "export const selectUiSelectedStatus = (state: RootState) => state.ui.selectedStatus;"
    ));
}

#[test]
fn mixed_input_selector_becomes_a_hook_with_full_dependency_list() {
    init_tracing();
    let report = compile(&app_input());
    let hook = &report.files["selectors/filteredOrders.ts"];

    assert!(hook.contains("export function useFilteredOrders() {"));
    assert!(hook.contains("const selectedStatus = useSelector(selectUiSelectedStatus);"));
    assert!(hook.contains(
        "const ordersQuery = useMemo(() => ordersByStatus(selectedStatus), [selectedStatus]);"
    ));
    assert!(hook.contains("const { data: orders } = useLiveQuery(ordersQuery);"));
    // Every bound input appears in the recompute key list.
    assert!(hook.contains("}, [selectedStatus, orders, limit]);"));
    // Stable sort emission copies before sorting.
    assert!(hook.contains("[...items].sort((a: any, b: any) =>"));
    // Keyed dedupe keeps one item per customer.
    assert!(hook.contains("new Map(items.map((item: any) => [item.customerId, item]))"));
}

#[test]
fn all_slice_selector_stays_pure() {
    init_tracing();
    let report = compile(&app_input());
    let pure = &report.files["selectors/statusLabel.ts"];
    assert!(pure.contains("export const selectStatusLabel = createSelector("));
    assert!(!pure.contains("useLiveQuery"));
    assert!(!pure.contains("useMemo"));
}

#[test]
fn pure_single_output_guards_a_null_slice_seed() {
    init_tracing();
    let report = compile(&app_input());
    // ui.selectedStatus defaults to null; the seed must not reach
    // `.length` unguarded.
    let pure = &report.files["selectors/statusLabel.ts"];
    assert!(pure.contains("let items: any = selectedStatus ?? [];"));
    assert!(pure.contains("return items.length > 0 ? items[0] : null;"));
}

#[test]
fn applying_unique_twice_emits_the_same_dedupe_both_times() {
    init_tracing();
    let mut input = app_input();
    input.selectors.extend(
        serde_json::from_value::<Vec<dasc::CrossSourceSelector>>(json!([
            {
                "name": "selectDistinctCustomers",
                "inputs": [{ "name": "orders", "collection": "orders" }],
                "pipeline": [
                    { "op": "unique", "field": "customerId" },
                    { "op": "unique", "field": "customerId" }
                ],
                "output": { "type": "array" }
            },
            {
                "name": "selectDistinctValues",
                "inputs": [{ "name": "orders", "collection": "orders" }],
                "pipeline": [{ "op": "unique" }, { "op": "unique" }],
                "output": { "type": "array" }
            }
        ]))
        .unwrap(),
    );
    let report = compile(&input);
    assert!(report.is_clean(), "unexpected errors: {:?}", report.errors);

    // The keyed form keeps one item per key, so a second pass is a
    // no-op; both passes emit the identical statement.
    let keyed = &report.files["selectors/distinctCustomers.ts"];
    let map_line =
        "items = Array.from(new Map(items.map((item: any) => [item.customerId, item])).values());";
    assert_eq!(keyed.matches(map_line).count(), 2);

    let unkeyed = &report.files["selectors/distinctValues.ts"];
    let set_line = "items = Array.from(new Set(items));";
    assert_eq!(unkeyed.matches(set_line).count(), 2);
}

#[test]
fn adding_a_collection_input_flips_the_strategy() {
    init_tracing();
    let mut input = app_input();
    input.selectors[1]
        .inputs
        .push(serde_json::from_value(json!({ "name": "orders", "collection": "orders" })).unwrap());
    let report = compile(&input);
    let flipped = &report.files["selectors/statusLabel.ts"];
    assert!(flipped.contains("export function useStatusLabel() {"));
    assert!(!flipped.contains("createSelector"));
}

#[test]
fn composed_selectors_compile_in_dependency_order() {
    init_tracing();
    let mut input = app_input();
    input.selectors.insert(
        0,
        serde_json::from_value(json!({
            "name": "selectOrderCount",
            "inputs": [{ "name": "filtered", "selector": "selectFilteredOrders" }],
            "output": { "type": "aggregation", "op": "count" }
        }))
        .unwrap(),
    );
    let report = compile(&input);
    assert!(report.is_clean(), "unexpected errors: {:?}", report.errors);

    // The dependent compiled after its dependency and composes it as a
    // hook, even though it appeared first in the batch.
    let count = &report.files["selectors/orderCount.ts"];
    assert!(count.contains("export function useOrderCount() {"));
    assert!(count.contains("import { useFilteredOrders } from \"./filteredOrders\";"));
    assert!(count.contains("const filtered = useFilteredOrders();"));
    assert!(count.contains("return items.length;"));
}

#[test]
fn selector_cycles_are_rejected_without_poisoning_the_batch() {
    init_tracing();
    let mut input = app_input();
    input.selectors.extend(
        serde_json::from_value::<Vec<dasc::CrossSourceSelector>>(json!([
            {
                "name": "selectLoopA",
                "inputs": [{ "name": "b", "selector": "selectLoopB" }],
                "output": { "type": "array" }
            },
            {
                "name": "selectLoopB",
                "inputs": [{ "name": "a", "selector": "selectLoopA" }],
                "output": { "type": "array" }
            }
        ]))
        .unwrap(),
    );
    let report = compile(&input);

    assert!(report
        .errors
        .iter()
        .any(|e| matches!(e, CompileError::DependencyCycle { .. })));
    assert!(!report.files.contains_key("selectors/loopA.ts"));
    assert!(!report.files.contains_key("selectors/loopB.ts"));
    // The rest of the batch still compiled.
    assert!(report.files.contains_key("selectors/filteredOrders.ts"));
}

#[test]
fn unresolved_references_abort_only_the_referencing_descriptor() {
    init_tracing();
    let mut input = app_input();
    input.selectors.push(
        serde_json::from_value(json!({
            "name": "selectGhostRows",
            "inputs": [{ "name": "rows", "collection": "ghosts" }],
            "output": { "type": "array" }
        }))
        .unwrap(),
    );
    let report = compile(&input);

    assert!(report.errors.iter().any(|e| matches!(
        e,
        CompileError::UnresolvedReference {
            kind: ReferenceKind::Collection,
            ..
        }
    )));
    assert!(!report.files.contains_key("selectors/ghostRows.ts"));
    assert!(report.files.contains_key("selectors/filteredOrders.ts"));
}

#[test]
fn store_wires_reducers_and_provider_owns_the_query_client() {
    init_tracing();
    let report = compile(&app_input());

    let store = &report.files["store.ts"];
    assert!(store.contains("import uiReducer from \"./containers/ui\";"));
    assert!(store.contains("ui: uiReducer,"));
    assert!(store.contains("export type RootState = ReturnType<typeof store.getState>;"));

    let provider = &report.files["provider.tsx"];
    assert!(provider.contains("export const queryClient = new QueryClient();"));

    let collection = &report.files["collections/orders.ts"];
    assert!(collection.contains("electricCollectionOptions({"));
    assert!(collection.contains("export const ordersByStatus = (selectedStatus: unknown) =>"));

    let mutation = &report.files["mutations/createOrder.ts"];
    assert!(mutation.contains("ordersCollection.insert(input as Order);"));
    assert!(mutation.contains("await queryClient.invalidateQueries({ queryKey: [\"orders\"] });"));
}

#[test]
fn json_front_door_tolerates_malformed_elements() {
    init_tracing();
    let (input, errors) = CompileInput::from_json(
        r#"{
            "tables": [
                { "name": "Order", "columns": [{ "name": "status", "type": "string" }] },
                { "name": "Broken", "columns": 42 }
            ],
            "containers": [
                { "name": "ui", "initialState": [{ "name": "open", "type": "boolean" }] }
            ]
        }"#,
    );
    assert_eq!(errors.len(), 1);
    assert!(matches!(errors[0], CompileError::Malformed { .. }));
    assert_eq!(input.tables.len(), 1);
    assert_eq!(input.containers.len(), 1);

    let report = compile(&input);
    assert!(report.files.contains_key("schemas/order.ts"));
    assert!(report.files.contains_key("containers/ui.ts"));
}

#[test]
fn every_generated_file_carries_the_header() {
    init_tracing();
    let report = compile(&app_input());
    for (path, source) in &report.files {
        assert!(
            source.starts_with("// Auto-generated by DASC"),
            "{path} is missing the header"
        );
    }
}
