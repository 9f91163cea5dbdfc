//! Collection descriptors: reactive collections, live queries, mutations.

use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

/// Where a reactive collection's rows come from.
///
/// Unknown source kinds deserialize to [`CollectionSource::Unknown`] and
/// degrade to an empty-collection stub at generation time instead of
/// failing, so newer source kinds never break older compilers.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum CollectionSource {
    /// Endpoint fetch keyed by a query key, with optional polling.
    #[serde(rename_all = "camelCase")]
    Query {
        endpoint: String,
        query_key: String,
        #[serde(default)]
        poll_interval: Option<u64>,
    },
    /// Server-synchronized remote table, optionally filtered server-side.
    #[serde(rename_all = "camelCase")]
    ExternalSync {
        table: String,
        #[serde(default)]
        filter: Option<String>,
    },
    /// Namespaced key in the local persisted store.
    #[serde(rename_all = "camelCase")]
    LocalPersisted { key: String },
    #[serde(other)]
    Unknown,
}

/// Comparison operators usable in live-query conditions and pipeline
/// filters. Mapped through fixed tables to query-builder calls and to
/// per-item JS tests.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum FilterOperator {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    NotIn,
    Contains,
    StartsWith,
    EndsWith,
    IsNull,
    IsNotNull,
}

impl FilterOperator {
    /// Whether the operator compares against a value at all.
    pub fn takes_value(self) -> bool {
        !matches!(self, Self::IsNull | Self::IsNotNull)
    }
}

/// Indirection from a condition value to a container selector, resolved
/// at generation time to a runtime reference rather than a literal.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ValueRef {
    pub container: String,
    pub selector: String,
}

/// One `where` condition. Exactly one of `value`/`valueFrom` must be set
/// for value-taking operators; neither for `isNull`/`isNotNull`.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FilterCondition {
    pub field: String,
    pub operator: FilterOperator,
    #[serde(default)]
    pub value: Option<serde_json::Value>,
    #[serde(default)]
    pub value_from: Option<ValueRef>,
}

/// Projection entry: a bare field name or a rename.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(untagged)]
pub enum FieldSelection {
    Renamed {
        field: String,
        #[serde(rename = "as")]
        alias: String,
    },
    Field(String),
}

impl FieldSelection {
    pub fn output_name(&self) -> &str {
        match self {
            Self::Renamed { alias, .. } => alias,
            Self::Field(name) => name,
        }
    }

    pub fn source_field(&self) -> &str {
        match self {
            Self::Renamed { field, .. } => field,
            Self::Field(name) => name,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SortSpec {
    pub field: String,
    #[serde(default)]
    pub direction: SortDirection,
}

/// The base of a live query: one collection, or several with aliases.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(untagged)]
pub enum QueryFrom {
    Collection(String),
    Aliased(Vec<FromEntry>),
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FromEntry {
    pub collection: String,
    pub alias: String,
}

impl QueryFrom {
    /// The collection the query is anchored on.
    pub fn primary_collection(&self) -> Option<&str> {
        match self {
            Self::Collection(name) => Some(name),
            Self::Aliased(entries) => entries.first().map(|e| e.collection.as_str()),
        }
    }
}

/// Equi-join against another collection.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JoinSpec {
    pub collection: String,
    #[serde(default)]
    pub alias: Option<String>,
    pub on: JoinOn,
}

/// Join condition; both sides are `alias.field` paths.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JoinOn {
    pub left: String,
    pub right: String,
}

/// A named, immutable query expression over one or more collections.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LiveQuery {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub from: QueryFrom,
    #[serde(default)]
    pub joins: Vec<JoinSpec>,
    #[serde(default, rename = "where")]
    pub conditions: Vec<FilterCondition>,
    #[serde(default)]
    pub select: Vec<FieldSelection>,
    #[serde(default)]
    pub order_by: Vec<SortSpec>,
    #[serde(default)]
    pub limit: Option<u64>,
    #[serde(default)]
    pub offset: Option<u64>,
}

impl LiveQuery {
    /// Selector references supplying condition values at call time, in
    /// declaration order. Non-empty means the query compiles to a factory.
    pub fn value_refs(&self) -> Vec<&ValueRef> {
        self.conditions
            .iter()
            .filter_map(|c| c.value_from.as_ref())
            .collect()
    }
}

/// A reactive collection bound to a table schema.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CollectionDescriptor {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Name of the [`TableDescriptor`](crate::descriptor::TableDescriptor)
    /// whose schema this collection carries.
    pub schema: String,
    pub source: CollectionSource,
    #[serde(default)]
    pub live_queries: Vec<LiveQuery>,
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MutationKind {
    Insert,
    Update,
    Delete,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct OnSuccess {
    pub invalidate: Vec<String>,
    pub refetch: Vec<String>,
}

/// A write against a collection, optimistic by default.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MutationDescriptor {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub collection: String,
    #[serde(rename = "type")]
    pub kind: MutationKind,
    pub endpoint: String,
    pub method: String,
    #[serde(default = "default_true")]
    pub optimistic: bool,
    #[serde(default)]
    pub on_success: Option<OnSuccess>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unknown_source_kind_soft_degrades() {
        let source: CollectionSource =
            serde_json::from_value(json!({ "type": "webhookFeed" })).unwrap();
        assert_eq!(source, CollectionSource::Unknown);
    }

    #[test]
    fn live_query_from_accepts_both_shapes() {
        let bare: QueryFrom = serde_json::from_value(json!("orders")).unwrap();
        assert_eq!(bare.primary_collection(), Some("orders"));

        let aliased: QueryFrom = serde_json::from_value(json!([
            { "collection": "orders", "alias": "o" },
            { "collection": "customers", "alias": "c" }
        ]))
        .unwrap();
        assert_eq!(aliased.primary_collection(), Some("orders"));
    }

    #[test]
    fn value_from_condition_parses() {
        let query: LiveQuery = serde_json::from_value(json!({
            "name": "ordersByStatus",
            "from": "orders",
            "where": [{
                "field": "status",
                "operator": "eq",
                "valueFrom": { "container": "ui", "selector": "selectedStatus" }
            }]
        }))
        .unwrap();
        let refs = query.value_refs();
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].container, "ui");
    }

    #[test]
    fn mutation_optimistic_defaults_true() {
        let mutation: MutationDescriptor = serde_json::from_value(json!({
            "name": "createOrder",
            "collection": "orders",
            "type": "insert",
            "endpoint": "/api/orders",
            "method": "POST"
        }))
        .unwrap();
        assert!(mutation.optimistic);
        assert_eq!(mutation.kind, MutationKind::Insert);
    }
}
