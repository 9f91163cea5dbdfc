//! Cross-source selector descriptors: the top-level derived-state unit.

use crate::descriptor::collection::{FilterOperator, SortDirection, ValueRef};
use serde::{Deserialize, Serialize};

/// Where one selector input draws from. Exactly one of the three kinds;
/// the mix across inputs decides the generation strategy.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(untagged)]
pub enum InputSource {
    /// A reactive collection, optionally bound to one of its named live
    /// queries.
    Collection {
        collection: String,
        #[serde(default)]
        query: Option<String>,
    },
    /// A `container.field` state path.
    Slice { slice: String },
    /// Another cross-source selector (composition).
    Selector { selector: String },
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct SelectorInput {
    pub name: String,
    #[serde(flatten)]
    pub source: InputSource,
}

/// Compute kinds for a mapped field.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ComputeOp {
    /// Join named args with a single space.
    Concat,
    /// Left-fold named args with `+`.
    Sum,
    /// Left-fold named args with `*`.
    Multiply,
    /// Stringify the first arg.
    Format,
}

/// One output field of a `map` operation: passthrough, rename, or a
/// computed field over named item fields.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(untagged)]
pub enum MappedField {
    Computed {
        name: String,
        compute: ComputeOp,
        args: Vec<String>,
    },
    Renamed {
        field: String,
        #[serde(rename = "as")]
        alias: String,
    },
    Passthrough(String),
}

/// One transform in a selector pipeline, applied left-to-right over a
/// single stream of items.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum TransformOperation {
    #[serde(rename_all = "camelCase")]
    Filter {
        field: String,
        operator: FilterOperator,
        #[serde(default)]
        value: Option<serde_json::Value>,
        #[serde(default)]
        value_from: Option<ValueRef>,
    },
    Map {
        fields: Vec<MappedField>,
    },
    Sort {
        field: String,
        #[serde(default)]
        direction: SortDirection,
    },
    Slice {
        #[serde(default)]
        start: Option<u64>,
        #[serde(default)]
        end: Option<u64>,
    },
    GroupBy {
        field: String,
    },
    /// Deduplicate: by field (last-seen item per distinct value wins) or
    /// by primitive identity when no field is given.
    Unique {
        #[serde(default)]
        field: Option<String>,
    },
}

/// Aggregations usable in output shaping.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AggregateOp {
    Count,
    Sum,
    Avg,
    Min,
    Max,
    First,
    Last,
    Reduce,
}

impl AggregateOp {
    /// Whether the aggregation reads a named field off each item.
    pub fn takes_field(self) -> bool {
        !matches!(self, Self::Count | Self::First | Self::Last)
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OutputField {
    pub name: String,
    pub op: AggregateOp,
    #[serde(default)]
    pub field: Option<String>,
}

/// Final output shaping, applied exactly once after the pipeline.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum OutputShape {
    Array,
    /// First element, or `null` when the pipeline result is empty.
    Single,
    Aggregation {
        op: AggregateOp,
        #[serde(default)]
        field: Option<String>,
        #[serde(default)]
        initial: Option<serde_json::Value>,
    },
    /// A keyed record with one named aggregation per output field.
    Object {
        fields: Vec<OutputField>,
    },
}

/// The top-level derived-state unit. `name` must match `^select[A-Z]\w*`.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CrossSourceSelector {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub inputs: Vec<SelectorInput>,
    #[serde(default)]
    pub pipeline: Vec<TransformOperation>,
    pub output: OutputShape,
    #[serde(default)]
    pub memoize: Option<bool>,
}

impl CrossSourceSelector {
    /// Names of other cross-source selectors this one composes.
    pub fn composed_selectors(&self) -> Vec<&str> {
        self.inputs
            .iter()
            .filter_map(|input| match &input.source {
                InputSource::Selector { selector } => Some(selector.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Selector references used as dynamic pipeline filter values, in
    /// pipeline order.
    pub fn pipeline_value_refs(&self) -> Vec<&ValueRef> {
        self.pipeline
            .iter()
            .filter_map(|op| match op {
                TransformOperation::Filter {
                    value_from: Some(value_ref),
                    ..
                } => Some(value_ref),
                _ => None,
            })
            .collect()
    }
}
