//! State-container descriptors: local fields, reducers, async
//! operations, and container-local selectors.

use serde::{Deserialize, Serialize};

/// Primitive scalar usable in container state.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StatePrimitive {
    String,
    Number,
    Boolean,
}

/// Closed union of state value types.
///
/// JSON forms: `"string"`, `{"list": T}`, `{"arrayOf": "Order"}`,
/// `{"record": [K, V]}`, `{"nullable": T}`.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(untagged)]
pub enum StateValueType {
    Primitive(StatePrimitive),
    List {
        list: Box<StateValueType>,
    },
    EntityList {
        #[serde(rename = "arrayOf")]
        array_of: String,
    },
    Record {
        record: (StatePrimitive, Box<StateValueType>),
    },
    Nullable {
        nullable: Box<StateValueType>,
    },
}

/// One field of a container's state shape.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StateField {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: StateValueType,
    #[serde(default)]
    pub default: Option<serde_json::Value>,
}

impl StateField {
    /// Convention: `loading`/`isLoading` fields are driven by async
    /// operation lifecycles.
    pub fn is_loading_field(name: &str) -> bool {
        name == "loading" || name == "isLoading"
    }

    /// Convention: `error`-named fields carry async failure payloads.
    pub fn is_error_field(name: &str) -> bool {
        name == "error" || name.ends_with("Error")
    }
}

/// A synchronous state mutation. The `modifies` list is declarative
/// documentation; the compiler does not enforce it against the body.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReducerDescriptor {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub modifies: Vec<String>,
}

/// A network-backed async operation (thunk). The three field lists say
/// which state fields each lifecycle phase patches.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AsyncOperation {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub endpoint: String,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default)]
    pub on_pending: Vec<String>,
    #[serde(default)]
    pub on_fulfilled: Vec<String>,
    #[serde(default)]
    pub on_rejected: Vec<String>,
}

fn default_method() -> String {
    "GET".to_string()
}

/// Reference to another selector from a derived selector's input list:
/// a sibling by bare name, or a foreign container's selector.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(untagged)]
pub enum SelectorInputRef {
    Foreign { container: String, selector: String },
    Local(String),
}

impl SelectorInputRef {
    pub fn selector_name(&self) -> &str {
        match self {
            Self::Foreign { selector, .. } => selector,
            Self::Local(name) => name,
        }
    }
}

/// Single computation op applied by a derived container selector.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ComputationOp {
    Filter,
    Map,
    Find,
    Sort,
    Count,
    Sum,
    GroupBy,
    Combine,
    Identity,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Computation {
    pub op: ComputationOp,
    #[serde(default)]
    pub field: Option<String>,
    #[serde(default)]
    pub value: Option<serde_json::Value>,
}

/// Computation of a parameterized selector, applied to the base
/// selector's result once bound to runtime arguments.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ParamOp {
    Filter,
    Find,
    Includes,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ParamComputation {
    pub op: ParamOp,
    #[serde(default)]
    pub field: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ParamSpec {
    pub name: String,
}

/// Container-local selector.
///
/// Duck-typed in JSON; the untagged order below normalizes it into a
/// tagged sum at the deserialization boundary, with a bare `{name, path}`
/// object as the designated default (`Simple`) variant. The variant is
/// never re-inferred after this point.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(untagged)]
pub enum SelectorDescriptor {
    #[serde(rename_all = "camelCase")]
    Derived {
        name: String,
        #[serde(default)]
        description: String,
        inputs: Vec<SelectorInputRef>,
        computation: Computation,
    },
    #[serde(rename_all = "camelCase")]
    Parameterized {
        name: String,
        #[serde(default)]
        description: String,
        params: Vec<ParamSpec>,
        base_selector: String,
        computation: ParamComputation,
    },
    #[serde(rename_all = "camelCase")]
    Simple {
        name: String,
        #[serde(default)]
        description: String,
        path: String,
    },
}

impl SelectorDescriptor {
    pub fn name(&self) -> &str {
        match self {
            Self::Derived { name, .. }
            | Self::Parameterized { name, .. }
            | Self::Simple { name, .. } => name,
        }
    }
}

/// A named bundle of local state, mutations, async operations, and
/// selectors. `name` must be lowerCamel.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StateContainerDescriptor {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub initial_state: Vec<StateField>,
    #[serde(default)]
    pub reducers: Vec<ReducerDescriptor>,
    #[serde(default)]
    pub async_operations: Vec<AsyncOperation>,
    #[serde(default)]
    pub selectors: Vec<SelectorDescriptor>,
}

impl StateContainerDescriptor {
    pub fn field(&self, name: &str) -> Option<&StateField> {
        self.initial_state.iter().find(|f| f.name == name)
    }

    pub fn selector(&self, name: &str) -> Option<&SelectorDescriptor> {
        self.selectors.iter().find(|s| s.name() == name)
    }
}
