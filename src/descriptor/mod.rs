//! # Descriptor Layer
//!
//! Validated, immutable data contracts describing what to generate.
//! Descriptors are produced once by the authoring layer, validated
//! against these types, then compiled; they carry no behavior beyond
//! accessors over their own shape.

mod collection;
mod field;
mod selector;
mod state;
mod table;

pub use collection::{
    CollectionDescriptor, CollectionSource, FieldSelection, FilterCondition, FilterOperator,
    FromEntry, JoinOn, JoinSpec, LiveQuery, MutationDescriptor, MutationKind, OnSuccess,
    QueryFrom, SortDirection, SortSpec, ValueRef,
};
pub use field::{FieldConstraints, FieldDescriptor, FieldType};
pub use selector::{
    AggregateOp, ComputeOp, CrossSourceSelector, InputSource, MappedField, OutputField,
    OutputShape, SelectorInput, TransformOperation,
};
pub use state::{
    AsyncOperation, Computation, ComputationOp, ParamComputation, ParamOp, ParamSpec,
    ReducerDescriptor, SelectorDescriptor, SelectorInputRef, StateContainerDescriptor, StateField,
    StatePrimitive, StateValueType,
};
pub use table::{IndexDescriptor, Relationship, RelationshipKind, TableDescriptor};
