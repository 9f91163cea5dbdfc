//! # Reference Resolution
//!
//! Cross-descriptor name resolution shared by the generators. The
//! context is built once per batch from the validated descriptors; the
//! only mutable part is the set of already-compiled cross-source
//! selectors, which grows as the Derived-State Compiler walks the
//! topological order and is read-only once a selector is resolved.

use crate::codegen::selector::Strategy;
use crate::descriptor::{
    CollectionDescriptor, LiveQuery, StateContainerDescriptor, TableDescriptor, ValueRef,
};
use crate::error::{CompileError, ReferenceKind, Result};
use crate::naming;
use std::collections::BTreeMap;

/// How a previously-compiled cross-source selector is consumed by later
/// selectors in the same batch.
#[derive(Debug, Clone)]
pub struct CompiledSelectorInfo {
    /// Exported identifier: `select<Name>` (pure) or `use<Name>` (hook).
    pub export: String,
    /// File stem under `selectors/`.
    pub file_stem: String,
    pub strategy: Strategy,
}

/// Accessor for a container-local value referenced from outside the
/// container: a declared selector by its qualified exported name, or a
/// direct state read when only a field exists.
#[derive(Debug, Clone)]
pub enum StateAccessor {
    Named {
        ident: String,
        accessor: String,
        container: String,
    },
    Inline {
        container: String,
        field: String,
    },
}

impl StateAccessor {
    /// Local binding identifier for the resolved value.
    pub fn ident(&self) -> &str {
        match self {
            Self::Named { ident, .. } => ident,
            Self::Inline { field, .. } => field,
        }
    }

    /// Expression usable where a `(state: RootState) => T` accessor is
    /// expected.
    pub fn expr(&self) -> String {
        match self {
            Self::Named { accessor, .. } => accessor.clone(),
            Self::Inline { container, field } => {
                format!("(state: RootState) => state.{container}.{field}")
            }
        }
    }

    /// Whether the expression reads `RootState` inline.
    pub fn is_inline(&self) -> bool {
        matches!(self, Self::Inline { .. })
    }
}

pub struct ResolveContext<'a> {
    tables: BTreeMap<&'a str, &'a TableDescriptor>,
    collections: BTreeMap<&'a str, &'a CollectionDescriptor>,
    containers: BTreeMap<&'a str, &'a StateContainerDescriptor>,
    global_queries: Vec<&'a LiveQuery>,
    compiled_selectors: BTreeMap<String, CompiledSelectorInfo>,
}

impl<'a> ResolveContext<'a> {
    pub fn new(
        tables: &[&'a TableDescriptor],
        collections: &[&'a CollectionDescriptor],
        containers: &[&'a StateContainerDescriptor],
        global_queries: &[&'a LiveQuery],
    ) -> Self {
        Self {
            tables: tables.iter().map(|t| (t.name.as_str(), *t)).collect(),
            collections: collections.iter().map(|c| (c.name.as_str(), *c)).collect(),
            containers: containers.iter().map(|c| (c.name.as_str(), *c)).collect(),
            global_queries: global_queries.to_vec(),
            compiled_selectors: BTreeMap::new(),
        }
    }

    pub fn table(&self, name: &str, descriptor: &str) -> Result<&'a TableDescriptor> {
        self.tables
            .get(name)
            .copied()
            .ok_or_else(|| CompileError::unresolved(descriptor, ReferenceKind::Table, name))
    }

    pub fn collection(&self, name: &str, descriptor: &str) -> Result<&'a CollectionDescriptor> {
        self.collections
            .get(name)
            .copied()
            .ok_or_else(|| CompileError::unresolved(descriptor, ReferenceKind::Collection, name))
    }

    pub fn container(&self, name: &str, descriptor: &str) -> Result<&'a StateContainerDescriptor> {
        self.containers
            .get(name)
            .copied()
            .ok_or_else(|| CompileError::unresolved(descriptor, ReferenceKind::Container, name))
    }

    /// Find a named live query: owned by the collection, or a global
    /// query anchored on it.
    pub fn live_query(
        &self,
        collection: &str,
        query: &str,
        descriptor: &str,
    ) -> Result<&'a LiveQuery> {
        let owned = self
            .collections
            .get(collection)
            .and_then(|c| c.live_queries.iter().find(|q| q.name == query));
        if let Some(found) = owned {
            return Ok(found);
        }
        self.global_queries
            .iter()
            .find(|q| q.name == query && q.from.primary_collection() == Some(collection))
            .copied()
            .ok_or_else(|| {
                CompileError::unresolved(
                    descriptor,
                    ReferenceKind::LiveQuery,
                    format!("{collection}.{query}"),
                )
            })
    }

    /// Global queries anchored on a collection, compiled into that
    /// collection's file.
    pub fn global_queries_for(&self, collection: &str) -> Vec<&'a LiveQuery> {
        self.global_queries
            .iter()
            .filter(|q| q.from.primary_collection() == Some(collection))
            .copied()
            .collect()
    }

    /// Resolve a `valueFrom` indirection (or a slice path) to a state
    /// accessor. Prefers a declared container selector; falls back to a
    /// direct field read.
    pub fn state_accessor(&self, value_ref: &ValueRef, descriptor: &str) -> Result<StateAccessor> {
        let container = self.container(&value_ref.container, descriptor)?;
        if container.selector(&value_ref.selector).is_some() {
            return Ok(StateAccessor::Named {
                ident: value_ref.selector.clone(),
                accessor: naming::container_selector_accessor(&container.name, &value_ref.selector),
                container: container.name.clone(),
            });
        }
        if container.field(&value_ref.selector).is_some() {
            return Ok(StateAccessor::Inline {
                container: container.name.clone(),
                field: value_ref.selector.clone(),
            });
        }
        Err(CompileError::unresolved(
            descriptor,
            ReferenceKind::ContainerField,
            format!("{}.{}", value_ref.container, value_ref.selector),
        ))
    }

    /// Record a compiled cross-source selector so later selectors in the
    /// topological order can compose it.
    pub fn register_selector(&mut self, name: impl Into<String>, info: CompiledSelectorInfo) {
        self.compiled_selectors.insert(name.into(), info);
    }

    pub fn compiled_selector(&self, name: &str, descriptor: &str) -> Result<&CompiledSelectorInfo> {
        self.compiled_selectors
            .get(name)
            .ok_or_else(|| CompileError::unresolved(descriptor, ReferenceKind::Selector, name))
    }
}
