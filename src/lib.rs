//! # DASC (Declarative App Source Compiler)
//!
//! Production-ready compiler for transforming declarative JSON
//! descriptors of an application's data layer into runnable TypeScript
//! source files.
//!
//! DASC covers four descriptor families and the glue between them:
//! - Data tables: zod schema, structural interface, SQL DDL per table
//! - Reactive collections: server-synchronized setup plus chained live
//!   queries and optimistic mutation wrappers
//! - State containers: Redux-Toolkit slices with reducers, async
//!   operations, and exported accessors
//! - Cross-source selectors: derived state over any mix of the above,
//!   compiled to a pure memoized selector or a reactive hook
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use dasc::{compile, CompileInput};
//!
//! let json = std::fs::read_to_string("app.json")?;
//! let (input, parse_errors) = CompileInput::from_json(&json);
//!
//! let report = compile(&input);
//! for (path, source) in &report.files {
//!     println!("generated {path} ({} bytes)", source.len());
//! }
//! for error in parse_errors.iter().chain(&report.errors) {
//!     eprintln!("{error}");
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Architecture
//!
//! DASC follows a multi-phase compilation pipeline:
//!
//! 1. **Validation** - Structural checks; bad descriptors are dropped
//!    without affecting their siblings
//! 2. **Resolution** - Cross-descriptor references bind or fail loudly
//! 3. **Table Compilation** - One schema file per table
//! 4. **Collection Compilation** - Collection setups, live queries, and
//!    mutation wrappers
//! 5. **Container Compilation** - One slice file per state container
//! 6. **Derived-State Compilation** - Cross-source selectors in
//!    dependency order, each choosing its code shape
//! 7. **Assembly** - Store, provider, and per-directory barrels

pub mod assembly;
pub mod codegen;
pub mod compiler;
pub mod descriptor;
pub mod emit;
pub mod error;
pub mod naming;
pub mod resolve;
pub mod typemap;
pub mod validate;

// Re-export the main compilation API
pub use compiler::{
    compile, compile_collections, compile_containers, compile_selectors, compile_tables,
    parse_collection_batch, parse_container_batch, parse_selector_batch, parse_table_batch,
    CollectionBatch, CompileInput, CompileReport,
};

pub use codegen::Strategy;
pub use error::{CompileError, ReferenceKind, Result};

// Re-export descriptor types for convenience
pub use descriptor::{
    CollectionDescriptor, CrossSourceSelector, LiveQuery, MutationDescriptor,
    StateContainerDescriptor, TableDescriptor,
};
