//! # Code Generation
//!
//! One generator per descriptor kind, all rendering TypeScript through
//! [`CodeWriter`](crate::emit::CodeWriter)/[`ImportSet`](crate::emit::ImportSet).

pub mod collection;
pub mod container;
pub mod selector;
pub mod table;

pub use collection::{CollectionGenerator, MutationGenerator};
pub use container::ContainerGenerator;
pub use selector::{selector_order, SelectorGenerator, Strategy};
pub use table::TableGenerator;
