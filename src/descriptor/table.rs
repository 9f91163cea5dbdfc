//! Table descriptors: the persisted data model.

use crate::descriptor::field::{FieldDescriptor, FieldType};
use serde::{Deserialize, Serialize};

fn default_primary_key() -> String {
    "id".to_string()
}

/// Declared relationship between tables. Advisory metadata for the
/// storage definition; not used for query planning.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum RelationshipKind {
    HasOne,
    HasMany,
    BelongsTo,
    ManyToMany,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Relationship {
    #[serde(rename = "type")]
    pub kind: RelationshipKind,
    pub table: String,
    #[serde(default)]
    pub foreign_key: Option<String>,
}

/// Declared secondary index over one or more columns.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IndexDescriptor {
    #[serde(default)]
    pub name: Option<String>,
    pub columns: Vec<String>,
    #[serde(default)]
    pub unique: bool,
}

/// One data table. `name` must be PascalCase; `primaryKey` defaults to `id`.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TableDescriptor {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_primary_key")]
    pub primary_key: String,
    pub columns: Vec<FieldDescriptor>,
    #[serde(default)]
    pub relationships: Vec<Relationship>,
    #[serde(default)]
    pub indexes: Vec<IndexDescriptor>,
    #[serde(default)]
    pub timestamps: bool,
    #[serde(default)]
    pub soft_delete: bool,
}

impl TableDescriptor {
    /// The single ordered field list shared by every generated
    /// representation: declared columns, then the synthesized primary key
    /// if it was not declared, then timestamp fields, then the soft-delete
    /// field.
    pub fn effective_fields(&self) -> Vec<FieldDescriptor> {
        let mut fields = self.columns.clone();

        if !fields.iter().any(|f| f.name == self.primary_key) {
            fields.push(FieldDescriptor::required(&self.primary_key, FieldType::Uuid));
        }
        if self.timestamps {
            fields.push(FieldDescriptor::required("createdAt", FieldType::Datetime));
            fields.push(FieldDescriptor::required("updatedAt", FieldType::Datetime));
        }
        if self.soft_delete {
            fields.push(FieldDescriptor::nullable("deletedAt", FieldType::Datetime));
        }
        fields
    }

    /// Implicit fields managed by the system (timestamps and soft-delete).
    /// Excluded from the generated "create" shape.
    pub fn system_field_names(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.timestamps {
            names.push("createdAt");
            names.push("updatedAt");
        }
        if self.soft_delete {
            names.push("deletedAt");
        }
        names
    }

    /// The effective primary-key field.
    pub fn primary_key_field(&self) -> FieldDescriptor {
        self.columns
            .iter()
            .find(|f| f.name == self.primary_key)
            .cloned()
            .unwrap_or_else(|| FieldDescriptor::required(&self.primary_key, FieldType::Uuid))
    }
}
