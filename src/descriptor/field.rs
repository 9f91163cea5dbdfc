//! Field descriptors shared by tables, schemas, and storage definitions.

use serde::{Deserialize, Serialize};

/// Abstract scalar type of a table column.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Number,
    Boolean,
    Date,
    Datetime,
    Json,
    Uuid,
}

/// Advisory constraints consumed only by the Table Compiler, where they
/// fold into the generated schema/type/DDL representations.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct FieldConstraints {
    pub min_length: Option<u64>,
    pub max_length: Option<u64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub pattern: Option<String>,
    /// Closed value set. Overrides the base scalar mapping entirely.
    #[serde(rename = "enum")]
    pub one_of: Option<Vec<String>>,
}

impl FieldConstraints {
    pub fn is_empty(&self) -> bool {
        self.min_length.is_none()
            && self.max_length.is_none()
            && self.min.is_none()
            && self.max.is_none()
            && self.pattern.is_none()
            && self.one_of.is_none()
    }
}

/// One declared column of a table.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FieldDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: FieldType,
    #[serde(default)]
    pub nullable: bool,
    #[serde(default)]
    pub default: Option<serde_json::Value>,
    #[serde(default)]
    pub constraints: Option<FieldConstraints>,
}

impl FieldDescriptor {
    /// A required field with no default and no constraints. Used for
    /// synthesized primary keys and implicit system fields.
    pub fn required(name: impl Into<String>, ty: FieldType) -> Self {
        Self {
            name: name.into(),
            ty,
            nullable: false,
            default: None,
            constraints: None,
        }
    }

    /// Same as [`required`](Self::required) but nullable.
    pub fn nullable(name: impl Into<String>, ty: FieldType) -> Self {
        Self {
            nullable: true,
            ..Self::required(name, ty)
        }
    }

    /// Constraint set, empty if none were declared.
    pub fn constraints(&self) -> FieldConstraints {
        self.constraints.clone().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deserializes_with_defaults() {
        let field: FieldDescriptor =
            serde_json::from_value(json!({ "name": "status", "type": "string" })).unwrap();
        assert_eq!(field.name, "status");
        assert_eq!(field.ty, FieldType::String);
        assert!(!field.nullable);
        assert!(field.default.is_none());
    }

    #[test]
    fn enum_constraint_round_trips() {
        let field: FieldDescriptor = serde_json::from_value(json!({
            "name": "status",
            "type": "string",
            "constraints": { "enum": ["open", "closed"] }
        }))
        .unwrap();
        let constraints = field.constraints();
        assert_eq!(constraints.one_of.as_deref(), Some(&["open".to_string(), "closed".to_string()][..]));
        assert!(!constraints.is_empty());
    }
}
