//! # Table Compiler
//!
//! Compiles one [`TableDescriptor`] into a schema file carrying three
//! representations of the same ordered field list: a zod runtime schema,
//! a structural TypeScript interface, and a SQL storage definition, plus
//! the derived create/update shapes.

use crate::descriptor::{FieldConstraints, FieldDescriptor, FieldType, TableDescriptor};
use crate::emit::{render_file, CodeWriter, ImportSet};
use crate::error::{CompileError, Result};
use crate::naming;
use crate::typemap;

pub struct TableGenerator<'a> {
    table: &'a TableDescriptor,
}

impl<'a> TableGenerator<'a> {
    pub fn new(table: &'a TableDescriptor) -> Self {
        Self { table }
    }

    /// Relative output path for this table's schema file.
    pub fn output_path(&self) -> String {
        format!("schemas/{}.ts", naming::table_file_stem(&self.table.name))
    }

    /// Generate the schema file. Malformed identifiers abort before any
    /// text is produced; there are no partial files.
    pub fn generate(&self) -> Result<String> {
        if !naming::is_pascal_case(&self.table.name) {
            return Err(CompileError::validation(
                format!("table '{}'", self.table.name),
                "table name must be PascalCase",
            ));
        }
        if !naming::is_identifier(&self.table.primary_key) {
            return Err(CompileError::validation(
                format!("table '{}'", self.table.name),
                format!("primary key '{}' is not a valid identifier", self.table.primary_key),
            ));
        }
        for column in &self.table.columns {
            if !naming::is_identifier(&column.name) {
                return Err(CompileError::validation(
                    format!("table '{}'", self.table.name),
                    format!("column '{}' is not a valid identifier", column.name),
                ));
            }
        }

        tracing::debug!("[CODEGEN] Generating table schema for {}", self.table.name);

        let fields = self.table.effective_fields();
        let mut imports = ImportSet::new();
        imports.named("zod", "z");

        let mut w = CodeWriter::new();
        self.write_zod_schema(&mut w, &fields);
        w.blank();
        self.write_interface(&mut w, &fields);
        w.blank();
        self.write_sql(&mut w, &fields);
        w.blank();
        self.write_derived_shapes(&mut w);

        Ok(render_file(&imports, &w.finish()))
    }

    fn write_zod_schema(&self, w: &mut CodeWriter, fields: &[FieldDescriptor]) {
        if !self.table.description.is_empty() {
            w.line(format!("/** {} */", self.table.description));
        }
        w.open(format!("export const {}Schema = z.object({{", self.table.name));
        for field in fields {
            w.line(format!("{}: {},", field.name, zod_field_expr(field)));
        }
        w.close("});");
    }

    fn write_interface(&self, w: &mut CodeWriter, fields: &[FieldDescriptor]) {
        w.open(format!("export interface {} {{", self.table.name));
        for field in fields {
            let mut ty = ts_field_type(field);
            if field.nullable {
                ty = format!("{ty} | null");
            }
            w.line(format!("{}: {};", field.name, ty));
        }
        w.close("}");
    }

    fn write_sql(&self, w: &mut CodeWriter, fields: &[FieldDescriptor]) {
        let table_name = naming::sql_table_name(&self.table.name);
        w.line(format!("export const {} = `", naming::sql_const_name(&self.table.name)));
        w.line(format!("CREATE TABLE IF NOT EXISTS {} (", sql_ident(&table_name)));

        let last = fields.len().saturating_sub(1);
        for (i, field) in fields.iter().enumerate() {
            let comma = if i == last { "" } else { "," };
            w.line(format!("  {}{comma}", sql_column(field, &self.table.primary_key)));
        }
        w.line(");");

        for index in &self.table.indexes {
            let name = index.name.clone().unwrap_or_else(|| {
                format!("idx_{table_name}_{}", index.columns.join("_"))
            });
            let unique = if index.unique { "UNIQUE " } else { "" };
            let columns: Vec<String> = index.columns.iter().map(|c| sql_ident(c)).collect();
            w.line(format!(
                "CREATE {unique}INDEX IF NOT EXISTS {name} ON {} ({});",
                sql_ident(&table_name),
                columns.join(", ")
            ));
        }
        w.line("`;");
    }

    fn write_derived_shapes(&self, w: &mut CodeWriter) {
        let name = &self.table.name;
        let pk = &self.table.primary_key;

        let mut create_omits = vec![format!("\"{pk}\"")];
        create_omits.extend(
            self.table
                .system_field_names()
                .iter()
                .map(|f| format!("\"{f}\"")),
        );

        w.line(format!(
            "export type New{name} = Omit<{name}, {}>;",
            create_omits.join(" | ")
        ));
        w.line(format!(
            "export type {name}Update = Pick<{name}, \"{pk}\"> & Partial<Omit<{name}, \"{pk}\">>;"
        ));
    }
}

/// Zod expression for one field with constraints folded into the scalar
/// base type. An enum constraint replaces the base mapping entirely.
fn zod_field_expr(field: &FieldDescriptor) -> String {
    let constraints = field.constraints();
    let mut expr = match &constraints.one_of {
        Some(values) => {
            let quoted: Vec<String> = values.iter().map(|v| format!("\"{v}\"")).collect();
            format!("z.enum([{}])", quoted.join(", "))
        }
        None => {
            let mut expr = typemap::zod_expr(field.ty).to_string();
            fold_zod_constraints(&mut expr, field.ty, &constraints);
            expr
        }
    };
    if field.nullable {
        expr.push_str(".nullable()");
    }
    expr
}

fn fold_zod_constraints(expr: &mut String, ty: FieldType, constraints: &FieldConstraints) {
    match ty {
        FieldType::String => {
            if let Some(min) = constraints.min_length {
                expr.push_str(&format!(".min({min})"));
            }
            if let Some(max) = constraints.max_length {
                expr.push_str(&format!(".max({max})"));
            }
            if let Some(pattern) = &constraints.pattern {
                expr.push_str(&format!(".regex(/{}/)", pattern.replace('/', "\\/")));
            }
        }
        FieldType::Number => {
            if let Some(min) = constraints.min {
                expr.push_str(&format!(".min({})", typemap::fmt_number(min)));
            }
            if let Some(max) = constraints.max {
                expr.push_str(&format!(".max({})", typemap::fmt_number(max)));
            }
        }
        _ => {}
    }
}

/// TypeScript type for one field; an enum constraint becomes a closed
/// union of string literals.
fn ts_field_type(field: &FieldDescriptor) -> String {
    match &field.constraints().one_of {
        Some(values) => {
            let quoted: Vec<String> = values.iter().map(|v| format!("\"{v}\"")).collect();
            quoted.join(" | ")
        }
        None => typemap::ts_type(field.ty).to_string(),
    }
}

/// Quote SQL identifiers. Always quoted: table and column names come
/// from camelCase descriptors and may collide with keywords.
fn sql_ident(name: &str) -> String {
    format!("\"{name}\"")
}

fn sql_column(field: &FieldDescriptor, primary_key: &str) -> String {
    let constraints = field.constraints();
    let mut ty = match constraints.max_length {
        Some(max) if field.ty == FieldType::String => format!("VARCHAR({max})"),
        _ => typemap::sql_type(field.ty).to_string(),
    };

    if field.name == primary_key {
        ty.push_str(" PRIMARY KEY");
    } else if !field.nullable {
        ty.push_str(" NOT NULL");
    }
    if let Some(default) = &field.default {
        ty.push_str(&format!(" DEFAULT {}", typemap::sql_literal(default)));
    }
    if let Some(values) = &constraints.one_of {
        let quoted: Vec<String> = values.iter().map(|v| format!("'{v}'")).collect();
        ty.push_str(&format!(
            " CHECK ({} IN ({}))",
            sql_ident(&field.name),
            quoted.join(", ")
        ));
    }

    format!("{} {ty}", sql_ident(&field.name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn order_table() -> TableDescriptor {
        serde_json::from_value(json!({
            "name": "Order",
            "description": "Customer orders",
            "columns": [
                {
                    "name": "status",
                    "type": "string",
                    "constraints": { "enum": ["open", "closed"] }
                },
                { "name": "total", "type": "number", "constraints": { "min": 0 } },
                { "name": "note", "type": "string", "nullable": true, "constraints": { "maxLength": 280 } }
            ],
            "indexes": [{ "columns": ["status"] }],
            "timestamps": true
        }))
        .unwrap()
    }

    #[test]
    fn three_representations_share_field_order() {
        let source = TableGenerator::new(&order_table()).generate().unwrap();

        let order = ["status", "total", "note", "id", "createdAt", "updatedAt"];
        for section_start in ["OrderSchema = z.object({", "export interface Order {"] {
            let section = &source[source.find(section_start).unwrap()..];
            let mut last = 0;
            for field in order {
                let pos = section.find(&format!("{field}:")).unwrap();
                assert!(pos > last || last == 0, "field {field} out of order");
                last = pos;
            }
        }
    }

    #[test]
    fn constraints_fold_into_all_representations() {
        let source = TableGenerator::new(&order_table()).generate().unwrap();
        assert!(source.contains("status: z.enum([\"open\", \"closed\"])"));
        assert!(source.contains("status: \"open\" | \"closed\";"));
        assert!(source.contains("total: z.number().min(0)"));
        assert!(source.contains("note: z.string().max(280).nullable()"));
        assert!(source.contains("note: string | null;"));
        assert!(source.contains("\"note\" VARCHAR(280)"));
        assert!(source.contains("CHECK (\"status\" IN ('open', 'closed'))"));
    }

    #[test]
    fn sql_names_primary_key_and_indexes() {
        let source = TableGenerator::new(&order_table()).generate().unwrap();
        assert!(source.contains("export const ORDER_TABLE_SQL = `"));
        assert!(source.contains("\"id\" UUID PRIMARY KEY"));
        assert!(source
            .contains("CREATE INDEX IF NOT EXISTS idx_order_status ON \"order\" (\"status\");"));
    }

    #[test]
    fn derived_shapes_exclude_system_fields() {
        let source = TableGenerator::new(&order_table()).generate().unwrap();
        assert!(source.contains(
            "export type NewOrder = Omit<Order, \"id\" | \"createdAt\" | \"updatedAt\">;"
        ));
        assert!(source.contains(
            "export type OrderUpdate = Pick<Order, \"id\"> & Partial<Omit<Order, \"id\">>;"
        ));
    }

    #[test]
    fn malformed_table_name_fails_before_output() {
        let table: TableDescriptor = serde_json::from_value(json!({
            "name": "order",
            "columns": [{ "name": "status", "type": "string" }]
        }))
        .unwrap();
        assert!(TableGenerator::new(&table).generate().is_err());
    }

    #[test]
    fn malformed_column_name_fails_before_output() {
        let table: TableDescriptor = serde_json::from_value(json!({
            "name": "Order",
            "columns": [{ "name": "order-status", "type": "string" }]
        }))
        .unwrap();
        assert!(TableGenerator::new(&table).generate().is_err());
    }
}
