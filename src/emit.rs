//! # Source Emission
//!
//! Structured builders for the generated TypeScript: an indented line
//! writer and an import collector that renders deterministic, sorted
//! import blocks.

use std::collections::{BTreeMap, BTreeSet};

/// Header prepended to every generated file.
pub const FILE_HEADER: &str = "\
// Auto-generated by DASC (Declarative App Source Compiler)
// DO NOT EDIT - changes will be overwritten
";

/// Indentation unit for generated TypeScript.
const INDENT: &str = "  ";

/// Line-oriented writer with indentation tracking.
///
/// Generators build file bodies through this instead of splicing raw
/// strings, which keeps the emitted text well-formed line by line.
#[derive(Debug, Default)]
pub struct CodeWriter {
    buf: String,
    indent: usize,
}

impl CodeWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write one line at the current indentation.
    pub fn line(&mut self, text: impl AsRef<str>) {
        let text = text.as_ref();
        if text.is_empty() {
            self.buf.push('\n');
            return;
        }
        for _ in 0..self.indent {
            self.buf.push_str(INDENT);
        }
        self.buf.push_str(text);
        self.buf.push('\n');
    }

    /// Write an empty line.
    pub fn blank(&mut self) {
        self.buf.push('\n');
    }

    /// Write a line and indent the lines that follow (e.g. `{` openers).
    pub fn open(&mut self, text: impl AsRef<str>) {
        self.line(text);
        self.indent += 1;
    }

    /// Dedent and write a closing line (e.g. `}` / `});`).
    pub fn close(&mut self, text: impl AsRef<str>) {
        self.indent = self.indent.saturating_sub(1);
        self.line(text);
    }

    /// Dedent without writing, for constructs closed by a shared line.
    pub fn dedent(&mut self) {
        self.indent = self.indent.saturating_sub(1);
    }

    /// Consume the writer and return the accumulated source text.
    pub fn finish(self) -> String {
        self.buf
    }
}

/// Collected imports for one generated file, rendered sorted by module.
#[derive(Debug, Default)]
pub struct ImportSet {
    named: BTreeMap<String, BTreeSet<String>>,
    type_only: BTreeMap<String, BTreeSet<String>>,
    defaults: BTreeMap<String, String>,
}

impl ImportSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a named import: `import { name } from "module";`
    pub fn named(&mut self, module: impl Into<String>, name: impl Into<String>) {
        self.named.entry(module.into()).or_default().insert(name.into());
    }

    /// Add a type-only import: `import type { name } from "module";`
    pub fn type_only(&mut self, module: impl Into<String>, name: impl Into<String>) {
        self.type_only
            .entry(module.into())
            .or_default()
            .insert(name.into());
    }

    /// Add a default import: `import local from "module";`
    pub fn default_import(&mut self, module: impl Into<String>, local: impl Into<String>) {
        self.defaults.insert(module.into(), local.into());
    }

    pub fn is_empty(&self) -> bool {
        self.named.is_empty() && self.type_only.is_empty() && self.defaults.is_empty()
    }

    /// Render the import block, one module per line, modules sorted.
    pub fn render(&self) -> String {
        let mut modules: BTreeSet<&String> = BTreeSet::new();
        modules.extend(self.named.keys());
        modules.extend(self.defaults.keys());

        let mut out = String::new();
        for module in modules {
            let default = self.defaults.get(module);
            let names = self.named.get(module);
            match (default, names) {
                (Some(local), Some(names)) => {
                    let list = names.iter().cloned().collect::<Vec<_>>().join(", ");
                    out.push_str(&format!("import {local}, {{ {list} }} from \"{module}\";\n"));
                }
                (Some(local), None) => {
                    out.push_str(&format!("import {local} from \"{module}\";\n"));
                }
                (None, Some(names)) => {
                    let list = names.iter().cloned().collect::<Vec<_>>().join(", ");
                    out.push_str(&format!("import {{ {list} }} from \"{module}\";\n"));
                }
                (None, None) => {}
            }
        }
        for (module, names) in &self.type_only {
            let list = names.iter().cloned().collect::<Vec<_>>().join(", ");
            out.push_str(&format!("import type {{ {list} }} from \"{module}\";\n"));
        }
        out
    }
}

/// Assemble a complete file: header, imports, then the body.
pub fn render_file(imports: &ImportSet, body: &str) -> String {
    let mut out = String::from(FILE_HEADER);
    out.push('\n');
    if !imports.is_empty() {
        out.push_str(&imports.render());
        out.push('\n');
    }
    out.push_str(body);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writer_tracks_indentation() {
        let mut w = CodeWriter::new();
        w.open("export function demo() {");
        w.line("return 1;");
        w.close("}");
        assert_eq!(w.finish(), "export function demo() {\n  return 1;\n}\n");
    }

    #[test]
    fn imports_render_sorted_and_merged() {
        let mut imports = ImportSet::new();
        imports.named("zod", "z");
        imports.named("@reduxjs/toolkit", "createSlice");
        imports.named("@reduxjs/toolkit", "createSelector");
        imports.default_import("react", "React");
        imports.type_only("../store", "RootState");

        let rendered = imports.render();
        assert_eq!(
            rendered,
            "import { createSelector, createSlice } from \"@reduxjs/toolkit\";\n\
             import React from \"react\";\n\
             import { z } from \"zod\";\n\
             import type { RootState } from \"../store\";\n"
        );
    }
}
