//! # App Assembly
//!
//! Ties the generated units into an importable app surface: the store
//! wiring every container reducer, the provider that owns the query
//! client and nests the framework providers, and one barrel per output
//! directory.

use crate::descriptor::StateContainerDescriptor;
use crate::emit::{render_file, CodeWriter, ImportSet};
use std::collections::BTreeMap;

/// File stems per output directory, gathered while the generators run.
#[derive(Debug, Default)]
pub struct Assembly {
    pub schema_stems: Vec<String>,
    pub collection_stems: Vec<String>,
    pub mutation_stems: Vec<String>,
    pub container_names: Vec<String>,
    pub selector_stems: Vec<String>,
}

impl Assembly {
    pub fn new() -> Self {
        Self::default()
    }

    /// Emit store, provider, and barrels into the file map.
    pub fn emit(&self, files: &mut BTreeMap<String, String>) {
        tracing::debug!("[CODEGEN] Assembling store, provider, and barrels");
        files.insert("store.ts".to_string(), self.store_file());
        files.insert("provider.tsx".to_string(), provider_file());

        if !self.schema_stems.is_empty() {
            files.insert(
                "schemas/index.ts".to_string(),
                barrel(&self.schema_stems),
            );
        }
        if !self.collection_stems.is_empty() {
            files.insert(
                "collections/index.ts".to_string(),
                barrel(&self.collection_stems),
            );
        }
        if !self.mutation_stems.is_empty() {
            files.insert(
                "mutations/index.ts".to_string(),
                barrel(&self.mutation_stems),
            );
        }
        if !self.container_names.is_empty() {
            files.insert(
                "containers/index.ts".to_string(),
                container_barrel(&self.container_names),
            );
        }
        if !self.selector_stems.is_empty() {
            files.insert(
                "selectors/index.ts".to_string(),
                barrel(&self.selector_stems),
            );
        }
    }

    pub fn record_container(&mut self, container: &StateContainerDescriptor) {
        self.container_names.push(container.name.clone());
    }

    fn store_file(&self) -> String {
        let mut names = self.container_names.clone();
        names.sort();

        let mut imports = ImportSet::new();
        imports.named("@reduxjs/toolkit", "configureStore");
        for name in &names {
            imports.default_import(format!("./containers/{name}"), format!("{name}Reducer"));
        }

        let mut w = CodeWriter::new();
        w.open("export const store = configureStore({");
        w.open("reducer: {");
        for name in &names {
            w.line(format!("{name}: {name}Reducer,"));
        }
        w.close("},");
        w.close("});");
        w.blank();
        w.line("export type RootState = ReturnType<typeof store.getState>;");
        w.line("export type AppDispatch = typeof store.dispatch;");

        render_file(&imports, &w.finish())
    }
}

/// The provider owns the query client referenced by collection and
/// mutation files, so it is emitted even when no containers exist.
fn provider_file() -> String {
    let mut imports = ImportSet::new();
    imports.default_import("react", "React");
    imports.named("@tanstack/react-query", "QueryClient");
    imports.named("@tanstack/react-query", "QueryClientProvider");
    imports.named("react-redux", "Provider");
    imports.named("./store", "store");

    let mut w = CodeWriter::new();
    w.line("export const queryClient = new QueryClient();");
    w.blank();
    w.open("export function AppProvider({ children }: { children: React.ReactNode }) {");
    w.open("return (");
    w.open("<Provider store={store}>");
    w.line("<QueryClientProvider client={queryClient}>{children}</QueryClientProvider>");
    w.close("</Provider>");
    w.close(");");
    w.close("}");

    render_file(&imports, &w.finish())
}

fn barrel(stems: &[String]) -> String {
    let mut stems = stems.to_vec();
    stems.sort();
    let mut w = CodeWriter::new();
    for stem in &stems {
        w.line(format!("export * from \"./{stem}\";"));
    }
    render_file(&ImportSet::new(), &w.finish())
}

/// Container barrel: re-export the slice surface plus the default
/// reducer under the name the store imports.
fn container_barrel(names: &[String]) -> String {
    let mut names = names.to_vec();
    names.sort();
    let mut w = CodeWriter::new();
    for name in &names {
        w.line(format!("export * from \"./{name}\";"));
        w.line(format!(
            "export {{ default as {name}Reducer }} from \"./{name}\";"
        ));
    }
    render_file(&ImportSet::new(), &w.finish())
}
