//! Runtime compilation of component source.
//!
//! ```text
//!  source ──► Transpiler ──► ScriptEngine(code, capabilities) ──► Bindings["Component"]
//!                                         ▲
//!                     base ⊕ overrides ───┘   (override wins per key)
//! ```
//!
//! The transpiler, the script engine and the renderer are supplied by the
//! embedding host. Compiled code only ever sees the capability object it is
//! handed; it runs with full host privileges otherwise.

use crate::capability::{merge_capabilities, Capabilities};
use parking_lot::RwLock;
use rowshell_host::{HostDocument, HostError};
use rowshell_model::row::cell_string;
use rowshell_model::{sanitize_source, ComponentSchema, Row};
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};

/// Opaque value produced by executing component source.
pub type Export = Arc<dyn Any + Send + Sync>;

/// Name the executed source must bind.
pub const COMPONENT_BINDING: &str = "Component";

/// Source-to-runtime translation (JSX/TSX to plain script).
pub trait Transpiler: Send + Sync {
    fn transpile(&self, source: &str, source_type: &str) -> Result<String, String>;
}

/// Executes translated code in a fresh scope that receives `capabilities`.
pub trait ScriptEngine: Send + Sync {
    fn execute(&self, code: &str, capabilities: &Capabilities) -> Result<Bindings, String>;
}

/// Mounts a compiled component into a page region.
pub trait Renderer: Send + Sync {
    fn mount(&self, component: &Export, target: &MountTarget) -> Result<Box<dyn MountHandle>, String>;
}

/// Disposer for a mounted component.
pub trait MountHandle: Send {
    fn dispose(self: Box<Self>);
}

/// Where a page is rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountTarget {
    pub region: String,
    pub container_id: String,
}

impl MountTarget {
    pub fn main(component_id: &str) -> Self {
        Self {
            region: "main-content".to_string(),
            container_id: format!("react-container-{component_id}"),
        }
    }
}

/// Names bound by executed source.
#[derive(Default, Clone)]
pub struct Bindings {
    values: HashMap<String, Export>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: Export) -> Self {
        self.values.insert(name.to_string(), value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Export> {
        self.values.get(name)
    }

    pub fn take(&mut self, name: &str) -> Option<Export> {
        self.values.remove(name)
    }
}

impl fmt::Debug for Bindings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.values.keys().collect();
        names.sort();
        f.debug_struct("Bindings").field("names", &names).finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompileError {
    #[error("transpile failed for `{id}`: {message}")]
    Transpile { id: String, message: String },
    #[error("execution failed for `{id}`: {message}")]
    Execute { id: String, message: String },
    #[error("component `{id}` does not define `Component`: declare `const Component = () => ...` or `function Component() ...`")]
    MissingComponent { id: String },
    #[error("render failed for `{id}`: {message}")]
    Render { id: String, message: String },
}

impl CompileError {
    pub fn component_id(&self) -> &str {
        match self {
            Self::Transpile { id, .. }
            | Self::Execute { id, .. }
            | Self::MissingComponent { id }
            | Self::Render { id, .. } => id,
        }
    }
}

// ============================================================================
// Compiler
// ============================================================================

pub struct Compiler {
    transpiler: Arc<dyn Transpiler>,
    engine: Arc<dyn ScriptEngine>,
    base: RwLock<Capabilities>,
}

impl Compiler {
    pub fn new(transpiler: Arc<dyn Transpiler>, engine: Arc<dyn ScriptEngine>) -> Self {
        Self {
            transpiler,
            engine,
            base: RwLock::new(Capabilities::new()),
        }
    }

    /// Replace the baseline capability object every compilation receives.
    pub fn set_base(&self, capabilities: Capabilities) {
        *self.base.write() = capabilities;
    }

    pub fn base(&self) -> Capabilities {
        self.base.read().clone()
    }

    /// Translate and execute `source`, returning its `Component` binding.
    pub fn compile(
        &self,
        id: &str,
        source: &str,
        source_type: &str,
        overrides: &Capabilities,
    ) -> Result<Export, CompileError> {
        let code = self
            .transpiler
            .transpile(source, source_type)
            .map_err(|message| CompileError::Transpile {
                id: id.to_string(),
                message,
            })?;

        let capabilities = merge_capabilities(&self.base.read(), overrides);
        let mut bindings =
            self.engine
                .execute(&code, &capabilities)
                .map_err(|message| CompileError::Execute {
                    id: id.to_string(),
                    message,
                })?;

        bindings
            .take(COMPONENT_BINDING)
            .ok_or_else(|| CompileError::MissingComponent { id: id.to_string() })
    }
}

impl fmt::Debug for Compiler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Compiler")
            .field("base", &self.base.read().keys())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Child components
// ============================================================================

/// Stand-in export for a child component that failed to compile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedChild {
    pub template_id: String,
    pub message: String,
}

/// Compiles ad-hoc child components on behalf of compiled code.
#[derive(Clone)]
pub struct ChildFactory {
    compiler: Weak<Compiler>,
    document: Arc<dyn HostDocument>,
    table: String,
    schema: ComponentSchema,
}

impl ChildFactory {
    pub fn new(
        compiler: &Arc<Compiler>,
        document: Arc<dyn HostDocument>,
        table: &str,
        schema: ComponentSchema,
    ) -> Self {
        Self {
            compiler: Arc::downgrade(compiler),
            document,
            table: table.to_string(),
            schema,
        }
    }

    /// Compile a component row with `overrides` layered on the baseline.
    ///
    /// Never fails: a broken child yields a [`FailedChild`] export.
    pub fn create_child_component(&self, template: &Row, overrides: &Capabilities) -> Export {
        let template_id =
            cell_string(template.get(&self.schema.id)).unwrap_or_else(|| "child".to_string());
        let source_type = cell_string(template.get(&self.schema.source_type))
            .unwrap_or_else(|| "react".to_string());
        let source = cell_string(template.get(&self.schema.source_code))
            .map(|code| sanitize_source(&code))
            .unwrap_or_default();

        let result = match self.compiler.upgrade() {
            Some(compiler) => compiler
                .compile(&template_id, &source, &source_type, overrides)
                .map_err(|e| e.to_string()),
            None => Err("compiler no longer available".to_string()),
        };

        match result {
            Ok(export) => export,
            Err(message) => {
                tracing::error!(component_id = %template_id, error = %message, "child component failed");
                Arc::new(FailedChild {
                    template_id,
                    message,
                })
            }
        }
    }

    /// Fetch the row whose id column equals `template_id` and compile it.
    /// `None` when no such row exists.
    pub async fn get_child_component(
        &self,
        template_id: &str,
        overrides: &Capabilities,
    ) -> Result<Option<Export>, HostError> {
        let rows = self.document.fetch_rows(&self.table).await?;
        let template = rows
            .iter()
            .find(|row| cell_string(row.get(&self.schema.id)).as_deref() == Some(template_id));
        Ok(template.map(|row| self.create_child_component(row, overrides)))
    }
}

impl fmt::Debug for ChildFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChildFactory")
            .field("table", &self.table)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::Capability;
    use crate::test_support::{fake_compiler, row, FakeComponent};
    use rowshell_host::MemoryDocument;
    use serde_json::json;

    fn fake_of(export: &Export) -> &FakeComponent {
        export.downcast_ref::<FakeComponent>().unwrap()
    }

    #[test]
    fn compile_binds_component_with_merged_capabilities() {
        let compiler = fake_compiler();
        compiler.set_base(
            Capabilities::new()
                .with("navigate", Capability::Value(json!("base")))
                .with("getAuth", Capability::Value(json!(null))),
        );
        let overrides = Capabilities::new().with("local", Capability::Value(json!(1)));
        let export = compiler
            .compile("card", "const Component = 1;", "react", &overrides)
            .unwrap();
        assert_eq!(fake_of(&export).capability_keys, ["getAuth", "local", "navigate"]);
    }

    #[test]
    fn missing_component_binding() {
        let compiler = fake_compiler();
        let err = compiler
            .compile("x", "const Other = 1;", "react", &Capabilities::new())
            .unwrap_err();
        assert_eq!(err, CompileError::MissingComponent { id: "x".to_string() });
        assert!(err.to_string().contains("Component"));
    }

    #[test]
    fn transpile_and_execute_failures_carry_the_id() {
        let compiler = fake_compiler();
        let err = compiler
            .compile("a", "SYNTAX_ERROR", "tsx", &Capabilities::new())
            .unwrap_err();
        assert!(matches!(err, CompileError::Transpile { .. }));
        assert_eq!(err.component_id(), "a");

        let err = compiler
            .compile("b", "throw Component", "react", &Capabilities::new())
            .unwrap_err();
        assert!(matches!(err, CompileError::Execute { .. }));
    }

    fn factory(compiler: &Arc<Compiler>, doc: MemoryDocument) -> ChildFactory {
        ChildFactory::new(
            compiler,
            Arc::new(doc),
            "Application_Composants",
            ComponentSchema::default(),
        )
    }

    #[test]
    fn failed_child_is_a_placeholder() {
        let compiler = fake_compiler();
        let children = factory(&compiler, MemoryDocument::new());
        let export = children.create_child_component(
            &row(json!({"template_id": "kid", "component_code": "throw x"})),
            &Capabilities::new(),
        );
        let failed = export.downcast_ref::<FailedChild>().unwrap();
        assert_eq!(failed.template_id, "kid");
        assert!(failed.message.contains("boom"));
    }

    #[tokio::test]
    async fn get_child_component_looks_up_by_template_id() {
        let compiler = fake_compiler();
        let doc = MemoryDocument::new().with_rows(
            "Application_Composants",
            vec![row(json!({"template_id": "kid", "component_code": "const Component = 'kid';"}))],
        );
        let children = factory(&compiler, doc);
        let overrides = Capabilities::new().with("navigate", Capability::Value(json!("local")));

        let export = children
            .get_child_component("kid", &overrides)
            .await
            .unwrap()
            .unwrap();
        assert!(fake_of(&export).capability_keys.contains(&"navigate".to_string()));
        assert!(children
            .get_child_component("missing", &overrides)
            .await
            .unwrap()
            .is_none());
    }

    #[test]
    fn dropped_compiler_yields_placeholder() {
        let compiler = fake_compiler();
        let children = factory(&compiler, MemoryDocument::new());
        drop(compiler);
        let export = children.create_child_component(
            &row(json!({"template_id": "kid", "component_code": "const Component = 1;"})),
            &Capabilities::new(),
        );
        assert!(export.downcast_ref::<FailedChild>().is_some());
    }
}
