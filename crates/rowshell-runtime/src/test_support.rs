//! Fakes for the external transpiler, script engine and renderer.
//!
//! The fake engine binds `Component` whenever the code mentions it, and
//! fails when the code contains `throw`. The fake transpiler rejects code
//! containing `SYNTAX_ERROR`. The renderer fails on `RENDER_FAIL`.

use crate::capability::Capabilities;
use crate::compiler::{
    Bindings, Compiler, Export, MountHandle, MountTarget, Renderer, ScriptEngine, Transpiler,
    COMPONENT_BINDING,
};
use parking_lot::Mutex;
use rowshell_model::Row;
use serde_json::Value;
use std::sync::Arc;

pub fn row(value: Value) -> Row {
    match value {
        Value::Object(map) => map,
        other => panic!("not an object: {other}"),
    }
}

pub struct FakeTranspiler;

impl Transpiler for FakeTranspiler {
    fn transpile(&self, source: &str, _source_type: &str) -> Result<String, String> {
        if source.contains("SYNTAX_ERROR") {
            return Err("unexpected token".to_string());
        }
        Ok(source.to_string())
    }
}

/// What the fake engine binds as `Component`.
#[derive(Debug)]
pub struct FakeComponent {
    pub code: String,
    pub capability_keys: Vec<String>,
}

pub struct FakeEngine;

impl ScriptEngine for FakeEngine {
    fn execute(&self, code: &str, capabilities: &Capabilities) -> Result<Bindings, String> {
        if code.contains("throw") {
            return Err("boom".to_string());
        }
        if !code.contains(COMPONENT_BINDING) {
            return Ok(Bindings::new());
        }
        let component = FakeComponent {
            code: code.to_string(),
            capability_keys: capabilities.keys().into_iter().map(str::to_string).collect(),
        };
        Ok(Bindings::new().with(COMPONENT_BINDING, Arc::new(component)))
    }
}

pub fn fake_compiler() -> Arc<Compiler> {
    Arc::new(Compiler::new(Arc::new(FakeTranspiler), Arc::new(FakeEngine)))
}

/// Journal of mounts and disposals, e.g. `mount:home`, `dispose:home`.
#[derive(Clone, Default)]
pub struct FakeRenderer {
    pub journal: Arc<Mutex<Vec<String>>>,
}

impl FakeRenderer {
    pub fn entries(&self) -> Vec<String> {
        self.journal.lock().clone()
    }
}

struct FakeHandle {
    container_id: String,
    journal: Arc<Mutex<Vec<String>>>,
}

impl MountHandle for FakeHandle {
    fn dispose(self: Box<Self>) {
        self.journal.lock().push(format!("dispose:{}", self.container_id));
    }
}

impl Renderer for FakeRenderer {
    fn mount(&self, component: &Export, target: &MountTarget) -> Result<Box<dyn MountHandle>, String> {
        let component = component
            .downcast_ref::<FakeComponent>()
            .ok_or_else(|| "not a component".to_string())?;
        if component.code.contains("RENDER_FAIL") {
            return Err("render exploded".to_string());
        }
        self.journal.lock().push(format!("mount:{}", target.container_id));
        Ok(Box::new(FakeHandle {
            container_id: target.container_id.clone(),
            journal: Arc::clone(&self.journal),
        }))
    }
}
