//! The capability object handed to compiled component source.
//!
//! It is the only way compiled code reaches the host and the shell. It is a
//! plain key → [`Capability`] map; overrides are layered on a base map by
//! [`merge_capabilities`], a pure function where the override wins per key.
//!
//! Baseline keys:
//!
//! | key | kind |
//! |---|---|
//! | `isAuthenticated`, `getAuth`, `refreshAuth` | session introspection |
//! | `navigate`, `goToLanding` | navigation commands |
//! | `fetchRows` (`getData`), `addRow`, `updateRow`, `deleteRow` | host data |
//! | `getSelection` | latest host selection |
//! | `query`, `getQueryParam` | merged inbound parameters |
//! | `getComponent` | shared-module lookup |
//! | `getChildComponent`, `createChildComponent` | child compilation |
//! | `helpers` | helper library group |

use crate::compiler::{ChildFactory, Export};
use crate::session_store::SessionStore;
use crate::shell::ShellCommand;
use async_trait::async_trait;
use parking_lot::RwLock;
use rowshell_host::{HostDocument, HostError, SelectionWatch};
use rowshell_model::{helpers, Row, RowId};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Debug, thiserror::Error)]
pub enum CapabilityError {
    #[error("unknown capability `{0}`")]
    Unknown(String),
    #[error("capability `{0}` is not callable")]
    NotCallable(String),
    #[error("bad arguments for `{name}`: {message}")]
    BadArguments { name: String, message: String },
    #[error(transparent)]
    Host(#[from] HostError),
    #[error("shell is gone")]
    ShellGone,
}

/// A function exposed to compiled code.
#[async_trait]
pub trait HostFn: Send + Sync {
    async fn call(&self, args: Vec<Value>) -> Result<Value, CapabilityError>;
}

struct SyncFn<F>(F);

#[async_trait]
impl<F> HostFn for SyncFn<F>
where
    F: Fn(Vec<Value>) -> Result<Value, CapabilityError> + Send + Sync,
{
    async fn call(&self, args: Vec<Value>) -> Result<Value, CapabilityError> {
        (self.0)(args)
    }
}

/// Wrap a synchronous closure as a callable capability.
pub fn sync_fn<F>(f: F) -> Capability
where
    F: Fn(Vec<Value>) -> Result<Value, CapabilityError> + Send + Sync + 'static,
{
    Capability::Func(Arc::new(SyncFn(f)))
}

#[derive(Clone)]
pub enum Capability {
    Value(Value),
    Func(Arc<dyn HostFn>),
    Group(Capabilities),
    Modules(ModuleLookup),
    Children(ChildFactory),
}

impl fmt::Debug for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(v) => f.debug_tuple("Value").field(v).finish(),
            Self::Func(_) => f.write_str("Func"),
            Self::Group(g) => f.debug_tuple("Group").field(&g.keys()).finish(),
            Self::Modules(m) => f.debug_tuple("Modules").field(&m.names()).finish(),
            Self::Children(c) => f.debug_tuple("Children").field(c).finish(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Capabilities {
    entries: BTreeMap<String, Capability>,
}

impl Capabilities {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, capability: Capability) -> Self {
        self.insert(key, capability);
        self
    }

    pub fn insert(&mut self, key: &str, capability: Capability) {
        self.entries.insert(key.to_string(), capability);
    }

    /// Look up a key; dotted paths descend into groups (`helpers.formatDate`).
    pub fn get(&self, path: &str) -> Option<&Capability> {
        match path.split_once('.') {
            Some((head, rest)) => match self.entries.get(head)? {
                Capability::Group(group) => group.get(rest),
                _ => None,
            },
            None => self.entries.get(path),
        }
    }

    pub fn contains(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    pub fn keys(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn value(&self, path: &str) -> Option<&Value> {
        match self.get(path)? {
            Capability::Value(v) => Some(v),
            _ => None,
        }
    }

    pub async fn call(&self, path: &str, args: Vec<Value>) -> Result<Value, CapabilityError> {
        match self.get(path) {
            Some(Capability::Func(f)) => f.call(args).await,
            Some(_) => Err(CapabilityError::NotCallable(path.to_string())),
            None => Err(CapabilityError::Unknown(path.to_string())),
        }
    }

    /// The shared-module lookup, if present.
    pub fn modules(&self) -> Option<&ModuleLookup> {
        match self.get("getComponent")? {
            Capability::Modules(m) => Some(m),
            _ => None,
        }
    }

    pub fn children(&self) -> Option<&ChildFactory> {
        match self.get("createChildComponent")? {
            Capability::Children(c) => Some(c),
            _ => None,
        }
    }
}

/// Shallow merge: every key of `overrides` replaces the same key of `base`.
pub fn merge_capabilities(base: &Capabilities, overrides: &Capabilities) -> Capabilities {
    let mut merged = base.clone();
    for (key, capability) in &overrides.entries {
        merged.entries.insert(key.clone(), capability.clone());
    }
    merged
}

// ============================================================================
// Shared-module lookup
// ============================================================================

/// Read handle over the shared-module exports. The registry owns the
/// contents; compiled code only looks things up.
#[derive(Clone, Default)]
pub struct ModuleLookup {
    modules: Arc<RwLock<BTreeMap<String, Export>>>,
}

impl ModuleLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<Export> {
        self.modules.read().get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.modules.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.modules.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.read().is_empty()
    }

    pub(crate) fn insert(&self, name: &str, export: Export) {
        self.modules.write().insert(name.to_string(), export);
    }

    pub(crate) fn clear(&self) {
        self.modules.write().clear();
    }
}

impl fmt::Debug for ModuleLookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleLookup")
            .field("names", &self.names())
            .finish()
    }
}

// ============================================================================
// Baseline
// ============================================================================

/// Everything the baseline capability object is built from.
pub struct BaselineSources {
    pub session: SessionStore,
    pub document: Arc<dyn HostDocument>,
    pub commands: mpsc::UnboundedSender<ShellCommand>,
    pub modules: ModuleLookup,
    pub children: ChildFactory,
    pub selection: SelectionWatch,
    pub query: BTreeMap<String, String>,
}

static NULL: Value = Value::Null;

fn arg(args: &[Value], index: usize) -> &Value {
    args.get(index).unwrap_or(&NULL)
}

fn string_arg(name: &str, args: &[Value], index: usize) -> Result<String, CapabilityError> {
    arg(args, index)
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| CapabilityError::BadArguments {
            name: name.to_string(),
            message: format!("argument {index} must be a string"),
        })
}

fn row_id_arg(name: &str, args: &[Value], index: usize) -> Result<RowId, CapabilityError> {
    arg(args, index)
        .as_i64()
        .ok_or_else(|| CapabilityError::BadArguments {
            name: name.to_string(),
            message: format!("argument {index} must be a row id"),
        })
}

fn row_arg(name: &str, args: &[Value], index: usize) -> Result<Row, CapabilityError> {
    match arg(args, index) {
        Value::Object(map) => Ok(map.clone()),
        _ => Err(CapabilityError::BadArguments {
            name: name.to_string(),
            message: format!("argument {index} must be an object"),
        }),
    }
}

fn rows_of(value: &Value) -> Vec<Row> {
    helpers::as_array(value)
        .into_iter()
        .filter_map(|v| match v {
            Value::Object(map) => Some(map),
            _ => None,
        })
        .collect()
}

struct RefreshAuth {
    session: SessionStore,
    commands: mpsc::UnboundedSender<ShellCommand>,
}

#[async_trait]
impl HostFn for RefreshAuth {
    async fn call(&self, _args: Vec<Value>) -> Result<Value, CapabilityError> {
        let auth = self.session.load_auth().await;
        self.commands
            .send(ShellCommand::SessionChanged)
            .map_err(|_| CapabilityError::ShellGone)?;
        Ok(serde_json::to_value(auth).unwrap_or(Value::Null))
    }
}

enum DataOp {
    Fetch,
    Add,
    Update,
    Delete,
}

struct DataFn {
    op: DataOp,
    document: Arc<dyn HostDocument>,
}

#[async_trait]
impl HostFn for DataFn {
    async fn call(&self, args: Vec<Value>) -> Result<Value, CapabilityError> {
        match self.op {
            DataOp::Fetch => {
                let table = string_arg("fetchRows", &args, 0)?;
                let rows = self.document.fetch_rows(&table).await?;
                Ok(Value::Array(rows.into_iter().map(Value::Object).collect()))
            }
            DataOp::Add => {
                let table = string_arg("addRow", &args, 0)?;
                let fields = row_arg("addRow", &args, 1)?;
                Ok(json!(self.document.add_row(&table, fields).await?))
            }
            DataOp::Update => {
                let table = string_arg("updateRow", &args, 0)?;
                let row_id = row_id_arg("updateRow", &args, 1)?;
                let fields = row_arg("updateRow", &args, 2)?;
                self.document.update_row(&table, row_id, fields).await?;
                Ok(Value::Bool(true))
            }
            DataOp::Delete => {
                let table = string_arg("deleteRow", &args, 0)?;
                let row_id = row_id_arg("deleteRow", &args, 1)?;
                self.document.delete_row(&table, row_id).await?;
                Ok(Value::Bool(true))
            }
        }
    }
}

fn data_fn(op: DataOp, document: &Arc<dyn HostDocument>) -> Capability {
    Capability::Func(Arc::new(DataFn {
        op,
        document: Arc::clone(document),
    }))
}

fn command_fn(
    commands: &mpsc::UnboundedSender<ShellCommand>,
    make: fn(&[Value]) -> Result<ShellCommand, CapabilityError>,
) -> Capability {
    let commands = commands.clone();
    sync_fn(move |args| {
        commands
            .send(make(&args)?)
            .map_err(|_| CapabilityError::ShellGone)?;
        Ok(Value::Null)
    })
}

/// The helper library as a capability group.
pub fn helper_capabilities() -> Capabilities {
    Capabilities::new()
        .with("toBool", sync_fn(|a| Ok(json!(helpers::to_bool(arg(&a, 0))))))
        .with("asArray", sync_fn(|a| Ok(Value::Array(helpers::as_array(arg(&a, 0))))))
        .with(
            "includesCi",
            sync_fn(|a| Ok(json!(helpers::includes_ci(arg(&a, 0), arg(&a, 1))))),
        )
        .with(
            "emailLooksOk",
            sync_fn(|a| Ok(json!(helpers::email_looks_ok(arg(&a, 0))))),
        )
        .with(
            "pickLabelField",
            sync_fn(|a| Ok(json!(helpers::pick_label_field(&rows_of(arg(&a, 0)))))),
        )
        .with(
            "toOptions",
            sync_fn(|a| {
                let options = helpers::to_options(&rows_of(arg(&a, 0)));
                Ok(serde_json::to_value(options).unwrap_or(Value::Null))
            }),
        )
        .with(
            "parseDate",
            sync_fn(|a| {
                Ok(helpers::parse_date(arg(&a, 0))
                    .map(|d| json!(d.to_rfc3339()))
                    .unwrap_or(Value::Null))
            }),
        )
        .with(
            "formatDate",
            sync_fn(|a| Ok(json!(helpers::format_date(helpers::parse_date(arg(&a, 0)))))),
        )
        .with("daysLeft", sync_fn(|a| Ok(json!(helpers::days_left(arg(&a, 0))))))
        .with(
            "isFiniteNumber",
            sync_fn(|a| Ok(json!(helpers::is_finite_number(arg(&a, 0))))),
        )
        .with(
            "validLatLng",
            sync_fn(|a| Ok(json!(helpers::valid_lat_lng(arg(&a, 0), arg(&a, 1))))),
        )
}

/// Build the baseline capability object.
pub fn baseline_capabilities(sources: BaselineSources) -> Capabilities {
    let BaselineSources {
        session,
        document,
        commands,
        modules,
        children,
        selection,
        query,
    } = sources;

    let query_value = Value::Object(
        query
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect::<Map<_, _>>(),
    );

    let is_authenticated = {
        let session = session.clone();
        sync_fn(move |_| Ok(json!(session.is_authenticated())))
    };
    let get_auth = {
        let session = session.clone();
        sync_fn(move |_| Ok(serde_json::to_value(session.auth()).unwrap_or(Value::Null)))
    };
    let refresh_auth = Capability::Func(Arc::new(RefreshAuth {
        session,
        commands: commands.clone(),
    }));
    let get_selection = sync_fn(move |_| {
        Ok(serde_json::to_value(selection.current()).unwrap_or(Value::Null))
    });
    let get_query_param = sync_fn(move |a| {
        let name = arg(&a, 0).as_str().unwrap_or_default();
        Ok(query.get(name).map_or(Value::Null, |v| json!(v)))
    });

    Capabilities::new()
        .with("isAuthenticated", is_authenticated)
        .with("getAuth", get_auth)
        .with("refreshAuth", refresh_auth)
        .with(
            "navigate",
            command_fn(&commands, |a| {
                Ok(ShellCommand::Navigate(string_arg("navigate", a, 0)?))
            }),
        )
        .with("goToLanding", command_fn(&commands, |_| Ok(ShellCommand::GoToLanding)))
        .with("getSelection", get_selection)
        .with("fetchRows", data_fn(DataOp::Fetch, &document))
        .with("getData", data_fn(DataOp::Fetch, &document))
        .with("addRow", data_fn(DataOp::Add, &document))
        .with("updateRow", data_fn(DataOp::Update, &document))
        .with("deleteRow", data_fn(DataOp::Delete, &document))
        .with("query", Capability::Value(query_value))
        .with("getQueryParam", get_query_param)
        .with("getComponent", Capability::Modules(modules))
        .with("getChildComponent", Capability::Children(children.clone()))
        .with("createChildComponent", Capability::Children(children))
        .with("helpers", Capability::Group(helper_capabilities()))
}
