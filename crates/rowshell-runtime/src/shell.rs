//! Page Host: the application controller.
//!
//! ```text
//!            request(id)                      request(id), auth ok
//!   Idle ───────────────► Gated(id) ─────────────────────────► Mounted(id)
//!     │                     ▲   │ retry: session now present      ▲
//!     │                     │   └─────────────────────────────────┘
//!     └─────────────────────┴──────── request(id) ────────────────┘
//! ```
//!
//! Lifecycle is `new → init → ready → (commands)`. Nothing is processed
//! before `init` succeeds. Superseding actions bump a generation counter;
//! async results carry the ticket they started with and are dropped when
//! stale.

use crate::capability::{baseline_capabilities, BaselineSources, Capabilities, ModuleLookup};
use crate::compiler::{
    ChildFactory, CompileError, Compiler, MountHandle, MountTarget, Renderer, ScriptEngine,
    Transpiler,
};
use crate::config::ShellConfig;
use crate::inbound::InboundLocation;
use crate::landing::{pick_landing_component, LandingError};
use crate::navigation::{nav_entries, IdentityWidget, MobileNav, NavAction, NavView};
use crate::registry::{Registry, RegistryError};
use crate::session_store::{logout_directive, ReloadDirective, SessionStore};
use crate::ui_config::{load_ui_config, UiConfig};
use rowshell_host::{HostDocument, SelectionWatch};
use rowshell_model::{ComponentRecord, Generation, Session, Ticket};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Debug, thiserror::Error)]
pub enum BootError {
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error("no public page is marked as default (column `{column}`)")]
    NoDefaultPage { column: String },
    #[error(transparent)]
    Landing(#[from] LandingError),
}

impl BootError {
    /// Title of the full-page error panel.
    pub fn title(&self) -> &'static str {
        match self {
            Self::Registry(RegistryError::Fetch(_)) => "Erreur initialisation",
            _ => "Configuration",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "page_id", rename_all = "snake_case")]
pub enum HostState {
    Idle,
    Gated(String),
    Mounted(String),
}

/// What occupies the main content region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "panel", rename_all = "snake_case")]
pub enum MainPanel {
    Empty,
    Page { page_id: String, container_id: String },
    /// Compile or render failure scoped to one page.
    ComponentError { page_id: String, message: String },
    /// Access gate for a protected page; offers login and retry.
    Gate { page_id: String, page_name: String, login_page: String },
    /// Boot failure; nothing else is processed.
    Fatal { title: String, message: String },
}

/// Dismissable message shown outside the main region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub title: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShellView {
    pub loading: bool,
    pub chrome: UiConfig,
    pub nav: NavView,
    pub mobile_nav: MobileNav,
    pub identity: IdentityWidget,
    pub main: MainPanel,
    pub notice: Option<Notice>,
}

impl Default for ShellView {
    fn default() -> Self {
        Self {
            loading: true,
            chrome: UiConfig::default(),
            nav: NavView::default(),
            mobile_nav: MobileNav::default(),
            identity: IdentityWidget::default(),
            main: MainPanel::Empty,
            notice: None,
        }
    }
}

/// Requests routed to the shell from compiled code and async tasks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    Navigate(String),
    GoToLanding,
    SessionChanged,
    GateRetried(Ticket),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShellEvent {
    Ready,
    BootFailed { message: String },
    Mounted { page_id: String },
    RenderFailed { page_id: String, message: String },
    Gated { page_id: String },
    NotFound { page_id: String },
    SessionChanged { authenticated: bool },
}

pub type ShellEventHandler = Box<dyn Fn(ShellEvent) + Send + Sync>;

/// Collaborators supplied by the embedding host.
pub struct ShellServices {
    pub document: Arc<dyn HostDocument>,
    pub transpiler: Arc<dyn Transpiler>,
    pub engine: Arc<dyn ScriptEngine>,
    pub renderer: Arc<dyn Renderer>,
    pub selection: SelectionWatch,
    pub location: InboundLocation,
}

pub struct Shell {
    config: ShellConfig,
    document: Arc<dyn HostDocument>,
    renderer: Arc<dyn Renderer>,
    compiler: Arc<Compiler>,
    session: SessionStore,
    registry: Registry,
    location: InboundLocation,
    ready: bool,
    state: HostState,
    current_component: Option<String>,
    mount: Option<Box<dyn MountHandle>>,
    view: ShellView,
    generation: Generation,
    commands: mpsc::UnboundedSender<ShellCommand>,
    inbox: mpsc::UnboundedReceiver<ShellCommand>,
    event_handlers: Vec<ShellEventHandler>,
}

impl Shell {
    pub fn new(config: ShellConfig, services: ShellServices) -> Self {
        let ShellServices {
            document,
            transpiler,
            engine,
            renderer,
            selection,
            location,
        } = services;

        let compiler = Arc::new(Compiler::new(transpiler, engine));
        let modules = ModuleLookup::new();
        let session = SessionStore::new(Arc::clone(&document), &config);
        let (commands, inbox) = mpsc::unbounded_channel();

        let children = ChildFactory::new(
            &compiler,
            Arc::clone(&document),
            &config.components_table,
            config.components.clone(),
        );
        compiler.set_base(baseline_capabilities(BaselineSources {
            session: session.clone(),
            document: Arc::clone(&document),
            commands: commands.clone(),
            modules: modules.clone(),
            children,
            selection,
            query: location.merged_params(),
        }));

        Self {
            config,
            document,
            renderer,
            compiler,
            session,
            registry: Registry::new(modules),
            location,
            ready: false,
            state: HostState::Idle,
            current_component: None,
            mount: None,
            view: ShellView::default(),
            generation: Generation::new(),
            commands,
            inbox,
            event_handlers: Vec::new(),
        }
    }

    pub fn on_event(&mut self, handler: ShellEventHandler) {
        self.event_handlers.push(handler);
    }

    fn emit(&self, event: ShellEvent) {
        for handler in &self.event_handlers {
            handler(event.clone());
        }
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn state(&self) -> &HostState {
        &self.state
    }

    pub fn current_component(&self) -> Option<&str> {
        self.current_component.as_deref()
    }

    pub fn view(&self) -> &ShellView {
        &self.view
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    pub fn config(&self) -> &ShellConfig {
        &self.config
    }

    /// Baseline capability object handed to compiled code.
    pub fn capabilities(&self) -> Capabilities {
        self.compiler.base()
    }

    /// Sender for `data-nav` style hooks living outside the shell.
    pub fn command_sender(&self) -> mpsc::UnboundedSender<ShellCommand> {
        self.commands.clone()
    }

    pub fn generation(&self) -> Ticket {
        self.generation.ticket()
    }

    // ------------------------------------------------------------------------
    // Boot
    // ------------------------------------------------------------------------

    /// Load session, chrome and registry, then mount the first page.
    ///
    /// On failure the fatal panel is shown and the shell stays not ready.
    pub async fn init(&mut self) -> Result<(), BootError> {
        self.ready = false;
        self.view.loading = true;

        self.session.load_auth().await;
        self.view.chrome = load_ui_config(self.document.as_ref(), &self.config.ui_tables).await;

        if let Err(err) = self
            .registry
            .load(self.document.as_ref(), &self.config, &self.compiler)
            .await
        {
            let err = BootError::from(err);
            self.fail(&err);
            return Err(err);
        }

        self.refresh_chrome();
        self.view.loading = false;
        self.ready = true;
        self.emit(ShellEvent::Ready);

        if let Err(err) = self.load_default() {
            self.fail(&err);
            return Err(err);
        }
        tracing::info!(page = ?self.current_component, "shell ready");
        Ok(())
    }

    /// Rebuild everything from the host document, as a page reload would.
    pub async fn reload(&mut self) -> Result<(), BootError> {
        self.dispose_mount();
        self.state = HostState::Idle;
        self.current_component = None;
        self.view.notice = None;
        self.init().await
    }

    fn fail(&mut self, err: &BootError) {
        tracing::error!(error = %err, "initialization failed");
        self.ready = false;
        self.dispose_mount();
        if matches!(err, BootError::Registry(_)) {
            self.registry.clear();
        }
        self.state = HostState::Idle;
        self.view.loading = false;
        self.view.main = MainPanel::Fatal {
            title: err.title().to_string(),
            message: err.to_string(),
        };
        self.refresh_chrome();
        self.emit(ShellEvent::BootFailed {
            message: err.to_string(),
        });
    }

    /// Pick the first page: an explicit inbound page if registered, else the
    /// role landing page, else the public default.
    pub fn load_default(&mut self) -> Result<(), BootError> {
        if let Some(page_id) = self.location.requested_page(&self.config.page_params) {
            if self.registry.contains_page(&page_id) {
                self.request(&page_id);
                return Ok(());
            }
            tracing::debug!(page_id = %page_id, "inbound page not registered, ignoring");
        }

        if let Some(page_id) = self.landing_page()? {
            self.request(&page_id);
            return Ok(());
        }

        let page_id = self
            .registry
            .default_page()
            .map(|p| p.id.clone())
            .ok_or_else(|| BootError::NoDefaultPage {
                column: self.config.components.is_default.clone(),
            })?;
        self.request(&page_id);
        Ok(())
    }

    fn landing_page(&self) -> Result<Option<String>, LandingError> {
        let auth = self.session.auth();
        let registry = &self.registry;
        let rule = pick_landing_component(auth.as_ref(), &self.config.landing, |id| {
            registry.contains_page(id)
        })?;
        Ok(rule.map(|r| r.page_id.clone()))
    }

    // ------------------------------------------------------------------------
    // Navigation
    // ------------------------------------------------------------------------

    /// Navigate to `page_id`. Ignored until the shell is ready.
    pub fn request(&mut self, page_id: &str) -> &HostState {
        if !self.ready {
            tracing::debug!(page_id = %page_id, "navigation before ready, ignored");
            return &self.state;
        }

        let Some(record) = self.registry.page(page_id).cloned() else {
            tracing::debug!(page_id = %page_id, "navigation target not found");
            self.view.notice = Some(Notice {
                title: "Composant introuvable".to_string(),
                message: format!("ID: {page_id}"),
            });
            self.emit(ShellEvent::NotFound {
                page_id: page_id.to_string(),
            });
            return &self.state;
        };
        self.generation.bump();

        if record.requires_auth && !self.session.is_authenticated() {
            self.show_gate(&record);
            return &self.state;
        }

        self.mount_page(&record);
        &self.state
    }

    fn show_gate(&mut self, record: &ComponentRecord) {
        tracing::debug!(page_id = %record.id, "access gate");
        self.dispose_mount();
        self.view.nav.clear_active();
        self.view.mobile_nav.clear_active();
        self.view.main = MainPanel::Gate {
            page_id: record.id.clone(),
            page_name: record.name.clone(),
            login_page: self.config.login_page.clone(),
        };
        self.state = HostState::Gated(record.id.clone());
        self.emit(ShellEvent::Gated {
            page_id: record.id.clone(),
        });
    }

    fn mount_page(&mut self, record: &ComponentRecord) {
        self.dispose_mount();
        self.view.notice = None;

        let target = MountTarget::main(&record.id);
        let mounted = self
            .compiler
            .compile(
                &record.id,
                &record.source_code,
                &record.source_type,
                &Capabilities::new(),
            )
            .and_then(|export| {
                self.renderer
                    .mount(&export, &target)
                    .map_err(|message| CompileError::Render {
                        id: record.id.clone(),
                        message,
                    })
            });

        match mounted {
            Ok(handle) => {
                self.mount = Some(handle);
                self.view.main = MainPanel::Page {
                    page_id: record.id.clone(),
                    container_id: target.container_id,
                };
                self.emit(ShellEvent::Mounted {
                    page_id: record.id.clone(),
                });
            }
            Err(err) => {
                tracing::warn!(component_id = %record.id, error = %err, "page failed to render");
                self.view.main = MainPanel::ComponentError {
                    page_id: record.id.clone(),
                    message: err.to_string(),
                };
                self.emit(ShellEvent::RenderFailed {
                    page_id: record.id.clone(),
                    message: err.to_string(),
                });
            }
        }

        self.view.nav.mark_active(&record.id);
        self.view.mobile_nav.mark_active(&record.id);
        self.state = HostState::Mounted(record.id.clone());
        self.current_component = Some(record.id.clone());
        tracing::debug!(page_id = %record.id, "mounted");
    }

    fn dispose_mount(&mut self) {
        if let Some(handle) = self.mount.take() {
            handle.dispose();
        }
    }

    pub fn dismiss_notice(&mut self) {
        self.view.notice = None;
    }

    /// Send a signed-in visitor to their role landing page.
    pub fn go_to_landing(&mut self) {
        if !self.ready {
            return;
        }
        match self.landing_page() {
            Ok(Some(page_id)) => {
                self.request(&page_id);
            }
            Ok(None) => tracing::debug!("no landing page for an anonymous visitor"),
            Err(err) => {
                tracing::warn!(error = %err, "landing failed");
                self.view.notice = Some(Notice {
                    title: "Configuration".to_string(),
                    message: err.to_string(),
                });
            }
        }
    }

    /// Act on a nav-bar, identity-widget or mobile-nav action.
    pub fn activate(&mut self, action: &NavAction) -> Option<ReloadDirective> {
        match action {
            NavAction::Login { page_id } | NavAction::Space { page_id, .. } => {
                self.request(page_id);
                None
            }
            NavAction::Separator => None,
            NavAction::Logout => Some(self.logout()),
        }
    }

    // ------------------------------------------------------------------------
    // Session
    // ------------------------------------------------------------------------

    /// Re-check the session from the gate; mounts the gated page when the
    /// visitor is now signed in and nothing superseded the retry.
    pub async fn retry_gate(&mut self) {
        let ticket = self.generation.ticket();
        self.session.load_auth().await;
        self.session_changed();
        self.finish_gate_retry(ticket);
    }

    /// Run the gate retry's session load off the shell; the outcome comes
    /// back as [`ShellCommand::GateRetried`].
    pub fn spawn_gate_retry(&self) -> tokio::task::JoinHandle<()> {
        let ticket = self.generation.ticket();
        let session = self.session.clone();
        let commands = self.commands.clone();
        tokio::spawn(async move {
            session.load_auth().await;
            // The shell may be gone; nothing left to update then.
            let _ = commands.send(ShellCommand::GateRetried(ticket));
        })
    }

    fn finish_gate_retry(&mut self, ticket: Ticket) {
        if !self.generation.is_current(ticket) {
            tracing::debug!("stale gate retry discarded");
            return;
        }
        if let HostState::Gated(page_id) = self.state.clone() {
            if self.session.is_authenticated() {
                self.request(&page_id);
            }
        }
    }

    pub async fn refresh_auth(&mut self) -> Option<Session> {
        let auth = self.session.load_auth().await;
        self.session_changed();
        auth
    }

    /// Forget the session and tell the embedder how to reload without the
    /// access token.
    pub fn logout(&mut self) -> ReloadDirective {
        self.session.clear();
        self.session_changed();
        let directive = logout_directive(self.location.top_url(), &self.config.token_param);
        tracing::info!(?directive, "logout");
        directive
    }

    fn session_changed(&mut self) {
        self.refresh_chrome();
        self.emit(ShellEvent::SessionChanged {
            authenticated: self.session.is_authenticated(),
        });
    }

    /// Recompute navigation and identity chrome from the current session and
    /// registry.
    pub fn refresh_chrome(&mut self) {
        let auth = self.session.auth();
        let registry = &self.registry;
        let has_page = |id: &str| registry.contains_page(id);
        let active = match &self.state {
            HostState::Mounted(id) => Some(id.as_str()),
            _ => None,
        };

        let entries = nav_entries(registry.pages(), auth.is_some());
        let nav = NavView::render(&entries, active);
        let mobile_nav = MobileNav::render(
            &nav,
            auth.as_ref(),
            &self.config.landing,
            has_page,
            &self.config.login_page,
        );
        let identity = IdentityWidget::render(
            auth.as_ref(),
            &self.config.landing,
            has_page,
            &self.config.login_page,
        );

        self.view.nav = nav;
        self.view.mobile_nav = mobile_nav;
        self.view.identity = identity;
    }

    // ------------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------------

    pub fn handle_command(&mut self, command: ShellCommand) {
        match command {
            ShellCommand::Navigate(page_id) => {
                self.request(&page_id);
            }
            ShellCommand::GoToLanding => self.go_to_landing(),
            ShellCommand::SessionChanged => self.session_changed(),
            ShellCommand::GateRetried(ticket) => {
                self.session_changed();
                self.finish_gate_retry(ticket);
            }
        }
    }

    /// Apply every queued command. Returns how many were handled.
    pub fn process_pending(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(command) = self.inbox.try_recv() {
            self.handle_command(command);
            handled += 1;
        }
        handled
    }

    /// Wait for the next command and apply it.
    pub async fn process_next(&mut self) {
        if let Some(command) = self.inbox.recv().await {
            self.handle_command(command);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{row, FakeEngine, FakeRenderer, FakeTranspiler};
    use parking_lot::Mutex;
    use rowshell_host::MemoryDocument;
    use serde_json::{json, Value};

    fn component(id: &str, extra: Value) -> rowshell_model::Row {
        let mut base = row(json!({
            "template_id": id,
            "template_name": id.to_uppercase(),
            "component_code": format!("const Component = () => '{id}';"),
            "show_in_nav": true,
        }));
        base.extend(row(extra));
        base
    }

    fn document(auth_rows: Vec<rowshell_model::Row>) -> MemoryDocument {
        MemoryDocument::new()
            .with_rows(
                "Application_Composants",
                vec![
                    component("home", json!({"default_component": true, "nav_order": 1})),
                    component("private", json!({"requires_auth": true, "nav_order": 2})),
                    component("broken", json!({"component_code": "throw 1; Component"})),
                    component("espace-repondant", json!({"requires_auth": true, "show_in_nav": false})),
                    component("login", json!({"show_in_nav": false})),
                ],
            )
            .with_rows("AuthLink", auth_rows)
    }

    fn shell_with(doc: MemoryDocument, location: InboundLocation) -> (Shell, FakeRenderer) {
        let renderer = FakeRenderer::default();
        let shell = Shell::new(
            ShellConfig::default(),
            ShellServices {
                document: Arc::new(doc),
                transpiler: Arc::new(FakeTranspiler),
                engine: Arc::new(FakeEngine),
                renderer: Arc::new(renderer.clone()),
                selection: SelectionWatch::detached(),
                location,
            },
        );
        (shell, renderer)
    }

    fn repondant() -> rowshell_model::Row {
        row(json!({"Email": "r@x.fr", "Roles": ["L", "repondant"]}))
    }

    #[tokio::test]
    async fn anonymous_boot_mounts_default() {
        let (mut shell, renderer) = shell_with(document(vec![]), InboundLocation::default());
        shell.init().await.unwrap();

        assert!(shell.is_ready());
        assert_eq!(shell.state(), &HostState::Mounted("home".to_string()));
        assert_eq!(shell.view().nav.active(), ["home"]);
        assert_eq!(renderer.entries(), ["mount:react-container-home"]);
        assert_eq!(shell.view().identity.account_label, None);
    }

    #[tokio::test]
    async fn signed_in_boot_lands_on_role_page() {
        let (mut shell, _) = shell_with(document(vec![repondant()]), InboundLocation::default());
        shell.init().await.unwrap();
        assert_eq!(shell.current_component(), Some("espace-repondant"));
    }

    #[tokio::test]
    async fn inbound_page_bypasses_landing() {
        let location = InboundLocation::from_current("https://w.example/?page=login");
        let (mut shell, _) = shell_with(document(vec![repondant()]), location);
        shell.init().await.unwrap();
        assert_eq!(shell.current_component(), Some("login"));
    }

    #[tokio::test]
    async fn inbound_page_still_gated() {
        let location = InboundLocation::from_current("https://w.example/?id=private");
        let (mut shell, _) = shell_with(document(vec![]), location);
        shell.init().await.unwrap();
        assert_eq!(shell.state(), &HostState::Gated("private".to_string()));
    }

    #[tokio::test]
    async fn gated_request_keeps_current_component() {
        let (mut shell, renderer) = shell_with(document(vec![]), InboundLocation::default());
        shell.init().await.unwrap();

        shell.request("private");
        assert_eq!(shell.state(), &HostState::Gated("private".to_string()));
        assert_eq!(shell.current_component(), Some("home"));
        assert!(matches!(shell.view().main, MainPanel::Gate { .. }));
        assert_eq!(
            renderer.entries(),
            ["mount:react-container-home", "dispose:react-container-home"]
        );
    }

    #[tokio::test]
    async fn gate_leaves_no_active_nav_link() {
        let (mut shell, _) = shell_with(document(vec![]), InboundLocation::default());
        shell.init().await.unwrap();
        assert_eq!(shell.view().nav.active(), ["home"]);

        shell.request("private");
        assert!(shell.view().nav.active().is_empty());
        assert!(shell.view().mobile_nav.links.iter().all(|l| !l.active));

        let gated = shell.view().clone();
        shell.refresh_chrome();
        assert_eq!(&gated, shell.view());
    }

    #[tokio::test]
    async fn unknown_page_keeps_gate_retry_current() {
        let doc = Arc::new(document(vec![]));
        let mut shell = Shell::new(
            ShellConfig::default(),
            ShellServices {
                document: doc.clone(),
                transpiler: Arc::new(FakeTranspiler),
                engine: Arc::new(FakeEngine),
                renderer: Arc::new(FakeRenderer::default()),
                selection: SelectionWatch::detached(),
                location: InboundLocation::default(),
            },
        );
        shell.init().await.unwrap();
        shell.request("private");
        doc.add_row("AuthLink", repondant()).await.unwrap();

        let retry = shell.spawn_gate_retry();
        shell.request("nope");
        retry.await.unwrap();

        assert_eq!(shell.process_pending(), 1);
        assert_eq!(shell.state(), &HostState::Mounted("private".to_string()));
    }

    #[tokio::test]
    async fn unknown_page_leaves_mount_untouched() {
        let (mut shell, renderer) = shell_with(document(vec![]), InboundLocation::default());
        shell.init().await.unwrap();

        shell.request("nope");
        assert_eq!(shell.state(), &HostState::Mounted("home".to_string()));
        assert!(matches!(shell.view().main, MainPanel::Page { .. }));
        assert_eq!(shell.view().notice.as_ref().map(|n| n.message.as_str()), Some("ID: nope"));
        assert_eq!(renderer.entries().len(), 1);

        shell.dismiss_notice();
        assert!(shell.view().notice.is_none());
    }

    #[tokio::test]
    async fn broken_page_renders_inline_error() {
        let (mut shell, _) = shell_with(document(vec![]), InboundLocation::default());
        shell.init().await.unwrap();

        shell.request("broken");
        assert_eq!(shell.state(), &HostState::Mounted("broken".to_string()));
        assert!(matches!(
            &shell.view().main,
            MainPanel::ComponentError { page_id, .. } if page_id == "broken"
        ));
        // The shell keeps working.
        shell.request("home");
        assert!(matches!(shell.view().main, MainPanel::Page { .. }));
    }

    #[tokio::test]
    async fn request_before_ready_is_ignored() {
        let (mut shell, renderer) = shell_with(document(vec![]), InboundLocation::default());
        assert_eq!(shell.request("home"), &HostState::Idle);
        assert!(renderer.entries().is_empty());
    }

    #[tokio::test]
    async fn empty_registry_is_fatal() {
        let doc = MemoryDocument::new()
            .with_rows("Application_Composants", vec![])
            .with_rows("AuthLink", vec![]);
        let (mut shell, _) = shell_with(doc, InboundLocation::default());
        let err = shell.init().await.unwrap_err();

        assert!(matches!(err, BootError::Registry(RegistryError::Empty { .. })));
        assert!(!shell.is_ready());
        assert!(matches!(shell.view().main, MainPanel::Fatal { .. }));
        assert_eq!(shell.request("home"), &HostState::Idle);
    }

    #[tokio::test]
    async fn missing_default_page_is_fatal() {
        let doc = MemoryDocument::new()
            .with_rows("Application_Composants", vec![component("a", json!({}))])
            .with_rows("AuthLink", vec![]);
        let (mut shell, _) = shell_with(doc, InboundLocation::default());
        let err = shell.init().await.unwrap_err();
        assert!(matches!(err, BootError::NoDefaultPage { .. }));
        assert!(!shell.is_ready());
    }

    #[tokio::test]
    async fn failed_reload_clears_registry() {
        let doc = Arc::new(document(vec![]));
        let renderer = FakeRenderer::default();
        let mut shell = Shell::new(
            ShellConfig::default(),
            ShellServices {
                document: doc.clone(),
                transpiler: Arc::new(FakeTranspiler),
                engine: Arc::new(FakeEngine),
                renderer: Arc::new(renderer),
                selection: SelectionWatch::detached(),
                location: InboundLocation::default(),
            },
        );
        shell.init().await.unwrap();
        assert!(!shell.registry().is_empty());

        doc.fail_table("Application_Composants");
        assert!(shell.reload().await.is_err());
        assert!(shell.registry().is_empty());
        assert!(!shell.is_ready());
        assert!(shell.view().nav.links.is_empty());
    }

    #[tokio::test]
    async fn retry_gate_mounts_after_sign_in() {
        let doc = Arc::new(document(vec![]));
        let mut shell = Shell::new(
            ShellConfig::default(),
            ShellServices {
                document: doc.clone(),
                transpiler: Arc::new(FakeTranspiler),
                engine: Arc::new(FakeEngine),
                renderer: Arc::new(FakeRenderer::default()),
                selection: SelectionWatch::detached(),
                location: InboundLocation::default(),
            },
        );
        shell.init().await.unwrap();
        shell.request("private");

        shell.retry_gate().await;
        assert_eq!(shell.state(), &HostState::Gated("private".to_string()));

        doc.add_row("AuthLink", repondant()).await.unwrap();
        shell.retry_gate().await;
        assert_eq!(shell.state(), &HostState::Mounted("private".to_string()));
        assert!(shell.view().identity.account_label.is_some());
    }

    #[tokio::test]
    async fn stale_gate_retry_is_discarded() {
        let doc = Arc::new(document(vec![]));
        let mut shell = Shell::new(
            ShellConfig::default(),
            ShellServices {
                document: doc.clone(),
                transpiler: Arc::new(FakeTranspiler),
                engine: Arc::new(FakeEngine),
                renderer: Arc::new(FakeRenderer::default()),
                selection: SelectionWatch::detached(),
                location: InboundLocation::default(),
            },
        );
        shell.init().await.unwrap();
        shell.request("private");
        doc.add_row("AuthLink", repondant()).await.unwrap();

        // The retry task does not run until the test yields, so this second
        // request supersedes it while the session is still anonymous.
        let retry = shell.spawn_gate_retry();
        shell.request("private");
        retry.await.unwrap();

        assert_eq!(shell.process_pending(), 1);
        assert!(shell.session().is_authenticated());
        assert_eq!(shell.state(), &HostState::Gated("private".to_string()));

        // A fresh retry is current and mounts.
        let retry = shell.spawn_gate_retry();
        retry.await.unwrap();
        shell.process_pending();
        assert_eq!(shell.state(), &HostState::Mounted("private".to_string()));
    }

    #[tokio::test]
    async fn navigate_capability_routes_through_request() {
        let (mut shell, _) = shell_with(document(vec![]), InboundLocation::default());
        shell.init().await.unwrap();

        let caps = shell.capabilities();
        caps.call("navigate", vec![json!("login")]).await.unwrap();
        assert_eq!(shell.current_component(), Some("home"));
        shell.process_pending();
        assert_eq!(shell.current_component(), Some("login"));
    }

    #[tokio::test]
    async fn logout_strips_token_and_updates_chrome() {
        let location = InboundLocation {
            current: Some("https://w.example/widget".to_string()),
            frame: Some("https://doc.example/d?Token_=s3cr3t&x=1".to_string()),
            referrer: None,
        };
        let (mut shell, _) = shell_with(document(vec![repondant()]), location);
        shell.init().await.unwrap();
        assert!(shell.view().nav.links.iter().any(|l| l.id == "private"));

        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        shell.on_event(Box::new(move |e| sink.lock().push(e)));

        let directive = shell
            .activate(&NavAction::Logout)
            .expect("logout yields a directive");
        assert_eq!(
            directive,
            ReloadDirective::Navigate("https://doc.example/d?x=1".to_string())
        );
        assert!(!shell.view().nav.links.iter().any(|l| l.id == "private"));
        assert_eq!(
            events.lock().as_slice(),
            [ShellEvent::SessionChanged { authenticated: false }]
        );
    }

    #[tokio::test]
    async fn chrome_refresh_is_idempotent() {
        let (mut shell, _) = shell_with(document(vec![repondant()]), InboundLocation::default());
        shell.init().await.unwrap();
        shell.request("private");

        shell.refresh_chrome();
        let first = shell.view().clone();
        shell.refresh_chrome();
        assert_eq!(&first, shell.view());
        assert_eq!(first.nav.active(), ["private"]);
    }
}
