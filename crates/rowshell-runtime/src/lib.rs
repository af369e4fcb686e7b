//! Rowshell runtime: the application shell
//!
//! Turns component rows of a host document into a navigable single-page
//! application:
//!
//! ```text
//!   HostDocument ──► SessionStore ──┐
//!        │                          ├──► Navigation / Landing ──► Shell (Page Host)
//!        └────────► Registry ───────┘                               │
//!                      │ compile                                    │ mount / dispose
//!                      ▼                                            ▼
//!            Compiler (Transpiler + ScriptEngine)  ◄── capabilities ── Renderer
//! ```
//!
//! - [`config`]: table/column names, parameters and landing rules
//! - [`capability`]: the capability object compiled code receives
//! - [`compiler`]: runtime compilation and child components
//! - [`registry`]: all-or-nothing component loading
//! - [`session_store`]: the single identity and logout
//! - [`navigation`]: nav entries, nav bar, mobile nav, identity widget
//! - [`landing`]: role → landing page
//! - [`inbound`]: inbound page parameters across frames
//! - [`ui_config`]: header/footer chrome with defaults
//! - [`shell`]: the Page Host state machine

pub mod capability;
pub mod compiler;
pub mod config;
pub mod inbound;
pub mod landing;
pub mod navigation;
pub mod registry;
pub mod session_store;
pub mod shell;
pub mod ui_config;

#[cfg(test)]
mod test_support;

pub use capability::{
    baseline_capabilities, merge_capabilities, sync_fn, Capabilities, Capability, CapabilityError,
    HostFn, ModuleLookup,
};
pub use compiler::{
    Bindings, ChildFactory, CompileError, Compiler, Export, FailedChild, MountHandle, MountTarget,
    Renderer, ScriptEngine, Transpiler, COMPONENT_BINDING,
};
pub use config::{ConfigError, LandingRule, ShellConfig, UiTables};
pub use inbound::InboundLocation;
pub use landing::{pick_landing_component, LandingError};
pub use navigation::{nav_entries, IdentityWidget, MobileNav, NavAction, NavEntry, NavLink, NavView};
pub use registry::{LoadSummary, Registry, RegistryError};
pub use session_store::{logout_directive, ReloadDirective, SessionStore};
pub use shell::{
    BootError, HostState, MainPanel, Notice, Shell, ShellCommand, ShellEvent, ShellServices,
    ShellView,
};
pub use ui_config::{load_ui_config, ChromeLink, Placement, UiConfig};
