//! Rowshell data model
//!
//! Rowshell turns rows of a host spreadsheet document into a navigable
//! single-page application. This crate holds the parts with no I/O:
//!
//! - [`record`]: component records (pages and shared modules) and source
//!   sanitization
//! - [`session`]: the identity derived from exactly one authorization row
//! - [`row`]: wire-shape normalization and cell coercions
//! - [`helpers`]: the helper library exposed to compiled components
//! - [`diff`]: strict application of AI-proposed unified diffs
//! - [`proposal`]: extraction of diff / full-file proposals from replies
//! - [`generation`]: tickets that let superseded async work be discarded

pub mod diff;
pub mod generation;
pub mod helpers;
pub mod proposal;
pub mod record;
pub mod row;
pub mod session;

pub use diff::apply_unified_diff;
pub use generation::{Generation, Ticket};
pub use proposal::{extract_proposal, Proposal};
pub use record::{
    sanitize_source, ComponentKind, ComponentRecord, ComponentSchema, RecordError,
    DEFAULT_NAV_ORDER,
};
pub use row::{rows_from_wire, Row, RowId};
pub use session::{AuthSchema, RoleSet, Session, SessionState};
