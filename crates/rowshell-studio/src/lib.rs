//! Rowshell studio: the component editor
//!
//! Edits the component rows the shell runs, with an assistant that proposes
//! changes as a full file or a strict unified diff:
//!
//! ```text
//!   HostDocument ◄── refresh / save / create / delete ── EditorWorkspace
//!                                                          │      ▲
//!                                           AiRequest      │      │ reply (buffered or streamed)
//!                                                          ▼      │
//!                                                     AiTransport (AiClient over HTTP)
//! ```
//!
//! - [`workspace`]: list, selection, draft, persistence, proposals
//! - [`ai`]: endpoint configuration, request body, stream decoding, HTTP client
//! - [`transcript`]: the running chat
//! - [`prompts`]: request modes and quick prompts

pub mod ai;
pub mod prompts;
pub mod transcript;
pub mod workspace;

use rowshell_host::HostError;
use rowshell_model::RowId;

pub use ai::{
    parse_sse_line, AiClient, AiConfig, AiError, AiRequest, AiTransport, ComponentContext,
    LineBuffer, StreamAccumulator, StreamEvent,
};
pub use prompts::AiMode;
pub use transcript::{ChatTurn, Role, Transcript};
pub use workspace::{AiPanel, EditorWorkspace, PendingAsk, WorkspaceItem, STARTER_SOURCE};

#[derive(Debug, thiserror::Error)]
pub enum StudioError {
    #[error(transparent)]
    Host(#[from] HostError),
    #[error(transparent)]
    Ai(#[from] AiError),
    #[error("no component selected")]
    NoSelection,
    #[error("no component with row id {0}")]
    UnknownRow(RowId),
    #[error("empty prompt")]
    EmptyPrompt,
    #[error("an AI request is already running")]
    Busy,
    #[error("the selection changed while the AI request was running")]
    Superseded,
    #[error("no proposal to apply")]
    NoProposal,
    #[error("the diff does not apply to the current source; ask the assistant for the complete file instead")]
    DiffNotApplicable,
}
