//! Editor Workspace: list/detail editing of component rows with an AI panel.
//!
//! ```text
//!   refresh ──► items (sorted by template id) ──► select ──► draft ──► save
//!                                                   │           ▲
//!                                          bump generation      │ apply_proposal
//!                                                   ▼           │
//!                       begin_ask ─► transport ─► apply_delta* ─► finish_ask ─► proposal
//! ```
//!
//! Every selection bumps the workspace [`Generation`]; AI work started under
//! an older selection is discarded when it comes back.

use crate::ai::{AiError, AiRequest, AiTransport, ComponentContext};
use crate::prompts::AiMode;
use crate::transcript::Transcript;
use crate::StudioError;
use rowshell_host::HostDocument;
use rowshell_model::row::{cell_i64, cell_string, row_id_of};
use rowshell_model::{
    apply_unified_diff, extract_proposal, ComponentKind, ComponentSchema, Generation, Proposal,
    Row, RowId, Ticket,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::mpsc;

pub const NEW_COMPONENT_NAME: &str = "Nouveau composant";
pub const NAV_ORDER_STEP: i64 = 10;

/// Source given to freshly created components.
pub const STARTER_SOURCE: &str = r#"const Component = () => {
  // Le code du composant

  return (
    <section className="fr-container fr-my-6w">
      <div className="fr-grid-row fr-grid-row--gutters">
        <div className="fr-col-12 fr-col-md-8">
            <p>
              Le contenu de votre composant.
            </p>
        </div>
      </div>
    </section>
  );
};"#;

/// One row of the component list.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkspaceItem {
    pub row_id: RowId,
    pub template_id: String,
    pub template_name: String,
    pub fields: Row,
}

impl WorkspaceItem {
    fn new(row_id: RowId, fields: Row, schema: &ComponentSchema) -> Self {
        Self {
            row_id,
            template_id: cell_string(fields.get(&schema.id)).unwrap_or_default(),
            template_name: cell_string(fields.get(&schema.name)).unwrap_or_default(),
            fields,
        }
    }

    fn matches(&self, needle: &str) -> bool {
        format!("{} {}", self.template_name, self.template_id)
            .to_lowercase()
            .contains(needle)
    }
}

/// State of the assistant panel.
#[derive(Debug, Clone, Default)]
pub struct AiPanel {
    pub transcript: Transcript,
    pub loading: bool,
    pub error: Option<String>,
    pub proposal: Option<Proposal>,
}

/// An AI request that has been started and not yet finished.
#[derive(Debug, Clone)]
pub struct PendingAsk {
    pub ticket: Ticket,
    pub prompt: String,
    pub streamed: bool,
    pub request: AiRequest,
}

pub struct EditorWorkspace {
    document: Arc<dyn HostDocument>,
    transport: Arc<dyn AiTransport>,
    table: String,
    schema: ComponentSchema,
    items: Vec<WorkspaceItem>,
    filter: String,
    active: Option<RowId>,
    draft: Option<Row>,
    dirty: bool,
    generation: Generation,
    ai: AiPanel,
}

impl EditorWorkspace {
    pub fn new(
        document: Arc<dyn HostDocument>,
        transport: Arc<dyn AiTransport>,
        table: &str,
        schema: ComponentSchema,
    ) -> Self {
        Self {
            document,
            transport,
            table: table.to_string(),
            schema,
            items: Vec::new(),
            filter: String::new(),
            active: None,
            draft: None,
            dirty: false,
            generation: Generation::new(),
            ai: AiPanel::default(),
        }
    }

    // ------------------------------------------------------------------
    // List
    // ------------------------------------------------------------------

    /// Reload the list. The active item survives if it still exists,
    /// otherwise the first item is selected.
    pub async fn refresh(&mut self) -> Result<(), StudioError> {
        let rows = self.document.fetch_rows(&self.table).await?;
        self.items = rows
            .into_iter()
            .filter_map(|row| match row_id_of(&row) {
                Some(row_id) => Some(WorkspaceItem::new(row_id, row, &self.schema)),
                None => {
                    tracing::warn!(table = %self.table, "skipping component row without row id");
                    None
                }
            })
            .collect();
        self.sort_items();

        let keep = self
            .active
            .is_some_and(|id| self.items.iter().any(|item| item.row_id == id));
        if !keep {
            self.select_first();
        }
        Ok(())
    }

    pub fn items(&self) -> &[WorkspaceItem] {
        &self.items
    }

    pub fn set_filter(&mut self, filter: &str) {
        self.filter = filter.to_string();
    }

    /// Items whose `name + " " + id` contains the filter, ignoring case.
    pub fn filtered(&self) -> Vec<&WorkspaceItem> {
        let needle = self.filter.trim().to_lowercase();
        self.items
            .iter()
            .filter(|item| needle.is_empty() || item.matches(&needle))
            .collect()
    }

    fn sort_items(&mut self) {
        self.items
            .sort_by_cached_key(|item| (item.template_id.to_lowercase(), item.row_id));
    }

    // ------------------------------------------------------------------
    // Selection and draft
    // ------------------------------------------------------------------

    pub fn active(&self) -> Option<RowId> {
        self.active
    }

    pub fn generation(&self) -> &Generation {
        &self.generation
    }

    pub fn select(&mut self, row_id: RowId) -> Result<(), StudioError> {
        let fields = self
            .items
            .iter()
            .find(|item| item.row_id == row_id)
            .map(|item| item.fields.clone())
            .ok_or(StudioError::UnknownRow(row_id))?;
        self.activate(Some((row_id, fields)));
        Ok(())
    }

    fn select_first(&mut self) {
        let first = self
            .items
            .first()
            .map(|item| (item.row_id, item.fields.clone()));
        self.activate(first);
    }

    fn activate(&mut self, target: Option<(RowId, Row)>) {
        self.generation.bump();
        self.ai.proposal = None;
        self.ai.error = None;
        self.ai.loading = false;
        self.dirty = false;
        match target {
            Some((row_id, fields)) => {
                tracing::debug!(row_id, "editor selection");
                self.active = Some(row_id);
                self.draft = Some(fields);
            }
            None => {
                self.active = None;
                self.draft = None;
            }
        }
    }

    pub fn draft(&self) -> Option<&Row> {
        self.draft.as_ref()
    }

    pub fn draft_code(&self) -> Option<String> {
        let draft = self.draft.as_ref()?;
        Some(cell_string(draft.get(&self.schema.source_code)).unwrap_or_default())
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn set_field(&mut self, column: &str, value: Value) -> Result<(), StudioError> {
        let draft = self.draft.as_mut().ok_or(StudioError::NoSelection)?;
        draft.insert(column.to_string(), value);
        self.dirty = true;
        Ok(())
    }

    pub fn set_code(&mut self, code: &str) -> Result<(), StudioError> {
        let column = self.schema.source_code.clone();
        self.set_field(&column, Value::String(code.to_string()))
    }

    /// Syntax mode for the code editor.
    pub fn editor_language(&self) -> &'static str {
        let source_type = self
            .draft
            .as_ref()
            .and_then(|d| cell_string(d.get(&self.schema.source_type)));
        match source_type.as_deref() {
            Some("tsx") => "typescript",
            _ => "javascript",
        }
    }

    // ------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------

    /// Write the editable columns of the draft back; missing ones as null.
    pub async fn save(&mut self) -> Result<(), StudioError> {
        let (row_id, fields) = {
            let row_id = self.active.ok_or(StudioError::NoSelection)?;
            let draft = self.draft.as_ref().ok_or(StudioError::NoSelection)?;
            let fields: Row = self
                .schema
                .editable_fields()
                .iter()
                .map(|column| {
                    let value = draft.get(*column).cloned().unwrap_or(Value::Null);
                    (column.to_string(), value)
                })
                .collect();
            (row_id, fields)
        };

        self.document
            .update_row(&self.table, row_id, fields.clone())
            .await?;

        if let Some(item) = self.items.iter_mut().find(|item| item.row_id == row_id) {
            let mut merged = item.fields.clone();
            merged.extend(fields);
            *item = WorkspaceItem::new(row_id, merged, &self.schema);
        }
        self.sort_items();
        self.dirty = false;
        tracing::info!(table = %self.table, row_id, "component saved");
        Ok(())
    }

    /// Create a component from the starter source and select it.
    pub async fn create(&mut self) -> Result<RowId, StudioError> {
        let last_order = self
            .items
            .last()
            .map(|item| cell_i64(item.fields.get(&self.schema.nav_order), 0))
            .unwrap_or(0);

        let schema = &self.schema;
        let mut fields = Row::new();
        fields.insert(schema.id.clone(), json!(uuid::Uuid::new_v4().to_string()));
        fields.insert(schema.name.clone(), json!(NEW_COMPONENT_NAME));
        fields.insert(schema.source_code.clone(), json!(STARTER_SOURCE));
        fields.insert(schema.source_type.clone(), json!("react"));
        fields.insert(schema.kind.clone(), json!(ComponentKind::Page.as_str()));
        fields.insert(schema.show_in_nav.clone(), json!(true));
        fields.insert(schema.nav_order.clone(), json!(last_order + NAV_ORDER_STEP));
        fields.insert(schema.is_default.clone(), json!(false));
        fields.insert(schema.requires_auth.clone(), json!(false));

        let row_id = self.document.add_row(&self.table, fields.clone()).await?;
        tracing::info!(table = %self.table, row_id, "component created");

        self.items
            .push(WorkspaceItem::new(row_id, fields.clone(), &self.schema));
        self.sort_items();
        self.activate(Some((row_id, fields)));
        Ok(row_id)
    }

    /// Delete the active component and select the first remaining one.
    pub async fn delete(&mut self) -> Result<(), StudioError> {
        let row_id = self.active.ok_or(StudioError::NoSelection)?;
        self.document.delete_row(&self.table, row_id).await?;
        tracing::info!(table = %self.table, row_id, "component deleted");
        self.items.retain(|item| item.row_id != row_id);
        self.select_first();
        Ok(())
    }

    // ------------------------------------------------------------------
    // Assistant
    // ------------------------------------------------------------------

    pub fn ai(&self) -> &AiPanel {
        &self.ai
    }

    pub fn clear_transcript(&mut self) {
        self.ai.transcript.clear();
    }

    fn component_context(&self) -> Option<ComponentContext> {
        let draft = self.draft.as_ref()?;
        let text = |column: &str| cell_string(draft.get(column)).unwrap_or_default();
        Some(ComponentContext {
            name: text(&self.schema.name),
            source_type: cell_string(draft.get(&self.schema.source_type))
                .unwrap_or_else(|| "react".to_string()),
            code: text(&self.schema.source_code),
            template_id: text(&self.schema.id),
        })
    }

    /// Start an AI request for the active component.
    ///
    /// A streamed request shows the user turn right away; a buffered one
    /// records it together with the reply.
    pub fn begin_ask(
        &mut self,
        prompt: &str,
        mode: AiMode,
        streamed: bool,
    ) -> Result<PendingAsk, StudioError> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(StudioError::EmptyPrompt);
        }
        if self.ai.loading {
            return Err(StudioError::Busy);
        }
        let component = self.component_context().ok_or(StudioError::NoSelection)?;
        let request = AiRequest::new(mode, component, self.ai.transcript.turns(), prompt);

        self.ai.loading = true;
        self.ai.error = None;
        if streamed {
            self.ai.transcript.push_user(prompt);
        }
        Ok(PendingAsk {
            ticket: self.generation.ticket(),
            prompt: prompt.to_string(),
            streamed,
            request,
        })
    }

    /// Show streamed progress. False when the request was superseded.
    pub fn apply_delta(&mut self, ticket: Ticket, accumulated: &str) -> bool {
        if !self.generation.is_current(ticket) {
            return false;
        }
        self.ai.transcript.apply_delta(accumulated);
        true
    }

    /// Record the outcome of `pending` and extract its proposal.
    ///
    /// A failure keeps the transcript and sets the panel error. A reply
    /// without a fenced block leaves any earlier proposal in place.
    pub fn finish_ask(
        &mut self,
        pending: PendingAsk,
        result: Result<String, AiError>,
    ) -> Result<Option<Proposal>, StudioError> {
        if !self.generation.is_current(pending.ticket) {
            tracing::debug!(mode = pending.request.mode.as_str(), "discarding superseded AI reply");
            return Err(StudioError::Superseded);
        }
        self.ai.loading = false;

        let reply = match result {
            Ok(reply) => reply,
            Err(err) => {
                tracing::warn!(error = %err, "AI request failed");
                self.ai.error = Some(err.to_string());
                return Err(err.into());
            }
        };

        if pending.streamed {
            self.ai.transcript.apply_delta(&reply);
        } else {
            self.ai.transcript.push_user(&pending.prompt);
            self.ai.transcript.push_assistant(&reply);
        }

        let proposal = extract_proposal(&reply);
        if let Some(found) = &proposal {
            self.ai.proposal = Some(found.clone());
        }
        Ok(proposal)
    }

    /// Buffered round trip.
    pub async fn ask(&mut self, prompt: &str, mode: AiMode) -> Result<Option<Proposal>, StudioError> {
        let pending = self.begin_ask(prompt, mode, false)?;
        let result = self.transport.ask(&pending.request).await;
        self.finish_ask(pending, result)
    }

    /// Streamed round trip; the transcript follows the reply as it arrives.
    pub async fn ask_stream(
        &mut self,
        prompt: &str,
        mode: AiMode,
    ) -> Result<Option<Proposal>, StudioError> {
        let pending = self.begin_ask(prompt, mode, true)?;
        let (progress, mut updates) = mpsc::unbounded_channel();
        let transport = Arc::clone(&self.transport);
        let request = pending.request.clone();
        let task = tokio::spawn(async move { transport.ask_stream(&request, progress).await });

        while let Some(accumulated) = updates.recv().await {
            self.apply_delta(pending.ticket, &accumulated);
        }
        let result = match task.await {
            Ok(result) => result,
            Err(err) => Err(AiError::Network(format!("stream task failed: {err}"))),
        };
        self.finish_ask(pending, result)
    }

    /// Send the canned prompt of a quick action.
    pub async fn quick_action(&mut self, mode: AiMode) -> Result<Option<Proposal>, StudioError> {
        let prompt = mode.quick_prompt().ok_or(StudioError::EmptyPrompt)?;
        self.ask(prompt, mode).await
    }

    // ------------------------------------------------------------------
    // Proposals
    // ------------------------------------------------------------------

    /// `(original, modified)` for a side-by-side view. A diff that does not
    /// apply shows the original on both sides.
    pub fn preview(&self) -> Option<(String, String)> {
        let proposal = self.ai.proposal.as_ref()?;
        let original = self.draft_code()?;
        let modified = match proposal {
            Proposal::Full(code) => code.clone(),
            Proposal::Diff(diff) => {
                apply_unified_diff(&original, diff).unwrap_or_else(|| original.clone())
            }
        };
        Some((original, modified))
    }

    /// Put the proposal into the draft. The draft is untouched when a diff
    /// does not apply.
    pub fn apply_proposal(&mut self) -> Result<(), StudioError> {
        let proposal = self.ai.proposal.clone().ok_or(StudioError::NoProposal)?;
        let original = self.draft_code().ok_or(StudioError::NoSelection)?;
        let updated = match proposal {
            Proposal::Full(code) => code,
            Proposal::Diff(diff) => match apply_unified_diff(&original, &diff) {
                Some(updated) => updated,
                None => {
                    let err = StudioError::DiffNotApplicable;
                    self.ai.error = Some(err.to_string());
                    return Err(err);
                }
            },
        };
        self.set_code(&updated)
    }
}
