//! Rowshell host document boundary
//!
//! The shell never owns storage. Everything it knows comes from a host
//! document exposing four table operations and a record-selection feed:
//!
//! ```text
//! ┌────────────────────┐   fetch / add / update / delete   ┌────────────────┐
//! │  Shell / Studio    │──────────────────────────────────►│  HostDocument  │
//! │                    │◄──────────────────────────────────│  (REST, memory)│
//! └────────────────────┘          rows (any wire shape)     └────────────────┘
//!           ▲
//!           │ latest selection (read only)
//!    ┌──────┴───────┐
//!    │ SelectionFeed│◄── host pushes the selected record / table / section
//!    └──────────────┘
//! ```

pub mod memory;
pub mod rest;
pub mod selection;

use async_trait::async_trait;
use rowshell_model::row::cell_string;
use rowshell_model::{rows_from_wire, Row, RowId};
use serde_json::Value;

pub use memory::{MemoryDocument, WireShape};
pub use rest::{GristRestDocument, RestConfig};
pub use selection::{Selection, SelectionFeed, SelectionWatch};

#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error("network error: {0}")]
    Network(String),
    #[error("http error {status}: {body}")]
    Status { status: u16, body: String },
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("unknown table `{0}`")]
    UnknownTable(String),
    #[error("no row {row_id} in table `{table}`")]
    UnknownRow { table: String, row_id: RowId },
    #[error("host unavailable: {0}")]
    Unavailable(String),
}

/// Table access offered by the embedding host.
#[async_trait]
pub trait HostDocument: Send + Sync {
    /// Fetch a whole table in whatever wire shape the host prefers.
    async fn fetch_table(&self, table: &str) -> Result<Value, HostError>;

    /// Add a row and return its id.
    async fn add_row(&self, table: &str, fields: Row) -> Result<RowId, HostError>;

    async fn update_row(&self, table: &str, row_id: RowId, fields: Row) -> Result<(), HostError>;

    async fn delete_row(&self, table: &str, row_id: RowId) -> Result<(), HostError>;

    /// Fetch a table as rows, whatever shape the host answered with.
    async fn fetch_rows(&self, table: &str) -> Result<Vec<Row>, HostError> {
        let raw = self.fetch_table(table).await?;
        Ok(rows_from_wire(raw))
    }

    /// Rows whose `column` equals `value`, in host order.
    async fn find_by_field(
        &self,
        table: &str,
        column: &str,
        value: &str,
    ) -> Result<Vec<Row>, HostError> {
        let rows = self.fetch_rows(table).await?;
        Ok(rows
            .into_iter()
            .filter(|row| cell_string(row.get(column)).as_deref() == Some(value))
            .collect())
    }
}
