//! Record selection pushed by the host.
//!
//! The core only reads the latest value; it never writes back.

use rowshell_model::Row;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    pub record: Option<Row>,
    pub table_id: Option<String>,
    pub view_section_id: Option<i64>,
}

/// Host side of the selection channel.
#[derive(Debug)]
pub struct SelectionFeed {
    tx: watch::Sender<Selection>,
}

/// Read side handed to the shell and to compiled components.
#[derive(Debug, Clone)]
pub struct SelectionWatch {
    rx: watch::Receiver<Selection>,
}

impl SelectionFeed {
    pub fn new() -> (Self, SelectionWatch) {
        let (tx, rx) = watch::channel(Selection::default());
        (Self { tx }, SelectionWatch { rx })
    }

    /// Publish a new selection. Missing pieces clear the previous value.
    pub fn record_selected(
        &self,
        record: Option<Row>,
        table_id: Option<String>,
        view_section_id: Option<i64>,
    ) {
        self.tx.send_replace(Selection {
            record,
            table_id,
            view_section_id,
        });
    }

    pub fn watch(&self) -> SelectionWatch {
        SelectionWatch {
            rx: self.tx.subscribe(),
        }
    }
}

impl SelectionWatch {
    /// A watch that never changes, for hosts without a selection feed.
    pub fn detached() -> Self {
        let (_, rx) = watch::channel(Selection::default());
        Self { rx }
    }

    pub fn current(&self) -> Selection {
        self.rx.borrow().clone()
    }

    /// Wait for the next selection change. Returns `None` once the host side
    /// is gone.
    pub async fn changed(&mut self) -> Option<Selection> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn watch_sees_latest_selection() {
        let (feed, watch) = SelectionFeed::new();
        assert_eq!(watch.current(), Selection::default());

        let record: Row = serde_json::from_value(json!({"id": 9})).unwrap();
        feed.record_selected(Some(record.clone()), Some("Offres".to_string()), Some(3));

        let current = watch.current();
        assert_eq!(current.record, Some(record));
        assert_eq!(current.table_id.as_deref(), Some("Offres"));
        assert_eq!(current.view_section_id, Some(3));
    }

    #[test]
    fn detached_watch_keeps_last_value() {
        let watch = SelectionWatch::detached();
        assert_eq!(watch.current(), Selection::default());
    }

    #[tokio::test]
    async fn changed_yields_new_value() {
        let (feed, mut watch) = SelectionFeed::new();
        feed.record_selected(None, Some("T".to_string()), None);
        let next = watch.changed().await.unwrap();
        assert_eq!(next.table_id.as_deref(), Some("T"));
    }
}
