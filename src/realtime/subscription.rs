//! Change filters, change streams and their handles

use serde_json::Value;
use std::fmt;
use tokio::sync::mpsc;

/// Database event a subscription listens for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeEvent {
    Insert,
    Update,
    Delete,
    All,
}

impl ChangeEvent {
    /// Wire name of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeEvent::Insert => "INSERT",
            ChangeEvent::Update => "UPDATE",
            ChangeEvent::Delete => "DELETE",
            ChangeEvent::All => "*",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "INSERT" => Some(ChangeEvent::Insert),
            "UPDATE" => Some(ChangeEvent::Update),
            "DELETE" => Some(ChangeEvent::Delete),
            "*" => Some(ChangeEvent::All),
            _ => None,
        }
    }

    /// Whether a concrete event satisfies this selector
    pub fn accepts(&self, event: ChangeEvent) -> bool {
        *self == ChangeEvent::All || *self == event
    }
}

/// What a change subscription listens to
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeFilter {
    pub schema: String,
    pub table: String,
    pub event: ChangeEvent,
    /// Column equality as `(column, value)`, sent as `column=eq.value`
    pub eq: Option<(String, String)>,
}

impl ChangeFilter {
    /// Listen to every event on a table
    pub fn table(table: &str) -> Self {
        Self {
            schema: "public".to_string(),
            table: table.to_string(),
            event: ChangeEvent::All,
            eq: None,
        }
    }

    pub fn event(mut self, event: ChangeEvent) -> Self {
        self.event = event;
        self
    }

    pub fn eq(mut self, column: &str, value: &str) -> Self {
        self.eq = Some((column.to_string(), value.to_string()));
        self
    }

    /// The `filter` string of a postgres_changes join
    pub fn filter_expr(&self) -> Option<String> {
        self.eq
            .as_ref()
            .map(|(column, value)| format!("{}=eq.{}", column, value))
    }

    /// Channel topic for this filter
    pub fn topic(&self) -> String {
        format!("realtime:{}:{}", self.schema, self.table)
    }

    /// Whether a change on `table` carrying `record` passes the filter
    pub fn matches(&self, table: &str, event: ChangeEvent, record: &Value) -> bool {
        if table != self.table || !self.event.accepts(event) {
            return false;
        }
        match &self.eq {
            Some((column, value)) => match record.get(column) {
                Some(Value::String(s)) => s == value,
                Some(other) => other.to_string() == *value,
                None => false,
            },
            None => true,
        }
    }
}

/// One row change delivered by a subscription
#[derive(Debug, Clone, PartialEq)]
pub struct RowChange {
    pub table: String,
    pub event: ChangeEvent,
    /// The new row, or the old one for deletes
    pub record: Value,
}

/// Closes a subscription.
///
/// `close()` is idempotent and also runs when the handle is dropped, so a
/// view that owns the handle cannot leak its subscription.
pub struct SubscriptionHandle {
    closer: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl SubscriptionHandle {
    pub fn new<F>(closer: F) -> Self
    where
        F: FnOnce() + Send + Sync + 'static,
    {
        Self {
            closer: Some(Box::new(closer)),
        }
    }

    /// A handle with nothing to close
    pub fn inert() -> Self {
        Self { closer: None }
    }

    pub fn close(&mut self) {
        if let Some(closer) = self.closer.take() {
            closer();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closer.is_none()
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for SubscriptionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionHandle")
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Receiving end of a subscription
#[derive(Debug)]
pub struct ChangeStream {
    receiver: mpsc::UnboundedReceiver<RowChange>,
    handle: SubscriptionHandle,
}

impl ChangeStream {
    pub fn new(receiver: mpsc::UnboundedReceiver<RowChange>, handle: SubscriptionHandle) -> Self {
        Self { receiver, handle }
    }

    /// Next change, or `None` once the subscription has ended
    pub async fn next(&mut self) -> Option<RowChange> {
        if self.handle.is_closed() {
            return None;
        }
        self.receiver.recv().await
    }

    pub fn close(&mut self) {
        self.handle.close();
        self.receiver.close();
    }

    /// Split into the receiver and the handle that keeps it alive
    pub fn into_parts(self) -> (mpsc::UnboundedReceiver<RowChange>, SubscriptionHandle) {
        (self.receiver, self.handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn filter_matches_table_event_and_column() {
        let filter = ChangeFilter::table("notifications")
            .event(ChangeEvent::Insert)
            .eq("user_id", "u1");
        assert_eq!(filter.filter_expr().as_deref(), Some("user_id=eq.u1"));
        assert!(filter.matches("notifications", ChangeEvent::Insert, &json!({"user_id": "u1"})));
        assert!(!filter.matches("notifications", ChangeEvent::Insert, &json!({"user_id": "u2"})));
        assert!(!filter.matches("notifications", ChangeEvent::Update, &json!({"user_id": "u1"})));
        assert!(!filter.matches("messages", ChangeEvent::Insert, &json!({"user_id": "u1"})));
    }

    #[test]
    fn handle_closes_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let mut handle = SubscriptionHandle::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        handle.close();
        handle.close();
        drop(handle);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn dropping_handle_closes() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        {
            let _handle = SubscriptionHandle::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
