//! Phoenix channel messages used by Realtime

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::realtime::{ChangeEvent, ChangeFilter, RowChange};

/// A message sent or received over the socket
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeMessage {
    pub topic: String,
    pub event: String,
    #[serde(default)]
    pub payload: Value,
    #[serde(rename = "ref", default)]
    pub message_ref: Value,
}

impl RealtimeMessage {
    fn new(topic: &str, event: &str, payload: Value, message_ref: u32) -> Self {
        Self {
            topic: topic.to_string(),
            event: event.to_string(),
            payload,
            message_ref: Value::String(message_ref.to_string()),
        }
    }

    /// `phx_join` carrying a postgres_changes subscription
    pub fn join(filter: &ChangeFilter, access_token: &str, message_ref: u32) -> Self {
        let mut change = json!({
            "event": filter.event.as_str(),
            "schema": filter.schema,
            "table": filter.table,
        });
        if let Some(expr) = filter.filter_expr() {
            change["filter"] = Value::String(expr);
        }
        let payload = json!({
            "config": {
                "broadcast": { "self": false },
                "presence": { "key": "" },
                "postgres_changes": [change]
            },
            "access_token": access_token
        });
        Self::new(&filter.topic(), "phx_join", payload, message_ref)
    }

    pub fn leave(topic: &str, message_ref: u32) -> Self {
        Self::new(topic, "phx_leave", json!({}), message_ref)
    }

    pub fn heartbeat(message_ref: u32) -> Self {
        Self::new("phoenix", "heartbeat", json!({}), message_ref)
    }

    /// The row change carried by a `postgres_changes` message
    pub fn row_change(&self) -> Option<RowChange> {
        if self.event != "postgres_changes" {
            return None;
        }
        let data = self.payload.get("data")?;
        let event = ChangeEvent::parse(data.get("type")?.as_str()?)?;
        let table = data.get("table")?.as_str()?.to_string();
        let record = match event {
            ChangeEvent::Delete => data.get("old_record"),
            _ => data.get("record"),
        }
        .cloned()
        .unwrap_or(Value::Null);
        Some(RowChange {
            table,
            event,
            record,
        })
    }

    /// Error text of a failed join reply
    pub fn join_error(&self) -> Option<String> {
        match self.event.as_str() {
            "phx_error" => Some("channel error".to_string()),
            "phx_reply" if self.payload.get("status").and_then(Value::as_str) == Some("error") => {
                Some(
                    self.payload
                        .pointer("/response/reason")
                        .and_then(Value::as_str)
                        .unwrap_or("join rejected")
                        .to_string(),
                )
            }
            "system" if self.payload.get("status").and_then(Value::as_str) == Some("error") => {
                Some(
                    self.payload
                        .get("message")
                        .and_then(Value::as_str)
                        .unwrap_or("subscription rejected")
                        .to_string(),
                )
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_carries_filter_and_token() {
        let filter = ChangeFilter::table("notifications")
            .event(ChangeEvent::Insert)
            .eq("user_id", "u1");
        let msg = RealtimeMessage::join(&filter, "token", 1);
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["topic"], "realtime:public:notifications");
        assert_eq!(value["event"], "phx_join");
        assert_eq!(value["ref"], "1");
        assert_eq!(value["payload"]["access_token"], "token");
        let change = &value["payload"]["config"]["postgres_changes"][0];
        assert_eq!(change["event"], "INSERT");
        assert_eq!(change["table"], "notifications");
        assert_eq!(change["filter"], "user_id=eq.u1");
    }

    #[test]
    fn parses_insert_change() {
        let msg: RealtimeMessage = serde_json::from_value(json!({
            "topic": "realtime:public:notifications",
            "event": "postgres_changes",
            "ref": null,
            "payload": {
                "ids": [1],
                "data": {
                    "type": "INSERT",
                    "schema": "public",
                    "table": "notifications",
                    "commit_timestamp": "2024-01-01T00:00:00Z",
                    "record": { "id": "n1", "title": "新朋友" }
                }
            }
        }))
        .unwrap();
        let change = msg.row_change().unwrap();
        assert_eq!(change.event, ChangeEvent::Insert);
        assert_eq!(change.table, "notifications");
        assert_eq!(change.record["id"], "n1");
    }

    #[test]
    fn recognises_rejected_join() {
        let msg: RealtimeMessage = serde_json::from_value(json!({
            "topic": "realtime:public:notifications",
            "event": "phx_reply",
            "ref": "1",
            "payload": { "status": "error", "response": { "reason": "unauthorized" } }
        }))
        .unwrap();
        assert_eq!(msg.join_error().as_deref(), Some("unauthorized"));
        assert!(msg.row_change().is_none());
    }
}
