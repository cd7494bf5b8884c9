use chrono::{Local, Utc};
use serde_json::{json, Value};
use std::collections::HashMap;

use crate::accessors::{row_id, soft, Pets};
use crate::error::{Error, Result};
use crate::gateway::Remote;
use crate::models::{
    decode_rows, ChatSession, ChatSessionRow, Message, MessageRow, Pet, Sender,
};
use crate::postgrest::{Query, SortOrder};
use crate::timefmt::parse_timestamp;

/// Volunteer assigned to new chat sessions
pub const VOLUNTEER_NAME: &str = "Sarah";

/// Chat sessions and their messages
#[derive(Debug, Clone)]
pub struct Chats {
    remote: Remote,
    pets: Pets,
}

impl Chats {
    pub fn new(remote: Remote) -> Self {
        Self {
            pets: Pets::new(remote.clone()),
            remote,
        }
    }

    async fn find_session(&self, user_id: &str, pet_id: &str) -> Result<Option<String>> {
        let rows = self
            .remote
            .gateway()?
            .select(
                &Query::table("chat_sessions")
                    .select("id")
                    .eq("user_id", user_id)
                    .eq("pet_id", pet_id)
                    .limit(1),
            )
            .await?;
        Ok(rows.first().and_then(row_id))
    }

    /// The session for the signed-in user and `pet_id`, created on first use.
    /// Calling it again for the same pair returns the same id.
    pub async fn fetch_or_create_session(&self, pet_id: &str) -> Result<String> {
        let user_id = self.remote.require_user_id().await?;
        if let Some(id) = self.find_session(&user_id, pet_id).await? {
            return Ok(id);
        }

        let row = json!({
            "user_id": user_id,
            "pet_id": pet_id,
            "volunteer_name": VOLUNTEER_NAME,
            "last_message_at": Utc::now().to_rfc3339(),
        });
        match self.remote.gateway()?.insert("chat_sessions", row).await {
            Ok(stored) => {
                log::info!("opened chat session for pet {}", pet_id);
                row_id(&stored).ok_or_else(|| Error::general("stored chat session has no id"))
            }
            // Created concurrently by another view
            Err(e) if e.is_unique_violation() => self
                .find_session(&user_id, pet_id)
                .await?
                .ok_or_else(|| Error::NotFound(format!("chat session for pet {}", pet_id))),
            Err(e) => Err(e),
        }
    }

    pub async fn get_or_create_session(&self, pet_id: &str) -> Option<String> {
        soft(
            "open chat session",
            self.fetch_or_create_session(pet_id).await.map(Some),
        )
    }

    /// The signed-in user's sessions, most recent activity first. Sessions
    /// whose pet no longer exists are left out.
    pub async fn fetch_sessions(&self) -> Result<Vec<ChatSession>> {
        let user_id = match self.remote.current_user_id().await? {
            Some(id) => id,
            None => return Ok(Vec::new()),
        };
        let gateway = self.remote.gateway()?;
        let rows: Vec<ChatSessionRow> = decode_rows(
            "chat_sessions",
            gateway
                .select(
                    &Query::table("chat_sessions")
                        .eq("user_id", &user_id)
                        .order("last_message_at", SortOrder::Descending),
                )
                .await?,
        );
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let pet_ids: Vec<String> = rows.iter().map(|r| r.pet_id.clone()).collect();
        let pets: HashMap<String, Pet> = self
            .pets
            .fetch_by_ids(&pet_ids)
            .await?
            .into_iter()
            .map(|pet| (pet.id.clone(), pet))
            .collect();

        let session_ids: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();
        let messages = gateway
            .select(
                &Query::table("messages")
                    .select("session_id,text")
                    .in_list("session_id", &session_ids)
                    .order("created_at", SortOrder::Descending),
            )
            .await?;
        // Newest first, so the first text seen per session is its last message
        let mut last_text: HashMap<String, String> = HashMap::new();
        for message in &messages {
            if let (Some(session_id), Some(text)) = (
                message.get("session_id").and_then(Value::as_str),
                message.get("text").and_then(Value::as_str),
            ) {
                last_text
                    .entry(session_id.to_string())
                    .or_insert_with(|| text.to_string());
            }
        }

        Ok(rows
            .into_iter()
            .filter_map(|row| {
                let pet = match pets.get(&row.pet_id) {
                    Some(pet) => pet.clone(),
                    None => {
                        log::debug!("dropping chat session {} for missing pet {}", row.id, row.pet_id);
                        return None;
                    }
                };
                Some(ChatSession {
                    last_message: last_text.remove(&row.id),
                    last_message_at: row.last_message_at.as_deref().and_then(parse_timestamp),
                    volunteer_name: row
                        .volunteer_name
                        .unwrap_or_else(|| VOLUNTEER_NAME.to_string()),
                    id: row.id,
                    pet,
                })
            })
            .collect())
    }

    pub async fn sessions(&self) -> Vec<ChatSession> {
        soft("list chat sessions", self.fetch_sessions().await)
    }

    /// Messages of a session in the order they were sent
    pub async fn fetch_messages(&self, session_id: &str) -> Result<Vec<Message>> {
        let rows = self
            .remote
            .gateway()?
            .select(
                &Query::table("messages")
                    .eq("session_id", session_id)
                    .order("created_at", SortOrder::Ascending),
            )
            .await?;
        let now = Local::now();
        Ok(decode_rows::<MessageRow>("messages", rows)
            .into_iter()
            .map(|row| row.into_message(&now))
            .collect())
    }

    pub async fn messages(&self, session_id: &str) -> Vec<Message> {
        soft("list messages", self.fetch_messages(session_id).await)
    }

    /// Opens (or reuses) the session for `pet_id` and lists its messages
    pub async fn messages_for_pet(&self, pet_id: &str) -> Vec<Message> {
        match self.get_or_create_session(pet_id).await {
            Some(session_id) => self.messages(&session_id).await,
            None => Vec::new(),
        }
    }

    /// Appends a message and returns it as stored
    pub async fn send_message(&self, session_id: &str, text: &str, sender: Sender) -> Option<Message> {
        match self.post_message(session_id, text, sender).await {
            Ok(message) => Some(message),
            Err(Error::NotConfigured) => None,
            Err(e) => {
                log::error!("send message failed: {}", e);
                None
            }
        }
    }

    /// Like [`send_message`](Self::send_message) but returns the error
    pub async fn post_message(&self, session_id: &str, text: &str, sender: Sender) -> Result<Message> {
        let gateway = self.remote.gateway()?;
        let stored = gateway
            .insert(
                "messages",
                json!({
                    "session_id": session_id,
                    "sender": sender.as_str(),
                    "text": text,
                }),
            )
            .await?;
        let row: MessageRow = serde_json::from_value(stored)?;

        let touched_at = row
            .created_at
            .clone()
            .unwrap_or_else(|| Utc::now().to_rfc3339());
        if let Err(e) = gateway
            .update(
                &Query::table("chat_sessions").eq("id", session_id),
                json!({ "last_message_at": touched_at }),
            )
            .await
        {
            log::warn!("could not bump chat session {}: {}", session_id, e);
        }

        Ok(row.into_message(&Local::now()))
    }
}
