//! The chat volunteer: a text-completion collaborator that answers questions
//! about a pet in the voice of a shelter volunteer.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};

use crate::accessors::VOLUNTEER_NAME;
use crate::error::{Error, Result};
use crate::gateway::Remote;
use crate::models::{Message, Sender};

/// Used when the collaborator answers with nothing
pub const EMPTY_REPLY: &str = "謝謝您的詢問，我會盡快回覆您！";

/// Used when the collaborator cannot be reached
pub const APOLOGY_REPLY: &str = "對不起，目前連線有些問題，請稍後再試。";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Model,
}

/// One prior chat turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub role: TurnRole,
    pub text: String,
}

impl From<&Message> for Turn {
    fn from(message: &Message) -> Self {
        Self {
            role: match message.sender {
                Sender::User => TurnRole::User,
                Sender::Volunteer => TurnRole::Model,
            },
            text: message.text.clone(),
        }
    }
}

/// Produces the volunteer's reply. Implementations never fail; an
/// unreachable collaborator yields [`APOLOGY_REPLY`].
#[async_trait]
pub trait VolunteerResponder: Send + Sync {
    async fn reply(&self, pet_name: &str, utterance: &str, history: &[Turn]) -> String;
}

fn persona_prompt(pet_name: &str) -> String {
    format!(
        "你是一位名叫 {} 的動物之家志工。你正在協助領養人了解名為 {} 的寵物。請用親切、溫柔且專業的語氣回答問題。對話歷史如下。",
        VOLUNTEER_NAME, pet_name
    )
}

fn system_instruction() -> String {
    format!(
        "你是一位充滿愛心的寵物領養志工 {}，目標是幫助使用者了解寵物並評估是否適合領養。請使用繁體中文回答。",
        VOLUNTEER_NAME
    )
}

/// Conversation in the role/parts shape text-completion APIs take
fn contents(pet_name: &str, utterance: &str, history: &[Turn]) -> Value {
    let turn = |role: TurnRole, text: &str| json!({ "role": role, "parts": [{ "text": text }] });

    let mut contents = vec![turn(TurnRole::User, &persona_prompt(pet_name))];
    contents.extend(history.iter().map(|t| turn(t.role, &t.text)));
    contents.push(turn(TurnRole::User, utterance));
    Value::Array(contents)
}

/// Reply text from a function response: a bare string, or an object with a
/// `reply` or `text` field
fn reply_text(response: &Value) -> Option<&str> {
    match response {
        Value::String(text) => Some(text.as_str()),
        Value::Object(fields) => fields
            .get("reply")
            .or_else(|| fields.get("text"))
            .and_then(Value::as_str),
        _ => None,
    }
    .map(str::trim)
    .filter(|text| !text.is_empty())
}

/// Asks a server-side function to generate the reply
#[derive(Debug, Clone)]
pub struct FunctionsVolunteer {
    remote: Remote,
    function: String,
}

impl FunctionsVolunteer {
    pub fn new(remote: Remote, function: &str) -> Self {
        Self {
            remote,
            function: function.to_string(),
        }
    }

    async fn ask(&self, pet_name: &str, utterance: &str, history: &[Turn]) -> Result<String> {
        let body = json!({
            "petName": pet_name,
            "message": utterance,
            "systemInstruction": system_instruction(),
            "contents": contents(pet_name, utterance, history),
            "temperature": 0.7,
        });
        let response = self
            .remote
            .gateway()?
            .invoke_function(&self.function, body)
            .await?;
        if let Some(text) = reply_text(&response) {
            return Ok(text.to_string());
        }
        let answered = response.is_null()
            || response.is_string()
            || response.get("reply").is_some()
            || response.get("text").is_some();
        if answered {
            Ok(EMPTY_REPLY.to_string())
        } else {
            Err(Error::function(format!(
                "{} returned an unexpected body",
                self.function
            )))
        }
    }
}

#[async_trait]
impl VolunteerResponder for FunctionsVolunteer {
    async fn reply(&self, pet_name: &str, utterance: &str, history: &[Turn]) -> String {
        match self.ask(pet_name, utterance, history).await {
            Ok(text) => text,
            Err(Error::NotConfigured) => APOLOGY_REPLY.to_string(),
            Err(e) => {
                log::error!("volunteer reply failed: {}", e);
                APOLOGY_REPLY.to_string()
            }
        }
    }
}
