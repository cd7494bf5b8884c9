//! Chat list and the conversation with the volunteer

use chrono::{Local, Utc};

use crate::accessors::{Chats, VOLUNTEER_NAME};
use crate::models::{ChatSession, Message, Pet, Sender};
use crate::volunteer::{Turn, VolunteerResponder};

fn welcome_text(pet: &Pet) -> String {
    format!(
        "您好！{} 很喜歡結交新朋友，她今天精神很好，一直想找人玩呢！",
        pet.name
    )
}

fn local_message(sender: Sender, text: &str) -> Message {
    Message {
        id: format!("local-{}", Utc::now().timestamp_nanos_opt().unwrap_or_default()),
        sender,
        text: text.to_string(),
        timestamp: "今天".to_string(),
        created_at: Some(Utc::now()),
        image: None,
    }
}

/// Sessions for the chat list. With no stored sessions the first two pets
/// are offered as conversations to start.
pub async fn chat_list(chats: &Chats, pets: &[Pet]) -> Vec<ChatSession> {
    if pets.is_empty() {
        return Vec::new();
    }
    let sessions = chats.sessions().await;
    if !sessions.is_empty() {
        return sessions;
    }
    pets.iter()
        .take(2)
        .map(|pet| ChatSession {
            id: format!("mock-{}", pet.id),
            pet: pet.clone(),
            volunteer_name: VOLUNTEER_NAME.to_string(),
            last_message_at: Some(Utc::now()),
            last_message: Some(welcome_text(pet)),
        })
        .collect()
}

/// Pets without a conversation yet, for the "new chat" picker
pub fn pets_without_chat<'a>(pets: &'a [Pet], sessions: &[ChatSession]) -> Vec<&'a Pet> {
    pets.iter()
        .filter(|pet| !sessions.iter().any(|s| s.pet.id == pet.id))
        .collect()
}

/// An open conversation about one pet
#[derive(Debug, Clone)]
pub struct ChatScreen {
    pet: Pet,
    session_id: Option<String>,
    messages: Vec<Message>,
    typing: bool,
}

impl ChatScreen {
    /// Loads the history, starting the session on first open. An empty
    /// history, or no backend, shows a greeting from the volunteer.
    pub async fn open(chats: &Chats, pet: Pet) -> Self {
        let session_id = chats.get_or_create_session(&pet.id).await;
        let messages = match &session_id {
            Some(id) => chats.messages(id).await,
            None => Vec::new(),
        };
        let messages = if messages.is_empty() {
            let mut welcome = local_message(Sender::Volunteer, &welcome_text(&pet));
            welcome.id = "welcome".to_string();
            if session_id.is_none() {
                welcome.timestamp = "昨天".to_string();
            }
            vec![welcome]
        } else {
            messages
        };

        Self {
            pet,
            session_id,
            messages,
            typing: false,
        }
    }

    pub fn pet(&self) -> &Pet {
        &self.pet
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// True while waiting for the volunteer
    pub fn is_typing(&self) -> bool {
        self.typing
    }

    /// Appends `text` to the conversation and marks the volunteer as
    /// typing. Returns the exchange to run, or `None` for blank input or
    /// while a reply is still pending.
    pub fn begin_send(&mut self, text: &str) -> Option<Exchange> {
        if text.trim().is_empty() || self.typing {
            return None;
        }

        let history: Vec<Turn> = self.messages.iter().map(Turn::from).collect();
        let pending = local_message(Sender::User, text);
        let pending_id = pending.id.clone();
        self.messages.push(pending);
        self.typing = true;

        Some(Exchange {
            pet_name: self.pet.name.clone(),
            session_id: self.session_id.clone(),
            text: text.to_string(),
            history,
            pending_id,
        })
    }

    /// Applies a finished exchange: the stored user message replaces the
    /// pending one and the reply is appended
    pub fn finish_send(&mut self, exchanged: Exchanged) {
        match self.messages.iter_mut().find(|m| m.id == exchanged.pending_id) {
            Some(pending) => *pending = exchanged.user,
            None => self.messages.push(exchanged.user),
        }
        self.messages.push(exchanged.reply);
        self.typing = false;
    }

    /// Sends `text` and appends the volunteer's reply. Blank input is
    /// ignored and returns false.
    pub async fn send(&mut self, chats: &Chats, volunteer: &dyn VolunteerResponder, text: &str) -> bool {
        match self.begin_send(text) {
            Some(exchange) => {
                let exchanged = exchange.run(chats, volunteer).await;
                self.finish_send(exchanged);
                true
            }
            None => false,
        }
    }
}

/// A message on its way to the volunteer, detached from the screen
#[derive(Debug, Clone)]
pub struct Exchange {
    pet_name: String,
    session_id: Option<String>,
    text: String,
    history: Vec<Turn>,
    pending_id: String,
}

/// Messages produced by [`Exchange::run`]
#[derive(Debug, Clone)]
pub struct Exchanged {
    pending_id: String,
    pub user: Message,
    pub reply: Message,
}

impl Exchange {
    /// Stores the user's message, asks the volunteer and stores the reply.
    ///
    /// Both messages are stored when a session exists; a failed store is
    /// logged and the conversation continues locally.
    pub async fn run(self, chats: &Chats, volunteer: &dyn VolunteerResponder) -> Exchanged {
        let session_id = self.session_id.as_deref();
        let user = store(chats, session_id, Sender::User, &self.text).await;
        let reply = volunteer.reply(&self.pet_name, &self.text, &self.history).await;
        let reply = store(chats, session_id, Sender::Volunteer, &reply).await;
        Exchanged {
            pending_id: self.pending_id,
            user,
            reply,
        }
    }
}

async fn store(chats: &Chats, session_id: Option<&str>, sender: Sender, text: &str) -> Message {
    if let Some(session_id) = session_id {
        if let Some(mut stored) = chats.send_message(session_id, text, sender).await {
            if stored.timestamp.is_empty() {
                stored.timestamp = crate::timefmt::relative_day_label(&Utc::now(), &Local::now());
            }
            return stored;
        }
    }
    local_message(sender, text)
}
