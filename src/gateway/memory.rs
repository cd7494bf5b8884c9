//! In-process gateway used by tests and offline demos.
//!
//! Tables are vectors of JSON rows evaluated with the same [`Query`]
//! semantics the HTTP gateway sends to PostgREST. Inserts get a uuid `id`
//! and a strictly increasing `created_at` when the row has none, unique
//! keys reject duplicates with the Postgres `23505` code, and every write is
//! published to matching subscribers.

use async_trait::async_trait;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{mpsc, watch};
use uuid::Uuid;

use crate::auth::{Session, SignUpOutcome, User};
use crate::error::{Error, Result, UNIQUE_VIOLATION};
use crate::gateway::Gateway;
use crate::postgrest::Query;
use crate::realtime::{ChangeEvent, ChangeFilter, ChangeStream, RowChange, SubscriptionHandle};

type FunctionHandler = Arc<dyn Fn(&Value) -> Result<Value> + Send + Sync>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

struct Account {
    password: String,
    user: User,
}

#[derive(Default)]
struct State {
    tables: HashMap<String, Vec<Value>>,
    unique_keys: HashMap<String, Vec<Vec<String>>>,
    failing: HashSet<String>,
    accounts: HashMap<String, Account>,
    session: Option<Session>,
    require_confirmation: bool,
    last_created: Option<DateTime<Utc>>,
}

impl State {
    fn check_available(&self, table: &str) -> Result<()> {
        if self.failing.contains(table) {
            return Err(Error::Api {
                status: 503,
                code: None,
                message: format!("{} is unavailable", table),
            });
        }
        Ok(())
    }

    fn next_created_at(&mut self) -> String {
        let mut now = Utc::now();
        if let Some(last) = self.last_created {
            if now <= last {
                now = last + Duration::microseconds(1);
            }
        }
        self.last_created = Some(now);
        now.to_rfc3339_opts(SecondsFormat::Micros, true)
    }

    fn violates_unique(&self, table: &str, row: &Map<String, Value>) -> bool {
        let rows = match self.tables.get(table) {
            Some(rows) => rows,
            None => return false,
        };
        let id_key = vec!["id".to_string()];
        let extra = self.unique_keys.get(table).map(Vec::as_slice).unwrap_or(&[]);

        std::iter::once(&id_key).chain(extra.iter()).any(|columns| {
            rows.iter().any(|existing| {
                columns.iter().all(|c| match (existing.get(c), row.get(c)) {
                    (Some(a), Some(b)) => !a.is_null() && a == b,
                    _ => false,
                })
            })
        })
    }

    fn insert_row(&mut self, table: &str, row: Value) -> Result<Value> {
        let mut row = match row {
            Value::Object(map) => map,
            _ => return Err(Error::general("row must be a JSON object")),
        };
        if !row.contains_key("id") {
            row.insert("id".to_string(), Value::String(Uuid::new_v4().to_string()));
        }
        if !row.contains_key("created_at") {
            let at = self.next_created_at();
            row.insert("created_at".to_string(), Value::String(at));
        }
        if self.violates_unique(table, &row) {
            return Err(Error::Api {
                status: 409,
                code: Some(UNIQUE_VIOLATION.to_string()),
                message: format!("duplicate key value violates unique constraint on {}", table),
            });
        }

        let row = Value::Object(row);
        self.tables
            .entry(table.to_string())
            .or_default()
            .push(row.clone());
        Ok(row)
    }

    fn start_session(&mut self, user: User) -> Session {
        let token = format!("memory-{}", Uuid::new_v4());
        let refresh = format!("refresh-{}", Uuid::new_v4());
        let session = Session::new(&token, &refresh, user, 3600);
        self.session = Some(session.clone());
        session
    }
}

#[derive(Default)]
struct Subscribers {
    next_id: u64,
    entries: HashMap<u64, (ChangeFilter, mpsc::UnboundedSender<RowChange>)>,
}

/// In-memory [`Gateway`]
pub struct MemoryGateway {
    state: Mutex<State>,
    subscribers: Arc<Mutex<Subscribers>>,
    functions: Mutex<HashMap<String, FunctionHandler>>,
    user_tx: watch::Sender<Option<User>>,
}

impl Default for MemoryGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryGateway {
    /// A gateway with the unique keys of the adoption schema
    pub fn new() -> Self {
        let mut state = State::default();
        for table in ["favorites", "chat_sessions"] {
            state
                .unique_keys
                .insert(table.to_string(), vec![vec!["user_id".to_string(), "pet_id".to_string()]]);
        }
        let (user_tx, _) = watch::channel(None);

        Self {
            state: Mutex::new(state),
            subscribers: Arc::new(Mutex::new(Subscribers::default())),
            functions: Mutex::new(HashMap::new()),
            user_tx,
        }
    }

    /// Insert rows without publishing changes
    pub fn seed(&self, table: &str, rows: Vec<Value>) -> Result<()> {
        let mut state = lock(&self.state);
        for row in rows {
            state.insert_row(table, row)?;
        }
        Ok(())
    }

    /// Current contents of a table
    pub fn rows(&self, table: &str) -> Vec<Value> {
        lock(&self.state)
            .tables
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    /// Declare an extra unique key
    pub fn add_unique_key(&self, table: &str, columns: &[&str]) {
        lock(&self.state)
            .unique_keys
            .entry(table.to_string())
            .or_default()
            .push(columns.iter().map(|c| c.to_string()).collect());
    }

    /// Make every operation on `table` fail
    pub fn set_failing(&self, table: &str, failing: bool) {
        let mut state = lock(&self.state);
        if failing {
            state.failing.insert(table.to_string());
        } else {
            state.failing.remove(table);
        }
    }

    /// Whether sign-up leaves the account waiting for email confirmation
    pub fn require_email_confirmation(&self, required: bool) {
        lock(&self.state).require_confirmation = required;
    }

    /// Register an account that can sign in with a password
    pub fn add_account(&self, email: &str, password: &str, metadata: Value) -> User {
        let mut user = User::new(&Uuid::new_v4().to_string(), Some(email));
        if let Value::Object(map) = metadata {
            user.user_metadata = map;
        }
        lock(&self.state).accounts.insert(
            email.to_string(),
            Account {
                password: password.to_string(),
                user: user.clone(),
            },
        );
        user
    }

    /// Start a session for `user` directly
    pub fn sign_in_as(&self, user: User) -> Session {
        let session = lock(&self.state).start_session(user);
        self.user_tx.send_replace(Some(session.user.clone()));
        session
    }

    /// Serve `name` with a handler
    pub fn register_function<F>(&self, name: &str, handler: F)
    where
        F: Fn(&Value) -> Result<Value> + Send + Sync + 'static,
    {
        lock(&self.functions).insert(name.to_string(), Arc::new(handler));
    }

    /// Number of live change subscriptions
    pub fn subscriber_count(&self) -> usize {
        lock(&self.subscribers).entries.len()
    }

    fn publish(&self, table: &str, event: ChangeEvent, records: &[Value]) {
        let mut subscribers = lock(&self.subscribers);
        subscribers.entries.retain(|_, (filter, tx)| {
            for record in records {
                if filter.matches(table, event, record)
                    && tx
                        .send(RowChange {
                            table: table.to_string(),
                            event,
                            record: record.clone(),
                        })
                        .is_err()
                {
                    return false;
                }
            }
            true
        });
    }
}

fn project(columns: &str, row: &Value) -> Value {
    let columns = columns.trim();
    if columns == "*" {
        return row.clone();
    }
    let map = columns
        .split(',')
        .map(str::trim)
        .filter_map(|c| row.get(c).map(|v| (c.to_string(), v.clone())))
        .collect::<Map<String, Value>>();
    Value::Object(map)
}

#[async_trait]
impl Gateway for MemoryGateway {
    async fn select(&self, query: &Query) -> Result<Vec<Value>> {
        let state = lock(&self.state);
        state.check_available(query.table_name())?;
        let rows: Vec<Value> = state
            .tables
            .get(query.table_name())
            .map(|rows| rows.iter().filter(|r| query.matches(r)).cloned().collect())
            .unwrap_or_default();
        Ok(query
            .arrange(rows)
            .iter()
            .map(|row| project(query.columns(), row))
            .collect())
    }

    async fn count(&self, query: &Query) -> Result<u64> {
        let state = lock(&self.state);
        state.check_available(query.table_name())?;
        Ok(state
            .tables
            .get(query.table_name())
            .map(|rows| rows.iter().filter(|r| query.matches(r)).count())
            .unwrap_or(0) as u64)
    }

    async fn insert(&self, table: &str, row: Value) -> Result<Value> {
        let stored = {
            let mut state = lock(&self.state);
            state.check_available(table)?;
            state.insert_row(table, row)?
        };
        self.publish(table, ChangeEvent::Insert, std::slice::from_ref(&stored));
        Ok(stored)
    }

    async fn update(&self, query: &Query, patch: Value) -> Result<Vec<Value>> {
        let patch = match patch {
            Value::Object(map) => map,
            _ => return Err(Error::general("patch must be a JSON object")),
        };
        let updated: Vec<Value> = {
            let mut state = lock(&self.state);
            state.check_available(query.table_name())?;
            match state.tables.get_mut(query.table_name()) {
                Some(rows) => rows
                    .iter_mut()
                    .filter(|row| query.matches(row))
                    .map(|row| {
                        if let Value::Object(fields) = row {
                            for (key, value) in &patch {
                                fields.insert(key.clone(), value.clone());
                            }
                        }
                        row.clone()
                    })
                    .collect(),
                None => Vec::new(),
            }
        };
        self.publish(query.table_name(), ChangeEvent::Update, &updated);
        Ok(updated)
    }

    async fn delete(&self, query: &Query) -> Result<()> {
        let removed: Vec<Value> = {
            let mut state = lock(&self.state);
            state.check_available(query.table_name())?;
            match state.tables.get_mut(query.table_name()) {
                Some(rows) => {
                    let (removed, kept): (Vec<Value>, Vec<Value>) =
                        rows.drain(..).partition(|row| query.matches(row));
                    *rows = kept;
                    removed
                }
                None => Vec::new(),
            }
        };
        self.publish(query.table_name(), ChangeEvent::Delete, &removed);
        Ok(())
    }

    async fn current_session(&self) -> Result<Option<Session>> {
        Ok(lock(&self.state).session.clone())
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session> {
        let session = {
            let mut state = lock(&self.state);
            let user = match state.accounts.get(email) {
                Some(account) if account.password == password => account.user.clone(),
                _ => {
                    return Err(Error::Api {
                        status: 400,
                        code: None,
                        message: "Invalid login credentials".to_string(),
                    })
                }
            };
            state.start_session(user)
        };
        self.user_tx.send_replace(Some(session.user.clone()));
        Ok(session)
    }

    async fn sign_up(&self, email: &str, password: &str, metadata: Value) -> Result<SignUpOutcome> {
        if lock(&self.state).accounts.contains_key(email) {
            return Err(Error::Api {
                status: 422,
                code: None,
                message: "User already registered".to_string(),
            });
        }
        let user = self.add_account(email, password, metadata);

        let require_confirmation = lock(&self.state).require_confirmation;
        if require_confirmation {
            return Ok(SignUpOutcome::ConfirmationRequired(user));
        }
        Ok(SignUpOutcome::SignedIn(self.sign_in_as(user)))
    }

    async fn sign_in_anonymously(&self) -> Result<Session> {
        let mut user = User::new(&Uuid::new_v4().to_string(), None);
        user.is_anonymous = true;
        Ok(self.sign_in_as(user))
    }

    async fn sign_out(&self) -> Result<()> {
        lock(&self.state).session = None;
        self.user_tx.send_replace(None);
        Ok(())
    }

    fn watch_auth(&self) -> watch::Receiver<Option<User>> {
        self.user_tx.subscribe()
    }

    async fn subscribe(&self, filter: ChangeFilter) -> Result<ChangeStream> {
        lock(&self.state).check_available(&filter.table)?;

        let (tx, rx) = mpsc::unbounded_channel();
        let id = {
            let mut subscribers = lock(&self.subscribers);
            subscribers.next_id += 1;
            let id = subscribers.next_id;
            subscribers.entries.insert(id, (filter, tx));
            id
        };

        let subscribers = Arc::downgrade(&self.subscribers);
        let handle = SubscriptionHandle::new(move || {
            if let Some(subscribers) = subscribers.upgrade() {
                lock(&subscribers).entries.remove(&id);
            }
        });
        Ok(ChangeStream::new(rx, handle))
    }

    async fn invoke_function(&self, name: &str, body: Value) -> Result<Value> {
        let handler = lock(&self.functions).get(name).cloned();
        match handler {
            Some(handler) => handler(&body),
            None => Err(Error::function(format!("{} is not deployed", name))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::postgrest::SortOrder;
    use serde_json::json;

    #[tokio::test]
    async fn insert_assigns_id_and_increasing_created_at() {
        let gateway = MemoryGateway::new();
        let a = gateway.insert("messages", json!({ "text": "a" })).await.unwrap();
        let b = gateway.insert("messages", json!({ "text": "b" })).await.unwrap();
        assert!(a["id"].as_str().is_some());
        assert!(a["created_at"].as_str() < b["created_at"].as_str());

        let rows = gateway
            .select(&Query::table("messages").order("created_at", SortOrder::Descending))
            .await
            .unwrap();
        assert_eq!(rows[0]["text"], "b");
    }

    #[tokio::test]
    async fn duplicate_favorite_is_unique_violation() {
        let gateway = MemoryGateway::new();
        let row = json!({ "user_id": "u1", "pet_id": "p1" });
        gateway.insert("favorites", row.clone()).await.unwrap();
        let err = gateway.insert("favorites", row).await.unwrap_err();
        assert!(err.is_unique_violation());
    }

    #[tokio::test]
    async fn update_and_delete_follow_filters() {
        let gateway = MemoryGateway::new();
        gateway
            .seed(
                "notifications",
                vec![
                    json!({ "id": "n1", "user_id": "u1", "is_read": false }),
                    json!({ "id": "n2", "user_id": "u2", "is_read": false }),
                ],
            )
            .unwrap();

        let updated = gateway
            .update(
                &Query::table("notifications").eq("user_id", "u1"),
                json!({ "is_read": true }),
            )
            .await
            .unwrap();
        assert_eq!(updated.len(), 1);
        let unread = gateway
            .count(&Query::table("notifications").eq("is_read", false))
            .await
            .unwrap();
        assert_eq!(unread, 1);

        gateway
            .delete(&Query::table("notifications").eq("id", "n2"))
            .await
            .unwrap();
        assert_eq!(gateway.rows("notifications").len(), 1);
    }

    #[tokio::test]
    async fn projection_keeps_listed_columns() {
        let gateway = MemoryGateway::new();
        gateway
            .seed("favorites", vec![json!({ "user_id": "u1", "pet_id": "p1" })])
            .unwrap();
        let rows = gateway
            .select(&Query::table("favorites").select("pet_id"))
            .await
            .unwrap();
        assert_eq!(rows, vec![json!({ "pet_id": "p1" })]);
    }

    #[tokio::test]
    async fn failing_table_errors() {
        let gateway = MemoryGateway::new();
        gateway.set_failing("pets", true);
        assert!(gateway.select(&Query::table("pets")).await.is_err());
        gateway.set_failing("pets", false);
        assert!(gateway.select(&Query::table("pets")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn subscription_receives_matching_inserts_until_closed() {
        let gateway = MemoryGateway::new();
        let mut stream = gateway
            .subscribe(
                ChangeFilter::table("notifications")
                    .event(ChangeEvent::Insert)
                    .eq("user_id", "u1"),
            )
            .await
            .unwrap();

        gateway
            .insert("notifications", json!({ "user_id": "u2", "title": "other" }))
            .await
            .unwrap();
        gateway
            .insert("notifications", json!({ "user_id": "u1", "title": "mine" }))
            .await
            .unwrap();

        let change = stream.next().await.unwrap();
        assert_eq!(change.record["title"], "mine");

        stream.close();
        assert_eq!(gateway.subscriber_count(), 0);
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn password_sign_in_and_out() {
        let gateway = MemoryGateway::new();
        gateway.add_account("amy@example.com", "secret1", json!({ "name": "Amy" }));
        let rx = gateway.watch_auth();

        assert!(gateway
            .sign_in_with_password("amy@example.com", "wrong")
            .await
            .is_err());
        let session = gateway
            .sign_in_with_password("amy@example.com", "secret1")
            .await
            .unwrap();
        assert_eq!(session.user.metadata_str("name"), Some("Amy"));
        assert!(rx.borrow().is_some());

        gateway.sign_out().await.unwrap();
        assert!(gateway.current_session().await.unwrap().is_none());
        assert!(rx.borrow().is_none());
    }
}
