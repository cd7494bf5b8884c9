//! Gateway backed by a hosted Supabase project

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tokio::sync::watch;

use crate::auth::{AuthClient, Session, SignUpOutcome, User};
use crate::config::{BackendConfig, ClientOptions};
use crate::error::Result;
use crate::functions::FunctionsClient;
use crate::gateway::Gateway;
use crate::postgrest::{PostgrestClient, Query};
use crate::realtime::{ChangeFilter, ChangeStream, RealtimeClient};

/// HTTP and websocket implementation of [`Gateway`]
pub struct SupabaseGateway {
    auth: AuthClient,
    postgrest: PostgrestClient,
    realtime: RealtimeClient,
    functions: FunctionsClient,
}

impl SupabaseGateway {
    /// Create a gateway with default options
    pub fn new(config: &BackendConfig) -> Self {
        Self::new_with_options(config, ClientOptions::default())
    }

    /// Create a gateway with custom options
    pub fn new_with_options(config: &BackendConfig, options: ClientOptions) -> Self {
        let http_client = Client::new();
        let url = config.base_url();
        let key = &config.anon_key;

        Self {
            postgrest: PostgrestClient::new(
                &url,
                key,
                &options.db_schema,
                options.request_timeout,
                http_client.clone(),
            ),
            realtime: RealtimeClient::new(&url, key),
            functions: FunctionsClient::new(
                &url,
                key,
                options.request_timeout,
                http_client.clone(),
            ),
            auth: AuthClient::new(&url, key, http_client, options),
        }
    }

    /// The auth client, for session installation and refresh
    pub fn auth(&self) -> &AuthClient {
        &self.auth
    }
}

#[async_trait]
impl Gateway for SupabaseGateway {
    async fn select(&self, query: &Query) -> Result<Vec<Value>> {
        let token = self.auth.bearer_token().await;
        self.postgrest.select(query, &token).await
    }

    async fn count(&self, query: &Query) -> Result<u64> {
        let token = self.auth.bearer_token().await;
        self.postgrest.count(query, &token).await
    }

    async fn insert(&self, table: &str, row: Value) -> Result<Value> {
        let token = self.auth.bearer_token().await;
        self.postgrest.insert(table, &row, &token).await
    }

    async fn update(&self, query: &Query, patch: Value) -> Result<Vec<Value>> {
        let token = self.auth.bearer_token().await;
        self.postgrest.update(query, &patch, &token).await
    }

    async fn delete(&self, query: &Query) -> Result<()> {
        let token = self.auth.bearer_token().await;
        self.postgrest.delete(query, &token).await
    }

    async fn current_session(&self) -> Result<Option<Session>> {
        self.auth.current_session().await
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session> {
        self.auth.sign_in_with_password(email, password).await
    }

    async fn sign_up(&self, email: &str, password: &str, metadata: Value) -> Result<SignUpOutcome> {
        self.auth.sign_up(email, password, metadata).await
    }

    async fn sign_in_anonymously(&self) -> Result<Session> {
        self.auth.sign_in_anonymously().await
    }

    async fn sign_out(&self) -> Result<()> {
        self.auth.sign_out().await
    }

    fn watch_auth(&self) -> watch::Receiver<Option<User>> {
        self.auth.watch()
    }

    async fn subscribe(&self, filter: ChangeFilter) -> Result<ChangeStream> {
        let token = self.auth.bearer_token().await;
        self.realtime.subscribe(filter, &token).await
    }

    async fn invoke_function(&self, name: &str, body: Value) -> Result<Value> {
        let token = self.auth.bearer_token().await;
        self.functions.invoke(name, &body, &token).await
    }
}
