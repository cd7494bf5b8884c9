//! Edge Functions client

use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::fetch::Fetch;

/// Client for Edge Functions
#[derive(Debug, Clone)]
pub struct FunctionsClient {
    /// The base URL for the project
    url: String,

    /// The anonymous API key for the project
    key: String,

    /// Request timeout
    timeout: Option<Duration>,

    /// HTTP client
    client: Client,
}

impl FunctionsClient {
    /// Create a new FunctionsClient
    pub(crate) fn new(url: &str, key: &str, timeout: Option<Duration>, client: Client) -> Self {
        Self {
            url: url.to_string(),
            key: key.to_string(),
            timeout,
            client,
        }
    }

    fn function_url(&self, function_name: &str) -> String {
        format!("{}/functions/v1/{}", self.url, function_name)
    }

    /// Invoke a function with a JSON body.
    ///
    /// A JSON response is returned as is; any other body comes back as a
    /// JSON string.
    pub async fn invoke<T: Serialize>(&self, function_name: &str, body: &T, token: &str) -> Result<Value> {
        let url = self.function_url(function_name);
        let response = Fetch::post(&self.client, &url)
            .api_auth(&self.key, token)
            .timeout(self.timeout)
            .json(body)?
            .execute_raw()
            .await?;

        let status = response.status().as_u16();
        let text = response.text().await?;
        if !(200..300).contains(&status) {
            return Err(Error::function(format!(
                "{} failed with status {}: {}",
                function_name, status, text
            )));
        }

        Ok(serde_json::from_str(&text).unwrap_or(Value::String(text)))
    }
}
