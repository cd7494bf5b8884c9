//! Realtime change subscriptions over the Phoenix websocket

mod message;
mod subscription;

use futures_util::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use url::Url;

use crate::error::{Error, Result};

pub use message::RealtimeMessage;
pub use subscription::*;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Client for Realtime
#[derive(Debug, Clone)]
pub struct RealtimeClient {
    /// The base URL for the project
    url: String,

    /// The anonymous API key for the project
    key: String,

    next_ref: Arc<AtomicU32>,
}

impl RealtimeClient {
    /// Create a new RealtimeClient
    pub(crate) fn new(url: &str, key: &str) -> Self {
        Self {
            url: url.to_string(),
            key: key.to_string(),
            next_ref: Arc::new(AtomicU32::new(1)),
        }
    }

    /// WebSocket URL for the Realtime API
    pub fn socket_url(&self) -> Result<Url> {
        let base = self
            .url
            .replacen("http://", "ws://", 1)
            .replacen("https://", "wss://", 1);
        let mut url = Url::parse(&format!("{}/realtime/v1/websocket", base))?;
        match url.scheme() {
            "ws" | "wss" => {}
            other => return Err(Error::realtime(format!("unsupported URL scheme: {}", other))),
        }
        url.query_pairs_mut()
            .append_pair("apikey", &self.key)
            .append_pair("vsn", "1.0.0");
        Ok(url)
    }

    fn next_ref(&self) -> u32 {
        self.next_ref.fetch_add(1, Ordering::SeqCst)
    }

    /// Opens a socket, joins a postgres_changes channel for `filter` and
    /// forwards matching row changes until the stream is closed.
    pub async fn subscribe(&self, filter: ChangeFilter, access_token: &str) -> Result<ChangeStream> {
        let url = self.socket_url()?;
        log::debug!("connecting to {}", url.as_str().split('?').next().unwrap_or(""));

        let (ws_stream, _) = connect_async(url.as_str())
            .await
            .map_err(|e| Error::realtime(format!("WebSocket connection failed: {}", e)))?;
        let (mut write, mut read) = ws_stream.split();

        let join = RealtimeMessage::join(&filter, access_token, self.next_ref());
        write
            .send(Message::Text(serde_json::to_string(&join)?))
            .await
            .map_err(|e| Error::realtime(format!("join failed: {}", e)))?;
        log::info!("joined {}", filter.topic());

        let (change_tx, change_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
        let next_ref = self.next_ref.clone();
        let topic = filter.topic();

        tokio::spawn(async move {
            let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
            heartbeat.tick().await;

            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => {
                        let leave = RealtimeMessage::leave(&topic, next_ref.fetch_add(1, Ordering::SeqCst));
                        if let Ok(text) = serde_json::to_string(&leave) {
                            let _ = write.send(Message::Text(text)).await;
                        }
                        let _ = write.close().await;
                        log::debug!("left {}", topic);
                        break;
                    }
                    _ = heartbeat.tick() => {
                        let beat = RealtimeMessage::heartbeat(next_ref.fetch_add(1, Ordering::SeqCst));
                        let sent = match serde_json::to_string(&beat) {
                            Ok(text) => write.send(Message::Text(text)).await,
                            Err(_) => Ok(()),
                        };
                        if let Err(e) = sent {
                            log::warn!("heartbeat on {} failed: {}", topic, e);
                            break;
                        }
                    }
                    msg = read.next() => match msg {
                        Some(Ok(Message::Text(text))) => {
                            let msg = match serde_json::from_str::<RealtimeMessage>(&text) {
                                Ok(msg) => msg,
                                Err(e) => {
                                    log::warn!("unreadable realtime message: {}", e);
                                    continue;
                                }
                            };
                            if let Some(reason) = msg.join_error() {
                                log::error!("subscription to {} rejected: {}", topic, reason);
                                break;
                            }
                            if let Some(change) = msg.row_change() {
                                if !filter.matches(&change.table, change.event, &change.record) {
                                    continue;
                                }
                                if change_tx.send(change).is_err() {
                                    break;
                                }
                            }
                        }
                        Some(Ok(Message::Close(_))) | None => {
                            log::info!("realtime socket for {} closed", topic);
                            break;
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            log::error!("realtime read error on {}: {}", topic, e);
                            break;
                        }
                    }
                }
            }
        });

        let handle = SubscriptionHandle::new(move || {
            let _ = shutdown_tx.send(());
        });
        Ok(ChangeStream::new(change_rx, handle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn socket_url_maps_scheme_and_key() {
        let client = RealtimeClient::new("https://abc.supabase.co", "anon");
        let url = client.socket_url().unwrap();
        assert_eq!(url.scheme(), "wss");
        assert_eq!(url.path(), "/realtime/v1/websocket");
        assert!(url.query().unwrap_or("").contains("apikey=anon"));

        let local = RealtimeClient::new("http://localhost:54321", "anon");
        assert_eq!(local.socket_url().unwrap().scheme(), "ws");
    }

    #[test]
    fn socket_url_rejects_other_schemes() {
        let client = RealtimeClient::new("ftp://example.com", "anon");
        assert!(matches!(client.socket_url(), Err(Error::Realtime(_))));
    }
}
