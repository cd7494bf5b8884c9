use serde_json::json;
use std::fmt;
use tokio::task::JoinHandle;

use crate::accessors::{outcome, soft};
use crate::error::Result;
use crate::gateway::Remote;
use crate::models::{decode_rows, Notification, NotificationRow, WriteOutcome};
use crate::postgrest::{Query, SortOrder};
use crate::realtime::{ChangeEvent, ChangeFilter, SubscriptionHandle};

/// The signed-in user's notifications
#[derive(Debug, Clone)]
pub struct Notifications {
    remote: Remote,
}

impl Notifications {
    pub fn new(remote: Remote) -> Self {
        Self { remote }
    }

    /// Newest first
    pub async fn fetch_mine(&self) -> Result<Vec<Notification>> {
        let user_id = match self.remote.current_user_id().await? {
            Some(id) => id,
            None => return Ok(Vec::new()),
        };
        let rows = self
            .remote
            .gateway()?
            .select(
                &Query::table("notifications")
                    .eq("user_id", &user_id)
                    .order("created_at", SortOrder::Descending),
            )
            .await?;
        Ok(decode_rows::<NotificationRow>("notifications", rows)
            .into_iter()
            .map(Notification::from)
            .collect())
    }

    pub async fn mine(&self) -> Vec<Notification> {
        soft("list notifications", self.fetch_mine().await)
    }

    pub async fn mark_read(&self, id: &str) -> WriteOutcome {
        outcome("mark notification read", self.try_mark_read(id).await)
    }

    async fn try_mark_read(&self, id: &str) -> Result<WriteOutcome> {
        self.remote
            .gateway()?
            .update(
                &Query::table("notifications").eq("id", id),
                json!({ "is_read": true }),
            )
            .await?;
        Ok(WriteOutcome::with_id(id))
    }

    /// Marks every unread notification of the signed-in user as read
    pub async fn mark_all_read(&self) -> WriteOutcome {
        outcome("mark all notifications read", self.try_mark_all_read().await)
    }

    async fn try_mark_all_read(&self) -> Result<WriteOutcome> {
        let user_id = self.remote.require_user_id().await?;
        let updated = self
            .remote
            .gateway()?
            .update(
                &Query::table("notifications")
                    .eq("user_id", &user_id)
                    .eq("is_read", false),
                json!({ "is_read": true }),
            )
            .await?;
        log::debug!("marked {} notifications read", updated.len());
        Ok(WriteOutcome::ok())
    }

    /// Delivers each notification inserted for the signed-in user to
    /// `callback` until the returned subscription is closed or dropped.
    ///
    /// Without a backend or a signed-in user the subscription is inert.
    pub async fn subscribe<F>(&self, callback: F) -> NotificationSubscription
    where
        F: Fn(Notification) + Send + 'static,
    {
        match self.try_subscribe(callback).await {
            Ok(subscription) => subscription,
            Err(e) => {
                soft::<()>("subscribe to notifications", Err(e));
                NotificationSubscription::inert()
            }
        }
    }

    async fn try_subscribe<F>(&self, callback: F) -> Result<NotificationSubscription>
    where
        F: Fn(Notification) + Send + 'static,
    {
        let user_id = match self.remote.current_user_id().await? {
            Some(id) => id,
            None => {
                log::debug!("no signed-in user, notification feed not started");
                return Ok(NotificationSubscription::inert());
            }
        };
        let filter = ChangeFilter::table("notifications")
            .event(ChangeEvent::Insert)
            .eq("user_id", &user_id);
        let (mut receiver, handle) = self.remote.gateway()?.subscribe(filter).await?.into_parts();

        let task = tokio::spawn(async move {
            while let Some(change) = receiver.recv().await {
                match serde_json::from_value::<NotificationRow>(change.record) {
                    Ok(row) => callback(Notification::from(row)),
                    Err(e) => log::warn!("ignoring malformed notification: {}", e),
                }
            }
            log::debug!("notification feed ended");
        });

        Ok(NotificationSubscription {
            handle,
            task: Some(task),
        })
    }
}

/// A live notification feed. Closing is idempotent and also happens on drop.
pub struct NotificationSubscription {
    handle: SubscriptionHandle,
    task: Option<JoinHandle<()>>,
}

impl NotificationSubscription {
    fn inert() -> Self {
        Self {
            handle: SubscriptionHandle::inert(),
            task: None,
        }
    }

    /// Whether notifications are still being delivered
    pub fn is_active(&self) -> bool {
        self.task.as_ref().map_or(false, |task| !task.is_finished())
    }

    pub fn close(&mut self) {
        self.handle.close();
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for NotificationSubscription {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for NotificationSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotificationSubscription")
            .field("active", &self.is_active())
            .finish()
    }
}
