//! Browse screen: catalog filtering and the notification feed

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use crate::accessors::{NotificationSubscription, Notifications};
use crate::models::{Notification, Pet, PetType, WriteOutcome};
use crate::timefmt::age_label;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HomeTab {
    #[default]
    All,
    Cat,
    Dog,
}

impl HomeTab {
    fn accepts(&self, pet_type: PetType) -> bool {
        match self {
            HomeTab::All => true,
            HomeTab::Cat => pet_type == PetType::Cat,
            HomeTab::Dog => pet_type == PetType::Dog,
        }
    }
}

/// Pets shown on the home screen for a tab and search text
#[derive(Debug, Clone, PartialEq)]
pub struct HomeSections<'a> {
    pub matching: Vec<&'a Pet>,
    pub featured: Vec<&'a Pet>,
    pub newest: Vec<&'a Pet>,
}

/// Name matches case-insensitively, breed as typed
pub fn matches_search(pet: &Pet, search: &str) -> bool {
    pet.name.to_lowercase().contains(&search.to_lowercase()) || pet.breed.contains(search)
}

pub fn sections<'a>(pets: &'a [Pet], tab: HomeTab, search: &str) -> HomeSections<'a> {
    let matching: Vec<&Pet> = pets
        .iter()
        .filter(|pet| tab.accepts(pet.pet_type) && matches_search(pet, search))
        .collect();
    HomeSections {
        featured: matching.iter().copied().filter(|p| p.is_featured).collect(),
        newest: matching.iter().copied().filter(|p| p.is_new).collect(),
        matching,
    }
}

/// The signed-in user's notifications with live updates.
///
/// Pushed notifications are queued by the subscription and prepended by
/// [`poll`](Self::poll) or [`wait_for_push`](Self::wait_for_push). Dropping
/// the feed ends the subscription.
#[derive(Debug)]
pub struct NotificationFeed {
    items: Vec<Notification>,
    incoming: mpsc::UnboundedReceiver<Notification>,
    subscription: NotificationSubscription,
}

impl NotificationFeed {
    /// Loads the current notifications and starts listening for new ones
    pub async fn open(notifications: &Notifications) -> Self {
        let items = notifications.mine().await;
        let (tx, incoming) = mpsc::unbounded_channel();
        let subscription = notifications
            .subscribe(move |notification| {
                if tx.send(notification).is_err() {
                    log::debug!("notification feed closed, dropping push");
                }
            })
            .await;

        Self {
            items,
            incoming,
            subscription,
        }
    }

    /// Newest first
    pub fn items(&self) -> &[Notification] {
        &self.items
    }

    pub fn unread_count(&self) -> usize {
        self.items.iter().filter(|n| !n.is_read).count()
    }

    pub fn is_live(&self) -> bool {
        self.subscription.is_active()
    }

    /// Prepends queued pushes and returns how many arrived
    pub fn poll(&mut self) -> usize {
        let mut arrived = 0;
        while let Ok(notification) = self.incoming.try_recv() {
            self.items.insert(0, notification);
            arrived += 1;
        }
        arrived
    }

    /// Waits for the next push and prepends it. Returns false once the
    /// subscription has ended.
    pub async fn wait_for_push(&mut self) -> bool {
        match self.incoming.recv().await {
            Some(notification) => {
                self.items.insert(0, notification);
                true
            }
            None => false,
        }
    }

    /// Opening the panel marks everything read. Local flags change only
    /// when the backend accepted the update.
    pub async fn open_panel(&mut self, notifications: &Notifications) -> WriteOutcome {
        if self.unread_count() == 0 {
            return WriteOutcome::ok();
        }
        let outcome = notifications.mark_all_read().await;
        if outcome.success {
            for notification in &mut self.items {
                notification.is_read = true;
            }
        }
        outcome
    }

    /// `(title, age label)` pairs for rendering
    pub fn labels(&self, now: &DateTime<Utc>) -> Vec<(&str, String)> {
        self.items
            .iter()
            .map(|n| {
                let age = n
                    .created_at
                    .as_ref()
                    .map(|at| age_label(at, now))
                    .unwrap_or_default();
                (n.title.as_str(), age)
            })
            .collect()
    }

    pub fn close(&mut self) {
        self.subscription.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock;

    #[test]
    fn tab_and_search_combine() {
        let pets = mock::pets();
        let cats = sections(&pets, HomeTab::Cat, "");
        assert_eq!(
            cats.matching.iter().map(|p| p.name.as_str()).collect::<Vec<_>>(),
            ["Momo", "Oreo"]
        );
        assert_eq!(cats.featured.len(), 1);
        assert_eq!(cats.newest.len(), 2);

        let found = sections(&pets, HomeTab::All, "lUcK");
        assert_eq!(found.matching.len(), 1);
        let by_breed = sections(&pets, HomeTab::Dog, "柴犬");
        assert_eq!(by_breed.matching[0].name, "Coco");
        assert!(sections(&pets, HomeTab::Dog, "Momo").matching.is_empty());
    }
}
