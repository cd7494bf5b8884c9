use pet_adoption_client::config::ClientOptions;
use pet_adoption_client::error::Error;
use pet_adoption_client::gateway::{Gateway, MemoryGateway};
use pet_adoption_client::models::{ApplicationForm, ApplicationStatus, PetStatus, Sender};
use pet_adoption_client::AdoptionClient;
use serde_json::{json, Value};
use std::sync::Arc;

fn pet(id: &str, name: &str, kind: &str) -> Value {
    json!({
        "id": id,
        "name": name,
        "type": kind,
        "breed": "米克斯",
        "gender": "母",
        "status": "available",
    })
}

fn signed_in() -> (Arc<MemoryGateway>, AdoptionClient) {
    let gateway = Arc::new(MemoryGateway::new());
    gateway
        .seed("pets", vec![pet("p1", "Lucky", "dog"), pet("p2", "Momo", "cat")])
        .unwrap();
    let user = gateway.add_account("amy@example.com", "secret1", json!({ "name": "Amy" }));
    gateway.sign_in_as(user);
    let client = AdoptionClient::with_gateway(gateway.clone(), ClientOptions::default());
    (gateway, client)
}

fn pet_status(gateway: &MemoryGateway, id: &str) -> String {
    gateway
        .rows("pets")
        .into_iter()
        .find(|row| row["id"] == id)
        .and_then(|row| row["status"].as_str().map(str::to_string))
        .unwrap_or_default()
}

#[tokio::test]
async fn unconfigured_reads_are_empty() {
    let client = AdoptionClient::unconfigured();
    assert!(client.pets().available().await.is_empty());
    assert!(client.favorites().ids().await.is_empty());
    assert!(client.applications().mine().await.is_empty());
    assert!(client.chats().sessions().await.is_empty());
    assert!(client.notifications().mine().await.is_empty());
    assert!(matches!(
        client.favorites().toggle("p1").await,
        Err(Error::NotConfigured)
    ));
}

#[tokio::test]
async fn toggle_twice_restores_membership() {
    let (_gateway, client) = signed_in();
    let favorites = client.favorites();

    assert!(favorites.toggle("p1").await.unwrap());
    assert!(favorites.is_favorite("p1").await);
    assert_eq!(favorites.ids().await, vec!["p1".to_string()]);
    assert_eq!(favorites.pets().await[0].name, "Lucky");

    assert!(!favorites.toggle("p1").await.unwrap());
    assert!(!favorites.is_favorite("p1").await);
}

#[tokio::test]
async fn adding_a_favorite_twice_succeeds() {
    let (gateway, client) = signed_in();
    assert!(client.favorites().add("p2").await.success);
    assert!(client.favorites().add("p2").await.success);
    assert_eq!(gateway.rows("favorites").len(), 1);
}

#[tokio::test]
async fn rejected_application_is_no_longer_active() {
    let (_gateway, client) = signed_in();
    let applications = client.applications();
    assert!(!applications.has_active("p1").await);

    let submitted = applications.submit("p1", &ApplicationForm::default()).await;
    assert!(submitted.success);
    assert!(applications.has_active("p1").await);

    let mine = applications.mine().await;
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].pet_name, "Lucky");
    assert_eq!(mine[0].status, ApplicationStatus::Pending);

    let id = submitted.id.unwrap();
    let rejected = applications
        .update_status(&id, ApplicationStatus::Rejected, Some("住處不適合"))
        .await;
    assert!(rejected.success);
    assert!(!applications.has_active("p1").await);
}

#[tokio::test]
async fn cancelled_application_is_no_longer_active() {
    let (_gateway, client) = signed_in();
    let applications = client.applications();
    let id = applications
        .submit("p2", &ApplicationForm::default())
        .await
        .id
        .unwrap();
    assert!(applications.has_active("p2").await);

    let cancelled = applications
        .update_status(&id, ApplicationStatus::Cancelled, None)
        .await;
    assert!(cancelled.success);
    assert_eq!(applications.mine().await[0].status, ApplicationStatus::Cancelled);
    assert!(!applications.has_active("p2").await);
}

#[tokio::test]
async fn search_treats_wildcards_literally() {
    let (gateway, client) = signed_in();
    gateway.insert("pets", pet("p3", "Mo_mo", "cat")).await.unwrap();
    let pets = client.pets();

    let names = |found: Vec<pet_adoption_client::models::Pet>| {
        found.into_iter().map(|p| p.name).collect::<Vec<_>>()
    };
    assert_eq!(names(pets.search("_").await), ["Mo_mo"]);
    assert!(pets.search("%").await.is_empty());
    assert_eq!(pets.search("*").await.len(), 3);
    assert_eq!(names(pets.search("MOM").await), ["Momo"]);
}

#[tokio::test]
async fn approval_marks_the_pet_adopted() {
    let (gateway, client) = signed_in();
    let applications = client.applications();
    let id = applications
        .submit("p1", &ApplicationForm::default())
        .await
        .id
        .unwrap();

    let approved = applications
        .update_status(&id, ApplicationStatus::Approved, None)
        .await;
    assert!(approved.success);
    assert_eq!(approved.warning, None);
    assert_eq!(pet_status(&gateway, "p1"), PetStatus::Adopted.as_str());

    let available = client.pets().available().await;
    assert_eq!(available.len(), 1);
    assert_eq!(available[0].id, "p2");
}

#[tokio::test]
async fn approval_survives_a_failed_pet_update() {
    let (gateway, client) = signed_in();
    let applications = client.applications();
    let id = applications
        .submit("p2", &ApplicationForm::default())
        .await
        .id
        .unwrap();

    gateway.set_failing("pets", true);
    let approved = applications
        .update_status(&id, ApplicationStatus::Approved, None)
        .await;
    gateway.set_failing("pets", false);

    assert!(approved.success);
    assert!(approved.warning.is_some());
    assert_eq!(pet_status(&gateway, "p2"), PetStatus::Available.as_str());
}

#[tokio::test]
async fn submit_without_a_user_asks_to_sign_in() {
    let gateway = Arc::new(MemoryGateway::new());
    let client = AdoptionClient::with_gateway(gateway, ClientOptions::default());
    let outcome = client
        .applications()
        .submit("p1", &ApplicationForm::default())
        .await;
    assert!(!outcome.success);
    assert_eq!(outcome.error.as_deref(), Some("請先登入"));
}

#[tokio::test]
async fn chat_session_is_reused_and_messages_stay_in_order() {
    let (gateway, client) = signed_in();
    let chats = client.chats();

    let first = chats.get_or_create_session("p2").await.unwrap();
    let again = chats.get_or_create_session("p2").await.unwrap();
    assert_eq!(first, again);
    assert_eq!(gateway.rows("chat_sessions").len(), 1);

    chats.send_message(&first, "牠會用貓砂嗎？", Sender::User).await.unwrap();
    chats.send_message(&first, "會的，很乖！", Sender::Volunteer).await.unwrap();

    let texts: Vec<String> = chats
        .messages_for_pet("p2")
        .await
        .into_iter()
        .map(|m| m.text)
        .collect();
    assert_eq!(texts, ["牠會用貓砂嗎？", "會的，很乖！"]);

    let sessions = chats.sessions().await;
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].pet.name, "Momo");
    assert_eq!(sessions[0].volunteer_name, "Sarah");
    assert_eq!(sessions[0].last_message.as_deref(), Some("會的，很乖！"));
}

#[tokio::test]
async fn sessions_for_removed_pets_are_hidden() {
    let (_gateway, client) = signed_in();
    let chats = client.chats();
    chats.get_or_create_session("p1").await.unwrap();
    chats.get_or_create_session("gone").await.unwrap();

    let sessions = chats.sessions().await;
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].pet.id, "p1");
}

#[tokio::test]
async fn pushed_notifications_reach_the_subscriber() {
    let (gateway, client) = signed_in();
    let notifications = client.notifications();
    let user_id = client.remote().require_user_id().await.unwrap();

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let mut subscription = notifications
        .subscribe(move |n| {
            let _ = tx.send(n);
        })
        .await;
    assert!(subscription.is_active());

    gateway
        .insert(
            "notifications",
            json!({
                "user_id": user_id,
                "type": "application_update",
                "title": "申請已通過",
                "body": "恭喜！",
                "is_read": false,
            }),
        )
        .await
        .unwrap();

    let pushed = rx.recv().await.unwrap();
    assert_eq!(pushed.title, "申請已通過");
    assert_eq!(notifications.mine().await.len(), 1);

    subscription.close();
    subscription.close();
    assert!(!subscription.is_active());
    assert_eq!(gateway.subscriber_count(), 0);
}
