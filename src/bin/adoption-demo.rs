use pet_adoption_client::app::Action;
use pet_adoption_client::prelude::*;
use pet_adoption_client::screens::{sections, HomeTab};
use pet_adoption_client::session::default_avatar_url;
use std::error::Error as StdError;

/// Boots the app against the configured backend, or the built-in catalog
/// when `SUPABASE_URL` / `SUPABASE_ANON_KEY` are unset, and prints what the
/// home screen would show.
#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn StdError>> {
    pretty_env_logger::init();

    let client = AdoptionClient::from_env()?;
    log::info!("backend configured: {}", client.is_configured());

    let mut app = client.app();
    app.start().await?;

    if app.state().user.is_none() {
        match client.landing().demo_login().await {
            AuthOutcome::SignedIn(user) => log::info!("signed in as guest {}", user.id),
            other => log::warn!("guest login unavailable: {:?}", other.message()),
        }
        // Without a backend there is no session; show the offline catalog.
        if app.login_succeeded().await.is_err() {
            app.apply(Action::LoggedIn(AuthUser {
                id: "guest".to_string(),
                email: String::new(),
                name: "Guest".to_string(),
                avatar_url: default_avatar_url("Guest"),
                is_anonymous: true,
            }))?;
            app.load_data().await?;
        }
    }

    let state = app.state();
    println!("mode: {:?}, {} pets", state.mode, state.pets.len());
    let home = sections(&state.pets, HomeTab::All, "");
    for pet in &home.matching {
        let marker = if state.is_favorite(&pet.id) { "♥" } else { " " };
        println!("{} {:<8} {:<6} {} ({})", marker, pet.name, pet.pet_type.as_str(), pet.breed, pet.location);
    }
    println!("featured: {}, new: {}", home.featured.len(), home.newest.len());

    app.sign_out().await;
    Ok(())
}
