//! Headless screen logic. Each screen owns its interaction state and talks
//! to the backend only through the accessors.

pub mod admin;
pub mod chat;
pub mod home;
pub mod landing;
pub mod profile;
pub mod wizard;

pub use admin::AdminDashboard;
pub use chat::{chat_list, pets_without_chat, ChatScreen, Exchange, Exchanged};
pub use home::{sections, HomeSections, HomeTab, NotificationFeed};
pub use landing::Landing;
pub use profile::ProfileView;
pub use wizard::{AdoptionWizard, Advance, Field, Retreat, Submission};
