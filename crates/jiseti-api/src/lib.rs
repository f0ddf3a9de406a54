pub mod admin;
pub mod auth;
pub mod error;
pub mod lifecycle;
pub mod middleware;
pub mod notify;
pub mod public;
pub mod records;
pub mod routes;
pub mod state;
pub mod validation;
pub mod votes;

pub use error::ApiError;
pub use notify::{HttpMailer, LogMailer, Mailer, Notifier};
pub use routes::router;
pub use state::{AppState, AppStateInner, Settings};
