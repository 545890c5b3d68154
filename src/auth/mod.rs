use axum::{routing::{get, post}, Router};
use serde::Serialize;

use crate::{users::User, AppState};

mod actor;
mod credentials;
mod login;
mod logout;
mod signup;

pub use actor::{Actor, BearerToken};
pub use credentials::{Credentials, SqliteCredentials};
pub use login::login;
pub use signup::{bootstrap_admin, signup};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/signup", post(signup::signup_handler))
        .route("/login", post(login::login_handler))
        .route("/logout", post(logout::logout))
        .route("/me", get(login::me))
}

#[derive(Debug, Serialize)]
pub struct Session {
    pub token: String,
    pub user: User,
}
