use std::sync::Arc;

use axum::{debug_handler, extract::State};

use crate::{extract::Json, AppResult, AppState, Message};

use super::{BearerToken, Credentials};

#[debug_handler(state = AppState)]
pub(crate) async fn logout(
    State(credentials): State<Arc<dyn Credentials>>,
    BearerToken(token): BearerToken,
) -> AppResult<Json<Message>> {
    credentials.revoke(&token).await?;
    Ok(Json(Message::new("Logged out successfully")))
}
