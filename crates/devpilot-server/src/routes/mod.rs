// Export route modules
pub mod chat;
pub mod page;

use crate::state::AppState;
use axum::Router;

// Function to configure all routes
pub fn configure(state: AppState) -> Router {
    Router::new()
        .merge(page::routes())
        .merge(chat::routes(state))
}
