use devpilot::chat::ChatSession;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Shared application state: the one conversation the page shows
#[derive(Clone)]
pub struct AppState {
    pub chat: Arc<Mutex<ChatSession>>,
}

impl AppState {
    pub fn new(chat: ChatSession) -> Self {
        Self {
            chat: Arc::new(Mutex::new(chat)),
        }
    }
}
