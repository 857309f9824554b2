pub mod agent;
pub mod chat;
pub mod config;
pub mod diagnostics;
pub mod errors;
pub mod github;
pub mod models;
pub mod monitor;
pub mod prompt_template;
pub mod providers;
pub mod react;
pub mod supabase;
pub mod systems;
