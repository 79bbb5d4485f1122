pub mod auth;
pub mod config;
pub mod errors;
pub mod generate;
pub mod server;
pub mod settings;
pub mod stage;
pub mod store;
pub mod studio_config;
pub mod transcript;
pub mod tree;
pub mod ui;
pub mod workflow;
pub mod workspace;
