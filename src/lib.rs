pub mod auth;
pub mod config;
pub mod content;
pub mod cookie;
pub mod error;
pub mod logger;
pub mod page_id;
pub mod page_store;
pub mod publisher;
pub mod server;
pub mod session;
pub mod view;
