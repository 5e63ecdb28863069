pub mod analytics;
pub mod cache;
pub mod codec;
pub mod config;
pub mod diary;
pub mod entry;
pub mod environment;
pub mod errors;
pub mod export;
pub mod history;
pub mod reference;
pub mod routes;
pub mod store;
pub mod sync;
