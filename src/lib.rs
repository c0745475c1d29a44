pub mod app;
pub mod cli;
pub mod config;
pub mod credentials;
pub mod dispatch;
pub mod document;
mod markdown;
pub mod model;
pub mod paths;
pub mod provider;
pub mod render;
