pub mod aggregate;
pub mod catalog;
pub mod config;
pub mod consts;
pub mod editor;
pub mod engine;
pub mod error;
pub mod logging;
pub mod provider;
pub mod server;
pub mod store;
pub mod tracker;
