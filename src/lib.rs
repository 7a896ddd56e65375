pub mod config;
pub mod coordinator;
pub mod db;
pub mod extract;
pub mod generation;
pub mod messages;
pub mod model;
pub mod scrape;
pub mod selection;
pub mod session;
pub mod settings;
