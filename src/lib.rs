pub mod commands;
pub mod config;
pub mod db;
pub mod error;
pub mod giveaway;
pub mod handlers;
pub mod tasks;
pub mod transport;
pub mod ui;
pub mod utils;
