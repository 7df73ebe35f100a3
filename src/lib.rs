pub mod api;
pub mod catalog;
pub mod client;
pub mod config;
pub mod database;
pub mod fts_tree;
pub mod model;
