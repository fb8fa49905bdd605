pub mod app;
pub mod catalog;
pub mod config;
pub mod ledger;
pub mod pipeline;
pub mod poster;
pub mod shelf;
pub mod slug;
pub mod tmdb;
