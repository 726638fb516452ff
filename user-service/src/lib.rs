pub mod api;
pub mod auth;
pub mod clients;
pub mod config;
pub mod jwt;
pub mod models;
