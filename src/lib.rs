pub mod auth;
pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod presence;
pub mod protocol;
pub mod routes;
pub mod services;
pub mod state;
pub mod storage;
