pub mod client;
pub mod config;
pub mod domain;
pub mod logging;
pub mod multipart;
pub mod observability;
pub mod repository;
pub mod response_handler;
pub mod router;
pub mod server;
pub mod service;
