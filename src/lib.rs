// Library exports for daysync crate
// This allows tests and the binary to use the modules

pub mod config;
pub mod error;
pub mod email;
pub mod imap_client;
pub mod days_api;
pub mod http_server;
pub mod sync_service;

// Day presence engines: aggregation and reconciliation
pub mod presence;
