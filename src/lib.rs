// Domain
pub mod broadcast;
pub mod composer;

// Infrastructure
pub mod auth;
pub mod backend;
pub mod config;
pub mod error;
pub mod metrics;

// Application layer
pub mod api;
pub mod server;

// Supporting modules
pub mod tasks;
