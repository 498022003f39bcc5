// Infrastructure layer (shared components)
pub mod infrastructure;

// Re-export infrastructure modules for convenient paths
pub use infrastructure::auth;
pub use infrastructure::config;
pub use infrastructure::error;

// Domain layer (business logic)
pub mod access;
pub mod cache;
pub mod domain;
pub mod events;
pub mod identity;
pub mod jobs;
pub mod repository;

// Application layer
pub mod api;
pub mod server;
