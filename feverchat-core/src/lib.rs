pub mod config;
pub mod conversation;
pub mod decoder;
pub mod error;
pub mod http_client;
pub mod model;
pub mod normalizer;
pub mod prompt;
pub mod provider;
pub mod provider_factory;
pub mod providers;
pub mod session;
pub mod stream;
pub mod telemetry;
