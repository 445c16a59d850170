// Infrastructure layer - External dependencies and adapters
pub mod config;
pub mod event_stream;
pub mod history_repository;
pub mod http_response;
pub mod preference_store;
pub mod upstream_transport;
