// Application layer - Use cases and the ports they depend on
pub mod dashboard_service;
pub mod event_buffer;
pub mod feed_connection;
pub mod history_repository;
pub mod history_service;
pub mod layout_machine;
pub mod live_feed;
pub mod preference_store;
pub mod preferences_service;
pub mod upstream;
