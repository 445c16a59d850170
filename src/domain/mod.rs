// Domain layer - Pure types and rules, no I/O
pub mod event;
pub mod integrity;
pub mod layout;
pub mod panel;
pub mod physics;
pub mod preferences;
pub mod schema;
pub mod telemetry;
