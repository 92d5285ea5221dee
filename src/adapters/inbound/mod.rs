pub mod telemetry_listener;

pub use telemetry_listener::*;
