pub mod engine;
pub mod persist;
pub mod scenario;
pub mod telemetry;
