pub mod config;
pub mod errors;
pub mod events;
pub mod executor;
pub mod feedback;
pub mod gates;
pub mod orchestrator;
pub mod record;
pub mod util;
pub mod worker;
