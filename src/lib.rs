pub mod ping;
pub mod events;
pub mod status;
pub mod config;
pub mod traits;
pub mod clock;
pub mod tracker;
pub mod monitor;
pub mod command;
pub mod report;
pub mod net;
