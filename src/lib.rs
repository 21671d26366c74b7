pub mod config;
pub mod net;
pub mod packet;
pub mod query;
pub mod terminal_colors;
pub mod tracing;
