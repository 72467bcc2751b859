pub mod backend;
pub mod client;
pub mod memory;
mod record;
