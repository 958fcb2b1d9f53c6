pub mod analysis;
pub mod config;
pub mod dispatcher;
pub mod errors;
pub mod invoker;
pub mod mcp;
pub mod registry;
pub mod resources;
