//! mkfsvol daemon internals: flags, logging and the plugin server.

pub mod cli;
pub mod logging;
pub mod server;
