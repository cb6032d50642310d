//! Source-style RCON client: framing, authentication and single-command dispatch.

pub mod auth;
pub mod client;
pub mod connection;
pub mod dispatch;
pub mod error;
#[cfg(test)]
pub(crate) mod fake_server;
pub mod packet;
