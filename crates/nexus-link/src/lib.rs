//! Network side of the nexus console: the request gateway (HTTP), the live
//! stream channel (WebSocket) with its reconnection policy, and configuration.

pub mod config;
pub mod error;
pub mod gateway;
pub mod reconnect;
pub mod stream;

pub use config::ConsoleConfig;
pub use error::{LinkError, Result};
pub use gateway::Gateway;
pub use reconnect::ReconnectPolicy;
pub use stream::{StreamClient, StreamConfig, StreamEvent};
