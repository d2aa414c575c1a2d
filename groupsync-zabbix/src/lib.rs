//! # groupsync-zabbix
//!
//! Zabbix implementation of [`groupsync_core::MonitoringProvider`]: a small
//! JSON-RPC client over a blocking `ureq` transport.

pub mod client;
pub mod error;
pub mod password;
pub mod rpc;
pub mod transport;

pub use client::ZabbixClient;
pub use error::RpcError;
pub use transport::{Transport, UreqTransport};
