//! # pl-network
//!
//! Wire layer for PasteLink: local host resolution, per-peer encrypted
//! sessions and the length-delimited pull request/response protocol.

pub mod client;
pub mod hosts;
pub mod protocol;
pub mod server;
pub mod session_manager;

pub use client::PullClient;
pub use hosts::HostResolver;
pub use protocol::{PullRequest, PullResponse, WireMessage};
pub use server::{PullHandler, PullServer};
pub use session_manager::SessionManager;
