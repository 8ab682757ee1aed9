//! Replboot Coordinator - replica-set bootstrap and membership
//!
//! This crate provides:
//! - `Coordinator`: the idempotent bootstrap operations
//! - `CommandClient`: one administrative command per connection
//! - `ReplicaSetConfig`: current membership and successor proposals
//! - `RetryPolicy`: bounded, fixed-interval polling

mod client;
mod command;
mod coordinator;
mod credentials;
mod reply;
mod replset;
mod retry;

pub use client::*;
pub use command::*;
pub use coordinator::*;
pub use credentials::*;
pub use reply::*;
pub use replset::*;
pub use retry::*;
