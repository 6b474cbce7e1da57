// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! troupe-broker: the loopback websocket message bus and its trigger-file
//! fallback watcher.
//!
//! The broker lets agents address peers by logical role. Callers register
//! with the shared secret, send envelopes, and receive the delivery
//! taxonomy back as acks. Group aliases resolve here; downstream code only
//! ever sees concrete roles and pane ids.

pub mod auth;
pub mod frames;
pub mod routes;
pub mod server;
pub mod trigger;

pub use auth::{load_or_create_secret, SecretError};
pub use frames::{BackgroundAction, BrokerRequest, BrokerResponse, HealthStatus};
pub use routes::RoleRoutes;
pub use server::{Broker, BrokerError};
pub use trigger::spawn_trigger_watcher;
