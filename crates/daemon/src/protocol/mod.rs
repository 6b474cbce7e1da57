// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Control-channel protocol for daemon communication.
//!
//! Wire format: newline-delimited JSON frames. A frame is either a request
//! `{"id": N, "op": ...}`, a response echoing the `id`, or an unsolicited
//! event `{"channel": ...}` on subscribed connections.

mod request;
mod response;
mod wire;

pub use request::{Request, RequestFrame, SubscribeChannel, WriteMode};
pub use response::{
    DaemonEvent, EnterOutcome, EventFrame, PaneStatusEntry, Response, ResponseFrame, WriteStatus,
};
pub use wire::{read_frame, read_frame_unbounded, write_frame, ProtocolError};

#[cfg(test)]
mod property_tests;
