// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! troupe-engine: the runtime around the daemon and the stores.
//!
//! Delivery (verified injection with fallback), compaction detection, the
//! transition ledger, the background worker manager, and the experiment
//! engine all live here, talking to the daemon through the [`PaneHost`]
//! seam so every piece is testable against a fake.

pub mod background;
pub mod compaction;
pub mod delivery;
pub mod experiment;
pub mod host;
pub mod transitions;

pub use background::{BackgroundError, BackgroundManager, WorkerInfo};
pub use compaction::{CompactionDetector, CompactionState};
pub use delivery::{DeliveryEngine, DeliveryError, DeliveryReport};
pub use experiment::{ExperimentEngine, ExperimentError};
pub use host::{HostError, PaneData, PaneHost, SocketPaneHost};
pub use transitions::{TransitionError, TransitionLedger};

#[cfg(any(test, feature = "test-support"))]
pub use host::testing::FakePaneHost;
