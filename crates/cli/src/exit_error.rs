// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Exit-code policy for the messaging utility.
//!
//! 0: delivered (verified, risked) or fallback triggered.
//! 1: dropped or delivery machinery failure.
//! 2: invalid input (unknown role, bad arguments).

use troupe_core::DeliveryOutcome;

/// A failure carrying the process exit code.
#[derive(Debug)]
pub struct ExitError {
    pub code: i32,
    pub message: String,
}

impl ExitError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self { code: 2, message: message.into() }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self { code: 1, message: message.into() }
    }

    pub fn exit(self) -> ! {
        eprintln!("troupe: {}", self.message);
        std::process::exit(self.code);
    }
}

impl From<anyhow::Error> for ExitError {
    fn from(e: anyhow::Error) -> Self {
        Self::failure(format!("{e:#}"))
    }
}

/// Map a delivery outcome to the documented exit code.
pub fn exit_code_for(outcome: &DeliveryOutcome) -> i32 {
    if outcome.is_delivered() {
        0
    } else {
        1
    }
}

#[cfg(test)]
#[path = "exit_error_tests.rs"]
mod tests;
