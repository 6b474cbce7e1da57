// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Human-readable session summary derived from the evidence ledger.

use std::collections::BTreeMap;
use std::path::Path;

use troupe_core::{CorrelationId, EventKind, LedgerEvent};
use troupe_storage::{EvidenceLedger, LedgerQuery};

use super::Paths;
use crate::exit_error::ExitError;

pub async fn run(workspace: &Path) -> Result<(), ExitError> {
    let paths = Paths::new(workspace);
    let ledger =
        EvidenceLedger::open(&paths.runtime).map_err(|e| ExitError::failure(e.to_string()))?;
    let events = ledger.reader().query(&LedgerQuery::default());

    let summary = render(&events);
    std::fs::create_dir_all(&paths.handoffs).map_err(|e| ExitError::failure(e.to_string()))?;
    let out = paths.handoffs.join("session.md");
    std::fs::write(&out, summary).map_err(|e| ExitError::failure(e.to_string()))?;
    println!("{}", out.display());
    Ok(())
}

/// Group events by correlation and summarize each operation.
fn render(events: &[LedgerEvent]) -> String {
    let mut by_correlation: BTreeMap<String, Vec<&LedgerEvent>> = BTreeMap::new();
    for event in events {
        by_correlation
            .entry(event.correlation_id.to_string())
            .or_default()
            .push(event);
    }

    let mut out = String::from("# Session handoff\n\n");
    out.push_str(&format!(
        "{} events across {} operations.\n\n",
        events.len(),
        by_correlation.len()
    ));

    let deliveries = events.iter().filter(|e| e.kind == EventKind::VerifyPass).count();
    let fallbacks = events.iter().filter(|e| e.kind == EventKind::TriggerWritten).count();
    let experiments =
        events.iter().filter(|e| e.kind == EventKind::ExperimentCompleted).count();
    out.push_str(&format!(
        "- verified deliveries: {deliveries}\n- trigger fallbacks: {fallbacks}\n- experiments: {experiments}\n\n"
    ));

    out.push_str("## Operations\n\n");
    for (correlation, ops) in &by_correlation {
        let kinds: Vec<String> = ops.iter().map(|e| e.kind.to_string()).collect();
        let first = ops.first().map(|e| e.timestamp_ms).unwrap_or(0);
        out.push_str(&format!(
            "- `{}` at {}: {}\n",
            CorrelationId::from_string(correlation).short(8),
            first,
            kinds.join(" → ")
        ));
    }
    out
}

#[cfg(test)]
#[path = "handoff_tests.rs"]
mod tests;
