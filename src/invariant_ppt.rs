//! Construction and link-time invariants, with a log that contract tests
//! can query.
//!
//! Only graph building, plan compilation and node declaration assert here.
//! The tick and message paths never do: the log sits behind a `Mutex`.

#[cfg(feature = "ppt")]
use lazy_static::lazy_static;
#[cfg(feature = "ppt")]
use std::collections::HashSet;
#[cfg(feature = "ppt")]
use std::sync::Mutex;

/// Port ids are unique within a node's inlets and within its outlets.
pub const PORT_IDS_UNIQUE: u32 = 1;
/// Connections that would close a signal cycle are refused.
pub const GRAPH_REJECTS_INVALID: u32 = 2;
/// The execution order covers every node exactly once.
pub const PLAN_SOUNDNESS: u32 = 3;
/// Signal sources only ever resolve onto signal inlets.
pub const MODE_RESOLVED_AT_LINK: u32 = 4;
/// A router has one outlet per filter plus the catch-all.
pub const ROUTE_OUTLET_COUNT: u32 = 5;
/// A bounded control starts inside its bounds.
pub const CONTROL_VALUE_IN_BOUNDS: u32 = 6;

#[cfg(feature = "ppt")]
lazy_static! {
    static ref ENFORCED: Mutex<HashSet<u32>> = Mutex::new(HashSet::new());
}

/// A panicking test must not take the log down with it.
#[cfg(feature = "ppt")]
fn with_log<R>(f: impl FnOnce(&mut HashSet<u32>) -> R) -> R {
    let mut log = ENFORCED
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    f(&mut log)
}

fn failure_message(id: u32, message: &str, context: Option<&str>) -> String {
    match context {
        Some(ctx) => format!("invariant {} violated in {}: {}", id, ctx, message),
        None => format!("invariant {} violated: {}", id, message),
    }
}

/// Check `condition`, panicking with `message` when it does not hold, and
/// record `id` as enforced.
#[cfg(feature = "ppt")]
pub fn assert_invariant(id: u32, condition: bool, message: &str, context: Option<&str>) {
    if !condition {
        let full = failure_message(id, message, context);
        tracing::error!("{}", full);
        panic!("{}", full);
    }
    with_log(|log| log.insert(id));
}

#[cfg(not(feature = "ppt"))]
pub fn assert_invariant(id: u32, condition: bool, message: &str, context: Option<&str>) {
    if !condition {
        panic!("{}", failure_message(id, message, context));
    }
}

/// Panic unless every id in `required` has been enforced at least once.
#[cfg(feature = "ppt")]
pub fn contract_test(test_name: &str, required: &[u32]) {
    let missing: Vec<u32> = with_log(|log| {
        required
            .iter()
            .copied()
            .filter(|id| !log.contains(id))
            .collect()
    });
    if !missing.is_empty() {
        panic!(
            "contract '{}' broken, never enforced: {:?}",
            test_name, missing
        );
    }
}

#[cfg(not(feature = "ppt"))]
pub fn contract_test(_test_name: &str, _required: &[u32]) {}

/// Forget every enforced id.
#[cfg(feature = "ppt")]
pub fn clear_invariant_log() {
    with_log(|log| log.clear());
}

#[cfg(not(feature = "ppt"))]
pub fn clear_invariant_log() {}
