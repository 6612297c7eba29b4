// SPDX-License-Identifier: GPL-3.0-only

//! Process-wide in-flight session registry
//!
//! Holds the strong reference that keeps a session alive between `pick()`
//! and its terminal state, so callers never need to retain the picker.

use super::{BrokerSession, SessionId};
use std::collections::HashMap;
use std::sync::{Arc, LazyLock, Mutex, MutexGuard, PoisonError};
use tracing::debug;

static IN_FLIGHT: LazyLock<Mutex<HashMap<SessionId, Arc<BrokerSession>>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

fn table() -> MutexGuard<'static, HashMap<SessionId, Arc<BrokerSession>>> {
    IN_FLIGHT.lock().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn retain(session: Arc<BrokerSession>) {
    let id = session.id();
    let count = {
        let mut table = table();
        table.insert(id, session);
        table.len()
    };
    debug!(session = %id, in_flight = count, "Session retained");
}

pub(crate) fn lookup(id: SessionId) -> Option<Arc<BrokerSession>> {
    table().get(&id).cloned()
}

pub(crate) fn release(id: SessionId) -> bool {
    let (released, count) = {
        let mut table = table();
        let released = table.remove(&id).is_some();
        (released, table.len())
    };
    debug!(session = %id, released, in_flight = count, "Session released");
    released
}

/// Whether the registry currently owns session `id`
pub fn is_in_flight(id: SessionId) -> bool {
    table().contains_key(&id)
}

/// Number of sessions currently owned by the registry
pub fn in_flight_count() -> usize {
    table().len()
}
