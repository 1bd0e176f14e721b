use std::fmt;
use std::thread::{self, ThreadId};
use uuid::Uuid;

use crate::factory::channel::CachedChannel;

// -----------------------------------------------------------------------------
// ----- HandoffToken ----------------------------------------------------------

/// Opaque correlation id between `prepare_switch_context` on one thread
/// and `switch_context` on another. Claimed at most once.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct HandoffToken(Uuid);

impl HandoffToken {
    pub(crate) fn fresh() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for HandoffToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// -----------------------------------------------------------------------------
// ----- HandoffContext --------------------------------------------------------

/// The channels extracted from one thread's slots, in flight between the
/// preparing thread and the claiming thread.
#[derive(Default)]
pub(crate) struct HandoffContext {
    pub(crate) channel: Option<CachedChannel>,
    pub(crate) tx_channel: Option<CachedChannel>,
}

impl HandoffContext {
    pub(crate) fn is_empty(&self) -> bool {
        self.channel.is_none() && self.tx_channel.is_none()
    }
}

// -----------------------------------------------------------------------------
// ----- ThreadIdentity --------------------------------------------------------

/// Who issued a token. Kept only so unclaimed handoffs can be reported
/// with a useful name at reset time.
#[derive(Clone, Debug)]
pub(crate) struct ThreadIdentity {
    pub(crate) id: ThreadId,
    pub(crate) name: String,
}

impl ThreadIdentity {
    pub(crate) fn current() -> Self {
        let current = thread::current();
        Self {
            id: current.id(),
            name: current.name().unwrap_or("unnamed").to_string(),
        }
    }
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
