use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use tracing::debug;

use crate::errors::Error;
use crate::factory::connection::ConnectionInner;
use crate::gateway::ChannelHandle;

// -----------------------------------------------------------------------------
// ----- CachedChannel ---------------------------------------------------------

/// The logical channel handed to callers. Wraps one physical channel and
/// intercepts close: by default `close` only means "this borrower is done
/// with this use" and the physical channel stays cached for the owning
/// thread's next request.
#[derive(Clone)]
pub struct CachedChannel {
    core: Arc<ChannelCore>,
}

struct ChannelCore {
    raw: Arc<dyn ChannelHandle>,
    transactional: bool,
    confirm_selected: AtomicBool,
    physical_close_required: AtomicBool,
    owner: Weak<ConnectionInner>,
    close_timeout: Duration,
}

// -----------------------------------------------------------------------------
// ----- CachedChannel: Public -------------------------------------------------

impl CachedChannel {
    /// Logical close. If the calling thread's slot still holds this
    /// channel and no forced close is pending, this is a no-op; the
    /// channel stays open for reuse. A channel that is no longer slotted
    /// (detached mid-handoff, or owned by a torn-down connection) is
    /// closed physically. Close failures are logged and swallowed.
    pub fn close(&self) {
        match self.core.owner.upgrade() {
            Some(inner) => inner.handle_logical_close(self),
            None => self.physical_close(),
        }
    }

    /// Escape hatch: the wrapped physical channel.
    pub fn target_channel(&self) -> Arc<dyn ChannelHandle> {
        Arc::clone(&self.core.raw)
    }

    pub fn is_transactional(&self) -> bool {
        self.core.transactional
    }

    /// Enable confirm mode on the physical channel and remember it.
    pub fn confirm_select(&self) -> Result<(), Error> {
        self.core.confirm_selected.store(true, Ordering::SeqCst);
        self.core.raw.select_confirms()?;
        Ok(())
    }

    pub fn is_confirm_selected(&self) -> bool {
        self.core.confirm_selected.load(Ordering::SeqCst)
    }

    /// This proxy never auto-tracks durable publisher confirms; that is
    /// the publisher peer factory's role.
    pub fn is_publisher_confirms(&self) -> bool {
        false
    }

    pub fn is_open(&self) -> bool {
        self.core.raw.is_open()
    }
}

// -----------------------------------------------------------------------------
// ----- CachedChannel: Crate --------------------------------------------------

impl CachedChannel {
    pub(crate) fn new(
        raw: Arc<dyn ChannelHandle>,
        transactional: bool,
        owner: Weak<ConnectionInner>,
        close_timeout: Duration,
    ) -> Self {
        Self {
            core: Arc::new(ChannelCore {
                raw,
                transactional,
                confirm_selected: AtomicBool::new(false),
                physical_close_required: AtomicBool::new(false),
                owner,
                close_timeout,
            }),
        }
    }

    /// Set by the handoff coordinator when this channel is about to be
    /// superseded; the next close tears the resource down for real.
    pub(crate) fn mark_physical_close_required(&self) {
        self.core.physical_close_required.store(true, Ordering::SeqCst);
    }

    pub(crate) fn take_physical_close_required(&self) -> bool {
        self.core.physical_close_required.swap(false, Ordering::SeqCst)
    }

    /// Close the underlying channel, ignoring failures: the resource is
    /// being abandoned either way.
    pub(crate) fn physical_close(&self) {
        if self.core.raw.is_open() {
            if let Err(e) = self.core.raw.close(self.core.close_timeout) {
                debug!("error on physical channel close: {e}");
            }
        }
        self.core.physical_close_required.store(false, Ordering::SeqCst);
    }

    pub(crate) fn ptr_eq(&self, other: &CachedChannel) -> bool {
        Arc::ptr_eq(&self.core, &other.core)
    }
}

// -----------------------------------------------------------------------------
// ----- CachedChannel: Traits -------------------------------------------------

impl PartialEq for CachedChannel {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for CachedChannel {}

impl fmt::Debug for CachedChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedChannel")
            .field("transactional", &self.core.transactional)
            .field("confirm_selected", &self.is_confirm_selected())
            .field("open", &self.is_open())
            .finish()
    }
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
