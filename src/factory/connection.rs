use dashmap::DashMap;
use std::sync::Arc;
use std::thread::{self, ThreadId};
use std::time::Duration;

use tracing::debug;

use crate::errors::Error;
use crate::factory::channel::CachedChannel;
use crate::factory::handoff::HandoffContext;
use crate::gateway::ConnectionHandle;
use crate::listener::ListenerRegistry;

// -----------------------------------------------------------------------------
// ----- ConnectionWrapper -----------------------------------------------------

/// The single live physical connection of one factory instance, together
/// with the per-thread channel cache layered on top of it.
#[derive(Clone)]
pub struct ConnectionWrapper {
    inner: Arc<ConnectionInner>,
}

pub(crate) struct ConnectionInner {
    raw: Arc<dyn ConnectionHandle>,
    close_timeout: Duration,
    /// One entry per thread that has requested a channel. Entries are
    /// only ever touched by their owning thread: handoff extraction and
    /// installation both run on the calling thread as well, so the
    /// per-key locking of the map is all the synchronization needed.
    slots: DashMap<ThreadId, ThreadSlots>,
    listeners: Arc<ListenerRegistry>,
}

#[derive(Default)]
struct ThreadSlots {
    channel: Option<CachedChannel>,
    tx_channel: Option<CachedChannel>,
}

impl ThreadSlots {
    fn get(&self, transactional: bool) -> Option<&CachedChannel> {
        if transactional {
            self.tx_channel.as_ref()
        } else {
            self.channel.as_ref()
        }
    }

    fn slot_mut(&mut self, transactional: bool) -> &mut Option<CachedChannel> {
        if transactional {
            &mut self.tx_channel
        } else {
            &mut self.channel
        }
    }
}

// -----------------------------------------------------------------------------
// ----- ConnectionWrapper: Public ---------------------------------------------

impl ConnectionWrapper {
    pub fn is_open(&self) -> bool {
        self.inner.raw.is_open()
    }

    /// The raw connection, for callers that need broker-specific access.
    pub fn target_connection(&self) -> Arc<dyn ConnectionHandle> {
        Arc::clone(&self.inner.raw)
    }
}

// -----------------------------------------------------------------------------
// ----- ConnectionWrapper: Crate ----------------------------------------------

impl ConnectionWrapper {
    pub(crate) fn new(
        raw: Arc<dyn ConnectionHandle>,
        close_timeout: Duration,
        listeners: Arc<ListenerRegistry>,
    ) -> Self {
        Self {
            inner: Arc::new(ConnectionInner {
                raw,
                close_timeout,
                slots: DashMap::new(),
                listeners,
            }),
        }
    }

    /// Return the calling thread's cached channel for the mode, creating
    /// a fresh one when the slot is empty or holds a closed channel.
    pub(crate) fn channel(
        &self,
        transactional: bool,
        simple_confirms: bool,
    ) -> Result<CachedChannel, Error> {
        let tid = thread::current().id();
        if let Some(slots) = self.inner.slots.get(&tid) {
            if let Some(cached) = slots.get(transactional) {
                if cached.is_open() {
                    return Ok(cached.clone());
                }
            }
        }

        let raw = self.inner.raw.open_channel(transactional)?;
        let cached = CachedChannel::new(
            raw,
            transactional,
            Arc::downgrade(&self.inner),
            self.inner.close_timeout,
        );

        // Mode selection happens before the slot is populated: a channel
        // that failed to enter its mode is never cached.
        if transactional {
            cached.target_channel().select_tx()?;
        } else if simple_confirms {
            cached.confirm_select()?;
        }

        *self
            .inner
            .slots
            .entry(tid)
            .or_default()
            .slot_mut(transactional) = Some(cached.clone());
        self.inner
            .listeners
            .notify_channel_created(&cached, transactional);
        Ok(cached)
    }

    /// Physically close the calling thread's cached channels, if any.
    pub(crate) fn close_thread_channel(&self) {
        let tid = thread::current().id();
        if let Some((_, slots)) = self.inner.slots.remove(&tid) {
            if let Some(cached) = slots.channel {
                cached.physical_close();
            }
            if let Some(cached) = slots.tx_channel {
                cached.physical_close();
            }
        }
    }

    /// Detach the calling thread's channels for a handoff. The slots are
    /// left empty; the thread's next channel request creates fresh ones.
    pub(crate) fn take_thread_context(&self) -> HandoffContext {
        let tid = thread::current().id();
        match self.inner.slots.remove(&tid) {
            Some((_, slots)) => HandoffContext {
                channel: slots.channel,
                tx_channel: slots.tx_channel,
            },
            None => HandoffContext::default(),
        }
    }

    /// Install handed-off channels into the calling thread's slots. A
    /// different channel already cached for a mode is physically closed
    /// before the incoming one takes its place.
    pub(crate) fn install_thread_context(&self, context: HandoffContext) {
        let HandoffContext {
            channel,
            tx_channel,
        } = context;
        if let Some(incoming) = channel {
            self.install(incoming, false);
        }
        if let Some(incoming) = tx_channel {
            self.install(incoming, true);
        }
    }

    /// Close everything: every cached channel, then the physical
    /// connection itself. Close failures are logged and swallowed.
    pub(crate) fn force_close(&self) {
        let threads: Vec<ThreadId> = self.inner.slots.iter().map(|e| *e.key()).collect();
        for tid in threads {
            if let Some((_, slots)) = self.inner.slots.remove(&tid) {
                if let Some(cached) = slots.channel {
                    cached.physical_close();
                }
                if let Some(cached) = slots.tx_channel {
                    cached.physical_close();
                }
            }
        }
        if self.inner.raw.is_open() {
            if let Err(e) = self.inner.raw.close() {
                debug!("error on physical connection close: {e}");
            }
        }
        self.inner.listeners.notify_connection_closed(self);
    }
}

// -----------------------------------------------------------------------------
// ----- ConnectionWrapper: Private --------------------------------------------

impl ConnectionWrapper {
    fn install(&self, incoming: CachedChannel, transactional: bool) {
        let tid = thread::current().id();
        let mut entry = self.inner.slots.entry(tid).or_default();
        let slot = entry.slot_mut(transactional);
        if let Some(previous) = slot.take() {
            if !previous.ptr_eq(&incoming) {
                // The forced close must finish before the incoming
                // channel becomes "the" channel for this mode.
                previous.mark_physical_close_required();
                previous.physical_close();
            }
        }
        *slot = Some(incoming);
    }
}

// -----------------------------------------------------------------------------
// ----- ConnectionInner -------------------------------------------------------

impl ConnectionInner {
    /// Close-interception for `CachedChannel::close`, run on the calling
    /// thread. A channel still slotted for this thread stays open unless
    /// a forced close is pending; anything else closes physically.
    pub(crate) fn handle_logical_close(&self, channel: &CachedChannel) {
        let tid = thread::current().id();
        let Some(mut entry) = self.slots.get_mut(&tid) else {
            channel.physical_close();
            return;
        };

        let slot = entry.slot_mut(channel.is_transactional());
        let still_slotted = matches!(slot, Some(cached) if cached.ptr_eq(channel));
        if still_slotted {
            if channel.take_physical_close_required() {
                *slot = None;
                drop(entry);
                channel.physical_close();
            }
            // Otherwise a logical no-op: the channel stays cached and open.
        } else {
            drop(entry);
            channel.physical_close();
        }
    }
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
