use parking_lot::RwLock;
use std::sync::Arc;

use crate::factory::channel::CachedChannel;
use crate::factory::connection::ConnectionWrapper;

// -----------------------------------------------------------------------------
// ----- Listener traits -------------------------------------------------------

/// Notified when the factory opens or force-closes its physical connection.
pub trait ConnectionListener: Send + Sync {
    fn on_create(&self, connection: &ConnectionWrapper);

    fn on_close(&self, _connection: &ConnectionWrapper) {}
}

/// Notified when a fresh channel is created for a thread. Logical reuse of
/// a cached channel does not re-notify.
pub trait ChannelListener: Send + Sync {
    fn on_create(&self, channel: &CachedChannel, transactional: bool);
}

// -----------------------------------------------------------------------------
// ----- ListenerRegistry ------------------------------------------------------

/// Shared between the factory and its current connection wrapper, so
/// channel creation deep in the wrapper can notify without a back-pointer
/// to the factory.
#[derive(Default)]
pub(crate) struct ListenerRegistry {
    connection: RwLock<Vec<Arc<dyn ConnectionListener>>>,
    channel: RwLock<Vec<Arc<dyn ChannelListener>>>,
}

impl ListenerRegistry {
    pub(crate) fn add_connection_listener(&self, listener: Arc<dyn ConnectionListener>) {
        self.connection.write().push(listener);
    }

    pub(crate) fn add_channel_listener(&self, listener: Arc<dyn ChannelListener>) {
        self.channel.write().push(listener);
    }

    pub(crate) fn notify_connection_created(&self, connection: &ConnectionWrapper) {
        for listener in self.connection.read().iter() {
            listener.on_create(connection);
        }
    }

    pub(crate) fn notify_connection_closed(&self, connection: &ConnectionWrapper) {
        for listener in self.connection.read().iter() {
            listener.on_close(connection);
        }
    }

    pub(crate) fn notify_channel_created(&self, channel: &CachedChannel, transactional: bool) {
        for listener in self.channel.read().iter() {
            listener.on_create(channel, transactional);
        }
    }
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
