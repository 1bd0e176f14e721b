use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use tracing::{debug, info, warn};

use crate::config::FactoryConfig;
use crate::errors::Error;
use crate::gateway::ResourceGateway;
use crate::listener::{ChannelListener, ConnectionListener, ListenerRegistry};

pub mod channel;
pub mod connection;
pub mod handoff;

use channel::CachedChannel;
use connection::ConnectionWrapper;
use handoff::{HandoffContext, HandoffToken, ThreadIdentity};

// -----------------------------------------------------------------------------
// ----- ThreadChannelFactory --------------------------------------------------

/// A connection factory that keeps one physical broker connection and
/// caches one channel per thread per mode on top of it. Callers release a
/// thread's channel with [`close_thread_channel`], or move channels to
/// another thread with [`prepare_switch_context`] / [`switch_context`].
///
/// Unless configured otherwise, the factory carries an implicit publisher
/// peer over the same gateway; lifecycle and handoff operations are
/// mirrored onto it so both roles move in lockstep.
///
/// [`close_thread_channel`]: ThreadChannelFactory::close_thread_channel
/// [`prepare_switch_context`]: ThreadChannelFactory::prepare_switch_context
/// [`switch_context`]: ThreadChannelFactory::switch_context
pub struct ThreadChannelFactory {
    gateway: Arc<dyn ResourceGateway>,
    config: FactoryConfig,
    connection: RwLock<Option<ConnectionWrapper>>,
    running: AtomicBool,
    simple_publisher_confirms: AtomicBool,
    publisher: Option<Arc<ThreadChannelFactory>>,
    listeners: Arc<ListenerRegistry>,
    context_switches: DashMap<HandoffToken, HandoffContext>,
    switches_in_progress: DashMap<HandoffToken, ThreadIdentity>,
}

// -----------------------------------------------------------------------------
// ----- ThreadChannelFactory: Static ------------------------------------------

impl ThreadChannelFactory {
    pub fn new(gateway: Arc<dyn ResourceGateway>, config: FactoryConfig) -> Self {
        let publisher = config.publisher_factory.then(|| {
            let peer_config = FactoryConfig {
                publisher_factory: false,
                ..config.clone()
            };
            Arc::new(Self::with_role(Arc::clone(&gateway), peer_config))
        });

        let mut factory = Self::with_role(gateway, config);
        factory.publisher = publisher;
        factory
    }

    fn with_role(gateway: Arc<dyn ResourceGateway>, config: FactoryConfig) -> Self {
        let simple_publisher_confirms = config.simple_publisher_confirms;
        Self {
            gateway,
            config,
            connection: RwLock::new(None),
            running: AtomicBool::new(true),
            simple_publisher_confirms: AtomicBool::new(simple_publisher_confirms),
            publisher: None,
            listeners: Arc::new(ListenerRegistry::default()),
            context_switches: DashMap::new(),
            switches_in_progress: DashMap::new(),
        }
    }
}

// -----------------------------------------------------------------------------
// ----- ThreadChannelFactory: Connections -------------------------------------

impl ThreadChannelFactory {
    /// Return the live connection wrapper, creating the physical
    /// connection lazily. Concurrent callers race on the fast path; the
    /// write lock makes sure only one of them actually dials the broker.
    pub fn create_connection(&self) -> Result<ConnectionWrapper, Error> {
        if !self.running.load(Ordering::SeqCst) {
            return Err(Error::Stopped);
        }

        if let Some(wrapper) = self.connection.read().as_ref() {
            if wrapper.is_open() {
                return Ok(wrapper.clone());
            }
        }

        let wrapper;
        {
            let mut guard = self.connection.write();
            if let Some(existing) = guard.as_ref() {
                if existing.is_open() {
                    return Ok(existing.clone());
                }
            }
            let raw = self.gateway.connect()?;
            wrapper = ConnectionWrapper::new(
                raw,
                self.config.close_timeout,
                Arc::clone(&self.listeners),
            );
            *guard = Some(wrapper.clone());
        }
        info!("opened physical broker connection");
        self.listeners.notify_connection_created(&wrapper);
        Ok(wrapper)
    }

    /// The calling thread's channel for the given mode, created on first
    /// use. Repeated calls from one thread return the same channel while
    /// it stays open.
    pub fn channel(&self, transactional: bool) -> Result<CachedChannel, Error> {
        let simple_confirms = self.simple_publisher_confirms.load(Ordering::SeqCst);
        self.create_connection()?.channel(transactional, simple_confirms)
    }

    /// Physically close the calling thread's cached channels, if any.
    pub fn close_thread_channel(&self) {
        if let Some(wrapper) = self.connection.read().as_ref() {
            wrapper.close_thread_channel();
        }
    }

    /// Force-close the connection(s) of this factory and its publisher
    /// peer. New connections are created on demand afterwards; unclaimed
    /// handoff tokens are discarded with a leak warning.
    pub fn reset_connection(&self) {
        if let Some(publisher) = &self.publisher {
            publisher.reset_connection();
        }

        let taken = self.connection.write().take();
        if let Some(wrapper) = taken {
            wrapper.force_close();
        }

        if !self.switches_in_progress.is_empty() {
            let threads: Vec<String> = self
                .switches_in_progress
                .iter()
                .map(|entry| entry.value().name.clone())
                .collect();
            warn!(?threads, "unclaimed context switches at reset");
        }
        self.context_switches.clear();
        self.switches_in_progress.clear();
    }
}

// -----------------------------------------------------------------------------
// ----- ThreadChannelFactory: Handoff -----------------------------------------

impl ThreadChannelFactory {
    /// Detach the calling thread's cached channels so another thread can
    /// claim them. Returns `None` when this thread has no channels on
    /// either the primary or the publisher peer.
    pub fn prepare_switch_context(&self) -> Result<Option<HandoffToken>, Error> {
        self.prepare_with_token(HandoffToken::fresh())
    }

    /// Claim channels detached by another thread. `None` is a deliberate
    /// no-op; an unknown or already-claimed token is a usage fault.
    pub fn switch_context(&self, token: Option<HandoffToken>) -> Result<(), Error> {
        match token {
            Some(token) => {
                if self.claim(token)? {
                    Ok(())
                } else {
                    Err(Error::InvalidToken(token))
                }
            }
            None => {
                debug!("attempted to switch an empty context; no channels to acquire");
                Ok(())
            }
        }
    }

    fn prepare_with_token(&self, token: HandoffToken) -> Result<Option<HandoffToken>, Error> {
        let mut prepared = None;
        if let Some(publisher) = &self.publisher {
            prepared = publisher.prepare_with_token(token)?;
        }

        let context = self.create_connection()?.take_thread_context();
        if context.is_empty() {
            debug!("no channels are bound to this thread");
            return Ok(prepared);
        }

        let current = thread::current().id();
        if self
            .switches_in_progress
            .iter()
            .any(|entry| entry.value().id == current)
        {
            warn!("a previous context switch from this thread has not been claimed yet; possible leak");
        }
        self.context_switches.insert(token, context);
        self.switches_in_progress.insert(token, ThreadIdentity::current());
        Ok(Some(token))
    }

    fn claim(&self, token: HandoffToken) -> Result<bool, Error> {
        let mut switched = false;
        if let Some(publisher) = &self.publisher {
            switched = publisher.claim(token)?;
        }

        let context = self.context_switches.remove(&token);
        self.switches_in_progress.remove(&token);
        if let Some((_, context)) = context {
            self.create_connection()?.install_thread_context(context);
            switched = true;
        }
        Ok(switched)
    }
}

// -----------------------------------------------------------------------------
// ----- ThreadChannelFactory: Lifecycle ---------------------------------------

impl ThreadChannelFactory {
    /// Factories start running; this only matters after a `stop`.
    pub fn start(&self) {
        if let Some(publisher) = &self.publisher {
            publisher.start();
        }
        self.running.store(true, Ordering::SeqCst);
    }

    /// Stop handing out connections and perform a full reset.
    pub fn stop(&self) {
        if let Some(publisher) = &self.publisher {
            publisher.running.store(false, Ordering::SeqCst);
        }
        self.running.store(false, Ordering::SeqCst);
        self.reset_connection();
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Equivalent to `stop`; named for callers tearing the factory down
    /// for good.
    pub fn shutdown(&self) {
        self.stop();
    }
}

// -----------------------------------------------------------------------------
// ----- ThreadChannelFactory: Configuration -----------------------------------

impl ThreadChannelFactory {
    /// The implicit publisher peer, when configured.
    pub fn publisher(&self) -> Option<&Arc<ThreadChannelFactory>> {
        self.publisher.as_ref()
    }

    pub fn is_simple_publisher_confirms(&self) -> bool {
        self.simple_publisher_confirms.load(Ordering::SeqCst)
    }

    /// Enable confirm mode on every fresh non-transactional channel.
    /// Mirrored onto the publisher peer.
    pub fn set_simple_publisher_confirms(&self, enabled: bool) {
        if let Some(publisher) = &self.publisher {
            publisher.set_simple_publisher_confirms(enabled);
        }
        self.simple_publisher_confirms.store(enabled, Ordering::SeqCst);
    }

    /// Register a connection listener on this factory and its publisher
    /// peer. A listener added while a connection is already open is
    /// notified of that connection immediately.
    pub fn add_connection_listener(&self, listener: Arc<dyn ConnectionListener>) {
        if let Some(publisher) = &self.publisher {
            publisher.add_connection_listener(Arc::clone(&listener));
        }
        let open = self
            .connection
            .read()
            .as_ref()
            .filter(|wrapper| wrapper.is_open())
            .cloned();
        self.listeners.add_connection_listener(listener.clone());
        if let Some(wrapper) = open {
            listener.on_create(&wrapper);
        }
    }

    pub fn add_channel_listener(&self, listener: Arc<dyn ChannelListener>) {
        if let Some(publisher) = &self.publisher {
            publisher.add_channel_listener(Arc::clone(&listener));
        }
        self.listeners.add_channel_listener(listener);
    }
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
