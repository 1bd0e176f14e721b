use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use mqcrab::{
    CachedChannel, ChannelHandle, CloseError, ConnectionHandle, ConnectivityError, FactoryConfig,
    ResourceGateway, ThreadChannelFactory,
};

// -----------------------------------------------------------------------------
// ----- Harness ---------------------------------------------------------------

#[allow(dead_code)]
pub fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt};
    let _ = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .try_init();
}

#[allow(dead_code)]
pub fn new_factory() -> (Arc<ThreadChannelFactory>, Arc<MockGateway>) {
    new_factory_with(FactoryConfig::default())
}

#[allow(dead_code)]
pub fn new_factory_with(config: FactoryConfig) -> (Arc<ThreadChannelFactory>, Arc<MockGateway>) {
    init_tracing();
    let gateway = Arc::new(MockGateway::default());
    let factory = Arc::new(ThreadChannelFactory::new(
        gateway.clone() as Arc<dyn ResourceGateway>,
        config,
    ));
    (factory, gateway)
}

/// True when the cached channel wraps exactly this mock channel.
#[allow(dead_code)]
pub fn wraps(cached: &CachedChannel, mock: &Arc<MockChannel>) -> bool {
    Arc::ptr_eq(
        &cached.target_channel(),
        &(Arc::clone(mock) as Arc<dyn ChannelHandle>),
    )
}

// -----------------------------------------------------------------------------
// ----- Knobs -----------------------------------------------------------------

/// Failure injection shared by a gateway and everything it creates.
#[derive(Default)]
pub struct Knobs {
    pub fail_connect: AtomicBool,
    pub fail_open_channel: AtomicBool,
    pub fail_select: AtomicBool,
}

// -----------------------------------------------------------------------------
// ----- MockGateway -----------------------------------------------------------

#[derive(Default)]
pub struct MockGateway {
    knobs: Arc<Knobs>,
    connections: Mutex<Vec<Arc<MockConnection>>>,
}

#[allow(dead_code)]
impl MockGateway {
    pub fn knobs(&self) -> &Knobs {
        &self.knobs
    }

    pub fn connection_count(&self) -> usize {
        self.connections.lock().len()
    }

    pub fn connection(&self, index: usize) -> Arc<MockConnection> {
        self.connections.lock()[index].clone()
    }

    pub fn last_connection(&self) -> Arc<MockConnection> {
        self.connections.lock().last().cloned().expect("no connections made")
    }
}

impl ResourceGateway for MockGateway {
    fn connect(&self) -> Result<Arc<dyn ConnectionHandle>, ConnectivityError> {
        if self.knobs.fail_connect.load(Ordering::SeqCst) {
            return Err(ConnectivityError::new("mock broker refused the connection"));
        }
        let connection = Arc::new(MockConnection {
            open: AtomicBool::new(true),
            knobs: self.knobs.clone(),
            channels: Mutex::new(Vec::new()),
            next_id: AtomicUsize::new(0),
        });
        self.connections.lock().push(connection.clone());
        Ok(connection)
    }
}

// -----------------------------------------------------------------------------
// ----- MockConnection --------------------------------------------------------

pub struct MockConnection {
    open: AtomicBool,
    knobs: Arc<Knobs>,
    channels: Mutex<Vec<Arc<MockChannel>>>,
    next_id: AtomicUsize,
}

#[allow(dead_code)]
impl MockConnection {
    pub fn channel_count(&self) -> usize {
        self.channels.lock().len()
    }

    pub fn channel(&self, index: usize) -> Arc<MockChannel> {
        self.channels.lock()[index].clone()
    }

    pub fn open_channel_count(&self) -> usize {
        self.channels.lock().iter().filter(|c| c.is_open()).count()
    }
}

impl ConnectionHandle for MockConnection {
    fn open_channel(
        &self,
        _transactional: bool,
    ) -> Result<Arc<dyn ChannelHandle>, ConnectivityError> {
        if self.knobs.fail_open_channel.load(Ordering::SeqCst) {
            return Err(ConnectivityError::new("mock broker refused the channel"));
        }
        let channel = Arc::new(MockChannel {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            open: AtomicBool::new(true),
            close_count: AtomicUsize::new(0),
            tx_selected: AtomicBool::new(false),
            confirms_selected: AtomicBool::new(false),
            knobs: self.knobs.clone(),
        });
        self.channels.lock().push(channel.clone());
        Ok(channel)
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn close(&self) -> Result<(), CloseError> {
        self.open.store(false, Ordering::SeqCst);
        Ok(())
    }
}

// -----------------------------------------------------------------------------
// ----- MockChannel -----------------------------------------------------------

pub struct MockChannel {
    pub id: usize,
    open: AtomicBool,
    close_count: AtomicUsize,
    tx_selected: AtomicBool,
    confirms_selected: AtomicBool,
    knobs: Arc<Knobs>,
}

#[allow(dead_code)]
impl MockChannel {
    pub fn close_count(&self) -> usize {
        self.close_count.load(Ordering::SeqCst)
    }

    pub fn tx_selected(&self) -> bool {
        self.tx_selected.load(Ordering::SeqCst)
    }

    pub fn confirms_selected(&self) -> bool {
        self.confirms_selected.load(Ordering::SeqCst)
    }

    /// Kill the channel out of band, as a broker would on an error frame.
    pub fn kill(&self) {
        self.open.store(false, Ordering::SeqCst);
    }
}

impl ChannelHandle for MockChannel {
    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn close(&self, _timeout: Duration) -> Result<(), CloseError> {
        self.open.store(false, Ordering::SeqCst);
        self.close_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn select_tx(&self) -> Result<(), ConnectivityError> {
        if self.knobs.fail_select.load(Ordering::SeqCst) {
            return Err(ConnectivityError::new("mock broker refused tx.select"));
        }
        self.tx_selected.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn select_confirms(&self) -> Result<(), ConnectivityError> {
        if self.knobs.fail_select.load(Ordering::SeqCst) {
            return Err(ConnectivityError::new("mock broker refused confirm.select"));
        }
        self.confirms_selected.store(true, Ordering::SeqCst);
        Ok(())
    }
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
