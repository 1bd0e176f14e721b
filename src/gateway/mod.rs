use std::sync::Arc;
use std::time::Duration;

use crate::errors::{CloseError, ConnectivityError};

// -----------------------------------------------------------------------------
// ----- ResourceGateway -------------------------------------------------------

/// The broker client, seen as an opaque resource factory. The real wire
/// protocol lives entirely behind this trait; the factory only ever asks
/// it to open a connection and never retries on its behalf.
pub trait ResourceGateway: Send + Sync {
    fn connect(&self) -> Result<Arc<dyn ConnectionHandle>, ConnectivityError>;
}

// -----------------------------------------------------------------------------
// ----- ConnectionHandle ------------------------------------------------------

/// One physical broker connection. Expensive to create; channel creation
/// on an open connection is cheap by comparison.
pub trait ConnectionHandle: Send + Sync {
    fn open_channel(
        &self,
        transactional: bool,
    ) -> Result<Arc<dyn ChannelHandle>, ConnectivityError>;

    fn is_open(&self) -> bool;

    fn close(&self) -> Result<(), CloseError>;
}

// -----------------------------------------------------------------------------
// ----- ChannelHandle ---------------------------------------------------------

/// One physical channel multiplexed over a connection. Mode changes
/// (transactions, publisher confirms) are one-way switches on the broker
/// side, so they are only ever invoked on a freshly opened channel.
pub trait ChannelHandle: Send + Sync {
    fn is_open(&self) -> bool;

    /// Close with the factory's configured timeout. Errors are the
    /// caller's to log; the channel is considered gone either way.
    fn close(&self, timeout: Duration) -> Result<(), CloseError>;

    fn select_tx(&self) -> Result<(), ConnectivityError>;

    fn select_confirms(&self) -> Result<(), ConnectivityError>;
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
