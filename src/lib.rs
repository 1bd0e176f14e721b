pub mod config;
pub mod errors;
pub mod factory;
pub mod gateway;
pub mod listener;

pub use config::FactoryConfig;
pub use errors::{CloseError, ConnectivityError, Error};
pub use factory::ThreadChannelFactory;
pub use factory::channel::CachedChannel;
pub use factory::connection::ConnectionWrapper;
pub use factory::handoff::HandoffToken;
pub use gateway::{ChannelHandle, ConnectionHandle, ResourceGateway};
pub use listener::{ChannelListener, ConnectionListener};
