//! Engine event relay.
//!
//! A [`Broadcaster`] opens the engine's event feed (or one container's log
//! stream), splits it into records and publishes each record on every topic
//! it belongs to. [`TopicBus`] is the in-process [`ops_core::Publisher`]
//! subscribers attach to.

mod broadcaster;
mod bus;
pub mod codec;
mod config;
mod error;
mod state;

pub use broadcaster::{Broadcaster, BroadcasterHandle};
pub use bus::TopicBus;
pub use codec::{EventLine, EventLineCodec};
pub use config::RelayConfig;
pub use error::RelayError;
pub use state::{RelaySource, RunState, RunStatus};
