//! Event stream contract and transports for the amber-relay platform.
//!
//! Events enter the system through the event API, are wrapped in a
//! [`Message`] envelope, and are fanned out to every runner over one of the
//! transports here: in-memory broadcast channels for development, or NATS
//! core pub/sub in production.

pub mod memory;
pub mod message;
pub mod nats;
pub mod pubsub;

pub use memory::MemoryPubSub;
pub use message::Message;
pub use nats::{NatsConfig, NatsPubSub};
pub use pubsub::{MessageHandler, PubSubError, PublishSubscriber, Publisher, Subscriber};
