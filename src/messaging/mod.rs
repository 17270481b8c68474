//! Message bus contracts and the visibility wire schema.

pub mod bus;
pub mod message;

pub use bus::{
    BusMessage, BusStats, InMemoryBus, InMemoryConsumer, InMemoryProducer, VisibilityConsumer,
    VisibilityProducer,
};
pub use message::{VisibilityMessage, VisibilityMessageType, WorkflowCloseStatus};
