//! Observable bus message for exercising the indexer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::messaging::bus::BusMessage;
use crate::messaging::message::VisibilityMessage;

/// Bus message whose ack/nack state can be probed after handoff.
pub struct TestBusMessage {
    payload: Vec<u8>,
    acked: Arc<AtomicBool>,
    nacked: Arc<AtomicBool>,
}

/// Probe half of a [`TestBusMessage`].
#[derive(Clone)]
pub struct TestMessageProbe {
    acked: Arc<AtomicBool>,
    nacked: Arc<AtomicBool>,
}

impl TestMessageProbe {
    pub fn is_acked(&self) -> bool {
        self.acked.load(Ordering::SeqCst)
    }

    pub fn is_nacked(&self) -> bool {
        self.nacked.load(Ordering::SeqCst)
    }
}

impl TestBusMessage {
    pub fn new(payload: Vec<u8>) -> (Box<Self>, TestMessageProbe) {
        let acked = Arc::new(AtomicBool::new(false));
        let nacked = Arc::new(AtomicBool::new(false));
        let probe = TestMessageProbe {
            acked: acked.clone(),
            nacked: nacked.clone(),
        };
        (
            Box::new(Self {
                payload,
                acked,
                nacked,
            }),
            probe,
        )
    }

    pub fn from_message(msg: &VisibilityMessage) -> (Box<Self>, TestMessageProbe) {
        let payload = msg.encode().expect("test message encodes");
        Self::new(payload)
    }
}

impl BusMessage for TestBusMessage {
    fn value(&self) -> &[u8] {
        &self.payload
    }

    fn ack(self: Box<Self>) {
        self.acked.store(true, Ordering::SeqCst);
    }

    fn nack(self: Box<Self>) {
        self.nacked.store(true, Ordering::SeqCst);
    }
}
