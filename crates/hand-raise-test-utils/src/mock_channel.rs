//! In-memory data channel.
//!
//! A [`BroadcastHub`] stands in for one media room. Each participant connects
//! with the inbound sender of its coordinator and gets a [`HubChannel`];
//! sends are delivered to every other member, never echoed to the sender.
//!
//! The hub can drop every packet (to simulate lossy delivery) or deliver each
//! packet twice (to check that duplicates are harmless).

use async_trait::async_trait;
use hand_raise::{DataChannel, HandRaiseError, InboundPacket, Reliability};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

#[derive(Debug, Default)]
struct HubInner {
    members: Vec<(String, mpsc::Sender<InboundPacket>)>,
    sent: Vec<(String, Vec<u8>)>,
    drop_all: bool,
    duplicate: bool,
}

/// Shared room; clone freely.
#[derive(Debug, Clone, Default)]
pub struct BroadcastHub {
    inner: Arc<Mutex<HubInner>>,
}

impl BroadcastHub {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Join the room as `identity`, delivering inbound packets to `inbound`.
    pub fn connect(
        &self,
        identity: impl Into<String>,
        inbound: mpsc::Sender<InboundPacket>,
    ) -> HubChannel {
        let identity = identity.into();
        self.inner
            .lock()
            .unwrap()
            .members
            .push((identity.clone(), inbound));
        HubChannel {
            hub: self.clone(),
            identity,
        }
    }

    /// Drop every packet while set. Sends still succeed.
    pub fn set_drop_all(&self, drop_all: bool) {
        self.inner.lock().unwrap().drop_all = drop_all;
    }

    /// Deliver each packet twice while set.
    pub fn set_duplicate(&self, duplicate: bool) {
        self.inner.lock().unwrap().duplicate = duplicate;
    }

    /// Every payload sent so far, with the sender identity.
    pub fn sent(&self) -> Vec<(String, Vec<u8>)> {
        self.inner.lock().unwrap().sent.clone()
    }

    /// Inject a raw payload as if `sender` had published it.
    pub fn inject(&self, sender: &str, payload: &[u8]) {
        self.deliver(sender, payload.to_vec());
    }

    fn deliver(&self, sender: &str, payload: Vec<u8>) {
        let (targets, copies) = {
            let mut inner = self.inner.lock().unwrap();
            inner.sent.push((sender.to_string(), payload.clone()));
            if inner.drop_all {
                return;
            }
            let targets: Vec<_> = inner
                .members
                .iter()
                .filter(|(identity, _)| identity != sender)
                .map(|(_, tx)| tx.clone())
                .collect();
            (targets, if inner.duplicate { 2 } else { 1 })
        };

        for tx in targets {
            for _ in 0..copies {
                let packet = InboundPacket::new(payload.clone()).with_sender(sender);
                // A closed receiver means that participant has left
                let _ = tx.try_send(packet);
            }
        }
    }
}

/// One participant's view of the hub.
#[derive(Debug, Clone)]
pub struct HubChannel {
    hub: BroadcastHub,
    identity: String,
}

#[async_trait]
impl DataChannel for HubChannel {
    async fn send(&self, payload: Vec<u8>, _reliability: Reliability) -> Result<(), HandRaiseError> {
        self.hub.deliver(&self.identity, payload);
        Ok(())
    }
}
