// crates/ledger/src/events.rs
//! Save-complete notifications for upstream actors (consensus, tx pool).
//!
//! The publisher is handed to [`Ledger::open`](crate::ledger_store::Ledger::open)
//! explicitly; there is no process-wide singleton, so tests can subscribe a
//! captured receiver.

use crate::block::Block;
use parking_lot::Mutex;
use std::sync::mpsc;
use std::sync::Arc;

pub const TOPIC_SAVE_BLOCK_COMPLETE: &str = "ledger.save_block_complete";

#[derive(Clone, Debug)]
pub struct SaveBlockCompleteMsg {
    pub block: Arc<Block>,
}

/// Fan-out publisher for ledger events. Disconnected subscribers are
/// dropped on the next publish.
#[derive(Default)]
pub struct LedgerEventPublisher {
    subscribers: Mutex<Vec<mpsc::Sender<SaveBlockCompleteMsg>>>,
}

impl LedgerEventPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> mpsc::Receiver<SaveBlockCompleteMsg> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.lock().push(tx);
        rx
    }

    pub fn publish(&self, msg: SaveBlockCompleteMsg) {
        self.subscribers
            .lock()
            .retain(|sub| sub.send(msg.clone()).is_ok());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::Address;
    use crate::block::Header;
    use crate::hash::Hash256;

    fn msg() -> SaveBlockCompleteMsg {
        SaveBlockCompleteMsg {
            block: Arc::new(Block {
                header: Header {
                    version: 0,
                    prev_block_hash: Hash256::ZERO,
                    transactions_root: Hash256::ZERO,
                    timestamp: 1,
                    height: 0,
                    consensus_payload: Vec::new(),
                    next_bookkeeper: Address::ZERO,
                    bookkeepers: Vec::new(),
                    sig_data: Vec::new(),
                },
                transactions: Vec::new(),
            }),
        }
    }

    #[test]
    fn publish_reaches_all_subscribers() {
        let publisher = LedgerEventPublisher::new();
        let rx1 = publisher.subscribe();
        let rx2 = publisher.subscribe();
        publisher.publish(msg());
        assert_eq!(rx1.try_recv().unwrap().block.header.height, 0);
        assert_eq!(rx2.try_recv().unwrap().block.header.height, 0);
    }

    #[test]
    fn dropped_subscriber_is_pruned() {
        let publisher = LedgerEventPublisher::new();
        let rx = publisher.subscribe();
        drop(rx);
        publisher.publish(msg());
        assert!(publisher.subscribers.lock().is_empty());
    }
}
