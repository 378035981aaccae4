// crates/ledger/tests/single_flight.rs
//! Two concurrent `add_block` calls for the same height produce exactly
//! one committed block and exactly one save-complete event.

mod support;

use std::sync::Arc;
use stele_ledger::ConsensusType;
use support::{genesis_block, next_block, open_ledger, Committee};

#[test]
fn concurrent_add_block_saves_once() {
    let dir = tempfile::tempdir().unwrap();
    let committee = Committee::new(4, 10);
    let genesis = genesis_block(&committee, Vec::new());

    let (ledger, publisher) = open_ledger(dir.path(), ConsensusType::Dbft);
    ledger.init_with_genesis(&genesis, &committee.pubs).unwrap();
    // subscribe after genesis so only height-1 events arrive
    let events = publisher.subscribe();

    let b1 = next_block(
        &genesis.header,
        &committee,
        Vec::new(),
        Vec::new(),
        committee.quorum(),
    );
    let ledger = Arc::new(ledger);

    let handles: Vec<_> = (0..2)
        .map(|_| {
            let ledger = Arc::clone(&ledger);
            let block = b1.clone();
            std::thread::spawn(move || ledger.add_block(block))
        })
        .collect();
    for handle in handles {
        // a racer that lost the single-flight guard still returns Ok
        handle.join().unwrap().unwrap();
    }

    // exactly one racer held the guard and committed; a later duplicate
    // add is the usual silent no-op
    ledger.add_block(b1.clone()).unwrap();
    assert_eq!(ledger.get_current_block_height(), 1);
    assert_eq!(ledger.get_current_block_hash(), b1.hash());

    let mut saved = 0;
    while let Ok(msg) = events.try_recv() {
        assert_eq!(msg.block.header.height, 1);
        saved += 1;
    }
    assert_eq!(saved, 1);
}
