// crates/ledger/tests/genesis_bringup.rs

mod support;

use stele_ledger::{sort_public_keys, ConsensusType};
use support::{genesis_block, next_block, open_ledger, Committee};

#[test]
fn fresh_store_installs_genesis() {
    let dir = tempfile::tempdir().unwrap();
    let committee = Committee::new(4, 10);
    let genesis = genesis_block(&committee, Vec::new());

    let (ledger, publisher) = open_ledger(dir.path(), ConsensusType::Dbft);
    let events = publisher.subscribe();
    ledger
        .init_with_genesis(&genesis, &committee.pubs)
        .expect("genesis install");

    assert_eq!(ledger.get_current_block_height(), 0);
    assert_eq!(ledger.get_current_block_hash(), genesis.hash());
    assert_eq!(ledger.get_current_header_height(), 0);
    assert!(ledger.is_contain_block(&genesis.hash()).unwrap());
    assert_eq!(
        ledger.get_block_by_height(0).unwrap().unwrap().hash(),
        genesis.hash()
    );

    // default bookkeepers are seeded in canonical sorted order
    let state = ledger.get_bookkeeper_state().unwrap().unwrap();
    assert_eq!(state.curr_bookkeeper, sort_public_keys(committee.pubs.clone()));
    assert_eq!(state.next_bookkeeper, state.curr_bookkeeper);

    // genesis save publishes like any other block
    assert_eq!(events.try_recv().unwrap().block.header.height, 0);
}

#[test]
fn reinit_with_same_genesis_recovers_tip() {
    let dir = tempfile::tempdir().unwrap();
    let committee = Committee::new(4, 10);
    let genesis = genesis_block(&committee, Vec::new());

    {
        let (ledger, _publisher) = open_ledger(dir.path(), ConsensusType::Dbft);
        ledger.init_with_genesis(&genesis, &committee.pubs).unwrap();
        let b1 = next_block(
            &genesis.header,
            &committee,
            Vec::new(),
            Vec::new(),
            committee.quorum(),
        );
        ledger.add_block(b1).unwrap();
        ledger.close().unwrap();
    }

    let (ledger, _publisher) = open_ledger(dir.path(), ConsensusType::Dbft);
    ledger.init_with_genesis(&genesis, &committee.pubs).unwrap();
    assert_eq!(ledger.get_current_block_height(), 1);
    // re-init did not wipe or re-seed: genesis is still block 0
    assert_eq!(
        ledger.get_block_by_height(0).unwrap().unwrap().hash(),
        genesis.hash()
    );
}

#[test]
fn reinit_with_different_genesis_fails() {
    let dir = tempfile::tempdir().unwrap();
    let committee = Committee::new(4, 10);
    let genesis = genesis_block(&committee, Vec::new());

    {
        let (ledger, _publisher) = open_ledger(dir.path(), ConsensusType::Dbft);
        ledger.init_with_genesis(&genesis, &committee.pubs).unwrap();
        ledger.close().unwrap();
    }

    let other_committee = Committee::new(4, 50);
    let other = genesis_block(&other_committee, Vec::new());
    let (ledger, _publisher) = open_ledger(dir.path(), ConsensusType::Dbft);
    let err = ledger
        .init_with_genesis(&other, &other_committee.pubs)
        .unwrap_err();
    assert!(matches!(err, stele_ledger::LedgerError::GenesisMismatch));
}
