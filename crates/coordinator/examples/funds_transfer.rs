//! Example driving the coordinator through a happy path and an aborted
//! transfer across three mock resource managers.
//!
//! Run with: cargo run --example funds_transfer

use arbiter_common::Participant;
use arbiter_coordinator::{Coordinator, CoordinatorConfig, PrepareOutcome};
use arbiter_testkit::MockParticipant;
use std::sync::Arc;

#[tokio::main]
async fn main() {
    let coordinator = Coordinator::new(CoordinatorConfig::default());

    // A transfer touching two ledgers and an audit store
    let debit = Arc::new(MockParticipant::new("ledger-debit"));
    let credit = Arc::new(MockParticipant::new("ledger-credit"));
    let audit = Arc::new(MockParticipant::new("audit-store"));

    let txn = coordinator.begin();
    println!("started transaction {}", txn);

    for p in [&debit, &credit, &audit] {
        coordinator
            .enlist(txn, p.clone() as Arc<dyn Participant>)
            .unwrap();
    }

    match coordinator.prepare(txn).await.unwrap() {
        PrepareOutcome::Prepared => {
            coordinator.commit(txn).await.unwrap();
            println!(
                "transaction {} committed: {:?}",
                txn,
                coordinator.status(txn).unwrap()
            );
        }
        PrepareOutcome::RolledBack => {
            println!("transaction {} rolled back during prepare", txn);
        }
    }

    // A second transfer where one ledger refuses to prepare
    let debit2 = Arc::new(MockParticipant::new("ledger-debit"));
    let credit2 = Arc::new(MockParticipant::new("ledger-credit").with_vote(false));

    let txn2 = coordinator.begin();
    for p in [&debit2, &credit2] {
        coordinator
            .enlist(txn2, p.clone() as Arc<dyn Participant>)
            .unwrap();
    }

    let outcome = coordinator.prepare(txn2).await.unwrap();
    println!(
        "transaction {} outcome after a no vote: {:?} (state {:?})",
        txn2,
        outcome,
        coordinator.status(txn2).unwrap()
    );
    println!(
        "debit ledger compensated {} time(s)",
        debit2.rollback_calls()
    );
}
