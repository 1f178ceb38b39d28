//! Withdrawal lifecycle against a scripted node and signing service

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{
    deposit_log, harness, harness_with, harness_with_store, identity, init, raw_hash, settings,
    FailingStore, FakeChain, FlakySigner, Harness, SendScript, DESTINATION,
};
use eth_minter::types::{RetrieveEthStatus, WithdrawalStatus, WEI_PER_ETH};
use eth_minter::{
    EventStore, LocalKeySigner, MemoryEventStore, MinterError, MinterInit, MinterSettings,
    MinterState, RpcOutcome, ValidationError,
};

/// Alice holds 1 ETH after the first scan
async fn funded(chain: Arc<FakeChain>) -> Harness {
    funded_with(chain, Arc::new(LocalKeySigner::generate("minter"))).await
}

async fn funded_with(
    chain: Arc<FakeChain>,
    signer: Arc<dyn eth_minter::ThresholdSigner>,
) -> Harness {
    chain.add_log(deposit_log(1, 0, 150, "alice", WEI_PER_ETH));
    let h = harness(chain, signer).await;
    h.minter.tick().await;
    assert_eq!(h.minter.balance_of(&identity("alice")).await, WEI_PER_ETH);
    h
}

/// Alice holds 1 ETH under custom installation parameters and settings
async fn funded_with_settings(
    chain: Arc<FakeChain>,
    init: MinterInit,
    settings: MinterSettings,
) -> Harness {
    chain.add_log(deposit_log(1, 0, 150, "alice", WEI_PER_ETH));
    let store = MemoryEventStore::new();
    let event_store: Arc<dyn EventStore> = Arc::new(store.clone());
    let h = harness_with(
        chain,
        Arc::new(LocalKeySigner::generate("minter")),
        store,
        event_store,
        init,
        settings,
    )
    .await;
    h.minter.tick().await;
    h
}

fn test_transfer_settings() -> MinterSettings {
    MinterSettings {
        test_transfer_enabled: true,
        ..settings()
    }
}

async fn status_of(h: &Harness, sequence_number: u64) -> Option<WithdrawalStatus> {
    h.state
        .read(|s| s.withdrawal(sequence_number).map(|r| r.status))
        .await
}

#[tokio::test]
async fn test_withdrawal_is_signed_sent_and_finalized() {
    let chain = FakeChain::new(200);
    let h = funded(chain.clone()).await;

    let receipt = h
        .minter
        .withdraw(identity("alice"), WEI_PER_ETH / 2, DESTINATION)
        .await
        .unwrap();
    assert_eq!(receipt.sequence_number, 0);
    assert_eq!(h.minter.balance_of(&identity("alice")).await, WEI_PER_ETH / 2);
    assert_eq!(
        h.minter.retrieve_eth_status(0).await,
        RetrieveEthStatus::PendingSigning
    );

    let drive = h.minter.tick().await.drive.expect("driver ran");
    assert_eq!((drive.signed, drive.sent, drive.finalized), (1, 1, 0));

    let hash = match h.minter.retrieve_eth_status(0).await {
        RetrieveEthStatus::Found { transaction_hash } => transaction_hash,
        other => panic!("expected found, got {:?}", other),
    };
    let submitted = chain.submitted();
    assert_eq!(submitted.len(), 1);
    assert_eq!(raw_hash(&submitted[0]), hash.to_string());
    assert_eq!(status_of(&h, 0).await, Some(WithdrawalStatus::Sent));

    // Receipt mined at the tip becomes final
    chain.set_finalized(200);
    assert_eq!(
        h.minter.retrieve_eth_status(0).await,
        RetrieveEthStatus::Found {
            transaction_hash: hash
        }
    );
    assert_eq!(status_of(&h, 0).await, Some(WithdrawalStatus::Finalized));

    let lookup = h.minter.test_get_transaction_by_hash(&hash).await.unwrap();
    assert_eq!(lookup.map(|tx| tx.block_number), Some(Some(200)));

    assert!(h.minter.dump_state_for_debugging().await.conservation.holds);
}

#[tokio::test]
async fn test_signing_failures_are_retried_without_resigning() {
    let chain = FakeChain::new(200);
    let signer = FlakySigner::new(3);
    let h = funded_with(chain.clone(), signer.clone()).await;

    h.minter
        .withdraw(identity("alice"), WEI_PER_ETH / 2, DESTINATION)
        .await
        .unwrap();

    for attempt in 1..=3 {
        let drive = h.minter.tick().await.drive.expect("driver ran");
        assert_eq!(drive.stalled.map(|(n, _)| n), Some(0));
        assert_eq!(signer.sign_calls(), attempt);
        assert_eq!(
            h.minter.retrieve_eth_status(0).await,
            RetrieveEthStatus::PendingSigning
        );
        assert_eq!(h.minter.balance_of(&identity("alice")).await, WEI_PER_ETH / 2);
    }

    let drive = h.minter.tick().await.drive.expect("driver ran");
    assert_eq!((drive.signed, drive.sent), (1, 1));
    assert_eq!(signer.sign_calls(), 4);

    h.minter.tick().await;
    h.minter.tick().await;
    assert_eq!(signer.sign_calls(), 4);
    assert_eq!(chain.submitted().len(), 1);
}

#[tokio::test]
async fn test_transport_failure_resends_identical_bytes() {
    let chain = FakeChain::new(200);
    chain.script_send(SendScript::Reply(RpcOutcome::TransportFailure(
        "connection reset".to_string(),
    )));
    let h = funded(chain.clone()).await;

    h.minter
        .withdraw(identity("alice"), WEI_PER_ETH / 2, DESTINATION)
        .await
        .unwrap();

    let drive = h.minter.tick().await.drive.expect("driver ran");
    assert_eq!((drive.signed, drive.sent), (1, 0));
    assert!(drive.stalled.is_some());
    assert_eq!(status_of(&h, 0).await, Some(WithdrawalStatus::Signed));

    let drive = h.minter.tick().await.drive.expect("driver ran");
    assert_eq!((drive.signed, drive.sent), (0, 1));

    let submitted = chain.submitted();
    assert_eq!(submitted.len(), 2);
    assert_eq!(submitted[0], submitted[1]);
}

#[tokio::test]
async fn test_nonce_too_low_for_own_transaction_counts_as_sent() {
    let chain = FakeChain::new(200);
    chain.script_send(SendScript::NonceTooLowMined);
    let h = funded(chain.clone()).await;

    h.minter
        .withdraw(identity("alice"), WEI_PER_ETH / 2, DESTINATION)
        .await
        .unwrap();
    let drive = h.minter.tick().await.drive.expect("driver ran");

    assert_eq!(drive.sent, 1);
    assert_eq!(drive.invalidated, 0);
    assert_eq!(status_of(&h, 0).await, Some(WithdrawalStatus::Sent));
}

#[tokio::test]
async fn test_consumed_nonce_invalidates_and_queue_moves_on() {
    let chain = FakeChain::new(200);
    chain.script_send(SendScript::NonceTooLowUnknown);
    let h = funded(chain.clone()).await;

    for _ in 0..2 {
        h.minter
            .withdraw(identity("alice"), WEI_PER_ETH / 4, DESTINATION)
            .await
            .unwrap();
    }

    let drive = h.minter.tick().await.drive.expect("driver ran");
    assert_eq!(drive.signed, 2);
    assert_eq!(drive.invalidated, 1);
    assert_eq!(drive.sent, 1);

    assert!(matches!(
        h.minter.retrieve_eth_status(0).await,
        RetrieveEthStatus::Invalid { .. }
    ));
    assert!(matches!(
        h.minter.retrieve_eth_status(1).await,
        RetrieveEthStatus::Found { .. }
    ));

    // Debited funds of an invalid request are not refunded
    assert_eq!(h.minter.balance_of(&identity("alice")).await, WEI_PER_ETH / 2);
    let conservation = h.minter.dump_state_for_debugging().await.conservation;
    assert!(conservation.holds);
    assert_eq!(conservation.stuck_in_invalid, WEI_PER_ETH / 4);
}

#[tokio::test]
async fn test_rejected_transaction_is_terminal() {
    let chain = FakeChain::new(200);
    chain.script_send(SendScript::Reply(RpcOutcome::Error {
        code: -32003,
        message: "transaction rejected".to_string(),
    }));
    let h = funded(chain.clone()).await;

    h.minter
        .withdraw(identity("alice"), WEI_PER_ETH / 2, DESTINATION)
        .await
        .unwrap();
    h.minter.tick().await;
    h.minter.tick().await;

    assert_eq!(status_of(&h, 0).await, Some(WithdrawalStatus::Invalid));
    assert_eq!(chain.submitted().len(), 1);
}

#[tokio::test]
async fn test_withdraw_validation_leaves_ledger_untouched() {
    let chain = FakeChain::new(200);
    let h = funded(chain).await;

    let err = h
        .minter
        .withdraw(identity("alice"), 2 * WEI_PER_ETH, DESTINATION)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        MinterError::Validation(ValidationError::InsufficientFunds { .. })
    ));

    let err = h
        .minter
        .withdraw(identity("alice"), 1, DESTINATION)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        MinterError::Validation(ValidationError::AmountTooLow { .. })
    ));

    let err = h
        .minter
        .withdraw(identity("alice"), WEI_PER_ETH / 2, "0xdead")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        MinterError::Validation(ValidationError::InvalidDestination(_))
    ));

    let err = h
        .minter
        .withdraw(identity("bob"), WEI_PER_ETH / 2, DESTINATION)
        .await
        .unwrap_err();
    assert!(err.is_validation());

    assert_eq!(h.minter.balance_of(&identity("alice")).await, WEI_PER_ETH);
    assert_eq!(h.state.read(|s| s.next_sequence_number()).await, 0);
}

#[tokio::test]
async fn test_concurrent_withdrawals_cannot_overdraw() {
    let chain = FakeChain::new(200);
    let h = funded(chain).await;

    let amount = WEI_PER_ETH * 6 / 10;
    let (first, second) = tokio::join!(
        h.minter.withdraw(identity("alice"), amount, DESTINATION),
        h.minter.withdraw(identity("alice"), amount, DESTINATION),
    );

    assert_eq!(first.is_ok() as u8 + second.is_ok() as u8, 1);
    assert_eq!(
        h.minter.balance_of(&identity("alice")).await,
        WEI_PER_ETH - amount
    );
}

#[tokio::test]
async fn test_test_transfer_does_not_touch_the_ledger() {
    let chain = FakeChain::new(200);
    // The minter address sent 10 transactions before the first withdrawal
    let h = funded_with_settings(
        chain.clone(),
        MinterInit {
            first_sequence_number: 10,
            ..init()
        },
        test_transfer_settings(),
    )
    .await;

    let result = h
        .minter
        .test_transfer(DESTINATION, WEI_PER_ETH / 10, None)
        .await
        .unwrap();

    // Pending transaction count reported by the node
    assert_eq!(result.nonce, 5);
    assert_eq!(chain.submitted(), vec![result.raw_transaction.clone()]);
    assert_eq!(h.state.read(|s| s.total_issued_requests()).await, 0);
    assert_eq!(h.minter.balance_of(&identity("alice")).await, WEI_PER_ETH);
}

#[tokio::test]
async fn test_test_transfer_never_signs_a_withdrawal_nonce() {
    let chain = FakeChain::new(200);
    let h = funded_with_settings(chain.clone(), init(), test_transfer_settings()).await;

    h.minter
        .withdraw(identity("alice"), WEI_PER_ETH / 2, DESTINATION)
        .await
        .unwrap();

    let err = h
        .minter
        .test_transfer(DESTINATION, WEI_PER_ETH, Some(0))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        MinterError::Validation(ValidationError::ReservedNonce { nonce: 0, .. })
    ));

    // The pending count is the nonce the queue uses next
    let err = h
        .minter
        .test_transfer(DESTINATION, WEI_PER_ETH, None)
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "RESERVED_NONCE");
    assert!(chain.submitted().is_empty());

    h.minter.tick().await;
    assert_eq!(chain.submitted().len(), 1);
    assert_eq!(status_of(&h, 0).await, Some(WithdrawalStatus::Sent));
}

#[tokio::test]
async fn test_test_transfer_is_off_by_default() {
    let chain = FakeChain::new(200);
    let h = funded_with_settings(
        chain.clone(),
        MinterInit {
            first_sequence_number: 10,
            ..init()
        },
        settings(),
    )
    .await;

    let err = h
        .minter
        .test_transfer(DESTINATION, WEI_PER_ETH / 10, Some(1))
        .await
        .unwrap_err();
    assert!(matches!(err, MinterError::Disabled(_)));
    assert!(chain.submitted().is_empty());
}

#[tokio::test]
async fn test_withdrawal_below_fee_cannot_block_the_queue() {
    let chain = FakeChain::new(200);
    chain.add_log(deposit_log(2, 0, 160, "bob", WEI_PER_ETH));
    // Minimum far below the 24.5 gwei * 21000 gas the transfer may cost
    let h = funded_with_settings(
        chain.clone(),
        init(),
        MinterSettings {
            min_withdrawal_amount: 10_000_000_000_000,
            ..settings()
        },
    )
    .await;

    let err = h
        .minter
        .withdraw(identity("alice"), 10_000_000_000_000, DESTINATION)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        MinterError::Validation(ValidationError::AmountBelowFee { .. })
    ));
    assert_eq!(h.minter.balance_of(&identity("alice")).await, WEI_PER_ETH);

    let receipt = h
        .minter
        .withdraw(identity("bob"), WEI_PER_ETH / 2, DESTINATION)
        .await
        .unwrap();
    assert_eq!(receipt.sequence_number, 0);

    let drive = h.minter.tick().await.drive.expect("driver ran");
    assert_eq!((drive.signed, drive.sent), (1, 1));
    assert_eq!(drive.stalled, None);
    assert_eq!(status_of(&h, 0).await, Some(WithdrawalStatus::Sent));
}

#[tokio::test]
async fn test_failed_commit_reuses_the_signature() {
    let chain = FakeChain::new(200);
    chain.add_log(deposit_log(1, 0, 150, "alice", WEI_PER_ETH));

    let signer = FlakySigner::new(0);
    let store = MemoryEventStore::new();
    let failing = FailingStore::new(store.clone());
    let h = harness_with(
        chain.clone(),
        signer.clone(),
        store,
        failing.clone(),
        init(),
        settings(),
    )
    .await;
    h.minter.tick().await;

    h.minter
        .withdraw(identity("alice"), WEI_PER_ETH / 2, DESTINATION)
        .await
        .unwrap();

    // The signature comes back but recording it fails
    failing.fail_next(1);
    let drive = h.minter.tick().await.drive.expect("driver ran");
    assert_eq!(drive.signed, 0);
    assert_eq!(drive.stalled.map(|(n, _)| n), Some(0));
    assert_eq!(signer.sign_calls(), 1);
    assert_eq!(status_of(&h, 0).await, Some(WithdrawalStatus::Unapproved));

    let drive = h.minter.tick().await.drive.expect("driver ran");
    assert_eq!((drive.signed, drive.sent), (1, 1));
    assert_eq!(signer.sign_calls(), 1);
    assert_eq!(chain.submitted().len(), 1);
}

#[tokio::test]
async fn test_restart_resumes_from_the_audit_log() {
    let chain = FakeChain::new(200);
    chain.script_send(SendScript::NonceTooLowUnknown);
    let h = funded(chain.clone()).await;

    for _ in 0..3 {
        h.minter
            .withdraw(identity("alice"), WEI_PER_ETH / 4, DESTINATION)
            .await
            .unwrap();
    }
    h.minter.tick().await;
    let before: MinterState = h.state.read(|s| s.clone()).await;

    let restarted = harness_with_store(
        chain.clone(),
        Arc::new(LocalKeySigner::generate("minter")),
        h.store.clone(),
    )
    .await;
    let after: MinterState = restarted.state.read(|s| s.clone()).await;
    assert_eq!(before, after);

    let receipt = restarted
        .minter
        .withdraw(identity("alice"), WEI_PER_ETH / 8, DESTINATION)
        .await
        .unwrap();
    assert_eq!(receipt.sequence_number, 3);
}

#[tokio::test]
async fn test_run_loop_processes_until_stopped() {
    let chain = FakeChain::new(200);
    chain.add_log(deposit_log(1, 0, 150, "alice", WEI_PER_ETH));
    let h = harness(chain, Arc::new(LocalKeySigner::generate("minter"))).await;
    let minter = Arc::new(h.minter);

    let runner = minter.clone();
    let handle = tokio::spawn(async move { runner.run().await });

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(minter.is_running().await);
    assert_eq!(minter.balance_of(&identity("alice")).await, WEI_PER_ETH);

    minter.stop().await;
    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .expect("loops stopped")
        .unwrap();
}
