mod common;

use anyhow::Result;
use cagnotte::application::{AppError, Session};
use cagnotte::domain::EntryKind;
use common::{StandardAccounts, test_service};

#[tokio::test]
async fn test_transfer_moves_funds_and_logs_entry() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardAccounts::create(&service).await?;

    let bob = StandardAccounts::account(&service, "bob").await?;
    let session = StandardAccounts::session(&service, "alice").await?;

    let receipt = service
        .transfer(
            &session,
            &bob.card_number,
            &bob.national_id,
            20_000,
            Some("rent share".into()),
        )
        .await?;

    assert_eq!(receipt.sender_holder, "alice");
    assert_eq!(receipt.recipient_holder, "bob");
    assert_eq!(receipt.entry.kind, EntryKind::Transfer);

    assert_eq!(service.get_balance("alice").await?, 80_000);
    assert_eq!(service.get_balance("bob").await?, 120_000);

    // One entry, referencing both parties
    let entries = service.list_transactions(&session, "alice").await?;
    assert_eq!(entries.len(), 1);
    let alice = StandardAccounts::account(&service, "alice").await?;
    assert_eq!(entries[0].account_id, alice.id);
    assert_eq!(entries[0].counterparty_id, Some(bob.id));

    Ok(())
}

#[tokio::test]
async fn test_transfer_conserves_total_funds() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardAccounts::create(&service).await?;

    let before = StandardAccounts::total_balance(&service).await?;

    let bob = StandardAccounts::account(&service, "bob").await?;
    let session = StandardAccounts::session(&service, "alice").await?;
    service
        .transfer(&session, &bob.card_number, &bob.national_id, 37_500, None)
        .await?;

    let after = StandardAccounts::total_balance(&service).await?;
    assert_eq!(before, after, "Transfers must conserve the sum of balances");

    Ok(())
}

#[tokio::test]
async fn test_insufficient_funds_changes_nothing() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardAccounts::create(&service).await?;

    let bob = StandardAccounts::account(&service, "bob").await?;
    let session = StandardAccounts::session(&service, "alice").await?;

    let result = service
        .transfer(&session, &bob.card_number, &bob.national_id, 200_000, None)
        .await;

    match result {
        Err(AppError::InsufficientFunds { balance }) => assert_eq!(balance, 100_000),
        other => panic!("expected InsufficientFunds, got {:?}", other.map(|r| r.entry.id)),
    }

    assert_eq!(service.get_balance("alice").await?, 100_000);
    assert_eq!(service.get_balance("bob").await?, 100_000);
    let entries = service.list_transactions(&session, "alice").await?;
    assert!(entries.is_empty(), "No ledger entry on a failed transfer");

    Ok(())
}

#[tokio::test]
async fn test_unknown_recipient_is_rejected() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardAccounts::create(&service).await?;

    let bob = StandardAccounts::account(&service, "bob").await?;
    let session = StandardAccounts::session(&service, "alice").await?;

    // Right card, wrong national id: the pair is a shared secret and both
    // halves must match.
    let result = service
        .transfer(&session, &bob.card_number, "FR-9999", 10_000, None)
        .await;
    assert!(matches!(result, Err(AppError::RecipientNotFound)));

    let result = service
        .transfer(&session, "4000000000000002", &bob.national_id, 10_000, None)
        .await;
    assert!(matches!(result, Err(AppError::RecipientNotFound)));

    assert_eq!(service.get_balance("alice").await?, 100_000);

    Ok(())
}

#[tokio::test]
async fn test_self_transfer_is_rejected() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardAccounts::create(&service).await?;

    let alice = StandardAccounts::account(&service, "alice").await?;
    let session = StandardAccounts::session(&service, "alice").await?;

    let result = service
        .transfer(&session, &alice.card_number, &alice.national_id, 10_000, None)
        .await;
    assert!(matches!(result, Err(AppError::SelfTransfer)));
    assert_eq!(service.get_balance("alice").await?, 100_000);

    Ok(())
}

#[tokio::test]
async fn test_non_positive_amounts_are_rejected() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardAccounts::create(&service).await?;

    let bob = StandardAccounts::account(&service, "bob").await?;
    let session = StandardAccounts::session(&service, "alice").await?;

    for amount in [0, -5_000] {
        let result = service
            .transfer(&session, &bob.card_number, &bob.national_id, amount, None)
            .await;
        assert!(matches!(result, Err(AppError::InvalidAmount(_))));
    }

    assert_eq!(service.get_balance("alice").await?, 100_000);
    assert_eq!(service.get_balance("bob").await?, 100_000);

    Ok(())
}

#[tokio::test]
async fn test_anonymous_caller_is_rejected() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardAccounts::create(&service).await?;

    let bob = StandardAccounts::account(&service, "bob").await?;
    let result = service
        .transfer(
            &Session::anonymous(),
            &bob.card_number,
            &bob.national_id,
            10_000,
            None,
        )
        .await;

    assert!(matches!(result, Err(AppError::Unauthenticated)));

    Ok(())
}

#[tokio::test]
async fn test_blocked_sender_is_rejected() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardAccounts::create(&service).await?;

    let admin = StandardAccounts::session(&service, "root").await?;
    service.set_blocked(&admin, "alice", true).await?;

    let bob = StandardAccounts::account(&service, "bob").await?;
    let session = StandardAccounts::session(&service, "alice").await?;
    let result = service
        .transfer(&session, &bob.card_number, &bob.national_id, 10_000, None)
        .await;

    assert!(matches!(result, Err(AppError::UserBlocked)));
    assert_eq!(service.get_balance("alice").await?, 100_000);

    // Unblocking restores the ability to transfer
    service.set_blocked(&admin, "alice", false).await?;
    service
        .transfer(&session, &bob.card_number, &bob.national_id, 10_000, None)
        .await?;
    assert_eq!(service.get_balance("alice").await?, 90_000);

    Ok(())
}

#[tokio::test]
async fn test_plain_users_cannot_block() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardAccounts::create(&service).await?;

    let session = StandardAccounts::session(&service, "bob").await?;
    let result = service.set_blocked(&session, "alice", true).await;
    assert!(matches!(result, Err(AppError::NotAuthorized)));

    Ok(())
}

#[tokio::test]
async fn test_transactions_are_newest_first() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardAccounts::create(&service).await?;

    let bob = StandardAccounts::account(&service, "bob").await?;
    let session = StandardAccounts::session(&service, "alice").await?;

    for amount in [10_000, 20_000, 30_000] {
        service
            .transfer(&session, &bob.card_number, &bob.national_id, amount, None)
            .await?;
    }

    let entries = service.list_transactions(&session, "alice").await?;
    assert_eq!(entries.len(), 3);
    let sequences: Vec<i64> = entries.iter().map(|e| e.sequence).collect();
    assert_eq!(sequences, vec![3, 2, 1], "Statement must be newest first");

    Ok(())
}

#[tokio::test]
async fn test_statement_access_is_role_gated() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardAccounts::create(&service).await?;

    let bob_session = StandardAccounts::session(&service, "bob").await?;
    let result = service.list_transactions(&bob_session, "alice").await;
    assert!(matches!(result, Err(AppError::NotAuthorized)));

    // Admins can read anyone's statement
    let admin = StandardAccounts::session(&service, "root").await?;
    let entries = service.list_transactions(&admin, "alice").await?;
    assert!(entries.is_empty());

    Ok(())
}
