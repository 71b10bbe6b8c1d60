mod common;

use anyhow::Result;
use cagnotte::application::{AppError, Session};
use cagnotte::domain::EntryKind;
use common::{StandardAccounts, test_service};

#[tokio::test]
async fn test_pay_bill_debits_and_records() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardAccounts::create(&service).await?;

    let session = StandardAccounts::session(&service, "alice").await?;
    let entry = service
        .pay_bill(&session, "ELEC-2026-07", 12_000, None)
        .await?;

    assert_eq!(entry.kind, EntryKind::Bill);
    assert_eq!(entry.reference.as_deref(), Some("ELEC-2026-07"));
    assert!(entry.counterparty_id.is_none());
    assert_eq!(service.get_balance("alice").await?, 88_000);

    let bills = service.list_bills(&session).await?;
    assert_eq!(bills.len(), 1);
    assert_eq!(bills[0].id, entry.id);

    Ok(())
}

#[tokio::test]
async fn test_duplicate_reference_debits_twice() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardAccounts::create(&service).await?;

    let session = StandardAccounts::session(&service, "alice").await?;

    // Without an idempotency key, a repeated reference is an independent
    // payment: two debits, two records.
    let first = service.pay_bill(&session, "ELEC-2026-07", 12_000, None).await?;
    let second = service.pay_bill(&session, "ELEC-2026-07", 12_000, None).await?;

    assert_ne!(first.id, second.id);
    assert_eq!(service.get_balance("alice").await?, 76_000);
    assert_eq!(service.list_bills(&session).await?.len(), 2);

    Ok(())
}

#[tokio::test]
async fn test_idempotency_key_prevents_double_debit() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardAccounts::create(&service).await?;

    let session = StandardAccounts::session(&service, "alice").await?;

    let first = service
        .pay_bill(&session, "ELEC-2026-07", 12_000, Some("retry-1".into()))
        .await?;
    let replay = service
        .pay_bill(&session, "ELEC-2026-07", 12_000, Some("retry-1".into()))
        .await?;

    assert_eq!(first.id, replay.id, "The original entry is returned as-is");
    assert_eq!(service.get_balance("alice").await?, 88_000);
    assert_eq!(service.list_bills(&session).await?.len(), 1);

    Ok(())
}

#[tokio::test]
async fn test_distinct_idempotency_keys_debit_independently() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardAccounts::create(&service).await?;

    let session = StandardAccounts::session(&service, "alice").await?;

    service
        .pay_bill(&session, "ELEC-2026-07", 12_000, Some("retry-1".into()))
        .await?;
    service
        .pay_bill(&session, "ELEC-2026-08", 13_000, Some("retry-2".into()))
        .await?;

    assert_eq!(service.get_balance("alice").await?, 75_000);
    assert_eq!(service.list_bills(&session).await?.len(), 2);

    Ok(())
}

#[tokio::test]
async fn test_bill_insufficient_funds_changes_nothing() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardAccounts::create(&service).await?;

    let session = StandardAccounts::session(&service, "alice").await?;
    let result = service.pay_bill(&session, "LOYER-2026", 250_000, None).await;

    assert!(matches!(result, Err(AppError::InsufficientFunds { .. })));
    assert_eq!(service.get_balance("alice").await?, 100_000);
    assert!(service.list_bills(&session).await?.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_bill_requires_authentication() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardAccounts::create(&service).await?;

    let result = service
        .pay_bill(&Session::anonymous(), "ELEC-2026-07", 12_000, None)
        .await;
    assert!(matches!(result, Err(AppError::Unauthenticated)));

    Ok(())
}

#[tokio::test]
async fn test_bill_rejects_non_positive_amount() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardAccounts::create(&service).await?;

    let session = StandardAccounts::session(&service, "alice").await?;
    let result = service.pay_bill(&session, "ELEC-2026-07", 0, None).await;
    assert!(matches!(result, Err(AppError::InvalidAmount(_))));
    assert_eq!(service.get_balance("alice").await?, 100_000);

    Ok(())
}
