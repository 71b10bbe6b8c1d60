mod common;

use anyhow::Result;
use cagnotte::application::{AppError, Session};
use cagnotte::domain::{EntryKind, GoalStatus};
use common::{StandardAccounts, test_service};
use uuid::Uuid;

#[tokio::test]
async fn test_fund_goal_debits_and_tracks_progress() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardAccounts::create(&service).await?;

    let session = StandardAccounts::session(&service, "alice").await?;
    let goal = service
        .create_goal(&session, "Vacances".into(), 50_000, None)
        .await?;

    let funded = service.fund_goal(&session, goal.id, 15_000).await?;

    assert_eq!(funded.current_cents, 15_000);
    assert_eq!(funded.status, GoalStatus::InProgress);
    assert_eq!(service.get_balance("alice").await?, 85_000);

    // The debit is recorded as a goal_funding entry pointing at the goal
    let entries = service.list_transactions(&session, "alice").await?;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].kind, EntryKind::GoalFunding);
    assert_eq!(entries[0].goal_id, Some(goal.id));
    assert!(entries[0].counterparty_id.is_none());

    Ok(())
}

#[tokio::test]
async fn test_goal_achieved_when_target_reached() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardAccounts::create(&service).await?;

    let alice = StandardAccounts::session(&service, "alice").await?;
    let bob = StandardAccounts::session(&service, "bob").await?;

    let goal = service
        .create_goal(&alice, "Studio".into(), 100_000, None)
        .await?;

    // Anyone may contribute to a goal: alice brings it to 90_000, bob's
    // contribution crosses the target.
    let after_alice = service.fund_goal(&alice, goal.id, 90_000).await?;
    assert_eq!(after_alice.status, GoalStatus::InProgress);

    let after_bob = service.fund_goal(&bob, goal.id, 15_000).await?;

    // Overfunding is stored, not clamped
    assert_eq!(after_bob.current_cents, 105_000);
    assert_eq!(after_bob.status, GoalStatus::Achieved);
    assert_eq!(service.get_balance("alice").await?, 10_000);
    assert_eq!(service.get_balance("bob").await?, 85_000);

    Ok(())
}

#[tokio::test]
async fn test_achieved_goal_never_reverts() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardAccounts::create(&service).await?;

    let session = StandardAccounts::session(&service, "alice").await?;
    let goal = service
        .create_goal(&session, "Vélo".into(), 10_000, None)
        .await?;

    service.fund_goal(&session, goal.id, 10_000).await?;
    let funded = service.fund_goal(&session, goal.id, 5_000).await?;

    assert_eq!(funded.status, GoalStatus::Achieved);
    assert_eq!(funded.current_cents, 15_000, "Funding stays monotonic");

    let stored = service.get_goal(goal.id).await?;
    assert_eq!(stored.status, GoalStatus::Achieved);

    Ok(())
}

#[tokio::test]
async fn test_unknown_goal_leaves_balance_untouched() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardAccounts::create(&service).await?;

    let session = StandardAccounts::session(&service, "alice").await?;
    let result = service.fund_goal(&session, Uuid::new_v4(), 10_000).await;

    assert!(matches!(result, Err(AppError::GoalNotFound(_))));
    assert_eq!(service.get_balance("alice").await?, 100_000);
    let entries = service.list_transactions(&session, "alice").await?;
    assert!(entries.is_empty(), "No debit may occur for a missing goal");

    Ok(())
}

#[tokio::test]
async fn test_insufficient_funds_leaves_goal_untouched() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardAccounts::create(&service).await?;

    let session = StandardAccounts::session(&service, "alice").await?;
    let goal = service
        .create_goal(&session, "Vacances".into(), 500_000, None)
        .await?;

    let result = service.fund_goal(&session, goal.id, 200_000).await;
    assert!(matches!(result, Err(AppError::InsufficientFunds { .. })));

    let stored = service.get_goal(goal.id).await?;
    assert_eq!(stored.current_cents, 0);
    assert_eq!(stored.status, GoalStatus::InProgress);
    assert_eq!(service.get_balance("alice").await?, 100_000);

    Ok(())
}

#[tokio::test]
async fn test_goal_funding_requires_authentication() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardAccounts::create(&service).await?;

    let session = StandardAccounts::session(&service, "alice").await?;
    let goal = service
        .create_goal(&session, "Vacances".into(), 50_000, None)
        .await?;

    let result = service.fund_goal(&Session::anonymous(), goal.id, 10_000).await;
    assert!(matches!(result, Err(AppError::Unauthenticated)));

    Ok(())
}

#[tokio::test]
async fn test_goal_creation_validates_target() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardAccounts::create(&service).await?;

    let session = StandardAccounts::session(&service, "alice").await?;
    let result = service.create_goal(&session, "Rien".into(), 0, None).await;
    assert!(matches!(result, Err(AppError::InvalidAmount(_))));

    Ok(())
}
