use anyhow::{Context, Result};
use sqlx::SqlitePool;
use tempfile::tempdir;
use uuid::Uuid;

use opsdesk::authz::{Actor, AuthzEngine, PolicyResolver};
use opsdesk::catalog::RoleKey;
use opsdesk::store::{RuleStore, ScopeKey};

const APPROVE_HW: &str = "hardware_requests.approve";

async fn engine() -> Result<(AuthzEngine, tempfile::TempDir)> {
    let dir = tempdir().context("failed to create tempdir")?;
    let db_path = dir.path().join("test.db");

    use sqlx::sqlite::SqliteConnectOptions;
    let opts = SqliteConnectOptions::new()
        .filename(db_path.as_path())
        .create_if_missing(true);
    let pool = SqlitePool::connect_with(opts).await?;

    let migrator = sqlx::migrate::Migrator::new(
        std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations"),
    )
    .await?;
    migrator.run(&pool).await?;

    Ok((AuthzEngine::new(RuleStore::new(pool)), dir))
}

#[tokio::test]
async fn writes_invalidate_the_cached_snapshot() -> Result<()> {
    let (engine, _dir) = engine().await?;
    let company = Uuid::new_v4();
    let actor = Actor::new(Uuid::new_v4(), RoleKey::Manager, Some(company));

    // First read populates the company snapshot.
    assert!(!engine.has_permission(&actor, APPROVE_HW).await?);

    // A write through the store invalidates synchronously; the next read
    // must see the committed rule, not the cached pre-write answer.
    engine
        .store()
        .set_role_rule(company, RoleKey::Manager, APPROVE_HW, true)
        .await?;
    assert!(engine.has_permission(&actor, APPROVE_HW).await?);

    engine
        .store()
        .clear_role_rule(company, RoleKey::Manager, APPROVE_HW)
        .await?;
    assert!(!engine.has_permission(&actor, APPROVE_HW).await?);
    Ok(())
}

#[tokio::test]
async fn writes_bypassing_the_store_stay_stale_until_invalidated() -> Result<()> {
    let (engine, _dir) = engine().await?;
    let company = Uuid::new_v4();
    let actor = Actor::new(Uuid::new_v4(), RoleKey::Manager, Some(company));
    let store = engine.store();

    assert!(!engine.has_permission(&actor, APPROVE_HW).await?);

    // Simulate another writer hitting the database directly: the cached
    // snapshot keeps answering until the scope is invalidated.
    sqlx::query(
        r#"
        INSERT INTO role_permission_rules (company_id, role, permission, enabled, created_at, updated_at)
        VALUES (?, 'manager', ?, 1, datetime('now'), datetime('now'))
        "#,
    )
    .bind(company.to_string())
    .bind(APPROVE_HW)
    .execute(store.pool())
    .await?;

    assert!(!engine.has_permission(&actor, APPROVE_HW).await?, "stale read");

    store.invalidate(ScopeKey::Company(company));
    assert!(engine.has_permission(&actor, APPROVE_HW).await?);
    Ok(())
}

#[tokio::test]
async fn company_snapshots_are_isolated() -> Result<()> {
    let (engine, _dir) = engine().await?;
    let company_a = Uuid::new_v4();
    let company_b = Uuid::new_v4();
    let actor_a = Actor::new(Uuid::new_v4(), RoleKey::Manager, Some(company_a));
    let actor_b = Actor::new(Uuid::new_v4(), RoleKey::Manager, Some(company_b));

    engine
        .store()
        .set_role_rule(company_a, RoleKey::Manager, APPROVE_HW, true)
        .await?;

    assert!(engine.has_permission(&actor_a, APPROVE_HW).await?);
    assert!(!engine.has_permission(&actor_b, APPROVE_HW).await?);

    let decision = engine.decide(Some(&actor_b), APPROVE_HW).await?;
    assert!(!decision.allowed);
    Ok(())
}
