use anyhow::{Context, Result};
use sqlx::SqlitePool;
use tempfile::tempdir;
use uuid::Uuid;

use opsdesk::authz::Effect;
use opsdesk::editor::MatrixEditor;
use opsdesk::store::RuleStore;

async fn store_with_role() -> Result<(RuleStore, Uuid, Uuid, tempfile::TempDir)> {
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

    let store = RuleStore::new(pool);
    store.sync_permission_catalog(None).await?;

    let company = Uuid::new_v4();
    let role = store.create_dyn_role(company, "hardware_approver", None).await?;
    let permissions = store.list_dyn_permissions().await?;
    let approve = permissions
        .iter()
        .find(|p| p.key == "hardware_requests.approve")
        .context("catalog should contain the approve key")?;

    Ok((store, role.id, approve.id, dir))
}

async fn cell_count(store: &RuleStore, role_id: Uuid) -> Result<i64> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM dyn_role_permissions WHERE role_id = ?")
            .bind(role_id.to_string())
            .fetch_one(store.pool())
            .await?;
    Ok(count)
}

#[tokio::test]
async fn commit_persists_staged_cells_and_clears_pending() -> Result<()> {
    let (store, role_id, permission_id, _dir) = store_with_role().await?;

    let mut editor = MatrixEditor::load(&store, role_id).await?;
    assert_eq!(editor.effective_value(permission_id), Effect::Unset);

    editor.toggle(permission_id);
    assert!(editor.is_modified(permission_id));
    assert_eq!(editor.effective_value(permission_id), Effect::Allow);
    // Nothing persisted while the change is only staged.
    assert_eq!(cell_count(&store, role_id).await?, 0);

    let report = editor.commit(&store).await?;
    assert_eq!(report.applied, vec![permission_id]);
    assert!(report.failed.is_empty());
    assert!(!editor.has_pending());
    assert_eq!(editor.effective_value(permission_id), Effect::Allow);
    assert_eq!(cell_count(&store, role_id).await?, 1);

    // A fresh editor sees the committed state.
    let fresh = MatrixEditor::load(&store, role_id).await?;
    assert_eq!(fresh.effective_value(permission_id), Effect::Allow);
    Ok(())
}

#[tokio::test]
async fn committing_unset_deletes_the_row() -> Result<()> {
    let (store, role_id, permission_id, _dir) = store_with_role().await?;

    store.set_matrix_cell(role_id, permission_id, Effect::Deny).await?;
    assert_eq!(cell_count(&store, role_id).await?, 1);

    let mut editor = MatrixEditor::load(&store, role_id).await?;
    assert_eq!(editor.effective_value(permission_id), Effect::Deny);

    // Deny cycles to Unset; committing that removes the row rather than
    // storing an unset marker.
    editor.toggle(permission_id);
    assert_eq!(editor.effective_value(permission_id), Effect::Unset);
    let report = editor.commit(&store).await?;
    assert!(report.failed.is_empty());

    assert_eq!(cell_count(&store, role_id).await?, 0);
    assert_eq!(editor.effective_value(permission_id), Effect::Unset);
    Ok(())
}

#[tokio::test]
async fn cancel_writes_nothing() -> Result<()> {
    let (store, role_id, permission_id, _dir) = store_with_role().await?;

    store.set_matrix_cell(role_id, permission_id, Effect::Allow).await?;

    let mut editor = MatrixEditor::load(&store, role_id).await?;
    editor.toggle(permission_id);
    editor.toggle(permission_id);
    assert!(editor.has_pending());

    editor.cancel();
    assert!(!editor.has_pending());
    assert_eq!(editor.effective_value(permission_id), Effect::Allow);

    // The store still holds exactly the pre-edit state.
    let matrix = store.matrix_for_role(role_id).await?;
    assert_eq!(matrix.get(&permission_id), Some(&Effect::Allow));
    assert_eq!(cell_count(&store, role_id).await?, 1);
    Ok(())
}

#[tokio::test]
async fn batch_commit_handles_many_cells() -> Result<()> {
    let (store, role_id, _permission_id, _dir) = store_with_role().await?;
    let permissions = store.list_dyn_permissions().await?;

    let mut editor = MatrixEditor::load(&store, role_id).await?;
    for (i, permission) in permissions.iter().enumerate() {
        let effect = if i % 2 == 0 { Effect::Allow } else { Effect::Deny };
        editor.stage(permission.id, effect);
    }

    let report = editor.commit(&store).await?;
    assert_eq!(report.applied.len(), permissions.len());
    assert!(report.failed.is_empty());
    assert_eq!(cell_count(&store, role_id).await?, permissions.len() as i64);

    let cells = store.matrix_cells(role_id).await?;
    assert!(cells.iter().all(|c| c.effect != Effect::Unset));
    Ok(())
}

#[tokio::test]
async fn deleting_a_role_cascades_to_cells_and_assignments() -> Result<()> {
    let (store, role_id, permission_id, _dir) = store_with_role().await?;
    let user = Uuid::new_v4();

    store.set_matrix_cell(role_id, permission_id, Effect::Allow).await?;
    store.assign_dyn_role(user, role_id).await?;

    assert!(store.delete_dyn_role(role_id).await?);

    assert_eq!(cell_count(&store, role_id).await?, 0);
    let assignments: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM dyn_user_roles WHERE role_id = ?")
        .bind(role_id.to_string())
        .fetch_one(store.pool())
        .await?;
    assert_eq!(assignments, 0);
    Ok(())
}
