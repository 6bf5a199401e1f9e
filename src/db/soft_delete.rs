//! Marking rows deleted and bringing whitelisted kinds back.

use super::kinds::kind_spec;
use super::now;
use crate::errors::{AppError, AppResult};
use crate::models::EntityKind;
use rusqlite::{params, Connection};

/// Sets `deleted_at` on the row. Deleting an already deleted row rewrites the
/// timestamp. Workflows and stages are refused while active tasks use them.
pub fn soft_delete(conn: &Connection, kind: EntityKind, id: &str) -> AppResult<()> {
    match kind {
        EntityKind::Workflows if workflow_in_use(conn, id)? => {
            return Err(AppError::InUse(
                "The workflow has tasks. Please remove the tasks first".to_string(),
            ));
        }
        EntityKind::Stages if stage_in_use(conn, id)? => {
            return Err(AppError::InUse(
                "The stage has tasks. Please remove the tasks first".to_string(),
            ));
        }
        _ => {}
    }

    let sql = format!("UPDATE {} SET deleted_at = ?1 WHERE id = ?2", kind_spec(kind).table());
    let updated = conn.execute(&sql, params![now(), id])?;
    if updated == 0 {
        return Err(AppError::NotFound(format!("{} {} not found", kind, id)));
    }
    Ok(())
}

/// Clears `deleted_at` for a whitelisted kind. The id is neither checked for
/// existence nor for tenant ownership; an unknown id changes nothing.
pub fn restore(conn: &Connection, raw_kind: &str, id: &str) -> AppResult<EntityKind> {
    let kind: EntityKind = raw_kind.parse()?;
    if !kind.is_restorable() {
        return Err(AppError::InvalidKind(format!("{} cannot be restored", kind)));
    }
    let sql = format!("UPDATE {} SET deleted_at = NULL WHERE id = ?1", kind_spec(kind).table());
    conn.execute(&sql, [id])?;
    Ok(kind)
}

pub fn workflow_in_use(conn: &Connection, workflow_id: &str) -> AppResult<bool> {
    let in_use: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM tasks WHERE workflow_id = ?1 AND deleted_at IS NULL",
        [workflow_id],
        |row| row.get(0),
    )?;
    Ok(in_use)
}

pub fn stage_in_use(conn: &Connection, stage_id: &str) -> AppResult<bool> {
    let in_use: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM tasks WHERE stage_id = ?1 AND deleted_at IS NULL",
        [stage_id],
        |row| row.get(0),
    )?;
    Ok(in_use)
}

#[cfg(test)]
mod tests {
    use super::{restore, soft_delete};
    use crate::db::records::find_record;
    use crate::db::test_support::fixture;
    use crate::errors::AppError;
    use crate::models::{EntityKind, Link, RecordInput};

    #[test]
    fn delete_then_restore_round_trips_every_restorable_kind() {
        let fx = fixture();
        let org = fx.insert(EntityKind::Organizations, fx.owned("Initech"));
        let person = fx.insert(EntityKind::Persons, fx.owned("Grace"));
        let product = fx.insert(EntityKind::Products, fx.owned("Widget"));
        let workflow = fx.insert(EntityKind::Workflows, fx.owned("Sales"));

        for kind in EntityKind::restorable() {
            let id = match kind {
                EntityKind::Users => fx.user.id.clone(),
                EntityKind::Companies => fx.company_id.clone(),
                EntityKind::Organizations => org.id.clone(),
                EntityKind::Persons => person.id.clone(),
                EntityKind::Products => product.id.clone(),
                EntityKind::Contacts => {
                    fx.insert(kind, RecordInput::named("c").with_link(Link::Person, &person.id)).id
                }
                EntityKind::Prices => fx.insert(kind, RecordInput::default().with_link(Link::Product, &product.id)).id,
                EntityKind::Stages => {
                    fx.insert(kind, RecordInput::named("Lead").with_link(Link::Workflow, &workflow.id)).id
                }
                EntityKind::Tasks => fx.insert(kind, fx.owned("Call").with_link(Link::Workflow, &workflow.id)).id,
                EntityKind::CompanyUsers => fx.insert(kind, fx.owned("")).id,
                _ => fx.insert(kind, fx.owned("row")).id,
            };

            fx.db.soft_delete(kind, &id).expect("soft delete");
            let deleted = fx.db.read(|conn| find_record(conn, kind, &id)).expect("lookup").expect("row");
            assert!(deleted.deleted_at.is_some(), "{} not marked deleted", kind);

            assert_eq!(fx.db.restore(kind.as_str(), &id).expect("restore"), kind);
            let restored = fx.db.read(|conn| find_record(conn, kind, &id)).expect("lookup").expect("row");
            assert!(restored.deleted_at.is_none(), "{} still deleted", kind);
        }
    }

    #[test]
    fn kinds_outside_the_whitelist_are_rejected_without_writing() {
        let fx = fixture();
        let relationship = fx.insert(EntityKind::OrganizationRelationships, fx.owned("parent of"));
        fx.db
            .soft_delete(EntityKind::OrganizationRelationships, &relationship.id)
            .expect("soft delete");

        for raw in ["organization_relationships", "product_fields", "deals", "users; DROP TABLE users"] {
            let err = fx.db.restore(raw, &relationship.id).expect_err("restore must fail");
            assert!(matches!(err, AppError::InvalidKind(_)), "{} gave {:?}", raw, err);
        }
        let row = fx
            .db
            .read(|conn| find_record(conn, EntityKind::OrganizationRelationships, &relationship.id))
            .expect("lookup")
            .expect("row");
        assert!(row.deleted_at.is_some());
    }

    #[test]
    fn deleting_twice_keeps_the_row_deleted() {
        let fx = fixture();
        let note = fx.insert(EntityKind::Notes, fx.owned("hello"));
        fx.db.soft_delete(EntityKind::Notes, &note.id).expect("first delete");
        fx.db.soft_delete(EntityKind::Notes, &note.id).expect("second delete");
        let row = fx
            .db
            .read(|conn| find_record(conn, EntityKind::Notes, &note.id))
            .expect("lookup")
            .expect("row");
        assert!(row.deleted_at.is_some());
    }

    #[test]
    fn restoring_an_unknown_id_is_a_no_op() {
        let fx = fixture();
        assert_eq!(
            fx.db.restore("tasks", "does-not-exist").expect("restore"),
            EntityKind::Tasks
        );
    }

    #[test]
    fn workflow_and_stage_are_guarded_by_active_tasks() {
        let fx = fixture();
        let workflow = fx.insert(EntityKind::Workflows, fx.owned("Sales"));
        let stage = fx.insert(
            EntityKind::Stages,
            RecordInput::named("Lead").with_link(Link::Workflow, &workflow.id),
        );
        let task = fx.insert(
            EntityKind::Tasks,
            fx.owned("Call")
                .with_link(Link::Workflow, &workflow.id)
                .with_link(Link::Stage, &stage.id),
        );

        let err = fx.db.soft_delete(EntityKind::Workflows, &workflow.id).expect_err("guarded");
        assert!(matches!(err, AppError::InUse(ref message) if message.contains("workflow has tasks")));
        let err = fx.db.soft_delete(EntityKind::Stages, &stage.id).expect_err("guarded");
        assert!(matches!(err, AppError::InUse(ref message) if message.contains("stage has tasks")));

        fx.db.soft_delete(EntityKind::Tasks, &task.id).expect("delete task");
        fx.db.soft_delete(EntityKind::Stages, &stage.id).expect("delete stage");
        fx.db.soft_delete(EntityKind::Workflows, &workflow.id).expect("delete workflow");
    }

    #[test]
    fn deleting_a_missing_row_reports_not_found() {
        let fx = fixture();
        let err = fx
            .db
            .transaction(|tx| soft_delete(tx, EntityKind::Notes, "nope"))
            .expect_err("missing row");
        assert!(matches!(err, AppError::NotFound(_)));
        assert!(fx.db.transaction(|tx| restore(tx, "notes", "nope")).is_ok());
    }
}
