//! One listing over every restorable table, restricted to soft-deleted rows
//! of a single tenant.

use super::kinds::kind_spec;
use super::{parse_kind, parse_optional_time, parse_time};
use crate::errors::AppResult;
use crate::models::{DeletedObject, EntityKind};
use once_cell::sync::Lazy;
use rusqlite::Connection;

static DELETED_OBJECTS_SQL: Lazy<String> = Lazy::new(|| {
    let branches: Vec<String> = EntityKind::restorable().map(branch_sql).collect();
    format!(
        "{}\nORDER BY deleted_at DESC, id ASC",
        branches.join("\nUNION ALL\n")
    )
});

fn branch_sql(kind: EntityKind) -> String {
    let spec = kind_spec(kind);
    let table = spec.table();
    format!(
        "SELECT '{kind}' AS kind, {table}.id AS id, {label} AS name, {table}.created_at AS created_at, \
         {table}.updated_at AS updated_at, {table}.deleted_at AS deleted_at \
         FROM {table} WHERE {predicate} AND {table}.deleted_at IS NOT NULL",
        kind = kind.as_str(),
        table = table,
        label = spec.label_sql(),
        predicate = spec.tenant_predicate(),
    )
}

pub fn list_deleted(conn: &Connection, company_id: &str) -> AppResult<Vec<DeletedObject>> {
    let mut statement = conn.prepare(DELETED_OBJECTS_SQL.as_str())?;
    let rows = statement.query_map([company_id], parse_deleted_row)?;
    let mut result = Vec::new();
    for row in rows {
        result.push(row?);
    }
    Ok(result)
}

fn parse_deleted_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<DeletedObject> {
    Ok(DeletedObject {
        kind: parse_kind(&row.get::<_, String>(0)?)?,
        id: row.get(1)?,
        name: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
        created_at: parse_time(&row.get::<_, String>(3)?)?,
        updated_at: parse_optional_time(row.get(4)?)?,
        deleted_at: parse_time(&row.get::<_, String>(5)?)?,
    })
}

#[cfg(test)]
mod tests {
    use super::{list_deleted, DELETED_OBJECTS_SQL};
    use crate::db::test_support::fixture;
    use crate::models::{EntityKind, Link, RecordInput};

    #[test]
    fn generated_query_covers_exactly_the_restorable_kinds() {
        let sql = DELETED_OBJECTS_SQL.as_str();
        assert_eq!(sql.matches("UNION ALL").count(), 25);
        assert!(sql.contains("SELECT 'users' AS kind"));
        assert!(!sql.contains("'product_fields'"));
        assert!(!sql.contains("'organization_relationships'"));
    }

    #[test]
    fn lists_deleted_rows_of_the_tenant_newest_first() {
        let fx = fixture();
        let other = fx.second_tenant();
        let workflow = fx.insert(EntityKind::Workflows, fx.owned("Sales"));
        let stage = fx.insert(
            EntityKind::Stages,
            RecordInput::named("Lead").with_link(Link::Workflow, &workflow.id),
        );
        let note = fx.insert(EntityKind::Notes, fx.owned("call back"));
        let alive = fx.insert(EntityKind::Notes, fx.owned("keep"));
        let foreign = fx.insert(
            EntityKind::Notes,
            RecordInput::named("theirs").with_link(Link::Company, &other),
        );

        fx.db.soft_delete(EntityKind::Stages, &stage.id).expect("delete stage");
        fx.db.soft_delete(EntityKind::Notes, &note.id).expect("delete note");
        fx.db.soft_delete(EntityKind::Notes, &foreign.id).expect("delete foreign");

        let deleted = fx.db.list_deleted(&fx.company_id).expect("list deleted");
        let ids: Vec<(EntityKind, &str)> = deleted.iter().map(|row| (row.kind, row.id.as_str())).collect();
        assert_eq!(
            ids,
            vec![(EntityKind::Notes, note.id.as_str()), (EntityKind::Stages, stage.id.as_str())]
        );
        assert!(deleted.iter().all(|row| row.id != alive.id));

        let theirs = fx.db.list_deleted(&other).expect("other tenant");
        assert_eq!(theirs.len(), 1);
        assert_eq!(theirs[0].id, foreign.id);
    }

    #[test]
    fn prices_and_memberships_are_labelled_from_related_rows() {
        let fx = fixture();
        let product = fx.insert(EntityKind::Products, fx.owned("Widget"));
        let price = fx.insert(
            EntityKind::Prices,
            RecordInput::default().with_link(Link::Product, &product.id),
        );
        let membership = fx.insert(EntityKind::CompanyUsers, fx.owned(""));
        fx.db.soft_delete(EntityKind::Prices, &price.id).expect("delete price");
        fx.db
            .soft_delete(EntityKind::CompanyUsers, &membership.id)
            .expect("delete membership");

        let deleted = fx
            .db
            .read(|conn| list_deleted(conn, &fx.company_id))
            .expect("list deleted");
        let label = |kind: EntityKind| {
            deleted
                .iter()
                .find(|row| row.kind == kind)
                .map(|row| row.name.clone())
                .expect("row present")
        };
        assert_eq!(label(EntityKind::Prices), "Widget");
        assert_eq!(label(EntityKind::CompanyUsers), "Ada");
    }

    #[test]
    fn restored_rows_leave_the_index() {
        let fx = fixture();
        let file = fx.insert(EntityKind::Files, fx.owned("contract.pdf"));
        fx.db.soft_delete(EntityKind::Files, &file.id).expect("delete file");
        assert_eq!(fx.db.list_deleted(&fx.company_id).expect("list").len(), 1);

        fx.db.restore("files", &file.id).expect("restore");
        assert!(fx.db.list_deleted(&fx.company_id).expect("list").is_empty());
    }
}
