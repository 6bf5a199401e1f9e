use super::{now, parse_kind, parse_time};
use crate::errors::{AppError, AppResult};
use crate::models::{EntityKind, TimelineAction, TimelineDraft, TimelineEntry, TimelineSubject};
use rusqlite::{params, Connection};
use uuid::Uuid;

const TIMELINE_SELECT: &str = "SELECT timeline.id, timeline.user_id, timeline.under_company_id, timeline.name,
        timeline.action, timeline.subject_kind, timeline.subject_id, timeline.created_at,
        CASE WHEN users.name IS NULL OR users.name = '' THEN COALESCE(users.email, '') ELSE users.name END
    FROM timeline
    LEFT JOIN users ON users.id = timeline.user_id";

/// Appends one entry. Entries are never updated or removed afterwards.
pub fn insert_timeline(conn: &Connection, draft: &TimelineDraft) -> AppResult<TimelineEntry> {
    if draft.user_id.trim().is_empty() || draft.under_company_id.trim().is_empty() {
        return Err(AppError::Validation(
            "timeline entries need an acting user and a company".to_string(),
        ));
    }
    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO timeline (id, user_id, under_company_id, name, action, subject_kind, subject_id, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            id,
            draft.user_id,
            draft.under_company_id,
            draft.name,
            draft.action.as_str(),
            draft.subject.kind.as_str(),
            draft.subject.id,
            now(),
        ],
    )?;

    let sql = format!("{} WHERE timeline.id = ?1", TIMELINE_SELECT);
    conn.query_row(&sql, [&id], parse_timeline_row).map_err(AppError::from)
}

pub fn list_timeline(conn: &Connection, company_id: &str) -> AppResult<Vec<TimelineEntry>> {
    let sql = format!(
        "{} WHERE timeline.under_company_id = ?1 ORDER BY timeline.created_at DESC, timeline.rowid DESC",
        TIMELINE_SELECT
    );
    let mut statement = conn.prepare(&sql)?;
    let rows = statement.query_map([company_id], parse_timeline_row)?;
    let mut result = Vec::new();
    for row in rows {
        result.push(row?);
    }
    Ok(result)
}

pub fn list_timeline_for_subject(
    conn: &Connection,
    company_id: &str,
    kind: EntityKind,
    id: &str,
) -> AppResult<Vec<TimelineEntry>> {
    let sql = format!(
        "{} WHERE timeline.under_company_id = ?1 AND timeline.subject_kind = ?2 AND timeline.subject_id = ?3
         ORDER BY timeline.created_at DESC, timeline.rowid DESC",
        TIMELINE_SELECT
    );
    let mut statement = conn.prepare(&sql)?;
    let rows = statement.query_map(params![company_id, kind.as_str(), id], parse_timeline_row)?;
    let mut result = Vec::new();
    for row in rows {
        result.push(row?);
    }
    Ok(result)
}

fn parse_action(raw: &str) -> rusqlite::Result<TimelineAction> {
    match raw {
        "created" => Ok(TimelineAction::Created),
        "updated" => Ok(TimelineAction::Updated),
        "deleted" => Ok(TimelineAction::Deleted),
        other => Err(rusqlite::Error::FromSqlConversionFailure(
            4,
            rusqlite::types::Type::Text,
            Box::new(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("unknown timeline action '{}'", other),
            )),
        )),
    }
}

fn parse_timeline_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<TimelineEntry> {
    Ok(TimelineEntry {
        id: row.get(0)?,
        user_id: row.get(1)?,
        under_company_id: row.get(2)?,
        name: row.get(3)?,
        action: parse_action(&row.get::<_, String>(4)?)?,
        subject: TimelineSubject {
            kind: parse_kind(&row.get::<_, String>(5)?)?,
            id: row.get(6)?,
        },
        created_at: parse_time(&row.get::<_, String>(7)?)?,
        user_name: row.get(8)?,
    })
}

#[cfg(test)]
mod tests {
    use super::{insert_timeline, list_timeline, list_timeline_for_subject};
    use crate::db::test_support::fixture;
    use crate::errors::AppError;
    use crate::models::{EntityKind, TimelineAction, TimelineDraft, TimelineSubject};

    fn draft(user_id: &str, company_id: &str, action: TimelineAction, id: &str) -> TimelineDraft {
        TimelineDraft {
            user_id: user_id.to_string(),
            under_company_id: company_id.to_string(),
            name: "Call".to_string(),
            action,
            subject: TimelineSubject {
                kind: EntityKind::Tasks,
                id: id.to_string(),
            },
        }
    }

    #[test]
    fn entries_are_listed_newest_first_per_company() {
        let fx = fixture();
        let other = fx.second_tenant();
        let user = fx.user.id.clone();
        fx.db
            .record_timeline(&draft(&user, &fx.company_id, TimelineAction::Created, "t1"))
            .expect("created");
        fx.db
            .record_timeline(&draft(&user, &fx.company_id, TimelineAction::Deleted, "t1"))
            .expect("deleted");
        fx.db
            .record_timeline(&draft(&user, &other, TimelineAction::Created, "t2"))
            .expect("foreign");

        let entries = fx.db.list_timeline(&fx.company_id).expect("list");
        let actions: Vec<TimelineAction> = entries.iter().map(|entry| entry.action).collect();
        assert_eq!(actions, vec![TimelineAction::Deleted, TimelineAction::Created]);
        assert!(entries.iter().all(|entry| entry.under_company_id == fx.company_id));
        assert_eq!(entries[0].user_name, "Ada");
    }

    #[test]
    fn subject_filter_returns_only_that_record() {
        let fx = fixture();
        let user = fx.user.id.clone();
        fx.db
            .transaction(|tx| {
                insert_timeline(tx, &draft(&user, &fx.company_id, TimelineAction::Created, "t1"))?;
                insert_timeline(tx, &draft(&user, &fx.company_id, TimelineAction::Created, "t2"))?;
                insert_timeline(tx, &draft(&user, &fx.company_id, TimelineAction::Updated, "t1"))
            })
            .expect("seed");

        let entries = fx
            .db
            .read(|conn| list_timeline_for_subject(conn, &fx.company_id, EntityKind::Tasks, "t1"))
            .expect("subject");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].action, TimelineAction::Updated);
        assert!(entries.iter().all(|entry| entry.subject.id == "t1"));

        let all = fx.db.read(|conn| list_timeline(conn, &fx.company_id)).expect("all");
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn user_name_falls_back_to_email() {
        let fx = fixture();
        fx.db
            .transaction(|tx| {
                tx.execute("UPDATE users SET name = '' WHERE id = ?1", [&fx.user.id])?;
                Ok(())
            })
            .expect("blank name");
        let entry = fx
            .db
            .record_timeline(&draft(&fx.user.id, &fx.company_id, TimelineAction::Created, "t1"))
            .expect("insert");
        assert_eq!(entry.user_name, "ada@example.com");
    }

    #[test]
    fn drafts_without_company_are_rejected() {
        let fx = fixture();
        let err = fx
            .db
            .record_timeline(&draft(&fx.user.id, "", TimelineAction::Created, "t1"))
            .expect_err("missing company");
        assert!(matches!(err, AppError::Validation(_)));
    }
}
