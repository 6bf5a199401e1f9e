use super::kinds::{kind_spec, KindSpec};
use super::{format_time, now, parse_optional_time, parse_time};
use crate::errors::{AppError, AppResult};
use crate::models::{EntityKind, Link, Record, RecordInput};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

pub fn insert_record(conn: &Connection, kind: EntityKind, input: &RecordInput) -> AppResult<Record> {
    if kind == EntityKind::Users {
        return Err(AppError::Validation(
            "users are created through registration".to_string(),
        ));
    }
    let spec = kind_spec(kind);
    let name = match input.trimmed_name() {
        Some(name) => name.to_string(),
        None if spec.requires_name() => {
            return Err(AppError::Validation(format!("{} requires a name", kind)));
        }
        None => String::new(),
    };
    for link in spec.required {
        if input.link(*link).is_none() {
            return Err(AppError::Validation(format!("{} requires {}", kind, link.column())));
        }
    }

    let id = Uuid::new_v4().to_string();
    let created_at = now();
    let mut columns = vec!["id", "name", "created_at"];
    let mut values: Vec<Option<String>> = vec![Some(id.clone()), Some(name), Some(created_at)];
    for link in spec.links {
        columns.push(link.column());
        values.push(input.link(*link).map(ToString::to_string));
    }
    if spec.timer {
        let started_at = input.started_at.map(format_time).unwrap_or_else(now);
        columns.push("started_at");
        values.push(Some(started_at));
        columns.push("finished_at");
        values.push(input.finished_at.map(format_time));
    }

    let placeholders: Vec<String> = (1..=columns.len()).map(|idx| format!("?{}", idx)).collect();
    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        spec.table(),
        columns.join(", "),
        placeholders.join(", ")
    );
    conn.execute(&sql, rusqlite::params_from_iter(values.iter()))?;

    find_record(conn, kind, &id)?
        .ok_or_else(|| AppError::Internal(format!("inserted {} {} could not be read back", kind, id)))
}

/// Active record of `kind` visible to the tenant.
pub fn get_record(conn: &Connection, kind: EntityKind, company_id: &str, id: &str) -> AppResult<Option<Record>> {
    scoped_lookup(conn, kind, company_id, id, true)
}

/// Like [`get_record`] but also returns soft-deleted rows.
pub fn get_record_any_state(
    conn: &Connection,
    kind: EntityKind,
    company_id: &str,
    id: &str,
) -> AppResult<Option<Record>> {
    scoped_lookup(conn, kind, company_id, id, false)
}

fn scoped_lookup(
    conn: &Connection,
    kind: EntityKind,
    company_id: &str,
    id: &str,
    active_only: bool,
) -> AppResult<Option<Record>> {
    let spec = kind_spec(kind);
    let mut sql = format!(
        "SELECT {} FROM {} WHERE {} AND {}.id = ?2",
        spec.select_columns(),
        spec.table(),
        spec.tenant_predicate(),
        spec.table(),
    );
    if active_only {
        sql.push_str(&format!(" AND {}.deleted_at IS NULL", spec.table()));
    }
    conn.query_row(&sql, params![company_id, id], |row| parse_record_row(&spec, row))
        .optional()
        .map_err(AppError::from)
}

/// Row lookup by id with no tenant or deletion filter.
pub fn find_record(conn: &Connection, kind: EntityKind, id: &str) -> AppResult<Option<Record>> {
    let spec = kind_spec(kind);
    let sql = format!(
        "SELECT {} FROM {} WHERE {}.id = ?1",
        spec.select_columns(),
        spec.table(),
        spec.table()
    );
    conn.query_row(&sql, [id], |row| parse_record_row(&spec, row))
        .optional()
        .map_err(AppError::from)
}

/// Active records of the tenant, optionally narrowed to rows whose link
/// columns equal the given ids. Filtering on a link the kind does not carry
/// is a validation error.
pub fn list_records(
    conn: &Connection,
    kind: EntityKind,
    company_id: &str,
    filters: &[(Link, &str)],
) -> AppResult<Vec<Record>> {
    let spec = kind_spec(kind);
    let mut sql = format!(
        "SELECT {} FROM {} WHERE {} AND {}.deleted_at IS NULL",
        spec.select_columns(),
        spec.table(),
        spec.tenant_predicate(),
        spec.table(),
    );
    let mut values: Vec<&str> = vec![company_id];
    for (link, value) in filters {
        if *link == Link::Company || !spec.has_link(*link) {
            return Err(AppError::Validation(format!(
                "{} cannot be filtered by {}",
                kind,
                link.column()
            )));
        }
        values.push(*value);
        sql.push_str(&format!(" AND {}.{} = ?{}", spec.table(), link.column(), values.len()));
    }
    sql.push_str(&format!(
        " ORDER BY {}.created_at ASC, {}.name ASC",
        spec.table(),
        spec.table()
    ));

    let mut statement = conn.prepare(&sql)?;
    let rows = statement.query_map(rusqlite::params_from_iter(values.iter()), |row| {
        parse_record_row(&spec, row)
    })?;
    let mut result = Vec::new();
    for row in rows {
        result.push(row?);
    }
    Ok(result)
}

/// Applies the fields present in `input` to an active record. The company
/// link is never moved; a record stays in the tenant it was created in.
pub fn update_record(
    conn: &Connection,
    kind: EntityKind,
    company_id: &str,
    id: &str,
    input: &RecordInput,
) -> AppResult<Record> {
    let spec = kind_spec(kind);
    let mut record = get_record(conn, kind, company_id, id)?
        .ok_or_else(|| AppError::NotFound(format!("{} {} not found", kind, id)))?;

    if let Some(raw) = input.name.as_deref() {
        let trimmed = raw.trim();
        if trimmed.is_empty() && spec.requires_name() {
            return Err(AppError::Validation(format!("{} requires a name", kind)));
        }
        record.name = trimmed.to_string();
    }
    for link in spec.links.iter().copied().filter(|link| *link != Link::Company) {
        if let Some(value) = input.link(link) {
            record.set_link(link, Some(value.to_string()));
        }
    }
    if spec.timer {
        if let Some(started_at) = input.started_at {
            record.started_at = Some(started_at);
        }
        if let Some(finished_at) = input.finished_at {
            record.finished_at = Some(finished_at);
        }
    }

    let mut assignments = vec!["name = ?1".to_string(), "updated_at = ?2".to_string()];
    let mut values: Vec<Option<String>> = vec![Some(record.name.clone()), Some(now())];
    for link in spec.links {
        values.push(record.link(*link).map(ToString::to_string));
        assignments.push(format!("{} = ?{}", link.column(), values.len()));
    }
    if spec.timer {
        values.push(record.started_at.map(format_time));
        assignments.push(format!("started_at = ?{}", values.len()));
        values.push(record.finished_at.map(format_time));
        assignments.push(format!("finished_at = ?{}", values.len()));
    }
    values.push(Some(id.to_string()));
    let sql = format!(
        "UPDATE {} SET {} WHERE id = ?{}",
        spec.table(),
        assignments.join(", "),
        values.len()
    );
    conn.execute(&sql, rusqlite::params_from_iter(values.iter()))?;

    find_record(conn, kind, id)?.ok_or_else(|| AppError::NotFound(format!("{} {} not found", kind, id)))
}

/// Finishes every running, non-deleted time entry of the user.
pub fn stop_running_time_entries(conn: &Connection, user_id: &str) -> AppResult<usize> {
    let stopped = conn.execute(
        "UPDATE time_entries SET finished_at = ?1
         WHERE user_id = ?2 AND finished_at IS NULL AND deleted_at IS NULL",
        params![now(), user_id],
    )?;
    Ok(stopped)
}

pub(crate) fn parse_record_row(spec: &KindSpec, row: &rusqlite::Row<'_>) -> rusqlite::Result<Record> {
    let mut record = Record {
        kind: spec.kind,
        id: row.get(0)?,
        name: row.get(1)?,
        company_id: None,
        user_id: None,
        person_id: None,
        organization_id: None,
        workflow_id: None,
        stage_id: None,
        product_id: None,
        task_id: None,
        started_at: None,
        finished_at: None,
        created_at: parse_time(&row.get::<_, String>(2)?)?,
        updated_at: parse_optional_time(row.get(3)?)?,
        deleted_at: parse_optional_time(row.get(4)?)?,
    };
    let mut idx = 5;
    for link in spec.links {
        record.set_link(*link, row.get(idx)?);
        idx += 1;
    }
    if spec.timer {
        record.started_at = parse_optional_time(row.get(idx)?)?;
        record.finished_at = parse_optional_time(row.get(idx + 1)?)?;
    }
    Ok(record)
}
