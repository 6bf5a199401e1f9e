use super::kinds::kind_spec;
use super::records::{get_record, insert_record, parse_record_row};
use super::{now, parse_optional_time, parse_time};
use crate::errors::{AppError, AppResult};
use crate::models::{EntityKind, Record, RecordInput, User};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

const USER_COLUMNS: &str = "id, name, email, active_company_id, created_at, updated_at, deleted_at";

pub fn insert_user(conn: &Connection, name: &str, email: &str) -> AppResult<User> {
    let email = email.trim();
    if email.is_empty() || !email.contains('@') {
        return Err(AppError::Validation("a valid email is required".to_string()));
    }
    let taken: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM users WHERE email = ?1",
        [email],
        |row| row.get(0),
    )?;
    if taken {
        return Err(AppError::Validation(format!("{} is already registered", email)));
    }

    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO users (id, name, email, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![id, name.trim(), email, now()],
    )?;
    get_user(conn, &id)?.ok_or_else(|| AppError::Internal(format!("user {} could not be read back", id)))
}

/// Active user by id; soft-deleted users cannot act.
pub fn get_user(conn: &Connection, id: &str) -> AppResult<Option<User>> {
    let sql = format!("SELECT {} FROM users WHERE id = ?1 AND deleted_at IS NULL", USER_COLUMNS);
    conn.query_row(&sql, [id], parse_user_row)
        .optional()
        .map_err(AppError::from)
}

pub fn rename_user(conn: &Connection, id: &str, name: &str) -> AppResult<User> {
    conn.execute(
        "UPDATE users SET name = ?1, updated_at = ?2 WHERE id = ?3",
        params![name.trim(), now(), id],
    )?;
    get_user(conn, id)?.ok_or_else(|| AppError::NotFound(format!("user {} not found", id)))
}

pub fn insert_company(conn: &Connection, name: &str) -> AppResult<Record> {
    insert_record(conn, EntityKind::Companies, &RecordInput::named(name))
}

pub fn insert_membership(conn: &Connection, company_id: &str, user_id: &str, is_admin: bool) -> AppResult<String> {
    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO company_users (id, name, company_id, user_id, is_admin, created_at)
         VALUES (?1, '', ?2, ?3, ?4, ?5)",
        params![id, company_id, user_id, is_admin, now()],
    )?;
    Ok(id)
}

pub fn is_member(conn: &Connection, company_id: &str, user_id: &str) -> AppResult<bool> {
    let member: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM company_users
         WHERE company_id = ?1 AND user_id = ?2 AND deleted_at IS NULL",
        params![company_id, user_id],
        |row| row.get(0),
    )?;
    Ok(member)
}

/// Company the user acts in, re-checked on every request: the user must still
/// be a member and the company must not be deleted.
pub fn acting_company(conn: &Connection, user: &User) -> AppResult<String> {
    let company_id = user
        .active_company_id
        .as_deref()
        .ok_or_else(|| AppError::Validation("no active company selected".to_string()))?;
    if !is_member(conn, company_id, &user.id)? {
        return Err(AppError::Unauthorized(format!(
            "not a member of company {}",
            company_id
        )));
    }
    if get_record(conn, EntityKind::Companies, company_id, company_id)?.is_none() {
        return Err(AppError::Unauthorized(format!("company {} is deleted", company_id)));
    }
    Ok(company_id.to_string())
}

/// Active companies the user is an active member of, by name.
pub fn list_member_companies(conn: &Connection, user_id: &str) -> AppResult<Vec<Record>> {
    let spec = kind_spec(EntityKind::Companies);
    let sql = format!(
        "SELECT {} FROM companies
         JOIN company_users ON company_users.company_id = companies.id
         WHERE company_users.user_id = ?1
           AND company_users.deleted_at IS NULL
           AND companies.deleted_at IS NULL
         ORDER BY companies.name ASC, companies.id ASC",
        spec.select_columns()
    );
    let mut statement = conn.prepare(&sql)?;
    let rows = statement.query_map([user_id], |row| parse_record_row(&spec, row))?;
    let mut result = Vec::new();
    for row in rows {
        result.push(row?);
    }
    Ok(result)
}

/// Email of any user, deleted or not.
pub fn user_email(conn: &Connection, id: &str) -> AppResult<Option<String>> {
    conn.query_row("SELECT email FROM users WHERE id = ?1", [id], |row| row.get(0))
        .optional()
        .map_err(AppError::from)
}

/// Switches the company the user acts in. Only active companies the user is
/// a member of are accepted.
pub fn set_active_company(conn: &Connection, user_id: &str, company_id: &str) -> AppResult<User> {
    if !is_member(conn, company_id, user_id)? {
        return Err(AppError::Unauthorized(format!(
            "not a member of company {}",
            company_id
        )));
    }
    if get_record(conn, EntityKind::Companies, company_id, company_id)?.is_none() {
        return Err(AppError::NotFound(format!("companies {} not found", company_id)));
    }
    conn.execute(
        "UPDATE users SET active_company_id = ?1, updated_at = ?2 WHERE id = ?3",
        params![company_id, now(), user_id],
    )?;
    get_user(conn, user_id)?.ok_or_else(|| AppError::NotFound(format!("user {} not found", user_id)))
}

fn parse_user_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        active_company_id: row.get(3)?,
        created_at: parse_time(&row.get::<_, String>(4)?)?,
        updated_at: parse_optional_time(row.get(5)?)?,
        deleted_at: parse_optional_time(row.get(6)?)?,
    })
}
