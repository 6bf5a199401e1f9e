//! Mutations and queries on behalf of an acting user. Every mutation writes
//! its timeline entry inside the same transaction as the change itself.

use crate::db::kinds::kind_spec;
use crate::db::{deleted_index, records, soft_delete, timeline, users, Database};
use crate::errors::{AppError, AppResult};
use crate::models::{
    DeletedObject, EntityKind, Link, ListQuery, Record, RecordInput, RegisterUserPayload, RestoreRequest, TimelineAction,
    TimelineDraft, TimelineEntry, TimelineQuery, TimelineSubject, UpdateMePayload, User,
};
use rusqlite::Connection;
use std::path::Path;
use std::sync::Arc;

#[derive(Clone)]
pub struct CrmService {
    db: Arc<Database>,
}

impl CrmService {
    pub fn new(db_path: &Path) -> AppResult<Self> {
        let db = Arc::new(Database::new(db_path)?);
        Ok(Self { db })
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn register_user(&self, payload: RegisterUserPayload) -> AppResult<User> {
        let user = self
            .db
            .transaction(|tx| users::insert_user(tx, &payload.name, &payload.email))?;
        tracing::info!(user_id = %user.id, "user registered");
        Ok(user)
    }

    /// Resolves the acting user; unknown or deleted users are unauthorized.
    pub fn authenticate(&self, user_id: &str) -> AppResult<User> {
        self.db
            .read(|conn| users::get_user(conn, user_id))?
            .ok_or_else(|| AppError::Unauthorized("unknown user".to_string()))
    }

    pub fn update_me(&self, actor: &User, payload: UpdateMePayload) -> AppResult<User> {
        self.db.transaction(|tx| {
            let mut user = actor.clone();
            if let Some(name) = payload.name.as_deref() {
                user = users::rename_user(tx, &actor.id, name)?;
            }
            if let Some(company_id) = payload.active_company_id.as_deref() {
                user = users::set_active_company(tx, &actor.id, company_id)?;
            }
            Ok(user)
        })
    }

    /// Creates a company with the actor as its admin member. The actor's
    /// active company is set when it had none.
    pub fn create_company(&self, actor: &User, input: RecordInput) -> AppResult<Record> {
        let name = input
            .trimmed_name()
            .ok_or_else(|| AppError::Validation("companies requires a name".to_string()))?
            .to_string();
        let company = self.db.transaction(|tx| {
            let company = users::insert_company(tx, &name)?;
            users::insert_membership(tx, &company.id, &actor.id, true)?;
            if actor.active_company_id.is_none() {
                users::set_active_company(tx, &actor.id, &company.id)?;
            }
            audit(tx, actor, &company.id, TimelineAction::Created, &company)?;
            Ok(company)
        })?;
        tracing::info!(company_id = %company.id, user_id = %actor.id, "company created");
        Ok(company)
    }

    pub fn create(&self, actor: &User, kind: EntityKind, input: RecordInput) -> AppResult<Record> {
        match kind {
            EntityKind::Companies => return self.create_company(actor, input),
            EntityKind::Users => {
                return Err(AppError::Validation(
                    "users are created through registration".to_string(),
                ))
            }
            _ => {}
        }
        let spec = kind_spec(kind);
        let record = self.db.transaction(|tx| {
            let tenant = users::acting_company(tx, actor)?;
            let mut input = input;
            if spec.has_link(Link::Company) {
                input.set_link(Link::Company, Some(tenant.clone()));
            }
            if spec.has_link(Link::User) && input.link(Link::User).is_none() {
                input.set_link(Link::User, Some(actor.id.clone()));
            }
            check_links(tx, kind, &tenant, &input)?;
            if spec.timer && input.finished_at.is_none() {
                if let Some(user_id) = input.link(Link::User) {
                    let stopped = records::stop_running_time_entries(tx, user_id)?;
                    if stopped > 0 {
                        tracing::debug!(user_id = %user_id, count = stopped, "stopped running time entries");
                    }
                }
            }
            let record = records::insert_record(tx, kind, &input)?;
            audit(tx, actor, &tenant, TimelineAction::Created, &record)?;
            Ok(record)
        })?;
        tracing::info!(kind = %kind, id = %record.id, user_id = %actor.id, "record created");
        Ok(record)
    }

    pub fn update(&self, actor: &User, kind: EntityKind, id: &str, input: RecordInput) -> AppResult<Record> {
        only_self(actor, kind, id)?;
        let record = self.db.transaction(|tx| {
            let tenant = users::acting_company(tx, actor)?;
            check_links(tx, kind, &tenant, &input)?;
            let record = records::update_record(tx, kind, &tenant, id, &input)?;
            audit(tx, actor, &tenant, TimelineAction::Updated, &record)?;
            Ok(record)
        })?;
        tracing::info!(kind = %kind, id = %record.id, user_id = %actor.id, "record updated");
        Ok(record)
    }

    pub fn get(&self, actor: &User, kind: EntityKind, id: &str) -> AppResult<Record> {
        self.db
            .read(|conn| {
                let tenant = users::acting_company(conn, actor)?;
                records::get_record(conn, kind, &tenant, id)
            })?
            .ok_or_else(|| AppError::NotFound(format!("{} {} not found", kind, id)))
    }

    /// Companies list every company the actor belongs to, so a client can
    /// pick one to switch to. Other kinds list the active tenant's rows.
    pub fn list(&self, actor: &User, kind: EntityKind, query: &ListQuery) -> AppResult<Vec<Record>> {
        if kind == EntityKind::Companies {
            return self.db.read(|conn| users::list_member_companies(conn, &actor.id));
        }
        self.db.read(|conn| {
            let tenant = users::acting_company(conn, actor)?;
            records::list_records(conn, kind, &tenant, &query.links())
        })
    }

    pub fn delete(&self, actor: &User, kind: EntityKind, id: &str) -> AppResult<()> {
        only_self(actor, kind, id)?;
        self.db.transaction(|tx| {
            let tenant = users::acting_company(tx, actor)?;
            let record = records::get_record_any_state(tx, kind, &tenant, id)?
                .ok_or_else(|| AppError::NotFound(format!("{} {} not found", kind, id)))?;
            soft_delete::soft_delete(tx, kind, id)?;
            audit(tx, actor, &tenant, TimelineAction::Deleted, &record)?;
            Ok(())
        })?;
        tracing::info!(kind = %kind, id = %id, user_id = %actor.id, "record deleted");
        Ok(())
    }

    /// Restores a whitelisted kind. Restores are logged but leave no
    /// timeline entry.
    pub fn restore(&self, actor: &User, request: &RestoreRequest) -> AppResult<EntityKind> {
        match self.db.restore(&request.kind, &request.id) {
            Ok(kind) => {
                tracing::info!(kind = %kind, id = %request.id, user_id = %actor.id, "record restored");
                Ok(kind)
            }
            Err(error) => {
                tracing::warn!(kind = %request.kind, id = %request.id, error = %error, "restore rejected");
                Err(error)
            }
        }
    }

    pub fn list_deleted(&self, actor: &User) -> AppResult<Vec<DeletedObject>> {
        self.db.read(|conn| {
            let tenant = users::acting_company(conn, actor)?;
            deleted_index::list_deleted(conn, &tenant)
        })
    }

    pub fn timeline(&self, actor: &User, query: &TimelineQuery) -> AppResult<Vec<TimelineEntry>> {
        let subject = match (query.kind.as_deref(), query.id.as_deref()) {
            (Some(kind), Some(id)) => Some((kind.parse::<EntityKind>()?, id)),
            (None, None) => None,
            _ => {
                return Err(AppError::Validation(
                    "timeline filter needs both kind and id".to_string(),
                ))
            }
        };
        self.db.read(|conn| {
            let tenant = users::acting_company(conn, actor)?;
            match subject {
                Some((kind, id)) => timeline::list_timeline_for_subject(conn, &tenant, kind, id),
                None => timeline::list_timeline(conn, &tenant),
            }
        })
    }
}

/// Users are only changed by themselves; membership of a shared tenant does
/// not let one user rename or delete another.
fn only_self(actor: &User, kind: EntityKind, id: &str) -> AppResult<()> {
    if kind == EntityKind::Users && id != actor.id {
        return Err(AppError::Unauthorized(
            "users can only change their own account".to_string(),
        ));
    }
    Ok(())
}

/// Links carried by the kind must point at rows of the same tenant. User
/// links name a member, except for memberships, which add one.
fn check_links(conn: &Connection, kind: EntityKind, tenant: &str, input: &RecordInput) -> AppResult<()> {
    let spec = kind_spec(kind);
    for link in spec.links.iter().copied() {
        let Some(value) = input.link(link) else {
            continue;
        };
        match link.parent_kind() {
            Some(parent) => {
                if records::get_record(conn, parent, tenant, value)?.is_none() {
                    return Err(AppError::NotFound(format!("{} {} not found", parent, value)));
                }
            }
            None if link == Link::User && kind == EntityKind::CompanyUsers => {
                if users::get_user(conn, value)?.is_none() {
                    return Err(AppError::NotFound(format!("users {} not found", value)));
                }
                if users::is_member(conn, tenant, value)? {
                    return Err(AppError::Validation(format!("user {} is already a member", value)));
                }
            }
            None if link == Link::User => {
                if !users::is_member(conn, tenant, value)? {
                    return Err(AppError::NotFound(format!("users {} not found", value)));
                }
            }
            None => {}
        }
    }
    Ok(())
}

fn audit(
    conn: &Connection,
    actor: &User,
    tenant: &str,
    action: TimelineAction,
    record: &Record,
) -> AppResult<TimelineEntry> {
    let member_email = match (record.kind, record.user_id.as_deref()) {
        (EntityKind::CompanyUsers, Some(user_id)) => users::user_email(conn, user_id)?,
        _ => None,
    };
    let name = match member_email {
        Some(email) => email,
        None if record.name.trim().is_empty() => record.kind.as_str().to_string(),
        None => record.name.clone(),
    };
    timeline::insert_timeline(
        conn,
        &TimelineDraft {
            user_id: actor.id.clone(),
            under_company_id: tenant.to_string(),
            name,
            action,
            subject: TimelineSubject {
                kind: record.kind,
                id: record.id.clone(),
            },
        },
    )
}
