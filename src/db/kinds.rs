//! Static dispatch table from [`EntityKind`] to the table it lives in, how
//! its rows are scoped to a tenant and which link columns it carries.
//!
//! Every SQL fragment produced here is assembled from `&'static str` names in
//! this file; request input never reaches a table or column position.

use crate::models::{EntityKind, Link};

/// How rows of a table are attributed to a tenant. `?1` is the company id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TenantScope {
    /// The table has its own `company_id` column.
    Company,
    /// Scoped through a parent table that has a `company_id` column.
    Parent {
        column: &'static str,
        parent: EntityKind,
    },
    /// `column` holds a user id that must be a member of the tenant.
    Member { column: &'static str },
    /// The row is the tenant itself.
    Tenant,
}

#[derive(Debug, Clone, Copy)]
pub struct KindSpec {
    pub kind: EntityKind,
    pub scope: TenantScope,
    pub links: &'static [Link],
    pub required: &'static [Link],
    /// Expression projected as the display name in the deleted-objects index.
    label: Option<&'static str>,
    /// Carries `started_at` / `finished_at` timer columns.
    pub timer: bool,
}

const COMPANY_ONLY: &[Link] = &[Link::Company];
const COMPANY_AND_USER: &[Link] = &[Link::Company, Link::User];
const NONE: &[Link] = &[];

impl KindSpec {
    const fn owned(kind: EntityKind, links: &'static [Link]) -> Self {
        Self {
            kind,
            scope: TenantScope::Company,
            links,
            required: NONE,
            label: None,
            timer: false,
        }
    }

    pub fn table(&self) -> &'static str {
        self.kind.as_str()
    }

    pub fn label_sql(&self) -> String {
        match self.label {
            Some(expr) => expr.to_string(),
            None => format!("{}.name", self.table()),
        }
    }

    /// `WHERE` fragment restricting `table` to the tenant bound as `?1`.
    pub fn tenant_predicate(&self) -> String {
        let table = self.table();
        match self.scope {
            TenantScope::Company => format!("{}.company_id = ?1", table),
            TenantScope::Parent { column, parent } => format!(
                "{table}.{column} IN (SELECT id FROM {parent} WHERE company_id = ?1)",
                table = table,
                column = column,
                parent = parent.as_str(),
            ),
            TenantScope::Member { column } => format!(
                "{}.{} IN (SELECT user_id FROM company_users WHERE company_id = ?1)",
                table, column
            ),
            TenantScope::Tenant => format!("{}.id = ?1", table),
        }
    }

    /// Kinds whose display label is derived from a parent row do not need a
    /// name of their own.
    pub fn requires_name(&self) -> bool {
        self.label.is_none()
    }

    pub fn has_link(&self, link: Link) -> bool {
        self.links.contains(&link)
    }

    /// Column list shared by every select over this kind.
    pub fn select_columns(&self) -> String {
        let table = self.table();
        let mut columns = vec![
            format!("{}.id", table),
            format!("{}.name", table),
            format!("{}.created_at", table),
            format!("{}.updated_at", table),
            format!("{}.deleted_at", table),
        ];
        for link in self.links {
            columns.push(format!("{}.{}", table, link.column()));
        }
        if self.timer {
            columns.push(format!("{}.started_at", table));
            columns.push(format!("{}.finished_at", table));
        }
        columns.join(", ")
    }
}

pub fn kind_spec(kind: EntityKind) -> KindSpec {
    use EntityKind as K;
    match kind {
        K::Activities => KindSpec::owned(
            kind,
            &[Link::Company, Link::User, Link::Task, Link::Person, Link::Organization],
        ),
        K::ActivityFields => KindSpec::owned(kind, COMPANY_ONLY),
        K::ActivityTypes => KindSpec::owned(kind, COMPANY_ONLY),
        K::Categories => KindSpec::owned(kind, COMPANY_ONLY),
        K::Companies => KindSpec {
            scope: TenantScope::Tenant,
            ..KindSpec::owned(kind, NONE)
        },
        K::CompanyUsers => KindSpec {
            required: &[Link::User],
            label: Some(
                "COALESCE(NULLIF((SELECT users.name FROM users WHERE users.id = company_users.user_id), ''), company_users.name)",
            ),
            ..KindSpec::owned(kind, COMPANY_AND_USER)
        },
        K::Contacts => KindSpec {
            scope: TenantScope::Parent {
                column: "person_id",
                parent: K::Persons,
            },
            required: &[Link::Person],
            ..KindSpec::owned(kind, &[Link::Person])
        },
        K::Currencies => KindSpec::owned(kind, COMPANY_ONLY),
        K::Files => KindSpec {
            scope: TenantScope::Member { column: "user_id" },
            ..KindSpec::owned(kind, &[Link::User])
        },
        K::Filters => KindSpec::owned(kind, COMPANY_AND_USER),
        K::Goals => KindSpec::owned(kind, COMPANY_AND_USER),
        K::NoteFields => KindSpec::owned(kind, COMPANY_ONLY),
        K::Notes => KindSpec::owned(kind, &[Link::Company, Link::User, Link::Person]),
        K::OrganizationFields => KindSpec::owned(kind, COMPANY_ONLY),
        K::OrganizationRelationships => KindSpec::owned(kind, COMPANY_ONLY),
        K::Organizations => KindSpec::owned(kind, COMPANY_ONLY),
        K::PersonFields => KindSpec::owned(kind, COMPANY_ONLY),
        K::Persons => KindSpec::owned(kind, &[Link::Company, Link::Organization]),
        K::Prices => KindSpec {
            scope: TenantScope::Parent {
                column: "product_id",
                parent: K::Products,
            },
            required: &[Link::Product],
            label: Some(
                "COALESCE((SELECT products.name FROM products WHERE products.id = prices.product_id), prices.name)",
            ),
            ..KindSpec::owned(kind, &[Link::Product])
        },
        K::ProductFields => KindSpec::owned(kind, COMPANY_ONLY),
        K::Products => KindSpec::owned(kind, COMPANY_ONLY),
        K::PushNotifications => KindSpec::owned(kind, COMPANY_AND_USER),
        K::Stages => KindSpec {
            scope: TenantScope::Parent {
                column: "workflow_id",
                parent: K::Workflows,
            },
            required: &[Link::Workflow],
            ..KindSpec::owned(kind, &[Link::Workflow])
        },
        K::TaskFields => KindSpec::owned(kind, COMPANY_ONLY),
        K::Tasks => KindSpec {
            required: &[Link::Workflow],
            ..KindSpec::owned(
                kind,
                &[
                    Link::Company,
                    Link::User,
                    Link::Person,
                    Link::Organization,
                    Link::Workflow,
                    Link::Stage,
                ],
            )
        },
        K::TimeEntries => KindSpec {
            timer: true,
            ..KindSpec::owned(kind, &[Link::Company, Link::User, Link::Task])
        },
        K::Users => KindSpec {
            scope: TenantScope::Member { column: "id" },
            ..KindSpec::owned(kind, NONE)
        },
        K::Workflows => KindSpec::owned(kind, COMPANY_ONLY),
    }
}
