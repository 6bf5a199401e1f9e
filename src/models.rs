use crate::errors::AppError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Activities,
    ActivityFields,
    ActivityTypes,
    Categories,
    Companies,
    CompanyUsers,
    Contacts,
    Currencies,
    Files,
    Filters,
    Goals,
    NoteFields,
    Notes,
    OrganizationFields,
    OrganizationRelationships,
    Organizations,
    PersonFields,
    Persons,
    Prices,
    ProductFields,
    Products,
    PushNotifications,
    Stages,
    TaskFields,
    Tasks,
    TimeEntries,
    Users,
    Workflows,
}

impl EntityKind {
    pub const ALL: [EntityKind; 28] = [
        Self::Activities,
        Self::ActivityFields,
        Self::ActivityTypes,
        Self::Categories,
        Self::Companies,
        Self::CompanyUsers,
        Self::Contacts,
        Self::Currencies,
        Self::Files,
        Self::Filters,
        Self::Goals,
        Self::NoteFields,
        Self::Notes,
        Self::OrganizationFields,
        Self::OrganizationRelationships,
        Self::Organizations,
        Self::PersonFields,
        Self::Persons,
        Self::Prices,
        Self::ProductFields,
        Self::Products,
        Self::PushNotifications,
        Self::Stages,
        Self::TaskFields,
        Self::Tasks,
        Self::TimeEntries,
        Self::Users,
        Self::Workflows,
    ];

    /// Table name, which is also the wire name used by the deleted-objects API.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Activities => "activities",
            Self::ActivityFields => "activity_fields",
            Self::ActivityTypes => "activity_types",
            Self::Categories => "categories",
            Self::Companies => "companies",
            Self::CompanyUsers => "company_users",
            Self::Contacts => "contacts",
            Self::Currencies => "currencies",
            Self::Files => "files",
            Self::Filters => "filters",
            Self::Goals => "goals",
            Self::NoteFields => "note_fields",
            Self::Notes => "notes",
            Self::OrganizationFields => "organization_fields",
            Self::OrganizationRelationships => "organization_relationships",
            Self::Organizations => "organizations",
            Self::PersonFields => "person_fields",
            Self::Persons => "persons",
            Self::Prices => "prices",
            Self::ProductFields => "product_fields",
            Self::Products => "products",
            Self::PushNotifications => "push_notifications",
            Self::Stages => "stages",
            Self::TaskFields => "task_fields",
            Self::Tasks => "tasks",
            Self::TimeEntries => "time_entries",
            Self::Users => "users",
            Self::Workflows => "workflows",
        }
    }

    /// Whether `restore` accepts this kind.
    pub fn is_restorable(self) -> bool {
        !matches!(self, Self::OrganizationRelationships | Self::ProductFields)
    }

    pub fn restorable() -> impl Iterator<Item = EntityKind> {
        Self::ALL.into_iter().filter(|kind| kind.is_restorable())
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = AppError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == raw)
            .ok_or_else(|| AppError::InvalidKind(format!("Unknown entity kind '{}'", raw)))
    }
}

/// Link columns a record may carry. Each names the column and, for parent
/// links, the kind the column points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Link {
    Company,
    User,
    Person,
    Organization,
    Workflow,
    Stage,
    Product,
    Task,
}

impl Link {
    pub fn column(self) -> &'static str {
        match self {
            Self::Company => "company_id",
            Self::User => "user_id",
            Self::Person => "person_id",
            Self::Organization => "organization_id",
            Self::Workflow => "workflow_id",
            Self::Stage => "stage_id",
            Self::Product => "product_id",
            Self::Task => "task_id",
        }
    }

    /// Kind that must hold an active row in the same tenant for the link to
    /// be accepted. Company and user links are filled from the acting user.
    pub fn parent_kind(self) -> Option<EntityKind> {
        match self {
            Self::Company | Self::User => None,
            Self::Person => Some(EntityKind::Persons),
            Self::Organization => Some(EntityKind::Organizations),
            Self::Workflow => Some(EntityKind::Workflows),
            Self::Stage => Some(EntityKind::Stages),
            Self::Product => Some(EntityKind::Products),
            Self::Task => Some(EntityKind::Tasks),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimelineAction {
    Created,
    Updated,
    Deleted,
}

impl TimelineAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Deleted => "deleted",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Record {
    #[serde(rename = "type")]
    pub kind: EntityKind,
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub person_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Record {
    pub fn link(&self, link: Link) -> Option<&str> {
        match link {
            Link::Company => self.company_id.as_deref(),
            Link::User => self.user_id.as_deref(),
            Link::Person => self.person_id.as_deref(),
            Link::Organization => self.organization_id.as_deref(),
            Link::Workflow => self.workflow_id.as_deref(),
            Link::Stage => self.stage_id.as_deref(),
            Link::Product => self.product_id.as_deref(),
            Link::Task => self.task_id.as_deref(),
        }
    }

    pub(crate) fn set_link(&mut self, link: Link, value: Option<String>) {
        let slot = match link {
            Link::Company => &mut self.company_id,
            Link::User => &mut self.user_id,
            Link::Person => &mut self.person_id,
            Link::Organization => &mut self.organization_id,
            Link::Workflow => &mut self.workflow_id,
            Link::Stage => &mut self.stage_id,
            Link::Product => &mut self.product_id,
            Link::Task => &mut self.task_id,
        };
        *slot = value;
    }
}

/// Body of create and update requests. Fields a kind does not carry are ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordInput {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub company_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub person_id: Option<String>,
    #[serde(default)]
    pub organization_id: Option<String>,
    #[serde(default)]
    pub workflow_id: Option<String>,
    #[serde(default)]
    pub stage_id: Option<String>,
    #[serde(default)]
    pub product_id: Option<String>,
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
}

impl RecordInput {
    pub fn named(name: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            ..Self::default()
        }
    }

    pub fn with_link(mut self, link: Link, value: &str) -> Self {
        self.set_link(link, Some(value.to_string()));
        self
    }

    pub fn link(&self, link: Link) -> Option<&str> {
        let value = match link {
            Link::Company => self.company_id.as_deref(),
            Link::User => self.user_id.as_deref(),
            Link::Person => self.person_id.as_deref(),
            Link::Organization => self.organization_id.as_deref(),
            Link::Workflow => self.workflow_id.as_deref(),
            Link::Stage => self.stage_id.as_deref(),
            Link::Product => self.product_id.as_deref(),
            Link::Task => self.task_id.as_deref(),
        };
        value.filter(|raw| !raw.trim().is_empty())
    }

    pub fn set_link(&mut self, link: Link, value: Option<String>) {
        let slot = match link {
            Link::Company => &mut self.company_id,
            Link::User => &mut self.user_id,
            Link::Person => &mut self.person_id,
            Link::Organization => &mut self.organization_id,
            Link::Workflow => &mut self.workflow_id,
            Link::Stage => &mut self.stage_id,
            Link::Product => &mut self.product_id,
            Link::Task => &mut self.task_id,
        };
        *slot = value;
    }

    pub fn trimmed_name(&self) -> Option<&str> {
        self.name.as_deref().map(str::trim).filter(|name| !name.is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub active_company_id: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl User {
    /// Display name used by the timeline; falls back to the email address.
    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() {
            &self.email
        } else {
            &self.name
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterUserPayload {
    #[serde(default)]
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateMePayload {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub active_company_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeletedObject {
    #[serde(rename = "type")]
    pub kind: EntityKind,
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    pub deleted_at: DateTime<Utc>,
}

/// Restore request. `type` stays a raw string so unknown kinds reach the
/// whitelist check and are reported as `InvalidKind`. A missing `id` is taken
/// from the request path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestoreRequest {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimelineSubject {
    pub kind: EntityKind,
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimelineEntry {
    pub id: String,
    pub user_id: String,
    pub under_company_id: String,
    pub name: String,
    pub action: TimelineAction,
    pub subject: TimelineSubject,
    pub created_at: DateTime<Utc>,
    pub user_name: String,
}

#[derive(Debug, Clone)]
pub struct TimelineDraft {
    pub user_id: String,
    pub under_company_id: String,
    pub name: String,
    pub action: TimelineAction,
    pub subject: TimelineSubject,
}

/// Optional link filters on list requests, e.g. `?workflow_id=` for stages.
/// The company link is always the acting tenant and cannot be filtered on.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub person_id: Option<String>,
    #[serde(default, alias = "org_id")]
    pub organization_id: Option<String>,
    #[serde(default)]
    pub workflow_id: Option<String>,
    #[serde(default)]
    pub stage_id: Option<String>,
    #[serde(default)]
    pub product_id: Option<String>,
    #[serde(default)]
    pub task_id: Option<String>,
}

impl ListQuery {
    pub fn links(&self) -> Vec<(Link, &str)> {
        [
            (Link::User, &self.user_id),
            (Link::Person, &self.person_id),
            (Link::Organization, &self.organization_id),
            (Link::Workflow, &self.workflow_id),
            (Link::Stage, &self.stage_id),
            (Link::Product, &self.product_id),
            (Link::Task, &self.task_id),
        ]
        .into_iter()
        .filter_map(|(link, value)| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|raw| !raw.is_empty())
                .map(|raw| (link, raw))
        })
        .collect()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TimelineQuery {
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::{EntityKind, RecordInput, User};
    use chrono::Utc;

    #[test]
    fn whitelist_matches_restorable_kinds() {
        let restorable: Vec<&str> = EntityKind::restorable().map(EntityKind::as_str).collect();
        assert_eq!(restorable.len(), 26);
        assert!(!restorable.contains(&"product_fields"));
        assert!(!restorable.contains(&"organization_relationships"));
        for name in ["workflows", "time_entries", "users", "companies", "prices", "contacts"] {
            assert!(restorable.contains(&name), "{} should be restorable", name);
        }
    }

    #[test]
    fn kind_names_round_trip_through_serde_and_from_str() {
        for kind in EntityKind::ALL {
            let json = serde_json::to_string(&kind).expect("serialize kind");
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
            assert_eq!(kind.as_str().parse::<EntityKind>().expect("parse kind"), kind);
        }
        assert!("deals".parse::<EntityKind>().is_err());
    }

    #[test]
    fn blank_links_and_names_are_treated_as_missing() {
        let input = RecordInput {
            name: Some("   ".to_string()),
            person_id: Some(String::new()),
            ..RecordInput::default()
        };
        assert!(input.trimmed_name().is_none());
        assert!(input.link(super::Link::Person).is_none());
    }

    #[test]
    fn list_query_accepts_org_alias_and_skips_blank_values() {
        let query: super::ListQuery =
            serde_json::from_str(r#"{"org_id": "o1", "task_id": " ", "person_id": "p1"}"#).expect("query");
        assert_eq!(
            query.links(),
            vec![(super::Link::Person, "p1"), (super::Link::Organization, "o1")]
        );
    }

    #[test]
    fn display_name_falls_back_to_email() {
        let mut user = User {
            id: "u".to_string(),
            name: String::new(),
            email: "ada@example.com".to_string(),
            active_company_id: None,
            created_at: Utc::now(),
            updated_at: None,
            deleted_at: None,
        };
        assert_eq!(user.display_name(), "ada@example.com");
        user.name = "Ada".to_string();
        assert_eq!(user.display_name(), "Ada");
    }
}
