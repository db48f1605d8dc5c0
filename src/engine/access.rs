//! Edit/delete/create capability checks.
//!
//! All decisions come from one static rule table keyed by
//! `(access level, entity kind)`. Callers pass the acting user explicitly.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::db::models::AccessLevel;
use crate::error::AppError;

/// Identity used for mutations performed by the background scheduler.
pub const SYSTEM_USER_ID: &str = "system";

/// The user performing an operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ActorContext {
    pub user_id: String,
    pub access_level: AccessLevel,
}

impl ActorContext {
    pub fn new(user_id: impl Into<String>, access_level: AccessLevel) -> Self {
        Self {
            user_id: user_id.into(),
            access_level,
        }
    }

    /// Actor for scheduler-driven work.
    pub fn system() -> Self {
        Self::new(SYSTEM_USER_ID, AccessLevel::SuperAdmin)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum EntityKind {
    TeamMember,
    Department,
    Task,
    TaskInstance,
    RecurringTask,
    Customer,
    Activity,
}

impl EntityKind {
    /// Value stored in `team_activity.entity_type`.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::TeamMember => "team_member",
            EntityKind::Department => "department",
            EntityKind::Task => "task",
            EntityKind::TaskInstance => "task_instance",
            EntityKind::RecurringTask => "recurring_task",
            EntityKind::Customer => "customer",
            EntityKind::Activity => "activity",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "team_member" => Some(EntityKind::TeamMember),
            "department" => Some(EntityKind::Department),
            "task" => Some(EntityKind::Task),
            "task_instance" => Some(EntityKind::TaskInstance),
            "recurring_task" => Some(EntityKind::RecurringTask),
            "customer" => Some(EntityKind::Customer),
            "activity" => Some(EntityKind::Activity),
            _ => None,
        }
    }
}

/// How far a permission extends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reach {
    None,
    /// Only records the actor owns (themselves, or assigned to them).
    Own,
    Any,
}

/// The target of an edit or delete, with the ownership facts the rules need.
#[derive(Debug, Clone, Copy)]
pub enum Resource<'a> {
    TeamMember { id: &'a str, access_level: AccessLevel },
    Department,
    Task { assignee_id: Option<&'a str> },
    TaskInstance { assignee_id: Option<&'a str> },
    RecurringTask { assignee_id: Option<&'a str> },
    Customer { assigned_to: Option<&'a str> },
    Activity,
}

impl Resource<'_> {
    pub fn kind(&self) -> EntityKind {
        match self {
            Resource::TeamMember { .. } => EntityKind::TeamMember,
            Resource::Department => EntityKind::Department,
            Resource::Task { .. } => EntityKind::Task,
            Resource::TaskInstance { .. } => EntityKind::TaskInstance,
            Resource::RecurringTask { .. } => EntityKind::RecurringTask,
            Resource::Customer { .. } => EntityKind::Customer,
            Resource::Activity => EntityKind::Activity,
        }
    }

    fn owner(&self) -> Option<&str> {
        match self {
            Resource::TeamMember { id, .. } => Some(*id),
            Resource::Task { assignee_id }
            | Resource::TaskInstance { assignee_id }
            | Resource::RecurringTask { assignee_id } => *assignee_id,
            Resource::Customer { assigned_to } => *assigned_to,
            Resource::Department | Resource::Activity => None,
        }
    }
}

struct Rule {
    level: AccessLevel,
    kind: EntityKind,
    edit: Reach,
    delete: Reach,
}

const fn rule(level: AccessLevel, kind: EntityKind, edit: Reach, delete: Reach) -> Rule {
    Rule { level, kind, edit, delete }
}

use AccessLevel as L;
use EntityKind as K;

/// Anything not listed is denied.
static RULES: &[Rule] = &[
    rule(L::SuperAdmin, K::TeamMember, Reach::Any, Reach::Any),
    rule(L::SuperAdmin, K::Department, Reach::Any, Reach::Any),
    rule(L::SuperAdmin, K::Task, Reach::Any, Reach::Any),
    rule(L::SuperAdmin, K::TaskInstance, Reach::Any, Reach::Any),
    rule(L::SuperAdmin, K::RecurringTask, Reach::Any, Reach::Any),
    rule(L::SuperAdmin, K::Customer, Reach::Any, Reach::Any),
    rule(L::Admin, K::TeamMember, Reach::Any, Reach::Any),
    rule(L::Admin, K::Department, Reach::Any, Reach::Any),
    rule(L::Admin, K::Task, Reach::Any, Reach::Any),
    rule(L::Admin, K::TaskInstance, Reach::Any, Reach::Any),
    rule(L::Admin, K::RecurringTask, Reach::Any, Reach::Any),
    rule(L::Admin, K::Customer, Reach::Any, Reach::Any),
    rule(L::Supervisor, K::TeamMember, Reach::Own, Reach::None),
    rule(L::Supervisor, K::Task, Reach::Any, Reach::Any),
    rule(L::Supervisor, K::TaskInstance, Reach::Any, Reach::Any),
    rule(L::Supervisor, K::RecurringTask, Reach::Any, Reach::Any),
    rule(L::Supervisor, K::Customer, Reach::Any, Reach::None),
    rule(L::User, K::TeamMember, Reach::Own, Reach::None),
    rule(L::User, K::Task, Reach::Own, Reach::None),
    rule(L::User, K::TaskInstance, Reach::Own, Reach::None),
    rule(L::User, K::RecurringTask, Reach::Own, Reach::None),
    rule(L::User, K::Customer, Reach::Own, Reach::None),
];

fn lookup(level: AccessLevel, kind: EntityKind) -> (Reach, Reach) {
    RULES
        .iter()
        .find(|r| r.level == level && r.kind == kind)
        .map(|r| (r.edit, r.delete))
        .unwrap_or((Reach::None, Reach::None))
}

fn reach_allows(reach: Reach, resource: &Resource, actor: &ActorContext) -> bool {
    match reach {
        Reach::Any => true,
        Reach::Own => resource.owner() == Some(actor.user_id.as_str()),
        Reach::None => false,
    }
}

/// A SuperAdmin member can only be touched by another SuperAdmin.
fn protected(resource: &Resource, actor: &ActorContext) -> bool {
    matches!(
        resource,
        Resource::TeamMember { access_level: AccessLevel::SuperAdmin, .. }
    ) && actor.access_level != AccessLevel::SuperAdmin
}

pub fn can_edit(resource: &Resource, actor: &ActorContext) -> bool {
    if protected(resource, actor) {
        return false;
    }
    let (edit, _) = lookup(actor.access_level, resource.kind());
    reach_allows(edit, resource, actor)
}

pub fn can_delete(resource: &Resource, actor: &ActorContext) -> bool {
    if protected(resource, actor) {
        return false;
    }
    let (_, delete) = lookup(actor.access_level, resource.kind());
    reach_allows(delete, resource, actor)
}

pub fn can_create(kind: EntityKind, actor: &ActorContext) -> bool {
    match actor.access_level {
        AccessLevel::SuperAdmin | AccessLevel::Admin => kind != EntityKind::Activity,
        AccessLevel::Supervisor => matches!(
            kind,
            EntityKind::Task | EntityKind::RecurringTask | EntityKind::Customer
        ),
        AccessLevel::User => matches!(kind, EntityKind::Task | EntityKind::Customer),
    }
}

/// Changing a member's level needs unrestricted member edit rights;
/// granting or revoking SuperAdmin needs SuperAdmin.
pub fn can_set_access_level(
    current: AccessLevel,
    requested: AccessLevel,
    actor: &ActorContext,
) -> bool {
    let (edit, _) = lookup(actor.access_level, EntityKind::TeamMember);
    if edit != Reach::Any {
        return false;
    }
    if current == AccessLevel::SuperAdmin || requested == AccessLevel::SuperAdmin {
        return actor.access_level == AccessLevel::SuperAdmin;
    }
    true
}

// ---------------------------------------------------------------------------
// Result-returning guards used by commands
// ---------------------------------------------------------------------------

fn denied(action: &str, kind: EntityKind, actor: &ActorContext) -> AppError {
    tracing::warn!(
        user_id = %actor.user_id,
        level = actor.access_level.as_str(),
        action,
        entity = kind.as_str(),
        "Permission denied"
    );
    AppError::Forbidden(format!("{} may not {action} {}", actor.access_level.as_str(), kind.as_str()))
}

pub fn authorize_edit(resource: &Resource, actor: &ActorContext) -> Result<(), AppError> {
    if can_edit(resource, actor) {
        Ok(())
    } else {
        Err(denied("edit", resource.kind(), actor))
    }
}

pub fn authorize_delete(resource: &Resource, actor: &ActorContext) -> Result<(), AppError> {
    if can_delete(resource, actor) {
        Ok(())
    } else {
        Err(denied("delete", resource.kind(), actor))
    }
}

pub fn authorize_create(kind: EntityKind, actor: &ActorContext) -> Result<(), AppError> {
    if can_create(kind, actor) {
        Ok(())
    } else {
        Err(denied("create", kind, actor))
    }
}

/// Guard for changing a member's access level.
pub fn authorize_access_change(
    current: AccessLevel,
    requested: AccessLevel,
    actor: &ActorContext,
) -> Result<(), AppError> {
    if can_set_access_level(current, requested, actor) {
        Ok(())
    } else {
        Err(denied("change the access level of", EntityKind::TeamMember, actor))
    }
}
