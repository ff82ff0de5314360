//! Role model and the authorization oracle interface.
//!
//! Every privileged operation asks a [`RoleOracle`] whether a principal holds
//! a role within a context. The market, treasury and policy code only ever
//! see the trait; the concrete store lives in `riskpool-ledger`.

use serde::{Deserialize, Serialize};

use crate::{AccountId, EntityId, PolicyId};

/// Scope a role assignment applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum RoleContext {
    System,
    Entity(EntityId),
    Policy(PolicyId),
}

impl std::fmt::Display for RoleContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::System => write!(f, "system"),
            Self::Entity(id) => write!(f, "{id}"),
            Self::Policy(id) => write!(f, "{id}"),
        }
    }
}

/// Roles a principal can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum Role {
    /// Full control; may cancel untouched market offers and upgrade facets.
    SystemAdmin,
    /// May create entities.
    SystemManager,
    /// Manages an entity and its representatives.
    EntityAdmin,
    /// Acts on behalf of an entity.
    EntityRep,
    /// Created the policy; builds tranches and submits it for approval.
    PolicyOwner,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::SystemAdmin => "SYSTEM_ADMIN",
            Self::SystemManager => "SYSTEM_MANAGER",
            Self::EntityAdmin => "ENTITY_ADMIN",
            Self::EntityRep => "ENTITY_REP",
            Self::PolicyOwner => "POLICY_OWNER",
        };
        f.write_str(s)
    }
}

/// Authorization oracle.
pub trait RoleOracle {
    /// Does `principal` hold `role` in `context`?
    fn has_role(&self, context: RoleContext, principal: AccountId, role: Role) -> bool;

    /// Does `principal` hold any of `roles` in `context`?
    fn has_any_role(&self, context: RoleContext, principal: AccountId, roles: &[Role]) -> bool {
        roles
            .iter()
            .any(|role| self.has_role(context, principal, *role))
    }

    /// Admin or representative of `entity`.
    fn is_entity_rep(&self, entity: EntityId, principal: AccountId) -> bool {
        self.has_any_role(
            RoleContext::Entity(entity),
            principal,
            &[Role::EntityAdmin, Role::EntityRep],
        )
    }

    /// System admin.
    fn is_system_admin(&self, principal: AccountId) -> bool {
        self.has_role(RoleContext::System, principal, Role::SystemAdmin)
    }
}
