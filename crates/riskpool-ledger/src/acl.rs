//! Role assignments.
//!
//! A flat set of `(context, principal, role)` triples. The store answers
//! [`RoleOracle`] queries for every other plane.

use std::collections::BTreeSet;

use riskpool_types::{AccountId, Result, RiskpoolError, Role, RoleContext, RoleOracle};

/// In-memory role store.
#[derive(Debug, Clone, Default)]
pub struct AclStore {
    assignments: BTreeSet<(RoleContext, AccountId, Role)>,
}

impl AclStore {
    /// Store with `admin` as the first system admin.
    #[must_use]
    pub fn bootstrap(admin: AccountId) -> Self {
        let mut acl = Self::default();
        acl.grant(RoleContext::System, admin, Role::SystemAdmin);
        acl
    }

    /// Record an assignment without an authority check. Used by the platform
    /// when it creates entities and policies on a caller's behalf.
    pub fn grant(&mut self, context: RoleContext, principal: AccountId, role: Role) {
        if self.assignments.insert((context, principal, role)) {
            tracing::info!(context = %context, principal = %principal, role = %role, "role granted");
        }
    }

    /// Assign `role` to `principal` in `context` on behalf of `caller`.
    ///
    /// System admins may assign anything. Entity admins may assign
    /// `EntityRep` within their own entity.
    pub fn assign_role(
        &mut self,
        caller: AccountId,
        context: RoleContext,
        principal: AccountId,
        role: Role,
    ) -> Result<()> {
        self.ensure_can_assign(caller, context, role)?;
        self.grant(context, principal, role);
        Ok(())
    }

    /// Remove `role` from `principal` in `context` on behalf of `caller`.
    pub fn unassign_role(
        &mut self,
        caller: AccountId,
        context: RoleContext,
        principal: AccountId,
        role: Role,
    ) -> Result<()> {
        self.ensure_can_assign(caller, context, role)?;
        if role == Role::SystemAdmin && context == RoleContext::System {
            let admins = self
                .assignments
                .iter()
                .filter(|(c, _, r)| *c == RoleContext::System && *r == Role::SystemAdmin)
                .count();
            if admins == 1 && self.is_system_admin(principal) {
                return Err(RiskpoolError::invalid_state("cannot remove the last system admin"));
            }
        }
        if self.assignments.remove(&(context, principal, role)) {
            tracing::info!(context = %context, principal = %principal, role = %role, "role removed");
        }
        Ok(())
    }

    /// Principals holding `role` in `context`.
    pub fn members(&self, context: RoleContext, role: Role) -> impl Iterator<Item = AccountId> + '_ {
        self.assignments
            .iter()
            .filter(move |(c, _, r)| *c == context && *r == role)
            .map(|(_, p, _)| *p)
    }

    fn ensure_can_assign(&self, caller: AccountId, context: RoleContext, role: Role) -> Result<()> {
        if self.is_system_admin(caller) {
            return Ok(());
        }
        match (context, role) {
            (RoleContext::Entity(_), Role::EntityRep)
                if self.has_role(context, caller, Role::EntityAdmin) =>
            {
                Ok(())
            }
            _ => Err(RiskpoolError::unauthorized(format!(
                "{caller} may not assign {role} in {context}"
            ))),
        }
    }
}

impl RoleOracle for AclStore {
    fn has_role(&self, context: RoleContext, principal: AccountId, role: Role) -> bool {
        self.assignments.contains(&(context, principal, role))
    }
}
