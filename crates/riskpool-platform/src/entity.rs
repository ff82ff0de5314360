//! Entities: organisations holding funds and owning one treasury each.

use std::collections::BTreeMap;

use riskpool_policy::AccountDirectory;
use riskpool_types::{AccountId, EntityId, Result, RiskpoolError};
use serde::{Deserialize, Serialize};

/// An organisation registered on the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    /// Holds the entity's own funds and receives its payouts.
    pub account: AccountId,
    pub treasury_account: AccountId,
    pub admin: AccountId,
}

/// Every registered entity, by id.
#[derive(Debug, Clone, Default)]
pub struct EntityRegistry {
    entities: BTreeMap<EntityId, Entity>,
}

impl EntityRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate accounts for a new entity administered by `admin`.
    pub fn register(&mut self, admin: AccountId) -> &Entity {
        let entity = Entity {
            id: EntityId::new(),
            account: AccountId::new(),
            treasury_account: AccountId::new(),
            admin,
        };
        tracing::info!(entity = %entity.id, admin = %admin, account = %entity.account, "entity registered");
        self.entities.entry(entity.id).or_insert(entity)
    }

    pub fn get(&self, id: EntityId) -> Result<&Entity> {
        self.entities.get(&id).ok_or(RiskpoolError::EntityNotFound(id))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

impl AccountDirectory for EntityRegistry {
    fn entity_account(&self, entity: EntityId) -> Option<AccountId> {
        self.entities.get(&entity).map(|e| e.account)
    }
}
