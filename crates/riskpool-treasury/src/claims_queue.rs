//! Per-asset FIFO queue of treasury claims.
//!
//! Entries are appended and never removed. `next_unpaid` points at the head
//! of the unpaid suffix: every entry before it is paid, and nothing after it
//! may be paid before it.

use riskpool_types::{AccountId, ClaimsSummary, PolicyId, TreasuryClaim};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClaimsQueue {
    claims: Vec<TreasuryClaim>,
    next_unpaid: usize,
}

impl ClaimsQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a claim already paid out. Only valid while nothing is unpaid.
    pub fn push_paid(&mut self, policy: PolicyId, recipient: AccountId, amount: u128) -> usize {
        debug_assert!(!self.has_unpaid());
        self.claims.push(TreasuryClaim {
            policy,
            recipient,
            amount,
            paid: true,
        });
        self.next_unpaid = self.claims.len();
        self.claims.len() - 1
    }

    /// Append an unpaid claim and return its index.
    pub fn push_unpaid(&mut self, policy: PolicyId, recipient: AccountId, amount: u128) -> usize {
        self.claims.push(TreasuryClaim {
            policy,
            recipient,
            amount,
            paid: false,
        });
        self.claims.len() - 1
    }

    #[must_use]
    pub fn has_unpaid(&self) -> bool {
        self.next_unpaid < self.claims.len()
    }

    /// Oldest unpaid claim.
    #[must_use]
    pub fn head(&self) -> Option<&TreasuryClaim> {
        self.claims.get(self.next_unpaid)
    }

    /// Mark the head paid and advance.
    pub fn pop_head(&mut self) -> Option<TreasuryClaim> {
        let claim = self.claims.get_mut(self.next_unpaid)?;
        claim.paid = true;
        self.next_unpaid += 1;
        Some(claim.clone())
    }

    /// Unpaid amount queued ahead of `policy`'s first unpaid claim, or all
    /// unpaid claims if the policy has none queued.
    #[must_use]
    pub fn unpaid_ahead_of(&self, policy: PolicyId) -> u128 {
        self.unpaid()
            .take_while(|c| c.policy != policy)
            .fold(0u128, |acc, c| acc.saturating_add(c.amount))
    }

    pub fn unpaid(&self) -> impl Iterator<Item = &TreasuryClaim> {
        self.claims[self.next_unpaid.min(self.claims.len())..].iter()
    }

    #[must_use]
    pub fn summary(&self) -> ClaimsSummary {
        ClaimsSummary {
            count: self.claims.len(),
            unpaid_count: self.claims.len() - self.next_unpaid,
            unpaid_total: self.unpaid().fold(0u128, |acc, c| acc.saturating_add(c.amount)),
        }
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&TreasuryClaim> {
        self.claims.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TreasuryClaim> {
        self.claims.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.claims.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }

    /// Paid entries form a prefix and the cursor sits right after it.
    #[must_use]
    pub fn is_fifo_consistent(&self) -> bool {
        let prefix = self.claims.iter().take_while(|c| c.paid).count();
        prefix == self.next_unpaid && self.claims[prefix..].iter().all(|c| !c.paid)
    }
}
