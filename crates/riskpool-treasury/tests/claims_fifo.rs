//! Randomised claim and funding sequences against one treasury.
//!
//! Whatever the order of claims and receipts, the audit invariants hold and
//! claims are settled strictly in the order they were queued.

use rand::Rng;
use riskpool_ledger::AssetLedger;
use riskpool_treasury::{Treasury, TreasuryAudit};
use riskpool_types::{AccountId, ClaimPayment, EntityId, PolicyId};

const DAI: &str = "DAI";

#[test]
fn random_claims_and_receipts_keep_invariants() {
    let mut rng = rand::thread_rng();
    for _ in 0..20 {
        let mut ledger = AssetLedger::new();
        let mut treasury = Treasury::new(EntityId::new(), AccountId::new());
        let policies: Vec<PolicyId> = (0..3).map(|_| PolicyId::new()).collect();
        for p in &policies {
            treasury.register_policy(*p, DAI).expect("register");
            treasury.inc_policy_balance(*p, 1_000).expect("income");
        }

        let mut queued: Vec<(AccountId, u128)> = Vec::new();
        for _ in 0..30 {
            if rng.gen_bool(0.5) {
                let policy = policies[rng.gen_range(0..policies.len())];
                let balance = treasury.get_policy_economics(policy).expect("registered").balance;
                if balance == 0 {
                    continue;
                }
                let amount = rng.gen_range(1..=balance.min(200));
                let recipient = AccountId::new();
                match treasury.pay_claim(&mut ledger, policy, recipient, amount).expect("claim") {
                    ClaimPayment::Paid => assert!(queued.is_empty(), "paid while others wait"),
                    ClaimPayment::Queued(_) => queued.push((recipient, amount)),
                }
            } else {
                let amount = rng.gen_range(1..150);
                ledger.mint(treasury.account(), DAI, amount).expect("mint");
                treasury.record_receipt(&mut ledger, DAI, amount).expect("receipt");
                // Settled claims leave the front of the queue in order.
                while let Some((recipient, amount)) = queued.first().copied() {
                    if ledger.balance_of(recipient, DAI) == amount {
                        queued.remove(0);
                    } else {
                        break;
                    }
                }
                for (recipient, _) in &queued {
                    assert_eq!(ledger.balance_of(*recipient, DAI), 0);
                }
            }
            TreasuryAudit::run(&treasury, &ledger)
                .into_result()
                .expect("audit holds");
        }
        assert_eq!(treasury.get_claims(DAI).unpaid_count, queued.len());
    }
}
