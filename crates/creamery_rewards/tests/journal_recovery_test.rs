//! Integration tests for journaled orchestrators surviving a restart.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use creamery_rewards::{
    AccountId, ClaimJournal, ClaimOrchestrator, Collaborators, CurrencyIssuer, CurrencyVault,
    ItemId, ItemIssuer, ItemVault, JournalOp, ManualClock, OrchestratorSettings, PayoutError,
    RarityRolls, RarityTier, RewardError, RewardType, RoleRegistry, TokenAmount,
    CLAIM_COOLDOWN_SECS,
};
use parking_lot::Mutex;

const ADMIN: AccountId = 1;
const START: u64 = 1_700_000_000;

fn temp_journal_path() -> PathBuf {
    let id = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    std::env::temp_dir().join(format!("test_claim_journal_{id}.crmj"))
}

fn collaborators(clock: Arc<ManualClock>, currency: Arc<CurrencyVault>) -> Collaborators {
    Collaborators {
        authorizer: Arc::new(RoleRegistry::new(ADMIN)),
        currency,
        items: Arc::new(ItemVault::new()),
        clock,
    }
}

fn open(path: &Path, clock: &Arc<ManualClock>) -> ClaimOrchestrator {
    ClaimOrchestrator::open(
        path,
        collaborators(Arc::clone(clock), Arc::new(CurrencyVault::new())),
        OrchestratorSettings::default(),
    )
    .unwrap()
}

fn configure(orchestrator: &ClaimOrchestrator) {
    orchestrator
        .set_rarity_rolls(ADMIN, RarityRolls::new(50, 75, 85, 92, 100, 100))
        .unwrap();
    for tier in RarityTier::ALL {
        orchestrator
            .set_reward(ADMIN, RewardType::Currency, tier, 100, 200, vec![0])
            .unwrap();
        orchestrator
            .set_reward(ADMIN, RewardType::Item, tier, 1, 5, vec![2, 3])
            .unwrap();
    }
}

#[test]
fn test_restart_restores_config_and_cooldowns() {
    let path = temp_journal_path();
    let clock = Arc::new(ManualClock::new(START));

    {
        let orchestrator = open(&path, &clock);
        configure(&orchestrator);
        orchestrator.claim(100, 1).unwrap();
        orchestrator.claim(101, 2).unwrap();
    }

    {
        let orchestrator = open(&path, &clock);
        assert_eq!(orchestrator.rarity_table().max_roll(), 100);
        let spec = orchestrator.reward(RewardType::Item, RarityTier::Epic).unwrap();
        assert_eq!(spec.item_ids(), &[2, 3]);
        assert_eq!(orchestrator.config().catalog.configured_count(), 10);

        assert_eq!(orchestrator.last_claim(100), Some(START));
        assert_eq!(orchestrator.last_claim(101), Some(START));
        assert!(matches!(
            orchestrator.claim(100, 3),
            Err(RewardError::ClaimTooSoon { .. })
        ));

        clock.advance(CLAIM_COOLDOWN_SECS);
        orchestrator.claim(100, 3).unwrap();
    }

    {
        let orchestrator = open(&path, &clock);
        assert_eq!(orchestrator.last_claim(100), Some(START + CLAIM_COOLDOWN_SECS));
    }

    std::fs::remove_file(&path).ok();
}

#[test]
fn test_failed_payout_not_replayed() {
    let path = temp_journal_path();
    let clock = Arc::new(ManualClock::new(START));

    {
        let currency = Arc::new(CurrencyVault::new());
        currency.set_paused(true);
        let orchestrator = ClaimOrchestrator::open(
            &path,
            collaborators(Arc::clone(&clock), Arc::clone(&currency)),
            OrchestratorSettings::default(),
        )
        .unwrap();
        configure(&orchestrator);

        // Currency payouts fail against the paused vault, item payouts go through
        let mut failed = 0;
        for account in 0..50u64 {
            match orchestrator.claim(account, account) {
                Err(RewardError::PayoutFailed { .. }) => failed += 1,
                Ok(_) => {}
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        assert!(failed > 0);
    }

    {
        let (_, ops) = ClaimJournal::open(&path).unwrap();
        let count = |reverted: bool| {
            ops.iter()
                .filter(|op| match op {
                    JournalOp::ClaimRecorded { .. } => !reverted,
                    JournalOp::ClaimReverted { .. } => reverted,
                    _ => false,
                })
                .count()
        };
        assert_eq!(count(false), 50);
        assert!(count(true) > 0);

        let orchestrator = open(&path, &clock);
        let recorded = (0..50u64)
            .filter(|&account| orchestrator.last_claim(account).is_some())
            .count();
        assert_eq!(recorded, count(false) - count(true));
        assert!(recorded < 50);
    }

    std::fs::remove_file(&path).ok();
}

#[test]
fn test_checkpoint_then_restart() {
    let path = temp_journal_path();
    let clock = Arc::new(ManualClock::new(START));

    {
        let orchestrator = open(&path, &clock);
        configure(&orchestrator);
        // Overwrite a slot so the checkpoint has something to compact
        orchestrator
            .set_reward(ADMIN, RewardType::Item, RarityTier::Rare, 10, 20, vec![8])
            .unwrap();
        for account in 0..10u64 {
            orchestrator.claim(account, account * 7).unwrap();
        }
        let before = std::fs::metadata(&path).unwrap().len();
        orchestrator.checkpoint().unwrap();
        let after = std::fs::metadata(&path).unwrap().len();
        assert!(after < before);

        orchestrator.claim(10, 70).unwrap();
    }

    {
        let orchestrator = open(&path, &clock);
        for account in 0..=10u64 {
            assert_eq!(orchestrator.last_claim(account), Some(START));
        }
        let spec = orchestrator.reward(RewardType::Item, RarityTier::Rare).unwrap();
        assert_eq!(spec.item_ids(), &[8]);
    }

    std::fs::remove_file(&path).ok();
}

#[test]
fn test_torn_write_is_ignored() {
    let path = temp_journal_path();
    let clock = Arc::new(ManualClock::new(START));

    {
        let orchestrator = open(&path, &clock);
        configure(&orchestrator);
        orchestrator.claim(5, 5).unwrap();
    }
    {
        // Half a record, as if the process died mid-write
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(&[7, 0, 0, 0, 0, 0, 0, 0, 2, 40, 0]).unwrap();
    }
    {
        let orchestrator = open(&path, &clock);
        assert_eq!(orchestrator.last_claim(5), Some(START));
        orchestrator.claim(6, 6).unwrap();
    }
    {
        let orchestrator = open(&path, &clock);
        assert_eq!(orchestrator.last_claim(6), Some(START));
    }

    std::fs::remove_file(&path).ok();
}

/// Payout collaborator that reads the journal back at the moment it pays.
struct JournalWitness {
    path: PathBuf,
    durable: Mutex<Vec<(AccountId, bool)>>,
}

impl JournalWitness {
    fn observe(&self, account: AccountId) {
        let (_, ops) = ClaimJournal::open(&self.path).unwrap();
        let recorded = ops
            .iter()
            .any(|op| matches!(op, JournalOp::ClaimRecorded { account: a, .. } if *a == account));
        self.durable.lock().push((account, recorded));
    }
}

impl CurrencyIssuer for JournalWitness {
    fn mint(&self, account: AccountId, _amount: TokenAmount) -> Result<(), PayoutError> {
        self.observe(account);
        Ok(())
    }
}

impl ItemIssuer for JournalWitness {
    fn grant(&self, account: AccountId, _item_id: ItemId, _amount: u128) -> Result<(), PayoutError> {
        self.observe(account);
        Ok(())
    }
}

#[test]
fn test_claim_is_durable_before_payout() {
    let path = temp_journal_path();
    let clock = Arc::new(ManualClock::new(START));
    let witness = Arc::new(JournalWitness {
        path: path.clone(),
        durable: Mutex::new(Vec::new()),
    });

    {
        let orchestrator = ClaimOrchestrator::open(
            &path,
            Collaborators {
                authorizer: Arc::new(RoleRegistry::new(ADMIN)),
                currency: witness.clone(),
                items: witness.clone(),
                clock: clock.clone(),
            },
            OrchestratorSettings::default(),
        )
        .unwrap();
        configure(&orchestrator);
        for account in 200..210u64 {
            orchestrator.claim(account, account).unwrap();
        }
    }

    // Every payout saw its claim already committed, so a crash at that point
    // still leaves the account on cooldown after restart
    let durable = witness.durable.lock().clone();
    assert_eq!(durable.len(), 10);
    assert!(durable.iter().all(|&(_, recorded)| recorded));

    let orchestrator = open(&path, &clock);
    for account in 200..210u64 {
        assert!(!orchestrator.can_claim(account));
    }

    std::fs::remove_file(&path).ok();
}
