//! In-Memory Ledger Adapter
//!
//! Implements `ChainReader` and `ChainWriter` over a local model of the five
//! realm contracts. Used for tests and offline demos; failure injection and
//! confirmation gating let callers drive every workflow branch.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use shared_types::{Address, Contract, Timers, U256};
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::domain::LedgerError;
use crate::ports::{ChainReader, ChainWriter, LedgerValue, PendingTransaction, ReadCall, WriteCall};

/// Terraform cooldown after a successful terraform (s).
pub const TERRAFORM_COOLDOWN_S: u64 = 86_400;
/// Collect cooldown (s).
pub const COLLECT_COOLDOWN_S: u64 = 3_600;
/// City build cooldown (s).
pub const CITY_COOLDOWN_S: u64 = 7_200;
/// Farm slot cooldown (s).
pub const FARM_COOLDOWN_S: u64 = 1_800;

/// Ledger value of a never-terraformed realm's timer (s).
const NEVER_RESTRICTED_S: u64 = 1;

const FEATURE_NAMES: [&str; 7] = [
    "Plains", "Forest", "Mountains", "Lake", "Desert", "Tundra", "Swamp",
];

/// Ledger state of one realm, timestamps in seconds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RealmSeed {
    pub name: String,
    pub owner: Address,
    pub partner: bool,
    pub size: u64,
    pub created_at_s: u64,
    pub terraform_time_s: u64,
    pub features: [u64; 3],
    pub cities: u64,
    pub collect_time_s: u64,
    pub city_build_time_s: u64,
    /// Balances in `RESOURCE_NAMES` order; index 0 is gold.
    pub resources: [u64; 7],
    pub per_turn: [u64; 3],
    pub queue_available: u64,
    pub queue_total: u64,
    pub next_free_slot_s: u64,
    /// (resource, have, need)
    pub gain_slot: (String, u64, u64),
    pub farms: [u64; 3],
}

impl RealmSeed {
    /// A fresh, never-terraformed realm with every timer open.
    pub fn new(name: impl Into<String>, owner: Address) -> Self {
        Self {
            name: name.into(),
            owner,
            partner: false,
            size: 100,
            created_at_s: 1_600_000_000,
            terraform_time_s: NEVER_RESTRICTED_S,
            features: [0, 1, 2],
            cities: 0,
            collect_time_s: 0,
            city_build_time_s: 0,
            resources: [100, 50, 20, 0, 0, 0, 0],
            per_turn: [10, 5, 2],
            queue_available: 1,
            queue_total: 2,
            next_free_slot_s: 0,
            gain_slot: ("Gold".to_string(), 0, 0),
            farms: [0, 0, 0],
        }
    }
}

struct LedgerState {
    realms: BTreeMap<U256, RealmSeed>,
    accounts: Vec<Address>,
    connected: bool,
    clock_ms: u64,
    mint_price: U256,
    failing_reads: HashMap<String, LedgerError>,
    reject_next_write: Option<String>,
    read_counts: HashMap<String, usize>,
    writes: Vec<WriteCall>,
    next_tx: u64,
}

impl LedgerState {
    fn now_s(&self) -> u64 {
        self.clock_ms / 1000
    }

    fn realm(&self, id: U256) -> Result<&RealmSeed, String> {
        self.realms.get(&id).ok_or_else(|| format!("nonexistent token {id}"))
    }

    fn read(&self, call: &ReadCall) -> Result<LedgerValue, String> {
        let uint = |v: u64| LedgerValue::Uint(U256::from(v));
        let list = |vs: &[u64]| LedgerValue::List(vs.iter().map(|v| uint(*v)).collect());

        match (call.contract, call.method) {
            (Contract::Realm, "totalSupply") => return Ok(uint(self.realms.len() as u64)),
            (Contract::Realm, "features") => {
                let feature_id = arg_u64(&call.args, 0)?;
                let name = FEATURE_NAMES[(feature_id % FEATURE_NAMES.len() as u64) as usize];
                return Ok(LedgerValue::Text(name.to_string()));
            }
            _ => {}
        }

        let realm = self.realm(arg_u256(&call.args, 0)?)?;
        let value = match (call.contract, call.method) {
            (Contract::Realm, "getRealm") => LedgerValue::List(vec![
                LedgerValue::Text(realm.name.clone()),
                uint(realm.size),
                uint(realm.created_at_s),
                LedgerValue::Bool(realm.partner),
            ]),
            (Contract::Realm, "getName") => LedgerValue::Text(realm.name.clone()),
            (Contract::Realm, "ownerOf") => LedgerValue::Address(realm.owner),
            (Contract::Realm, "terraformTime") => uint(realm.terraform_time_s),
            (Contract::Realm, "realmFeatures") => {
                let slot = arg_u64(&call.args, 1)? as usize;
                let feature = realm
                    .features
                    .get(slot)
                    .ok_or_else(|| format!("feature slot {slot} out of range"))?;
                uint(*feature)
            }
            (Contract::City, "cities") => uint(realm.cities),
            (Contract::City, "buildTime") => uint(realm.city_build_time_s),
            (Contract::Data, "getResources") => list(&realm.resources),
            (Contract::Data, "getPerTurn") => list(&realm.per_turn),
            (Contract::Data, "collectTime") => uint(realm.collect_time_s),
            (Contract::Data, "gold") => uint(realm.resources[0]),
            (Contract::Manager, "getQueue") => list(&[realm.queue_available, realm.queue_total]),
            (Contract::Manager, "nextFreeSlot") => uint(realm.next_free_slot_s),
            (Contract::Manager, "gainSlot") => LedgerValue::List(vec![
                LedgerValue::Text(realm.gain_slot.0.clone()),
                uint(realm.gain_slot.1),
                uint(realm.gain_slot.2),
            ]),
            (Contract::Farm, "getFarms") => list(&realm.farms),
            (contract, method) => return Err(format!("unknown method {contract}.{method}")),
        };
        Ok(value)
    }

    fn apply(&mut self, call: &WriteCall, signer: Address) -> Result<(), String> {
        let now = self.now_s();
        let id = arg_u256(&call.args, 0)?;

        if (call.contract, call.method) == (Contract::Realm, "claim") {
            if call.value.unwrap_or_default() < self.mint_price {
                return Err("Insufficient payment".into());
            }
            if self.realms.contains_key(&id) {
                return Err("Realm already claimed".into());
            }
            let name = match call.args.get(1) {
                Some(LedgerValue::Text(name)) => name.clone(),
                _ => return Err("missing realm name".into()),
            };
            let mut realm = RealmSeed::new(name, signer);
            realm.created_at_s = now;
            self.realms.insert(id, realm);
            return Ok(());
        }

        let realm = self
            .realms
            .get_mut(&id)
            .ok_or_else(|| format!("nonexistent token {id}"))?;
        if realm.owner != signer {
            return Err("Not the realm owner".into());
        }

        match (call.contract, call.method) {
            (Contract::Realm, "terraform") => {
                let slot = arg_u64(&call.args, 1)? as usize;
                if realm.terraform_time_s != NEVER_RESTRICTED_S && now <= realm.terraform_time_s {
                    return Err("Terraform not ready".into());
                }
                let feature = realm
                    .features
                    .get_mut(slot)
                    .ok_or_else(|| format!("feature slot {slot} out of range"))?;
                *feature += FEATURE_NAMES.len() as u64 / 2;
                realm.terraform_time_s = now + TERRAFORM_COOLDOWN_S;
            }
            (Contract::Data, "collect") => {
                if now <= realm.collect_time_s {
                    return Err("Nothing to collect yet".into());
                }
                for (balance, accrual) in realm.resources.iter_mut().zip(realm.per_turn) {
                    *balance += accrual;
                }
                realm.collect_time_s = now + COLLECT_COOLDOWN_S;
            }
            (Contract::City, "build") => {
                let cost = Timers::next_city_cost(realm.cities);
                if realm.resources[0] < cost {
                    return Err("Not enough gold".into());
                }
                if now <= realm.city_build_time_s {
                    return Err("City cooldown".into());
                }
                realm.resources[0] -= cost;
                realm.cities += 1;
                realm.city_build_time_s = now + CITY_COOLDOWN_S;
            }
            (Contract::Farm, "build") => {
                let kind = arg_u64(&call.args, 1)? as usize;
                if realm.queue_available == 0 && now <= realm.next_free_slot_s {
                    return Err("Build queue full".into());
                }
                let farms = realm
                    .farms
                    .get_mut(kind)
                    .ok_or_else(|| format!("unknown farm kind {kind}"))?;
                *farms += 1;
                realm.queue_available = realm.queue_available.saturating_sub(1);
                realm.next_free_slot_s = now + FARM_COOLDOWN_S;
            }
            (contract, method) => return Err(format!("unknown method {contract}.{method}")),
        }
        Ok(())
    }
}

fn arg_u256(args: &[LedgerValue], index: usize) -> Result<U256, String> {
    match args.get(index) {
        Some(LedgerValue::Uint(v)) => Ok(*v),
        other => Err(format!("argument {index}: expected uint, got {other:?}")),
    }
}

fn arg_u64(args: &[LedgerValue], index: usize) -> Result<u64, String> {
    let value = arg_u256(args, index)?;
    if value > U256::from(u64::MAX) {
        return Err(format!("argument {index} overflows"));
    }
    Ok(value.low_u64())
}

/// In-memory model of the realm contracts and a wallet.
pub struct InMemoryLedger {
    state: Arc<Mutex<LedgerState>>,
    read_delay: Mutex<Duration>,
    confirmations: watch::Sender<bool>,
}

impl InMemoryLedger {
    /// Empty ledger, locked wallet, clock at 2023-11-14.
    pub fn new() -> Self {
        let (confirmations, _) = watch::channel(true);
        Self {
            state: Arc::new(Mutex::new(LedgerState {
                realms: BTreeMap::new(),
                accounts: Vec::new(),
                connected: false,
                clock_ms: 1_700_000_000_000,
                // 0.01 ether
                mint_price: U256::from(10_000_000_000_000_000u64),
                failing_reads: HashMap::new(),
                reject_next_write: None,
                read_counts: HashMap::new(),
                writes: Vec::new(),
                next_tx: 1,
            })),
            read_delay: Mutex::new(Duration::ZERO),
            confirmations,
        }
    }

    /// Expose these accounts as already connected.
    pub fn set_accounts(&self, accounts: Vec<Address>) {
        let mut state = self.state.lock();
        state.accounts = accounts;
        state.connected = true;
    }

    /// Hold these accounts until `request_accounts` is called.
    pub fn lock_wallet(&self, accounts: Vec<Address>) {
        let mut state = self.state.lock();
        state.accounts = accounts;
        state.connected = false;
    }

    pub fn seed_realm(&self, id: u64, realm: RealmSeed) {
        self.state.lock().realms.insert(U256::from(id), realm);
    }

    /// Current ledger record of a realm.
    pub fn realm(&self, id: u64) -> Option<RealmSeed> {
        self.state.lock().realms.get(&U256::from(id)).cloned()
    }

    pub fn set_clock_ms(&self, ms: u64) {
        self.state.lock().clock_ms = ms;
    }

    pub fn advance_clock_ms(&self, ms: u64) {
        let mut state = self.state.lock();
        state.clock_ms = state.clock_ms.saturating_add(ms);
    }

    pub fn clock_ms(&self) -> u64 {
        self.state.lock().clock_ms
    }

    pub fn set_mint_price(&self, wei: U256) {
        self.state.lock().mint_price = wei;
    }

    /// Delay every read by `delay`.
    pub fn set_read_delay(&self, delay: Duration) {
        *self.read_delay.lock() = delay;
    }

    /// Fail every read of `method` with `error` until cleared.
    pub fn fail_read(&self, method: &str, error: LedgerError) {
        self.state.lock().failing_reads.insert(method.to_string(), error);
    }

    pub fn clear_read_failures(&self) {
        self.state.lock().failing_reads.clear();
    }

    /// Make the wallet refuse the next write.
    pub fn reject_next_write(&self, message: impl Into<String>) {
        self.state.lock().reject_next_write = Some(message.into());
    }

    /// Keep broadcast transactions pending until released.
    pub fn hold_confirmations(&self) {
        self.confirmations.send_replace(false);
    }

    pub fn release_confirmations(&self) {
        self.confirmations.send_replace(true);
    }

    /// Reads of `method` served so far.
    pub fn read_count(&self, method: &str) -> usize {
        self.state.lock().read_counts.get(method).copied().unwrap_or(0)
    }

    /// Every write broadcast so far.
    pub fn writes(&self) -> Vec<WriteCall> {
        self.state.lock().writes.clone()
    }
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChainReader for InMemoryLedger {
    async fn read(&self, call: ReadCall) -> Result<LedgerValue, LedgerError> {
        let delay = *self.read_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock();
        *state.read_counts.entry(call.method.to_string()).or_insert(0) += 1;

        if let Some(error) = state.failing_reads.get(call.method) {
            debug!("[ledger] Injected failure for {}", call);
            return Err(error.clone());
        }

        state.read(&call).map_err(|reason| LedgerError::ReadFailure {
            contract: call.contract,
            method: call.method.to_string(),
            reason,
            revert_data: None,
        })
    }

    async fn current_clock(&self) -> Result<u64, LedgerError> {
        Ok(self.state.lock().clock_ms)
    }

    async fn accounts(&self) -> Result<Vec<Address>, LedgerError> {
        let state = self.state.lock();
        Ok(if state.connected {
            state.accounts.clone()
        } else {
            Vec::new()
        })
    }
}

#[async_trait]
impl ChainWriter for InMemoryLedger {
    async fn write(&self, call: WriteCall) -> Result<Box<dyn PendingTransaction>, LedgerError> {
        let mut state = self.state.lock();

        if let Some(message) = state.reject_next_write.take() {
            warn!("[ledger] Wallet rejected {}", call);
            return Err(LedgerError::WriteRejected(message));
        }
        let signer = match (state.connected, state.accounts.first()) {
            (true, Some(signer)) => *signer,
            _ => return Err(LedgerError::WriteRejected("No signer available".into())),
        };

        let tx_hash = format!("0x{:064x}", state.next_tx);
        state.next_tx += 1;
        state.writes.push(call.clone());
        debug!("[ledger] Broadcast {} as {}", call, tx_hash);

        Ok(Box::new(InMemoryPending {
            tx_hash,
            call,
            signer,
            state: self.state.clone(),
            gate: self.confirmations.subscribe(),
        }))
    }

    async fn request_accounts(&self) -> Result<Vec<Address>, LedgerError> {
        let mut state = self.state.lock();
        state.connected = true;
        Ok(state.accounts.clone())
    }
}

struct InMemoryPending {
    tx_hash: String,
    call: WriteCall,
    signer: Address,
    state: Arc<Mutex<LedgerState>>,
    gate: watch::Receiver<bool>,
}

#[async_trait]
impl PendingTransaction for InMemoryPending {
    fn tx_hash(&self) -> &str {
        &self.tx_hash
    }

    async fn confirm(self: Box<Self>) -> Result<(), LedgerError> {
        let mut gate = self.gate.clone();
        if gate.wait_for(|open| *open).await.is_err() {
            return Err(LedgerError::NetworkOrTimeout("ledger shut down".into()));
        }

        let result = self.state.lock().apply(&self.call, self.signer);
        result.map_err(|reason| {
            debug!("[ledger] {} reverted: {}", self.tx_hash, reason);
            LedgerError::WriteReverted {
                tx_hash: Some(self.tx_hash.clone()),
                reason,
            }
        })
    }
}
