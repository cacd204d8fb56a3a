//! # Ledger Queries
//!
//! Maps each cache key family to the contract reads that resolve it, and
//! hands out views with the right enablement rules. Ledger seconds become
//! milliseconds here and nowhere else.

use std::sync::Arc;

use futures::future::try_join_all;
use shared_types::{
    Address, BuildQueue, Contract, Farms, Feature, GainSlot, Realm, RealmId, Resource,
    ResourceSet, Timers, U256,
};
use tokio::sync::watch;

use crate::cache::{fetcher, CacheView, EntityCache, Fetcher};
use crate::domain::{
    seconds_to_ms, BlockClock, CacheKey, ClientError, EntityValue, KeyFilter, LedgerError,
    TERRAFORMABLE_SLOTS,
};
use crate::ports::{ChainReader, LedgerValue, ReadCall};

/// Resource balances in ledger order.
pub const RESOURCE_NAMES: [&str; 7] = [
    "Gold",
    "Food",
    "Workforce",
    "Culture",
    "Technology",
    "Religion",
    "Energy",
];

/// The leading resources that accrue per turn.
pub const ACCRUING_RESOURCES: usize = 3;

/// Farm kinds in ledger order; the index is the `kind` argument of a build.
pub const FARM_KINDS: [&str; 3] = ["Wheat", "Fish", "Cattle"];

/// Display name used when the ledger has none to offer.
pub const UNKNOWN_REALM_NAME: &str = "Unknown";

/// `Error(string)` selector.
const ERROR_SELECTOR: [u8; 4] = [0x08, 0xc3, 0x79, 0xa0];

/// Read-through accessors over the entity cache.
#[derive(Clone)]
pub struct RealmQueries {
    cache: EntityCache,
    reader: Arc<dyn ChainReader>,
    clock: Arc<BlockClock>,
    account: watch::Receiver<Option<Address>>,
}

impl RealmQueries {
    pub fn new(
        cache: EntityCache,
        reader: Arc<dyn ChainReader>,
        clock: Arc<BlockClock>,
        account: watch::Receiver<Option<Address>>,
    ) -> Self {
        Self {
            cache,
            reader,
            clock,
            account,
        }
    }

    pub fn cache(&self) -> &EntityCache {
        &self.cache
    }

    pub fn clock(&self) -> &BlockClock {
        &self.clock
    }

    /// Currently connected account.
    pub fn account(&self) -> Option<Address> {
        *self.account.borrow()
    }

    // Realm-scoped reads wait for a connected wallet, like the rest of the UI.
    fn realm_enabled(&self, id: &str) -> bool {
        self.account().is_some() && !id.trim().is_empty()
    }

    pub fn realm(&self, id: &str) -> CacheView {
        let id = id.trim();
        self.cache.get(
            CacheKey::realm(id),
            realm_fetcher(self.reader.clone(), id),
            self.realm_enabled(id),
        )
    }

    pub fn realm_name(&self, id: &str) -> CacheView {
        let id = id.trim();
        self.cache.get(
            CacheKey::realm_name(id),
            realm_name_fetcher(self.reader.clone(), id),
            self.realm_enabled(id),
        )
    }

    pub fn resources(&self, id: &str) -> CacheView {
        let id = id.trim();
        self.cache.get(
            CacheKey::realm_resources(id),
            resources_fetcher(self.reader.clone(), id),
            self.realm_enabled(id),
        )
    }

    pub fn timers(&self, id: &str) -> CacheView {
        let id = id.trim();
        self.cache.get(
            CacheKey::realm_timers(id),
            timers_fetcher(self.reader.clone(), id),
            self.realm_enabled(id),
        )
    }

    pub fn queue(&self, id: &str) -> CacheView {
        let id = id.trim();
        self.cache.get(
            CacheKey::realm_queue(id),
            queue_fetcher(self.reader.clone(), id),
            self.realm_enabled(id),
        )
    }

    pub fn farms(&self, id: &str) -> CacheView {
        let id = id.trim();
        self.cache.get(
            CacheKey::realm_farms(id),
            farms_fetcher(self.reader.clone(), id),
            self.realm_enabled(id),
        )
    }

    /// Ownership of `id` by the connected account; `None` without one.
    pub fn owner(&self, id: &str) -> Option<CacheView> {
        let account = self.account()?;
        let id = id.trim();
        Some(self.cache.get(
            CacheKey::owner(&account, id),
            owner_fetcher(self.reader.clone(), account, id),
            !id.is_empty(),
        ))
    }

    pub fn accounts(&self) -> CacheView {
        self.cache.get(
            CacheKey::accounts(),
            accounts_fetcher(self.reader.clone()),
            true,
        )
    }

    /// Number of realms minted so far.
    pub fn total_supply(&self) -> CacheView {
        self.cache.get(
            CacheKey::current_tokens(),
            total_supply_fetcher(self.reader.clone()),
            self.account().is_some(),
        )
    }

    pub fn block_timestamp(&self) -> CacheView {
        self.cache.get(
            CacheKey::block_timestamp(),
            block_timestamp_fetcher(self.reader.clone(), self.clock.clone()),
            true,
        )
    }

    /// Re-read the block clock for every open view.
    pub fn refresh_clock(&self) -> usize {
        self.cache
            .invalidate(KeyFilter::exact([CacheKey::block_timestamp()]))
    }

    /// Warm the four entries a realm page opens with.
    pub async fn prefetch_realm(&self, id: &RealmId) {
        let raw = id.as_str();
        let reader = &self.reader;
        tokio::join!(
            self.cache
                .prefetch(CacheKey::realm_name(raw), realm_name_fetcher(reader.clone(), raw)),
            self.cache
                .prefetch(CacheKey::realm(raw), realm_fetcher(reader.clone(), raw)),
            self.cache.prefetch(
                CacheKey::realm_resources(raw),
                resources_fetcher(reader.clone(), raw)
            ),
            self.cache
                .prefetch(CacheKey::realm_timers(raw), timers_fetcher(reader.clone(), raw)),
        );
    }
}

// =============================================================================
// FETCHERS
// =============================================================================

macro_rules! realm_fetcher_fn {
    ($(#[$meta:meta])* $name:ident, $fetch:ident, $variant:ident) => {
        $(#[$meta])*
        pub fn $name(reader: Arc<dyn ChainReader>, raw_id: &str) -> Fetcher {
            let raw_id = raw_id.to_string();
            fetcher(move || {
                let reader = reader.clone();
                let raw_id = raw_id.clone();
                async move {
                    let id = RealmId::parse(&raw_id)?;
                    $fetch(reader.as_ref(), &id).await.map(EntityValue::$variant)
                }
            })
        }
    };
}

realm_fetcher_fn!(
    /// Resolves `("realm", id)`.
    realm_fetcher, fetch_realm, Realm
);
realm_fetcher_fn!(
    /// Resolves `("realm-name", id)`. Never fails on a revert.
    realm_name_fetcher, fetch_realm_name, RealmName
);
realm_fetcher_fn!(
    /// Resolves `("realm", id, "resources")`.
    resources_fetcher, fetch_resources, Resources
);
realm_fetcher_fn!(
    /// Resolves `("realm", id, "timers")`.
    timers_fetcher, fetch_timers, Timers
);
realm_fetcher_fn!(
    /// Resolves `("realm", id, "queue")`.
    queue_fetcher, fetch_queue, Queue
);
realm_fetcher_fn!(
    /// Resolves `("realm", id, "farms")`.
    farms_fetcher, fetch_farms, Farms
);

/// Resolves `("owner", account, id)`.
pub fn owner_fetcher(reader: Arc<dyn ChainReader>, account: Address, raw_id: &str) -> Fetcher {
    let raw_id = raw_id.to_string();
    fetcher(move || {
        let reader = reader.clone();
        let raw_id = raw_id.clone();
        async move {
            let id = RealmId::parse(&raw_id)?;
            let owner = read(reader.as_ref(), Contract::Realm, "ownerOf", id_arg(&id))
                .await?
                .as_address("realm owner")?;
            Ok(EntityValue::Owner(owner == account))
        }
    })
}

/// Resolves `("accounts",)`.
pub fn accounts_fetcher(reader: Arc<dyn ChainReader>) -> Fetcher {
    fetcher(move || {
        let reader = reader.clone();
        async move { Ok(EntityValue::Accounts(reader.accounts().await?)) }
    })
}

/// Resolves `("current-tokens",)`.
pub fn total_supply_fetcher(reader: Arc<dyn ChainReader>) -> Fetcher {
    fetcher(move || {
        let reader = reader.clone();
        async move {
            let supply = read(reader.as_ref(), Contract::Realm, "totalSupply", vec![])
                .await?
                .as_u64("total supply")?;
            Ok(EntityValue::TokenCount(supply))
        }
    })
}

/// Resolves `("block-timestamp",)` through the session's monotonic clock.
pub fn block_timestamp_fetcher(reader: Arc<dyn ChainReader>, clock: Arc<BlockClock>) -> Fetcher {
    fetcher(move || {
        let reader = reader.clone();
        let clock = clock.clone();
        async move {
            let observed = reader.current_clock().await?;
            Ok(EntityValue::BlockTimestamp(clock.observe(observed)))
        }
    })
}

// =============================================================================
// READS
// =============================================================================

fn id_arg(id: &RealmId) -> Vec<LedgerValue> {
    vec![LedgerValue::Uint(id.to_u256())]
}

async fn read(
    reader: &dyn ChainReader,
    contract: Contract,
    method: &'static str,
    args: Vec<LedgerValue>,
) -> Result<LedgerValue, ClientError> {
    Ok(reader.read(ReadCall::new(contract, method, args)).await?)
}

async fn read_ms(
    reader: &dyn ChainReader,
    contract: Contract,
    method: &'static str,
    id: &RealmId,
) -> Result<u64, ClientError> {
    let seconds = read(reader, contract, method, id_arg(id)).await?.as_u64(method)?;
    Ok(seconds_to_ms(seconds))
}

fn uint_list(value: &LedgerValue, what: &str, len: usize) -> Result<Vec<u64>, ClientError> {
    value
        .as_tuple(what, len)?
        .iter()
        .map(|v| v.as_u64(what))
        .collect()
}

async fn fetch_realm(reader: &dyn ChainReader, id: &RealmId) -> Result<Realm, ClientError> {
    let (record, owner, terraform_time, cities, features) = futures::try_join!(
        read(reader, Contract::Realm, "getRealm", id_arg(id)),
        read(reader, Contract::Realm, "ownerOf", id_arg(id)),
        read_ms(reader, Contract::Realm, "terraformTime", id),
        read(reader, Contract::City, "cities", id_arg(id)),
        fetch_features(reader, id),
    )?;

    // (name, size, createdAt, partner)
    let fields = record.as_tuple("realm record", 4)?;
    Ok(Realm {
        id: id.as_str().to_string(),
        name: fields[0].as_text("realm name")?,
        size: fields[1].as_u64("realm size")?,
        created_at: seconds_to_ms(fields[2].as_u64("realm createdAt")?),
        partner: fields[3].as_bool("realm partner")?,
        owner: owner.as_address("realm owner")?,
        terraform_time,
        cities: cities.as_u64("cities")?,
        features,
    })
}

async fn fetch_features(reader: &dyn ChainReader, id: &RealmId) -> Result<Vec<Feature>, ClientError> {
    let reads = (0..TERRAFORMABLE_SLOTS).map(|slot| async move {
        let mut args = id_arg(id);
        args.push(LedgerValue::uint(slot as u64));
        let feature_id = read(reader, Contract::Realm, "realmFeatures", args)
            .await?
            .as_u64("feature id")?;
        let feature = read(
            reader,
            Contract::Realm,
            "features",
            vec![LedgerValue::uint(feature_id)],
        )
        .await?
        .as_text("feature name")?;
        Ok::<_, ClientError>(Feature {
            feature,
            feature_id,
        })
    });
    try_join_all(reads).await
}

async fn fetch_realm_name(reader: &dyn ChainReader, id: &RealmId) -> Result<String, ClientError> {
    match reader
        .read(ReadCall::new(Contract::Realm, "getName", id_arg(id)))
        .await
    {
        Ok(value) => value.as_text("realm name"),
        Err(LedgerError::ReadFailure { revert_data, .. }) => {
            Ok(decode_revert_name(revert_data.as_deref()))
        }
        Err(other) => Err(other.into()),
    }
}

async fn fetch_resources(reader: &dyn ChainReader, id: &RealmId) -> Result<ResourceSet, ClientError> {
    let (balances, per_turn) = futures::try_join!(
        read(reader, Contract::Data, "getResources", id_arg(id)),
        read(reader, Contract::Data, "getPerTurn", id_arg(id)),
    )?;
    let balances = uint_list(&balances, "resources", RESOURCE_NAMES.len())?;
    let per_turn = uint_list(&per_turn, "per-turn accrual", ACCRUING_RESOURCES)?;

    let resources = RESOURCE_NAMES
        .iter()
        .zip(balances)
        .enumerate()
        .map(|(i, (name, value))| Resource {
            name: name.to_string(),
            value,
            per_turn: per_turn.get(i).copied(),
        })
        .collect();
    Ok(ResourceSet { resources })
}

async fn fetch_timers(reader: &dyn ChainReader, id: &RealmId) -> Result<Timers, ClientError> {
    let (collect_time, terraform_time, city_build_time, gold, cities) = futures::try_join!(
        read_ms(reader, Contract::Data, "collectTime", id),
        read_ms(reader, Contract::Realm, "terraformTime", id),
        read_ms(reader, Contract::City, "buildTime", id),
        read(reader, Contract::Data, "gold", id_arg(id)),
        read(reader, Contract::City, "cities", id_arg(id)),
    )?;
    Ok(Timers::new(
        collect_time,
        terraform_time,
        city_build_time,
        gold.as_u64("gold")?,
        cities.as_u64("cities")?,
    ))
}

async fn fetch_queue(reader: &dyn ChainReader, id: &RealmId) -> Result<BuildQueue, ClientError> {
    let (queue, next_free_slot_time, gain) = futures::try_join!(
        read(reader, Contract::Manager, "getQueue", id_arg(id)),
        read_ms(reader, Contract::Manager, "nextFreeSlot", id),
        read(reader, Contract::Manager, "gainSlot", id_arg(id)),
    )?;
    let queue = uint_list(&queue, "queue", 2)?;
    // (resource, have, need)
    let gain = gain.as_tuple("gain slot", 3)?;
    let have = gain[1].as_u64("gain slot have")?;
    let need = gain[2].as_u64("gain slot need")?;

    Ok(BuildQueue {
        queue_available: queue[0],
        queue_total: queue[1],
        next_free_slot_time,
        gain_slot: GainSlot {
            name: gain[0].as_text("gain slot resource")?,
            value: format!("{have}/{need}"),
        },
    })
}

async fn fetch_farms(reader: &dyn ChainReader, id: &RealmId) -> Result<Farms, ClientError> {
    let (farms, balances) = futures::try_join!(
        read(reader, Contract::Farm, "getFarms", id_arg(id)),
        read(reader, Contract::Data, "getResources", id_arg(id)),
    )?;
    let farms = uint_list(&farms, "farms", FARM_KINDS.len())?;
    let balances = uint_list(&balances, "resources", RESOURCE_NAMES.len())?;

    // Gold is not farmed.
    let resources = RESOURCE_NAMES
        .iter()
        .zip(balances)
        .skip(1)
        .map(|(name, value)| Resource {
            name: name.to_string(),
            value,
            per_turn: None,
        })
        .collect();
    let farms = FARM_KINDS
        .iter()
        .zip(farms)
        .map(|(name, value)| Resource {
            name: name.to_string(),
            value,
            per_turn: None,
        })
        .collect();
    Ok(Farms { resources, farms })
}

// =============================================================================
// REVERT DECODING
// =============================================================================

/// Recover a display name from a reverted name read.
///
/// Accepts either an `Error(string)` payload or raw bytes. Invalid UTF-8 and
/// control characters are dropped; an empty result becomes `"Unknown"`.
pub fn decode_revert_name(revert_data: Option<&[u8]>) -> String {
    let Some(bytes) = revert_data else {
        return UNKNOWN_REALM_NAME.to_string();
    };
    let payload = error_string_payload(bytes).unwrap_or(bytes);

    let name: String = payload
        .utf8_chunks()
        .map(|chunk| chunk.valid())
        .collect::<String>()
        .chars()
        .filter(|c| !c.is_control())
        .collect();
    let name = name.trim();

    if name.is_empty() {
        UNKNOWN_REALM_NAME.to_string()
    } else {
        name.to_string()
    }
}

fn error_string_payload(bytes: &[u8]) -> Option<&[u8]> {
    if bytes.len() < 68 || bytes[..4] != ERROR_SELECTOR {
        return None;
    }
    let len = U256::from_big_endian(&bytes[36..68]);
    if len > U256::from(bytes.len()) {
        return None;
    }
    bytes.get(68..68 + len.low_u64() as usize)
}
