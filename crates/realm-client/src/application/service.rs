//! # Realm Session
//!
//! Owns the session-wide state (cache, block clock, connected account) and
//! the loop that applies wallet and ledger signals to it. Everything else is
//! handed out from here: views, derived eligibility and workflows.

use std::sync::Arc;

use shared_bus::{EventFilter, EventPublisher, InMemoryEventBus, SessionEvent, Subscription};
use shared_types::{Address, ChainId, RealmId};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::{CacheView, EntityCache};
use crate::config::ClientConfig;
use crate::domain::{
    BlockClock, CacheKey, ClientError, ConfigError, Countdown, Eligibility, EntityValue,
    KeyFilter, QueueEligibility,
};
use crate::ports::{ChainReader, ChainWriter};
use crate::prefetch::Prefetcher;
use crate::queries::RealmQueries;
use crate::workflows::{ActionKind, ActionWorkflow, MintWorkflow, TerraformWorkflow, WorkflowContext};

/// Commands applied by the session loop, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    /// The wallet reported a different account (or none).
    AccountChanged(Option<Address>),
    /// The wallet switched networks; carries the hex chain id.
    ChainChanged(String),
    /// A realm was minted on the ledger.
    RealmCreated(String),
    /// Tear the session down.
    Shutdown,
}

/// Entry point for wallet and provider adapters.
///
/// Foreign callbacks only enqueue here; the session loop does the work.
#[derive(Clone, Debug)]
pub struct SignalHandle {
    tx: mpsc::Sender<SessionCommand>,
}

impl SignalHandle {
    async fn send(&self, command: SessionCommand) -> Result<(), ClientError> {
        self.tx
            .send(command)
            .await
            .map_err(|_| ClientError::WorkflowClosed)
    }

    pub async fn account_changed(&self, account: Option<Address>) -> Result<(), ClientError> {
        self.send(SessionCommand::AccountChanged(account)).await
    }

    pub async fn chain_changed(&self, chain_id: impl Into<String>) -> Result<(), ClientError> {
        self.send(SessionCommand::ChainChanged(chain_id.into())).await
    }

    pub async fn realm_created(&self, realm_id: impl Into<String>) -> Result<(), ClientError> {
        self.send(SessionCommand::RealmCreated(realm_id.into())).await
    }
}

/// One wallet session against the realm contracts.
pub struct RealmSession {
    config: Arc<ClientConfig>,
    cache: EntityCache,
    queries: RealmQueries,
    writer: Arc<dyn ChainWriter>,
    bus: Arc<InMemoryEventBus>,
    account: watch::Receiver<Option<Address>>,
    scope: watch::Receiver<u64>,
    signals: SignalHandle,
    task: JoinHandle<()>,
}

impl RealmSession {
    /// Validate `config`, pick up an already connected account and start the
    /// session loop on the current runtime.
    pub async fn start(
        config: ClientConfig,
        reader: Arc<dyn ChainReader>,
        writer: Arc<dyn ChainWriter>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let config = Arc::new(config);

        let initial = match reader.accounts().await {
            Ok(accounts) => accounts.first().copied(),
            Err(e) => {
                warn!(error = %e, "Could not read wallet accounts, starting disconnected");
                None
            }
        };

        let cache = EntityCache::new(config.cache_capacity);
        let clock = Arc::new(BlockClock::new());
        let bus = Arc::new(InMemoryEventBus::new());
        let (account_tx, account) = watch::channel(initial);
        let (scope_tx, scope) = watch::channel(0u64);
        let (tx, rx) = mpsc::channel(config.command_buffer);

        let queries = RealmQueries::new(cache.clone(), reader, clock.clone(), account.clone());
        let session_loop = SessionLoop {
            config: config.clone(),
            cache: cache.clone(),
            clock,
            bus: bus.clone(),
            account_tx,
            scope_tx,
        };
        let task = tokio::spawn(session_loop.run(rx));

        info!(
            chain = %config.chain,
            connected = initial.is_some(),
            "Realm session started"
        );

        Ok(Self {
            config,
            cache,
            queries,
            writer,
            bus,
            account,
            scope,
            signals: SignalHandle { tx },
            task,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Handle for wallet and provider adapters.
    pub fn signals(&self) -> SignalHandle {
        self.signals.clone()
    }

    pub fn bus(&self) -> Arc<InMemoryEventBus> {
        self.bus.clone()
    }

    pub fn subscribe(&self, filter: EventFilter) -> Subscription {
        self.bus.subscribe(filter)
    }

    pub fn cache(&self) -> &EntityCache {
        &self.cache
    }

    pub fn queries(&self) -> &RealmQueries {
        &self.queries
    }

    /// Connected account.
    pub fn account(&self) -> Option<Address> {
        *self.account.borrow()
    }

    /// Number of cache clears so far.
    pub fn scope(&self) -> u64 {
        *self.scope.borrow()
    }

    /// Ask the wallet for accounts and switch to the first one.
    pub async fn connect_wallet(&self) -> Result<Option<Address>, ClientError> {
        let accounts = self.writer.request_accounts().await?;
        let account = accounts.first().copied();

        if account != self.account() {
            self.signals.account_changed(account).await?;
            let mut current = self.account.clone();
            current
                .wait_for(|current| *current == account)
                .await
                .map_err(|_| ClientError::WorkflowClosed)?;
        }
        self.cache
            .invalidate(KeyFilter::exact([CacheKey::accounts()]));
        Ok(account)
    }

    // -------------------------------------------------------------------------
    // Views
    // -------------------------------------------------------------------------

    pub fn realm(&self, id: &str) -> CacheView {
        self.queries.realm(id)
    }

    pub fn realm_name(&self, id: &str) -> CacheView {
        self.queries.realm_name(id)
    }

    pub fn resources(&self, id: &str) -> CacheView {
        self.queries.resources(id)
    }

    pub fn timers(&self, id: &str) -> CacheView {
        self.queries.timers(id)
    }

    pub fn queue(&self, id: &str) -> CacheView {
        self.queries.queue(id)
    }

    pub fn farms(&self, id: &str) -> CacheView {
        self.queries.farms(id)
    }

    pub fn owner(&self, id: &str) -> Option<CacheView> {
        self.queries.owner(id)
    }

    pub fn accounts(&self) -> CacheView {
        self.queries.accounts()
    }

    pub fn total_supply(&self) -> CacheView {
        self.queries.total_supply()
    }

    pub fn block_timestamp(&self) -> CacheView {
        self.queries.block_timestamp()
    }

    /// Re-read the block clock.
    pub fn refresh_clock(&self) -> usize {
        self.queries.refresh_clock()
    }

    // -------------------------------------------------------------------------
    // Derived state
    // -------------------------------------------------------------------------

    async fn timers_and_clock(&self, id: &str) -> Result<(Option<EntityValue>, Option<u64>), ClientError> {
        let mut timers = self.queries.timers(id);
        let mut clock = self.queries.block_timestamp();
        let (timers, clock) = futures::try_join!(timers.settled(), clock.settled())?;
        Ok((
            timers.value().cloned(),
            clock.value().and_then(EntityValue::as_block_timestamp),
        ))
    }

    /// Action flags for realm `id`. All false while timers or clock are
    /// unavailable.
    pub async fn eligibility(&self, id: &str) -> Result<Eligibility, ClientError> {
        let (timers, now) = self.timers_and_clock(id).await?;
        Ok(Eligibility::derive(
            timers.as_ref().and_then(EntityValue::as_timers),
            now,
        ))
    }

    pub async fn queue_eligibility(&self, id: &str) -> Result<QueueEligibility, ClientError> {
        let mut queue = self.queries.queue(id);
        let mut clock = self.queries.block_timestamp();
        let (queue, clock) = futures::try_join!(queue.settled(), clock.settled())?;
        Ok(QueueEligibility::derive(
            queue.value().and_then(EntityValue::as_queue),
            clock.value().and_then(EntityValue::as_block_timestamp),
        ))
    }

    /// Remaining waits for realm `id`, if timers and clock are known.
    pub async fn countdown(&self, id: &str) -> Result<Option<Countdown>, ClientError> {
        let (timers, now) = self.timers_and_clock(id).await?;
        Ok(Countdown::derive(
            timers.as_ref().and_then(EntityValue::as_timers),
            now,
        ))
    }

    // -------------------------------------------------------------------------
    // Workflows
    // -------------------------------------------------------------------------

    fn workflow_context(&self) -> WorkflowContext {
        WorkflowContext {
            config: self.config.clone(),
            queries: self.queries.clone(),
            writer: self.writer.clone(),
            publisher: self.bus.clone(),
            account: self.account.clone(),
            scope: self.scope.clone(),
        }
    }

    pub fn mint(&self) -> MintWorkflow {
        MintWorkflow::spawn(self.workflow_context())
    }

    pub fn terraform(&self, id: &str) -> Result<TerraformWorkflow, ClientError> {
        let id = RealmId::parse(id)?;
        Ok(TerraformWorkflow::spawn(self.workflow_context(), id))
    }

    pub fn action(&self, id: &str, kind: ActionKind) -> Result<ActionWorkflow, ClientError> {
        let id = RealmId::parse(id)?;
        Ok(ActionWorkflow::new(self.workflow_context(), id, kind))
    }

    pub fn prefetcher(&self) -> Prefetcher {
        Prefetcher::new(self.queries.clone())
    }

    /// Clear the cache, announce the end of the session and stop the loop.
    pub async fn shutdown(self) {
        if self.signals.send(SessionCommand::Shutdown).await.is_ok() {
            if let Err(e) = self.task.await {
                warn!(error = %e, "Session loop ended abnormally");
            }
        }
    }
}

struct SessionLoop {
    config: Arc<ClientConfig>,
    cache: EntityCache,
    clock: Arc<BlockClock>,
    bus: Arc<InMemoryEventBus>,
    account_tx: watch::Sender<Option<Address>>,
    scope_tx: watch::Sender<u64>,
}

impl SessionLoop {
    async fn run(self, mut rx: mpsc::Receiver<SessionCommand>) {
        while let Some(command) = rx.recv().await {
            debug!(?command, "Session command");
            match command {
                SessionCommand::AccountChanged(account) => {
                    self.reset_scope();
                    self.account_tx.send_replace(account);
                    info!(account = ?account.map(|a| a.to_hex()), "Account changed, cache cleared");
                    self.bus
                        .publish(SessionEvent::AccountChanged { account })
                        .await;
                }
                SessionCommand::ChainChanged(chain_id) => {
                    match chain_id.parse::<ChainId>() {
                        Ok(chain) if chain == self.config.chain => {}
                        Ok(chain) => warn!(%chain, expected = %self.config.chain, "Wallet is on another network"),
                        Err(e) => warn!(error = %e, "Wallet is on an unsupported network"),
                    }
                    // Block times of another chain are not comparable.
                    self.clock.reset();
                    self.reset_scope();
                    info!(chain_id = %chain_id, "Chain changed, cache cleared");
                    self.bus
                        .publish(SessionEvent::ChainChanged { chain_id })
                        .await;
                }
                SessionCommand::RealmCreated(realm_id) => {
                    self.cache
                        .invalidate(KeyFilter::exact([CacheKey::current_tokens()]));
                    self.bus
                        .publish(SessionEvent::RealmCreated { realm_id })
                        .await;
                }
                SessionCommand::Shutdown => {
                    self.cache.clear();
                    self.bus.publish(SessionEvent::SessionEnded).await;
                    break;
                }
            }
        }
        info!("Realm session stopped");
    }

    fn reset_scope(&self) {
        self.cache.clear();
        self.scope_tx.send_modify(|scope| *scope += 1);
    }
}
