use std::sync::Arc;

use log::{debug, info};

use crate::config::{DispatcherKind, RuntimeConfig, RuntimeDefaults};
use crate::reactive::{ReactiveEvaluator, ReactiveRegistry};
use crate::schema::SchemaCore;
use crate::sync::cache::{LocalCache, ThingRecord};
use crate::sync::error::{SyncError, SyncResult};
use crate::sync::operations::{ActionInvocation, ThingQuery};
use crate::sync::pending::{
    CallerDispatcher, Completer, Dispatcher, PendingResult, SpawnDispatcher,
};
use crate::sync::remote::{RemoteBoundary, RemoteRequest};

/// How the composite save flow classified its result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// No prior local state was found before the mutation
    NewlyAdded,
    /// The local-only read captured existing state
    AlreadyPresent,
}

/// Result of the composite save flow
#[derive(Debug, Clone, PartialEq)]
pub struct SaveReport {
    pub outcome: SaveOutcome,
    pub record: ThingRecord,
}

/// Orchestrates local-cache reads, optimistic mutation application, and
/// remote reconciliation.
///
/// Every operation is exposed as a cancelable one-shot [`PendingResult`].
/// The resolved schema graph behind the core is immutable and shared; the
/// cache boundary guarantees linearizable per-record writes; the remote
/// boundary hides transport entirely.
#[derive(Clone)]
pub struct SyncRuntime {
    core: SchemaCore,
    cache: Arc<dyn LocalCache>,
    remote: Arc<dyn RemoteBoundary>,
    evaluator: Arc<ReactiveEvaluator>,
    dispatcher: Arc<dyn Dispatcher>,
    defaults: RuntimeDefaults,
}

impl SyncRuntime {
    pub fn new(
        core: SchemaCore,
        cache: Arc<dyn LocalCache>,
        remote: Arc<dyn RemoteBoundary>,
        registry: Arc<ReactiveRegistry>,
        config: &RuntimeConfig,
    ) -> Self {
        let defaults = config.apply_to(core.defaults());
        let dispatcher: Arc<dyn Dispatcher> = match config.dispatcher {
            DispatcherKind::Caller => Arc::new(CallerDispatcher),
            DispatcherKind::Spawn => Arc::new(SpawnDispatcher),
        };
        let evaluator = Arc::new(ReactiveEvaluator::new(
            Arc::clone(core.graph()),
            registry,
        ));
        info!(
            "Sync runtime ready for schema '{}' (default remote: {:?})",
            core.graph().name(),
            defaults.remote
        );
        Self {
            core,
            cache,
            remote,
            evaluator,
            dispatcher,
            defaults,
        }
    }

    /// Replaces the callback dispatcher (e.g. with a UI-thread dispatcher)
    pub fn with_dispatcher(mut self, dispatcher: Arc<dyn Dispatcher>) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    /// The schema facade this runtime was built over
    pub fn core(&self) -> &SchemaCore {
        &self.core
    }

    /// The resolved defaults threaded through this runtime's operations
    pub fn defaults(&self) -> &RuntimeDefaults {
        &self.defaults
    }

    /// Resolves a thing purely from the local cache and the reactive
    /// evaluator.
    ///
    /// Never performs network I/O. Absence of data is a valid success
    /// value, not an error.
    pub fn local_read(&self, query: ThingQuery) -> PendingResult<Option<ThingRecord>> {
        let (pending, completer) = PendingResult::channel(Arc::clone(&self.dispatcher));
        let runtime = self.clone();
        tokio::spawn(async move {
            if completer.abandon_requested() {
                completer.fail(SyncError::Cancelled);
                return;
            }
            match runtime.read_local(&query) {
                Ok(record) => completer.succeed(record),
                Err(error) => completer.fail(error),
            }
        });
        pending
    }

    /// Performs a full sync.
    ///
    /// With an action, applies the mutation's optimistic local effect
    /// first, issues the action to the remote boundary, and merges the
    /// authoritative response into the local cache. With no action,
    /// performs the same remote resolution as a pure query.
    pub fn sync(
        &self,
        query: ThingQuery,
        action: Option<ActionInvocation>,
    ) -> PendingResult<ThingRecord> {
        let (pending, completer) = PendingResult::channel(Arc::clone(&self.dispatcher));
        let runtime = self.clone();
        tokio::spawn(async move {
            runtime.run_sync(query, action, completer).await;
        });
        pending
    }

    /// Composite save flow.
    ///
    /// Stage one reads the target locally to capture prior state without
    /// blocking on the network; its failure is informational and treated as
    /// absence. Stage two issues the full sync with the mutation, and only
    /// starts after stage one's completion has fired. The report branches
    /// on stage one's captured state, so "newly added" vs "already present"
    /// costs no extra round trip.
    pub fn save(
        &self,
        query: ThingQuery,
        action: ActionInvocation,
    ) -> PendingResult<SaveReport> {
        let (pending, completer) = PendingResult::channel(Arc::clone(&self.dispatcher));
        let runtime = self.clone();
        tokio::spawn(async move {
            let stage_one = runtime.local_read(query.clone());
            let mut stage_one_completion = stage_one.completion();
            let prior = stage_one.outcome().await.unwrap_or(None);
            stage_one_completion.wait().await;

            // Cancellation window between the stages: stage two must not
            // start once the composite has been abandoned.
            if completer.abandon_requested() {
                completer.fail(SyncError::Cancelled);
                return;
            }

            let stage_two = runtime.sync(query, Some(action));
            let forward = {
                let handle = stage_two.abandon_handle();
                let mut abandon = completer.abandon_watch();
                tokio::spawn(async move {
                    if abandon.wait_for(|requested| *requested).await.is_ok() {
                        handle.abandon();
                    }
                })
            };
            let outcome = stage_two.outcome().await;
            forward.abort();

            match outcome {
                Ok(record) => {
                    let saved = match prior {
                        Some(_) => SaveOutcome::AlreadyPresent,
                        None => SaveOutcome::NewlyAdded,
                    };
                    completer.succeed(SaveReport {
                        outcome: saved,
                        record,
                    });
                }
                Err(error) => completer.fail(error),
            }
        });
        pending
    }

    fn read_local(&self, query: &ThingQuery) -> SyncResult<Option<ThingRecord>> {
        let record = self.cache.get(&query.thing, &query.key)?;
        match record {
            Some(mut record) => {
                let recomputed = self.evaluator.refresh(&mut record)?;
                if !recomputed.is_empty() {
                    self.cache.put(record.clone())?;
                }
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    async fn run_sync(
        &self,
        query: ThingQuery,
        action: Option<ActionInvocation>,
        completer: Completer<ThingRecord>,
    ) {
        // Optimistic local effect before the remote round trip.
        if let Some(invocation) = &action {
            match self.apply_optimistic(&query, invocation) {
                Ok(()) => {}
                Err(error) => {
                    completer.fail(error);
                    return;
                }
            }
        }

        let request = self.route(&query, action);
        let mut abandon = completer.abandon_watch();
        let remote = Arc::clone(&self.remote);
        tokio::select! {
            _ = abandon.wait_for(|requested| *requested) => {
                completer.fail(SyncError::Cancelled);
            }
            response = remote.execute(request) => match response {
                Ok(record) => match self.reconcile(record) {
                    Ok(record) => completer.succeed(record),
                    Err(error) => completer.fail(error),
                },
                Err(error) => completer.fail(error),
            }
        }
    }

    /// Merges the action payload into the cache and runs the downstream
    /// reactive closure, atomically per record
    fn apply_optimistic(
        &self,
        query: &ThingQuery,
        invocation: &ActionInvocation,
    ) -> SyncResult<()> {
        let mut record = self
            .cache
            .merge(&query.thing, &query.key, &invocation.payload)?;
        let changed: Vec<String> = invocation.payload.keys().cloned().collect();
        let recomputed = self.evaluator.react(&mut record, &changed)?;
        if !recomputed.is_empty() {
            self.cache.put(record)?;
        }
        debug!(
            "Applied optimistic effect of {} ({}) to {}:{}",
            invocation.action, invocation.idempotency_hash, query.thing, query.key
        );
        Ok(())
    }

    /// Writes the authoritative remote response back into the cache as a
    /// single atomic replacement
    fn reconcile(&self, mut record: ThingRecord) -> SyncResult<ThingRecord> {
        self.evaluator.refresh(&mut record)?;
        self.cache.put(record.clone())?;
        debug!("Reconciled {}:{} from remote", record.thing, record.key);
        Ok(record)
    }

    /// Routes a request through the syncable's merged endpoint
    /// configuration, falling back to the runtime defaults.
    ///
    /// An action's endpoint takes precedence over the queried thing's.
    fn route(&self, query: &ThingQuery, action: Option<ActionInvocation>) -> RemoteRequest {
        let endpoint = action
            .as_ref()
            .and_then(|a| self.core.find(&a.action))
            .and_then(|d| d.endpoint().cloned())
            .or_else(|| {
                self.core
                    .find(&query.thing)
                    .and_then(|d| d.endpoint().cloned())
            });

        let (path, remote, auth) = match endpoint {
            Some(config) => (config.path, config.remote, config.auth),
            None => (None, None, None),
        };
        RemoteRequest {
            query: query.clone(),
            action,
            path,
            remote: remote.or_else(|| self.defaults.remote.clone()),
            auth: auth.or_else(|| self.defaults.auth.clone()),
        }
    }
}
