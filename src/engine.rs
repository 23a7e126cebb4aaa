use std::{collections::HashMap, sync::Arc, time::Duration};

use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, warn};

use crate::{
    builder::{build_conversion, build_deposit, build_placement},
    config::Config,
    covariates::CovariateLog,
    error::{AdEventError, Result},
    event_id::EventIdGenerator,
    gate::PermissionGate,
    observer::{AdEventOutcome, ObserverSet},
    placement::{AdDescriptor, AdEventType, AdPlacementInfo, AdType},
    store::{AdEventRecord, PlacementStore, has_fired_event},
    validation,
};

/// Coordinates builders, store writes, the permission gate, and observer
/// notification for ad placements of one ad type.
///
/// Store operations run off the async executor under a timeout; writes
/// for one placement are single-flight while distinct placements proceed
/// concurrently.
pub struct AdEngine {
    ad_type: AdType,
    store: Arc<dyn PlacementStore>,
    gate: PermissionGate,
    observers: ObserverSet,
    covariates: Arc<Mutex<CovariateLog>>,
    event_ids: EventIdGenerator,
    store_timeout: Duration,
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl AdEngine {
    pub fn new(
        ad_type: AdType,
        store: Arc<dyn PlacementStore>,
        gate: PermissionGate,
        observers: ObserverSet,
        worker_id: u16,
    ) -> Self {
        Self {
            ad_type,
            store,
            gate,
            observers,
            covariates: Arc::new(Mutex::new(CovariateLog::new())),
            event_ids: EventIdGenerator::new(worker_id),
            store_timeout: Duration::from_millis(crate::config::DEFAULT_STORE_TIMEOUT_MS),
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Engine wired the way the config file describes: caps, observers,
    /// worker id, and store timeout all come from `config`.
    pub fn from_config(ad_type: AdType, store: Arc<dyn PlacementStore>, config: &Config) -> Self {
        let gate = PermissionGate::with_caps(config.caps.ads_per_hour, config.caps.ads_per_day);
        let observers = ObserverSet::from_config(&config.observers);
        Self::new(ad_type, store, gate, observers, config.worker_id)
            .with_store_timeout(config.store_timeout())
    }

    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    pub fn ad_type(&self) -> AdType {
        self.ad_type
    }

    pub fn observers(&self) -> &ObserverSet {
        &self.observers
    }

    pub fn covariate_log(&self) -> Arc<Mutex<CovariateLog>> {
        Arc::clone(&self.covariates)
    }

    /// Fires one ad event for a placement. Failures are returned to the
    /// caller and fanned out to observers as a failure outcome carrying
    /// the placement id, creative instance id, and event type.
    pub async fn fire_event(
        &self,
        placement_id: &str,
        descriptor: AdDescriptor,
        event_type: AdEventType,
    ) -> Result<AdEventRecord> {
        let placement = build_placement(placement_id, self.ad_type, descriptor);
        match self.fire_event_checked(&placement, event_type).await {
            Ok(record) => Ok(record),
            Err(err) => {
                warn!(
                    placement_id = %placement.placement_id,
                    creative_instance_id = %placement.creative_instance_id,
                    event_type = %event_type,
                    "failed to fire ad event: {err}"
                );
                self.notify(AdEventOutcome::Failed {
                    placement_id: placement.placement_id.clone(),
                    creative_instance_id: placement.creative_instance_id.clone(),
                    event_type,
                })
                .await;
                Err(err)
            }
        }
    }

    async fn fire_event_checked(
        &self,
        placement: &AdPlacementInfo,
        event_type: AdEventType,
    ) -> Result<AdEventRecord> {
        validation::ensure_placement(placement)?;

        let lock = self.lock_for(&placement.placement_id);
        let _guard = lock.lock().await;

        let history = self.query_events().await?;
        self.gate.evaluate(&history, Utc::now())?;

        let deposit = build_deposit(placement);
        self.persist("save deposit", move |store| store.save_deposit(&deposit))
            .await?;
        debug!(placement_id = %placement.placement_id, "saved deposit");

        if let Some(conversion) = build_conversion(placement) {
            self.persist("save conversion", move |store| {
                store.save_conversion(&conversion)
            })
            .await?;
            debug!(placement_id = %placement.placement_id, "saved conversion");
        }

        let events = self.query_events().await?;

        if event_type == AdEventType::Viewed {
            if has_fired_event(&events, &placement.placement_id, AdEventType::Viewed) {
                return Err(AdEventError::NotPermitted(format!(
                    "placement {} was already viewed",
                    placement.placement_id
                )));
            }
            // Every Viewed must sit behind a Served record; surfaces that
            // deliver ads out-of-band never fire Served themselves.
            if !has_fired_event(&events, &placement.placement_id, AdEventType::Served) {
                let served = self.append(placement, AdEventType::Served).await?;
                self.covariates
                    .lock()
                    .set_impression_served_at(served.created_at);
                self.notify(AdEventOutcome::Served(placement.clone())).await;
            }
        }

        let record = self.append(placement, event_type).await?;
        match event_type {
            AdEventType::Served => {
                self.covariates
                    .lock()
                    .set_impression_served_at(record.created_at);
            }
            AdEventType::Viewed => {}
            AdEventType::Clicked => {
                self.covariates.lock().set_was_clicked(true);
            }
        }

        let outcome = match event_type {
            AdEventType::Served => AdEventOutcome::Served(placement.clone()),
            AdEventType::Viewed => AdEventOutcome::Viewed(placement.clone()),
            AdEventType::Clicked => AdEventOutcome::Clicked(placement.clone()),
        };
        self.notify(outcome).await;

        Ok(record)
    }

    // Observers may block (webhooks), so fan-out runs off the executor.
    async fn notify(&self, outcome: AdEventOutcome) {
        let observers = self.observers.clone();
        let _ = tokio::task::spawn_blocking(move || observers.notify(&outcome)).await;
    }

    async fn append(
        &self,
        placement: &AdPlacementInfo,
        event_type: AdEventType,
    ) -> Result<AdEventRecord> {
        let record = AdEventRecord::build(self.event_ids.next_id(), placement, event_type);
        let stored = record.clone();
        self.persist("append event", move |store| store.append_event(&stored))
            .await?;
        Ok(record)
    }

    async fn query_events(&self) -> Result<Vec<AdEventRecord>> {
        let ad_type = self.ad_type;
        self.store_call("query events", move |store| store.events_for_type(ad_type))
            .await
            .map_err(|err| match err {
                unavailable @ AdEventError::StoreUnavailable(_) => unavailable,
                other => AdEventError::StoreUnavailable(other.to_string()),
            })
    }

    async fn persist<T, F>(&self, op: &'static str, call: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&dyn PlacementStore) -> Result<T> + Send + 'static,
    {
        self.store_call(op, call).await.map_err(|err| match err {
            unavailable @ AdEventError::StoreUnavailable(_) => unavailable,
            other => AdEventError::PersistenceFailed(other.to_string()),
        })
    }

    async fn store_call<T, F>(&self, op: &'static str, call: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&dyn PlacementStore) -> Result<T> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        let task = tokio::task::spawn_blocking(move || call(store.as_ref()));
        match tokio::time::timeout(self.store_timeout, task).await {
            Err(_) => Err(AdEventError::StoreUnavailable(format!(
                "{op} timed out after {}ms",
                self.store_timeout.as_millis()
            ))),
            Ok(Err(join_err)) => Err(AdEventError::StoreUnavailable(format!(
                "{op} worker failed: {join_err}"
            ))),
            Ok(Ok(result)) => result,
        }
    }

    fn lock_for(&self, placement_id: &str) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock();
        Arc::clone(
            locks
                .entry(placement_id.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(()))),
        )
    }
}
