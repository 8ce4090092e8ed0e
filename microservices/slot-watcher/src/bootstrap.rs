//! Component wiring from configuration

use courtside_core::{CourtsideError, Result};
use courtside_store::{MemorySeenKeyStore, PgSeenKeyStore, PoolConfig, SeenKeyStore, StorePool};
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::{NotifySettings, StoreBackend, StoreSettings, WatcherConfig};
use crate::dedup::DedupGate;
use crate::extract::Extractor;
use crate::notify::{HttpTopicPublisher, LogPublisher, MessageFormatter, MessageTransport, Notifier};
use crate::pipeline::Pipeline;
use crate::upstream::{DiscoverySource, VoloClient};

pub async fn build_store(settings: &StoreSettings) -> Result<Arc<dyn SeenKeyStore>> {
    match settings.backend {
        StoreBackend::Memory => {
            let store = match settings.retention {
                Some(window) => {
                    let window = chrono::Duration::from_std(window)
                        .map_err(|e| CourtsideError::Config(format!("SEEN_KEYS_RETENTION_HOURS: {}", e)))?;
                    MemorySeenKeyStore::with_retention(window)
                }
                None => MemorySeenKeyStore::new(),
            };
            info!(retention = ?settings.retention, "Using in-memory seen-key store");
            Ok(Arc::new(store))
        }
        StoreBackend::Postgres => {
            if settings.retention.is_some() {
                warn!("SEEN_KEYS_RETENTION_HOURS is ignored by the postgres backend; keys are kept forever");
            }
            let pool = StorePool::new(&PoolConfig {
                url: settings.url.clone(),
                max_size: settings.pool_size,
                connect_timeout: settings.timeout,
            })
            .map_err(|e| CourtsideError::Database(e.to_string()))?;
            let store = PgSeenKeyStore::new(pool, &settings.table)
                .map_err(|e| CourtsideError::Config(e.to_string()))?;

            // Unreachable at start is not fatal: runs fail at the dedup stage
            // and readiness reports the store as down until it comes back.
            match tokio::time::timeout(settings.timeout, store.ensure_schema()).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!(table = %settings.table, error = %e, "Could not ensure seen-key table")
                }
                Err(_) => warn!(
                    table = %settings.table,
                    timeout = ?settings.timeout,
                    "Timed out ensuring seen-key table"
                ),
            }
            Ok(Arc::new(store))
        }
    }
}

pub fn build_transport(settings: &NotifySettings) -> Result<Arc<dyn MessageTransport>> {
    if settings.dry_run {
        warn!(topic = %settings.topic, "NOTIFY_DRY_RUN set, alerts are only logged and never marked seen");
        return Ok(Arc::new(LogPublisher::new(settings.topic.clone())));
    }

    let endpoint = settings.endpoint.as_ref().ok_or_else(|| {
        CourtsideError::Config(
            "NOTIFY_ENDPOINT is not set; set it or enable NOTIFY_DRY_RUN".to_string(),
        )
    })?;
    let publisher = HttpTopicPublisher::new(endpoint.clone(), settings.topic.clone(), settings.timeout)
        .map_err(|e| CourtsideError::Config(e.to_string()))?;
    info!(%endpoint, topic = %settings.topic, "Publishing alerts over HTTP");
    Ok(Arc::new(publisher))
}

pub async fn build_pipeline(config: &WatcherConfig) -> Result<Pipeline> {
    let source: Arc<dyn DiscoverySource> = Arc::new(VoloClient::new(&config.upstream)?);
    let store = build_store(&config.store).await?;
    let transport = build_transport(&config.notify)?;

    Ok(Pipeline::new(
        source,
        Extractor::from_settings(&config.upstream),
        DedupGate::new(store, config.store.timeout),
        Notifier::new(
            transport,
            MessageFormatter::new(config.upstream.display_tz),
            config.notify.mode,
            config.notify.timeout,
        ),
    ))
}
