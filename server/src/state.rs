use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use branchmap_shared::SiteTable;
use chrono::{DateTime, Utc};
use tokio::sync::OnceCell;
use tracing::{error, info, warn};

use crate::color_store::ColorTagStore;
use crate::config::Settings;
use crate::loader::{LoadError, load_from_path};

type LoadedSites = Result<Arc<SiteTable>, LoadError>;

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    /// Filled by the first request that needs the sheet; never re-read.
    sites: Arc<OnceCell<LoadedSites>>,
    pub color_tags: ColorTagStore,
    pub started_at: DateTime<Utc>,
    pub observability: Arc<ObservabilityCounters>,
}

#[derive(Debug, Default)]
pub struct ObservabilityCounters {
    view_requests_total: AtomicU64,
    exports_total: AtomicU64,
    color_changes_total: AtomicU64,
    persist_failures_total: AtomicU64,
}

#[derive(Debug, Clone, Copy)]
pub struct ObservabilitySnapshot {
    pub view_requests_total: u64,
    pub exports_total: u64,
    pub color_changes_total: u64,
    pub persist_failures_total: u64,
}

impl ObservabilityCounters {
    pub fn snapshot(&self) -> ObservabilitySnapshot {
        ObservabilitySnapshot {
            view_requests_total: self.view_requests_total.load(Ordering::Relaxed),
            exports_total: self.exports_total.load(Ordering::Relaxed),
            color_changes_total: self.color_changes_total.load(Ordering::Relaxed),
            persist_failures_total: self.persist_failures_total.load(Ordering::Relaxed),
        }
    }

    pub fn record_view_request(&self) {
        self.view_requests_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_export(&self) {
        self.exports_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_color_change(&self) {
        self.color_changes_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_persist_failure(&self) {
        self.persist_failures_total.fetch_add(1, Ordering::Relaxed);
    }
}

impl AppState {
    pub fn new(settings: Settings, color_tags: ColorTagStore) -> Self {
        Self {
            settings: Arc::new(settings),
            sites: Arc::new(OnceCell::new()),
            color_tags,
            started_at: Utc::now(),
            observability: Arc::new(ObservabilityCounters::default()),
        }
    }

    /// State with the sheet already in place, skipping the file read.
    #[cfg(test)]
    pub fn with_sites(settings: Settings, color_tags: ColorTagStore, sites: LoadedSites) -> Self {
        let state = Self::new(settings, color_tags);
        let _ = state.sites.set(sites);
        state
    }

    pub async fn sites(&self) -> LoadedSites {
        self.sites
            .get_or_init(|| self.load_sites())
            .await
            .clone()
    }

    /// Row count once the sheet has been read successfully.
    pub fn loaded_site_count(&self) -> Option<usize> {
        match self.sites.get() {
            Some(Ok(table)) => Some(table.len()),
            _ => None,
        }
    }

    pub fn load_failure(&self) -> Option<&LoadError> {
        match self.sites.get() {
            Some(Err(e)) => Some(e),
            _ => None,
        }
    }

    async fn load_sites(&self) -> LoadedSites {
        let path = self.settings.sites_path.clone();
        let layout = self.settings.layout;
        let started = Instant::now();

        let result = tokio::task::spawn_blocking(move || load_from_path(&path, layout)).await;
        match result {
            Ok(Ok(report)) => {
                if report.skipped_rows > 0 {
                    warn!(
                        skipped = report.skipped_rows,
                        "dropped rows without usable coordinates"
                    );
                }
                info!(
                    path = %self.settings.sites_path.display(),
                    ?layout,
                    rows = report.table.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "loaded site sheet"
                );
                Ok(Arc::new(report.table))
            }
            Ok(Err(e)) => {
                error!(path = %self.settings.sites_path.display(), error = %e, "failed to load site sheet");
                Err(e)
            }
            Err(e) => {
                error!(error = %e, "site sheet loader task failed");
                Err(LoadError::Interrupted(e.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::loader::tests::provincial_fixture;
    use crate::routes::api::tests::test_settings;

    fn state_for(path: &std::path::Path) -> AppState {
        let mut settings = test_settings();
        settings.sites_path = path.to_path_buf();
        AppState::new(settings, ColorTagStore::in_memory())
    }

    #[tokio::test]
    async fn sheet_is_read_once_per_process() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("sites.xlsx");
        tokio::fs::write(&path, provincial_fixture())
            .await
            .expect("write fixture");

        let state = state_for(&path);
        assert_eq!(state.loaded_site_count(), None);
        let first = state.sites().await.expect("fixture should load");
        assert_eq!(first.len(), 3);

        tokio::fs::remove_file(&path).await.expect("remove fixture");
        let second = state.sites().await.expect("table stays cached");
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(state.loaded_site_count(), Some(3));
        assert!(state.load_failure().is_none());
    }

    #[tokio::test]
    async fn load_failure_is_kept_until_restart() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("sites.xlsx");

        let state = state_for(&path);
        let err = state.sites().await.expect_err("file does not exist yet");
        assert!(matches!(err, LoadError::Open { .. }));

        tokio::fs::write(&path, provincial_fixture())
            .await
            .expect("write fixture");
        let again = state.sites().await.expect_err("failure stays cached");
        assert_eq!(again, err);
        assert_eq!(state.load_failure(), Some(&err));
        assert_eq!(state.loaded_site_count(), None);

        let restarted = state_for(&path);
        let table = restarted.sites().await.expect("fresh state reads the new file");
        assert_eq!(table.len(), 3);
    }
}
