//! Process-wide state: the shared score store, the project registry, and
//! one wired context per enabled project.

use crate::latency::LatencyTracker;
use crate::projects::{ProjectEntry, ProjectRegistry};
use anyhow::{Context as AnyhowContext, Result};
use foresight_indexer::{ChangeLog, ProjectIndexer, StreamingIndexer, StreamingIndexerConfig};
use foresight_predict::{CapturePipeline, CaptureWorker, EngineConfig, PredictionEngine};
use foresight_ranking::{Keys, MemoryStore};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub const QUERY_TIMEOUT: Duration = Duration::from_millis(500);
pub const SCAN_TIMEOUT: Duration = Duration::from_secs(5);

/// Target rolling hit rate reported by `/metrics`.
pub const HIT_RATE_TARGET: f64 = 0.5;

const STORE_FILE: &str = "store.json";
const REGISTRY_FILE: &str = "projects.json";
const SETTINGS_TEMPLATE_FILE: &str = "settings.template.json";

#[must_use]
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[must_use]
pub fn now_s() -> u64 {
    now_ms() / 1_000
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub watch: bool,
}

impl AppConfig {
    #[must_use]
    pub fn with_data_dir(data_dir: PathBuf) -> Self {
        Self {
            data_dir,
            watch: true,
        }
    }

    /// Data dir from `FORESIGHT_DATA_DIR`, falling back to `~/.foresight`.
    #[must_use]
    pub fn from_env() -> Self {
        let data_dir = std::env::var_os("FORESIGHT_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                let home = std::env::var_os("HOME").map_or_else(
                    || PathBuf::from("."),
                    PathBuf::from,
                );
                home.join(".foresight")
            });
        Self::with_data_dir(data_dir)
    }
}

/// Everything bound to one enabled project.
pub struct ProjectContext {
    pub entry: ProjectEntry,
    pub indexer: Arc<ProjectIndexer>,
    pub streaming: Option<StreamingIndexer>,
    pub changes: Arc<ChangeLog>,
    pub engine: Arc<PredictionEngine>,
    pub capture: Arc<CapturePipeline>,
    pub worker: CaptureWorker,
    pub latency: LatencyTracker,
}

pub struct AppState {
    config: AppConfig,
    store: Arc<MemoryStore>,
    registry: Mutex<ProjectRegistry>,
    contexts: RwLock<HashMap<String, Arc<ProjectContext>>>,
}

impl AppState {
    /// Load persisted state and wire a context for every enabled project.
    pub async fn initialize(config: AppConfig) -> Result<Arc<Self>> {
        tokio::fs::create_dir_all(&config.data_dir)
            .await
            .with_context(|| format!("cannot create data dir {}", config.data_dir.display()))?;

        let store_path = config.data_dir.join(STORE_FILE);
        let store = if store_path.exists() {
            match MemoryStore::load(&store_path).await {
                Ok(store) => Arc::new(store),
                Err(e) => {
                    log::warn!("score store corrupt ({e}), starting fresh");
                    Arc::new(MemoryStore::new())
                }
            }
        } else {
            Arc::new(MemoryStore::new())
        };

        let registry = ProjectRegistry::load(&config.data_dir.join(REGISTRY_FILE))?;
        write_settings_template(&config.data_dir).await?;

        let state = Arc::new(Self {
            config,
            store,
            registry: Mutex::new(registry),
            contexts: RwLock::new(HashMap::new()),
        });

        let enabled: Vec<ProjectEntry> = {
            let registry = state.registry.lock().expect("registry lock poisoned");
            registry
                .projects
                .iter()
                .filter(|p| p.enabled)
                .cloned()
                .collect()
        };
        for entry in enabled {
            if let Err(e) = state.build_context(entry.clone()).await {
                log::warn!("skipping project {} ({}): {e}", entry.uuid, entry.root_path.display());
            }
        }

        Ok(state)
    }

    /// Enable (and index) a project root, making it the active project.
    pub async fn enable_project(&self, root: &Path) -> Result<Arc<ProjectContext>> {
        let entry = {
            let mut registry = self.registry.lock().expect("registry lock poisoned");
            let entry = registry.enable(root);
            registry.save(&self.config.data_dir.join(REGISTRY_FILE))?;
            entry
        };
        if let Some(existing) = self.context(&entry.uuid) {
            return Ok(existing);
        }
        self.build_context(entry).await
    }

    async fn build_context(&self, entry: ProjectEntry) -> Result<Arc<ProjectContext>> {
        let index_path = self
            .config
            .data_dir
            .join(format!("index-{}.json", entry.uuid));
        let indexer = Arc::new(ProjectIndexer::new(&entry.root_path, &index_path).await?);
        // Initial sweep; cheap when the persisted index is current.
        indexer.index().await?;

        let changes = Arc::new(ChangeLog::new(now_s()));
        let streaming = if self.config.watch {
            match StreamingIndexer::start(
                Arc::clone(&indexer),
                Arc::clone(&changes),
                StreamingIndexerConfig::default(),
            ) {
                Ok(streaming) => Some(streaming),
                Err(e) => {
                    log::warn!("file watcher unavailable for {}: {e}", entry.uuid);
                    None
                }
            }
        } else {
            None
        };

        let keys = Keys::new(entry.uuid.clone());
        let store: Arc<dyn foresight_ranking::ScoreStore> = self.store.clone();
        let mut engine = PredictionEngine::new(
            Arc::clone(&store),
            keys.clone(),
            entry.root_path.clone(),
            EngineConfig::default(),
        );
        let symbol_store = indexer.store();
        engine.set_index_probe(Arc::new(move |path: &str| {
            symbol_store.contains_path(path) || Path::new(path).is_absolute()
        }));
        let engine = Arc::new(engine);

        let capture = Arc::new(CapturePipeline::new(Arc::clone(&engine)));
        let worker = CaptureWorker::start(Arc::clone(&capture));
        let latency = LatencyTracker::new(Arc::clone(&store), keys);

        let context = Arc::new(ProjectContext {
            entry: entry.clone(),
            indexer,
            streaming,
            changes,
            engine,
            capture,
            worker,
            latency,
        });
        self.contexts
            .write()
            .expect("contexts lock poisoned")
            .insert(entry.uuid.clone(), Arc::clone(&context));
        log::info!("project {} ready at {}", entry.uuid, entry.root_path.display());
        Ok(context)
    }

    #[must_use]
    pub fn context(&self, uuid: &str) -> Option<Arc<ProjectContext>> {
        self.contexts
            .read()
            .expect("contexts lock poisoned")
            .get(uuid)
            .cloned()
    }

    #[must_use]
    pub fn active_context(&self) -> Option<Arc<ProjectContext>> {
        let uuid = {
            let registry = self.registry.lock().expect("registry lock poisoned");
            registry.active.clone()?
        };
        self.context(&uuid)
    }

    #[must_use]
    pub fn all_contexts(&self) -> Vec<Arc<ProjectContext>> {
        self.contexts
            .read()
            .expect("contexts lock poisoned")
            .values()
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn store(&self) -> Arc<MemoryStore> {
        Arc::clone(&self.store)
    }

    /// Persist the score store snapshot.
    pub async fn flush(&self) -> Result<()> {
        self.store
            .save(self.config.data_dir.join(STORE_FILE))
            .await?;
        Ok(())
    }
}

async fn write_settings_template(data_dir: &Path) -> Result<()> {
    let path = data_dir.join(SETTINGS_TEMPLATE_FILE);
    if path.exists() {
        return Ok(());
    }
    let template = serde_json::json!({
        "service_url": "http://127.0.0.1:8700",
        "hooks": {
            "post_tool_use": { "endpoint": "/intent", "timeout_ms": 2000 },
            "prompt_submit": { "endpoint": "/intent", "timeout_ms": 2000 },
            "session_start": { "endpoint": "/intent", "timeout_ms": 1000 }
        }
    });
    tokio::fs::write(&path, serde_json::to_vec_pretty(&template)?)
        .await
        .with_context(|| format!("cannot write {}", path.display()))?;
    Ok(())
}
