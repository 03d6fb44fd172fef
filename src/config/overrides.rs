//! Persisted configuration overrides.
//!
//! Operators can change prompts, models and retrieval depth at runtime. A value
//! stored here wins over the static configuration file; absent keys fall back to it.

use super::prompts::Prompts;
use super::settings::{LlmProvider, Settings};
use crate::error::{AifaqError, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, RwLock};
use tracing::{debug, info, instrument};

pub const KEY_SYSTEM_PROMPT: &str = "system_prompt";
pub const KEY_QUERY_REWRITING_PROMPT: &str = "query_rewriting_prompt";
pub const KEY_MODEL_NAME: &str = "model_name";
pub const KEY_LLM_PROVIDER: &str = "llm_provider";
pub const KEY_EMBEDDING_MODEL: &str = "embedding_model";
pub const KEY_NR_RETRIEVED_DOCUMENTS: &str = "nr_retrieved_documents";
pub const KEY_USE_QUERY_REWRITING: &str = "use_query_rewriting";

/// Keys that may be overridden.
pub const OVERRIDE_KEYS: &[&str] = &[
    KEY_SYSTEM_PROMPT,
    KEY_QUERY_REWRITING_PROMPT,
    KEY_MODEL_NAME,
    KEY_LLM_PROVIDER,
    KEY_EMBEDDING_MODEL,
    KEY_NR_RETRIEVED_DOCUMENTS,
    KEY_USE_QUERY_REWRITING,
];

/// Key/value store for persisted overrides.
pub trait OverrideStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;

    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove an override. Returns whether one existed.
    fn remove(&self, key: &str) -> Result<bool>;

    fn all(&self) -> Result<HashMap<String, String>>;
}

/// Reject keys the runtime does not know about.
pub fn check_key(key: &str) -> Result<()> {
    if OVERRIDE_KEYS.contains(&key) {
        Ok(())
    } else {
        Err(AifaqError::InvalidInput(format!(
            "Unknown override key '{}'. Valid keys: {}",
            key,
            OVERRIDE_KEYS.join(", ")
        )))
    }
}

/// Resolve a key: persisted override first, then static default.
pub fn resolve(
    key: &str,
    overrides: &HashMap<String, String>,
    defaults: &HashMap<String, String>,
) -> Option<String> {
    overrides
        .get(key)
        .filter(|v| !v.trim().is_empty())
        .or_else(|| defaults.get(key))
        .cloned()
}

/// SQLite-backed override store.
pub struct SqliteOverrideStore {
    conn: Mutex<Connection>,
}

impl SqliteOverrideStore {
    /// Open (or create) the override database.
    #[instrument(skip_all)]
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        Self::init(&conn)?;
        info!("Opened override store at {:?}", path);
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory store (useful for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn init(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS overrides (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            "#,
        )?;
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| AifaqError::Config(format!("Failed to acquire lock: {}", e)))
    }
}

impl OverrideStore for SqliteOverrideStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let conn = self.lock()?;
        let value = conn
            .query_row(
                "SELECT value FROM overrides WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        check_key(key)?;
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO overrides (key, value, updated_at) VALUES (?1, ?2, ?3)",
            params![key, value, chrono::Utc::now().to_rfc3339()],
        )?;
        debug!("Stored override for {}", key);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<bool> {
        let conn = self.lock()?;
        let removed = conn.execute("DELETE FROM overrides WHERE key = ?1", params![key])?;
        Ok(removed > 0)
    }

    fn all(&self) -> Result<HashMap<String, String>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT key, value FROM overrides")?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
        let mut map = HashMap::new();
        for row in rows {
            let (key, value): (String, String) = row?;
            map.insert(key, value);
        }
        Ok(map)
    }
}

/// In-memory override store.
#[derive(Default)]
pub struct MemoryOverrideStore {
    values: RwLock<HashMap<String, String>>,
}

impl MemoryOverrideStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl OverrideStore for MemoryOverrideStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let values = self
            .values
            .read()
            .map_err(|e| AifaqError::Config(e.to_string()))?;
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        check_key(key)?;
        let mut values = self
            .values
            .write()
            .map_err(|e| AifaqError::Config(e.to_string()))?;
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<bool> {
        let mut values = self
            .values
            .write()
            .map_err(|e| AifaqError::Config(e.to_string()))?;
        Ok(values.remove(key).is_some())
    }

    fn all(&self) -> Result<HashMap<String, String>> {
        let values = self
            .values
            .read()
            .map_err(|e| AifaqError::Config(e.to_string()))?;
        Ok(values.clone())
    }
}

/// Configuration after applying persisted overrides to the static settings.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub provider: LlmProvider,
    pub model_name: String,
    pub embedding_model: String,
    pub temperature: f32,
    pub system_prompt: String,
    pub query_rewriting_prompt: String,
    pub domain_context: String,
    pub nr_retrieved_documents: usize,
    pub use_query_rewriting: bool,
}

impl RuntimeConfig {
    /// Resolve every overridable key against the store.
    pub fn resolve(settings: &Settings, store: &dyn OverrideStore) -> Result<Self> {
        let overrides = store.all()?;
        Self::from_layers(settings, &overrides)
    }

    /// Resolve from an explicit override map.
    pub fn from_layers(settings: &Settings, overrides: &HashMap<String, String>) -> Result<Self> {
        let prompts = Prompts::load(
            &Settings::expand_path(&settings.prompts.system_prompt),
            &Settings::expand_path(&settings.prompts.query_rewriting_prompt),
        )?;
        let defaults = static_defaults(settings, &prompts);

        let get = |key: &str| -> Result<String> {
            resolve(key, overrides, &defaults)
                .ok_or_else(|| AifaqError::Config(format!("No value for '{}'", key)))
        };

        let provider = get(KEY_LLM_PROVIDER)?
            .parse::<LlmProvider>()
            .map_err(AifaqError::Config)?;
        let nr_retrieved_documents = get(KEY_NR_RETRIEVED_DOCUMENTS)?
            .trim()
            .parse::<usize>()
            .ok()
            .filter(|k| *k > 0)
            .ok_or_else(|| {
                AifaqError::Config(format!("{} must be a positive integer", KEY_NR_RETRIEVED_DOCUMENTS))
            })?;
        let use_query_rewriting = get(KEY_USE_QUERY_REWRITING)?
            .trim()
            .parse::<bool>()
            .map_err(|_| AifaqError::Config(format!("{} must be true or false", KEY_USE_QUERY_REWRITING)))?;

        Ok(Self {
            provider,
            model_name: get(KEY_MODEL_NAME)?,
            embedding_model: get(KEY_EMBEDDING_MODEL)?,
            temperature: settings.llm.temperature,
            system_prompt: get(KEY_SYSTEM_PROMPT)?,
            query_rewriting_prompt: get(KEY_QUERY_REWRITING_PROMPT)?,
            domain_context: settings.prompts.domain_context.clone(),
            nr_retrieved_documents,
            use_query_rewriting,
        })
    }
}

fn static_defaults(settings: &Settings, prompts: &Prompts) -> HashMap<String, String> {
    HashMap::from([
        (KEY_SYSTEM_PROMPT.to_string(), prompts.system.clone()),
        (KEY_QUERY_REWRITING_PROMPT.to_string(), prompts.query_rewriting.clone()),
        (KEY_MODEL_NAME.to_string(), settings.llm.model_name.clone()),
        (KEY_LLM_PROVIDER.to_string(), settings.llm.provider.to_string()),
        (KEY_EMBEDDING_MODEL.to_string(), settings.llm.embedding_model.clone()),
        (
            KEY_NR_RETRIEVED_DOCUMENTS.to_string(),
            settings.retrieval.nr_retrieved_documents.to_string(),
        ),
        (
            KEY_USE_QUERY_REWRITING.to_string(),
            settings.retrieval.use_query_rewriting.to_string(),
        ),
    ])
}
