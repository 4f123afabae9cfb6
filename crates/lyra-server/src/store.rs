//! Agent configuration reads from the dashboard database.
//!
//! The pool is optional: without `DATABASE_URL` every read returns `None` /
//! empty and sessions run on defaults. Query failures are logged and
//! swallowed for the same reason: configuration is personalization, not a
//! prerequisite.

use lyra_core::AgentConfig;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use tracing::{info, warn};

/// Read-side store for tenant configuration and knowledge categories.
#[derive(Clone)]
pub struct ConfigStore {
    pool: Option<PgPool>,
}

impl ConfigStore {
    /// Wrap an existing pool (or none).
    #[must_use]
    pub fn new(pool: Option<PgPool>) -> Self {
        Self { pool }
    }

    /// Connect to the database when a URL is configured.
    ///
    /// Connection failure is not fatal: the store degrades to defaults.
    pub async fn connect(database_url: Option<&str>) -> Self {
        let Some(url) = database_url else {
            info!("DATABASE_URL not set, personalization disabled");
            return Self { pool: None };
        };
        match PgPoolOptions::new().max_connections(5).connect(url).await {
            Ok(pool) => {
                info!("connected to dashboard database");
                Self { pool: Some(pool) }
            }
            Err(e) => {
                warn!(error = %e, "database connection failed, falling back to defaults");
                Self { pool: None }
            }
        }
    }

    /// Whether a live pool is attached.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.pool.is_some()
    }

    /// Fetch the active configuration row for a tenant.
    ///
    /// Returns `None` when there is no pool, no matching row, or the query
    /// fails (logged at warn).
    pub async fn fetch_config(&self, client_name: &str) -> Option<AgentConfig> {
        let pool = self.pool.as_ref()?;
        let row = sqlx::query(
            r"
            SELECT c.voice_name,
                   c.language_code,
                   c.temperature,
                   c.thinking_budget,
                   COALESCE(c.enable_affective_dialog, false) AS enable_affective_dialog,
                   COALESCE(c.proactive_audio, false) AS proactive_audio,
                   COALESCE(c.system_prompt, '') AS system_prompt,
                   COALESCE(c.docstring_tool_knowledge, '') AS docstring_tool_knowledge,
                   COALESCE(c.docstring_tool_terminate, '') AS docstring_tool_terminate,
                   COALESCE(c.docstring_tool_send_link, '') AS docstring_tool_send_link,
                   c.duration_limit,
                   c.termination_alert_time,
                   COALESCE(c.proactive_alert_instruction, '') AS proactive_alert_instruction
            FROM aiVoice_config c
            JOIN aiVoice_clients cl ON c.client_id = cl.id
            WHERE cl.name = $1 AND cl.status = 'active'
            LIMIT 1
            ",
        )
        .bind(client_name)
        .fetch_optional(pool)
        .await;

        let row = match row {
            Ok(row) => row?,
            Err(e) => {
                warn!(client_name, error = %e, "config fetch failed, using defaults");
                return None;
            }
        };

        match map_config_row(&row) {
            Ok(cfg) => Some(cfg),
            Err(e) => {
                warn!(client_name, error = %e, "config row decode failed, using defaults");
                None
            }
        }
    }

    /// Fetch all knowledge category names, sorted. Empty on any failure.
    pub async fn fetch_categories(&self) -> Vec<String> {
        let Some(pool) = self.pool.as_ref() else {
            return Vec::new();
        };
        let rows = sqlx::query("SELECT name FROM knowledge_categories ORDER BY name ASC")
            .fetch_all(pool)
            .await;
        match rows {
            Ok(rows) => rows
                .iter()
                .filter_map(|r| r.try_get::<String, _>("name").ok())
                .collect(),
            Err(e) => {
                warn!(error = %e, "category fetch failed");
                Vec::new()
            }
        }
    }

    /// Auto-provision the instance tenant: create the client row and a
    /// default configuration when the name is absent. Failures log and
    /// continue; a missing row just means sessions run on defaults.
    pub async fn ensure_client(&self, client_name: &str) {
        let Some(pool) = self.pool.as_ref() else {
            return;
        };

        let exists: Result<bool, sqlx::Error> =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM aiVoice_clients WHERE name = $1)")
                .bind(client_name)
                .fetch_one(pool)
                .await;
        match exists {
            Ok(true) => return,
            Ok(false) => {}
            Err(e) => {
                warn!(client_name, error = %e, "client existence check failed");
                return;
            }
        }

        info!(client_name, "seeding initial client configuration");
        let client_id: Result<i32, sqlx::Error> =
            sqlx::query_scalar("INSERT INTO aiVoice_clients (name) VALUES ($1) RETURNING id")
                .bind(client_name)
                .fetch_one(pool)
                .await;
        let client_id = match client_id {
            Ok(id) => id,
            Err(e) => {
                warn!(client_name, error = %e, "client seed insert failed");
                return;
            }
        };

        let defaults = AgentConfig::fallback(client_name);
        let inserted = sqlx::query(
            r"
            INSERT INTO aiVoice_config (
                client_id, voice_name, language_code, temperature,
                system_prompt, docstring_tool_knowledge,
                docstring_tool_terminate, docstring_tool_send_link
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ",
        )
        .bind(client_id)
        .bind(&defaults.voice_name)
        .bind(&defaults.language_code)
        .bind(defaults.temperature)
        .bind(&defaults.system_prompt)
        .bind(&defaults.docstring_tool_knowledge)
        .bind("Invoque esta ferramenta para encerrar a sessão de forma amigável.")
        .bind("Use esta ferramenta para enviar links úteis ao usuário.")
        .execute(pool)
        .await;
        if let Err(e) = inserted {
            warn!(client_name, error = %e, "config seed insert failed");
        }
    }
}

/// Map a configuration row onto [`AgentConfig`].
fn map_config_row(row: &sqlx::postgres::PgRow) -> Result<AgentConfig, sqlx::Error> {
    let duration_limit: i32 = row.try_get("duration_limit")?;
    let termination_alert_time: i32 = row.try_get("termination_alert_time")?;
    Ok(AgentConfig {
        voice_name: row.try_get("voice_name")?,
        language_code: row.try_get("language_code")?,
        temperature: row.try_get("temperature")?,
        thinking_budget: row.try_get("thinking_budget")?,
        enable_affective_dialog: row.try_get("enable_affective_dialog")?,
        proactive_audio: row.try_get("proactive_audio")?,
        system_prompt: row.try_get("system_prompt")?,
        docstring_tool_knowledge: row.try_get("docstring_tool_knowledge")?,
        docstring_tool_terminate: row.try_get("docstring_tool_terminate")?,
        docstring_tool_send_link: row.try_get("docstring_tool_send_link")?,
        duration_limit: duration_limit.max(0).unsigned_abs(),
        termination_alert_time: termination_alert_time.max(0).unsigned_abs(),
        proactive_alert_instruction: row.try_get("proactive_alert_instruction")?,
    })
}
