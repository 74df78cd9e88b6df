use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{Local, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use spendsync_core::connectivity::HttpProbe;
use spendsync_core::db::{Database, LibSqlKeyValueStore};
use spendsync_core::gateway::HttpGateway;
use spendsync_core::queue::Preferences;
use spendsync_core::{Category, ClientConfig, PendingExpense, SyncEngine};
use uuid::Uuid;

use crate::error::CliError;

pub type CliEngine = SyncEngine<LibSqlKeyValueStore, HttpGateway, HttpProbe>;

const DB_PATH_ENV: &str = "SPENDSYNC_DB_PATH";
const CONFIG_PATH_ENV: &str = "SPENDSYNC_CONFIG";

/// Where the CLI keeps its database and reads its config.
#[derive(Debug, Clone)]
pub struct AppPaths {
    pub db_path: PathBuf,
    pub config_path: Option<PathBuf>,
}

impl AppPaths {
    pub fn resolve(
        cli_db_path: Option<PathBuf>,
        cli_config_path: Option<PathBuf>,
    ) -> Result<Self, CliError> {
        Ok(Self {
            db_path: resolve_db_path(cli_db_path)?,
            config_path: resolve_config_path(cli_config_path),
        })
    }
}

#[derive(Debug, Serialize)]
pub struct PendingListItem {
    pub local_id: String,
    pub name: String,
    pub amount: Decimal,
    pub category_id: String,
    pub date: String,
    pub queued_at: Option<String>,
    pub relative_time: Option<String>,
    pub attempts: u32,
}

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> Result<PathBuf, CliError> {
    match cli_db_path.or_else(|| env::var_os(DB_PATH_ENV).map(PathBuf::from)) {
        Some(path) => Ok(path),
        None => default_db_path(),
    }
}

pub fn default_db_path() -> Result<PathBuf, CliError> {
    dirs::data_dir()
        .map(|dir| dir.join("spendsync").join("spendsync.db"))
        .ok_or_else(|| CliError::Config("Failed to resolve CLI data directory".to_string()))
}

pub fn resolve_config_path(cli_config_path: Option<PathBuf>) -> Option<PathBuf> {
    cli_config_path
        .or_else(|| env::var_os(CONFIG_PATH_ENV).map(PathBuf::from))
        .or_else(|| dirs::config_dir().map(|dir| dir.join("spendsync").join("config.json")))
}

pub fn load_config(paths: &AppPaths) -> Result<ClientConfig, CliError> {
    Ok(ClientConfig::load(paths.config_path.as_deref())?)
}

pub async fn open_store(
    db_path: &Path,
    config: &ClientConfig,
) -> Result<Arc<LibSqlKeyValueStore>, CliError> {
    let db = Database::open(db_path).await?;
    Ok(Arc::new(LibSqlKeyValueStore::with_namespace(
        db,
        config.storage_namespace.clone(),
    )))
}

/// Open the local queue and wire the engine to the configured server.
pub async fn open_engine(paths: &AppPaths) -> Result<CliEngine, CliError> {
    let config = load_config(paths)?;
    let store = open_store(&paths.db_path, &config).await?;

    let token = Preferences::new(Arc::clone(&store)).auth_token().await?;
    let gateway = HttpGateway::new(config.api_base_url.clone(), config.request_timeout())?
        .with_token(token);
    let probe = HttpProbe::new(config.api_base_url.clone(), config.probe_timeout())
        .map_err(|error| CliError::Config(error.to_string()))?;

    Ok(SyncEngine::open(store, gateway, probe, &config).await)
}

pub fn parse_amount(raw: &str) -> Result<Decimal, CliError> {
    let amount = raw
        .trim()
        .parse::<Decimal>()
        .map_err(|_| CliError::InvalidAmount(raw.to_string()))?;
    if amount <= Decimal::ZERO {
        return Err(CliError::InvalidAmount(raw.to_string()));
    }
    Ok(amount)
}

pub fn parse_category_id(raw: &str) -> Result<Uuid, CliError> {
    raw.trim()
        .parse::<Uuid>()
        .map_err(|_| CliError::InvalidCategory(raw.to_string()))
}

pub fn parse_expense_date(raw: Option<&str>, today: NaiveDate) -> Result<NaiveDate, CliError> {
    match raw.map(str::trim).filter(|value| !value.is_empty()) {
        Some(value) => NaiveDate::parse_from_str(value, "%Y-%m-%d")
            .map_err(|_| CliError::InvalidDate(value.to_string())),
        None => Ok(today),
    }
}

pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

pub fn pending_to_list_item(pending: &PendingExpense) -> PendingListItem {
    let now_ms = Utc::now().timestamp_millis();
    let queued_ms = pending.local_id.created_at_ms();

    PendingListItem {
        local_id: pending.local_id.to_string(),
        name: pending.expense.name.clone(),
        amount: pending.expense.amount,
        category_id: pending.expense.category_id.to_string(),
        date: pending.expense.timestamp.to_string(),
        queued_at: queued_ms.map(format_timestamp),
        relative_time: queued_ms.map(|ms| format_relative_time(ms, now_ms)),
        attempts: pending.attempts,
    }
}

pub fn format_pending_lines(pending: &[PendingExpense], now_ms: i64) -> Vec<String> {
    pending
        .iter()
        .map(|record| {
            let name = truncate(&record.expense.name, 24);
            let queued = record
                .local_id
                .created_at_ms()
                .map_or_else(|| "-".to_string(), |ms| format_relative_time(ms, now_ms));
            let line = format!(
                "{:<10}  {name:<24}  {:>10}  {queued}",
                record.expense.timestamp, record.expense.amount
            );
            if record.attempts > 0 {
                format!("{line}  ({} failed attempts)", record.attempts)
            } else {
                line
            }
        })
        .collect()
}

pub fn format_category_lines(categories: &[Category]) -> Vec<String> {
    categories
        .iter()
        .map(|category| format!("{}  {}", category.id, category.name))
        .collect()
}

pub fn truncate(text: &str, max_chars: usize) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= max_chars {
        collapsed
    } else {
        let take_len = max_chars.saturating_sub(3);
        let mut truncated = collapsed.chars().take(take_len).collect::<String>();
        truncated.push_str("...");
        truncated
    }
}

pub fn format_timestamp(timestamp_ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(timestamp_ms).map_or_else(
        || timestamp_ms.to_string(),
        |date_time| date_time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else {
        format!("{}w ago", diff / week)
    }
}
