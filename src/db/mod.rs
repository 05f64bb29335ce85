pub mod from_row;
pub mod queries;
mod schema;

pub use schema::init_db;

use std::sync::Arc;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::cache::Cache;
use crate::payments::PaymentGateway;
use crate::scan::ScanKey;

pub type DbPool = Pool<SqliteConnectionManager>;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    /// Base URL for payment callbacks (e.g., https://api.example.com)
    pub base_url: String,
    /// Payment gateway client. Trait object so tests can swap in a mock.
    pub gateway: Arc<dyn PaymentGateway>,
    /// Shared secret for ticket scan credentials
    pub scan_key: ScanKey,
    /// Short-TTL cache for the availability endpoint
    pub cache: Cache,
    /// Optional webhook URL for outbound notifications
    pub notify_webhook_url: Option<String>,
}

pub fn create_pool(database_path: &str) -> Result<DbPool, r2d2::Error> {
    let manager = SqliteConnectionManager::file(database_path).with_init(|conn| {
        // busy_timeout keeps concurrent Immediate transactions queueing
        // instead of failing with SQLITE_BUSY
        conn.execute_batch("PRAGMA busy_timeout = 5000; PRAGMA foreign_keys = ON;")
    });
    Pool::builder().max_size(10).build(manager)
}
