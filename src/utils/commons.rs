use diesel::PgConnection;
use diesel::r2d2::{ConnectionManager, Pool};

pub type DbPool = Pool<ConnectionManager<PgConnection>>;

/// Current wall-clock time in epoch seconds
pub fn now_epoch_secs() -> i64 {
    chrono::Utc::now().timestamp()
}
