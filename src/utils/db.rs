use diesel::r2d2::PooledConnection;
use diesel::r2d2::ConnectionManager;
use diesel::PgConnection;

use crate::errors::IngestResult;
use crate::utils::commons::DbPool;

pub fn get_conn(pool: &DbPool) -> IngestResult<PooledConnection<ConnectionManager<PgConnection>>> {
    // pool exhaustion and connect failures both surface as StorageUnavailable
    let conn = pool.get()?;

    Ok(conn)
}
