use std::collections::HashSet;

use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder, Row};
use tokio::sync::Mutex;
use tracing::warn;

use crate::db::DbPool;
use crate::error::StorageError;
use crate::types::ServiceEntry;

/// Rows per INSERT statement; keeps each statement under the Postgres
/// bind-parameter limit (eight binds per row).
const INSERT_CHUNK_ROWS: usize = 1_000;

const LOAD_LOCK_KEY: i64 = 0x4F504C4553; // "OPLES"

/// Persistent home of the service log.
#[async_trait]
pub trait ServiceLogStore: Send + Sync {
    /// Serializes loads across processes sharing the store. Must be released
    /// once the load has committed or failed.
    async fn lock_for_load(&self) -> Result<LoadLock, StorageError> {
        Ok(LoadLock::unlocked())
    }

    /// Every `C_Id` already persisted.
    async fn existing_ids(&self) -> Result<HashSet<i64>, StorageError>;

    /// Inserts all entries atomically: either every row is stored or none is.
    async fn insert_entries(&self, entries: &[ServiceEntry]) -> Result<(), StorageError>;

    async fn fetch_entries(&self) -> Result<Vec<ServiceEntry>, StorageError>;
}

#[derive(Clone)]
pub struct PostgresStore {
    pool: DbPool,
}

impl PostgresStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

#[async_trait]
impl ServiceLogStore for PostgresStore {
    async fn lock_for_load(&self) -> Result<LoadLock, StorageError> {
        LoadLock::acquire(&self.pool, LOAD_LOCK_KEY).await
    }

    async fn existing_ids(&self) -> Result<HashSet<i64>, StorageError> {
        let rows = sqlx::query(r#"SELECT c_id FROM servicios_registro"#)
            .fetch_all(&self.pool)
            .await?;

        let mut ids = HashSet::with_capacity(rows.len());
        for row in rows {
            ids.insert(row.try_get("c_id")?);
        }

        Ok(ids)
    }

    async fn insert_entries(&self, entries: &[ServiceEntry]) -> Result<(), StorageError> {
        let mut db_tx = self.pool.begin().await?;

        for chunk in entries.chunks(INSERT_CHUNK_ROWS) {
            let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
                "INSERT INTO servicios_registro \
                 (c_id, id, servicios, asunto, tiempo_trabajado, responsable, fecha, descripcion) ",
            );
            builder.push_values(chunk, |mut row, entry| {
                row.push_bind(entry.c_id)
                    .push_bind(entry.ticket_id.clone())
                    .push_bind(entry.servicios.clone())
                    .push_bind(entry.asunto.clone())
                    .push_bind(entry.tiempo_trabajado)
                    .push_bind(entry.responsable.clone())
                    .push_bind(entry.fecha.clone())
                    .push_bind(entry.descripcion.clone());
            });
            builder.build().execute(&mut *db_tx).await?;
        }

        db_tx.commit().await?;
        Ok(())
    }

    async fn fetch_entries(&self) -> Result<Vec<ServiceEntry>, StorageError> {
        let entries = sqlx::query_as::<_, ServiceEntry>(
            r#"
                SELECT c_id, id, servicios, asunto, tiempo_trabajado, responsable, fecha, descripcion
                FROM servicios_registro
                ORDER BY c_id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(entries)
    }
}

/// In-process store, used for dry runs and tests.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<Vec<ServiceEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries(entries: Vec<ServiceEntry>) -> Self {
        Self {
            entries: Mutex::new(entries),
        }
    }

    pub async fn snapshot(&self) -> Vec<ServiceEntry> {
        self.entries.lock().await.clone()
    }
}

#[async_trait]
impl ServiceLogStore for MemoryStore {
    async fn existing_ids(&self) -> Result<HashSet<i64>, StorageError> {
        Ok(self.entries.lock().await.iter().map(|e| e.c_id).collect())
    }

    async fn insert_entries(&self, entries: &[ServiceEntry]) -> Result<(), StorageError> {
        let mut stored = self.entries.lock().await;
        let mut ids: HashSet<i64> = stored.iter().map(|e| e.c_id).collect();
        for entry in entries {
            if !ids.insert(entry.c_id) {
                return Err(StorageError::DuplicateKey(entry.c_id));
            }
        }
        stored.extend_from_slice(entries);
        Ok(())
    }

    async fn fetch_entries(&self) -> Result<Vec<ServiceEntry>, StorageError> {
        let mut entries = self.entries.lock().await.clone();
        entries.sort_by_key(|e| e.c_id);
        Ok(entries)
    }
}

/// Session-level Postgres advisory lock held on a dedicated connection.
pub struct LoadLock {
    conn: Option<sqlx::pool::PoolConnection<Postgres>>,
    key: i64,
}

impl LoadLock {
    pub fn unlocked() -> Self {
        Self { conn: None, key: 0 }
    }

    async fn acquire(pool: &DbPool, key: i64) -> Result<Self, StorageError> {
        let mut conn = pool.acquire().await?;
        sqlx::query::<Postgres>("SELECT pg_advisory_lock($1)")
            .bind(key)
            .execute(conn.as_mut())
            .await?;
        Ok(Self {
            conn: Some(conn),
            key,
        })
    }

    pub async fn release(mut self) -> Result<(), StorageError> {
        if let Some(mut conn) = self.conn.take() {
            sqlx::query::<Postgres>("SELECT pg_advisory_unlock($1)")
                .bind(self.key)
                .execute(conn.as_mut())
                .await?;
        }
        Ok(())
    }
}

impl Drop for LoadLock {
    fn drop(&mut self) {
        let Some(mut conn) = self.conn.take() else {
            return;
        };
        let key = self.key;
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(err) = sqlx::query::<Postgres>("SELECT pg_advisory_unlock($1)")
                        .bind(key)
                        .execute(conn.as_mut())
                        .await
                    {
                        warn!("failed to release load lock in drop: {err}");
                    }
                });
            }
            // Closing the connection ends the session, which frees the lock.
            Err(_) => drop(conn.detach()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(c_id: i64) -> ServiceEntry {
        ServiceEntry {
            c_id,
            ticket_id: "1".into(),
            servicios: "Support".into(),
            asunto: None,
            tiempo_trabajado: 10,
            responsable: None,
            fecha: "01/2024".into(),
            descripcion: None,
        }
    }

    #[tokio::test]
    async fn memory_store_rejects_whole_batch_on_duplicate() {
        let store = MemoryStore::with_entries(vec![entry(1)]);

        let err = store
            .insert_entries(&[entry(2), entry(1)])
            .await
            .unwrap_err();

        assert!(matches!(err, StorageError::DuplicateKey(1)));
        assert_eq!(store.snapshot().await.len(), 1);
    }

    #[tokio::test]
    async fn memory_store_reports_existing_ids() {
        let store = MemoryStore::new();
        store.insert_entries(&[entry(3), entry(4)]).await.unwrap();

        let ids = store.existing_ids().await.unwrap();
        assert_eq!(ids, HashSet::from([3, 4]));
        assert!(store.lock_for_load().await.unwrap().release().await.is_ok());
    }
}
