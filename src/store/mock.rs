use super::{LocalFile, LocalStore, NewLocalFile};
use crate::{Error, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

#[derive(Clone)]
pub struct MockLocalStore {
    rows: Arc<Mutex<BTreeMap<i64, LocalFile>>>,
    next_id: Arc<Mutex<i64>>,
    insert_count: Arc<Mutex<usize>>,
    deleted: Arc<Mutex<Vec<i64>>>,
    should_fail: Arc<Mutex<bool>>,
    fail_record_migration: Arc<Mutex<bool>>,
}

impl MockLocalStore {
    pub fn new() -> Self {
        Self {
            rows: Arc::new(Mutex::new(BTreeMap::new())),
            next_id: Arc::new(Mutex::new(1)),
            insert_count: Arc::new(Mutex::new(0)),
            deleted: Arc::new(Mutex::new(Vec::new())),
            should_fail: Arc::new(Mutex::new(false)),
            fail_record_migration: Arc::new(Mutex::new(false)),
        }
    }

    pub fn with_failure(self, should_fail: bool) -> Self {
        *self.should_fail.lock().unwrap() = should_fail;
        self
    }

    /// Fail only `record_migration`, leaving reads and inserts working.
    pub fn with_record_failure(self, should_fail: bool) -> Self {
        *self.fail_record_migration.lock().unwrap() = should_fail;
        self
    }

    /// Number of insert attempts, including failed ones.
    pub fn get_insert_count(&self) -> usize {
        *self.insert_count.lock().unwrap()
    }

    /// Ids passed to `delete`, in call order.
    pub fn get_deleted(&self) -> Vec<i64> {
        self.deleted.lock().unwrap().clone()
    }

    pub fn get_row(&self, id: i64) -> Option<LocalFile> {
        self.rows.lock().unwrap().get(&id).cloned()
    }

    fn check_failure(&self) -> Result<()> {
        if *self.should_fail.lock().unwrap() {
            return Err(Error::Io(std::io::Error::other("Mock store failure")));
        }
        Ok(())
    }
}

impl Default for MockLocalStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LocalStore for MockLocalStore {
    async fn insert(&self, file: NewLocalFile) -> Result<i64> {
        *self.insert_count.lock().unwrap() += 1;
        self.check_failure()?;

        let id = {
            let mut next_id = self.next_id.lock().unwrap();
            let id = *next_id;
            *next_id += 1;
            id
        };
        let now = Utc::now();
        let row = LocalFile {
            id,
            size: file.data.len() as i64,
            original_name: file.original_name,
            data: file.data,
            mime_type: file.mime_type,
            category: file.category,
            owner_id: file.owner_id,
            remote_url: None,
            remote_public_id: None,
            created_at: now,
            updated_at: now,
        };
        self.rows.lock().unwrap().insert(id, row);
        Ok(id)
    }

    async fn fetch(&self, id: i64) -> Result<Option<LocalFile>> {
        self.check_failure()?;
        Ok(self.rows.lock().unwrap().get(&id).cloned())
    }

    async fn delete(&self, id: i64) -> Result<u64> {
        self.deleted.lock().unwrap().push(id);
        self.check_failure()?;
        Ok(self.rows.lock().unwrap().remove(&id).map_or(0, |_| 1))
    }

    async fn clear_data(&self, id: i64) -> Result<u64> {
        self.check_failure()?;
        let mut rows = self.rows.lock().unwrap();
        Ok(rows.get_mut(&id).map_or(0, |row| {
            row.data.clear();
            row.size = 0;
            row.updated_at = Utc::now();
            1
        }))
    }

    async fn record_migration(&self, id: i64, remote_url: &str, public_id: &str) -> Result<()> {
        self.check_failure()?;
        if *self.fail_record_migration.lock().unwrap() {
            return Err(Error::Io(std::io::Error::other("Mock record failure")));
        }
        let mut rows = self.rows.lock().unwrap();
        let row = rows
            .get_mut(&id)
            .ok_or_else(|| Error::NotFound(format!("local file {}", id)))?;
        row.remote_url = Some(remote_url.to_string());
        row.remote_public_id = Some(public_id.to_string());
        row.updated_at = Utc::now();
        Ok(())
    }
}
