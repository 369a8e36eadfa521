use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use fd_lock::RwLock;
use tracing::{debug, info};

use super::domain::{RefundRequest, RequestId};
use super::repository::{RefundRepository, RepositoryError};

fn lock(
    records: &Mutex<Vec<RefundRequest>>,
) -> Result<MutexGuard<'_, Vec<RefundRequest>>, RepositoryError> {
    records
        .lock()
        .map_err(|_| RepositoryError::Unavailable("store mutex poisoned".to_string()))
}

fn insert_into(
    records: &mut Vec<RefundRequest>,
    record: &RefundRequest,
) -> Result<(), RepositoryError> {
    if records
        .iter()
        .any(|existing| existing.request_id == record.request_id)
    {
        return Err(RepositoryError::Conflict);
    }
    records.push(record.clone());
    Ok(())
}

fn mark_within(records: &mut [RefundRequest], ids: &[RequestId], at: DateTime<Utc>) -> usize {
    records
        .iter_mut()
        .filter(|record| ids.contains(&record.request_id))
        .map(|record| record.mark_processed(at))
        .filter(|changed| *changed)
        .count()
}

/// Process-local store; the default when no store path is configured.
#[derive(Default, Clone)]
pub struct InMemoryRefundRepository {
    records: Arc<Mutex<Vec<RefundRequest>>>,
}

impl RefundRepository for InMemoryRefundRepository {
    fn insert(&self, record: RefundRequest) -> Result<RefundRequest, RepositoryError> {
        let mut guard = lock(&self.records)?;
        insert_into(&mut guard, &record)?;
        Ok(record)
    }

    fn fetch(&self, id: &RequestId) -> Result<Option<RefundRequest>, RepositoryError> {
        let guard = lock(&self.records)?;
        Ok(guard.iter().find(|record| &record.request_id == id).cloned())
    }

    fn all(&self) -> Result<Vec<RefundRequest>, RepositoryError> {
        Ok(lock(&self.records)?.clone())
    }

    fn mark_processed(
        &self,
        ids: &[RequestId],
        at: DateTime<Utc>,
    ) -> Result<usize, RepositoryError> {
        let mut guard = lock(&self.records)?;
        Ok(mark_within(&mut guard, ids, at))
    }
}

/// Store backed by a JSON array on disk, shared by the server and the CLI.
///
/// Every operation reloads the file while holding an exclusive lock on a sibling `.lock` file,
/// so writers in other processes are never overwritten with stale contents. Writes go through
/// a sibling temp file followed by a rename.
pub struct JsonFileRefundRepository {
    path: PathBuf,
    lock_path: PathBuf,
    local: Mutex<()>,
}

impl JsonFileRefundRepository {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, RepositoryError> {
        let path = path.into();
        let store = Self {
            lock_path: path.with_extension("json.lock"),
            path,
            local: Mutex::new(()),
        };

        let records = store.with_records(|records| Ok((records.len(), false)))?;
        info!(path = %store.path.display(), records, "opened refund store");
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Runs `work` against the current file contents under both the in-process mutex and the
    /// cross-process file lock. `work` returns whether the records changed and must be written.
    fn with_records<T>(
        &self,
        work: impl FnOnce(&mut Vec<RefundRequest>) -> Result<(T, bool), RepositoryError>,
    ) -> Result<T, RepositoryError> {
        let _local = self
            .local
            .lock()
            .map_err(|_| RepositoryError::Unavailable("store mutex poisoned".to_string()))?;

        let lock_file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&self.lock_path)
            .map_err(|err| unavailable(&self.lock_path, err))?;
        let mut file_lock = RwLock::new(lock_file);
        let _held = file_lock
            .write()
            .map_err(|err| unavailable(&self.lock_path, err))?;

        let mut records = self.load()?;
        let (output, dirty) = work(&mut records)?;
        if dirty {
            self.persist(&records)?;
        }
        Ok(output)
    }

    fn load(&self) -> Result<Vec<RefundRequest>, RepositoryError> {
        match fs::read(&self.path) {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(Vec::new()),
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|err| {
                RepositoryError::Unavailable(format!(
                    "{} is not a refund store: {err}",
                    self.path.display()
                ))
            }),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(err) => Err(unavailable(&self.path, err)),
        }
    }

    fn persist(&self, records: &[RefundRequest]) -> Result<(), RepositoryError> {
        let bytes = serde_json::to_vec_pretty(records)
            .map_err(|err| RepositoryError::Unavailable(err.to_string()))?;
        let staging = self.path.with_extension("json.tmp");
        fs::write(&staging, bytes).map_err(|err| unavailable(&staging, err))?;
        fs::rename(&staging, &self.path).map_err(|err| unavailable(&self.path, err))?;
        debug!(path = %self.path.display(), records = records.len(), "refund store flushed");
        Ok(())
    }
}

fn unavailable(path: &Path, err: io::Error) -> RepositoryError {
    RepositoryError::Unavailable(format!("{}: {err}", path.display()))
}

impl RefundRepository for JsonFileRefundRepository {
    fn insert(&self, record: RefundRequest) -> Result<RefundRequest, RepositoryError> {
        self.with_records(|records| {
            insert_into(records, &record)?;
            Ok((record.clone(), true))
        })
    }

    fn fetch(&self, id: &RequestId) -> Result<Option<RefundRequest>, RepositoryError> {
        self.with_records(|records| {
            let found = records.iter().find(|record| &record.request_id == id).cloned();
            Ok((found, false))
        })
    }

    fn all(&self) -> Result<Vec<RefundRequest>, RepositoryError> {
        self.with_records(|records| Ok((std::mem::take(records), false)))
    }

    fn mark_processed(
        &self,
        ids: &[RequestId],
        at: DateTime<Utc>,
    ) -> Result<usize, RepositoryError> {
        self.with_records(|records| {
            let changed = mark_within(records, ids, at);
            Ok((changed, changed > 0))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::refunds::domain::{RefundAmount, RefundDraft, RequestMetadata, SensitiveString};
    use chrono::TimeZone;

    fn record(name: &str) -> RefundRequest {
        let created = Utc.with_ymd_and_hms(2026, 5, 4, 10, 0, 0).unwrap();
        RefundRequest::create(
            RefundDraft {
                recipient_name: name.to_string(),
                refund_amount: RefundAmount::from_minor_units(1250),
                bank_name: "Acme Bank".to_string(),
                account_number: SensitiveString::new("12345678"),
                card_number: SensitiveString::new("4111111111111111"),
                expiry_date: SensitiveString::new("12/26"),
                cvv: SensitiveString::new("123"),
            },
            RequestMetadata::default(),
            created,
        )
    }

    fn scratch_path(label: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "refund-desk-{label}-{}.json",
            RequestId::generate()
        ))
    }

    #[test]
    fn memory_store_rejects_duplicate_ids() {
        let store = InMemoryRefundRepository::default();
        let first = record("Alice");
        store.insert(first.clone()).expect("first insert");
        assert!(matches!(store.insert(first), Err(RepositoryError::Conflict)));
        assert_eq!(store.all().unwrap().len(), 1);
    }

    #[test]
    fn memory_store_keeps_insertion_order() {
        let store = InMemoryRefundRepository::default();
        for name in ["Alice", "Bob", "Carol"] {
            store.insert(record(name)).expect("insert");
        }
        let names: Vec<String> = store
            .all()
            .unwrap()
            .into_iter()
            .map(|record| record.recipient_name)
            .collect();
        assert_eq!(names, ["Alice", "Bob", "Carol"]);
    }

    #[test]
    fn file_store_survives_reopen() {
        let path = scratch_path("reopen");
        let at = Utc.with_ymd_and_hms(2026, 5, 5, 8, 30, 0).unwrap();

        let stored = {
            let store = JsonFileRefundRepository::open(&path).expect("open new store");
            let stored = store.insert(record("Alice")).expect("insert");
            store.insert(record("Bob")).expect("insert");
            assert_eq!(store.mark_processed(&[stored.request_id], at).unwrap(), 1);
            stored
        };

        let reopened = JsonFileRefundRepository::open(&path).expect("reopen store");
        let records = reopened.all().expect("read back");
        assert_eq!(records.len(), 2);
        let alice = reopened
            .fetch(&stored.request_id)
            .unwrap()
            .expect("alice persisted");
        assert_eq!(alice.processed_at(), Some(at));
        assert_eq!(alice.cvv.expose(), "123");

        fs::remove_file(&path).ok();
        fs::remove_file(path.with_extension("json.lock")).ok();
    }

    #[test]
    fn file_store_sees_writes_from_another_handle() {
        let path = scratch_path("shared");
        let at = Utc.with_ymd_and_hms(2026, 5, 6, 9, 0, 0).unwrap();

        let server = JsonFileRefundRepository::open(&path).expect("server opens store");
        let alice = server.insert(record("Alice")).expect("insert alice");

        let cli = JsonFileRefundRepository::open(&path).expect("cli opens store");
        assert_eq!(cli.mark_processed(&[alice.request_id], at).unwrap(), 1);

        server.insert(record("Bob")).expect("insert bob");
        let seen = server
            .fetch(&alice.request_id)
            .unwrap()
            .expect("alice still stored");
        assert_eq!(seen.processed_at(), Some(at));

        let reopened = JsonFileRefundRepository::open(&path).expect("reopen store");
        let records = reopened.all().expect("read back");
        assert_eq!(records.len(), 2);
        assert!(records[0].processed());
        assert!(!records[1].processed());

        fs::remove_file(&path).ok();
        fs::remove_file(path.with_extension("json.lock")).ok();
    }

    #[test]
    fn file_store_reports_corrupt_contents() {
        let path = scratch_path("corrupt");
        fs::write(&path, b"{not json").expect("write scratch file");

        match JsonFileRefundRepository::open(&path) {
            Err(RepositoryError::Unavailable(message)) => {
                assert!(message.contains("not a refund store"))
            }
            Err(other) => panic!("expected unavailable, got {other:?}"),
            Ok(_) => panic!("corrupt store opened"),
        }

        fs::remove_file(&path).ok();
        fs::remove_file(path.with_extension("json.lock")).ok();
    }
}
