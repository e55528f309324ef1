//! Persisted transaction bookkeeping (RocksDB)
//!
//! # Column Families
//!
//! - `transactions` - One row per submission outcome (key: transaction id)
//! - `requests` - Pending anchor requests awaiting batch seal
//!   (key: entity tag || entity id)
//! - `indices` - Secondary indices for fast lookups
//!
//! # Index keys
//!
//! - `h || hash || 0x00 || txid` - content hash -> transactions
//! - `e || tag || entity_id || '|' || txid` - entity -> transactions
//! - `s || status || txid` - status -> transactions
//! - `c || created_at_nanos_be || txid` - creation order (oldest first)
//!
//! The table is append-mostly: rows are written once per submission and
//! only the `verified` flag is updated afterwards, one row at a time.

use crate::{
    error::{Error, Result},
    types::{AnchorRequest, EntityType, LedgerTransactionRecord, TxStatus},
    Config,
};
use chrono::{DateTime, Utc};
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, IteratorMode, Options, WriteBatch, DB};
use std::sync::Arc;

const CF_TRANSACTIONS: &str = "transactions";
const CF_REQUESTS: &str = "requests";
const CF_INDICES: &str = "indices";

const IDX_HASH: u8 = b'h';
const IDX_ENTITY: u8 = b'e';
const IDX_STATUS: u8 = b's';
const IDX_CREATED: u8 = b'c';

/// RocksDB-backed transaction store
pub struct TransactionStore {
    db: Arc<DB>,
}

impl TransactionStore {
    /// Open or create the database
    pub fn open(config: &Config) -> Result<Self> {
        let path = &config.data_dir;
        std::fs::create_dir_all(path)?;

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);
        db_opts.set_write_buffer_size(config.rocksdb.write_buffer_size_mb * 1024 * 1024);
        db_opts.set_max_background_jobs(config.rocksdb.max_background_jobs);

        let cf_descriptors = vec![
            ColumnFamilyDescriptor::new(CF_TRANSACTIONS, Self::cf_options_zstd()),
            ColumnFamilyDescriptor::new(CF_REQUESTS, Self::cf_options_zstd()),
            ColumnFamilyDescriptor::new(CF_INDICES, Self::cf_options_indices()),
        ];

        let db = DB::open_cf_descriptors(&db_opts, path, cf_descriptors)?;

        tracing::info!("Opened anchor store at {:?}", path);

        Ok(Self { db: Arc::new(db) })
    }

    fn cf_options_zstd() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Zstd);
        opts
    }

    fn cf_options_indices() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        let mut block_opts = rocksdb::BlockBasedOptions::default();
        block_opts.set_bloom_filter(10.0, false);
        opts.set_block_based_table_factory(&block_opts);
        opts
    }

    fn cf_handle(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| Error::Storage(format!("Column family {} not found", name)))
    }

    // Transaction rows

    /// Persist one submission outcome with all its indices (atomic)
    ///
    /// Enforces the `transaction_id` uniqueness constraint.
    pub fn put_transaction(&self, record: &LedgerTransactionRecord) -> Result<()> {
        let cf_tx = self.cf_handle(CF_TRANSACTIONS)?;
        let key = record.transaction_id.as_bytes();

        if self.db.get_cf(cf_tx, key)?.is_some() {
            return Err(Error::TransactionExists(record.transaction_id.clone()));
        }

        let cf_idx = self.cf_handle(CF_INDICES)?;
        let value = bincode::serialize(record)?;

        let mut batch = WriteBatch::default();
        batch.put_cf(cf_tx, key, &value);
        batch.put_cf(cf_idx, Self::key_hash(&record.hash, &record.transaction_id), []);
        batch.put_cf(
            cf_idx,
            Self::key_entity(record.entity_type, &record.entity_id, &record.transaction_id),
            [],
        );
        batch.put_cf(cf_idx, Self::key_status(record.status, &record.transaction_id), []);
        batch.put_cf(
            cf_idx,
            Self::key_created(record.created_at, &record.transaction_id),
            [],
        );
        self.db.write(batch)?;

        tracing::debug!(
            transaction_id = %record.transaction_id,
            entity_type = %record.entity_type,
            entity_id = %record.entity_id,
            status = %record.status,
            "Transaction recorded"
        );

        Ok(())
    }

    /// Fetch a row by its transaction id
    pub fn get_transaction(&self, transaction_id: &str) -> Result<LedgerTransactionRecord> {
        let cf = self.cf_handle(CF_TRANSACTIONS)?;
        let value = self
            .db
            .get_cf(cf, transaction_id.as_bytes())?
            .ok_or_else(|| Error::TransactionNotFound(transaction_id.to_string()))?;
        Ok(bincode::deserialize(&value)?)
    }

    /// All rows anchoring a given content hash
    pub fn get_by_hash(&self, hash: &str) -> Result<Vec<LedgerTransactionRecord>> {
        let mut prefix = vec![IDX_HASH];
        prefix.extend_from_slice(hash.as_bytes());
        prefix.push(0);
        self.scan_index(&prefix)
    }

    /// All rows for one entity, oldest first
    pub fn get_by_entity(
        &self,
        entity_type: EntityType,
        entity_id: &str,
    ) -> Result<Vec<LedgerTransactionRecord>> {
        let mut prefix = vec![IDX_ENTITY, entity_type.index_byte()];
        prefix.extend_from_slice(entity_id.as_bytes());
        prefix.push(b'|');
        let mut rows = self.scan_index(&prefix)?;
        rows.sort_by_key(|r| r.created_at);
        Ok(rows)
    }

    /// The most recent row for one entity, if any
    pub fn latest_for_entity(
        &self,
        entity_type: EntityType,
        entity_id: &str,
    ) -> Result<Option<LedgerTransactionRecord>> {
        Ok(self.get_by_entity(entity_type, entity_id)?.pop())
    }

    /// Rows currently in the given status
    pub fn scan_status(&self, status: TxStatus) -> Result<Vec<LedgerTransactionRecord>> {
        self.scan_index(&[IDX_STATUS, status as u8])
    }

    /// Unverified rows, oldest first, bounded by `limit`
    ///
    /// Covers failed submissions, simulation fallbacks, and successes whose
    /// consensus status has not been confirmed yet.
    pub fn scan_unverified(&self, limit: usize) -> Result<Vec<LedgerTransactionRecord>> {
        let cf_idx = self.cf_handle(CF_INDICES)?;
        let prefix = [IDX_CREATED];
        let iter = self
            .db
            .iterator_cf(cf_idx, IteratorMode::From(&prefix, rocksdb::Direction::Forward));

        let mut rows = Vec::new();
        for item in iter {
            let (key, _) = item?;
            if !key.starts_with(&prefix) {
                break;
            }
            // created key: tag(1) || nanos(8) || txid
            let txid = String::from_utf8_lossy(&key[9..]).to_string();
            let record = self.get_transaction(&txid)?;
            if record.needs_reconciliation() {
                rows.push(record);
                if rows.len() >= limit {
                    break;
                }
            }
        }
        Ok(rows)
    }

    /// Mark one row verified (single-row update)
    pub fn mark_verified(&self, transaction_id: &str, at: DateTime<Utc>) -> Result<()> {
        let cf = self.cf_handle(CF_TRANSACTIONS)?;
        let mut record = self.get_transaction(transaction_id)?;
        record.verified = true;
        record.verified_at = Some(at);
        let value = bincode::serialize(&record)?;
        self.db.put_cf(cf, transaction_id.as_bytes(), &value)?;

        tracing::info!(transaction_id, "Transaction verified");
        Ok(())
    }

    /// Move one row to a new status, keeping the status index consistent
    pub fn update_status(
        &self,
        transaction_id: &str,
        status: TxStatus,
        error: Option<String>,
    ) -> Result<()> {
        let cf_tx = self.cf_handle(CF_TRANSACTIONS)?;
        let cf_idx = self.cf_handle(CF_INDICES)?;

        let mut record = self.get_transaction(transaction_id)?;
        let old_status = record.status;
        record.status = status;
        if error.is_some() {
            record.error = error;
        }

        let mut batch = WriteBatch::default();
        batch.put_cf(cf_tx, transaction_id.as_bytes(), bincode::serialize(&record)?);
        batch.delete_cf(cf_idx, Self::key_status(old_status, transaction_id));
        batch.put_cf(cf_idx, Self::key_status(status, transaction_id), []);
        self.db.write(batch)?;
        Ok(())
    }

    // Pending requests (crash-safe batch queue)

    /// Persist a pending request
    pub fn put_request(&self, request: &AnchorRequest) -> Result<()> {
        let cf = self.cf_handle(CF_REQUESTS)?;
        let key = Self::key_request(request.entity_type, &request.entity_id);
        self.db.put_cf(cf, key, bincode::serialize(request)?)?;
        Ok(())
    }

    /// All pending requests, oldest first
    pub fn list_requests(&self) -> Result<Vec<AnchorRequest>> {
        let cf = self.cf_handle(CF_REQUESTS)?;
        let mut requests = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_, value) = item?;
            requests.push(bincode::deserialize::<AnchorRequest>(&value)?);
        }
        requests.sort_by_key(|r| r.created_at);
        Ok(requests)
    }

    /// Drop a request once its batch was persisted
    pub fn delete_request(&self, entity_type: EntityType, entity_id: &str) -> Result<()> {
        let cf = self.cf_handle(CF_REQUESTS)?;
        self.db.delete_cf(cf, Self::key_request(entity_type, entity_id))?;
        Ok(())
    }

    /// Row counts (observability)
    pub fn stats(&self) -> Result<StoreStats> {
        let cf_tx = self.cf_handle(CF_TRANSACTIONS)?;
        let cf_req = self.cf_handle(CF_REQUESTS)?;
        Ok(StoreStats {
            total_transactions: self.approximate_count(cf_tx)?,
            pending_requests: self.approximate_count(cf_req)?,
        })
    }

    fn approximate_count(&self, cf: &ColumnFamily) -> Result<u64> {
        Ok(self
            .db
            .property_int_value_cf(cf, "rocksdb.estimate-num-keys")?
            .unwrap_or(0))
    }

    fn scan_index(&self, prefix: &[u8]) -> Result<Vec<LedgerTransactionRecord>> {
        let cf_idx = self.cf_handle(CF_INDICES)?;
        let iter = self
            .db
            .iterator_cf(cf_idx, IteratorMode::From(prefix, rocksdb::Direction::Forward));

        let mut rows = Vec::new();
        for item in iter {
            let (key, _) = item?;
            if !key.starts_with(prefix) {
                break;
            }
            let txid = String::from_utf8_lossy(&key[prefix.len()..]).to_string();
            rows.push(self.get_transaction(&txid)?);
        }
        Ok(rows)
    }

    // Index key helpers

    fn key_hash(hash: &str, txid: &str) -> Vec<u8> {
        let mut key = vec![IDX_HASH];
        key.extend_from_slice(hash.as_bytes());
        key.push(0);
        key.extend_from_slice(txid.as_bytes());
        key
    }

    fn key_entity(entity_type: EntityType, entity_id: &str, txid: &str) -> Vec<u8> {
        let mut key = vec![IDX_ENTITY, entity_type.index_byte()];
        key.extend_from_slice(entity_id.as_bytes());
        key.push(b'|');
        key.extend_from_slice(txid.as_bytes());
        key
    }

    fn key_status(status: TxStatus, txid: &str) -> Vec<u8> {
        let mut key = vec![IDX_STATUS, status as u8];
        key.extend_from_slice(txid.as_bytes());
        key
    }

    fn key_created(created_at: DateTime<Utc>, txid: &str) -> Vec<u8> {
        let nanos = created_at.timestamp_nanos_opt().unwrap_or(i64::MAX);
        let mut key = vec![IDX_CREATED];
        key.extend_from_slice(&nanos.to_be_bytes());
        key.extend_from_slice(txid.as_bytes());
        key
    }
}

/// Store statistics
#[derive(Debug, Clone)]
pub struct StoreStats {
    /// Approximate number of persisted transaction rows
    pub total_transactions: u64,
    /// Approximate number of pending requests
    pub pending_requests: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::MessageBuilder;
    use crate::types::RecordSnapshot;
    use tempfile::TempDir;

    fn test_store() -> (TransactionStore, TempDir) {
        let temp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.data_dir = temp.path().to_path_buf();
        (TransactionStore::open(&config).unwrap(), temp)
    }

    fn record(txid: &str, entity_id: &str, status: TxStatus) -> LedgerTransactionRecord {
        LedgerTransactionRecord {
            tx_type: "MEDICAL_RECORD".into(),
            entity_type: EntityType::MedicalRecord,
            entity_id: entity_id.into(),
            hash: "ab".repeat(32),
            transaction_id: txid.into(),
            topic_id: "0.0.5005".into(),
            sequence_number: Some(7),
            consensus_timestamp: Some("1758958633.731955949".into()),
            is_batch: false,
            batch_id: None,
            merkle_root: None,
            merkle_proof: None,
            merkle_index: None,
            compressed: false,
            message_size: 256,
            compression_ratio: None,
            response_time_ms: 120,
            attempts: 1,
            rate_limit_wait_ms: 0,
            status,
            error: None,
            estimated_cost: None,
            verified: false,
            verified_at: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_put_and_get_transaction() {
        let (store, _tmp) = test_store();
        let rec = record("0.0.1@100.200", "REC-1", TxStatus::Success);
        store.put_transaction(&rec).unwrap();

        let loaded = store.get_transaction("0.0.1@100.200").unwrap();
        assert_eq!(loaded.entity_id, "REC-1");
        assert_eq!(loaded.status, TxStatus::Success);
    }

    #[test]
    fn test_duplicate_transaction_id_rejected() {
        let (store, _tmp) = test_store();
        let rec = record("0.0.1@100.200", "REC-1", TxStatus::Success);
        store.put_transaction(&rec).unwrap();

        let dup = record("0.0.1@100.200", "REC-2", TxStatus::Success);
        assert!(matches!(
            store.put_transaction(&dup),
            Err(Error::TransactionExists(_))
        ));
    }

    #[test]
    fn test_lookup_by_hash_and_entity() {
        let (store, _tmp) = test_store();
        store
            .put_transaction(&record("0.0.1@1.1", "REC-1", TxStatus::Success))
            .unwrap();
        store
            .put_transaction(&record("0.0.1@2.2", "REC-1", TxStatus::Success))
            .unwrap();
        store
            .put_transaction(&record("0.0.1@3.3", "REC-2", TxStatus::Success))
            .unwrap();

        let by_hash = store.get_by_hash(&"ab".repeat(32)).unwrap();
        assert_eq!(by_hash.len(), 3);

        let by_entity = store
            .get_by_entity(EntityType::MedicalRecord, "REC-1")
            .unwrap();
        assert_eq!(by_entity.len(), 2);

        let latest = store
            .latest_for_entity(EntityType::MedicalRecord, "REC-1")
            .unwrap()
            .unwrap();
        assert_eq!(latest.transaction_id, "0.0.1@2.2");
    }

    #[test]
    fn test_mark_verified_is_single_row() {
        let (store, _tmp) = test_store();
        store
            .put_transaction(&record("0.0.1@1.1", "REC-1", TxStatus::Success))
            .unwrap();
        store
            .put_transaction(&record("0.0.1@2.2", "REC-2", TxStatus::Success))
            .unwrap();

        store.mark_verified("0.0.1@1.1", Utc::now()).unwrap();

        assert!(store.get_transaction("0.0.1@1.1").unwrap().verified);
        assert!(!store.get_transaction("0.0.1@2.2").unwrap().verified);
    }

    #[test]
    fn test_scan_unverified_oldest_first() {
        let (store, _tmp) = test_store();

        let mut older = record("0.0.1@1.1", "REC-1", TxStatus::Failed);
        older.created_at = Utc::now() - chrono::Duration::hours(2);
        let newer = record("0.0.1@2.2", "REC-2", TxStatus::Success);
        let mut verified = record("0.0.1@3.3", "REC-3", TxStatus::Success);
        verified.verified = true;

        // Insertion order deliberately differs from creation order
        store.put_transaction(&newer).unwrap();
        store.put_transaction(&verified).unwrap();
        store.put_transaction(&older).unwrap();

        let rows = store.scan_unverified(10).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].transaction_id, "0.0.1@1.1");
        assert_eq!(rows[1].transaction_id, "0.0.1@2.2");
    }

    #[test]
    fn test_update_status_moves_index() {
        let (store, _tmp) = test_store();
        store
            .put_transaction(&record("0.0.1@1.1", "REC-1", TxStatus::Pending))
            .unwrap();

        store
            .update_status("0.0.1@1.1", TxStatus::Failed, Some("timeout".into()))
            .unwrap();

        assert!(store.scan_status(TxStatus::Pending).unwrap().is_empty());
        let failed = store.scan_status(TxStatus::Failed).unwrap();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].error.as_deref(), Some("timeout"));
    }

    #[test]
    fn test_request_queue_roundtrip() {
        let (store, _tmp) = test_store();
        let snapshot = RecordSnapshot {
            title: Some("Visit".into()),
            ..Default::default()
        };
        let hash = crate::hash::hash_serializable(&snapshot).unwrap();
        let payload =
            MessageBuilder::new().build(EntityType::Prescription, "PRX-1", &snapshot, &hash);
        let request = AnchorRequest::new(EntityType::Prescription, "PRX-1", payload);

        store.put_request(&request).unwrap();
        assert_eq!(store.list_requests().unwrap().len(), 1);

        store
            .delete_request(EntityType::Prescription, "PRX-1")
            .unwrap();
        assert!(store.list_requests().unwrap().is_empty());
    }
}
