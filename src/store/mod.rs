//! License storage.
//!
//! The engine only talks to [`LicenseStore`]. Two backends ship with the
//! crate: [`MemoryStore`](memory::MemoryStore) for tests and ephemeral use,
//! and [`FileStore`](file::FileStore), a checksummed JSON snapshot on disk.

pub mod file;
pub mod locks;
pub mod memory;
pub mod snapshot;

use crate::protocol::models::LicenseRecord;
use crate::SeatwardenError;

/// Closure handed to [`LicenseStore::update`].
///
/// Receives the current record (if any). Returning `Some(record)` writes it;
/// returning `None` leaves the store untouched.
pub type Mutation<'a> = &'a mut dyn FnMut(Option<&LicenseRecord>) -> Option<LicenseRecord>;

/// Durable mapping from license key to record.
///
/// All operations on one key are linearizable: an [`update`](Self::update)
/// never interleaves with another update, put or remove of the same key.
/// Different keys proceed independently.
///
/// A mutation reports success only once it is durable. If persisting fails
/// the in-memory view is left exactly as it was and the error is returned.
pub trait LicenseStore: Send + Sync {
    /// Fetch a record.
    fn get(&self, key: &str) -> Result<Option<LicenseRecord>, SeatwardenError>;

    /// Unconditionally write a record under its own key.
    fn put(&self, record: LicenseRecord) -> Result<(), SeatwardenError>;

    /// Atomic read-modify-write of one key.
    ///
    /// Returns the record as it stands after the call.
    fn update(
        &self,
        key: &str,
        mutate: Mutation<'_>,
    ) -> Result<Option<LicenseRecord>, SeatwardenError>;

    /// Delete a record, returning it if it existed.
    fn remove(&self, key: &str) -> Result<Option<LicenseRecord>, SeatwardenError>;

    /// Every record, sorted by key.
    fn list_all(&self) -> Result<Vec<LicenseRecord>, SeatwardenError>;
}

pub(crate) fn poisoned<E>(_: E) -> SeatwardenError {
    SeatwardenError::StoreIO("store lock poisoned".to_string())
}
