use super::row::UnitRow;
use crate::error::Result;

/// Raw persistence for projection rows.
///
/// This trait handles the "how" of storage (filesystem vs memory), while
/// [`super::RecordProjection`] handles the "what" (reconciliation with the
/// file, transactions). All rows of one store are saved together, so a save
/// is the unit of atomicity.
pub trait ProjectionBackend: Send + Sync {
    /// Rows of `store`, empty when the store has never been saved.
    fn load_rows(&self, store: &str) -> Result<Vec<UnitRow>>;

    /// Replaces every row of `store`.
    /// MUST be atomic (e.g. write to tmp then rename) to avoid partial writes.
    fn save_rows(&self, store: &str, rows: &[UnitRow]) -> Result<()>;

    fn delete_rows(&self, store: &str) -> Result<()>;

    /// Logical paths of every store with saved rows.
    fn list_stores(&self) -> Result<Vec<String>>;
}

impl<T: ProjectionBackend + ?Sized> ProjectionBackend for std::sync::Arc<T> {
    fn load_rows(&self, store: &str) -> Result<Vec<UnitRow>> {
        (**self).load_rows(store)
    }

    fn save_rows(&self, store: &str, rows: &[UnitRow]) -> Result<()> {
        (**self).save_rows(store, rows)
    }

    fn delete_rows(&self, store: &str) -> Result<()> {
        (**self).delete_rows(store)
    }

    fn list_stores(&self) -> Result<Vec<String>> {
        (**self).list_stores()
    }
}
