use super::backend::ProjectionBackend;
use super::row::UnitRow;
use crate::error::{Result, SyncError};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// In-memory projection backend for testing.
///
/// Counts saves so tests can assert that an operation wrote nothing.
#[derive(Default)]
pub struct MemBackend {
    rows: Mutex<HashMap<String, Vec<UnitRow>>>,
    saves: AtomicUsize,
    simulate_write_error: AtomicBool,
}

impl MemBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable write error simulation for testing error handling.
    pub fn set_simulate_write_error(&self, simulate: bool) {
        self.simulate_write_error.store(simulate, Ordering::SeqCst);
    }

    /// Number of successful `save_rows` calls so far.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

impl ProjectionBackend for MemBackend {
    fn load_rows(&self, store: &str) -> Result<Vec<UnitRow>> {
        Ok(self.rows.lock().get(store).cloned().unwrap_or_default())
    }

    fn save_rows(&self, store: &str, rows: &[UnitRow]) -> Result<()> {
        if self.simulate_write_error.load(Ordering::SeqCst) {
            return Err(SyncError::Store("Simulated write error".to_string()));
        }
        self.rows.lock().insert(store.to_string(), rows.to_vec());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn delete_rows(&self, store: &str) -> Result<()> {
        self.rows.lock().remove(store);
        Ok(())
    }

    fn list_stores(&self) -> Result<Vec<String>> {
        let mut stores: Vec<String> = self.rows.lock().keys().cloned().collect();
        stores.sort();
        Ok(stores)
    }
}
