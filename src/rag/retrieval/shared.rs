// Lazily initialized, process-wide retrieval backend
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell};

use crate::errors::Result;
use crate::rag::retrieval::engine::{RetrievalIndex, SearchHit};

/// Builds the expensive index backing structures
#[async_trait]
pub trait IndexLoader: Send + Sync {
    async fn load(&self) -> Result<Arc<dyn RetrievalIndex>>;
}

/// Retrieval index that initializes its backend on first use.
///
/// Double-checked: the fast path reads the cell without locking; on a miss
/// the init mutex is taken and the cell checked again before loading, so the
/// loader runs at most once per successful initialization and no caller ever
/// sees a half-built index. A failed load leaves the cell empty.
///
/// A caller dropped mid-load abandons that load, so the load must not sit
/// under a short deadline. `RetrievalEngine` runs `prepare` before its timed
/// search for this reason.
pub struct SharedIndex {
    loader: Box<dyn IndexLoader>,
    cell: OnceCell<Arc<dyn RetrievalIndex>>,
    init_lock: Mutex<()>,
    load_attempts: AtomicUsize,
}

impl SharedIndex {
    pub fn new(loader: impl IndexLoader + 'static) -> Self {
        Self {
            loader: Box::new(loader),
            cell: OnceCell::new(),
            init_lock: Mutex::new(()),
            load_attempts: AtomicUsize::new(0),
        }
    }

    /// Return the backend, initializing it if needed
    pub async fn get(&self) -> Result<Arc<dyn RetrievalIndex>> {
        if let Some(index) = self.cell.get() {
            return Ok(Arc::clone(index));
        }

        let _guard = self.init_lock.lock().await;
        if let Some(index) = self.cell.get() {
            return Ok(Arc::clone(index));
        }

        self.load_attempts.fetch_add(1, Ordering::SeqCst);
        tracing::info!("initializing retrieval index");
        let index = self.loader.load().await.map_err(|e| {
            tracing::error!(error = %e, "retrieval index initialization failed");
            e
        })?;

        // Only writer of the cell, under init_lock
        let _ = self.cell.set(Arc::clone(&index));
        tracing::info!("retrieval index ready");
        Ok(index)
    }

    pub fn is_initialized(&self) -> bool {
        self.cell.initialized()
    }

    /// Number of times the loader has been invoked
    pub fn load_attempts(&self) -> usize {
        self.load_attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RetrievalIndex for SharedIndex {
    async fn prepare(&self) -> Result<()> {
        self.get().await.map(|_| ())
    }

    async fn search(&self, query: &str, k: usize) -> Result<Vec<SearchHit>> {
        self.get().await?.search(query, k).await
    }

    async fn search_in(&self, query: &str, k: usize, categories: &[String]) -> Result<Vec<SearchHit>> {
        self.get().await?.search_in(query, k, categories).await
    }
}
