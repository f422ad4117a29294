//! Supply data provider seam (ERP inventory, open purchase orders, lead times).

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, mpsc};
use std::thread;
use std::time::Duration;

use thiserror::Error;

use promise_core::ItemCode;
use promise_inventory::InventorySnapshot;
use promise_purchasing::PurchaseOrder;

/// Data provider failure. Never replaced by made-up data.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DataError {
    #[error("{operation} timed out after {timeout_ms} ms")]
    Timeout {
        operation: &'static str,
        timeout_ms: u64,
    },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("data unavailable: {0}")]
    Unavailable(String),
}

/// Source of supply data for the availability stage.
///
/// Implementations must surface failures as `DataError`; returning an empty
/// result means "no rows", not "could not fetch".
pub trait DataProvider: Send + Sync {
    fn fetch_inventory(&self, items: &[ItemCode]) -> Result<Vec<InventorySnapshot>, DataError>;

    fn fetch_open_purchase_orders(&self, items: &[ItemCode])
    -> Result<Vec<PurchaseOrder>, DataError>;

    /// Item lead time in days, `None` when the provider has none on record.
    fn fetch_lead_time(&self, item: &ItemCode) -> Result<Option<u32>, DataError>;
}

impl<P> DataProvider for Arc<P>
where
    P: DataProvider + ?Sized,
{
    fn fetch_inventory(&self, items: &[ItemCode]) -> Result<Vec<InventorySnapshot>, DataError> {
        (**self).fetch_inventory(items)
    }

    fn fetch_open_purchase_orders(
        &self,
        items: &[ItemCode],
    ) -> Result<Vec<PurchaseOrder>, DataError> {
        (**self).fetch_open_purchase_orders(items)
    }

    fn fetch_lead_time(&self, item: &ItemCode) -> Result<Option<u32>, DataError> {
        (**self).fetch_lead_time(item)
    }
}

/// Run a provider call on a helper thread and wait at most `timeout`.
///
/// On timeout the helper is detached and runs until the provider returns; its
/// result is dropped. The provider seam has no way to interrupt a call, so a
/// provider that hangs forever keeps one thread per timed-out call. The
/// pipeline stops fetching an item after its first timeout, which bounds this
/// to one detached thread per item and batch.
pub fn fetch_with_timeout<T, F>(
    operation: &'static str,
    timeout: Duration,
    call: F,
) -> Result<T, DataError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, DataError> + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    thread::Builder::new()
        .name(format!("fetch-{operation}"))
        .spawn(move || {
            let _ = tx.send(call());
        })
        .map_err(|e| DataError::Transport(format!("could not start {operation}: {e}")))?;

    match rx.recv_timeout(timeout) {
        Ok(result) => result,
        Err(mpsc::RecvTimeoutError::Timeout) => Err(DataError::Timeout {
            operation,
            timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        }),
        Err(mpsc::RecvTimeoutError::Disconnected) => Err(DataError::Transport(format!(
            "{operation} ended without a result"
        ))),
    }
}

#[derive(Debug, Default)]
struct ProviderState {
    inventory: Vec<InventorySnapshot>,
    purchase_orders: Vec<PurchaseOrder>,
    lead_times: HashMap<ItemCode, u32>,
    failing: HashMap<ItemCode, DataError>,
    latency: Option<Duration>,
}

/// Provider serving rows held in memory.
///
/// Used for embedding the pipeline in tests and tools. Individual items can be
/// made to fail, and every call can be slowed down, to exercise error paths.
#[derive(Debug, Default)]
pub struct InMemoryDataProvider {
    state: RwLock<ProviderState>,
}

impl InMemoryDataProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_inventory(mut self, rows: impl IntoIterator<Item = InventorySnapshot>) -> Self {
        self.state_mut().inventory.extend(rows);
        self
    }

    pub fn with_purchase_orders(mut self, orders: impl IntoIterator<Item = PurchaseOrder>) -> Self {
        self.state_mut().purchase_orders.extend(orders);
        self
    }

    pub fn with_lead_time(mut self, item: impl Into<ItemCode>, days: u32) -> Self {
        self.state_mut().lead_times.insert(item.into(), days);
        self
    }

    /// Every call touching `item` fails with `error`.
    pub fn with_failure(mut self, item: impl Into<ItemCode>, error: DataError) -> Self {
        self.state_mut().failing.insert(item.into(), error);
        self
    }

    /// Sleep this long before answering any call.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.state_mut().latency = Some(latency);
        self
    }

    // The builder owns the provider, so no reader can be holding the lock.
    fn state_mut(&mut self) -> &mut ProviderState {
        self.state.get_mut().unwrap_or_else(PoisonError::into_inner)
    }

    fn read(&self, items: &[ItemCode]) -> Result<std::sync::RwLockReadGuard<'_, ProviderState>, DataError> {
        let latency = self
            .state
            .read()
            .map_err(|_| DataError::Unavailable("provider state poisoned".to_string()))?
            .latency;
        if let Some(latency) = latency {
            thread::sleep(latency);
        }

        let state = self
            .state
            .read()
            .map_err(|_| DataError::Unavailable("provider state poisoned".to_string()))?;
        if let Some(error) = items.iter().find_map(|item| state.failing.get(item)) {
            return Err(error.clone());
        }
        Ok(state)
    }
}

impl DataProvider for InMemoryDataProvider {
    fn fetch_inventory(&self, items: &[ItemCode]) -> Result<Vec<InventorySnapshot>, DataError> {
        let state = self.read(items)?;
        Ok(state
            .inventory
            .iter()
            .filter(|row| items.contains(&row.item))
            .cloned()
            .collect())
    }

    fn fetch_open_purchase_orders(
        &self,
        items: &[ItemCode],
    ) -> Result<Vec<PurchaseOrder>, DataError> {
        let state = self.read(items)?;
        Ok(state
            .purchase_orders
            .iter()
            .filter(|po| items.contains(&po.item))
            .cloned()
            .collect())
    }

    fn fetch_lead_time(&self, item: &ItemCode) -> Result<Option<u32>, DataError> {
        let state = self.read(std::slice::from_ref(item))?;
        Ok(state.lead_times.get(item).copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};

    fn provider() -> InMemoryDataProvider {
        InMemoryDataProvider::new()
            .with_inventory([
                InventorySnapshot::new("WIDGET-A", "MAIN", 100, 20, Utc::now()),
                InventorySnapshot::new("WIDGET-B", "MAIN", 5, 0, Utc::now()),
            ])
            .with_purchase_orders([PurchaseOrder::new(
                "PO-1",
                "WIDGET-A",
                50,
                NaiveDate::from_ymd_opt(2026, 11, 10).unwrap(),
                "MAIN",
                true,
            )])
            .with_lead_time("WIDGET-A", 21)
    }

    #[test]
    fn serves_only_requested_items() {
        let p = provider();
        let rows = p.fetch_inventory(&[ItemCode::from("WIDGET-B")]).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].on_hand_qty, 5);
        assert!(p.fetch_open_purchase_orders(&[ItemCode::from("WIDGET-B")]).unwrap().is_empty());
        assert_eq!(p.fetch_lead_time(&ItemCode::from("WIDGET-A")).unwrap(), Some(21));
        assert_eq!(p.fetch_lead_time(&ItemCode::from("WIDGET-B")).unwrap(), None);
    }

    #[test]
    fn failing_item_surfaces_typed_error() {
        let p = provider().with_failure("WIDGET-A", DataError::Transport("connection refused".into()));
        let err = p.fetch_inventory(&[ItemCode::from("WIDGET-A")]).unwrap_err();
        assert_eq!(err, DataError::Transport("connection refused".into()));
        assert!(p.fetch_inventory(&[ItemCode::from("WIDGET-B")]).is_ok());
    }

    #[test]
    fn slow_call_times_out() {
        let p = Arc::new(provider().with_latency(Duration::from_millis(300)));
        let item = ItemCode::from("WIDGET-A");
        let err = fetch_with_timeout("inventory", Duration::from_millis(20), move || {
            p.fetch_inventory(&[item])
        })
        .unwrap_err();
        assert!(matches!(err, DataError::Timeout { operation: "inventory", timeout_ms: 20 }));
    }

    #[test]
    fn builder_keeps_rows_after_poisoned_lock() {
        let p = InMemoryDataProvider::new();
        let poisoned = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = p.state.write().unwrap();
            panic!("poison the provider state");
        }));
        assert!(poisoned.is_err());
        assert!(p.state.is_poisoned());

        let p = p.with_lead_time("WIDGET-A", 9).with_latency(Duration::from_millis(1));
        let state = p.state.into_inner().unwrap_or_else(PoisonError::into_inner);
        assert_eq!(state.lead_times.get(&ItemCode::from("WIDGET-A")), Some(&9));
        assert_eq!(state.latency, Some(Duration::from_millis(1)));
    }

    #[test]
    fn fast_call_returns_its_result() {
        let p = Arc::new(provider());
        let rows = fetch_with_timeout("inventory", Duration::from_secs(5), move || {
            p.fetch_inventory(&[ItemCode::from("WIDGET-A")])
        })
        .unwrap();
        assert_eq!(rows.len(), 1);
    }
}
