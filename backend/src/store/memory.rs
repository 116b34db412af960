//! In-memory store for tests and local runs
//!
//! A single async mutex serialises transactions. Each transaction works on a
//! private copy of the state that replaces the committed state on commit, so
//! an abandoned or failed transaction leaves no trace.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use shared::{
    Auditable, CustomerRef, DocumentKind, InventoryRecord, Invoice, MovementFilter,
    MovementRecord, Payment, ProductRef, PurchaseOrder, SalesOrder, Shipment, StockAdjustment,
    SupplierRef, UserRef, WarehouseRef,
};
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use super::{Directory, Store, Transaction};
use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    products: HashMap<Uuid, ProductRef>,
    warehouses: HashMap<Uuid, WarehouseRef>,
    suppliers: HashMap<Uuid, SupplierRef>,
    customers: HashMap<Uuid, CustomerRef>,
    users: HashMap<Uuid, UserRef>,
    inventory: HashMap<(Uuid, Uuid), InventoryRecord>,
    movements: Vec<MovementRecord>,
    adjustments: HashMap<Uuid, StockAdjustment>,
    purchase_orders: HashMap<Uuid, PurchaseOrder>,
    sales_orders: HashMap<Uuid, SalesOrder>,
    shipments: HashMap<Uuid, Shipment>,
    invoices: HashMap<Uuid, Invoice>,
    payments: HashMap<Uuid, Payment>,
}

impl MemoryState {
    fn document_numbers(&self, kind: DocumentKind) -> Vec<&str> {
        match kind {
            DocumentKind::PurchaseOrder => self
                .purchase_orders
                .values()
                .map(|o| o.po_number.as_str())
                .collect(),
            DocumentKind::SalesOrder => self
                .sales_orders
                .values()
                .map(|o| o.so_number.as_str())
                .collect(),
            DocumentKind::Shipment => self
                .shipments
                .values()
                .map(|s| s.shipment_number.as_str())
                .collect(),
            DocumentKind::Invoice => self
                .invoices
                .values()
                .map(|i| i.invoice_number.as_str())
                .collect(),
            DocumentKind::Payment => self
                .payments
                .values()
                .map(|p| p.payment_number.as_str())
                .collect(),
        }
    }

    fn ensure_number_free(&self, kind: DocumentKind, number: &str) -> AppResult<()> {
        if self.document_numbers(kind).contains(&number) {
            return Err(AppError::conflict(kind.as_str(), number));
        }
        Ok(())
    }
}

/// Entities stored with an optimistic version
trait Versioned: Clone {
    const ENTITY: &'static str;
    fn id(&self) -> Uuid;
    fn audit(&self) -> &Auditable;
    fn audit_mut(&mut self) -> &mut Auditable;
}

macro_rules! versioned {
    ($ty:ty, $name:literal) => {
        impl Versioned for $ty {
            const ENTITY: &'static str = $name;
            fn id(&self) -> Uuid {
                self.id
            }
            fn audit(&self) -> &Auditable {
                &self.audit
            }
            fn audit_mut(&mut self) -> &mut Auditable {
                &mut self.audit
            }
        }
    };
}

versioned!(InventoryRecord, "InventoryRecord");
versioned!(StockAdjustment, "StockAdjustment");
versioned!(PurchaseOrder, "PurchaseOrder");
versioned!(SalesOrder, "SalesOrder");
versioned!(Shipment, "Shipment");
versioned!(Invoice, "Invoice");
versioned!(Payment, "Payment");

/// Replace a stored entity if its version still matches, bumping the version
fn replace_versioned<K, T>(map: &mut HashMap<K, T>, key: K, value: &mut T) -> AppResult<()>
where
    K: std::hash::Hash + Eq,
    T: Versioned,
{
    let stored = map
        .get_mut(&key)
        .ok_or_else(|| AppError::not_found(T::ENTITY, value.id()))?;
    if stored.audit().version != value.audit().version {
        return Err(AppError::conflict(T::ENTITY, value.id()));
    }
    value.audit_mut().touch(Utc::now());
    *stored = value.clone();
    Ok(())
}

/// Thread-safe in-memory store
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
    injected_conflicts: Arc<AtomicUsize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` commits fail with a concurrent modification
    pub fn inject_commit_conflicts(&self, count: usize) {
        self.injected_conflicts.store(count, Ordering::SeqCst);
    }

    pub async fn seed_product(&self, product: ProductRef) {
        self.state.lock().await.products.insert(product.id, product);
    }

    pub async fn seed_warehouse(&self, warehouse: WarehouseRef) {
        self.state.lock().await.warehouses.insert(warehouse.id, warehouse);
    }

    pub async fn seed_supplier(&self, supplier: SupplierRef) {
        self.state.lock().await.suppliers.insert(supplier.id, supplier);
    }

    pub async fn seed_customer(&self, customer: CustomerRef) {
        self.state.lock().await.customers.insert(customer.id, customer);
    }

    pub async fn seed_user(&self, user: UserRef) {
        self.state.lock().await.users.insert(user.id, user);
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn begin(&self) -> AppResult<Box<dyn Transaction>> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryTransaction {
            guard,
            working,
            injected_conflicts: self.injected_conflicts.clone(),
        }))
    }

    async fn health_check(&self) -> AppResult<()> {
        Ok(())
    }
}

pub struct MemoryTransaction {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
    injected_conflicts: Arc<AtomicUsize>,
}

impl MemoryTransaction {
    fn take_injected_conflict(&self) -> bool {
        self.injected_conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl Directory for MemoryTransaction {
    async fn find_product(&mut self, id: Uuid) -> AppResult<Option<ProductRef>> {
        Ok(self.working.products.get(&id).cloned())
    }

    async fn find_warehouse(&mut self, id: Uuid) -> AppResult<Option<WarehouseRef>> {
        Ok(self.working.warehouses.get(&id).cloned())
    }

    async fn find_supplier(&mut self, id: Uuid) -> AppResult<Option<SupplierRef>> {
        Ok(self.working.suppliers.get(&id).cloned())
    }

    async fn find_customer(&mut self, id: Uuid) -> AppResult<Option<CustomerRef>> {
        Ok(self.working.customers.get(&id).cloned())
    }

    async fn find_user(&mut self, id: Uuid) -> AppResult<Option<UserRef>> {
        Ok(self.working.users.get(&id).cloned())
    }
}

#[async_trait]
impl Transaction for MemoryTransaction {
    async fn inventory_record(
        &mut self,
        product_id: Uuid,
        warehouse_id: Uuid,
    ) -> AppResult<Option<InventoryRecord>> {
        Ok(self
            .working
            .inventory
            .get(&(product_id, warehouse_id))
            .cloned())
    }

    async fn inventory_for_product(&mut self, product_id: Uuid) -> AppResult<Vec<InventoryRecord>> {
        let mut records: Vec<_> = self
            .working
            .inventory
            .values()
            .filter(|r| r.product_id == product_id)
            .cloned()
            .collect();
        records.sort_by_key(|r| r.warehouse_id);
        Ok(records)
    }

    async fn insert_inventory_record(&mut self, record: &InventoryRecord) -> AppResult<()> {
        let key = (record.product_id, record.warehouse_id);
        if self.working.inventory.contains_key(&key) {
            return Err(AppError::conflict("InventoryRecord", record.id));
        }
        self.working.inventory.insert(key, record.clone());
        Ok(())
    }

    async fn update_inventory_record(&mut self, record: &mut InventoryRecord) -> AppResult<()> {
        let key = (record.product_id, record.warehouse_id);
        replace_versioned(&mut self.working.inventory, key, record)
    }

    async fn insert_movement(&mut self, movement: &MovementRecord) -> AppResult<()> {
        self.working.movements.push(movement.clone());
        Ok(())
    }

    async fn movements(&mut self, filter: &MovementFilter) -> AppResult<Vec<MovementRecord>> {
        let mut movements: Vec<_> = self
            .working
            .movements
            .iter()
            .filter(|m| filter.matches(m))
            .cloned()
            .collect();
        movements.sort_by_key(|m| (m.movement_date, m.created_at));
        Ok(movements)
    }

    async fn count_document_numbers(&mut self, kind: DocumentKind, prefix: &str) -> AppResult<i64> {
        let count = self
            .working
            .document_numbers(kind)
            .into_iter()
            .filter(|n| n.starts_with(prefix))
            .count();
        Ok(count as i64)
    }

    async fn document_number_exists(&mut self, kind: DocumentKind, number: &str) -> AppResult<bool> {
        Ok(self.working.document_numbers(kind).contains(&number))
    }

    async fn stock_adjustment(&mut self, id: Uuid) -> AppResult<Option<StockAdjustment>> {
        Ok(self.working.adjustments.get(&id).cloned())
    }

    async fn insert_stock_adjustment(&mut self, adjustment: &StockAdjustment) -> AppResult<()> {
        self.working
            .adjustments
            .insert(adjustment.id, adjustment.clone());
        Ok(())
    }

    async fn update_stock_adjustment(&mut self, adjustment: &mut StockAdjustment) -> AppResult<()> {
        let id = adjustment.id;
        replace_versioned(&mut self.working.adjustments, id, adjustment)
    }

    async fn purchase_order(&mut self, id: Uuid) -> AppResult<Option<PurchaseOrder>> {
        Ok(self.working.purchase_orders.get(&id).cloned())
    }

    async fn insert_purchase_order(&mut self, order: &PurchaseOrder) -> AppResult<()> {
        self.working
            .ensure_number_free(DocumentKind::PurchaseOrder, &order.po_number)?;
        self.working
            .purchase_orders
            .insert(order.id, order.clone());
        Ok(())
    }

    async fn update_purchase_order(&mut self, order: &mut PurchaseOrder) -> AppResult<()> {
        let id = order.id;
        replace_versioned(&mut self.working.purchase_orders, id, order)
    }

    async fn delete_purchase_order(&mut self, order: &PurchaseOrder) -> AppResult<()> {
        match self.working.purchase_orders.get(&order.id) {
            Some(stored) if stored.audit.version == order.audit.version => {
                self.working.purchase_orders.remove(&order.id);
                Ok(())
            }
            Some(_) => Err(AppError::conflict("PurchaseOrder", order.id)),
            None => Err(AppError::not_found("PurchaseOrder", order.id)),
        }
    }

    async fn sales_order(&mut self, id: Uuid) -> AppResult<Option<SalesOrder>> {
        Ok(self.working.sales_orders.get(&id).cloned())
    }

    async fn insert_sales_order(&mut self, order: &SalesOrder) -> AppResult<()> {
        self.working
            .ensure_number_free(DocumentKind::SalesOrder, &order.so_number)?;
        self.working.sales_orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn update_sales_order(&mut self, order: &mut SalesOrder) -> AppResult<()> {
        let id = order.id;
        replace_versioned(&mut self.working.sales_orders, id, order)
    }

    async fn shipment(&mut self, id: Uuid) -> AppResult<Option<Shipment>> {
        Ok(self.working.shipments.get(&id).cloned())
    }

    async fn shipments_for_sales_order(&mut self, sales_order_id: Uuid) -> AppResult<Vec<Shipment>> {
        let mut shipments: Vec<_> = self
            .working
            .shipments
            .values()
            .filter(|s| s.sales_order_id == sales_order_id)
            .cloned()
            .collect();
        shipments.sort_by_key(|s| s.audit.created_at);
        Ok(shipments)
    }

    async fn insert_shipment(&mut self, shipment: &Shipment) -> AppResult<()> {
        self.working
            .ensure_number_free(DocumentKind::Shipment, &shipment.shipment_number)?;
        self.working.shipments.insert(shipment.id, shipment.clone());
        Ok(())
    }

    async fn update_shipment(&mut self, shipment: &mut Shipment) -> AppResult<()> {
        let id = shipment.id;
        replace_versioned(&mut self.working.shipments, id, shipment)
    }

    async fn invoice(&mut self, id: Uuid) -> AppResult<Option<Invoice>> {
        Ok(self.working.invoices.get(&id).cloned())
    }

    async fn invoice_for_sales_order(&mut self, sales_order_id: Uuid) -> AppResult<Option<Invoice>> {
        Ok(self
            .working
            .invoices
            .values()
            .find(|i| i.sales_order_id == sales_order_id)
            .cloned())
    }

    async fn insert_invoice(&mut self, invoice: &Invoice) -> AppResult<()> {
        if self
            .working
            .invoices
            .values()
            .any(|i| i.sales_order_id == invoice.sales_order_id)
        {
            return Err(AppError::DuplicateInvoice {
                sales_order_id: invoice.sales_order_id,
            });
        }
        self.working
            .ensure_number_free(DocumentKind::Invoice, &invoice.invoice_number)?;
        self.working.invoices.insert(invoice.id, invoice.clone());
        Ok(())
    }

    async fn update_invoice(&mut self, invoice: &mut Invoice) -> AppResult<()> {
        let id = invoice.id;
        replace_versioned(&mut self.working.invoices, id, invoice)
    }

    async fn payment(&mut self, id: Uuid) -> AppResult<Option<Payment>> {
        Ok(self.working.payments.get(&id).cloned())
    }

    async fn insert_payment(&mut self, payment: &Payment) -> AppResult<()> {
        self.working
            .ensure_number_free(DocumentKind::Payment, &payment.payment_number)?;
        self.working.payments.insert(payment.id, payment.clone());
        Ok(())
    }

    async fn update_payment(&mut self, payment: &mut Payment) -> AppResult<()> {
        let id = payment.id;
        replace_versioned(&mut self.working.payments, id, payment)
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        if self.take_injected_conflict() {
            return Err(AppError::conflict("transaction", "injected"));
        }
        let MemoryTransaction {
            mut guard, working, ..
        } = *self;
        *guard = working;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> InventoryRecord {
        InventoryRecord::new(Uuid::new_v4(), Uuid::new_v4(), Utc::now())
    }

    #[tokio::test]
    async fn test_uncommitted_writes_are_discarded() {
        let store = MemoryStore::new();
        let rec = record();
        {
            let mut tx = store.begin().await.unwrap();
            tx.insert_inventory_record(&rec).await.unwrap();
        }
        let mut tx = store.begin().await.unwrap();
        assert!(tx
            .inventory_record(rec.product_id, rec.warehouse_id)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_stale_version_is_rejected() {
        let store = MemoryStore::new();
        let mut rec = record();
        let mut tx = store.begin().await.unwrap();
        tx.insert_inventory_record(&rec).await.unwrap();
        tx.commit().await.unwrap();

        let mut stale = rec.clone();
        let mut tx = store.begin().await.unwrap();
        rec.quantity = 5;
        tx.update_inventory_record(&mut rec).await.unwrap();
        assert_eq!(rec.audit.version, 1);

        stale.quantity = 9;
        let err = tx.update_inventory_record(&mut stale).await.unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_injected_conflict_fails_commit_once() {
        let store = MemoryStore::new();
        store.inject_commit_conflicts(1);
        let rec = record();

        let mut tx = store.begin().await.unwrap();
        tx.insert_inventory_record(&rec).await.unwrap();
        assert!(tx.commit().await.unwrap_err().is_retryable());

        let mut tx = store.begin().await.unwrap();
        tx.insert_inventory_record(&rec).await.unwrap();
        tx.commit().await.unwrap();
    }
}
