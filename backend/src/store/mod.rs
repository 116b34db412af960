//! Transactional persistence behind the workflow services
//!
//! A [`Store`] hands out [`Transaction`]s. Every workflow call runs inside one
//! transaction: it reads aggregates (locking them for the rest of the
//! transaction), mutates them through the domain models and writes them back
//! with an optimistic version check. Dropping a transaction without calling
//! [`Transaction::commit`] discards all of its writes.

use std::sync::Arc;

use async_trait::async_trait;
use shared::{
    CustomerRef, DocumentKind, InventoryRecord, Invoice, MovementFilter, MovementRecord, Payment,
    ProductRef, PurchaseOrder, SalesOrder, Shipment, StockAdjustment, SupplierRef, UserRef,
    WarehouseRef,
};
use uuid::Uuid;

use crate::error::AppResult;

pub mod memory;
pub mod postgres;
pub mod retry;

pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use retry::{with_retry, RetryConfig};

/// Shared handle to the configured store
pub type Storage = Arc<dyn Store>;

#[async_trait]
pub trait Store: Send + Sync {
    /// Open a new all-or-nothing unit of work
    async fn begin(&self) -> AppResult<Box<dyn Transaction>>;

    async fn health_check(&self) -> AppResult<()>;
}

/// Read-only identity lookups for catalog entities owned outside the core
#[async_trait]
pub trait Directory: Send {
    async fn find_product(&mut self, id: Uuid) -> AppResult<Option<ProductRef>>;
    async fn find_warehouse(&mut self, id: Uuid) -> AppResult<Option<WarehouseRef>>;
    async fn find_supplier(&mut self, id: Uuid) -> AppResult<Option<SupplierRef>>;
    async fn find_customer(&mut self, id: Uuid) -> AppResult<Option<CustomerRef>>;
    async fn find_user(&mut self, id: Uuid) -> AppResult<Option<UserRef>>;
}

/// One unit of work.
///
/// `update_*` methods fail with `ConcurrentModification` when the stored
/// version no longer matches the one that was read, and bump the version of
/// the passed entity on success. `insert_*` methods fail with
/// `ConcurrentModification` when a document number is already taken.
#[async_trait]
pub trait Transaction: Directory {
    // Stock ledger
    async fn inventory_record(
        &mut self,
        product_id: Uuid,
        warehouse_id: Uuid,
    ) -> AppResult<Option<InventoryRecord>>;
    async fn inventory_for_product(&mut self, product_id: Uuid) -> AppResult<Vec<InventoryRecord>>;
    async fn insert_inventory_record(&mut self, record: &InventoryRecord) -> AppResult<()>;
    async fn update_inventory_record(&mut self, record: &mut InventoryRecord) -> AppResult<()>;

    // Movement audit trail (append only)
    async fn insert_movement(&mut self, movement: &MovementRecord) -> AppResult<()>;
    async fn movements(&mut self, filter: &MovementFilter) -> AppResult<Vec<MovementRecord>>;

    // Document numbering
    async fn count_document_numbers(&mut self, kind: DocumentKind, prefix: &str) -> AppResult<i64>;
    async fn document_number_exists(&mut self, kind: DocumentKind, number: &str) -> AppResult<bool>;

    // Stock adjustments
    async fn stock_adjustment(&mut self, id: Uuid) -> AppResult<Option<StockAdjustment>>;
    async fn insert_stock_adjustment(&mut self, adjustment: &StockAdjustment) -> AppResult<()>;
    async fn update_stock_adjustment(&mut self, adjustment: &mut StockAdjustment) -> AppResult<()>;

    // Purchase orders
    async fn purchase_order(&mut self, id: Uuid) -> AppResult<Option<PurchaseOrder>>;
    async fn insert_purchase_order(&mut self, order: &PurchaseOrder) -> AppResult<()>;
    async fn update_purchase_order(&mut self, order: &mut PurchaseOrder) -> AppResult<()>;
    async fn delete_purchase_order(&mut self, order: &PurchaseOrder) -> AppResult<()>;

    // Sales orders
    async fn sales_order(&mut self, id: Uuid) -> AppResult<Option<SalesOrder>>;
    async fn insert_sales_order(&mut self, order: &SalesOrder) -> AppResult<()>;
    async fn update_sales_order(&mut self, order: &mut SalesOrder) -> AppResult<()>;

    // Shipments
    async fn shipment(&mut self, id: Uuid) -> AppResult<Option<Shipment>>;
    async fn shipments_for_sales_order(&mut self, sales_order_id: Uuid) -> AppResult<Vec<Shipment>>;
    async fn insert_shipment(&mut self, shipment: &Shipment) -> AppResult<()>;
    async fn update_shipment(&mut self, shipment: &mut Shipment) -> AppResult<()>;

    // Invoices
    async fn invoice(&mut self, id: Uuid) -> AppResult<Option<Invoice>>;
    async fn invoice_for_sales_order(&mut self, sales_order_id: Uuid) -> AppResult<Option<Invoice>>;
    /// Fails with `DuplicateInvoice` when the sales order already has one
    async fn insert_invoice(&mut self, invoice: &Invoice) -> AppResult<()>;
    async fn update_invoice(&mut self, invoice: &mut Invoice) -> AppResult<()>;

    // Payments
    async fn payment(&mut self, id: Uuid) -> AppResult<Option<Payment>>;
    async fn insert_payment(&mut self, payment: &Payment) -> AppResult<()>;
    async fn update_payment(&mut self, payment: &mut Payment) -> AppResult<()>;

    /// Make every write of this transaction visible atomically
    async fn commit(self: Box<Self>) -> AppResult<()>;
}
