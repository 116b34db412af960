//! Workflow services of the warehouse backend
//!
//! Each service call is one retried unit of work against the store. The
//! `ledger`, `movement`, `numbering` and `order_inventory` modules are the
//! building blocks that run inside a caller's transaction.

pub mod adjustment;
pub mod inventory;
pub mod invoice;
pub mod ledger;
pub mod lookup;
pub mod movement;
pub mod numbering;
pub mod order_inventory;
pub mod payment;
pub mod purchase_order;
pub mod sales_order;
pub mod shipment;

pub use adjustment::AdjustmentService;
pub use inventory::InventoryService;
pub use invoice::InvoiceService;
pub use payment::PaymentService;
pub use purchase_order::PurchaseOrderService;
pub use sales_order::SalesOrderService;
pub use shipment::ShipmentService;
