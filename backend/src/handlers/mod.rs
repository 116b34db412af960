//! HTTP handlers

pub mod adjustment;
pub mod health;
pub mod inventory;
pub mod invoice;
pub mod payment;
pub mod purchase_order;
pub mod sales_order;
pub mod shipment;

pub use adjustment::*;
pub use health::*;
pub use inventory::*;
pub use invoice::*;
pub use payment::*;
pub use purchase_order::*;
pub use sales_order::*;
pub use shipment::*;
