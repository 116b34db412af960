//! Domain models for warehouse inventory and order workflows

mod adjustment;
mod directory;
mod inventory;
mod invoice;
mod payment;
mod purchase_order;
mod sales_order;
mod shipment;

pub use adjustment::*;
pub use directory::*;
pub use inventory::*;
pub use invoice::*;
pub use payment::*;
pub use purchase_order::*;
pub use sales_order::*;
pub use shipment::*;
