//! Directory lookups shared by the workflow services

use shared::{CustomerRef, ProductRef, SupplierRef, UserRef, WarehouseRef};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::store::Transaction;

fn ensure_active(active: bool, field: &str, entity: &str, id: Uuid) -> AppResult<()> {
    if !active {
        return Err(AppError::validation(
            field,
            format!("{} {} is inactive", entity, id),
        ));
    }
    Ok(())
}

pub async fn require_product(tx: &mut dyn Transaction, id: Uuid) -> AppResult<ProductRef> {
    let product = tx
        .find_product(id)
        .await?
        .ok_or_else(|| AppError::not_found("Product", id))?;
    ensure_active(product.active, "product_id", "Product", id)?;
    Ok(product)
}

pub async fn require_warehouse(tx: &mut dyn Transaction, id: Uuid) -> AppResult<WarehouseRef> {
    let warehouse = tx
        .find_warehouse(id)
        .await?
        .ok_or_else(|| AppError::not_found("Warehouse", id))?;
    ensure_active(warehouse.active, "warehouse_id", "Warehouse", id)?;
    Ok(warehouse)
}

pub async fn require_supplier(tx: &mut dyn Transaction, id: Uuid) -> AppResult<SupplierRef> {
    let supplier = tx
        .find_supplier(id)
        .await?
        .ok_or_else(|| AppError::not_found("Supplier", id))?;
    ensure_active(supplier.active, "supplier_id", "Supplier", id)?;
    Ok(supplier)
}

pub async fn require_customer(tx: &mut dyn Transaction, id: Uuid) -> AppResult<CustomerRef> {
    let customer = tx
        .find_customer(id)
        .await?
        .ok_or_else(|| AppError::not_found("Customer", id))?;
    ensure_active(customer.active, "customer_id", "Customer", id)?;
    Ok(customer)
}

/// The acting user must exist; deactivated accounts cannot act
pub async fn require_user(tx: &mut dyn Transaction, id: Uuid) -> AppResult<UserRef> {
    let user = tx
        .find_user(id)
        .await?
        .ok_or_else(|| AppError::not_found("User", id))?;
    ensure_active(user.active, "user_id", "User", id)?;
    Ok(user)
}
