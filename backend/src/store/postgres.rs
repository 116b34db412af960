//! PostgreSQL store
//!
//! Aggregates are read with `SELECT ... FOR UPDATE` so that concurrent
//! workflow calls touching the same rows queue behind each other, and every
//! update carries a `version = $n` guard as a second line of defence.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use shared::{
    AdjustmentReason, AdjustmentStatus, AdjustmentType, Auditable, CustomerRef, CustomerSnapshot,
    DocumentKind, InventoryRecord, Invoice, InvoiceStatus, MovementFilter, MovementRecord,
    MovementType, Payment, PaymentMethod, PaymentStatus, ProductRef, PurchaseOrder,
    PurchaseOrderItem, PurchaseOrderStatus, SalesOrder, SalesOrderItem, SalesOrderStatus,
    Shipment, ShipmentStatus, ShippingMethod, StockAdjustment, SupplierRef, UserRef, WarehouseRef,
};
use sqlx::{postgres::PgQueryResult, FromRow, PgPool, Postgres};
use uuid::Uuid;

use super::{Directory, Store, Transaction};
use crate::error::{AppError, AppResult};

/// Store backed by a PostgreSQL connection pool
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Store for PgStore {
    async fn begin(&self) -> AppResult<Box<dyn Transaction>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgTransaction { tx }))
    }

    async fn health_check(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

pub struct PgTransaction {
    tx: sqlx::Transaction<'static, Postgres>,
}

// ============================================================================
// Error mapping
// ============================================================================

/// Serialization failures, deadlocks and unique violations on document
/// numbers all mean another transaction won a race; the caller may retry.
fn map_write_error(err: sqlx::Error, entity: &str, id: Uuid) -> AppError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            return AppError::conflict(entity, id);
        }
        if matches!(db.code().as_deref(), Some("40001") | Some("40P01")) {
            return AppError::conflict(entity, id);
        }
    }
    AppError::DatabaseError(err)
}

fn is_constraint(err: &sqlx::Error, name: &str) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.constraint() == Some(name))
}

fn ensure_updated(result: PgQueryResult, entity: &str, id: Uuid) -> AppResult<()> {
    if result.rows_affected() == 0 {
        return Err(AppError::conflict(entity, id));
    }
    Ok(())
}

fn parse<T>(value: &str, column: &str, from_str: fn(&str) -> Option<T>) -> AppResult<T> {
    from_str(value).ok_or_else(|| AppError::Internal(format!("Unknown {} value: {}", column, value)))
}

fn audit(created_at: DateTime<Utc>, updated_at: DateTime<Utc>, version: i64) -> Auditable {
    Auditable {
        created_at,
        updated_at,
        version,
    }
}

// ============================================================================
// Rows
// ============================================================================

#[derive(Debug, FromRow)]
struct ProductRow {
    id: Uuid,
    sku: String,
    name: String,
    unit_price: Decimal,
    cost_price: Decimal,
    is_active: bool,
}

#[derive(Debug, FromRow)]
struct CustomerRow {
    id: Uuid,
    name: String,
    email: Option<String>,
    phone: Option<String>,
    address: Option<String>,
    city: Option<String>,
    postal_code: Option<String>,
    is_active: bool,
}

const INVENTORY_COLUMNS: &str = "id, product_id, warehouse_id, quantity, location_code, \
     last_stock_check, created_at, updated_at, version";

#[derive(Debug, FromRow)]
struct InventoryRow {
    id: Uuid,
    product_id: Uuid,
    warehouse_id: Uuid,
    quantity: i32,
    location_code: Option<String>,
    last_stock_check: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    version: i64,
}

impl From<InventoryRow> for InventoryRecord {
    fn from(row: InventoryRow) -> Self {
        InventoryRecord {
            id: row.id,
            product_id: row.product_id,
            warehouse_id: row.warehouse_id,
            quantity: row.quantity,
            location_code: row.location_code,
            last_stock_check: row.last_stock_check,
            audit: audit(row.created_at, row.updated_at, row.version),
        }
    }
}

const MOVEMENT_COLUMNS: &str = "id, product_id, from_warehouse_id, to_warehouse_id, quantity, \
     movement_type, reason, reference_number, performed_by, movement_date, created_at";

#[derive(Debug, FromRow)]
struct MovementRow {
    id: Uuid,
    product_id: Uuid,
    from_warehouse_id: Option<Uuid>,
    to_warehouse_id: Option<Uuid>,
    quantity: i32,
    movement_type: String,
    reason: String,
    reference_number: Option<String>,
    performed_by: Uuid,
    movement_date: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl TryFrom<MovementRow> for MovementRecord {
    type Error = AppError;

    fn try_from(row: MovementRow) -> AppResult<Self> {
        Ok(MovementRecord {
            id: row.id,
            product_id: row.product_id,
            from_warehouse_id: row.from_warehouse_id,
            to_warehouse_id: row.to_warehouse_id,
            quantity: row.quantity,
            movement_type: parse(&row.movement_type, "movement_type", MovementType::from_str)?,
            reason: row.reason,
            reference_number: row.reference_number,
            performed_by: row.performed_by,
            movement_date: row.movement_date,
            created_at: row.created_at,
        })
    }
}

const ADJUSTMENT_COLUMNS: &str = "id, product_id, warehouse_id, quantity_before, quantity_after, \
     quantity_change, adjustment_type, reason, performed_by, approved_by, status, notes, \
     adjustment_date, created_at, updated_at, version";

#[derive(Debug, FromRow)]
struct AdjustmentRow {
    id: Uuid,
    product_id: Uuid,
    warehouse_id: Uuid,
    quantity_before: i32,
    quantity_after: i32,
    quantity_change: i32,
    adjustment_type: String,
    reason: String,
    performed_by: Uuid,
    approved_by: Option<Uuid>,
    status: String,
    notes: Option<String>,
    adjustment_date: DateTime<Utc>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    version: i64,
}

impl TryFrom<AdjustmentRow> for StockAdjustment {
    type Error = AppError;

    fn try_from(row: AdjustmentRow) -> AppResult<Self> {
        Ok(StockAdjustment {
            id: row.id,
            product_id: row.product_id,
            warehouse_id: row.warehouse_id,
            quantity_before: row.quantity_before,
            quantity_after: row.quantity_after,
            quantity_change: row.quantity_change,
            adjustment_type: parse(&row.adjustment_type, "adjustment_type", AdjustmentType::from_str)?,
            reason: parse(&row.reason, "reason", AdjustmentReason::from_str)?,
            performed_by: row.performed_by,
            approved_by: row.approved_by,
            status: parse(&row.status, "status", AdjustmentStatus::from_str)?,
            notes: row.notes,
            adjustment_date: row.adjustment_date,
            audit: audit(row.created_at, row.updated_at, row.version),
        })
    }
}

const PURCHASE_ORDER_COLUMNS: &str = "id, po_number, supplier_id, warehouse_id, created_by, status, \
     order_date, expected_delivery_date, actual_delivery_date, subtotal, tax_amount, \
     discount_amount, total_amount, notes, created_at, updated_at, version";

#[derive(Debug, FromRow)]
struct PurchaseOrderRow {
    id: Uuid,
    po_number: String,
    supplier_id: Uuid,
    warehouse_id: Uuid,
    created_by: Uuid,
    status: String,
    order_date: NaiveDate,
    expected_delivery_date: Option<NaiveDate>,
    actual_delivery_date: Option<NaiveDate>,
    subtotal: Decimal,
    tax_amount: Decimal,
    discount_amount: Decimal,
    total_amount: Decimal,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    version: i64,
}

#[derive(Debug, FromRow)]
struct PurchaseOrderItemRow {
    id: Uuid,
    product_id: Uuid,
    quantity_ordered: i32,
    quantity_received: i32,
    unit_price: Decimal,
    line_total: Decimal,
}

impl From<PurchaseOrderItemRow> for PurchaseOrderItem {
    fn from(row: PurchaseOrderItemRow) -> Self {
        PurchaseOrderItem {
            id: row.id,
            product_id: row.product_id,
            quantity_ordered: row.quantity_ordered,
            quantity_received: row.quantity_received,
            unit_price: row.unit_price,
            line_total: row.line_total,
        }
    }
}

impl PurchaseOrderRow {
    fn into_order(self, items: Vec<PurchaseOrderItem>) -> AppResult<PurchaseOrder> {
        Ok(PurchaseOrder {
            id: self.id,
            po_number: self.po_number,
            supplier_id: self.supplier_id,
            warehouse_id: self.warehouse_id,
            created_by: self.created_by,
            status: parse(&self.status, "status", PurchaseOrderStatus::from_str)?,
            order_date: self.order_date,
            expected_delivery_date: self.expected_delivery_date,
            actual_delivery_date: self.actual_delivery_date,
            subtotal: self.subtotal,
            tax_amount: self.tax_amount,
            discount_amount: self.discount_amount,
            total_amount: self.total_amount,
            notes: self.notes,
            items,
            audit: audit(self.created_at, self.updated_at, self.version),
        })
    }
}

const SALES_ORDER_COLUMNS: &str = "id, so_number, customer_id, customer_name, customer_email, \
     customer_phone, shipping_address, city, postal_code, warehouse_id, created_by, status, \
     order_date, fulfillment_date, shipping_date, delivery_date, subtotal, tax_amount, \
     shipping_cost, total_amount, notes, created_at, updated_at, version";

#[derive(Debug, FromRow)]
struct SalesOrderRow {
    id: Uuid,
    so_number: String,
    customer_id: Uuid,
    customer_name: Option<String>,
    customer_email: Option<String>,
    customer_phone: Option<String>,
    shipping_address: Option<String>,
    city: Option<String>,
    postal_code: Option<String>,
    warehouse_id: Uuid,
    created_by: Uuid,
    status: String,
    order_date: NaiveDate,
    fulfillment_date: Option<NaiveDate>,
    shipping_date: Option<NaiveDate>,
    delivery_date: Option<NaiveDate>,
    subtotal: Decimal,
    tax_amount: Decimal,
    shipping_cost: Decimal,
    total_amount: Decimal,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    version: i64,
}

#[derive(Debug, FromRow)]
struct SalesOrderItemRow {
    id: Uuid,
    product_id: Uuid,
    quantity: i32,
    unit_price: Decimal,
    line_total: Decimal,
}

impl From<SalesOrderItemRow> for SalesOrderItem {
    fn from(row: SalesOrderItemRow) -> Self {
        SalesOrderItem {
            id: row.id,
            product_id: row.product_id,
            quantity: row.quantity,
            unit_price: row.unit_price,
            line_total: row.line_total,
        }
    }
}

impl SalesOrderRow {
    fn into_order(self, items: Vec<SalesOrderItem>) -> AppResult<SalesOrder> {
        Ok(SalesOrder {
            id: self.id,
            so_number: self.so_number,
            customer_id: self.customer_id,
            customer: CustomerSnapshot {
                customer_name: self.customer_name,
                customer_email: self.customer_email,
                customer_phone: self.customer_phone,
                shipping_address: self.shipping_address,
                city: self.city,
                postal_code: self.postal_code,
            },
            warehouse_id: self.warehouse_id,
            created_by: self.created_by,
            status: parse(&self.status, "status", SalesOrderStatus::from_str)?,
            order_date: self.order_date,
            fulfillment_date: self.fulfillment_date,
            shipping_date: self.shipping_date,
            delivery_date: self.delivery_date,
            subtotal: self.subtotal,
            tax_amount: self.tax_amount,
            shipping_cost: self.shipping_cost,
            total_amount: self.total_amount,
            notes: self.notes,
            items,
            audit: audit(self.created_at, self.updated_at, self.version),
        })
    }
}

const SHIPMENT_COLUMNS: &str = "id, shipment_number, sales_order_id, carrier, tracking_number, \
     shipping_method, estimated_delivery_date, actual_delivery_date, shipping_cost, weight, \
     dimensions, status, shipped_from_warehouse_id, shipped_by, notes, created_at, updated_at, version";

#[derive(Debug, FromRow)]
struct ShipmentRow {
    id: Uuid,
    shipment_number: String,
    sales_order_id: Uuid,
    carrier: String,
    tracking_number: Option<String>,
    shipping_method: String,
    estimated_delivery_date: Option<NaiveDate>,
    actual_delivery_date: Option<NaiveDate>,
    shipping_cost: Decimal,
    weight: Option<Decimal>,
    dimensions: Option<String>,
    status: String,
    shipped_from_warehouse_id: Uuid,
    shipped_by: Uuid,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    version: i64,
}

impl TryFrom<ShipmentRow> for Shipment {
    type Error = AppError;

    fn try_from(row: ShipmentRow) -> AppResult<Self> {
        Ok(Shipment {
            id: row.id,
            shipment_number: row.shipment_number,
            sales_order_id: row.sales_order_id,
            carrier: row.carrier,
            tracking_number: row.tracking_number,
            shipping_method: parse(&row.shipping_method, "shipping_method", ShippingMethod::from_str)?,
            estimated_delivery_date: row.estimated_delivery_date,
            actual_delivery_date: row.actual_delivery_date,
            shipping_cost: row.shipping_cost,
            weight: row.weight,
            dimensions: row.dimensions,
            status: parse(&row.status, "status", ShipmentStatus::from_str)?,
            shipped_from_warehouse_id: row.shipped_from_warehouse_id,
            shipped_by: row.shipped_by,
            notes: row.notes,
            audit: audit(row.created_at, row.updated_at, row.version),
        })
    }
}

const INVOICE_COLUMNS: &str = "id, invoice_number, sales_order_id, customer_id, invoice_date, \
     due_date, subtotal, tax_amount, discount_amount, total_amount, paid_amount, balance_due, \
     status, payment_terms, notes, file_url, generated_by, created_at, updated_at, version";

#[derive(Debug, FromRow)]
struct InvoiceRow {
    id: Uuid,
    invoice_number: String,
    sales_order_id: Uuid,
    customer_id: Uuid,
    invoice_date: NaiveDate,
    due_date: NaiveDate,
    subtotal: Decimal,
    tax_amount: Decimal,
    discount_amount: Decimal,
    total_amount: Decimal,
    paid_amount: Decimal,
    balance_due: Decimal,
    status: String,
    payment_terms: Option<String>,
    notes: Option<String>,
    file_url: Option<String>,
    generated_by: Uuid,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    version: i64,
}

impl TryFrom<InvoiceRow> for Invoice {
    type Error = AppError;

    fn try_from(row: InvoiceRow) -> AppResult<Self> {
        Ok(Invoice {
            id: row.id,
            invoice_number: row.invoice_number,
            sales_order_id: row.sales_order_id,
            customer_id: row.customer_id,
            invoice_date: row.invoice_date,
            due_date: row.due_date,
            subtotal: row.subtotal,
            tax_amount: row.tax_amount,
            discount_amount: row.discount_amount,
            total_amount: row.total_amount,
            paid_amount: row.paid_amount,
            balance_due: row.balance_due,
            status: parse(&row.status, "status", InvoiceStatus::from_str)?,
            payment_terms: row.payment_terms,
            notes: row.notes,
            file_url: row.file_url,
            generated_by: row.generated_by,
            audit: audit(row.created_at, row.updated_at, row.version),
        })
    }
}

const PAYMENT_COLUMNS: &str = "id, payment_number, sales_order_id, invoice_id, customer_id, \
     payment_date, payment_method, amount, currency, reference_number, status, processed_by, \
     notes, created_at, updated_at, version";

#[derive(Debug, FromRow)]
struct PaymentRow {
    id: Uuid,
    payment_number: String,
    sales_order_id: Option<Uuid>,
    invoice_id: Option<Uuid>,
    customer_id: Uuid,
    payment_date: NaiveDate,
    payment_method: String,
    amount: Decimal,
    currency: String,
    reference_number: Option<String>,
    status: String,
    processed_by: Uuid,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    version: i64,
}

impl TryFrom<PaymentRow> for Payment {
    type Error = AppError;

    fn try_from(row: PaymentRow) -> AppResult<Self> {
        Ok(Payment {
            id: row.id,
            payment_number: row.payment_number,
            sales_order_id: row.sales_order_id,
            invoice_id: row.invoice_id,
            customer_id: row.customer_id,
            payment_date: row.payment_date,
            payment_method: parse(&row.payment_method, "payment_method", PaymentMethod::from_str)?,
            amount: row.amount,
            currency: row.currency,
            reference_number: row.reference_number,
            status: parse(&row.status, "status", PaymentStatus::from_str)?,
            processed_by: row.processed_by,
            notes: row.notes,
            audit: audit(row.created_at, row.updated_at, row.version),
        })
    }
}

/// Table and number column holding each document kind
fn number_column(kind: DocumentKind) -> (&'static str, &'static str) {
    match kind {
        DocumentKind::PurchaseOrder => ("purchase_orders", "po_number"),
        DocumentKind::SalesOrder => ("sales_orders", "so_number"),
        DocumentKind::Shipment => ("shipments", "shipment_number"),
        DocumentKind::Invoice => ("invoices", "invoice_number"),
        DocumentKind::Payment => ("payments", "payment_number"),
    }
}

// ============================================================================
// Directory
// ============================================================================

#[async_trait]
impl Directory for PgTransaction {
    async fn find_product(&mut self, id: Uuid) -> AppResult<Option<ProductRef>> {
        let row = sqlx::query_as::<_, ProductRow>(
            "SELECT id, sku, name, unit_price, cost_price, is_active FROM products WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(row.map(|r| ProductRef {
            id: r.id,
            sku: r.sku,
            name: r.name,
            unit_price: r.unit_price,
            cost_price: r.cost_price,
            active: r.is_active,
        }))
    }

    async fn find_warehouse(&mut self, id: Uuid) -> AppResult<Option<WarehouseRef>> {
        let row = sqlx::query_as::<_, (Uuid, String, String, bool)>(
            "SELECT id, code, name, is_active FROM warehouses WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(row.map(|(id, code, name, active)| WarehouseRef {
            id,
            code,
            name,
            active,
        }))
    }

    async fn find_supplier(&mut self, id: Uuid) -> AppResult<Option<SupplierRef>> {
        let row = sqlx::query_as::<_, (Uuid, String, bool)>(
            "SELECT id, name, is_active FROM suppliers WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(row.map(|(id, name, active)| SupplierRef { id, name, active }))
    }

    async fn find_customer(&mut self, id: Uuid) -> AppResult<Option<CustomerRef>> {
        let row = sqlx::query_as::<_, CustomerRow>(
            r#"
            SELECT id, name, email, phone, address, city, postal_code, is_active
            FROM customers
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(row.map(|r| CustomerRef {
            id: r.id,
            name: r.name,
            email: r.email,
            phone: r.phone,
            address: r.address,
            city: r.city,
            postal_code: r.postal_code,
            active: r.is_active,
        }))
    }

    async fn find_user(&mut self, id: Uuid) -> AppResult<Option<UserRef>> {
        let row = sqlx::query_as::<_, (Uuid, String, bool)>(
            "SELECT id, username, is_active FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(row.map(|(id, username, active)| UserRef {
            id,
            username,
            active,
        }))
    }
}

// ============================================================================
// Transaction
// ============================================================================

impl PgTransaction {
    async fn purchase_order_items(&mut self, order_id: Uuid) -> AppResult<Vec<PurchaseOrderItem>> {
        let rows = sqlx::query_as::<_, PurchaseOrderItemRow>(
            r#"
            SELECT id, product_id, quantity_ordered, quantity_received, unit_price, line_total
            FROM purchase_order_items
            WHERE purchase_order_id = $1
            ORDER BY position
            "#,
        )
        .bind(order_id)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn save_purchase_order_items(&mut self, order: &PurchaseOrder) -> AppResult<()> {
        let ids: Vec<Uuid> = order.items.iter().map(|i| i.id).collect();
        sqlx::query("DELETE FROM purchase_order_items WHERE purchase_order_id = $1 AND NOT (id = ANY($2))")
            .bind(order.id)
            .bind(&ids)
            .execute(&mut *self.tx)
            .await?;

        for (position, item) in order.items.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO purchase_order_items (
                    id, purchase_order_id, position, product_id, quantity_ordered,
                    quantity_received, unit_price, line_total
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                ON CONFLICT (id) DO UPDATE
                SET position = EXCLUDED.position, product_id = EXCLUDED.product_id,
                    quantity_ordered = EXCLUDED.quantity_ordered,
                    quantity_received = EXCLUDED.quantity_received,
                    unit_price = EXCLUDED.unit_price, line_total = EXCLUDED.line_total
                "#,
            )
            .bind(item.id)
            .bind(order.id)
            .bind(position as i32)
            .bind(item.product_id)
            .bind(item.quantity_ordered)
            .bind(item.quantity_received)
            .bind(item.unit_price)
            .bind(item.line_total)
            .execute(&mut *self.tx)
            .await?;
        }
        Ok(())
    }

    async fn sales_order_items(&mut self, order_id: Uuid) -> AppResult<Vec<SalesOrderItem>> {
        let rows = sqlx::query_as::<_, SalesOrderItemRow>(
            r#"
            SELECT id, product_id, quantity, unit_price, line_total
            FROM sales_order_items
            WHERE sales_order_id = $1
            ORDER BY position
            "#,
        )
        .bind(order_id)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn save_sales_order_items(&mut self, order: &SalesOrder) -> AppResult<()> {
        let ids: Vec<Uuid> = order.items.iter().map(|i| i.id).collect();
        sqlx::query("DELETE FROM sales_order_items WHERE sales_order_id = $1 AND NOT (id = ANY($2))")
            .bind(order.id)
            .bind(&ids)
            .execute(&mut *self.tx)
            .await?;

        for (position, item) in order.items.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO sales_order_items (
                    id, sales_order_id, position, product_id, quantity, unit_price, line_total
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                ON CONFLICT (id) DO UPDATE
                SET position = EXCLUDED.position, product_id = EXCLUDED.product_id,
                    quantity = EXCLUDED.quantity, unit_price = EXCLUDED.unit_price,
                    line_total = EXCLUDED.line_total
                "#,
            )
            .bind(item.id)
            .bind(order.id)
            .bind(position as i32)
            .bind(item.product_id)
            .bind(item.quantity)
            .bind(item.unit_price)
            .bind(item.line_total)
            .execute(&mut *self.tx)
            .await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Transaction for PgTransaction {
    async fn inventory_record(
        &mut self,
        product_id: Uuid,
        warehouse_id: Uuid,
    ) -> AppResult<Option<InventoryRecord>> {
        let row = sqlx::query_as::<_, InventoryRow>(&format!(
            "SELECT {} FROM inventory_items WHERE product_id = $1 AND warehouse_id = $2 FOR UPDATE",
            INVENTORY_COLUMNS
        ))
        .bind(product_id)
        .bind(warehouse_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn inventory_for_product(&mut self, product_id: Uuid) -> AppResult<Vec<InventoryRecord>> {
        let rows = sqlx::query_as::<_, InventoryRow>(&format!(
            "SELECT {} FROM inventory_items WHERE product_id = $1 ORDER BY warehouse_id",
            INVENTORY_COLUMNS
        ))
        .bind(product_id)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn insert_inventory_record(&mut self, record: &InventoryRecord) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO inventory_items (
                id, product_id, warehouse_id, quantity, location_code, last_stock_check,
                created_at, updated_at, version
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(record.id)
        .bind(record.product_id)
        .bind(record.warehouse_id)
        .bind(record.quantity)
        .bind(&record.location_code)
        .bind(record.last_stock_check)
        .bind(record.audit.created_at)
        .bind(record.audit.updated_at)
        .bind(record.audit.version)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_write_error(e, "InventoryRecord", record.id))?;
        Ok(())
    }

    async fn update_inventory_record(&mut self, record: &mut InventoryRecord) -> AppResult<()> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            UPDATE inventory_items
            SET quantity = $3, location_code = $4, last_stock_check = $5,
                updated_at = $6, version = version + 1
            WHERE id = $1 AND version = $2
            "#,
        )
        .bind(record.id)
        .bind(record.audit.version)
        .bind(record.quantity)
        .bind(&record.location_code)
        .bind(record.last_stock_check)
        .bind(now)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_write_error(e, "InventoryRecord", record.id))?;
        ensure_updated(result, "InventoryRecord", record.id)?;
        record.audit.touch(now);
        Ok(())
    }

    async fn insert_movement(&mut self, movement: &MovementRecord) -> AppResult<()> {
        sqlx::query(&format!(
            "INSERT INTO stock_movements ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
            MOVEMENT_COLUMNS
        ))
        .bind(movement.id)
        .bind(movement.product_id)
        .bind(movement.from_warehouse_id)
        .bind(movement.to_warehouse_id)
        .bind(movement.quantity)
        .bind(movement.movement_type.as_str())
        .bind(&movement.reason)
        .bind(&movement.reference_number)
        .bind(movement.performed_by)
        .bind(movement.movement_date)
        .bind(movement.created_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn movements(&mut self, filter: &MovementFilter) -> AppResult<Vec<MovementRecord>> {
        let rows = sqlx::query_as::<_, MovementRow>(&format!(
            r#"
            SELECT {}
            FROM stock_movements
            WHERE ($1::uuid IS NULL OR product_id = $1)
              AND ($2::uuid IS NULL OR from_warehouse_id = $2 OR to_warehouse_id = $2)
              AND ($3::varchar IS NULL OR movement_type = $3)
              AND ($4::varchar IS NULL OR reference_number = $4)
            ORDER BY movement_date, created_at
            "#,
            MOVEMENT_COLUMNS
        ))
        .bind(filter.product_id)
        .bind(filter.warehouse_id)
        .bind(filter.movement_type.map(|t| t.as_str()))
        .bind(&filter.reference_number)
        .fetch_all(&mut *self.tx)
        .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn count_document_numbers(&mut self, kind: DocumentKind, prefix: &str) -> AppResult<i64> {
        let (table, column) = number_column(kind);
        let count = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM {} WHERE {} LIKE $1 || '%'",
            table, column
        ))
        .bind(prefix)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(count)
    }

    async fn document_number_exists(&mut self, kind: DocumentKind, number: &str) -> AppResult<bool> {
        let (table, column) = number_column(kind);
        let exists = sqlx::query_scalar::<_, bool>(&format!(
            "SELECT EXISTS(SELECT 1 FROM {} WHERE {} = $1)",
            table, column
        ))
        .bind(number)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(exists)
    }

    async fn stock_adjustment(&mut self, id: Uuid) -> AppResult<Option<StockAdjustment>> {
        let row = sqlx::query_as::<_, AdjustmentRow>(&format!(
            "SELECT {} FROM stock_adjustments WHERE id = $1 FOR UPDATE",
            ADJUSTMENT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn insert_stock_adjustment(&mut self, adjustment: &StockAdjustment) -> AppResult<()> {
        sqlx::query(&format!(
            "INSERT INTO stock_adjustments ({}) VALUES \
             ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)",
            ADJUSTMENT_COLUMNS
        ))
        .bind(adjustment.id)
        .bind(adjustment.product_id)
        .bind(adjustment.warehouse_id)
        .bind(adjustment.quantity_before)
        .bind(adjustment.quantity_after)
        .bind(adjustment.quantity_change)
        .bind(adjustment.adjustment_type.as_str())
        .bind(adjustment.reason.as_str())
        .bind(adjustment.performed_by)
        .bind(adjustment.approved_by)
        .bind(adjustment.status.as_str())
        .bind(&adjustment.notes)
        .bind(adjustment.adjustment_date)
        .bind(adjustment.audit.created_at)
        .bind(adjustment.audit.updated_at)
        .bind(adjustment.audit.version)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_write_error(e, "StockAdjustment", adjustment.id))?;
        Ok(())
    }

    async fn update_stock_adjustment(&mut self, adjustment: &mut StockAdjustment) -> AppResult<()> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            UPDATE stock_adjustments
            SET status = $3, approved_by = $4, notes = $5, updated_at = $6, version = version + 1
            WHERE id = $1 AND version = $2
            "#,
        )
        .bind(adjustment.id)
        .bind(adjustment.audit.version)
        .bind(adjustment.status.as_str())
        .bind(adjustment.approved_by)
        .bind(&adjustment.notes)
        .bind(now)
        .execute(&mut *self.tx)
        .await?;
        ensure_updated(result, "StockAdjustment", adjustment.id)?;
        adjustment.audit.touch(now);
        Ok(())
    }

    async fn purchase_order(&mut self, id: Uuid) -> AppResult<Option<PurchaseOrder>> {
        let row = sqlx::query_as::<_, PurchaseOrderRow>(&format!(
            "SELECT {} FROM purchase_orders WHERE id = $1 FOR UPDATE",
            PURCHASE_ORDER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        match row {
            Some(row) => {
                let items = self.purchase_order_items(row.id).await?;
                row.into_order(items).map(Some)
            }
            None => Ok(None),
        }
    }

    async fn insert_purchase_order(&mut self, order: &PurchaseOrder) -> AppResult<()> {
        sqlx::query(&format!(
            "INSERT INTO purchase_orders ({}) VALUES \
             ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)",
            PURCHASE_ORDER_COLUMNS
        ))
        .bind(order.id)
        .bind(&order.po_number)
        .bind(order.supplier_id)
        .bind(order.warehouse_id)
        .bind(order.created_by)
        .bind(order.status.as_str())
        .bind(order.order_date)
        .bind(order.expected_delivery_date)
        .bind(order.actual_delivery_date)
        .bind(order.subtotal)
        .bind(order.tax_amount)
        .bind(order.discount_amount)
        .bind(order.total_amount)
        .bind(&order.notes)
        .bind(order.audit.created_at)
        .bind(order.audit.updated_at)
        .bind(order.audit.version)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_write_error(e, "PurchaseOrder", order.id))?;

        self.save_purchase_order_items(order).await
    }

    async fn update_purchase_order(&mut self, order: &mut PurchaseOrder) -> AppResult<()> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            UPDATE purchase_orders
            SET supplier_id = $3, warehouse_id = $4, status = $5, order_date = $6,
                expected_delivery_date = $7, actual_delivery_date = $8, subtotal = $9,
                tax_amount = $10, discount_amount = $11, total_amount = $12, notes = $13,
                updated_at = $14, version = version + 1
            WHERE id = $1 AND version = $2
            "#,
        )
        .bind(order.id)
        .bind(order.audit.version)
        .bind(order.supplier_id)
        .bind(order.warehouse_id)
        .bind(order.status.as_str())
        .bind(order.order_date)
        .bind(order.expected_delivery_date)
        .bind(order.actual_delivery_date)
        .bind(order.subtotal)
        .bind(order.tax_amount)
        .bind(order.discount_amount)
        .bind(order.total_amount)
        .bind(&order.notes)
        .bind(now)
        .execute(&mut *self.tx)
        .await?;
        ensure_updated(result, "PurchaseOrder", order.id)?;

        self.save_purchase_order_items(order).await?;
        order.audit.touch(now);
        Ok(())
    }

    async fn delete_purchase_order(&mut self, order: &PurchaseOrder) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM purchase_orders WHERE id = $1 AND version = $2")
            .bind(order.id)
            .bind(order.audit.version)
            .execute(&mut *self.tx)
            .await?;
        ensure_updated(result, "PurchaseOrder", order.id)
    }

    async fn sales_order(&mut self, id: Uuid) -> AppResult<Option<SalesOrder>> {
        let row = sqlx::query_as::<_, SalesOrderRow>(&format!(
            "SELECT {} FROM sales_orders WHERE id = $1 FOR UPDATE",
            SALES_ORDER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        match row {
            Some(row) => {
                let items = self.sales_order_items(row.id).await?;
                row.into_order(items).map(Some)
            }
            None => Ok(None),
        }
    }

    async fn insert_sales_order(&mut self, order: &SalesOrder) -> AppResult<()> {
        sqlx::query(&format!(
            "INSERT INTO sales_orders ({}) VALUES \
             ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, \
              $19, $20, $21, $22, $23, $24)",
            SALES_ORDER_COLUMNS
        ))
        .bind(order.id)
        .bind(&order.so_number)
        .bind(order.customer_id)
        .bind(&order.customer.customer_name)
        .bind(&order.customer.customer_email)
        .bind(&order.customer.customer_phone)
        .bind(&order.customer.shipping_address)
        .bind(&order.customer.city)
        .bind(&order.customer.postal_code)
        .bind(order.warehouse_id)
        .bind(order.created_by)
        .bind(order.status.as_str())
        .bind(order.order_date)
        .bind(order.fulfillment_date)
        .bind(order.shipping_date)
        .bind(order.delivery_date)
        .bind(order.subtotal)
        .bind(order.tax_amount)
        .bind(order.shipping_cost)
        .bind(order.total_amount)
        .bind(&order.notes)
        .bind(order.audit.created_at)
        .bind(order.audit.updated_at)
        .bind(order.audit.version)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_write_error(e, "SalesOrder", order.id))?;

        self.save_sales_order_items(order).await
    }

    async fn update_sales_order(&mut self, order: &mut SalesOrder) -> AppResult<()> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            UPDATE sales_orders
            SET customer_id = $3, customer_name = $4, customer_email = $5, customer_phone = $6,
                shipping_address = $7, city = $8, postal_code = $9, warehouse_id = $10,
                status = $11, order_date = $12, fulfillment_date = $13, shipping_date = $14,
                delivery_date = $15, subtotal = $16, tax_amount = $17, shipping_cost = $18,
                total_amount = $19, notes = $20, updated_at = $21, version = version + 1
            WHERE id = $1 AND version = $2
            "#,
        )
        .bind(order.id)
        .bind(order.audit.version)
        .bind(order.customer_id)
        .bind(&order.customer.customer_name)
        .bind(&order.customer.customer_email)
        .bind(&order.customer.customer_phone)
        .bind(&order.customer.shipping_address)
        .bind(&order.customer.city)
        .bind(&order.customer.postal_code)
        .bind(order.warehouse_id)
        .bind(order.status.as_str())
        .bind(order.order_date)
        .bind(order.fulfillment_date)
        .bind(order.shipping_date)
        .bind(order.delivery_date)
        .bind(order.subtotal)
        .bind(order.tax_amount)
        .bind(order.shipping_cost)
        .bind(order.total_amount)
        .bind(&order.notes)
        .bind(now)
        .execute(&mut *self.tx)
        .await?;
        ensure_updated(result, "SalesOrder", order.id)?;

        self.save_sales_order_items(order).await?;
        order.audit.touch(now);
        Ok(())
    }

    async fn shipment(&mut self, id: Uuid) -> AppResult<Option<Shipment>> {
        let row = sqlx::query_as::<_, ShipmentRow>(&format!(
            "SELECT {} FROM shipments WHERE id = $1 FOR UPDATE",
            SHIPMENT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn shipments_for_sales_order(&mut self, sales_order_id: Uuid) -> AppResult<Vec<Shipment>> {
        let rows = sqlx::query_as::<_, ShipmentRow>(&format!(
            "SELECT {} FROM shipments WHERE sales_order_id = $1 ORDER BY created_at",
            SHIPMENT_COLUMNS
        ))
        .bind(sales_order_id)
        .fetch_all(&mut *self.tx)
        .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn insert_shipment(&mut self, shipment: &Shipment) -> AppResult<()> {
        sqlx::query(&format!(
            "INSERT INTO shipments ({}) VALUES \
             ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)",
            SHIPMENT_COLUMNS
        ))
        .bind(shipment.id)
        .bind(&shipment.shipment_number)
        .bind(shipment.sales_order_id)
        .bind(&shipment.carrier)
        .bind(&shipment.tracking_number)
        .bind(shipment.shipping_method.as_str())
        .bind(shipment.estimated_delivery_date)
        .bind(shipment.actual_delivery_date)
        .bind(shipment.shipping_cost)
        .bind(shipment.weight)
        .bind(&shipment.dimensions)
        .bind(shipment.status.as_str())
        .bind(shipment.shipped_from_warehouse_id)
        .bind(shipment.shipped_by)
        .bind(&shipment.notes)
        .bind(shipment.audit.created_at)
        .bind(shipment.audit.updated_at)
        .bind(shipment.audit.version)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_write_error(e, "Shipment", shipment.id))?;
        Ok(())
    }

    async fn update_shipment(&mut self, shipment: &mut Shipment) -> AppResult<()> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            UPDATE shipments
            SET status = $3, actual_delivery_date = $4, tracking_number = $5, notes = $6,
                updated_at = $7, version = version + 1
            WHERE id = $1 AND version = $2
            "#,
        )
        .bind(shipment.id)
        .bind(shipment.audit.version)
        .bind(shipment.status.as_str())
        .bind(shipment.actual_delivery_date)
        .bind(&shipment.tracking_number)
        .bind(&shipment.notes)
        .bind(now)
        .execute(&mut *self.tx)
        .await?;
        ensure_updated(result, "Shipment", shipment.id)?;
        shipment.audit.touch(now);
        Ok(())
    }

    async fn invoice(&mut self, id: Uuid) -> AppResult<Option<Invoice>> {
        let row = sqlx::query_as::<_, InvoiceRow>(&format!(
            "SELECT {} FROM invoices WHERE id = $1 FOR UPDATE",
            INVOICE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn invoice_for_sales_order(&mut self, sales_order_id: Uuid) -> AppResult<Option<Invoice>> {
        let row = sqlx::query_as::<_, InvoiceRow>(&format!(
            "SELECT {} FROM invoices WHERE sales_order_id = $1",
            INVOICE_COLUMNS
        ))
        .bind(sales_order_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn insert_invoice(&mut self, invoice: &Invoice) -> AppResult<()> {
        sqlx::query(&format!(
            "INSERT INTO invoices ({}) VALUES \
             ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, \
              $19, $20)",
            INVOICE_COLUMNS
        ))
        .bind(invoice.id)
        .bind(&invoice.invoice_number)
        .bind(invoice.sales_order_id)
        .bind(invoice.customer_id)
        .bind(invoice.invoice_date)
        .bind(invoice.due_date)
        .bind(invoice.subtotal)
        .bind(invoice.tax_amount)
        .bind(invoice.discount_amount)
        .bind(invoice.total_amount)
        .bind(invoice.paid_amount)
        .bind(invoice.balance_due)
        .bind(invoice.status.as_str())
        .bind(&invoice.payment_terms)
        .bind(&invoice.notes)
        .bind(&invoice.file_url)
        .bind(invoice.generated_by)
        .bind(invoice.audit.created_at)
        .bind(invoice.audit.updated_at)
        .bind(invoice.audit.version)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| {
            if is_constraint(&e, "invoices_sales_order_id_key") {
                AppError::DuplicateInvoice {
                    sales_order_id: invoice.sales_order_id,
                }
            } else {
                map_write_error(e, "Invoice", invoice.id)
            }
        })?;
        Ok(())
    }

    async fn update_invoice(&mut self, invoice: &mut Invoice) -> AppResult<()> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            UPDATE invoices
            SET paid_amount = $3, balance_due = $4, status = $5, notes = $6, file_url = $7,
                updated_at = $8, version = version + 1
            WHERE id = $1 AND version = $2
            "#,
        )
        .bind(invoice.id)
        .bind(invoice.audit.version)
        .bind(invoice.paid_amount)
        .bind(invoice.balance_due)
        .bind(invoice.status.as_str())
        .bind(&invoice.notes)
        .bind(&invoice.file_url)
        .bind(now)
        .execute(&mut *self.tx)
        .await?;
        ensure_updated(result, "Invoice", invoice.id)?;
        invoice.audit.touch(now);
        Ok(())
    }

    async fn payment(&mut self, id: Uuid) -> AppResult<Option<Payment>> {
        let row = sqlx::query_as::<_, PaymentRow>(&format!(
            "SELECT {} FROM payments WHERE id = $1 FOR UPDATE",
            PAYMENT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn insert_payment(&mut self, payment: &Payment) -> AppResult<()> {
        sqlx::query(&format!(
            "INSERT INTO payments ({}) VALUES \
             ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)",
            PAYMENT_COLUMNS
        ))
        .bind(payment.id)
        .bind(&payment.payment_number)
        .bind(payment.sales_order_id)
        .bind(payment.invoice_id)
        .bind(payment.customer_id)
        .bind(payment.payment_date)
        .bind(payment.payment_method.as_str())
        .bind(payment.amount)
        .bind(&payment.currency)
        .bind(&payment.reference_number)
        .bind(payment.status.as_str())
        .bind(payment.processed_by)
        .bind(&payment.notes)
        .bind(payment.audit.created_at)
        .bind(payment.audit.updated_at)
        .bind(payment.audit.version)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_write_error(e, "Payment", payment.id))?;
        Ok(())
    }

    async fn update_payment(&mut self, payment: &mut Payment) -> AppResult<()> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            UPDATE payments
            SET status = $3, notes = $4, updated_at = $5, version = version + 1
            WHERE id = $1 AND version = $2
            "#,
        )
        .bind(payment.id)
        .bind(payment.audit.version)
        .bind(payment.status.as_str())
        .bind(&payment.notes)
        .bind(now)
        .execute(&mut *self.tx)
        .await?;
        ensure_updated(result, "Payment", payment.id)?;
        payment.audit.touch(now);
        Ok(())
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        self.tx
            .commit()
            .await
            .map_err(|e| map_write_error(e, "Transaction", Uuid::nil()))
    }
}
