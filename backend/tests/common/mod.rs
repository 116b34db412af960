//! Shared fixtures for the workflow tests
//!
//! Every fixture runs against a fresh [`MemoryStore`] seeded with one user,
//! two warehouses, a supplier, a customer and two products.

#![allow(dead_code)]

use std::str::FromStr;
use std::sync::Arc;

use rust_decimal::Decimal;
use shared::{
    AdjustmentReason, AdjustmentType, CustomerRef, ProductRef, SalesOrder, SupplierRef, UserRef,
    WarehouseRef,
};
use uuid::Uuid;
use warehouse_backend::config::{Config, WorkflowConfig};
use warehouse_backend::services::adjustment::CreateAdjustmentInput;
use warehouse_backend::services::inventory::InventoryService;
use warehouse_backend::services::sales_order::{CreateSalesOrderInput, SalesOrderItemInput};
use warehouse_backend::services::{AdjustmentService, SalesOrderService};
use warehouse_backend::store::{MemoryStore, Storage};

pub const JWT_SECRET: &str = "test-secret";

pub fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

#[derive(Clone)]
pub struct Fixture {
    pub memory: MemoryStore,
    pub store: Storage,
    pub config: Config,
    pub user_id: Uuid,
    pub main_warehouse: Uuid,
    pub overflow_warehouse: Uuid,
    pub supplier_id: Uuid,
    pub customer_id: Uuid,
    /// Unit price 100.00, cost 60.00
    pub widget: Uuid,
    /// Unit price 25.50, cost 12.00
    pub gadget: Uuid,
}

impl Fixture {
    pub async fn new() -> Self {
        let memory = MemoryStore::new();

        let user_id = Uuid::new_v4();
        memory
            .seed_user(UserRef {
                id: user_id,
                username: "clerk".to_string(),
                active: true,
            })
            .await;

        let main_warehouse = Uuid::new_v4();
        let overflow_warehouse = Uuid::new_v4();
        for (id, code) in [(main_warehouse, "MAIN"), (overflow_warehouse, "OVF")] {
            memory
                .seed_warehouse(WarehouseRef {
                    id,
                    code: code.to_string(),
                    name: format!("{} warehouse", code),
                    active: true,
                })
                .await;
        }

        let supplier_id = Uuid::new_v4();
        memory
            .seed_supplier(SupplierRef {
                id: supplier_id,
                name: "Acme Supply".to_string(),
                active: true,
            })
            .await;

        let customer_id = Uuid::new_v4();
        memory
            .seed_customer(CustomerRef {
                id: customer_id,
                name: "Jordan Doe".to_string(),
                email: Some("jordan@example.com".to_string()),
                phone: None,
                address: Some("1 Dock Road".to_string()),
                city: Some("Springfield".to_string()),
                postal_code: Some("12345".to_string()),
                active: true,
            })
            .await;

        let widget = Uuid::new_v4();
        let gadget = Uuid::new_v4();
        for (id, sku, price, cost) in [
            (widget, "WID-1", "100.00", "60.00"),
            (gadget, "GAD-1", "25.50", "12.00"),
        ] {
            memory
                .seed_product(ProductRef {
                    id,
                    sku: sku.to_string(),
                    name: sku.to_lowercase(),
                    unit_price: dec(price),
                    cost_price: dec(cost),
                    active: true,
                })
                .await;
        }

        let mut config = Config::in_memory(JWT_SECRET);
        config.workflow = WorkflowConfig {
            retry_backoff_ms: 1,
            ..WorkflowConfig::default()
        };

        Self {
            store: Arc::new(memory.clone()),
            memory,
            config,
            user_id,
            main_warehouse,
            overflow_warehouse,
            supplier_id,
            customer_id,
            widget,
            gadget,
        }
    }

    pub fn inventory(&self) -> InventoryService {
        InventoryService::new(self.store.clone(), &self.config.workflow)
    }

    pub fn adjustments(&self) -> AdjustmentService {
        AdjustmentService::new(self.store.clone(), &self.config.workflow)
    }

    pub fn sales_orders(&self) -> SalesOrderService {
        SalesOrderService::new(self.store.clone(), &self.config.workflow)
    }

    /// Put stock on hand through an approved adjustment
    pub async fn stock(&self, product_id: Uuid, warehouse_id: Uuid, quantity: i32) {
        let adjustments = self.adjustments();
        let adjustment = adjustments
            .create(
                self.user_id,
                CreateAdjustmentInput {
                    product_id,
                    warehouse_id,
                    adjustment_type: AdjustmentType::Add,
                    quantity,
                    reason: AdjustmentReason::CountError,
                    notes: None,
                },
            )
            .await
            .unwrap();
        adjustments.approve(adjustment.id, self.user_id).await.unwrap();
    }

    pub async fn quantity(&self, product_id: Uuid, warehouse_id: Uuid) -> i32 {
        self.inventory()
            .quantity(product_id, warehouse_id)
            .await
            .unwrap()
            .quantity
    }

    /// Pending sales order from the main warehouse at catalog prices
    pub async fn sales_order(&self, lines: &[(Uuid, i32)]) -> SalesOrder {
        self.sales_orders()
            .create(
                self.user_id,
                CreateSalesOrderInput {
                    customer_id: self.customer_id,
                    warehouse_id: self.main_warehouse,
                    order_date: None,
                    customer: Default::default(),
                    tax_amount: None,
                    shipping_cost: None,
                    notes: None,
                    items: lines
                        .iter()
                        .map(|&(product_id, quantity)| SalesOrderItemInput {
                            product_id,
                            quantity,
                            unit_price: None,
                        })
                        .collect(),
                },
            )
            .await
            .unwrap()
    }

    /// Sales order taken all the way to FULFILLED
    pub async fn fulfilled_sales_order(&self, lines: &[(Uuid, i32)]) -> SalesOrder {
        let order = self.sales_order(lines).await;
        let service = self.sales_orders();
        service.confirm(order.id).await.unwrap();
        service.fulfill(order.id, self.user_id).await.unwrap()
    }
}
