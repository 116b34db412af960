//! Sales order workflow tests
//!
//! Tests for the sales order lifecycle including:
//! - Availability check on confirmation
//! - All-or-nothing fulfillment across lines
//! - Stock restoration when a fulfilled order is cancelled

mod common;

use common::{dec, Fixture};
use rust_decimal::Decimal;
use shared::{MovementFilter, MovementType, SalesOrderStatus};
use warehouse_backend::error::AppError;
use warehouse_backend::services::inventory::TransferInput;
use warehouse_backend::services::sales_order::{
    CancelSalesOrderInput, CreateSalesOrderInput, CustomerDetailsInput, SalesOrderItemInput,
    UpdateSalesOrderInput,
};

fn cancel(reason: &str) -> CancelSalesOrderInput {
    CancelSalesOrderInput {
        reason: reason.to_string(),
    }
}

// ============================================================================
// Creation and editing
// ============================================================================

#[tokio::test]
async fn test_create_snapshots_customer_and_prices() {
    let fx = Fixture::new().await;
    let order = fx.sales_order(&[(fx.widget, 2), (fx.gadget, 3)]).await;

    assert_eq!(order.status, SalesOrderStatus::Pending);
    assert!(order.so_number.starts_with("SO-"));
    assert_eq!(order.customer.customer_name.as_deref(), Some("Jordan Doe"));
    assert_eq!(order.customer.city.as_deref(), Some("Springfield"));
    assert_eq!(order.items[0].unit_price, dec("100.00"));
    assert_eq!(order.subtotal, dec("276.50"));
    assert_eq!(order.total_amount, dec("276.50"));
}

#[tokio::test]
async fn test_update_recomputes_totals_while_pending() {
    let fx = Fixture::new().await;
    let order = fx.sales_order(&[(fx.widget, 1)]).await;

    let updated = fx
        .sales_orders()
        .update(
            order.id,
            UpdateSalesOrderInput {
                customer: CustomerDetailsInput {
                    city: Some("Shelbyville".to_string()),
                    ..Default::default()
                },
                tax_amount: Some(dec("8.25")),
                shipping_cost: Some(dec("5.00")),
                items: Some(vec![SalesOrderItemInput {
                    product_id: fx.gadget,
                    quantity: 2,
                    unit_price: None,
                }]),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.customer.city.as_deref(), Some("Shelbyville"));
    assert_eq!(updated.customer.customer_name.as_deref(), Some("Jordan Doe"));
    assert_eq!(updated.subtotal, dec("51.00"));
    assert_eq!(updated.total_amount, dec("64.25"));
}

#[tokio::test]
async fn test_line_total_out_of_range_is_rejected() {
    let fx = Fixture::new().await;
    let result = fx
        .sales_orders()
        .create(
            fx.user_id,
            CreateSalesOrderInput {
                customer_id: fx.customer_id,
                warehouse_id: fx.main_warehouse,
                order_date: None,
                customer: Default::default(),
                tax_amount: None,
                shipping_cost: None,
                notes: None,
                items: vec![SalesOrderItemInput {
                    product_id: fx.widget,
                    quantity: 2,
                    unit_price: Some(Decimal::MAX),
                }],
            },
        )
        .await;

    assert!(matches!(result, Err(AppError::Validation { .. })));
}

#[tokio::test]
async fn test_confirmed_order_is_not_editable() {
    let fx = Fixture::new().await;
    fx.stock(fx.widget, fx.main_warehouse, 5).await;
    let order = fx.sales_order(&[(fx.widget, 1)]).await;
    fx.sales_orders().confirm(order.id).await.unwrap();

    assert!(matches!(
        fx.sales_orders()
            .update(order.id, UpdateSalesOrderInput::default())
            .await,
        Err(AppError::OrderNotEditable { .. })
    ));
}

// ============================================================================
// Confirmation and fulfillment
// ============================================================================

#[tokio::test]
async fn test_confirm_requires_stock_on_hand() {
    let fx = Fixture::new().await;
    fx.stock(fx.widget, fx.main_warehouse, 1).await;
    let order = fx.sales_order(&[(fx.widget, 2)]).await;

    match fx.sales_orders().confirm(order.id).await.unwrap_err() {
        AppError::InsufficientStock {
            available,
            requested,
            ..
        } => {
            assert_eq!(available, 1);
            assert_eq!(requested, 2);
        }
        other => panic!("unexpected error: {:?}", other),
    }
    let unchanged = fx.sales_orders().get(order.id).await.unwrap();
    assert_eq!(unchanged.status, SalesOrderStatus::Pending);
}

#[tokio::test]
async fn test_confirm_rejects_quantity_total_out_of_range() {
    let fx = Fixture::new().await;
    fx.stock(fx.widget, fx.main_warehouse, 5).await;
    let order = fx.sales_order(&[(fx.widget, i32::MAX), (fx.widget, 1)]).await;

    assert!(matches!(
        fx.sales_orders().confirm(order.id).await,
        Err(AppError::Validation { .. })
    ));
    let unchanged = fx.sales_orders().get(order.id).await.unwrap();
    assert_eq!(unchanged.status, SalesOrderStatus::Pending);
    assert_eq!(fx.quantity(fx.widget, fx.main_warehouse).await, 5);
}

#[tokio::test]
async fn test_fulfill_deducts_every_line() {
    let fx = Fixture::new().await;
    fx.stock(fx.widget, fx.main_warehouse, 5).await;
    fx.stock(fx.gadget, fx.main_warehouse, 5).await;

    let order = fx.fulfilled_sales_order(&[(fx.widget, 2), (fx.gadget, 3)]).await;

    assert_eq!(order.status, SalesOrderStatus::Fulfilled);
    assert!(order.fulfillment_date.is_some());
    assert_eq!(fx.quantity(fx.widget, fx.main_warehouse).await, 3);
    assert_eq!(fx.quantity(fx.gadget, fx.main_warehouse).await, 2);

    let movements = fx
        .inventory()
        .movements(&MovementFilter {
            reference_number: Some(order.so_number.clone()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(movements.len(), 2);
    for movement in &movements {
        assert_eq!(movement.movement_type, MovementType::Shipment);
        assert_eq!(movement.from_warehouse_id, Some(fx.main_warehouse));
        assert_eq!(movement.reason, "Sales order fulfillment");
    }
}

#[tokio::test]
async fn test_short_line_fails_whole_fulfillment() {
    let fx = Fixture::new().await;
    fx.stock(fx.widget, fx.main_warehouse, 5).await;
    fx.stock(fx.gadget, fx.main_warehouse, 3).await;

    let order = fx.sales_order(&[(fx.widget, 2), (fx.gadget, 3)]).await;
    fx.sales_orders().confirm(order.id).await.unwrap();

    // stock leaves between confirmation and fulfillment
    fx.inventory()
        .transfer(
            fx.user_id,
            TransferInput {
                product_id: fx.gadget,
                from_warehouse_id: fx.main_warehouse,
                to_warehouse_id: fx.overflow_warehouse,
                quantity: 2,
                reason: None,
                reference_number: None,
            },
        )
        .await
        .unwrap();

    assert!(matches!(
        fx.sales_orders().fulfill(order.id, fx.user_id).await,
        Err(AppError::InsufficientStock { .. })
    ));

    assert_eq!(fx.quantity(fx.widget, fx.main_warehouse).await, 5);
    assert_eq!(fx.quantity(fx.gadget, fx.main_warehouse).await, 1);
    let after = fx.sales_orders().get(order.id).await.unwrap();
    assert_eq!(after.status, SalesOrderStatus::Confirmed);
    let movements = fx
        .inventory()
        .movements(&MovementFilter {
            reference_number: Some(order.so_number.clone()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(movements.is_empty());
}

#[tokio::test]
async fn test_fulfill_requires_confirmation() {
    let fx = Fixture::new().await;
    fx.stock(fx.widget, fx.main_warehouse, 5).await;
    let order = fx.sales_order(&[(fx.widget, 1)]).await;

    assert!(matches!(
        fx.sales_orders().fulfill(order.id, fx.user_id).await,
        Err(AppError::InvalidOrderStatusTransition { .. })
    ));
    assert_eq!(fx.quantity(fx.widget, fx.main_warehouse).await, 5);
}

// ============================================================================
// Cancellation
// ============================================================================

#[tokio::test]
async fn test_cancel_fulfilled_order_restores_stock() {
    let fx = Fixture::new().await;
    fx.stock(fx.widget, fx.main_warehouse, 5).await;
    let order = fx.fulfilled_sales_order(&[(fx.widget, 4)]).await;
    assert_eq!(fx.quantity(fx.widget, fx.main_warehouse).await, 1);

    let cancelled = fx
        .sales_orders()
        .cancel(order.id, fx.user_id, cancel("Customer changed mind"))
        .await
        .unwrap();

    assert_eq!(cancelled.status, SalesOrderStatus::Cancelled);
    assert!(cancelled
        .notes
        .unwrap()
        .contains("[CANCELLED] Customer changed mind"));
    assert_eq!(fx.quantity(fx.widget, fx.main_warehouse).await, 5);

    let restored = fx
        .inventory()
        .movements(&MovementFilter {
            reference_number: Some(order.so_number.clone()),
            movement_type: Some(MovementType::Adjustment),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(restored.len(), 1);
    assert_eq!(restored[0].to_warehouse_id, Some(fx.main_warehouse));
    assert_eq!(restored[0].quantity, 4);
    assert_eq!(restored[0].reason, "Cancellation of fulfilled sales order");
}

#[tokio::test]
async fn test_cancel_pending_order_touches_no_stock() {
    let fx = Fixture::new().await;
    fx.stock(fx.widget, fx.main_warehouse, 5).await;
    let order = fx.sales_order(&[(fx.widget, 4)]).await;

    fx.sales_orders()
        .cancel(order.id, fx.user_id, cancel("Duplicate"))
        .await
        .unwrap();

    assert_eq!(fx.quantity(fx.widget, fx.main_warehouse).await, 5);
    let movements = fx
        .inventory()
        .movements(&MovementFilter {
            reference_number: Some(order.so_number.clone()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(movements.is_empty());
}

#[tokio::test]
async fn test_shipped_order_cannot_be_cancelled() {
    let fx = Fixture::new().await;
    fx.stock(fx.widget, fx.main_warehouse, 5).await;
    let order = fx.fulfilled_sales_order(&[(fx.widget, 1)]).await;
    fx.sales_orders().ship(order.id).await.unwrap();

    assert!(matches!(
        fx.sales_orders()
            .cancel(order.id, fx.user_id, cancel("Too late"))
            .await,
        Err(AppError::InvalidOrderStatusTransition { .. })
    ));
    assert_eq!(fx.quantity(fx.widget, fx.main_warehouse).await, 4);
}

#[tokio::test]
async fn test_ship_and_deliver_follow_state_machine() {
    let fx = Fixture::new().await;
    fx.stock(fx.widget, fx.main_warehouse, 5).await;
    let order = fx.fulfilled_sales_order(&[(fx.widget, 1)]).await;

    assert!(matches!(
        fx.sales_orders().deliver(order.id).await,
        Err(AppError::InvalidOrderStatusTransition { .. })
    ));

    let shipped = fx.sales_orders().ship(order.id).await.unwrap();
    assert_eq!(shipped.status, SalesOrderStatus::Shipped);
    assert!(shipped.shipping_date.is_some());

    let delivered = fx.sales_orders().deliver(order.id).await.unwrap();
    assert_eq!(delivered.status, SalesOrderStatus::Delivered);
    assert!(delivered.delivery_date.is_some());
}
