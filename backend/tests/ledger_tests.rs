//! Stock ledger tests
//!
//! Tests for quantity tracking including:
//! - Quantities never go negative
//! - Every quantity change leaves a movement record
//! - Transfers between warehouses

mod common;

use common::Fixture;
use proptest::prelude::*;
use shared::{MovementFilter, MovementType};
use warehouse_backend::error::AppError;
use warehouse_backend::services::inventory::TransferInput;

fn transfer(fx: &Fixture, quantity: i32) -> TransferInput {
    TransferInput {
        product_id: fx.widget,
        from_warehouse_id: fx.main_warehouse,
        to_warehouse_id: fx.overflow_warehouse,
        quantity,
        reason: None,
        reference_number: None,
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[tokio::test]
async fn test_unknown_pair_reads_as_zero() {
    let fx = Fixture::new().await;
    assert_eq!(fx.quantity(fx.widget, fx.main_warehouse).await, 0);
    assert!(fx.inventory().stock_levels(fx.widget).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_transfer_moves_stock_and_records_one_movement() {
    let fx = Fixture::new().await;
    fx.stock(fx.widget, fx.main_warehouse, 10).await;

    let result = fx
        .inventory()
        .transfer(fx.user_id, transfer(&fx, 4))
        .await
        .unwrap();

    assert_eq!(result.from_quantity, 6);
    assert_eq!(result.to_quantity, 4);
    assert_eq!(result.movement.movement_type, MovementType::Transfer);
    assert_eq!(result.movement.reason, "Stock transfer");
    assert_eq!(result.movement.from_warehouse_id, Some(fx.main_warehouse));
    assert_eq!(result.movement.to_warehouse_id, Some(fx.overflow_warehouse));

    assert_eq!(fx.quantity(fx.widget, fx.main_warehouse).await, 6);
    assert_eq!(fx.quantity(fx.widget, fx.overflow_warehouse).await, 4);

    let transfers = fx
        .inventory()
        .movements(&MovementFilter {
            movement_type: Some(MovementType::Transfer),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(transfers.len(), 1);
}

#[tokio::test]
async fn test_transfer_beyond_stock_changes_nothing() {
    let fx = Fixture::new().await;
    fx.stock(fx.widget, fx.main_warehouse, 3).await;

    let err = fx
        .inventory()
        .transfer(fx.user_id, transfer(&fx, 5))
        .await
        .unwrap_err();

    match err {
        AppError::InsufficientStock {
            available,
            requested,
            ..
        } => {
            assert_eq!(available, 3);
            assert_eq!(requested, 5);
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(fx.quantity(fx.widget, fx.main_warehouse).await, 3);
    assert_eq!(fx.quantity(fx.widget, fx.overflow_warehouse).await, 0);

    let transfers = fx
        .inventory()
        .movements(&MovementFilter {
            movement_type: Some(MovementType::Transfer),
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(transfers.is_empty());
}

#[tokio::test]
async fn test_transfer_rejects_bad_input() {
    let fx = Fixture::new().await;
    fx.stock(fx.widget, fx.main_warehouse, 3).await;

    let mut same = transfer(&fx, 1);
    same.to_warehouse_id = fx.main_warehouse;
    assert!(matches!(
        fx.inventory().transfer(fx.user_id, same).await,
        Err(AppError::Validation { .. })
    ));

    assert!(matches!(
        fx.inventory().transfer(fx.user_id, transfer(&fx, 0)).await,
        Err(AppError::Validation { .. })
    ));

    let mut unknown = transfer(&fx, 1);
    unknown.to_warehouse_id = uuid::Uuid::new_v4();
    assert!(matches!(
        fx.inventory().transfer(fx.user_id, unknown).await,
        Err(AppError::NotFound { .. })
    ));
    assert_eq!(fx.quantity(fx.widget, fx.main_warehouse).await, 3);
}

#[tokio::test]
async fn test_movement_filter_by_warehouse_matches_either_side() {
    let fx = Fixture::new().await;
    fx.stock(fx.widget, fx.main_warehouse, 10).await;
    fx.stock(fx.gadget, fx.main_warehouse, 10).await;
    fx.inventory()
        .transfer(fx.user_id, transfer(&fx, 2))
        .await
        .unwrap();

    let overflow = fx
        .inventory()
        .movements(&MovementFilter {
            warehouse_id: Some(fx.overflow_warehouse),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(overflow.len(), 1);

    let main = fx
        .inventory()
        .movements(&MovementFilter {
            warehouse_id: Some(fx.main_warehouse),
            ..Default::default()
        })
        .await
        .unwrap();
    // two stock-up adjustments plus the transfer
    assert_eq!(main.len(), 3);

    let gadget = fx
        .inventory()
        .movements(&MovementFilter {
            product_id: Some(fx.gadget),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(gadget.len(), 1);
}

#[tokio::test]
async fn test_concurrent_transfers_never_oversell() {
    let fx = Fixture::new().await;
    fx.stock(fx.widget, fx.main_warehouse, 5).await;

    let mut handles = Vec::new();
    for _ in 0..10 {
        let service = fx.inventory();
        let input = transfer(&fx, 1);
        let user_id = fx.user_id;
        handles.push(tokio::spawn(async move {
            service.transfer(user_id, input).await
        }));
    }

    let mut succeeded = 0;
    let mut short = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => succeeded += 1,
            Err(AppError::InsufficientStock { .. }) => short += 1,
            Err(other) => panic!("unexpected error: {:?}", other),
        }
    }

    assert_eq!(succeeded, 5);
    assert_eq!(short, 5);
    assert_eq!(fx.quantity(fx.widget, fx.main_warehouse).await, 0);
    assert_eq!(fx.quantity(fx.widget, fx.overflow_warehouse).await, 5);
}

// ============================================================================
// Property Tests
// ============================================================================

#[derive(Debug, Clone)]
enum Op {
    Stock(i32),
    Transfer(i32),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (1i32..20).prop_map(Op::Stock),
        (1i32..30).prop_map(Op::Transfer),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Ledger quantities match a simple model and never go negative
    #[test]
    fn prop_quantities_follow_model(ops in prop::collection::vec(op_strategy(), 1..12)) {
        tokio_test::block_on(async {
            let fx = Fixture::new().await;
            let mut main = 0;
            let mut overflow = 0;

            for op in &ops {
                match *op {
                    Op::Stock(qty) => {
                        fx.stock(fx.widget, fx.main_warehouse, qty).await;
                        main += qty;
                    }
                    Op::Transfer(qty) => {
                        let result = fx.inventory().transfer(fx.user_id, transfer(&fx, qty)).await;
                        if qty <= main {
                            assert!(result.is_ok());
                            main -= qty;
                            overflow += qty;
                        } else {
                            assert!(matches!(result, Err(AppError::InsufficientStock { .. })));
                        }
                    }
                }
                let on_hand = fx.quantity(fx.widget, fx.main_warehouse).await;
                assert!(on_hand >= 0);
                assert_eq!(on_hand, main);
                assert_eq!(fx.quantity(fx.widget, fx.overflow_warehouse).await, overflow);
            }

            let movements = fx
                .inventory()
                .movements(&MovementFilter {
                    product_id: Some(fx.widget),
                    ..Default::default()
                })
                .await
                .unwrap();
            let successful_transfers = movements
                .iter()
                .filter(|m| m.movement_type == MovementType::Transfer)
                .map(|m| m.quantity)
                .sum::<i32>();
            assert_eq!(successful_transfers, overflow);
        });
    }
}
