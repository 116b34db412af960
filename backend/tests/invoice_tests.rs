//! Invoice and invoice payment tests
//!
//! Tests for billing including:
//! - One invoice per sales order
//! - Balance and status tracking across partial payments
//! - Payments recorded alongside invoice updates

mod common;

use chrono::NaiveDate;
use common::{dec, Fixture};
use proptest::prelude::*;
use rust_decimal::Decimal;
use shared::{InvoiceStatus, PaymentMethod, PaymentStatus, SalesOrder};
use warehouse_backend::error::AppError;
use warehouse_backend::services::invoice::{
    GenerateInvoiceInput, RecordInvoicePaymentInput, UpdateInvoiceStatusInput,
};
use warehouse_backend::services::sales_order::{CancelSalesOrderInput, UpdateSalesOrderInput};
use warehouse_backend::services::{InvoiceService, PaymentService};

fn service(fx: &Fixture) -> InvoiceService {
    InvoiceService::new(fx.store.clone(), &fx.config.workflow)
}

fn generate(order: &SalesOrder) -> GenerateInvoiceInput {
    GenerateInvoiceInput {
        sales_order_id: order.id,
        invoice_date: NaiveDate::from_ymd_opt(2024, 3, 1),
        due_date: None,
        payment_terms: Some("Net 30".to_string()),
        notes: None,
    }
}

fn pay(amount: &str) -> RecordInvoicePaymentInput {
    RecordInvoicePaymentInput {
        amount: dec(amount),
        payment_method: PaymentMethod::BankTransfer,
        payment_date: None,
        reference_number: None,
        notes: None,
    }
}

/// Sales order totalling 1353.99
async fn order_for_1353_99(fx: &Fixture) -> SalesOrder {
    let order = fx.sales_order(&[(fx.widget, 13)]).await;
    fx.sales_orders()
        .update(
            order.id,
            UpdateSalesOrderInput {
                tax_amount: Some(dec("53.99")),
                ..Default::default()
            },
        )
        .await
        .unwrap()
}

// ============================================================================
// Generation
// ============================================================================

#[tokio::test]
async fn test_generate_copies_order_amounts() {
    let fx = Fixture::new().await;
    let order = order_for_1353_99(&fx).await;

    let invoice = service(&fx).generate(fx.user_id, generate(&order)).await.unwrap();

    assert!(invoice.invoice_number.starts_with("INV-20240301-"));
    assert_eq!(invoice.status, InvoiceStatus::Draft);
    assert_eq!(invoice.customer_id, fx.customer_id);
    assert_eq!(invoice.subtotal, dec("1300.00"));
    assert_eq!(invoice.tax_amount, dec("53.99"));
    assert_eq!(invoice.total_amount, dec("1353.99"));
    assert_eq!(invoice.balance_due, dec("1353.99"));
    assert_eq!(invoice.due_date, NaiveDate::from_ymd_opt(2024, 3, 31).unwrap());
}

#[tokio::test]
async fn test_second_invoice_for_order_is_rejected() {
    let fx = Fixture::new().await;
    let order = order_for_1353_99(&fx).await;
    let first = service(&fx).generate(fx.user_id, generate(&order)).await.unwrap();

    assert!(matches!(
        service(&fx).generate(fx.user_id, generate(&order)).await,
        Err(AppError::DuplicateInvoice { sales_order_id }) if sales_order_id == order.id
    ));
    assert_eq!(
        service(&fx).for_sales_order(order.id).await.unwrap().id,
        first.id
    );
}

#[tokio::test]
async fn test_cancelled_invoice_still_blocks_a_second_one() {
    let fx = Fixture::new().await;
    let order = order_for_1353_99(&fx).await;
    let first = service(&fx).generate(fx.user_id, generate(&order)).await.unwrap();
    service(&fx)
        .update_status(
            first.id,
            UpdateInvoiceStatusInput {
                status: InvoiceStatus::Cancelled,
                paid_amount: None,
                notes: None,
            },
        )
        .await
        .unwrap();

    assert!(matches!(
        service(&fx).generate(fx.user_id, generate(&order)).await,
        Err(AppError::DuplicateInvoice { sales_order_id }) if sales_order_id == order.id
    ));
}

#[tokio::test]
async fn test_paid_invoice_still_blocks_a_second_one() {
    let fx = Fixture::new().await;
    let order = order_for_1353_99(&fx).await;
    let first = service(&fx).generate(fx.user_id, generate(&order)).await.unwrap();
    let settled = service(&fx)
        .record_payment(first.id, fx.user_id, pay("1353.99"))
        .await
        .unwrap();
    assert_eq!(settled.invoice.status, InvoiceStatus::Paid);

    assert!(matches!(
        service(&fx).generate(fx.user_id, generate(&order)).await,
        Err(AppError::DuplicateInvoice { sales_order_id }) if sales_order_id == order.id
    ));
}

#[tokio::test]
async fn test_cancelled_order_cannot_be_invoiced() {
    let fx = Fixture::new().await;
    let order = fx.sales_order(&[(fx.widget, 1)]).await;
    fx.sales_orders()
        .cancel(
            order.id,
            fx.user_id,
            CancelSalesOrderInput {
                reason: "Duplicate".to_string(),
            },
        )
        .await
        .unwrap();

    assert!(matches!(
        service(&fx).generate(fx.user_id, generate(&order)).await,
        Err(AppError::IllegalState(_))
    ));
}

#[tokio::test]
async fn test_due_date_before_invoice_date_is_rejected() {
    let fx = Fixture::new().await;
    let order = fx.sales_order(&[(fx.widget, 1)]).await;
    let mut input = generate(&order);
    input.due_date = NaiveDate::from_ymd_opt(2024, 2, 1);

    assert!(matches!(
        service(&fx).generate(fx.user_id, input).await,
        Err(AppError::Validation { .. })
    ));
}

// ============================================================================
// Payments
// ============================================================================

#[tokio::test]
async fn test_partial_then_full_payment() {
    let fx = Fixture::new().await;
    let order = order_for_1353_99(&fx).await;
    let invoice = service(&fx).generate(fx.user_id, generate(&order)).await.unwrap();
    let sent = service(&fx).send(invoice.id).await.unwrap();
    assert_eq!(sent.status, InvoiceStatus::Sent);

    let first = service(&fx)
        .record_payment(invoice.id, fx.user_id, pay("500.00"))
        .await
        .unwrap();
    assert_eq!(first.invoice.paid_amount, dec("500.00"));
    assert_eq!(first.invoice.balance_due, dec("853.99"));
    assert_eq!(first.invoice.status, InvoiceStatus::Partial);
    assert_eq!(first.payment.status, PaymentStatus::Completed);
    assert_eq!(first.payment.invoice_id, Some(invoice.id));
    assert_eq!(first.payment.sales_order_id, Some(order.id));
    assert_eq!(
        first.payment.notes.as_deref(),
        Some(format!("Payment recorded for invoice: {}", invoice.invoice_number).as_str())
    );

    // sending again keeps PARTIAL
    let resent = service(&fx).send(invoice.id).await.unwrap();
    assert_eq!(resent.status, InvoiceStatus::Partial);

    let second = service(&fx)
        .record_payment(invoice.id, fx.user_id, pay("853.99"))
        .await
        .unwrap();
    assert_eq!(second.invoice.balance_due, dec("0.00"));
    assert_eq!(second.invoice.status, InvoiceStatus::Paid);
    assert_ne!(second.payment.payment_number, first.payment.payment_number);

    assert!(matches!(
        service(&fx)
            .record_payment(invoice.id, fx.user_id, pay("1.00"))
            .await,
        Err(AppError::IllegalState(_))
    ));
}

#[tokio::test]
async fn test_overpayment_changes_nothing() {
    let fx = Fixture::new().await;
    let order = order_for_1353_99(&fx).await;
    let invoice = service(&fx).generate(fx.user_id, generate(&order)).await.unwrap();

    let err = service(&fx)
        .record_payment(invoice.id, fx.user_id, pay("1354.00"))
        .await
        .unwrap_err();
    match err {
        AppError::OverPayment { balance_due, amount } => {
            assert_eq!(balance_due, dec("1353.99"));
            assert_eq!(amount, dec("1354.00"));
        }
        other => panic!("unexpected error: {:?}", other),
    }

    let unchanged = service(&fx).get(invoice.id).await.unwrap();
    assert_eq!(unchanged.paid_amount, dec("0"));
    assert_eq!(unchanged.status, InvoiceStatus::Draft);
}

#[tokio::test]
async fn test_sub_cent_payment_changes_nothing() {
    let fx = Fixture::new().await;
    let order = order_for_1353_99(&fx).await;
    let invoice = service(&fx).generate(fx.user_id, generate(&order)).await.unwrap();

    assert!(matches!(
        service(&fx)
            .record_payment(invoice.id, fx.user_id, pay("0.004"))
            .await,
        Err(AppError::Validation { field, .. }) if field == "amount"
    ));

    let unchanged = service(&fx).get(invoice.id).await.unwrap();
    assert_eq!(unchanged.paid_amount, dec("0"));
    assert_eq!(unchanged.balance_due, dec("1353.99"));
    assert_eq!(unchanged.status, InvoiceStatus::Draft);
}

#[tokio::test]
async fn test_invoice_payment_is_visible_as_payment() {
    let fx = Fixture::new().await;
    let order = order_for_1353_99(&fx).await;
    let invoice = service(&fx).generate(fx.user_id, generate(&order)).await.unwrap();
    let recorded = service(&fx)
        .record_payment(invoice.id, fx.user_id, pay("100.00"))
        .await
        .unwrap();

    let payment = PaymentService::new(fx.store.clone(), &fx.config.workflow)
        .get(recorded.payment.id)
        .await
        .unwrap();
    assert_eq!(payment.amount, dec("100.00"));
    assert_eq!(payment.currency, "USD");
}

#[tokio::test]
async fn test_status_update_with_paid_amount_settles() {
    let fx = Fixture::new().await;
    let order = order_for_1353_99(&fx).await;
    let invoice = service(&fx).generate(fx.user_id, generate(&order)).await.unwrap();

    let paid = service(&fx)
        .update_status(
            invoice.id,
            UpdateInvoiceStatusInput {
                status: InvoiceStatus::Sent,
                paid_amount: Some(dec("1353.99")),
                notes: Some("Settled by cheque".to_string()),
            },
        )
        .await
        .unwrap();
    assert_eq!(paid.status, InvoiceStatus::Paid);
    assert_eq!(paid.balance_due, dec("0"));

    let cancelled = service(&fx)
        .update_status(
            invoice.id,
            UpdateInvoiceStatusInput {
                status: InvoiceStatus::Cancelled,
                paid_amount: None,
                notes: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(cancelled.status, InvoiceStatus::Cancelled);

    assert!(matches!(
        service(&fx)
            .update_status(
                invoice.id,
                UpdateInvoiceStatusInput {
                    status: InvoiceStatus::Sent,
                    paid_amount: None,
                    notes: None,
                },
            )
            .await,
        Err(AppError::InvalidOrderStatusTransition { .. })
    ));
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// Balance due always equals total minus paid, and status follows it
    #[test]
    fn prop_balance_tracks_payments(
        tax_cents in 0i64..10_000,
        payments in prop::collection::vec(1i64..6_000, 1..8),
    ) {
        tokio_test::block_on(async {
            let fx = Fixture::new().await;
            let order = fx.sales_order(&[(fx.widget, 1)]).await;
            let order = fx
                .sales_orders()
                .update(
                    order.id,
                    UpdateSalesOrderInput {
                        tax_amount: Some(Decimal::new(tax_cents, 2)),
                        ..Default::default()
                    },
                )
                .await
                .unwrap();
            let invoice = service(&fx).generate(fx.user_id, generate(&order)).await.unwrap();
            let total = invoice.total_amount;
            let mut paid = Decimal::ZERO;

            for cents in payments {
                let amount = Decimal::new(cents, 2);
                let result = service(&fx)
                    .record_payment(invoice.id, fx.user_id, pay(&amount.to_string()))
                    .await;
                if paid == total {
                    assert!(matches!(result, Err(AppError::IllegalState(_))));
                } else if amount > total - paid {
                    assert!(matches!(result, Err(AppError::OverPayment { .. })));
                } else {
                    let updated = result.unwrap().invoice;
                    paid += amount;
                    assert_eq!(updated.paid_amount, paid);
                    assert_eq!(updated.balance_due, total - paid);
                    let expected = if paid == total {
                        InvoiceStatus::Paid
                    } else {
                        InvoiceStatus::Partial
                    };
                    assert_eq!(updated.status, expected);
                }
            }

            let current = service(&fx).get(invoice.id).await.unwrap();
            assert_eq!(current.paid_amount, paid);
            assert_eq!(current.balance_due + current.paid_amount, total);
        });
    }
}
