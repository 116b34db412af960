//! Standalone payment tests

mod common;

use common::{dec, Fixture};
use shared::{PaymentMethod, PaymentStatus};
use uuid::Uuid;
use warehouse_backend::error::AppError;
use warehouse_backend::services::payment::{
    RecordPaymentInput, RefundPaymentInput, UpdatePaymentStatusInput,
};
use warehouse_backend::services::PaymentService;

fn service(fx: &Fixture) -> PaymentService {
    PaymentService::new(fx.store.clone(), &fx.config.workflow)
}

fn payment(fx: &Fixture, amount: &str) -> RecordPaymentInput {
    RecordPaymentInput {
        customer_id: fx.customer_id,
        sales_order_id: None,
        invoice_id: None,
        payment_date: None,
        payment_method: PaymentMethod::CreditCard,
        amount: dec(amount),
        currency: None,
        reference_number: Some("AUTH-1".to_string()),
        notes: None,
    }
}

fn refund(amount: &str, reason: &str) -> RefundPaymentInput {
    RefundPaymentInput {
        refund_amount: dec(amount),
        reason: reason.to_string(),
        notes: None,
    }
}

async fn completed(fx: &Fixture, amount: &str) -> Uuid {
    let recorded = service(fx).record(fx.user_id, payment(fx, amount)).await.unwrap();
    service(fx)
        .update_status(
            recorded.id,
            UpdatePaymentStatusInput {
                status: PaymentStatus::Completed,
                notes: None,
            },
        )
        .await
        .unwrap();
    recorded.id
}

#[tokio::test]
async fn test_record_defaults_to_pending_in_default_currency() {
    let fx = Fixture::new().await;
    let recorded = service(&fx).record(fx.user_id, payment(&fx, "42.00")).await.unwrap();

    assert_eq!(recorded.status, PaymentStatus::Pending);
    assert_eq!(recorded.currency, "USD");
    assert!(recorded.payment_number.starts_with("PAY-"));
}

#[tokio::test]
async fn test_record_rejects_unknown_references() {
    let fx = Fixture::new().await;

    let mut input = payment(&fx, "10.00");
    input.customer_id = Uuid::new_v4();
    assert!(matches!(
        service(&fx).record(fx.user_id, input).await,
        Err(AppError::NotFound { .. })
    ));

    let mut input = payment(&fx, "10.00");
    input.invoice_id = Some(Uuid::new_v4());
    assert!(matches!(
        service(&fx).record(fx.user_id, input).await,
        Err(AppError::NotFound { .. })
    ));

    assert!(matches!(
        service(&fx).record(fx.user_id, payment(&fx, "0")).await,
        Err(AppError::Validation { .. })
    ));
}

#[tokio::test]
async fn test_sub_cent_amounts_are_rejected() {
    let fx = Fixture::new().await;

    assert!(matches!(
        service(&fx).record(fx.user_id, payment(&fx, "0.004")).await,
        Err(AppError::Validation { field, .. }) if field == "amount"
    ));

    let id = completed(&fx, "10.00").await;
    assert!(matches!(
        service(&fx).refund(id, refund("0.004", "Rounding")).await,
        Err(AppError::Validation { field, .. }) if field == "refund_amount"
    ));
    assert_eq!(service(&fx).get(id).await.unwrap().status, PaymentStatus::Completed);
}

#[tokio::test]
async fn test_refund_completed_payment() {
    let fx = Fixture::new().await;
    let id = completed(&fx, "80.00").await;

    let refunded = service(&fx)
        .refund(id, refund("30.00", "Damaged on arrival"))
        .await
        .unwrap();

    assert_eq!(refunded.status, PaymentStatus::Refunded);
    assert!(refunded
        .notes
        .unwrap()
        .contains("REFUND: Damaged on arrival"));
}

#[tokio::test]
async fn test_refund_guards() {
    let fx = Fixture::new().await;
    let pending = service(&fx).record(fx.user_id, payment(&fx, "80.00")).await.unwrap();
    assert!(matches!(
        service(&fx).refund(pending.id, refund("10.00", "Oops")).await,
        Err(AppError::InvalidOrderStatusTransition { .. })
    ));

    let id = completed(&fx, "80.00").await;
    assert!(matches!(
        service(&fx).refund(id, refund("80.01", "Too much")).await,
        Err(AppError::OverRefund { .. })
    ));
    assert!(matches!(
        service(&fx).refund(id, refund("10.00", "   ")).await,
        Err(AppError::Validation { .. })
    ));

    let still_completed = service(&fx).get(id).await.unwrap();
    assert_eq!(still_completed.status, PaymentStatus::Completed);
}

#[tokio::test]
async fn test_status_update_cannot_refund() {
    let fx = Fixture::new().await;
    let id = completed(&fx, "20.00").await;

    assert!(matches!(
        service(&fx)
            .update_status(
                id,
                UpdatePaymentStatusInput {
                    status: PaymentStatus::Refunded,
                    notes: None,
                },
            )
            .await,
        Err(AppError::IllegalState(_))
    ));
}
