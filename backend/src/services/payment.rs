//! Payment workflow: PENDING -> COMPLETED / FAILED, COMPLETED -> REFUNDED

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use shared::{DocumentKind, NewPayment, Payment, PaymentMethod, PaymentStatus};
use uuid::Uuid;

use super::{lookup, numbering, sales_order};
use crate::config::WorkflowConfig;
use crate::error::{AppError, AppResult};
use crate::store::{with_retry, RetryConfig, Storage, Transaction};

#[derive(Clone)]
pub struct PaymentService {
    store: Storage,
    retry: RetryConfig,
    default_currency: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecordPaymentInput {
    pub customer_id: Uuid,
    pub sales_order_id: Option<Uuid>,
    pub invoice_id: Option<Uuid>,
    pub payment_date: Option<NaiveDate>,
    pub payment_method: PaymentMethod,
    pub amount: Decimal,
    pub currency: Option<String>,
    pub reference_number: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdatePaymentStatusInput {
    pub status: PaymentStatus,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RefundPaymentInput {
    pub refund_amount: Decimal,
    pub reason: String,
    pub notes: Option<String>,
}

async fn load(tx: &mut dyn Transaction, id: Uuid) -> AppResult<Payment> {
    tx.payment(id)
        .await?
        .ok_or_else(|| AppError::not_found("Payment", id))
}

impl PaymentService {
    pub fn new(store: Storage, workflow: &WorkflowConfig) -> Self {
        Self {
            store,
            retry: RetryConfig::from(workflow),
            default_currency: workflow.default_currency.clone(),
        }
    }

    pub async fn get(&self, id: Uuid) -> AppResult<Payment> {
        let mut tx = self.store.begin().await?;
        load(tx.as_mut(), id).await
    }

    /// Record a PENDING payment
    pub async fn record(&self, processed_by: Uuid, input: RecordPaymentInput) -> AppResult<Payment> {
        with_retry(&self.retry, "payment.record", || {
            self.try_record(processed_by, &input)
        })
        .await
    }

    async fn try_record(&self, processed_by: Uuid, input: &RecordPaymentInput) -> AppResult<Payment> {
        let payment_date = input.payment_date.unwrap_or_else(|| Utc::now().date_naive());
        let currency = input
            .currency
            .clone()
            .unwrap_or_else(|| self.default_currency.clone());

        let mut tx = self.store.begin().await?;
        lookup::require_user(tx.as_mut(), processed_by).await?;
        lookup::require_customer(tx.as_mut(), input.customer_id).await?;
        if let Some(order_id) = input.sales_order_id {
            sales_order::load(tx.as_mut(), order_id).await?;
        }
        if let Some(invoice_id) = input.invoice_id {
            if tx.invoice(invoice_id).await?.is_none() {
                return Err(AppError::not_found("Invoice", invoice_id));
            }
        }

        let payment_number =
            numbering::next_document_number(tx.as_mut(), DocumentKind::Payment, payment_date).await?;
        let payment = Payment::create(
            NewPayment {
                payment_number,
                sales_order_id: input.sales_order_id,
                invoice_id: input.invoice_id,
                customer_id: input.customer_id,
                payment_date,
                payment_method: input.payment_method,
                amount: input.amount,
                currency,
                reference_number: input.reference_number.clone(),
                status: PaymentStatus::Pending,
                processed_by,
                notes: input.notes.clone(),
            },
            Utc::now(),
        )?;
        tx.insert_payment(&payment).await?;
        tx.commit().await?;

        tracing::info!(
            payment_number = %payment.payment_number,
            amount = %payment.amount,
            currency = %payment.currency,
            "Payment recorded"
        );
        Ok(payment)
    }

    pub async fn update_status(&self, id: Uuid, input: UpdatePaymentStatusInput) -> AppResult<Payment> {
        with_retry(&self.retry, "payment.update_status", || {
            self.try_update_status(id, &input)
        })
        .await
    }

    async fn try_update_status(&self, id: Uuid, input: &UpdatePaymentStatusInput) -> AppResult<Payment> {
        let mut tx = self.store.begin().await?;
        let mut payment = load(tx.as_mut(), id).await?;
        let from = payment.status;
        payment.update_status(input.status, input.notes.as_deref())?;
        tx.update_payment(&mut payment).await?;
        tx.commit().await?;

        tracing::info!(
            payment_number = %payment.payment_number,
            from = %from,
            to = %payment.status,
            "Payment status changed"
        );
        Ok(payment)
    }

    /// Flag a COMPLETED payment as refunded. Linked invoices are not touched.
    pub async fn refund(&self, id: Uuid, input: RefundPaymentInput) -> AppResult<Payment> {
        if input.reason.trim().is_empty() {
            return Err(AppError::validation("reason", "Refund reason is required"));
        }
        with_retry(&self.retry, "payment.refund", || self.try_refund(id, &input)).await
    }

    async fn try_refund(&self, id: Uuid, input: &RefundPaymentInput) -> AppResult<Payment> {
        let mut tx = self.store.begin().await?;
        let mut payment = load(tx.as_mut(), id).await?;
        payment.refund(input.refund_amount, &input.reason, input.notes.as_deref())?;
        tx.update_payment(&mut payment).await?;
        tx.commit().await?;

        tracing::info!(
            payment_number = %payment.payment_number,
            refund_amount = %input.refund_amount,
            "Payment refunded"
        );
        Ok(payment)
    }
}
