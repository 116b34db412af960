//! Invoice workflow
//!
//! At most one invoice per sales order, with amounts copied from the order.
//! Recording a payment creates a COMPLETED payment and moves the invoice to
//! PARTIAL or PAID in the same transaction.

use chrono::{Days, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::{
    DocumentKind, Invoice, InvoiceStatus, InvoiceTerms, NewPayment, Payment, PaymentMethod,
    PaymentStatus, SalesOrderStatus,
};
use uuid::Uuid;

use super::{lookup, numbering, sales_order};
use crate::config::WorkflowConfig;
use crate::error::{AppError, AppResult};
use crate::store::{with_retry, RetryConfig, Storage, Transaction};

/// Days until an invoice falls due when no due date is given
const DEFAULT_PAYMENT_DAYS: u64 = 30;

#[derive(Clone)]
pub struct InvoiceService {
    store: Storage,
    retry: RetryConfig,
    currency: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenerateInvoiceInput {
    pub sales_order_id: Uuid,
    pub invoice_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub payment_terms: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateInvoiceStatusInput {
    pub status: InvoiceStatus,
    pub paid_amount: Option<Decimal>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecordInvoicePaymentInput {
    pub amount: Decimal,
    pub payment_method: PaymentMethod,
    pub payment_date: Option<NaiveDate>,
    pub reference_number: Option<String>,
    pub notes: Option<String>,
}

/// Invoice after a payment together with the payment it produced
#[derive(Debug, Clone, Serialize)]
pub struct InvoicePayment {
    pub invoice: Invoice,
    pub payment: Payment,
}

async fn load(tx: &mut dyn Transaction, id: Uuid) -> AppResult<Invoice> {
    tx.invoice(id)
        .await?
        .ok_or_else(|| AppError::not_found("Invoice", id))
}

impl InvoiceService {
    pub fn new(store: Storage, workflow: &WorkflowConfig) -> Self {
        Self {
            store,
            retry: RetryConfig::from(workflow),
            currency: workflow.default_currency.clone(),
        }
    }

    pub async fn get(&self, id: Uuid) -> AppResult<Invoice> {
        let mut tx = self.store.begin().await?;
        load(tx.as_mut(), id).await
    }

    pub async fn for_sales_order(&self, sales_order_id: Uuid) -> AppResult<Invoice> {
        let mut tx = self.store.begin().await?;
        tx.invoice_for_sales_order(sales_order_id)
            .await?
            .ok_or_else(|| AppError::not_found("Invoice", format!("sales order {}", sales_order_id)))
    }

    /// Generate the DRAFT invoice of a sales order
    pub async fn generate(&self, generated_by: Uuid, input: GenerateInvoiceInput) -> AppResult<Invoice> {
        with_retry(&self.retry, "invoice.generate", || {
            self.try_generate(generated_by, &input)
        })
        .await
    }

    async fn try_generate(&self, generated_by: Uuid, input: &GenerateInvoiceInput) -> AppResult<Invoice> {
        let invoice_date = input.invoice_date.unwrap_or_else(|| Utc::now().date_naive());
        let due_date = match input.due_date {
            Some(date) => date,
            None => invoice_date
                .checked_add_days(Days::new(DEFAULT_PAYMENT_DAYS))
                .ok_or_else(|| AppError::validation("invoice_date", "Invoice date out of range"))?,
        };

        let mut tx = self.store.begin().await?;
        lookup::require_user(tx.as_mut(), generated_by).await?;
        let order = sales_order::load(tx.as_mut(), input.sales_order_id).await?;
        if tx.invoice_for_sales_order(order.id).await?.is_some() {
            return Err(AppError::DuplicateInvoice {
                sales_order_id: order.id,
            });
        }
        if order.status == SalesOrderStatus::Cancelled {
            return Err(AppError::IllegalState(format!(
                "Cannot invoice cancelled sales order {}",
                order.so_number
            )));
        }

        let invoice_number =
            numbering::next_document_number(tx.as_mut(), DocumentKind::Invoice, invoice_date).await?;
        let invoice = Invoice::from_sales_order(
            &order,
            InvoiceTerms {
                invoice_number,
                invoice_date,
                due_date,
                payment_terms: input.payment_terms.clone(),
                notes: input.notes.clone(),
                generated_by,
            },
            Utc::now(),
        )?;
        tx.insert_invoice(&invoice).await?;
        tx.commit().await?;

        tracing::info!(
            invoice_number = %invoice.invoice_number,
            so_number = %order.so_number,
            total = %invoice.total_amount,
            "Invoice generated"
        );
        Ok(invoice)
    }

    /// Set the status directly, optionally replacing the paid amount
    pub async fn update_status(&self, id: Uuid, input: UpdateInvoiceStatusInput) -> AppResult<Invoice> {
        with_retry(&self.retry, "invoice.update_status", || {
            self.try_update_status(id, &input)
        })
        .await
    }

    async fn try_update_status(&self, id: Uuid, input: &UpdateInvoiceStatusInput) -> AppResult<Invoice> {
        let mut tx = self.store.begin().await?;
        let mut invoice = load(tx.as_mut(), id).await?;
        let from = invoice.status;
        invoice.update_status(input.status, input.paid_amount, input.notes.as_deref())?;
        tx.update_invoice(&mut invoice).await?;
        tx.commit().await?;

        tracing::info!(
            invoice_number = %invoice.invoice_number,
            from = %from,
            to = %invoice.status,
            "Invoice status changed"
        );
        Ok(invoice)
    }

    pub async fn send(&self, id: Uuid) -> AppResult<Invoice> {
        with_retry(&self.retry, "invoice.send", || self.try_send(id)).await
    }

    async fn try_send(&self, id: Uuid) -> AppResult<Invoice> {
        let mut tx = self.store.begin().await?;
        let mut invoice = load(tx.as_mut(), id).await?;
        invoice.send()?;
        tx.update_invoice(&mut invoice).await?;
        tx.commit().await?;

        tracing::info!(invoice_number = %invoice.invoice_number, "Invoice sent");
        Ok(invoice)
    }

    /// Apply a payment to the invoice and record it as a COMPLETED payment
    pub async fn record_payment(
        &self,
        id: Uuid,
        processed_by: Uuid,
        input: RecordInvoicePaymentInput,
    ) -> AppResult<InvoicePayment> {
        with_retry(&self.retry, "invoice.record_payment", || {
            self.try_record_payment(id, processed_by, &input)
        })
        .await
    }

    async fn try_record_payment(
        &self,
        id: Uuid,
        processed_by: Uuid,
        input: &RecordInvoicePaymentInput,
    ) -> AppResult<InvoicePayment> {
        let payment_date = input.payment_date.unwrap_or_else(|| Utc::now().date_naive());

        let mut tx = self.store.begin().await?;
        lookup::require_user(tx.as_mut(), processed_by).await?;
        let mut invoice = load(tx.as_mut(), id).await?;
        invoice.apply_payment(input.amount)?;

        let payment_number =
            numbering::next_document_number(tx.as_mut(), DocumentKind::Payment, payment_date).await?;
        let notes = match input.notes.as_deref().filter(|n| !n.trim().is_empty()) {
            Some(notes) => format!("Payment recorded for invoice: {} | {}", invoice.invoice_number, notes),
            None => format!("Payment recorded for invoice: {}", invoice.invoice_number),
        };
        let payment = Payment::create(
            NewPayment {
                payment_number,
                sales_order_id: Some(invoice.sales_order_id),
                invoice_id: Some(invoice.id),
                customer_id: invoice.customer_id,
                payment_date,
                payment_method: input.payment_method,
                amount: input.amount,
                currency: self.currency.clone(),
                reference_number: input.reference_number.clone(),
                status: PaymentStatus::Completed,
                processed_by,
                notes: Some(notes),
            },
            Utc::now(),
        )?;

        tx.insert_payment(&payment).await?;
        tx.update_invoice(&mut invoice).await?;
        tx.commit().await?;

        tracing::info!(
            invoice_number = %invoice.invoice_number,
            payment_number = %payment.payment_number,
            amount = %payment.amount,
            balance_due = %invoice.balance_due,
            status = %invoice.status,
            "Invoice payment recorded"
        );
        Ok(InvoicePayment { invoice, payment })
    }
}
