//! Document numbering tests

mod common;

use std::collections::HashSet;

use chrono::{NaiveDate, Utc};
use common::Fixture;
use shared::{parse_sequence, DocumentKind};
use warehouse_backend::services::invoice::GenerateInvoiceInput;
use warehouse_backend::services::InvoiceService;

#[tokio::test]
async fn test_sales_order_numbers_are_sequential_per_day() {
    let fx = Fixture::new().await;
    let today = Utc::now().date_naive();

    let mut sequences = Vec::new();
    for _ in 0..5 {
        let order = fx.sales_order(&[(fx.widget, 1)]).await;
        let (date, sequence) = parse_sequence(DocumentKind::SalesOrder, &order.so_number).unwrap();
        assert_eq!(date, today);
        sequences.push(sequence);
    }

    assert_eq!(sequences, vec![1, 2, 3, 4, 5]);
}

#[tokio::test]
async fn test_concurrent_creations_get_distinct_numbers() {
    let fx = Fixture::new().await;

    let mut handles = Vec::new();
    for _ in 0..8 {
        let fx = fx.clone();
        handles.push(tokio::spawn(async move {
            fx.sales_order(&[(fx.widget, 1)]).await
        }));
    }

    let mut numbers = HashSet::new();
    for handle in handles {
        let order = handle.await.unwrap();
        assert!(numbers.insert(order.so_number));
    }
    assert_eq!(numbers.len(), 8);
}

#[tokio::test]
async fn test_invoice_numbers_use_invoice_date() {
    let fx = Fixture::new().await;
    let service = InvoiceService::new(fx.store.clone(), &fx.config.workflow);
    let date = NaiveDate::from_ymd_opt(2023, 12, 31);

    for expected in ["INV-20231231-0001", "INV-20231231-0002"] {
        let order = fx.sales_order(&[(fx.gadget, 1)]).await;
        let invoice = service
            .generate(
                fx.user_id,
                GenerateInvoiceInput {
                    sales_order_id: order.id,
                    invoice_date: date,
                    due_date: None,
                    payment_terms: None,
                    notes: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(invoice.invoice_number, expected);
    }
}
