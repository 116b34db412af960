//! Route definitions for the warehouse backend

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::{handlers, middleware::auth_middleware, AppState};

/// Create API routes
pub fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        // Health check (public)
        .route("/health", get(handlers::health_check))
        // Protected routes
        .merge(
            Router::new()
                .nest("/inventory", inventory_routes())
                .nest("/adjustments", adjustment_routes())
                .nest("/purchase-orders", purchase_order_routes())
                .nest("/sales-orders", sales_order_routes())
                .nest("/shipments", shipment_routes())
                .nest("/invoices", invoice_routes())
                .nest("/payments", payment_routes())
                .route_layer(middleware::from_fn_with_state(state, auth_middleware)),
        )
}

/// Stock levels, movements and transfers
fn inventory_routes() -> Router<AppState> {
    Router::new()
        .route("/products/:product_id", get(handlers::get_stock_levels))
        .route(
            "/products/:product_id/warehouses/:warehouse_id",
            get(handlers::get_stock_quantity),
        )
        .route("/movements", get(handlers::list_movements))
        .route("/transfers", post(handlers::transfer_stock))
}

fn adjustment_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(handlers::create_adjustment))
        .route("/:id", get(handlers::get_adjustment))
        .route("/:id/approve", post(handlers::approve_adjustment))
        .route("/:id/reject", post(handlers::reject_adjustment))
}

fn purchase_order_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(handlers::create_purchase_order))
        .route(
            "/:id",
            get(handlers::get_purchase_order)
                .put(handlers::update_purchase_order)
                .delete(handlers::delete_purchase_order),
        )
        .route("/:id/submit", post(handlers::submit_purchase_order))
        .route("/:id/approve", post(handlers::approve_purchase_order))
        .route("/:id/reject", post(handlers::reject_purchase_order))
        .route("/:id/cancel", post(handlers::cancel_purchase_order))
        .route("/:id/receive", post(handlers::receive_purchase_order))
}

fn sales_order_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(handlers::create_sales_order))
        .route(
            "/:id",
            get(handlers::get_sales_order).put(handlers::update_sales_order),
        )
        .route("/:id/confirm", post(handlers::confirm_sales_order))
        .route("/:id/fulfill", post(handlers::fulfill_sales_order))
        .route("/:id/ship", post(handlers::ship_sales_order))
        .route("/:id/deliver", post(handlers::deliver_sales_order))
        .route("/:id/cancel", post(handlers::cancel_sales_order))
        .route("/:id/shipments", get(handlers::get_sales_order_shipments))
        .route("/:id/invoice", get(handlers::get_sales_order_invoice))
}

fn shipment_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(handlers::create_shipment))
        .route("/:id", get(handlers::get_shipment))
        .route("/:id/status", post(handlers::update_shipment_status))
        .route("/:id/deliver", post(handlers::deliver_shipment))
}

fn invoice_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(handlers::generate_invoice))
        .route("/:id", get(handlers::get_invoice))
        .route("/:id/status", post(handlers::update_invoice_status))
        .route("/:id/send", post(handlers::send_invoice))
        .route("/:id/payments", post(handlers::record_invoice_payment))
}

fn payment_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(handlers::record_payment))
        .route("/:id", get(handlers::get_payment))
        .route("/:id/status", post(handlers::update_payment_status))
        .route("/:id/refund", post(handlers::refund_payment))
}
