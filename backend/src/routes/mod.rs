//! Route definitions for the PrintControl API

use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};

use crate::{handlers, middleware::auth_middleware, AppState};

/// Create API routes
pub fn api_routes(state: AppState) -> Router<AppState> {
    let protected = Router::new()
        .nest("/users", user_routes())
        .nest("/settings", settings_routes())
        .nest("/clients", client_routes())
        .nest("/products", product_routes())
        .nest("/stock", stock_routes())
        .nest("/sales", sale_routes())
        .nest("/rental-orders", rental_order_routes())
        .nest("/printers", printer_routes())
        .nest("/suppliers", supplier_routes())
        .nest("/purchase-orders", purchase_order_routes())
        .nest("/contracts", contract_routes())
        .nest("/finance", finance_routes())
        .route("/dashboard", get(handlers::get_dashboard))
        .route("/notifications", get(handlers::get_notifications))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware));

    Router::new()
        // Health check (public)
        .route("/health", get(handlers::health_check))
        // Auth routes (public)
        .nest("/auth", auth_routes())
        .merge(protected)
}

/// Authentication routes (public)
fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(handlers::register))
        .route("/login", post(handlers::login))
        .route("/refresh", post(handlers::refresh))
}

fn user_routes() -> Router<AppState> {
    Router::new().route("/", get(handlers::list_users).post(handlers::create_user))
}

fn settings_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::get_settings).put(handlers::update_settings))
        .route("/logs", get(handlers::list_logs))
}

fn client_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_clients).post(handlers::create_client))
        .route(
            "/:client_id",
            get(handlers::get_client)
                .put(handlers::update_client)
                .delete(handlers::delete_client),
        )
        .route("/:client_id/printers", get(handlers::rented_printers))
}

fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_products).post(handlers::create_product))
        .route("/export", get(handlers::export_products))
        .route(
            "/:product_id",
            get(handlers::get_product)
                .put(handlers::update_product)
                .delete(handlers::delete_product),
        )
        .route("/:product_id/adjust", post(handlers::adjust_stock))
}

fn stock_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::stock_overview))
        .route("/movements", get(handlers::list_movements))
        .route(
            "/movements/:movement_id",
            get(handlers::get_movement).put(handlers::edit_entry),
        )
        .route("/movements/:movement_id/cancel", post(handlers::cancel_movement))
}

fn sale_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_sales).post(handlers::create_sale))
        .route("/due", get(handlers::due_sales))
        .route("/canceled", get(handlers::canceled_sales))
        .route("/export", get(handlers::export_sales))
        .route("/:sale_id", get(handlers::get_sale).put(handlers::update_sale))
        .route("/:sale_id/cancel", post(handlers::cancel_sale))
}

fn rental_order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_orders).post(handlers::create_order))
        .route("/top-clients", get(handlers::top_clients))
        .route("/:order_id", get(handlers::get_order).put(handlers::edit_order))
        .route("/:order_id/cancel", post(handlers::cancel_order))
}

fn printer_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_printers).post(handlers::create_printer))
        .route(
            "/:printer_id",
            get(handlers::get_printer)
                .put(handlers::update_printer)
                .delete(handlers::delete_printer),
        )
        .route("/:printer_id/move", post(handlers::move_printer))
        .route("/:printer_id/timeline", get(handlers::printer_timeline))
        .route("/:printer_id/history", get(handlers::printer_history))
        .route("/:printer_id/work-orders", get(handlers::list_work_orders))
        .route("/movements/:movement_id", put(handlers::edit_movement))
        .route("/work-orders/:work_order_id/logs", post(handlers::add_maintenance_log))
}

fn supplier_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_suppliers).post(handlers::create_supplier))
        .route(
            "/:supplier_id",
            get(handlers::get_supplier)
                .put(handlers::update_supplier)
                .delete(handlers::delete_supplier),
        )
}

fn purchase_order_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_purchase_orders).post(handlers::create_purchase_order),
        )
        .route(
            "/:order_id",
            get(handlers::get_purchase_order).put(handlers::update_purchase_order),
        )
        .route("/:order_id/cancel", post(handlers::cancel_purchase_order))
        .route("/:order_id/deliver", post(handlers::deliver_purchase_order))
}

fn contract_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_contracts).post(handlers::create_contract))
        .route(
            "/:contract_id",
            get(handlers::get_contract).put(handlers::update_contract),
        )
        .route("/:contract_id/printers", post(handlers::attach_printer))
        .route(
            "/:contract_id/printers/:printer_id",
            delete(handlers::detach_printer),
        )
        .route(
            "/:contract_id/billings",
            get(handlers::list_billings).post(handlers::issue_billing),
        )
        .route("/:contract_id/profitability", get(handlers::contract_profitability))
        .route(
            "/billings/:billing_id",
            get(handlers::get_billing).delete(handlers::void_billing),
        )
}

fn finance_routes() -> Router<AppState> {
    Router::new()
        .route("/summary", get(handlers::finance_summary))
        .route("/accounts", get(handlers::list_accounts).post(handlers::create_account))
        .route("/accounts/:account_id", put(handlers::update_account))
        .route("/accounts/:account_id/statement", get(handlers::account_statement))
        .route("/entries", get(handlers::list_entries).post(handlers::create_entry))
        .route("/entries/:entry_id", get(handlers::get_entry))
        .route("/entries/:entry_id/settle", post(handlers::settle_entry))
        .route("/entries/:entry_id/reopen", post(handlers::reopen_entry))
        .route("/entries/:entry_id/cancel", post(handlers::cancel_entry))
}
