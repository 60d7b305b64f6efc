//! HTTP request handlers

pub mod auth;
pub mod client;
pub mod contract;
pub mod finance;
pub mod health;
pub mod printer;
pub mod product;
pub mod purchase;
pub mod rental_order;
pub mod reporting;
pub mod sale;
pub mod settings;

pub use auth::{create_user, list_users, login, refresh, register};
pub use client::{create_client, delete_client, get_client, list_clients, rented_printers, update_client};
pub use contract::{
    attach_printer, contract_profitability, create_contract, detach_printer, get_billing,
    get_contract, issue_billing, list_billings, list_contracts, update_contract, void_billing,
};
pub use finance::{
    account_statement, cancel_entry, create_account, create_entry, finance_summary, get_entry,
    list_accounts, list_entries, reopen_entry, settle_entry, update_account,
};
pub use health::health_check;
pub use printer::{
    add_maintenance_log, create_printer, delete_printer, edit_movement, get_printer,
    list_printers, list_work_orders, move_printer, printer_history, printer_timeline,
    update_printer,
};
pub use product::{
    adjust_stock, cancel_movement, create_product, delete_product, edit_entry, export_products,
    get_movement, get_product, list_movements, list_products, stock_overview, update_product,
};
pub use purchase::{
    cancel_purchase_order, create_purchase_order, create_supplier, delete_supplier,
    deliver_purchase_order, get_purchase_order, get_supplier, list_purchase_orders,
    list_suppliers, update_purchase_order, update_supplier,
};
pub use rental_order::{cancel_order, create_order, edit_order, get_order, list_orders, top_clients};
pub use reporting::{get_dashboard, get_notifications};
pub use sale::{
    cancel_sale, canceled_sales, create_sale, due_sales, export_sales, get_sale, list_sales,
    update_sale,
};
pub use settings::{get_settings, list_logs, update_settings};
