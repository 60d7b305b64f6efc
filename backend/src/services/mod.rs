//! Business logic services for PrintControl

pub mod audit;
pub mod auth;
pub mod client;
pub mod contract;
pub mod finance;
pub mod printer;
pub mod product;
pub mod purchase;
pub mod rental_order;
pub mod reporting;
pub mod sale;
pub mod settings;
pub mod stock;

pub use audit::AuditService;
pub use auth::AuthService;
pub use client::ClientService;
pub use contract::ContractService;
pub use finance::FinanceService;
pub use printer::PrinterService;
pub use product::ProductService;
pub use purchase::PurchaseService;
pub use rental_order::RentalOrderService;
pub use reporting::ReportingService;
pub use sale::SaleService;
pub use settings::SettingsService;
