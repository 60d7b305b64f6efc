//! Domain models and pure business rules for PrintControl

mod alert;
mod client;
mod contract;
mod finance;
mod printer;
mod purchase;
mod rental;
mod sale;
mod stock;
mod user;

pub use alert::*;
pub use client::*;
pub use contract::*;
pub use finance::*;
pub use printer::*;
pub use purchase::*;
pub use rental::*;
pub use sale::*;
pub use stock::*;
pub use user::*;
