// apps/marketplace/src/models/mod.rs

//! Database row shapes and their conversions into `bazaar` records.

pub mod buyer;
pub mod cart_item;
pub mod order;
pub mod order_item;
pub mod payment;
pub mod plan;
pub mod product;
pub mod vendor;

pub use buyer::BuyerRow;
pub use cart_item::CartItemRow;
pub use order::OrderRow;
pub use order_item::OrderItemRow;
pub use payment::PaymentRow;
pub use plan::PlanRow;
pub use product::ProductRow;
pub use vendor::VendorRow;
