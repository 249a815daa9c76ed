//! Domain types for the back office.
//!
//! These are validated domain objects, separate from the database row types
//! in `crate::db::pg`. They serialize to the camelCase JSON the API returns.

pub mod address;
pub mod order;
pub mod product;
pub mod review;
pub mod stats;
pub mod user;

pub use address::{Address, AddressPatch, NewAddress};
pub use order::{
    AdminOrder, CustomerOrder, CustomerRef, Order, OrderDraft, OrderLine, OrderLineDraft,
    PaymentResult, ShippingAddress,
};
pub use product::{NewProduct, Product, ProductPatch};
pub use review::{NewReview, Review};
pub use stats::DashboardStats;
pub use user::{User, UserProfile};
