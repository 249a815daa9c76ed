//! Core types for Shopfloor.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod external_id;
pub mod id;
pub mod money;
pub mod quantity;
pub mod status;

pub use email::{Email, EmailError};
pub use external_id::{ExternalUserId, ExternalUserIdError};
pub use id::*;
pub use money::{Price, PriceError};
pub use quantity::{Quantity, QuantityError};
pub use status::{InvalidOrderStatus, OrderStatus};
