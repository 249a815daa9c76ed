//! Business logic services.
//!
//! # Services
//!
//! - `orders` - Inventory check, order assembly and placement, status changes
//! - `identity` - Session token verification
//! - `images` - Upload policy and the Cloudinary image host
//! - `events` - Identity-provider lifecycle events and webhook signatures

pub mod events;
pub mod identity;
pub mod images;
pub mod orders;

pub use events::{EventEnvelope, EventOutcome, EventProcessor, WebhookError};
pub use identity::{IdentityError, SessionVerifier};
pub use images::{CloudinaryClient, DisabledImageHost, ImageHost, ImageHostError, ImageUpload};
pub use orders::{OrderError, OrderService, PlaceOrderRequest};
