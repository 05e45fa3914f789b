// src/lib.rs

//! Bazaar: payment rules and request orchestration for a multi-vendor marketplace.
//!
//! The crate holds the parts of the marketplace that carry real arithmetic or
//! state rules, independent of any web framework or database driver:
//!  - Minor-unit money (`Kobo`) and half-to-even rounding from naira prices.
//!  - The split calculator: per-vendor payout shares, the unsplit platform bucket,
//!    and the buyer-side transaction fee with its cap.
//!  - The payment lifecycle (`pending -> paid | failed`) with idempotent confirmation.
//!  - Vendor subscriptions: proration, status evaluation, renewal and product quota.
//!  - Webhook signature verification (HMAC-SHA512).
//!  - The payment gateway port and a Paystack-compatible REST client.
//!  - Storage ports with an in-memory adapter.
//!  - `workflow`: a small async step-pipeline engine the HTTP service composes its
//!    operations with.

pub mod cart;
pub mod catalog;
pub mod error;
pub mod gateway;
pub mod money;
pub mod order;
pub mod payment;
pub mod signature;
pub mod split;
pub mod store;
pub mod subscription;
pub mod workflow;

pub use crate::error::WorkflowError;
pub use crate::money::Kobo;
pub use crate::split::{compute_split, FeeSchedule, LineItem, SplitPlan};
pub use crate::workflow::{ContextData, Pipeline, PipelineOutcome, StepControl, Workflows};
