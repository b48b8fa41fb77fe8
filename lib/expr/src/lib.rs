//! Guard-expression evaluation for the amber-relay platform.
//!
//! Trigger guards and edge guards are small comparison expressions over the
//! event (and, for resumed edges, prior step outputs and the async event):
//!
//! ```text
//! event.data.x == 1 && event.data.plan == 'pro'
//! steps.1.id >= 10 || async.data.approved
//! ```
//!
//! The [`ExpressionEvaluator`] trait is the seam; [`DefaultEvaluator`] is the
//! built-in implementation.

pub mod evaluator;
pub mod parse;

pub use evaluator::{DefaultEvaluator, ExpressionError, ExpressionEvaluator};
