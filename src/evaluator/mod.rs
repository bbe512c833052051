// Evaluator module: per-offer discount math, eligibility and best-offer selection.

pub mod discount;
pub mod eligibility;

// Re-export the main Evaluator implementation for ease of use.
pub use discount::{Evaluator, EvaluatorImpl};
pub use eligibility::is_eligible;
