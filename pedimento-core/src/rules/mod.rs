// Compliance rules over a finished PedimentoRecord.
// - engine.rs: RuleEngine, the ComplianceRule trait, config-driven selection
// - structural.rs: required fields and chunk coverage
// - format.rs: code and number shapes
// - reconciliation.rs: header totals against item sums
// - regime.rs: identifier, payment-form and document-key requirements
// - rates.rs: rate and amount plausibility

pub mod engine;
pub mod format;
pub mod rates;
pub mod reconciliation;
pub mod regime;
pub mod structural;

mod support;

pub use engine::{builtin_rules, ComplianceRule, FnRule, RuleCategory, RuleCheck, RuleEngine};
