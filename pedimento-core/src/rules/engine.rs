use crate::config::ValidationConfig;
use crate::types::{PedimentoRecord, ValidationFinding};
use std::collections::HashSet;
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::{format, rates, reconciliation, regime, structural};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleCategory {
    Structural,
    Format,
    Reconciliation,
    Regime,
    Rates,
}

impl RuleCategory {
    pub const ALL: [RuleCategory; 5] = [
        RuleCategory::Structural,
        RuleCategory::Format,
        RuleCategory::Reconciliation,
        RuleCategory::Regime,
        RuleCategory::Rates,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RuleCategory::Structural => "Structural",
            RuleCategory::Format => "Format",
            RuleCategory::Reconciliation => "Reconciliation",
            RuleCategory::Regime => "Regime",
            RuleCategory::Rates => "Rates",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for RuleCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A pure check over a finished record. Rules only append; they never read
/// another rule's findings.
pub trait ComplianceRule: Send + Sync {
    fn name(&self) -> &str;
    fn category(&self) -> RuleCategory;
    fn evaluate(
        &self,
        record: &PedimentoRecord,
        config: &ValidationConfig,
        findings: &mut Vec<ValidationFinding>,
    );
}

pub type RuleCheck = fn(&PedimentoRecord, &ValidationConfig, &mut Vec<ValidationFinding>);

/// Built-in rules are plain functions tagged with a name and category.
#[derive(Clone, Copy)]
pub struct FnRule {
    name: &'static str,
    category: RuleCategory,
    check: RuleCheck,
}

impl FnRule {
    pub const fn new(name: &'static str, category: RuleCategory, check: RuleCheck) -> Self {
        Self {
            name,
            category,
            check,
        }
    }
}

impl ComplianceRule for FnRule {
    fn name(&self) -> &str {
        self.name
    }

    fn category(&self) -> RuleCategory {
        self.category
    }

    fn evaluate(
        &self,
        record: &PedimentoRecord,
        config: &ValidationConfig,
        findings: &mut Vec<ValidationFinding>,
    ) {
        (self.check)(record, config, findings)
    }
}

fn builtin_specs() -> impl Iterator<Item = &'static FnRule> {
    structural::RULES
        .iter()
        .chain(format::RULES)
        .chain(reconciliation::RULES)
        .chain(regime::RULES)
        .chain(rates::RULES)
}

/// Every shipped rule, grouped by category.
pub fn builtin_rules() -> Vec<Box<dyn ComplianceRule>> {
    builtin_specs()
        .map(|rule| Box::new(*rule) as Box<dyn ComplianceRule>)
        .collect()
}

pub struct RuleEngine {
    config: ValidationConfig,
    rules: Vec<Box<dyn ComplianceRule>>,
}

impl RuleEngine {
    pub fn new(config: ValidationConfig) -> Self {
        Self {
            config,
            rules: builtin_rules(),
        }
    }

    /// Engine with no built-in rules, for callers assembling their own set.
    pub fn empty(config: ValidationConfig) -> Self {
        Self {
            config,
            rules: Vec::new(),
        }
    }

    pub fn register(&mut self, rule: Box<dyn ComplianceRule>) {
        self.rules.push(rule);
    }

    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }

    pub fn rule_names(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    /// Resolve the configured rule list against the registered rules.
    ///
    /// Entries name either a rule or a category. Enabled entries select in
    /// order; disabled entries remove whatever they name. Unknown names are
    /// skipped with a warning.
    fn selected(&self) -> Vec<&dyn ComplianceRule> {
        let mut selected: Vec<&dyn ComplianceRule> = Vec::new();
        let mut seen: HashSet<&str> = HashSet::new();
        let mut disabled: HashSet<&str> = HashSet::new();

        for rule_config in &self.config.rules {
            let matching = self.matching(&rule_config.name);
            if matching.is_empty() {
                warn!(rule = %rule_config.name, "unknown rule in config, skipping");
                continue;
            }
            if !rule_config.enabled {
                debug!(rule = %rule_config.name, "rule disabled by config");
                disabled.extend(matching.iter().map(|r| r.name()));
                continue;
            }
            for rule in matching {
                if seen.insert(rule.name()) {
                    selected.push(rule);
                }
            }
        }

        // Custom rules run even when the config only names categories.
        let builtin: HashSet<&str> = builtin_specs().map(|r| r.name).collect();
        for rule in &self.rules {
            if !builtin.contains(rule.name()) && seen.insert(rule.name()) {
                selected.push(rule.as_ref());
            }
        }

        selected.retain(|r| !disabled.contains(r.name()));
        selected
    }

    fn matching(&self, name: &str) -> Vec<&dyn ComplianceRule> {
        match RuleCategory::from_name(name) {
            Some(category) => self
                .rules
                .iter()
                .filter(|r| r.category() == category)
                .map(|r| r.as_ref())
                .collect(),
            None => self
                .rules
                .iter()
                .filter(|r| r.name() == name)
                .map(|r| r.as_ref())
                .collect(),
        }
    }

    /// Run the selected rules and return every finding, in rule order.
    pub fn evaluate(&self, record: &PedimentoRecord) -> Vec<ValidationFinding> {
        self.evaluate_with_timings(record).0
    }

    pub fn evaluate_with_timings(
        &self,
        record: &PedimentoRecord,
    ) -> (Vec<ValidationFinding>, Vec<(String, Duration)>) {
        let mut findings = Vec::new();
        let mut timings = Vec::new();

        for rule in self.selected() {
            let before = findings.len();
            let start = Instant::now();
            rule.evaluate(record, &self.config, &mut findings);
            timings.push((rule.name().to_string(), start.elapsed()));
            if findings.len() > before {
                debug!(
                    rule = rule.name(),
                    category = %rule.category(),
                    findings = findings.len() - before,
                    "rule reported"
                );
            }
        }
        (findings, timings)
    }

    /// Evaluate and replace the record's findings in one step.
    pub fn validate(&self, record: &mut PedimentoRecord) {
        let findings = self.evaluate(record);
        info!(
            findings = findings.len(),
            policy = %self.config.policy.version,
            "compliance rules evaluated"
        );
        record.replace_findings(findings);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuleConfig;
    use crate::types::{Severity, ValidationFinding};

    fn config_with(rules: &[(&str, bool)]) -> ValidationConfig {
        ValidationConfig {
            rules: rules
                .iter()
                .map(|(name, enabled)| RuleConfig {
                    name: name.to_string(),
                    enabled: *enabled,
                })
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn builtin_rule_names_are_unique() {
        let rules = builtin_rules();
        let names: HashSet<&str> = rules.iter().map(|r| r.name()).collect();
        assert_eq!(names.len(), rules.len());
    }

    #[test]
    fn categories_expand_to_their_rules() {
        let engine = RuleEngine::new(config_with(&[("Format", true)]));
        let selected = engine.selected();
        assert!(!selected.is_empty());
        assert!(selected.iter().all(|r| r.category() == RuleCategory::Format));
    }

    #[test]
    fn unknown_names_are_skipped() {
        let engine = RuleEngine::new(config_with(&[("NoSuchRule", true), ("items_present", true)]));
        let names: Vec<&str> = engine.selected().iter().map(|r| r.name()).collect();
        assert_eq!(names, vec!["items_present"]);
    }

    #[test]
    fn disabled_entry_removes_rule_from_category() {
        let engine = RuleEngine::new(config_with(&[
            ("Structural", true),
            ("items_present", false),
        ]));
        let findings = engine.evaluate(&PedimentoRecord::default());
        assert!(findings.iter().all(|f| f.rule != "items_present"));
        assert!(findings.iter().any(|f| f.rule == "importer_rfc_present"));
    }

    fn always_info(
        _record: &PedimentoRecord,
        _config: &ValidationConfig,
        findings: &mut Vec<ValidationFinding>,
    ) {
        findings.push(ValidationFinding::info("always_info", "Record", "checked"));
    }

    #[test]
    fn registered_rules_run() {
        let mut engine = RuleEngine::empty(config_with(&[]));
        engine.register(Box::new(FnRule::new(
            "always_info",
            RuleCategory::Structural,
            always_info,
        )));
        let mut record = PedimentoRecord::default();
        engine.validate(&mut record);
        assert_eq!(record.findings.len(), 1);
        assert_eq!(record.count_findings(Severity::Info), 1);
    }

    #[test]
    fn validate_replaces_previous_findings() {
        let engine = RuleEngine::new(config_with(&[("items_present", true)]));
        let mut record = PedimentoRecord::default();
        record
            .findings
            .push(ValidationFinding::warning("stale", "Record", "old"));
        engine.validate(&mut record);
        assert_eq!(record.findings.len(), 1);
        assert_eq!(record.findings[0].rule, "items_present");
    }
}
