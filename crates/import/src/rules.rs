use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tally_core::{Amount, Posting, Transaction, TransactionRegex};

/// Values used for any field a matching rule leaves without a template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionDefaults {
    pub account_to: String,
    pub account_from: String,
    pub payee: String,
    pub commodity: String,
}

impl Default for ExtractionDefaults {
    fn default() -> Self {
        Self {
            account_to: "Expenses:Other".to_string(),
            account_from: "Assets:Checking".to_string(),
            payee: "Unknown".to_string(),
            commodity: "INR".to_string(),
        }
    }
}

/// Internal pairing of a rule with its anchored, precompiled pattern.
struct CompiledRule {
    rule: TransactionRegex,
    regex: Regex,
}

/// Turns free-form text into a two-posting transaction using the first rule
/// whose pattern matches the whole text.
pub struct RegexExtractor {
    rules: Vec<CompiledRule>,
    defaults: ExtractionDefaults,
}

impl RegexExtractor {
    pub fn new(rules: Vec<TransactionRegex>, defaults: ExtractionDefaults) -> Self {
        let rules = rules
            .into_iter()
            .filter_map(|rule| match Regex::new(&format!("^(?:{})$", rule.pattern)) {
                Ok(regex) => Some(CompiledRule { rule, regex }),
                Err(e) => {
                    tracing::warn!(rule = %rule.name, error = %e, "skipping rule with invalid pattern");
                    None
                }
            })
            .collect();
        Self { rules, defaults }
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// The matching rule's name and the transaction it produces, dated `today`.
    /// No matching rule is not an error.
    pub fn extract(&self, text: &str, today: NaiveDate) -> Option<(&str, Transaction)> {
        self.rules.iter().find_map(|cr| {
            let caps = cr.regex.captures(text)?;
            let tx = self.build(&cr.rule, &caps, today);
            tracing::debug!(rule = %cr.rule.name, payee = %tx.payee, "rule matched");
            Some((cr.rule.name.as_str(), tx))
        })
    }

    fn build(&self, rule: &TransactionRegex, caps: &regex::Captures<'_>, today: NaiveDate) -> Transaction {
        let expand = |template: &str| {
            let mut out = String::new();
            caps.expand(template, &mut out);
            out
        };
        let field = |template: &Option<String>, default: &str| {
            template
                .as_deref()
                .map_or_else(|| default.to_string(), |t| expand(t))
        };

        let templates = &rule.captures;
        let account_to = field(&templates.account_to, &self.defaults.account_to);
        let account_from = field(&templates.account_from, &self.defaults.account_from);
        let payee = field(&templates.payee, &self.defaults.payee);
        let commodity = field(&templates.commodity, &self.defaults.commodity);
        let amount = templates
            .amount
            .as_deref()
            .and_then(|t| expand(t).trim().parse::<f64>().ok())
            .filter(|v| v.is_finite())
            .unwrap_or(-0.0);

        Transaction {
            date: today,
            payee,
            postings: vec![
                Posting::new(account_to, Amount::new(commodity, -amount)),
                Posting::new(
                    account_from,
                    Amount::new(self.defaults.commodity.clone(), amount),
                ),
            ],
        }
    }
}
