// src/classify.rs
//! Ordered-rule classifier: the table is evaluated top to bottom and the
//! first rule whose predicate fires (and whose exclusion does not) decides
//! the outcome. Classification is a total function: unmatched or
//! unparseable input falls through to the default "no match" result.

use regex::Regex;
use serde::Serialize;

use crate::price;

/// Outcome of classifying one text block.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationResult {
    pub matched: bool,
    pub category_key: String,
    pub title: String,
    /// Populated iff the extractor found at least one plausible candidate,
    /// regardless of whether the rule matched.
    pub price: Option<f64>,
    pub reason: String,
}

impl ClassificationResult {
    fn no_match(price: Option<f64>) -> Self {
        Self {
            matched: false,
            category_key: "none".into(),
            title: "no match".into(),
            price,
            reason: "no match".into(),
        }
    }
}

/// Keyword/pattern groups that must all be present (`All`) or any be present
/// (`Any`).
#[derive(Debug)]
pub enum Predicate {
    All(Vec<Regex>),
    Any(Vec<Regex>),
}

impl Predicate {
    pub fn is_match(&self, text: &str) -> bool {
        match self {
            Predicate::All(res) => res.iter().all(|re| re.is_match(text)),
            Predicate::Any(res) => res.iter().any(|re| re.is_match(text)),
        }
    }
}

/// Price cap tier selected by the advertised fan count (case rule).
#[derive(Debug, Clone, Copy)]
pub struct FanTier {
    pub min_fans: u32,
    pub max_price: f64,
}

/// Price policy of an alerting rule. Bands are half-open `[low, high)`:
/// below `low` the capture is implausible (stripped percentage, coupon
/// value), at or above `high` the item is too expensive.
#[derive(Debug)]
pub enum PricePolicy {
    /// Category alerts whenever matched, priced or not.
    Always,
    Band { low: f64, high: f64 },
    /// Tiers sorted by descending `min_fans`; first tier the fan count
    /// reaches sets the cap.
    FanTiered(Vec<FanTier>),
}

#[derive(Debug)]
pub enum RuleAction {
    /// Hard veto: the category is permanently excluded.
    Block { reason: &'static str },
    Price(PricePolicy),
}

pub struct Rule {
    pub key: &'static str,
    pub title: &'static str,
    pub predicate: Predicate,
    pub exclude: Option<Predicate>,
    pub action: RuleAction,
}

/// Counts fans advertised per rule table conventions ("3 fans", "4x120mm").
pub type FanCounter = fn(&str) -> u32;

pub struct Classifier {
    rules: Vec<Rule>,
    count_fans: FanCounter,
}

impl Classifier {
    pub fn new(rules: Vec<Rule>, count_fans: FanCounter) -> Self {
        Self { rules, count_fans }
    }

    /// Classifier with the built-in rule table. Pattern-compilation errors
    /// are a startup-time fatal condition, never a per-call error.
    pub fn builtin() -> anyhow::Result<Self> {
        Ok(Self::new(crate::rules::builtin_rules()?, crate::rules::count_fans))
    }

    /// Evaluate `text` against the ordered table. Deterministic: for a text
    /// matching several predicates, the earliest rule always decides.
    pub fn classify(&self, text: &str) -> ClassificationResult {
        let price = price::extract(text);

        for rule in &self.rules {
            if !rule.predicate.is_match(text) {
                continue;
            }
            if let Some(ex) = &rule.exclude {
                if ex.is_match(text) {
                    continue;
                }
            }
            return self.apply(rule, text, price);
        }
        ClassificationResult::no_match(price)
    }

    fn apply(&self, rule: &Rule, text: &str, price: Option<f64>) -> ClassificationResult {
        let mut out = ClassificationResult {
            matched: false,
            category_key: rule.key.into(),
            title: rule.title.into(),
            price,
            reason: String::new(),
        };

        let policy = match &rule.action {
            RuleAction::Block { reason } => {
                out.reason = (*reason).into();
                return out;
            }
            RuleAction::Price(p) => p,
        };

        match policy {
            PricePolicy::Always => {
                out.matched = true;
                out.reason = "category match".into();
            }
            PricePolicy::Band { low, high } => match price {
                // Fail closed: a priced category never alerts without a price.
                None => out.reason = "no price".into(),
                Some(v) if v < *low => {
                    out.reason = format!("implausible price (< {low})");
                }
                Some(v) if v < *high => {
                    out.matched = true;
                    out.reason = format!("< {high}");
                }
                Some(_) => out.reason = format!(">= {high}"),
            },
            PricePolicy::FanTiered(tiers) => {
                let fans = (self.count_fans)(text);
                match (price, tiers.iter().find(|t| fans >= t.min_fans)) {
                    (None, _) => out.reason = "no price".into(),
                    (_, None) => out.reason = format!("{fans} fans below tiers"),
                    (Some(v), Some(t)) if v <= t.max_price => {
                        out.matched = true;
                        out.reason = format!("{fans} fans, <= {}", t.max_price);
                    }
                    (Some(_), Some(t)) => {
                        out.reason = format!("{fans} fans, > {}", t.max_price);
                    }
                }
            }
        }
        out
    }
}
