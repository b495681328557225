use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::warn;

use crate::input::LogEntry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterOperator {
    Equals,
    Contains,
    Regex,
    Gt,
    Lt,
    Gte,
    Lte,
}

impl std::str::FromStr for FilterOperator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "equals" | "eq" | "==" => Ok(FilterOperator::Equals),
            "contains" => Ok(FilterOperator::Contains),
            "regex" | "~" => Ok(FilterOperator::Regex),
            "gt" | ">" => Ok(FilterOperator::Gt),
            "lt" | "<" => Ok(FilterOperator::Lt),
            "gte" | ">=" => Ok(FilterOperator::Gte),
            "lte" | "<=" => Ok(FilterOperator::Lte),
            _ => Err(format!("Invalid filter operator: {}", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterPredicate {
    pub field: String,
    pub operator: FilterOperator,
    /// Numbers and booleans in the request are compared by their string form.
    #[serde(deserialize_with = "value_as_string")]
    pub value: String,
}

fn value_as_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    })
}

enum Matcher {
    Equals(String),
    Contains(String),
    Regex(Option<Regex>),
    Numeric(FilterOperator, Option<f64>),
}

struct CompiledPredicate {
    field: String,
    matcher: Matcher,
}

impl CompiledPredicate {
    fn compile(predicate: &FilterPredicate) -> Self {
        let matcher = match predicate.operator {
            FilterOperator::Equals => Matcher::Equals(predicate.value.clone()),
            FilterOperator::Contains => Matcher::Contains(predicate.value.clone()),
            FilterOperator::Regex => match Regex::new(&predicate.value) {
                Ok(re) => Matcher::Regex(Some(re)),
                Err(e) => {
                    warn!(
                        "Filter regex {:?} on field {} is invalid and matches nothing: {}",
                        predicate.value, predicate.field, e
                    );
                    Matcher::Regex(None)
                }
            },
            op => Matcher::Numeric(op, parse_number(&predicate.value)),
        };

        Self {
            field: predicate.field.clone(),
            matcher,
        }
    }

    fn matches(&self, entry: &LogEntry) -> bool {
        let Some(value) = entry.get(&self.field) else {
            return false;
        };

        match &self.matcher {
            Matcher::Equals(expected) => value == expected,
            Matcher::Contains(needle) => value.contains(needle.as_str()),
            Matcher::Regex(re) => re.as_ref().map_or(false, |re| re.is_match(value)),
            Matcher::Numeric(op, threshold) => {
                let (Some(actual), Some(threshold)) = (parse_number(value), *threshold) else {
                    return false;
                };
                match op {
                    FilterOperator::Gt => actual > threshold,
                    FilterOperator::Lt => actual < threshold,
                    FilterOperator::Gte => actual >= threshold,
                    FilterOperator::Lte => actual <= threshold,
                    _ => false,
                }
            }
        }
    }
}

/// Conjunction of predicates, compiled once per run.
pub struct FilterChain {
    predicates: Vec<CompiledPredicate>,
}

impl FilterChain {
    pub fn new(predicates: &[FilterPredicate]) -> Self {
        Self {
            predicates: predicates.iter().map(CompiledPredicate::compile).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    pub fn matches(&self, entry: &LogEntry) -> bool {
        self.predicates.iter().all(|p| p.matches(entry))
    }

    pub fn apply(&self, entries: Vec<LogEntry>) -> Vec<LogEntry> {
        if self.is_empty() {
            return entries;
        }
        entries.into_iter().filter(|e| self.matches(e)).collect()
    }
}

pub fn apply_filters(entries: Vec<LogEntry>, predicates: &[FilterPredicate]) -> Vec<LogEntry> {
    FilterChain::new(predicates).apply(entries)
}

/// Finite numeric reading of a field value; `None` for anything else.
pub fn parse_number(value: &str) -> Option<f64> {
    value.trim().parse::<f64>().ok().filter(|n| n.is_finite())
}
