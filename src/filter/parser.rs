//! Filter parser for contact and deal listings
//!
//! # Grammar
//!
//! ```text
//! filter := term | filter "or" term | "not" term
//! term := stage=<stage>[,<stage>] | source=<name> | min=<n> | max=<n>
//!       | amount<op><n> | probability<op><n> | +text
//! ```
//!
//! # Precedence
//!
//! 1. `not` (highest)
//! 2. Implicit `and` (between adjacent terms)
//! 3. `or` (lowest)
//!
//! # Examples
//!
//! ```text
//! stage=offre,negociation min=200000
//! +lyon or source=seloger
//! not stage=perdu
//! ```

use crate::filter::evaluator::FilterExpr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOp {
    Eq,
    Neq,
    Gt,
    Lt,
    Gte,
    Lte,
}

impl ComparisonOp {
    pub fn compare(&self, left: i64, right: i64) -> bool {
        match self {
            ComparisonOp::Eq => left == right,
            ComparisonOp::Neq => left != right,
            ComparisonOp::Gt => left > right,
            ComparisonOp::Lt => left < right,
            ComparisonOp::Gte => left >= right,
            ComparisonOp::Lte => left <= right,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            ComparisonOp::Eq => "=",
            ComparisonOp::Neq => "!=",
            ComparisonOp::Gt => ">",
            ComparisonOp::Lt => "<",
            ComparisonOp::Gte => ">=",
            ComparisonOp::Lte => "<=",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FilterTerm {
    /// Any of the listed stage values
    Stage(Vec<String>),
    /// Any of the listed lead sources (case-insensitive)
    Source(Vec<String>),
    /// Amount (deals) or budget (contacts)
    Amount(ComparisonOp, i64),
    Probability(ComparisonOp, i64),
    /// Case-insensitive substring over the entity's text fields
    Text(String),
}

#[derive(Debug, Clone)]
enum FilterToken {
    Term(FilterTerm),
    Not,
    Or,
}

const FILTER_KEYS: &[&str] = &["stage", "source", "min", "max", "amount", "probability"];

/// Parse filter tokens into a [`FilterExpr`]. No tokens match everything.
pub fn parse_filter(tokens: Vec<String>) -> Result<FilterExpr, String> {
    if tokens.is_empty() {
        return Ok(FilterExpr::All);
    }

    let mut parsed = Vec::with_capacity(tokens.len());
    for token in &tokens {
        match token.as_str() {
            "or" => parsed.push(FilterToken::Or),
            "not" => parsed.push(FilterToken::Not),
            _ => parsed.push(FilterToken::Term(parse_filter_term(token)?)),
        }
    }
    build_expression(parsed)
}

fn split_on_operator(token: &str) -> Option<(String, ComparisonOp, String)> {
    let op_start = token.find(['=', '>', '<', '!'])?;
    let key = &token[..op_start];
    if key.is_empty() {
        return None;
    }
    let rest = &token[op_start..];
    let (op, op_len) = if rest.starts_with(">=") {
        (ComparisonOp::Gte, 2)
    } else if rest.starts_with("<=") {
        (ComparisonOp::Lte, 2)
    } else if rest.starts_with("!=") || rest.starts_with("<>") {
        (ComparisonOp::Neq, 2)
    } else if rest.starts_with('=') {
        (ComparisonOp::Eq, 1)
    } else if rest.starts_with('>') {
        (ComparisonOp::Gt, 1)
    } else if rest.starts_with('<') {
        (ComparisonOp::Lt, 1)
    } else {
        return None;
    };
    Some((key.to_lowercase(), op, rest[op_len..].to_string()))
}

fn parse_number(key: &str, value: &str) -> Result<i64, String> {
    value
        .trim()
        .replace('_', "")
        .parse::<i64>()
        .map_err(|_| format!("Filter '{}' expects a whole number, got '{}'", key, value))
}

fn list_values(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|v| v.trim().to_lowercase())
        .filter(|v| !v.is_empty())
        .collect()
}

fn parse_filter_term(token: &str) -> Result<FilterTerm, String> {
    if let Some(text) = token.strip_prefix('+') {
        if text.is_empty() {
            return Err("Empty text filter '+'".to_string());
        }
        return Ok(FilterTerm::Text(text.to_lowercase()));
    }

    let Some((key, op, value)) = split_on_operator(token) else {
        return Err(format!("Invalid filter token: {}", token));
    };
    if !FILTER_KEYS.contains(&key.as_str()) {
        return Err(format!(
            "Unknown filter field '{}'. Known fields: {}",
            key,
            FILTER_KEYS.join(", ")
        ));
    }

    let eq_only = |name: &str| -> Result<(), String> {
        if op == ComparisonOp::Eq {
            Ok(())
        } else {
            Err(format!("{} filter only supports '=', got '{}'", name, op.as_str()))
        }
    };

    match key.as_str() {
        "stage" => {
            eq_only("Stage")?;
            let values = list_values(&value);
            if values.is_empty() {
                return Err("Stage filter needs at least one value".to_string());
            }
            Ok(FilterTerm::Stage(values))
        }
        "source" => {
            eq_only("Source")?;
            Ok(FilterTerm::Source(list_values(&value)))
        }
        "min" => {
            eq_only("Min")?;
            Ok(FilterTerm::Amount(ComparisonOp::Gte, parse_number(&key, &value)?))
        }
        "max" => {
            eq_only("Max")?;
            Ok(FilterTerm::Amount(ComparisonOp::Lte, parse_number(&key, &value)?))
        }
        "amount" => Ok(FilterTerm::Amount(op, parse_number(&key, &value)?)),
        "probability" => Ok(FilterTerm::Probability(op, parse_number(&key, &value)?)),
        _ => Err(format!("Invalid filter token: {}", token)),
    }
}

/// Precedence: not > and > or
fn build_expression(tokens: Vec<FilterToken>) -> Result<FilterExpr, String> {
    let mut or_groups: Vec<Vec<FilterExpr>> = vec![Vec::new()];
    let mut negate = false;

    for token in tokens {
        match token {
            FilterToken::Not => {
                if negate {
                    return Err("NOT operator must be followed by a term".to_string());
                }
                negate = true;
            }
            FilterToken::Or => {
                if negate {
                    return Err("NOT operator must be followed by a term".to_string());
                }
                if or_groups.last().is_some_and(|g| g.is_empty()) {
                    return Err("OR operator needs a term on both sides".to_string());
                }
                or_groups.push(Vec::new());
            }
            FilterToken::Term(term) => {
                let expr = FilterExpr::Term(term);
                let expr = if negate { FilterExpr::Not(Box::new(expr)) } else { expr };
                negate = false;
                if let Some(group) = or_groups.last_mut() {
                    group.push(expr);
                }
            }
        }
    }
    if negate {
        return Err("NOT operator requires a following term".to_string());
    }
    if or_groups.last().is_some_and(|g| g.is_empty()) {
        return Err("OR operator needs a term on both sides".to_string());
    }

    let mut or_exprs: Vec<FilterExpr> = or_groups
        .into_iter()
        .map(|mut group| {
            if group.len() == 1 {
                group.remove(0)
            } else {
                FilterExpr::And(group)
            }
        })
        .collect();
    if or_exprs.len() == 1 {
        Ok(or_exprs.remove(0))
    } else {
        Ok(FilterExpr::Or(or_exprs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(tokens: &[&str]) -> Result<FilterExpr, String> {
        parse_filter(tokens.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn test_empty_matches_all() {
        assert!(matches!(parse(&[]).unwrap(), FilterExpr::All));
    }

    #[test]
    fn test_terms() {
        match parse(&["stage=Offre,negociation"]).unwrap() {
            FilterExpr::Term(FilterTerm::Stage(values)) => {
                assert_eq!(values, vec!["offre".to_string(), "negociation".to_string()])
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(
            parse(&["min=200_000"]).unwrap(),
            FilterExpr::Term(FilterTerm::Amount(ComparisonOp::Gte, 200000))
        ));
        assert!(matches!(
            parse(&["probability>=50"]).unwrap(),
            FilterExpr::Term(FilterTerm::Probability(ComparisonOp::Gte, 50))
        ));
        assert!(matches!(
            parse(&["+Lyon"]).unwrap(),
            FilterExpr::Term(FilterTerm::Text(ref t)) if t == "lyon"
        ));
    }

    #[test]
    fn test_precedence() {
        let expr = parse(&["not", "stage=perdu", "min=1", "or", "+lyon"]).unwrap();
        match expr {
            FilterExpr::Or(groups) => {
                assert_eq!(groups.len(), 2);
                match &groups[0] {
                    FilterExpr::And(terms) => {
                        assert!(matches!(terms[0], FilterExpr::Not(_)));
                        assert_eq!(terms.len(), 2);
                    }
                    other => panic!("unexpected {:?}", other),
                }
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_errors() {
        assert!(parse(&["color=red"]).unwrap_err().contains("Unknown filter field"));
        assert!(parse(&["min=beaucoup"]).unwrap_err().contains("whole number"));
        assert!(parse(&["stage>offre"]).unwrap_err().contains("only supports"));
        assert!(parse(&["not"]).is_err());
        assert!(parse(&["or", "+x"]).is_err());
        assert!(parse(&["+x", "or"]).is_err());
        assert!(parse(&["lyon"]).unwrap_err().contains("Invalid filter token"));
    }
}
