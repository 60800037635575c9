//! Builder for rule premises.
//!
//! ```rust,ignore
//! use fuzzy_control::dsl::{is, not};
//!
//! // IF temperature IS hot OR humidity IS high AND NOT (wind IS low)
//! let premise = is("temperature", "hot")
//!     .or(is("humidity", "high"))
//!     .and(not(is("wind", "low")));
//! ```
//!
//! Premises are flat: conditions fold strictly left to right, so the example
//! above means `((hot OR high) AND low)` with the negation applied to the
//! whole aggregate at the point `wind` is folded in.

use crate::rules::{Condition, Connective};

#[derive(Clone, Debug, PartialEq)]
pub struct Premise(Vec<Condition>);

/// `variable IS term`
pub fn is(variable: impl Into<String>, term: impl Into<String>) -> Premise {
    Premise(vec![Condition::new(variable, Some(term.into()))])
}

/// `variable IS NOT term`
pub fn is_not(variable: impl Into<String>, term: impl Into<String>) -> Premise {
    let mut condition = Condition::new(variable, Some(term.into()));
    condition.negate_term = true;

    Premise(vec![condition])
}

/// Uses the variable's raw value as the degree.
pub fn value_of(variable: impl Into<String>) -> Premise {
    Premise(vec![Condition::new(variable, None)])
}

/// `NOT (...)`: flags the last condition of `premise` so the aggregate is
/// negated once it has been folded in.
pub fn not(mut premise: Premise) -> Premise {
    if let Some(last) = premise.0.last_mut() {
        last.negate_variable = !last.negate_variable;
    }

    premise
}

impl Premise {
    pub fn and(self, rhs: Premise) -> Self {
        self.join(Connective::And, rhs)
    }

    pub fn or(self, rhs: Premise) -> Self {
        self.join(Connective::Or, rhs)
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.0
    }

    pub fn into_conditions(self) -> Vec<Condition> {
        self.0
    }

    fn join(mut self, connective: Connective, rhs: Premise) -> Self {
        let mut rhs = rhs.0.into_iter();

        if let Some(mut head) = rhs.next() {
            head.connective = connective;
            self.0.push(head);
        }

        self.0.extend(rhs);
        self
    }
}

impl From<Vec<Condition>> for Premise {
    fn from(conditions: Vec<Condition>) -> Self {
        Premise(conditions)
    }
}

#[test]
fn test_premise_is_flat() {
    let premise = is("temperature", "hot")
        .or(is("humidity", "high"))
        .and(not(is_not("wind", "low")));
    let conditions = premise.conditions();

    assert_eq!(conditions.len(), 3);
    assert_eq!(
        conditions.iter().map(|c| c.connective).collect::<Vec<_>>(),
        vec![Connective::None, Connective::Or, Connective::And]
    );
    assert!(conditions[2].negate_variable);
    assert!(conditions[2].negate_term);
    assert!(!conditions[0].negate_variable);
}

#[test]
fn test_value_of_has_no_term() {
    let premise = value_of("enable").and(is("level", "high"));

    assert_eq!(premise.conditions()[0].term, None);
    assert_eq!(premise.conditions()[1].term.as_deref(), Some("high"));
}
