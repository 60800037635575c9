use log::trace;
use serde::{Deserialize, Serialize};

use crate::dsl::Premise;
use crate::error::{Error, Result};
use crate::math::clamp01;
use crate::model::Model;
use crate::ops::{AccumulationMethod, ActivationMethod, AndMethod, OrMethod};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Connective {
    /// Only valid on the first condition of a rule.
    #[default]
    None,
    And,
    Or,
}

/// One `[NOT] (variable IS [NOT] term)` clause of a rule premise.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub connective: Connective,
    /// Negates the running aggregate right after this condition is folded in.
    pub negate_variable: bool,
    pub variable: String,
    /// Without a term, the variable's raw value is the degree.
    pub term: Option<String>,
    pub negate_term: bool,
}

impl Condition {
    pub fn new(variable: impl Into<String>, term: Option<String>) -> Self {
        Self {
            connective: Connective::None,
            negate_variable: false,
            variable: variable.into(),
            term,
            negate_term: false,
        }
    }

    /// Degree of this clause alone, before it is folded into the premise.
    pub fn degree(&self, model: &Model) -> Result<f64> {
        let var = model.variable_by_name(&self.variable)?;

        let Some(term_name) = &self.term else {
            let value = var
                .value()
                .ok_or_else(|| Error::UndefinedValue(format!("{} has no value", self.variable)))?;

            return Ok(clamp01(value));
        };

        let term = var
            .term(term_name)
            .ok_or_else(|| Error::ReferenceNotFound(format!("term {}.{term_name}", self.variable)))?;
        let degree = term
            .degree()
            .map(clamp01)
            .ok_or_else(|| Error::UndefinedValue(format!("{}.{term_name} was not fuzzified", self.variable)))?;

        Ok(if self.negate_term { 1. - degree } else { degree })
    }
}

/// `THEN variable IS term [WITH weight]`, or a direct-value conclusion
/// when no term is given.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Conclusion {
    pub variable: String,
    pub term: Option<String>,
    weight: f64,
}

impl Conclusion {
    pub fn term(variable: impl Into<String>, term: impl Into<String>) -> Self {
        Self {
            variable: variable.into(),
            term: Some(term.into()),
            weight: 1.,
        }
    }

    pub fn value(variable: impl Into<String>) -> Self {
        Self {
            variable: variable.into(),
            term: None,
            weight: 1.,
        }
    }

    pub fn with_weight(mut self, weight: f64) -> Result<Self> {
        if !(0. ..=1.).contains(&weight) {
            return Err(Error::Configuration(format!(
                "weight {weight} on {} is outside [0, 1]",
                self.variable
            )));
        }

        self.weight = weight;

        Ok(self)
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FuzzyRule {
    id: String,
    conditions: Vec<Condition>,
    conclusions: Vec<Conclusion>,
    #[serde(skip)]
    pub(crate) strength: Option<f64>,
}

impl FuzzyRule {
    pub fn new(
        id: impl Into<String>,
        premise: impl Into<Premise>,
        conclusions: impl IntoIterator<Item = Conclusion>,
    ) -> Result<Self> {
        let rule = Self {
            id: id.into(),
            conditions: premise.into().into_conditions(),
            conclusions: conclusions.into_iter().collect(),
            strength: None,
        };

        rule.check()?;

        Ok(rule)
    }

    pub(crate) fn check(&self) -> Result<()> {
        if self.conditions.is_empty() || self.conclusions.is_empty() {
            return Err(Error::Configuration(format!(
                "rule {} needs at least one condition and one conclusion",
                self.id
            )));
        }

        for (i, condition) in self.conditions.iter().enumerate() {
            let leading = condition.connective == Connective::None;

            if leading != (i == 0) {
                return Err(Error::Configuration(format!(
                    "rule {}: condition {i} has connective {:?}",
                    self.id, condition.connective
                )));
            }
            if condition.negate_term && condition.term.is_none() {
                return Err(Error::Configuration(format!(
                    "rule {}: condition {i} negates a missing term",
                    self.id
                )));
            }
        }

        for conclusion in &self.conclusions {
            // Deserialized conclusions bypass `with_weight`.
            if !(0. ..=1.).contains(&conclusion.weight) {
                return Err(Error::Configuration(format!(
                    "rule {}: weight {} is outside [0, 1]",
                    self.id, conclusion.weight
                )));
            }
        }

        Ok(())
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn conclusions(&self) -> &[Conclusion] {
        &self.conclusions
    }

    /// Strength computed by the last aggregation.
    pub fn strength(&self) -> Option<f64> {
        self.strength
    }

    /// Folds condition degrees strictly left to right. A negated variable
    /// negates everything folded so far, not just its own clause.
    pub fn aggregate(&self, and: AndMethod, or: OrMethod, model: &Model) -> Result<f64> {
        let mut strength: Option<f64> = None;

        for condition in &self.conditions {
            let degree = condition.degree(model)?;
            let folded = match (strength, condition.connective) {
                (None, _) => degree,
                (Some(acc), Connective::And) => and.call(acc, degree),
                (Some(acc), Connective::Or) => or.call(acc, degree),
                (Some(_), Connective::None) => {
                    return Err(Error::Configuration(format!(
                        "rule {}: missing connective before {}",
                        self.id, condition.variable
                    )))
                },
            };

            strength = Some(if condition.negate_variable { 1. - folded } else { folded });
        }

        let strength = strength
            .map(clamp01)
            .ok_or_else(|| Error::Configuration(format!("rule {} has no conditions", self.id)))?;

        trace!("Rule {} strength: {strength}", self.id);

        Ok(strength)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RuleBlock {
    name: String,
    and_method: AndMethod,
    or_method: OrMethod,
    activation_method: Option<ActivationMethod>,
    accumulation_method: AccumulationMethod,
    pub(crate) rules: Vec<FuzzyRule>,
}

impl RuleBlock {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            and_method: AndMethod::Min,
            or_method: OrMethod::Max,
            activation_method: None,
            accumulation_method: AccumulationMethod::Max,
            rules: Vec::new(),
        }
    }

    /// Sets the And method together with its dual Or method.
    pub fn with_and(mut self, method: AndMethod) -> Self {
        self.and_method = method;
        self.or_method = method.dual();
        self
    }

    /// Sets the Or method together with its dual And method.
    pub fn with_or(mut self, method: OrMethod) -> Self {
        self.or_method = method;
        self.and_method = method.dual();
        self
    }

    pub fn with_activation(mut self, method: ActivationMethod) -> Self {
        self.activation_method = Some(method);
        self
    }

    pub fn with_accumulation(mut self, method: AccumulationMethod) -> Self {
        self.accumulation_method = method;
        self
    }

    /// Applies an FCL method tag, e.g. `configure("AND", "PROD")` or
    /// `configure("ACCU", "MAX")`.
    pub fn configure(&mut self, keyword: &str, tag: &str) -> Result<()> {
        match keyword.trim().to_ascii_uppercase().as_str() {
            "AND" => {
                let method: AndMethod = tag.parse()?;

                self.and_method = method;
                self.or_method = method.dual();
            },
            "OR" => {
                let method: OrMethod = tag.parse()?;

                self.or_method = method;
                self.and_method = method.dual();
            },
            "ACT" => self.activation_method = Some(tag.parse()?),
            "ACCU" => self.accumulation_method = tag.parse()?,
            other => {
                return Err(Error::Configuration(format!(
                    "rule block {}: unknown method keyword '{other}'",
                    self.name
                )))
            },
        }

        Ok(())
    }

    pub fn add_rule(&mut self, rule: FuzzyRule) -> Result<()> {
        if self.find_rule(rule.id()).is_some() {
            return Err(Error::Configuration(format!(
                "rule block {} already has a rule {}",
                self.name,
                rule.id()
            )));
        }

        self.rules.push(rule);

        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn and_method(&self) -> AndMethod {
        self.and_method
    }

    pub fn or_method(&self) -> OrMethod {
        self.or_method
    }

    pub fn activation_method(&self) -> Option<ActivationMethod> {
        self.activation_method
    }

    pub fn accumulation_method(&self) -> AccumulationMethod {
        self.accumulation_method
    }

    pub fn rules(&self) -> &[FuzzyRule] {
        &self.rules
    }

    pub fn find_rule(&self, id: &str) -> Option<&FuzzyRule> {
        self.rules.iter().find(|r| r.id == id)
    }
}

#[cfg(test)]
fn fixture() -> Model {
    use crate::terms::MembershipFunction;
    use crate::variable::{DataType, Role};

    let mut model = Model::new();
    let speed = model.add_variable("speed", Role::Input, DataType::Real).unwrap();
    let load = model.add_variable("load", Role::Input, DataType::Real).unwrap();

    for (key, term, degree) in [(speed, "high", 0.75), (load, "heavy", 0.5)] {
        model
            .add_membership_function(key, MembershipFunction::curve(term, [(0., 0.), (1., 1.)]))
            .unwrap();
        model.variable_mut(key).unwrap().terms[term].degree = Some(degree);
    }

    model.variable_mut(load).unwrap().value = Some(1.4);
    model
}

#[test]
fn test_condition_degree() {
    use crate::dsl::{is, is_not, value_of};

    let model = fixture();
    let degree = |premise: Premise| premise.conditions()[0].degree(&model);

    assert_eq!(degree(is("speed", "high")), Ok(0.75));
    assert_eq!(degree(is_not("speed", "high")), Ok(0.25));
    assert_eq!(degree(value_of("load")), Ok(1.));
    assert!(matches!(degree(value_of("speed")), Err(Error::UndefinedValue(_))));
    assert!(matches!(degree(is("speed", "low")), Err(Error::ReferenceNotFound(_))));
    assert!(matches!(degree(is("torque", "low")), Err(Error::ReferenceNotFound(_))));
}

#[test]
fn test_aggregate_uses_block_methods() {
    use crate::dsl::{is, not};

    let model = fixture();
    let rule = FuzzyRule::new(
        "1",
        is("speed", "high").and(is("load", "heavy")),
        [Conclusion::term("speed", "high")],
    )
    .unwrap();

    assert_eq!(rule.aggregate(AndMethod::Min, OrMethod::Max, &model), Ok(0.5));
    assert_eq!(rule.aggregate(AndMethod::Prod, OrMethod::AlgebraicSum, &model), Ok(0.375));
    assert_eq!(rule.aggregate(AndMethod::BoundedDifference, OrMethod::BoundedSum, &model), Ok(0.25));

    let rule = FuzzyRule::new(
        "2",
        not(is("speed", "high")).or(is("load", "heavy")),
        [Conclusion::value("load")],
    )
    .unwrap();

    assert_eq!(rule.aggregate(AndMethod::Min, OrMethod::Max, &model), Ok(0.5));
    assert_eq!(rule.strength(), None);
}

#[test]
fn test_rule_shape_is_checked() {
    let premise = Premise::from(vec![Condition::new("speed", Some("high".to_string()))]);

    assert!(matches!(
        FuzzyRule::new("1", premise.clone(), []),
        Err(Error::Configuration(_))
    ));

    let dangling = Condition::new("load", Some("heavy".to_string()));
    let mut conditions = premise.clone().into_conditions();
    conditions.push(dangling);

    assert!(matches!(
        FuzzyRule::new("2", conditions, [Conclusion::value("load")]),
        Err(Error::Configuration(_))
    ));

    let mut negated = Condition::new("load", None);
    negated.negate_term = true;

    assert!(matches!(
        FuzzyRule::new("3", vec![negated], [Conclusion::value("load")]),
        Err(Error::Configuration(_))
    ));
    assert!(matches!(
        Conclusion::term("speed", "high").with_weight(1.5),
        Err(Error::Configuration(_))
    ));
    assert_eq!(Conclusion::term("speed", "high").with_weight(0.25).map(|c| c.weight()), Ok(0.25));
}

#[test]
fn test_rule_block_configuration() {
    use crate::dsl::is;

    let mut block = RuleBlock::new("main").with_or(OrMethod::BoundedSum);

    assert_eq!(block.and_method(), AndMethod::BoundedDifference);

    block.configure("and", "prod").unwrap();

    assert_eq!((block.and_method(), block.or_method()), (AndMethod::Prod, OrMethod::AlgebraicSum));

    block.configure("ACT", "MIN").unwrap();
    block.configure("ACCU", "NSUM").unwrap();

    assert_eq!(block.activation_method(), Some(ActivationMethod::Min));
    assert_eq!(block.accumulation_method(), AccumulationMethod::NormalizedSum);
    assert!(matches!(block.configure("AND", "MAX"), Err(Error::Configuration(_))));
    assert!(matches!(block.configure("IMPL", "MIN"), Err(Error::Configuration(_))));

    let rule = FuzzyRule::new("1", is("speed", "high"), [Conclusion::value("load")]).unwrap();

    block.add_rule(rule.clone()).unwrap();

    assert!(matches!(block.add_rule(rule), Err(Error::Configuration(_))));
    assert_eq!(block.rules().len(), 1);
    assert!(block.find_rule("1").is_some());
}
