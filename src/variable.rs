use std::ops::RangeInclusive;

use indexmap::IndexMap;
use log::debug;
use serde::{Deserialize, Serialize};
use slotmap::new_key_type;

use crate::curve::{envelope, Curve};
use crate::error::{Error, Result};
use crate::ops::DefuzzificationMethod;
use crate::terms::MembershipFunction;

new_key_type! {
    /// A variable key
    pub struct VariableKey;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Input,
    Output,
    Auxiliary,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    #[default]
    Real,
    Integer,
}

/// What an output publishes when no rule fires for any of its terms.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum DefaultPolicy {
    Value(f64),
    /// Keep the previous value.
    NoChange,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LinguisticVariable {
    name: String,
    role: Role,
    data_type: DataType,
    pub(crate) range: Option<RangeInclusive<f64>>,
    pub(crate) defuzzification: DefuzzificationMethod,
    pub(crate) default_policy: Option<DefaultPolicy>,
    pub(crate) terms: IndexMap<String, MembershipFunction>,
    #[serde(skip)]
    pub(crate) value: Option<f64>,
    #[serde(skip)]
    pub(crate) activation: Option<f64>,
    #[serde(skip)]
    pub(crate) envelope: Curve,
    #[serde(skip)]
    pub(crate) area: Option<f64>,
    #[serde(skip)]
    pub(crate) center: Option<f64>,
}

impl LinguisticVariable {
    pub(crate) fn new(name: String, role: Role, data_type: DataType) -> Self {
        Self {
            name,
            role,
            data_type,
            range: None,
            defuzzification: DefuzzificationMethod::default(),
            default_policy: None,
            terms: IndexMap::new(),
            value: None,
            activation: None,
            envelope: Curve::default(),
            area: None,
            center: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn range(&self) -> Option<&RangeInclusive<f64>> {
        self.range.as_ref()
    }

    pub fn defuzzification_method(&self) -> DefuzzificationMethod {
        self.defuzzification
    }

    pub fn default_policy(&self) -> Option<DefaultPolicy> {
        self.default_policy
    }

    /// Current crisp value; `None` until set or computed.
    pub fn value(&self) -> Option<f64> {
        self.value
    }

    /// Strongest direct-value conclusion asserted this cycle.
    pub fn activation(&self) -> Option<f64> {
        self.activation
    }

    /// Terms in declaration order.
    pub fn terms(&self) -> impl Iterator<Item = &MembershipFunction> {
        self.terms.values()
    }

    pub fn term(&self, name: &str) -> Option<&MembershipFunction> {
        self.terms.get(name)
    }

    pub fn envelope(&self) -> &Curve {
        &self.envelope
    }

    pub fn area(&self) -> Option<f64> {
        self.area
    }

    pub fn center(&self) -> Option<f64> {
        self.center
    }

    pub fn has_curves(&self) -> bool {
        self.terms.values().any(MembershipFunction::is_curve)
    }

    pub fn has_active_terms(&self) -> bool {
        self.terms.values().any(|t| t.is_curve() && t.is_active())
    }

    pub(crate) fn require_range(&self) -> Result<RangeInclusive<f64>> {
        self.range
            .clone()
            .ok_or_else(|| Error::UndefinedValue(format!("{} has no range", self.name)))
    }

    /// Clears every field computed during an evaluation cycle.
    pub(crate) fn reset_cycle(&mut self) {
        self.activation = None;
        self.envelope = Curve::default();
        self.area = None;
        self.center = None;

        for term in self.terms.values_mut() {
            term.degree = None;
            term.activation = None;
            term.clipped = Curve::default();
        }
    }

    /// Rebuilds the envelope as the pointwise maximum of every active term's
    /// clipped curve.
    pub(crate) fn accumulate(&mut self) -> Result<()> {
        let range = self.require_range()?;
        let active: Vec<&Curve> = self
            .terms
            .values()
            .filter(|t| t.is_curve() && t.is_active() && !t.clipped.is_empty())
            .map(|t| &t.clipped)
            .collect();

        if active.is_empty() {
            return Err(Error::ArithmeticDegeneracy(format!(
                "{} has no term with nonzero activation",
                self.name
            )));
        }

        let envelope = envelope(&active, *range.end());

        debug!("Accumulated {}: {} envelope points", self.name, envelope.len());

        self.envelope = envelope;
        self.area = None;
        self.center = None;

        Ok(())
    }

    /// Area and center of the envelope. Publishes the center as the
    /// variable's value only once both are known.
    pub(crate) fn defuzzify(&mut self) -> Result<f64> {
        let range = self.require_range()?;

        if self.envelope.is_empty() {
            return Err(Error::UndefinedValue(format!("{} has not been accumulated", self.name)));
        }

        let area = self.envelope.area(&range);

        if area.is_nan() || area <= 0. {
            return Err(Error::ArithmeticDegeneracy(format!("{} envelope area is {area}", self.name)));
        }

        let center = self
            .envelope
            .center(&range, area)
            .ok_or_else(|| Error::ArithmeticDegeneracy(format!("{} envelope center is undefined", self.name)))?;

        debug!("Defuzzified {}: area={area} center={center}", self.name);

        self.area = Some(area);
        self.center = Some(center);
        self.value = Some(match self.data_type {
            DataType::Real => center,
            DataType::Integer => center.round(),
        });

        Ok(center)
    }
}

#[cfg(test)]
fn output(data_type: DataType) -> LinguisticVariable {
    let mut var = LinguisticVariable::new("flow".to_string(), Role::Output, data_type);

    var.range = Some(0. ..=10.);
    var.terms.insert(
        "low".to_string(),
        MembershipFunction::curve("low", [(0., 1.), (4., 1.), (6., 0.)]),
    );
    var.terms.insert("bias".to_string(), MembershipFunction::singleton("bias", 1.));
    var
}

#[cfg(test)]
fn activate(var: &mut LinguisticVariable, level: f64) {
    use crate::curve::Point;

    let range = var.require_range().unwrap();
    let raw = Curve::new(vec![Point::new(0., 1.), Point::new(4., 1.), Point::new(6., 0.)]).unwrap();
    let term = &mut var.terms["low"];

    term.activation = Some(level);
    term.clipped = raw.clip(level, &range);
}

#[test]
fn test_accumulate_requires_activity() {
    let mut var = output(DataType::Real);

    assert!(var.has_curves());
    assert!(!var.has_active_terms());
    assert!(matches!(var.accumulate(), Err(Error::ArithmeticDegeneracy(_))));
    assert!(matches!(var.defuzzify(), Err(Error::UndefinedValue(_))));

    var.range = None;

    assert!(matches!(var.accumulate(), Err(Error::UndefinedValue(_))));
}

#[test]
fn test_defuzzify_publishes_center() {
    let mut var = output(DataType::Real);

    activate(&mut var, 0.5);
    var.accumulate().unwrap();

    // (0,.5) (4,.5) (5,.5) (6,0): 2.5 + 0.25
    assert_eq!(var.envelope().len(), 4);
    assert_eq!(var.defuzzify(), Ok(2.75));
    assert_eq!(var.area(), Some(2.75));
    assert_eq!(var.value(), Some(2.75));

    var.reset_cycle();

    assert_eq!((var.area(), var.center()), (None, None));
    assert!(var.envelope().is_empty());
    assert_eq!(var.term("low").and_then(MembershipFunction::activation), None);
    assert_eq!(var.value(), Some(2.75));
}

#[test]
fn test_integer_rounding_keeps_exact_center() {
    let mut var = output(DataType::Integer);

    activate(&mut var, 0.5);
    var.accumulate().unwrap();

    assert_eq!(var.defuzzify(), Ok(2.75));
    assert_eq!(var.center(), Some(2.75));
    assert_eq!(var.value(), Some(3.));
}
