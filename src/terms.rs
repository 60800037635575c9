use std::ops::RangeInclusive;

use log::trace;
use serde::{Deserialize, Serialize};

use crate::curve::{first_out_of_order, Breakpoint, Curve, Point};
use crate::error::{Error, Result};
use crate::math::{clamp01, interp};
use crate::model::Model;
use crate::variable::VariableKey;

/// How a term's degree of truth is defined.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Shape {
    /// A literal degree.
    Singleton(f64),
    /// The current value of another variable, used as a degree.
    SingletonRef(String),
    /// A piecewise-linear curve over the owning variable's domain.
    Curve(Vec<Breakpoint>),
}

/// A named term of a linguistic variable.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MembershipFunction {
    name: String,
    pub(crate) variable: VariableKey,
    shape: Shape,
    #[serde(skip)]
    pub(crate) degree: Option<f64>,
    #[serde(skip)]
    pub(crate) activation: Option<f64>,
    #[serde(skip)]
    pub(crate) clipped: Curve,
}

impl MembershipFunction {
    pub fn new(name: impl Into<String>, shape: Shape) -> Self {
        Self {
            name: name.into(),
            variable: VariableKey::default(),
            shape,
            degree: None,
            activation: None,
            clipped: Curve::default(),
        }
    }

    pub fn singleton(name: impl Into<String>, value: f64) -> Self {
        Self::new(name, Shape::Singleton(value))
    }

    pub fn singleton_ref(name: impl Into<String>, variable: impl Into<String>) -> Self {
        Self::new(name, Shape::SingletonRef(variable.into()))
    }

    pub fn curve<B: Into<Breakpoint>>(name: impl Into<String>, points: impl IntoIterator<Item = B>) -> Self {
        Self::new(name, Shape::Curve(points.into_iter().map(Into::into).collect()))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Handle of the owning variable.
    pub fn variable(&self) -> VariableKey {
        self.variable
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn is_curve(&self) -> bool {
        matches!(self.shape, Shape::Curve(_))
    }

    /// Degree computed by the last fuzzification, in [0, 1].
    pub fn degree(&self) -> Option<f64> {
        self.degree
    }

    /// Strongest rule vote asserted on this term in the current cycle.
    pub fn activation(&self) -> Option<f64> {
        self.activation
    }

    pub fn is_active(&self) -> bool {
        self.activation.is_some_and(|level| level > 0.)
    }

    /// The raw curve capped at the activation level.
    pub fn clipped(&self) -> &Curve {
        &self.clipped
    }

    pub(crate) fn push_breakpoint(&mut self, variable: &str, breakpoint: Breakpoint) -> Result<()> {
        let Shape::Curve(points) = &mut self.shape else {
            return Err(Error::Configuration(format!(
                "{variable}.{} is a singleton and takes no breakpoints",
                self.name
            )));
        };

        points.push(breakpoint);

        let literal = check_literal_order(variable, &self.name, points);

        if literal.is_err() {
            points.pop();
        }

        literal
    }

    /// Checks the order of breakpoints whose x is a literal. Referenced
    /// coordinates are checked once resolved.
    pub(crate) fn check_literals(&self, variable: &str) -> Result<()> {
        match &self.shape {
            Shape::Curve(points) => check_literal_order(variable, &self.name, points),
            Shape::Singleton(_) | Shape::SingletonRef(_) => Ok(()),
        }
    }

    /// Resolves every breakpoint against the model and checks that the
    /// resulting x coordinates never decrease.
    pub fn verify(&self, variable: &str, model: &Model) -> Result<Curve> {
        let Shape::Curve(breakpoints) = &self.shape else {
            return Ok(Curve::default());
        };
        let points = breakpoints
            .iter()
            .map(|bp| bp.resolve(model))
            .collect::<Result<Vec<Point>>>()?;

        Curve::new(points).map_err(|index| Error::OrderingViolation {
            variable: variable.to_string(),
            term: self.name.clone(),
            index,
        })
    }

    /// Degree of truth of `value` for this term, clamped to [0, 1].
    pub fn fuzzify(&self, variable: &str, value: f64, model: &Model) -> Result<f64> {
        let degree = match &self.shape {
            Shape::Singleton(degree) => *degree,
            Shape::SingletonRef(name) => model.value_of(name)?,
            Shape::Curve(_) => {
                let curve = self.verify(variable, model)?;

                interp(value, curve.points().iter().map(|p| (p.x, p.y))).ok_or_else(|| {
                    Error::UndefinedValue(format!(
                        "{variable}.{} has no breakpoint covering {value}",
                        self.name
                    ))
                })?
            },
        };
        let degree = clamp01(degree);

        trace!("Fuzzified {variable}.{} at {value}: {degree}", self.name);

        Ok(degree)
    }

    /// Verifies the curve and caps it at the current activation level.
    ///
    /// Inactive terms and singletons end up with an empty clipped curve.
    pub fn compute_activation(&self, variable: &str, range: &RangeInclusive<f64>, model: &Model) -> Result<Curve> {
        let level = match self.activation {
            Some(level) if level > 0. && self.is_curve() => level,
            _ => return Ok(Curve::default()),
        };
        let clipped = self.verify(variable, model)?.clip(level, range);

        trace!(
            "Clipped {variable}.{} at {level}: {} points",
            self.name,
            clipped.len()
        );

        Ok(clipped)
    }
}

fn check_literal_order(variable: &str, term: &str, points: &[Breakpoint]) -> Result<()> {
    let literals: Vec<(usize, f64)> = points
        .iter()
        .enumerate()
        .filter_map(|(i, bp)| bp.x.literal().map(|x| (i, x)))
        .collect();

    match first_out_of_order(literals.iter().map(|(_, x)| *x)) {
        Some(pos) => Err(Error::OrderingViolation {
            variable: variable.to_string(),
            term: term.to_string(),
            index: literals[pos].0,
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
fn fixture() -> Model {
    use crate::variable::{DataType, Role};

    let mut model = Model::new();
    let level = model.add_variable("level", Role::Auxiliary, DataType::Real).unwrap();

    model.variable_mut(level).unwrap().value = Some(0.4);
    model
}

#[test]
fn test_fuzzify_piecewise_cases() {
    let model = fixture();
    let warm = MembershipFunction::curve("warm", [(10., 0.), (20., 1.), (30., 0.)]);

    assert_eq!(warm.fuzzify("t", 15., &model), Ok(0.5));
    assert_eq!(warm.fuzzify("t", 20., &model), Ok(1.));
    // Only one bound found: the end degree holds.
    assert_eq!(warm.fuzzify("t", 40., &model), Ok(0.));
    assert_eq!(warm.fuzzify("t", 0., &model), Ok(0.));

    let shoulder = MembershipFunction::curve("hot", [(0., 0.), (10., 1.5)]);

    assert_eq!(shoulder.fuzzify("t", 50., &model), Ok(1.));
}

#[test]
fn test_fuzzify_singletons() {
    let model = fixture();

    assert_eq!(MembershipFunction::singleton("s", 1.7).fuzzify("t", 3., &model), Ok(1.));
    assert_eq!(MembershipFunction::singleton_ref("s", "level").fuzzify("t", 3., &model), Ok(0.4));
    assert!(matches!(
        MembershipFunction::singleton_ref("s", "missing").fuzzify("t", 3., &model),
        Err(Error::ReferenceNotFound(_))
    ));
}

#[test]
fn test_flat_single_point_is_constant() {
    let model = fixture();
    let flat = MembershipFunction::curve("flat", [(5., 0.35)]);

    for value in [-100., 0., 4.999, 5., 5.001, 1e9] {
        assert_eq!(flat.fuzzify("t", value, &model), Ok(0.35));
    }
}

#[test]
fn test_referenced_breakpoints_resolve_at_evaluation() {
    let mut model = fixture();
    let edge = MembershipFunction::curve(
        "edge",
        [Breakpoint::new(0., 0.), Breakpoint::new(10., "level")],
    );

    assert_eq!(edge.fuzzify("t", 10., &model), Ok(0.4));

    let key = model.find_variable("level").unwrap();
    model.variable_mut(key).unwrap().value = None;

    assert!(matches!(edge.fuzzify("t", 10., &model), Err(Error::UndefinedValue(_))));
}

#[test]
fn test_resolved_ordering_violation() {
    let mut model = fixture();
    let key = model.find_variable("level").unwrap();
    model.variable_mut(key).unwrap().value = Some(12.);

    let term = MembershipFunction::curve(
        "moving",
        [Breakpoint::new(0., 0.), Breakpoint::new("level", 1.), Breakpoint::new(10., 0.)],
    );

    assert_eq!(
        term.fuzzify("t", 5., &model),
        Err(Error::OrderingViolation {
            variable: "t".to_string(),
            term: "moving".to_string(),
            index: 2,
        })
    );
}

#[test]
fn test_push_breakpoint_rejects_disorder() {
    let mut term = MembershipFunction::curve("t", [(0., 0.), (5., 1.)]);

    assert!(term.push_breakpoint("v", (7., 0.).into()).is_ok());
    assert!(matches!(
        term.push_breakpoint("v", (6., 0.).into()),
        Err(Error::OrderingViolation { index: 3, .. })
    ));
    let expected: Vec<Breakpoint> = vec![(0., 0.).into(), (5., 1.).into(), (7., 0.).into()];

    assert_eq!(term.shape(), &Shape::Curve(expected));
}
