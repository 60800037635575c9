use std::collections::HashMap;

use log::{debug, trace};

use crate::error::{Error, Result};
use crate::inputs::Inputs;
use crate::math::clamp01;
use crate::model::Model;
use crate::outputs::Outputs;
use crate::variable::{DefaultPolicy, Role, VariableKey};

/// Drives evaluation cycles over a [`Model`].
///
/// Every phase of a cycle is exposed on its own so callers can inspect the
/// intermediate state; [`Engine::run_cycle`] chains them in order.
#[derive(Clone, Debug)]
pub struct Engine {
    model: Model,
    cycle: u64,
}

impl Engine {
    pub fn new(model: Model) -> Self {
        Self { model, cycle: 0 }
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut Model {
        &mut self.model
    }

    pub fn into_model(self) -> Model {
        self.model
    }

    /// Number of cycles started so far.
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    /// Sets the value of an input or auxiliary variable.
    ///
    /// An auxiliary concluded by rules starts each cycle from the value it
    /// holds, which the conclusions then scale by their strengths.
    pub fn set_input(&mut self, name: &str, value: f64) -> Result<()> {
        let key = self
            .model
            .find_variable(name)
            .ok_or_else(|| Error::ReferenceNotFound(format!("variable {name}")))?;

        self.assign(key, value)
    }

    fn assign(&mut self, key: VariableKey, value: f64) -> Result<()> {
        let var = self.model.lookup_mut(key)?;

        if var.role() == Role::Output {
            return Err(Error::Configuration(format!("{} is an output and cannot be set", var.name())));
        }

        var.value = Some(value);

        Ok(())
    }

    /// Current value of an output variable.
    pub fn get_output(&self, name: &str) -> Result<f64> {
        let var = self.model.variable_by_name(name)?;

        if var.role() != Role::Output {
            return Err(Error::Configuration(format!("{name} is not an output")));
        }

        var.value()
            .ok_or_else(|| Error::UndefinedValue(format!("{name} has not been computed")))
    }

    /// Computes the degree of every term of an input variable at its current
    /// value.
    pub fn fuzzify(&mut self, key: VariableKey) -> Result<()> {
        let var = self.model.lookup(key)?;

        if var.role() != Role::Input {
            return Err(Error::Configuration(format!("{} is not an input", var.name())));
        }

        let value = var
            .value()
            .ok_or_else(|| Error::UndefinedValue(format!("{} has no input value", var.name())))?;
        let degrees = var
            .terms()
            .map(|term| term.fuzzify(var.name(), value, &self.model))
            .collect::<Result<Vec<f64>>>()?;

        for (term, degree) in self.model.lookup_mut(key)?.terms.values_mut().zip(degrees) {
            term.degree = Some(degree);
        }

        Ok(())
    }

    pub fn fuzzify_all(&mut self) -> Result<()> {
        for key in self.model.keys_with_role(Role::Input) {
            self.fuzzify(key)?;
        }

        Ok(())
    }

    /// Recomputes the strength of every rule.
    pub fn aggregate(&mut self) -> Result<()> {
        let strengths = self
            .model
            .rule_blocks()
            .map(|block| {
                block
                    .rules()
                    .iter()
                    .map(|rule| rule.aggregate(block.and_method(), block.or_method(), &self.model))
                    .collect::<Result<Vec<f64>>>()
            })
            .collect::<Result<Vec<_>>>()?;

        for (block, strengths) in self.model.rule_blocks.values_mut().zip(strengths) {
            for (rule, strength) in block.rules.iter_mut().zip(strengths) {
                rule.strength = Some(strength);
            }
        }

        Ok(())
    }

    /// Asserts every rule's strength on its conclusions. Each term ends up
    /// with the strongest vote cast for it this cycle.
    pub fn activate(&mut self) -> Result<()> {
        let mut assertions = Vec::new();

        for block in self.model.rule_blocks() {
            for rule in block.rules() {
                let strength = rule
                    .strength()
                    .ok_or_else(|| Error::UndefinedValue(format!("rule {} has not been aggregated", rule.id())))?;

                for conclusion in rule.conclusions() {
                    let key = self
                        .model
                        .find_variable(&conclusion.variable)
                        .ok_or_else(|| Error::ReferenceNotFound(format!("variable {}", conclusion.variable)))?;

                    assertions.push((key, conclusion.term.clone(), strength));
                }
            }
        }

        // Pass 1: forget whatever the previous cycle asserted. Auxiliaries
        // keep their value.
        for (key, term, _) in &assertions {
            let var = self.model.lookup_mut(*key)?;

            match term {
                Some(name) => {
                    let var_name = var.name().to_string();
                    let mf = var
                        .terms
                        .get_mut(name)
                        .ok_or_else(|| Error::ReferenceNotFound(format!("term {var_name}.{name}")))?;

                    mf.activation = None;
                },
                None if var.role() == Role::Input => {
                    return Err(Error::Configuration(format!(
                        "{} is an input and cannot be concluded",
                        var.name()
                    )))
                },
                None => {
                    if var.role() == Role::Output {
                        var.value = None;
                    }
                    var.activation = None;
                },
            }
        }

        // Pass 2
        for (key, term, strength) in assertions {
            let var = self.model.lookup_mut(key)?;

            match term {
                Some(name) => {
                    if let Some(mf) = var.terms.get_mut(&name) {
                        let level = match mf.activation {
                            None => strength,
                            Some(level) => level.max(strength),
                        };

                        mf.activation = Some(clamp01(level));
                    }
                },
                None => {
                    let value = match var.value {
                        None => clamp01(strength),
                        Some(value) => clamp01(value * strength),
                    };

                    var.value = Some(value);
                    var.activation = Some(clamp01(var.activation.map_or(value, |prev| prev.max(value))));

                    trace!("Asserted {} = {value}", var.name());
                },
            }
        }

        Ok(())
    }

    /// Clips every curve term of an output variable at its activation level.
    pub fn compute_activation(&mut self, key: VariableKey) -> Result<()> {
        let var = self.model.lookup(key)?;
        let range = var.require_range()?;
        let clipped = var
            .terms()
            .map(|term| term.compute_activation(var.name(), &range, &self.model))
            .collect::<Result<Vec<_>>>()?;

        for (term, curve) in self.model.lookup_mut(key)?.terms.values_mut().zip(clipped) {
            term.clipped = curve;
        }

        Ok(())
    }

    /// Builds the envelope of an output variable from its clipped terms.
    pub fn accumulate(&mut self, key: VariableKey) -> Result<()> {
        self.model.lookup_mut(key)?.accumulate()
    }

    /// Publishes the center of area of the accumulated envelope.
    pub fn defuzzify(&mut self, key: VariableKey) -> Result<f64> {
        self.model.lookup_mut(key)?.defuzzify()
    }

    /// Runs one complete evaluation over the current input values.
    pub fn run_cycle(&mut self) -> Result<()> {
        self.cycle += 1;
        debug!("Starting cycle {}", self.cycle);

        self.model.reset_cycle();
        self.fuzzify_all()?;
        self.aggregate()?;
        self.activate()?;

        for key in self.model.keys_with_role(Role::Output) {
            if !self.model.lookup(key)?.has_curves() {
                continue;
            }

            self.compute_activation(key)?;

            if self.model.lookup(key)?.has_active_terms() {
                self.accumulate(key)?;
                self.defuzzify(key)?;
                continue;
            }

            let var = self.model.lookup_mut(key)?;

            match var.default_policy() {
                Some(DefaultPolicy::Value(value)) => {
                    debug!("No rule fired for {}, using default {value}", var.name());
                    var.value = Some(value);
                },
                Some(DefaultPolicy::NoChange) => {
                    debug!("No rule fired for {}, keeping {:?}", var.name(), var.value);
                },
                None => {
                    return Err(Error::ArithmeticDegeneracy(format!(
                        "{} has no term with nonzero activation",
                        var.name()
                    )))
                },
            }
        }

        Ok(())
    }

    /// Assigns `inputs`, runs a cycle and snapshots every output value.
    pub fn run(&mut self, inputs: &Inputs) -> Result<Outputs> {
        for (key, value) in &inputs.0 {
            self.assign(*key, *value)?;
        }

        self.run_cycle()?;

        let values: HashMap<VariableKey, f64> = self
            .model
            .variables()
            .filter(|(_, var)| var.role() == Role::Output)
            .filter_map(|(key, var)| var.value().map(|value| (key, value)))
            .collect();

        Ok(Outputs::new(values, self.cycle))
    }
}

#[cfg(test)]
fn close(actual: f64, expected: f64) -> bool {
    (actual - expected).abs() < 1e-9
}

#[cfg(test)]
fn fan_controller() -> Model {
    use crate::dsl::is;
    use crate::rules::{Conclusion, FuzzyRule, RuleBlock};
    use crate::terms::MembershipFunction;
    use crate::variable::DataType;

    let mut model = Model::new();
    let temperature = model.add_variable("temperature", Role::Input, DataType::Real).unwrap();
    let humidity = model.add_variable("humidity", Role::Input, DataType::Real).unwrap();
    let fan_speed = model.add_variable("fan_speed", Role::Output, DataType::Real).unwrap();

    model.set_range(temperature, 0. ..=50.).unwrap();
    model.set_range(humidity, 0. ..=100.).unwrap();
    model.set_range(fan_speed, 0. ..=100.).unwrap();

    for (key, name, points) in [
        (temperature, "cold", [(0., 1.), (10., 1.), (20., 0.)]),
        (temperature, "warm", [(13., 0.), (23., 1.), (33., 0.)]),
        (temperature, "hot", [(15., 0.), (40., 1.), (50., 1.)]),
        (humidity, "low", [(0., 1.), (30., 1.), (60., 0.)]),
        (humidity, "high", [(40., 0.), (90., 1.), (100., 1.)]),
        (fan_speed, "slow", [(0., 1.), (25., 1.), (50., 0.)]),
        (fan_speed, "medium", [(25., 0.), (50., 1.), (75., 0.)]),
        (fan_speed, "fast", [(50., 0.), (75., 1.), (100., 1.)]),
    ] {
        model
            .add_membership_function(key, MembershipFunction::curve(name, points))
            .unwrap();
    }

    let mut block = RuleBlock::new("fan");

    block
        .add_rule(
            FuzzyRule::new(
                "1",
                is("temperature", "hot").or(is("humidity", "high")),
                [Conclusion::term("fan_speed", "fast")],
            )
            .unwrap(),
        )
        .unwrap();
    block
        .add_rule(
            FuzzyRule::new(
                "2",
                is("temperature", "warm").and(is("humidity", "high")),
                [Conclusion::term("fan_speed", "medium")],
            )
            .unwrap(),
        )
        .unwrap();
    block
        .add_rule(
            FuzzyRule::new(
                "3",
                is("temperature", "cold").and(is("humidity", "low")),
                [Conclusion::term("fan_speed", "slow")],
            )
            .unwrap(),
        )
        .unwrap();
    model.add_rule_block(block).unwrap();
    model.validate().unwrap();
    model
}

/// level IS high => valve IS open, over 0..10 on both sides.
#[cfg(test)]
fn valve_controller(data_type: crate::variable::DataType) -> Model {
    use crate::dsl::is;
    use crate::rules::{Conclusion, FuzzyRule, RuleBlock};
    use crate::terms::MembershipFunction;
    use crate::variable::DataType;

    let mut model = Model::new();
    let level = model.add_variable("level", Role::Input, DataType::Real).unwrap();
    let valve = model.add_variable("valve", Role::Output, data_type).unwrap();

    model.set_range(level, 0. ..=10.).unwrap();
    model.set_range(valve, 0. ..=10.).unwrap();
    model
        .add_membership_function(level, MembershipFunction::curve("high", [(0., 0.), (10., 1.)]))
        .unwrap();
    model
        .add_membership_function(valve, MembershipFunction::curve("open", [(0., 0.), (10., 1.)]))
        .unwrap();
    model.add_rule_block(RuleBlock::new("main")).unwrap();
    model
        .add_rule(
            "main",
            FuzzyRule::new("1", is("level", "high"), [Conclusion::term("valve", "open")]).unwrap(),
        )
        .unwrap();
    model
}

#[test]
fn test_fan_speed() {
    use pretty_assertions::assert_eq;

    let mut engine = Engine::new(fan_controller());

    engine.set_input("temperature", 30.).unwrap();
    engine.set_input("humidity", 70.).unwrap();
    engine.run_cycle().unwrap();

    let model = engine.model();
    let block = model.find_rule_block("fan").unwrap();

    assert!(close(block.find_rule("1").unwrap().strength().unwrap(), 0.6));
    assert!(close(block.find_rule("2").unwrap().strength().unwrap(), 0.3));
    assert_eq!(block.find_rule("3").unwrap().strength(), Some(0.));

    let fan = model.variable_by_name("fan_speed").unwrap();
    let expected = [
        (25., 0.),
        (32.5, 0.3),
        (50., 0.3),
        (57.5, 0.3),
        (65., 0.6),
        (67.5, 0.6),
        (75., 0.6),
        (100., 0.6),
    ];

    assert_eq!(fan.envelope().len(), expected.len());
    for (point, (x, y)) in fan.envelope().points().iter().zip(expected) {
        assert!(close(point.x, x) && close(point.y, y), "{point:?} != ({x}, {y})");
    }
    assert!(close(fan.area().unwrap(), 33.));
    assert!(close(engine.get_output("fan_speed").unwrap(), 72.5));
    assert!(fan.envelope().points().iter().all(|p| p.y <= 0.6 + 1e-12));
}

#[test]
fn test_fan_speed_extremes() {
    use pretty_assertions::assert_eq;

    let mut engine = Engine::new(fan_controller());

    for (temperature, humidity, speed) in [(5., 10., 18.75), (45., 95., 81.25)] {
        engine.set_input("temperature", temperature).unwrap();
        engine.set_input("humidity", humidity).unwrap();
        engine.run_cycle().unwrap();

        let fan = engine.model().variable_by_name("fan_speed").unwrap();

        assert!(close(fan.area().unwrap(), 37.5));
        assert!(close(engine.get_output("fan_speed").unwrap(), speed));
    }

    assert_eq!(engine.cycle(), 2);
}

#[test]
fn test_runs_are_deterministic() {
    use pretty_assertions::assert_eq;

    let model = fan_controller();
    let temperature = model.find_variable("temperature").unwrap();
    let humidity = model.find_variable("humidity").unwrap();
    let fan_speed = model.find_variable("fan_speed").unwrap();
    let mut inputs = Inputs::new();

    inputs.add(temperature, 27.3).add(humidity, 61.9);

    let mut first = Engine::new(model.clone());
    let mut second = Engine::new(model);
    let a = first.run(&inputs).unwrap();
    let b = second.run(&inputs).unwrap();
    let c = first.run(&inputs).unwrap();

    assert_eq!(a.get(fan_speed).map(f64::to_bits), b.get(fan_speed).map(f64::to_bits));
    assert_eq!(a.get(fan_speed).map(f64::to_bits), c.get(fan_speed).map(f64::to_bits));
    assert_eq!(a.get(temperature), None);
    assert_eq!((a.cycle(), c.cycle()), (1, 2));
}

#[test]
fn test_conditions_fold_left_to_right() {
    use pretty_assertions::assert_eq;

    use crate::dsl::{is, not};
    use crate::rules::{Conclusion, FuzzyRule, RuleBlock};
    use crate::terms::MembershipFunction;
    use crate::variable::DataType;

    let mut model = Model::new();

    for (var, term, degree) in [("temperature", "hot", 0.8), ("humidity", "high", 0.3), ("wind", "low", 0.1)] {
        let key = model.add_variable(var, Role::Input, DataType::Real).unwrap();

        model
            .add_membership_function(key, MembershipFunction::singleton(term, degree))
            .unwrap();
    }

    let out = model.add_variable("out", Role::Output, DataType::Real).unwrap();

    model.add_rule_block(RuleBlock::new("main")).unwrap();
    model
        .add_rule(
            "main",
            FuzzyRule::new(
                "folded",
                is("temperature", "hot").or(is("humidity", "high")).and(is("wind", "low")),
                [Conclusion::value("out")],
            )
            .unwrap(),
        )
        .unwrap();
    model
        .add_rule(
            "main",
            FuzzyRule::new(
                "negated",
                is("temperature", "hot").or(not(is("humidity", "high"))),
                [Conclusion::value("out")],
            )
            .unwrap(),
        )
        .unwrap();

    let mut engine = Engine::new(model);

    for name in ["temperature", "humidity", "wind"] {
        engine.set_input(name, 0.).unwrap();
    }
    engine.fuzzify_all().unwrap();
    engine.aggregate().unwrap();

    let block = engine.model().find_rule_block("main").unwrap();

    // (hot OR high) AND low, never hot OR (high AND low) = 0.8
    assert_eq!(block.find_rule("folded").unwrap().strength(), Some(0.1));
    // NOT applies to everything folded so far: 1 - max(0.8, 0.3)
    assert!(close(block.find_rule("negated").unwrap().strength().unwrap(), 0.2));

    engine.activate().unwrap();

    assert!(close(engine.model().variable(out).unwrap().value().unwrap(), 0.1 * 0.2));
}

#[test]
fn test_direct_value_conclusions() {
    use pretty_assertions::assert_eq;

    use crate::dsl::{is, is_not, value_of};
    use crate::rules::{Conclusion, FuzzyRule};
    use crate::variable::DataType;

    let mut model = valve_controller(DataType::Real);
    let alarm = model.add_variable("alarm", Role::Output, DataType::Real).unwrap();
    let armed = model.add_variable("armed", Role::Auxiliary, DataType::Real).unwrap();

    model
        .add_rule(
            "main",
            FuzzyRule::new("2", is("level", "high"), [Conclusion::value("alarm")]).unwrap(),
        )
        .unwrap();
    model
        .add_rule(
            "main",
            FuzzyRule::new(
                "3",
                is_not("level", "high").and(value_of("armed")),
                [Conclusion::value("alarm")],
            )
            .unwrap(),
        )
        .unwrap();
    model.validate().unwrap();

    let mut engine = Engine::new(model);

    engine.set_input("armed", 1.).unwrap();
    engine.set_input("level", 5.).unwrap();

    for _ in 0..2 {
        engine.run_cycle().unwrap();

        let alarm = engine.model().variable(alarm).unwrap();

        assert_eq!(alarm.value(), Some(0.25));
        assert_eq!(alarm.activation(), Some(0.5));
    }

    assert_eq!(engine.model().variable(armed).unwrap().value(), Some(1.));
    assert_eq!(engine.get_output("alarm"), Ok(0.25));
}

#[test]
fn test_nothing_fired_is_degenerate() {
    use crate::variable::DataType;

    let mut engine = Engine::new(valve_controller(DataType::Real));
    let valve = engine.model().find_variable("valve").unwrap();

    engine.set_input("level", 0.).unwrap();

    assert!(matches!(engine.run_cycle(), Err(Error::ArithmeticDegeneracy(_))));
    assert!(matches!(engine.accumulate(valve), Err(Error::ArithmeticDegeneracy(_))));
    assert!(matches!(engine.get_output("valve"), Err(Error::UndefinedValue(_))));
}

#[test]
fn test_default_policies() {
    use pretty_assertions::assert_eq;

    use crate::variable::DataType;

    let mut model = valve_controller(DataType::Real);
    let valve = model.find_variable("valve").unwrap();

    model.set_default_policy(valve, DefaultPolicy::Value(4.)).unwrap();

    let mut engine = Engine::new(model);

    engine.set_input("level", 0.).unwrap();
    engine.run_cycle().unwrap();

    assert_eq!(engine.get_output("valve"), Ok(4.));

    engine
        .model_mut()
        .set_default_policy(valve, DefaultPolicy::NoChange)
        .unwrap();
    engine.set_input("level", 10.).unwrap();
    engine.run_cycle().unwrap();

    let opened = engine.get_output("valve").unwrap();

    assert!(close(opened, 50f64.sqrt()));

    engine.set_input("level", 0.).unwrap();
    engine.run_cycle().unwrap();

    assert_eq!(engine.get_output("valve"), Ok(opened));
    assert_eq!(engine.model().variable(valve).unwrap().area(), None);
}

#[test]
fn test_integer_output_is_rounded() {
    use pretty_assertions::assert_eq;

    use crate::variable::DataType;

    let mut engine = Engine::new(valve_controller(DataType::Integer));

    engine.set_input("level", 10.).unwrap();
    engine.run_cycle().unwrap();

    let valve = engine.model().variable_by_name("valve").unwrap();

    assert_eq!(valve.value(), Some(7.));
    assert!(close(valve.center().unwrap(), 50f64.sqrt()));
}

#[test]
fn test_roles_are_enforced() {
    let mut engine = Engine::new(fan_controller());
    let fan_speed = engine.model().find_variable("fan_speed").unwrap();
    let humidity = engine.model().find_variable("humidity").unwrap();

    assert!(matches!(engine.set_input("fan_speed", 1.), Err(Error::Configuration(_))));
    assert!(matches!(engine.set_input("pressure", 1.), Err(Error::ReferenceNotFound(_))));
    assert!(matches!(engine.fuzzify(fan_speed), Err(Error::Configuration(_))));
    assert!(matches!(engine.fuzzify(humidity), Err(Error::UndefinedValue(_))));
    assert!(matches!(engine.get_output("humidity"), Err(Error::Configuration(_))));
    assert!(matches!(engine.activate(), Err(Error::UndefinedValue(_))));
}

#[test]
fn test_cycle_results_stay_in_bounds() {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    let mut rng = StdRng::seed_from_u64(0x5eed);
    let model = fan_controller();
    let temperature = model.find_variable("temperature").unwrap();
    let humidity = model.find_variable("humidity").unwrap();
    let fan_speed = model.find_variable("fan_speed").unwrap();
    let mut engine = Engine::new(model);

    for _ in 0..500 {
        let inputs: Inputs = [
            (temperature, rng.gen_range(-10.0..60.0)),
            (humidity, rng.gen_range(-10.0..110.0)),
        ]
        .into_iter()
        .collect();
        let outputs = engine.run(&inputs).unwrap();
        let speed = outputs.get(fan_speed).unwrap();
        let model = engine.model();

        assert!((0. ..=100.).contains(&speed), "fan_speed {speed} for {inputs:?}");

        for (_, var) in model.variables() {
            for term in var.terms() {
                if let Some(degree) = term.degree() {
                    assert!((0. ..=1.).contains(&degree));
                }
                if let Some(level) = term.activation() {
                    assert!((0. ..=1.).contains(&level));
                }
            }
        }
        for rule in model.find_rule_block("fan").unwrap().rules() {
            assert!((0. ..=1.).contains(&rule.strength().unwrap()));
        }

        let envelope = model.variable(fan_speed).unwrap().envelope();

        assert!(envelope.points().windows(2).all(|w| w[0].x <= w[1].x));
    }
}

/// level IS a => out IS low, level IS b => out IS high, with `high` rising
/// as a vertical step at 50.
#[cfg(test)]
fn step_controller(high: [(f64, f64); 3]) -> Model {
    use crate::dsl::is;
    use crate::rules::{Conclusion, FuzzyRule, RuleBlock};
    use crate::terms::MembershipFunction;
    use crate::variable::DataType;

    let mut model = Model::new();
    let level = model.add_variable("level", Role::Input, DataType::Real).unwrap();
    let out = model.add_variable("out", Role::Output, DataType::Real).unwrap();

    model.set_range(level, 0. ..=10.).unwrap();
    model.set_range(out, 0. ..=100.).unwrap();

    for (key, name, points) in [
        (level, "a", vec![(0., 0.), (10., 1.)]),
        (level, "b", vec![(0., 0.), (5., 1.)]),
        (out, "low", vec![(0., 1.), (50., 1.), (60., 0.)]),
        (out, "high", high.to_vec()),
    ] {
        model
            .add_membership_function(key, MembershipFunction::curve(name, points))
            .unwrap();
    }

    let mut block = RuleBlock::new("main");

    block
        .add_rule(FuzzyRule::new("1", is("level", "a"), [Conclusion::term("out", "low")]).unwrap())
        .unwrap();
    block
        .add_rule(FuzzyRule::new("2", is("level", "b"), [Conclusion::term("out", "high")]).unwrap())
        .unwrap();
    model.add_rule_block(block).unwrap();
    model.validate().unwrap();
    model
}

#[test]
fn test_output_with_vertical_step() {
    use pretty_assertions::assert_eq;

    let mut engine = Engine::new(step_controller([(50., 0.), (50., 1.), (100., 1.)]));

    engine.set_input("level", 3.).unwrap();
    engine.run_cycle().unwrap();

    let out = engine.model().variable_by_name("out").unwrap();
    let points = out.envelope().points();

    assert!(points.windows(2).all(|w| w[0].x <= w[1].x), "{points:?}");
    assert!(points.iter().all(|p| p.y <= 0.6 + 1e-12));
    assert_eq!(points.first().map(|p| p.x), Some(0.));
    assert!(close(points[0].y, 0.3));
    assert!(
        points
            .windows(2)
            .any(|w| close(w[0].x, 50.) && close(w[1].x, 50.) && close(w[0].y, 0.3) && close(w[1].y, 0.6)),
        "{points:?}"
    );
    assert!(close(out.area().unwrap(), 45.));
    assert!(close(engine.get_output("out").unwrap(), 62.5));
}

#[test]
fn test_zero_width_output_is_degenerate() {
    use crate::dsl::is;
    use crate::rules::{Conclusion, FuzzyRule, RuleBlock};
    use crate::terms::MembershipFunction;
    use crate::variable::DataType;

    let mut model = Model::new();
    let level = model.add_variable("level", Role::Input, DataType::Real).unwrap();
    let valve = model.add_variable("valve", Role::Output, DataType::Real).unwrap();

    model.set_range(level, 0. ..=10.).unwrap();
    model.set_range(valve, 0. ..=10.).unwrap();
    model
        .add_membership_function(level, MembershipFunction::curve("high", [(0., 0.), (10., 1.)]))
        .unwrap();
    model
        .add_membership_function(valve, MembershipFunction::curve("spike", [(5., 0.), (5., 1.), (5., 0.)]))
        .unwrap();
    model.add_rule_block(RuleBlock::new("main")).unwrap();
    model
        .add_rule(
            "main",
            FuzzyRule::new("1", is("level", "high"), [Conclusion::term("valve", "spike")]).unwrap(),
        )
        .unwrap();
    model.validate().unwrap();

    let mut engine = Engine::new(model);

    engine.set_input("level", 8.).unwrap();
    engine.fuzzify_all().unwrap();
    engine.aggregate().unwrap();
    engine.activate().unwrap();
    engine.compute_activation(valve).unwrap();

    let spike = engine.model().variable(valve).unwrap().term("spike").unwrap();

    assert!(close(spike.activation().unwrap(), 0.8));
    engine.accumulate(valve).unwrap();

    assert!(matches!(engine.defuzzify(valve), Err(Error::ArithmeticDegeneracy(_))));
    assert!(matches!(engine.run_cycle(), Err(Error::ArithmeticDegeneracy(_))));
    assert!(matches!(engine.get_output("valve"), Err(Error::UndefinedValue(_))));
}

#[test]
fn test_auxiliary_conclusions_scale_the_set_value() {
    use crate::dsl::is;
    use crate::rules::{Conclusion, FuzzyRule};
    use crate::variable::DataType;

    let mut model = valve_controller(DataType::Real);

    model.add_variable("gain", Role::Auxiliary, DataType::Real).unwrap();
    model
        .add_rule(
            "main",
            FuzzyRule::new("2", is("level", "high"), [Conclusion::value("gain")]).unwrap(),
        )
        .unwrap();
    model.validate().unwrap();

    let mut engine = Engine::new(model);

    engine.set_input("level", 5.).unwrap();

    for _ in 0..2 {
        engine.set_input("gain", 0.8).unwrap();
        engine.run_cycle().unwrap();

        let gain = engine.model().variable_by_name("gain").unwrap();

        assert!(close(gain.value().unwrap(), 0.4));
        assert!(close(gain.activation().unwrap(), 0.5));
    }

    engine.run_cycle().unwrap();

    assert!(close(engine.model().variable_by_name("gain").unwrap().value().unwrap(), 0.2));
}
