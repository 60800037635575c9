use std::ops::RangeInclusive;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use slotmap::SlotMap;

use crate::curve::{Breakpoint, Coord};
use crate::error::{Error, Result};
use crate::ops::DefuzzificationMethod;
use crate::rules::{FuzzyRule, RuleBlock};
use crate::terms::{MembershipFunction, Shape};
use crate::variable::{DataType, DefaultPolicy, LinguisticVariable, Role, VariableKey};

/// Variables and rule blocks of one fuzzy controller.
///
/// The mutators below check their own invariants before anything is
/// stored. Models built any other way should go through [`Model::validate`].
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Model {
    pub(crate) variables: SlotMap<VariableKey, LinguisticVariable>,
    names: IndexMap<String, VariableKey>,
    pub(crate) rule_blocks: IndexMap<String, RuleBlock>,
}

impl Model {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_variable(&mut self, name: impl Into<String>, role: Role, data_type: DataType) -> Result<VariableKey> {
        let name = name.into();

        if self.names.contains_key(&name) {
            return Err(Error::Configuration(format!("duplicate variable {name}")));
        }

        let key = self
            .variables
            .insert(LinguisticVariable::new(name.clone(), role, data_type));
        self.names.insert(name, key);

        Ok(key)
    }

    pub fn find_variable(&self, name: &str) -> Option<VariableKey> {
        self.names.get(name).copied()
    }

    pub fn variable(&self, key: VariableKey) -> Option<&LinguisticVariable> {
        self.variables.get(key)
    }

    pub(crate) fn variable_mut(&mut self, key: VariableKey) -> Option<&mut LinguisticVariable> {
        self.variables.get_mut(key)
    }

    pub fn variable_by_name(&self, name: &str) -> Result<&LinguisticVariable> {
        self.find_variable(name)
            .and_then(|key| self.variables.get(key))
            .ok_or_else(|| Error::ReferenceNotFound(format!("variable {name}")))
    }

    /// Variables in declaration order.
    pub fn variables(&self) -> impl Iterator<Item = (VariableKey, &LinguisticVariable)> {
        self.names
            .values()
            .filter_map(|key| self.variables.get(*key).map(|var| (*key, var)))
    }

    pub(crate) fn keys_with_role(&self, role: Role) -> Vec<VariableKey> {
        self.variables()
            .filter(|(_, var)| var.role() == role)
            .map(|(key, _)| key)
            .collect()
    }

    /// Current value of a variable, as used by references.
    pub fn value_of(&self, name: &str) -> Result<f64> {
        self.variable_by_name(name)?
            .value()
            .ok_or_else(|| Error::UndefinedValue(format!("{name} has no value")))
    }

    pub(crate) fn lookup(&self, key: VariableKey) -> Result<&LinguisticVariable> {
        self.variables
            .get(key)
            .ok_or_else(|| Error::ReferenceNotFound(format!("variable {key:?}")))
    }

    pub(crate) fn lookup_mut(&mut self, key: VariableKey) -> Result<&mut LinguisticVariable> {
        self.variables
            .get_mut(key)
            .ok_or_else(|| Error::ReferenceNotFound(format!("variable {key:?}")))
    }

    pub fn set_range(&mut self, key: VariableKey, range: RangeInclusive<f64>) -> Result<()> {
        let var = self.lookup_mut(key)?;

        if !(range.start().is_finite() && range.end().is_finite() && range.start() <= range.end()) {
            return Err(Error::Configuration(format!(
                "{} range {}..{} is invalid",
                var.name(),
                range.start(),
                range.end()
            )));
        }

        var.range = Some(range);

        Ok(())
    }

    pub fn set_default_policy(&mut self, key: VariableKey, policy: DefaultPolicy) -> Result<()> {
        let var = self.lookup_mut(key)?;

        require_output(var, "a default")?;
        var.default_policy = Some(policy);

        Ok(())
    }

    pub fn set_defuzzification_method(&mut self, key: VariableKey, method: DefuzzificationMethod) -> Result<()> {
        let var = self.lookup_mut(key)?;

        require_output(var, "a defuzzification method")?;
        var.defuzzification = method;

        Ok(())
    }

    pub fn add_membership_function(&mut self, key: VariableKey, mut term: MembershipFunction) -> Result<()> {
        let var = self.lookup_mut(key)?;

        if var.role() == Role::Auxiliary {
            return Err(Error::Configuration(format!(
                "auxiliary variable {} cannot own term {}",
                var.name(),
                term.name()
            )));
        }
        if var.terms.contains_key(term.name()) {
            return Err(Error::Configuration(format!("duplicate term {}.{}", var.name(), term.name())));
        }

        term.check_literals(var.name())?;
        term.variable = key;
        var.terms.insert(term.name().to_string(), term);

        Ok(())
    }

    /// Appends a breakpoint to an existing curve term.
    pub fn add_breakpoint(&mut self, key: VariableKey, term: &str, breakpoint: Breakpoint) -> Result<()> {
        let var = self.lookup_mut(key)?;
        let name = var.name().to_string();
        let mf = var
            .terms
            .get_mut(term)
            .ok_or_else(|| Error::ReferenceNotFound(format!("term {name}.{term}")))?;

        mf.push_breakpoint(&name, breakpoint)
    }

    pub fn add_rule_block(&mut self, block: RuleBlock) -> Result<()> {
        if self.rule_blocks.contains_key(block.name()) {
            return Err(Error::Configuration(format!("duplicate rule block {}", block.name())));
        }

        for rule in block.rules() {
            rule.check()?;
        }

        self.rule_blocks.insert(block.name().to_string(), block);

        Ok(())
    }

    pub fn add_rule(&mut self, block: &str, rule: FuzzyRule) -> Result<()> {
        self.rule_block_mut(block)
            .ok_or_else(|| Error::ReferenceNotFound(format!("rule block {block}")))?
            .add_rule(rule)
    }

    pub fn find_rule_block(&self, name: &str) -> Option<&RuleBlock> {
        self.rule_blocks.get(name)
    }

    pub fn rule_block_mut(&mut self, name: &str) -> Option<&mut RuleBlock> {
        self.rule_blocks.get_mut(name)
    }

    /// Rule blocks in declaration order.
    pub fn rule_blocks(&self) -> impl Iterator<Item = &RuleBlock> {
        self.rule_blocks.values()
    }

    /// Checks every name reference in the model and the consistency of the
    /// variable table.
    pub fn validate(&self) -> Result<()> {
        if self.names.len() != self.variables.len() {
            return Err(Error::Configuration("variable index is inconsistent".to_string()));
        }

        for (name, key) in &self.names {
            let var = self
                .variables
                .get(*key)
                .filter(|var| var.name() == name)
                .ok_or_else(|| Error::Configuration(format!("variable index entry {name} is stale")))?;

            if var.role() == Role::Auxiliary && !var.terms.is_empty() {
                return Err(Error::Configuration(format!("auxiliary variable {name} owns terms")));
            }

            for term in var.terms() {
                term.check_literals(name)?;

                match term.shape() {
                    Shape::Singleton(_) => {},
                    Shape::SingletonRef(target) => self.require_variable(target)?,
                    Shape::Curve(points) => {
                        for coord in points.iter().flat_map(|bp| [&bp.x, &bp.y]) {
                            if let Coord::Reference(target) = coord {
                                self.require_variable(target)?;
                            }
                        }
                    },
                }
            }
        }

        for block in self.rule_blocks.values() {
            for rule in block.rules() {
                rule.check()?;

                for condition in rule.conditions() {
                    let var = self.variable_by_name(&condition.variable)?;

                    if let Some(term) = &condition.term {
                        require_term(var, term)?;
                    }
                }

                for conclusion in rule.conclusions() {
                    let var = self.variable_by_name(&conclusion.variable)?;

                    match &conclusion.term {
                        Some(term) => {
                            require_term(var, term)?;
                            require_output(var, "term conclusions")?;
                        },
                        None if var.role() == Role::Input => {
                            return Err(Error::Configuration(format!(
                                "rule {} concludes a value for input {}",
                                rule.id(),
                                var.name()
                            )))
                        },
                        None => {},
                    }
                }
            }
        }

        Ok(())
    }

    /// Clears every per-cycle field: degrees, activation levels, rule
    /// strengths, envelopes and their area/center.
    pub fn reset_cycle(&mut self) {
        for var in self.variables.values_mut() {
            var.reset_cycle();
        }

        for block in self.rule_blocks.values_mut() {
            for rule in &mut block.rules {
                rule.strength = None;
            }
        }
    }

    fn require_variable(&self, name: &str) -> Result<()> {
        self.variable_by_name(name).map(|_| ())
    }
}

fn require_output(var: &LinguisticVariable, what: &str) -> Result<()> {
    if var.role() != Role::Output {
        return Err(Error::Configuration(format!(
            "{} is {:?}; only outputs take {what}",
            var.name(),
            var.role()
        )));
    }

    Ok(())
}

fn require_term(var: &LinguisticVariable, term: &str) -> Result<()> {
    var.term(term)
        .map(|_| ())
        .ok_or_else(|| Error::ReferenceNotFound(format!("term {}.{term}", var.name())))
}

#[test]
fn test_duplicate_names_rejected() {
    let mut model = Model::new();

    model.add_variable("speed", Role::Output, DataType::Real).unwrap();

    assert!(matches!(
        model.add_variable("speed", Role::Input, DataType::Real),
        Err(Error::Configuration(_))
    ));
    assert!(model.add_rule_block(RuleBlock::new("main")).is_ok());
    assert!(matches!(model.add_rule_block(RuleBlock::new("main")), Err(Error::Configuration(_))));
    assert!(model.find_rule_block("main").is_some());
    assert!(model.find_rule_block("other").is_none());
}

#[test]
fn test_mutators_validate_immediately() {
    let mut model = Model::new();
    let level = model.add_variable("level", Role::Input, DataType::Real).unwrap();
    let aux = model.add_variable("aux", Role::Auxiliary, DataType::Real).unwrap();

    assert!(matches!(model.set_range(level, 10. ..=0.), Err(Error::Configuration(_))));
    assert!(matches!(
        model.add_membership_function(level, MembershipFunction::curve("bad", [(0., 0.), (5., 1.), (3., 0.)])),
        Err(Error::OrderingViolation { index: 2, .. })
    ));
    assert!(matches!(
        model.add_membership_function(aux, MembershipFunction::singleton("s", 1.)),
        Err(Error::Configuration(_))
    ));
    assert!(matches!(
        model.set_default_policy(level, DefaultPolicy::NoChange),
        Err(Error::Configuration(_))
    ));

    model
        .add_membership_function(level, MembershipFunction::curve("low", [(0., 1.), (5., 0.)]))
        .unwrap();

    assert!(matches!(
        model.add_membership_function(level, MembershipFunction::singleton("low", 1.)),
        Err(Error::Configuration(_))
    ));
    assert!(model.add_breakpoint(level, "low", (8., 0.).into()).is_ok());
    assert!(matches!(
        model.add_breakpoint(level, "low", (7., 0.).into()),
        Err(Error::OrderingViolation { .. })
    ));
    assert!(matches!(
        model.add_breakpoint(level, "high", (7., 0.).into()),
        Err(Error::ReferenceNotFound(_))
    ));
    assert_eq!(model.variable(level).unwrap().term("low").unwrap().variable(), level);
}

#[test]
fn test_validate_references() {
    use crate::dsl::is;
    use crate::rules::Conclusion;

    let mut model = Model::new();
    let level = model.add_variable("level", Role::Input, DataType::Real).unwrap();
    let valve = model.add_variable("valve", Role::Output, DataType::Real).unwrap();

    model
        .add_membership_function(level, MembershipFunction::curve("high", [(0., 0.), (10., 1.)]))
        .unwrap();
    model
        .add_membership_function(valve, MembershipFunction::curve("open", [(0., 0.), (1., 1.)]))
        .unwrap();

    let mut block = RuleBlock::new("main");
    block
        .add_rule(FuzzyRule::new("1", is("level", "high"), [Conclusion::term("valve", "open")]).unwrap())
        .unwrap();
    model.add_rule_block(block).unwrap();

    assert_eq!(model.validate(), Ok(()));

    model
        .add_rule(
            "main",
            FuzzyRule::new("2", is("level", "medium"), [Conclusion::term("valve", "open")]).unwrap(),
        )
        .unwrap();

    assert!(matches!(model.validate(), Err(Error::ReferenceNotFound(_))));

    let mut model = Model::new();
    let level = model.add_variable("level", Role::Input, DataType::Real).unwrap();

    model
        .add_membership_function(level, MembershipFunction::curve("high", [(0., 0.), (10., 1.)]))
        .unwrap();
    model.add_rule_block(RuleBlock::new("main")).unwrap();
    model
        .add_rule(
            "main",
            FuzzyRule::new("1", is("level", "high"), [Conclusion::term("level", "high")]).unwrap(),
        )
        .unwrap();

    assert!(matches!(model.validate(), Err(Error::Configuration(_))));
    assert!(matches!(
        model.add_rule("missing", FuzzyRule::new("1", is("level", "high"), [Conclusion::value("level")]).unwrap()),
        Err(Error::ReferenceNotFound(_))
    ));
}
