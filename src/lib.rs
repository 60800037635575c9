//! Rule-based fuzzy inference over piecewise-linear membership functions.
//!
//! A [`Model`] holds linguistic variables and rule blocks. An [`Engine`]
//! evaluates it one cycle at a time: input values are fuzzified, rule
//! premises are folded into strengths, the strengths clip each output's
//! terms, and the exact pointwise maximum of the clipped curves is reduced
//! to a crisp value by centroid of area.
//!
//! ```rust,ignore
//! use fuzzy_control::dsl::is;
//! use fuzzy_control::{Conclusion, DataType, Engine, FuzzyRule, MembershipFunction, Model, Role, RuleBlock};
//!
//! let mut model = Model::new();
//! let level = model.add_variable("level", Role::Input, DataType::Real)?;
//! let valve = model.add_variable("valve", Role::Output, DataType::Real)?;
//!
//! model.set_range(valve, 0. ..=10.)?;
//! model.add_membership_function(level, MembershipFunction::curve("high", [(0., 0.), (10., 1.)]))?;
//! model.add_membership_function(valve, MembershipFunction::curve("open", [(0., 0.), (10., 1.)]))?;
//! model.add_rule_block(RuleBlock::new("main"))?;
//! model.add_rule("main", FuzzyRule::new("1", is("level", "high"), [Conclusion::term("valve", "open")])?)?;
//!
//! let mut engine = Engine::new(model);
//!
//! engine.set_input("level", 10.)?;
//! engine.run_cycle()?;
//! let opening = engine.get_output("valve")?;
//! ```

pub mod curve;
pub mod dsl;
pub mod error;
pub mod inference;
pub mod inputs;
mod math;
pub mod model;
pub mod ops;
pub mod outputs;
pub mod persist;
pub mod rules;
pub mod terms;
pub mod variable;

pub use curve::{Breakpoint, Coord, Curve, Point};
pub use error::{Error, Result};
pub use inference::Engine;
pub use inputs::Inputs;
pub use model::Model;
pub use ops::{AccumulationMethod, ActivationMethod, AndMethod, DefuzzificationMethod, OrMethod};
pub use outputs::Outputs;
pub use persist::{JsonDocument, ModelLoader, ModelSaver};
pub use rules::{Conclusion, Condition, Connective, FuzzyRule, RuleBlock};
pub use terms::{MembershipFunction, Shape};
pub use variable::{DataType, DefaultPolicy, LinguisticVariable, Role, VariableKey};
