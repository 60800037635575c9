//! Reading and writing whole models.

use std::io::{Read, Write};

use log::debug;

use crate::error::Result;
use crate::model::Model;

/// Builds a model from some persisted representation.
pub trait ModelLoader {
    fn load<R: Read>(&self, reader: R) -> Result<Model>;
}

/// Writes a model out in some persisted representation.
pub trait ModelSaver {
    fn save<W: Write>(&self, model: &Model, writer: W) -> Result<()>;
}

/// A model as a JSON document. Per-cycle state is never written.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonDocument {
    pub pretty: bool,
}

impl JsonDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pretty() -> Self {
        Self { pretty: true }
    }
}

impl ModelLoader for JsonDocument {
    fn load<R: Read>(&self, reader: R) -> Result<Model> {
        let model: Model = serde_json::from_reader(reader)?;

        model.validate()?;
        debug!("Loaded model with {} variables", model.variables().count());

        Ok(model)
    }
}

impl ModelSaver for JsonDocument {
    fn save<W: Write>(&self, model: &Model, writer: W) -> Result<()> {
        if self.pretty {
            serde_json::to_writer_pretty(writer, model)?;
        } else {
            serde_json::to_writer(writer, model)?;
        }

        Ok(())
    }
}

#[cfg(test)]
fn heater() -> Model {
    use crate::dsl::is;
    use crate::rules::{Conclusion, FuzzyRule, RuleBlock};
    use crate::terms::MembershipFunction;
    use crate::variable::{DataType, DefaultPolicy, Role};

    let mut model = Model::new();
    let room = model.add_variable("room", Role::Input, DataType::Real).unwrap();
    let power = model.add_variable("power", Role::Output, DataType::Integer).unwrap();

    model.set_range(room, 0. ..=30.).unwrap();
    model.set_range(power, 0. ..=100.).unwrap();
    model.set_default_policy(power, DefaultPolicy::Value(0.)).unwrap();
    model
        .add_membership_function(room, MembershipFunction::curve("cold", [(0., 1.), (15., 1.), (20., 0.)]))
        .unwrap();
    model
        .add_membership_function(power, MembershipFunction::curve("high", [(50., 0.), (100., 1.)]))
        .unwrap();
    model
        .add_rule_block(RuleBlock::new("main").with_and("PROD".parse().unwrap()))
        .unwrap();
    model
        .add_rule(
            "main",
            FuzzyRule::new("1", is("room", "cold"), [Conclusion::term("power", "high").with_weight(0.5).unwrap()])
                .unwrap(),
        )
        .unwrap();
    model
}

#[test]
fn test_saved_model_evaluates_the_same() {
    use crate::inference::Engine;

    let model = heater();
    let mut buffer = Vec::new();

    JsonDocument::pretty().save(&model, &mut buffer).unwrap();

    let loaded = JsonDocument::new().load(buffer.as_slice()).unwrap();
    let block = loaded.find_rule_block("main").unwrap();

    assert_eq!(block.and_method(), model.find_rule_block("main").unwrap().and_method());
    assert_eq!(block.rules()[0].conclusions()[0].weight(), 0.5);

    let mut original = Engine::new(model);
    let mut reloaded = Engine::new(loaded);

    for engine in [&mut original, &mut reloaded] {
        engine.set_input("room", 17.).unwrap();
        engine.run_cycle().unwrap();
    }

    assert_eq!(original.get_output("power"), reloaded.get_output("power"));
}

#[test]
fn test_invalid_documents_are_rejected() {
    use crate::dsl::is;
    use crate::error::Error;
    use crate::rules::{Conclusion, FuzzyRule};

    assert!(matches!(
        JsonDocument::new().load("{\"variables\": 3}".as_bytes()),
        Err(Error::Serialization(_))
    ));

    let mut model = heater();

    model
        .add_rule(
            "main",
            FuzzyRule::new("2", is("room", "warm"), [Conclusion::term("power", "high")]).unwrap(),
        )
        .unwrap();

    let mut buffer = Vec::new();

    JsonDocument::new().save(&model, &mut buffer).unwrap();

    assert!(matches!(
        JsonDocument::new().load(buffer.as_slice()),
        Err(Error::ReferenceNotFound(_))
    ));
}
