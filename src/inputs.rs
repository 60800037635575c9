use std::collections::HashMap;

use crate::variable::VariableKey;

/// A batch of crisp values to assign before an evaluation cycle.
#[derive(Clone, Debug, Default)]
pub struct Inputs(pub(crate) HashMap<VariableKey, f64>);

impl Inputs {
    pub fn new() -> Self {
        Inputs(HashMap::new())
    }

    pub fn add(&mut self, var: VariableKey, val: f64) -> &mut Self {
        self.0.insert(var, val);
        self
    }

    pub fn get(&self, var: VariableKey) -> Option<f64> {
        self.0.get(&var).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(VariableKey, f64)> for Inputs {
    fn from_iter<T: IntoIterator<Item = (VariableKey, f64)>>(iter: T) -> Self {
        Inputs(iter.into_iter().collect())
    }
}
