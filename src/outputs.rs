use std::collections::HashMap;

use crate::variable::VariableKey;

/// Output values published by one evaluation cycle.
#[derive(Clone, Debug, PartialEq)]
pub struct Outputs {
    values: HashMap<VariableKey, f64>,
    cycle: u64,
}

impl Outputs {
    pub(crate) fn new(values: HashMap<VariableKey, f64>, cycle: u64) -> Self {
        Self { values, cycle }
    }

    /// `None` for variables that are not outputs or have no value yet.
    pub fn get(&self, var: VariableKey) -> Option<f64> {
        self.values.get(&var).copied()
    }

    /// Generation of the cycle that produced these values.
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    pub fn iter(&self) -> impl Iterator<Item = (VariableKey, f64)> + '_ {
        self.values.iter().map(|(k, v)| (*k, *v))
    }
}
