use std::fmt;
use std::str::FromStr;

use num::Float;
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// And operator method for combining the degrees of conditions in a rule
/// premise.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AndMethod {
    #[default]
    Min,
    Prod,
    BoundedDifference,
}

impl AndMethod {
    pub fn call<F: Float>(self, u: F, v: F) -> F {
        match self {
            Self::Min => F::min(u, v),
            Self::Prod => u * v,
            Self::BoundedDifference => F::max(F::zero(), u + v - F::one()),
        }
    }

    /// The Or method paired with this one by De Morgan's laws.
    pub fn dual(self) -> OrMethod {
        match self {
            Self::Min => OrMethod::Max,
            Self::Prod => OrMethod::AlgebraicSum,
            Self::BoundedDifference => OrMethod::BoundedSum,
        }
    }
}

/// Or operator method for combining the degrees of conditions in a rule
/// premise.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrMethod {
    #[default]
    Max,
    AlgebraicSum,
    BoundedSum,
}

impl OrMethod {
    pub fn call<F: Float>(self, u: F, v: F) -> F {
        match self {
            Self::Max => F::max(u, v),
            Self::AlgebraicSum => u + v - u * v,
            Self::BoundedSum => F::min(F::one(), u + v),
        }
    }

    pub fn dual(self) -> AndMethod {
        match self {
            Self::Max => AndMethod::Min,
            Self::AlgebraicSum => AndMethod::Prod,
            Self::BoundedSum => AndMethod::BoundedDifference,
        }
    }
}

/// Implication used to activate a conclusion. Informational: conclusion
/// curves are always clipped at the rule strength.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActivationMethod {
    Min,
    Prod,
}

/// Method for accumulating the activated terms of an output. Envelopes are
/// always built as a pointwise maximum.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccumulationMethod {
    #[default]
    Max,
    BoundedSum,
    NormalizedSum,
}

/// Method for defuzzificating the accumulated envelope. Every method is
/// evaluated as centroid of area.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DefuzzificationMethod {
    /// Center of Gravity
    #[default]
    Cog,
    /// Center of Gravity for singletons
    Cogs,
    /// Center of Area
    Coa,
    /// Left most maximum
    Lm,
    /// Right most maximum
    Rm,
}

macro_rules! tags {
    ($ty:ident, $label:literal { $($variant:ident => $tag:literal),+ $(,)? }) => {
        impl $ty {
            pub fn tag(self) -> &'static str {
                match self {
                    $(Self::$variant => $tag,)+
                }
            }
        }

        impl FromStr for $ty {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_uppercase().as_str() {
                    $($tag => Ok(Self::$variant),)+
                    other => Err(Error::Configuration(format!("unknown {} method '{other}'", $label))),
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.tag())
            }
        }
    };
}

tags!(AndMethod, "AND" { Min => "MIN", Prod => "PROD", BoundedDifference => "BDIF" });
tags!(OrMethod, "OR" { Max => "MAX", AlgebraicSum => "ASUM", BoundedSum => "BSUM" });
tags!(ActivationMethod, "ACT" { Min => "MIN", Prod => "PROD" });
tags!(AccumulationMethod, "ACCU" { Max => "MAX", BoundedSum => "BSUM", NormalizedSum => "NSUM" });
tags!(DefuzzificationMethod, "defuzzification" { Cog => "COG", Cogs => "COGS", Coa => "COA", Lm => "LM", Rm => "RM" });

#[test]
fn test_operators() {
    assert_eq!(AndMethod::Min.call(0.3, 0.6), 0.3);
    assert_eq!(AndMethod::Prod.call(0.5, 0.5), 0.25);
    assert_eq!(AndMethod::BoundedDifference.call(0.5, 0.25), 0.);
    assert_eq!(AndMethod::BoundedDifference.call(0.75, 0.5), 0.25);
    assert_eq!(OrMethod::Max.call(0.3, 0.6), 0.6);
    assert_eq!(OrMethod::AlgebraicSum.call(0.5, 0.5), 0.75);
    assert_eq!(OrMethod::BoundedSum.call(0.75, 0.5), 1.);
}

#[test]
fn test_duals() {
    for and in [AndMethod::Min, AndMethod::Prod, AndMethod::BoundedDifference] {
        assert_eq!(and.dual().dual(), and);
    }
    assert_eq!(AndMethod::Prod.dual(), OrMethod::AlgebraicSum);
}

#[test]
fn test_tags() {
    assert_eq!("BDIF".parse::<AndMethod>(), Ok(AndMethod::BoundedDifference));
    assert_eq!("asum".parse::<OrMethod>(), Ok(OrMethod::AlgebraicSum));
    assert_eq!("NSUM".parse::<AccumulationMethod>(), Ok(AccumulationMethod::NormalizedSum));
    assert_eq!(DefuzzificationMethod::Coa.to_string(), "COA");
    assert!(matches!("MAX".parse::<AndMethod>(), Err(Error::Configuration(_))));
    assert!(matches!("MEAN".parse::<DefuzzificationMethod>(), Err(Error::Configuration(_))));
}
