use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// An implementation of a time-decaying value
pub trait Decay {
    /// Calculate value at time `t`
    fn evaluate(&self, t: f64) -> f64;
}

fn validate(rate: f64, vi: f64, vf: f64) -> Result<()> {
    (vi >= vf && rate.is_finite())
        .then_some(())
        .ok_or_else(|| Error::InvalidConfig(format!("decay from {vi} to {vf} must not increase")))
}

/// v(t) = max(v<sub>i</sub> * r<sup>t</sup>, v<sub>f</sub>)
///
/// With `t` counted in terminal steps this is the "multiply by a fixed factor after every
/// episode end" schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Geometric {
    factor: f64,
    vi: f64,
    vf: f64,
}

impl Geometric {
    pub fn new(factor: f64, vi: f64, vf: f64) -> Result<Self> {
        validate(factor, vi, vf)?;
        if !(factor > 0.0 && factor <= 1.0) {
            return Err(Error::InvalidConfig(format!(
                "geometric decay factor {factor} must be in (0, 1]"
            )));
        }
        Ok(Self { factor, vi, vf })
    }
}

impl Decay for Geometric {
    fn evaluate(&self, t: f64) -> f64 {
        let &Self { factor, vi, vf } = self;
        (vi * factor.powf(t)).max(vf)
    }
}

/// v(t) = v<sub>f</sub> + (v<sub>i</sub> - v<sub>f</sub>) * e<sup>-rt</sup>
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exponential {
    rate: f64,
    vi: f64,
    vf: f64,
}

impl Exponential {
    pub fn new(rate: f64, vi: f64, vf: f64) -> Result<Self> {
        validate(rate, vi, vf)?;
        if rate < 0.0 {
            return Err(Error::InvalidConfig(format!(
                "exponential decay rate {rate} must be non-negative"
            )));
        }
        Ok(Self { rate, vi, vf })
    }
}

impl Decay for Exponential {
    fn evaluate(&self, t: f64) -> f64 {
        let &Self { rate, vi, vf } = self;
        vf + (vi - vf) * (-rate * t).exp()
    }
}

/// Serializable choice of decay schedule
///
/// Omitted fields decay from 1.0 to a 0.01 floor, by a factor of 0.995 (geometric) or at a rate
/// of 0.005 (exponential) per step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Schedule {
    Geometric {
        #[serde(default = "defaults::factor")]
        factor: f64,
        #[serde(default = "defaults::initial")]
        initial: f64,
        #[serde(default = "defaults::min")]
        min: f64,
    },
    Exponential {
        #[serde(default = "defaults::rate")]
        rate: f64,
        #[serde(default = "defaults::initial")]
        initial: f64,
        #[serde(default = "defaults::min")]
        min: f64,
    },
}

mod defaults {
    pub fn factor() -> f64 {
        0.995
    }

    pub fn rate() -> f64 {
        0.005
    }

    pub fn initial() -> f64 {
        1.0
    }

    pub fn min() -> f64 {
        0.01
    }
}

impl Default for Schedule {
    fn default() -> Self {
        Self::Geometric {
            factor: defaults::factor(),
            initial: defaults::initial(),
            min: defaults::min(),
        }
    }
}

/// A validated [`Schedule`]
#[derive(Debug, Clone, PartialEq)]
pub enum AnyDecay {
    Geometric(Geometric),
    Exponential(Exponential),
}

impl TryFrom<&Schedule> for AnyDecay {
    type Error = Error;

    fn try_from(schedule: &Schedule) -> Result<Self> {
        Ok(match *schedule {
            Schedule::Geometric {
                factor,
                initial,
                min,
            } => Self::Geometric(Geometric::new(factor, initial, min)?),
            Schedule::Exponential { rate, initial, min } => {
                Self::Exponential(Exponential::new(rate, initial, min)?)
            }
        })
    }
}

impl Decay for AnyDecay {
    fn evaluate(&self, t: f64) -> f64 {
        match self {
            Self::Geometric(d) => d.evaluate(t),
            Self::Exponential(d) => d.evaluate(t),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_functional() {
        assert!(validate(0.5, 1.0, 0.0).is_ok());
        assert!(validate(0.5, 1.0, 1.0).is_ok(), "constant schedule is allowed");
        assert!(validate(0.5, 0.0, 1.0).is_err());
        assert!(validate(f64::NAN, 1.0, 0.0).is_err());
    }

    #[test]
    fn geometric_decay() {
        let x = Geometric::new(0.5, 1.0, 0.1).unwrap();
        assert_eq!(x.evaluate(0.0), 1.0);
        assert_eq!(x.evaluate(1.0), 0.5);
        assert_eq!(x.evaluate(2.0), 0.25);
        assert_eq!(x.evaluate(10.0), 0.1, "floored at final value");
        assert!(Geometric::new(1.5, 1.0, 0.1).is_err());
        assert!(Geometric::new(0.0, 1.0, 0.1).is_err());
    }

    #[test]
    fn exponential_decay() {
        let x = Exponential::new(2.0, 2.0, 0.5).unwrap();
        assert_eq!(x.evaluate(0.0), 2.0);
        assert_eq!(x.evaluate(1.0), 0.5 + 1.5 * f64::exp(-2.0));
        assert!(Exponential::new(-1.0, 2.0, 0.5).is_err());
    }

    #[test]
    fn schedule_conversion() {
        let decay = AnyDecay::try_from(&Schedule::default()).unwrap();
        assert_eq!(decay.evaluate(0.0), 1.0);
        assert!((decay.evaluate(1.0) - 0.995).abs() < 1e-12);

        let bad = Schedule::Exponential {
            rate: 0.1,
            initial: 0.0,
            min: 1.0,
        };
        assert!(AnyDecay::try_from(&bad).is_err());
    }

    #[test]
    fn schedule_fields_default() {
        let geometric: Schedule = serde_json::from_str(r#"{"kind":"geometric"}"#).unwrap();
        assert_eq!(geometric, Schedule::default());

        let exponential: Schedule =
            serde_json::from_str(r#"{"kind":"exponential","min":0.1}"#).unwrap();
        assert_eq!(
            exponential,
            Schedule::Exponential {
                rate: 0.005,
                initial: 1.0,
                min: 0.1
            }
        );
    }

    #[test]
    fn schedule_json_shape() {
        let json = r#"{"kind":"geometric","factor":0.9,"initial":0.5,"min":0.05}"#;
        let schedule: Schedule = serde_json::from_str(json).unwrap();
        assert_eq!(
            schedule,
            Schedule::Geometric {
                factor: 0.9,
                initial: 0.5,
                min: 0.05
            }
        );
    }
}
