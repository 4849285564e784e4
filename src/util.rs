use crate::error::{Error, Result};

/// Asserts that a numerical value is in the provided interval `[a,b]` and panics
/// with a helpful message if not
///
/// ### Example
/// ```should_panic
/// # use sidescroll_rl::assert_interval;
/// let learning_rate = 2.0;
/// assert_interval!(learning_rate, 0.0, 1.0);
/// ```
/// This will panic with the message "Invalid value for \`learning_rate\`. Must be in the interval \[0, 1\]."
#[macro_export]
macro_rules! assert_interval {
    ($var:expr, $a:expr, $b:expr) => {
        assert!(
            $var >= $a && $var <= $b,
            "Invalid value for `{}`. Must be in the interval [{}, {}].",
            stringify!($var),
            $a,
            $b,
        );
    };
}

/// Non-panicking counterpart of [`assert_interval!`] for values that come from user input
pub(crate) fn check_interval(name: &str, value: f64, a: f64, b: f64) -> Result<()> {
    if value >= a && value <= b {
        Ok(())
    } else {
        Err(Error::InvalidConfig(format!(
            "`{name}` is {value}, must be in the interval [{a}, {b}]"
        )))
    }
}

/// Arithmetic mean, `None` for an empty slice
pub(crate) fn mean(values: &[f64]) -> Option<f64> {
    (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64)
}
