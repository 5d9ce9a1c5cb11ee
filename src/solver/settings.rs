#[cfg(feature = "serde")]
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::algebra::*;
use derive_builder::Builder;
use thiserror::Error;

/// Iteration controls shared by all constrained solver strategies.
///
/// The default tolerances are deliberately tight: the outer Krylov loops
/// here operate on exactly constrained or exactly reduced systems, so
/// there is no modelling error to hide behind.
///
/// Example:
/// ```
/// use sella::solver::SolverSettingsBuilder;
///
/// let settings = SolverSettingsBuilder::<f64>::default()
///     .max_iter(200)
///     .rel_tol(1e-10)
///     .build()
///     .unwrap();
/// ```
#[derive(Builder, Debug, Clone, Copy)]
#[builder(build_fn(validate = "Self::validate"))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(
    feature = "serde",
    serde(bound = "T: Serialize + DeserializeOwned"),
    serde(default)
)]
pub struct SolverSettings<T: FloatT> {
    /// iteration cap on the outer Krylov loop (default: 500)
    #[builder(default = "500")]
    pub max_iter: u32,

    /// relative residual tolerance (default: 1e-12)
    #[builder(default = "(1e-12).as_T()")]
    pub rel_tol: T,

    /// absolute residual tolerance (default: 0)
    #[builder(default = "T::zero()")]
    pub abs_tol: T,

    /// print per-iteration residuals on rank 0 (default: false)
    #[builder(default = "false")]
    pub verbose: bool,
}

impl<T: FloatT> Default for SolverSettings<T> {
    fn default() -> SolverSettings<T> {
        SolverSettingsBuilder::<T>::default().build().unwrap()
    }
}

#[derive(Error, Debug)]
/// Error type returned by settings validation
pub enum SettingsError {
    /// An error attributable to one of the settings fields
    #[error("Bad value for field \"{0}\"")]
    BadFieldValue(&'static str),
}

impl<T> SolverSettingsBuilder<T>
where
    T: FloatT,
{
    fn validate(&self) -> Result<(), SettingsError> {
        macro_rules! check_nonnegative {
            ($field:ident) => {
                if let Some(v) = self.$field {
                    if !v.is_finite() || v < T::zero() {
                        return Err(SettingsError::BadFieldValue(stringify!($field)));
                    }
                }
            };
        }
        check_nonnegative!(rel_tol);
        check_nonnegative!(abs_tol);

        if let Some(0) = self.max_iter {
            return Err(SettingsError::BadFieldValue("max_iter"));
        }

        Ok(())
    }
}

impl From<SettingsError> for SolverSettingsBuilderError {
    fn from(e: SettingsError) -> SolverSettingsBuilderError {
        SolverSettingsBuilderError::ValidationError(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_defaults() {
        let settings = SolverSettings::<f64>::default();
        assert_eq!(settings.max_iter, 500);
        assert_eq!(settings.rel_tol, 1e-12);
        assert_eq!(settings.abs_tol, 0.);
        assert!(!settings.verbose);
    }

    #[test]
    fn test_settings_validation() {
        assert!(SolverSettingsBuilder::<f64>::default()
            .rel_tol(-1e-3)
            .build()
            .is_err());

        assert!(SolverSettingsBuilder::<f64>::default()
            .abs_tol(f64::NAN)
            .build()
            .is_err());

        assert!(SolverSettingsBuilder::<f64>::default()
            .max_iter(0)
            .build()
            .is_err());
    }
}
