use serde::{Deserialize, Serialize};

use crate::error::{LinsysError, LinsysResult};
use crate::solver::ordering::{MinimumDegreeControl, OrderingMethod};

/// Settings consumed by the linear-system solver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinsysSettings {
    /// primal regularization added to the diagonal of P
    pub sigma: f64,
    /// scalar ADMM step size, used when no per-constraint ρ is given
    pub rho: f64,
    pub ordering: OrderingMethod,
    /// rows of degree above `max(16, dense_row_factor * sqrt(n))` are ordered last,
    /// negative disables the check
    pub dense_row_factor: f64,
}

impl Default for LinsysSettings {
    fn default() -> Self {
        Self {
            sigma: 1e-6,
            rho: 0.1,
            ordering: OrderingMethod::Amd,
            dense_row_factor: 10.0,
        }
    }
}

impl LinsysSettings {
    pub fn validate(&self) -> LinsysResult<()> {
        if !(self.sigma.is_finite() && self.sigma > 0.0) {
            return Err(LinsysError::Settings(format!(
                "sigma must be positive and finite, got {}",
                self.sigma
            )));
        }
        check_rho(self.rho)?;
        if self.dense_row_factor.is_nan() {
            return Err(LinsysError::Settings("dense_row_factor is NaN".to_string()));
        }
        Ok(())
    }

    pub fn ordering_control(&self) -> MinimumDegreeControl {
        MinimumDegreeControl {
            dense: self.dense_row_factor,
        }
    }
}

pub(crate) fn check_rho(rho: f64) -> LinsysResult<()> {
    if !(rho.is_finite() && rho > 0.0) {
        return Err(LinsysError::Settings(format!(
            "rho must be positive and finite, got {rho}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn defaults_from_empty_json() {
        let settings: LinsysSettings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings, LinsysSettings::default());
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn partial_json_overrides() {
        let settings: LinsysSettings =
            serde_json::from_str(r#"{"rho": 0.01, "ordering": "natural"}"#).unwrap();
        assert_eq!(settings.rho, 0.01);
        assert_eq!(settings.ordering, OrderingMethod::Natural);
        assert_eq!(settings.sigma, 1e-6);
    }

    #[test]
    fn serializes_ordering_in_snake_case() {
        let json = serde_json::to_value(LinsysSettings::default()).unwrap();
        assert_eq!(json["ordering"], "amd");

        let settings: LinsysSettings =
            serde_json::from_str(r#"{"ordering": "minimum_degree"}"#).unwrap();
        assert_eq!(settings.ordering, OrderingMethod::MinimumDegree);
    }

    #[rstest]
    #[case(0.0, 0.1)]
    #[case(-1.0, 0.1)]
    #[case(f64::NAN, 0.1)]
    #[case(1e-6, 0.0)]
    #[case(1e-6, f64::INFINITY)]
    fn rejects_bad_regularization(#[case] sigma: f64, #[case] rho: f64) {
        let settings = LinsysSettings {
            sigma,
            rho,
            ..Default::default()
        };
        assert!(matches!(settings.validate(), Err(LinsysError::Settings(_))));
    }
}
