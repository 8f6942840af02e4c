//! Solver configuration keyed the way PETSc command-line options are.
use crate::SolverError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KrylovMethod {
    /// Apply the preconditioner once. Combined with a factorization this is a direct solve.
    Preonly,
    Cg,
    #[serde(alias = "bicgstab")]
    Bcgs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PreconditionerType {
    None,
    Jacobi,
    Lu,
    Cholesky,
}

impl FromStr for KrylovMethod {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "preonly" => Ok(Self::Preonly),
            "cg" => Ok(Self::Cg),
            "bcgs" | "bicgstab" => Ok(Self::Bcgs),
            _ => Err(()),
        }
    }
}

impl FromStr for PreconditionerType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "jacobi" => Ok(Self::Jacobi),
            "lu" => Ok(Self::Lu),
            "cholesky" => Ok(Self::Cholesky),
            _ => Err(()),
        }
    }
}

impl fmt::Display for KrylovMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Preonly => write!(f, "preonly"),
            Self::Cg => write!(f, "cg"),
            Self::Bcgs => write!(f, "bcgs"),
        }
    }
}

impl fmt::Display for PreconditionerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Jacobi => write!(f, "jacobi"),
            Self::Lu => write!(f, "lu"),
            Self::Cholesky => write!(f, "cholesky"),
        }
    }
}

/// Options handed to a [`SolverBackend`](crate::SolverBackend).
///
/// Recognized keys are `ksp_type`, `pc_type`, `pc_factor_mat_solver_type`, `ksp_rtol` and
/// `ksp_max_it`. Any other key is kept verbatim in [`extra`](Self::extra) so that backends
/// with richer configuration can consume it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverOptions {
    #[serde(rename = "ksp_type")]
    pub method: KrylovMethod,
    #[serde(rename = "pc_type")]
    pub preconditioner: PreconditionerType,
    /// Name of the factorization package. Not interpreted by the bundled backend.
    #[serde(rename = "pc_factor_mat_solver_type", skip_serializing_if = "Option::is_none")]
    pub factorization_package: Option<String>,
    #[serde(rename = "ksp_rtol")]
    pub relative_tolerance: f64,
    #[serde(rename = "ksp_max_it")]
    pub max_iterations: usize,
    #[serde(flatten)]
    pub extra: BTreeMap<String, String>,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            method: KrylovMethod::Preonly,
            preconditioner: PreconditionerType::Lu,
            factorization_package: None,
            relative_tolerance: 1e-8,
            max_iterations: 10_000,
            extra: BTreeMap::new(),
        }
    }
}

impl SolverOptions {
    /// Direct LU solve, the default.
    pub fn direct() -> Self {
        Self::default()
    }

    pub fn iterative(method: KrylovMethod, preconditioner: PreconditionerType) -> Self {
        Self {
            method,
            preconditioner,
            ..Self::default()
        }
    }

    pub fn with_relative_tolerance(self, relative_tolerance: f64) -> Self {
        Self {
            relative_tolerance,
            ..self
        }
    }

    pub fn with_max_iterations(self, max_iterations: usize) -> Self {
        Self { max_iterations, ..self }
    }

    /// Parses options from a flat key/value map, starting from the defaults.
    ///
    /// Keys may carry a leading `-` as on a PETSc command line.
    pub fn from_map<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Result<Self, SolverError>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut options = Self::default();
        for (key, value) in entries {
            let key = key.as_ref().trim_start_matches('-');
            let value = value.as_ref();
            let invalid = || SolverError::InvalidOption {
                key: key.to_string(),
                value: value.to_string(),
            };
            match key {
                "ksp_type" => options.method = value.parse().map_err(|_| invalid())?,
                "pc_type" => options.preconditioner = value.parse().map_err(|_| invalid())?,
                "pc_factor_mat_solver_type" => options.factorization_package = Some(value.to_string()),
                "ksp_rtol" => {
                    let rtol: f64 = value.trim().parse().map_err(|_| invalid())?;
                    if !(rtol.is_finite() && rtol > 0.0) {
                        return Err(invalid());
                    }
                    options.relative_tolerance = rtol;
                }
                "ksp_max_it" => options.max_iterations = value.trim().parse().map_err(|_| invalid())?,
                _ => {
                    options.extra.insert(key.to_string(), value.to_string());
                }
            }
        }
        Ok(options)
    }

    /// Whether the options describe a single factorization solve.
    pub fn is_direct(&self) -> bool {
        self.method == KrylovMethod::Preonly
    }
}
