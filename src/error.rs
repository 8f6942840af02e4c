//! Error type for block space construction, assembly, boundary conditions and solves.
use crate::mesh::EntityKind;
use thiserror::Error;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BlockError {
    /// A restriction names a mesh entity that does not exist.
    #[error("invalid restriction: {kind} index {index} is out of bounds (mesh has {num_entities} {kind}s)")]
    InvalidRestriction {
        kind: EntityKind,
        index: usize,
        num_entities: usize,
    },
    /// Sub-spaces or restrictions of a block space are defined on different meshes.
    #[error("inconsistent mesh: {0}")]
    InconsistentMesh(String),
    #[error("a block function space needs at least one component")]
    EmptyBlockSpace,
    /// A block form references a component or block that the block space does not have.
    #[error("unassembled coupling: {0}")]
    UnassembledCoupling(String),
    /// The arguments of a form do not match the block it was placed in.
    #[error(
        "form placed in block ({row}, {col:?}) has test component {test} and trial component {trial:?}"
    )]
    MisplacedForm {
        row: usize,
        col: Option<usize>,
        test: usize,
        trial: Option<usize>,
    },
    /// A Dirichlet condition names a facet that does not exist or carries no active DOF.
    #[error("DOF outside mesh: {0}")]
    DofOutsideMesh(String),
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("linear solve failed (code {code}): {message}")]
    LinearSolve { code: i32, message: String },
    #[error("form engine failed: {0:#}")]
    FormEngine(eyre::Report),
}

impl From<eyre::Report> for BlockError {
    fn from(report: eyre::Report) -> Self {
        Self::FormEngine(report)
    }
}
