use crate::block::{BlockAssembler, BlockDirichletBC, BlockForm1, BlockForm2, BlockFunction};
use crate::comm::Communicator;
use crate::error::BlockError;
use blockfem_solvers::{DefaultBackend, SolverBackend, SolverOptions};
use log::{info, warn};

/// Solves the block system `a x = l` subject to `bcs` with the bundled solver backend.
/// Collective.
///
/// See [`block_solve_with_backend`].
pub fn block_solve<C: Communicator>(
    a: &BlockForm2,
    x: &mut BlockFunction,
    l: &BlockForm1,
    bcs: &BlockDirichletBC,
    options: &SolverOptions,
    comm: &C,
) -> Result<(), BlockError> {
    block_solve_with_backend(a, x, l, bcs, options, &DefaultBackend, comm)
}

/// Assembles `a` and `l` on the space of `x`, imposes `bcs`, solves with `backend` and stores
/// the solution in `x`, including its ghost entries. Collective.
///
/// Every rank solves the gathered system, so `x` is only modified once the solve succeeded on
/// all ranks. On failure `x` is left untouched and [`BlockError::LinearSolve`] carries the
/// backend's diagnostic code.
pub fn block_solve_with_backend<C: Communicator, B: SolverBackend>(
    a: &BlockForm2,
    x: &mut BlockFunction,
    l: &BlockForm1,
    bcs: &BlockDirichletBC,
    options: &SolverOptions,
    backend: &B,
    comm: &C,
) -> Result<(), BlockError> {
    let space = x.space().clone();
    let assembler = BlockAssembler::new();
    let mut matrix = assembler.assemble_matrix(a, &space, comm)?;
    let mut rhs = assembler.assemble_vector(l, &space, comm)?;
    bcs.apply(&mut matrix, &mut rhs, &space)?;

    let global_matrix = matrix.gather(comm);
    let global_rhs = rhs.gather(comm);
    let solution = backend
        .solve(&global_matrix, &global_rhs, options)
        .map_err(|err| {
            warn!("Linear solve failed: {err}");
            BlockError::LinearSolve {
                code: err.code(),
                message: err.to_string(),
            }
        })?;
    info!(
        "Solved block system of dimension {} ({} non-zeros) on rank {}",
        global_matrix.nrows(),
        global_matrix.nnz(),
        comm.rank()
    );

    x.assign_solution(&solution, comm)
}
