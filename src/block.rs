//! Block function spaces, block forms and their assembly, boundary conditions and solution.
//!
//! A [`BlockFunctionSpace`] is an ordered list of sub-spaces on one mesh, each optionally
//! restricted to a subset of the mesh. Its active DOFs are numbered into a single monolithic
//! index space by a [`BlockDofMap`]. Block forms are grids of ordinary forms, with
//! [`BlockEntry::Absent`] marking blocks without coupling; they are assembled by a
//! [`BlockAssembler`] into monolithic containers, constrained by a [`BlockDirichletBC`] and solved
//! with [`block_solve`].
mod assembly;
mod bc;
mod dofmap;
mod form;
mod function;
mod functional;
mod solve;
mod space;

pub use assembly::*;
pub use bc::*;
pub use dofmap::*;
pub use form::*;
pub use function::*;
pub use functional::*;
pub use solve::*;
pub use space::*;
