//! Assembly and solution of block-structured, restricted finite element systems.
//!
//! Several unknown fields, each in its own (possibly restricted) function space on a shared
//! mesh, are assembled into one monolithic linear system and solved as a unit. See the
//! [`block`] module for the core functionality.
pub mod block;
pub mod comm;
pub mod connectivity;
pub mod error;
pub mod forms;
pub mod la;
pub mod mesh;
pub mod quadrature;
pub mod restriction;
pub mod space;

#[cfg(feature = "proptest-support")]
pub mod proptest;

pub use error::BlockError;

pub extern crate blockfem_solvers as solvers;
pub extern crate nalgebra;
pub extern crate nalgebra_sparse;
