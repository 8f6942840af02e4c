use crate::block::{BlockForm1, BlockForm2, BlockFunctionSpace};
use crate::comm::Communicator;
use crate::error::BlockError;
use crate::forms::Measure;
use crate::la::{MonolithicMatrix, MonolithicMatrixBuilder, MonolithicVector};
use crate::mesh::EntityGeometry;
use crate::restriction::Restriction;
use log::debug;
use nalgebra::{DMatrix, DMatrixViewMut, DVector, DVectorViewMut};
use rayon::prelude::*;
use std::cell::RefCell;

/// Number of element contributions made by one block in the last assembly on this rank.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct BlockStatistics {
    pub row: usize,
    /// `None` for blocks of a linear form.
    pub col: Option<usize>,
    pub num_contributions: usize,
}

/// Assembles block forms into monolithic containers.
///
/// For every present block `(i, j)` and every integral in it, the element loop runs over the
/// entities of the integral's measure that are local to this rank and contained in the
/// restrictions of both components `i` and `j`. Local element tensors are computed in parallel;
/// they are then added to the monolithic container sequentially in entity order, so the result
/// does not depend on the number of threads.
#[derive(Debug, Default)]
pub struct BlockAssembler {
    statistics: RefCell<Vec<BlockStatistics>>,
}

/// Mesh entity of an element loop: a cell or a facet.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Entity {
    Cell(usize),
    Facet(usize),
}

impl BlockAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Per-block contribution counts of the most recent assembly.
    pub fn statistics(&self) -> Vec<BlockStatistics> {
        self.statistics.borrow().clone()
    }

    /// Assembles a block bilinear form. Collective.
    pub fn assemble_matrix<C: Communicator>(
        &self,
        form: &BlockForm2,
        space: &BlockFunctionSpace,
        comm: &C,
    ) -> Result<MonolithicMatrix, BlockError> {
        check_shape(form.shape(), space.num_components())?;
        let dofmap = space.dofmap();
        let mut builder = MonolithicMatrixBuilder::new(dofmap);
        let mut statistics = Vec::new();

        let local_result = (|| -> eyre::Result<()> {
            for (row, col, bilinear_form) in form.forms() {
                let mut num_contributions = 0;
                for integral in bilinear_form.integrals() {
                    let entities = iteration_domain(space, integral.measure, [row, col]);
                    let element_matrices: Vec<(Entity, DMatrix<f64>)> = entities
                        .par_iter()
                        .map(|&entity| -> eyre::Result<(Entity, DMatrix<f64>)> {
                            let (test_dofs, trial_dofs, geometry) = entity_data(space, entity, row, col);
                            let mut element_matrix = DMatrix::zeros(test_dofs.len(), trial_dofs.len());
                            integral
                                .kernel
                                .element_matrix(&geometry, DMatrixViewMut::from(&mut element_matrix))?;
                            Ok((entity, element_matrix))
                        })
                        .collect::<eyre::Result<_>>()?;

                    for (entity, element_matrix) in element_matrices {
                        let (test_dofs, trial_dofs, _) = entity_data(space, entity, row, col);
                        for (a, &test_dof) in test_dofs.iter().enumerate() {
                            let Some(global_row) = dofmap.global_index(row, test_dof) else {
                                continue;
                            };
                            for (b, &trial_dof) in trial_dofs.iter().enumerate() {
                                if let Some(global_col) = dofmap.global_index(col, trial_dof) {
                                    builder.add(global_row, global_col, element_matrix[(a, b)]);
                                }
                            }
                        }
                    }
                    num_contributions += entities.len();
                }
                debug!("Assembled block ({row}, {col}) with {num_contributions} element contributions");
                statistics.push(BlockStatistics {
                    row,
                    col: Some(col),
                    num_contributions,
                });
            }
            Ok(())
        })();
        agree_on_success(local_result, comm)?;

        *self.statistics.borrow_mut() = statistics;
        Ok(builder.finalize(comm))
    }

    /// Assembles a block linear form. Collective.
    pub fn assemble_vector<C: Communicator>(
        &self,
        form: &BlockForm1,
        space: &BlockFunctionSpace,
        comm: &C,
    ) -> Result<MonolithicVector, BlockError> {
        check_shape((form.len(), 0), space.num_components())?;
        let dofmap = space.dofmap();
        let mut vector = MonolithicVector::zeros(dofmap);
        let mut statistics = Vec::new();

        let local_result = (|| -> eyre::Result<()> {
            for (row, linear_form) in form.forms() {
                let mut num_contributions = 0;
                for integral in linear_form.integrals() {
                    let entities = iteration_domain(space, integral.measure, [row, row]);
                    let element_vectors: Vec<(Entity, DVector<f64>)> = entities
                        .par_iter()
                        .map(|&entity| -> eyre::Result<(Entity, DVector<f64>)> {
                            let (test_dofs, _, geometry) = entity_data(space, entity, row, row);
                            let mut element_vector = DVector::zeros(test_dofs.len());
                            integral
                                .kernel
                                .element_vector(&geometry, DVectorViewMut::from(&mut element_vector))?;
                            Ok((entity, element_vector))
                        })
                        .collect::<eyre::Result<_>>()?;

                    for (entity, element_vector) in element_vectors {
                        let (test_dofs, _, _) = entity_data(space, entity, row, row);
                        for (a, &test_dof) in test_dofs.iter().enumerate() {
                            if let Some(global_row) = dofmap.global_index(row, test_dof) {
                                vector.add(global_row, element_vector[a]);
                            }
                        }
                    }
                    num_contributions += entities.len();
                }
                debug!("Assembled block {row} with {num_contributions} element contributions");
                statistics.push(BlockStatistics {
                    row,
                    col: None,
                    num_contributions,
                });
            }
            Ok(())
        })();
        agree_on_success(local_result, comm)?;

        *self.statistics.borrow_mut() = statistics;
        vector.finalize(comm);
        Ok(vector)
    }
}

fn check_shape((nrows, ncols): (usize, usize), num_components: usize) -> Result<(), BlockError> {
    if nrows > num_components || ncols > num_components {
        Err(BlockError::UnassembledCoupling(format!(
            "block form of shape {nrows}x{ncols} does not fit a block space with {num_components} components"
        )))
    } else {
        Ok(())
    }
}

/// Makes a failure on any rank a failure on every rank, so that no rank enters the collective
/// finalize alone. Collective.
fn agree_on_success<C: Communicator>(local_result: eyre::Result<()>, comm: &C) -> Result<(), BlockError> {
    let failed_ranks: Vec<usize> = comm
        .all_gather(vec![local_result.is_err()])
        .into_iter()
        .enumerate()
        .filter(|(_, failed)| failed.first().copied().unwrap_or(false))
        .map(|(rank, _)| rank)
        .collect();
    match local_result {
        Err(report) => Err(BlockError::FormEngine(report)),
        Ok(()) if !failed_ranks.is_empty() => Err(BlockError::FormEngine(eyre::eyre!(
            "element kernels failed on ranks {:?}",
            failed_ranks
        ))),
        Ok(()) => Ok(()),
    }
}

fn contained(restriction: Option<&Restriction>, entity: Entity) -> bool {
    match (restriction, entity) {
        (None, _) => true,
        (Some(restriction), Entity::Cell(cell)) => restriction.contains_cell(cell),
        (Some(restriction), Entity::Facet(facet)) => restriction.contains_facet(facet),
    }
}

/// Local entities of `measure` contained in the restrictions of both components.
fn iteration_domain(space: &BlockFunctionSpace, measure: Measure, components: [usize; 2]) -> Vec<Entity> {
    let mesh = space.mesh();
    let partition = space.partition();
    let rank = space.rank();
    let in_restrictions = |entity: Entity| {
        components
            .iter()
            .all(|&component| contained(space.restriction(component), entity))
    };
    match measure {
        Measure::Cells(marker) => (0..mesh.num_cells())
            .filter(|&cell| partition.cell_owner(cell) == rank)
            .filter(|&cell| marker.map_or(true, |m| mesh.cell_markers()[cell] == m))
            .map(Entity::Cell)
            .filter(|&entity| in_restrictions(entity))
            .collect(),
        Measure::BoundaryFacets(marker) | Measure::InteriorFacets(marker) => (0..mesh.num_facets())
            .filter(|&facet| mesh.is_boundary_facet(facet) == matches!(measure, Measure::BoundaryFacets(_)))
            .filter(|&facet| partition.facet_owner(mesh, facet) == rank)
            .filter(|&facet| marker.map_or(true, |m| mesh.facet_markers()[facet] == m))
            .map(Entity::Facet)
            .filter(|&entity| in_restrictions(entity))
            .collect(),
    }
}

/// Test DOFs, trial DOFs and geometry of an entity.
fn entity_data(space: &BlockFunctionSpace, entity: Entity, row: usize, col: usize) -> (&[usize], &[usize], EntityGeometry) {
    let (test_space, trial_space) = (space.sub(row), space.sub(col));
    match entity {
        Entity::Cell(cell) => (
            test_space.cell_dofs(cell),
            trial_space.cell_dofs(cell),
            space.mesh().cell_geometry(cell),
        ),
        Entity::Facet(facet) => (
            test_space.facet_dofs(facet),
            trial_space.facet_dofs(facet),
            space.mesh().facet_geometry(facet),
        ),
    }
}
