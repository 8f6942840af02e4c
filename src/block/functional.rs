use crate::block::BlockFunction;
use crate::comm::Communicator;
use crate::error::BlockError;
use crate::forms::{FunctionalKernel, Measure};
use std::fmt;
use std::sync::Arc;

/// One integral of a functional, acting on a single component.
#[derive(Clone)]
pub struct FunctionalTerm {
    pub component: usize,
    pub measure: Measure,
    pub kernel: Arc<dyn FunctionalKernel>,
}

impl fmt::Debug for FunctionalTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionalTerm")
            .field("component", &self.component)
            .field("measure", &self.measure)
            .finish()
    }
}

/// A scalar functional of a block function, given as a sum of integrals.
#[derive(Debug, Clone, Default)]
pub struct Functional {
    terms: Vec<FunctionalTerm>,
}

impl Functional {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn plus(mut self, component: usize, measure: Measure, kernel: impl FunctionalKernel + 'static) -> Self {
        self.terms.push(FunctionalTerm {
            component,
            measure,
            kernel: Arc::new(kernel),
        });
        self
    }

    pub fn terms(&self) -> &[FunctionalTerm] {
        &self.terms
    }
}

/// Evaluates a functional of a block function, summed over all ranks. Collective.
///
/// Each term is integrated over the local entities of its measure that lie in the restriction
/// of its component.
pub fn assemble_functional<C: Communicator>(
    functional: &Functional,
    function: &BlockFunction,
    comm: &C,
) -> Result<f64, BlockError> {
    let space = function.space();
    let mesh = space.mesh();
    let partition = space.partition();
    let rank = space.rank();

    let local_value = (|| -> Result<f64, BlockError> {
        let mut value = 0.0;
        for term in functional.terms() {
            let (Some((sub_space, restriction)), Some(values)) =
                (space.get(term.component), function.get_component(term.component))
            else {
                return Err(BlockError::UnassembledCoupling(format!(
                    "functional term references component {}, but the block space has {} components",
                    term.component,
                    space.num_components()
                )));
            };
            let gather = |dofs: &[usize]| dofs.iter().map(|&dof| values[dof]).collect::<Vec<_>>();

            match term.measure {
                Measure::Cells(marker) => {
                    for cell in 0..mesh.num_cells() {
                        let in_domain = partition.cell_owner(cell) == rank
                            && marker.map_or(true, |m| mesh.cell_markers()[cell] == m)
                            && restriction.map_or(true, |r| r.contains_cell(cell));
                        if in_domain {
                            let local_values = gather(sub_space.cell_dofs(cell));
                            value += term
                                .kernel
                                .element_value(&mesh.cell_geometry(cell), &local_values)?;
                        }
                    }
                }
                Measure::BoundaryFacets(marker) | Measure::InteriorFacets(marker) => {
                    let boundary = matches!(term.measure, Measure::BoundaryFacets(_));
                    for facet in 0..mesh.num_facets() {
                        let in_domain = mesh.is_boundary_facet(facet) == boundary
                            && partition.facet_owner(mesh, facet) == rank
                            && marker.map_or(true, |m| mesh.facet_markers()[facet] == m)
                            && restriction.map_or(true, |r| r.contains_facet(facet));
                        if in_domain {
                            let local_values = gather(sub_space.facet_dofs(facet));
                            value += term
                                .kernel
                                .element_value(&mesh.facet_geometry(facet), &local_values)?;
                        }
                    }
                }
            }
        }
        Ok(value)
    })();

    // Reduce before reporting so that a failure on one rank cannot leave the others waiting
    let failed = comm
        .all_gather(vec![local_value.is_err()])
        .into_iter()
        .flatten()
        .any(|failed| failed);
    let value = local_value?;
    if failed {
        return Err(BlockError::FormEngine(eyre::eyre!("functional evaluation failed on another rank")));
    }
    Ok(comm.sum(value))
}
