use crate::block::BlockFunctionSpace;
use crate::error::BlockError;
use crate::forms::{BilinearKernel, LinearKernel, Measure};
use std::fmt;
use std::sync::Arc;

/// Placeholder for the trial function of one block component.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct TrialFunction {
    component: usize,
}

/// Placeholder for the test function of one block component.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct TestFunction {
    component: usize,
}

impl TrialFunction {
    pub fn new(component: usize) -> Self {
        Self { component }
    }

    pub fn component(&self) -> usize {
        self.component
    }
}

impl TestFunction {
    pub fn new(component: usize) -> Self {
        Self { component }
    }

    pub fn component(&self) -> usize {
        self.component
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct BlockTrialFunction {
    num_components: usize,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct BlockTestFunction {
    num_components: usize,
}

impl BlockTrialFunction {
    pub fn new(space: &BlockFunctionSpace) -> Self {
        Self {
            num_components: space.num_components(),
        }
    }

    /// One placeholder per component, in component order.
    pub fn split(&self) -> Vec<TrialFunction> {
        (0..self.num_components).map(TrialFunction::new).collect()
    }
}

impl BlockTestFunction {
    pub fn new(space: &BlockFunctionSpace) -> Self {
        Self {
            num_components: space.num_components(),
        }
    }

    /// One placeholder per component, in component order.
    pub fn split(&self) -> Vec<TestFunction> {
        (0..self.num_components).map(TestFunction::new).collect()
    }
}

/// A kernel together with the measure it is integrated over.
pub struct Integral<K: ?Sized> {
    pub measure: Measure,
    pub kernel: Arc<K>,
}

impl<K: ?Sized> Clone for Integral<K> {
    fn clone(&self) -> Self {
        Self {
            measure: self.measure,
            kernel: Arc::clone(&self.kernel),
        }
    }
}

impl<K: ?Sized> fmt::Debug for Integral<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Integral").field("measure", &self.measure).finish()
    }
}

/// A sum of integrals of a test and a trial function.
#[derive(Debug, Clone)]
pub struct BilinearForm {
    test: TestFunction,
    trial: TrialFunction,
    integrals: Vec<Integral<dyn BilinearKernel>>,
}

impl BilinearForm {
    pub fn new(
        test: TestFunction,
        trial: TrialFunction,
        measure: Measure,
        kernel: impl BilinearKernel + 'static,
    ) -> Self {
        Self {
            test,
            trial,
            integrals: Vec::new(),
        }
        .plus(measure, kernel)
    }

    /// Adds another integral of the same arguments.
    pub fn plus(mut self, measure: Measure, kernel: impl BilinearKernel + 'static) -> Self {
        self.integrals.push(Integral {
            measure,
            kernel: Arc::new(kernel),
        });
        self
    }

    pub fn test(&self) -> TestFunction {
        self.test
    }

    pub fn trial(&self) -> TrialFunction {
        self.trial
    }

    pub fn integrals(&self) -> &[Integral<dyn BilinearKernel>] {
        &self.integrals
    }

    /// The same integrals with the arguments replaced, e.g. to reuse a state operator written
    /// against the adjoint test function in a state-only problem.
    pub fn replace_arguments(&self, test: TestFunction, trial: TrialFunction) -> Self {
        Self {
            test,
            trial,
            integrals: self.integrals.clone(),
        }
    }
}

/// A sum of integrals of a test function.
#[derive(Debug, Clone)]
pub struct LinearForm {
    test: TestFunction,
    integrals: Vec<Integral<dyn LinearKernel>>,
}

impl LinearForm {
    pub fn new(test: TestFunction, measure: Measure, kernel: impl LinearKernel + 'static) -> Self {
        Self {
            test,
            integrals: Vec::new(),
        }
        .plus(measure, kernel)
    }

    pub fn plus(mut self, measure: Measure, kernel: impl LinearKernel + 'static) -> Self {
        self.integrals.push(Integral {
            measure,
            kernel: Arc::new(kernel),
        });
        self
    }

    pub fn test(&self) -> TestFunction {
        self.test
    }

    pub fn integrals(&self) -> &[Integral<dyn LinearKernel>] {
        &self.integrals
    }

    pub fn replace_argument(&self, test: TestFunction) -> Self {
        Self {
            test,
            integrals: self.integrals.clone(),
        }
    }
}

/// A block of a block form: either a form, or no coupling at all.
///
/// An `Absent` block contributes neither values nor sparsity pattern, whereas a present form
/// whose integrals evaluate to zero still contributes its (explicitly zero) pattern.
#[derive(Debug, Clone)]
pub enum BlockEntry<F> {
    Form(F),
    Absent,
}

impl<F> BlockEntry<F> {
    pub fn as_form(&self) -> Option<&F> {
        match self {
            Self::Form(form) => Some(form),
            Self::Absent => None,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }
}

impl<F> From<F> for BlockEntry<F> {
    fn from(form: F) -> Self {
        Self::Form(form)
    }
}

/// Grid of bilinear forms; block `(i, j)` couples test component `i` with trial component `j`.
#[derive(Debug, Clone)]
pub struct BlockForm2 {
    blocks: Vec<Vec<BlockEntry<BilinearForm>>>,
    ncols: usize,
}

impl BlockForm2 {
    /// Fails with [`BlockError::UnassembledCoupling`] if the rows have different lengths and
    /// with [`BlockError::MisplacedForm`] if a form's arguments do not match its position.
    pub fn new(blocks: Vec<Vec<BlockEntry<BilinearForm>>>) -> Result<Self, BlockError> {
        let ncols = blocks.first().map_or(0, Vec::len);
        for (row, row_blocks) in blocks.iter().enumerate() {
            if row_blocks.len() != ncols {
                return Err(BlockError::UnassembledCoupling(format!(
                    "block row {row} has {} blocks, but row 0 has {ncols}",
                    row_blocks.len()
                )));
            }
            for (col, entry) in row_blocks.iter().enumerate() {
                if let BlockEntry::Form(form) = entry {
                    if form.test.component != row || form.trial.component != col {
                        return Err(BlockError::MisplacedForm {
                            row,
                            col: Some(col),
                            test: form.test.component,
                            trial: Some(form.trial.component),
                        });
                    }
                }
            }
        }
        Ok(Self { blocks, ncols })
    }

    /// Number of block rows and block columns.
    pub fn shape(&self) -> (usize, usize) {
        (self.blocks.len(), self.ncols)
    }

    pub fn block(&self, row: usize, col: usize) -> Option<&BlockEntry<BilinearForm>> {
        self.blocks.get(row).and_then(|blocks| blocks.get(col))
    }

    /// Present blocks with their positions, row by row.
    pub fn forms(&self) -> impl '_ + Iterator<Item = (usize, usize, &BilinearForm)> {
        self.blocks.iter().enumerate().flat_map(|(row, blocks)| {
            blocks
                .iter()
                .enumerate()
                .filter_map(move |(col, entry)| entry.as_form().map(|form| (row, col, form)))
        })
    }
}

/// Column of linear forms; block `i` belongs to test component `i`.
#[derive(Debug, Clone)]
pub struct BlockForm1 {
    blocks: Vec<BlockEntry<LinearForm>>,
}

impl BlockForm1 {
    pub fn new(blocks: Vec<BlockEntry<LinearForm>>) -> Result<Self, BlockError> {
        for (row, entry) in blocks.iter().enumerate() {
            if let BlockEntry::Form(form) = entry {
                if form.test.component != row {
                    return Err(BlockError::MisplacedForm {
                        row,
                        col: None,
                        test: form.test.component,
                        trial: None,
                    });
                }
            }
        }
        Ok(Self { blocks })
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn block(&self, row: usize) -> Option<&BlockEntry<LinearForm>> {
        self.blocks.get(row)
    }

    pub fn forms(&self) -> impl '_ + Iterator<Item = (usize, &LinearForm)> {
        self.blocks
            .iter()
            .enumerate()
            .filter_map(|(row, entry)| entry.as_form().map(|form| (row, form)))
    }
}
