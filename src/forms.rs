//! Form engine: integration measures, element kernels and their P1 reference implementations.
//!
//! Kernels turn the geometry of one mesh entity into a local element tensor. Rows of an element
//! matrix correspond to the test function DOFs and columns to the trial function DOFs of the
//! entity, in the order given by [`FunctionSpace::cell_dofs`](crate::space::FunctionSpace::cell_dofs)
//! or [`FunctionSpace::facet_dofs`](crate::space::FunctionSpace::facet_dofs).
use crate::mesh::EntityGeometry;
use crate::quadrature::{segment_quadrature_strength_5, tri_quadrature_strength_5, Quadrature};
use eyre::{eyre, Result};
use nalgebra::{DMatrix, DMatrixViewMut, DVectorViewMut, Matrix2, Point2, Vector2};
use std::fmt;
use std::sync::Arc;

/// Where an integral is evaluated.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Measure {
    /// Cells, optionally only those carrying the given cell marker.
    Cells(Option<usize>),
    /// Exterior (boundary) facets, optionally only those carrying the given facet marker.
    BoundaryFacets(Option<usize>),
    /// Interior facets, optionally only those carrying the given facet marker.
    ///
    /// Continuous P1 traces agree on both sides of an interior facet, so each facet is
    /// integrated once, on the rank owning its first adjacent cell.
    InteriorFacets(Option<usize>),
}

impl Measure {
    /// Integral over all cells.
    pub fn dx() -> Self {
        Self::Cells(None)
    }

    pub fn dx_marked(marker: usize) -> Self {
        Self::Cells(Some(marker))
    }

    /// Integral over all boundary facets.
    pub fn ds() -> Self {
        Self::BoundaryFacets(None)
    }

    pub fn ds_marked(marker: usize) -> Self {
        Self::BoundaryFacets(Some(marker))
    }

    /// Integral over all interior facets.
    #[allow(non_snake_case)]
    pub fn dS() -> Self {
        Self::InteriorFacets(None)
    }

    #[allow(non_snake_case)]
    pub fn dS_marked(marker: usize) -> Self {
        Self::InteriorFacets(Some(marker))
    }

    pub fn marker(&self) -> Option<usize> {
        match self {
            Self::Cells(marker) | Self::BoundaryFacets(marker) | Self::InteriorFacets(marker) => *marker,
        }
    }
}

pub trait BilinearKernel: Send + Sync {
    fn element_matrix(&self, geometry: &EntityGeometry, output: DMatrixViewMut<f64>) -> Result<()>;
}

pub trait LinearKernel: Send + Sync {
    fn element_vector(&self, geometry: &EntityGeometry, output: DVectorViewMut<f64>) -> Result<()>;
}

/// Integrand of a scalar functional of one component.
pub trait FunctionalKernel: Send + Sync {
    /// Integral over the entity, given the component's values at the entity's DOFs.
    fn element_value(&self, geometry: &EntityGeometry, local_values: &[f64]) -> Result<f64>;
}

/// Affine map data of a P1 triangle: area and physical gradients of the barycentric basis.
struct P1Triangle {
    area: f64,
    jacobian: Matrix2<f64>,
    origin: Point2<f64>,
    gradients: [Vector2<f64>; 3],
}

impl P1Triangle {
    fn new(vertices: &[Point2<f64>; 3]) -> Result<Self> {
        let [p0, p1, p2] = vertices;
        let jacobian = Matrix2::from_columns(&[p1 - p0, p2 - p0]);
        let det = jacobian.determinant();
        let inverse_transpose = jacobian
            .try_inverse()
            .filter(|_| det != 0.0)
            .ok_or_else(|| eyre!("degenerate triangle {:?}", vertices))?
            .transpose();
        let reference_gradients = [Vector2::new(-1.0, -1.0), Vector2::new(1.0, 0.0), Vector2::new(0.0, 1.0)];
        Ok(Self {
            area: 0.5 * det.abs(),
            jacobian,
            origin: *p0,
            gradients: reference_gradients.map(|g| inverse_transpose * g),
        })
    }

    fn map(&self, xi: &Point2<f64>) -> Point2<f64> {
        self.origin + self.jacobian * xi.coords
    }
}

fn basis_p1_triangle(xi: &Point2<f64>) -> [f64; 3] {
    [1.0 - xi.x - xi.y, xi.x, xi.y]
}

fn check_shape(output: (usize, usize), expected: (usize, usize)) -> Result<()> {
    if output == expected {
        Ok(())
    } else {
        Err(eyre!(
            "element tensor has shape {:?}, but the P1 entity has shape {:?}",
            output,
            expected
        ))
    }
}

/// Consistent P1 mass matrix on a triangle or segment.
fn p1_mass(geometry: &EntityGeometry) -> DMatrix<f64> {
    let (n, scale) = match geometry {
        EntityGeometry::Triangle(_) => (3, geometry.measure() / 12.0),
        EntityGeometry::Segment(_) => (2, geometry.measure() / 6.0),
    };
    DMatrix::from_fn(n, n, |i, j| if i == j { 2.0 * scale } else { scale })
}

fn num_local_dofs(geometry: &EntityGeometry) -> usize {
    geometry.vertices().len()
}

/// `coefficient * u * v`, on cells or facets.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Mass {
    pub coefficient: f64,
}

impl Mass {
    pub fn new(coefficient: f64) -> Self {
        Self { coefficient }
    }
}

impl Default for Mass {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl BilinearKernel for Mass {
    fn element_matrix(&self, geometry: &EntityGeometry, mut output: DMatrixViewMut<f64>) -> Result<()> {
        let n = num_local_dofs(geometry);
        check_shape(output.shape(), (n, n))?;
        output.copy_from(&(p1_mass(geometry) * self.coefficient));
        Ok(())
    }
}

/// `coefficient * grad(u) . grad(v)` on cells.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Diffusion {
    pub coefficient: f64,
}

impl Diffusion {
    pub fn new(coefficient: f64) -> Self {
        Self { coefficient }
    }
}

impl BilinearKernel for Diffusion {
    fn element_matrix(&self, geometry: &EntityGeometry, mut output: DMatrixViewMut<f64>) -> Result<()> {
        let EntityGeometry::Triangle(vertices) = geometry else {
            return Err(eyre!("diffusion is only defined on cells"));
        };
        check_shape(output.shape(), (3, 3))?;
        let triangle = P1Triangle::new(vertices)?;
        for i in 0..3 {
            for j in 0..3 {
                output[(i, j)] =
                    self.coefficient * triangle.area * triangle.gradients[i].dot(&triangle.gradients[j]);
            }
        }
        Ok(())
    }
}

/// `(velocity . grad(u)) * v` on cells.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Advection {
    pub velocity: Vector2<f64>,
}

impl Advection {
    pub fn new(velocity: Vector2<f64>) -> Self {
        Self { velocity }
    }
}

impl BilinearKernel for Advection {
    fn element_matrix(&self, geometry: &EntityGeometry, mut output: DMatrixViewMut<f64>) -> Result<()> {
        let EntityGeometry::Triangle(vertices) = geometry else {
            return Err(eyre!("advection is only defined on cells"));
        };
        check_shape(output.shape(), (3, 3))?;
        let triangle = P1Triangle::new(vertices)?;
        // The integral of each basis function over the triangle is area / 3
        for i in 0..3 {
            for j in 0..3 {
                output[(i, j)] = self.velocity.dot(&triangle.gradients[j]) * triangle.area / 3.0;
            }
        }
        Ok(())
    }
}

/// A bilinear kernel with the roles of test and trial function exchanged.
///
/// Useful for adjoint blocks, e.g. `Transpose(Advection::new(beta))` gives
/// `(beta . grad(v)) * u`.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Transpose<K>(pub K);

impl<K: BilinearKernel> BilinearKernel for Transpose<K> {
    fn element_matrix(&self, geometry: &EntityGeometry, mut output: DMatrixViewMut<f64>) -> Result<()> {
        let (nrows, ncols) = output.shape();
        let mut transposed = DMatrix::zeros(ncols, nrows);
        self.0
            .element_matrix(geometry, DMatrixViewMut::from(&mut transposed))?;
        output.tr_copy_from(&transposed);
        Ok(())
    }
}

/// `f * v` for a given source function `f`, on cells or facets.
#[derive(Clone)]
pub struct Source {
    function: Arc<dyn Fn(&Point2<f64>) -> f64 + Send + Sync>,
}

impl Source {
    pub fn new(function: impl Fn(&Point2<f64>) -> f64 + Send + Sync + 'static) -> Self {
        Self {
            function: Arc::new(function),
        }
    }

    pub fn constant(value: f64) -> Self {
        Self::new(move |_| value)
    }
}

impl fmt::Debug for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Source").finish_non_exhaustive()
    }
}

impl LinearKernel for Source {
    fn element_vector(&self, geometry: &EntityGeometry, mut output: DVectorViewMut<f64>) -> Result<()> {
        let n = num_local_dofs(geometry);
        check_shape(output.shape(), (n, 1))?;
        output.fill(0.0);
        match geometry {
            EntityGeometry::Triangle(vertices) => {
                let triangle = P1Triangle::new(vertices)?;
                let det = 2.0 * triangle.area;
                let quadrature = tri_quadrature_strength_5();
                for (w, xi) in quadrature.weights().iter().zip(quadrature.points()) {
                    let f = (self.function)(&triangle.map(xi));
                    for (i, phi) in basis_p1_triangle(xi).iter().enumerate() {
                        output[i] += w * det * f * phi;
                    }
                }
            }
            EntityGeometry::Segment([a, b]) => {
                let length = geometry.measure();
                let quadrature = segment_quadrature_strength_5();
                for (w, t) in quadrature.weights().iter().zip(quadrature.points()) {
                    let t = t.x;
                    let f = (self.function)(&(a + (b - a) * t));
                    output[0] += w * length * f * (1.0 - t);
                    output[1] += w * length * f * t;
                }
            }
        }
        Ok(())
    }
}

/// `scale * (u - target)^2`, integrated exactly for P1 functions on cells or facets.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct SquaredDistance {
    pub target: f64,
    pub scale: f64,
}

impl SquaredDistance {
    pub fn new(target: f64, scale: f64) -> Self {
        Self { target, scale }
    }
}

impl FunctionalKernel for SquaredDistance {
    fn element_value(&self, geometry: &EntityGeometry, local_values: &[f64]) -> Result<f64> {
        let n = num_local_dofs(geometry);
        if local_values.len() != n {
            return Err(eyre!(
                "expected {} local values for a P1 entity, got {}",
                n,
                local_values.len()
            ));
        }
        let mass = p1_mass(geometry);
        let mut value = 0.0;
        for i in 0..n {
            for j in 0..n {
                value += (local_values[i] - self.target) * mass[(i, j)] * (local_values[j] - self.target);
            }
        }
        Ok(self.scale * value)
    }
}
