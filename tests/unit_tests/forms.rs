use blockfem::forms::{
    Advection, BilinearKernel, Diffusion, FunctionalKernel, LinearKernel, Mass, Measure, Source, SquaredDistance,
    Transpose,
};
use blockfem::mesh::EntityGeometry;
use blockfem::quadrature::{segment_quadrature_strength_5, tri_quadrature_strength_5, Quadrature};
use matrixcompare::{assert_matrix_eq, assert_scalar_eq};
use nalgebra::{DMatrix, DMatrixViewMut, DVector, DVectorViewMut, Point2, Vector2};

fn reference_triangle() -> EntityGeometry {
    EntityGeometry::Triangle([Point2::new(0.0, 0.0), Point2::new(1.0, 0.0), Point2::new(0.0, 1.0)])
}

fn skewed_triangle() -> EntityGeometry {
    EntityGeometry::Triangle([Point2::new(0.5, -1.0), Point2::new(3.0, 0.5), Point2::new(-0.5, 2.0)])
}

fn segment() -> EntityGeometry {
    EntityGeometry::Segment([Point2::new(1.0, 1.0), Point2::new(1.0, 3.0)])
}

fn element_matrix(kernel: &dyn BilinearKernel, geometry: &EntityGeometry) -> DMatrix<f64> {
    let n = geometry.vertices().len();
    let mut output = DMatrix::<f64>::zeros(n, n);
    kernel
        .element_matrix(geometry, DMatrixViewMut::from(&mut output))
        .unwrap();
    output
}

fn element_vector(kernel: &dyn LinearKernel, geometry: &EntityGeometry) -> DVector<f64> {
    let mut output = DVector::zeros(geometry.vertices().len());
    kernel
        .element_vector(geometry, DVectorViewMut::from(&mut output))
        .unwrap();
    output
}

#[test]
fn measures() {
    assert_eq!(Measure::dx(), Measure::Cells(None));
    assert_eq!(Measure::ds_marked(3), Measure::BoundaryFacets(Some(3)));
    assert_eq!(Measure::dS_marked(3), Measure::InteriorFacets(Some(3)));
    assert_eq!(Measure::dS().marker(), None);
    assert_eq!(Measure::dx_marked(2).marker(), Some(2));
    assert_eq!(Measure::ds().marker(), None);
}

#[test]
fn quadrature_rules_integrate_polynomials() {
    let tri = tri_quadrature_strength_5();
    // Reference triangle has area 1/2; the integral of x^2 y is 1/60
    assert_scalar_eq!(tri.integrate(|_| 1.0), 0.5, comp = abs, tol = 1e-12);
    assert_scalar_eq!(tri.integrate(|p| p.x * p.x * p.y), 1.0 / 60.0, comp = abs, tol = 1e-12);

    let segment = segment_quadrature_strength_5();
    assert_scalar_eq!(segment.integrate(|t| t.x.powi(5)), 1.0 / 6.0, comp = abs, tol = 1e-12);
}

#[test]
fn mass_matrix_sums_to_measure() {
    for geometry in [reference_triangle(), skewed_triangle(), segment()] {
        let mass = element_matrix(&Mass::new(2.0), &geometry);
        assert_scalar_eq!(mass.sum(), 2.0 * geometry.measure(), comp = abs, tol = 1e-12);
        assert_matrix_eq!(mass, mass.transpose(), comp = abs, tol = 1e-14);
    }

    let expected = DMatrix::from_row_slice(2, 2, &[2.0, 1.0, 1.0, 2.0]) / 3.0;
    assert_matrix_eq!(element_matrix(&Mass::default(), &segment()), expected, comp = abs, tol = 1e-14);
}

#[test]
fn diffusion_on_reference_triangle() {
    let stiffness = element_matrix(&Diffusion::new(1.0), &reference_triangle());
    #[rustfmt::skip]
    let expected = DMatrix::from_row_slice(3, 3, &[
         1.0, -0.5, -0.5,
        -0.5,  0.5,  0.0,
        -0.5,  0.0,  0.5,
    ]);
    assert_matrix_eq!(stiffness, expected, comp = abs, tol = 1e-14);
}

#[test]
fn diffusion_annihilates_constants() {
    let stiffness = element_matrix(&Diffusion::new(0.3), &skewed_triangle());
    let ones = DVector::repeat(3, 1.0);
    assert_matrix_eq!(&stiffness * &ones, DVector::<f64>::zeros(3), comp = abs, tol = 1e-12);
    assert_matrix_eq!(stiffness, stiffness.transpose(), comp = abs, tol = 1e-14);
}

#[test]
fn advection_applied_to_linear_functions() {
    let geometry = skewed_triangle();
    let velocity = Vector2::new(-1.0, -2.0);
    let advection = element_matrix(&Advection::new(velocity), &geometry);

    // u = 2x + 3y has velocity . grad(u) = -8, so each row integrates -8 * phi_i
    let u = DVector::from_iterator(3, geometry.vertices().iter().map(|p| 2.0 * p.x + 3.0 * p.y));
    let expected = DVector::repeat(3, -8.0 * geometry.measure() / 3.0);
    assert_matrix_eq!(&advection * u, expected, comp = abs, tol = 1e-12);

    let transposed = element_matrix(&Transpose(Advection::new(velocity)), &geometry);
    assert_matrix_eq!(transposed, advection.transpose(), comp = abs, tol = 1e-14);
}

#[test]
fn cell_kernels_reject_facets() {
    let mut output = DMatrix::<f64>::zeros(2, 2);
    assert!(Diffusion::new(1.0)
        .element_matrix(&segment(), DMatrixViewMut::from(&mut output))
        .is_err());
    assert!(Advection::new(Vector2::x())
        .element_matrix(&segment(), DMatrixViewMut::from(&mut output))
        .is_err());
}

#[test]
fn kernels_reject_wrong_output_shape() {
    let mut output = DMatrix::<f64>::zeros(2, 3);
    assert!(Mass::default()
        .element_matrix(&reference_triangle(), DMatrixViewMut::from(&mut output))
        .is_err());
    let mut output = DVector::<f64>::zeros(2);
    assert!(Source::constant(1.0)
        .element_vector(&reference_triangle(), DVectorViewMut::from(&mut output))
        .is_err());
}

#[test]
fn degenerate_triangles_are_reported() {
    let degenerate = EntityGeometry::Triangle([Point2::new(0.0, 0.0), Point2::new(1.0, 1.0), Point2::new(2.0, 2.0)]);
    let mut output = DMatrix::<f64>::zeros(3, 3);
    assert!(Diffusion::new(1.0)
        .element_matrix(&degenerate, DMatrixViewMut::from(&mut output))
        .is_err());
}

#[test]
fn source_load_vectors() {
    let geometry = skewed_triangle();
    let constant = element_vector(&Source::constant(3.0), &geometry);
    assert_matrix_eq!(constant, DVector::repeat(3, geometry.measure()), comp = abs, tol = 1e-12);

    // For a linear source the load vector equals the mass matrix applied to its nodal values
    let f = |p: &Point2<f64>| 1.0 + p.x - 2.0 * p.y;
    let nodal = DVector::from_iterator(3, geometry.vertices().iter().map(f));
    let expected = element_matrix(&Mass::default(), &geometry) * nodal;
    assert_matrix_eq!(element_vector(&Source::new(f), &geometry), expected, comp = abs, tol = 1e-12);

    let on_segment = element_vector(&Source::new(|p| p.y), &segment());
    let nodal = DVector::from_vec(vec![1.0, 3.0]);
    let expected = element_matrix(&Mass::default(), &segment()) * nodal;
    assert_matrix_eq!(on_segment, expected, comp = abs, tol = 1e-12);
}

#[test]
fn squared_distance_is_exact_for_p1() {
    let geometry = reference_triangle();
    let kernel = SquaredDistance::new(1.0, 0.5);
    // u = 1 + x: (u - 1)^2 = x^2, whose integral over the reference triangle is 1/12
    let value = kernel.element_value(&geometry, &[1.0, 2.0, 1.0]).unwrap();
    assert_scalar_eq!(value, 0.5 / 12.0, comp = abs, tol = 1e-12);

    let constant = kernel.element_value(&segment(), &[3.0, 3.0]).unwrap();
    assert_scalar_eq!(constant, 0.5 * 4.0 * 2.0, comp = abs, tol = 1e-14);

    assert!(kernel.element_value(&segment(), &[1.0]).is_err());
}
