//! Quadrature rules on the reference triangle and the reference interval.
use nalgebra::{Point1, Point2};

pub type QuadraturePair<P> = (Vec<f64>, Vec<P>);
pub type QuadraturePair1d = QuadraturePair<Point1<f64>>;
pub type QuadraturePair2d = QuadraturePair<Point2<f64>>;

/// A quadrature rule consisting of weights and points.
pub trait Quadrature<P> {
    fn weights(&self) -> &[f64];
    fn points(&self) -> &[P];

    /// Approximates the integral of the given function using this quadrature rule.
    fn integrate(&self, f: impl Fn(&P) -> f64) -> f64 {
        self.weights()
            .iter()
            .zip(self.points())
            .map(|(w, p)| w * f(p))
            .sum()
    }
}

impl<P> Quadrature<P> for QuadraturePair<P> {
    fn weights(&self) -> &[f64] {
        &self.0
    }

    fn points(&self) -> &[P] {
        &self.1
    }
}

/// Degree-5 rule with 7 points on the reference triangle `(0, 0), (1, 0), (0, 1)`.
///
/// Weights sum to the reference area `1/2`.
pub fn tri_quadrature_strength_5() -> QuadraturePair2d {
    let a1 = 0.059715871789770;
    let b1 = 0.470142064105115;
    let w1 = 0.066197076394253;
    let a2 = 0.797426985353087;
    let b2 = 0.101286507323456;
    let w2 = 0.0629695902724135;

    let weights = vec![0.1125, w1, w1, w1, w2, w2, w2];
    let points = vec![
        Point2::new(1.0 / 3.0, 1.0 / 3.0),
        Point2::new(b1, b1),
        Point2::new(a1, b1),
        Point2::new(b1, a1),
        Point2::new(b2, b2),
        Point2::new(a2, b2),
        Point2::new(b2, a2),
    ];
    (weights, points)
}

/// 3-point Gauss-Legendre rule on `[0, 1]`, exact for polynomials of degree 5.
pub fn segment_quadrature_strength_5() -> QuadraturePair1d {
    let offset = 0.5 * (3.0f64 / 5.0).sqrt();
    let weights = vec![5.0 / 18.0, 8.0 / 18.0, 5.0 / 18.0];
    let points = vec![
        Point1::new(0.5 - offset),
        Point1::new(0.5),
        Point1::new(0.5 + offset),
    ];
    (weights, points)
}
