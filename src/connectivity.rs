use serde::{Deserialize, Serialize};

pub trait Connectivity: Clone {
    type FaceConnectivity: Connectivity;

    fn num_faces(&self) -> usize;
    fn get_face_connectivity(&self, index: usize) -> Option<Self::FaceConnectivity>;

    fn vertex_indices(&self) -> &[usize];
}

impl Connectivity for () {
    type FaceConnectivity = ();

    fn num_faces(&self) -> usize {
        0
    }

    fn get_face_connectivity(&self, _index: usize) -> Option<Self::FaceConnectivity> {
        None
    }

    fn vertex_indices(&self) -> &[usize] {
        &[]
    }
}

/// Connectivity of a two-vertex segment in 2D.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Segment2d2Connectivity(pub [usize; 2]);

impl Segment2d2Connectivity {
    /// The same segment with its vertex indices in ascending order.
    pub fn sorted(&self) -> Self {
        let [a, b] = self.0;
        Self([a.min(b), a.max(b)])
    }
}

impl Connectivity for Segment2d2Connectivity {
    type FaceConnectivity = ();

    fn num_faces(&self) -> usize {
        0
    }

    fn get_face_connectivity(&self, _index: usize) -> Option<Self::FaceConnectivity> {
        None
    }

    fn vertex_indices(&self) -> &[usize] {
        &self.0
    }
}

/// Connectivity of a three-vertex triangle in 2D.
///
/// Face `k` is the edge opposite to vertex `k`, oriented so that a counter-clockwise triangle
/// traverses its faces counter-clockwise.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tri3d2Connectivity(pub [usize; 3]);

impl Connectivity for Tri3d2Connectivity {
    type FaceConnectivity = Segment2d2Connectivity;

    fn num_faces(&self) -> usize {
        3
    }

    fn get_face_connectivity(&self, index: usize) -> Option<Self::FaceConnectivity> {
        let [a, b, c] = self.0;
        match index {
            0 => Some(Segment2d2Connectivity([b, c])),
            1 => Some(Segment2d2Connectivity([c, a])),
            2 => Some(Segment2d2Connectivity([a, b])),
            _ => None,
        }
    }

    fn vertex_indices(&self) -> &[usize] {
        &self.0
    }
}
