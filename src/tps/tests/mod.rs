mod test_cache_basic;

use crate::geom::{GeomMesh, Point3};
use crate::tps::LandmarkPair;

// ============================================================================
// Shared fixtures
// ============================================================================

/// Corners of the unit tetrahedron at the origin.
fn unit_tetrahedron() -> Vec<Point3> {
    vec![
        Point3::new(0.0, 0.0, 0.0),
        Point3::new(1.0, 0.0, 0.0),
        Point3::new(0.0, 1.0, 0.0),
        Point3::new(0.0, 0.0, 1.0),
    ]
}

/// Pair every source with `map(source)`.
fn pairs_mapped(sources: &[Point3], map: impl Fn(Point3) -> Point3) -> Vec<LandmarkPair> {
    sources
        .iter()
        .map(|&s| LandmarkPair::new(s, map(s)))
        .collect()
}

/// Unit cube spanning [0, 1]^3 with a UV per vertex.
fn unit_cube_mesh() -> GeomMesh {
    let positions = vec![
        [0.0, 0.0, 0.0],
        [1.0, 0.0, 0.0],
        [1.0, 1.0, 0.0],
        [0.0, 1.0, 0.0],
        [0.0, 0.0, 1.0],
        [1.0, 0.0, 1.0],
        [1.0, 1.0, 1.0],
        [0.0, 1.0, 1.0],
    ];
    let indices = vec![
        0, 2, 1, 0, 3, 2, // bottom
        4, 5, 6, 4, 6, 7, // top
        0, 1, 5, 0, 5, 4, // front
        2, 3, 7, 2, 7, 6, // back
        0, 4, 7, 0, 7, 3, // left
        1, 2, 6, 1, 6, 5, // right
    ];
    let uvs = positions.iter().map(|p| [p[0], p[1]]).collect();
    GeomMesh::with_attributes(positions, indices, Some(uvs), None)
}
