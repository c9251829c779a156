use glam::{Mat4, Vec2, Vec3};

use crate::mesh::TriMesh;

/// World-space ray cast from the camera through a cursor position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

impl Ray {
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self { origin, direction }
    }

    pub fn point_at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }

    /// Unprojects a cursor position (device pixels, origin top-left) into a
    /// world ray. Returns `None` for a zero-area viewport or a singular
    /// view-projection matrix.
    pub fn from_cursor(cursor: Vec2, viewport: (u32, u32), view_proj: Mat4) -> Option<Self> {
        let (width, height) = viewport;
        if width == 0 || height == 0 {
            return None;
        }
        if view_proj.determinant().abs() < f32::EPSILON {
            return None;
        }
        let inverse = view_proj.inverse();

        // Cursor to normalized device coordinates; Y flips.
        let ndc_x = 2.0 * cursor.x / width as f32 - 1.0;
        let ndc_y = 1.0 - 2.0 * cursor.y / height as f32;

        let near = inverse.project_point3(Vec3::new(ndc_x, ndc_y, 0.0));
        let far = inverse.project_point3(Vec3::new(ndc_x, ndc_y, 1.0));
        let direction = far - near;
        if direction.length_squared() < f32::EPSILON {
            return None;
        }
        Some(Self::new(near, direction.normalize()))
    }
}

/// One mesh instance offered to the picking loop. Callers are responsible
/// for filtering by the full visibility chain before building candidates;
/// decorative meshes still participate so they occlude what sits behind them.
#[derive(Debug, Clone, Copy)]
pub struct PickCandidate<'a> {
    pub name: &'a str,
    pub transform: Mat4,
    pub mesh: &'a TriMesh,
    pub interactive: bool,
}

/// Nearest intersection found by [`pick`].
#[derive(Debug, Clone, PartialEq)]
pub struct PickHit {
    pub name: String,
    pub distance: f32,
    pub point: Vec3,
    pub interactive: bool,
}

/// Finds the nearest candidate intersected by the ray, if any.
pub fn pick<'a>(
    ray: &Ray,
    candidates: impl IntoIterator<Item = PickCandidate<'a>>,
) -> Option<PickHit> {
    let mut nearest: Option<PickHit> = None;
    for candidate in candidates {
        let Some(distance) = intersect_mesh(ray, candidate.transform, candidate.mesh) else {
            continue;
        };
        if nearest
            .as_ref()
            .map(|hit| distance < hit.distance)
            .unwrap_or(true)
        {
            nearest = Some(PickHit {
                name: candidate.name.to_string(),
                distance,
                point: ray.point_at(distance),
                interactive: candidate.interactive,
            });
        }
    }
    nearest
}

/// Intersects the ray with a transformed mesh, returning the nearest world
/// distance along the ray.
fn intersect_mesh(ray: &Ray, transform: Mat4, mesh: &TriMesh) -> Option<f32> {
    if transform.determinant().abs() < f32::EPSILON {
        return None;
    }
    let inverse = transform.inverse();
    // The direction is left unnormalized so the object-space parameter equals
    // the world-space distance along the normalized world ray.
    let local = Ray::new(
        inverse.transform_point3(ray.origin),
        inverse.transform_vector3(ray.direction),
    );

    let mut nearest: Option<f32> = None;
    for triangle in mesh.triangles() {
        if let Some(t) = intersect_triangle(&local, triangle) {
            if nearest.map(|best| t < best).unwrap_or(true) {
                nearest = Some(t);
            }
        }
    }
    nearest
}

/// Moller-Trumbore ray/triangle intersection, both winding orders accepted.
fn intersect_triangle(ray: &Ray, triangle: [Vec3; 3]) -> Option<f32> {
    const EPSILON: f32 = 1e-7;
    let [a, b, c] = triangle;
    let edge1 = b - a;
    let edge2 = c - a;
    let p = ray.direction.cross(edge2);
    let det = edge1.dot(p);
    if det.abs() < EPSILON {
        return None;
    }
    let inv_det = 1.0 / det;
    let to_origin = ray.origin - a;
    let u = to_origin.dot(p) * inv_det;
    if !(0.0..=1.0).contains(&u) {
        return None;
    }
    let q = to_origin.cross(edge1);
    let v = ray.direction.dot(q) * inv_det;
    if v < 0.0 || u + v > 1.0 {
        return None;
    }
    let t = edge2.dot(q) * inv_det;
    (t > EPSILON).then_some(t)
}
