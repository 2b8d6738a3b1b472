use glam::{Mat4, Vec2, Vec3, Vec3A};

/// A box expressed as a corner plus three edge vectors.
#[derive(Debug, Clone, Copy, PartialEq)]
struct OrientedBox {
    corner: Vec3A,
    axes: [Vec3A; 3],
}

impl OrientedBox {
    fn corners(&self) -> [Vec3A; 8] {
        let [a, b, c] = self.axes;
        let p = self.corner;
        [p, p + a, p + b, p + a + b, p + c, p + a + c, p + b + c, p + a + b + c]
    }
}

/// Axis aligned bounds that remember their original box after a transform.
///
/// Transforming an axis aligned box and re-fitting it loses precision every time. Once
/// transformed, these bounds keep the exact (oriented) box alongside the refitted axis
/// aligned one, and [`Bounds3Ext::test_plane`] answers from the exact box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds3Ext {
    min: Vec3A,
    max: Vec3A,
    empty: bool,
    oriented: Option<OrientedBox>,
}

impl Default for Bounds3Ext {
    fn default() -> Self {
        Self::empty()
    }
}

impl Bounds3Ext {
    pub const fn empty() -> Self {
        Self {
            min: Vec3A::ZERO,
            max: Vec3A::ZERO,
            empty: true,
            oriented: None,
        }
    }

    pub fn from_min_max(min: Vec3, max: Vec3) -> Self {
        let (min, max) = (Vec3A::from(min), Vec3A::from(max));
        Self {
            min: min.min(max),
            max: min.max(max),
            empty: false,
            oriented: None,
        }
    }

    pub fn from_center_half_extent(center: Vec3, half_extent: Vec3) -> Self {
        Self::from_min_max(center - half_extent, center + half_extent)
    }

    pub fn is_empty(&self) -> bool {
        self.empty
    }

    pub fn min(&self) -> Vec3 {
        self.min.into()
    }

    pub fn max(&self) -> Vec3 {
        self.max.into()
    }

    pub fn center(&self) -> Vec3 {
        ((self.min + self.max) * 0.5).into()
    }

    /// Half the length of the box diagonal.
    pub fn radius(&self) -> f32 {
        if self.empty {
            0.0
        } else {
            (self.max - self.min).length() * 0.5
        }
    }

    pub fn union(&mut self, other: &Self) {
        if other.empty {
            return;
        }
        if self.empty {
            *self = *other;
            return;
        }
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
        self.oriented = None;
    }

    pub fn union_point(&mut self, point: Vec3) {
        let point = Vec3A::from(point);
        if self.empty {
            *self = Self {
                min: point,
                max: point,
                empty: false,
                oriented: None,
            };
            return;
        }
        self.min = self.min.min(point);
        self.max = self.max.max(point);
        self.oriented = None;
    }

    fn oriented_box(&self) -> OrientedBox {
        self.oriented.unwrap_or_else(|| {
            let size = self.max - self.min;
            OrientedBox {
                corner: self.min,
                axes: [size * Vec3A::X, size * Vec3A::Y, size * Vec3A::Z],
            }
        })
    }

    /// The eight corners of the exact box.
    pub fn corners(&self) -> [Vec3; 8] {
        self.oriented_box().corners().map(Vec3::from)
    }

    /// These bounds carried through `transform`.
    pub fn transformed(&self, transform: &Mat4) -> Self {
        if self.empty {
            return *self;
        }
        let src = self.oriented_box();
        let oriented = OrientedBox {
            corner: transform.transform_point3a(src.corner),
            axes: src.axes.map(|axis| transform.transform_vector3a(axis)),
        };

        let corners = oriented.corners();
        let (min, max) = corners
            .iter()
            .skip(1)
            .fold((corners[0], corners[0]), |(min, max), &c| (min.min(c), max.max(c)));

        Self {
            min,
            max,
            empty: false,
            oriented: Some(oriented),
        }
    }

    /// Projects the box onto `normal`, returning the `(min, max)` signed distances.
    pub fn test_plane(&self, normal: Vec3) -> Vec2 {
        let normal = Vec3A::from(normal);
        if self.empty {
            return Vec2::ZERO;
        }
        match self.oriented {
            Some(oriented) => {
                let base = normal.dot(oriented.corner);
                oriented.axes.iter().fold(Vec2::splat(base), |depth, &axis| {
                    let d = normal.dot(axis);
                    if d < 0.0 {
                        Vec2::new(depth.x + d, depth.y)
                    } else {
                        Vec2::new(depth.x, depth.y + d)
                    }
                })
            }
            None => {
                let center = (self.min + self.max) * 0.5;
                let half = (self.max - self.min) * 0.5;
                let mid = normal.dot(center);
                let reach = normal.abs().dot(half);
                Vec2::new(mid - reach, mid + reach)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use glam::{Mat4, Vec2, Vec3};

    use super::Bounds3Ext;

    #[test]
    fn union_of_empty_is_identity() {
        let mut bnd = Bounds3Ext::empty();
        let other = Bounds3Ext::from_min_max(Vec3::splat(-1.0), Vec3::splat(1.0));
        bnd.union(&other);
        assert_eq!(bnd, other);

        bnd.union(&Bounds3Ext::empty());
        assert_eq!(bnd, other);
    }

    #[test]
    fn union_grows() {
        let mut bnd = Bounds3Ext::from_min_max(Vec3::ZERO, Vec3::ONE);
        bnd.union(&Bounds3Ext::from_min_max(Vec3::splat(2.0), Vec3::splat(3.0)));
        assert_eq!(bnd.min(), Vec3::ZERO);
        assert_eq!(bnd.max(), Vec3::splat(3.0));
        assert_eq!(bnd.center(), Vec3::splat(1.5));
    }

    #[test]
    fn test_plane_axis_aligned() {
        let bnd = Bounds3Ext::from_min_max(Vec3::new(-1.0, 0.0, 2.0), Vec3::new(1.0, 1.0, 4.0));
        assert_eq!(bnd.test_plane(Vec3::Z), Vec2::new(2.0, 4.0));
        assert_eq!(bnd.test_plane(Vec3::NEG_Z), Vec2::new(-4.0, -2.0));
    }

    #[test]
    fn rotated_bounds_stay_exact() {
        let bnd = Bounds3Ext::from_min_max(Vec3::splat(-1.0), Vec3::splat(1.0));
        let rot = Mat4::from_rotation_y(std::f32::consts::FRAC_PI_4);
        let there_and_back = bnd.transformed(&rot).transformed(&rot.inverse());

        // The refit box has grown, but the plane test still answers for the original cube.
        let depth = there_and_back.test_plane(Vec3::X);
        assert!((depth.x + 1.0).abs() < 1e-5);
        assert!((depth.y - 1.0).abs() < 1e-5);
        assert!(there_and_back.max().x > 1.1);
    }

    #[test]
    fn translated_center() {
        let bnd = Bounds3Ext::from_center_half_extent(Vec3::ZERO, Vec3::ONE);
        let moved = bnd.transformed(&Mat4::from_translation(Vec3::new(0.0, 0.0, 20.0)));
        assert_eq!(moved.center(), Vec3::new(0.0, 0.0, 20.0));
        assert!((moved.radius() - 3.0_f32.sqrt()).abs() < 1e-5);
    }
}
