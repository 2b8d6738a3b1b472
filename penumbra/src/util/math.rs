//! Math utilites.

use glam::Mat4;
use num_traits::PrimInt;

/// Rounds `src` down to a power of two. Zero stays zero.
pub fn round_down_pot<T: PrimInt>(src: T) -> T {
    if src == T::zero() {
        return src;
    }
    let bits = (std::mem::size_of::<T>() * 8) as u32;
    T::one() << (bits - 1 - src.leading_zeros()) as usize
}

/// Performs integer division between a and b rounding up, instead of down
pub fn round_up_div<T: PrimInt>(a: T, b: T) -> T {
    (a + (b - T::one())) / b
}

/// Builds a matrix from row-major rows, so code can be written the way the matrices read on paper.
pub fn mat4_from_rows(rows: [[f32; 4]; 4]) -> Mat4 {
    Mat4::from_cols_array_2d(&rows).transpose()
}

#[cfg(test)]
mod tests {
    use glam::{Vec3, Vec4};

    use super::*;

    #[test]
    fn round_down() {
        assert_eq!(round_down_pot(0_u32), 0);
        assert_eq!(round_down_pot(1_u32), 1);
        assert_eq!(round_down_pot(300_u32), 256);
        assert_eq!(round_down_pot(512_u32), 512);
        assert_eq!(round_down_pot(u32::MAX), 1 << 31);
    }

    #[test]
    fn div_rounds_up() {
        assert_eq!(round_up_div(5_u32, 2), 3);
        assert_eq!(round_up_div(4_u32, 2), 2);
    }

    #[test]
    fn rows_are_rows() {
        let m = mat4_from_rows([
            [1.0, 0.0, 0.0, 5.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ]);
        assert_eq!(m.transform_point3(Vec3::ZERO), Vec3::new(5.0, 0.0, 0.0));
        assert_eq!(m.row(0), Vec4::new(1.0, 0.0, 0.0, 5.0));
    }
}
