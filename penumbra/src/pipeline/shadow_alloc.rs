use std::{array, collections::VecDeque};

use glam::UVec2;

use crate::util::math::{round_down_pot, round_up_div};

#[cfg_attr(test, derive(Debug, PartialEq))]
enum AtlasNode {
    Vacant,
    Leaf(u32),
    Children([usize; 4]),
}

impl AtlasNode {
    fn try_alloc(nodes: &mut Vec<AtlasNode>, node_idx: usize, relative_order: u32, index: u32) -> bool {
        match nodes[node_idx] {
            AtlasNode::Vacant => {
                if relative_order == 0 {
                    nodes[node_idx] = AtlasNode::Leaf(index);

                    true
                } else {
                    let base_idx = nodes.len();
                    nodes[node_idx] = AtlasNode::Children(array::from_fn(|idx| base_idx + idx));
                    nodes.resize_with(base_idx + 4, || AtlasNode::Vacant);

                    AtlasNode::try_alloc(nodes, node_idx, relative_order, index)
                }
            }
            AtlasNode::Leaf(_) => false,
            AtlasNode::Children(children) => {
                if relative_order == 0 {
                    return false;
                }

                children
                    .into_iter()
                    .any(|child| AtlasNode::try_alloc(nodes, child, relative_order - 1, index))
            }
        }
    }
}

/// Placement of every accepted shadow inside one shared depth texture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShadowAtlas {
    pub texture_dimensions: UVec2,
    pub coordinates: Vec<AtlasCoordinate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AtlasCoordinate {
    pub offset: UVec2,
    pub size: u32,
    /// Slave index the region belongs to.
    pub index: u32,
}

/// Packs square shadow maps of `(slave index, size)` into a quadtree atlas no wider than
/// `max_dimension`.
///
/// Sizes are rounded down to powers of two and the largest map decides the root tile size.
/// Returns `None` when there is nothing to place or the largest map does not fit.
pub fn allocate_shadow_atlas(mut maps: Vec<(u32, u32)>, max_dimension: u32) -> Option<ShadowAtlas> {
    profiling::scope!("allocate_shadow_atlas");

    maps.retain(|&(_, size)| size != 0);
    for (_, size) in &mut maps {
        *size = round_down_pot(*size);
    }
    maps.sort_by(|(_, a), (_, b)| b.cmp(a));

    let root_size = maps.first()?.1;
    if max_dimension < root_size {
        return None;
    }
    let min_leading_zeros = root_size.leading_zeros();

    let mut nodes = Vec::with_capacity(maps.len().saturating_sub(1).next_power_of_two());
    let mut roots: Vec<usize> = Vec::new();

    for (index, size) in maps {
        let order = size.leading_zeros() - min_leading_zeros;

        // Earlier roots may still have room for smaller maps.
        let placed = roots
            .iter()
            .any(|&root| AtlasNode::try_alloc(&mut nodes, root, order, index));
        if !placed {
            let root = nodes.len();
            nodes.push(AtlasNode::Vacant);
            roots.push(root);
            AtlasNode::try_alloc(&mut nodes, root, order, index);
        }
    }

    let available_columns = max_dimension / root_size;
    let root_count = roots.len() as u32;
    let rows_needed = round_up_div(root_count, available_columns);
    let columns_needed = round_up_div(root_count, rows_needed);

    let texture_dimensions = UVec2::new(columns_needed, rows_needed) * root_size;

    let mut nodes_to_visit: VecDeque<_> = roots
        .into_iter()
        .enumerate()
        .map(|(root_idx, node_idx)| {
            let offset = UVec2::new(root_idx as u32 % columns_needed, root_idx as u32 / columns_needed) * root_size;

            (1_u32, offset, node_idx)
        })
        .collect();

    let mut coordinates = Vec::with_capacity(nodes.len());
    while let Some((root_divisor, offset, node_idx)) = nodes_to_visit.pop_front() {
        let size = root_size / root_divisor;
        let half_size = size / 2;

        match nodes[node_idx] {
            AtlasNode::Vacant => {}
            AtlasNode::Leaf(index) => coordinates.push(AtlasCoordinate { offset, size, index }),
            AtlasNode::Children(children) => {
                let child_divisor = root_divisor * 2;
                nodes_to_visit.extend(children.into_iter().enumerate().map(|(child_idx, node_idx)| {
                    // child_idx turned from [0, 3] to a 2x2 square.
                    let child_2d_idx = UVec2::new(child_idx as u32 % 2, child_idx as u32 / 2);
                    let child_offset = offset + half_size * child_2d_idx;

                    (child_divisor, child_offset, node_idx)
                }))
            }
        }
    }

    Some(ShadowAtlas {
        texture_dimensions,
        coordinates,
    })
}

#[cfg(test)]
mod tests {
    use glam::UVec2;

    use super::{allocate_shadow_atlas, AtlasCoordinate, AtlasNode};

    fn coord(x: u32, y: u32, size: u32, index: u32) -> AtlasCoordinate {
        AtlasCoordinate {
            offset: UVec2::new(x, y),
            size,
            index,
        }
    }

    #[test]
    fn node_subdivision_single_failure() {
        let mut nodes = vec![AtlasNode::Vacant];

        assert!(AtlasNode::try_alloc(&mut nodes, 0, 0, 0));
        assert!(!AtlasNode::try_alloc(&mut nodes, 0, 0, 1));
        assert_eq!(&nodes, &[AtlasNode::Leaf(0)]);
    }

    #[test]
    fn node_subdivision_nested() {
        let mut nodes = vec![AtlasNode::Vacant];

        assert!(AtlasNode::try_alloc(&mut nodes, 0, 1, 0));
        assert!(AtlasNode::try_alloc(&mut nodes, 0, 1, 1));
        assert!(AtlasNode::try_alloc(&mut nodes, 0, 2, 2));
        assert!(AtlasNode::try_alloc(&mut nodes, 0, 1, 3));
        assert_eq!(
            &nodes,
            &[
                AtlasNode::Children([1, 2, 3, 4]),
                AtlasNode::Leaf(0),
                AtlasNode::Leaf(1),
                AtlasNode::Children([5, 6, 7, 8]),
                AtlasNode::Leaf(3),
                AtlasNode::Leaf(2),
                AtlasNode::Vacant,
                AtlasNode::Vacant,
                AtlasNode::Vacant,
            ]
        );
    }

    #[test]
    fn nothing_to_place() {
        assert_eq!(allocate_shadow_atlas(Vec::new(), 512), None);
        assert_eq!(allocate_shadow_atlas(vec![(0, 0)], 512), None);
        assert_eq!(allocate_shadow_atlas(vec![(0, 256)], 128), None);
    }

    #[test]
    fn single_row() {
        let res = allocate_shadow_atlas(vec![(0, 64), (1, 64), (2, 64)], 192).unwrap();
        assert_eq!(res.texture_dimensions, UVec2::new(192, 64));
        assert_eq!(res.coordinates, &[coord(0, 0, 64, 0), coord(64, 0, 64, 1), coord(128, 0, 64, 2)]);
    }

    #[test]
    fn wraps_into_rows() {
        let maps = (0..5).map(|i| (i, 64)).collect();
        let res = allocate_shadow_atlas(maps, 256).unwrap();
        assert_eq!(res.texture_dimensions, UVec2::new(192, 128));
        assert_eq!(res.coordinates[3], coord(0, 64, 64, 3));
        assert_eq!(res.coordinates[4], coord(64, 64, 64, 4));
    }

    #[test]
    fn mixed_sizes_share_a_root() {
        // Largest map is the root tile; smaller maps fill its quadrants.
        let res = allocate_shadow_atlas(vec![(7, 64), (3, 128), (9, 64)], 256).unwrap();
        assert_eq!(res.texture_dimensions, UVec2::new(256, 128));
        assert_eq!(
            res.coordinates,
            &[coord(0, 0, 128, 3), coord(128, 0, 64, 7), coord(192, 0, 64, 9)]
        );
    }

    #[test]
    fn sizes_round_down() {
        let res = allocate_shadow_atlas(vec![(0, 100)], 512).unwrap();
        assert_eq!(res.coordinates, &[coord(0, 0, 64, 0)]);
    }
}
