// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use std::fmt::Debug;

use tracing::trace;

use super::Predictor;
use crate::bit_reader::BitReader;
use crate::entropy_coding::decode::{Histograms, SymbolReader};
use crate::error::{Error, Result};

/// Number of properties available to tree splits: two static ones, position,
/// neighborhood values and differences, and the weighted-predictor error.
pub const NUM_PROPERTIES: usize = 16;

#[derive(Debug)]
pub enum TreeNode {
    Split {
        property: u8,
        val: i32,
        left: u32,
        right: u32,
    },
    Leaf {
        predictor: Predictor,
        offset: i32,
        multiplier: u32,
        id: u32,
    },
}

/// The meta-adaptive tree: a flat, topologically ordered node array (children
/// always follow their parent) plus the histograms of the leaf contexts.
pub struct Tree {
    pub nodes: Vec<TreeNode>,
    pub histograms: Histograms,
}

impl Debug for Tree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Tree[{:?}]", self.nodes)
    }
}

#[derive(Debug)]
pub struct PredictionResult {
    pub predictor: Predictor,
    pub offset: i64,
    pub multiplier: u32,
    pub context: u32,
}

const SPLIT_VAL_CONTEXT: usize = 0;
const PROPERTY_CONTEXT: usize = 1;
const PREDICTOR_CONTEXT: usize = 2;
const OFFSET_CONTEXT: usize = 3;
const MULTIPLIER_LOG_CONTEXT: usize = 4;
const MULTIPLIER_BITS_CONTEXT: usize = 5;
const NUM_TREE_CONTEXTS: usize = 6;

const HEIGHT_LIMIT: usize = 2048;

impl Tree {
    pub fn read(br: &mut BitReader, size_limit: usize) -> Result<Tree> {
        debug_assert!(size_limit <= u32::MAX as usize);
        let tree_histograms = Histograms::decode(NUM_TREE_CONTEXTS, br, true)?;
        let mut tree_reader = SymbolReader::new(&tree_histograms, br, None)?;
        let mut tree: Vec<TreeNode> = vec![];
        let mut to_decode = 1usize;
        let mut leaf_id = 0;
        while to_decode > 0 {
            if tree.len() > size_limit {
                return Err(Error::TreeTooLarge(tree.len(), size_limit));
            }
            to_decode -= 1;
            let property = tree_reader.read_unsigned(&tree_histograms, br, PROPERTY_CONTEXT)?;
            if let Some(property) = property.checked_sub(1) {
                // Inner node.
                if property as usize >= NUM_PROPERTIES {
                    return Err(Error::InvalidProperty(property));
                }
                let val = tree_reader.read_signed(&tree_histograms, br, SPLIT_VAL_CONTEXT)?;
                let left = (tree.len() + to_decode + 1) as u32;
                let node = TreeNode::Split {
                    property: property as u8,
                    val,
                    left,
                    right: left + 1,
                };
                trace!("split node {:?}", node);
                to_decode += 2;
                tree.push(node);
            } else {
                let predictor = Predictor::try_from(tree_reader.read_unsigned(
                    &tree_histograms,
                    br,
                    PREDICTOR_CONTEXT,
                )?)?;
                let offset = tree_reader.read_signed(&tree_histograms, br, OFFSET_CONTEXT)?;
                let mul_log =
                    tree_reader.read_unsigned(&tree_histograms, br, MULTIPLIER_LOG_CONTEXT)?;
                if mul_log >= 31 {
                    return Err(Error::TreeMultiplierTooLarge(mul_log, 31));
                }
                let mul_bits =
                    tree_reader.read_unsigned(&tree_histograms, br, MULTIPLIER_BITS_CONTEXT)?;
                let multiplier = (mul_bits as u64 + 1) << mul_log;
                if multiplier > u32::MAX as u64 {
                    return Err(Error::TreeMultiplierBitsTooLarge(mul_bits, mul_log));
                }
                let node = TreeNode::Leaf {
                    predictor,
                    offset,
                    id: leaf_id,
                    multiplier: multiplier as u32,
                };
                leaf_id += 1;
                trace!("leaf node {:?}", node);
                tree.push(node);
            }
        }
        tree_reader.check_final_state(&tree_histograms)?;

        // The decode order guarantees children follow their parents; bound
        // the height to keep lookup cost and stack usage predictable.
        let mut height = vec![0usize; tree.len()];
        for i in 0..tree.len() {
            if height[i] > HEIGHT_LIMIT {
                return Err(Error::TreeTooLarge(height[i], HEIGHT_LIMIT));
            }
            if let TreeNode::Split { left, right, .. } = tree[i] {
                height[left as usize] = height[i] + 1;
                height[right as usize] = height[i] + 1;
            }
        }

        let histograms = Histograms::decode(tree.len().div_ceil(2), br, true)?;

        Ok(Tree {
            nodes: tree,
            histograms,
        })
    }

    pub fn num_leaves(&self) -> usize {
        self.nodes
            .iter()
            .filter(|node| matches!(node, TreeNode::Leaf { .. }))
            .count()
    }

    pub fn max_property(&self) -> usize {
        self.nodes
            .iter()
            .map(|node| match node {
                TreeNode::Leaf { .. } => 0,
                TreeNode::Split { property, .. } => *property,
            })
            .max()
            .unwrap() as usize
    }

    /// Walks the tree for the given property values, yielding the leaf's
    /// context, predictor, offset and multiplier.
    pub fn walk(&self, properties: &[i32]) -> PredictionResult {
        let mut node = 0usize;
        loop {
            match self.nodes[node] {
                TreeNode::Split {
                    property,
                    val,
                    left,
                    right,
                } => {
                    node = if properties[property as usize] > val {
                        left as usize
                    } else {
                        right as usize
                    };
                }
                TreeNode::Leaf {
                    predictor,
                    offset,
                    multiplier,
                    id,
                } => {
                    return PredictionResult {
                        predictor,
                        offset: offset as i64,
                        multiplier,
                        context: id,
                    };
                }
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn leaf(id: u32, predictor: Predictor) -> TreeNode {
        TreeNode::Leaf {
            predictor,
            offset: 0,
            multiplier: 1,
            id,
        }
    }

    fn dummy_histograms() -> Histograms {
        use crate::bit_writer::BitWriter;
        // lz77 off, single context, prefix code with a 1-entry alphabet.
        let mut bw = BitWriter::new();
        bw.write(1, 0); // lz77 disabled
        bw.write(1, 1); // use prefix code
        bw.write(4, 0); // hybrid uint config: split_exponent 0
        bw.write(1, 0); // alphabet size minus 1 == 0
        let bytes = bw.into_bytes();
        let mut br = BitReader::new(&bytes);
        Histograms::decode(1, &mut br, true).unwrap()
    }

    #[test]
    fn walk_two_level_tree() {
        let nodes = vec![
            TreeNode::Split {
                property: 2,
                val: 5,
                left: 1,
                right: 2,
            },
            leaf(0, Predictor::Zero),
            leaf(1, Predictor::West),
        ];
        let tree = Tree {
            nodes,
            histograms: dummy_histograms(),
        };
        let mut properties = [0i32; NUM_PROPERTIES];
        properties[2] = 10;
        assert_eq!(tree.walk(&properties).context, 0);
        properties[2] = 5;
        assert_eq!(tree.walk(&properties).context, 1);
        assert_eq!(tree.num_leaves(), 2);
        assert_eq!(tree.max_property(), 2);
    }
}
