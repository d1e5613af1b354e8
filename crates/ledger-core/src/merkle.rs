//! Binary Merkle commitment over a block's transaction ids.
//!
//! Leaves hold `sha256(datum)`, parents hold `sha256(left ‖ right)`. Whenever a level has
//! an odd number of nodes its last node is paired with itself. A single datum is its own
//! root and an empty input commits to the all-zero hash.

use crate::hashing::{sha256, sha256_concat};
use crate::Hash;

fn leaf_level<D: AsRef<[u8]>>(data: &[D]) -> Vec<Hash> {
    data.iter().map(|d| sha256(d.as_ref())).collect()
}

fn parent_level(level: &[Hash]) -> Vec<Hash> {
    let mut next = Vec::with_capacity(level.len().div_ceil(2));
    for pair in level.chunks(2) {
        let (a, b) = if pair.len() == 2 {
            (pair[0], pair[1])
        } else {
            (pair[0], pair[0])
        };
        next.push(sha256_concat(&[&a, &b]));
    }
    next
}

pub fn merkle_root<D: AsRef<[u8]>>(data: &[D]) -> Hash {
    if data.is_empty() {
        return [0u8; 32];
    }
    let mut level = leaf_level(data);
    while level.len() > 1 {
        level = parent_level(&level);
    }
    level[0]
}

/// One step of an inclusion proof: the sibling hash and whether it sits on the left.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProofStep {
    pub sibling: Hash,
    pub sibling_is_left: bool,
}

/// Sibling path from the leaf at `index` up to the root, or `None` if out of range.
pub fn merkle_proof<D: AsRef<[u8]>>(data: &[D], index: usize) -> Option<Vec<ProofStep>> {
    if index >= data.len() {
        return None;
    }
    let mut level = leaf_level(data);
    let mut pos = index;
    let mut path = Vec::new();
    while level.len() > 1 {
        let (sibling, sibling_is_left) = if pos % 2 == 0 {
            (*level.get(pos + 1).unwrap_or(&level[pos]), false)
        } else {
            (level[pos - 1], true)
        };
        path.push(ProofStep {
            sibling,
            sibling_is_left,
        });
        level = parent_level(&level);
        pos /= 2;
    }
    Some(path)
}

pub fn verify_proof(datum: &[u8], proof: &[ProofStep], root: &Hash) -> bool {
    let mut acc = sha256(datum);
    for step in proof {
        acc = if step.sibling_is_left {
            sha256_concat(&[&step.sibling, &acc])
        } else {
            sha256_concat(&[&acc, &step.sibling])
        };
    }
    &acc == root
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(n: usize) -> Vec<Vec<u8>> {
        (0..n).map(|i| format!("tx-{i}").into_bytes()).collect()
    }

    #[test]
    fn merkle_root_empty() {
        let data: Vec<Vec<u8>> = vec![];
        assert_eq!(merkle_root(&data), [0u8; 32]);
    }

    #[test]
    fn merkle_root_single_is_leaf_hash() {
        let data = ids(1);
        assert_eq!(merkle_root(&data), sha256(&data[0]));
    }

    #[test]
    fn merkle_root_two() {
        let data = ids(2);
        let expected = sha256_concat(&[&sha256(&data[0]), &sha256(&data[1])]);
        assert_eq!(merkle_root(&data), expected);
    }

    #[test]
    fn merkle_root_three_duplicates_last() {
        let data = ids(3);
        let (h0, h1, h2) = (sha256(&data[0]), sha256(&data[1]), sha256(&data[2]));
        let left = sha256_concat(&[&h0, &h1]);
        let right = sha256_concat(&[&h2, &h2]);
        assert_eq!(merkle_root(&data), sha256_concat(&[&left, &right]));
    }

    #[test]
    fn odd_rule_applies_on_upper_levels() {
        // five leaves -> three parents -> the third parent pairs with itself
        let data = ids(5);
        let l: Vec<Hash> = data.iter().map(sha256).collect();
        let p0 = sha256_concat(&[&l[0], &l[1]]);
        let p1 = sha256_concat(&[&l[2], &l[3]]);
        let p2 = sha256_concat(&[&l[4], &l[4]]);
        let q0 = sha256_concat(&[&p0, &p1]);
        let q1 = sha256_concat(&[&p2, &p2]);
        assert_eq!(merkle_root(&data), sha256_concat(&[&q0, &q1]));
    }

    #[test]
    fn order_matters() {
        let mut data = ids(4);
        let root = merkle_root(&data);
        data.swap(0, 1);
        assert_ne!(merkle_root(&data), root);
    }

    #[test]
    fn proofs_verify_for_every_leaf() {
        for n in [1usize, 2, 3, 7, 16] {
            let data = ids(n);
            let root = merkle_root(&data);
            for (i, d) in data.iter().enumerate() {
                let proof = merkle_proof(&data, i).unwrap();
                assert!(verify_proof(d, &proof, &root), "leaf {i} of {n}");
            }
        }
    }

    #[test]
    fn proof_rejects_other_datum_and_out_of_range() {
        let data = ids(6);
        let root = merkle_root(&data);
        let proof = merkle_proof(&data, 2).unwrap();
        assert!(!verify_proof(b"forged", &proof, &root));
        assert!(merkle_proof(&data, 6).is_none());
    }
}
