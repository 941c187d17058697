// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Calldata encoding of Merkle proofs for the escape verifier
//!
//! Nodes of the proof tree are 252 bit field elements. Every path step packs
//! both siblings into one 512 bit value, the last entry packs the root with
//! the leaf index. Each 512 bit value is sent as two big-endian words.

use ethers::types::{U256, U512};
use serde::{Deserialize, Serialize};

const NODE_BITS: usize = 252;
const INDEX_BITS: usize = 248;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerklePathStep {
    pub left: U256,
    pub right: U256,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MerkleProof<L> {
    pub leaf: L,
    pub leaf_index: u64,
    /// Extra tree levels below the logical leaves
    pub leaf_prefix_length: u8,
    /// Ordered from the leaf to the root
    pub path: Vec<MerklePathStep>,
    pub root: U256,
    #[serde(default)]
    pub extra_leaf_count: u32,
}

/// Returns `2 * (path.len() + 1)` words in the order the verifier reads them.
pub fn serialize_merkle_proof_for_escape<L>(proof: &MerkleProof<L>) -> Vec<U256> {
    let mut words = Vec::with_capacity(2 * (proof.path.len() + 1));
    for step in &proof.path {
        let packed = ((low_bits(step.left, NODE_BITS) << NODE_BITS)
            | low_bits(step.right, NODE_BITS))
            << 8;
        words.extend(split_words(packed));
    }

    let adjusted_index = U512::from(proof.leaf_index) << proof.leaf_prefix_length as usize;
    let packed = (((low_bits(proof.root, NODE_BITS) << 4) << INDEX_BITS)
        | (adjusted_index & mask(INDEX_BITS)))
        << 8;
    words.extend(split_words(packed));
    words
}

fn mask(bits: usize) -> U512 {
    (U512::one() << bits) - U512::one()
}

fn low_bits(value: U256, bits: usize) -> U512 {
    U512::from(value) & mask(bits)
}

/// `[high, low]` 256 bit halves
fn split_words(value: U512) -> [U256; 2] {
    let mut bytes = [0u8; 64];
    value.to_big_endian(&mut bytes);
    [
        U256::from_big_endian(&bytes[..32]),
        U256::from_big_endian(&bytes[32..]),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    fn word(bytes: [u8; 32]) -> U256 {
        U256::from_big_endian(&bytes)
    }

    fn step(left: [u8; 32], right: [u8; 32]) -> MerklePathStep {
        MerklePathStep {
            left: word(left),
            right: word(right),
        }
    }

    fn escape_proof() -> MerkleProof<()> {
        MerkleProof {
            leaf: (),
            leaf_index: 7,
            leaf_prefix_length: 3,
            path: vec![
                step(
                    [0u8; 32],
                    hex!("004254432d313000000000000000000080000000000000048000000000000003"),
                ),
                step(
                    hex!("0726c9603ac7bccf9523718f2f1b45fac7673780ae5089ecf2ab0e67f96f7dd0"),
                    hex!("0beef00000000000000000000000000000000000000000000000000000000000"),
                ),
                step(
                    hex!("0271eb38f2bf004c2407a88958620a5d2c25fcee84590e50f0d2e37858bfba62"),
                    hex!("0000000000000000000000000000000000000000000080000000000000450001"),
                ),
                step(
                    hex!("028109b4e56fad0455aa4b316045c93937b1e7e4e0fc663db375b9e67c80c620"),
                    hex!("040e52d372a32b20035f44f456e7beea936b35298c64f5b8d6a56604ff4b3a6d"),
                ),
                step(
                    hex!("037ff447129584d02735f8b24db6d39dfc7d1ccbd7459fca871b795bffbeddf2"),
                    hex!("00968c9e36fd542708ca7d03ce09b81835ee1da53d50faa4bba820b28da6f93e"),
                ),
                step(
                    hex!("07d54313f8a6085c0f072dab5a3bbb28132f74b4adc3a00238c465163d052ed4"),
                    hex!("0490d6399cb336c5b4f017c608cdf662dba1942fbbc9c744d7e1cdda5feedaf9"),
                ),
            ],
            root: word(hex!(
                "00c9c74a31d9247f04cc9dbef31686d072fec342810c56d53855fa81e7af4bfd"
            )),
            extra_leaf_count: 0,
        }
    }

    #[test]
    fn test_serialize_escape_proof() {
        let expected: Vec<U256> = [
            "0",
            "30001526795319849252324097071977050905586053462486420188706939170735295300352",
            "51755519582484935180678720569846960714349028541078472964416237606474853375243",
            "108074501258364212671951141525442839776135535004087860430382408120666966458368",
            "17694445779186356052184739537155289443108441618591601491420520392058218456608",
            "154742504910672535520018688",
            "18121855379086738056127543246288844289035300259056337124023244527956344463876",
            "6478720698574293975535197600228144301494206361683389185958982644949786979584",
            "25328225043177823319220877681895856553959192982182631511906782068825060663072",
            "68095377834997473110967502460299490343402840164279191569551851314365135928832",
            "56687861124970118891962212466772367015533463385725521495813263122984365911364",
            "65511553092019813532680860505595526153543086133745386269528099820127758514432",
            "5704187325266392042567303450826654811460944722812564435329740863596318212048",
            "14336",
        ]
        .iter()
        .map(|s| U256::from_dec_str(s).unwrap())
        .collect();

        assert_eq!(serialize_merkle_proof_for_escape(&escape_proof()), expected);
    }

    #[test]
    fn test_root_only_proof() {
        let proof = MerkleProof {
            leaf: "leaf".to_string(),
            leaf_index: 1,
            leaf_prefix_length: 0,
            path: vec![],
            root: U256::zero(),
            extra_leaf_count: 0,
        };
        assert_eq!(
            serialize_merkle_proof_for_escape(&proof),
            vec![U256::zero(), U256::from(256)]
        );
    }

    #[test]
    fn test_high_bits_are_dropped() {
        // bits above 252 of a node and above 248 of the shifted index are ignored
        let proof = MerkleProof {
            leaf: (),
            leaf_index: 1,
            leaf_prefix_length: 250,
            path: vec![MerklePathStep {
                left: U256::MAX,
                right: U256::MAX,
            }],
            root: U256::MAX,
            extra_leaf_count: 0,
        };
        let clean = MerkleProof {
            leaf_index: 0,
            leaf_prefix_length: 0,
            path: vec![MerklePathStep {
                left: U256::MAX >> 4,
                right: U256::MAX >> 4,
            }],
            root: U256::MAX >> 4,
            ..proof.clone()
        };
        let words = serialize_merkle_proof_for_escape(&proof);
        assert_eq!(words.len(), 4);
        assert_eq!(words, serialize_merkle_proof_for_escape(&clean));
        assert_eq!(words[3], U256::zero());
    }

    #[test]
    fn test_proof_from_json() {
        let proof: MerkleProof<serde_json::Value> = serde_json::from_str(
            r#"{
                "leaf": {"balance": "10"},
                "leafIndex": 7,
                "leafPrefixLength": 3,
                "path": [],
                "root": "0xc9c74a31d9247f04cc9dbef31686d072fec342810c56d53855fa81e7af4bfd"
            }"#,
        )
        .unwrap();
        assert_eq!(proof.extra_leaf_count, 0);
        assert_eq!(
            serialize_merkle_proof_for_escape(&proof),
            serialize_merkle_proof_for_escape(&MerkleProof {
                leaf: (),
                path: vec![],
                ..escape_proof()
            })
        );
    }
}
