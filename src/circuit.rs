//! ZK-SNARK circuit for anonymous group membership.
//!
//! The circuit proves, for public `(root, nullifier_hash, external_message_hash)`:
//! 1. knowledge of `(trapdoor, nullifier_secret)` whose Poseidon commitment is a leaf,
//! 2. a Merkle path of [`TREE_DEPTH`] levels from that leaf to `root`,
//! 3. `nullifier_hash = H(nullifier_secret, external_message_hash)`.
//!
//! Sibling values and position bits are private, so the proven leaf index
//! never reaches the instance column.

use crate::TREE_DEPTH;
use halo2_gadgets::poseidon::{
    primitives::{ConstantLength, P128Pow5T3},
    Hash as PoseidonHash, Pow5Chip, Pow5Config,
};
use halo2_proofs::{
    circuit::{AssignedCell, Layouter, SimpleFloorPlanner, Value},
    plonk::{Advice, Circuit, Column, ConstraintSystem, Error, Expression, Instance, Selector},
    poly::Rotation,
};
use pasta_curves::group::ff::Field;
use pasta_curves::pallas;

/// Instance row holding the Merkle root.
pub const ROOT_ROW: usize = 0;
/// Instance row holding the nullifier hash.
pub const NULLIFIER_ROW: usize = 1;
/// Instance row holding the external message hash.
pub const MESSAGE_ROW: usize = 2;

type Cell = AssignedCell<pallas::Base, pallas::Base>;

#[derive(Debug, Clone)]
pub struct MembershipConfig {
    advice: [Column<Advice>; 5],
    instance: Column<Instance>,
    q_swap: Selector,
    poseidon: Pow5Config<pallas::Base, 3, 2>,
}

impl MembershipConfig {
    /// Orders `(current, sibling)` into `(left, right)` according to the position bit.
    ///
    /// A bit of 1 means `current` is the right child.
    fn conditional_swap(
        &self,
        mut layouter: impl Layouter<pallas::Base>,
        current: &Cell,
        sibling: Value<pallas::Base>,
        position: Value<pallas::Base>,
    ) -> Result<(Cell, Cell), Error> {
        layouter.assign_region(
            || "conditional swap",
            |mut region| {
                self.q_swap.enable(&mut region, 0)?;

                let current = current.copy_advice(|| "current", &mut region, self.advice[0], 0)?;
                let sibling_cell =
                    region.assign_advice(|| "sibling", self.advice[1], 0, || sibling)?;
                let bit = region.assign_advice(|| "position bit", self.advice[2], 0, || position)?;

                let ordered = current
                    .value()
                    .zip(sibling_cell.value())
                    .zip(bit.value())
                    .map(|((cur, sib), bit)| {
                        if *bit == pallas::Base::ONE {
                            (*sib, *cur)
                        } else {
                            (*cur, *sib)
                        }
                    });

                let left =
                    region.assign_advice(|| "left", self.advice[3], 0, || ordered.map(|(l, _)| l))?;
                let right = region.assign_advice(
                    || "right",
                    self.advice[4],
                    0,
                    || ordered.map(|(_, r)| r),
                )?;
                Ok((left, right))
            },
        )
    }

    fn hash_pair(
        &self,
        mut layouter: impl Layouter<pallas::Base>,
        left: Cell,
        right: Cell,
    ) -> Result<Cell, Error> {
        let chip = Pow5Chip::construct(self.poseidon.clone());
        let hasher = PoseidonHash::<_, _, P128Pow5T3, ConstantLength<2>, 3, 2>::init(
            chip,
            layouter.namespace(|| "poseidon init"),
        )?;
        hasher.hash(layouter.namespace(|| "poseidon hash"), [left, right])
    }
}

/// Private witness of the membership statement.
///
/// `positions[i]` is 1 when the path node at level `i` is a right child.
#[derive(Debug, Clone)]
pub struct MembershipCircuit {
    pub trapdoor: Value<pallas::Base>,
    pub nullifier_secret: Value<pallas::Base>,
    pub siblings: [Value<pallas::Base>; TREE_DEPTH],
    pub positions: [Value<pallas::Base>; TREE_DEPTH],
}

impl Default for MembershipCircuit {
    fn default() -> Self {
        Self {
            trapdoor: Value::unknown(),
            nullifier_secret: Value::unknown(),
            siblings: [Value::unknown(); TREE_DEPTH],
            positions: [Value::unknown(); TREE_DEPTH],
        }
    }
}

impl Circuit<pallas::Base> for MembershipCircuit {
    type Config = MembershipConfig;
    type FloorPlanner = SimpleFloorPlanner;

    fn without_witnesses(&self) -> Self {
        Self::default()
    }

    fn configure(meta: &mut ConstraintSystem<pallas::Base>) -> Self::Config {
        let advice = [
            meta.advice_column(),
            meta.advice_column(),
            meta.advice_column(),
            meta.advice_column(),
            meta.advice_column(),
        ];
        for column in &advice {
            meta.enable_equality(*column);
        }

        let instance = meta.instance_column();
        meta.enable_equality(instance);

        let rc_a = [meta.fixed_column(), meta.fixed_column(), meta.fixed_column()];
        let rc_b = [meta.fixed_column(), meta.fixed_column(), meta.fixed_column()];
        meta.enable_constant(rc_b[0]);

        let poseidon = Pow5Chip::configure::<P128Pow5T3>(
            meta,
            [advice[0], advice[1], advice[2]],
            advice[3],
            rc_a,
            rc_b,
        );

        let q_swap = meta.selector();
        meta.create_gate("conditional swap", |meta| {
            let q = meta.query_selector(q_swap);
            let current = meta.query_advice(advice[0], Rotation::cur());
            let sibling = meta.query_advice(advice[1], Rotation::cur());
            let bit = meta.query_advice(advice[2], Rotation::cur());
            let left = meta.query_advice(advice[3], Rotation::cur());
            let right = meta.query_advice(advice[4], Rotation::cur());
            let one = Expression::Constant(pallas::Base::ONE);

            vec![
                q.clone() * bit.clone() * (one - bit.clone()),
                q.clone()
                    * (left - (current.clone() + bit.clone() * (sibling.clone() - current.clone()))),
                q * (right - (sibling.clone() + bit * (current - sibling))),
            ]
        });

        MembershipConfig {
            advice,
            instance,
            q_swap,
            poseidon,
        }
    }

    fn synthesize(
        &self,
        config: Self::Config,
        mut layouter: impl Layouter<pallas::Base>,
    ) -> Result<(), Error> {
        let (trapdoor, nullifier_secret) = layouter.assign_region(
            || "identity secrets",
            |mut region| {
                let trapdoor =
                    region.assign_advice(|| "trapdoor", config.advice[0], 0, || self.trapdoor)?;
                let nullifier_secret = region.assign_advice(
                    || "nullifier secret",
                    config.advice[1],
                    0,
                    || self.nullifier_secret,
                )?;
                Ok((trapdoor, nullifier_secret))
            },
        )?;

        let mut current = config.hash_pair(
            layouter.namespace(|| "identity commitment"),
            trapdoor,
            nullifier_secret.clone(),
        )?;

        for (level, (sibling, position)) in self.siblings.iter().zip(self.positions.iter()).enumerate() {
            let (left, right) = config.conditional_swap(
                layouter.namespace(|| format!("merkle level {level} swap")),
                &current,
                *sibling,
                *position,
            )?;
            current = config.hash_pair(
                layouter.namespace(|| format!("merkle level {level} hash")),
                left,
                right,
            )?;
        }
        layouter.constrain_instance(current.cell(), config.instance, ROOT_ROW)?;

        let message_hash = layouter.assign_region(
            || "external message hash",
            |mut region| {
                region.assign_advice_from_instance(
                    || "external message hash",
                    config.instance,
                    MESSAGE_ROW,
                    config.advice[2],
                    0,
                )
            },
        )?;

        let nullifier_hash = config.hash_pair(
            layouter.namespace(|| "nullifier hash"),
            nullifier_secret,
            message_hash,
        )?;
        layouter.constrain_instance(nullifier_hash.cell(), config.instance, NULLIFIER_ROW)?;

        Ok(())
    }
}
