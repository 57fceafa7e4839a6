//! Training checkpoints.
//!
//! A [`Checkpoint`] captures everything needed to resume a run exactly:
//! model weights, the optimizer with its accumulated buffers, the generator
//! state, the last completed epoch and the best validation loss. The basis
//! it was trained on is pinned by shape, knot policy and knot positions. It
//! is written atomically (see [`artifact`](super::artifact)).
use ndarray::{Array1, Array2};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::{
    mixing::{
        core::{
            artifact,
            basis::{BasisMatrix, KnotPolicy},
            shape::ShapeConstraint,
        },
        errors::{MixingError, MixingResult},
    },
    optimization::gradient_descent::GradientOptimizer,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub format_version: u32,
    pub n_nodes: usize,
    pub shape: ShapeConstraint,
    pub knot_policy: KnotPolicy,
    /// Knot reference points in the distance units used for training.
    pub knots: Array1<f64>,
    /// `K × T` weight tensor.
    pub weights: Array2<f64>,
    pub optimizer: GradientOptimizer,
    /// 1-based index of the last completed epoch.
    pub epoch: usize,
    pub best_val_loss: f64,
    pub rng: ChaCha8Rng,
}

impl Checkpoint {
    pub fn n_basis(&self) -> usize {
        self.weights.nrows()
    }

    pub fn n_slices(&self) -> usize {
        self.weights.ncols()
    }

    pub fn save(&self, path: &Path) -> MixingResult<()> {
        artifact::write_atomic(path, self)
    }

    /// # Errors
    /// `DataUnavailable`-class errors for a missing, undecodable or
    /// wrong-version file.
    pub fn load(path: &Path) -> MixingResult<Self> {
        let ckpt: Checkpoint = artifact::read(path)?;
        artifact::check_version(path, ckpt.format_version)?;
        if ckpt.weights.iter().any(|w| !w.is_finite()) {
            return Err(MixingError::MalformedFile {
                path: path.to_path_buf(),
                reason: "weights contain non-finite values".to_string(),
            });
        }
        Ok(ckpt)
    }

    /// `Ok(None)` when no file exists at `path`.
    pub fn load_if_exists(path: &Path) -> MixingResult<Option<Self>> {
        match Self::load(path) {
            Ok(ckpt) => Ok(Some(ckpt)),
            Err(MixingError::CheckpointNotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Check that the checkpoint fits a model on `basis` with `n_slices`
    /// weight slices.
    ///
    /// # Errors
    /// [`MixingError::CheckpointMismatch`] on any difference in node count,
    /// weight dimensions, shape, knot policy or knot positions.
    pub fn verify_dims(&self, basis: &BasisMatrix, n_slices: usize) -> MixingResult<()> {
        let n_nodes = basis.n_nodes();
        if self.n_nodes != n_nodes {
            return Err(MixingError::CheckpointMismatch {
                reason: format!("checkpoint has {} nodes, model has {n_nodes}", self.n_nodes),
            });
        }
        let expected = (basis.n_basis(), n_slices);
        if self.weights.dim() != expected {
            return Err(MixingError::CheckpointMismatch {
                reason: format!(
                    "checkpoint weights are {:?}, model expects {:?}",
                    self.weights.dim(),
                    expected
                ),
            });
        }
        let shape = basis.shape();
        if self.shape != shape {
            return Err(MixingError::CheckpointMismatch {
                reason: format!("checkpoint shape is {}, model shape is {shape}", self.shape),
            });
        }
        if self.knot_policy != basis.knot_policy() {
            return Err(MixingError::CheckpointMismatch {
                reason: format!(
                    "checkpoint knot policy is {:?}, model uses {:?}",
                    self.knot_policy,
                    basis.knot_policy()
                ),
            });
        }
        if self.knots.view() != basis.knots() {
            return Err(MixingError::CheckpointMismatch {
                reason: "checkpoint knots differ from the model's distances".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mixing::{
        core::{artifact::FORMAT_VERSION, data::DistanceVector},
        errors::ErrorKind,
    };
    use crate::optimization::gradient_descent::OptimizerKind;
    use ndarray::array;
    use rand::{RngCore, SeedableRng};

    /// Two nodes at distance 3. `OrderStatistics` and `Quantiles(4)` both
    /// place knots at `[0, 0, 3, 3]`, so only the policy tells them apart.
    fn basis(shape: ShapeConstraint, policy: KnotPolicy) -> BasisMatrix {
        let d = DistanceVector::new(array![0.0, 3.0, 3.0, 0.0], 2).unwrap();
        BasisMatrix::new(&d, shape, policy).unwrap()
    }

    fn sample_checkpoint() -> Checkpoint {
        let mut optimizer = GradientOptimizer::new(OptimizerKind::adam(0.01).unwrap());
        let mut w = array![[0.5, -0.25], [1.0, 0.0], [0.2, 0.3], [-0.1, 0.4]];
        optimizer.step(&mut w, &Array2::from_elem((4, 2), 0.1)).unwrap();
        let b = basis(ShapeConstraint::ConvexDec, KnotPolicy::OrderStatistics);
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        rng.next_u64();
        Checkpoint {
            format_version: FORMAT_VERSION,
            n_nodes: 2,
            shape: b.shape(),
            knot_policy: b.knot_policy(),
            knots: b.knots().to_owned(),
            weights: w,
            optimizer,
            epoch: 4,
            best_val_loss: 0.125,
            rng,
        }
    }

    #[test]
    // Purpose
    // -------
    // Weights, optimizer buffers and generator state survive a save/load.
    fn save_load_preserves_resume_state() {
        // Arrange
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.ckpt");
        let ckpt = sample_checkpoint();

        // Act
        ckpt.save(&path).unwrap();
        let mut back = Checkpoint::load(&path).unwrap();

        // Assert
        assert_eq!(back.weights, ckpt.weights);
        assert_eq!(back.optimizer, ckpt.optimizer);
        assert_eq!(back.epoch, 4);
        assert_eq!(back.best_val_loss, 0.125);
        let mut original_rng = ckpt.rng.clone();
        assert_eq!(back.rng.next_u64(), original_rng.next_u64());
    }

    #[test]
    fn load_if_exists_distinguishes_missing_from_broken() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.ckpt");
        assert!(Checkpoint::load_if_exists(&path).unwrap().is_none());

        std::fs::write(&path, b"not a checkpoint").unwrap();
        let err = Checkpoint::load_if_exists(&path).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DataUnavailable);
    }

    #[test]
    fn verify_dims_reports_mismatches() {
        let ckpt = sample_checkpoint();
        let b = basis(ShapeConstraint::ConvexDec, KnotPolicy::OrderStatistics);
        assert!(ckpt.verify_dims(&b, 2).is_ok());
        let err = ckpt.verify_dims(&b, 3).unwrap_err();
        assert!(matches!(err, MixingError::CheckpointMismatch { .. }));
        assert_eq!(err.kind(), ErrorKind::DataUnavailable);
        let concave = basis(ShapeConstraint::ConcaveInc, KnotPolicy::OrderStatistics);
        assert!(ckpt.verify_dims(&concave, 2).is_err());
    }

    #[test]
    // Purpose
    // -------
    // A checkpoint is bound to the knot policy and knot positions it was
    // trained with, even when the weight dimensions happen to agree.
    //
    // Given
    // -----
    // - Checkpoint trained on order-statistic knots over distances {0, 3}.
    // - A Quantiles(4) basis with identical K and identical knot values.
    // - An order-statistic basis over rescaled distances {0, 6}.
    //
    // Expect
    // ------
    // - Both are rejected with CheckpointMismatch.
    fn verify_dims_rejects_other_knot_policy_or_distances() {
        // Arrange
        let ckpt = sample_checkpoint();
        let quantiles = basis(ShapeConstraint::ConvexDec, KnotPolicy::Quantiles(4));
        let d = DistanceVector::new(array![0.0, 6.0, 6.0, 0.0], 2).unwrap();
        let stretched =
            BasisMatrix::new(&d, ShapeConstraint::ConvexDec, KnotPolicy::OrderStatistics).unwrap();

        // Act
        let by_policy = ckpt.verify_dims(&quantiles, 2);
        let by_knots = ckpt.verify_dims(&stretched, 2);

        // Assert
        assert_eq!(quantiles.n_basis(), ckpt.n_basis());
        assert_eq!(quantiles.knots(), ckpt.knots.view());
        assert!(matches!(by_policy, Err(MixingError::CheckpointMismatch { .. })));
        assert!(matches!(by_knots, Err(MixingError::CheckpointMismatch { .. })));
    }
}
