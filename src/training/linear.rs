//! Linear regression trained with full-batch SGD
//!
//! Features and target are z-scored before fitting; the fitted layer is a
//! single `Linear(d, 1)` stored with burn's named MessagePack recorder.

use burn::backend::{Autodiff, NdArray};
use burn::module::{AutodiffModule, Module};
use burn::nn::{Initializer, Linear, LinearConfig};
use burn::optim::{GradientsParams, Optimizer, SgdConfig};
use burn::record::{FullPrecisionSettings, NamedMpkFileRecorder, Recorder};
use burn::tensor::backend::Backend;
use burn::tensor::{ElementConversion, Tensor, TensorData};
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::metrics::TrainingHistory;
use super::split::{FeatureNormalization, TargetNormalization};
use crate::{HoopsError, Result};

/// Backend used for inference and for loading saved weights
pub type InferenceBackend = NdArray<f32>;
/// Backend used while fitting
pub type TrainingBackend = Autodiff<InferenceBackend>;

/// Hyperparameters for the SGD fit
#[derive(Debug, Clone, Copy)]
pub struct LinearFitConfig {
    pub epochs: usize,
    pub learning_rate: f64,
}

impl Default for LinearFitConfig {
    fn default() -> Self {
        LinearFitConfig {
            epochs: 500,
            learning_rate: 0.1,
        }
    }
}

/// Scaling parameters stored next to the weights
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearScaling {
    pub features: FeatureNormalization,
    pub target: TargetNormalization,
}

/// Fitted linear model
#[derive(Debug)]
pub struct LinearRegressor {
    model: Linear<InferenceBackend>,
    scaling: LinearScaling,
}

fn to_tensor<B: Backend>(rows: &[Vec<f32>], dim: usize, device: &B::Device) -> Tensor<B, 2> {
    let flat: Vec<f32> = rows.iter().flat_map(|r| r.iter().copied()).collect();
    Tensor::from_data(TensorData::new(flat, [rows.len(), dim]), device)
}

fn mse_loss<B: Backend>(predictions: Tensor<B, 2>, targets: Tensor<B, 2>) -> Tensor<B, 1> {
    (predictions - targets).powf_scalar(2.0).mean()
}

impl LinearRegressor {
    /// Fit on raw feature rows and targets
    pub fn fit(x: &[Vec<f64>], y: &[f64], config: LinearFitConfig) -> Result<(Self, TrainingHistory)> {
        if x.is_empty() || x.len() != y.len() {
            return Err(HoopsError::Model(format!(
                "cannot fit {} feature rows against {} targets",
                x.len(),
                y.len()
            )));
        }

        let scaling = LinearScaling {
            features: FeatureNormalization::fit(x),
            target: TargetNormalization::fit(y),
        };
        let dim = scaling.features.dim();

        let device: <TrainingBackend as Backend>::Device = Default::default();
        let rows: Vec<Vec<f32>> = x.iter().map(|r| scaling.features.normalize_row(r)).collect();
        let targets: Vec<Vec<f32>> = y.iter().map(|v| vec![scaling.target.normalize(*v)]).collect();
        let x_train = to_tensor::<TrainingBackend>(&rows, dim, &device);
        let y_train = to_tensor::<TrainingBackend>(&targets, 1, &device);

        let mut model: Linear<TrainingBackend> = LinearConfig::new(dim, 1)
            .with_initializer(Initializer::Zeros)
            .init(&device);
        let mut optimizer = SgdConfig::new().init();
        let mut history = TrainingHistory::new();

        log::info!(
            "Fitting linear regression on {} rows x {} features for {} epochs",
            x.len(),
            dim,
            config.epochs
        );

        for epoch in 0..config.epochs {
            let predictions = model.forward(x_train.clone());
            let loss = mse_loss(predictions, y_train.clone());
            let loss_val: f32 = loss.clone().into_scalar().elem();
            history.record_epoch(epoch, loss_val as f64);

            let grads = loss.backward();
            let grads = GradientsParams::from_grads(grads, &model);
            model = optimizer.step(config.learning_rate, model, grads);

            if epoch % 100 == 0 || epoch + 1 == config.epochs {
                log::debug!("Epoch {}/{}: loss={:.6}", epoch + 1, config.epochs, loss_val);
            }
        }

        Ok((
            LinearRegressor {
                model: model.valid(),
                scaling,
            },
            history,
        ))
    }

    pub fn n_features(&self) -> usize {
        self.scaling.features.dim()
    }

    pub fn scaling(&self) -> &LinearScaling {
        &self.scaling
    }

    pub fn predict(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let dim = self.n_features();
        if let Some(bad) = rows.iter().find(|r| r.len() != dim) {
            return Err(HoopsError::Model(format!(
                "expected {} features, got {}",
                dim,
                bad.len()
            )));
        }

        let device: <InferenceBackend as Backend>::Device = Default::default();
        let normalized: Vec<Vec<f32>> = rows.iter().map(|r| self.scaling.features.normalize_row(r)).collect();
        let output = self
            .model
            .forward(to_tensor::<InferenceBackend>(&normalized, dim, &device))
            .into_data();
        let values = output
            .as_slice::<f32>()
            .map_err(|e| HoopsError::Model(format!("{:?}", e)))?;
        Ok(values.iter().map(|v| self.scaling.target.denormalize(*v)).collect())
    }

    /// Save weights to `<stem>.mpk`
    pub fn save(&self, stem: &Path) -> Result<()> {
        let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
        recorder
            .record(self.model.clone().into_record(), stem.to_path_buf())
            .map_err(|e| HoopsError::Model(format!("failed to save weights: {}", e)))
    }

    /// Load weights saved by `save`
    pub fn load(stem: &Path, scaling: LinearScaling) -> Result<Self> {
        let device: <InferenceBackend as Backend>::Device = Default::default();
        let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
        let record = recorder
            .load(stem.to_path_buf(), &device)
            .map_err(|e| HoopsError::Model(format!("failed to load weights: {}", e)))?;

        let model: Linear<InferenceBackend> = LinearConfig::new(scaling.features.dim(), 1).init(&device);
        Ok(LinearRegressor {
            model: model.load_record(record),
            scaling,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line_data() -> (Vec<Vec<f64>>, Vec<f64>) {
        // y = 2a - b + 3
        let x: Vec<Vec<f64>> = (0..20)
            .map(|i| vec![i as f64, ((i * 7) % 5) as f64])
            .collect();
        let y = x.iter().map(|r| 2.0 * r[0] - r[1] + 3.0).collect();
        (x, y)
    }

    #[test]
    fn test_fit_recovers_linear_relation() {
        let (x, y) = line_data();
        let (model, history) = LinearRegressor::fit(&x, &y, LinearFitConfig::default()).unwrap();
        assert!(history.final_loss().unwrap() < 1e-3);

        let predicted = model.predict(&[vec![10.0, 2.0]]).unwrap();
        assert!((predicted[0] - 21.0).abs() < 0.1, "got {}", predicted[0]);
    }

    #[test]
    fn test_rejects_wrong_width() {
        let (x, y) = line_data();
        let (model, _) = LinearRegressor::fit(&x, &y, LinearFitConfig { epochs: 5, learning_rate: 0.1 }).unwrap();
        assert!(model.predict(&[vec![1.0]]).is_err());
        assert!(LinearRegressor::fit(&x, &y[..3], LinearFitConfig::default()).is_err());
    }

    #[test]
    fn test_save_and_load() {
        let (x, y) = line_data();
        let (model, _) = LinearRegressor::fit(&x, &y, LinearFitConfig::default()).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let stem = dir.path().join("weights");
        model.save(&stem).unwrap();

        let loaded = LinearRegressor::load(&stem, model.scaling().clone()).unwrap();
        let a = model.predict(&x[..3]).unwrap();
        let b = loaded.predict(&x[..3]).unwrap();
        for (p, q) in a.iter().zip(b.iter()) {
            assert!((p - q).abs() < 1e-6);
        }
    }
}
