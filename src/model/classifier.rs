//! Classifier: the loaded network behind a `classify(tensor) -> logits` contract
//!
//! The weights are read once from a burn `CompactRecorder` artifact and never
//! touched again. Cloning a classifier clones tensor handles, not weight data,
//! so every clone evaluates the same parameters.

use std::path::{Path, PathBuf};

use burn::{
    module::Module,
    record::{CompactRecorder, Recorder},
    tensor::{backend::Backend, Tensor},
};
use tracing::{debug, info};

use crate::inference::ranker::Logits;
use crate::model::import;
use crate::model::resnet::{ResNet, ResNetConfig, ResNetRecord};
use crate::utils::error::{DefectError, Result};

/// File extension the compact recorder reads and writes
pub const WEIGHTS_EXTENSION: &str = "mpk";

/// Extensions read as PyTorch checkpoints instead of compact artifacts
pub const PYTORCH_EXTENSIONS: [&str; 2] = ["pth", "pt"];

/// Path the recorder actually uses for `path` (it always swaps in `.mpk`)
pub fn artifact_path(path: &Path) -> PathBuf {
    path.with_extension(WEIGHTS_EXTENSION)
}

/// Network with immutable, loaded weights
#[derive(Debug, Clone)]
pub struct Classifier<B: Backend> {
    model: ResNet<B>,
    device: B::Device,
    num_classes: usize,
}

impl<B: Backend> Classifier<B> {
    /// Load `weights` by extension: PyTorch checkpoints are imported,
    /// anything else is read as a compact artifact
    pub fn open(weights: &Path, config: &ResNetConfig, device: &B::Device) -> Result<Self> {
        let is_pytorch = weights
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| PYTORCH_EXTENSIONS.contains(&ext));

        if is_pytorch {
            Self::import_pytorch(weights, config, device)
        } else {
            Self::load(weights, config, device)
        }
    }

    /// Load the weight artifact for a network laid out as `config`
    ///
    /// Fails with [`DefectError::ModelLoad`] when the artifact is missing,
    /// cannot be decoded, or was saved for a different stem, head or layout.
    pub fn load(weights: &Path, config: &ResNetConfig, device: &B::Device) -> Result<Self> {
        let artifact = artifact_path(weights);
        if !artifact.is_file() {
            return Err(DefectError::ModelLoad(format!(
                "weight artifact not found: {}",
                artifact.display()
            )));
        }

        info!("Loading weights from {}", artifact.display());

        let record: ResNetRecord<B> = CompactRecorder::new()
            .load(artifact.clone(), device)
            .map_err(|e| {
                DefectError::ModelLoad(format!("failed to load {}: {:?}", artifact.display(), e))
            })?;

        Self::from_record(record, config, &artifact, device)
    }

    /// Import a PyTorch `state_dict` saved with torchvision's ResNet key names
    pub fn import_pytorch(path: &Path, config: &ResNetConfig, device: &B::Device) -> Result<Self> {
        let record = import::load_pytorch_record::<B>(path, device)?;
        Self::from_record(record, config, path, device)
    }

    /// Build the network from a decoded record after checking it fits `config`
    fn from_record(
        record: ResNetRecord<B>,
        config: &ResNetConfig,
        source: &Path,
        device: &B::Device,
    ) -> Result<Self> {
        // Reject a head trained for another label set before it is loaded
        let [features, width] = record.fc.weight.val().dims();
        if width != config.num_classes {
            return Err(DefectError::ModelLoad(format!(
                "{} has {} outputs but the label set has {} classes",
                source.display(),
                width,
                config.num_classes
            )));
        }

        let in_channels = record.conv1.weight.val().dims()[1];
        if in_channels != config.in_channels {
            return Err(DefectError::ModelLoad(format!(
                "{} expects {}-channel input, configured for {}",
                source.display(),
                in_channels,
                config.in_channels
            )));
        }

        let blocks = [
            record.layer1.len(),
            record.layer2.len(),
            record.layer3.len(),
            record.layer4.len(),
        ];
        if blocks != config.layers || features != config.feature_width() {
            return Err(DefectError::ModelLoad(format!(
                "{} was saved with blocks {:?} and {} features, expected {:?} and {}",
                source.display(),
                blocks,
                features,
                config.layers,
                config.feature_width()
            )));
        }

        let model = config.init::<B>(device).load_record(record);
        Self::from_model(model, config.num_classes, device)
    }

    /// Wrap an already-built network, checking its head width
    pub fn from_model(model: ResNet<B>, num_classes: usize, device: &B::Device) -> Result<Self> {
        let width = model.num_classes();
        if width != num_classes {
            return Err(DefectError::ModelLoad(format!(
                "network has {} outputs but the label set has {} classes",
                width, num_classes
            )));
        }

        Ok(Self {
            model,
            device: device.clone(),
            num_classes,
        })
    }

    /// Randomly initialized network for smoke runs.
    ///
    /// The seed is global to the backend, so weights are only repeatable when
    /// nothing else draws random tensors at the same time. Use a constant
    /// [`ResNetConfig::initializer`] for fixtures that must not change.
    pub fn seeded(config: &ResNetConfig, seed: u64, device: &B::Device) -> Result<Self> {
        B::seed(seed);
        Self::from_model(config.init::<B>(device), config.num_classes, device)
    }

    /// Write the weights as a compact artifact, returning the file written
    pub fn save(&self, path: &Path) -> Result<PathBuf> {
        let artifact = artifact_path(path);
        if let Some(parent) = artifact.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        self.model
            .clone()
            .save_file(artifact.clone(), &CompactRecorder::new())
            .map_err(|e| {
                DefectError::Serialization(format!(
                    "failed to save {}: {:?}",
                    artifact.display(),
                    e
                ))
            })?;

        Ok(artifact)
    }

    /// Forward pass for a single preprocessed image
    ///
    /// # Arguments
    /// * `input` - Tensor of shape [1, channels, height, width]
    ///
    /// # Returns
    /// * One finite logit per class
    pub fn classify(&self, input: Tensor<B, 4>) -> Result<Logits> {
        let dims = input.dims();
        let channels = self.input_channels();
        if dims[0] != 1 || dims[1] != channels {
            return Err(DefectError::Inference(format!(
                "expected input of shape [1, {}, H, W], got {:?}",
                channels, dims
            )));
        }

        let output = self.model.forward(input);
        let values = output
            .into_data()
            .to_vec::<f32>()
            .map_err(|e| DefectError::Inference(format!("cannot read logits: {:?}", e)))?;

        if values.len() != self.num_classes {
            return Err(DefectError::Inference(format!(
                "expected {} logits, got {}",
                self.num_classes,
                values.len()
            )));
        }

        if let Some(index) = values.iter().position(|v| !v.is_finite()) {
            return Err(DefectError::Inference(format!(
                "non-finite logit {} for class {}",
                values[index], index
            )));
        }

        debug!(?values, "logits");
        Ok(Logits::new(values))
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    /// Channels expected by the stem convolution
    pub fn input_channels(&self) -> usize {
        // Conv weights are [out, in, kh, kw]
        self.model.conv1.weight.dims()[1]
    }

    pub fn device(&self) -> &B::Device {
        &self.device
    }

    pub fn model(&self) -> &ResNet<B> {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::module::Param;
    use burn_ndarray::NdArray;

    type TestBackend = NdArray;

    fn tiny_config(num_classes: usize) -> ResNetConfig {
        ResNetConfig::new(num_classes)
            .with_layers([1, 1, 1, 1])
            .with_base_width(4)
    }

    fn gray_input(device: &<TestBackend as Backend>::Device) -> Tensor<TestBackend, 4> {
        Tensor::full([1, 3, 224, 224], 0.0039, device)
    }

    #[test]
    fn test_missing_artifact_is_model_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let device = Default::default();

        let result =
            Classifier::<TestBackend>::load(&dir.path().join("nope.mpk"), &tiny_config(6), &device);

        assert!(matches!(result, Err(DefectError::ModelLoad(_))));
    }

    #[test]
    fn test_corrupt_artifact_is_model_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corrupt.mpk");
        std::fs::write(&path, b"\x00\x01 these are not weights").unwrap();
        let device = Default::default();

        let result = Classifier::<TestBackend>::load(&path, &tiny_config(6), &device);

        assert!(matches!(result, Err(DefectError::ModelLoad(_))));
    }

    #[test]
    fn test_head_width_mismatch_is_model_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let device = Default::default();

        let four_way = Classifier::<TestBackend>::seeded(&tiny_config(4), 7, &device).unwrap();
        let path = four_way.save(&dir.path().join("four_way")).unwrap();

        let result = Classifier::<TestBackend>::load(&path, &tiny_config(6), &device);
        assert!(matches!(result, Err(DefectError::ModelLoad(_))));
    }

    #[test]
    fn test_stem_channel_mismatch_is_model_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let device = Default::default();

        let grayscale = tiny_config(6).with_in_channels(1);
        let saved = Classifier::<TestBackend>::seeded(&grayscale, 5, &device).unwrap();
        let path = saved.save(&dir.path().join("grayscale")).unwrap();

        match Classifier::<TestBackend>::load(&path, &tiny_config(6), &device) {
            Err(DefectError::ModelLoad(message)) => assert!(message.contains("1-channel")),
            other => panic!("expected a load error, got {:?}", other.map(|_| ())),
        }
        assert!(Classifier::<TestBackend>::load(&path, &grayscale, &device).is_ok());
    }

    #[test]
    fn test_save_then_load_reproduces_logits() {
        let dir = tempfile::tempdir().unwrap();
        let device = Default::default();
        let config = tiny_config(6);

        let original = Classifier::<TestBackend>::seeded(&config, 42, &device).unwrap();
        let path = original.save(&dir.path().join("weights.bin")).unwrap();
        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("mpk"));

        // Both loads read the same half-precision record
        let first = Classifier::<TestBackend>::load(&path, &config, &device).unwrap();
        let second = Classifier::<TestBackend>::load(&path, &config, &device).unwrap();

        let a = first.classify(gray_input(&device)).unwrap();
        let b = second.classify(gray_input(&device)).unwrap();

        assert_eq!(a.len(), 6);
        assert_eq!(a, b);
        assert!(a.as_slice().iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_classify_is_deterministic() {
        let device = Default::default();
        let classifier = Classifier::<TestBackend>::seeded(&tiny_config(6), 3, &device).unwrap();

        let first = classifier.classify(gray_input(&device)).unwrap();
        let second = classifier.classify(gray_input(&device)).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_non_finite_output_is_inference_error() {
        let device = Default::default();
        let mut model = tiny_config(6).init::<TestBackend>(&device);
        model.fc.bias = Some(Param::from_tensor(Tensor::full([6], f32::NAN, &device)));

        let classifier = Classifier::from_model(model, 6, &device).unwrap();
        let result = classifier.classify(gray_input(&device));

        assert!(matches!(result, Err(DefectError::Inference(_))));
    }

    #[test]
    fn test_wrong_input_shape_is_inference_error() {
        let device = Default::default();
        let classifier = Classifier::<TestBackend>::seeded(&tiny_config(6), 1, &device).unwrap();

        let batch_of_two = Tensor::<TestBackend, 4>::zeros([2, 3, 32, 32], &device);
        assert!(matches!(
            classifier.classify(batch_of_two),
            Err(DefectError::Inference(_))
        ));

        let grayscale = Tensor::<TestBackend, 4>::zeros([1, 1, 32, 32], &device);
        assert!(matches!(
            classifier.classify(grayscale),
            Err(DefectError::Inference(_))
        ));
    }
}
