//! PyTorch weight import
//!
//! Reads a `state_dict` saved by `torch.save` for a torchvision-style ResNet
//! whose `fc` layer was replaced for the defect labels. Torchvision keeps
//! each projection shortcut in an `nn.Sequential`, so its `downsample.0` and
//! `downsample.1` keys are renamed onto [`Downsample`](crate::model::resnet::Downsample)'s
//! named fields. BatchNorm `weight`/`bias` and the transposed `fc.weight` are
//! adapted by the recorder itself.

use std::path::Path;

use burn::{
    record::{FullPrecisionSettings, Recorder},
    tensor::backend::Backend,
};
use burn_import::pytorch::{LoadArgs, PyTorchFileRecorder};
use tracing::info;

use crate::model::resnet::ResNetRecord;
use crate::utils::error::{DefectError, Result};

/// Torchvision key patterns and the field paths they land on
const KEY_REMAP: [(&str, &str); 2] = [
    (r"downsample\.0\.", "downsample.conv."),
    (r"downsample\.1\.", "downsample.bn."),
];

/// Decode a `.pth` file into a network record without checking its layout
pub fn load_pytorch_record<B: Backend>(path: &Path, device: &B::Device) -> Result<ResNetRecord<B>> {
    if !path.is_file() {
        return Err(DefectError::ModelLoad(format!(
            "PyTorch weights not found: {}",
            path.display()
        )));
    }

    info!("Importing PyTorch weights from {}", path.display());

    let args = KEY_REMAP
        .iter()
        .fold(LoadArgs::new(path.to_path_buf()), |args, (pattern, replacement)| {
            args.with_key_remap(pattern, replacement)
        });

    PyTorchFileRecorder::<FullPrecisionSettings>::default()
        .load(args, device)
        .map_err(|e| {
            DefectError::ModelLoad(format!("failed to import {}: {:?}", path.display(), e))
        })
}
