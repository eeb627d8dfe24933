//! Model module: network architecture and the loaded classifier
//!
//! - `resnet`: ResNet-50 style bottleneck network built with Burn
//! - `classifier`: weight loading and the `classify(tensor) -> logits` contract
//! - `import`: reading torchvision-style PyTorch checkpoints

pub mod classifier;
pub mod import;
pub mod resnet;

pub use classifier::{artifact_path, Classifier, PYTORCH_EXTENSIONS, WEIGHTS_EXTENSION};
pub use resnet::{ResNet, ResNetConfig};
