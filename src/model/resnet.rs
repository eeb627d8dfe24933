//! ResNet Architecture for Steel Defect Classification
//!
//! A bottleneck ResNet built with the Burn framework. The default layout
//! (`[3, 4, 6, 3]` blocks, base width 64) is ResNet-50 with its final
//! fully connected layer replaced by one sized to the label set.
//! Smaller layouts are only a configuration change away, which keeps
//! tests and smoke deployments cheap.

use burn::{
    config::Config,
    module::Module,
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig, MaxPool2d, MaxPool2dConfig},
        BatchNorm, BatchNormConfig, Initializer, Linear, LinearConfig, PaddingConfig2d, Relu,
    },
    tensor::{backend::Backend, Tensor},
};

/// Output channels of a bottleneck block relative to its inner width
const EXPANSION: usize = 4;

/// Configuration for the ResNet classifier
#[derive(Config, Debug)]
pub struct ResNetConfig {
    /// Number of output classes
    pub num_classes: usize,

    /// Number of bottleneck blocks in each of the four stages
    #[config(default = "[3, 4, 6, 3]")]
    pub layers: [usize; 4],

    /// Inner width of the first stage; doubles every stage
    #[config(default = "64")]
    pub base_width: usize,

    /// Number of input channels (3 for RGB)
    #[config(default = "3")]
    pub in_channels: usize,

    /// Initializer for every convolution and the head; layer defaults when unset
    #[config(default = "None")]
    pub initializer: Option<Initializer>,
}

impl ResNetConfig {
    /// Initialize a network with freshly initialized parameters
    pub fn init<B: Backend>(&self, device: &B::Device) -> ResNet<B> {
        ResNet::new(self, device)
    }

    /// Width of the feature vector entering the classification head
    pub fn feature_width(&self) -> usize {
        self.base_width * 8 * EXPANSION
    }

    /// Bias-free square convolution using the configured initializer
    fn conv(&self, channels: [usize; 2], kernel: usize, stride: usize) -> Conv2dConfig {
        let conv = Conv2dConfig::new(channels, [kernel, kernel])
            .with_stride([stride, stride])
            .with_bias(false);
        match &self.initializer {
            Some(initializer) => conv.with_initializer(initializer.clone()),
            None => conv,
        }
    }
}

/// 1x1 projection used when a block changes resolution or width
#[derive(Module, Debug)]
pub struct Downsample<B: Backend> {
    pub conv: Conv2d<B>,
    pub bn: BatchNorm<B, 2>,
}

impl<B: Backend> Downsample<B> {
    fn new(
        config: &ResNetConfig,
        in_channels: usize,
        out_channels: usize,
        stride: usize,
        device: &B::Device,
    ) -> Self {
        let conv = config
            .conv([in_channels, out_channels], 1, stride)
            .init(device);
        let bn = BatchNormConfig::new(out_channels).init(device);

        Self { conv, bn }
    }

    fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        self.bn.forward(self.conv.forward(x))
    }
}

/// Bottleneck residual block: 1x1 reduce, 3x3 (strided), 1x1 expand
#[derive(Module, Debug)]
pub struct Bottleneck<B: Backend> {
    pub conv1: Conv2d<B>,
    pub bn1: BatchNorm<B, 2>,
    pub conv2: Conv2d<B>,
    pub bn2: BatchNorm<B, 2>,
    pub conv3: Conv2d<B>,
    pub bn3: BatchNorm<B, 2>,
    pub downsample: Option<Downsample<B>>,
    pub relu: Relu,
}

impl<B: Backend> Bottleneck<B> {
    fn new(
        config: &ResNetConfig,
        in_channels: usize,
        width: usize,
        stride: usize,
        device: &B::Device,
    ) -> Self {
        let out_channels = width * EXPANSION;

        let conv1 = config.conv([in_channels, width], 1, 1).init(device);
        let conv2 = config
            .conv([width, width], 3, stride)
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .init(device);
        let conv3 = config.conv([width, out_channels], 1, 1).init(device);

        let downsample = (stride != 1 || in_channels != out_channels)
            .then(|| Downsample::new(config, in_channels, out_channels, stride, device));

        Self {
            conv1,
            bn1: BatchNormConfig::new(width).init(device),
            conv2,
            bn2: BatchNormConfig::new(width).init(device),
            conv3,
            bn3: BatchNormConfig::new(out_channels).init(device),
            downsample,
            relu: Relu::new(),
        }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let identity = match &self.downsample {
            Some(downsample) => downsample.forward(x.clone()),
            None => x.clone(),
        };

        let out = self.relu.forward(self.bn1.forward(self.conv1.forward(x)));
        let out = self.relu.forward(self.bn2.forward(self.conv2.forward(out)));
        let out = self.bn3.forward(self.conv3.forward(out));

        self.relu.forward(out + identity)
    }
}

/// Steel Defect ResNet
///
/// Architecture:
/// - 7x7 stride-2 stem, BatchNorm, ReLU, 3x3 stride-2 max pool
/// - 4 stages of bottleneck blocks; stages 2-4 halve the resolution
/// - Global Average Pooling
/// - Linear head with one output per class
#[derive(Module, Debug)]
pub struct ResNet<B: Backend> {
    // Stem (public for weight export)
    pub conv1: Conv2d<B>,
    pub bn1: BatchNorm<B, 2>,
    pub relu: Relu,
    pub maxpool: MaxPool2d,

    // Residual stages
    pub layer1: Vec<Bottleneck<B>>,
    pub layer2: Vec<Bottleneck<B>>,
    pub layer3: Vec<Bottleneck<B>>,
    pub layer4: Vec<Bottleneck<B>>,

    pub avgpool: AdaptiveAvgPool2d,

    // Classification head
    pub fc: Linear<B>,
}

impl<B: Backend> ResNet<B> {
    /// Create a new ResNet from configuration
    pub fn new(config: &ResNetConfig, device: &B::Device) -> Self {
        let base = config.base_width;

        let conv1 = config
            .conv([config.in_channels, base], 7, 2)
            .with_padding(PaddingConfig2d::Explicit(3, 3))
            .init(device);
        let bn1 = BatchNormConfig::new(base).init(device);
        let maxpool = MaxPool2dConfig::new([3, 3])
            .with_strides([2, 2])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .init();

        let mut channels = base;
        let layer1 = make_stage(config, &mut channels, base, config.layers[0], 1, device);
        let layer2 = make_stage(config, &mut channels, base * 2, config.layers[1], 2, device);
        let layer3 = make_stage(config, &mut channels, base * 4, config.layers[2], 2, device);
        let layer4 = make_stage(config, &mut channels, base * 8, config.layers[3], 2, device);

        let avgpool = AdaptiveAvgPool2dConfig::new([1, 1]).init();
        let fc = LinearConfig::new(channels, config.num_classes);
        let fc = match &config.initializer {
            Some(initializer) => fc.with_initializer(initializer.clone()),
            None => fc,
        }
        .init(device);

        Self {
            conv1,
            bn1,
            relu: Relu::new(),
            maxpool,
            layer1,
            layer2,
            layer3,
            layer4,
            avgpool,
            fc,
        }
    }

    /// Forward pass through the network
    ///
    /// # Arguments
    /// * `x` - Input tensor of shape [batch_size, 3, height, width]
    ///
    /// # Returns
    /// * Logits tensor of shape [batch_size, num_classes]
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = self.relu.forward(self.bn1.forward(self.conv1.forward(x)));
        let mut x = self.maxpool.forward(x);

        for block in self
            .layer1
            .iter()
            .chain(&self.layer2)
            .chain(&self.layer3)
            .chain(&self.layer4)
        {
            x = block.forward(x);
        }

        // Global pooling: [B, C, H, W] -> [B, C, 1, 1]
        let x = self.avgpool.forward(x);

        // Flatten: [B, C, 1, 1] -> [B, C]
        let [batch_size, channels, _, _] = x.dims();
        let x = x.reshape([batch_size, channels]);

        self.fc.forward(x)
    }

    /// Number of output units of the classification head
    pub fn num_classes(&self) -> usize {
        // Linear weights are stored as [d_input, d_output]
        self.fc.weight.dims()[1]
    }
}

fn make_stage<B: Backend>(
    config: &ResNetConfig,
    channels: &mut usize,
    width: usize,
    blocks: usize,
    stride: usize,
    device: &B::Device,
) -> Vec<Bottleneck<B>> {
    (0..blocks)
        .map(|i| {
            let block_stride = if i == 0 { stride } else { 1 };
            let block = Bottleneck::new(config, *channels, width, block_stride, device);
            *channels = width * EXPANSION;
            block
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;

    type TestBackend = NdArray;

    fn tiny_config(num_classes: usize) -> ResNetConfig {
        ResNetConfig::new(num_classes)
            .with_layers([1, 1, 1, 1])
            .with_base_width(4)
    }

    #[test]
    fn test_resnet_output_shape() {
        let device = Default::default();
        let model = tiny_config(6).init::<TestBackend>(&device);

        let input = Tensor::<TestBackend, 4>::zeros([2, 3, 224, 224], &device);
        let output = model.forward(input);

        assert_eq!(output.dims(), [2, 6]);
        assert_eq!(model.num_classes(), 6);
    }

    #[test]
    fn test_head_width_follows_config() {
        let device = Default::default();
        let config = tiny_config(4).with_layers([2, 1, 1, 1]);
        let model = config.init::<TestBackend>(&device);

        assert_eq!(model.layer1.len(), 2);
        assert_eq!(model.fc.weight.dims(), [config.feature_width(), 4]);
        // First block of every stage projects the identity path
        assert!(model.layer1[0].downsample.is_some());
        assert!(model.layer1[1].downsample.is_none());
    }

    #[test]
    fn test_constant_initializer_gives_identical_networks() {
        let device = Default::default();
        let config = tiny_config(6).with_initializer(Some(Initializer::Constant { value: 0.03125 }));
        let a = config.init::<TestBackend>(&device);
        let b = config.init::<TestBackend>(&device);

        let input = Tensor::<TestBackend, 4>::ones([1, 3, 32, 32], &device);
        let (a, b) = (a.forward(input.clone()), b.forward(input));
        a.into_data().assert_eq(&b.into_data(), true);

        let weights = config.init::<TestBackend>(&device).layer2[0].conv2.weight.val();
        assert_eq!(weights.clone().min().into_scalar(), 0.03125);
        assert_eq!(weights.max().into_scalar(), 0.03125);
    }

    #[test]
    fn test_resnet50_default_layout() {
        let config = ResNetConfig::new(6);
        assert_eq!(config.layers, [3, 4, 6, 3]);
        assert_eq!(config.feature_width(), 2048);
    }
}
