//! Configuration structures for topology and training.
//!
//! Network architectures and training hyperparameters are described in JSON
//! files, enabling experimentation without code changes. Configurations are
//! validated on load by walking the layer chain, so a topology that would
//! collapse a spatial dimension to zero is rejected before any layer is
//! constructed.

use crate::error::{NetworkError, Result};
use crate::layers::{Conv2D, DenseLayer, MaxPool2D};
use crate::sequential::Sequential;
use crate::utils::{Activation, SimpleRng};
use serde::Deserialize;
use std::fs;

/// Kernel size used when a conv2d entry omits `kernel_size`.
const DEFAULT_KERNEL_SIZE: usize = 3;

/// Configuration for a single layer.
///
/// Different layer types use different fields:
///
/// - **conv2d**: requires `out_channels`; optional square `kernel_size`
///   (default 3)
/// - **maxpool2d**: no parameters (fixed 2x2, stride 2)
/// - **dense**: requires `units` and `activation` (`"relu"` or `"softmax"`)
///
/// ```json
/// { "layer_type": "conv2d", "out_channels": 16, "kernel_size": 3 }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct LayerConfig {
    /// Type of layer: "conv2d", "maxpool2d", or "dense"
    pub layer_type: String,

    /// Number of filters for conv2d layers
    pub out_channels: Option<usize>,
    /// Square kernel size for conv2d layers (default: 3)
    pub kernel_size: Option<usize>,

    /// Output features for dense layers
    pub units: Option<usize>,
    /// Activation for dense layers
    pub activation: Option<Activation>,
}

/// Input image dimensions.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct InputConfig {
    pub height: usize,
    pub width: usize,
    pub channels: usize,
}

/// Configuration for the entire network: input dimensions plus an ordered
/// layer list. Spatial layers (conv2d/maxpool2d) must precede dense layers,
/// and the final layer must be a softmax dense layer so the output is a
/// class-probability distribution.
#[derive(Debug, Clone, Deserialize)]
pub struct NetworkConfig {
    pub input: InputConfig,
    pub layers: Vec<LayerConfig>,
}

/// Training hyperparameters.
#[derive(Debug, Clone, Deserialize)]
pub struct TrainingConfig {
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f32,
}

/// Loads and validates a network configuration from a JSON file.
pub fn load_network(path: &str) -> Result<NetworkConfig> {
    let contents = fs::read_to_string(path)?;
    let config: NetworkConfig = serde_json::from_str(&contents)?;
    validate_network(&config)?;
    Ok(config)
}

/// Loads and validates a training configuration from a JSON file.
pub fn load_training(path: &str) -> Result<TrainingConfig> {
    let contents = fs::read_to_string(path)?;
    let config: TrainingConfig = serde_json::from_str(&contents)?;
    validate_training(&config)?;
    Ok(config)
}

/// Validates training hyperparameter ranges.
pub fn validate_training(config: &TrainingConfig) -> Result<()> {
    if config.epochs == 0 {
        return Err(NetworkError::Config("epochs must be positive".to_string()));
    }
    if config.batch_size == 0 {
        return Err(NetworkError::Config("batch_size must be positive".to_string()));
    }
    if !(config.learning_rate > 0.0 && config.learning_rate.is_finite()) {
        return Err(NetworkError::Config(
            "learning_rate must be positive and finite".to_string(),
        ));
    }
    Ok(())
}

/// Shape of the data as it flows through the configured chain.
#[derive(Clone, Copy)]
enum ChainState {
    Spatial { height: usize, width: usize, channels: usize },
    Dense { features: usize },
}

/// Validates a network configuration by walking the layer chain.
///
/// Checks that every layer carries the fields its type requires, that
/// spatial dimensions stay strictly positive through every convolution and
/// pooling step, that no spatial layer follows a dense layer, and that the
/// chain ends in a softmax dense layer.
pub fn validate_network(config: &NetworkConfig) -> Result<()> {
    if config.input.height == 0 || config.input.width == 0 || config.input.channels == 0 {
        return Err(NetworkError::Config(
            "input dimensions must be positive".to_string(),
        ));
    }
    if config.layers.is_empty() {
        return Err(NetworkError::Config(
            "network must have at least one layer".to_string(),
        ));
    }

    let mut state = ChainState::Spatial {
        height: config.input.height,
        width: config.input.width,
        channels: config.input.channels,
    };

    for (index, layer) in config.layers.iter().enumerate() {
        state = step_chain(state, layer, index)?;
    }

    let last = &config.layers[config.layers.len() - 1];
    if last.layer_type.to_lowercase() != "dense" || last.activation != Some(Activation::Softmax) {
        return Err(NetworkError::Config(
            "final layer must be a dense layer with softmax activation".to_string(),
        ));
    }

    Ok(())
}

/// Applies one configured layer to the chain state, checking its fields and
/// the resulting dimensions.
fn step_chain(state: ChainState, layer: &LayerConfig, index: usize) -> Result<ChainState> {
    let layer_type = layer.layer_type.to_lowercase();
    match layer_type.as_str() {
        "conv2d" => {
            let (height, width, _) = spatial_dims(&state, index, "conv2d")?;
            let out_channels = layer.out_channels.ok_or_else(|| {
                NetworkError::Config(format!("layer {}: conv2d requires out_channels", index))
            })?;
            if out_channels == 0 {
                return Err(NetworkError::Config(format!(
                    "layer {}: out_channels must be positive",
                    index
                )));
            }
            let kernel = layer.kernel_size.unwrap_or(DEFAULT_KERNEL_SIZE);
            if kernel == 0 {
                return Err(NetworkError::Config(format!(
                    "layer {}: kernel_size must be positive",
                    index
                )));
            }
            if height < kernel || width < kernel {
                return Err(NetworkError::Config(format!(
                    "layer {}: conv2d output would be non-positive ({}x{} input, {}x{} kernel)",
                    index, height, width, kernel, kernel
                )));
            }
            Ok(ChainState::Spatial {
                height: height - kernel + 1,
                width: width - kernel + 1,
                channels: out_channels,
            })
        }
        "maxpool2d" => {
            let (height, width, channels) = spatial_dims(&state, index, "maxpool2d")?;
            if height / 2 == 0 || width / 2 == 0 {
                return Err(NetworkError::Config(format!(
                    "layer {}: maxpool2d output would be non-positive ({}x{} input)",
                    index, height, width
                )));
            }
            Ok(ChainState::Spatial {
                height: height / 2,
                width: width / 2,
                channels,
            })
        }
        "dense" => {
            let units = layer.units.ok_or_else(|| {
                NetworkError::Config(format!("layer {}: dense requires units", index))
            })?;
            if units == 0 {
                return Err(NetworkError::Config(format!(
                    "layer {}: units must be positive",
                    index
                )));
            }
            if layer.activation.is_none() {
                return Err(NetworkError::Config(format!(
                    "layer {}: dense requires activation",
                    index
                )));
            }
            Ok(ChainState::Dense { features: units })
        }
        other => Err(NetworkError::Config(format!(
            "layer {}: unknown layer type '{}'",
            index, other
        ))),
    }
}

/// Current spatial dimensions, or an error if a spatial layer was configured
/// after the chain already moved to the dense stage.
fn spatial_dims(state: &ChainState, index: usize, kind: &str) -> Result<(usize, usize, usize)> {
    match state {
        ChainState::Spatial { height, width, channels } => Ok((*height, *width, *channels)),
        ChainState::Dense { .. } => Err(NetworkError::Config(format!(
            "layer {}: {} cannot follow a dense layer",
            index, kind
        ))),
    }
}

/// Builds a ready [`Sequential`] model from a validated configuration.
///
/// Dense input sizes are derived from the flattened spatial output, so the
/// config never has to spell them out.
pub fn build_network(config: &NetworkConfig, rng: &mut SimpleRng) -> Result<Sequential> {
    validate_network(config)?;

    let mut model = Sequential::new();
    let mut state = ChainState::Spatial {
        height: config.input.height,
        width: config.input.width,
        channels: config.input.channels,
    };

    for (index, layer) in config.layers.iter().enumerate() {
        match layer.layer_type.to_lowercase().as_str() {
            "conv2d" => {
                let (_, _, channels) = spatial_dims(&state, index, "conv2d")?;
                let out_channels = layer.out_channels.ok_or_else(|| {
                    NetworkError::Config(format!("layer {}: conv2d requires out_channels", index))
                })?;
                let kernel = layer.kernel_size.unwrap_or(DEFAULT_KERNEL_SIZE);
                model.add_spatial_layer(Box::new(Conv2D::new(
                    channels,
                    out_channels,
                    kernel,
                    kernel,
                    rng,
                )));
            }
            "maxpool2d" => {
                model.add_spatial_layer(Box::new(MaxPool2D::new()));
            }
            "dense" => {
                let input_size = match state {
                    ChainState::Spatial { height, width, channels } => height * width * channels,
                    ChainState::Dense { features } => features,
                };
                let units = layer.units.ok_or_else(|| {
                    NetworkError::Config(format!("layer {}: dense requires units", index))
                })?;
                let activation = layer.activation.ok_or_else(|| {
                    NetworkError::Config(format!("layer {}: dense requires activation", index))
                })?;
                model.add_dense_layer(DenseLayer::new(input_size, units, activation, rng));
            }
            other => {
                return Err(NetworkError::Config(format!(
                    "layer {}: unknown layer type '{}'",
                    index, other
                )))
            }
        }
        state = step_chain(state, layer, index)?;
    }

    Ok(model)
}
