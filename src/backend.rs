//! Backend abstraction - Multi-backend support
//!
//! Supports both CUDA (GPU) and NdArray (CPU) backends, selected at compile time.
//! Inference never needs autodiff, so only the plain backend is exposed.

// --------------------------------------------------------------------------------
// BACKEND SELECTION: CUDA (when enabled) or NdArray (default)
// --------------------------------------------------------------------------------

#[cfg(feature = "cuda")]
pub type DefaultBackend = burn_cuda::Cuda;

#[cfg(all(not(feature = "cuda"), any(feature = "ndarray", feature = "cpu")))]
pub type DefaultBackend = burn_ndarray::NdArray;

#[cfg(all(not(feature = "cuda"), not(feature = "ndarray"), not(feature = "cpu")))]
compile_error!("At least one backend (cuda, ndarray, or cpu) must be enabled!");

/// Device type of the selected backend
pub type DefaultDevice = <DefaultBackend as burn::tensor::backend::Backend>::Device;

/// Get the default device
pub fn default_device() -> DefaultDevice {
    DefaultDevice::default()
}

/// Get a human-readable name for the current backend
pub fn backend_name() -> &'static str {
    #[cfg(feature = "cuda")]
    {
        "CUDA (GPU)"
    }

    #[cfg(all(not(feature = "cuda"), any(feature = "ndarray", feature = "cpu")))]
    {
        "NdArray (CPU)"
    }
}
