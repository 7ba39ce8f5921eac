//! ONNX Runtime session construction

use ort::execution_providers::CPUExecutionProvider;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use std::path::Path;

use crate::CapabilityError;

/// Create an optimized CPU-only ONNX Runtime session
///
/// Configures maximum graph optimizations and intra-op parallelism sized
/// to the physical core count (overridable through `VERIFRAME_THREADS`,
/// useful in tests to avoid thread contention).
///
/// # Errors
///
/// Returns an error if the model file is missing or session creation
/// fails.
pub fn create_session(model_path: &Path) -> Result<Session, CapabilityError> {
    if !model_path.exists() {
        return Err(CapabilityError::ModelNotFound(
            model_path.display().to_string(),
        ));
    }

    let num_threads = std::env::var("VERIFRAME_THREADS")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or_else(num_cpus::get_physical);

    Session::builder()
        .map_err(|e| CapabilityError::ModelLoad {
            path: model_path.display().to_string(),
            error: e.to_string(),
        })?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(|e| CapabilityError::ModelLoad {
            path: model_path.display().to_string(),
            error: e.to_string(),
        })?
        .with_intra_threads(num_threads)
        .map_err(|e| CapabilityError::ModelLoad {
            path: model_path.display().to_string(),
            error: e.to_string(),
        })?
        .with_memory_pattern(true)
        .map_err(|e| CapabilityError::ModelLoad {
            path: model_path.display().to_string(),
            error: e.to_string(),
        })?
        .with_execution_providers([CPUExecutionProvider::default().build()])
        .map_err(|e| CapabilityError::ModelLoad {
            path: model_path.display().to_string(),
            error: e.to_string(),
        })?
        .commit_from_file(model_path)
        .map_err(|e| CapabilityError::ModelLoad {
            path: model_path.display().to_string(),
            error: e.to_string(),
        })
}
