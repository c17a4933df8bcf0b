use serde::{Deserialize, Serialize};

/// File extensions accepted for model registration (Keras HDF5 checkpoints).
///
/// SavedModel directories are not recognized.
pub const MODEL_EXTENSIONS: [&str; 2] = [".h5", ".hdf5"];

#[must_use]
pub fn is_model_file(name: &str) -> bool {
    MODEL_EXTENSIONS.iter().any(|ext| name.ends_with(ext))
}

/// Model name for an output file: its parent directory name, spaces replaced by `_`.
///
/// `outputs/models/run A/model.h5` becomes `run_A`. Returns `None` for names
/// without a parent segment.
#[must_use]
pub fn model_name_for(name: &str) -> Option<String> {
    let mut segments = name.rsplit('/');
    segments.next()?;
    let parent = segments.next()?;
    Some(parent.replace(' ', "_"))
}

/// A model version created from a run output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisteredModel {
    pub name: String,
    pub version: String,
    /// Run-relative path the model was registered from.
    pub path: String,
}
