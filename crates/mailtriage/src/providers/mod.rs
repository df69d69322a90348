//! Clients for the external preprocessing and inference services.

pub mod category;
pub mod completion;
pub mod error;
mod http;
pub mod inference;
pub mod preprocess;

pub use category::{Category, ParseCategoryError};
pub use error::ProviderError;
pub use inference::{HttpInference, Inference, InferenceProvider};
pub use preprocess::{HttpPreprocessor, Preprocessed, Preprocessor};
