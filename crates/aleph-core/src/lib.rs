pub mod config;
pub mod error;
pub mod lexicon;
pub mod types;

pub use config::AlephConfig;
pub use error::{AlephError, Result};
pub use lexicon::RecognitionLexicon;
pub use types::*;
