pub mod classifier;
pub mod error;
pub mod ingest;
pub mod rules;

pub use classifier::{
    BayesClassifier, ClassifiableTransaction, FileModelStore, MemoryModelStore, ModelSnapshot,
    ModelStore, TransactionClassifier, MODEL_FILE_NAME, UNKNOWN_PAYEE,
};
pub use error::{ClassifierError, IngestError};
pub use ingest::TransactionIngestor;
pub use rules::{ExtractionDefaults, RegexExtractor};
