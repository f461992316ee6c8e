use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("Model not trained; retrain before classifying")]
    ModelNotTrained,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Classifier error: {0}")]
    Classifier(#[from] ClassifierError),
}
