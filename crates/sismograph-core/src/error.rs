use crate::eval::EvalError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Model integrity error: {message}")]
    ModelIntegrity { message: String },

    #[error("Invalid statechart definition: {0}")]
    InvalidDefinition(#[from] serde_yaml::Error),

    #[error("\"{source}\" occurred while evaluating \"{code}\"")]
    Evaluation {
        code: String,
        #[source]
        source: EvalError,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn integrity(message: impl Into<String>) -> Self {
        Self::ModelIntegrity {
            message: message.into(),
        }
    }

    pub(crate) fn evaluation(code: &str, source: EvalError) -> Self {
        Self::Evaluation {
            code: code.to_string(),
            source,
        }
    }
}
