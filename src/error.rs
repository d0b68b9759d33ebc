//! Error taxonomy shared by the encoder, the history manager and its stores.

use thiserror::Error;

use crate::encoder::Symbology;

/// Input that cannot become a [`crate::models::BarcodeEntry`].
///
/// Recoverable: the caller re-prompts. Never reported as a system fault.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("'{value}' is not a valid {symbology} value")]
    InvalidValue { symbology: Symbology, value: String },

    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    #[error("unknown symbology '{0}'")]
    UnknownSymbology(String),

    #[error("character {ch:?} cannot be encoded as {symbology}")]
    Unencodable { symbology: Symbology, ch: char },
}

/// Failure of a remote store round-trip.
///
/// Both variants travel the same path: the manager reports them to the
/// observability sink and keeps (or falls back from) its local view.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("remote store unavailable: {0:#}")]
    Persistence(#[from] anyhow::Error),

    #[error("malformed response: {0}")]
    Malformed(String),
}

impl StoreError {
    pub fn malformed(message: impl Into<String>) -> Self {
        StoreError::Malformed(message.into())
    }
}
