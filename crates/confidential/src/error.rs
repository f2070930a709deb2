use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlindingError {
    /// Derived scalar was zero or not below the curve order.
    DegenerateKey,
    InvalidHex,
    InvalidLength { expected: usize, got: usize },
    InvalidKey(String),
    /// Public-only view keys can derive addresses but not unblind.
    NoPrivateKey,
    Proof(String),
}

impl fmt::Display for BlindingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlindingError::DegenerateKey => write!(f, "derived blinding key is not a valid scalar"),
            BlindingError::InvalidHex => write!(f, "invalid hex in blinding key"),
            BlindingError::InvalidLength { expected, got } => {
                write!(f, "blinding key must be {expected} bytes, got {got}")
            }
            BlindingError::InvalidKey(message) => write!(f, "invalid blinding key: {message}"),
            BlindingError::NoPrivateKey => write!(f, "blinding private key unavailable"),
            BlindingError::Proof(message) => write!(f, "cannot build range proof: {message}"),
        }
    }
}

impl std::error::Error for BlindingError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnblindError {
    NotConfidential,
    MissingNonce,
    MissingRangeProof,
    NoPrivateKey,
    /// The blinding key for the output script could not be derived.
    BlindingKey(String),
    Rewind(String),
    AssetMismatch,
    ValueMismatch,
}

impl fmt::Display for UnblindError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnblindError::NotConfidential => write!(f, "output is not confidential"),
            UnblindError::MissingNonce => write!(f, "output has no ephemeral public key"),
            UnblindError::MissingRangeProof => write!(f, "output has no range proof"),
            UnblindError::NoPrivateKey => write!(f, "blinding private key unavailable"),
            UnblindError::BlindingKey(message) => write!(f, "blinding key derivation failed: {message}"),
            UnblindError::Rewind(message) => write!(f, "range proof rewind failed: {message}"),
            UnblindError::AssetMismatch => write!(f, "recovered asset does not match commitment"),
            UnblindError::ValueMismatch => write!(f, "recovered value does not match commitment"),
        }
    }
}

impl std::error::Error for UnblindError {}

impl From<elements::UnblindError> for UnblindError {
    fn from(err: elements::UnblindError) -> Self {
        match err {
            elements::UnblindError::NotConfidential => UnblindError::NotConfidential,
            elements::UnblindError::MissingNonce => UnblindError::MissingNonce,
            // Also reported when the rewound message does not open the asset commitment.
            elements::UnblindError::MissingRangeproof => UnblindError::AssetMismatch,
            other => UnblindError::Rewind(other.to_string()),
        }
    }
}
