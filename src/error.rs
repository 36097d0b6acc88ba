//! Error taxonomy shared by the material codec, mesh importer, portable mesh
//! codec and shader composer.

use thiserror::Error;

/// Failure raised while parsing, importing, decoding or composing an asset.
#[derive(Error, Debug)]
pub enum AssetError {
    /// Malformed or missing JSON field, or a value with the wrong shape.
    #[error("asset '{asset_id}': field '{field}' must be {expected}")]
    Schema {
        asset_id: String,
        field: String,
        expected: String,
    },

    /// A property type name outside the fixed type table.
    #[error("asset '{asset_id}': property type '{type_name}' is not a valid option")]
    UnknownType { asset_id: String, type_name: String },

    /// Material and shader disagree about their property sets.
    #[error("asset '{asset_id}': {reason}")]
    Referential { asset_id: String, reason: String },

    /// Input the importer deliberately does not handle.
    #[error("asset '{asset_id}' is not supported: {reason}")]
    Unsupported { asset_id: String, reason: String },

    /// Portable mesh stream ended before a field could be read.
    #[error("portable mesh truncated: needed {needed} bytes, {available} available")]
    Truncated { needed: usize, available: usize },

    /// Portable mesh stream is structurally invalid.
    #[error("invalid portable mesh: {0}")]
    InvalidFormat(String),

    #[error("asset not found: {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("glTF error: {0}")]
    Gltf(#[from] gltf::Error),
}

impl AssetError {
    pub fn schema(
        asset_id: impl Into<String>,
        field: impl Into<String>,
        expected: impl Into<String>,
    ) -> Self {
        Self::Schema {
            asset_id: asset_id.into(),
            field: field.into(),
            expected: expected.into(),
        }
    }

    pub fn referential(asset_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Referential {
            asset_id: asset_id.into(),
            reason: reason.into(),
        }
    }

    pub fn unsupported(asset_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Unsupported {
            asset_id: asset_id.into(),
            reason: reason.into(),
        }
    }

    pub fn is_schema(&self) -> bool {
        matches!(self, Self::Schema { .. } | Self::UnknownType { .. } | Self::Json(_))
    }

    pub fn is_referential(&self) -> bool {
        matches!(self, Self::Referential { .. })
    }

    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported { .. })
    }
}

pub type Result<T> = std::result::Result<T, AssetError>;
