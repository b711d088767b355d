//! Error handling for Hearth Volume
//!
//! One crate-wide error type. Contract violations at the API boundary
//! (bad cut boxes, slice indices, duplicate resource holders) come back
//! as explicit errors instead of producing wrong pixels.

use std::error::Error as StdError;
use std::fmt;

/// Main error type for Hearth Volume
#[derive(Debug)]
pub enum EngineError {
    // Volume data errors
    InvalidDimensions {
        dims: [u32; 3],
        reason: String,
    },
    BufferSizeMismatch {
        expected: usize,
        actual: usize,
    },
    SliceOutOfRange {
        axis: usize,
        index: u32,
        size: u32,
    },
    CutOutOfBounds {
        cut: String,
        dims: [u32; 3],
    },
    EmptyCut {
        cut: String,
    },
    UnsupportedUnitSize {
        bytes: usize,
        operation: String,
    },

    // Color lookup errors
    InvalidClut {
        reason: String,
    },
    MissingClut {
        texture: String,
    },
    PaletteUnsupported {
        context: u32,
    },

    // Resource lifecycle errors
    DuplicateResourceHolder {
        context: u32,
        holder: u64,
    },

    // GPU errors
    TextureUploadFailed {
        size: [u32; 3],
        error: String,
    },
    GpuOperationFailed {
        operation: String,
        error: String,
    },

    // File errors
    IoError {
        path: String,
        error: String,
    },
    InvalidVolumeFile {
        path: String,
        reason: String,
    },

    // Math errors
    DegenerateTransform {
        operation: String,
    },

    InvalidArgument {
        name: String,
        reason: String,
    },

    // Generic fallback for unexpected errors
    Internal {
        message: String,
    },
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::InvalidDimensions { dims, reason } => write!(
                f,
                "Invalid dimensions [{}, {}, {}]: {}",
                dims[0], dims[1], dims[2], reason
            ),
            EngineError::BufferSizeMismatch { expected, actual } => write!(
                f,
                "Voxel buffer size mismatch: expected {} bytes, got {}",
                expected, actual
            ),
            EngineError::SliceOutOfRange { axis, index, size } => write!(
                f,
                "Slice index {} out of range along axis {} (size {})",
                index, axis, size
            ),
            EngineError::CutOutOfBounds { cut, dims } => write!(
                f,
                "Cut {} exceeds volume [{}, {}, {}]",
                cut, dims[0], dims[1], dims[2]
            ),
            EngineError::EmptyCut { cut } => write!(f, "Zero-sized cut: {}", cut),
            EngineError::UnsupportedUnitSize { bytes, operation } => write!(
                f,
                "Unit size of {} bytes not supported for {}",
                bytes, operation
            ),
            EngineError::InvalidClut { reason } => {
                write!(f, "Invalid color lookup table: {}", reason)
            }
            EngineError::MissingClut { texture } => {
                write!(f, "Paletted texture {} has no color lookup table", texture)
            }
            EngineError::PaletteUnsupported { context } => write!(
                f,
                "GL context {} supports neither palette textures nor fragment programs",
                context
            ),
            EngineError::DuplicateResourceHolder { context, holder } => write!(
                f,
                "Resource holder {} already registered in GL context {}",
                holder, context
            ),
            EngineError::TextureUploadFailed { size, error } => write!(
                f,
                "Texture upload of [{}, {}, {}] failed: {}",
                size[0], size[1], size[2], error
            ),
            EngineError::GpuOperationFailed { operation, error } => {
                write!(f, "GPU operation '{}' failed: {}", operation, error)
            }
            EngineError::IoError { path, error } => write!(f, "IO error at {}: {}", path, error),
            EngineError::InvalidVolumeFile { path, reason } => {
                write!(f, "Invalid volume file {}: {}", path, reason)
            }
            EngineError::DegenerateTransform { operation } => {
                write!(f, "Degenerate transform in {}", operation)
            }
            EngineError::InvalidArgument { name, reason } => {
                write!(f, "Invalid argument '{}': {}", name, reason)
            }
            EngineError::Internal { message } => write!(f, "Internal error: {}", message),
        }
    }
}

impl StdError for EngineError {}

/// Type alias for Results in Hearth Volume
pub type EngineResult<T> = Result<T, EngineError>;

// Conversion traits for common error types

impl From<std::io::Error> for EngineError {
    fn from(error: std::io::Error) -> Self {
        EngineError::IoError {
            path: String::new(),
            error: error.to_string(),
        }
    }
}

impl From<image::ImageError> for EngineError {
    fn from(error: image::ImageError) -> Self {
        EngineError::IoError {
            path: String::new(),
            error: format!("image encoding: {}", error),
        }
    }
}

impl From<crate::clut::ClutError> for EngineError {
    fn from(err: crate::clut::ClutError) -> Self {
        EngineError::InvalidClut {
            reason: err.to_string(),
        }
    }
}

impl From<crate::voxel::ChunkError> for EngineError {
    fn from(err: crate::voxel::ChunkError) -> Self {
        use crate::voxel::ChunkError;
        match err {
            ChunkError::SliceOutOfRange { axis, index, size } => {
                EngineError::SliceOutOfRange { axis, index, size }
            }
            ChunkError::CutOutOfBounds { cut, dims } => EngineError::CutOutOfBounds { cut, dims },
            ChunkError::EmptyCut { cut } => EngineError::EmptyCut { cut },
            ChunkError::BufferSize { expected, actual } => {
                EngineError::BufferSizeMismatch { expected, actual }
            }
            ChunkError::InvalidAxis(axis) => EngineError::InvalidArgument {
                name: "axis".to_string(),
                reason: format!("{} is not 0, 1 or 2", axis),
            },
            ChunkError::UnsupportedUnitSize { bytes, operation } => {
                EngineError::UnsupportedUnitSize {
                    bytes,
                    operation: operation.to_string(),
                }
            }
        }
    }
}

impl From<crate::resource::ResourceError> for EngineError {
    fn from(err: crate::resource::ResourceError) -> Self {
        use crate::resource::ResourceError;
        match err {
            ResourceError::DuplicateHolder { context, holder } => {
                EngineError::DuplicateResourceHolder { context, holder }
            }
        }
    }
}

impl From<crate::reader::VolFileError> for EngineError {
    fn from(err: crate::reader::VolFileError) -> Self {
        EngineError::InvalidVolumeFile {
            path: String::new(),
            reason: err.to_string(),
        }
    }
}

/// Turn a missing value into an engine error
pub trait OptionExt<T> {
    fn ok_or_engine<F>(self, f: F) -> EngineResult<T>
    where
        F: FnOnce() -> EngineError;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_engine<F>(self, f: F) -> EngineResult<T>
    where
        F: FnOnce() -> EngineError,
    {
        self.ok_or_else(f)
    }
}

/// Prefix an error with what was being attempted. The original message
/// is kept after the prefix.
pub trait ErrorContext<T> {
    fn context(self, msg: &str) -> EngineResult<T>;
    fn with_context<F>(self, f: F) -> EngineResult<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ErrorContext<T> for Result<T, E>
where
    E: Into<EngineError>,
{
    fn context(self, msg: &str) -> EngineResult<T> {
        self.with_context(|| msg.to_string())
    }

    fn with_context<F>(self, f: F) -> EngineResult<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| EngineError::Internal {
            message: format!("{}: {}", f(), e.into()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = EngineError::SliceOutOfRange {
            axis: 2,
            index: 64,
            size: 64,
        };
        assert_eq!(
            err.to_string(),
            "Slice index 64 out of range along axis 2 (size 64)"
        );
    }

    #[test]
    fn test_chunk_error_conversion() {
        let err: EngineError = crate::voxel::ChunkError::InvalidAxis(5).into();
        match err {
            EngineError::InvalidArgument { name, reason } => {
                assert_eq!(name, "axis");
                assert!(reason.starts_with('5'));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_resource_error_conversion() {
        let err: EngineError = crate::resource::ResourceError::DuplicateHolder {
            context: 3,
            holder: 9,
        }
        .into();
        assert!(matches!(
            err,
            EngineError::DuplicateResourceHolder {
                context: 3,
                holder: 9
            }
        ));
    }

    #[test]
    fn test_ok_or_engine() {
        let present = Some(4).ok_or_engine(|| EngineError::Internal {
            message: "unused".to_string(),
        });
        assert_eq!(present.expect("value present"), 4);

        let missing: Option<u8> = None;
        let err = missing
            .ok_or_engine(|| EngineError::MissingClut {
                texture: "Palette2D".to_string(),
            })
            .expect_err("value missing");
        assert!(matches!(err, EngineError::MissingClut { .. }));
    }

    #[test]
    fn test_error_context_keeps_source_message() {
        let result: Result<(), crate::voxel::ChunkError> =
            Err(crate::voxel::ChunkError::InvalidAxis(5));
        let err = result.context("cutting page").expect_err("error kept");
        match err {
            EngineError::Internal { message } => {
                assert!(message.starts_with("cutting page: "));
                assert!(message.len() > "cutting page: ".len());
            }
            other => panic!("unexpected error: {:?}", other),
        }

        let ok: Result<u8, std::io::Error> = Ok(1);
        assert_eq!(ok.with_context(|| "never built".to_string()).expect("ok"), 1);
    }
}
