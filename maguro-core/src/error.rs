//! Error types for the maguro core library.
//!
//! Defines the error enum exposed by the public API, a stable machine-readable
//! error-code enum, and a convenient result alias.

use std::fmt;

use thiserror::Error;

macro_rules! define_error_codes {
    (
        $(#[$enum_meta:meta])*
        enum $CodeTy:ident for $ErrTy:ident {
            $(
                $(#[$variant_meta:meta])*
                $CodeVariant:ident => $ErrVariant:ident $( { $($pattern:tt)* } )? => $code:expr
            ),+ $(,)?
        }
    ) => {
        $(#[$enum_meta])*
        #[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
        #[non_exhaustive]
        pub enum $CodeTy {
            $(
                $(#[$variant_meta])*
                $CodeVariant,
            )+
        }

        impl $CodeTy {
            /// Return the stable machine-readable representation of this error code.
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$CodeVariant => $code,)+
                }
            }
        }

        impl fmt::Display for $CodeTy {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl $ErrTy {
            #[doc = concat!(
                "Retrieve the stable [`",
                stringify!($CodeTy),
                "`] for this error."
            )]
            pub const fn code(&self) -> $CodeTy {
                match self {
                    $(Self::$ErrVariant $( { $($pattern)* } )? => $CodeTy::$CodeVariant,)+
                }
            }
        }
    };
}

/// Error type produced by index construction, search, and persistence.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum IndexError {
    /// A configuration parameter was rejected before any mutation took place.
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// Human-readable explanation of the rejected parameter.
        reason: String,
    },
    /// A vector or query had a different dimension from the index.
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch {
        /// Dimension the index was created with.
        expected: usize,
        /// Dimension supplied by the caller.
        got: usize,
    },
    /// Search or save was attempted before any vector was inserted and built.
    #[error("index is empty: no graph has been built")]
    EmptyIndex,
    /// A mutating operation was attempted after the graph was finalised.
    #[error("index has already been built and is immutable")]
    AlreadyBuilt,
    /// An internal structural invariant was violated; this is a defect, never
    /// an expected condition.
    #[error("graph invariant violated: {message}")]
    GraphInvariantViolation {
        /// Description of the violated invariant.
        message: String,
    },
    /// A vector component was NaN or infinite.
    #[error("vector component {component} is non-finite: {value}")]
    NonFiniteValue {
        /// Offset of the offending component within the vector.
        component: usize,
        /// The non-finite value that was rejected.
        value: f32,
    },
    /// Angular indexes reject zero-magnitude vectors at ingestion.
    #[error("zero-magnitude vector cannot be indexed under the angular metric")]
    ZeroMagnitude,
    /// A lock guarding shared build state was poisoned by a panicking thread.
    #[error("lock poisoned: {resource}")]
    LockPoisoned {
        /// Name of the poisoned resource.
        resource: &'static str,
    },
    /// An underlying I/O operation failed during save or load.
    #[error("I/O failure: {source}")]
    Io {
        /// The wrapped I/O error.
        #[from]
        source: std::io::Error,
    },
    /// A persisted index file was malformed, truncated, or version-incompatible.
    #[error("corrupt index file: {reason}")]
    Corrupt {
        /// Description of the corruption detected during load.
        reason: String,
    },
}

define_error_codes! {
    /// Stable codes describing [`IndexError`] variants.
    enum IndexErrorCode for IndexError {
        /// A configuration parameter was rejected.
        InvalidConfig => InvalidConfig { .. } => "MAGURO_INVALID_CONFIG",
        /// A vector or query had the wrong dimension.
        DimensionMismatch => DimensionMismatch { .. } => "MAGURO_DIMENSION_MISMATCH",
        /// Search or save before any insertion or build.
        EmptyIndex => EmptyIndex => "MAGURO_EMPTY_INDEX",
        /// A mutating operation after the graph was finalised.
        AlreadyBuilt => AlreadyBuilt => "MAGURO_ALREADY_BUILT",
        /// An internal structural invariant was violated.
        GraphInvariantViolation => GraphInvariantViolation { .. } => "MAGURO_GRAPH_INVARIANT",
        /// A vector component was NaN or infinite.
        NonFiniteValue => NonFiniteValue { .. } => "MAGURO_NON_FINITE_VALUE",
        /// A zero-magnitude vector under the angular metric.
        ZeroMagnitude => ZeroMagnitude => "MAGURO_ZERO_MAGNITUDE",
        /// A lock guarding shared build state was poisoned.
        LockPoisoned => LockPoisoned { .. } => "MAGURO_LOCK_POISONED",
        /// An underlying I/O operation failed.
        Io => Io { .. } => "MAGURO_IO",
        /// A persisted index file was malformed.
        Corrupt => Corrupt { .. } => "MAGURO_CORRUPT_FILE",
    }
}

/// Convenient alias for results returned by the core API.
pub type Result<T> = core::result::Result<T, IndexError>;
