use std::fmt;

/// Errors raised by key interning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyError {
    /// Key byte length exceeded `crate::MAX_KEY_LENGTH`.
    TooLong { len: usize },
}

impl fmt::Display for KeyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyError::TooLong { len } => {
                write!(f, "key length {len} exceeds maximum of {}", crate::MAX_KEY_LENGTH)
            }
        }
    }
}

impl std::error::Error for KeyError {}

/// Errors raised by value-tree operations (type conversion, depth, size).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueError {
    /// The value was not the variant the operation required.
    WrongType { expected: &'static str, found: &'static str },
    /// A map/array/path walk exceeded `crate::MAX_TREE_DEPTH`.
    DepthExceeded,
    /// A map/array grew past `u32::MAX` entries.
    SizeExceeded,
    Key(KeyError),
}

impl fmt::Display for ValueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueError::WrongType { expected, found } => {
                write!(f, "expected a {expected} value, found {found}")
            }
            ValueError::DepthExceeded => write!(f, "tree depth exceeds {}", crate::MAX_TREE_DEPTH),
            ValueError::SizeExceeded => write!(f, "collection size exceeds {}", u32::MAX),
            ValueError::Key(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for ValueError {}

impl From<KeyError> for ValueError {
    fn from(e: KeyError) -> Self {
        ValueError::Key(e)
    }
}

/// Errors raised by `Map::insert`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MapError {
    DuplicateKey,
    /// The map grew past `u32::MAX` entries.
    SizeExceeded,
    Key(KeyError),
}

impl fmt::Display for MapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapError::DuplicateKey => write!(f, "key already present in map"),
            MapError::SizeExceeded => write!(f, "map size exceeds {}", u32::MAX),
            MapError::Key(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for MapError {}

impl From<KeyError> for MapError {
    fn from(e: KeyError) -> Self {
        MapError::Key(e)
    }
}

/// Errors raised by `OutputBuffer`/`InputCursor` operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BufferError {
    /// A fixed-region buffer had no room for the requested write.
    Full { requested: usize, available: usize },
}

impl fmt::Display for BufferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BufferError::Full { requested, available } => write!(
                f,
                "output buffer full: requested {requested} bytes, {available} available"
            ),
        }
    }
}

impl std::error::Error for BufferError {}

/// Errors raised while encoding or decoding a codec.
#[derive(Debug, Clone, PartialEq)]
pub enum CodecError {
    /// The byte stream did not parse as valid JSON/MsgPack.
    Parse(String),
    /// Construction exceeded `MAX_TREE_DEPTH`.
    DepthExceeded,
    /// A map-start event arrived without a preceding key while building a map.
    MissingPendingKey,
    /// The destination buffer had no room (fixed-region mode).
    BufferFull,
    /// A float was NaN or infinite; RFC 8259 JSON has no token for either.
    NonFiniteFloat(f64),
    Value(ValueError),
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodecError::Parse(msg) => write!(f, "codec parse error: {msg}"),
            CodecError::DepthExceeded => write!(f, "tree depth exceeds {}", crate::MAX_TREE_DEPTH),
            CodecError::MissingPendingKey => write!(f, "value event with no pending map key"),
            CodecError::BufferFull => write!(f, "output buffer full"),
            CodecError::NonFiniteFloat(v) => write!(f, "{v} cannot be encoded as JSON"),
            CodecError::Value(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for CodecError {}

impl From<ValueError> for CodecError {
    fn from(e: ValueError) -> Self {
        CodecError::Value(e)
    }
}

impl From<BufferError> for CodecError {
    fn from(_: BufferError) -> Self {
        CodecError::BufferFull
    }
}

/// Errors raised by `Value::patch`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchError {
    /// An `add` entry's path had a missing intermediate map/array.
    MissingIntermediate(String),
}

impl fmt::Display for PatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatchError::MissingIntermediate(path) => {
                write!(f, "patch conflict: missing intermediate container at '{path}'")
            }
        }
    }
}

impl std::error::Error for PatchError {}
