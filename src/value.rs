//! Values carried by identities, event parameters and state variables.
//!
//! A [`Value`] is a tagged union over the primitive kinds a monitor can
//! observe. [`Value::Null`] doubles as the wildcard in identity patterns:
//! a null pattern position matches any concrete value, never the reverse.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Kind tag of a [`Value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    /// Signed 64-bit integer.
    Int,
    /// 64-bit float.
    Float,
    /// Unicode scalar.
    Char,
    /// Owned UTF-8 string.
    String,
    /// Owned byte buffer.
    Opaque,
    /// Address of an observed object.
    Pointer,
    /// Observed thread.
    Thread,
    /// Wildcard.
    Null,
}

impl ValueKind {
    const fn tag(self) -> u8 {
        match self {
            Self::Int => 0,
            Self::Float => 1,
            Self::Char => 2,
            Self::String => 3,
            Self::Opaque => 4,
            Self::Pointer => 5,
            Self::Thread => 6,
            Self::Null => 7,
        }
    }
}

/// Opaque handle of an observed thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThreadHandle(u64);

impl ThreadHandle {
    /// Wraps a raw thread id.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw thread id.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

/// A value observed by a monitor.
///
/// # Examples
///
/// ```
/// use rvmon::Value;
///
/// let wildcard = Value::Null;
/// let id = Value::from("auction-1");
///
/// assert!(wildcard.matches(&id));
/// assert!(!id.matches(&wildcard));
/// assert!(id.matches(&Value::from("auction-1")));
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    /// Signed integer.
    Int(i64),
    /// Float. NaN is never a valid identity value.
    Float(f64),
    /// Single character.
    Char(char),
    /// Owned string, deep-copied on clone.
    String(String),
    /// Owned bytes, deep-copied on clone.
    Opaque(Vec<u8>),
    /// Pointer value, compared by address.
    Pointer(usize),
    /// Thread handle.
    Thread(ThreadHandle),
    /// Wildcard in patterns, absent elsewhere.
    #[default]
    Null,
}

impl Value {
    /// Kind tag of this value.
    #[must_use]
    pub const fn kind(&self) -> ValueKind {
        match self {
            Self::Int(_) => ValueKind::Int,
            Self::Float(_) => ValueKind::Float,
            Self::Char(_) => ValueKind::Char,
            Self::String(_) => ValueKind::String,
            Self::Opaque(_) => ValueKind::Opaque,
            Self::Pointer(_) => ValueKind::Pointer,
            Self::Thread(_) => ValueKind::Thread,
            Self::Null => ValueKind::Null,
        }
    }

    /// A null value in a pattern matches anything.
    #[must_use]
    pub const fn is_wildcard(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns true for a float NaN, which equals nothing, itself included.
    #[must_use]
    pub fn is_nan(&self) -> bool {
        matches!(self, Self::Float(v) if v.is_nan())
    }

    /// The integer, if this is one.
    #[must_use]
    pub const fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// The float, if this is one.
    #[must_use]
    pub const fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// The character, if this is one.
    #[must_use]
    pub const fn as_char(&self) -> Option<char> {
        match self {
            Self::Char(v) => Some(*v),
            _ => None,
        }
    }

    /// The string, if this is one.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(v) => Some(v),
            _ => None,
        }
    }

    /// The bytes, if this is an opaque value.
    #[must_use]
    pub fn as_opaque(&self) -> Option<&[u8]> {
        match self {
            Self::Opaque(v) => Some(v),
            _ => None,
        }
    }

    /// The address, if this is a pointer.
    #[must_use]
    pub const fn as_pointer(&self) -> Option<usize> {
        match self {
            Self::Pointer(v) => Some(*v),
            _ => None,
        }
    }

    /// The thread handle, if this is one.
    #[must_use]
    pub const fn as_thread(&self) -> Option<ThreadHandle> {
        match self {
            Self::Thread(v) => Some(*v),
            _ => None,
        }
    }

    /// Wildcard-aware equality with `self` as the pattern side.
    ///
    /// `Null` in `self` matches anything. Values of different kinds never
    /// match. Floats compare with IEEE equality, so NaN matches nothing.
    #[must_use]
    pub fn matches(&self, concrete: &Self) -> bool {
        match (self, concrete) {
            (Self::Null, _) => true,
            (Self::Int(a), Self::Int(b)) => a == b,
            #[allow(clippy::float_cmp)]
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Char(a), Self::Char(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Opaque(a), Self::Opaque(b)) => a == b,
            (Self::Pointer(a), Self::Pointer(b)) => a == b,
            (Self::Thread(a), Self::Thread(b)) => a == b,
            _ => false,
        }
    }

    /// Total order over values.
    ///
    /// Within a kind the natural order applies (byte order for strings and
    /// opaque data, `total_cmp` for floats). Across kinds, values order by
    /// kind tag; there is no coercion.
    #[must_use]
    pub fn compare(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => a.cmp(b),
            (Self::Float(a), Self::Float(b)) => a.total_cmp(b),
            (Self::Char(a), Self::Char(b)) => a.cmp(b),
            (Self::String(a), Self::String(b)) => a.as_bytes().cmp(b.as_bytes()),
            (Self::Opaque(a), Self::Opaque(b)) => a.cmp(b),
            (Self::Pointer(a), Self::Pointer(b)) => a.cmp(b),
            (Self::Thread(a), Self::Thread(b)) => a.cmp(b),
            (Self::Null, Self::Null) => Ordering::Equal,
            _ => self.kind().tag().cmp(&other.kind().tag()),
        }
    }

    /// Feeds a kind-tagged encoding of this value into `hasher`.
    ///
    /// Values that [`matches`](Self::matches) each other hash identically,
    /// including `0.0` and `-0.0`.
    pub fn hash_into(&self, hasher: &mut blake3::Hasher) {
        hasher.update(&[self.kind().tag()]);
        match self {
            Self::Int(v) => {
                hasher.update(&v.to_le_bytes());
            }
            Self::Float(v) => {
                let normalized = if *v == 0.0 { 0.0_f64 } else { *v };
                hasher.update(&normalized.to_bits().to_le_bytes());
            }
            Self::Char(v) => {
                hasher.update(&u32::from(*v).to_le_bytes());
            }
            Self::String(v) => {
                hasher.update(&(v.len() as u64).to_le_bytes());
                hasher.update(v.as_bytes());
            }
            Self::Opaque(v) => {
                hasher.update(&(v.len() as u64).to_le_bytes());
                hasher.update(v);
            }
            Self::Pointer(v) => {
                hasher.update(&(*v as u64).to_le_bytes());
            }
            Self::Thread(v) => {
                hasher.update(&v.raw().to_le_bytes());
            }
            Self::Null => {}
        }
    }

    /// Releases owned buffers, leaving the value as `Null`.
    pub fn clear_contents(&mut self) {
        *self = Self::Null;
    }
}

/// Elementwise [`Value::matches`]; arrays of different length never match.
#[must_use]
pub fn values_match(pattern: &[Value], concrete: &[Value]) -> bool {
    pattern.len() == concrete.len()
        && pattern
            .iter()
            .zip(concrete)
            .all(|(p, c)| p.matches(c))
}

/// Renders a pointer as lowercase hex without prefix.
#[must_use]
pub fn pointer_to_string(pointer: usize) -> String {
    format!("{pointer:x}")
}

/// Parses a pointer rendered by [`pointer_to_string`]. An optional `0x`
/// prefix is accepted.
#[must_use]
pub fn string_to_pointer(text: &str) -> Option<usize> {
    let digits = text.trim();
    let digits = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
        .unwrap_or(digits);
    if digits.is_empty() {
        return None;
    }
    usize::from_str_radix(digits, 16).ok()
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Char(v) => write!(f, "'{v}'"),
            Self::String(v) => write!(f, "\"{v}\""),
            Self::Opaque(v) => write!(f, "<{} bytes>", v.len()),
            Self::Pointer(v) => write!(f, "0x{}", pointer_to_string(*v)),
            Self::Thread(v) => write!(f, "thread#{}", v.raw()),
            Self::Null => write!(f, "*"),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<char> for Value {
    fn from(v: char) -> Self {
        Self::Char(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Self::Opaque(v)
    }
}

impl From<ThreadHandle> for Value {
    fn from(v: ThreadHandle) -> Self {
        Self::Thread(v)
    }
}

impl<T: Into<Self>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}
