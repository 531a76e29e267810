//! Cache key construction.
//!
//! A cache key is the operation identity followed by every non-ignored
//! argument rendered to text, each one terminated by [`PARAM_SEPARATOR`]:
//!
//! ```text
//! cars::Garage::get_car(i32,&str,)  1 ‚ carA ‚
//! └──────── identity ────────────┘  └ args ┘
//! ```
//!
//! The separator is an out-of-band character that never appears in rendered
//! values produced by this module, and empty texts are replaced by
//! [`EMPTY_MARKER`] so that `""` and `None` produce different keys.

use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt;
use std::sync::Arc;

use crate::error::{CacheError, Result};

/// Terminates every rendered argument (looks like a comma).
pub const PARAM_SEPARATOR: char = '\u{201a}';

/// Replaces an empty rendered value.
pub const EMPTY_MARKER: char = '\u{0}';

/// Stable identity of a cacheable operation: its fully-qualified name plus the
/// ordered list of parameter type names.
///
/// Overloads with different parameter lists never collide because the type
/// list is part of the identity. Built once per operation and cloned cheaply.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct OperationId {
    declaration: Arc<str>,
    param_count: usize,
}

impl OperationId {
    /// Build the identity `name(type1,type2,)`.
    ///
    /// ```
    /// use tagcache_core::OperationId;
    ///
    /// let id = OperationId::new("cars::Garage::get_car", &["i32"]);
    /// assert_eq!(id.as_str(), "cars::Garage::get_car(i32,)");
    /// ```
    pub fn new(name: &str, param_types: &[&str]) -> Self {
        let mut declaration = String::with_capacity(name.len() + 2 + param_types.len() * 8);
        declaration.push_str(name);
        declaration.push('(');
        for ty in param_types {
            declaration.push_str(ty);
            declaration.push(',');
        }
        declaration.push(')');

        Self {
            declaration: declaration.into(),
            param_count: param_types.len(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.declaration
    }

    /// Number of declared parameters.
    pub fn param_count(&self) -> usize {
        self.param_count
    }
}

impl fmt::Debug for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("OperationId").field(&self.declaration).finish()
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.declaration)
    }
}

/// An immutable, fully built cache key.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(Arc<str>);

impl CacheKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CacheKey").field(&self.0).finish()
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<String> for CacheKey {
    fn from(value: String) -> Self {
        Self(value.into())
    }
}

impl From<&str> for CacheKey {
    fn from(value: &str) -> Self {
        Self(value.into())
    }
}

/// An argument value as seen by the key builder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgValue {
    /// Absent value; renders as nothing.
    Null,
    /// Canonical text form of a scalar or string.
    Text(Cow<'static, str>),
    /// Ordered collection, rendered recursively inside brackets.
    Seq(Vec<ArgValue>),
}

impl ArgValue {
    /// Render any `Display` value through its canonical text form.
    pub fn display(value: &impl fmt::Display) -> Self {
        ArgValue::Text(Cow::Owned(value.to_string()))
    }
}

/// Conversion of a call argument into an [`ArgValue`].
///
/// Implemented for strings, primitives, options and ordered collections.
/// Unordered collections such as `HashMap` are deliberately absent: their
/// iteration order is not stable, so they would break key determinism.
pub trait ToArgValue {
    fn to_arg_value(&self) -> ArgValue;
}

impl ToArgValue for ArgValue {
    fn to_arg_value(&self) -> ArgValue {
        self.clone()
    }
}

impl<T: ToArgValue + ?Sized> ToArgValue for &T {
    fn to_arg_value(&self) -> ArgValue {
        (**self).to_arg_value()
    }
}

impl ToArgValue for str {
    fn to_arg_value(&self) -> ArgValue {
        ArgValue::Text(Cow::Owned(self.to_owned()))
    }
}

impl ToArgValue for String {
    fn to_arg_value(&self) -> ArgValue {
        ArgValue::Text(Cow::Owned(self.clone()))
    }
}

impl<T: ToArgValue> ToArgValue for Option<T> {
    fn to_arg_value(&self) -> ArgValue {
        match self {
            Some(v) => v.to_arg_value(),
            None => ArgValue::Null,
        }
    }
}

impl<T: ToArgValue> ToArgValue for [T] {
    fn to_arg_value(&self) -> ArgValue {
        ArgValue::Seq(self.iter().map(ToArgValue::to_arg_value).collect())
    }
}

impl<T: ToArgValue, const N: usize> ToArgValue for [T; N] {
    fn to_arg_value(&self) -> ArgValue {
        self.as_slice().to_arg_value()
    }
}

impl<T: ToArgValue> ToArgValue for Vec<T> {
    fn to_arg_value(&self) -> ArgValue {
        self.as_slice().to_arg_value()
    }
}

impl<T: ToArgValue> ToArgValue for VecDeque<T> {
    fn to_arg_value(&self) -> ArgValue {
        ArgValue::Seq(self.iter().map(ToArgValue::to_arg_value).collect())
    }
}

impl<T: ToArgValue> ToArgValue for BTreeSet<T> {
    fn to_arg_value(&self) -> ArgValue {
        ArgValue::Seq(self.iter().map(ToArgValue::to_arg_value).collect())
    }
}

impl<K: ToArgValue, V: ToArgValue> ToArgValue for BTreeMap<K, V> {
    fn to_arg_value(&self) -> ArgValue {
        ArgValue::Seq(
            self.iter()
                .map(|(k, v)| ArgValue::Seq(vec![k.to_arg_value(), v.to_arg_value()]))
                .collect(),
        )
    }
}

macro_rules! display_arg_value {
    ($($ty:ty),* $(,)?) => {
        $(
            impl ToArgValue for $ty {
                fn to_arg_value(&self) -> ArgValue {
                    ArgValue::display(self)
                }
            }
        )*
    };
}

display_arg_value!(
    bool, char, i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64
);

/// Collect call arguments into a `Vec<ArgValue>`.
///
/// ```
/// use tagcache_core::{ArgValue, cache_args};
///
/// let args = cache_args!["a", 1, None::<String>];
/// assert_eq!(args.len(), 3);
/// assert_eq!(args[2], ArgValue::Null);
/// ```
#[macro_export]
macro_rules! cache_args {
    () => {
        ::std::vec::Vec::<$crate::ArgValue>::new()
    };
    ($($arg:expr),+ $(,)?) => {
        vec![$($crate::ToArgValue::to_arg_value(&$arg)),+]
    };
}

/// Build a key from an identity and an already filtered argument list.
///
/// Pure: the same identity and arguments always give a byte-identical key.
pub fn build_key(identity: &str, args: &[ArgValue]) -> CacheKey {
    let mut key = String::with_capacity(identity.len() + args.len() * 8);
    key.push_str(identity);
    for arg in args {
        write_arg(&mut key, arg);
        key.push(PARAM_SEPARATOR);
    }
    CacheKey::from(key)
}

fn write_arg(out: &mut String, arg: &ArgValue) {
    match arg {
        ArgValue::Null => {}
        ArgValue::Text(text) => {
            if text.is_empty() {
                out.push(EMPTY_MARKER);
            } else {
                out.push_str(text);
            }
        }
        ArgValue::Seq(items) => {
            out.push('[');
            for item in items {
                write_arg(out, item);
                out.push(PARAM_SEPARATOR);
            }
            out.push(']');
        }
    }
}

/// Per-operation key builder.
///
/// The list of argument positions that take part in the key is computed once
/// at construction from the operation's parameter count and ignored indexes.
#[derive(Debug, Clone)]
pub struct KeyBuilder {
    identity: OperationId,
    key_arg_indexes: Vec<usize>,
}

impl KeyBuilder {
    /// Create a builder that skips the arguments at `ignored` positions.
    ///
    /// Fails when an ignored index is outside the operation's parameter list.
    pub fn new(identity: OperationId, ignored: &[usize]) -> Result<Self> {
        if let Some(bad) = ignored.iter().find(|&&i| i >= identity.param_count()) {
            return Err(CacheError::invalid_operation(format!(
                "ignored argument index {bad} out of range for {identity}"
            )));
        }

        let key_arg_indexes = (0..identity.param_count())
            .filter(|i| !ignored.contains(i))
            .collect();

        Ok(Self {
            identity,
            key_arg_indexes,
        })
    }

    pub fn identity(&self) -> &OperationId {
        &self.identity
    }

    /// Build the key for one invocation.
    ///
    /// Missing trailing arguments render as [`ArgValue::Null`].
    pub fn build_key(&self, args: &[ArgValue]) -> CacheKey {
        let filtered: Vec<ArgValue> = self
            .key_arg_indexes
            .iter()
            .map(|&i| args.get(i).cloned().unwrap_or(ArgValue::Null))
            .collect();
        build_key(self.identity.as_str(), &filtered)
    }
}
