//! Canonical cache keys built from call arguments.
//!
//! A [`CacheKey`] is made of positional arguments in call order plus keyword
//! arguments sorted by name, so `f(a, x = 1, y = 2)` and `f(a, y = 2, x = 1)`
//! share one key. Each argument is reduced to an [`ArgValue`] through the
//! [`CacheableArg`] trait.
//!
//! When keys are built *typed*, every top-level argument also carries the name of
//! its Rust type and values are kept exactly as given, so `1_i32` and `1.0_f64`
//! are different keys. Untyped keys collapse values that compare equal across
//! numeric types: `true`, `1_u8`, `1_i64` and `1.0` all become the integer `1`.

use std::borrow::Cow;
use std::fmt::Debug;
use std::hash::Hash;
use std::path::{Path, PathBuf};

/// A call argument reduced to a hashable shape.
#[derive(Clone, Debug, PartialEq)]
pub enum ArgValue {
    Unit,
    Bool(bool),
    Int(i128),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
    Seq(Vec<ArgValue>),
}

impl ArgValue {
    /// Builds an argument value from a type's `Debug` output.
    ///
    /// Handy for structs that do not need a hand-written [`CacheableArg`]; see
    /// [`cacheable_by_debug!`](crate::cacheable_by_debug).
    pub fn from_debug<T: Debug + ?Sized>(value: &T) -> Self {
        ArgValue::Str(format!("{:?}", value))
    }

    fn canonical(&self, collapse_numeric: bool) -> Canon {
        match self {
            ArgValue::Unit => Canon::Unit,
            ArgValue::Bool(b) if collapse_numeric => Canon::Int(i128::from(*b)),
            ArgValue::Bool(b) => Canon::Bool(*b),
            ArgValue::Int(i) => Canon::Int(*i),
            ArgValue::Float(f) => {
                if collapse_numeric {
                    if let Some(i) = integral_float(*f) {
                        return Canon::Int(i);
                    }
                }
                Canon::Float(float_bits(*f))
            }
            ArgValue::Str(s) => Canon::Str(s.clone()),
            ArgValue::Bytes(b) => Canon::Bytes(b.clone()),
            ArgValue::Seq(items) => Canon::Seq(
                items
                    .iter()
                    .map(|item| item.canonical(collapse_numeric))
                    .collect(),
            ),
        }
    }
}

/// Returns the integer a float is equal to, if any.
fn integral_float(f: f64) -> Option<i128> {
    // `i128::MAX as f64` rounds up to 2^127, hence the strict upper bound.
    if f.is_finite() && f.fract() == 0.0 && f >= i128::MIN as f64 && f < i128::MAX as f64 {
        Some(f as i128)
    } else {
        None
    }
}

/// Bit pattern with `-0.0` folded onto `0.0` and every NaN onto one NaN.
fn float_bits(f: f64) -> u64 {
    if f.is_nan() {
        f64::NAN.to_bits()
    } else if f == 0.0 {
        0.0f64.to_bits()
    } else {
        f.to_bits()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
enum Canon {
    Unit,
    Bool(bool),
    Int(i128),
    Float(u64),
    Str(String),
    Bytes(Vec<u8>),
    Seq(Vec<Canon>),
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct KeyPart {
    type_tag: Option<&'static str>,
    value: Canon,
}

impl KeyPart {
    fn new(value: &ArgValue, type_tag: &'static str, typed: bool) -> Self {
        if typed {
            Self {
                type_tag: Some(type_tag),
                value: value.canonical(false),
            }
        } else {
            Self {
                type_tag: None,
                value: value.canonical(true),
            }
        }
    }
}

/// Canonicalized key for one call.
///
/// # Examples
///
/// ```
/// use framecache_core::CacheKey;
///
/// let a = CacheKey::builder(false).kwarg("x", &1).kwarg("y", &2.0).build();
/// let b = CacheKey::builder(false).kwarg("y", &2).kwarg("x", &1.0).build();
/// assert_eq!(a, b);
///
/// let typed_int = CacheKey::builder(true).arg(&1).build();
/// let typed_float = CacheKey::builder(true).arg(&1.0).build();
/// assert_ne!(typed_int, typed_float);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey {
    positional: Vec<KeyPart>,
    keyword: Vec<(String, KeyPart)>,
}

impl CacheKey {
    /// The key of a call without arguments.
    pub fn empty() -> Self {
        Self {
            positional: Vec::new(),
            keyword: Vec::new(),
        }
    }

    /// Starts a key. `typed` controls whether argument types take part in equality.
    pub fn builder(typed: bool) -> KeyBuilder {
        KeyBuilder {
            typed,
            key: CacheKey::empty(),
        }
    }

    /// Number of positional plus keyword arguments.
    pub fn arity(&self) -> usize {
        self.positional.len() + self.keyword.len()
    }
}

/// Incremental [`CacheKey`] construction.
#[derive(Clone, Debug)]
pub struct KeyBuilder {
    typed: bool,
    key: CacheKey,
}

impl KeyBuilder {
    /// Appends a positional argument.
    pub fn arg<T: CacheableArg + ?Sized>(mut self, value: &T) -> Self {
        self.push_arg(value);
        self
    }

    /// Appends a positional argument in place.
    pub fn push_arg<T: CacheableArg + ?Sized>(&mut self, value: &T) {
        self.key
            .positional
            .push(KeyPart::new(&value.to_arg(), value.type_tag(), self.typed));
    }

    /// Sets a keyword argument. A repeated name replaces the earlier value.
    pub fn kwarg<T: CacheableArg + ?Sized>(mut self, name: &str, value: &T) -> Self {
        let part = KeyPart::new(&value.to_arg(), value.type_tag(), self.typed);
        let keyword = &mut self.key.keyword;
        match keyword.binary_search_by(|(existing, _)| existing.as_str().cmp(name)) {
            Ok(pos) => keyword[pos].1 = part,
            Err(pos) => keyword.insert(pos, (name.to_string(), part)),
        }
        self
    }

    pub fn build(self) -> CacheKey {
        self.key
    }
}

/// Conversion of a single argument into an [`ArgValue`].
///
/// Implemented for primitives, strings, paths, `Option`, slices, `Vec` and
/// arrays. For your own types either implement it directly or use
/// [`cacheable_by_debug!`](crate::cacheable_by_debug).
///
/// # Examples
///
/// ```
/// use framecache_core::{ArgValue, CacheableArg};
///
/// struct Ticker(String);
///
/// impl CacheableArg for Ticker {
///     fn to_arg(&self) -> ArgValue {
///         ArgValue::Str(self.0.to_uppercase())
///     }
/// }
///
/// assert_eq!(Ticker("aapl".into()).to_arg(), ArgValue::Str("AAPL".into()));
/// ```
pub trait CacheableArg {
    fn to_arg(&self) -> ArgValue;

    /// Type name used by typed keys.
    fn type_tag(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

macro_rules! impl_cacheable_int {
    ($($t:ty),*) => {
        $(
            impl CacheableArg for $t {
                fn to_arg(&self) -> ArgValue {
                    ArgValue::Int(i128::from(*self))
                }
            }
        )*
    };
}

impl_cacheable_int!(i8, i16, i32, i64, u8, u16, u32, u64);

impl CacheableArg for isize {
    fn to_arg(&self) -> ArgValue {
        ArgValue::Int(*self as i128)
    }
}

impl CacheableArg for usize {
    fn to_arg(&self) -> ArgValue {
        ArgValue::Int(*self as i128)
    }
}

impl CacheableArg for f32 {
    fn to_arg(&self) -> ArgValue {
        ArgValue::Float(f64::from(*self))
    }
}

impl CacheableArg for f64 {
    fn to_arg(&self) -> ArgValue {
        ArgValue::Float(*self)
    }
}

impl CacheableArg for bool {
    fn to_arg(&self) -> ArgValue {
        ArgValue::Bool(*self)
    }
}

impl CacheableArg for char {
    fn to_arg(&self) -> ArgValue {
        ArgValue::Str(self.to_string())
    }
}

impl CacheableArg for () {
    fn to_arg(&self) -> ArgValue {
        ArgValue::Unit
    }
}

impl CacheableArg for str {
    fn to_arg(&self) -> ArgValue {
        ArgValue::Str(self.to_string())
    }
}

impl CacheableArg for String {
    fn to_arg(&self) -> ArgValue {
        ArgValue::Str(self.clone())
    }
}

impl CacheableArg for Cow<'_, str> {
    fn to_arg(&self) -> ArgValue {
        ArgValue::Str(self.to_string())
    }

    fn type_tag(&self) -> &'static str {
        std::any::type_name::<String>()
    }
}

impl CacheableArg for Path {
    fn to_arg(&self) -> ArgValue {
        ArgValue::Str(self.to_string_lossy().into_owned())
    }
}

impl CacheableArg for PathBuf {
    fn to_arg(&self) -> ArgValue {
        self.as_path().to_arg()
    }
}

/// `Some(v)` is a one-element sequence so it never meets `None` or a bare `v`.
impl<T: CacheableArg> CacheableArg for Option<T> {
    fn to_arg(&self) -> ArgValue {
        match self {
            Some(value) => ArgValue::Seq(vec![value.to_arg()]),
            None => ArgValue::Unit,
        }
    }
}

impl<T: CacheableArg> CacheableArg for [T] {
    fn to_arg(&self) -> ArgValue {
        ArgValue::Seq(self.iter().map(CacheableArg::to_arg).collect())
    }
}

impl<T: CacheableArg> CacheableArg for Vec<T> {
    fn to_arg(&self) -> ArgValue {
        self.as_slice().to_arg()
    }
}

impl<T: CacheableArg, const N: usize> CacheableArg for [T; N] {
    fn to_arg(&self) -> ArgValue {
        self.as_slice().to_arg()
    }
}

impl<T: CacheableArg + ?Sized> CacheableArg for &T {
    fn to_arg(&self) -> ArgValue {
        (**self).to_arg()
    }

    fn type_tag(&self) -> &'static str {
        (**self).type_tag()
    }
}

/// Implements [`CacheableArg`] for types through their `Debug` output.
///
/// ```
/// use framecache_core::{cacheable_by_debug, CacheKey};
///
/// #[derive(Debug)]
/// struct Region {
///     code: u16,
/// }
///
/// cacheable_by_debug!(Region);
///
/// let key = CacheKey::builder(true).arg(&Region { code: 7 }).build();
/// assert_eq!(key.arity(), 1);
/// ```
#[macro_export]
macro_rules! cacheable_by_debug {
    ($($t:ty),+ $(,)?) => {
        $(
            impl $crate::CacheableArg for $t {
                fn to_arg(&self) -> $crate::ArgValue {
                    $crate::ArgValue::from_debug(self)
                }
            }
        )+
    };
}

/// Argument bundles a wrapped producer can be keyed on.
///
/// Implemented for `()` and tuples of up to eight [`CacheableArg`] values, each
/// element becoming one positional argument.
pub trait KeyArgs {
    fn to_key(&self, typed: bool) -> CacheKey;
}

impl KeyArgs for () {
    fn to_key(&self, _typed: bool) -> CacheKey {
        CacheKey::empty()
    }
}

impl KeyArgs for CacheKey {
    fn to_key(&self, _typed: bool) -> CacheKey {
        self.clone()
    }
}

macro_rules! impl_key_args_for_tuple {
    ($($name:ident),+) => {
        impl<$($name: CacheableArg),+> KeyArgs for ($($name,)+) {
            #[allow(non_snake_case)]
            fn to_key(&self, typed: bool) -> CacheKey {
                let ($($name,)+) = self;
                let mut builder = CacheKey::builder(typed);
                $(builder.push_arg($name);)+
                builder.build()
            }
        }
    };
}

impl_key_args_for_tuple!(A);
impl_key_args_for_tuple!(A, B);
impl_key_args_for_tuple!(A, B, C);
impl_key_args_for_tuple!(A, B, C, D);
impl_key_args_for_tuple!(A, B, C, D, E);
impl_key_args_for_tuple!(A, B, C, D, E, F);
impl_key_args_for_tuple!(A, B, C, D, E, F, G);
impl_key_args_for_tuple!(A, B, C, D, E, F, G, H);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_untyped_collapses_numeric_types() {
        let int = (1i32,).to_key(false);
        let float = (1.0f64,).to_key(false);
        let unsigned = (1u8,).to_key(false);
        let boolean = (true,).to_key(false);
        assert_eq!(int, float);
        assert_eq!(int, unsigned);
        assert_eq!(int, boolean);
    }

    #[test]
    fn test_typed_separates_numeric_types() {
        assert_ne!((1i32,).to_key(true), (1.0f64,).to_key(true));
        assert_ne!((1i32,).to_key(true), (1i64,).to_key(true));
        assert_eq!((1i32,).to_key(true), (1i32,).to_key(true));
    }

    #[test]
    fn test_untyped_keeps_fractional_floats_apart() {
        assert_ne!((1.5f64,).to_key(false), (1i32,).to_key(false));
        assert_eq!((1.5f64,).to_key(false), (1.5f32,).to_key(false));
    }

    #[test]
    fn test_str_and_string_share_untyped_key() {
        assert_eq!(("abc",).to_key(false), (String::from("abc"),).to_key(false));
        assert_ne!(("abc",).to_key(true), (String::from("abc"),).to_key(true));
    }

    #[test]
    fn test_positional_order_matters() {
        assert_ne!((1, 2).to_key(false), (2, 1).to_key(false));
    }

    #[test]
    fn test_keyword_order_does_not_matter() {
        let a = CacheKey::builder(true)
            .arg(&"frame")
            .kwarg("rows", &10)
            .kwarg("cols", &3)
            .build();
        let b = CacheKey::builder(true)
            .arg(&"frame")
            .kwarg("cols", &3)
            .kwarg("rows", &10)
            .build();
        assert_eq!(a, b);
        assert_eq!(a.arity(), 3);
    }

    #[test]
    fn test_keyword_is_not_positional() {
        let positional = CacheKey::builder(false).arg(&1).build();
        let keyword = CacheKey::builder(false).kwarg("x", &1).build();
        assert_ne!(positional, keyword);
    }

    #[test]
    fn test_repeated_keyword_replaces_value() {
        let key = CacheKey::builder(false)
            .kwarg("x", &1)
            .kwarg("x", &2)
            .build();
        assert_eq!(key, CacheKey::builder(false).kwarg("x", &2).build());
    }

    #[test]
    fn test_signed_zero_and_nan_are_canonical() {
        assert_eq!((0.0f64,).to_key(true), (-0.0f64,).to_key(true));
        assert_eq!((f64::NAN,).to_key(true), ((-f64::NAN),).to_key(true));
    }

    #[test]
    fn test_nested_sequences_collapse_untyped() {
        assert_eq!((vec![1, 2],).to_key(false), (vec![1.0, 2.0],).to_key(false));
        assert_ne!((vec![1, 2],).to_key(true), (vec![1.0, 2.0],).to_key(true));
    }

    #[test]
    fn test_option_none_is_unit() {
        let none: Option<i32> = None;
        assert_eq!(none.to_arg(), ArgValue::Unit);
        assert_eq!(Some(3).to_arg(), ArgValue::Seq(vec![ArgValue::Int(3)]));
    }

    #[test]
    fn test_option_variants_stay_distinct() {
        let none: Option<()> = None;
        for typed in [true, false] {
            assert_ne!((Some(()),).to_key(typed), (none,).to_key(typed));
        }
        assert_ne!((Some(1),).to_key(false), (1,).to_key(false));
        assert_eq!((Some(1),).to_key(false), (Some(1.0),).to_key(false));
    }

    #[test]
    fn test_untyped_collapse_covers_u64_range() {
        let big = 1u64 << 63;
        assert_eq!((big,).to_key(false), (big as f64,).to_key(false));
        assert_eq!((u64::MAX - 2047,).to_key(false), ((u64::MAX - 2047) as f64,).to_key(false));
        assert_ne!((big,).to_key(true), (big as f64,).to_key(true));
    }

    #[derive(Debug)]
    struct Point {
        x: i32,
        y: i32,
    }

    cacheable_by_debug!(Point);

    #[test]
    fn test_debug_based_arg() {
        let a = (Point { x: 1, y: 2 },).to_key(true);
        let b = (Point { x: 1, y: 2 },).to_key(true);
        let c = (Point { x: 2, y: 1 },).to_key(true);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
