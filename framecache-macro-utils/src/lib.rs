//! Shared utilities for framecache procedural macros
//!
//! Attribute parsing and code generation used by `framecache-macros`. Errors
//! are returned as `compile_error!` token streams ready to be emitted.

use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use std::time::Duration;
use syn::{
    punctuated::Punctuated, Expr, FnArg, GenericArgument, Lit, MetaNameValue, Pat, PathArguments,
    Receiver, Signature, Token, Type,
};

/// Parsed attributes of `#[timed_lru_cache]`
pub struct TimedCacheAttributes {
    pub lifetime: TokenStream2,
    pub maxsize: TokenStream2,
    pub typed: bool,
    pub custom_name: Option<String>,
}

impl Default for TimedCacheAttributes {
    fn default() -> Self {
        Self {
            lifetime: quote! { None },
            maxsize: quote! { None },
            typed: true,
            custom_name: None,
        }
    }
}

/// Storage format selected with `codec = "..."`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileCodec {
    Csv,
    Json,
}

impl FileCodec {
    /// Expression constructing the codec.
    pub fn constructor(&self) -> TokenStream2 {
        match self {
            FileCodec::Csv => quote! { ::framecache_core::CsvCodec::new() },
            FileCodec::Json => quote! { ::framecache_core::JsonCodec::new() },
        }
    }

    pub fn type_tokens(&self) -> TokenStream2 {
        match self {
            FileCodec::Csv => quote! { ::framecache_core::CsvCodec },
            FileCodec::Json => quote! { ::framecache_core::JsonCodec },
        }
    }
}

/// Parsed attributes of `#[cache_to_file]`
pub struct FileCacheAttributes {
    pub path: TokenStream2,
    pub refresh_time: TokenStream2,
    pub create_dirs: bool,
    pub atomic_write: bool,
    pub codec: FileCodec,
}

fn error(msg: &str) -> TokenStream2 {
    quote! { compile_error!(#msg) }
}

fn literal(nv: &MetaNameValue) -> Option<&Lit> {
    match &nv.value {
        Expr::Lit(expr_lit) => Some(&expr_lit.lit),
        _ => None,
    }
}

fn is_none(nv: &MetaNameValue) -> bool {
    matches!(&nv.value, Expr::Path(p) if p.path.is_ident("None"))
}

/// Parse a duration in seconds (`seconds`, `refresh_time`)
///
/// Accepts an integer, a non-negative float, or `None`.
pub fn parse_seconds_attribute(nv: &MetaNameValue, name: &str) -> Result<TokenStream2, TokenStream2> {
    if is_none(nv) {
        return Ok(quote! { None });
    }
    match literal(nv) {
        Some(Lit::Int(lit_int)) => {
            let secs = lit_int.base10_parse::<u64>().map_err(|_| {
                error(&format!("`{}` must be a non-negative integer of seconds", name))
            })?;
            Ok(quote! { Some(::std::time::Duration::from_secs(#secs)) })
        }
        Some(Lit::Float(lit_float)) => {
            let duration = lit_float
                .base10_parse::<f64>()
                .ok()
                .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
                .ok_or_else(|| {
                    error(&format!("`{}` must be a non-negative, representable number of seconds", name))
                })?;
            let secs = duration.as_secs();
            let nanos = duration.subsec_nanos();
            Ok(quote! { Some(::std::time::Duration::new(#secs, #nanos)) })
        }
        _ => Err(error(&format!(
            "Invalid syntax for `{}`: expected `{} = <seconds>`",
            name, name
        ))),
    }
}

/// Parse the `maxsize` attribute
pub fn parse_maxsize_attribute(nv: &MetaNameValue) -> Result<TokenStream2, TokenStream2> {
    if is_none(nv) {
        return Ok(quote! { None });
    }
    match literal(nv) {
        Some(Lit::Int(lit_int)) => {
            let val = lit_int
                .base10_parse::<usize>()
                .map_err(|_| error("`maxsize` must be a non-negative integer"))?;
            Ok(quote! { Some(#val) })
        }
        _ => Err(error(
            "Invalid syntax for `maxsize`: expected `maxsize = <integer>`",
        )),
    }
}

/// Parse a boolean flag (`typed`, `create_dirs`, `atomic_write`)
pub fn parse_bool_attribute(nv: &MetaNameValue, name: &str) -> Result<bool, TokenStream2> {
    match literal(nv) {
        Some(Lit::Bool(lit_bool)) => Ok(lit_bool.value),
        _ => Err(error(&format!(
            "Invalid syntax for `{}`: expected `true` or `false`",
            name
        ))),
    }
}

/// Parse the `name` attribute
pub fn parse_name_attribute(nv: &MetaNameValue) -> Result<String, TokenStream2> {
    match literal(nv) {
        Some(Lit::Str(s)) => Ok(s.value()),
        _ => Err(error("Invalid literal for `name`: expected string")),
    }
}

/// Parse the `codec` attribute
pub fn parse_codec_attribute(nv: &MetaNameValue) -> Result<FileCodec, TokenStream2> {
    match literal(nv) {
        Some(Lit::Str(s)) => match s.value().as_str() {
            "csv" => Ok(FileCodec::Csv),
            "json" => Ok(FileCodec::Json),
            _ => Err(error("Invalid codec: expected \"csv\" or \"json\"")),
        },
        _ => Err(error("Invalid literal for `codec`: expected string")),
    }
}

fn parse_name_values(attr: TokenStream2) -> Result<Punctuated<MetaNameValue, Token![,]>, TokenStream2> {
    use syn::parse::Parser;

    let parser = Punctuated::<MetaNameValue, Token![,]>::parse_terminated;
    parser.parse2(attr).map_err(|e| {
        let msg = format!("Failed to parse attributes: {}", e);
        quote! { compile_error!(#msg) }
    })
}

fn unknown_attribute(nv: &MetaNameValue) -> TokenStream2 {
    let path = &nv.path;
    let msg = format!("Unknown attribute `{}`", quote!(#path));
    quote! { compile_error!(#msg) }
}

/// Parse `#[timed_lru_cache(...)]` attributes
pub fn parse_timed_attributes(attr: TokenStream2) -> Result<TimedCacheAttributes, TokenStream2> {
    let mut attrs = TimedCacheAttributes::default();

    for nv in parse_name_values(attr)? {
        if nv.path.is_ident("seconds") {
            attrs.lifetime = parse_seconds_attribute(&nv, "seconds")?;
        } else if nv.path.is_ident("maxsize") {
            attrs.maxsize = parse_maxsize_attribute(&nv)?;
        } else if nv.path.is_ident("typed") {
            attrs.typed = parse_bool_attribute(&nv, "typed")?;
        } else if nv.path.is_ident("name") {
            attrs.custom_name = Some(parse_name_attribute(&nv)?);
        } else {
            return Err(unknown_attribute(&nv));
        }
    }

    Ok(attrs)
}

/// Parse `#[cache_to_file(...)]` attributes; `path` is required
pub fn parse_file_attributes(attr: TokenStream2) -> Result<FileCacheAttributes, TokenStream2> {
    let mut path = None;
    let mut attrs = FileCacheAttributes {
        path: TokenStream2::new(),
        refresh_time: quote! { None },
        create_dirs: true,
        atomic_write: true,
        codec: FileCodec::Csv,
    };

    for nv in parse_name_values(attr)? {
        if nv.path.is_ident("path") {
            // Any expression convertible into a PathBuf, usually a string literal.
            let value = &nv.value;
            path = Some(quote! { #value });
        } else if nv.path.is_ident("refresh_time") {
            attrs.refresh_time = parse_seconds_attribute(&nv, "refresh_time")?;
        } else if nv.path.is_ident("create_dirs") {
            attrs.create_dirs = parse_bool_attribute(&nv, "create_dirs")?;
        } else if nv.path.is_ident("atomic_write") {
            attrs.atomic_write = parse_bool_attribute(&nv, "atomic_write")?;
        } else if nv.path.is_ident("codec") {
            attrs.codec = parse_codec_attribute(&nv)?;
        } else {
            return Err(unknown_attribute(&nv));
        }
    }

    attrs.path = path.ok_or_else(|| error("Missing required attribute `path`"))?;
    Ok(attrs)
}

/// Split a signature into its receiver and the identifiers of its typed arguments
pub fn collect_args(sig: &Signature) -> Result<(Option<&Receiver>, Vec<TokenStream2>), TokenStream2> {
    let mut receiver = None;
    let mut arg_pats = Vec::new();
    for arg in sig.inputs.iter() {
        match arg {
            FnArg::Receiver(r) => receiver = Some(r),
            FnArg::Typed(pat_type) => match pat_type.pat.as_ref() {
                Pat::Ident(pat_ident) => {
                    let ident = &pat_ident.ident;
                    arg_pats.push(quote! { #ident });
                }
                _ => {
                    return Err(error(
                        "cached functions need plain identifier arguments to build their key",
                    ))
                }
            },
        }
    }
    Ok((receiver, arg_pats))
}

/// Generate the `CacheKey` expression for a call
///
/// The receiver, if any, is the first positional argument.
pub fn generate_key_expr(receiver: Option<&Receiver>, arg_pats: &[TokenStream2], typed: bool) -> TokenStream2 {
    let self_arg = receiver.map(|r| {
        if r.reference.is_some() {
            quote! { __builder.push_arg(&*self); }
        } else {
            quote! { __builder.push_arg(&self); }
        }
    });
    quote! {{
        #[allow(unused_mut)]
        let mut __builder = ::framecache_core::CacheKey::builder(#typed);
        #self_arg
        #(
            __builder.push_arg(&#arg_pats);
        )*
        __builder.build()
    }}
}

/// The `T` and `E` of a `Result<T, E>` return type
///
/// Single-parameter aliases such as `io::Result<T>` are not recognized.
pub fn result_types(ty: &Type) -> Option<(&Type, &Type)> {
    let Type::Path(type_path) = ty else {
        return None;
    };
    let segment = type_path.path.segments.last()?;
    if segment.ident != "Result" {
        return None;
    }
    let PathArguments::AngleBracketed(generics) = &segment.arguments else {
        return None;
    };
    let mut types = generics.args.iter().filter_map(|arg| match arg {
        GenericArgument::Type(ty) => Some(ty),
        _ => None,
    });
    match (types.next(), types.next(), types.next()) {
        (Some(ok), Some(err), None) => Some((ok, err)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use syn::parse_quote;

    #[test]
    fn test_timed_defaults() {
        let attrs = parse_timed_attributes(TokenStream2::new()).unwrap();
        assert!(attrs.typed);
        assert_eq!(attrs.lifetime.to_string(), "None");
        assert_eq!(attrs.maxsize.to_string(), "None");
        assert!(attrs.custom_name.is_none());
    }

    #[test]
    fn test_timed_all_attributes() {
        let attrs = parse_timed_attributes(quote! {
            seconds = 1.5, maxsize = 32, typed = false, name = "prices"
        })
        .unwrap();
        assert!(!attrs.typed);
        let lifetime = attrs.lifetime.to_string();
        assert!(lifetime.contains("Duration :: new"));
        assert!(lifetime.contains("1u64"));
        assert!(lifetime.contains("500000000u32"));
        assert!(attrs.maxsize.to_string().contains("32"));
        assert_eq!(attrs.custom_name.as_deref(), Some("prices"));
    }

    #[test]
    fn test_unknown_attribute_rejected() {
        assert!(parse_timed_attributes(quote! { ttl = 5 }).is_err());
        assert!(parse_file_attributes(quote! { path = "a.csv", limit = 5 }).is_err());
    }

    #[test]
    fn test_file_requires_path() {
        assert!(parse_file_attributes(quote! { refresh_time = 10 }).is_err());
        let attrs = parse_file_attributes(quote! { path = "a.json", codec = "json", create_dirs = false }).unwrap();
        assert_eq!(attrs.codec, FileCodec::Json);
        assert!(!attrs.create_dirs);
        assert!(attrs.atomic_write);
    }

    #[test]
    fn test_negative_refresh_rejected() {
        assert!(parse_file_attributes(quote! { path = "a.csv", refresh_time = -1.0 }).is_err());
    }

    #[test]
    fn test_unrepresentable_float_seconds_rejected() {
        assert!(parse_timed_attributes(quote! { seconds = 1e30 }).is_err());
        assert!(parse_file_attributes(quote! { path = "a.csv", refresh_time = 1e300 }).is_err());
        assert!(parse_timed_attributes(quote! { seconds = 0.25 }).is_ok());
    }

    #[test]
    fn test_result_types() {
        let ty: Type = parse_quote! { Result<Vec<u8>, MyError> };
        let (ok, err) = result_types(&ty).unwrap();
        assert_eq!(quote!(#ok).to_string(), quote!(Vec<u8>).to_string());
        assert_eq!(quote!(#err).to_string(), "MyError");

        let alias: Type = parse_quote! { std::io::Result<u8> };
        assert!(result_types(&alias).is_none());
        let plain: Type = parse_quote! { u64 };
        assert!(result_types(&plain).is_none());
    }

    #[test]
    fn test_collect_args_rejects_patterns() {
        let sig: Signature = parse_quote! { fn f((a, b): (u8, u8)) -> u8 };
        assert!(collect_args(&sig).is_err());

        let sig: Signature = parse_quote! { fn f(&self, mut a: u8, b: &str) -> u8 };
        let (receiver, args) = collect_args(&sig).unwrap();
        assert!(receiver.is_some());
        assert_eq!(args.len(), 2);
    }
}
