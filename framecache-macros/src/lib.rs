use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{parse_macro_input, ItemFn, ReturnType};

use framecache_macro_utils::{
    collect_args, generate_key_expr, parse_file_attributes, parse_timed_attributes, result_types,
};

/// Memoizes a function in memory, bounded by entry count and by a lifetime
/// shared by all entries.
///
/// # Macro Parameters
///
/// - `seconds` (optional): lifetime of the whole cache. The first call at or
///   after the expiration instant empties the cache and starts a new lifetime.
///   The first lifetime starts on the first call. Default: never expires.
/// - `maxsize` (optional): maximum number of entries; the least recently used
///   entry is evicted to make room. Default: unbounded.
/// - `typed` (optional): when `true` (default), arguments of different types
///   are cached separately, so `f(1_i32)` and `f(1.0)` are two entries.
/// - `name` (optional): registry name used by `framecache::cache_clear` and
///   `framecache::cache_info`. Default: the function name.
///
/// # Requirements
///
/// - Arguments must implement `CacheableArg` and be bound to plain identifiers.
/// - The return type (or `T` of a `Result<T, E>`) must be `Clone + Send + 'static`.
/// - Generic functions are not supported: the cache is a `static`.
///
/// # Cache Behavior
///
/// - For `Result<T, E>` return types only `Ok` values are cached.
/// - Concurrent calls with the same arguments run the body once.
/// - Methods take `self` as the first key argument.
///
/// # Examples
///
/// ```ignore
/// use framecache::timed_lru_cache;
///
/// #[timed_lru_cache(seconds = 300, maxsize = 64)]
/// fn quote(symbol: &str) -> Result<f64, FeedError> {
///     fetch_quote(symbol)
/// }
/// ```
#[proc_macro_attribute]
pub fn timed_lru_cache(attr: TokenStream, item: TokenStream) -> TokenStream {
    let attrs = match parse_timed_attributes(attr.into()) {
        Ok(attrs) => attrs,
        Err(err) => return err.into(),
    };

    let input = parse_macro_input!(item as ItemFn);
    let vis = &input.vis;
    let fn_attrs = &input.attrs;
    let sig = &input.sig;
    let ident = &sig.ident;
    let block = &input.block;

    let ret_type = match &sig.output {
        ReturnType::Type(_, ty) => quote! { #ty },
        ReturnType::Default => quote! { () },
    };

    let (receiver, arg_pats) = match collect_args(sig) {
        Ok(args) => args,
        Err(err) => return err.into(),
    };
    let key_expr = generate_key_expr(receiver, &arg_pats, attrs.typed);

    let cache_ident = format_ident!("TIMED_LRU_CACHE_{}", ident.to_string().to_uppercase());
    let fn_name_str = attrs.custom_name.unwrap_or_else(|| ident.to_string());
    let lifetime = &attrs.lifetime;
    let maxsize = &attrs.maxsize;
    let typed = attrs.typed;

    let result = match &sig.output {
        ReturnType::Type(_, ty) => result_types(ty),
        ReturnType::Default => None,
    };
    let (value_type, call): (TokenStream2, TokenStream2) = match result {
        Some((ok, _)) => (
            quote! { #ok },
            quote! { #cache_ident.get_or_try_insert_with(__key, || -> #ret_type #block) },
        ),
        None => (
            ret_type.clone(),
            quote! { #cache_ident.get_or_insert_with(__key, || -> #ret_type #block) },
        ),
    };

    let expanded = quote! {
        #(#fn_attrs)*
        #vis #sig {
            static #cache_ident: ::framecache_core::__private::Lazy<::framecache_core::TimedLruCache<#value_type>> =
                ::framecache_core::__private::Lazy::new(|| {
                    let __cache = ::framecache_core::TimedLruCache::new(::framecache_core::TimedCacheConfig {
                        lifetime: #lifetime,
                        maxsize: #maxsize,
                        typed: #typed,
                    });
                    ::framecache_core::CacheRegistry::global().register(#fn_name_str, __cache.clone());
                    __cache
                });

            let __key = #key_expr;
            #call
        }
    };

    TokenStream::from(expanded)
}

/// Persists a function's result to a file and reuses it until the file is
/// older than `refresh_time`.
///
/// The decision depends on the file alone: arguments are passed to the body on
/// a miss but do not select a file.
///
/// # Macro Parameters
///
/// - `path` (required): where the result is stored; any expression accepted by
///   `PathBuf::from`.
/// - `refresh_time` (optional): maximum age in seconds (integer or float).
///   Default: an existing file is always reused.
/// - `create_dirs` (optional): create missing parent directories. Default `true`.
/// - `atomic_write` (optional): write through a temporary file. Default `true`.
/// - `codec` (optional): `"csv"` (default, for `Frame`) or `"json"` (any serde value).
///
/// # Requirements
///
/// The function must return `Result<T, E>` with `E: From<StorageError>`, so
/// storage failures can be reported through the declared error type.
///
/// # Examples
///
/// ```ignore
/// use framecache::{cache_to_file, Frame, StorageError};
///
/// #[cache_to_file(path = "cache/prices.csv", refresh_time = 3600)]
/// fn prices() -> Result<Frame, AppError> {
///     download_prices()
/// }
/// ```
#[proc_macro_attribute]
pub fn cache_to_file(attr: TokenStream, item: TokenStream) -> TokenStream {
    let attrs = match parse_file_attributes(attr.into()) {
        Ok(attrs) => attrs,
        Err(err) => return err.into(),
    };

    let input = parse_macro_input!(item as ItemFn);
    let vis = &input.vis;
    let fn_attrs = &input.attrs;
    let sig = &input.sig;
    let ident = &sig.ident;
    let block = &input.block;

    let ret_type = match &sig.output {
        ReturnType::Type(_, ty) if result_types(ty).is_some() => quote! { #ty },
        _ => {
            return quote! {
                compile_error!("#[cache_to_file] functions must return `Result<T, E>` where `E: From<StorageError>`");
            }
            .into()
        }
    };

    let cache_ident = format_ident!("FILE_CACHE_{}", ident.to_string().to_uppercase());
    let path = &attrs.path;
    let refresh_time = &attrs.refresh_time;
    let create_dirs = attrs.create_dirs;
    let atomic_write = attrs.atomic_write;
    let codec_type = attrs.codec.type_tokens();
    let codec = attrs.codec.constructor();

    let expanded = quote! {
        #(#fn_attrs)*
        #vis #sig {
            static #cache_ident: ::framecache_core::__private::Lazy<::framecache_core::FileCache<#codec_type>> =
                ::framecache_core::__private::Lazy::new(|| {
                    ::framecache_core::FileCache::new(
                        ::framecache_core::FileCacheConfig {
                            path: ::std::path::PathBuf::from(#path),
                            refresh_time: #refresh_time,
                            create_dirs: #create_dirs,
                            atomic_write: #atomic_write,
                        },
                        #codec,
                    )
                });

            #cache_ident
                .get_or_refresh(|| -> #ret_type #block)
                .map_err(::framecache_core::CacheError::into_inner)
        }
    };

    TokenStream::from(expanded)
}
