//! Shared utilities for memoslot procedural macros
//!
//! Parsing of `#[memoize(...)]` attributes and validation of the item the
//! attribute is placed on. Everything here works on `proc_macro2` tokens so
//! it can be unit tested without a compiler plugin.

use proc_macro2::TokenStream as TokenStream2;
use quote::{quote, ToTokens};
use syn::{
    punctuated::Punctuated, Data, DeriveInput, Expr, FnArg, GenericArgument, Ident, Index, Item,
    ItemFn, Member, MetaNameValue, Pat, PathArguments, ReturnType, Token, Type,
};

/// Message for attributes placed on anything that is not a method or getter.
pub const INVALID_TARGET_MESSAGE: &str =
    "Only put a Memoize() decorator on a method or get accessor.";

/// Largest argument list a memoized method may take.
pub const MAX_ARGUMENTS: usize = 8;

/// Parsed `#[memoize(...)]` attributes
#[derive(Debug, Default)]
pub struct MemoizeAttributes {
    pub hash: Option<Expr>,
    pub cache: Option<Expr>,
    pub limit: Option<usize>,
    pub policy: Option<TokenStream2>,
    pub custom_name: Option<String>,
}

impl MemoizeAttributes {
    /// Expression building the per-instance store, if the defaults are not used.
    pub fn store_expr(&self) -> Option<TokenStream2> {
        if let Some(cache) = &self.cache {
            return Some(quote! { (#cache)() });
        }

        self.limit.map(|limit| {
            let policy = self
                .policy
                .clone()
                .unwrap_or_else(|| quote! { ::memoslot::EvictionPolicy::LRU });
            quote! { ::memoslot::BoundedStore::new(#limit, #policy) }
        })
    }
}

/// A method accepted by `#[memoize]`, split into the parts code generation needs.
#[derive(Debug)]
pub struct MemoizedMethod {
    pub item: ItemFn,
    pub arg_idents: Vec<Ident>,
    pub arg_pats: Vec<Pat>,
    pub arg_types: Vec<Type>,
    /// Cached value type: the return type, or `T` of a `Result<T, E>`.
    pub value_type: Type,
    pub is_result: bool,
}

fn error(msg: &str) -> TokenStream2 {
    quote! { compile_error!(#msg); }
}

fn spanned_error<T: ToTokens>(tokens: T, msg: &str) -> TokenStream2 {
    syn::Error::new_spanned(tokens, msg).to_compile_error()
}

/// Parse the `limit` attribute
pub fn parse_limit_attribute(nv: &MetaNameValue) -> Result<usize, TokenStream2> {
    match &nv.value {
        Expr::Lit(expr_lit) => match &expr_lit.lit {
            syn::Lit::Int(lit_int) => lit_int
                .base10_parse::<usize>()
                .map_err(|_| error("limit must be a non-negative integer")),
            _ => Err(error("Invalid literal for `limit`: expected integer")),
        },
        _ => Err(error(
            "Invalid syntax for `limit`: expected `limit = <integer>`",
        )),
    }
}

/// Parse the `policy` attribute into an `EvictionPolicy` path
pub fn parse_policy_attribute(nv: &MetaNameValue) -> Result<TokenStream2, TokenStream2> {
    match &nv.value {
        Expr::Lit(expr_lit) => match &expr_lit.lit {
            syn::Lit::Str(s) => match s.value().as_str() {
                "fifo" => Ok(quote! { ::memoslot::EvictionPolicy::FIFO }),
                "lru" => Ok(quote! { ::memoslot::EvictionPolicy::LRU }),
                "lfu" => Ok(quote! { ::memoslot::EvictionPolicy::LFU }),
                _ => Err(error(
                    "Invalid policy: expected \"fifo\", \"lru\", or \"lfu\"",
                )),
            },
            _ => Err(error("Invalid literal for `policy`: expected string")),
        },
        _ => Err(error(
            "Invalid syntax for `policy`: expected `policy = \"fifo\"|\"lru\"|\"lfu\"`",
        )),
    }
}

/// Parse the `name` attribute
pub fn parse_name_attribute(nv: &MetaNameValue) -> Result<String, TokenStream2> {
    match &nv.value {
        Expr::Lit(expr_lit) => match &expr_lit.lit {
            syn::Lit::Str(s) => Ok(s.value()),
            _ => Err(error("Invalid literal for `name`: expected string")),
        },
        _ => Err(error("Invalid syntax for `name`: expected `name = \"...\"`")),
    }
}

/// Turns `key = value` into a `MetaNameValue`. Anything else is `None`.
fn as_name_value(expr: &Expr) -> Option<MetaNameValue> {
    match expr {
        Expr::Assign(assign) => match &*assign.left {
            Expr::Path(path) if path.qself.is_none() && path.path.get_ident().is_some() => {
                Some(MetaNameValue {
                    path: path.path.clone(),
                    eq_token: assign.eq_token,
                    value: (*assign.right).clone(),
                })
            }
            _ => None,
        },
        _ => None,
    }
}

/// Parse memoize attributes from a token stream
///
/// Accepts `key = value` pairs plus, in first position only, a bare
/// expression that is shorthand for `hash = <expr>`.
pub fn parse_memoize_attributes(attr: TokenStream2) -> Result<MemoizeAttributes, TokenStream2> {
    use syn::parse::Parser;

    let parser = Punctuated::<Expr, Token![,]>::parse_terminated;
    let parsed_args = parser.parse2(attr).map_err(|e| {
        let msg = format!("Failed to parse attributes: {}", e);
        error(&msg)
    })?;

    let mut attrs = MemoizeAttributes::default();

    for (index, expr) in parsed_args.into_iter().enumerate() {
        let nv = match as_name_value(&expr) {
            Some(nv) => nv,
            None if index == 0 => {
                attrs.hash = Some(expr);
                continue;
            }
            None => {
                return Err(spanned_error(
                    expr,
                    "Invalid attribute: expected `key = value` (a bare hash function is only allowed first)",
                ))
            }
        };

        if nv.path.is_ident("hash") {
            if attrs.hash.is_some() {
                return Err(spanned_error(nv, "hash function given more than once"));
            }
            attrs.hash = Some(nv.value);
        } else if nv.path.is_ident("cache") {
            attrs.cache = Some(nv.value);
        } else if nv.path.is_ident("limit") {
            attrs.limit = Some(parse_limit_attribute(&nv)?);
        } else if nv.path.is_ident("policy") {
            attrs.policy = Some(parse_policy_attribute(&nv)?);
        } else if nv.path.is_ident("name") {
            attrs.custom_name = Some(parse_name_attribute(&nv)?);
        } else {
            let msg = format!(
                "Unknown memoize attribute `{}`: expected hash, cache, limit, policy or name",
                nv.path.to_token_stream()
            );
            return Err(spanned_error(&nv.path, &msg));
        }
    }

    if attrs.cache.is_some() && attrs.limit.is_some() {
        return Err(error(
            "`cache` and `limit` are mutually exclusive: use `cache = || BoundedStore::new(..)` or `limit`/`policy`",
        ));
    }
    if attrs.policy.is_some() && attrs.limit.is_none() {
        return Err(error("`policy` requires `limit`"));
    }

    Ok(attrs)
}

/// Returns the `T` of `Result<T, E>` (or of an alias like `io::Result<T>`).
pub fn result_value_type(ty: &Type) -> Option<Type> {
    let Type::Path(type_path) = ty else {
        return None;
    };
    let segment = type_path.path.segments.last()?;
    if segment.ident != "Result" {
        return None;
    }
    let PathArguments::AngleBracketed(args) = &segment.arguments else {
        return None;
    };
    args.args.iter().find_map(|arg| match arg {
        GenericArgument::Type(ty) => Some(ty.clone()),
        _ => None,
    })
}

fn is_unit(ty: &Type) -> bool {
    matches!(ty, Type::Tuple(tuple) if tuple.elems.is_empty())
}

/// Validates the item under `#[memoize]` and splits it for code generation.
///
/// Only methods taking `&self` and returning a value are accepted. Types,
/// constants, statics, free functions and setters (no return value) get the
/// invalid-target error.
pub fn classify_member(item: TokenStream2) -> Result<MemoizedMethod, TokenStream2> {
    let item: Item = syn::parse2(item).map_err(|_| error(INVALID_TARGET_MESSAGE))?;

    let Item::Fn(mut item) = item else {
        return Err(error(INVALID_TARGET_MESSAGE));
    };

    let sig = &item.sig;
    let value_type = match &sig.output {
        ReturnType::Type(_, ty) if !is_unit(ty) => (**ty).clone(),
        _ => return Err(spanned_error(&sig.ident, INVALID_TARGET_MESSAGE)),
    };

    let receiver = match sig.inputs.first() {
        Some(FnArg::Receiver(receiver)) => receiver,
        _ => return Err(spanned_error(&sig.ident, INVALID_TARGET_MESSAGE)),
    };
    let shared = matches!(&*receiver.ty, Type::Reference(r) if r.mutability.is_none());
    if !shared {
        return Err(spanned_error(
            receiver,
            "memoized methods must take `&self`: cached values live in the instance",
        ));
    }

    if let Some(asyncness) = &sig.asyncness {
        return Err(spanned_error(asyncness, "async methods cannot be memoized"));
    }
    if sig.generics.type_params().next().is_some() || sig.generics.const_params().next().is_some()
    {
        return Err(spanned_error(
            &sig.generics,
            "generic methods cannot be memoized: the cached value type must be fixed",
        ));
    }

    let mut arg_idents = Vec::new();
    let mut arg_pats = Vec::new();
    let mut arg_types = Vec::new();

    for arg in item.sig.inputs.iter_mut().skip(1) {
        let FnArg::Typed(pat_type) = arg else {
            continue;
        };
        if let Type::ImplTrait(ty) = &*pat_type.ty {
            return Err(spanned_error(ty, "`impl Trait` arguments cannot be memoized"));
        }
        let pat_ident = match &mut *pat_type.pat {
            Pat::Ident(pat_ident) if pat_ident.by_ref.is_none() && pat_ident.subpat.is_none() => {
                pat_ident
            }
            other => {
                return Err(spanned_error(
                    &*other,
                    "memoized method arguments must be plain identifiers",
                ))
            }
        };

        arg_pats.push(Pat::Ident(pat_ident.clone()));
        arg_idents.push(pat_ident.ident.clone());
        arg_types.push((*pat_type.ty).clone());
        // `mut` only matters inside the original body
        pat_ident.mutability = None;
    }

    if arg_idents.len() > MAX_ARGUMENTS {
        let msg = format!(
            "memoized methods take at most {} arguments, found {}",
            MAX_ARGUMENTS,
            arg_idents.len()
        );
        return Err(spanned_error(&item.sig.inputs, &msg));
    }

    let (value_type, is_result) = match result_value_type(&value_type) {
        Some(ok) => (ok, true),
        None => (value_type, false),
    };

    Ok(MemoizedMethod {
        item,
        arg_idents,
        arg_pats,
        arg_types,
        value_type,
        is_result,
    })
}

/// Message for argument lists that cannot be keyed without a hash function.
pub fn missing_hash_message(arity: usize) -> String {
    format!(
        "You are applying memoization to a method that accepts arguments of non-primitive types ({} argument(s)). \n\
         Please provide an explicit hash function that deterministically converts arguments \n\
         to a primitive type, like so: #[memoize(hash = |u: &User, c: &Company| format!(\"{{}}:{{}}\", u.id, c.id))]",
        arity
    )
}

/// Rejects methods with several arguments and no hash function.
///
/// A single argument may still be a primitive, so that case is left to the
/// runtime check.
pub fn validate_key_derivation(
    attrs: &MemoizeAttributes,
    method: &MemoizedMethod,
) -> Result<(), TokenStream2> {
    let arity = method.arg_idents.len();
    if arity > 1 && attrs.hash.is_none() {
        return Err(spanned_error(
            &method.item.sig.ident,
            &missing_hash_message(arity),
        ));
    }
    Ok(())
}

/// Expressions handing each destructured argument to the hash function as `&T`.
///
/// Destructuring `&(A, B)` binds `&A` and `&B`; reference arguments are
/// dereferenced once so `&str` arrives as `&str`, not `&&str`.
pub fn hash_arguments(method: &MemoizedMethod) -> Vec<TokenStream2> {
    method
        .arg_idents
        .iter()
        .zip(&method.arg_types)
        .map(|(ident, ty)| match ty {
            Type::Reference(r) if r.mutability.is_some() => quote! { &**#ident },
            Type::Reference(_) => quote! { *#ident },
            _ => quote! { #ident },
        })
        .collect()
}

fn is_memo_slots(ty: &Type) -> bool {
    match ty {
        Type::Path(type_path) => type_path
            .path
            .segments
            .last()
            .is_some_and(|segment| segment.ident == "MemoSlots"),
        _ => false,
    }
}

/// Locates the single `MemoSlots` field of a struct deriving `Memoizable`.
pub fn find_slots_field(input: &DeriveInput) -> Result<Member, TokenStream2> {
    let Data::Struct(data) = &input.data else {
        return Err(spanned_error(
            &input.ident,
            "Memoizable can only be derived for structs",
        ));
    };

    let mut fields = data
        .fields
        .iter()
        .enumerate()
        .filter(|(_, field)| is_memo_slots(&field.ty))
        .map(|(index, field)| match &field.ident {
            Some(ident) => Member::Named(ident.clone()),
            None => Member::Unnamed(Index::from(index)),
        });

    match (fields.next(), fields.next()) {
        (Some(member), None) => Ok(member),
        (None, _) => Err(spanned_error(
            &input.ident,
            "Memoizable requires a field of type `MemoSlots`",
        )),
        (Some(_), Some(_)) => Err(spanned_error(
            &input.ident,
            "Memoizable found more than one `MemoSlots` field",
        )),
    }
}
