use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{parse_macro_input, DeriveInput, ReturnType};

use memoslot_macro_utils::{
    classify_member, find_slots_field, hash_arguments, parse_memoize_attributes,
    validate_key_derivation, MemoizeAttributes, MemoizedMethod,
};

/// Generate the hash closure handed to the dispatcher
fn generate_hash_closure(hash: &syn::Expr, method: &MemoizedMethod) -> TokenStream2 {
    let arg_idents = &method.arg_idents;
    let arg_types = &method.arg_types;
    let hash_args = hash_arguments(method);

    quote! {
        let __memo_hash = |_: &Self, __memo_args: &(#(#arg_types,)*)| -> ::std::string::String {
            let (#(#arg_idents,)*) = __memo_args;
            (#hash)(#(#hash_args),*)
        };
    }
}

/// Generate the call into the dispatcher, unwrapping its error
fn generate_invocation(method: &MemoizedMethod) -> TokenStream2 {
    let arg_idents = &method.arg_idents;

    if method.is_result {
        quote! {
            match __memo_dispatcher.try_call(self, (#(#arg_idents,)*), |__memo_args| {
                __memo_original(__memo_args).map_err(::memoslot::__private::Failure::Operation)
            }) {
                ::std::result::Result::Ok(value) => ::std::result::Result::Ok(value),
                ::std::result::Result::Err(::memoslot::__private::Failure::Operation(err)) => {
                    ::std::result::Result::Err(err)
                }
                ::std::result::Result::Err(::memoslot::__private::Failure::Memoize(err)) => {
                    ::std::panic!("{}", err)
                }
            }
        }
    } else {
        quote! {
            match __memo_dispatcher.call(self, (#(#arg_idents,)*), __memo_original) {
                ::std::result::Result::Ok(value) => value,
                ::std::result::Result::Err(err) => ::std::panic!("{}", err),
            }
        }
    }
}

fn expand_memoize(attrs: MemoizeAttributes, method: MemoizedMethod) -> TokenStream2 {
    let syn::ItemFn {
        attrs: fn_attrs,
        vis,
        sig,
        block,
    } = &method.item;

    let ret_type = match &sig.output {
        ReturnType::Type(_, ty) => quote! { #ty },
        ReturnType::Default => quote! { () },
    };
    let value_type = &method.value_type;
    let arg_pats = &method.arg_pats;
    let arg_types = &method.arg_types;

    // Use custom name if provided, otherwise use method name
    let stats_name = attrs
        .custom_name
        .clone()
        .unwrap_or_else(|| sig.ident.to_string());

    // With a hash function the arguments need no `Argument` impl: the key
    // deriver is picked per concrete type and falls back to hashing.
    let (hash_closure, constructor, hash_call) = match &attrs.hash {
        Some(hash) => (
            generate_hash_closure(hash, &method),
            quote! {
                with_primitive_keys(*__MEMO_SLOT, {
                    #[allow(unused_imports)]
                    use ::memoslot::__private::{OpaqueKeys as _, PrimitiveKeys as _};
                    (&::memoslot::__private::KeySelector::<(#(#arg_types,)*)>::new()).key_deriver()
                })
            },
            quote! { .hash_function(&__memo_hash) },
        ),
        None => (quote! {}, quote! { new(*__MEMO_SLOT) }, quote! {}),
    };

    let (factory_closure, factory_call) = match attrs.store_expr() {
        Some(store) => (
            quote! {
                let __memo_factory = || -> ::std::boxed::Box<dyn ::memoslot::CacheStore<#value_type>> {
                    ::std::boxed::Box::new(#store)
                };
            },
            quote! { .cache_factory(&__memo_factory) },
        ),
        None => (quote! {}, quote! {}),
    };

    let invocation = generate_invocation(&method);

    quote! {
        #(#fn_attrs)*
        #vis #sig {
            static __MEMO_SLOT: ::memoslot::__private::Lazy<::memoslot::SlotToken> =
                ::memoslot::__private::Lazy::new(::memoslot::SlotToken::allocate);
            static __MEMO_STATS: ::memoslot::__private::Lazy<::memoslot::CacheStats> =
                ::memoslot::__private::Lazy::new(::memoslot::CacheStats::new);
            static __MEMO_REGISTER: ::std::sync::Once = ::std::sync::Once::new();
            __MEMO_REGISTER.call_once(|| {
                ::memoslot::__private::register_stats(#stats_name, &__MEMO_STATS);
            });

            #hash_closure
            #factory_closure

            let __memo_original = |(#(#arg_pats,)*): (#(#arg_types,)*)| -> #ret_type #block;

            let __memo_dispatcher =
                ::memoslot::Dispatcher::<Self, (#(#arg_types,)*), #value_type>::#constructor
                    .stats(&__MEMO_STATS)
                    #hash_call
                    #factory_call;

            #invocation
        }
    }
}

/// Memoizes a method or getter per instance.
///
/// The first call on an instance runs the method body and stores the result
/// in the instance's `MemoSlots`; later calls with the same key return a
/// clone of the stored value. Other instances, including clones, keep their
/// own results.
///
/// # Requirements
///
/// - **Receiver**: the method must take `&self`, and `Self` must implement
///   `Memoizable` (usually `#[derive(Memoizable)]`)
/// - **Return type**: must implement `Clone + Send + Sync + 'static`; setters
///   (no return value) are rejected
/// - **Arguments**: plain identifiers, at most 8
///
/// # Keys
///
/// - **No arguments**: one value per instance. `0`, `false`, `""` and `None`
///   are cached like any other result.
/// - **One primitive argument** (integers, floats, `bool`, `char`, strings,
///   `Option` of those): the argument is the key.
/// - **Anything else**: a hash function is required. It receives a reference
///   to each argument and returns a `String`. Several arguments without one
///   is a compile error. With a hash function, argument types need no
///   `Argument` impl, so `Duration`, `PathBuf` and other foreign types work.
///
/// # Macro Parameters
///
/// - `hash` (optional): hash function, `hash = |a: &A, b: &B| ...`. A bare
///   expression in first position is shorthand for it.
/// - `cache` (optional): factory of the per-instance store, called once per
///   instance: `cache = || BoundedStore::lfu(100)`. Default: unbounded map.
/// - `limit` / `policy` (optional): shorthand for a `BoundedStore` with the
///   given capacity and `"fifo"`, `"lru"` (default) or `"lfu"` eviction.
/// - `name` (optional): name in the statistics registry. Default: the method
///   name.
///
/// # Result Methods
///
/// For methods returning `Result<T, E>`, only `Ok` values are cached. An
/// `Err` is returned as-is and the next call runs the body again.
///
/// # Panics
///
/// A single non-primitive argument without a hash function panics with the
/// missing hash function message on the first call, before the body runs.
/// Such a type must opt in with an empty `Argument` impl to compile at all.
///
/// # Concurrency
///
/// Threads calling with the same missing key on the same instance wait for
/// the first one; the body runs once per key per instance.
///
/// # Examples
///
/// ```ignore
/// use memoslot::{memoize, BoundedStore, MemoSlots, Memoizable};
///
/// #[derive(Default, Memoizable)]
/// struct Directory {
///     slots: MemoSlots,
/// }
///
/// impl Directory {
///     #[memoize]
///     fn greeting(&self, name: &str) -> String {
///         format!("Hello, {}", name)
///     }
///
///     #[memoize(hash = |u: &User, c: &Company| format!("{}:{}", u.id, c.id))]
///     fn membership(&self, u: &User, c: &Company) -> Membership {
///         lookup(u, c)
///     }
///
///     #[memoize(cache = || BoundedStore::lfu(2))]
///     fn profile(&self, id: u64) -> Profile {
///         fetch(id)
///     }
/// }
/// ```
#[proc_macro_attribute]
pub fn memoize(attr: TokenStream, item: TokenStream) -> TokenStream {
    let attrs = match parse_memoize_attributes(attr.into()) {
        Ok(attrs) => attrs,
        Err(err) => return err.into(),
    };

    let method = match classify_member(item.into()) {
        Ok(method) => method,
        Err(err) => return err.into(),
    };

    if let Err(err) = validate_key_derivation(&attrs, &method) {
        return err.into();
    }

    TokenStream::from(expand_memoize(attrs, method))
}

/// Implements `Memoizable` by pointing it at the struct's `MemoSlots` field.
#[proc_macro_derive(Memoizable)]
pub fn derive_memoizable(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    let member = match find_slots_field(&input) {
        Ok(member) => member,
        Err(err) => return err.into(),
    };

    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let expanded = quote! {
        impl #impl_generics ::memoslot::Memoizable for #name #ty_generics #where_clause {
            fn memo_slots(&self) -> &::memoslot::MemoSlots {
                &self.#member
            }
        }
    };

    TokenStream::from(expanded)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expand(attr: TokenStream2, item: TokenStream2) -> String {
        let attrs = parse_memoize_attributes(attr).unwrap();
        let method = classify_member(item).unwrap();
        expand_memoize(attrs, method).to_string()
    }

    #[test]
    fn test_expansion_names_only_the_facade() {
        let expanded = expand(
            quote! { limit = 2, policy = "lfu" },
            quote! { fn greet(&self, name: &str) -> Result<String, String> { Ok(name.to_string()) } },
        );

        assert!(!expanded.contains("memoslot_core"));
        assert!(expanded.contains(":: memoslot :: Dispatcher"));
        assert!(expanded.contains(":: memoslot :: __private :: Failure"));
    }

    #[test]
    fn test_hash_expansion_selects_key_deriver() {
        let expanded = expand(
            quote! { hash = |d: &Duration| d.as_millis().to_string() },
            quote! { fn label(&self, d: Duration) -> String { String::new() } },
        );

        assert!(expanded.contains("with_primitive_keys"));
        assert!(expanded.contains("KeySelector"));
        assert!(expanded.contains("hash_function"));
    }

    #[test]
    fn test_plain_expansion_uses_primitive_keys() {
        let expanded = expand(
            TokenStream2::new(),
            quote! { fn square(&self, n: u64) -> u64 { n * n } },
        );

        assert!(expanded.contains("new (* __MEMO_SLOT)"));
        assert!(!expanded.contains("KeySelector"));
    }
}
