//! `#[subscribe]`.
//!
//! Submits a free function `fn(&mut E)` (or `fn(&E)`) to the process-wide
//! handler collection. `Bus::register_collected` attaches the collection to
//! a bus.

use proc_macro2::TokenStream;
use quote::quote;
use syn::{
    FnArg, Ident, ItemFn, Path, ReturnType, Token, Type,
    parse::{Parse, ParseStream},
};

/// Arguments for the `#[subscribe]` macro.
pub(crate) struct SubscribeArgs {
    /// Priority band; `Normal` when absent.
    priority: Option<Ident>,
}

impl Parse for SubscribeArgs {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let mut priority = None;

        while !input.is_empty() {
            let ident: Ident = input.parse()?;
            input.parse::<Token![=]>()?;

            match ident.to_string().as_str() {
                "priority" => {
                    let path: Path = input.parse()?;
                    priority = path.segments.last().map(|s| s.ident.clone());
                }
                other => {
                    return Err(syn::Error::new(
                        ident.span(),
                        format!("unknown attribute: {}", other),
                    ));
                }
            }

            if input.peek(Token![,]) {
                input.parse::<Token![,]>()?;
            }
        }

        Ok(SubscribeArgs { priority })
    }
}

pub(crate) fn expand(args: SubscribeArgs, input: ItemFn) -> syn::Result<TokenStream> {
    let sig = &input.sig;
    let fn_name = &sig.ident;

    if let Some(asyncness) = &sig.asyncness {
        return Err(syn::Error::new_spanned(
            asyncness,
            "subscribed functions cannot be async",
        ));
    }
    if !sig.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &sig.generics,
            "subscribed functions cannot be generic",
        ));
    }
    if let ReturnType::Type(_, ty) = &sig.output
        && matches!(&**ty, Type::Tuple(tuple) if !tuple.elems.is_empty())
    {
        return Err(syn::Error::new_spanned(
            ty,
            "subscribed functions cannot return values",
        ));
    }

    let (event, mutable) = match (sig.inputs.first(), sig.inputs.len()) {
        (Some(FnArg::Typed(arg)), 1) => match &*arg.ty {
            Type::Reference(reference) => (&*reference.elem, reference.mutability.is_some()),
            other => {
                return Err(syn::Error::new_spanned(
                    other,
                    "the event argument must be a reference: fn(event: &mut Event)",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                &sig.inputs,
                "subscribed functions take exactly one event argument: fn(event: &mut Event)",
            ));
        }
    };

    let priority = match &args.priority {
        Some(band) => quote! { ::herald::Priority::#band },
        None => quote! { ::herald::Priority::Normal },
    };
    let call = if mutable {
        quote! { #fn_name(__event) }
    } else {
        quote! { #fn_name(&*__event) }
    };

    Ok(quote! {
        #input

        const _: () = {
            fn __herald_invoke(
                __event: &mut (dyn ::herald::Event + 'static),
            ) -> ::core::result::Result<(), ::herald::BoxError> {
                let __event = ::herald::collected::project::<#event>(
                    __event,
                    ::core::stringify!(#fn_name),
                )?;
                ::herald::IntoHandlerOutcome::into_outcome(#call)
            }

            ::herald::inventory::submit! {
                ::herald::collected::CollectedHandler {
                    name: ::core::concat!(::core::module_path!(), "::", ::core::stringify!(#fn_name)),
                    event_type: <#event as ::herald::EventKind>::key,
                    priority: #priority,
                    invoke: __herald_invoke,
                }
            }
        };
    })
}
