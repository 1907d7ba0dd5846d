//! `#[handlers]` and the `#[handler]` markers it consumes.
//!
//! Applied to an inherent impl block, `#[handlers]` implements
//! `Subscriber` for the type from its `#[handler]`-marked methods:
//!
//! - `#[handler]` / `#[handler(priority = High)]` marks a handler method;
//! - `#[handler(overrides)]` marks a method overriding an inherited handler
//!   without restating its marker;
//! - `#[handlers(inherit(base: Base))]` inherits the handlers of the
//!   subscriber stored in field `base`.
//!
//! A marked method whose signature is not `fn(&self, &mut E)` (or `&E`),
//! returning `()` or a `Result`, is still declared, as a rejected entry:
//! the bus logs it and skips it at discovery time.

use proc_macro2::TokenStream;
use quote::quote;
use syn::{
    Attribute, FnArg, Ident, ImplItem, ImplItemFn, ItemImpl, Path, ReturnType, Token, Type,
    parenthesized,
    parse::{Parse, ParseStream},
};

// ============================================================================
// Arguments
// ============================================================================

struct Inherit {
    field: Ident,
    ty: Type,
}

/// Arguments of `#[handlers(...)]`.
pub(crate) struct HandlersArgs {
    inherit: Vec<Inherit>,
}

impl Parse for HandlersArgs {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let mut inherit = Vec::new();

        while !input.is_empty() {
            let ident: Ident = input.parse()?;

            match ident.to_string().as_str() {
                "inherit" => {
                    let content;
                    parenthesized!(content in input);
                    while !content.is_empty() {
                        let field: Ident = content.parse()?;
                        content.parse::<Token![:]>()?;
                        let ty: Type = content.parse()?;
                        inherit.push(Inherit { field, ty });

                        if content.peek(Token![,]) {
                            content.parse::<Token![,]>()?;
                        }
                    }
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

        Ok(HandlersArgs { inherit })
    }
}

#[derive(Default)]
struct Marker {
    priority: Option<Ident>,
    overrides: bool,
}

impl Parse for Marker {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let mut marker = Marker::default();

        while !input.is_empty() {
            let ident: Ident = input.parse()?;

            match ident.to_string().as_str() {
                "priority" => {
                    input.parse::<Token![=]>()?;
                    // `High` or `Priority::High`
                    let path: Path = input.parse()?;
                    let band = path
                        .segments
                        .last()
                        .map(|s| s.ident.clone())
                        .ok_or_else(|| syn::Error::new(ident.span(), "expected a priority"))?;
                    marker.priority = Some(band);
                }
                "overrides" => marker.overrides = true,
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

        if marker.overrides && marker.priority.is_some() {
            return Err(input.error("an override keeps its inherited priority"));
        }
        Ok(marker)
    }
}

/// Remove the `#[handler]` attribute from `attrs` and parse it.
fn take_marker(attrs: &mut Vec<Attribute>) -> syn::Result<Option<Marker>> {
    let Some(pos) = attrs.iter().position(|a| a.path().is_ident("handler")) else {
        return Ok(None);
    };
    let attr = attrs.remove(pos);
    if attrs.iter().any(|a| a.path().is_ident("handler")) {
        return Err(syn::Error::new_spanned(
            &attr,
            "a method can carry only one #[handler] marker",
        ));
    }
    match &attr.meta {
        syn::Meta::Path(_) => Ok(Some(Marker::default())),
        _ => attr.parse_args::<Marker>().map(Some),
    }
}

// ============================================================================
// Signature validation
// ============================================================================

struct Accepted {
    event: Type,
    mutable: bool,
}

fn returns_outcome(output: &ReturnType) -> bool {
    match output {
        ReturnType::Default => true,
        ReturnType::Type(_, ty) => match &**ty {
            Type::Tuple(tuple) => tuple.elems.is_empty(),
            Type::Path(path) => path
                .path
                .segments
                .last()
                .is_some_and(|s| s.ident == "Result"),
            _ => false,
        },
    }
}

fn check_signature(method: &ImplItemFn) -> Result<Accepted, String> {
    let sig = &method.sig;
    if sig.asyncness.is_some() {
        return Err("handlers cannot be async".into());
    }
    if !sig.generics.params.is_empty() {
        return Err("handlers cannot be generic".into());
    }

    let mut inputs = sig.inputs.iter();
    match inputs.next() {
        Some(FnArg::Receiver(receiver))
            if receiver.reference.is_some() && receiver.mutability.is_none() => {}
        _ => return Err("handlers must take `&self`".into()),
    }

    let event = match (inputs.next(), inputs.next()) {
        (Some(FnArg::Typed(arg)), None) => match &*arg.ty {
            Type::Reference(reference) => Accepted {
                event: (*reference.elem).clone(),
                mutable: reference.mutability.is_some(),
            },
            _ => return Err("the event parameter must be a reference".into()),
        },
        _ => return Err("expected exactly one event parameter".into()),
    };

    if !returns_outcome(&sig.output) {
        return Err("handlers cannot return values".into());
    }
    Ok(event)
}

// ============================================================================
// Expansion
// ============================================================================

pub(crate) fn expand(args: HandlersArgs, mut item: ItemImpl) -> syn::Result<TokenStream> {
    if let Some((_, path, _)) = &item.trait_ {
        return Err(syn::Error::new_spanned(
            path,
            "#[handlers] must be placed on an inherent impl block",
        ));
    }

    let mut decls = Vec::new();
    for inherit in &args.inherit {
        let (field, ty) = (&inherit.field, &inherit.ty);
        decls.push(quote! {
            .inherit::<#ty>(|__subscriber| &__subscriber.#field)
        });
    }

    for impl_item in &mut item.items {
        let ImplItem::Fn(method) = impl_item else {
            continue;
        };
        let Some(marker) = take_marker(&mut method.attrs)? else {
            continue;
        };

        let ident = &method.sig.ident;
        let name = ident.to_string();
        let accepted = match check_signature(method) {
            Ok(accepted) => accepted,
            Err(reason) => {
                if marker.overrides {
                    return Err(syn::Error::new_spanned(&method.sig, reason));
                }
                decls.push(quote! { .rejected(#name, #reason) });
                continue;
            }
        };

        let event = &accepted.event;
        let call = if accepted.mutable {
            quote! { |__subscriber, __event| Self::#ident(__subscriber, __event) }
        } else {
            quote! { |__subscriber, __event| Self::#ident(__subscriber, &*__event) }
        };

        decls.push(if marker.overrides {
            quote! { .overrides::<#event, _, _>(#name, #call) }
        } else {
            let priority = match &marker.priority {
                Some(band) => quote! { ::core::option::Option::Some(::herald::Priority::#band) },
                None => quote! { ::core::option::Option::None },
            };
            quote! { .handler::<#event, _, _>(#name, #priority, #call) }
        });
    }

    let self_ty = &item.self_ty;
    let (impl_generics, _, where_clause) = item.generics.split_for_impl();

    Ok(quote! {
        #item

        impl #impl_generics ::herald::Subscriber for #self_ty #where_clause {
            fn handlers() -> ::herald::HandlerSet<Self> {
                ::herald::HandlerSet::<Self>::new()
                    #(#decls)*
            }
        }
    })
}
