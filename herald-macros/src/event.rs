//! `#[derive(Event)]`.
//!
//! The struct names where its `EventState` lives: either a field marked
//! `#[event(state)]` (a root event) or a field marked `#[event(parent)]`
//! holding the parent event. Without a marker, a field of type `EventState`
//! is used as the state.

use proc_macro2::TokenStream;
use quote::quote;
use syn::{Data, DeriveInput, Field, Fields, Ident, Type};

enum Anchor<'a> {
    State(&'a Ident),
    Parent(&'a Ident, &'a Type),
}

fn marker(field: &Field) -> syn::Result<Option<Ident>> {
    let mut found = None;
    for attr in field.attrs.iter().filter(|a| a.path().is_ident("event")) {
        let ident: Ident = attr.parse_args()?;
        match ident.to_string().as_str() {
            "state" | "parent" => {
                if found.is_some() {
                    return Err(syn::Error::new(
                        ident.span(),
                        "a field can carry only one #[event] marker",
                    ));
                }
                found = Some(ident);
            }
            other => {
                return Err(syn::Error::new(
                    ident.span(),
                    format!("unknown event marker: {}", other),
                ));
            }
        }
    }
    Ok(found)
}

fn is_event_state(ty: &Type) -> bool {
    matches!(ty, Type::Path(path) if path.path.segments.last().is_some_and(|s| s.ident == "EventState"))
}

fn anchor(input: &DeriveInput) -> syn::Result<Anchor<'_>> {
    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    &input.ident,
                    "#[derive(Event)] requires a struct with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                &input.ident,
                "#[derive(Event)] can only be used on structs",
            ));
        }
    };

    let mut anchor = None;
    for field in fields {
        let Some(kind) = marker(field)? else {
            continue;
        };
        if anchor.is_some() {
            return Err(syn::Error::new(
                kind.span(),
                "only one field can be marked #[event(state)] or #[event(parent)]",
            ));
        }
        let Some(ident) = field.ident.as_ref() else {
            continue;
        };
        anchor = Some(if kind == "state" {
            Anchor::State(ident)
        } else {
            Anchor::Parent(ident, &field.ty)
        });
    }

    if let Some(anchor) = anchor {
        return Ok(anchor);
    }

    fields
        .iter()
        .find(|field| is_event_state(&field.ty))
        .and_then(|field| field.ident.as_ref())
        .map(Anchor::State)
        .ok_or_else(|| {
            syn::Error::new(
                input.ident.span(),
                "#[derive(Event)] needs a field marked #[event(state)] or #[event(parent)]",
            )
        })
}

pub(crate) fn derive(input: DeriveInput) -> syn::Result<TokenStream> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let body = match anchor(&input)? {
        Anchor::State(field) => quote! { ::herald::__event_body!(state: #field); },
        Anchor::Parent(field, parent) => quote! { ::herald::__event_body!(parent: #field: #parent); },
    };

    Ok(quote! {
        impl #impl_generics ::herald::Event for #name #ty_generics #where_clause {
            #body
        }
    })
}
