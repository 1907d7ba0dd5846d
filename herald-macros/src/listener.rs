//! `#[derive(Listener)]`.
//!
//! The identity field is the one marked `#[listener(id)]`, or else the
//! field of type `ListenerId`. A struct-level `#[listener(name = "...")]`
//! overrides the debug name.

use proc_macro2::TokenStream;
use quote::quote;
use syn::{Attribute, Data, DeriveInput, Fields, Ident, LitStr, Member, Token, Type};

fn is_listener_id(ty: &Type) -> bool {
    matches!(ty, Type::Path(path) if path.path.segments.last().is_some_and(|s| s.ident == "ListenerId"))
}

fn is_id_marker(attr: &Attribute) -> syn::Result<bool> {
    if !attr.path().is_ident("listener") {
        return Ok(false);
    }
    let ident: Ident = attr.parse_args()?;
    if ident != "id" {
        return Err(syn::Error::new(
            ident.span(),
            format!("unknown field marker: {}", ident),
        ));
    }
    Ok(true)
}

fn debug_name(attrs: &[Attribute]) -> syn::Result<Option<LitStr>> {
    let mut name = None;
    for attr in attrs.iter().filter(|a| a.path().is_ident("listener")) {
        attr.parse_args_with(|input: syn::parse::ParseStream| {
            while !input.is_empty() {
                let ident: Ident = input.parse()?;
                input.parse::<Token![=]>()?;

                match ident.to_string().as_str() {
                    "name" => name = Some(input.parse::<LitStr>()?),
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
            Ok(())
        })?;
    }
    Ok(name)
}

pub(crate) fn derive(input: DeriveInput) -> syn::Result<TokenStream> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let fields = match &input.data {
        Data::Struct(data) => &data.fields,
        _ => {
            return Err(syn::Error::new_spanned(
                name,
                "#[derive(Listener)] can only be used on structs",
            ));
        }
    };

    let members: Vec<(Member, &syn::Field)> = match fields {
        Fields::Named(named) => named
            .named
            .iter()
            .filter_map(|f| f.ident.clone().map(|i| (Member::Named(i), f)))
            .collect(),
        Fields::Unnamed(unnamed) => unnamed
            .unnamed
            .iter()
            .enumerate()
            .map(|(i, f)| (Member::Unnamed(i.into()), f))
            .collect(),
        Fields::Unit => Vec::new(),
    };

    let mut marked = None;
    for (member, field) in &members {
        for attr in &field.attrs {
            if is_id_marker(attr)? {
                if marked.is_some() {
                    return Err(syn::Error::new_spanned(
                        attr,
                        "only one field can be marked #[listener(id)]",
                    ));
                }
                marked = Some(member.clone());
            }
        }
    }

    let id_member = match marked {
        Some(member) => member,
        None => members
            .iter()
            .find(|(_, field)| is_listener_id(&field.ty))
            .map(|(member, _)| member.clone())
            .ok_or_else(|| {
                syn::Error::new_spanned(
                    name,
                    "#[derive(Listener)] needs a `ListenerId` field, optionally marked #[listener(id)]",
                )
            })?,
    };

    let debug_name = debug_name(&input.attrs)?.map(|lit| {
        quote! {
            fn debug_name(&self) -> ::std::borrow::Cow<'static, str> {
                ::std::borrow::Cow::Borrowed(#lit)
            }
        }
    });

    Ok(quote! {
        impl #impl_generics ::herald::Listener for #name #ty_generics #where_clause {
            fn listener_id(&self) -> ::herald::ListenerId {
                self.#id_member
            }

            #debug_name
        }
    })
}
