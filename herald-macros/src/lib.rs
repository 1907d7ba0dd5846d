//! Procedural macros for Herald.
//!
//! Use them through the `herald` crate (feature `macros`, on by default);
//! the expansions refer to `::herald` paths.

use proc_macro::TokenStream;
use syn::{DeriveInput, ItemFn, ItemImpl, parse_macro_input};

mod event;
mod handlers;
mod listener;
mod subscribe;

/// Derive macro for implementing `Event`.
///
/// Mark the `EventState` field with `#[event(state)]`, or the parent event
/// field with `#[event(parent)]`.
#[proc_macro_derive(Event, attributes(event))]
pub fn derive_event(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    event::derive(input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

/// Derive macro for implementing `Listener`.
///
/// The identity is the `#[listener(id)]` field (or the `ListenerId` field).
/// `#[listener(name = "...")]` on the struct sets the debug name.
#[proc_macro_derive(Listener, attributes(listener))]
pub fn derive_listener(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    listener::derive(input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

/// Implement `Subscriber` from the `#[handler]` methods of an impl block.
#[proc_macro_attribute]
pub fn handlers(attr: TokenStream, item: TokenStream) -> TokenStream {
    let args = parse_macro_input!(attr as handlers::HandlersArgs);
    let input = parse_macro_input!(item as ItemImpl);
    handlers::expand(args, input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

/// Marks a handler method. Only valid inside a `#[handlers]` impl block.
#[proc_macro_attribute]
pub fn handler(_attr: TokenStream, item: TokenStream) -> TokenStream {
    let mut output: TokenStream = syn::Error::new(
        proc_macro2::Span::call_site(),
        "#[handler] must be used on a method inside a #[handlers] impl block",
    )
    .into_compile_error()
    .into();
    output.extend(item);
    output
}

/// Submit a free function to the process-wide handler collection.
#[proc_macro_attribute]
pub fn subscribe(attr: TokenStream, item: TokenStream) -> TokenStream {
    let args = parse_macro_input!(attr as subscribe::SubscribeArgs);
    let input = parse_macro_input!(item as ItemFn);
    subscribe::expand(args, input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}
