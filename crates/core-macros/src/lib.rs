//! Procedural macros for weakcast
//!
//! - `#[derive(EventSource)]` exposes a struct's `Event<_>` fields by name so
//!   they can be targeted by `subscribe_weak`.

use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

mod event_source;

/// Implement `EventSource` for a struct with named `Event<_>` fields
///
/// Every field whose type is `Event<..>` becomes an event named after the
/// field. Field attributes:
///
/// - `#[event(rename = "name")]` publishes the event under another name
/// - `#[event(skip)]` keeps the field out of the lookup
///
/// The generated code refers to `::weakcast`; use
/// `#[event_source(crate = "path")]` on the struct when the crate is reached
/// under another path.
///
/// ```rust,ignore
/// #[derive(Default, EventSource)]
/// struct Button {
///     clicked: Event<fn(u32)>,
///     #[event(rename = "hover")]
///     hovered: Event<fn(bool)>,
/// }
///
/// assert_eq!(Button::event_names(), &["clicked", "hover"]);
/// ```
#[proc_macro_derive(EventSource, attributes(event, event_source))]
pub fn derive_event_source(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    event_source::expand(input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}
