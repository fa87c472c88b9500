use proc_macro2::TokenStream;
use quote::quote;
use syn::{Attribute, Data, DeriveInput, Fields, LitStr, Path, Type};

struct EventField {
    ident: syn::Ident,
    name: String,
}

pub(crate) fn expand(input: DeriveInput) -> syn::Result<TokenStream> {
    let krate = crate_path(&input.attrs)?;
    let ident = &input.ident;

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    ident,
                    "EventSource can only be derived for structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                ident,
                "EventSource can only be derived for structs",
            ));
        }
    };

    let mut events: Vec<EventField> = Vec::new();
    for field in fields {
        let Some(field_ident) = field.ident.clone() else {
            continue;
        };
        let (rename, skip) = field_options(&field.attrs)?;
        if skip {
            continue;
        }
        if !is_event(&field.ty) {
            if rename.is_some() {
                return Err(syn::Error::new_spanned(
                    &field.ty,
                    "#[event(rename)] is only allowed on `Event<_>` fields",
                ));
            }
            continue;
        }

        let name = rename.unwrap_or_else(|| field_ident.to_string());
        if events.iter().any(|event| event.name == name) {
            return Err(syn::Error::new_spanned(
                &field_ident,
                format!("duplicate event name `{name}`"),
            ));
        }
        events.push(EventField {
            ident: field_ident,
            name,
        });
    }

    let names: Vec<&str> = events.iter().map(|event| event.name.as_str()).collect();
    let arms = events.iter().map(|event| {
        let name = &event.name;
        let field = &event.ident;
        quote! { #name => ::core::option::Option::Some(&self.#field), }
    });

    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    Ok(quote! {
        impl #impl_generics #krate::EventSource for #ident #ty_generics #where_clause {
            fn event_names() -> &'static [&'static str] {
                &[#(#names),*]
            }

            fn event(&self, name: &str) -> ::core::option::Option<&dyn #krate::AnyEvent> {
                match name {
                    #(#arms)*
                    _ => ::core::option::Option::None,
                }
            }
        }
    })
}

fn crate_path(attrs: &[Attribute]) -> syn::Result<Path> {
    let mut path: Option<Path> = None;
    for attr in attrs {
        if !attr.path().is_ident("event_source") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("crate") {
                let value: LitStr = meta.value()?.parse()?;
                path = Some(value.parse()?);
                Ok(())
            } else {
                Err(meta.error("unsupported event_source attribute"))
            }
        })?;
    }
    Ok(path.unwrap_or_else(|| syn::parse_quote!(::weakcast)))
}

fn field_options(attrs: &[Attribute]) -> syn::Result<(Option<String>, bool)> {
    let mut rename = None;
    let mut skip = false;
    for attr in attrs {
        if !attr.path().is_ident("event") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("rename") {
                let value: LitStr = meta.value()?.parse()?;
                if value.value().is_empty() {
                    return Err(syn::Error::new_spanned(value, "event name cannot be empty"));
                }
                rename = Some(value.value());
                Ok(())
            } else if meta.path.is_ident("skip") {
                skip = true;
                Ok(())
            } else {
                Err(meta.error("unsupported event attribute"))
            }
        })?;
    }
    Ok((rename, skip))
}

fn is_event(ty: &Type) -> bool {
    match ty {
        Type::Path(path) => path
            .path
            .segments
            .last()
            .is_some_and(|segment| segment.ident == "Event"),
        _ => false,
    }
}
