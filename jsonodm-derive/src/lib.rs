//! # jsonodm Derive Macros
//!
//! This crate provides the procedural macros for `jsonodm`. It implements `DocumentType`
//! and generates the field accessors of the lazy handle.
//!
//! Compatible with `syn 2.0`.

use proc_macro::TokenStream;
use quote::{format_ident, quote};
use syn::ext::IdentExt;
use syn::punctuated::Punctuated;
use syn::{Attribute, Data, DeriveInput, Expr, Fields, Lit, LitStr, Meta, Token, parse_macro_input};

/// Derives `jsonodm::DocumentType` and, for structs with named fields, a `<Name>Fields`
/// accessor trait implemented for `jsonodm::LazyObject`.
///
/// Container attribute:
/// * `#[document(name = "app::User")]` overrides the type identity. The default is
///   `module_path!()::Name`.
///
/// Field attributes:
/// * `#[document(skip)]` generates no accessor for the field.
/// * `#[document(embed)]` marks a field holding documents (`Address`, `Option<Address>`,
///   `Vec<Address>`, ...). Each one is written in its own `#type` envelope. The field type
///   must implement `jsonodm::Embedded`, which this derive does for every document type.
///   A field-level `#[serde(rename = "...")]` is honored.
///
/// Every accessor materializes the handle first. Accessors whose names clash with inherent
/// methods of `LazyObject` (`raw`, `alias`, `get`, ...) must be called through the trait,
/// e.g. `UserFields::raw(&lazy)`.
#[proc_macro_derive(Document, attributes(document))]
pub fn derive_document(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let name = &input.ident;

    if !input.generics.params.is_empty() {
        return syn::Error::new_spanned(
            &input.generics,
            "Document cannot be derived for generic types; a type identity must be a single name",
        )
        .to_compile_error()
        .into();
    }

    let type_name = match parse_container_attributes(&input.attrs) {
        Ok(Some(explicit)) => quote! { #explicit },
        Ok(None) => quote! { concat!(module_path!(), "::", stringify!(#name)) },
        Err(e) => return e.to_compile_error().into(),
    };

    let mut embedded = Vec::new();
    let accessors = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(named) => {
                let mut fields = Vec::new();
                for field in &named.named {
                    let options = match parse_field_attributes(&field.attrs) {
                        Ok(options) => options,
                        Err(e) => return e.to_compile_error().into(),
                    };
                    let Some(ident) = &field.ident else { continue };
                    if options.embed {
                        let key = match serde_rename(&field.attrs) {
                            Ok(Some(renamed)) => renamed.value(),
                            Ok(None) => ident.unraw().to_string(),
                            Err(e) => return e.to_compile_error().into(),
                        };
                        embedded.push(EmbeddedField {
                            key,
                            ty: field.ty.clone(),
                        });
                    }
                    if !options.skip {
                        fields.push(AccessorField {
                            ident: ident.clone(),
                            ty: field.ty.clone(),
                        });
                    }
                }
                generate_accessors(name, &input.vis, &fields)
            }
            Fields::Unnamed(_) | Fields::Unit => quote! {},
        },
        Data::Enum(_) => quote! {},
        Data::Union(_) => {
            return syn::Error::new(name.span(), "Document does not support unions")
                .to_compile_error()
                .into();
        }
    };

    let embed_hooks = generate_embed_hooks(&embedded);

    let expanded = quote! {
        impl jsonodm::DocumentType for #name {
            const TYPE_NAME: &'static str = #type_name;

            #embed_hooks
        }

        impl jsonodm::Embedded for #name {
            fn tag(
                value: &mut jsonodm::internal::serde_json::Value,
                codec: &jsonodm::TaggedCodec,
            ) -> jsonodm::Result<()> {
                codec.wrap_nested::<Self>(value)
            }

            fn untag(
                value: &mut jsonodm::internal::serde_json::Value,
                codec: &jsonodm::TaggedCodec,
                path: &str,
            ) -> jsonodm::Result<()> {
                codec.unwrap_nested::<Self>(value, path)
            }
        }

        #accessors
    };

    TokenStream::from(expanded)
}

struct AccessorField {
    ident: syn::Ident,
    ty: syn::Type,
}

struct EmbeddedField {
    /// Key of the field in the normalized mapping.
    key: String,
    ty: syn::Type,
}

#[derive(Default)]
struct FieldOptions {
    skip: bool,
    embed: bool,
}

/// Parses `#[document(name = "...")]` on the type.
fn parse_container_attributes(attrs: &[Attribute]) -> syn::Result<Option<LitStr>> {
    let mut type_name = None;

    for attr in attrs {
        if attr.path().is_ident("document") {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("name") {
                    let value: LitStr = meta.value()?.parse()?;
                    if value.value().is_empty() {
                        return Err(meta.error("type name must not be empty"));
                    }
                    type_name = Some(value);
                    return Ok(());
                }
                Err(meta.error("Unknown document attribute key. Supported: name"))
            })?;
        }
    }
    Ok(type_name)
}

/// Parses `#[document(skip, embed)]` on a field.
fn parse_field_attributes(attrs: &[Attribute]) -> syn::Result<FieldOptions> {
    let mut options = FieldOptions::default();

    for attr in attrs {
        if attr.path().is_ident("document") {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("skip") {
                    options.skip = true;
                    return Ok(());
                }
                if meta.path.is_ident("embed") {
                    options.embed = true;
                    return Ok(());
                }
                Err(meta.error("Unknown document field attribute key. Supported: skip, embed"))
            })?;
        }
    }
    Ok(options)
}

/// Reads `#[serde(rename = "...")]` on a field. Other serde keys are ignored.
fn serde_rename(attrs: &[Attribute]) -> syn::Result<Option<LitStr>> {
    let mut renamed = None;

    for attr in attrs {
        if !attr.path().is_ident("serde") {
            continue;
        }
        let metas = attr.parse_args_with(Punctuated::<Meta, Token![,]>::parse_terminated)?;
        for meta in metas {
            let Meta::NameValue(pair) = meta else { continue };
            if !pair.path.is_ident("rename") {
                continue;
            }
            if let Expr::Lit(expr) = &pair.value {
                if let Lit::Str(value) = &expr.lit {
                    renamed = Some(value.clone());
                }
            }
        }
    }
    Ok(renamed)
}

fn generate_embed_hooks(fields: &[EmbeddedField]) -> proc_macro2::TokenStream {
    if fields.is_empty() {
        return quote! {};
    }

    let tags = fields.iter().map(|f| {
        let key = &f.key;
        let ty = &f.ty;
        quote! {
            if let Some(value) = fields.get_mut(#key) {
                <#ty as jsonodm::Embedded>::tag(value, codec)?;
            }
        }
    });

    let untags = fields.iter().map(|f| {
        let key = &f.key;
        let ty = &f.ty;
        quote! {
            if let Some(value) = fields.get_mut(#key) {
                <#ty as jsonodm::Embedded>::untag(value, codec, &format!("{}.{}", path, #key))?;
            }
        }
    });

    quote! {
        fn tag_embedded(
            fields: &mut jsonodm::Fields,
            codec: &jsonodm::TaggedCodec,
        ) -> jsonodm::Result<()> {
            #(#tags)*
            Ok(())
        }

        fn untag_embedded(
            fields: &mut jsonodm::Fields,
            codec: &jsonodm::TaggedCodec,
            path: &str,
        ) -> jsonodm::Result<()> {
            #(#untags)*
            Ok(())
        }
    }
}

fn generate_accessors(
    name: &syn::Ident,
    vis: &syn::Visibility,
    fields: &[AccessorField],
) -> proc_macro2::TokenStream {
    let trait_name = format_ident!("{}Fields", name);
    let trait_doc = format!(
        "Field accessors for a `jsonodm::LazyObject` holding a [`{name}`]. Each one materializes the handle first."
    );

    let signatures = fields.iter().map(|f| {
        let getter = &f.ident;
        let setter = format_ident!("{}_mut", getter.unraw());
        let ty = &f.ty;
        let doc = format!("Materializes the handle and borrows `{}`.", getter.unraw());
        let doc_mut = format!("Materializes the handle and mutably borrows `{}`.", getter.unraw());
        quote! {
            #[doc = #doc]
            fn #getter(&self) -> jsonodm::Result<&#ty>;
            #[doc = #doc_mut]
            fn #setter(&mut self) -> jsonodm::Result<&mut #ty>;
        }
    });

    let bodies = fields.iter().map(|f| {
        let getter = &f.ident;
        let setter = format_ident!("{}_mut", getter.unraw());
        let ty = &f.ty;
        quote! {
            fn #getter(&self) -> jsonodm::Result<&#ty> {
                self.get::<#name>().map(|value| &value.#getter)
            }

            fn #setter(&mut self) -> jsonodm::Result<&mut #ty> {
                self.get_mut::<#name>().map(|value| &mut value.#getter)
            }
        }
    });

    quote! {
        #[doc = #trait_doc]
        #vis trait #trait_name {
            #(#signatures)*
        }

        impl #trait_name for jsonodm::LazyObject {
            #(#bodies)*
        }
    }
}
