//! Implementation of #[derive(Construct)] proc-macro.

use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, Data, DeriveInput, Field, Fields};

pub fn derive_construct_impl(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let name = &input.ident;
    let generics = &input.generics;
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => fields.named.iter().collect::<Vec<_>>(),
            Fields::Unit => Vec::new(),
            Fields::Unnamed(_) => {
                return syn::Error::new_spanned(
                    &input,
                    "Construct can only be derived for structs with named fields",
                )
                .to_compile_error()
                .into();
            }
        },
        _ => {
            return syn::Error::new_spanned(&input, "Construct can only be derived for structs")
                .to_compile_error()
                .into();
        }
    };

    // Generate field initializers
    let mut field_inits = Vec::with_capacity(fields.len());
    for field in fields {
        let field_name = field.ident.as_ref().expect("named field");
        let field_type = &field.ty;

        let init = match is_default_field(field) {
            Ok(true) => quote! {
                #field_name: ::core::default::Default::default()
            },
            Ok(false) => quote! {
                #field_name: <#field_type as ::kernel_scope::FromKernel>::from_kernel(kernel)?
            },
            Err(err) => return err.to_compile_error().into(),
        };
        field_inits.push(init);
    }

    let body = if matches!(&input.data, Data::Struct(data) if matches!(data.fields, Fields::Unit)) {
        quote! { Self }
    } else {
        quote! { Self { #(#field_inits),* } }
    };

    let expanded = quote! {
        impl #impl_generics ::kernel_scope::Construct for #name #ty_generics #where_clause {
            fn construct(
                kernel: &::kernel_scope::kernel::Kernel,
            ) -> ::core::result::Result<Self, ::kernel_scope::KernelError> {
                let _ = kernel;
                ::core::result::Result::Ok(#body)
            }
        }
    };

    TokenStream::from(expanded)
}

/// Whether the field carries `#[construct(default)]`.
fn is_default_field(field: &Field) -> syn::Result<bool> {
    let mut default = false;

    for attr in &field.attrs {
        if attr.path().is_ident("construct") {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("default") {
                    default = true;
                    Ok(())
                } else {
                    Err(meta.error("expected `default`"))
                }
            })?;
        }
    }

    Ok(default)
}
