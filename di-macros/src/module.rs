//! Implementation of #[derive(Module)] proc-macro.

use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, Data, DeriveInput, Fields};

pub fn derive_module_impl(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let name = &input.ident;
    let generics = &input.generics;
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();

    let module_name = match parse_module_name(&input) {
        Ok(Some(custom)) => custom,
        Ok(None) => name.to_string(),
        Err(err) => return err.to_compile_error().into(),
    };

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            Fields::Unit => {
                // A unit struct is a valid, empty module.
                return quote! {
                    impl #impl_generics ::kernel_scope::kernel::Module for #name #ty_generics #where_clause {
                        fn name(&self) -> &str {
                            #module_name
                        }

                        fn load(
                            &self,
                            _binder: &mut ::kernel_scope::kernel::Binder,
                        ) -> ::core::result::Result<(), ::kernel_scope::KernelError> {
                            ::core::result::Result::Ok(())
                        }
                    }
                }
                .into();
            }
            Fields::Unnamed(_) => {
                return syn::Error::new_spanned(
                    &input,
                    "Module can only be derived for structs with named fields",
                )
                .to_compile_error()
                .into();
            }
        },
        _ => {
            return syn::Error::new_spanned(&input, "Module can only be derived for structs")
                .to_compile_error()
                .into();
        }
    };

    // One constant binding per field, in declaration order
    let binds = fields.iter().map(|field| {
        let field_name = field.ident.as_ref().expect("named field");
        let field_type = &field.ty;

        quote! {
            binder
                .bind::<#field_type>()
                .to_constant(::core::clone::Clone::clone(&self.#field_name));
        }
    });

    let expanded = quote! {
        impl #impl_generics ::kernel_scope::kernel::Module for #name #ty_generics #where_clause {
            fn name(&self) -> &str {
                #module_name
            }

            fn load(
                &self,
                binder: &mut ::kernel_scope::kernel::Binder,
            ) -> ::core::result::Result<(), ::kernel_scope::KernelError> {
                #(#binds)*
                ::core::result::Result::Ok(())
            }
        }
    };

    TokenStream::from(expanded)
}

/// Parse `#[module(name = "...")]`.
fn parse_module_name(input: &DeriveInput) -> syn::Result<Option<String>> {
    let mut module_name = None;

    for attr in &input.attrs {
        if attr.path().is_ident("module") {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("name") {
                    let value: syn::LitStr = meta.value()?.parse()?;
                    module_name = Some(value.value());
                    Ok(())
                } else {
                    Err(meta.error("expected `name = \"...\"`"))
                }
            })?;
        }
    }

    Ok(module_name)
}
