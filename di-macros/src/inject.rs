//! Implementation of #[derive(Inject)] proc-macro.

use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, Data, DeriveInput, Field, Fields};

/// How a field takes part in member injection.
enum FieldRole {
    Skip,
    Member,
    Base,
}

pub fn derive_inject_impl(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let name = &input.ident;
    let generics = &input.generics;
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return syn::Error::new_spanned(
                    &input,
                    "Inject can only be derived for structs with named fields",
                )
                .to_compile_error()
                .into();
            }
        },
        _ => {
            return syn::Error::new_spanned(&input, "Inject can only be derived for structs")
                .to_compile_error()
                .into();
        }
    };

    let mut steps = Vec::new();
    for field in fields {
        let field_name = field.ident.as_ref().expect("named field");
        let field_label = field_name.to_string();
        let field_type = &field.ty;

        let visibility = match field.vis {
            syn::Visibility::Public(_) => quote! { ::kernel_scope::Visibility::Public },
            _ => quote! { ::kernel_scope::Visibility::NonPublic },
        };

        match field_role(field) {
            Ok(FieldRole::Skip) => {}
            Ok(FieldRole::Member) => steps.push(quote! {
                if let ::core::option::Option::Some(value) =
                    injector.resolve::<#field_type>(#field_label, #visibility)?
                {
                    self.#field_name = value;
                }
            }),
            Ok(FieldRole::Base) => steps.push(quote! {
                ::kernel_scope::Injectable::inject_members(
                    &mut self.#field_name,
                    &injector.for_base(),
                )?;
            }),
            Err(err) => return err.to_compile_error().into(),
        }
    }

    let expanded = quote! {
        impl #impl_generics ::kernel_scope::Injectable for #name #ty_generics #where_clause {
            fn inject_members(
                &mut self,
                injector: &::kernel_scope::Injector<'_>,
            ) -> ::core::result::Result<(), ::kernel_scope::KernelError> {
                #(#steps)*
                ::core::result::Result::Ok(())
            }
        }
    };

    TokenStream::from(expanded)
}

/// Parse `#[inject]` / `#[inject(base)]` on a field.
fn field_role(field: &Field) -> syn::Result<FieldRole> {
    let mut role = FieldRole::Skip;

    for attr in &field.attrs {
        if !attr.path().is_ident("inject") {
            continue;
        }

        role = FieldRole::Member;
        if matches!(attr.meta, syn::Meta::List(_)) {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("base") {
                    role = FieldRole::Base;
                    Ok(())
                } else {
                    Err(meta.error("expected `base`"))
                }
            })?;
        }
    }

    Ok(role)
}
