use proc_macro2::TokenStream;
use quote::quote;
use std::ops::Deref;
use syn::spanned::Spanned;
use syn::{parse_quote, Error, GenericParam, Generics, Item, ItemImpl, Result, Type};

/// Injectable types need to be `'static`, so all type parameters get such bound.
fn static_generics(generics: &Generics) -> Result<Generics> {
    let mut generics = generics.clone();
    for param in generics.params.iter_mut() {
        match param {
            GenericParam::Type(param) => param.bounds.push(parse_quote!('static)),
            GenericParam::Lifetime(param) => {
                return Err(Error::new(
                    param.span(),
                    "Injectable types cannot have lifetime parameters!",
                ))
            }
            GenericParam::Const(_) => {}
        }
    }

    Ok(generics)
}

pub fn make_injectable(item: &Item) -> Result<TokenStream> {
    match item {
        Item::Trait(item_trait) => {
            let ident = &item_trait.ident;
            let generics = static_generics(&item_trait.generics)?;
            let (impl_generics, type_generics, where_clause) = generics.split_for_impl();

            Ok(quote! {
                #item

                #[automatically_derived]
                impl #impl_generics seedpod_di::pod::Injectable for dyn #ident #type_generics + Send + Sync #where_clause {}
            })
        }
        Item::Struct(item_struct) => {
            let ident = &item_struct.ident;
            let generics = static_generics(&item_struct.generics)?;
            let (impl_generics, type_generics, where_clause) = generics.split_for_impl();

            Ok(quote! {
                #item

                #[automatically_derived]
                impl #impl_generics seedpod_di::pod::Injectable for #ident #type_generics #where_clause {}
            })
        }
        Item::Enum(item_enum) => {
            let ident = &item_enum.ident;
            let generics = static_generics(&item_enum.generics)?;
            let (impl_generics, type_generics, where_clause) = generics.split_for_impl();

            Ok(quote! {
                #item

                #[automatically_derived]
                impl #impl_generics seedpod_di::pod::Injectable for #ident #type_generics #where_clause {}
            })
        }
        _ => Err(Error::new(
            item.span(),
            "Only traits, structs and enums can be injectable!",
        )),
    }
}

pub fn register_pod_alias(item_impl: &ItemImpl) -> Result<TokenStream> {
    if !item_impl.generics.params.is_empty() {
        return Err(Error::new(
            item_impl.generics.span(),
            "Generic implementations cannot be registered as pod aliases!",
        ));
    }

    let trait_type = item_impl
        .trait_
        .as_ref()
        .map(|(_, path, ..)| path)
        .ok_or_else(|| Error::new(item_impl.span(), "Missing trait identifier!"))?;

    let target_type = if let Type::Path(path) = item_impl.self_ty.deref() {
        &path.path
    } else {
        return Err(Error::new(
            item_impl.self_ty.span(),
            "Registering traits is only available for named types!",
        ));
    };

    Ok(quote! {
        #item_impl

        #[automatically_derived]
        impl seedpod_di::pod::PodDowncast<#target_type> for dyn #trait_type + Send + Sync {
            fn downcast(
                source: seedpod_di::pod::PodInstanceAnyPtr,
            ) -> Result<seedpod_di::pod::PodInstancePtr<Self>, seedpod_di::pod::PodInstanceAnyPtr> {
                source
                    .downcast::<#target_type>()
                    .map(|pod| pod as seedpod_di::pod::PodInstancePtr<Self>)
            }
        }

        const _: () = {
            fn register() -> seedpod_di::pod_registry::internal::PodAliasDefinition {
                seedpod_di::pod_registry::internal::PodAliasDefinition {
                    alias_type: seedpod_di::pod::TypeKey::of::<dyn #trait_type + Send + Sync>(),
                    target_type: std::any::TypeId::of::<#target_type>(),
                    cast: seedpod_di::pod::cast::<dyn #trait_type + Send + Sync, #target_type>,
                }
            }

            seedpod_di::pod_registry::internal::submit! {
                seedpod_di::pod_registry::internal::PodAliasRegisterer {
                    register
                }
            };
        };
    })
}
