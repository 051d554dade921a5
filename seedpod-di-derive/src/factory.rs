use crate::attributes::{FieldAttributes, PodAttributes, POD};
use crate::pod::{definition_options, pod_name, InjectedParameter};
use proc_macro2::TokenStream;
use quote::quote;
use syn::spanned::Spanned;
use syn::{
    Error, FnArg, GenericArgument, ItemFn, Pat, PathArguments, Result, ReturnType, Type,
};

/// Splits `Result<T, E>` into `T`, for fallible factories.
fn fallible_type(ty: &Type) -> Option<&Type> {
    let Type::Path(path) = ty else {
        return None;
    };

    let segment = path.path.segments.last()?;
    if segment.ident != "Result" {
        return None;
    }

    let PathArguments::AngleBracketed(arguments) = &segment.arguments else {
        return None;
    };

    match arguments.args.first()? {
        GenericArgument::Type(ty) => Some(ty),
        _ => None,
    }
}

pub fn expand_pod_factory(mut item: ItemFn, attributes: &PodAttributes) -> Result<TokenStream> {
    if !item.sig.generics.params.is_empty() || item.sig.asyncness.is_some() {
        return Err(Error::new(
            item.sig.span(),
            "Pod factories must be non-generic synchronous functions!",
        ));
    }

    let ReturnType::Type(_, return_type) = &item.sig.output else {
        return Err(Error::new(
            item.sig.span(),
            "Pod factories must return the created pod!",
        ));
    };

    let (pod_type, is_fallible) = match fallible_type(return_type) {
        Some(ty) => (ty.clone(), true),
        None => (return_type.as_ref().clone(), false),
    };

    let mut descriptors = vec![];
    let mut values = vec![];

    for input in item.sig.inputs.iter_mut() {
        let FnArg::Typed(argument) = input else {
            return Err(Error::new(
                input.span(),
                "Pod factories must be free functions!",
            ));
        };

        let Pat::Ident(pattern) = argument.pat.as_ref() else {
            return Err(Error::new(
                argument.pat.span(),
                "Pod factory parameters must be plain identifiers!",
            ));
        };

        let field_attributes = FieldAttributes::from_attributes(&argument.attrs)?;
        argument.attrs.retain(|attribute| !attribute.path().is_ident(POD));

        if !field_attributes.is_injected() {
            return Err(Error::new(
                argument.span(),
                "Pod factory parameters are always injected!",
            ));
        }

        let parameter = InjectedParameter {
            name: pattern.ident.to_string(),
            ty: argument.ty.as_ref(),
            attributes: field_attributes,
        };

        values.push(parameter.value(descriptors.len()));
        descriptors.push(parameter.descriptor());
    }

    let ident = &item.sig.ident;
    let name = pod_name(attributes, ident);
    let options = definition_options(attributes);

    let creation = if is_fallible {
        quote! {
            #ident(#(#values),*).map_err(|error| {
                seedpod_di::PodCreationError::Constructor(std::sync::Arc::new(error))
            })?
        }
    } else {
        quote!(#ident(#(#values),*))
    };

    Ok(quote! {
        #item

        const _: () = {
            fn __seedpod_dependencies() -> Vec<seedpod_di::dependency::DependencyDescriptor> {
                vec![#(#descriptors),*]
            }

            #[allow(unused_variables)]
            fn __seedpod_construct(
                instance_provider: &mut dyn seedpod_di::instance_provider::PodInstanceProvider,
            ) -> Result<seedpod_di::pod::PodInstanceAnyPtr, seedpod_di::PodCreationError> {
                let dependencies = __seedpod_dependencies();
                let pod: #pod_type = #creation;
                Ok(seedpod_di::pod::PodInstancePtr::new(pod) as seedpod_di::pod::PodInstanceAnyPtr)
            }

            fn __seedpod_register() -> seedpod_di::pod_registry::internal::TypedPodDefinition {
                seedpod_di::pod_registry::internal::TypedPodDefinition {
                    source: seedpod_di::pod_registry::internal::source_type_id(&#ident),
                    definition: seedpod_di::pod_registry::PodDefinitionBuilder::new(
                        #name,
                        seedpod_di::pod::TypeKey::of::<#pod_type>(),
                        __seedpod_construct,
                        seedpod_di::pod::cast_concrete::<#pod_type>,
                    )
                    .with_dependencies(__seedpod_dependencies())
                    #options,
                }
            }

            seedpod_di::pod_registry::internal::submit! {
                seedpod_di::pod_registry::internal::PodDefinitionRegisterer {
                    register: __seedpod_register
                }
            };
        };
    })
}
