use crate::attributes::{DefaultDefinition, FieldAttributes, PodAttributes};
use convert_case::{Case, Casing};
use itertools::Itertools;
use proc_macro2::{Ident, Span, TokenStream};
use quote::{quote, ToTokens};
use syn::spanned::Spanned;
use syn::{Data, DataStruct, DeriveInput, Error, Fields, LitStr, Result, Type};

/// A constructor parameter resolved by the container.
pub struct InjectedParameter<'a> {
    pub name: String,
    pub ty: &'a Type,
    pub attributes: FieldAttributes,
}

impl InjectedParameter<'_> {
    /// Expression creating the dependency descriptor for this parameter.
    pub fn descriptor(&self) -> TokenStream {
        let ty = self.ty;
        let parameter = &self.name;
        let name = self
            .attributes
            .name
            .as_ref()
            .map(|name| quote!(.with_name(#name)));
        let qualifiers = self.attributes.qualifiers.iter().map(|qualifier| {
            quote!(.with_qualifier(seedpod_di::dependency::Qualifier::new(#qualifier)))
        });
        let fallback = self
            .attributes
            .fallback
            .as_ref()
            .map(|_| quote!(.with_default()));

        quote! {
            <#ty as seedpod_di::instance_provider::Injected>::describe(#parameter)
                #name
                #(#qualifiers)*
                #fallback
        }
    }

    /// Expression resolving the value for this parameter, given its index in the dependency list.
    pub fn value(&self, index: usize) -> TokenStream {
        let ty = self.ty;
        match &self.attributes.fallback {
            Some(fallback) => quote! {
                <Option<#ty> as seedpod_di::instance_provider::Injected>::inject(
                    instance_provider,
                    &dependencies[#index],
                )?
                .unwrap_or_else(#fallback)
            },
            None => quote! {
                <#ty as seedpod_di::instance_provider::Injected>::inject(
                    instance_provider,
                    &dependencies[#index],
                )?
            },
        }
    }
}

/// Builder calls applying scope, flags and order to a definition.
pub fn definition_options(attributes: &PodAttributes) -> TokenStream {
    let scope = match attributes.scope.as_ref().map(LitStr::value).as_deref() {
        Some("PROTOTYPE") => quote!(Prototype),
        Some("CONTEXT") => quote!(Context),
        _ => quote!(Singleton),
    };
    let is_primary = attributes.is_primary;
    let is_lazy = attributes.is_lazy;
    let order = attributes
        .order
        .as_ref()
        .map(ToTokens::to_token_stream)
        .unwrap_or_else(|| quote!(0));

    quote! {
        .with_scope(seedpod_di::pod::PodScope::#scope)
        .with_primary(#is_primary)
        .with_lazy(#is_lazy)
        .with_order(#order)
    }
}

/// Explicit name or the snake_case version of given identifier.
pub fn pod_name(attributes: &PodAttributes, ident: &Ident) -> LitStr {
    attributes.name.clone().unwrap_or_else(|| {
        LitStr::new(
            &ident.to_string().to_case(Case::Snake),
            Span::call_site(),
        )
    })
}

struct Construction {
    descriptors: Vec<TokenStream>,
    body: TokenStream,
}

fn generate_construction(fields: &Fields, attributes: &PodAttributes) -> Result<Construction> {
    let mut descriptors = vec![];
    let mut values = vec![];

    for (index, field) in fields.iter().enumerate() {
        let field_attributes = FieldAttributes::from_attributes(&field.attrs)?;

        if field_attributes.ignore {
            if attributes.constructor.is_none() {
                return Err(Error::new(
                    field.span(),
                    "Ignored fields are only supported with a custom constructor!",
                ));
            }

            continue;
        }

        let value = match &field_attributes.default {
            Some(DefaultDefinition::Expr(path)) => quote!(#path()),
            Some(DefaultDefinition::Default) => {
                let ty = &field.ty;
                quote!(<#ty as std::default::Default>::default())
            }
            None => {
                let parameter = InjectedParameter {
                    name: field
                        .ident
                        .as_ref()
                        .map(Ident::to_string)
                        .unwrap_or_else(|| index.to_string()),
                    ty: &field.ty,
                    attributes: field_attributes,
                };

                let value = parameter.value(descriptors.len());
                descriptors.push(parameter.descriptor());
                value
            }
        };

        values.push((field.ident.as_ref(), value));
    }

    let body = if let Some(constructor) = &attributes.constructor {
        let arguments = values.iter().map(|(_, value)| value);
        quote! {
            #constructor(#(#arguments),*).map_err(seedpod_di::PodCreationError::Constructor)
        }
    } else {
        match fields {
            Fields::Named(_) => {
                let values = values
                    .iter()
                    .map(|(ident, value)| quote!(#ident: #value))
                    .collect_vec();
                quote!(Ok(Self { #(#values),* }))
            }
            Fields::Unnamed(_) => {
                let values = values.iter().map(|(_, value)| value);
                quote!(Ok(Self(#(#values),*)))
            }
            Fields::Unit => quote!(Ok(Self)),
        }
    };

    Ok(Construction { descriptors, body })
}

pub fn expand_pod(input: &DeriveInput) -> Result<TokenStream> {
    let Data::Struct(DataStruct { fields, .. }) = &input.data else {
        return Err(Error::new(input.span(), "Can only derive Pod on structs!"));
    };

    if !input.generics.params.is_empty() {
        return Err(Error::new(
            input.generics.span(),
            "Pods cannot have generic parameters!",
        ));
    }

    let ident = &input.ident;
    let attributes = PodAttributes::from_attributes(&input.attrs)?;
    let Construction { descriptors, body } = generate_construction(fields, &attributes)?;
    let name = pod_name(&attributes, ident);
    let options = definition_options(&attributes);

    Ok(quote! {
        #[automatically_derived]
        impl seedpod_di::pod::Injectable for #ident {}

        #[automatically_derived]
        impl seedpod_di::pod::PodDowncast<#ident> for #ident {
            fn downcast(
                source: seedpod_di::pod::PodInstanceAnyPtr,
            ) -> Result<seedpod_di::pod::PodInstancePtr<Self>, seedpod_di::pod::PodInstanceAnyPtr> {
                source.downcast()
            }
        }

        #[automatically_derived]
        impl seedpod_di::pod::Pod for #ident {
            fn dependencies() -> Vec<seedpod_di::dependency::DependencyDescriptor> {
                vec![#(#descriptors),*]
            }

            #[allow(unused_variables)]
            fn create(
                instance_provider: &mut dyn seedpod_di::instance_provider::PodInstanceProvider,
            ) -> Result<Self, seedpod_di::PodCreationError> {
                let dependencies = <Self as seedpod_di::pod::Pod>::dependencies();
                #body
            }
        }

        const _: () = {
            fn register() -> seedpod_di::pod_registry::internal::TypedPodDefinition {
                seedpod_di::pod_registry::internal::TypedPodDefinition {
                    source: std::any::TypeId::of::<#ident>(),
                    definition: seedpod_di::pod_registry::PodDefinitionBuilder::for_pod::<#ident, _>(#name)
                        #options,
                }
            }

            seedpod_di::pod_registry::internal::submit! {
                seedpod_di::pod_registry::internal::PodDefinitionRegisterer {
                    register
                }
            };
        };
    })
}
