use crate::attributes::PodAttributes;
use crate::factory::expand_pod_factory;
use crate::injectable::{make_injectable, register_pod_alias};
use crate::pod::expand_pod;
use proc_macro::TokenStream;
use syn::{parse_macro_input, DeriveInput, Error, Item, ItemFn, ItemImpl};

mod attributes;
mod factory;
mod injectable;
mod pod;

/// Declares a struct as a pod. See `seedpod_di::pod` for supported attributes.
#[proc_macro_derive(Pod, attributes(pod))]
pub fn generate_pod(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand_pod(&input)
        .unwrap_or_else(Error::into_compile_error)
        .into()
}

/// Declares a function as a pod factory. The returned type becomes the declared type of the pod
/// and function parameters are injected like struct fields.
#[proc_macro_attribute]
pub fn pod_factory(args: TokenStream, input: TokenStream) -> TokenStream {
    let mut attributes = PodAttributes::default();
    let parser = syn::meta::parser(|meta| attributes.parse(meta));
    parse_macro_input!(args with parser);

    let item = parse_macro_input!(input as ItemFn);
    expand_pod_factory(item, &attributes)
        .unwrap_or_else(Error::into_compile_error)
        .into()
}

/// Makes a trait object (`dyn Trait + Send + Sync`) or a plain type requestable from the container.
#[proc_macro_attribute]
pub fn injectable(_args: TokenStream, input: TokenStream) -> TokenStream {
    let item = parse_macro_input!(input as Item);
    make_injectable(&item)
        .unwrap_or_else(Error::into_compile_error)
        .into()
}

/// Registers a trait implementation as an additional type the implementing pod can be requested
/// as.
#[proc_macro_attribute]
pub fn pod_alias(_args: TokenStream, input: TokenStream) -> TokenStream {
    let item = parse_macro_input!(input as ItemImpl);
    register_pod_alias(&item)
        .unwrap_or_else(Error::into_compile_error)
        .into()
}
