//! Macro definitions for kernel module functions.
use proc_macro::TokenStream;
use proc_macro2::Span;
use quote::{format_ident, quote};
use syn::{
    Ident, LitStr, Token,
    parse::{Parse, ParseStream},
    parse_macro_input,
};

/// Which hook an attribute is applied to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Hook {
    Init,
    Exit,
}

/// Checks that `func` can be called from the generated C entry point: no
/// arguments, no generics, not async, and a status return only for init.
fn check_hook(func: &syn::ItemFn, hook: Hook) -> syn::Result<()> {
    let sig = &func.sig;
    if let Some(asyncness) = &sig.asyncness {
        return Err(syn::Error::new_spanned(
            asyncness,
            "module hooks cannot be async",
        ));
    }
    if !sig.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &sig.generics,
            "module hooks cannot be generic",
        ));
    }
    if !sig.inputs.is_empty() {
        return Err(syn::Error::new_spanned(
            &sig.inputs,
            "module hooks take no arguments",
        ));
    }
    match (hook, &sig.output) {
        (Hook::Init, syn::ReturnType::Default) => Err(syn::Error::new_spanned(
            &sig.ident,
            "init function must return an i32 status",
        )),
        (Hook::Exit, syn::ReturnType::Type(..)) => Err(syn::Error::new_spanned(
            &sig.output,
            "exit function must not return a value",
        )),
        _ => Ok(()),
    }
}

/// Attribute macro to mark the initialization function of a kernel module. It
/// places the function in the `.text.init` section and generates the
/// `init_module` entry the loader calls. The function takes no arguments and
/// returns the load status.
/// # Example:
/// ```ignore
/// #[init_fn]
/// fn init() -> i32 { ... }
/// ```
#[proc_macro_attribute]
pub fn init_fn(_attr: TokenStream, item: TokenStream) -> TokenStream {
    let func = parse_macro_input!(item as syn::ItemFn);
    if let Err(err) = check_hook(&func, Hook::Init) {
        return err.to_compile_error().into();
    }
    let func_name = &func.sig.ident;
    quote! {
        unsafe extern "C" fn init_module() -> core::ffi::c_int {
            #func_name() as core::ffi::c_int
        }
        #[unsafe(link_section = ".text.init")]
        #func
    }
    .into()
}

/// Attribute macro to mark the cleanup function of a kernel module. It places
/// the function in the `.text.exit` section.
/// # Example:
/// ```ignore
/// #[exit_fn]
/// fn cleanup() { ... }
/// ```
#[proc_macro_attribute]
pub fn exit_fn(_attr: TokenStream, item: TokenStream) -> TokenStream {
    let func = parse_macro_input!(item as syn::ItemFn);
    if let Err(err) = check_hook(&func, Hook::Exit) {
        return err.to_compile_error().into();
    }
    let func_name = &func.sig.ident;
    quote! {
        unsafe extern "C" fn cleanup_module() {
            #func_name()
        }
        #[unsafe(link_section = ".text.exit")]
        #func
    }
    .into()
}

/// Keys accepted by `module!`, in the order they are emitted.
const REQUIRED_KEYS: [&str; 4] = ["name", "version", "license", "description"];
const OPTIONAL_KEYS: [&str; 1] = ["author"];

struct ModuleArgs {
    entries: Vec<(Ident, LitStr)>,
}

impl ModuleArgs {
    fn get(&self, key: &str) -> Option<&LitStr> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, value)| value)
    }
}

impl Parse for ModuleArgs {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let mut entries: Vec<(Ident, LitStr)> = Vec::new();
        while !input.is_empty() {
            let key: Ident = input.parse()?;
            input.parse::<Token![:]>()?;
            let value: LitStr = input.parse()?;

            let name = key.to_string();
            if !REQUIRED_KEYS.contains(&name.as_str()) && !OPTIONAL_KEYS.contains(&name.as_str()) {
                return Err(syn::Error::new(
                    key.span(),
                    format!("Unknown field: {}", key),
                ));
            }
            if entries.iter().any(|(k, _)| *k == name) {
                return Err(syn::Error::new(
                    key.span(),
                    format!("Duplicate field: {}", key),
                ));
            }
            entries.push((key, value));

            if !input.is_empty() {
                input.parse::<Token![,]>()?;
            }
        }

        for required in REQUIRED_KEYS {
            if !entries.iter().any(|(k, _)| k == required) {
                return Err(syn::Error::new(
                    Span::call_site(),
                    format!("{} is required", required),
                ));
            }
        }

        Ok(ModuleArgs { entries })
    }
}

/// Builds the `key=value\0` byte string stored in `.modinfo`.
fn modinfo_entry(key: &str, value: &LitStr) -> Vec<u8> {
    let mut entry = key.as_bytes().to_vec();
    entry.push(b'=');
    entry.extend_from_slice(value.value().as_bytes());
    entry.push(0);
    entry
}

/// Macro to declare module metadata in the `.modinfo` section.
///
/// `name`, `version`, `license` and `description` are required; `author` is
/// optional. Each entry becomes a `MODULE_<KEY>` static.
///
/// # Example:
/// ```ignore
/// module! {
///     name: "hello",
///     version: "1.0.0",
///     license: "GPL",
///     author: "Someone <someone@example.org>",
///     description: "A simple hello world kernel module",
/// }
/// ```
///
/// Parameters can be in any order.
#[proc_macro]
pub fn module(item: TokenStream) -> TokenStream {
    let args = parse_macro_input!(item as ModuleArgs);

    let statics = REQUIRED_KEYS
        .iter()
        .chain(OPTIONAL_KEYS.iter())
        .filter_map(|key| args.get(key).map(|value| (*key, value)))
        .map(|(key, value)| {
            let bytes = modinfo_entry(key, value);
            let len = bytes.len();
            let ident = format_ident!("MODULE_{}", key.to_uppercase());
            quote! {
                #[used]
                #[unsafe(link_section = ".modinfo")]
                static #ident: [u8; #len] = [#(#bytes),*];
            }
        });

    quote! {
        #(#statics)*

        #[used]
        #[unsafe(link_section = ".gnu.linkonce.this_module")]
        static __this_module: kmod::Module = kmod::Module::new(Some(init_module), Some(cleanup_module));

        #[cfg(target_os = "none")]
        #[panic_handler]
        fn panic(_info: &core::panic::PanicInfo) -> ! {
            loop {}
        }
    }
    .into()
}
