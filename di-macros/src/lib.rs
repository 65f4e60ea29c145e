//! Derive macros for kernel-scope dependency injection.
//!
//! This crate provides derive macros for DI:
//! - `#[derive(Module)]` to bind every field of a struct as a constant
//! - `#[derive(Construct)]` to build a type by resolving each field (constructor injection)
//! - `#[derive(Inject)]` to fill `#[inject]` fields of an existing value (member injection)
//!
//! Generated code references items through `::kernel_scope`, so the consuming
//! crate must depend on `kernel-scope` (the library itself declares
//! `extern crate self as kernel_scope`).

use proc_macro::TokenStream;

mod construct;
mod inject;
mod module;

/// Derive macro turning a struct into a kernel module.
///
/// Each field's value is bound as a constant for the field's type. The
/// module name defaults to the struct name and can be overridden with
/// `#[module(name = "...")]`.
///
/// # Requirements
///
/// - All fields must implement `Clone + Send + Sync + 'static`
/// - Field types must be distinct (a later field rebinds an earlier one)
///
/// # Example
///
/// ```ignore
/// use kernel_scope::Module;
///
/// #[derive(Module)]
/// #[module(name = "settings")]
/// pub struct SettingsModule {
///     pub greeting: Greeting,
///     pub limits: Limits,
/// }
///
/// // Generated implementation:
/// // impl kernel_scope::kernel::Module for SettingsModule {
/// //     fn name(&self) -> &str { "settings" }
/// //     fn load(&self, binder: &mut Binder) -> Result<(), KernelError> {
/// //         binder.bind::<Greeting>().to_constant(self.greeting.clone());
/// //         binder.bind::<Limits>().to_constant(self.limits.clone());
/// //         Ok(())
/// //     }
/// // }
/// ```
#[proc_macro_derive(Module, attributes(module))]
pub fn derive_module(input: TokenStream) -> TokenStream {
    module::derive_module_impl(input)
}

/// Derive macro for types the kernel can build with `to_self()`.
///
/// Generates a `Construct` implementation that resolves each field through
/// `FromKernel`. Fields marked `#[construct(default)]` are filled with
/// `Default::default()` instead.
///
/// # Example
///
/// ```ignore
/// use kernel_scope::Construct;
///
/// #[derive(Construct)]
/// pub struct OrdersController {
///     repo: Arc<OrderRepository>,      // required
///     audit: Option<Arc<AuditLog>>,    // optional, None when unbound
///     #[construct(default)]
///     hits: AtomicUsize,
/// }
/// ```
#[proc_macro_derive(Construct, attributes(construct))]
pub fn derive_construct(input: TokenStream) -> TokenStream {
    construct::derive_construct_impl(input)
}

/// Derive macro for member injection into an already-built value.
///
/// Generates an `Injectable` implementation that fills every `#[inject]`
/// field through `FromKernel`. The field's visibility is forwarded to the
/// injector, which skips non-`pub` fields unless the kernel allows
/// non-public injection. `#[inject(base)]` marks an embedded value that is
/// itself `Injectable`; it is injected as a base, where private members are
/// governed by `inject_parent_private`.
///
/// # Example
///
/// ```ignore
/// use kernel_scope::Inject;
///
/// #[derive(Default, Inject)]
/// pub struct StatusController {
///     #[inject]
///     pub clock: Option<Arc<Clock>>,
///     #[inject]
///     store: Option<Arc<Store>>,     // needs inject_non_public
///     #[inject(base)]
///     base: ControllerBase,
/// }
/// ```
#[proc_macro_derive(Inject, attributes(inject))]
pub fn derive_inject(input: TokenStream) -> TokenStream {
    inject::derive_inject_impl(input)
}
