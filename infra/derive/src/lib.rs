#![allow(unreachable_pub)]
#![allow(clippy::needless_pass_by_value)]

//! # Macros
//!
//! Procedural macros shared by the `DeployHub` workspace: domain error enums and
//! the runtime bootstrap attribute for binaries.
//!
//! Examples are `ignore`d because a proc-macro crate cannot use its own macros
//! in doctests; see `tests/ui` for compiled usage.

mod macros;

use proc_macro::TokenStream;
use syn::{DeriveInput, ItemFn, parse_macro_input};

/// Attribute macro to bootstrap the workspace Tokio runtime.
///
/// Turns an `async fn main` returning a `Result` into a synchronous `fn main`
/// that builds the runtime from a [`RuntimeConfig`] profile and blocks on the body.
///
/// # Profiles
///
/// * `server` - Long-lived deployment server (larger stacks, longer keep-alive).
/// * `default` - Worker threads auto-detected.
///
/// # Examples
///
/// ```rust,ignore
/// #[dhub_runtime::main(server)]
/// async fn main() -> anyhow::Result<()> {
///     Ok(())
/// }
/// ```
///
/// [`RuntimeConfig`]: https://docs.rs/dhub-runtime
#[proc_macro_attribute]
pub fn main(args: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as ItemFn);
    macros::runtime::expand_main(args.into(), input).into()
}

/// Attribute macro for domain error enums.
///
/// # Generated items
///
/// * `#[derive(Debug, thiserror::Error)]` unless already present.
/// * `<Name>Ext` trait adding `.context(..)` to `Result<T, Name>` and to
///   `Result<T, Source>` for every variant that wraps a `source`.
/// * `From<Source>` for those variants so `?` converts upstream errors.
/// * `From<&'static str>` and `From<String>` when an `Internal` variant exists.
/// * A module-local `format_context` helper for `#[error(..)]` strings.
///
/// # Requirements
///
/// Variants must use named fields. A variant with a `source` (or a field tagged
/// `#[source]`/`#[from]`) must also carry `context: Option<Cow<'static, str>>`.
///
/// # Example
///
/// ```rust,ignore
/// use dhub_derive::dhub_error;
/// use std::borrow::Cow;
///
/// #[dhub_error]
/// pub enum MountError {
///     #[error("IO error{}: {source}", format_context(.context))]
///     Io { source: std::io::Error, context: Option<Cow<'static, str>> },
///
///     #[error("Internal fault{}: {message}", format_context(.context))]
///     Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
/// }
///
/// fn read_manifest(path: &std::path::Path) -> Result<String, MountError> {
///     std::fs::read_to_string(path).context("reading MANIFEST.MF")
/// }
/// ```
#[proc_macro_attribute]
pub fn dhub_error(_args: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as DeriveInput);
    macros::error::expand_derive(input).into()
}
