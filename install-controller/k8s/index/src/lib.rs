//! Install Controller Resource Index
//!
//! The install controller may watch a single namespace, a set of namespaces, or the whole
//! cluster. Each watched scope is backed by its own cache, and readers should not need to know how
//! the caches are sharded. This crate multiplexes over those caches:
//!
//! - A [`UnionLister`] holds one [`Lister`] delegate per namespace, or a single delegate for all
//!   namespaces, and presents them as one view. Lists are deduplicated by object identity since
//!   delegates may overlap; gets and reverse lookups resolve via the most specific delegate.
//! - A [`Cache`] is the delegate fed by `kubert` watches.
//! - [`Requirements`] routes a requirement (by group and kind) to the `UnionLister` for its kind so
//!   that the reconciler can resolve arbitrary resource references.
//!
//! ```text
//! [ watch(ns-a) ] -> [ Cache ] --\
//! [ watch(ns-b) ] -> [ Cache ] ---+-> [ UnionLister<K> ] <- [ Requirements ] <- reconciler
//! [ watch(all)  ] -> [ Cache ] --/
//! ```

#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

mod cache;
mod lister;
mod requirements;
mod union;


pub use self::{
    cache::{Cache, SharedCache},
    lister::{Dependent, Lister, Owner},
    requirements::Requirements,
    union::{Namespaced, Scope, UnionLister},
};
