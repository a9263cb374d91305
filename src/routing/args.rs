//! Handler arguments accepted by the routing DSL.
//!
//! A handler is given either by module name, resolved against the bound node,
//! or inline as a module value.

use crate::modules::{Endpoint, ErrorResponder, Filter, Module};

/// One handler argument.
pub enum Arg<S> {
    /// Module name, resolved through `Node::require`.
    Named(String),
    /// Inline value, passed through unchanged.
    Module(Module<S>),
}

impl<S> From<&str> for Arg<S> {
    fn from(name: &str) -> Self {
        Arg::Named(name.to_owned())
    }
}

impl<S> From<String> for Arg<S> {
    fn from(name: String) -> Self {
        Arg::Named(name)
    }
}

impl<S> From<Module<S>> for Arg<S> {
    fn from(module: Module<S>) -> Self {
        Arg::Module(module)
    }
}

impl<S> From<Endpoint<S>> for Arg<S> {
    fn from(endpoint: Endpoint<S>) -> Self {
        Arg::Module(Module::Endpoint(endpoint))
    }
}

impl<S> From<Filter> for Arg<S> {
    fn from(filter: Filter) -> Self {
        Arg::Module(Module::Filter(filter))
    }
}

impl<S> From<ErrorResponder> for Arg<S> {
    fn from(respond: ErrorResponder) -> Self {
        Arg::Module(Module::ErrorResponder(respond))
    }
}

/// One or more handler arguments, in declaration order.
pub struct Args<S>(Vec<Arg<S>>);

impl<S> Args<S> {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S> IntoIterator for Args<S> {
    type Item = Arg<S>;
    type IntoIter = std::vec::IntoIter<Arg<S>>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

macro_rules! single_arg {
    ($($ty:ty),* $(,)?) => {
        $(
            impl<S> From<$ty> for Args<S> {
                fn from(value: $ty) -> Self {
                    Args(vec![Arg::from(value)])
                }
            }
        )*
    };
}

single_arg!(&str, String, Module<S>, Endpoint<S>, Filter, ErrorResponder, Arg<S>);

impl<S> From<Vec<Arg<S>>> for Args<S> {
    fn from(args: Vec<Arg<S>>) -> Self {
        Args(args)
    }
}

impl<S, const N: usize> From<[Arg<S>; N]> for Args<S> {
    fn from(args: [Arg<S>; N]) -> Self {
        Args(args.into())
    }
}
