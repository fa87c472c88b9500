//! Callback shapes and their signature descriptors
//!
//! A *shape* is the parameter list plus return type shared by a family of
//! interchangeable callbacks. Every plain function pointer type such as
//! `fn(u32, String) -> bool` is a shape out of the box, and the [`shape!`]
//! macro declares named shapes with named parameters.
//!
//! Descriptors are computed once per shape type and cached for the life of
//! the process. Registries and events use them to reject handlers built for an
//! incompatible shape at subscription time and to render readable
//! diagnostics.
//!
//! [`shape!`]: crate::shape!


use std::any::{TypeId, type_name};
use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::Lazy;
use tracing::warn;

use crate::error::ShapeError;

/// One parameter (or return) type of a shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ParamType {
    id: TypeId,
    name: &'static str,
}

impl ParamType {
    /// Describe the type `T`
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

/// Argument tuple of a shape
///
/// Implemented for tuples of up to eight `Clone + 'static` elements. Arguments
/// are cloned once per alive subscriber when a multicast is invoked.
pub trait ArgList: Clone + 'static {
    /// Number of parameters
    const ARITY: usize;

    /// Parameter types in declaration order
    fn param_types() -> Vec<ParamType>;
}

macro_rules! count {
    () => { 0usize };
    ($head:ident $($tail:ident)*) => { 1usize + count!($($tail)*) };
}

macro_rules! impl_arg_list {
    ($($arg:ident),*) => {
        impl<$($arg: Clone + 'static),*> ArgList for ($($arg,)*) {
            const ARITY: usize = count!($($arg)*);

            fn param_types() -> Vec<ParamType> {
                vec![$(ParamType::of::<$arg>()),*]
            }
        }
    };
}

impl_arg_list!();
impl_arg_list!(A1);
impl_arg_list!(A1, A2);
impl_arg_list!(A1, A2, A3);
impl_arg_list!(A1, A2, A3, A4);
impl_arg_list!(A1, A2, A3, A4, A5);
impl_arg_list!(A1, A2, A3, A4, A5, A6);
impl_arg_list!(A1, A2, A3, A4, A5, A6, A7);
impl_arg_list!(A1, A2, A3, A4, A5, A6, A7, A8);

/// A callback contract: an argument tuple and a return type
///
/// Two shapes are compatible when their argument and output types are the
/// same, even if the shape types themselves differ.
pub trait Shape: 'static {
    /// Arguments, as a tuple
    type Args: ArgList;
    /// Value produced by a single callback
    type Output: 'static;

    /// Parameter names used in diagnostics. Empty means unnamed.
    fn param_names() -> &'static [&'static str] {
        &[]
    }
}

macro_rules! impl_fn_shape {
    ($($arg:ident),*) => {
        impl<R: 'static, $($arg: Clone + 'static),*> Shape for fn($($arg),*) -> R {
            type Args = ($($arg,)*);
            type Output = R;
        }
    };
}

impl_fn_shape!();
impl_fn_shape!(A1);
impl_fn_shape!(A1, A2);
impl_fn_shape!(A1, A2, A3);
impl_fn_shape!(A1, A2, A3, A4);
impl_fn_shape!(A1, A2, A3, A4, A5);
impl_fn_shape!(A1, A2, A3, A4, A5, A6);
impl_fn_shape!(A1, A2, A3, A4, A5, A6, A7);
impl_fn_shape!(A1, A2, A3, A4, A5, A6, A7, A8);

/// Declare a named shape with named parameters
///
/// ```rust
/// weakcast_core::shape! {
///     /// Fired when a download finishes
///     pub Finished(url: String, bytes: u64) -> bool
/// }
///
/// let descriptor = weakcast_core::shape::descriptor::<Finished>().unwrap();
/// assert_eq!(descriptor.arity(), 2);
/// assert_eq!(descriptor.param_names(), &["url", "bytes"]);
/// ```
#[macro_export]
macro_rules! shape {
    (@output) => { () };
    (@output $ret:ty) => { $ret };
    (
        $(#[$meta:meta])*
        $vis:vis $name:ident ( $($param:ident : $ty:ty),* $(,)? ) $(-> $ret:ty)?
    ) => {
        $(#[$meta])*
        $vis enum $name {}

        impl $crate::shape::Shape for $name {
            type Args = ($($ty,)*);
            type Output = $crate::shape!(@output $($ret)?);

            fn param_names() -> &'static [&'static str] {
                &[$(stringify!($param)),*]
            }
        }
    };
}

/// Resolved description of a shape
#[derive(Debug, Clone)]
pub struct SignatureDescriptor {
    shape: &'static str,
    params: Vec<ParamType>,
    output: ParamType,
    param_names: &'static [&'static str],
}

impl SignatureDescriptor {
    fn build<S: Shape>() -> Result<Self, ShapeError> {
        let shape = type_name::<S>();
        let params = <S::Args as ArgList>::param_types();
        let param_names = S::param_names();

        if !param_names.is_empty() {
            if param_names.len() != params.len() {
                return Err(ShapeError::Unsupported {
                    shape,
                    reason: format!(
                        "declares {} parameter names for {} arguments",
                        param_names.len(),
                        params.len()
                    ),
                });
            }

            for (index, name) in param_names.iter().enumerate() {
                if name.is_empty() {
                    return Err(ShapeError::Unsupported {
                        shape,
                        reason: format!("parameter {index} has an empty name"),
                    });
                }
                if param_names[..index].contains(name) {
                    return Err(ShapeError::Unsupported {
                        shape,
                        reason: format!("parameter `{name}` is declared twice"),
                    });
                }
            }
        }

        Ok(Self {
            shape,
            params,
            output: ParamType::of::<S::Output>(),
            param_names,
        })
    }

    /// Type name of the shape this descriptor was built for
    pub fn shape_name(&self) -> &'static str {
        self.shape
    }

    pub fn params(&self) -> &[ParamType] {
        &self.params
    }

    pub fn param_names(&self) -> &'static [&'static str] {
        self.param_names
    }

    pub fn output(&self) -> ParamType {
        self.output
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }

    /// Whether a callback of this shape produces a value
    pub fn returns_value(&self) -> bool {
        self.output.id != TypeId::of::<()>()
    }

    /// Whether callbacks of both shapes take and return the same types
    pub fn matches(&self, other: &SignatureDescriptor) -> bool {
        self.output.id == other.output.id
            && self.params.len() == other.params.len()
            && self
                .params
                .iter()
                .zip(&other.params)
                .all(|(left, right)| left.id == right.id)
    }
}

impl fmt::Display for SignatureDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("fn(")?;
        for (index, param) in self.params.iter().enumerate() {
            if index > 0 {
                f.write_str(", ")?;
            }
            match self.param_names.get(index) {
                Some(name) => write!(f, "{}: {}", name, param.name)?,
                None => f.write_str(param.name)?,
            }
        }
        f.write_str(")")?;
        if self.returns_value() {
            write!(f, " -> {}", self.output.name)?;
        }
        Ok(())
    }
}

/// Process-wide descriptor cache, failures included
static DESCRIPTORS: Lazy<DashMap<TypeId, Result<Arc<SignatureDescriptor>, ShapeError>>> =
    Lazy::new(DashMap::new);

/// Get the descriptor for shape `S`, building it on first use
///
/// A shape that fails validation fails the same way on every later call
/// without being rebuilt.
pub fn descriptor<S: Shape>() -> Result<Arc<SignatureDescriptor>, ShapeError> {
    let key = TypeId::of::<S>();

    if let Some(cached) = DESCRIPTORS.get(&key) {
        return cached.value().clone();
    }

    DESCRIPTORS
        .entry(key)
        .or_insert_with(|| {
            let built = SignatureDescriptor::build::<S>().map(Arc::new);
            if let Err(err) = &built {
                warn!(shape = type_name::<S>(), %err, "rejected callback shape");
            }
            built
        })
        .value()
        .clone()
}
