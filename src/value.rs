use std::any::Any;
use std::borrow::Cow;
use std::fmt::{self, Debug, Display, Formatter};
use std::rc::Rc;

use crate::tag::{Tagged, TypeTag};

/// The contract for values stored in an [`AnyValue`].
///
/// Implemented automatically for every tagged type that is clonable,
/// comparable and printable.
pub trait Value: Tagged + Clone + PartialEq + Debug + 'static {}

impl<T> Value for T where T: Tagged + Clone + PartialEq + Debug + 'static {}

/// An immutable, type-erased value.
///
/// Clones share the underlying storage.
#[derive(Clone)]
pub struct AnyValue {
    tag: TypeTag,
    holder: Rc<dyn ValueHolder>,
}

impl AnyValue {
    /// Erase the type of a value.
    pub fn new<T: Value>(value: T) -> Self {
        Self { tag: T::TAG, holder: Rc::new(Holder(value)) }
    }

    /// The tag of the stored value's type.
    pub fn tag(&self) -> TypeTag {
        self.tag
    }

    /// The name of the stored value's type.
    pub fn type_name(&self) -> Cow<'static, str> {
        self.holder.type_name()
    }

    /// Whether the stored value is of type `T`.
    pub fn is<T: Value>(&self) -> bool {
        self.get_as::<T>().is_some()
    }

    /// Access the stored value as a `T`.
    ///
    /// Panics if the stored value is of a different type.
    #[track_caller]
    pub fn cast_to<T: Value>(&self) -> &T {
        match self.get_as::<T>() {
            Some(value) => value,
            None => panic!(
                "reqeval: cannot cast a value of type `{}` to `{}`",
                self.type_name(),
                T::type_name(),
            ),
        }
    }

    /// Access the stored value as a `T` if it is one.
    pub fn get_as<T: Value>(&self) -> Option<&T> {
        if self.tag != T::TAG {
            return None;
        }
        self.holder.as_any().downcast_ref()
    }
}

impl PartialEq for AnyValue {
    fn eq(&self, other: &Self) -> bool {
        self.tag == other.tag && self.holder.equals(&*other.holder)
    }
}

impl Display for AnyValue {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        self.holder.display(f)
    }
}

impl Debug for AnyValue {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        self.holder.display(f)
    }
}

/// Object-safe operations on a stored value.
trait ValueHolder {
    fn as_any(&self) -> &dyn Any;
    fn equals(&self, other: &dyn ValueHolder) -> bool;
    fn display(&self, f: &mut Formatter) -> fmt::Result;
    fn type_name(&self) -> Cow<'static, str>;
}

struct Holder<T>(T);

impl<T: Value> ValueHolder for Holder<T> {
    fn as_any(&self) -> &dyn Any {
        &self.0
    }

    fn equals(&self, other: &dyn ValueHolder) -> bool {
        other.as_any().downcast_ref::<T>().is_some_and(|other| self.0 == *other)
    }

    fn display(&self, f: &mut Formatter) -> fmt::Result {
        Debug::fmt(&self.0, f)
    }

    fn type_name(&self) -> Cow<'static, str> {
        T::type_name()
    }
}
