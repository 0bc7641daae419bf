use std::borrow::Cow;
use std::fmt::{self, Debug, Display, Formatter};
use std::rc::Rc;

/// A namespace grouping related tagged types under one id range.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Zone(pub u8);

impl Zone {
    /// Built-in and common types.
    pub const BASE: Zone = Zone(0);
    /// Families of single-parameter wrapper types, see [`TypeTag::wrap`].
    pub const TEMPLATES: Zone = Zone(255);
}

impl Display for Zone {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifies a type that participates in request evaluation.
///
/// A plain tag packs a zone and a zone-local id into the low 16 bits. A tag
/// for a wrapper type `W<T>` shifts the tag of `T` up by 16 bits and combines
/// it with the wrapper's own template tag, so whole families of wrappers are
/// tagged without registering every instantiation. Four levels of nesting fit
/// into the 64 bits; deeper nesting loses the innermost levels.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct TypeTag(u64);

impl TypeTag {
    /// The tag of a plain type.
    pub const fn new(zone: Zone, local: u8) -> Self {
        Self(((zone.0 as u64) << 8) | local as u64)
    }

    /// The tag of a wrapper type instantiated with an argument.
    pub const fn wrap(template: TypeTag, argument: TypeTag) -> Self {
        Self((argument.0 << 16) | (template.0 & 0xFFFF))
    }

    /// The zone of the type, or of the outermost wrapper.
    pub const fn zone(self) -> Zone {
        Zone((self.0 >> 8) as u8)
    }

    /// The zone-local id of the type, or of the outermost wrapper.
    pub const fn local(self) -> u8 {
        self.0 as u8
    }

    /// The packed identifier.
    pub const fn composite(self) -> u64 {
        self.0
    }

    /// Whether this tag belongs to an instantiated wrapper type.
    pub const fn is_template(self) -> bool {
        self.zone().0 == Zone::TEMPLATES.0
    }
}

impl Debug for TypeTag {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        if self.is_template() {
            write!(f, "TypeTag({:#x})", self.0)
        } else {
            write!(f, "TypeTag({}:{})", self.zone(), self.local())
        }
    }
}

impl Display for TypeTag {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        Debug::fmt(self, f)
    }
}

/// A type with a compile-time tag.
///
/// Implemented through [`#[derive(Tagged)]`](macro@crate::Tagged) for local
/// types, through [`type_ids!`](crate::type_ids) for lists of types and by
/// hand for wrapper families.
pub trait Tagged {
    /// The type's tag.
    const TAG: TypeTag;

    /// A human-readable name of the type.
    fn type_name() -> Cow<'static, str>;
}

/// Assign tags to a list of types in one zone.
///
/// Fails to compile if two types in the list share a local id.
///
/// ```
/// # use reqeval::{type_ids, Zone};
/// struct Meters(u32);
/// struct Seconds(u32);
///
/// type_ids! {
///     zone Zone(7);
///     0 => Meters,
///     1 => Seconds,
/// }
/// ```
#[macro_export]
macro_rules! type_ids {
    (zone $zone:expr; $($id:literal => $ty:ty),* $(,)?) => {
        $(
            impl $crate::Tagged for $ty {
                const TAG: $crate::TypeTag = $crate::TypeTag::new($zone, $id);

                fn type_name() -> ::std::borrow::Cow<'static, str> {
                    ::std::borrow::Cow::Borrowed(stringify!($ty))
                }
            }
        )*

        const _: () = assert!(
            $crate::internal::distinct_local_ids(&[$($id),*]),
            "two types in the same zone share a local id",
        );
    };
}

/// Whether no id appears twice.
pub const fn distinct_local_ids(ids: &[u8]) -> bool {
    let mut i = 0;
    while i < ids.len() {
        let mut j = i + 1;
        while j < ids.len() {
            if ids[i] == ids[j] {
                return false;
            }
            j += 1;
        }
        i += 1;
    }
    true
}

type_ids! {
    zone Zone::BASE;
    0 => (),
    1 => bool,
    2 => char,
    3 => u8,
    4 => u16,
    5 => u32,
    6 => u64,
    7 => u128,
    8 => usize,
    9 => i8,
    10 => i16,
    11 => i32,
    12 => i64,
    13 => i128,
    14 => isize,
    15 => String,
    16 => &'static str,
}

macro_rules! wrapper_ids {
    ($($id:literal => $wrapper:ident),* $(,)?) => {
        $(
            impl<T: Tagged> Tagged for $wrapper<T> {
                const TAG: TypeTag =
                    TypeTag::wrap(TypeTag::new(Zone::TEMPLATES, $id), T::TAG);

                fn type_name() -> Cow<'static, str> {
                    Cow::Owned(format!("{}<{}>", stringify!($wrapper), T::type_name()))
                }
            }
        )*

        const _: () = assert!(distinct_local_ids(&[$($id),*]));
    };
}

wrapper_ids! {
    0 => Vec,
    1 => Option,
    2 => Box,
    3 => Rc,
}
