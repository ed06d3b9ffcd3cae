//! Destination types for query results.
//!
//! A query maps each returned column onto a [`Slot`]: a mutable reference to
//! one field of the destination record, tagged with the field's static type.
//! Record-shaped destinations list their fields through [`Record::shape`];
//! scalar destinations (a bare `i64`, `String`, ...) are one slot.

use chrono::{DateTime, Utc};

/// A typed, mutable destination for one column value.
#[derive(Debug)]
pub enum Slot<'a> {
    Text(&'a mut String),
    I8(&'a mut i8),
    I16(&'a mut i16),
    I32(&'a mut i32),
    I64(&'a mut i64),
    Isize(&'a mut isize),
    U8(&'a mut u8),
    U16(&'a mut u16),
    U32(&'a mut u32),
    U64(&'a mut u64),
    Usize(&'a mut usize),
    F32(&'a mut f32),
    F64(&'a mut f64),
    Bool(&'a mut bool),
    Bytes(&'a mut Vec<u8>),
    Timestamp(&'a mut DateTime<Utc>),
}

impl Slot<'_> {
    /// Declared Rust type of the destination.
    pub fn type_name(&self) -> &'static str {
        match self {
            Slot::Text(_) => "String",
            Slot::I8(_) => "i8",
            Slot::I16(_) => "i16",
            Slot::I32(_) => "i32",
            Slot::I64(_) => "i64",
            Slot::Isize(_) => "isize",
            Slot::U8(_) => "u8",
            Slot::U16(_) => "u16",
            Slot::U32(_) => "u32",
            Slot::U64(_) => "u64",
            Slot::Usize(_) => "usize",
            Slot::F32(_) => "f32",
            Slot::F64(_) => "f64",
            Slot::Bool(_) => "bool",
            Slot::Bytes(_) => "Vec<u8>",
            Slot::Timestamp(_) => "DateTime<Utc>",
        }
    }

    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            Slot::I8(_)
                | Slot::I16(_)
                | Slot::I32(_)
                | Slot::I64(_)
                | Slot::Isize(_)
                | Slot::U8(_)
                | Slot::U16(_)
                | Slot::U32(_)
                | Slot::U64(_)
                | Slot::Usize(_)
        )
    }

    pub fn is_float(&self) -> bool {
        matches!(self, Slot::F32(_) | Slot::F64(_))
    }

    /// Resets the destination to its zero value.
    pub fn set_zero(&mut self) {
        match self {
            Slot::Text(v) => v.clear(),
            Slot::I8(v) => **v = 0,
            Slot::I16(v) => **v = 0,
            Slot::I32(v) => **v = 0,
            Slot::I64(v) => **v = 0,
            Slot::Isize(v) => **v = 0,
            Slot::U8(v) => **v = 0,
            Slot::U16(v) => **v = 0,
            Slot::U32(v) => **v = 0,
            Slot::U64(v) => **v = 0,
            Slot::Usize(v) => **v = 0,
            Slot::F32(v) => **v = 0.0,
            Slot::F64(v) => **v = 0.0,
            Slot::Bool(v) => **v = false,
            Slot::Bytes(v) => v.clear(),
            Slot::Timestamp(v) => **v = DateTime::<Utc>::default(),
        }
    }
}

/// A type that can receive a single column value.
pub trait Column {
    fn slot(&mut self) -> Slot<'_>;
}

macro_rules! column {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl Column for $ty {
                fn slot(&mut self) -> Slot<'_> {
                    Slot::$variant(self)
                }
            }

            impl Record for $ty {
                fn shape() -> Shape<Self> {
                    Shape::Scalar(<$ty as Column>::slot)
                }
            }
        )*
    };
}

column! {
    String => Text,
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    isize => Isize,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    usize => Usize,
    f32 => F32,
    f64 => F64,
    bool => Bool,
    Vec<u8> => Bytes,
    DateTime<Utc> => Timestamp,
}

/// Borrows one slot out of a destination value.
pub type Accessor<T> = for<'a> fn(&'a mut T) -> Slot<'a>;

/// A named field of a record-shaped destination.
pub struct Field<T> {
    pub name: &'static str,
    pub accessor: Accessor<T>,
}

impl<T> Field<T> {
    pub fn new(name: &'static str, accessor: Accessor<T>) -> Self {
        Self { name, accessor }
    }
}

impl<T> Clone for Field<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Field<T> {}

impl<T> std::fmt::Debug for Field<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Field").field("name", &self.name).finish()
    }
}

/// How a destination receives columns.
pub enum Shape<T> {
    /// Columns are matched to fields by name.
    Record(Vec<Field<T>>),
    /// The destination itself takes the single column.
    Scalar(Accessor<T>),
}

/// A query destination.
///
/// The value is used as a scratch buffer while reading rows and cloned into
/// the result for each row, so it must be `Default + Clone`.
///
/// Implement it with [`record!`](crate::record!) or by hand:
///
/// ```
/// use rust_sqlmap::{Column, Field, Record, Shape};
///
/// #[derive(Debug, Clone, Default)]
/// struct Account {
///     id: i64,
///     owner: String,
/// }
///
/// impl Record for Account {
///     fn shape() -> Shape<Self> {
///         Shape::Record(vec![
///             Field::<Self>::new("ID", |a| a.id.slot()),
///             Field::<Self>::new("Owner", |a| a.owner.slot()),
///         ])
///     }
/// }
/// ```
pub trait Record: Default + Clone + 'static {
    fn shape() -> Shape<Self>;
}

/// Declares a struct together with its [`Record`] implementation.
///
/// Every field is bound by its Rust name.
///
/// ```
/// rust_sqlmap::record! {
///     #[derive(Debug, Clone, Default, PartialEq)]
///     pub struct User {
///         pub user_id: i64,
///         pub name: String,
///     }
/// }
/// ```
#[macro_export]
macro_rules! record {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $(
                $(#[$field_meta:meta])*
                $field_vis:vis $field:ident : $ty:ty
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        $vis struct $name {
            $(
                $(#[$field_meta])*
                $field_vis $field: $ty,
            )*
        }

        impl $crate::Record for $name {
            fn shape() -> $crate::Shape<Self> {
                $crate::Shape::Record(::std::vec![
                    $(
                        {
                            fn accessor(record: &mut $name) -> $crate::Slot<'_> {
                                $crate::Column::slot(&mut record.$field)
                            }
                            $crate::Field::new(::std::stringify!($field), accessor)
                        }
                    ),*
                ])
            }
        }
    };
}
