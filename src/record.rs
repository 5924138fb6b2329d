//! Record-to-line serialization.
//!
//! Records are turned into flat CSV lines through an explicit field list:
//! - [`Serializable`] yields the fields of a record in declaration order
//! - [`CsvLine`] joins those fields with a delimiter
//! - [`serializable!`](crate::serializable) implements [`Serializable`] for plain structs
//!
//! # Design notes
//! - No header row is emitted, so field order must be reproducible for a
//!   given record shape. Implementations list fields in declaration order.
//! - A missing value (`None`) becomes an empty field.
//! - Values are **not** escaped. A value containing the delimiter produces a
//!   line with more fields than the record has.

/// A record that can be flattened into an ordered list of field values.
///
/// `None` marks a missing value; it is rendered as an empty field.
///
/// # Examples
/// ```
/// use splitseal::record::{CsvLine, Serializable};
///
/// struct Row { name: String, code: Option<u32> }
///
/// impl Serializable for Row {
///     fn to_fields(&self) -> Vec<Option<String>> {
///         vec![Some(self.name.clone()), self.code.map(|c| c.to_string())]
///     }
/// }
///
/// let line = CsvLine::default().render(&Row { name: "a".into(), code: None });
/// assert_eq!(line, "a,");
/// ```
pub trait Serializable {
    /// Field values in declaration order.
    fn to_fields(&self) -> Vec<Option<String>>;
}

impl<T: Serializable + ?Sized> Serializable for &T {
    fn to_fields(&self) -> Vec<Option<String>> {
        (**self).to_fields()
    }
}

/// Conversion of a single struct field into an optional field value.
///
/// Used by [`serializable!`](crate::serializable) so that `Option<T>` fields
/// map `None` to a missing value while every other `ToString` type is present.
pub trait ToField {
    fn to_field(&self) -> Option<String>;
}

impl<T: ToString> ToField for Option<T> {
    fn to_field(&self) -> Option<String> {
        self.as_ref().map(ToString::to_string)
    }
}

macro_rules! present_field {
    ($($t:ty),* $(,)?) => {
        $(
            impl ToField for $t {
                fn to_field(&self) -> Option<String> {
                    Some(self.to_string())
                }
            }
        )*
    };
}

present_field!(
    String, &str, char, bool, u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize, f32,
    f64
);

/// Implement [`Serializable`] for a struct by listing its fields in
/// declaration order.
///
/// Each listed field must implement [`ToField`]: strings, numbers, `bool`,
/// `char`, and `Option` of any `ToString` type.
///
/// # Examples
/// ```
/// use splitseal::record::CsvLine;
/// use splitseal::serializable;
///
/// struct Person { name: String, age: u32, nick: Option<String> }
/// serializable!(Person { name, age, nick });
///
/// let p = Person { name: "Ada".into(), age: 36, nick: None };
/// assert_eq!(CsvLine::default().render(&p), "Ada,36,");
/// ```
#[macro_export]
macro_rules! serializable {
    ($ty:ty { $($field:ident),+ $(,)? }) => {
        impl $crate::record::Serializable for $ty {
            fn to_fields(&self) -> ::std::vec::Vec<::std::option::Option<::std::string::String>> {
                ::std::vec![$($crate::record::ToField::to_field(&self.$field)),+]
            }
        }
    };
}

/// Default field delimiter.
pub const DEFAULT_DELIMITER: char = ',';

/// Renders records as single CSV lines (without a line terminator).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CsvLine {
    delimiter: char,
}

impl Default for CsvLine {
    fn default() -> Self {
        Self {
            delimiter: DEFAULT_DELIMITER,
        }
    }
}

impl CsvLine {
    #[must_use]
    pub fn with_delimiter(delimiter: char) -> Self {
        Self { delimiter }
    }

    #[must_use]
    pub fn delimiter(&self) -> char {
        self.delimiter
    }

    /// Join the record's fields with the delimiter; missing values become empty.
    #[must_use]
    pub fn render<R: Serializable + ?Sized>(&self, record: &R) -> String {
        let mut line = String::new();
        for (i, field) in record.to_fields().into_iter().enumerate() {
            if i > 0 {
                line.push(self.delimiter);
            }
            if let Some(value) = field {
                line.push_str(&value);
            }
        }
        line
    }
}
