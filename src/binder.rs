//! Column binding: which destination slot each returned column writes to.

use crate::error::{Error, Result};
use crate::record::{Accessor, Record, Shape, Slot};
use std::any::type_name;
use std::fmt;

/// Column and field names compare case-insensitively with underscores removed,
/// so `user_id`, `USERID` and `UserID` are the same name.
pub fn normalize_name(name: &str) -> String {
    name.chars()
        .filter(|c| *c != '_')
        .flat_map(char::to_lowercase)
        .collect()
}

/// The slot one column is bound to.
pub struct Target<T> {
    /// Field name, or `None` when the column fills the whole destination.
    pub field: Option<&'static str>,
    accessor: Accessor<T>,
}

impl<T> Target<T> {
    pub fn slot<'a>(&self, record: &'a mut T) -> Slot<'a> {
        (self.accessor)(record)
    }
}

impl<T> fmt::Debug for Target<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.field {
            Some(field) => write!(f, "Field({field})"),
            None => f.write_str("Whole"),
        }
    }
}

impl<T> PartialEq for Target<T> {
    fn eq(&self, other: &Self) -> bool {
        self.field == other.field
    }
}

/// One [`Target`] per result column, in column order.
pub struct ColumnBinding<T> {
    columns: Vec<String>,
    targets: Vec<Target<T>>,
}

impl<T> fmt::Debug for ColumnBinding<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.columns.iter().zip(&self.targets))
            .finish()
    }
}

impl<T> PartialEq for ColumnBinding<T> {
    fn eq(&self, other: &Self) -> bool {
        self.columns == other.columns && self.targets == other.targets
    }
}

impl<T> ColumnBinding<T> {
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn targets(&self) -> &[Target<T>] {
        &self.targets
    }
}

/// Binds `columns` to the slots of `T`.
///
/// Every column of a record-shaped destination must match one of its fields;
/// a scalar destination takes exactly one column. When several fields
/// normalize to the same name, the column binds to the first one declared.
pub fn bind<T: Record>(columns: &[String]) -> Result<ColumnBinding<T>> {
    let targets = match T::shape() {
        Shape::Record(fields) => {
            let normalized: Vec<(String, _)> = fields
                .into_iter()
                .map(|field| (normalize_name(field.name), field))
                .collect();
            columns
                .iter()
                .map(|column| {
                    let key = normalize_name(column);
                    normalized
                        .iter()
                        .find(|(name, _)| *name == key)
                        .map(|(_, field)| Target {
                            field: Some(field.name),
                            accessor: field.accessor,
                        })
                        .ok_or_else(|| Error::UnmatchedColumn {
                            column: column.clone(),
                            destination: type_name::<T>(),
                        })
                })
                .collect::<Result<Vec<_>>>()?
        }
        Shape::Scalar(accessor) => {
            if columns.len() != 1 {
                return Err(Error::TooManyColumns {
                    count: columns.len(),
                    destination: type_name::<T>(),
                });
            }
            vec![Target {
                field: None,
                accessor,
            }]
        }
    };
    Ok(ColumnBinding {
        columns: columns.to_vec(),
        targets,
    })
}
