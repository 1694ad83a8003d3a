//! Flattened installer specifications
//!
//! An installer specification is a set of categories (`Kubernetes`, `Docker`,
//! ...) each holding scalar settings. Templates address a setting by its
//! composite key `"<Category>.<Field>"`, e.g. `Kubernetes.Version`.
//!
//! The key table is declared at compile time with [`installer_category!`]:
//! the macro generates the category struct together with its
//! [`InstallerCategory`] implementation, so the flattened key set always
//! matches the shape of the specification that was passed in.
//!
//! ```ignore
//! installer_category! {
//!     pub struct Docker {
//!         pub version: String => "Version",
//!         pub bypass_storage_driver_warnings: bool => "BypassStorageDriverWarnings",
//!     }
//! }
//! ```

use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

/// A scalar installer setting
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum InstallerValue {
    String(String),
    Int(i64),
    Bool(bool),
}

impl InstallerValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Type name for diagnostics
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::String(_) => "string",
            Self::Int(_) => "int",
            Self::Bool(_) => "bool",
        }
    }
}

impl fmt::Display for InstallerValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => f.write_str(s),
            Self::Int(i) => write!(f, "{}", i),
            Self::Bool(b) => write!(f, "{}", b),
        }
    }
}

impl From<String> for InstallerValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<&str> for InstallerValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<i64> for InstallerValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for InstallerValue {
    fn from(value: i32) -> Self {
        Self::Int(value.into())
    }
}

impl From<bool> for InstallerValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// One category of an installer specification
pub trait InstallerCategory {
    /// Key prefix for every setting of this category
    fn category_name(&self) -> &'static str;

    /// Flattenable settings as `(field name, value)` pairs
    fn fields(&self) -> Vec<(&'static str, InstallerValue)>;
}

/// A full installer specification
pub trait InstallerSchema {
    fn categories(&self) -> Vec<&dyn InstallerCategory>;
}

/// Declare an installer category and its flattening table
///
/// Fields written `name: Type => "Key"` are flattened under
/// `"<StructName>.<Key>"`. Fields without a key still (de)serialize but are
/// never flattened. The generated struct derives serde with camelCase names
/// and per-field defaults, so the calling crate needs `serde` as a dependency.
#[macro_export]
macro_rules! installer_category {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $(
                $(#[$field_meta:meta])*
                $field_vis:vis $field:ident : $ty:ty $(=> $key:literal)?
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq, ::serde::Serialize, ::serde::Deserialize)]
        #[serde(rename_all = "camelCase", default)]
        $vis struct $name {
            $(
                $(#[$field_meta])*
                $field_vis $field: $ty,
            )*
        }

        impl $crate::installer::InstallerCategory for $name {
            fn category_name(&self) -> &'static str {
                stringify!($name)
            }

            #[allow(unused_mut)]
            fn fields(&self) -> Vec<(&'static str, $crate::installer::InstallerValue)> {
                let mut fields = Vec::new();
                $($(
                    fields.push((
                        $key,
                        $crate::installer::InstallerValue::from(self.$field.clone()),
                    ));
                )?)*
                fields
            }
        }
    };
}

/// Installer settings keyed by `"<Category>.<Field>"`
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InstallerContext {
    values: HashMap<String, InstallerValue>,
}

impl InstallerContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flatten every category of a specification
    pub fn from_schema<S: InstallerSchema + ?Sized>(spec: &S) -> Self {
        let mut values = HashMap::new();

        for category in spec.categories() {
            let prefix = category.category_name();
            for (field, value) in category.fields() {
                values.insert(format!("{}.{}", prefix, field), value);
            }
        }

        Self { values }
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<InstallerValue>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&InstallerValue> {
        self.values.get(key)
    }

    /// String setting; `None` when absent or not a string
    pub fn string(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(InstallerValue::as_str)
    }

    /// Integer setting; `None` when absent or not an integer
    pub fn int(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(InstallerValue::as_int)
    }

    /// Boolean setting; `None` when absent or not a boolean
    pub fn bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(InstallerValue::as_bool)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Every key joined by a single space, in no particular order
    ///
    /// Meant for debugging templates, not for parsing.
    pub fn all_keys(&self) -> String {
        self.keys().collect::<Vec<_>>().join(" ")
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &InstallerValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl FromIterator<(String, InstallerValue)> for InstallerContext {
    fn from_iter<I: IntoIterator<Item = (String, InstallerValue)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}
