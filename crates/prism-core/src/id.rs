//! Declaration identity.
//!
//! Every declaration prism can reflect is addressed by a [`DeclId`]. Ids are plain
//! values: equality is structural and [`DeclId::encode`] yields a stable string that
//! is used verbatim in cache keys.
//!
//! The encoding is a compatibility contract. Changing any of the formats below
//! invalidates every persisted cache entry, so the tests at the bottom of this file
//! pin them down.
//!
//! | declaration        | encoding                               |
//! |--------------------|----------------------------------------|
//! | named class        | `App\User`                             |
//! | anonymous class    | `anonymous-class:/src/a.php:12[:7]`    |
//! | named function     | `App\helper()`                         |
//! | anonymous function | `anonymous-function:/src/a.php:3[:9]`  |
//! | global constant    | `constant:App\VERSION`                 |
//! | method             | `App\User::save()`                     |
//! | property           | `App\User::$name`                      |
//! | class constant     | `App\User::TABLE`                      |
//! | parameter          | `App\User::save()#$force`              |
//! | type alias         | `App\User@alias:Row`                   |
//! | template           | `App\Box@template:T`                   |
//!
//! Class-like, function and method names are case-insensitive in the language.
//! [`DeclId::normalized`] folds them, and the reflector keys its cache on the encoding
//! of the normalized id.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::Name;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NamedClassId {
    pub name: Name,
}

/// An anonymous class, identified by its position in source.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AnonymousClassId {
    pub file: PathBuf,
    pub line: u32,
    pub column: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ClassLikeId {
    Named(NamedClassId),
    Anonymous(AnonymousClassId),
}

impl ClassLikeId {
    pub fn named(name: impl Into<Name>) -> Self {
        Self::Named(NamedClassId { name: name.into() })
    }

    pub fn anonymous(file: impl AsRef<Path>, line: u32, column: Option<u32>) -> Self {
        Self::Anonymous(AnonymousClassId {
            file: file.as_ref().to_path_buf(),
            line,
            column,
        })
    }

    /// The declared name, or `None` for anonymous classes.
    pub fn name(&self) -> Option<&Name> {
        match self {
            ClassLikeId::Named(id) => Some(&id.name),
            ClassLikeId::Anonymous(_) => None,
        }
    }

    /// A name usable inside types: the declared name, or the encoded id for anonymous classes.
    pub fn type_name(&self) -> Name {
        match self {
            ClassLikeId::Named(id) => id.name.clone(),
            ClassLikeId::Anonymous(_) => Name::new(self.encode()),
        }
    }

    /// This id with its name lowercased; anonymous ids are returned as is.
    pub fn normalized(&self) -> Self {
        match self {
            ClassLikeId::Named(id) => ClassLikeId::Named(NamedClassId {
                name: id.name.to_ascii_lowercase(),
            }),
            ClassLikeId::Anonymous(_) => self.clone(),
        }
    }

    pub fn encode(&self) -> String {
        match self {
            ClassLikeId::Named(id) => id.name.to_string(),
            ClassLikeId::Anonymous(id) => {
                encode_position("anonymous-class", &id.file, id.line, id.column)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NamedFunctionId {
    pub name: Name,
}

/// A closure or arrow function, identified by its position in source.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AnonymousFunctionId {
    pub file: PathBuf,
    pub line: u32,
    pub column: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MethodId {
    pub class: ClassLikeId,
    pub name: Name,
}

impl MethodId {
    pub fn new(class: ClassLikeId, name: impl Into<Name>) -> Self {
        Self {
            class,
            name: name.into(),
        }
    }

    pub fn encode(&self) -> String {
        format!("{}::{}()", self.class.encode(), self.name)
    }

    pub fn normalized(&self) -> Self {
        Self {
            class: self.class.normalized(),
            name: self.name.to_ascii_lowercase(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FunctionLikeId {
    Named(NamedFunctionId),
    Anonymous(AnonymousFunctionId),
    Method(MethodId),
}

impl FunctionLikeId {
    pub fn named(name: impl Into<Name>) -> Self {
        Self::Named(NamedFunctionId { name: name.into() })
    }

    pub fn anonymous(file: impl AsRef<Path>, line: u32, column: Option<u32>) -> Self {
        Self::Anonymous(AnonymousFunctionId {
            file: file.as_ref().to_path_buf(),
            line,
            column,
        })
    }

    pub fn normalized(&self) -> Self {
        match self {
            FunctionLikeId::Named(id) => FunctionLikeId::Named(NamedFunctionId {
                name: id.name.to_ascii_lowercase(),
            }),
            FunctionLikeId::Anonymous(_) => self.clone(),
            FunctionLikeId::Method(id) => FunctionLikeId::Method(id.normalized()),
        }
    }

    pub fn encode(&self) -> String {
        match self {
            FunctionLikeId::Named(id) => format!("{}()", id.name),
            FunctionLikeId::Anonymous(id) => {
                encode_position("anonymous-function", &id.file, id.line, id.column)
            }
            FunctionLikeId::Method(id) => id.encode(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ConstantId {
    pub name: Name,
}

impl ConstantId {
    pub fn new(name: impl Into<Name>) -> Self {
        Self { name: name.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PropertyId {
    pub class: ClassLikeId,
    pub name: Name,
}

impl PropertyId {
    pub fn new(class: ClassLikeId, name: impl Into<Name>) -> Self {
        Self {
            class,
            name: name.into(),
        }
    }
}

/// A class constant. Enum cases are class constants as well; their records carry
/// the `EnumCase` fact.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ClassConstantId {
    pub class: ClassLikeId,
    pub name: Name,
}

impl ClassConstantId {
    pub fn new(class: ClassLikeId, name: impl Into<Name>) -> Self {
        Self {
            class,
            name: name.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ParameterId {
    pub function: FunctionLikeId,
    pub name: Name,
}

impl ParameterId {
    pub fn new(function: FunctionLikeId, name: impl Into<Name>) -> Self {
        Self {
            function,
            name: name.into(),
        }
    }
}

/// A doc-comment type alias declared on a class.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AliasId {
    pub class: ClassLikeId,
    pub name: Name,
}

/// The declaration a template is scoped to.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TemplateSite {
    Class(ClassLikeId),
    Function(FunctionLikeId),
}

impl TemplateSite {
    pub fn encode(&self) -> String {
        match self {
            TemplateSite::Class(id) => id.encode(),
            TemplateSite::Function(id) => id.encode(),
        }
    }

    pub fn normalized(&self) -> Self {
        match self {
            TemplateSite::Class(id) => TemplateSite::Class(id.normalized()),
            TemplateSite::Function(id) => TemplateSite::Function(id.normalized()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TemplateId {
    pub site: TemplateSite,
    pub name: Name,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DeclId {
    Class(ClassLikeId),
    Function(FunctionLikeId),
    Constant(ConstantId),
    Method(MethodId),
    Property(PropertyId),
    ClassConstant(ClassConstantId),
    Parameter(ParameterId),
    Alias(AliasId),
    Template(TemplateId),
}

impl DeclId {
    pub fn class(name: impl Into<Name>) -> Self {
        Self::Class(ClassLikeId::named(name))
    }

    pub fn function(name: impl Into<Name>) -> Self {
        Self::Function(FunctionLikeId::named(name))
    }

    pub fn constant(name: impl Into<Name>) -> Self {
        Self::Constant(ConstantId::new(name))
    }

    pub fn method(class: impl Into<Name>, name: impl Into<Name>) -> Self {
        Self::Method(MethodId::new(ClassLikeId::named(class), name))
    }

    pub fn property(class: impl Into<Name>, name: impl Into<Name>) -> Self {
        Self::Property(PropertyId::new(ClassLikeId::named(class), name))
    }

    pub fn class_constant(class: impl Into<Name>, name: impl Into<Name>) -> Self {
        Self::ClassConstant(ClassConstantId::new(ClassLikeId::named(class), name))
    }

    /// Stable string form used in cache keys.
    pub fn encode(&self) -> String {
        match self {
            DeclId::Class(id) => id.encode(),
            DeclId::Function(id) => id.encode(),
            DeclId::Constant(id) => format!("constant:{}", id.name),
            DeclId::Method(id) => id.encode(),
            DeclId::Property(id) => format!("{}::${}", id.class.encode(), id.name),
            DeclId::ClassConstant(id) => format!("{}::{}", id.class.encode(), id.name),
            DeclId::Parameter(id) => format!("{}#${}", id.function.encode(), id.name),
            DeclId::Alias(id) => format!("{}@alias:{}", id.class.encode(), id.name),
            DeclId::Template(id) => format!("{}@template:{}", id.site.encode(), id.name),
        }
    }

    /// The id with every case-insensitive part lowercased: class-like, function and
    /// method names. Constant, property, parameter, alias and template names are
    /// case-sensitive and kept verbatim.
    ///
    /// Two ids denote the same declaration exactly when their normalized forms are
    /// equal, so caches and in-progress tracking key on this form.
    pub fn normalized(&self) -> DeclId {
        match self {
            DeclId::Class(id) => DeclId::Class(id.normalized()),
            DeclId::Function(id) => DeclId::Function(id.normalized()),
            DeclId::Constant(_) => self.clone(),
            DeclId::Method(id) => DeclId::Method(id.normalized()),
            DeclId::Property(id) => DeclId::Property(PropertyId::new(id.class.normalized(), id.name.clone())),
            DeclId::ClassConstant(id) => {
                DeclId::ClassConstant(ClassConstantId::new(id.class.normalized(), id.name.clone()))
            }
            DeclId::Parameter(id) => {
                DeclId::Parameter(ParameterId::new(id.function.normalized(), id.name.clone()))
            }
            DeclId::Alias(id) => DeclId::Alias(AliasId {
                class: id.class.normalized(),
                name: id.name.clone(),
            }),
            DeclId::Template(id) => DeclId::Template(TemplateId {
                site: id.site.normalized(),
                name: id.name.clone(),
            }),
        }
    }

    /// Whether both ids denote the same declaration.
    pub fn same_declaration(&self, other: &DeclId) -> bool {
        self.normalized() == other.normalized()
    }

    /// The declaration that owns this one, for members.
    pub fn owner(&self) -> Option<DeclId> {
        match self {
            DeclId::Class(_) | DeclId::Constant(_) => None,
            DeclId::Function(FunctionLikeId::Method(id)) => Some(DeclId::Class(id.class.clone())),
            DeclId::Function(_) => None,
            DeclId::Method(id) => Some(DeclId::Class(id.class.clone())),
            DeclId::Property(id) => Some(DeclId::Class(id.class.clone())),
            DeclId::ClassConstant(id) => Some(DeclId::Class(id.class.clone())),
            DeclId::Parameter(id) => Some(match &id.function {
                FunctionLikeId::Method(method) => DeclId::Method(method.clone()),
                other => DeclId::Function(other.clone()),
            }),
            DeclId::Alias(id) => Some(DeclId::Class(id.class.clone())),
            DeclId::Template(id) => Some(match &id.site {
                TemplateSite::Class(class) => DeclId::Class(class.clone()),
                TemplateSite::Function(FunctionLikeId::Method(method)) => {
                    DeclId::Method(method.clone())
                }
                TemplateSite::Function(function) => DeclId::Function(function.clone()),
            }),
        }
    }
}

impl fmt::Display for DeclId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl fmt::Display for ClassLikeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl fmt::Display for FunctionLikeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl From<ClassLikeId> for DeclId {
    fn from(value: ClassLikeId) -> Self {
        DeclId::Class(value)
    }
}

impl From<FunctionLikeId> for DeclId {
    fn from(value: FunctionLikeId) -> Self {
        match value {
            FunctionLikeId::Method(id) => DeclId::Method(id),
            other => DeclId::Function(other),
        }
    }
}

impl From<ConstantId> for DeclId {
    fn from(value: ConstantId) -> Self {
        DeclId::Constant(value)
    }
}

fn encode_position(kind: &str, file: &Path, line: u32, column: Option<u32>) -> String {
    // Normalize separators so ids are identical across platforms.
    let file = file.to_string_lossy().replace('\\', "/");
    match column {
        Some(column) => format!("{kind}:{file}:{line}:{column}"),
        None => format!("{kind}:{file}:{line}"),
    }
}
