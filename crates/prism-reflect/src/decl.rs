//! Structural declarations as produced by a [`crate::DeclarationExtractor`].
//!
//! Nothing in here is resolved: names are written the way they appear in source and
//! types are unresolved [`TypeExpr`] trees. The reflector turns these into records.
//!
//! The `with_*`/builder helpers exist so extractors (and tests) can assemble
//! declarations without spelling out every field.

use prism_types::Literal;
use serde::{Deserialize, Serialize};

use crate::model::{ClassKind, Visibility};

/// Everything an extractor found in one source.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileDeclarations {
    pub classes: Vec<ClassDecl>,
    pub functions: Vec<FunctionDecl>,
    pub constants: Vec<ConstantDecl>,
}

/// An unresolved type as written in a signature or doc comment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeExpr {
    Named { name: String, args: Vec<TypeExpr> },
    Nullable(Box<TypeExpr>),
    Union(Vec<TypeExpr>),
    Intersection(Vec<TypeExpr>),
    Literal(Literal),
    /// `Foo::BAR` used as a type.
    ClassConstant { class: String, name: String },
}

impl TypeExpr {
    pub fn named(name: impl Into<String>) -> Self {
        TypeExpr::Named {
            name: name.into(),
            args: Vec::new(),
        }
    }

    pub fn generic(name: impl Into<String>, args: Vec<TypeExpr>) -> Self {
        TypeExpr::Named {
            name: name.into(),
            args,
        }
    }

    pub fn nullable(inner: TypeExpr) -> Self {
        TypeExpr::Nullable(Box::new(inner))
    }

    pub fn is_nullable(&self) -> bool {
        match self {
            TypeExpr::Nullable(_) => true,
            TypeExpr::Named { name, .. } => {
                name.eq_ignore_ascii_case("null") || name.eq_ignore_ascii_case("mixed")
            }
            TypeExpr::Union(parts) => parts.iter().any(TypeExpr::is_nullable),
            _ => false,
        }
    }

    /// The class-like name a generic reference such as `@extends Base<int>` points at.
    pub fn head_name(&self) -> Option<&str> {
        match self {
            TypeExpr::Named { name, .. } => Some(name),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOp {
    Not,
    Neg,
    Plus,
    BitNot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    Concat,
    Eq,
    NotEq,
    Identical,
    NotIdentical,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Spaceship,
    And,
    Or,
    Xor,
    BitAnd,
    BitOr,
    BitXor,
    ShiftLeft,
    ShiftRight,
    Coalesce,
}

/// A constant expression: the subset of the language allowed in constant, property
/// and parameter default initializers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Array(Vec<ArrayItem>),
    /// A global or magic constant, unresolved (`FOO`, `App\FOO`, `__CLASS__`).
    Constant(String),
    /// `Foo::BAR`, `self::BAR` or `Foo::class`.
    ClassConstant { class: String, name: String },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// `a ? b : c`; `then` is `None` for the short form `a ?: c`.
    Ternary {
        condition: Box<Expr>,
        then: Option<Box<Expr>>,
        otherwise: Box<Expr>,
    },
}

impl Expr {
    pub fn string(value: impl Into<String>) -> Self {
        Expr::String(value.into())
    }

    pub fn constant(name: impl Into<String>) -> Self {
        Expr::Constant(name.into())
    }

    pub fn class_constant(class: impl Into<String>, name: impl Into<String>) -> Self {
        Expr::ClassConstant {
            class: class.into(),
            name: name.into(),
        }
    }

    pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Self {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn unary(op: UnaryOp, operand: Expr) -> Self {
        Expr::Unary {
            op,
            operand: Box::new(operand),
        }
    }

    /// A list literal `[a, b, c]`.
    pub fn list(values: impl IntoIterator<Item = Expr>) -> Self {
        Expr::Array(
            values
                .into_iter()
                .map(|value| ArrayItem {
                    key: None,
                    value,
                    unpack: false,
                })
                .collect(),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrayItem {
    pub key: Option<Expr>,
    pub value: Expr,
    /// `...$other`
    pub unpack: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UseKind {
    Class,
    Function,
    Constant,
}

/// One `use` import in effect for a declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UseDecl {
    pub kind: UseKind,
    pub name: String,
    pub alias: Option<String>,
}

impl UseDecl {
    pub fn class(name: impl Into<String>) -> Self {
        Self {
            kind: UseKind::Class,
            name: name.into(),
            alias: None,
        }
    }

    #[must_use]
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }
}

/// Source position of a declaration (1-based lines).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Position {
    pub line: u32,
    pub end_line: u32,
    pub column: Option<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassDecl {
    /// `None` for anonymous classes, which are identified by `position`.
    pub name: Option<String>,
    pub kind: ClassKind,
    pub namespace: Option<String>,
    pub uses: Vec<UseDecl>,
    pub position: Position,
    pub doc_comment: Option<String>,
    pub is_abstract: bool,
    pub is_final: bool,
    pub is_readonly: bool,
    /// The parent class, or every extended interface for interfaces.
    pub extends: Vec<String>,
    pub implements: Vec<String>,
    pub trait_uses: Vec<TraitUseDecl>,
    pub enum_backing: Option<TypeExpr>,
    pub constants: Vec<ClassConstantDecl>,
    pub cases: Vec<EnumCaseDecl>,
    pub properties: Vec<PropertyDecl>,
    pub methods: Vec<MethodDecl>,
}

impl ClassDecl {
    pub fn new(kind: ClassKind, name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            kind,
            namespace: None,
            uses: Vec::new(),
            position: Position::default(),
            doc_comment: None,
            is_abstract: false,
            is_final: false,
            is_readonly: false,
            extends: Vec::new(),
            implements: Vec::new(),
            trait_uses: Vec::new(),
            enum_backing: None,
            constants: Vec::new(),
            cases: Vec::new(),
            properties: Vec::new(),
            methods: Vec::new(),
        }
    }

    pub fn class(name: impl Into<String>) -> Self {
        Self::new(ClassKind::Class, name)
    }

    pub fn interface(name: impl Into<String>) -> Self {
        Self::new(ClassKind::Interface, name)
    }

    pub fn trait_(name: impl Into<String>) -> Self {
        Self::new(ClassKind::Trait, name)
    }

    pub fn enum_(name: impl Into<String>) -> Self {
        Self::new(ClassKind::Enum, name)
    }

    pub fn anonymous(position: Position) -> Self {
        Self {
            name: None,
            position,
            ..Self::class("")
        }
    }

    #[must_use]
    pub fn in_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    #[must_use]
    pub fn with_use(mut self, import: UseDecl) -> Self {
        self.uses.push(import);
        self
    }

    #[must_use]
    pub fn with_doc(mut self, doc: impl Into<String>) -> Self {
        self.doc_comment = Some(doc.into());
        self
    }

    #[must_use]
    pub fn abstract_(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    #[must_use]
    pub fn extends(mut self, name: impl Into<String>) -> Self {
        self.extends.push(name.into());
        self
    }

    #[must_use]
    pub fn implements(mut self, name: impl Into<String>) -> Self {
        self.implements.push(name.into());
        self
    }

    #[must_use]
    pub fn uses_trait(mut self, trait_use: TraitUseDecl) -> Self {
        self.trait_uses.push(trait_use);
        self
    }

    #[must_use]
    pub fn backed_by(mut self, ty: TypeExpr) -> Self {
        self.enum_backing = Some(ty);
        self
    }

    #[must_use]
    pub fn with_constant(mut self, constant: ClassConstantDecl) -> Self {
        self.constants.push(constant);
        self
    }

    #[must_use]
    pub fn with_case(mut self, case: EnumCaseDecl) -> Self {
        self.cases.push(case);
        self
    }

    #[must_use]
    pub fn with_property(mut self, property: PropertyDecl) -> Self {
        self.properties.push(property);
        self
    }

    #[must_use]
    pub fn with_method(mut self, method: MethodDecl) -> Self {
        self.methods.push(method);
        self
    }

    /// The fully qualified declared name, if any.
    pub fn qualified_name(&self) -> Option<String> {
        let name = self.name.as_deref()?;
        Some(qualify(self.namespace.as_deref(), name))
    }
}

pub(crate) fn qualify(namespace: Option<&str>, name: &str) -> String {
    let name = name.strip_prefix('\\').unwrap_or(name);
    match namespace.map(|ns| ns.trim_matches('\\')) {
        Some(ns) if !ns.is_empty() => format!("{ns}\\{name}"),
        _ => name.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraitUseDecl {
    pub traits: Vec<String>,
    pub adaptations: Vec<AdaptationDecl>,
}

impl TraitUseDecl {
    pub fn new(traits: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            traits: traits.into_iter().map(Into::into).collect(),
            adaptations: Vec::new(),
        }
    }

    #[must_use]
    pub fn with(mut self, adaptation: AdaptationDecl) -> Self {
        self.adaptations.push(adaptation);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdaptationDecl {
    /// `A::m insteadof B, C;`
    Precedence {
        trait_name: String,
        method: String,
        instead_of: Vec<String>,
    },
    /// `A::m as protected n;`, `m as n;` or `m as private;`
    Alias {
        trait_name: Option<String>,
        method: String,
        alias: Option<String>,
        visibility: Option<Visibility>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassConstantDecl {
    pub name: String,
    pub visibility: Visibility,
    pub is_final: bool,
    pub native_type: Option<TypeExpr>,
    pub value: Expr,
    pub doc_comment: Option<String>,
    pub position: Position,
}

impl ClassConstantDecl {
    pub fn new(name: impl Into<String>, value: Expr) -> Self {
        Self {
            name: name.into(),
            visibility: Visibility::Public,
            is_final: false,
            native_type: None,
            value,
            doc_comment: None,
            position: Position::default(),
        }
    }

    #[must_use]
    pub fn visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    #[must_use]
    pub fn with_doc(mut self, doc: impl Into<String>) -> Self {
        self.doc_comment = Some(doc.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumCaseDecl {
    pub name: String,
    pub value: Option<Expr>,
    pub doc_comment: Option<String>,
    pub position: Position,
}

impl EnumCaseDecl {
    pub fn new(name: impl Into<String>, value: Option<Expr>) -> Self {
        Self {
            name: name.into(),
            value,
            doc_comment: None,
            position: Position::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PropertyDecl {
    pub name: String,
    pub visibility: Visibility,
    pub is_static: bool,
    pub is_readonly: bool,
    pub native_type: Option<TypeExpr>,
    pub default: Option<Expr>,
    pub doc_comment: Option<String>,
    pub position: Position,
}

impl PropertyDecl {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            visibility: Visibility::Public,
            is_static: false,
            is_readonly: false,
            native_type: None,
            default: None,
            doc_comment: None,
            position: Position::default(),
        }
    }

    #[must_use]
    pub fn visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    #[must_use]
    pub fn typed(mut self, ty: TypeExpr) -> Self {
        self.native_type = Some(ty);
        self
    }

    #[must_use]
    pub fn default_value(mut self, value: Expr) -> Self {
        self.default = Some(value);
        self
    }

    #[must_use]
    pub fn with_doc(mut self, doc: impl Into<String>) -> Self {
        self.doc_comment = Some(doc.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParamDecl {
    pub name: String,
    pub native_type: Option<TypeExpr>,
    pub default: Option<Expr>,
    pub by_ref: bool,
    pub variadic: bool,
    /// Constructor promotion (`public function __construct(private int $x)`).
    pub promoted: Option<Visibility>,
}

impl ParamDecl {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            native_type: None,
            default: None,
            by_ref: false,
            variadic: false,
            promoted: None,
        }
    }

    #[must_use]
    pub fn typed(mut self, ty: TypeExpr) -> Self {
        self.native_type = Some(ty);
        self
    }

    #[must_use]
    pub fn default_value(mut self, value: Expr) -> Self {
        self.default = Some(value);
        self
    }

    #[must_use]
    pub fn promoted(mut self, visibility: Visibility) -> Self {
        self.promoted = Some(visibility);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MethodDecl {
    pub name: String,
    pub visibility: Visibility,
    pub is_static: bool,
    pub is_abstract: bool,
    pub is_final: bool,
    pub params: Vec<ParamDecl>,
    pub return_type: Option<TypeExpr>,
    /// The return type is provisional (it is expected to change in a later version).
    pub tentative_return: bool,
    pub doc_comment: Option<String>,
    pub position: Position,
}

impl MethodDecl {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            visibility: Visibility::Public,
            is_static: false,
            is_abstract: false,
            is_final: false,
            params: Vec::new(),
            return_type: None,
            tentative_return: false,
            doc_comment: None,
            position: Position::default(),
        }
    }

    #[must_use]
    pub fn visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    #[must_use]
    pub fn static_(mut self) -> Self {
        self.is_static = true;
        self
    }

    #[must_use]
    pub fn abstract_(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    #[must_use]
    pub fn param(mut self, param: ParamDecl) -> Self {
        self.params.push(param);
        self
    }

    #[must_use]
    pub fn returns(mut self, ty: TypeExpr) -> Self {
        self.return_type = Some(ty);
        self
    }

    #[must_use]
    pub fn returns_tentatively(mut self, ty: TypeExpr) -> Self {
        self.return_type = Some(ty);
        self.tentative_return = true;
        self
    }

    #[must_use]
    pub fn with_doc(mut self, doc: impl Into<String>) -> Self {
        self.doc_comment = Some(doc.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
    /// `None` for closures and arrow functions, identified by `position`.
    pub name: Option<String>,
    pub namespace: Option<String>,
    pub uses: Vec<UseDecl>,
    pub position: Position,
    pub doc_comment: Option<String>,
    pub params: Vec<ParamDecl>,
    pub return_type: Option<TypeExpr>,
    pub by_ref_return: bool,
}

impl FunctionDecl {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            namespace: None,
            uses: Vec::new(),
            position: Position::default(),
            doc_comment: None,
            params: Vec::new(),
            return_type: None,
            by_ref_return: false,
        }
    }

    pub fn closure(position: Position) -> Self {
        Self {
            name: None,
            position,
            ..Self::new("")
        }
    }

    #[must_use]
    pub fn in_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    #[must_use]
    pub fn param(mut self, param: ParamDecl) -> Self {
        self.params.push(param);
        self
    }

    #[must_use]
    pub fn returns(mut self, ty: TypeExpr) -> Self {
        self.return_type = Some(ty);
        self
    }

    #[must_use]
    pub fn with_doc(mut self, doc: impl Into<String>) -> Self {
        self.doc_comment = Some(doc.into());
        self
    }

    pub fn qualified_name(&self) -> Option<String> {
        let name = self.name.as_deref()?;
        Some(qualify(self.namespace.as_deref(), name))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConstantDecl {
    pub name: String,
    pub namespace: Option<String>,
    pub uses: Vec<UseDecl>,
    pub value: Expr,
    pub doc_comment: Option<String>,
    pub position: Position,
}

impl ConstantDecl {
    pub fn new(name: impl Into<String>, value: Expr) -> Self {
        Self {
            name: name.into(),
            namespace: None,
            uses: Vec::new(),
            value,
            doc_comment: None,
            position: Position::default(),
        }
    }

    #[must_use]
    pub fn in_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    #[must_use]
    pub fn with_doc(mut self, doc: impl Into<String>) -> Self {
        self.doc_comment = Some(doc.into());
        self
    }

    pub fn qualified_name(&self) -> String {
        qualify(self.namespace.as_deref(), &self.name)
    }
}
