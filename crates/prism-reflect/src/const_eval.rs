//! Evaluation of constant expressions.
//!
//! Covers what the language allows in constant, property and parameter default
//! initializers: literals, arrays, references to other constants and the usual
//! operators. Evaluation never runs user code.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::Path;

use indexmap::IndexMap;
use prism_core::Name;
use prism_types::{Type, TypeRewriter, UnionNormalizer};
use serde::{Deserialize, Serialize};

use crate::context::TypeContext;
use crate::decl::{ArrayItem, BinaryOp, Expr, UnaryOp};
use crate::error::{ReflectError, Result};
use crate::keys;
use crate::record::TypedMap;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArrayKey {
    Int(i64),
    String(String),
}

/// The value of a constant expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConstValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    /// Entries in insertion order.
    Array(Vec<(ArrayKey, ConstValue)>),
    EnumCase { class: Name, name: Name },
}

impl ConstValue {
    /// The most precise type describing this value.
    pub fn inferred_type(&self) -> Type {
        match self {
            ConstValue::Null => Type::Null,
            ConstValue::Bool(value) => Type::bool_literal(*value),
            ConstValue::Int(value) => Type::int_literal(*value),
            ConstValue::Float(_) => Type::Float,
            ConstValue::String(value) => Type::string_literal(value.clone()),
            ConstValue::EnumCase { class, name } => Type::ClassConstant {
                class: class.clone(),
                name: name.clone(),
            },
            ConstValue::Array(entries) if entries.is_empty() => Type::array(Type::Never, Type::Never),
            ConstValue::Array(entries) => {
                let values = union_of(entries.iter().map(|(_, value)| value.inferred_type()));
                let sequential = entries
                    .iter()
                    .enumerate()
                    .all(|(idx, (key, _))| *key == ArrayKey::Int(idx as i64));
                if sequential {
                    return Type::list(values);
                }
                let keys = union_of(entries.iter().map(|(key, _)| match key {
                    ArrayKey::Int(value) => Type::int_literal(*value),
                    ArrayKey::String(value) => Type::string_literal(value.clone()),
                }));
                Type::array(keys, values)
            }
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            ConstValue::Null => false,
            ConstValue::Bool(value) => *value,
            ConstValue::Int(value) => *value != 0,
            ConstValue::Float(value) => *value != 0.0,
            ConstValue::String(value) => !(value.is_empty() || value == "0"),
            ConstValue::Array(entries) => !entries.is_empty(),
            ConstValue::EnumCase { .. } => true,
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            ConstValue::Null => "null",
            ConstValue::Bool(_) => "bool",
            ConstValue::Int(_) => "int",
            ConstValue::Float(_) => "float",
            ConstValue::String(_) => "string",
            ConstValue::Array(_) => "array",
            ConstValue::EnumCase { .. } => "enum case",
        }
    }
}

fn union_of(types: impl Iterator<Item = Type>) -> Type {
    UnionNormalizer.rewrite(&Type::Union(types.collect()))
}

/// Where constant references that leave the current scope are looked up.
pub trait ConstantLookup {
    /// The value of `class::name`, or `None` when the class or constant does not exist.
    fn class_constant(&mut self, class: &Name, name: &Name) -> Result<Option<ConstValue>>;

    fn global_constant(&mut self, name: &Name) -> Result<Option<ConstValue>>;
}

/// The class whose constants are being evaluated.
///
/// Its constants are read from the unfinished record directly; reflecting the class
/// itself would be a cycle.
#[derive(Debug, Clone)]
pub struct ClassScope<'a> {
    pub class: Name,
    /// Parent, interfaces and traits, searched in order for inherited constants.
    pub ancestors: Vec<Name>,
    pub constants: &'a IndexMap<Name, TypedMap>,
}

impl ClassScope<'_> {
    /// Declared parent, interfaces and traits of a class record, in that order.
    pub fn declared_ancestors(record: &TypedMap) -> Vec<Name> {
        let parent = record.get::<keys::DeclaredParent>().map(|parent| parent.class.clone());
        parent
            .into_iter()
            .chain(
                record
                    .value::<keys::DeclaredInterfaces>()
                    .into_iter()
                    .chain(record.value::<keys::DeclaredTraits>())
                    .map(|ancestor| ancestor.class),
            )
            .collect()
    }
}

pub struct ConstEvaluator<'a> {
    context: &'a TypeContext,
    lookup: &'a mut dyn ConstantLookup,
    scope: Option<ClassScope<'a>>,
    file: Option<&'a Path>,
    memo: HashMap<Name, ConstValue>,
    in_progress: Vec<Name>,
}

impl<'a> ConstEvaluator<'a> {
    pub fn new(context: &'a TypeContext, lookup: &'a mut dyn ConstantLookup) -> Self {
        Self {
            context,
            lookup,
            scope: None,
            file: None,
            memo: HashMap::new(),
            in_progress: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_class_scope(mut self, scope: ClassScope<'a>) -> Self {
        self.scope = Some(scope);
        self
    }

    /// The file the expressions come from, for `__FILE__` and `__DIR__`.
    #[must_use]
    pub fn in_file(mut self, file: Option<&'a Path>) -> Self {
        self.file = file;
        self
    }

    pub fn evaluate(&mut self, expr: &Expr) -> Result<ConstValue> {
        match expr {
            Expr::Null => Ok(ConstValue::Null),
            Expr::Bool(value) => Ok(ConstValue::Bool(*value)),
            Expr::Int(value) => Ok(ConstValue::Int(*value)),
            Expr::Float(value) => Ok(ConstValue::Float(*value)),
            Expr::String(value) => Ok(ConstValue::String(value.clone())),
            Expr::Array(items) => self.array(items),
            Expr::Constant(name) => self.constant(name),
            Expr::ClassConstant { class, name } => self.class_constant(class, name),
            Expr::Unary { op, operand } => {
                let operand = self.evaluate(operand)?;
                unary(*op, operand)
            }
            Expr::Binary { op, left, right } => self.binary(*op, left, right),
            Expr::Ternary {
                condition,
                then,
                otherwise,
            } => {
                let condition = self.evaluate(condition)?;
                match (condition.is_truthy(), then) {
                    (true, Some(then)) => self.evaluate(then),
                    (true, None) => Ok(condition),
                    (false, _) => self.evaluate(otherwise),
                }
            }
        }
    }

    /// Evaluate the constant `name` of the class in scope, memoized.
    pub fn scoped_constant(&mut self, name: &Name) -> Result<ConstValue> {
        if let Some(value) = self.memo.get(name) {
            return Ok(value.clone());
        }
        let Some(scope) = self.scope.clone() else {
            return Err(ReflectError::constant(format!(
                "`self::{name}` used outside of a class"
            )));
        };

        if let Some(record) = scope.constants.get(name) {
            if let Some(value) = record.get::<keys::Value>() {
                return Ok(value.clone());
            }
            if record.contains::<keys::EnumCase>() {
                return Ok(ConstValue::EnumCase {
                    class: scope.class.clone(),
                    name: name.clone(),
                });
            }
            if self.in_progress.contains(name) {
                let mut chain: Vec<_> = self.in_progress.iter().map(Name::to_string).collect();
                chain.push(name.to_string());
                return Err(ReflectError::constant(format!(
                    "circular reference in {}: {}",
                    scope.class,
                    chain.join(" -> ")
                )));
            }
            let expr = record.require::<keys::DefaultExpr>()?.clone();
            self.in_progress.push(name.clone());
            let value = self.evaluate(&expr);
            self.in_progress.pop();
            let value = value?;
            self.memo.insert(name.clone(), value.clone());
            return Ok(value);
        }

        for ancestor in &scope.ancestors {
            if let Some(value) = self.lookup.class_constant(ancestor, name)? {
                return Ok(value);
            }
        }
        Err(undefined(format!("{}::{name}", scope.class)))
    }

    fn array(&mut self, items: &[ArrayItem]) -> Result<ConstValue> {
        let mut builder = ArrayBuilder::default();
        for item in items {
            let value = self.evaluate(&item.value)?;
            if item.unpack {
                let ConstValue::Array(entries) = value else {
                    return Err(ReflectError::constant(format!(
                        "only arrays can be unpacked, found {}",
                        value.type_name()
                    )));
                };
                for (key, value) in entries {
                    match key {
                        ArrayKey::Int(_) => builder.push(value),
                        key @ ArrayKey::String(_) => builder.insert(key, value),
                    }
                }
                continue;
            }
            match &item.key {
                Some(key) => {
                    let key = array_key(self.evaluate(key)?)?;
                    builder.insert(key, value);
                }
                None => builder.push(value),
            }
        }
        Ok(ConstValue::Array(builder.entries))
    }

    fn constant(&mut self, reference: &str) -> Result<ConstValue> {
        let reference = reference.trim();
        let bare = reference.strip_prefix('\\').unwrap_or(reference);
        if !bare.contains('\\') {
            match bare.to_ascii_lowercase().as_str() {
                "true" => return Ok(ConstValue::Bool(true)),
                "false" => return Ok(ConstValue::Bool(false)),
                "null" => return Ok(ConstValue::Null),
                _ => {}
            }
            if let Some(value) = self.magic_constant(bare)? {
                return Ok(value);
            }
        }

        let (name, _) = self.context.resolve_constant(reference);
        if let Some(value) = self.lookup.global_constant(&name)? {
            return Ok(value);
        }
        let fallback = self.context.global_fallback(reference);
        if let Some(global) = &fallback {
            if let Some(value) = self.lookup.global_constant(global)? {
                return Ok(value);
            }
        }
        let global = fallback.unwrap_or(name);
        builtin_constant(global.as_str()).ok_or_else(|| undefined(global.to_string()))
    }

    fn magic_constant(&self, name: &str) -> Result<Option<ConstValue>> {
        let value = match name {
            "__CLASS__" => ConstValue::String(
                self.context
                    .current_class()
                    .map(Name::to_string)
                    .unwrap_or_default(),
            ),
            "__NAMESPACE__" => ConstValue::String(self.context.namespace().to_string()),
            "__FILE__" | "__DIR__" => {
                let file = self.file.ok_or_else(|| {
                    ReflectError::constant(format!("{name} is unknown for in-memory sources"))
                })?;
                let path = if name == "__DIR__" {
                    file.parent().unwrap_or(file)
                } else {
                    file
                };
                ConstValue::String(path.display().to_string())
            }
            _ => return Ok(None),
        };
        Ok(Some(value))
    }

    fn class_constant(&mut self, class: &str, member: &str) -> Result<ConstValue> {
        let written = class.trim();
        let is_self = written.eq_ignore_ascii_case("self") || written.eq_ignore_ascii_case("static");
        let target = match &self.scope {
            Some(scope) if is_self => scope.class.clone(),
            _ => self.context.resolve_class_name(class),
        };
        if member.eq_ignore_ascii_case("class") {
            return Ok(ConstValue::String(target.to_string()));
        }
        let member = Name::new(member);
        let is_parent = written.eq_ignore_ascii_case("parent");
        let in_scope = self
            .scope
            .as_ref()
            .is_some_and(|scope| !is_parent && target.eq_ignore_case(&scope.class));
        if in_scope {
            return self.scoped_constant(&member);
        }
        self.lookup
            .class_constant(&target, &member)?
            .ok_or_else(|| undefined(format!("{target}::{member}")))
    }

    fn binary(&mut self, op: BinaryOp, left: &Expr, right: &Expr) -> Result<ConstValue> {
        match op {
            BinaryOp::And => {
                let left = self.evaluate(left)?.is_truthy();
                Ok(ConstValue::Bool(left && self.evaluate(right)?.is_truthy()))
            }
            BinaryOp::Or => {
                let left = self.evaluate(left)?.is_truthy();
                Ok(ConstValue::Bool(left || self.evaluate(right)?.is_truthy()))
            }
            BinaryOp::Coalesce => {
                let left = self.evaluate(left)?;
                if left != ConstValue::Null {
                    return Ok(left);
                }
                self.evaluate(right)
            }
            _ => {
                let left = self.evaluate(left)?;
                let right = self.evaluate(right)?;
                strict_binary(op, left, right)
            }
        }
    }
}

/// Operators that always evaluate both operands.
fn strict_binary(op: BinaryOp, left: ConstValue, right: ConstValue) -> Result<ConstValue> {
    match op {
        BinaryOp::Add => add(left, right),
        BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Pow => {
            arithmetic(op, &left, &right)
        }
        BinaryOp::Mod => {
            let divisor = to_int(&right)?;
            if divisor == 0 {
                return Err(ReflectError::constant("modulo by zero"));
            }
            Ok(ConstValue::Int(to_int(&left)?.wrapping_rem(divisor)))
        }
        BinaryOp::Concat => Ok(ConstValue::String(format!(
            "{}{}",
            to_string(&left)?,
            to_string(&right)?
        ))),
        BinaryOp::Eq => Ok(ConstValue::Bool(loose_eq(&left, &right))),
        BinaryOp::NotEq => Ok(ConstValue::Bool(!loose_eq(&left, &right))),
        BinaryOp::Identical => Ok(ConstValue::Bool(left == right)),
        BinaryOp::NotIdentical => Ok(ConstValue::Bool(left != right)),
        BinaryOp::Lt => Ok(ConstValue::Bool(compare(&left, &right)? == Ordering::Less)),
        BinaryOp::LtEq => Ok(ConstValue::Bool(compare(&left, &right)? != Ordering::Greater)),
        BinaryOp::Gt => Ok(ConstValue::Bool(compare(&left, &right)? == Ordering::Greater)),
        BinaryOp::GtEq => Ok(ConstValue::Bool(compare(&left, &right)? != Ordering::Less)),
        BinaryOp::Spaceship => Ok(ConstValue::Int(match compare(&left, &right)? {
            Ordering::Less => -1,
            Ordering::Equal => 0,
            Ordering::Greater => 1,
        })),
        BinaryOp::Xor => Ok(ConstValue::Bool(left.is_truthy() ^ right.is_truthy())),
        BinaryOp::BitAnd => Ok(ConstValue::Int(to_int(&left)? & to_int(&right)?)),
        BinaryOp::BitOr => Ok(ConstValue::Int(to_int(&left)? | to_int(&right)?)),
        BinaryOp::BitXor => Ok(ConstValue::Int(to_int(&left)? ^ to_int(&right)?)),
        BinaryOp::ShiftLeft | BinaryOp::ShiftRight => shift(op, to_int(&left)?, to_int(&right)?),
        BinaryOp::And | BinaryOp::Or | BinaryOp::Coalesce => Err(ReflectError::constant(format!(
            "{op:?} must be evaluated lazily"
        ))),
    }
}

fn undefined(name: String) -> ReflectError {
    ReflectError::constant(format!("undefined constant {name}"))
}

fn builtin_constant(name: &str) -> Option<ConstValue> {
    let value = match name {
        "PHP_EOL" => ConstValue::String("\n".to_string()),
        "PHP_INT_MAX" => ConstValue::Int(i64::MAX),
        "PHP_INT_MIN" => ConstValue::Int(i64::MIN),
        "PHP_INT_SIZE" => ConstValue::Int(8),
        "PHP_FLOAT_EPSILON" => ConstValue::Float(f64::EPSILON),
        "PHP_FLOAT_MAX" => ConstValue::Float(f64::MAX),
        "M_PI" => ConstValue::Float(std::f64::consts::PI),
        "NAN" => ConstValue::Float(f64::NAN),
        "INF" => ConstValue::Float(f64::INFINITY),
        _ => return None,
    };
    Some(value)
}

#[derive(Default)]
struct ArrayBuilder {
    entries: Vec<(ArrayKey, ConstValue)>,
    next_index: i64,
}

impl ArrayBuilder {
    fn push(&mut self, value: ConstValue) {
        let key = ArrayKey::Int(self.next_index);
        self.insert(key, value);
    }

    fn insert(&mut self, key: ArrayKey, value: ConstValue) {
        if let ArrayKey::Int(index) = key {
            self.next_index = self.next_index.max(index.saturating_add(1));
        }
        match self.entries.iter_mut().find(|(existing, _)| *existing == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }
}

fn array_key(value: ConstValue) -> Result<ArrayKey> {
    match value {
        ConstValue::Int(value) => Ok(ArrayKey::Int(value)),
        ConstValue::Bool(value) => Ok(ArrayKey::Int(i64::from(value))),
        ConstValue::Float(value) => Ok(ArrayKey::Int(value.trunc() as i64)),
        ConstValue::Null => Ok(ArrayKey::String(String::new())),
        ConstValue::String(value) => Ok(match canonical_int(&value) {
            Some(index) => ArrayKey::Int(index),
            None => ArrayKey::String(value),
        }),
        other => Err(ReflectError::constant(format!(
            "illegal array key type {}",
            other.type_name()
        ))),
    }
}

/// Strings like `"12"` are integer keys; `"012"` and `"1.0"` are not.
fn canonical_int(text: &str) -> Option<i64> {
    let value: i64 = text.parse().ok()?;
    (value.to_string() == text).then_some(value)
}

#[derive(Debug, Clone, Copy)]
enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    fn as_f64(self) -> f64 {
        match self {
            Number::Int(value) => value as f64,
            Number::Float(value) => value,
        }
    }

    fn into_value(self) -> ConstValue {
        match self {
            Number::Int(value) => ConstValue::Int(value),
            Number::Float(value) => ConstValue::Float(value),
        }
    }
}

fn numeric_string(text: &str) -> Option<Number> {
    let text = text.trim();
    if let Ok(value) = text.parse::<i64>() {
        return Some(Number::Int(value));
    }
    // Rust accepts "inf" and "nan"; the language does not.
    if text.chars().any(|c| c.is_ascii_alphabetic() && c != 'e' && c != 'E') {
        return None;
    }
    text.parse::<f64>().ok().map(Number::Float)
}

fn to_number(value: &ConstValue) -> Result<Number> {
    match value {
        ConstValue::Null => Ok(Number::Int(0)),
        ConstValue::Bool(value) => Ok(Number::Int(i64::from(*value))),
        ConstValue::Int(value) => Ok(Number::Int(*value)),
        ConstValue::Float(value) => Ok(Number::Float(*value)),
        ConstValue::String(text) => numeric_string(text).ok_or_else(|| {
            ReflectError::constant(format!("non-numeric string \"{text}\" in arithmetic"))
        }),
        other => Err(ReflectError::constant(format!(
            "unsupported operand type {}",
            other.type_name()
        ))),
    }
}

fn to_int(value: &ConstValue) -> Result<i64> {
    Ok(match to_number(value)? {
        Number::Int(value) => value,
        Number::Float(value) => value.trunc() as i64,
    })
}

fn to_string(value: &ConstValue) -> Result<String> {
    match value {
        ConstValue::Null => Ok(String::new()),
        ConstValue::Bool(true) => Ok("1".to_string()),
        ConstValue::Bool(false) => Ok(String::new()),
        ConstValue::Int(value) => Ok(value.to_string()),
        ConstValue::Float(value) => Ok(float_to_string(*value)),
        ConstValue::String(value) => Ok(value.clone()),
        other => Err(ReflectError::constant(format!(
            "{} to string conversion",
            other.type_name()
        ))),
    }
}

fn float_to_string(value: f64) -> String {
    if value.is_nan() {
        return "NAN".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "INF" } else { "-INF" }.to_string();
    }
    if value.fract() == 0.0 && value.abs() < 1e15 {
        return format!("{}", value as i64);
    }
    format!("{value}")
}

fn unary(op: UnaryOp, operand: ConstValue) -> Result<ConstValue> {
    match op {
        UnaryOp::Not => Ok(ConstValue::Bool(!operand.is_truthy())),
        UnaryOp::Plus => Ok(to_number(&operand)?.into_value()),
        UnaryOp::Neg => Ok(match to_number(&operand)? {
            Number::Int(value) => match value.checked_neg() {
                Some(value) => ConstValue::Int(value),
                None => ConstValue::Float(-(value as f64)),
            },
            Number::Float(value) => ConstValue::Float(-value),
        }),
        UnaryOp::BitNot => Ok(ConstValue::Int(!to_int(&operand)?)),
    }
}

/// `+` on two arrays is a key union with the left side winning.
fn add(left: ConstValue, right: ConstValue) -> Result<ConstValue> {
    match (left, right) {
        (ConstValue::Array(mut entries), ConstValue::Array(others)) => {
            for (key, value) in others {
                if !entries.iter().any(|(existing, _)| *existing == key) {
                    entries.push((key, value));
                }
            }
            Ok(ConstValue::Array(entries))
        }
        (left, right) => arithmetic(BinaryOp::Add, &left, &right),
    }
}

/// Integer arithmetic that overflows falls back to floats, like the language does.
fn arithmetic(op: BinaryOp, left: &ConstValue, right: &ConstValue) -> Result<ConstValue> {
    let left = to_number(left)?;
    let right = to_number(right)?;

    if let BinaryOp::Div = op {
        if right.as_f64() == 0.0 {
            return Err(ReflectError::constant("division by zero"));
        }
        if let (Number::Int(a), Number::Int(b)) = (left, right) {
            if a.checked_rem(b) == Some(0) {
                if let Some(quotient) = a.checked_div(b) {
                    return Ok(ConstValue::Int(quotient));
                }
            }
        }
        return Ok(ConstValue::Float(left.as_f64() / right.as_f64()));
    }

    if let (Number::Int(a), Number::Int(b)) = (left, right) {
        let exact = match op {
            BinaryOp::Add => a.checked_add(b),
            BinaryOp::Sub => a.checked_sub(b),
            BinaryOp::Mul => a.checked_mul(b),
            BinaryOp::Pow => u32::try_from(b).ok().and_then(|b| a.checked_pow(b)),
            _ => None,
        };
        if let Some(value) = exact {
            return Ok(ConstValue::Int(value));
        }
    }

    let (a, b) = (left.as_f64(), right.as_f64());
    let value = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Pow => a.powf(b),
        other => {
            return Err(ReflectError::constant(format!(
                "{other:?} is not an arithmetic operator"
            )))
        }
    };
    Ok(ConstValue::Float(value))
}

fn shift(op: BinaryOp, value: i64, by: i64) -> Result<ConstValue> {
    if by < 0 {
        return Err(ReflectError::constant("bit shift by negative number"));
    }
    let shifted = match (op, u32::try_from(by)) {
        (BinaryOp::ShiftLeft, Ok(by)) if by < 64 => value << by,
        (BinaryOp::ShiftLeft, _) => 0,
        (_, Ok(by)) if by < 64 => value >> by,
        _ if value < 0 => -1,
        _ => 0,
    };
    Ok(ConstValue::Int(shifted))
}

fn loose_eq(left: &ConstValue, right: &ConstValue) -> bool {
    use ConstValue as V;
    match (left, right) {
        (V::Null, V::Null) => true,
        (V::Bool(_), _) | (_, V::Bool(_)) => left.is_truthy() == right.is_truthy(),
        (V::Null, V::String(text)) | (V::String(text), V::Null) => text.is_empty(),
        (V::Null, other) | (other, V::Null) => !other.is_truthy(),
        (V::String(a), V::String(b)) => match (numeric_string(a), numeric_string(b)) {
            (Some(a), Some(b)) => a.as_f64() == b.as_f64(),
            _ => a == b,
        },
        (V::String(text), number @ (V::Int(_) | V::Float(_)))
        | (number @ (V::Int(_) | V::Float(_)), V::String(text)) => match numeric_string(text) {
            Some(parsed) => to_number(number).is_ok_and(|n| n.as_f64() == parsed.as_f64()),
            None => to_string(number).is_ok_and(|n| n == *text),
        },
        (V::Int(a), V::Int(b)) => a == b,
        (V::Int(_) | V::Float(_), V::Int(_) | V::Float(_)) => {
            match (to_number(left), to_number(right)) {
                (Ok(a), Ok(b)) => a.as_f64() == b.as_f64(),
                _ => false,
            }
        }
        (V::Array(a), V::Array(b)) => {
            a.len() == b.len()
                && a.iter().all(|(key, value)| {
                    b.iter()
                        .any(|(other_key, other)| key == other_key && loose_eq(value, other))
                })
        }
        _ => left == right,
    }
}

fn compare(left: &ConstValue, right: &ConstValue) -> Result<Ordering> {
    use ConstValue as V;
    let ordering = match (left, right) {
        (V::EnumCase { .. }, _) | (_, V::EnumCase { .. }) => {
            return Err(ReflectError::constant("enum cases are not ordered"))
        }
        (V::Bool(_) | V::Null, _) | (_, V::Bool(_) | V::Null) => {
            left.is_truthy().cmp(&right.is_truthy())
        }
        (V::Array(a), V::Array(b)) => a.len().cmp(&b.len()),
        (V::Array(_), _) => Ordering::Greater,
        (_, V::Array(_)) => Ordering::Less,
        (V::String(a), V::String(b)) => match (numeric_string(a), numeric_string(b)) {
            (Some(a), Some(b)) => compare_numbers(a, b),
            _ => a.cmp(b),
        },
        (V::String(text), number) => match numeric_string(text) {
            Some(parsed) => compare_numbers(parsed, to_number(number)?),
            None => text.as_str().cmp(to_string(number)?.as_str()),
        },
        (number, V::String(text)) => match numeric_string(text) {
            Some(parsed) => compare_numbers(to_number(number)?, parsed),
            None => to_string(number)?.as_str().cmp(text.as_str()),
        },
        _ => compare_numbers(to_number(left)?, to_number(right)?),
    };
    Ok(ordering)
}

fn compare_numbers(left: Number, right: Number) -> Ordering {
    match (left, right) {
        (Number::Int(a), Number::Int(b)) => a.cmp(&b),
        _ => left
            .as_f64()
            .partial_cmp(&right.as_f64())
            .unwrap_or(Ordering::Equal),
    }
}
