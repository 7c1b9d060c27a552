use std::fmt;

use crate::{Literal, Type};

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Int(value) => write!(f, "{value}"),
            Literal::String(value) => write!(f, "'{}'", value.replace('\'', "\\'")),
            Literal::Bool(value) => write!(f, "{value}"),
        }
    }
}

/// Doc-comment style rendering (`list<int>`, `array<string, Foo>`, `int|null`).
impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Never => f.write_str("never"),
            Type::Void => f.write_str("void"),
            Type::Null => f.write_str("null"),
            Type::Mixed => f.write_str("mixed"),
            Type::Bool => f.write_str("bool"),
            Type::Int => f.write_str("int"),
            Type::Float => f.write_str("float"),
            Type::String => f.write_str("string"),
            Type::ArrayKey => f.write_str("array-key"),
            Type::Scalar => f.write_str("scalar"),
            Type::Object => f.write_str("object"),
            Type::Callable => f.write_str("callable"),
            Type::Iterable => f.write_str("iterable"),
            Type::Literal(literal) => fmt::Display::fmt(literal, f),
            Type::Array { key, value } => {
                if **key == Type::ArrayKey && **value == Type::Mixed {
                    f.write_str("array")
                } else {
                    write!(f, "array<{key}, {value}>")
                }
            }
            Type::List(value) => write!(f, "list<{value}>"),
            Type::Named { class, args } => write_generic(f, class.as_str(), args),
            Type::Static { args, .. } => write_generic(f, "static", args),
            Type::SelfRef { .. } => f.write_str("self"),
            Type::Template { name, .. } => f.write_str(name.as_str()),
            Type::Alias { name, args, .. } => write_generic(f, name.as_str(), args),
            Type::ClassConstant { class, name } => write!(f, "{class}::{name}"),
            Type::Constant(name) => f.write_str(name.as_str()),
            Type::Union(parts) => write_joined(f, parts, "|"),
            Type::Intersection(parts) => {
                for (idx, part) in parts.iter().enumerate() {
                    if idx > 0 {
                        f.write_str("&")?;
                    }
                    if matches!(part, Type::Union(_)) {
                        write!(f, "({part})")?;
                    } else {
                        fmt::Display::fmt(part, f)?;
                    }
                }
                Ok(())
            }
        }
    }
}

fn write_generic(f: &mut fmt::Formatter<'_>, head: &str, args: &[Type]) -> fmt::Result {
    f.write_str(head)?;
    if args.is_empty() {
        return Ok(());
    }
    f.write_str("<")?;
    write_joined(f, args, ", ")?;
    f.write_str(">")
}

fn write_joined(f: &mut fmt::Formatter<'_>, types: &[Type], sep: &str) -> fmt::Result {
    for (idx, ty) in types.iter().enumerate() {
        if idx > 0 {
            f.write_str(sep)?;
        }
        fmt::Display::fmt(ty, f)?;
    }
    Ok(())
}
