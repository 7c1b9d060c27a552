use std::sync::Arc;

use pretty_assertions::assert_eq;
use prism_core::{FunctionLikeId, TemplateSite};
use prism_reflect::keys;
use prism_reflect::{
    ClassConstantDecl, ClassDecl, ConstValue, DocAliasImport, DocBlock, DocTemplate, EnumCaseDecl, Expr,
    FunctionDecl, MethodDecl, Name, ParamDecl, Type, TypeContext, TypeExpr, TypedMap,
};

use super::fixture::Fixture;

fn returns(fixture: &Fixture, doc: &str, ty: TypeExpr) {
    fixture.docs.insert(
        doc,
        DocBlock {
            returns: Some(ty),
            ..DocBlock::default()
        },
    );
}

fn method_type(record: &TypedMap, name: &str) -> Option<Type> {
    record.value::<keys::Methods>()[&Name::new(name)]
        .value::<keys::TypeInfo>()
        .annotated
}

#[test]
fn custom_resolvers_run_in_registration_order() {
    let fixture = Fixture::new();
    returns(&fixture, "/** @return money */", TypeExpr::named("money"));
    returns(&fixture, "/** @return cents */", TypeExpr::named("cents"));
    fixture.workspace.add_class(
        ClassDecl::class("Wallet")
            .with_method(MethodDecl::new("balance").with_doc("/** @return money */"))
            .with_method(MethodDecl::new("pennies").with_doc("/** @return cents */")),
    );

    let reflector = fixture
        .builder()
        .with_custom_type_resolver(Arc::new(|name: &str, _: &[Type], _: &TypeContext| {
            (name == "money").then_some(Type::Int)
        }))
        .with_custom_type_resolver(Arc::new(|name: &str, _: &[Type], _: &TypeContext| match name {
            "money" => Some(Type::Float),
            "cents" => Some(Type::Int),
            _ => None,
        }))
        .build()
        .unwrap();

    let wallet = reflector.reflect_class("Wallet").unwrap();
    assert_eq!(method_type(&wallet, "balance"), Some(Type::Int));
    assert_eq!(method_type(&wallet, "pennies"), Some(Type::Int));
}

#[test]
fn type_aliases_expand_locally_and_through_imports() {
    let fixture = Fixture::new();
    fixture.docs.insert(
        "/** @type Row */",
        DocBlock {
            aliases: vec![(
                "Row".to_string(),
                TypeExpr::generic("array", vec![TypeExpr::named("string"), TypeExpr::named("int")]),
            )],
            ..DocBlock::default()
        },
    );
    fixture.docs.insert(
        "/** @import-type Row */",
        DocBlock {
            imported_aliases: vec![DocAliasImport {
                name: "Row".to_string(),
                from: "Table".to_string(),
                alias: Some("TableRow".to_string()),
            }],
            ..DocBlock::default()
        },
    );
    returns(&fixture, "/** @return Row */", TypeExpr::named("Row"));
    returns(&fixture, "/** @return TableRow */", TypeExpr::named("TableRow"));
    fixture.workspace.add_class(
        ClassDecl::class("Table")
            .with_doc("/** @type Row */")
            .with_method(MethodDecl::new("first").with_doc("/** @return Row */")),
    );
    fixture.workspace.add_class(
        ClassDecl::class("Report")
            .with_doc("/** @import-type Row */")
            .with_method(MethodDecl::new("top").with_doc("/** @return TableRow */")),
    );
    let reflector = fixture.reflector();

    let row = Type::array(Type::String, Type::Int);
    let table = reflector.reflect_class("Table").unwrap();
    assert_eq!(method_type(&table, "first"), Some(row.clone()));
    assert_eq!(table.value::<keys::Aliases>()[&Name::new("Row")], row);

    let report = reflector.reflect_class("Report").unwrap();
    assert_eq!(method_type(&report, "top"), Some(row));
    assert!(report.get::<keys::Diagnostics>().is_none());
}

#[test]
fn imports_from_unknown_classes_are_diagnosed() {
    let fixture = Fixture::new();
    fixture.docs.insert(
        "/** @import-type Row */",
        DocBlock {
            imported_aliases: vec![DocAliasImport {
                name: "Row".to_string(),
                from: "Nowhere".to_string(),
                alias: None,
            }],
            ..DocBlock::default()
        },
    );
    returns(&fixture, "/** @return Row */", TypeExpr::named("Row"));
    fixture.workspace.add_class(
        ClassDecl::class("Report")
            .with_doc("/** @import-type Row */")
            .with_method(MethodDecl::new("top").with_doc("/** @return Row */")),
    );
    let reflector = fixture.reflector();

    let report = reflector.reflect_class("Report").unwrap();
    let codes: Vec<String> = report
        .value::<keys::Diagnostics>()
        .into_iter()
        .map(|diagnostic| diagnostic.code)
        .collect();
    assert!(codes.iter().all(|code| code == "unresolved-alias"), "{codes:?}");
    assert!(!codes.is_empty());
}

#[test]
fn function_templates_are_bound_to_their_function() {
    let fixture = Fixture::new();
    fixture.docs.insert(
        "/** @template T of object */",
        DocBlock {
            templates: vec![DocTemplate::new("T").bounded(TypeExpr::named("object"))],
            params: vec![("value".to_string(), TypeExpr::named("T"))],
            returns: Some(TypeExpr::generic("list", vec![TypeExpr::named("T")])),
            ..DocBlock::default()
        },
    );
    fixture.workspace.add_function(
        FunctionDecl::new("wrap")
            .in_namespace("App")
            .param(ParamDecl::new("value"))
            .returns(TypeExpr::named("array"))
            .with_doc("/** @template T of object */"),
    );
    let reflector = fixture.reflector();

    let wrap = reflector.reflect_function("App\\wrap").unwrap();
    let template = Type::Template {
        name: Name::new("T"),
        site: TemplateSite::Function(FunctionLikeId::named("App\\wrap")),
    };
    assert_eq!(
        wrap.value::<keys::TypeInfo>().annotated,
        Some(Type::list(template.clone()))
    );
    let value = wrap.value::<keys::Parameters>()[&Name::new("value")].value::<keys::TypeInfo>();
    assert_eq!(value.annotated, Some(template));
    assert_eq!(
        wrap.value::<keys::Templates>()[&Name::new("T")].bound,
        Some(Type::Object)
    );
}

#[test]
fn enum_cases_are_class_constants() {
    let fixture = Fixture::new();
    fixture.workspace.add_class(
        ClassDecl::enum_("Suit")
            .backed_by(TypeExpr::named("string"))
            .with_case(EnumCaseDecl::new("Hearts", Some(Expr::string("H"))))
            .with_case(EnumCaseDecl::new("Spades", Some(Expr::string("S"))))
            .with_constant(ClassConstantDecl::new("DEFAULT", Expr::class_constant("self", "Hearts"))),
    );
    let reflector = fixture.reflector();

    let suit = reflector.reflect_class("Suit").unwrap();
    assert_eq!(suit.get::<keys::BackingType>(), Some(&Type::String));

    let constants = suit.value::<keys::Constants>();
    let hearts = &constants[&Name::new("Hearts")];
    assert_eq!(
        hearts.value::<keys::EnumCase>().backing,
        Some(ConstValue::String("H".to_string()))
    );
    let case = ConstValue::EnumCase {
        class: Name::new("Suit"),
        name: Name::new("Hearts"),
    };
    assert_eq!(hearts.get::<keys::Value>(), Some(&case));
    assert_eq!(constants[&Name::new("DEFAULT")].get::<keys::Value>(), Some(&case));
    assert_eq!(
        constants[&Name::new("DEFAULT")].value::<keys::TypeInfo>().inferred,
        Some(Type::ClassConstant {
            class: Name::new("Suit"),
            name: Name::new("Hearts"),
        })
    );
}

#[test]
fn unions_are_normalized() {
    let fixture = Fixture::new();
    fixture.docs.insert(
        "/** @param int|null|int $id @return mixed|string */",
        DocBlock {
            params: vec![(
                "id".to_string(),
                TypeExpr::Union(vec![
                    TypeExpr::named("int"),
                    TypeExpr::named("null"),
                    TypeExpr::named("int"),
                ]),
            )],
            returns: Some(TypeExpr::Union(vec![TypeExpr::named("mixed"), TypeExpr::named("string")])),
            ..DocBlock::default()
        },
    );
    fixture.workspace.add_function(
        FunctionDecl::new("lookup")
            .param(ParamDecl::new("id"))
            .with_doc("/** @param int|null|int $id @return mixed|string */"),
    );
    let reflector = fixture.reflector();

    let lookup = reflector.reflect_function("lookup").unwrap();
    assert_eq!(lookup.value::<keys::TypeInfo>().annotated, Some(Type::Mixed));
    let id = lookup.value::<keys::Parameters>()[&Name::new("id")].value::<keys::TypeInfo>();
    assert_eq!(id.annotated, Some(Type::Union(vec![Type::Int, Type::Null])));
}

#[test]
fn generic_iterables_stay_iterables() {
    let fixture = Fixture::new();
    returns(&fixture, "/** @return iterable<int> */", TypeExpr::generic("iterable", vec![TypeExpr::named("int")]));
    fixture.workspace.add_class(
        ClassDecl::class("Repo")
            .in_namespace("App")
            .with_method(MethodDecl::new("ids").with_doc("/** @return iterable<int> */")),
    );
    let reflector = fixture.reflector();

    let repo = reflector.reflect_class("App\\Repo").unwrap();
    let ids = method_type(&repo, "ids").unwrap();
    assert_eq!(
        ids,
        Type::Union(vec![
            Type::array(Type::ArrayKey, Type::Int),
            Type::named("Traversable", vec![Type::Mixed, Type::Int]),
        ])
    );
    assert_eq!(ids.to_string(), "array<array-key, int>|Traversable<mixed, int>");
}
