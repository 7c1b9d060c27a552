use pretty_assertions::assert_eq;
use prism_cache::ChangeDetector;
use prism_core::{ClassLikeId, FunctionLikeId, MethodId, ParameterId};
use prism_reflect::keys;
use prism_reflect::{
    BinaryOp, ClassConstantDecl, ClassDecl, ConstValue, ConstantDecl, DeclId, DocBlock, Expr,
    FileDeclarations, FunctionDecl, MethodDecl, Name, ParamDecl, Position, PropertyDecl, ReflectError,
    Type, TypeExpr, Visibility,
};

use super::fixture::Fixture;

fn repository() -> ClassDecl {
    ClassDecl::class("Repository")
        .in_namespace("App")
        .with_constant(ClassConstantDecl::new("TABLE", Expr::string("users")))
        .with_property(
            PropertyDecl::new("limit")
                .visibility(Visibility::Protected)
                .typed(TypeExpr::named("int"))
                .default_value(Expr::Int(25)),
        )
        .with_method(
            MethodDecl::new("all")
                .returns(TypeExpr::named("array"))
                .with_doc("/** @return list<User> */"),
        )
        .with_method(
            MethodDecl::new("find")
                .param(
                    ParamDecl::new("id")
                        .typed(TypeExpr::named("int"))
                        .default_value(Expr::Null),
                )
                .returns(TypeExpr::nullable(TypeExpr::named("User"))),
        )
        .with_method(MethodDecl::new("count").returns_tentatively(TypeExpr::named("int")))
}

fn fixture() -> Fixture {
    let fixture = Fixture::new();
    fixture.docs.insert(
        "/** @return list<User> */",
        DocBlock {
            returns: Some(TypeExpr::generic("list", vec![TypeExpr::named("User")])),
            ..DocBlock::default()
        },
    );
    fixture.workspace.add_class(repository());
    fixture
}

#[test]
fn class_records_combine_native_annotated_and_inferred_types() {
    let fixture = fixture();
    let reflector = fixture.reflector();

    let record = reflector.reflect_class("App\\Repository").unwrap();
    let methods = record.value::<keys::Methods>();

    let all = methods[&Name::new("all")].value::<keys::TypeInfo>();
    assert_eq!(all.native, Some(Type::array(Type::ArrayKey, Type::Mixed)));
    assert_eq!(all.annotated, Some(Type::list(Type::class("App\\User"))));
    assert_eq!(all.effective(), Some(&Type::list(Type::class("App\\User"))));

    let find = &methods[&Name::new("find")];
    assert_eq!(
        find.value::<keys::TypeInfo>().native,
        Some(Type::Union(vec![Type::class("App\\User"), Type::Null]))
    );
    let id = find.value::<keys::Parameters>()[&Name::new("id")].value::<keys::TypeInfo>();
    assert_eq!(id.native, Some(Type::Union(vec![Type::Int, Type::Null])));
    assert_eq!(id.inferred, Some(Type::Null));

    // Tentative types are kept apart and never become the effective type.
    let count = methods[&Name::new("count")].value::<keys::TypeInfo>();
    assert_eq!(count.tentative, Some(Type::Int));
    assert_eq!(count.effective(), None);

    let limit = &record.value::<keys::Properties>()[&Name::new("limit")];
    assert_eq!(limit.value::<keys::Modifiers>().visibility, Visibility::Protected);
    assert_eq!(limit.value::<keys::TypeInfo>().native, Some(Type::Int));
    assert_eq!(limit.value::<keys::TypeInfo>().inferred, Some(Type::int_literal(25)));

    let table = &record.value::<keys::Constants>()[&Name::new("TABLE")];
    assert_eq!(table.get::<keys::Value>(), Some(&ConstValue::String("users".into())));
    assert_eq!(
        table.value::<keys::TypeInfo>().effective(),
        Some(&Type::string_literal("users"))
    );
}

#[test]
fn repeated_reflection_is_served_from_the_cache() {
    let fixture = fixture();
    let reflector = fixture.reflector();

    let first = reflector.reflect_class("App\\Repository").unwrap();
    assert_eq!(fixture.workspace.locates(), 1);
    assert_eq!(fixture.workspace.extracts(), 1);

    let second = reflector.reflect_class("App\\Repository").unwrap();
    assert_eq!(first, second);
    assert_eq!(fixture.workspace.locates(), 1);
    assert_eq!(fixture.workspace.extracts(), 1);
    assert_eq!(reflector.cache_stats().staged_hits, 1);
}

#[test]
fn member_ids_are_answered_from_the_owner() {
    let fixture = fixture();
    let reflector = fixture.reflector();

    // Method names are case-insensitive.
    let find = reflector.reflect(&DeclId::method("App\\Repository", "FIND")).unwrap();
    assert_eq!(find.get::<keys::DeclaringClass>(), Some(&Name::new("App\\Repository")));
    assert_eq!(find.get::<keys::Namespace>(), Some(&Name::new("App")));

    let limit = reflector.reflect(&DeclId::property("App\\Repository", "limit")).unwrap();
    assert_eq!(limit.value::<keys::TypeInfo>().native, Some(Type::Int));

    let table = reflector
        .reflect(&DeclId::class_constant("App\\Repository", "TABLE"))
        .unwrap();
    assert_eq!(table.get::<keys::Value>(), Some(&ConstValue::String("users".into())));

    let id = ParameterId::new(
        FunctionLikeId::Method(MethodId::new(ClassLikeId::named("App\\Repository"), "find")),
        "id",
    );
    let param = reflector.reflect(&DeclId::Parameter(id)).unwrap();
    assert_eq!(param.value::<keys::Parameter>().position, 0);

    // One extraction served the class and all of its members.
    assert_eq!(fixture.workspace.extracts(), 1);
}

#[test]
fn unknown_declarations_are_not_found() {
    let fixture = fixture();
    let reflector = fixture.reflector();

    assert!(reflector.reflect_class("App\\Missing").unwrap_err().is_not_found());
    assert_eq!(reflector.try_reflect_class("App\\Missing").unwrap(), None);
    assert!(reflector
        .reflect(&DeclId::method("App\\Repository", "save"))
        .unwrap_err()
        .is_not_found());
    assert!(reflector.reflect_function("App\\missing").unwrap_err().is_not_found());
}

#[test]
fn functions_and_constants() {
    let fixture = Fixture::new();
    fixture.workspace.add_function(
        FunctionDecl::new("paginate")
            .in_namespace("App")
            .param(
                ParamDecl::new("size")
                    .typed(TypeExpr::named("int"))
                    .default_value(Expr::binary(BinaryOp::Mul, Expr::constant("PAGE"), Expr::Int(2))),
            )
            .returns(TypeExpr::named("iterable")),
    );
    fixture.workspace.add_constant(ConstantDecl::new("PAGE", Expr::Int(20)));
    fixture.workspace.add_constant(
        ConstantDecl::new(
            "VERSION",
            Expr::binary(BinaryOp::Concat, Expr::string("v"), Expr::constant("PAGE")),
        )
        .in_namespace("App"),
    );
    let reflector = fixture.reflector();

    let function = reflector.reflect_function("App\\paginate").unwrap();
    assert_eq!(function.value::<keys::TypeInfo>().native, Some(Type::Iterable));
    let size = function.value::<keys::Parameters>()[&Name::new("size")].value::<keys::TypeInfo>();
    assert_eq!(size.native, Some(Type::Int));
    // `PAGE` falls back from `App\PAGE` to the global constant.
    assert_eq!(size.inferred, Some(Type::int_literal(40)));

    let version = reflector.reflect_constant("App\\VERSION").unwrap();
    assert_eq!(version.get::<keys::Value>(), Some(&ConstValue::String("v20".into())));
    assert!(reflector.reflect_constant("App\\version").unwrap_err().is_not_found());
}

#[test]
fn anonymous_classes_are_found_by_position() {
    let fixture = Fixture::new();
    let position = Position {
        line: 7,
        end_line: 9,
        column: Some(12),
    };
    fixture.workspace.add_file(
        "src/factory.php",
        FileDeclarations {
            classes: vec![ClassDecl::anonymous(position)
                .with_method(MethodDecl::new("make").returns(TypeExpr::named("static")))],
            ..FileDeclarations::default()
        },
        ChangeDetector::AlwaysFresh,
    );
    let reflector = fixture.reflector();

    let id = ClassLikeId::anonymous("src/factory.php", 7, Some(12));
    let record = reflector.reflect(&DeclId::Class(id.clone())).unwrap();
    let make = record.value::<keys::Methods>()[&Name::new("make")].value::<keys::TypeInfo>();
    assert_eq!(
        make.native,
        Some(Type::Static {
            class: id.type_name(),
            args: Vec::new()
        })
    );

    let elsewhere = ClassLikeId::anonymous("src/factory.php", 8, None);
    assert!(reflector.reflect(&DeclId::Class(elsewhere)).unwrap_err().is_not_found());
}

#[test]
fn cyclic_constants_fail_without_poisoning_the_session() {
    let fixture = Fixture::new();
    fixture.workspace.add_constant(ConstantDecl::new("A", Expr::constant("B")));
    fixture.workspace.add_constant(ConstantDecl::new("B", Expr::constant("A")));
    let reflector = fixture.reflector();

    let err = reflector.reflect_constant("A").unwrap_err();
    let ReflectError::CyclicResolution { chain } = &err else {
        panic!("expected a cycle, got {err:?}");
    };
    assert_eq!(chain.len(), 3);
    assert_eq!(chain.first(), chain.last());

    // Nothing was staged and the next attempt fails the same way.
    assert!(matches!(
        reflector.reflect_constant("B").unwrap_err(),
        ReflectError::CyclicResolution { .. }
    ));
    assert_eq!(reflector.commit().unwrap(), 0);
}
