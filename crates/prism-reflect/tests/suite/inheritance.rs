use pretty_assertions::assert_eq;
use prism_reflect::keys;
use prism_reflect::{
    AdaptationDecl, BinaryOp, ClassConstantDecl, ClassDecl, ConstValue, DocBlock, DocTemplate, Expr,
    MethodDecl, Name, PropertyDecl, ReflectError, TraitUseDecl, Type, TypeExpr, TypedMap, Visibility,
};

use super::fixture::Fixture;

fn method(record: &TypedMap, name: &str) -> TypedMap {
    record.value::<keys::Methods>()[&Name::new(name)].clone()
}

fn declaring(member: &TypedMap) -> Name {
    member.value::<keys::DeclaringClass>()
}

#[test]
fn own_members_win_over_traits_and_traits_over_the_parent() {
    let fixture = Fixture::new();
    fixture.workspace.add_class(
        ClassDecl::class("Base")
            .with_method(MethodDecl::new("name"))
            .with_method(MethodDecl::new("greet"))
            .with_method(MethodDecl::new("describe"))
            .with_property(PropertyDecl::new("secret").visibility(Visibility::Private))
            .with_property(PropertyDecl::new("label").visibility(Visibility::Protected)),
    );
    fixture.workspace.add_class(
        ClassDecl::trait_("Greets")
            .with_method(MethodDecl::new("name"))
            .with_method(MethodDecl::new("greet")),
    );
    fixture.workspace.add_class(
        ClassDecl::class("Child")
            .extends("Base")
            .uses_trait(TraitUseDecl::new(["Greets"]))
            .with_method(MethodDecl::new("NAME")),
    );
    let reflector = fixture.reflector();

    let child = reflector.reflect_class("Child").unwrap();
    let methods = child.value::<keys::Methods>();
    assert_eq!(
        methods.keys().map(Name::as_str).collect::<Vec<_>>(),
        vec!["NAME", "greet", "describe"]
    );
    assert_eq!(declaring(&method(&child, "NAME")), Name::new("Child"));
    // Trait members are adopted by the using class.
    assert_eq!(declaring(&method(&child, "greet")), Name::new("Child"));
    assert_eq!(declaring(&method(&child, "describe")), Name::new("Base"));

    let properties = child.value::<keys::Properties>();
    assert!(properties.contains_key(&Name::new("label")));
    assert!(!properties.contains_key(&Name::new("secret")));
}

#[test]
fn concrete_parent_methods_replace_inherited_abstract_ones() {
    let fixture = Fixture::new();
    fixture.workspace.add_class(
        ClassDecl::interface("Shape").with_method(MethodDecl::new("area").returns(TypeExpr::named("float"))),
    );
    fixture.workspace.add_class(
        ClassDecl::class("Polygon").with_method(MethodDecl::new("area").returns(TypeExpr::named("float"))),
    );
    fixture.workspace.add_class(ClassDecl::class("Square").extends("Polygon").implements("Shape"));
    let reflector = fixture.reflector();

    let square = reflector.reflect_class("Square").unwrap();
    let area = method(&square, "area");
    assert_eq!(declaring(&area), Name::new("Polygon"));
    assert!(!area.value::<keys::Modifiers>().is_abstract);

    let shape = reflector.reflect_class("Shape").unwrap();
    assert!(method(&shape, "area").value::<keys::Modifiers>().is_abstract);
}

#[test]
fn templates_are_substituted_with_use_site_arguments() {
    let fixture = Fixture::new();
    fixture.docs.insert(
        "/** @template T */",
        DocBlock {
            templates: vec![DocTemplate::new("T")],
            ..DocBlock::default()
        },
    );
    fixture.docs.insert(
        "/** @return T */",
        DocBlock {
            returns: Some(TypeExpr::named("T")),
            ..DocBlock::default()
        },
    );
    fixture.docs.insert(
        "/** @extends Box<int> */",
        DocBlock {
            extends: vec![TypeExpr::generic("Box", vec![TypeExpr::named("int")])],
            ..DocBlock::default()
        },
    );
    fixture.workspace.add_class(
        ClassDecl::class("Box")
            .with_doc("/** @template T */")
            .with_method(MethodDecl::new("get").with_doc("/** @return T */"))
            .with_method(MethodDecl::new("copy").returns(TypeExpr::named("static"))),
    );
    fixture
        .workspace
        .add_class(ClassDecl::class("IntBox").extends("Box").with_doc("/** @extends Box<int> */"));
    fixture.workspace.add_class(ClassDecl::class("RawBox").extends("Box"));
    let reflector = fixture.reflector();

    let int_box = reflector.reflect_class("IntBox").unwrap();
    assert_eq!(
        method(&int_box, "get").value::<keys::TypeInfo>().annotated,
        Some(Type::Int)
    );
    assert_eq!(
        method(&int_box, "copy").value::<keys::TypeInfo>().native,
        Some(Type::Static {
            class: Name::new("IntBox"),
            args: Vec::new(),
        })
    );

    // No arguments: the template's bound, which defaults to mixed.
    let raw_box = reflector.reflect_class("RawBox").unwrap();
    assert_eq!(
        method(&raw_box, "get").value::<keys::TypeInfo>().annotated,
        Some(Type::Mixed)
    );
}

fn greeters(fixture: &Fixture) {
    fixture.workspace.add_class(
        ClassDecl::trait_("Hello").with_method(MethodDecl::new("greet").returns(TypeExpr::named("string"))),
    );
    fixture.workspace.add_class(
        ClassDecl::trait_("World").with_method(MethodDecl::new("greet").returns(TypeExpr::named("int"))),
    );
}

#[test]
fn conflicting_trait_methods_are_an_error() {
    let fixture = Fixture::new();
    greeters(&fixture);
    fixture
        .workspace
        .add_class(ClassDecl::class("Greeter").uses_trait(TraitUseDecl::new(["Hello", "World"])));
    let reflector = fixture.reflector();

    let err = reflector.reflect_class("Greeter").unwrap_err();
    let ReflectError::ConflictingInheritance { class, member, traits } = err else {
        panic!("expected a conflict, got {err:?}");
    };
    assert_eq!(class, Name::new("Greeter"));
    assert_eq!(member, Name::new("greet"));
    assert_eq!(traits, vec![Name::new("Hello"), Name::new("World")]);
}

#[test]
fn adaptations_resolve_trait_conflicts() {
    let fixture = Fixture::new();
    greeters(&fixture);
    fixture.workspace.add_class(
        ClassDecl::class("Greeter").uses_trait(
            TraitUseDecl::new(["Hello", "World"])
                .with(AdaptationDecl::Precedence {
                    trait_name: "Hello".to_string(),
                    method: "greet".to_string(),
                    instead_of: vec!["World".to_string()],
                })
                .with(AdaptationDecl::Alias {
                    trait_name: Some("World".to_string()),
                    method: "greet".to_string(),
                    alias: Some("worldGreet".to_string()),
                    visibility: Some(Visibility::Protected),
                })
                .with(AdaptationDecl::Alias {
                    trait_name: None,
                    method: "wave".to_string(),
                    alias: None,
                    visibility: Some(Visibility::Private),
                }),
        ),
    );
    let reflector = fixture.reflector();

    let greeter = reflector.reflect_class("Greeter").unwrap();
    let greet = method(&greeter, "greet");
    assert_eq!(greet.value::<keys::TypeInfo>().native, Some(Type::String));
    assert_eq!(greet.value::<keys::Modifiers>().visibility, Visibility::Public);

    let world_greet = method(&greeter, "worldGreet");
    assert_eq!(world_greet.value::<keys::TypeInfo>().native, Some(Type::Int));
    assert_eq!(world_greet.value::<keys::Modifiers>().visibility, Visibility::Protected);

    let codes: Vec<String> = greeter
        .value::<keys::Diagnostics>()
        .into_iter()
        .map(|diagnostic| diagnostic.code)
        .collect();
    assert_eq!(codes, vec!["unknown-trait-method".to_string()]);
}

#[test]
fn trait_self_references_are_rebound_to_the_using_class() {
    let fixture = Fixture::new();
    fixture.workspace.add_class(
        ClassDecl::trait_("Fluent").with_method(MethodDecl::new("with").returns(TypeExpr::named("self"))),
    );
    fixture.workspace.add_class(
        ClassDecl::class("Query")
            .in_namespace("Db")
            .uses_trait(TraitUseDecl::new(["\\Fluent"])),
    );
    let reflector = fixture.reflector();

    let query = reflector.reflect_class("Db\\Query").unwrap();
    assert_eq!(
        method(&query, "with").value::<keys::TypeInfo>().native,
        Some(Type::class("Db\\Query"))
    );
}

#[test]
fn inheritance_cycles_are_reported() {
    let fixture = Fixture::new();
    fixture.workspace.add_class(ClassDecl::class("A").extends("B"));
    fixture.workspace.add_class(ClassDecl::class("B").extends("A"));
    fixture.workspace.add_class(ClassDecl::class("Narcissus").extends("Narcissus"));
    let reflector = fixture.reflector();

    let err = reflector.reflect_class("A").unwrap_err();
    let ReflectError::CyclicInheritance { chain, .. } = err else {
        panic!("expected an inheritance cycle, got {err:?}");
    };
    assert_eq!(chain, vec![Name::new("A"), Name::new("B"), Name::new("A")]);

    let err = reflector.reflect_class("Narcissus").unwrap_err();
    assert!(matches!(err, ReflectError::CyclicInheritance { .. }));
}

#[test]
fn ancestry_is_flattened() {
    let fixture = Fixture::new();
    fixture.workspace.add_class(ClassDecl::interface("Countable"));
    fixture.workspace.add_class(ClassDecl::interface("Stringable"));
    fixture.workspace.add_class(ClassDecl::class("Root").implements("Countable"));
    fixture.workspace.add_class(ClassDecl::class("Middle").extends("Root"));
    fixture
        .workspace
        .add_class(ClassDecl::class("Leaf").extends("Middle").implements("Stringable"));
    let reflector = fixture.reflector();

    let leaf = reflector.reflect_class("Leaf").unwrap();
    assert_eq!(
        leaf.value::<keys::Parents>(),
        vec![Name::new("Middle"), Name::new("Root")]
    );
    assert_eq!(
        leaf.value::<keys::Interfaces>(),
        vec![Name::new("Stringable"), Name::new("Countable")]
    );
}

#[test]
fn unknown_ancestors_are_diagnosed() {
    let fixture = Fixture::new();
    fixture.workspace.add_class(
        ClassDecl::class("Orphan")
            .extends("Missing")
            .with_method(MethodDecl::new("run")),
    );
    let reflector = fixture.reflector();

    let orphan = reflector.reflect_class("Orphan").unwrap();
    assert_eq!(orphan.value::<keys::Methods>().len(), 1);
    assert!(orphan.get::<keys::Parents>().is_none());
    let diagnostics = orphan.value::<keys::Diagnostics>();
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].code, "unknown-ancestor");
}

fn base_reading_child_constant(fixture: &Fixture) {
    fixture.workspace.add_class(
        ClassDecl::class("Base").with_constant(ClassConstantDecl::new(
            "X",
            Expr::binary(BinaryOp::Add, Expr::class_constant("Child", "Y"), Expr::Int(1)),
        )),
    );
    fixture.workspace.add_class(
        ClassDecl::class("Child")
            .extends("Base")
            .with_constant(ClassConstantDecl::new("Y", Expr::Int(1))),
    );
}

fn constant(record: &TypedMap, name: &str) -> Option<ConstValue> {
    record.value::<keys::Constants>()[&Name::new(name)]
        .get::<keys::Value>()
        .cloned()
}

#[test]
fn parent_constants_may_read_child_constants() {
    let fixture = Fixture::new();
    base_reading_child_constant(&fixture);

    let reflector = fixture.reflector();
    let base = reflector.reflect_class("Base").unwrap();
    assert_eq!(constant(&base, "X"), Some(ConstValue::Int(2)));
    let child = reflector.reflect_class("Child").unwrap();
    assert_eq!(constant(&child, "X"), Some(ConstValue::Int(2)));
    assert_eq!(constant(&child, "Y"), Some(ConstValue::Int(1)));
    assert_eq!(child.value::<keys::Parents>(), vec![Name::new("Base")]);

    // Starting from the child takes the other path through the hierarchy.
    let reflector = fixture.reflector();
    let child = reflector.reflect_class("Child").unwrap();
    assert_eq!(constant(&child, "X"), Some(ConstValue::Int(2)));
    assert_eq!(
        declaring(&child.value::<keys::Constants>()[&Name::new("X")]),
        Name::new("Base")
    );
    let base = reflector.reflect_class("Base").unwrap();
    assert_eq!(constant(&base, "X"), Some(ConstValue::Int(2)));
}

#[test]
fn constant_loops_across_classes_are_resolution_cycles() {
    let fixture = Fixture::new();
    fixture.workspace.add_class(
        ClassDecl::class("Ping").with_constant(ClassConstantDecl::new("A", Expr::class_constant("Pong", "B"))),
    );
    fixture.workspace.add_class(
        ClassDecl::class("Pong")
            .extends("Ping")
            .with_constant(ClassConstantDecl::new("B", Expr::class_constant("Ping", "A"))),
    );
    let reflector = fixture.reflector();

    for class in ["Ping", "Pong"] {
        let err = reflector.reflect_class(class).unwrap_err();
        assert!(matches!(err, ReflectError::CyclicResolution { .. }), "{class}: {err:?}");
    }
}
