//! Black-box tests for calque
//!
//! These exercise the full registration → expansion → evaluation pipeline
//! against the process-wide default map, the way a host application uses
//! it: definitions live in the owning types' static state and are pulled
//! in lazily through the types' init hooks.

use std::any::TypeId;
use std::sync::Arc;

use calque::{
    ComputedProperty, Entity, Expr, Lambda, Record, TypeInfo, Value, default_map, ensure_initialized,
    evaluate, expand_lambda, expand_with, lit, project, translation_of,
};
use once_cell::sync::Lazy;

// ============ Employees: flat computed properties ============

struct Employee {
    first_name: String,
    last_name: String,
    salary: i64,
    manager: Option<Arc<Employee>>,
}

static EMPLOYEE_INFO: TypeInfo = TypeInfo {
    name: "Employee",
    type_id: TypeId::of::<Employee>,
    base: None,
    declared: &[
        "first_name",
        "last_name",
        "salary",
        "manager",
        "full_name",
        "display_name",
        "manager_name",
    ],
    init: Some(|| {
        Lazy::force(&FULL_NAME);
        Lazy::force(&DISPLAY_NAME);
        Lazy::force(&MANAGER_NAME);
    }),
};

impl Entity for Employee {
    fn type_info() -> &'static TypeInfo {
        &EMPLOYEE_INFO
    }
}

static FULL_NAME: Lazy<Arc<ComputedProperty<Employee, String>>> = Lazy::new(|| {
    translation_of::<Employee>()
        .property("full_name")
        .is(|e| e.prop::<String>("first_name") + lit(" ") + e.prop("last_name"))
        .expect("register full_name")
});

static DISPLAY_NAME: Lazy<Arc<ComputedProperty<Employee, String>>> = Lazy::new(|| {
    translation_of::<Employee>()
        .property("display_name")
        .is(|e| e.prop::<String>("full_name").upper())
        .expect("register display_name")
});

static MANAGER_NAME: Lazy<Arc<ComputedProperty<Employee, String>>> = Lazy::new(|| {
    translation_of::<Employee>()
        .property("manager_name")
        .is(|e| e.prop::<Employee>("manager").prop("full_name"))
        .expect("register manager_name")
});

impl Record for Employee {
    fn field(&self, name: &str) -> Option<Value> {
        match name {
            "first_name" => Some(Value::Str(self.first_name.clone())),
            "last_name" => Some(Value::Str(self.last_name.clone())),
            "salary" => Some(Value::Int(self.salary)),
            "manager" => self
                .manager
                .clone()
                .map(|manager| Value::Entity(manager as Arc<dyn Record>)),
            // Computed names delegate to their compiled definitions, the
            // way the original property getters do.
            "full_name" | "display_name" | "manager_name" => {
                evaluate::<_, String>(self, name).ok().map(Value::Str)
            }
            _ => None,
        }
    }
}

fn alice() -> Employee {
    Employee {
        first_name: "Alice".into(),
        last_name: "Quinn".into(),
        salary: 120,
        manager: None,
    }
}

fn bob_reporting_to(manager: Employee) -> Employee {
    Employee {
        first_name: "Bob".into(),
        last_name: "Marsh".into(),
        salary: 90,
        manager: Some(Arc::new(manager)),
    }
}

// ============ Products: an override hierarchy ============
//
// Product defines `summary` as a read of `name`. FeaturedProduct
// re-registers `summary`; ImportedProduct overrides only the stored
// `name` it reads.

struct Product {
    name: String,
}

struct FeaturedProduct {
    name: String,
}

struct ImportedProduct {
    name: String,
}

static PRODUCT_INFO: TypeInfo = TypeInfo {
    name: "Product",
    type_id: TypeId::of::<Product>,
    base: None,
    declared: &["name", "summary"],
    init: Some(|| {
        Lazy::force(&PRODUCT_SUMMARY);
    }),
};

static FEATURED_INFO: TypeInfo = TypeInfo {
    name: "FeaturedProduct",
    type_id: TypeId::of::<FeaturedProduct>,
    base: Some(&PRODUCT_INFO),
    declared: &["summary"],
    init: Some(|| {
        Lazy::force(&FEATURED_SUMMARY);
    }),
};

static IMPORTED_INFO: TypeInfo = TypeInfo {
    name: "ImportedProduct",
    type_id: TypeId::of::<ImportedProduct>,
    base: Some(&PRODUCT_INFO),
    declared: &["name"],
    init: None,
};

impl Entity for Product {
    fn type_info() -> &'static TypeInfo {
        &PRODUCT_INFO
    }
}

impl Entity for FeaturedProduct {
    fn type_info() -> &'static TypeInfo {
        &FEATURED_INFO
    }
}

impl Entity for ImportedProduct {
    fn type_info() -> &'static TypeInfo {
        &IMPORTED_INFO
    }
}

static PRODUCT_SUMMARY: Lazy<Arc<ComputedProperty<Product, String>>> = Lazy::new(|| {
    translation_of::<Product>()
        .property("summary")
        .is(|p| p.prop::<String>("name"))
        .expect("register Product.summary")
});

static FEATURED_SUMMARY: Lazy<Arc<ComputedProperty<FeaturedProduct, String>>> = Lazy::new(|| {
    translation_of::<FeaturedProduct>()
        .property("summary")
        .is(|_| lit("featured item"))
        .expect("register FeaturedProduct.summary")
});

impl Record for Product {
    fn field(&self, name: &str) -> Option<Value> {
        match name {
            "name" => Some(Value::Str(self.name.clone())),
            "summary" => evaluate::<_, String>(self, "summary").ok().map(Value::Str),
            _ => None,
        }
    }
}

impl Record for FeaturedProduct {
    fn field(&self, name: &str) -> Option<Value> {
        match name {
            "name" => Some(Value::Str(self.name.clone())),
            "summary" => evaluate::<_, String>(self, "summary").ok().map(Value::Str),
            _ => None,
        }
    }
}

impl Record for ImportedProduct {
    fn field(&self, name: &str) -> Option<Value> {
        match name {
            // The stored property is overridden; the inherited summary
            // definition reads it through this override.
            "name" => Some(Value::Str(format!("imported {}", self.name))),
            "summary" => evaluate::<_, String>(self, "summary").ok().map(Value::Str),
            _ => None,
        }
    }
}

// ============ Helpers ============

fn count_accesses(expr: &Expr, name: &str) -> usize {
    match expr {
        Expr::Property {
            target,
            name: prop,
            ..
        } => count_accesses(target, name) + usize::from(prop == name),
        Expr::Call { target, args, .. } => {
            count_accesses(target, name)
                + args.iter().map(|a| count_accesses(a, name)).sum::<usize>()
        }
        Expr::Binary { lhs, rhs, .. } => count_accesses(lhs, name) + count_accesses(rhs, name),
        Expr::Unary { expr, .. } => count_accesses(expr, name),
        Expr::List(items) => items.iter().map(|i| count_accesses(i, name)).sum(),
        Expr::Lambda(lambda) => count_accesses(lambda.body(), name),
        Expr::Param(_) | Expr::Ident(_) | Expr::Literal(_) => 0,
    }
}

fn project_strings(items: Vec<Arc<dyn Record>>, lambda: &Lambda) -> Vec<String> {
    project(&items, lambda)
        .unwrap()
        .into_iter()
        .map(|value| match value {
            Value::Str(s) => s,
            other => panic!("expected string, got {other:?}"),
        })
        .collect()
}

// ============ Round-trip direct evaluation ============

#[test]
fn direct_evaluation_matches_the_defining_expression() {
    let employee = alice();
    assert_eq!(FULL_NAME.evaluate(&employee).unwrap(), "Alice Quinn");
    assert_eq!(
        evaluate::<_, String>(&employee, "full_name").unwrap(),
        format!("{} {}", employee.first_name, employee.last_name)
    );
}

#[test]
fn direct_evaluation_of_unregistered_names_fails_descriptively() {
    let err = evaluate::<Employee, String>(&alice(), "nickname").unwrap_err();
    assert!(err.to_string().contains("Employee.nickname"));
}

// ============ Rewriting preserves direct evaluation ============

#[test]
fn expansion_preserves_direct_evaluation_results() {
    let query = Lambda::new::<Employee, _, _>(|e| e.prop::<String>("full_name"));
    let expanded = expand_lambda(&query, default_map()).unwrap();
    assert_eq!(count_accesses(expanded.body(), "full_name"), 0);

    let staff = vec![alice(), bob_reporting_to(alice())];
    let expected: Vec<String> = staff
        .iter()
        .map(|e| FULL_NAME.evaluate(e).unwrap())
        .collect();
    let records: Vec<Arc<dyn Record>> = staff
        .into_iter()
        .map(|e| Arc::new(e) as Arc<dyn Record>)
        .collect();
    assert_eq!(project_strings(records, &expanded), expected);
}

#[test]
fn expansion_handles_query_shaped_trees() {
    let query = Expr::Call {
        target: Box::new(Expr::Ident("employees".into())),
        method: "select".into(),
        args: vec![
            Lambda::new::<Employee, _, _>(|e| e.prop::<String>("full_name")).into_expr(),
        ],
    };
    let expanded = expand_with(&query, default_map()).unwrap();
    assert_eq!(count_accesses(&expanded, "full_name"), 0);

    // The provider-side shell survives; the lambda inside is expanded.
    let Expr::Call { method, args, .. } = &expanded else {
        panic!("expected the call shell to survive expansion");
    };
    assert_eq!(method, "select");
    let Expr::Lambda(inner) = &args[0] else {
        panic!("expected the lambda argument to survive expansion");
    };
    let records: Vec<Arc<dyn Record>> = vec![Arc::new(alice())];
    assert_eq!(project_strings(records, inner), ["Alice Quinn"]);
}

// ============ Override precedence ============

#[test]
fn expansion_uses_the_subtype_definition_for_subtype_receivers() {
    let query = Lambda::new::<FeaturedProduct, _, _>(|p| p.prop::<String>("summary"));
    let expanded = expand_lambda(&query, default_map()).unwrap();

    let records: Vec<Arc<dyn Record>> = vec![Arc::new(FeaturedProduct {
        name: "widget".into(),
    })];
    assert_eq!(project_strings(records, &expanded), ["featured item"]);
}

#[test]
fn expansion_keys_off_the_static_receiver_type_not_the_runtime_type() {
    let query = Lambda::new::<Product, _, _>(|p| p.prop::<String>("summary"));
    let expanded = expand_lambda(&query, default_map()).unwrap();

    // The runtime instance is a FeaturedProduct, but the receiver was
    // statically a Product, so the base definition applies.
    let records: Vec<Arc<dyn Record>> = vec![Arc::new(FeaturedProduct {
        name: "widget".into(),
    })];
    assert_eq!(project_strings(records, &expanded), ["widget"]);
}

#[test]
fn inherited_definition_reads_the_subtype_override_of_its_input() {
    let query = Lambda::new::<ImportedProduct, _, _>(|p| p.prop::<String>("summary"));
    let expanded = expand_lambda(&query, default_map()).unwrap();

    // ImportedProduct never re-registered `summary`; the base definition
    // is substituted, and its `name` read dispatches to the override.
    let records: Vec<Arc<dyn Record>> = vec![Arc::new(ImportedProduct {
        name: "widget".into(),
    })];
    assert_eq!(project_strings(records, &expanded), ["imported widget"]);

    let direct: String = evaluate(
        &ImportedProduct {
            name: "widget".into(),
        },
        "summary",
    )
    .unwrap();
    assert_eq!(direct, "imported widget");
}

// ============ Repeated expansion ============

#[test]
fn repeated_expansion_is_pure_and_uncached() {
    // Force every fixture registration first, so the length snapshot is
    // not racing another test's lazy first use.
    ensure_initialized(&EMPLOYEE_INFO);
    ensure_initialized(&PRODUCT_INFO);
    ensure_initialized(&FEATURED_INFO);
    let before = default_map().len();

    let query = Lambda::new::<Employee, _, _>(|e| e.prop::<String>("display_name"));
    let first = expand_lambda(&query, default_map()).unwrap();
    let second = expand_lambda(&query, default_map()).unwrap();

    assert_eq!(first, second);
    assert_eq!(default_map().len(), before);
}

// ============ Duplicate registration ============

#[test]
fn duplicate_registration_fails_without_replacing() {
    ensure_initialized(&EMPLOYEE_INFO);
    let err = translation_of::<Employee>()
        .property::<String>("full_name")
        .is(|e| e.prop::<String>("last_name"))
        .unwrap_err();
    assert!(err.to_string().contains("already registered"));

    // The original definition is untouched.
    assert_eq!(FULL_NAME.evaluate(&alice()).unwrap(), "Alice Quinn");
}

// ============ Nested substitution ============

#[test]
fn nested_definitions_expand_fully() {
    let query = Lambda::new::<Employee, _, _>(|e| e.prop::<String>("display_name"));
    let expanded = expand_lambda(&query, default_map()).unwrap();

    for computed in ["display_name", "full_name"] {
        assert_eq!(count_accesses(expanded.body(), computed), 0, "{computed} left behind");
    }

    let records: Vec<Arc<dyn Record>> = vec![Arc::new(alice())];
    assert_eq!(project_strings(records, &expanded), ["ALICE QUINN"]);
}

#[test]
fn nested_definitions_expand_through_a_different_receiver() {
    let query = Lambda::new::<Employee, _, _>(|e| e.prop::<String>("manager_name"));
    let expanded = expand_lambda(&query, default_map()).unwrap();

    for computed in ["manager_name", "full_name"] {
        assert_eq!(count_accesses(expanded.body(), computed), 0, "{computed} left behind");
    }
    // The manager link itself is a stored property and must survive; the
    // substituted body references its parameter twice, so the receiver is
    // spliced in twice.
    assert_eq!(count_accesses(expanded.body(), "manager"), 2);

    let bob = bob_reporting_to(alice());
    assert_eq!(MANAGER_NAME.evaluate(&bob).unwrap(), "Alice Quinn");
    let records: Vec<Arc<dyn Record>> = vec![Arc::new(bob)];
    assert_eq!(project_strings(records, &expanded), ["Alice Quinn"]);
}
