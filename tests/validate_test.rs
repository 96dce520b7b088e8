//! Integration tests for validation behaviour across modules.

use serde_json::{json, Value};
use shape_schema::{
    array, boolean, cast, conforms, deep_cast, deep_partial, deep_required, integer, lazy_named,
    map, number, object, optional, or, required, string, tuple, ContextBag, Fallback, IssueKind,
    KeyPolicy, ValidateOptions, Validator,
};

fn person() -> Validator {
    object()
        .property("name", string())
        .property("age", integer())
        .property(
            "address",
            object()
                .property("street", string())
                .property("city", string()),
        )
        .property("emails", array(string()))
        .build()
}

mod structural {
    use super::*;

    #[test]
    fn unexpected_property_is_one_issue() {
        let v = object()
            .property("a", string())
            .property("b", number())
            .build();
        let err = v.validate(json!({"a": "x", "b": 1, "c": true})).unwrap_err();
        assert_eq!(err.len(), 1);
        assert_eq!(err.locations(), vec!["input.c"]);
        assert_eq!(err.issues()[0].kind, IssueKind::UnexpectedProperty);
    }

    #[test]
    fn one_issue_per_array_entry() {
        let err = array(string()).build().validate(json!([1, 2, 3])).unwrap_err();
        assert_eq!(err.locations(), vec!["input.0", "input.1", "input.2"]);
        assert!(err.issues().iter().all(|i| i.kind == IssueKind::TypeMismatch));
    }

    #[test]
    fn nested_locations() {
        let err = person()
            .validate(json!({
                "name": "Ada",
                "age": 36,
                "address": {"street": 1, "city": "London"},
                "emails": ["a@b.c", null]
            }))
            .unwrap_err();
        assert_eq!(err.locations(), vec!["input.address.street", "input.emails.1"]);
    }

    #[test]
    fn custom_root_location() {
        let err = string()
            .validate_with(
                Some(json!(1)),
                ValidateOptions::new().name("body").location("request.body"),
            )
            .unwrap_err();
        assert_eq!(err.issues()[0].location, "request.body");
        assert_eq!(err.issues()[0].name, "body");
    }

    #[test]
    fn tuple_arity() {
        let v = tuple([string(), number()]).build();
        assert!(v.validate(json!(["a", 1])).is_ok());
        let err = v.validate(json!(["a", 1, true])).unwrap_err();
        assert_eq!(err.issues()[0].kind, IssueKind::Arity);
    }

    #[test]
    fn rest_validator_checks_undeclared_properties() {
        let v = object().property("a", string()).rest(number()).build();
        assert_eq!(
            v.validate(json!({"a": "x", "c": 2})).unwrap(),
            json!({"a": "x", "c": 2})
        );
        let err = v.validate(json!({"a": "x", "b": "y", "c": 2})).unwrap_err();
        assert_eq!(err.locations(), vec!["input.b"]);
        assert_eq!(err.issues()[0].kind, IssueKind::TypeMismatch);
    }

    #[test]
    fn allow_list_passes_only_named_extras() {
        let v = object().property("a", string()).allow_keys(["b"]).build();
        assert_eq!(
            v.validate(json!({"a": "x", "b": 1})).unwrap(),
            json!({"a": "x", "b": 1})
        );
        let err = v.validate(json!({"a": "x", "b": 1, "c": 2})).unwrap_err();
        assert_eq!(err.locations(), vec!["input.c"]);
        assert_eq!(err.issues()[0].kind, IssueKind::UnexpectedProperty);
    }

    #[test]
    fn tuple_rest_within_bounds() {
        let v = tuple([string()])
            .rest(number())
            .min_items(2)
            .max_items(3)
            .build();
        assert_eq!(v.validate(json!(["a", 1, 2])).unwrap(), json!(["a", 1, 2]));

        let short = v.validate(json!(["a"])).unwrap_err();
        assert_eq!(short.locations(), vec!["input"]);
        assert_eq!(short.issues()[0].kind, IssueKind::Arity);

        let long = v.validate(json!(["a", 1, 2, 3])).unwrap_err();
        assert_eq!(long.len(), 1);
        assert_eq!(long.issues()[0].kind, IssueKind::Arity);

        let bad_rest = v.validate(json!(["a", 1, "x"])).unwrap_err();
        assert_eq!(bad_rest.locations(), vec!["input.2"]);
    }

    #[test]
    fn map_keys_are_validated_and_rewritten() {
        let v = map(number())
            .keys(string().min_length(2).transform(|key, _| {
                Ok(json!(key.as_str().unwrap_or_default().to_uppercase()))
            }))
            .build();
        assert_eq!(
            v.validate(json!({"ab": 1, "cd": 2})).unwrap(),
            json!({"AB": 1, "CD": 2})
        );
        let err = v.validate(json!({"a": 1, "bc": "x"})).unwrap_err();
        assert_eq!(err.locations(), vec!["input.a", "input.bc"]);
        assert_eq!(err.issues()[0].kind, IssueKind::Length);
        assert_eq!(err.issues()[1].kind, IssueKind::TypeMismatch);
    }
}

mod presence {
    use super::*;

    #[test]
    fn required_reaches_optional_properties() {
        let v = required(
            object()
                .property("a", string().optional())
                .property("b", number()),
        );
        let err = v.validate(json!({"b": 1})).unwrap_err();
        assert_eq!(err.locations(), vec!["input.a"]);
        assert_eq!(err.issues()[0].kind, IssueKind::Required);
        assert_eq!(v.describe()["requiredProperties"], json!(["a", "b"]));
    }

    #[test]
    fn deep_required_reaches_nested_optionals() {
        let v = deep_required(
            object().property(
                "inner",
                object().property("b", string().optional()).build().optional(),
            ),
        );
        let err = v.validate(json!({})).unwrap_err();
        assert_eq!(err.locations(), vec!["input.inner"]);
        let err = v.validate(json!({"inner": {}})).unwrap_err();
        assert_eq!(err.locations(), vec!["input.inner.b"]);
        assert!(v.validate(json!({"inner": {"b": "x"}})).is_ok());
    }
}

mod fatal {
    use super::*;

    #[test]
    fn later_siblings_are_skipped() {
        let v = object()
            .property("a", number())
            .property("b", number().fatal())
            .property("c", number())
            .build();
        let err = v
            .validate(json!({"a": "x", "b": "y", "c": "z"}))
            .unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(err.locations(), vec!["input.a", "input.b"]);
    }

    #[test]
    fn fatal_in_nested_array_stops_the_whole_call() {
        let v = object()
            .property("items", array(number().fatal()))
            .property("after", string())
            .build();
        let err = v
            .validate(json!({"items": [1, "x", "y"], "after": 1}))
            .unwrap_err();
        assert_eq!(err.locations(), vec!["input.items.1"]);
    }
}

mod optional_values {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn default_bypasses_the_wrapped_schema() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        let inner = number().step(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        let v = optional(inner.clone()).default(json!(10));
        assert_eq!(
            v.validate_with(None, ValidateOptions::default()).unwrap(),
            Some(json!(10))
        );
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let bare = optional(inner.clone());
        assert_eq!(bare.validate_with(None, ValidateOptions::default()).unwrap(), None);
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let checked = optional(inner).default_from(Fallback::value(json!(10)).validated(true));
        assert_eq!(
            checked.validate_with(None, ValidateOptions::default()).unwrap(),
            Some(json!(10))
        );
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn computed_default() {
        let v = object()
            .property("created", string().default_from(Fallback::with(|| json!("now"))))
            .build();
        assert_eq!(v.validate(json!({})).unwrap(), json!({"created": "now"}));
    }

    #[test]
    fn deep_partial_accepts_empty_object() {
        let v = deep_partial(person());
        assert_eq!(v.validate(json!({})).unwrap(), json!({}));
        assert_eq!(
            v.validate(json!({"address": {"city": "Oslo"}})).unwrap(),
            json!({"address": {"city": "Oslo"}})
        );
    }

    #[test]
    fn falsy_policy() {
        let v = object()
            .property("n", number().falsy().default(json!(1)))
            .build();
        assert_eq!(v.validate(json!({"n": 0})).unwrap(), json!({"n": 1}));
        assert_eq!(v.validate(json!({"n": 5})).unwrap(), json!({"n": 5}));
    }

    #[test]
    fn absent_results_keep_existing_keys_as_null() {
        let v = object().property("n", number().nullish()).build();
        assert_eq!(v.validate(json!({"n": null})).unwrap(), json!({"n": null}));
        assert_eq!(v.validate(json!({})).unwrap(), json!({}));

        let deleting = object()
            .property("n", number().nullish())
            .build()
            .delete_undefined(true);
        assert_eq!(deleting.validate(json!({"n": null})).unwrap(), json!({}));
    }

    #[test]
    fn falsy_inputs_without_default_become_null() {
        let v = object().property("n", number().falsy()).build();
        assert_eq!(v.validate(json!({"n": 0})).unwrap(), json!({"n": null}));

        let deleting = v.delete_undefined(true);
        assert_eq!(deleting.validate(json!({"n": 0})).unwrap(), json!({}));
    }
}

mod casting {
    use super::*;

    #[test]
    fn structured_strings_are_parsed() {
        let v = cast(array(number()));
        assert_eq!(v.validate(json!("[1,2]")).unwrap(), json!([1, 2]));
    }

    #[test]
    fn splitter_is_the_fallback() {
        let v = cast(array(number().cast()).splitter(","));
        assert_eq!(v.validate(json!("1,2")).unwrap(), json!([1, 2]));
        assert_eq!(v.validate(json!("[3]")).unwrap(), json!([3]));
    }

    #[test]
    fn deep_cast_reaches_leaves() {
        let v = deep_cast(
            object()
                .property("flag", boolean())
                .property("ids", array(integer())),
        );
        assert_eq!(
            v.validate(json!({"flag": "true", "ids": "[\"1\", \"2\"]"})).unwrap(),
            json!({"flag": true, "ids": [1, 2]})
        );
    }

    #[test]
    fn object_splitter_unflattens_keys() {
        let v = cast(
            object()
                .property("a", object().property("b", number()))
                .splitter("."),
        );
        assert_eq!(v.validate(json!({"a.b": 1})).unwrap(), json!({"a": {"b": 1}}));
        let err = v.validate(json!({"a.b": "x"})).unwrap_err();
        assert_eq!(err.locations(), vec!["input.a.b"]);
    }

    #[test]
    fn index_keyed_objects_become_arrays() {
        let input = json!({"1": 2, "0": 1, "x": 3});
        let ignoring = cast(array(number()));
        assert_eq!(ignoring.validate(input.clone()).unwrap(), json!([1, 2]));

        let pushing = cast(array(number()).non_numeric_keys(KeyPolicy::Push));
        assert_eq!(pushing.validate(input).unwrap(), json!([1, 2, 3]));
    }

    #[test]
    fn call_site_cast() {
        let out = person()
            .validate_with(
                Some(json!("{\"name\": \"a\", \"age\": 1, \"address\": {\"street\": \"s\", \"city\": \"c\"}, \"emails\": []}")),
                ValidateOptions::new().overrides(shape_schema::Options::new().cast(true)),
            )
            .unwrap();
        assert_eq!(out.and_then(|v| v.get("age").cloned()), Some(json!(1)));
    }
}

mod views {
    use super::*;

    fn conforming(v: &Validator, input: Value) {
        let output = v.validate(input).unwrap();
        conforms(v, &output).unwrap();
    }

    #[test]
    fn valid_outputs_satisfy_their_description() {
        conforming(
            &person(),
            json!({
                "name": "Ada",
                "age": 36,
                "address": {"street": "s", "city": "c"},
                "emails": []
            }),
        );
        conforming(&deep_partial(person()), json!({"address": {}}));
        conforming(
            &object()
                .property("id", or([integer(), string()]))
                .property("n", number().default(json!(0)))
                .build(),
            json!({"id": "x"}),
        );
    }

    #[test]
    fn samples_validate_and_conform() {
        let v = person();
        let sample = v.sample();
        conforming(&v, sample);
    }

    #[test]
    fn recursive_labels_round_trip() {
        fn list() -> Validator {
            object()
                .property("head", number())
                .property("tail", lazy_named("list", list).optional())
                .build()
        }
        let v = lazy_named("list", list);
        conforming(&v, json!({"head": 1, "tail": {"head": 2}}));
        assert!(v.validate(json!({"head": 1, "tail": {"head": "x"}})).is_err());
    }

    #[test]
    fn compiled_graph_matches() {
        let v = deep_partial(deep_cast(person()));
        let compiled = v.to_static().unwrap();
        let input = json!({"age": "4", "address": {"city": "c"}});
        assert_eq!(
            v.validate(input.clone()).unwrap(),
            compiled.validate(input).unwrap()
        );
    }
}

mod context_bag {
    use super::*;

    #[test]
    fn bag_is_shared_across_depths() {
        let v = object()
            .property(
                "items",
                array(number().step(|ctx| {
                    let total = ctx.bag().get("total").and_then(Value::as_f64).unwrap_or(0.0)
                        + ctx.output().and_then(Value::as_f64).unwrap_or(0.0);
                    ctx.bag_mut().insert("total".into(), json!(total));
                    Ok(())
                })),
            )
            .build();
        let mut bag = ContextBag::new();
        v.validate_with(
            Some(json!({"items": [1, 2, 3.5]})),
            ValidateOptions::new().context(&mut bag),
        )
        .unwrap();
        assert_eq!(bag.get("total"), Some(&json!(6.5)));
    }
}
