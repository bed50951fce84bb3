use erddap_registry::{Attributes, Block, Dataset, DiffStatus, Fields, Registry, Value, diff, render};
use proptest::prelude::*;
use tempfile::TempDir;

fn name() -> impl Strategy<Value = String> + Clone {
    "[a-z][a-zA-Z0-9_]{0,6}"
}

fn text() -> impl Strategy<Value = String> + Clone {
    "[a-zA-Z0-9 \\t\\n&<>'\"./:=?_-]{0,12}"
}

fn attributes() -> impl Strategy<Value = Attributes> + Clone {
    prop::collection::vec((name(), "[ -~\\n\\t]{0,10}"), 0..3)
        .prop_map(|pairs| pairs.into_iter().collect())
}

fn value() -> impl Strategy<Value = Value> {
    text().prop_map(Value::scalar).prop_recursive(3, 24, 4, |inner| {
        let children = prop::collection::vec((name(), inner), 0..3)
            .prop_map(|pairs| pairs.into_iter().collect::<Fields>());
        let block = (attributes(), text(), children).prop_map(|(attributes, text, children)| Block {
            attributes,
            text,
            children,
        });
        prop_oneof![
            block
                .clone()
                .prop_filter("a lone block needs attributes or children", |b| !b.is_text_only())
                .prop_map(Value::Block),
            prop::collection::vec(block, 2..4).prop_map(Value::List),
        ]
    })
}

fn dataset() -> impl Strategy<Value = Dataset> {
    (
        "[a-z][a-z0-9_]{0,8}",
        prop_oneof![Just(String::new()), "EDD(Grid|Table)From[A-Z][a-z]{2,8}"],
        prop::collection::vec(("x[a-z]{0,4}", "[ -~]{0,8}"), 0..2),
        prop::collection::vec(("f[a-zA-Z0-9]{0,6}", value()), 0..4),
    )
        .prop_map(|(id, kind, attributes, fields)| Dataset {
            id,
            kind,
            attributes: attributes.into_iter().collect(),
            fields: fields.into_iter().collect(),
        })
}

fn registry() -> impl Strategy<Value = Registry> {
    (
        prop::collection::vec(("s[a-zA-Z]{0,5}", value()), 0..3),
        prop::collection::vec(dataset(), 0..5),
    )
        .prop_map(|(settings, datasets)| {
            let mut registry: Registry = datasets.into_iter().collect();
            for (name, value) in settings {
                registry.set_setting(name, value);
            }
            registry
        })
}

fn load_rendered(registry: &Registry) -> Registry {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("datasets.xml");
    std::fs::write(&path, render(registry).unwrap()).unwrap();
    Registry::load_file(&path).unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn test_render_then_load_is_identity(registry in registry()) {
        let loaded = load_rendered(&registry);
        prop_assert_eq!(&loaded, &registry);
        prop_assert_eq!(render(&loaded).unwrap(), render(&registry).unwrap());
    }

    #[test]
    fn test_diff_against_self_is_unchanged(registry in registry()) {
        let copy = registry.clone();
        let changes = diff(&registry, &copy);

        prop_assert!(!changes.has_changes());
        prop_assert_eq!(changes.len(), registry.len());
        prop_assert_eq!(&registry, &copy);
    }

    #[test]
    fn test_diff_covers_union_of_ids(a in registry(), b in registry()) {
        let (a_before, b_before) = (a.clone(), b.clone());
        let changes = diff(&a, &b);

        for id in a.ids() {
            let entry = changes.get(id).unwrap();
            if !b.contains(id) {
                prop_assert_eq!(entry.status, DiffStatus::Removed);
            }
        }
        for id in b.ids() {
            let entry = changes.get(id).unwrap();
            match a.dataset(id) {
                None => prop_assert_eq!(entry.status, DiffStatus::Added),
                Some(old) if old == b.dataset(id).unwrap() => {
                    prop_assert_eq!(entry.status, DiffStatus::Unchanged)
                }
                Some(_) => prop_assert_eq!(entry.status, DiffStatus::Modified),
            }
        }
        prop_assert_eq!(a, a_before);
        prop_assert_eq!(b, b_before);
    }
}
