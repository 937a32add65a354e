use proptest::prelude::*;
use tessera_kernel::{Property, PropertyKind, PropertyValue};

fn value_strategy() -> impl Strategy<Value = PropertyValue> {
    let word = "[A-Za-z0-9_]{0,8}";
    prop_oneof![
        any::<bool>().prop_map(PropertyValue::Bool),
        any::<i64>().prop_map(PropertyValue::Int),
        (-1.0e12f64..1.0e12).prop_map(PropertyValue::Double),
        "[A-Za-z0-9_ ,.-]{0,16}".prop_map(PropertyValue::Str),
        prop::collection::vec(any::<i64>(), 0..8).prop_map(PropertyValue::IntArray),
        prop::collection::vec(-1.0e6f64..1.0e6, 0..8).prop_map(PropertyValue::DoubleArray),
        prop::collection::vec("[A-Za-z0-9_]{1,8}", 0..6).prop_map(PropertyValue::StrArray),
        word.prop_map(PropertyValue::Workspace),
    ]
}

proptest! {
    #[test]
    fn set_value_of_value_round_trips(value in value_strategy()) {
        let kind = value.kind();
        let mut original = Property::new("Prop", kind);
        original.set_typed(value).unwrap();

        let mut copy = Property::new("Prop", kind);
        copy.set_value(&original.value()).unwrap();
        prop_assert_eq!(copy.value(), original.value());

        if kind != PropertyKind::Workspace {
            prop_assert_eq!(copy.typed_value(), original.typed_value());
        }
    }

    #[test]
    fn failed_parses_never_change_the_value(text in "[a-z]{1,6}") {
        let mut prop = Property::double("Factor", 2.5);
        if prop.set_value(&text).is_err() {
            prop_assert_eq!(prop.value(), "2.5");
            prop_assert!(prop.is_default());
        }
    }
}
