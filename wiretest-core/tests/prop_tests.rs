//! Property tests over the pure kernels: masking, dynamic-content
//! resolution, message building and selection.

use std::collections::BTreeMap;

use proptest::prelude::*;

use wiretest_core::endpoint::MessageSelector;
use wiretest_core::masking::{DEFAULT_KEYWORDS, MASKED_VALUE};
use wiretest_core::{LogModifier, Message, MessageBuilder, MessageType, TestContext};
use wiretest_test_support as _;

fn keyword() -> impl Strategy<Value = &'static str> {
    proptest::sample::select(DEFAULT_KEYWORDS.to_vec())
}

/// One of the four shapes the modifier knows, carrying a digit-only secret
/// so the raw value cannot collide with the surrounding template.
fn secret_bearing_text() -> impl Strategy<Value = (String, String)> {
    (keyword(), "[0-9]{4,16}").prop_flat_map(|(keyword, value)| {
        let shapes = vec![
            format!("user=jane&{keyword}={value}&lang=en"),
            format!("<login><user>jane</user><{keyword}>{value}</{keyword}></login>"),
            format!(r#"{{"user": "jane", "{keyword}": "{value}"}}"#),
            format!("user: jane\n{keyword}: {value}\nlang: en"),
        ];
        (proptest::sample::select(shapes), Just(value))
    })
}

fn identifier() -> impl Strategy<Value = String> {
    "[a-zA-Z][a-zA-Z0-9_]{0,12}"
}

fn header_map() -> impl Strategy<Value = BTreeMap<String, String>> {
    proptest::collection::btree_map("[a-z]{1,8}", "[a-z]{1,8}", 1..=4)
}

proptest! {
    #[test]
    fn masking_is_idempotent_for_any_text(text in any::<String>()) {
        let modifier = LogModifier::default();
        let once = modifier.mask(&text);
        prop_assert_eq!(modifier.mask(&once), once);
    }

    #[test]
    fn secret_values_never_survive_masking((text, value) in secret_bearing_text()) {
        let masked = LogModifier::default().mask(&text);
        prop_assert!(masked.contains(MASKED_VALUE), "not masked: {masked}");
        prop_assert!(!masked.contains(&value), "value leaked: {masked}");
    }

    #[test]
    fn stored_variables_resolve_anywhere_in_text(name in identifier(), value in "[^$:]*") {
        let mut context = TestContext::new();
        context
            .set_variable(name.clone(), value.clone())
            .expect("set variable");
        let resolved = context
            .replace_dynamic_content(&format!("before ${{{name}}} after"))
            .expect("resolve");
        prop_assert_eq!(resolved, format!("before {value} after"));
    }

    #[test]
    fn escaped_variable_expressions_render_literally(name in identifier()) {
        let context = TestContext::new();
        let resolved = context
            .replace_dynamic_content(&format!("${{//{name}//}}"))
            .expect("resolve");
        prop_assert_eq!(resolved, format!("${{{name}}}"));
    }

    #[test]
    fn expression_free_text_passes_through(text in "[^$:]*") {
        let context = TestContext::new();
        let resolved = context.replace_dynamic_content(&text).expect("resolve");
        prop_assert_eq!(resolved, text);
    }

    #[test]
    fn upper_case_function_uppercases_any_ascii_word(input in "[a-z]{1,12}") {
        let context = TestContext::new();
        let resolved = context
            .replace_dynamic_content(&format!("wiretest:upperCase({input})"))
            .expect("resolve");
        prop_assert_eq!(resolved, input.to_uppercase());
    }

    #[test]
    fn random_number_emits_exactly_the_requested_digits(digits in 1usize..=32) {
        let context = TestContext::new();
        let resolved = context
            .replace_dynamic_content(&format!("wiretest:randomNumber({digits})"))
            .expect("resolve");
        prop_assert_eq!(resolved.len(), digits);
        prop_assert!(resolved.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn header_registration_order_never_changes_resolved_values(
        headers in header_map(),
        value in "[a-z]{1,10}",
    ) {
        let mut context = TestContext::new();
        context.set_variable("item", value.clone()).expect("set variable");

        let forward = headers.iter().fold(
            MessageBuilder::new().with_payload("order ${item}"),
            |builder, (name, header_value)| {
                builder.with_header(name.clone(), format!("{header_value}-${{item}}"))
            },
        );
        let reversed = headers.iter().rev().fold(
            MessageBuilder::new().with_payload("order ${item}"),
            |builder, (name, header_value)| {
                builder.with_header(name.clone(), format!("{header_value}-${{item}}"))
            },
        );

        let first = forward.build(&context, MessageType::Plaintext).expect("build");
        let second = reversed.build(&context, MessageType::Plaintext).expect("build");
        prop_assert_eq!(first.payload(), format!("order {value}"));
        prop_assert_eq!(first.payload(), second.payload());
        for (name, header_value) in &headers {
            let expected = format!("{header_value}-{value}");
            prop_assert_eq!(first.header(name), Some(expected.as_str()));
            prop_assert_eq!(second.header(name), Some(expected.as_str()));
        }
    }

    #[test]
    fn selectors_match_messages_carrying_their_headers(headers in header_map()) {
        let mut selector = MessageSelector::default();
        let mut message = Message::new("payload").with_header("noise", "x");
        for (name, value) in &headers {
            selector = selector.with_header(name.clone(), value.clone());
            message = message.with_header(name.clone(), value.clone());
        }
        prop_assert!(selector.matches(&message));

        let (first_name, first_value) = headers.iter().next().expect("nonempty map");
        let tampered = message.with_header(first_name.clone(), format!("{first_value}x"));
        prop_assert!(!selector.matches(&tampered));
    }

    #[test]
    fn empty_selectors_match_any_message(headers in header_map()) {
        let mut message = Message::new("payload");
        for (name, value) in &headers {
            message = message.with_header(name.clone(), value.clone());
        }
        prop_assert!(MessageSelector::default().matches(&message));
    }
}
