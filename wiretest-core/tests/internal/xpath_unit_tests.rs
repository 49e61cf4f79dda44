use super::*;

use crate::xml::parse_document;

fn employees() -> XmlElement {
    parse_document(
        "<employees>\
         <employee number=\"1\"><name>John</name><age>32</age></employee>\
         <employee number=\"2\"><name>Jane</name><age>28</age></employee>\
         </employees>",
    )
    .unwrap()
}

#[test]
fn absolute_path_takes_first_match() {
    let root = employees();
    let value = evaluate(&root, "/employees/employee/name").unwrap();
    assert_eq!(value, XpathValue::Str("John".to_string()));
}

#[test]
fn descendant_axis_finds_nested_elements() {
    let root = employees();
    let value = evaluate(&root, "//name").unwrap();
    assert_eq!(value, XpathValue::Str("John".to_string()));
}

#[test]
fn attribute_step_selects_attribute_value() {
    let root = employees();
    let value = evaluate(&root, "//employee/@number").unwrap();
    assert_eq!(value, XpathValue::Str("1".to_string()));
}

#[test]
fn root_attribute_is_addressable() {
    let root = parse_document("<doc text=\"hello\"/>").unwrap();
    let value = evaluate(&root, "//doc/@text").unwrap();
    assert_eq!(value, XpathValue::Str("hello".to_string()));
}

#[test]
fn positional_step_is_one_based() {
    let root = employees();
    let value = evaluate(&root, "/employees/employee[2]/name").unwrap();
    assert_eq!(value, XpathValue::Str("Jane".to_string()));
}

#[test]
fn wildcard_step_matches_any_element() {
    let root = employees();
    let value = evaluate(&root, "node-set:/employees/*/name").unwrap();
    assert_eq!(
        value,
        XpathValue::NodeSet(vec!["John".to_string(), "Jane".to_string()])
    );
    assert_eq!(value.to_string(), "[John, Jane]");
}

#[test]
fn text_step_selects_element_text() {
    let root = employees();
    let value = evaluate(&root, "//employee[1]/name/text()").unwrap();
    assert_eq!(value, XpathValue::Str("John".to_string()));
}

#[test]
fn dot_notation_walks_child_elements() {
    let root = employees();
    let value = evaluate(&root, "employees.employee.name").unwrap();
    assert_eq!(value, XpathValue::Str("John".to_string()));
}

#[test]
fn boolean_mode_reports_existence() {
    let root = employees();
    assert_eq!(
        evaluate(&root, "boolean://employee[2]").unwrap(),
        XpathValue::Boolean(true)
    );
    assert_eq!(
        evaluate(&root, "boolean://manager").unwrap(),
        XpathValue::Boolean(false)
    );
}

#[test]
fn number_modes_parse_selected_values() {
    let root = employees();
    assert_eq!(
        evaluate(&root, "number://employee[1]/age").unwrap(),
        XpathValue::Number(32.0)
    );
    assert_eq!(
        evaluate(&root, "integer://employee[2]/age").unwrap(),
        XpathValue::Integer(28)
    );
}

#[test]
fn count_returns_match_count() {
    let root = employees();
    assert_eq!(
        evaluate(&root, "count(//employee)").unwrap(),
        XpathValue::Integer(2)
    );
    assert_eq!(
        evaluate(&root, "count(//manager)").unwrap(),
        XpathValue::Integer(0)
    );
}

#[test]
fn empty_selection_is_an_error_in_string_mode() {
    let root = employees();
    let error = evaluate(&root, "//manager/name").unwrap_err();
    assert_eq!(error, "no result for xpath expression '//manager/name'");
}

#[test]
fn non_numeric_values_cannot_convert() {
    let root = employees();
    let error = evaluate(&root, "number://employee[1]/name").unwrap_err();
    assert_eq!(
        error,
        "cannot convert result 'John' of xpath expression 'number://employee[1]/name' to a number"
    );
}

#[test]
fn malformed_expressions_are_rejected() {
    let root = employees();
    for expression in ["", "/", "//employee//", "@number", "//employee/@", "count(//employee"] {
        let error = evaluate(&root, expression).unwrap_err();
        assert_eq!(error, format!("invalid xpath expression '{expression}'"));
    }
}

#[test]
fn locations_follow_child_indexes() {
    let root = employees();
    let locations = select_locations(&root, "//employee").unwrap();
    assert_eq!(
        locations,
        vec![
            NodeLocation {
                element_path: vec![0],
                attribute: None
            },
            NodeLocation {
                element_path: vec![1],
                attribute: None
            },
        ]
    );
}

#[test]
fn attribute_locations_name_the_attribute() {
    let root = employees();
    let locations = select_locations(&root, "/employees/employee[1]/@number").unwrap();
    assert_eq!(
        locations,
        vec![NodeLocation {
            element_path: vec![0],
            attribute: Some("number".to_string())
        }]
    );
}

#[test]
fn unmatched_location_expressions_select_nothing() {
    let root = employees();
    assert!(select_locations(&root, "//manager").unwrap().is_empty());
}

#[test]
fn namespace_bindings_unify_prefixes() {
    let root = parse_document("<x:doc xmlns:x=\"urn:sample\" text=\"hello\"/>").unwrap();
    let mut namespaces = IndexMap::new();
    namespaces.insert("x".to_string(), "urn:sample".to_string());
    namespaces.insert("y".to_string(), "urn:sample".to_string());
    let value = evaluate_in(&root, "//y:doc/@text", &namespaces).unwrap();
    assert_eq!(value, XpathValue::Str("hello".to_string()));
    let unbound = evaluate(&root, "//y:doc/@text").unwrap_err();
    assert_eq!(unbound, "no result for xpath expression '//y:doc/@text'");
}
