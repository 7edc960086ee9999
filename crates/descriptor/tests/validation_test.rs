//! Integration tests for rule propagation through the message graph

use ease_gateway_common::options::{OperatorType, ValidationRule, ValueType};
use ease_gateway_descriptor::{Annotations, Registry, RuleAnalyzer, SourceFile};
use prost_types::field_descriptor_proto::{Label, Type};
use prost_types::{DescriptorProto, FieldDescriptorProto, FileDescriptorProto, MessageOptions};

fn field(name: &str, number: i32, label: Label, r#type: Type, type_name: Option<&str>) -> FieldDescriptorProto {
    FieldDescriptorProto {
        name: Some(name.to_string()),
        number: Some(number),
        label: Some(label as i32),
        r#type: Some(r#type as i32),
        type_name: type_name.map(String::from),
        ..Default::default()
    }
}

/// `message Tree { map<string, Tree> children = 1; Leaf leaf = 2; }`
fn tree_file() -> FileDescriptorProto {
    let entry = DescriptorProto {
        name: Some("ChildrenEntry".to_string()),
        field: vec![
            field("key", 1, Label::Optional, Type::String, None),
            field("value", 2, Label::Optional, Type::Message, Some(".tree.Tree")),
        ],
        options: Some(MessageOptions {
            map_entry: Some(true),
            ..Default::default()
        }),
        ..Default::default()
    };

    FileDescriptorProto {
        name: Some("tree.proto".to_string()),
        package: Some("tree".to_string()),
        syntax: Some("proto3".to_string()),
        message_type: vec![
            DescriptorProto {
                name: Some("Tree".to_string()),
                field: vec![
                    field(
                        "children",
                        1,
                        Label::Repeated,
                        Type::Message,
                        Some(".tree.Tree.ChildrenEntry"),
                    ),
                    field("leaf", 2, Label::Optional, Type::Message, Some(".tree.Leaf")),
                ],
                nested_type: vec![entry],
                ..Default::default()
            },
            DescriptorProto {
                name: Some("Leaf".to_string()),
                field: vec![field("label", 1, Label::Optional, Type::String, None)],
                ..Default::default()
            },
        ],
        ..Default::default()
    }
}

fn length_rule() -> Vec<ValidationRule> {
    vec![ValidationRule {
        operator: OperatorType::LenGt as i32,
        r#type: ValueType::Number as i32,
        value: "0".to_string(),
        ..Default::default()
    }]
}

#[test]
fn test_cycle_through_map_without_rules_terminates() {
    let mut reg = Registry::new();
    reg.load(vec![SourceFile::new(tree_file())]).unwrap();

    let tree = reg.lookup_message("", ".tree.Tree").unwrap();
    let mut analyzer = RuleAnalyzer::new();
    assert!(!analyzer.has_rule(&reg, tree));
    // Memoized pairs are not re-evaluated.
    let memoized = analyzer.len();
    assert!(!analyzer.has_rule(&reg, tree));
    assert_eq!(analyzer.len(), memoized);
}

#[test]
fn test_cycle_through_map_with_rule() {
    let mut annotations = Annotations::default();
    annotations
        .fields
        .insert(".tree.Leaf.label".to_string(), length_rule());

    let mut reg = Registry::new();
    reg.load(vec![SourceFile::with_annotations(tree_file(), annotations)])
        .unwrap();

    let tree = reg.lookup_message("", ".tree.Tree").unwrap();
    let entry = reg.lookup_message("", ".tree.Tree.ChildrenEntry").unwrap();
    let mut analyzer = RuleAnalyzer::new();
    assert!(analyzer.has_rule(&reg, tree));
    assert!(analyzer.has_rule(&reg, entry));

    let leaf = reg.message(reg.lookup_message("", ".tree.Leaf").unwrap());
    assert!(leaf.fields[0].rules[0].is_length());
}

#[test]
fn test_rule_propagates_across_packages() {
    let b = FileDescriptorProto {
        name: Some("b/b.proto".to_string()),
        package: Some("b".to_string()),
        syntax: Some("proto3".to_string()),
        message_type: vec![DescriptorProto {
            name: Some("B".to_string()),
            field: vec![field("name", 1, Label::Optional, Type::String, None)],
            ..Default::default()
        }],
        ..Default::default()
    };
    let a = FileDescriptorProto {
        name: Some("a/a.proto".to_string()),
        package: Some("a".to_string()),
        syntax: Some("proto3".to_string()),
        dependency: vec!["b/b.proto".to_string()],
        message_type: vec![DescriptorProto {
            name: Some("A".to_string()),
            field: vec![field("b", 1, Label::Optional, Type::Message, Some(".b.B"))],
            ..Default::default()
        }],
        ..Default::default()
    };

    let mut annotations = Annotations::default();
    annotations
        .fields
        .insert(".b.B.name".to_string(), length_rule());

    let mut reg = Registry::new();
    reg.load(vec![
        SourceFile::with_annotations(b, annotations),
        SourceFile::new(a),
    ])
    .unwrap();

    let a = reg.lookup_message("", ".a.A").unwrap();
    let mut analyzer = RuleAnalyzer::new();
    assert!(analyzer.has_rule(&reg, a));
    assert_eq!(reg.message(a).validation_method_name(), "Validate__a_A");
}
