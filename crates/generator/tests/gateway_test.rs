//! Integration tests for gateway file generation

use ease_gateway_common::options::{
    http_rule::Pattern, HttpRule, OperatorType, ServiceSpec, ValidationRule, ValueType,
};
use ease_gateway_descriptor::{
    decode_request, Annotations, MethodAnnotation, Registry, Request, SourceFile,
};
use ease_gateway_generator::{generate_from_request, GatewayGenerator, GeneratorConfig};
use prost::Message;
use prost_types::compiler::CodeGeneratorRequest;
use prost_types::field_descriptor_proto::{Label, Type};
use prost_types::{
    DescriptorProto, EnumDescriptorProto, EnumValueDescriptorProto, FieldDescriptorProto,
    FileDescriptorProto, FileOptions, MethodDescriptorProto, ServiceDescriptorProto,
};

fn field(name: &str, number: i32, r#type: Type, type_name: Option<&str>) -> FieldDescriptorProto {
    FieldDescriptorProto {
        name: Some(name.to_string()),
        number: Some(number),
        label: Some(Label::Optional as i32),
        r#type: Some(r#type as i32),
        type_name: type_name.map(String::from),
        ..Default::default()
    }
}

fn method(name: &str, input: &str, output: &str) -> MethodDescriptorProto {
    MethodDescriptorProto {
        name: Some(name.to_string()),
        input_type: Some(input.to_string()),
        output_type: Some(output.to_string()),
        ..Default::default()
    }
}

fn get(path: &str) -> MethodAnnotation {
    MethodAnnotation {
        http: Some(HttpRule {
            pattern: Some(Pattern::Get(path.to_string())),
            ..Default::default()
        }),
        api: None,
    }
}

fn echo_file() -> FileDescriptorProto {
    FileDescriptorProto {
        name: Some("echo/echo.proto".to_string()),
        package: Some("echo".to_string()),
        syntax: Some("proto3".to_string()),
        options: Some(FileOptions {
            go_package: Some("example.com/echo;echo".to_string()),
            ..Default::default()
        }),
        message_type: vec![DescriptorProto {
            name: Some("EchoMessage".to_string()),
            field: vec![field("id", 1, Type::String, None)],
            ..Default::default()
        }],
        service: vec![ServiceDescriptorProto {
            name: Some("EchoService".to_string()),
            method: vec![method("Echo", ".echo.EchoMessage", ".echo.EchoMessage")],
            ..Default::default()
        }],
        ..Default::default()
    }
}

fn echo_request() -> Request {
    let mut annotations = Annotations::default();
    annotations
        .methods
        .insert(".echo.EchoService.Echo".to_string(), get("/v1/echo/{id}"));
    annotations.services.insert(
        ".echo.EchoService".to_string(),
        ServiceSpec {
            service_id: "echo-service".to_string(),
            port_name: "grpc".to_string(),
            namespace: "default".to_string(),
            ..Default::default()
        },
    );

    Request {
        file_to_generate: vec!["echo/echo.proto".to_string()],
        parameter: None,
        files: vec![SourceFile::with_annotations(echo_file(), annotations)],
    }
}

/// `b.B` carries a rule and `b.Kind` is an enum; `a.ASvc` binds two
/// methods whose request references both.
fn cross_package_files() -> Vec<SourceFile> {
    let b = FileDescriptorProto {
        name: Some("b/b.proto".to_string()),
        package: Some("b".to_string()),
        syntax: Some("proto3".to_string()),
        options: Some(FileOptions {
            go_package: Some("example.com/b;b".to_string()),
            ..Default::default()
        }),
        message_type: vec![DescriptorProto {
            name: Some("B".to_string()),
            field: vec![field("name", 1, Type::String, None)],
            ..Default::default()
        }],
        enum_type: vec![EnumDescriptorProto {
            name: Some("Kind".to_string()),
            value: vec![EnumValueDescriptorProto {
                name: Some("KIND_UNSPECIFIED".to_string()),
                number: Some(0),
                ..Default::default()
            }],
            ..Default::default()
        }],
        ..Default::default()
    };
    let mut b_annotations = Annotations::default();
    b_annotations.fields.insert(
        ".b.B.name".to_string(),
        vec![ValidationRule {
            operator: OperatorType::LenGt as i32,
            r#type: ValueType::Number as i32,
            value: "0".to_string(),
            ..Default::default()
        }],
    );

    let a = FileDescriptorProto {
        name: Some("a/a.proto".to_string()),
        package: Some("a".to_string()),
        syntax: Some("proto3".to_string()),
        dependency: vec!["b/b.proto".to_string()],
        options: Some(FileOptions {
            go_package: Some("example.com/a;a".to_string()),
            ..Default::default()
        }),
        message_type: vec![DescriptorProto {
            name: Some("A".to_string()),
            field: vec![
                field("b", 1, Type::Message, Some(".b.B")),
                field("kind", 2, Type::Enum, Some(".b.Kind")),
            ],
            ..Default::default()
        }],
        service: vec![ServiceDescriptorProto {
            name: Some("ASvc".to_string()),
            method: vec![method("Get", ".a.A", ".a.A"), method("List", ".a.A", ".a.A")],
            ..Default::default()
        }],
        ..Default::default()
    };
    let mut a_annotations = Annotations::default();
    a_annotations
        .methods
        .insert(".a.ASvc.Get".to_string(), get("/v1/a/{kind}"));
    a_annotations
        .methods
        .insert(".a.ASvc.List".to_string(), get("/v1/a/{kind}/list"));

    vec![
        SourceFile::with_annotations(b, b_annotations),
        SourceFile::with_annotations(a, a_annotations),
    ]
}

/// `a.A` reaches the rules of `b.B` only through its message field.
fn validated_field_files() -> Vec<SourceFile> {
    let mut files = cross_package_files();
    let a = &mut files[1].proto;
    a.message_type[0].field = vec![
        field("b", 1, Type::Message, Some(".b.B")),
        field("id", 2, Type::String, None),
    ];
    a.service[0].method.truncate(1);
    files[1].annotations.methods.clear();
    files[1]
        .annotations
        .methods
        .insert(".a.ASvc.Get".to_string(), get("/v1/a/{id}"));
    files
}

/// Whether `code` uses `pkg` as a qualifier, as in `pkg.Name`
fn references(code: &str, pkg: &str) -> bool {
    let needle = format!("{}.", pkg);
    code.match_indices(&needle).any(|(at, _)| {
        code[..at]
            .chars()
            .next_back()
            .map_or(true, |c| !(c.is_alphanumeric() || c == '_'))
    })
}

#[test]
fn test_generate_echo_gateway() {
    let files = generate_from_request(echo_request()).unwrap();
    assert_eq!(files.len(), 1);

    let file = &files[0];
    assert_eq!(file.name, "example.com/echo/echo.pb.gw.go");

    let content = &file.content;
    assert!(content.contains("package echo\n"));
    assert!(content.contains("func request_EchoService_Echo_0("));
    assert!(content.contains("var protoReq EchoMessage"));
    assert!(content.contains("val, ok := pathParams[\"id\"]"));
    assert!(content.contains("protoReq.Id, err = runtime.String(val)"));
    assert!(content.contains("filter_EchoService_Echo_0 = utilities.NewDoubleArray"));
    assert!(content.contains("func RegisterEchoServiceHandlerClient("));
    assert!(content.contains("context.WithCancel(req.Context())"));
    assert!(content.contains(
        "pattern_EchoService_Echo_0 = runtime.MustPattern(runtime.NewPattern(\"/v1/echo/{id}\"))"
    ));
    assert!(content.contains("ServiceName: \"echo-service\""));
    assert!(content.contains("runtime.AddMethod(spec, \"EchoService\", \"Echo\""));
    assert!(content.contains("skypb \"github.com/binchencoder/skylb-api/proto\""));
}

#[test]
fn test_parameter_controls_output() {
    let mut request = echo_request();
    request.parameter =
        Some("paths=source_relative,request_context=false,register_func_suffix=Gateway".to_string());

    let files = generate_from_request(request).unwrap();
    assert_eq!(files[0].name, "echo/echo.pb.gw.go");
    assert!(files[0].content.contains("func RegisterEchoServiceGatewayClient("));
    assert!(files[0].content.contains("context.WithCancel(ctx)"));
}

#[test]
fn test_invalid_parameter_is_rejected() {
    let mut request = echo_request();
    request.parameter = Some("no_such_option=1".to_string());
    assert!(generate_from_request(request).is_err());
}

#[test]
fn test_file_without_bindings_is_skipped() {
    let request = Request {
        file_to_generate: vec!["echo/echo.proto".to_string()],
        parameter: None,
        files: vec![SourceFile::new(echo_file())],
    };
    assert!(generate_from_request(request).unwrap().is_empty());
}

#[test]
fn test_unknown_target_file_fails() {
    let mut request = echo_request();
    request.file_to_generate.push("missing.proto".to_string());
    assert!(generate_from_request(request).is_err());
}

#[test]
fn test_generation_is_deterministic() {
    let first = generate_from_request(echo_request()).unwrap();
    let second = generate_from_request(echo_request()).unwrap();
    assert_eq!(first, second);

    let request = || Request {
        file_to_generate: vec!["a/a.proto".to_string()],
        parameter: None,
        files: cross_package_files(),
    };
    assert_eq!(
        generate_from_request(request()).unwrap(),
        generate_from_request(request()).unwrap()
    );
}

#[test]
fn test_cross_package_imports() {
    let mut reg = Registry::new();
    let mut generator = GatewayGenerator::new(&mut reg, GeneratorConfig::default()).unwrap();
    reg.load(cross_package_files()).unwrap();
    let a = reg.lookup_file("a/a.proto").unwrap();

    let params = generator.params(&reg, a).unwrap();
    let imported = params
        .imports
        .iter()
        .filter(|i| i.path == "example.com/b")
        .count();
    assert_eq!(imported, 1);
    assert!(params.imports.iter().all(|i| i.path != "example.com/a"));

    let method = &params.file.services[0].methods[0];
    assert!(method.validation.is_some());
    let param = &method.bindings[0].path_params[0];
    assert!(param.is_enum);
    assert_eq!(param.convert_func, "runtime.Enum");
    assert_eq!(param.enum_type.as_deref(), Some("b.Kind"));

    let files = generator.generate(&reg, &[a]).unwrap();
    let content = &files[0].content;
    assert_eq!(content.matches("\"example.com/b\"").count(), 1);
    assert!(content.contains("e, err := runtime.Enum(val, b.Kind_value)"));
    assert!(content.contains("protoReq.Kind = b.Kind(e)"));
}

#[test]
fn test_params_serialize_for_inspection() {
    let request = echo_request();
    let mut reg = Registry::new();
    let mut generator = GatewayGenerator::new(&mut reg, GeneratorConfig::default()).unwrap();
    reg.load(request.files).unwrap();
    let echo = reg.lookup_file("echo/echo.proto").unwrap();

    let params = generator.params(&reg, echo).unwrap();
    let json = serde_json::to_value(&params).unwrap();
    assert_eq!(json["file"]["go_package"]["name"], "echo");
    assert_eq!(
        json["file"]["services"][0]["methods"][0]["bindings"][0]["http_method"],
        "GET"
    );
}

#[test]
fn test_decoded_plugin_request() {
    let request = CodeGeneratorRequest {
        file_to_generate: vec!["echo/echo.proto".to_string()],
        parameter: Some("allow_delete_body".to_string()),
        proto_file: vec![echo_file()],
        ..Default::default()
    };

    let decoded = decode_request(&request.encode_to_vec()).unwrap();
    assert_eq!(decoded.parameter.as_deref(), Some("allow_delete_body"));
    // No HTTP rule options on the wire, so nothing is bound.
    assert!(generate_from_request(decoded).unwrap().is_empty());
}

#[test]
fn test_every_import_is_referenced() {
    let check = |files: Vec<SourceFile>, target: &str| {
        let mut reg = Registry::new();
        let mut generator = GatewayGenerator::new(&mut reg, GeneratorConfig::default()).unwrap();
        reg.load(files).unwrap();
        let file = reg.lookup_file(target).unwrap();

        let params = generator.params(&reg, file).unwrap();
        let generated = generator.generate(&reg, &[file]).unwrap();
        let (_, code) = generated[0].content.split_once("\n)\n").unwrap();
        for import in &params.imports {
            assert!(
                references(code, &import.pkg),
                "{} imported as {} but never used in {}",
                import.path,
                import.pkg,
                target
            );
        }
    };

    check(echo_request().files, "echo/echo.proto");
    check(cross_package_files(), "a/a.proto");
    check(validated_field_files(), "a/a.proto");
}

#[test]
fn test_validated_field_package_is_imported() {
    let mut reg = Registry::new();
    let mut generator = GatewayGenerator::new(&mut reg, GeneratorConfig::default()).unwrap();
    reg.load(validated_field_files()).unwrap();
    let a = reg.lookup_file("a/a.proto").unwrap();

    let params = generator.params(&reg, a).unwrap();
    let imported = params
        .imports
        .iter()
        .filter(|i| i.path == "example.com/b")
        .count();
    assert_eq!(imported, 1);

    let method = &params.file.services[0].methods[0];
    assert_eq!(method.validation.as_deref(), Some("Validate_A"));
    assert_eq!(method.field_validations, vec!["b.Validate_B"]);
    assert!(method.bindings[0].path_params.iter().all(|p| !p.is_enum));

    let files = generator.generate(&reg, &[a]).unwrap();
    let content = &files[0].content;
    assert_eq!(content.matches("\"example.com/b\"").count(), 1);
    assert!(content.contains("var _ = b.Validate_B"));
    assert!(content.contains("if err := Validate_A(&protoReq); err != nil {"));
}
