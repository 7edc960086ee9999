//! String-to-value converters for path parameters

use crate::registry::Registry;
use crate::types::{Parameter, Syntax};
use ease_gateway_common::{GeneratorError, Result};
use prost_types::field_descriptor_proto::Type;

fn proto3_singular(t: Type) -> Option<&'static str> {
    Some(match t {
        Type::Double => "runtime.Float64",
        Type::Float => "runtime.Float32",
        Type::Int64 | Type::Sfixed64 | Type::Sint64 => "runtime.Int64",
        Type::Uint64 | Type::Fixed64 => "runtime.Uint64",
        Type::Int32 | Type::Sfixed32 | Type::Sint32 => "runtime.Int32",
        Type::Uint32 | Type::Fixed32 => "runtime.Uint32",
        Type::Bool => "runtime.Bool",
        Type::String => "runtime.String",
        Type::Bytes => "runtime.Bytes",
        Type::Enum => "runtime.Enum",
        Type::Group | Type::Message => return None,
    })
}

fn repeated(t: Type, with_bytes: bool) -> Option<&'static str> {
    Some(match t {
        Type::Double => "runtime.Float64Slice",
        Type::Float => "runtime.Float32Slice",
        Type::Int64 | Type::Sfixed64 | Type::Sint64 => "runtime.Int64Slice",
        Type::Uint64 | Type::Fixed64 => "runtime.Uint64Slice",
        Type::Int32 | Type::Sfixed32 | Type::Sint32 => "runtime.Int32Slice",
        Type::Uint32 | Type::Fixed32 => "runtime.Uint32Slice",
        Type::Bool => "runtime.BoolSlice",
        Type::String => "runtime.StringSlice",
        Type::Bytes if with_bytes => "runtime.BytesSlice",
        Type::Enum => "runtime.EnumSlice",
        Type::Bytes | Type::Group | Type::Message => return None,
    })
}

// proto2 scalars are pointers; there is no pointer converter for bytes.
fn proto2_singular(t: Type) -> Option<&'static str> {
    Some(match t {
        Type::Double => "runtime.Float64P",
        Type::Float => "runtime.Float32P",
        Type::Int64 | Type::Sfixed64 | Type::Sint64 => "runtime.Int64P",
        Type::Uint64 | Type::Fixed64 => "runtime.Uint64P",
        Type::Int32 | Type::Sfixed32 | Type::Sint32 => "runtime.Int32P",
        Type::Uint32 | Type::Fixed32 => "runtime.Uint32P",
        Type::Bool => "runtime.BoolP",
        Type::String => "runtime.StringP",
        Type::Enum => "runtime.EnumP",
        Type::Bytes | Type::Group | Type::Message => return None,
    })
}

fn well_known(type_name: &str) -> Option<&'static str> {
    Some(match type_name {
        ".google.protobuf.Timestamp" => "runtime.Timestamp",
        ".google.protobuf.Duration" => "runtime.Duration",
        ".google.protobuf.StringValue" => "runtime.StringValue",
        ".google.protobuf.FloatValue" => "runtime.FloatValue",
        ".google.protobuf.DoubleValue" => "runtime.DoubleValue",
        ".google.protobuf.BoolValue" => "runtime.BoolValue",
        ".google.protobuf.BytesValue" => "runtime.BytesValue",
        ".google.protobuf.Int32Value" => "runtime.Int32Value",
        ".google.protobuf.UInt32Value" => "runtime.UInt32Value",
        ".google.protobuf.Int64Value" => "runtime.Int64Value",
        ".google.protobuf.UInt64Value" => "runtime.UInt64Value",
        _ => return None,
    })
}

/// Whether `type_name` is a well-known type with its own converter
pub fn is_well_known_type(type_name: &str) -> bool {
    well_known(type_name).is_some()
}

/// Converter for a field of type `t`, falling back to the well-known
/// type table keyed by `type_name`
pub fn convert_func(proto2: bool, repeated_field: bool, t: Type, type_name: &str) -> Option<&'static str> {
    let primitive = match (proto2, repeated_field) {
        (false, false) => proto3_singular(t),
        (false, true) => repeated(t, true),
        (true, false) => proto2_singular(t),
        (true, true) => repeated(t, false),
    };
    primitive.or_else(|| well_known(type_name))
}

impl Parameter {
    /// Go expression of the function converting the raw string value of
    /// this parameter
    pub fn convert_func_expr(&self, reg: &Registry) -> Result<&'static str> {
        let target = reg.field(self.target);
        convert_func(self.is_proto2(reg), target.is_repeated(), target.r#type, &target.type_name)
            .ok_or_else(|| {
                let method = reg.method(self.method);
                GeneratorError::UnsupportedConversion {
                    wire_type: target.r#type.as_str_name().to_string(),
                    parameter: self.field_path.to_string(),
                    service: method.service_name.clone(),
                    method: method.name.clone(),
                }
            })
    }

    pub fn is_enum(&self, reg: &Registry) -> bool {
        reg.field(self.target).r#type == Type::Enum
    }

    pub fn is_repeated(&self, reg: &Registry) -> bool {
        reg.field(self.target).is_repeated()
    }

    pub fn is_proto2(&self, reg: &Registry) -> bool {
        reg.message(self.target.message).syntax == Syntax::Proto2
    }
}
