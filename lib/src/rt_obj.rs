use std::fmt;

use crate::control_command::CommandType;
use crate::value_type::ValueType;

/// A runtime object living on the output stream or the evaluation stack.
/// Unlike content-tree nodes these are owned, cloneable values.
#[derive(Clone, Debug)]
pub enum RtObj {
    Value(ValueType),
    Glue,
    Command(CommandType),
    Tag(String),
    Void,
}

impl RtObj {
    pub fn as_value(&self) -> Option<&ValueType> {
        match self {
            RtObj::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_value(self) -> Option<ValueType> {
        match self {
            RtObj::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_string_value(&self) -> Option<&crate::value_type::StringValue> {
        match self {
            RtObj::Value(ValueType::String(s)) => Some(s),
            _ => None,
        }
    }

    pub fn is_glue(&self) -> bool {
        matches!(self, RtObj::Glue)
    }

    pub fn is_command(&self, command: CommandType) -> bool {
        matches!(self, RtObj::Command(c) if *c == command)
    }

    pub fn is_newline(&self) -> bool {
        matches!(self, RtObj::Value(ValueType::String(s)) if s.is_newline)
    }

    pub fn is_non_whitespace_text(&self) -> bool {
        matches!(self, RtObj::Value(ValueType::String(s)) if s.is_non_whitespace())
    }
}

impl fmt::Display for RtObj {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RtObj::Value(v) => write!(f, "{v}"),
            RtObj::Glue => f.write_str("Glue"),
            RtObj::Command(c) => f.write_str(c.get_name()),
            RtObj::Tag(text) => write!(f, "# {text}"),
            RtObj::Void => f.write_str("Void"),
        }
    }
}
