//! Typed runtime values flowing through the evaluation stack, variables and
//! the output stream.
use std::fmt;

use crate::ink_list::InkList;
use crate::ink_list_item::InkListItem;
use crate::path::Path;
use crate::story_error::StoryError;

// Ordinals used for type promotion in native-function dispatch. Binary
// operations between mismatched kinds promote toward the higher ordinal.
pub const CAST_BOOL: u8 = 0;
pub const CAST_INT: u8 = 1;
pub const CAST_FLOAT: u8 = 2;
pub const CAST_LIST: u8 = 3;
pub const CAST_STRING: u8 = 4;
pub const CAST_DIVERT_TARGET: u8 = 5;
pub const CAST_VARIABLE_POINTER: u8 = 6;

/// A text value, remembering whether it is pure inline whitespace or a
/// single newline. The classification drives the output-stream collapsing
/// rules.
#[derive(Clone, Debug, PartialEq)]
pub struct StringValue {
    pub string: String,
    pub is_inline_whitespace: bool,
    pub is_newline: bool,
}

impl StringValue {
    pub fn new(string: String) -> StringValue {
        let is_newline = string == "\n";
        let is_inline_whitespace =
            !is_newline && string.chars().all(|c| c == ' ' || c == '\t');

        StringValue {
            string,
            is_inline_whitespace,
            is_newline,
        }
    }

    pub fn is_non_whitespace(&self) -> bool {
        !self.is_newline && !self.is_inline_whitespace
    }
}

/// A reference to a variable by name, resolved to a scope: -1 unknown yet,
/// 0 global, 1+ the 1-based call-stack element holding the temporary.
#[derive(Clone, Debug, PartialEq)]
pub struct VariablePointerValue {
    pub variable_name: String,
    pub context_index: i32,
}

impl VariablePointerValue {
    pub fn new(variable_name: &str, context_index: i32) -> VariablePointerValue {
        VariablePointerValue {
            variable_name: variable_name.to_string(),
            context_index,
        }
    }
}

/// The closed set of runtime value kinds.
#[derive(Clone, Debug, PartialEq)]
pub enum ValueType {
    Bool(bool),
    Int(i32),
    Float(f32),
    List(InkList),
    String(StringValue),
    DivertTarget(Path),
    VariablePointer(VariablePointerValue),
}

impl ValueType {
    pub fn new_string(text: &str) -> ValueType {
        ValueType::String(StringValue::new(text.to_string()))
    }

    pub fn new_variable_pointer(variable_name: &str, context_index: i32) -> ValueType {
        ValueType::VariablePointer(VariablePointerValue::new(variable_name, context_index))
    }

    pub fn new_list_from_item(item: InkListItem, value: i32) -> ValueType {
        ValueType::List(InkList::from_single_element(item, value))
    }

    pub fn cast_ordinal(&self) -> u8 {
        match self {
            ValueType::Bool(_) => CAST_BOOL,
            ValueType::Int(_) => CAST_INT,
            ValueType::Float(_) => CAST_FLOAT,
            ValueType::List(_) => CAST_LIST,
            ValueType::String(_) => CAST_STRING,
            ValueType::DivertTarget(_) => CAST_DIVERT_TARGET,
            ValueType::VariablePointer(_) => CAST_VARIABLE_POINTER,
        }
    }

    pub fn get_bool(&self) -> Option<bool> {
        match self {
            ValueType::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn get_int(&self) -> Option<i32> {
        match self {
            ValueType::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn get_float(&self) -> Option<f32> {
        match self {
            ValueType::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn get_str(&self) -> Option<&str> {
        match self {
            ValueType::String(v) => Some(&v.string),
            _ => None,
        }
    }

    pub fn get_list(&self) -> Option<&InkList> {
        match self {
            ValueType::List(v) => Some(v),
            _ => None,
        }
    }

    pub fn get_divert_target(&self) -> Option<&Path> {
        match self {
            ValueType::DivertTarget(p) => Some(p),
            _ => None,
        }
    }

    pub fn get_variable_pointer(&self) -> Option<&VariablePointerValue> {
        match self {
            ValueType::VariablePointer(vp) => Some(vp),
            _ => None,
        }
    }

    /// Truthiness as a condition. Divert targets and variable pointers are
    /// not conditions; treating them as one is a script error.
    pub fn is_truthy(&self) -> Result<bool, StoryError> {
        match self {
            ValueType::Bool(v) => Ok(*v),
            ValueType::Int(v) => Ok(*v != 0),
            ValueType::Float(v) => Ok(*v != 0.0),
            ValueType::List(l) => Ok(l.count() > 0),
            ValueType::String(s) => Ok(!s.string.is_empty()),
            ValueType::DivertTarget(_) => Err(StoryError::InvalidStoryState(
                "Shouldn't use a divert target as a conditional value.".to_string(),
            )),
            ValueType::VariablePointer(_) => Err(StoryError::InvalidStoryState(
                "Shouldn't use a variable pointer as a conditional value.".to_string(),
            )),
        }
    }

    /// Converts this value to the kind with cast ordinal `dest`. `Ok(None)`
    /// means no cast was needed. A string that does not lexically parse as
    /// the numeric destination also yields `Ok(None)` rather than an error.
    pub fn cast(&self, dest: u8) -> Result<Option<ValueType>, StoryError> {
        if dest == self.cast_ordinal() {
            return Ok(None);
        }

        let result = match self {
            ValueType::Bool(v) => match dest {
                CAST_INT => Some(ValueType::Int(if *v { 1 } else { 0 })),
                CAST_FLOAT => Some(ValueType::Float(if *v { 1.0 } else { 0.0 })),
                CAST_STRING => Some(ValueType::new_string(if *v { "true" } else { "false" })),
                _ => return Err(self.bad_cast(dest)),
            },
            ValueType::Int(v) => match dest {
                CAST_BOOL => Some(ValueType::Bool(*v != 0)),
                CAST_FLOAT => Some(ValueType::Float(*v as f32)),
                CAST_STRING => Some(ValueType::new_string(&v.to_string())),
                _ => return Err(self.bad_cast(dest)),
            },
            ValueType::Float(v) => match dest {
                CAST_BOOL => Some(ValueType::Bool(*v != 0.0)),
                CAST_INT => Some(ValueType::Int(*v as i32)),
                CAST_STRING => Some(ValueType::new_string(&v.to_string())),
                _ => return Err(self.bad_cast(dest)),
            },
            ValueType::String(s) => match dest {
                CAST_INT => s.string.trim().parse::<i32>().ok().map(ValueType::Int),
                CAST_FLOAT => s.string.trim().parse::<f32>().ok().map(ValueType::Float),
                _ => return Err(self.bad_cast(dest)),
            },
            ValueType::List(l) => match dest {
                CAST_INT => Some(ValueType::Int(
                    l.max_item().map(|(_, v)| v).unwrap_or(0),
                )),
                CAST_FLOAT => Some(ValueType::Float(
                    l.max_item().map(|(_, v)| v).unwrap_or(0) as f32,
                )),
                CAST_STRING => Some(ValueType::new_string(
                    l.max_item()
                        .map(|(item, _)| item.get_item_name().to_string())
                        .unwrap_or_default()
                        .as_str(),
                )),
                _ => return Err(self.bad_cast(dest)),
            },
            ValueType::DivertTarget(_) | ValueType::VariablePointer(_) => {
                return Err(self.bad_cast(dest))
            }
        };

        Ok(result)
    }

    fn bad_cast(&self, dest: u8) -> StoryError {
        StoryError::InvalidStoryState(format!(
            "Can't cast {self} to type ordinal {dest}"
        ))
    }

    pub fn coerce_to_bool(&self) -> Result<bool, StoryError> {
        self.is_truthy()
    }

    pub fn coerce_to_int(&self) -> Result<i32, StoryError> {
        match self {
            ValueType::Bool(v) => Ok(if *v { 1 } else { 0 }),
            ValueType::Int(v) => Ok(*v),
            ValueType::Float(v) => Ok(*v as i32),
            _ => Err(StoryError::InvalidStoryState(
                "Failed to cast to int".to_string(),
            )),
        }
    }

    pub fn coerce_to_float(&self) -> Result<f32, StoryError> {
        match self {
            ValueType::Bool(v) => Ok(if *v { 1.0 } else { 0.0 }),
            ValueType::Int(v) => Ok(*v as f32),
            ValueType::Float(v) => Ok(*v),
            _ => Err(StoryError::InvalidStoryState(
                "Failed to cast to float".to_string(),
            )),
        }
    }

    pub fn coerce_to_string(&self) -> Result<String, StoryError> {
        Ok(self.to_string())
    }

    /// When overwriting a list variable with an empty list, keep the old
    /// value's origin names so the emptied variable can still be related
    /// back to its definition.
    pub fn retain_list_origins_for_assignment(old_value: &ValueType, new_value: &mut ValueType) {
        if let (ValueType::List(old_list), ValueType::List(new_list)) = (old_value, new_value) {
            if new_list.items.is_empty() {
                new_list.set_initial_origin_names(old_list.get_origin_names());
            }
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Bool(v) => write!(f, "{v}"),
            ValueType::Int(v) => write!(f, "{v}"),
            ValueType::Float(v) => write!(f, "{v}"),
            ValueType::List(l) => write!(f, "{l}"),
            ValueType::String(s) => write!(f, "{}", s.string),
            ValueType::DivertTarget(p) => write!(f, "DivertTargetValue({p})"),
            ValueType::VariablePointer(vp) => write!(f, "VariablePointerValue({})", vp.variable_name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_whitespace_classification() {
        assert!(ValueType::new_string("hello").get_str().is_some());

        let ws = StringValue::new("  \t".to_string());
        assert!(ws.is_inline_whitespace);
        assert!(!ws.is_newline);

        let nl = StringValue::new("\n".to_string());
        assert!(nl.is_newline);
        assert!(!nl.is_non_whitespace());
    }

    #[test]
    fn numeric_casts() {
        let five = ValueType::Int(5);
        assert_eq!(
            Some(ValueType::Float(5.0)),
            five.cast(CAST_FLOAT).unwrap()
        );
        assert_eq!(None, five.cast(CAST_INT).unwrap());

        let text = ValueType::new_string("3");
        assert_eq!(Some(ValueType::Int(3)), text.cast(CAST_INT).unwrap());

        // Unparsable strings are "no value", not an error.
        let word = ValueType::new_string("three");
        assert_eq!(None, word.cast(CAST_INT).unwrap());
    }

    #[test]
    fn divert_target_rejects_truthiness() {
        let target = ValueType::DivertTarget(crate::path::Path::from_components_string("a.b"));
        assert!(target.is_truthy().is_err());
        assert!(target.cast(CAST_INT).is_err());
    }
}
