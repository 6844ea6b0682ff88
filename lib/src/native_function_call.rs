//! The native operator library: table-driven dispatch over runtime value
//! kinds with type promotion.
use crate::ink_list::InkList;
use crate::list_definitions_origin::ListDefinitionsOrigin;
use crate::story_error::StoryError;
use crate::value_type::{
    ValueType, CAST_DIVERT_TARGET, CAST_FLOAT, CAST_INT, CAST_LIST, CAST_STRING,
};

pub const ADD: &str = "+";
pub const SUBTRACT: &str = "-";
pub const DIVIDE: &str = "/";
pub const MULTIPLY: &str = "*";
pub const MOD: &str = "%";
pub const NEGATE: &str = "_";
pub const EQUAL: &str = "==";
pub const GREATER: &str = ">";
pub const LESS: &str = "<";
pub const GREATER_THAN_OR_EQUALS: &str = ">=";
pub const LESS_THAN_OR_EQUALS: &str = "<=";
pub const NOT_EQUALS: &str = "!=";
pub const NOT: &str = "!";
pub const AND: &str = "&&";
pub const OR: &str = "||";
pub const MIN: &str = "MIN";
pub const MAX: &str = "MAX";
pub const POW: &str = "POW";
pub const FLOOR: &str = "FLOOR";
pub const CEILING: &str = "CEILING";
pub const INT: &str = "INT";
pub const FLOAT: &str = "FLOAT";
pub const HAS: &str = "?";
pub const HASNT: &str = "!?";
pub const INTERSECT: &str = "^";
pub const LIST_MIN: &str = "LIST_MIN";
pub const LIST_MAX: &str = "LIST_MAX";
pub const LIST_ALL: &str = "LIST_ALL";
pub const LIST_COUNT: &str = "LIST_COUNT";
pub const LIST_VALUE: &str = "LIST_VALUE";
pub const LIST_INVERT: &str = "LIST_INVERT";

/// One native operator of the expression machine.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Op {
    Add,
    Subtract,
    Divide,
    Multiply,
    Mod,
    Negate,
    Equal,
    Greater,
    Less,
    GreaterThanOrEquals,
    LessThanOrEquals,
    NotEquals,
    Not,
    And,
    Or,
    Min,
    Max,
    Pow,
    Floor,
    Ceiling,
    Int,
    Float,
    Has,
    Hasnt,
    Intersect,
    ListMin,
    ListMax,
    ListAll,
    ListCount,
    ListValue,
    ListInvert,
}

impl Op {
    pub fn new_from_name(name: &str) -> Option<Op> {
        let op = match name {
            ADD => Op::Add,
            SUBTRACT => Op::Subtract,
            DIVIDE => Op::Divide,
            MULTIPLY => Op::Multiply,
            MOD => Op::Mod,
            NEGATE => Op::Negate,
            EQUAL => Op::Equal,
            GREATER => Op::Greater,
            LESS => Op::Less,
            GREATER_THAN_OR_EQUALS => Op::GreaterThanOrEquals,
            LESS_THAN_OR_EQUALS => Op::LessThanOrEquals,
            NOT_EQUALS => Op::NotEquals,
            NOT => Op::Not,
            AND => Op::And,
            OR => Op::Or,
            MIN => Op::Min,
            MAX => Op::Max,
            POW => Op::Pow,
            FLOOR => Op::Floor,
            CEILING => Op::Ceiling,
            INT => Op::Int,
            FLOAT => Op::Float,
            HAS => Op::Has,
            HASNT => Op::Hasnt,
            INTERSECT => Op::Intersect,
            LIST_MIN => Op::ListMin,
            LIST_MAX => Op::ListMax,
            LIST_ALL => Op::ListAll,
            LIST_COUNT => Op::ListCount,
            LIST_VALUE => Op::ListValue,
            LIST_INVERT => Op::ListInvert,
        _ => return None,
        };

        Some(op)
    }

    pub fn get_name(&self) -> &'static str {
        match self {
            Op::Add => ADD,
            Op::Subtract => SUBTRACT,
            Op::Divide => DIVIDE,
            Op::Multiply => MULTIPLY,
            Op::Mod => MOD,
            Op::Negate => NEGATE,
            Op::Equal => EQUAL,
            Op::Greater => GREATER,
            Op::Less => LESS,
            Op::GreaterThanOrEquals => GREATER_THAN_OR_EQUALS,
            Op::LessThanOrEquals => LESS_THAN_OR_EQUALS,
            Op::NotEquals => NOT_EQUALS,
            Op::Not => NOT,
            Op::And => AND,
            Op::Or => OR,
            Op::Min => MIN,
            Op::Max => MAX,
            Op::Pow => POW,
            Op::Floor => FLOOR,
            Op::Ceiling => CEILING,
            Op::Int => INT,
            Op::Float => FLOAT,
            Op::Has => HAS,
            Op::Hasnt => HASNT,
            Op::Intersect => INTERSECT,
            Op::ListMin => LIST_MIN,
            Op::ListMax => LIST_MAX,
            Op::ListAll => LIST_ALL,
            Op::ListCount => LIST_COUNT,
            Op::ListValue => LIST_VALUE,
            Op::ListInvert => LIST_INVERT,
        }
    }

    pub fn get_number_of_parameters(&self) -> usize {
        match self {
            Op::Negate
            | Op::Not
            | Op::Floor
            | Op::Ceiling
            | Op::Int
            | Op::Float
            | Op::ListMin
            | Op::ListMax
            | Op::ListAll
            | Op::ListCount
            | Op::ListValue
            | Op::ListInvert => 1,
            _ => 2,
        }
    }

    /// Evaluates this operator over already-popped operands. The dispatch
    /// order is: binary list special cases first, then promotion of all
    /// operands to the highest cast ordinal present, then the per-type
    /// implementation.
    pub fn call(
        &self,
        params: Vec<ValueType>,
        list_defs: &ListDefinitionsOrigin,
    ) -> Result<ValueType, StoryError> {
        if params.len() != self.get_number_of_parameters() {
            return Err(StoryError::InvalidStoryState(
                "Unexpected number of parameters".to_string(),
            ));
        }

        let has_list = params.iter().any(|p| matches!(p, ValueType::List(_)));

        if params.len() == 2 && has_list {
            return self.call_binary_list_operation(params, list_defs);
        }

        let (dest_type, params) = coerce_values_to_single_type(params, list_defs)?;

        match dest_type {
            CAST_INT => self.call_int(params),
            CAST_FLOAT => self.call_float(params),
            CAST_LIST => self.call_list(params, list_defs),
            CAST_STRING => self.call_string(params),
            CAST_DIVERT_TARGET => self.call_divert_target(params),
            _ => Err(StoryError::InvalidStoryState(format!(
                "Cannot perform operation '{}' with type ordinal {dest_type}",
                self.get_name()
            ))),
        }
    }

    fn call_binary_list_operation(
        &self,
        params: Vec<ValueType>,
        list_defs: &ListDefinitionsOrigin,
    ) -> Result<ValueType, StoryError> {
        // List-Int addition/subtraction returns a List ("alpha" + 1 = "beta").
        if matches!(self, Op::Add | Op::Subtract) {
            if let (ValueType::List(list), ValueType::Int(amount)) = (&params[0], &params[1]) {
                return self.call_list_increment_operation(list, *amount, list_defs);
            }
        }

        let both_lists = matches!(
            (&params[0], &params[1]),
            (ValueType::List(_), ValueType::List(_))
        );

        // And/or with any other type requires coercion to int truthiness,
        // and both sides are always evaluated before we get here.
        if matches!(self, Op::And | Op::Or) && !both_lists {
            let left = params[0].is_truthy()?;
            let right = params[1].is_truthy()?;

            let result = match self {
                Op::And => left && right,
                _ => left || right,
            };

            return Ok(ValueType::Int(if result { 1 } else { 0 }));
        }

        if both_lists {
            return self.call_list(params, list_defs);
        }

        Err(StoryError::InvalidStoryState(format!(
            "Can not call use '{}' operation on {} and {}",
            self.get_name(),
            type_name(&params[0]),
            type_name(&params[1])
        )))
    }

    fn call_list_increment_operation(
        &self,
        list: &InkList,
        amount: i32,
        list_defs: &ListDefinitionsOrigin,
    ) -> Result<ValueType, StoryError> {
        let mut result = InkList::new();

        for (item, value) in &list.items {
            let target_value = if matches!(self, Op::Add) {
                value + amount
            } else {
                value - amount
            };

            let origin_name = item.get_origin_name().ok_or_else(|| {
                StoryError::InvalidStoryState(format!(
                    "Failed to find the origin definition of {} when incrementing a list",
                    item.get_item_name()
                ))
            })?;

            let def = list_defs.get_list_definition(origin_name).ok_or_else(|| {
                StoryError::InvalidStoryState(format!(
                    "Failed to find the origin list definition '{origin_name}'"
                ))
            })?;

            // Items whose shifted value has no counterpart in the origin
            // definition simply drop out of the result.
            if let Some(incremented) = def.get_item_with_value(target_value) {
                result.items.insert(incremented.clone(), target_value);
            }
        }

        Ok(ValueType::List(result))
    }

    fn call_int(&self, params: Vec<ValueType>) -> Result<ValueType, StoryError> {
        let x = params[0].coerce_to_int()?;
        let y = if params.len() > 1 {
            params[1].coerce_to_int()?
        } else {
            0
        };

        let result = match self {
            Op::Add => ValueType::Int(x + y),
            Op::Subtract => ValueType::Int(x - y),
            Op::Multiply => ValueType::Int(x * y),
            Op::Divide => {
                if y == 0 {
                    return Err(StoryError::InvalidStoryState("Divide by zero".to_string()));
                }
                ValueType::Int(x / y)
            }
            Op::Mod => {
                if y == 0 {
                    return Err(StoryError::InvalidStoryState("Divide by zero".to_string()));
                }
                ValueType::Int(x % y)
            }
            Op::Negate => ValueType::Int(-x),
            Op::Equal => ValueType::Bool(x == y),
            Op::Greater => ValueType::Bool(x > y),
            Op::Less => ValueType::Bool(x < y),
            Op::GreaterThanOrEquals => ValueType::Bool(x >= y),
            Op::LessThanOrEquals => ValueType::Bool(x <= y),
            Op::NotEquals => ValueType::Bool(x != y),
            Op::Not => ValueType::Bool(x == 0),
            Op::And => ValueType::Bool(x != 0 && y != 0),
            Op::Or => ValueType::Bool(x != 0 || y != 0),
            Op::Min => ValueType::Int(x.min(y)),
            Op::Max => ValueType::Int(x.max(y)),
            Op::Pow => ValueType::Float((x as f32).powf(y as f32)),
            Op::Floor => ValueType::Int(x),
            Op::Ceiling => ValueType::Int(x),
            Op::Int => ValueType::Int(x),
            Op::Float => ValueType::Float(x as f32),
            _ => return Err(self.unsupported("Int")),
        };

        Ok(result)
    }

    fn call_float(&self, params: Vec<ValueType>) -> Result<ValueType, StoryError> {
        let x = params[0].coerce_to_float()?;
        let y = if params.len() > 1 {
            params[1].coerce_to_float()?
        } else {
            0.0
        };

        let result = match self {
            Op::Add => ValueType::Float(x + y),
            Op::Subtract => ValueType::Float(x - y),
            Op::Multiply => ValueType::Float(x * y),
            Op::Divide => ValueType::Float(x / y),
            Op::Mod => ValueType::Float(x % y),
            Op::Negate => ValueType::Float(-x),
            Op::Equal => ValueType::Bool(x == y),
            Op::Greater => ValueType::Bool(x > y),
            Op::Less => ValueType::Bool(x < y),
            Op::GreaterThanOrEquals => ValueType::Bool(x >= y),
            Op::LessThanOrEquals => ValueType::Bool(x <= y),
            Op::NotEquals => ValueType::Bool(x != y),
            Op::Not => ValueType::Bool(x == 0.0),
            Op::And => ValueType::Bool(x != 0.0 && y != 0.0),
            Op::Or => ValueType::Bool(x != 0.0 || y != 0.0),
            Op::Min => ValueType::Float(x.min(y)),
            Op::Max => ValueType::Float(x.max(y)),
            Op::Pow => ValueType::Float(x.powf(y)),
            Op::Floor => ValueType::Float(x.floor()),
            Op::Ceiling => ValueType::Float(x.ceil()),
            Op::Int => ValueType::Int(x as i32),
            Op::Float => ValueType::Float(x),
            _ => return Err(self.unsupported("Float")),
        };

        Ok(result)
    }

    fn call_string(&self, params: Vec<ValueType>) -> Result<ValueType, StoryError> {
        let x = params[0]
            .get_str()
            .ok_or_else(|| self.unsupported("String"))?;
        let y = if params.len() > 1 {
            params[1]
                .get_str()
                .ok_or_else(|| self.unsupported("String"))?
        } else {
            ""
        };

        let result = match self {
            Op::Add => ValueType::new_string(&format!("{x}{y}")),
            Op::Equal => ValueType::Bool(x == y),
            Op::NotEquals => ValueType::Bool(x != y),
            Op::Has => ValueType::Bool(x.contains(y)),
            Op::Hasnt => ValueType::Bool(!x.contains(y)),
            _ => return Err(self.unsupported("String")),
        };

        Ok(result)
    }

    fn call_list(
        &self,
        mut params: Vec<ValueType>,
        list_defs: &ListDefinitionsOrigin,
    ) -> Result<ValueType, StoryError> {
        let y = if params.len() > 1 {
            match params.pop() {
                Some(ValueType::List(l)) => Some(l),
                _ => return Err(self.unsupported("List")),
            }
        } else {
            None
        };

        let x = match params.pop() {
            Some(ValueType::List(l)) => l,
            _ => return Err(self.unsupported("List")),
        };

        let result = match self {
            Op::Add => ValueType::List(x.union(y.as_ref().unwrap())),
            Op::Subtract => ValueType::List(x.without(y.as_ref().unwrap())),
            Op::Intersect => ValueType::List(x.intersect(y.as_ref().unwrap())),
            Op::Has => ValueType::Bool(x.contains(y.as_ref().unwrap())),
            Op::Hasnt => ValueType::Bool(!x.contains(y.as_ref().unwrap())),
            Op::Equal => ValueType::Bool(x == *y.as_ref().unwrap()),
            Op::NotEquals => ValueType::Bool(x != *y.as_ref().unwrap()),
            Op::Greater => ValueType::Bool(x.greater_than(y.as_ref().unwrap())),
            Op::Less => ValueType::Bool(x.less_than(y.as_ref().unwrap())),
            Op::GreaterThanOrEquals => {
                ValueType::Bool(x.greater_than_or_equals(y.as_ref().unwrap()))
            }
            Op::LessThanOrEquals => ValueType::Bool(x.less_than_or_equals(y.as_ref().unwrap())),
            Op::And => ValueType::Bool(x.count() > 0 && y.as_ref().unwrap().count() > 0),
            Op::Or => ValueType::Bool(x.count() > 0 || y.as_ref().unwrap().count() > 0),
            Op::Not => ValueType::Int(if x.count() == 0 { 1 } else { 0 }),
            Op::ListMin => ValueType::List(x.min_as_list()),
            Op::ListMax => ValueType::List(x.max_as_list()),
            Op::ListAll => ValueType::List(x.all(list_defs)),
            Op::ListCount => ValueType::Int(x.count() as i32),
            Op::ListValue => ValueType::Int(x.max_item().map(|(_, v)| v).unwrap_or(0)),
            Op::ListInvert => ValueType::List(x.inverse(list_defs)),
            _ => return Err(self.unsupported("List")),
        };

        Ok(result)
    }

    fn call_divert_target(&self, params: Vec<ValueType>) -> Result<ValueType, StoryError> {
        let x = params[0]
            .get_divert_target()
            .ok_or_else(|| self.unsupported("DivertTarget"))?;
        let y = params[1]
            .get_divert_target()
            .ok_or_else(|| self.unsupported("DivertTarget"))?;

        match self {
            Op::Equal => Ok(ValueType::Bool(x == y)),
            Op::NotEquals => Ok(ValueType::Bool(x != y)),
            _ => Err(self.unsupported("DivertTarget")),
        }
    }

    fn unsupported(&self, type_name: &str) -> StoryError {
        StoryError::InvalidStoryState(format!(
            "Cannot perform operation '{}' on {type_name}",
            self.get_name()
        ))
    }
}

fn type_name(value: &ValueType) -> &'static str {
    match value {
        ValueType::Bool(_) => "Bool",
        ValueType::Int(_) => "Int",
        ValueType::Float(_) => "Float",
        ValueType::List(_) => "List",
        ValueType::String(_) => "String",
        ValueType::DivertTarget(_) => "DivertTarget",
        ValueType::VariablePointer(_) => "VariablePointer",
    }
}

/// Promotes all operands to the highest cast ordinal present (never lower
/// than Int, so two Bools compare as ints). Promoting an Int into a List
/// resolves the int through the origin definition of the list operand's
/// maximum item.
fn coerce_values_to_single_type(
    params: Vec<ValueType>,
    list_defs: &ListDefinitionsOrigin,
) -> Result<(u8, Vec<ValueType>), StoryError> {
    let mut dest_type = CAST_INT;
    let mut special_case_list: Option<InkList> = None;

    for param in &params {
        if param.cast_ordinal() > dest_type {
            dest_type = param.cast_ordinal();
        }
        if let ValueType::List(l) = param {
            special_case_list = Some(l.clone());
        }
    }

    let mut coerced = Vec::with_capacity(params.len());

    for param in params {
        if dest_type == CAST_LIST {
            match param {
                ValueType::List(_) => coerced.push(param),
                ValueType::Int(v) => {
                    let list = special_case_list.as_ref().unwrap();
                    let origin_name = list
                        .max_item()
                        .and_then(|(item, _)| item.get_origin_name().cloned())
                        .or_else(|| list.get_origin_names().into_iter().next());

                    let def = origin_name
                        .as_ref()
                        .and_then(|name| list_defs.get_list_definition(name));

                    let item = def.and_then(|d| d.get_item_with_value(v));

                    match item {
                        Some(item) => coerced.push(ValueType::new_list_from_item(item.clone(), v)),
                        None => {
                            return Err(StoryError::BadArgument(format!(
                                "Could not find List item with the value {v} in {}",
                                origin_name.as_deref().unwrap_or("?")
                            )))
                        }
                    }
                }
                other => {
                    return Err(StoryError::InvalidStoryState(format!(
                        "Cannot mix a List and a {} value in this operation",
                        type_name(&other)
                    )))
                }
            }
        } else {
            match param.cast(dest_type)? {
                Some(cast) => coerced.push(cast),
                None => coerced.push(param),
            }
        }
    }

    Ok((dest_type, coerced))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::list_definition::ListDefinition;
    use std::collections::HashMap;

    fn defs() -> ListDefinitionsOrigin {
        let mut items = HashMap::new();
        items.insert("low".to_string(), 1);
        items.insert("mid".to_string(), 2);
        items.insert("high".to_string(), 3);
        ListDefinitionsOrigin::new(vec![ListDefinition::new("level".to_string(), items)])
    }

    fn level(name: &str, defs: &ListDefinitionsOrigin) -> InkList {
        let def = defs.get_list_definition("level").unwrap();
        let (item, value) = def.get_item_with_name(name).unwrap();
        InkList::from_single_element(item.clone(), value)
    }

    #[test]
    fn int_addition() {
        let result = Op::Add
            .call(vec![ValueType::Int(2), ValueType::Int(3)], &defs())
            .unwrap();
        assert_eq!(ValueType::Int(5), result);
    }

    #[test]
    fn comparison_boxes_bool() {
        let result = Op::Greater
            .call(vec![ValueType::Int(3), ValueType::Int(2)], &defs())
            .unwrap();
        assert_eq!(ValueType::Bool(true), result);
    }

    #[test]
    fn int_float_promotion() {
        let result = Op::Add
            .call(vec![ValueType::Int(1), ValueType::Float(0.5)], &defs())
            .unwrap();
        assert_eq!(ValueType::Float(1.5), result);
    }

    #[test]
    fn pow_on_ints_returns_float() {
        let result = Op::Pow
            .call(vec![ValueType::Int(2), ValueType::Int(3)], &defs())
            .unwrap();
        assert_eq!(ValueType::Float(8.0), result);
    }

    #[test]
    fn list_increment_shifts_members() {
        let defs = defs();
        let result = Op::Add
            .call(
                vec![ValueType::List(level("low", &defs)), ValueType::Int(1)],
                &defs,
            )
            .unwrap();
        assert_eq!(ValueType::List(level("mid", &defs)), result);
    }

    #[test]
    fn list_increment_drops_out_of_range_members() {
        let defs = defs();
        let result = Op::Add
            .call(
                vec![ValueType::List(level("high", &defs)), ValueType::Int(1)],
                &defs,
            )
            .unwrap();
        assert_eq!(0, result.get_list().unwrap().count());
    }

    #[test]
    fn mixed_and_coerces_to_count_truthiness() {
        let defs = defs();
        let result = Op::And
            .call(
                vec![ValueType::List(level("low", &defs)), ValueType::Int(1)],
                &defs,
            )
            .unwrap();
        assert_eq!(ValueType::Int(1), result);

        let result = Op::And
            .call(
                vec![ValueType::List(InkList::new()), ValueType::Int(1)],
                &defs,
            )
            .unwrap();
        assert_eq!(ValueType::Int(0), result);
    }

    #[test]
    fn string_concat_and_contains() {
        let d = defs();
        let result = Op::Add
            .call(
                vec![ValueType::new_string("foo"), ValueType::new_string("bar")],
                &d,
            )
            .unwrap();
        assert_eq!(Some("foobar"), result.get_str());

        let result = Op::Has
            .call(
                vec![ValueType::new_string("foobar"), ValueType::new_string("oba")],
                &d,
            )
            .unwrap();
        assert_eq!(ValueType::Bool(true), result);
    }
}
