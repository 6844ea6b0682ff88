//! Writers for the save-state JSON format. Only stream-able objects are
//! written here; structural content is addressed by path, never serialized.
use std::collections::HashMap;

use serde_json::{json, Map};

use crate::ink_list::InkList;
use crate::rt_obj::RtObj;
use crate::story_error::StoryError;
use crate::value_type::ValueType;

pub fn write_value_type(value: &ValueType) -> Result<serde_json::Value, StoryError> {
    let jvalue = match value {
        ValueType::Bool(v) => json!(v),
        ValueType::Int(v) => json!(v),
        ValueType::Float(v) => json!(v),
        ValueType::String(v) => {
            let mut s = String::with_capacity(v.string.len() + 1);
            if v.is_newline {
                s.push('\n');
            } else {
                s.push('^');
                s.push_str(&v.string);
            }
            json!(s)
        }
        ValueType::List(list) => write_ink_list(list),
        ValueType::DivertTarget(path) => {
            let mut jobj: Map<String, serde_json::Value> = Map::new();
            jobj.insert("^->".to_string(), json!(path.get_components_string()));
            serde_json::Value::Object(jobj)
        }
        ValueType::VariablePointer(pointer) => {
            let mut jobj: Map<String, serde_json::Value> = Map::new();
            jobj.insert("^var".to_string(), json!(pointer.variable_name));
            jobj.insert("ci".to_string(), json!(pointer.context_index));
            serde_json::Value::Object(jobj)
        }
    };

    Ok(jvalue)
}

pub fn write_rt_obj(obj: &RtObj) -> Result<serde_json::Value, StoryError> {
    match obj {
        RtObj::Value(value) => write_value_type(value),
        RtObj::Glue => Ok(json!("<>")),
        RtObj::Command(command_type) => Ok(json!(command_type.get_name())),
        RtObj::Tag(text) => {
            let mut jobj: Map<String, serde_json::Value> = Map::new();
            jobj.insert("#".to_string(), json!(text));
            Ok(serde_json::Value::Object(jobj))
        }
        RtObj::Void => Ok(json!("void")),
    }
}

pub fn write_rt_obj_list(objs: &[RtObj]) -> Result<serde_json::Value, StoryError> {
    let mut jarray: Vec<serde_json::Value> = Vec::with_capacity(objs.len());
    for obj in objs {
        jarray.push(write_rt_obj(obj)?);
    }
    Ok(serde_json::Value::Array(jarray))
}

pub fn write_ink_list(list: &InkList) -> serde_json::Value {
    let mut jlist: Map<String, serde_json::Value> = Map::new();

    for (item, value) in &list.items {
        jlist.insert(item.get_full_name(), json!(value));
    }

    let mut jobj: Map<String, serde_json::Value> = Map::new();
    jobj.insert("list".to_string(), serde_json::Value::Object(jlist));
    serde_json::Value::Object(jobj)
}

pub(crate) fn write_int_dictionary(map: &HashMap<String, i32>) -> serde_json::Value {
    let mut jobj: Map<String, serde_json::Value> = Map::new();
    for (key, value) in map {
        jobj.insert(key.clone(), json!(*value));
    }
    serde_json::Value::Object(jobj)
}
