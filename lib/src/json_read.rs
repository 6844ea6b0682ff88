//! Decoding of the compiled JSON bytecode into the content arena, plus the
//! value readers shared with the save-state format.
use std::collections::HashMap;

use serde_json::Map;

use crate::control_command::CommandType;
use crate::ink_list::InkList;
use crate::ink_list_item::InkListItem;
use crate::list_definition::ListDefinition;
use crate::list_definitions_origin::ListDefinitionsOrigin;
use crate::native_function_call::Op;
use crate::node::{
    ChoicePointData, ContainerData, ContentTree, DivertData, NodeId, NodeKind,
    VariableAssignmentData, VariableReferenceData,
};
use crate::path::Path;
use crate::push_pop::PushPopType;
use crate::rt_obj::RtObj;
use crate::story_error::StoryError;
use crate::value_type::ValueType;

/// Parses a complete `.ink.json` file: version check, root container and
/// list definitions.
pub fn load_from_string(
    json: &str,
) -> Result<(i32, ContentTree, ListDefinitionsOrigin), StoryError> {
    let jobj: serde_json::Value = serde_json::from_str(json)
        .map_err(|e| StoryError::BadJson(format!("Story not in JSON format: {e}")))?;

    let version = jobj
        .get("inkVersion")
        .and_then(|v| v.as_i64())
        .ok_or_else(|| {
            StoryError::BadJson(
                "ink version number not found. Are you sure it's a valid .ink.json file?"
                    .to_string(),
            )
        })? as i32;

    if version > crate::story::INK_VERSION_CURRENT {
        return Err(StoryError::BadJson(
            "Version of ink used to build story was newer than the current version of the engine"
                .to_string(),
        ));
    } else if version < crate::story::INK_VERSION_MINIMUM_COMPATIBLE {
        return Err(StoryError::BadJson(
            "Version of ink used to build story is too old to be loaded by this version of the engine".to_string(),
        ));
    }

    let jroot = jobj.get("root").and_then(|v| v.as_array()).ok_or_else(|| {
        StoryError::BadJson(
            "Root node for ink not found. Are you sure it's a valid .ink.json file?".to_string(),
        )
    })?;

    let mut tree = ContentTree::new();
    jarray_to_container(&mut tree, None, jroot, None)?;

    let list_definitions = match jobj.get("listDefs") {
        Some(jdefs) => jtoken_to_list_definitions(jdefs)?,
        None => ListDefinitionsOrigin::new(Vec::new()),
    };

    Ok((version, tree, list_definitions))
}

/// Builds a container node (and its whole subtree) from a bytecode array.
pub fn jarray_to_container(
    tree: &mut ContentTree,
    parent: Option<NodeId>,
    jarray: &[serde_json::Value],
    name: Option<String>,
) -> Result<NodeId, StoryError> {
    let container = tree.add(parent, NodeKind::Container(ContainerData::new(name, 0)));

    // All elements but the last are ordered content.
    for jtoken in jarray.iter().take(jarray.len().saturating_sub(1)) {
        let child = jtoken_to_node(tree, Some(container), jtoken)?;

        if let Some(child_name) = tree.name_of(child).map(|n| n.to_string()) {
            if let Some(data) = tree.container_mut(container) {
                data.named_content.insert(child_name, child);
            }
        }

        if let Some(data) = tree.container_mut(container) {
            data.content.push(child);
        }
    }

    // The final element is either a terminator dictionary with named-only
    // content, count flags and the container's own name, or null.
    if let Some(jterminator) = jarray.last().and_then(|t| t.as_object()) {
        for (key, jvalue) in jterminator {
            match key.as_str() {
                "#f" => {
                    let flags = jvalue.as_i64().unwrap_or(0) as i32;
                    if let Some(data) = tree.container_mut(container) {
                        data.visits_should_be_counted = (flags & 1) > 0;
                        data.turn_index_should_be_counted = (flags & 2) > 0;
                        data.counting_at_start_only = (flags & 4) > 0;
                    }
                }
                "#n" => {
                    if let Some(data) = tree.container_mut(container) {
                        data.name = jvalue.as_str().map(|n| n.to_string());
                    }
                }
                _ => {
                    let named_array = jvalue.as_array().ok_or_else(|| {
                        StoryError::BadJson(format!(
                            "Named content '{key}' is not a container"
                        ))
                    })?;
                    let named_child = jarray_to_container(
                        tree,
                        Some(container),
                        named_array,
                        Some(key.clone()),
                    )?;
                    if let Some(data) = tree.container_mut(container) {
                        data.named_content.insert(key.clone(), named_child);
                    }
                }
            }
        }
    }

    Ok(container)
}

/// Decodes one bytecode token into an arena node.
pub fn jtoken_to_node(
    tree: &mut ContentTree,
    parent: Option<NodeId>,
    jtoken: &serde_json::Value,
) -> Result<NodeId, StoryError> {
    match jtoken {
        serde_json::Value::Bool(value) => {
            Ok(tree.add(parent, NodeKind::Value(ValueType::Bool(*value))))
        }
        serde_json::Value::Number(_) => {
            let value = number_to_value(jtoken)?;
            Ok(tree.add(parent, NodeKind::Value(value)))
        }
        serde_json::Value::String(text) => {
            let kind = string_token_to_kind(text)?;
            Ok(tree.add(parent, kind))
        }
        serde_json::Value::Array(jarray) => jarray_to_container(tree, parent, jarray, None),
        serde_json::Value::Object(jobj) => {
            let kind = jobject_to_kind(jobj)?;
            Ok(tree.add(parent, kind))
        }
        serde_json::Value::Null => Err(StoryError::BadJson(
            "Unexpected null token in content".to_string(),
        )),
    }
}

fn string_token_to_kind(text: &str) -> Result<NodeKind, StoryError> {
    let mut chars = text.chars();
    let first = chars.next();

    // Plain text and newlines are by far the most common tokens.
    if first == Some('^') {
        return Ok(NodeKind::Value(ValueType::new_string(&text[1..])));
    }
    if text == "\n" {
        return Ok(NodeKind::Value(ValueType::new_string("\n")));
    }

    if text == "<>" {
        return Ok(NodeKind::Glue);
    }

    if let Some(command_type) = CommandType::new_from_name(text) {
        return Ok(NodeKind::Command(command_type));
    }

    // "L^" disambiguates the list-intersection operator from the text marker.
    let native_name = if text == "L^" { "^" } else { text };
    if let Some(op) = Op::new_from_name(native_name) {
        return Ok(NodeKind::NativeCall(op));
    }

    if text == "void" {
        return Ok(NodeKind::Void);
    }

    Err(StoryError::BadJson(format!(
        "Failed to convert token to runtime object: {text}"
    )))
}

fn jobject_to_kind(jobj: &Map<String, serde_json::Value>) -> Result<NodeKind, StoryError> {
    // Divert target value to path
    if let Some(jpath) = jobj.get("^->").and_then(|v| v.as_str()) {
        return Ok(NodeKind::Value(ValueType::DivertTarget(
            Path::from_components_string(jpath),
        )));
    }

    // Variable pointer
    if let Some(jname) = jobj.get("^var").and_then(|v| v.as_str()) {
        let context_index = jobj.get("ci").and_then(|v| v.as_i64()).unwrap_or(-1) as i32;
        return Ok(NodeKind::Value(ValueType::new_variable_pointer(
            jname,
            context_index,
        )));
    }

    // Diverts in their four variants.
    let divert_key = [
        ("->", false, PushPopType::Tunnel, false),
        ("f()", true, PushPopType::Function, false),
        ("->t->", true, PushPopType::Tunnel, false),
        ("x()", false, PushPopType::Function, true),
    ]
    .iter()
    .find(|(key, _, _, _)| jobj.contains_key(*key))
    .copied();

    if let Some((key, pushes_to_stack, stack_push_type, is_external)) = divert_key {
        let target = jobj
            .get(key)
            .and_then(|v| v.as_str())
            .ok_or_else(|| StoryError::BadJson("Divert target is not a string".to_string()))?;

        let is_var_target = jobj.get("var").and_then(|v| v.as_bool()).unwrap_or(false);
        let is_conditional = jobj.get("c").and_then(|v| v.as_bool()).unwrap_or(false);
        let external_args = jobj.get("exArgs").and_then(|v| v.as_u64()).unwrap_or(0) as usize;

        let (target_path, variable_divert_name) = if is_var_target {
            (None, Some(target.to_string()))
        } else {
            (Some(Path::from_components_string(target)), None)
        };

        return Ok(NodeKind::Divert(DivertData {
            target_path,
            variable_divert_name,
            pushes_to_stack,
            stack_push_type,
            is_external,
            external_args,
            is_conditional,
        }));
    }

    // Choice point
    if let Some(jpath) = jobj.get("*").and_then(|v| v.as_str()) {
        let flags = jobj.get("flg").and_then(|v| v.as_i64()).unwrap_or(0) as i32;
        return Ok(NodeKind::ChoicePoint(ChoicePointData::new(flags, jpath)));
    }

    // Variable reference
    if let Some(jname) = jobj.get("VAR?").and_then(|v| v.as_str()) {
        return Ok(NodeKind::VariableReference(VariableReferenceData {
            name: Some(jname.to_string()),
            path_for_count: None,
        }));
    }

    // Read count reference
    if let Some(jpath) = jobj.get("CNT?").and_then(|v| v.as_str()) {
        return Ok(NodeKind::VariableReference(VariableReferenceData {
            name: None,
            path_for_count: Some(Path::from_components_string(jpath)),
        }));
    }

    // Variable assignment, global or temporary
    let (assign_name, is_global) = match jobj.get("VAR=").and_then(|v| v.as_str()) {
        Some(name) => (Some(name), true),
        None => (jobj.get("temp=").and_then(|v| v.as_str()), false),
    };

    if let Some(name) = assign_name {
        let is_new_declaration = !jobj.get("re").and_then(|v| v.as_bool()).unwrap_or(false);
        return Ok(NodeKind::VariableAssignment(VariableAssignmentData {
            variable_name: name.to_string(),
            is_new_declaration,
            is_global,
        }));
    }

    // Legacy tag
    if let Some(jtext) = jobj.get("#").and_then(|v| v.as_str()) {
        return Ok(NodeKind::Tag(jtext.to_string()));
    }

    // List value
    if jobj.contains_key("list") {
        return Ok(NodeKind::Value(list_from_jobject(jobj)?));
    }

    Err(StoryError::BadJson(format!(
        "Failed to convert token to runtime object: {}",
        serde_json::Value::Object(jobj.clone())
    )))
}

fn number_to_value(jtoken: &serde_json::Value) -> Result<ValueType, StoryError> {
    if let Some(value) = jtoken.as_i64() {
        return Ok(ValueType::Int(value as i32));
    }
    if let Some(value) = jtoken.as_f64() {
        return Ok(ValueType::Float(value as f32));
    }
    Err(StoryError::BadJson(format!("Invalid number: {jtoken}")))
}

fn list_from_jobject(jobj: &Map<String, serde_json::Value>) -> Result<ValueType, StoryError> {
    let jlist = jobj
        .get("list")
        .and_then(|v| v.as_object())
        .ok_or_else(|| StoryError::BadJson("Invalid list value".to_string()))?;

    let mut list = InkList::new();

    for (full_name, jvalue) in jlist {
        let value = jvalue
            .as_i64()
            .ok_or_else(|| StoryError::BadJson(format!("Invalid list item value: {jvalue}")))?;
        list.items
            .insert(InkListItem::from_full_name(full_name), value as i32);
    }

    if let Some(jorigins) = jobj.get("origins").and_then(|v| v.as_array()) {
        list.set_initial_origin_names(
            jorigins
                .iter()
                .filter_map(|o| o.as_str())
                .map(|o| o.to_string())
                .collect(),
        );
    }

    Ok(ValueType::List(list))
}

/// Reads a plain value from a save-state token. Structural tokens are an
/// error here.
pub fn value_type_from_token(jtoken: &serde_json::Value) -> Result<ValueType, StoryError> {
    match jtoken {
        serde_json::Value::Bool(value) => Ok(ValueType::Bool(*value)),
        serde_json::Value::Number(_) => number_to_value(jtoken),
        serde_json::Value::String(text) => {
            if let Some(stripped) = text.strip_prefix('^') {
                Ok(ValueType::new_string(stripped))
            } else if text == "\n" {
                Ok(ValueType::new_string("\n"))
            } else {
                Err(StoryError::BadJson(format!(
                    "Failed to convert token to value: {text}"
                )))
            }
        }
        serde_json::Value::Object(jobj) => {
            if let NodeKind::Value(value) = jobject_to_kind(jobj)? {
                Ok(value)
            } else {
                Err(StoryError::BadJson(format!(
                    "Failed to convert token to value: {jtoken}"
                )))
            }
        }
        _ => Err(StoryError::BadJson(format!(
            "Failed to convert token to value: {jtoken}"
        ))),
    }
}

/// Reads a stream object from a save-state token.
pub fn rt_obj_from_token(jtoken: &serde_json::Value) -> Result<RtObj, StoryError> {
    match jtoken {
        serde_json::Value::String(text) => {
            if text == "<>" {
                return Ok(RtObj::Glue);
            }
            if text == "void" {
                return Ok(RtObj::Void);
            }
            if let Some(command_type) = CommandType::new_from_name(text) {
                return Ok(RtObj::Command(command_type));
            }
            Ok(RtObj::Value(value_type_from_token(jtoken)?))
        }
        serde_json::Value::Object(jobj) => {
            if let Some(jtext) = jobj.get("#").and_then(|v| v.as_str()) {
                return Ok(RtObj::Tag(jtext.to_string()));
            }
            Ok(RtObj::Value(value_type_from_token(jtoken)?))
        }
        _ => Ok(RtObj::Value(value_type_from_token(jtoken)?)),
    }
}

pub fn jarray_to_rt_obj_list(jarray: &[serde_json::Value]) -> Result<Vec<RtObj>, StoryError> {
    let mut objs = Vec::with_capacity(jarray.len());
    for jtoken in jarray {
        objs.push(rt_obj_from_token(jtoken)?);
    }
    Ok(objs)
}

pub(crate) fn jobject_to_int_hashmap(
    jobj: &Map<String, serde_json::Value>,
) -> Result<HashMap<String, i32>, StoryError> {
    let mut map = HashMap::with_capacity(jobj.len());
    for (key, jvalue) in jobj {
        let value = jvalue
            .as_i64()
            .ok_or_else(|| StoryError::BadJson(format!("Invalid count for '{key}'")))?;
        map.insert(key.clone(), value as i32);
    }
    Ok(map)
}

pub fn jtoken_to_list_definitions(
    jtoken: &serde_json::Value,
) -> Result<ListDefinitionsOrigin, StoryError> {
    let jdefs = jtoken
        .as_object()
        .ok_or_else(|| StoryError::BadJson("List definitions is not an object".to_string()))?;

    let mut defs: Vec<ListDefinition> = Vec::with_capacity(jdefs.len());

    for (name, jitems) in jdefs {
        let jitems = jitems.as_object().ok_or_else(|| {
            StoryError::BadJson(format!("List definition '{name}' is not an object"))
        })?;

        let mut items: HashMap<String, i32> = HashMap::with_capacity(jitems.len());
        for (item_name, jvalue) in jitems {
            let value = jvalue.as_i64().ok_or_else(|| {
                StoryError::BadJson(format!("Invalid value for list item '{item_name}'"))
            })?;
            items.insert(item_name.clone(), value as i32);
        }

        defs.push(ListDefinition::new(name.clone(), items));
    }

    Ok(ListDefinitionsOrigin::new(defs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::ROOT;

    fn build(json: &str) -> ContentTree {
        let token: serde_json::Value = serde_json::from_str(json).unwrap();
        let mut tree = ContentTree::new();
        jarray_to_container(&mut tree, None, token.as_array().unwrap(), None).unwrap();
        tree
    }

    #[test]
    fn decodes_text_and_newlines() {
        let tree = build(r#"["^Hello", "\n", null]"#);
        let root = tree.container(ROOT).unwrap();
        assert_eq!(2, root.content.len());

        match tree.kind(root.content[0]) {
            NodeKind::Value(ValueType::String(s)) => assert_eq!("Hello", s.string),
            other => panic!("unexpected node: {other:?}"),
        }
        match tree.kind(root.content[1]) {
            NodeKind::Value(ValueType::String(s)) => assert!(s.is_newline),
            other => panic!("unexpected node: {other:?}"),
        }
    }

    #[test]
    fn decodes_named_content_and_flags() {
        let tree = build(r##"[{"knot": ["^in knot", null, {"#f": 1}]}]"##);
        let root = tree.container(ROOT).unwrap();
        let knot = *root.named_content.get("knot").unwrap();

        let data = tree.container(knot).unwrap();
        assert!(data.visits_should_be_counted);
        assert_eq!(Some("knot"), tree.name_of(knot));
        assert_eq!("knot", tree.path_of(knot).get_components_string());
    }

    #[test]
    fn decodes_diverts() {
        let tree = build(r#"[{"->": "knot", "c": true}, {"f()": "func"}, {"x()": "ext", "exArgs": 2}, null]"#);
        let root = tree.container(ROOT).unwrap();

        match tree.kind(root.content[0]) {
            NodeKind::Divert(d) => {
                assert!(d.is_conditional);
                assert!(!d.pushes_to_stack);
            }
            other => panic!("unexpected node: {other:?}"),
        }
        match tree.kind(root.content[1]) {
            NodeKind::Divert(d) => {
                assert!(d.pushes_to_stack);
                assert_eq!(PushPopType::Function, d.stack_push_type);
            }
            other => panic!("unexpected node: {other:?}"),
        }
        match tree.kind(root.content[2]) {
            NodeKind::Divert(d) => {
                assert!(d.is_external);
                assert_eq!(2, d.external_args);
            }
            other => panic!("unexpected node: {other:?}"),
        }
    }

    #[test]
    fn decodes_operators_and_commands() {
        let tree = build(r#"["ev", 1, 2, "+", "/ev", "L^", "void", null]"#);
        let root = tree.container(ROOT).unwrap();

        assert!(matches!(
            tree.kind(root.content[0]),
            NodeKind::Command(CommandType::EvalStart)
        ));
        assert!(matches!(
            tree.kind(root.content[3]),
            NodeKind::NativeCall(Op::Add)
        ));
        assert!(matches!(
            tree.kind(root.content[5]),
            NodeKind::NativeCall(Op::Intersect)
        ));
        assert!(matches!(tree.kind(root.content[6]), NodeKind::Void));
    }

    #[test]
    fn reads_list_values_with_origins() {
        let token: serde_json::Value =
            serde_json::from_str(r#"{"list": {"colors.red": 1}, "origins": ["colors"]}"#).unwrap();
        match value_type_from_token(&token).unwrap() {
            ValueType::List(list) => {
                assert_eq!(1, list.items.len());
                assert_eq!(vec!["colors".to_string()], list.get_origin_names());
            }
            other => panic!("unexpected value: {other:?}"),
        }
    }
}
