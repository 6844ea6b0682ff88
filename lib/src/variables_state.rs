//! Global variable storage, with temporaries delegated to the callstack and
//! an optional patch overlay while lookahead or a background save is active.
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use serde_json::Map;

use crate::callstack::CallStack;
use crate::json_read;
use crate::json_write;
use crate::list_definitions_origin::ListDefinitionsOrigin;
use crate::node::VariableAssignmentData;
use crate::state_patch::StatePatch;
use crate::story_error::StoryError;
use crate::value_type::{ValueType, VariablePointerValue};

#[derive(Clone)]
pub struct VariablesState {
    pub global_variables: HashMap<String, ValueType>,
    pub default_global_variables: HashMap<String, ValueType>,
    pub patch: Option<StatePatch>,

    // Change tracking is only paid for when the story has observers.
    pub record_variable_changes: bool,
    batch_observing_variable_changes: bool,
    changed_variables_for_batch_obs: Option<HashSet<String>>,

    list_defs_origin: Rc<ListDefinitionsOrigin>,
}

impl VariablesState {
    pub fn new(list_defs_origin: Rc<ListDefinitionsOrigin>) -> VariablesState {
        VariablesState {
            global_variables: HashMap::new(),
            default_global_variables: HashMap::new(),
            patch: None,
            record_variable_changes: false,
            batch_observing_variable_changes: false,
            changed_variables_for_batch_obs: None,
            list_defs_origin,
        }
    }

    pub fn start_variable_observation(&mut self) {
        self.batch_observing_variable_changes = true;
        self.changed_variables_for_batch_obs = Some(HashSet::new());
    }

    /// Ends batch observation and returns the variables that changed during
    /// it, with their current values.
    pub fn complete_variable_observation(&mut self) -> HashMap<String, ValueType> {
        self.batch_observing_variable_changes = false;

        let mut changed_vars: HashMap<String, ValueType> = HashMap::new();

        if let Some(changed) = self.changed_variables_for_batch_obs.take() {
            for name in changed {
                if let Some(value) = self.global_variables.get(&name) {
                    changed_vars.insert(name, value.clone());
                }
            }
        }

        // A patch may still be active if a background save is mid-flight.
        if let Some(patch) = &self.patch {
            for name in &patch.changed_variables {
                if let Some(value) = patch.get_global(name) {
                    changed_vars.insert(name.clone(), value.clone());
                }
            }
        }

        changed_vars
    }

    pub fn snapshot_default_globals(&mut self) {
        self.default_global_variables = self.global_variables.clone();
    }

    pub fn apply_patch(&mut self) {
        if let Some(patch) = self.patch.take() {
            for (name, value) in patch.globals {
                self.global_variables.insert(name, value);
            }

            if let Some(changed_variables) = &mut self.changed_variables_for_batch_obs {
                for name in patch.changed_variables {
                    changed_variables.insert(name);
                }
            }
        }
    }

    pub fn assign(
        &mut self,
        var_ass: &VariableAssignmentData,
        value: ValueType,
        callstack: &mut CallStack,
    ) -> Result<(), StoryError> {
        let mut name = var_ass.variable_name.clone();
        let mut context_index = -1;

        // Are we assigning to a global variable?
        let mut set_global = if var_ass.is_new_declaration {
            var_ass.is_global
        } else {
            self.global_variable_exists_with_name(&name)
        };

        let mut value = value;

        if var_ass.is_new_declaration {
            // A fresh variable pointer needs to be resolved to the exact
            // instance it points at.
            if let ValueType::VariablePointer(pointer) = &value {
                value = self.resolve_variable_pointer(pointer, callstack);
            }
        } else {
            // Assigning through an existing pointer: follow the chain to the
            // variable it ultimately points at.
            loop {
                match self.get_raw_variable_with_name(&name, context_index, callstack) {
                    Some(ValueType::VariablePointer(pointer)) => {
                        name = pointer.variable_name.clone();
                        context_index = pointer.context_index;
                        set_global = context_index == 0;
                    }
                    _ => break,
                }
            }
        }

        if set_global {
            self.set_global(&name, value);
            Ok(())
        } else {
            callstack.set_temporary_variable(name, value, var_ass.is_new_declaration, context_index)
        }
    }

    pub fn global_variable_exists_with_name(&self, name: &str) -> bool {
        self.global_variables.contains_key(name)
            || self.default_global_variables.contains_key(name)
    }

    // Given a variable pointer with just the name of the target known,
    // resolve to a pointer that names the exact instance: global, or a
    // temporary at a particular callstack element.
    fn resolve_variable_pointer(
        &self,
        var_pointer: &VariablePointerValue,
        callstack: &CallStack,
    ) -> ValueType {
        let mut context_index = var_pointer.context_index;
        if context_index == -1 {
            context_index = self.get_context_index_of_variable_named(
                &var_pointer.variable_name,
                callstack,
            );
        }

        // When accessing a pointer to a pointer (e.g. nested function calls
        // taking variable references), collapse the chain to the final
        // target rather than building indirection.
        if let Some(pointed_to) =
            self.get_raw_variable_with_name(&var_pointer.variable_name, context_index, callstack)
        {
            if matches!(pointed_to, ValueType::VariablePointer(_)) {
                return pointed_to;
            }
        }

        ValueType::new_variable_pointer(&var_pointer.variable_name, context_index)
    }

    // 0 if the named variable is global, 1+ if it is a temporary in a
    // particular callstack element.
    fn get_context_index_of_variable_named(&self, name: &str, callstack: &CallStack) -> i32 {
        if self.global_variable_exists_with_name(name) {
            return 0;
        }

        callstack.current_element_index() as i32
    }

    pub fn get_raw_variable_with_name(
        &self,
        name: &str,
        context_index: i32,
        callstack: &CallStack,
    ) -> Option<ValueType> {
        // 0 context = global
        if context_index == 0 || context_index == -1 {
            if let Some(patch) = &self.patch {
                if let Some(global) = patch.get_global(name) {
                    return Some(global.clone());
                }
            }

            if let Some(global) = self.global_variables.get(name) {
                return Some(global.clone());
            }

            // Globals can be read while they are still being set up, since
            // VAR x = A_LIST_ITEM is legal. A newly added global may also
            // only exist in the defaults dictionary.
            if let Some(default_global) = self.default_global_variables.get(name) {
                return Some(default_global.clone());
            }

            if let Some(list_item_value) =
                self.list_defs_origin.find_single_item_list_with_name(name)
            {
                return Some(list_item_value.clone());
            }
        }

        callstack.get_temporary_variable_with_name(name, context_index)
    }

    pub fn get_variable_with_name(
        &self,
        name: &str,
        context_index: i32,
        callstack: &CallStack,
    ) -> Option<ValueType> {
        let var_value = self.get_raw_variable_with_name(name, context_index, callstack)?;

        if let ValueType::VariablePointer(pointer) = &var_value {
            return self.get_variable_with_name(
                &pointer.variable_name,
                pointer.context_index,
                callstack,
            );
        }

        Some(var_value)
    }

    pub fn set_global(&mut self, name: &str, mut value: ValueType) {
        let mut old_value: Option<ValueType> = None;

        if let Some(patch) = &self.patch {
            old_value = patch.get_global(name).cloned();
        }

        if old_value.is_none() {
            old_value = self.global_variables.get(name).cloned();
        }

        if let Some(old_value) = &old_value {
            ValueType::retain_list_origins_for_assignment(old_value, &mut value);
        }

        let changed = match &old_value {
            Some(old_value) => !val_equal(old_value, &value),
            None => true,
        };

        if let Some(patch) = &mut self.patch {
            patch.set_global(name, value);
        } else {
            self.global_variables.insert(name.to_string(), value);
        }

        if self.record_variable_changes && changed {
            if self.batch_observing_variable_changes {
                if let Some(patch) = &mut self.patch {
                    patch.add_changed_variable(name);
                } else if let Some(changed_variables) = &mut self.changed_variables_for_batch_obs {
                    changed_variables.insert(name.to_string());
                }
            } else if let Some(changed_variables) = &mut self.changed_variables_for_batch_obs {
                changed_variables.insert(name.to_string());
            }
        }
    }

    /// Host-facing setter. Only variables declared in the story may be set.
    pub fn set(&mut self, variable_name: &str, value: ValueType) -> Result<bool, StoryError> {
        if !self.default_global_variables.contains_key(variable_name) {
            return Err(StoryError::BadArgument(format!(
                "Cannot assign to a variable ({variable_name}) that hasn't been declared in the story"
            )));
        }

        let changed = match self.get(variable_name) {
            Some(existing) => !val_equal(existing, &value),
            None => true,
        };

        self.set_global(variable_name, value);
        Ok(changed)
    }

    /// Host-facing getter for a global variable.
    pub fn get(&self, variable_name: &str) -> Option<&ValueType> {
        if let Some(patch) = &self.patch {
            if let Some(value) = patch.get_global(variable_name) {
                return Some(value);
            }
        }

        // If a global is missing from the main dictionary it may be because
        // the story content changed and the default hasn't been
        // instantiated yet.
        if let Some(value) = self.global_variables.get(variable_name) {
            return Some(value);
        }

        self.default_global_variables.get(variable_name)
    }

    pub(crate) fn write_json(&self) -> Result<serde_json::Value, StoryError> {
        let mut jobj: Map<String, serde_json::Value> = Map::new();

        for (name, value) in &self.global_variables {
            // Don't write out values equal to the declared defaults.
            if let Some(default_value) = self.default_global_variables.get(name) {
                if val_equal(value, default_value) {
                    continue;
                }
            }

            jobj.insert(name.clone(), json_write::write_value_type(value)?);
        }

        Ok(serde_json::Value::Object(jobj))
    }

    pub(crate) fn load_json(
        &mut self,
        jobj: &Map<String, serde_json::Value>,
    ) -> Result<(), StoryError> {
        self.global_variables.clear();

        for (name, default_value) in &self.default_global_variables {
            match jobj.get(name) {
                Some(loaded_token) => {
                    self.global_variables
                        .insert(name.clone(), json_read::value_type_from_token(loaded_token)?);
                }
                None => {
                    self.global_variables
                        .insert(name.clone(), default_value.clone());
                }
            }
        }

        Ok(())
    }
}

fn val_equal(a: &ValueType, b: &ValueType) -> bool {
    match (a, b) {
        (ValueType::Bool(a), ValueType::Bool(b)) => a == b,
        (ValueType::Int(a), ValueType::Int(b)) => a == b,
        (ValueType::Float(a), ValueType::Float(b)) => a == b,
        (ValueType::List(a), ValueType::List(b)) => a == b,
        (ValueType::String(a), ValueType::String(b)) => a.string == b.string,
        (ValueType::DivertTarget(a), ValueType::DivertTarget(b)) => a == b,
        (ValueType::VariablePointer(a), ValueType::VariablePointer(b)) => a == b,
        _ => false,
    }
}
