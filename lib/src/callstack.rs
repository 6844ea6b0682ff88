//! The call stack: frames organized into logical threads. Threads are a
//! bookkeeping concept for choice generation, not OS threads; exactly one is
//! active at a time.
use std::collections::HashMap;

use serde_json::{json, Map};

use crate::json_read;
use crate::json_write;
use crate::node::{ContentTree, NodeId};
use crate::path::Path;
use crate::pointer::{self, Pointer};
use crate::push_pop::PushPopType;
use crate::story_error::StoryError;
use crate::value_type::ValueType;

/// One stack frame.
#[derive(Clone)]
pub struct Element {
    pub current_pointer: Pointer,
    pub in_expression_evaluation: bool,
    pub temporary_variables: HashMap<String, ValueType>,
    pub push_pop_type: PushPopType,

    // Bookkeeping for function returns and whitespace trimming around
    // function calls.
    pub evaluation_stack_height_when_pushed: usize,
    pub function_start_in_output_stream: i32,
}

impl Element {
    fn new(
        push_pop_type: PushPopType,
        pointer: Pointer,
        in_expression_evaluation: bool,
    ) -> Element {
        Element {
            current_pointer: pointer,
            in_expression_evaluation,
            temporary_variables: HashMap::new(),
            push_pop_type,
            evaluation_stack_height_when_pushed: 0,
            function_start_in_output_stream: -1,
        }
    }
}

/// An ordered list of frames under its own thread index, plus the last
/// resolved content location (used to detect container entry on divert).
#[derive(Clone)]
pub struct Thread {
    pub elements: Vec<Element>,
    pub thread_index: usize,
    pub previous_pointer: Pointer,
}

impl Thread {
    fn new(thread_index: usize) -> Thread {
        Thread {
            elements: Vec::new(),
            thread_index,
            previous_pointer: pointer::NULL,
        }
    }

    pub(crate) fn write_json(&self, tree: &ContentTree) -> Result<serde_json::Value, StoryError> {
        let mut jthread: Map<String, serde_json::Value> = Map::new();

        let mut jframes: Vec<serde_json::Value> = Vec::with_capacity(self.elements.len());
        for element in &self.elements {
            let mut jframe: Map<String, serde_json::Value> = Map::new();

            if let Some(container) = element.current_pointer.container {
                jframe.insert(
                    "cPath".to_string(),
                    json!(tree.path_of(container).get_components_string()),
                );
                jframe.insert("idx".to_string(), json!(element.current_pointer.index));
            }

            jframe.insert("exp".to_string(), json!(element.in_expression_evaluation));
            jframe.insert("type".to_string(), json!(element.push_pop_type.to_value()));

            if !element.temporary_variables.is_empty() {
                let mut jtemps: Map<String, serde_json::Value> = Map::new();
                for (name, value) in &element.temporary_variables {
                    jtemps.insert(name.clone(), json_write::write_value_type(value)?);
                }
                jframe.insert("temp".to_string(), serde_json::Value::Object(jtemps));
            }

            jframes.push(serde_json::Value::Object(jframe));
        }

        jthread.insert("callstack".to_string(), serde_json::Value::Array(jframes));
        jthread.insert("threadIndex".to_string(), json!(self.thread_index));

        if let Some(previous) = self.previous_pointer.resolve(tree) {
            jthread.insert(
                "previousContentObject".to_string(),
                json!(tree.path_of(previous).get_components_string()),
            );
        }

        Ok(serde_json::Value::Object(jthread))
    }

    pub(crate) fn from_json(
        tree: &ContentTree,
        jobj: &Map<String, serde_json::Value>,
    ) -> Result<Thread, StoryError> {
        let thread_index = jobj
            .get("threadIndex")
            .and_then(|v| v.as_u64())
            .ok_or_else(|| StoryError::BadJson("Missing threadIndex in callstack".to_string()))? as usize;

        let mut thread = Thread::new(thread_index);

        let jframes = jobj
            .get("callstack")
            .and_then(|v| v.as_array())
            .ok_or_else(|| StoryError::BadJson("Missing callstack frames".to_string()))?;

        for jframe in jframes {
            let jframe = jframe
                .as_object()
                .ok_or_else(|| StoryError::BadJson("Callstack frame is not an object".to_string()))?;

            let push_pop_type = PushPopType::from_value(
                jframe.get("type").and_then(|v| v.as_u64()).unwrap_or(0) as usize,
            );

            let mut pointer = pointer::NULL;

            if let Some(cpath) = jframe.get("cPath").and_then(|v| v.as_str()) {
                let path = Path::from_components_string(cpath);
                let result = tree.content_at_path(&path);

                let node = result.node.ok_or_else(|| {
                    StoryError::BadJson(format!(
                        "When loading state, internal story location couldn't be found: {cpath}. Has the story changed since this save data was created?"
                    ))
                })?;

                let container = if tree.is_container(node) {
                    Some(node)
                } else {
                    tree.parent(node)
                };

                pointer.container = container;
                pointer.index = jframe.get("idx").and_then(|v| v.as_i64()).unwrap_or(0) as i32;
            }

            let in_expression_evaluation =
                jframe.get("exp").and_then(|v| v.as_bool()).unwrap_or(false);

            let mut element = Element::new(push_pop_type, pointer, in_expression_evaluation);

            if let Some(jtemps) = jframe.get("temp").and_then(|v| v.as_object()) {
                for (name, jvalue) in jtemps {
                    element
                        .temporary_variables
                        .insert(name.clone(), json_read::value_type_from_token(jvalue)?);
                }
            }

            thread.elements.push(element);
        }

        if let Some(prev) = jobj.get("previousContentObject").and_then(|v| v.as_str()) {
            let path = Path::from_components_string(prev);
            let result = tree.content_at_path(&path);

            if let Some(node) = result.correct_node() {
                let container = tree.parent(node);
                let index = path
                    .last_component()
                    .and_then(|c| c.index())
                    .map(|i| i as i32)
                    .unwrap_or(-1);

                thread.previous_pointer = if path.last_component().map(|c| c.is_index()).unwrap_or(false)
                {
                    Pointer::new(container, index)
                } else {
                    Pointer::new(Some(node), -1)
                };
            }
        }

        Ok(thread)
    }
}

#[derive(Clone)]
pub struct CallStack {
    thread_counter: usize,
    start_of_root: Pointer,
    threads: Vec<Thread>,
}

impl CallStack {
    pub fn new(root: NodeId) -> CallStack {
        let mut callstack = CallStack {
            thread_counter: 0,
            start_of_root: Pointer::start_of(root),
            threads: Vec::new(),
        };
        callstack.reset();
        callstack
    }

    pub fn reset(&mut self) {
        let mut thread = Thread::new(0);
        thread
            .elements
            .push(Element::new(PushPopType::Tunnel, self.start_of_root, false));
        self.threads = vec![thread];
    }

    pub fn current_thread(&self) -> &Thread {
        self.threads.last().unwrap()
    }

    pub fn current_thread_mut(&mut self) -> &mut Thread {
        self.threads.last_mut().unwrap()
    }

    pub fn set_current_thread(&mut self, thread: Thread) {
        // Only used when restoring a choice's generation-time thread, at
        // which point exactly one thread should remain.
        self.threads.clear();
        self.threads.push(thread);
    }

    pub fn current_element(&self) -> &Element {
        self.current_thread().elements.last().unwrap()
    }

    pub fn current_element_mut(&mut self) -> &mut Element {
        self.current_thread_mut().elements.last_mut().unwrap()
    }

    pub fn current_element_index(&self) -> usize {
        self.current_thread().elements.len() - 1
    }

    pub fn depth(&self) -> usize {
        self.current_thread().elements.len()
    }

    pub fn can_pop(&self) -> bool {
        self.depth() > 1
    }

    pub fn can_pop_type(&self, push_pop_type: Option<PushPopType>) -> bool {
        if !self.can_pop() {
            return false;
        }

        match push_pop_type {
            Some(t) => self.current_element().push_pop_type == t,
            None => true,
        }
    }

    pub fn push(
        &mut self,
        push_pop_type: PushPopType,
        external_evaluation_stack_height: usize,
        output_stream_length_with_pushed: i32,
    ) {
        // The new frame starts at the current pointer and is taken out of
        // expression evaluation until the content says otherwise.
        let mut element = Element::new(
            push_pop_type,
            self.current_element().current_pointer,
            false,
        );
        element.evaluation_stack_height_when_pushed = external_evaluation_stack_height;
        element.function_start_in_output_stream = output_stream_length_with_pushed;

        self.current_thread_mut().elements.push(element);
    }

    pub fn pop(&mut self, push_pop_type: Option<PushPopType>) -> Result<(), StoryError> {
        if self.can_pop_type(push_pop_type) {
            self.current_thread_mut().elements.pop();
            Ok(())
        } else {
            Err(StoryError::InvalidStoryState(
                "Mismatched push/pop in Callstack".to_string(),
            ))
        }
    }

    pub fn element_is_evaluate_from_game(&self) -> bool {
        self.current_element().push_pop_type == PushPopType::FunctionEvaluationFromGame
    }

    pub fn can_pop_thread(&self) -> bool {
        self.threads.len() > 1 && !self.element_is_evaluate_from_game()
    }

    pub fn push_thread(&mut self) {
        let mut thread = self.current_thread().clone();
        self.thread_counter += 1;
        thread.thread_index = self.thread_counter;
        self.threads.push(thread);
    }

    /// A deep copy of the active thread under a fresh index, for capturing
    /// choice generation state.
    pub fn fork_thread(&mut self) -> Thread {
        let mut forked = self.current_thread().clone();
        self.thread_counter += 1;
        forked.thread_index = self.thread_counter;
        forked
    }

    pub fn pop_thread(&mut self) -> Result<(), StoryError> {
        if self.can_pop_thread() {
            self.threads.pop();
            Ok(())
        } else {
            Err(StoryError::InvalidStoryState(
                "Can't pop thread".to_string(),
            ))
        }
    }

    pub fn get_thread_with_index(&self, index: usize) -> Option<&Thread> {
        self.threads.iter().find(|t| t.thread_index == index)
    }

    pub fn get_temporary_variable_with_name(
        &self,
        name: &str,
        context_index: i32,
    ) -> Option<ValueType> {
        let context_index = if context_index == -1 {
            self.current_element_index() as i32 + 1
        } else {
            context_index
        };

        let element = self
            .current_thread()
            .elements
            .get((context_index - 1) as usize)?;

        element.temporary_variables.get(name).cloned()
    }

    pub fn set_temporary_variable(
        &mut self,
        name: String,
        mut value: ValueType,
        declare_new: bool,
        context_index: i32,
    ) -> Result<(), StoryError> {
        let context_index = if context_index == -1 {
            self.current_element_index() as i32 + 1
        } else {
            context_index
        };

        let element_index = (context_index - 1) as usize;
        let element = self
            .current_thread_mut()
            .elements
            .get_mut(element_index)
            .ok_or_else(|| {
                StoryError::InvalidStoryState("Invalid context index for temporary".to_string())
            })?;

        if !declare_new && !element.temporary_variables.contains_key(&name) {
            return Err(StoryError::InvalidStoryState(format!(
                "Could not find temporary variable to set: {name}"
            )));
        }

        if let Some(old_value) = element.temporary_variables.get(&name) {
            ValueType::retain_list_origins_for_assignment(old_value, &mut value);
        }

        element.temporary_variables.insert(name, value);
        Ok(())
    }

    /// The context a named variable resolves to: the current frame if it
    /// holds a temporary of that name, else global (0).
    pub fn context_for_variable_named(&self, name: &str) -> usize {
        if self.current_element().temporary_variables.contains_key(name) {
            self.current_element_index() + 1
        } else {
            0
        }
    }

    pub fn get_callstack_trace(&self, tree: &ContentTree) -> String {
        let mut sb = String::new();

        for (i, thread) in self.threads.iter().enumerate() {
            let is_current = i == self.threads.len() - 1;
            sb.push_str(&format!(
                "=== THREAD {}/{} {}===\n",
                i + 1,
                self.threads.len(),
                if is_current { "(current) " } else { "" }
            ));

            for element in &thread.elements {
                match element.push_pop_type {
                    PushPopType::Function => sb.push_str("  [FUNCTION] "),
                    _ => sb.push_str("  [TUNNEL] "),
                }

                match element.current_pointer.resolve(tree) {
                    Some(node) => {
                        sb.push_str("<SOMEWHERE IN ");
                        sb.push_str(tree.path_of(node).get_components_string());
                        sb.push_str(">\n");
                    }
                    None => sb.push_str("<UNKNOWN>\n"),
                }
            }
        }

        sb
    }

    pub(crate) fn write_json(&self, tree: &ContentTree) -> Result<serde_json::Value, StoryError> {
        let mut jobj: Map<String, serde_json::Value> = Map::new();

        let mut jthreads: Vec<serde_json::Value> = Vec::with_capacity(self.threads.len());
        for thread in &self.threads {
            jthreads.push(thread.write_json(tree)?);
        }

        jobj.insert("threads".to_string(), serde_json::Value::Array(jthreads));
        jobj.insert("threadCounter".to_string(), json!(self.thread_counter));

        Ok(serde_json::Value::Object(jobj))
    }

    pub(crate) fn load_json(
        &mut self,
        tree: &ContentTree,
        jobj: &Map<String, serde_json::Value>,
    ) -> Result<(), StoryError> {
        self.thread_counter = jobj
            .get("threadCounter")
            .and_then(|v| v.as_u64())
            .unwrap_or(0) as usize;

        let jthreads = jobj
            .get("threads")
            .and_then(|v| v.as_array())
            .ok_or_else(|| StoryError::BadJson("Missing threads in callstack".to_string()))?;

        self.threads = Vec::with_capacity(jthreads.len());
        for jthread in jthreads {
            let jthread = jthread
                .as_object()
                .ok_or_else(|| StoryError::BadJson("Thread is not an object".to_string()))?;
            self.threads.push(Thread::from_json(tree, jthread)?);
        }

        if self.threads.is_empty() {
            return Err(StoryError::BadJson(
                "Loaded callstack has no threads".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{ContainerData, ContentTree, NodeKind};

    fn stack() -> CallStack {
        let mut tree = ContentTree::new();
        let root = tree.add(None, NodeKind::Container(ContainerData::new(None, 0)));
        CallStack::new(root)
    }

    #[test]
    fn push_pop_balance() {
        let mut callstack = stack();
        assert_eq!(1, callstack.depth());
        assert!(!callstack.can_pop());

        callstack.push(PushPopType::Function, 0, 0);
        callstack.push(PushPopType::Tunnel, 0, 0);
        assert_eq!(3, callstack.depth());

        assert!(callstack.pop(Some(PushPopType::Tunnel)).is_ok());
        assert!(callstack.pop(Some(PushPopType::Function)).is_ok());
        assert_eq!(1, callstack.depth());

        // Popping the base frame never succeeds.
        assert!(callstack.pop(None).is_err());
    }

    #[test]
    fn mismatched_pop_is_error() {
        let mut callstack = stack();
        callstack.push(PushPopType::Function, 0, 0);
        assert!(callstack.pop(Some(PushPopType::Tunnel)).is_err());
    }

    #[test]
    fn temporaries_are_per_frame() {
        let mut callstack = stack();
        callstack
            .set_temporary_variable("x".to_string(), ValueType::Int(1), true, -1)
            .unwrap();

        callstack.push(PushPopType::Function, 0, 0);
        assert!(callstack
            .get_temporary_variable_with_name("x", -1)
            .is_none());
        assert_eq!(
            Some(ValueType::Int(1)),
            callstack.get_temporary_variable_with_name("x", 1)
        );

        // Setting an undeclared temporary without declaring is an error.
        assert!(callstack
            .set_temporary_variable("y".to_string(), ValueType::Int(2), false, -1)
            .is_err());
    }

    #[test]
    fn thread_fork_and_pop() {
        let mut callstack = stack();
        assert!(!callstack.can_pop_thread());

        callstack.push_thread();
        assert!(callstack.can_pop_thread());
        assert_eq!(1, callstack.current_thread().thread_index);

        callstack.pop_thread().unwrap();
        assert!(callstack.pop_thread().is_err());
    }
}
