//! All story state that changes at runtime, as one cloneable value: flows,
//! the evaluation stack, variables, counters and the RNG seeds. Cloning it
//! and patching the copy is how lookahead and background saves work.
use std::collections::HashMap;
use std::rc::Rc;

use rand::Rng;
use serde_json::{json, Map};

use crate::callstack::CallStack;
use crate::choice::Choice;
use crate::control_command::CommandType;
use crate::flow::Flow;
use crate::json_read;
use crate::json_write;
use crate::list_definitions_origin::ListDefinitionsOrigin;
use crate::node::{ContentTree, NodeId, ROOT};
use crate::path::Path;
use crate::pointer::{self, Pointer};
use crate::push_pop::PushPopType;
use crate::rt_obj::RtObj;
use crate::state_patch::StatePatch;
use crate::story::INK_VERSION_CURRENT;
use crate::story_error::StoryError;
use crate::value_type::ValueType;
use crate::variables_state::VariablesState;

pub const INK_SAVE_STATE_VERSION: u32 = 10;
pub const MIN_COMPATIBLE_LOAD_VERSION: u32 = 8;

static DEFAULT_FLOW_NAME: &str = "DEFAULT_FLOW";

#[derive(Clone)]
pub struct StoryState {
    pub(crate) current_flow: Flow,
    pub did_safe_exit: bool,
    output_stream_text_dirty: bool,
    output_stream_tags_dirty: bool,
    pub variables_state: VariablesState,
    pub evaluation_stack: Vec<RtObj>,
    tree: Rc<ContentTree>,
    current_errors: Vec<String>,
    current_warnings: Vec<String>,
    current_text: Option<String>,
    pub patch: Option<StatePatch>,
    named_flows: Option<HashMap<String, Flow>>,
    pub diverted_pointer: Pointer,
    pub visit_counts: HashMap<String, i32>,
    pub turn_indices: HashMap<String, i32>,
    pub current_turn_index: i32,
    pub story_seed: i32,
    pub previous_random: i32,
    current_tags: Vec<String>,
    list_definitions: Rc<ListDefinitionsOrigin>,
}

impl StoryState {
    pub fn new(tree: Rc<ContentTree>, list_definitions: Rc<ListDefinitionsOrigin>) -> StoryState {
        let story_seed = rand::thread_rng().gen_range(0..100);

        let mut state = StoryState {
            current_flow: Flow::new(DEFAULT_FLOW_NAME, ROOT),
            did_safe_exit: false,
            output_stream_text_dirty: true,
            output_stream_tags_dirty: true,
            variables_state: VariablesState::new(list_definitions.clone()),
            evaluation_stack: Vec::new(),
            tree,
            current_errors: Vec::new(),
            current_warnings: Vec::new(),
            current_text: None,
            patch: None,
            named_flows: None,
            diverted_pointer: pointer::NULL,
            visit_counts: HashMap::new(),
            turn_indices: HashMap::new(),
            current_turn_index: -1,
            story_seed,
            previous_random: 0,
            current_tags: Vec::new(),
            list_definitions,
        };

        state.go_to_start();
        state
    }

    pub fn can_continue(&self) -> bool {
        !self.get_current_pointer().is_null() && !self.has_error()
    }

    pub fn has_error(&self) -> bool {
        !self.current_errors.is_empty()
    }

    pub fn has_warning(&self) -> bool {
        !self.current_warnings.is_empty()
    }

    pub fn get_current_errors(&self) -> &Vec<String> {
        &self.current_errors
    }

    pub fn get_current_warnings(&self) -> &Vec<String> {
        &self.current_warnings
    }

    pub(crate) fn add_error(&mut self, message: String, is_warning: bool) {
        if is_warning {
            self.current_warnings.push(message);
        } else {
            self.current_errors.push(message);
        }
    }

    pub(crate) fn reset_errors(&mut self) {
        self.current_errors.clear();
        self.current_warnings.clear();
    }

    pub fn get_callstack(&self) -> &CallStack {
        &self.current_flow.callstack
    }

    pub fn get_callstack_mut(&mut self) -> &mut CallStack {
        &mut self.current_flow.callstack
    }

    pub fn get_current_pointer(&self) -> Pointer {
        self.get_callstack().current_element().current_pointer
    }

    pub fn set_current_pointer(&mut self, pointer: Pointer) {
        self.get_callstack_mut().current_element_mut().current_pointer = pointer;
    }

    pub fn get_previous_pointer(&self) -> Pointer {
        self.get_callstack().current_thread().previous_pointer
    }

    pub fn set_previous_pointer(&mut self, pointer: Pointer) {
        self.get_callstack_mut().current_thread_mut().previous_pointer = pointer;
    }

    pub fn get_in_expression_evaluation(&self) -> bool {
        self.get_callstack().current_element().in_expression_evaluation
    }

    pub fn set_in_expression_evaluation(&mut self, value: bool) {
        self.get_callstack_mut().current_element_mut().in_expression_evaluation = value;
    }

    fn go_to_start(&mut self) {
        self.set_current_pointer(Pointer::start_of(ROOT));
    }

    pub fn get_output_stream(&self) -> &Vec<RtObj> {
        &self.current_flow.output_stream
    }

    fn get_output_stream_mut(&mut self) -> &mut Vec<RtObj> {
        &mut self.current_flow.output_stream
    }

    fn output_stream_dirty(&mut self) {
        self.output_stream_text_dirty = true;
        self.output_stream_tags_dirty = true;
    }

    pub fn reset_output(&mut self, objs: Option<Vec<RtObj>>) {
        self.get_output_stream_mut().clear();
        if let Some(objs) = objs {
            self.get_output_stream_mut().extend(objs);
        }
        self.output_stream_dirty();
    }

    pub fn in_string_evaluation(&self) -> bool {
        for obj in self.get_output_stream().iter().rev() {
            if let RtObj::Command(CommandType::BeginString) = obj {
                return true;
            }
        }
        false
    }

    pub fn get_current_text(&mut self) -> String {
        if self.output_stream_text_dirty {
            let mut sb = String::new();
            let mut in_tag = false;

            for obj in self.get_output_stream() {
                match obj {
                    RtObj::Value(ValueType::String(text)) if !in_tag => sb.push_str(&text.string),
                    RtObj::Command(CommandType::BeginTag) => in_tag = true,
                    RtObj::Command(CommandType::EndTag) => in_tag = false,
                    _ => {}
                }
            }

            self.current_text = Some(StoryState::clean_output_whitespace(&sb));
            self.output_stream_text_dirty = false;
        }

        self.current_text.clone().unwrap_or_default()
    }

    pub fn get_current_tags(&mut self) -> Vec<String> {
        if self.output_stream_tags_dirty {
            self.current_tags.clear();

            let mut in_tag = false;
            let mut sb = String::new();
            let mut tags = Vec::new();

            for obj in self.get_output_stream() {
                match obj {
                    RtObj::Command(CommandType::BeginTag) => {
                        if in_tag && !sb.is_empty() {
                            tags.push(Self::clean_output_whitespace(&sb));
                            sb.clear();
                        }
                        in_tag = true;
                    }
                    RtObj::Command(CommandType::EndTag) => {
                        if !sb.is_empty() {
                            tags.push(Self::clean_output_whitespace(&sb));
                            sb.clear();
                        }
                        in_tag = false;
                    }
                    RtObj::Value(ValueType::String(text)) if in_tag => {
                        sb.push_str(&text.string);
                    }
                    // Legacy tags from older compiled stories, already clean.
                    RtObj::Tag(text) if in_tag => {
                        if !text.is_empty() {
                            tags.push(text.clone());
                        }
                    }
                    _ => {}
                }
            }

            if !sb.is_empty() {
                tags.push(Self::clean_output_whitespace(&sb));
            }

            self.current_tags = tags;
            self.output_stream_tags_dirty = false;
        }

        self.current_tags.clone()
    }

    /// Collapses runs of inline whitespace to single spaces and strips it
    /// entirely at line starts and ends.
    pub fn clean_output_whitespace(input: &str) -> String {
        let mut sb = String::with_capacity(input.len());
        let mut current_whitespace_start: i32 = -1;
        let mut start_of_line: i32 = 0;

        for (i, c) in input.chars().enumerate() {
            let is_inline_whitespace = c == ' ' || c == '\t';

            if is_inline_whitespace && current_whitespace_start == -1 {
                current_whitespace_start = i as i32;
            }

            if !is_inline_whitespace {
                if c != '\n'
                    && current_whitespace_start > 0
                    && current_whitespace_start != start_of_line
                {
                    sb.push(' ');
                }
                current_whitespace_start = -1;
            }

            if c == '\n' {
                start_of_line = i as i32 + 1;
            }

            if !is_inline_whitespace {
                sb.push(c);
            }
        }

        sb
    }

    pub fn output_stream_ends_in_newline(&self) -> bool {
        for obj in self.get_output_stream().iter().rev() {
            match obj {
                RtObj::Command(_) => break,
                RtObj::Value(ValueType::String(text)) => {
                    if text.is_newline {
                        return true;
                    } else if text.is_non_whitespace() {
                        break;
                    }
                }
                _ => {}
            }
        }
        false
    }

    fn output_stream_contains_content(&self) -> bool {
        self.get_output_stream()
            .iter()
            .any(|obj| matches!(obj, RtObj::Value(ValueType::String(_))))
    }

    pub fn push_evaluation_stack(&mut self, obj: RtObj) {
        self.evaluation_stack.push(obj);
    }

    pub fn pop_evaluation_stack(&mut self) -> Result<RtObj, StoryError> {
        self.evaluation_stack.pop().ok_or_else(|| {
            StoryError::InvalidStoryState("Popping an empty evaluation stack".to_string())
        })
    }

    pub fn pop_evaluation_stack_multiple(
        &mut self,
        number_of_objects: usize,
    ) -> Result<Vec<RtObj>, StoryError> {
        if number_of_objects > self.evaluation_stack.len() {
            return Err(StoryError::InvalidStoryState(
                "Trying to pop too many objects from the evaluation stack".to_string(),
            ));
        }

        let start = self.evaluation_stack.len() - number_of_objects;
        Ok(self.evaluation_stack.drain(start..).collect())
    }

    pub fn peek_evaluation_stack(&self) -> Option<&RtObj> {
        self.evaluation_stack.last()
    }

    pub fn push_to_output_stream(&mut self, obj: RtObj) {
        if let Some(text) = obj.as_string_value() {
            if let Some(pieces) = StoryState::try_splitting_head_tail_whitespace(&text.string) {
                for piece in pieces {
                    self.push_to_output_stream_individual(piece);
                }
                self.output_stream_dirty();
                return;
            }
        }

        self.push_to_output_stream_individual(obj);
    }

    // Splits a text chunk so leading and trailing newlines (with their
    // surrounding spaces) become separate stream entries the trimming
    // logic can act on.
    fn try_splitting_head_tail_whitespace(text: &str) -> Option<Vec<RtObj>> {
        let mut head_first_newline_idx: i32 = -1;
        let mut head_last_newline_idx: i32 = -1;
        for (i, c) in text.char_indices() {
            if c == '\n' {
                if head_first_newline_idx == -1 {
                    head_first_newline_idx = i as i32;
                }
                head_last_newline_idx = i as i32;
            } else if c == ' ' || c == '\t' {
                continue;
            } else {
                break;
            }
        }

        let mut tail_last_newline_idx: i32 = -1;
        let mut tail_first_newline_idx: i32 = -1;
        for (i, c) in text.char_indices().rev() {
            if c == '\n' {
                if tail_last_newline_idx == -1 {
                    tail_last_newline_idx = i as i32;
                }
                tail_first_newline_idx = i as i32;
            } else if c == ' ' || c == '\t' {
                continue;
            } else {
                break;
            }
        }

        if head_first_newline_idx == -1 && tail_last_newline_idx == -1 {
            return None;
        }

        let mut pieces = Vec::new();
        let mut inner_start = 0usize;
        let mut inner_end = text.len();

        if head_first_newline_idx != -1 {
            if head_first_newline_idx > 0 {
                pieces.push(RtObj::Value(ValueType::new_string(
                    &text[0..head_first_newline_idx as usize],
                )));
            }
            pieces.push(RtObj::Value(ValueType::new_string("\n")));
            inner_start = head_last_newline_idx as usize + 1;
        }

        if tail_last_newline_idx != -1 {
            inner_end = tail_first_newline_idx as usize;
        }

        if inner_end > inner_start {
            pieces.push(RtObj::Value(ValueType::new_string(
                &text[inner_start..inner_end],
            )));
        }

        if tail_last_newline_idx != -1 && tail_first_newline_idx > head_last_newline_idx {
            pieces.push(RtObj::Value(ValueType::new_string("\n")));
            if (tail_last_newline_idx as usize) < text.len() - 1 {
                pieces.push(RtObj::Value(ValueType::new_string(
                    &text[tail_last_newline_idx as usize + 1..],
                )));
            }
        }

        Some(pieces)
    }

    fn push_to_output_stream_individual(&mut self, obj: RtObj) {
        let mut include_in_output = true;

        if obj.is_glue() {
            // New glue: chomp any trailing newlines off the stream.
            self.trim_newlines_from_output_stream();
        } else if let Some(text) = obj.as_string_value() {
            // New text: whitespace may need to be thrown away, either for
            // function start/end trimming or because of user glue.
            let is_newline = text.is_newline;
            let is_non_whitespace = text.is_non_whitespace();

            let mut function_trim_index = -1;
            {
                let current_element = self.get_callstack().current_element();
                if current_element.push_pop_type == PushPopType::Function {
                    function_trim_index = current_element.function_start_in_output_stream;
                }
            }

            let mut glue_trim_index = -1;
            let output_stream = self.get_output_stream();
            for i in (0..output_stream.len()).rev() {
                match &output_stream[i] {
                    RtObj::Glue => {
                        glue_trim_index = i as i32;
                        break;
                    }
                    RtObj::Command(CommandType::BeginString) => {
                        if i as i32 >= function_trim_index {
                            function_trim_index = -1;
                        }
                        break;
                    }
                    _ => {}
                }
            }

            let trim_index = if glue_trim_index != -1 && function_trim_index != -1 {
                function_trim_index.min(glue_trim_index)
            } else if glue_trim_index != -1 {
                glue_trim_index
            } else {
                function_trim_index
            };

            if trim_index != -1 {
                if is_newline {
                    include_in_output = false;
                } else if is_non_whitespace {
                    if glue_trim_index > -1 {
                        self.remove_existing_glue();
                    }

                    if function_trim_index > -1 {
                        let elements = &mut self.get_callstack_mut().current_thread_mut().elements;
                        for element in elements.iter_mut().rev() {
                            if element.push_pop_type == PushPopType::Function {
                                element.function_start_in_output_stream = -1;
                            } else {
                                break;
                            }
                        }
                    }
                }
            } else if is_newline
                && (self.output_stream_ends_in_newline() || !self.output_stream_contains_content())
            {
                include_in_output = false;
            }
        }

        if include_in_output {
            self.get_output_stream_mut().push(obj);
            self.output_stream_dirty();
        }
    }

    fn trim_newlines_from_output_stream(&mut self) {
        let output_stream = self.get_output_stream_mut();

        // Work backwards to find the first newline in a run of trailing
        // whitespace.
        let mut remove_whitespace_from: i32 = -1;
        let mut i = output_stream.len() as i32 - 1;
        while i >= 0 {
            match &output_stream[i as usize] {
                RtObj::Command(_) => break,
                RtObj::Value(ValueType::String(text)) => {
                    if text.is_non_whitespace() {
                        break;
                    } else if text.is_newline {
                        remove_whitespace_from = i;
                    }
                }
                _ => {}
            }
            i -= 1;
        }

        if remove_whitespace_from >= 0 {
            let mut i = remove_whitespace_from as usize;
            while i < output_stream.len() {
                if matches!(&output_stream[i], RtObj::Value(ValueType::String(_))) {
                    output_stream.remove(i);
                } else {
                    i += 1;
                }
            }
        }

        self.output_stream_dirty();
    }

    fn remove_existing_glue(&mut self) {
        let output_stream = self.get_output_stream_mut();

        let mut i = output_stream.len() as i32 - 1;
        while i >= 0 {
            match &output_stream[i as usize] {
                RtObj::Glue => {
                    output_stream.remove(i as usize);
                }
                RtObj::Command(_) => break,
                _ => {}
            }
            i -= 1;
        }

        self.output_stream_dirty();
    }

    pub fn pop_from_output_stream(&mut self, count: usize) {
        let len = self.get_output_stream().len();
        if count <= len {
            self.get_output_stream_mut().truncate(len - count);
        }
        self.output_stream_dirty();
    }

    pub fn get_generated_choices(&self) -> &Vec<Choice> {
        &self.current_flow.current_choices
    }

    pub fn get_generated_choices_mut(&mut self) -> &mut Vec<Choice> {
        &mut self.current_flow.current_choices
    }

    pub fn get_current_choices(&self) -> Option<&Vec<Choice>> {
        // While text content can still be generated the choice list reads
        // as empty, since choices always come at the end.
        if self.can_continue() {
            return None;
        }

        Some(&self.current_flow.current_choices)
    }

    pub fn increment_visit_count_for_container(&mut self, container: NodeId) -> Result<(), StoryError> {
        if self.patch.is_some() {
            let new_count = self.visit_count_for_container(container)? + 1;
            if let Some(patch) = &mut self.patch {
                patch.set_visit_count(container, new_count);
            }
            return Ok(());
        }

        let path_str = self.tree.path_of(container).get_components_string().to_string();
        let count = self.visit_counts.get(&path_str).copied().unwrap_or(0) + 1;
        self.visit_counts.insert(path_str, count);
        Ok(())
    }

    pub fn visit_count_for_container(&self, container: NodeId) -> Result<i32, StoryError> {
        let counted = self
            .tree
            .container(container)
            .map(|c| c.visits_should_be_counted)
            .unwrap_or(false);

        if !counted {
            return Err(StoryError::InvalidStoryState(format!(
                "Read count for target ({}) unknown.",
                self.tree.path_of(container).get_components_string()
            )));
        }

        if let Some(patch) = &self.patch {
            if let Some(count) = patch.get_visit_count(container) {
                return Ok(count);
            }
        }

        let path_str = self.tree.path_of(container).get_components_string();
        Ok(self.visit_counts.get(path_str).copied().unwrap_or(0))
    }

    pub fn visit_count_at_path_string(&self, path_string: &str) -> Result<i32, StoryError> {
        if self.patch.is_some() {
            let result = self
                .tree
                .content_at_path(&Path::from_components_string(path_string));
            let container = result
                .node
                .filter(|n| self.tree.is_container(*n))
                .ok_or_else(|| {
                    StoryError::InvalidStoryState(format!(
                        "Content at path not found: {path_string}"
                    ))
                })?;

            if let Some(patch) = &self.patch {
                if let Some(count) = patch.get_visit_count(container) {
                    return Ok(count);
                }
            }
        }

        Ok(self.visit_counts.get(path_string).copied().unwrap_or(0))
    }

    pub fn record_turn_index_visit_to_container(&mut self, container: NodeId) {
        if let Some(patch) = &mut self.patch {
            patch.set_turn_index(container, self.current_turn_index);
            return;
        }

        let path_str = self.tree.path_of(container).get_components_string().to_string();
        self.turn_indices.insert(path_str, self.current_turn_index);
    }

    pub(crate) fn turns_since_for_container(&self, container: NodeId) -> Result<i32, StoryError> {
        let counted = self
            .tree
            .container(container)
            .map(|c| c.turn_index_should_be_counted)
            .unwrap_or(false);

        if !counted {
            return Err(StoryError::InvalidStoryState(format!(
                "TURNS_SINCE() for target ({}) unknown.",
                self.tree.path_of(container).get_components_string()
            )));
        }

        if let Some(patch) = &self.patch {
            if let Some(index) = patch.get_turn_index(container) {
                return Ok(self.current_turn_index - index);
            }
        }

        let path_str = self.tree.path_of(container).get_components_string();
        match self.turn_indices.get(path_str) {
            Some(index) => Ok(self.current_turn_index - index),
            None => Ok(-1),
        }
    }

    pub fn try_exit_function_evaluation_from_game(&mut self) -> bool {
        if self.get_callstack().element_is_evaluate_from_game() {
            self.set_current_pointer(pointer::NULL);
            self.did_safe_exit = true;
            return true;
        }

        false
    }

    pub fn pop_callstack(&mut self, push_pop_type: Option<PushPopType>) -> Result<(), StoryError> {
        // At the end of a function call, trim any whitespace from the end.
        if self.get_callstack().current_element().push_pop_type == PushPopType::Function {
            self.trim_whitespace_from_function_end();
        }

        self.get_callstack_mut().pop(push_pop_type)
    }

    // Whitespace a function produces is always trimmed at both ends: the
    // start is discarded as it is generated, the end in one go here when
    // the function pops.
    fn trim_whitespace_from_function_end(&mut self) {
        let function_start_point = match self
            .get_callstack()
            .current_element()
            .function_start_in_output_stream
        {
            -1 => 0,
            start_point => start_point,
        };

        let mut i = self.get_output_stream().len() as i32 - 1;
        while i >= function_start_point {
            match &self.get_output_stream()[i as usize] {
                RtObj::Command(_) => break,
                RtObj::Value(ValueType::String(text)) => {
                    if text.is_newline || text.is_inline_whitespace {
                        self.get_output_stream_mut().remove(i as usize);
                        self.output_stream_dirty();
                    } else {
                        break;
                    }
                }
                _ => {}
            }
            i -= 1;
        }
    }

    pub fn set_chosen_path(
        &mut self,
        path: &Path,
        incrementing_turn_index: bool,
    ) -> Result<(), StoryError> {
        // Changing direction: clear the current set of choices.
        self.current_flow.current_choices.clear();

        let mut new_pointer = self.tree.pointer_at_path(path)?;
        if !new_pointer.is_null() && new_pointer.index == -1 {
            new_pointer.index = 0;
        }

        self.set_current_pointer(new_pointer);

        if incrementing_turn_index {
            self.current_turn_index += 1;
        }

        Ok(())
    }

    pub(crate) fn force_end(&mut self) {
        self.get_callstack_mut().reset();
        self.current_flow.current_choices.clear();
        self.set_current_pointer(pointer::NULL);
        self.set_previous_pointer(pointer::NULL);
        self.did_safe_exit = true;
    }

    pub fn start_function_evaluation_from_game(
        &mut self,
        func_container: NodeId,
        arguments: Option<&[ValueType]>,
    ) -> Result<(), StoryError> {
        let eval_stack_height = self.evaluation_stack.len();
        self.get_callstack_mut()
            .push(PushPopType::FunctionEvaluationFromGame, eval_stack_height, 0);
        self.set_current_pointer(Pointer::start_of(func_container));

        self.pass_arguments_to_evaluation_stack(arguments)
    }

    pub fn pass_arguments_to_evaluation_stack(
        &mut self,
        arguments: Option<&[ValueType]>,
    ) -> Result<(), StoryError> {
        if let Some(arguments) = arguments {
            for arg in arguments {
                match arg {
                    ValueType::Bool(_)
                    | ValueType::Int(_)
                    | ValueType::Float(_)
                    | ValueType::String(_)
                    | ValueType::List(_) => {
                        self.push_evaluation_stack(RtObj::Value(arg.clone()));
                    }
                    _ => {
                        return Err(StoryError::BadArgument(
                            "ink arguments when calling evaluate_function or choose_path_string must be int, float, string, bool or list".to_string(),
                        ))
                    }
                }
            }
        }

        Ok(())
    }

    pub fn complete_function_evaluation_from_game(
        &mut self,
    ) -> Result<Option<ValueType>, StoryError> {
        if !self.get_callstack().element_is_evaluate_from_game() {
            return Err(StoryError::InvalidStoryState(format!(
                "Expected external function evaluation to be complete. Stack trace: {}",
                self.get_callstack().get_callstack_trace(&self.tree)
            )));
        }

        let original_evaluation_stack_height = self
            .get_callstack()
            .current_element()
            .evaluation_stack_height_when_pushed;

        // Potentially pop multiple values, in case the caller passed too
        // many arguments; the first popped is the return value.
        let mut returned_obj = None;
        while self.evaluation_stack.len() > original_evaluation_stack_height {
            let popped = self.pop_evaluation_stack()?;
            if returned_obj.is_none() {
                returned_obj = Some(popped);
            }
        }

        self.get_callstack_mut()
            .pop(Some(PushPopType::FunctionEvaluationFromGame))?;

        match returned_obj {
            Some(RtObj::Void) | None => Ok(None),
            Some(RtObj::Value(value)) => match value {
                // Divert targets come back as their path string, since
                // paths aren't part of the public surface.
                ValueType::DivertTarget(path) => {
                    Ok(Some(ValueType::new_string(path.get_components_string())))
                }
                other => Ok(Some(other)),
            },
            Some(_) => Ok(None),
        }
    }

    /// Clones this state and hangs a fresh patch off the clone; cheap-ish,
    /// and the original stays untouched until `apply_any_patch` on it.
    pub fn copy_and_start_patching(&self) -> StoryState {
        let mut copy = self.clone();

        copy.patch = Some(StatePatch::new(self.patch.as_ref()));
        copy.variables_state.patch = copy.patch.clone();
        copy.output_stream_dirty();

        copy
    }

    pub fn restore_after_patch(&mut self) {
        // The patch is normally gone by now, but a background save may
        // still hold one.
        self.variables_state.patch = self.patch.clone();
    }

    pub fn apply_any_patch(&mut self) {
        if self.patch.is_none() {
            return;
        }

        self.variables_state.apply_patch();

        if let Some(patch) = self.patch.take() {
            for (container, count) in patch.visit_counts {
                let path_str = self
                    .tree
                    .path_of(container)
                    .get_components_string()
                    .to_string();
                self.visit_counts.insert(path_str, count);
            }

            for (container, index) in patch.turn_indices {
                let path_str = self
                    .tree
                    .path_of(container)
                    .get_components_string()
                    .to_string();
                self.turn_indices.insert(path_str, index);
            }
        }

        self.variables_state.patch = None;
    }

    pub fn get_current_flow_name(&self) -> &str {
        &self.current_flow.name
    }

    pub fn current_flow_is_default_flow(&self) -> bool {
        self.current_flow.name == DEFAULT_FLOW_NAME
    }

    pub fn get_alive_flow_names(&self) -> Vec<String> {
        let mut names = Vec::new();

        if let Some(named_flows) = &self.named_flows {
            for name in named_flows.keys() {
                if name != DEFAULT_FLOW_NAME {
                    names.push(name.clone());
                }
            }
        }

        if self.current_flow.name != DEFAULT_FLOW_NAME {
            names.push(self.current_flow.name.clone());
        }

        names
    }

    pub(crate) fn switch_flow_internal(&mut self, flow_name: &str) {
        if flow_name == self.current_flow.name {
            return;
        }

        let named_flows = self.named_flows.get_or_insert_with(HashMap::new);

        let mut next_flow = match named_flows.remove(flow_name) {
            Some(flow) => flow,
            None => Flow::new(flow_name, ROOT),
        };

        std::mem::swap(&mut self.current_flow, &mut next_flow);
        named_flows.insert(next_flow.name.clone(), next_flow);

        self.output_stream_dirty();
    }

    pub(crate) fn switch_to_default_flow_internal(&mut self) {
        if self.named_flows.is_some() {
            self.switch_flow_internal(DEFAULT_FLOW_NAME);
        }
    }

    pub(crate) fn remove_flow_internal(&mut self, flow_name: &str) -> Result<(), StoryError> {
        if flow_name == DEFAULT_FLOW_NAME {
            return Err(StoryError::BadArgument(
                "Cannot destroy default flow".to_string(),
            ));
        }

        // If we're removing the flow we're in, switch back to default first.
        if self.current_flow.name == flow_name {
            self.switch_to_default_flow_internal();
        }

        if let Some(named_flows) = &mut self.named_flows {
            named_flows.remove(flow_name);
        }

        Ok(())
    }

    pub fn to_json(&mut self) -> Result<String, StoryError> {
        Ok(self.write_json()?.to_string())
    }

    pub fn load_json(&mut self, save_string: &str) -> Result<(), StoryError> {
        match serde_json::from_str(save_string) {
            Ok(value) => self.load_json_obj(value),
            Err(_) => Err(StoryError::BadJson("State not in JSON format.".to_string())),
        }
    }

    fn write_json(&mut self) -> Result<serde_json::Value, StoryError> {
        let mut jobj: Map<String, serde_json::Value> = Map::new();

        let tree = self.tree.clone();

        let mut jflows: Map<String, serde_json::Value> = Map::new();
        jflows.insert(
            self.current_flow.name.clone(),
            self.current_flow.write_json(&tree)?,
        );

        if let Some(named_flows) = &mut self.named_flows {
            for (name, flow) in named_flows.iter_mut() {
                jflows.insert(name.clone(), flow.write_json(&tree)?);
            }
        }

        jobj.insert("flows".to_string(), serde_json::Value::Object(jflows));

        jobj.insert("currentFlowName".to_string(), json!(self.current_flow.name));
        jobj.insert("variablesState".to_string(), self.variables_state.write_json()?);
        jobj.insert(
            "evalStack".to_string(),
            json_write::write_rt_obj_list(&self.evaluation_stack)?,
        );

        if !self.diverted_pointer.is_null() {
            let path = self.diverted_pointer.get_path(&tree).ok_or_else(|| {
                StoryError::InvalidStoryState("Diverted pointer has no path".to_string())
            })?;
            jobj.insert(
                "currentDivertTarget".to_string(),
                json!(path.get_components_string()),
            );
        }

        jobj.insert(
            "visitCounts".to_string(),
            json_write::write_int_dictionary(&self.visit_counts),
        );
        jobj.insert(
            "turnIndices".to_string(),
            json_write::write_int_dictionary(&self.turn_indices),
        );

        jobj.insert("turnIdx".to_string(), json!(self.current_turn_index));
        jobj.insert("storySeed".to_string(), json!(self.story_seed));
        jobj.insert("previousRandom".to_string(), json!(self.previous_random));

        jobj.insert("inkSaveVersion".to_string(), json!(INK_SAVE_STATE_VERSION));

        // Not used right now, but may be in future.
        jobj.insert("inkFormatVersion".to_string(), json!(INK_VERSION_CURRENT));

        Ok(serde_json::Value::Object(jobj))
    }

    fn load_json_obj(&mut self, jobj: serde_json::Value) -> Result<(), StoryError> {
        let jsave_version = jobj.get("inkSaveVersion").ok_or_else(|| {
            StoryError::BadJson("ink save format incorrect, can't load.".to_string())
        })?;

        if let Some(version) = jsave_version.as_i64() {
            if version < MIN_COMPATIBLE_LOAD_VERSION as i64 {
                return Err(StoryError::BadJson(format!(
                    "Ink save format isn't compatible with the current version (saw '{}', but minimum is {}), so can't load.",
                    version, MIN_COMPATIBLE_LOAD_VERSION
                )));
            }
        }

        let tree = self.tree.clone();

        if let Some(jflows) = jobj.get("flows") {
            let jflows = jflows
                .as_object()
                .ok_or_else(|| StoryError::BadJson("Invalid flows object".to_string()))?;

            // A single flow is the default flow; more than one means
            // multi-flow mode with a named flow dictionary.
            if jflows.len() == 1 {
                self.named_flows = None;
            } else {
                self.named_flows = Some(HashMap::new());
            }

            for (name, jflow) in jflows {
                let jflow = jflow
                    .as_object()
                    .ok_or_else(|| StoryError::BadJson("Invalid flow object".to_string()))?;

                let flow = Flow::from_json(name, &tree, ROOT, jflow)?;

                if jflows.len() == 1 {
                    self.current_flow = flow;
                } else if let Some(named_flows) = &mut self.named_flows {
                    named_flows.insert(name.clone(), flow);
                }
            }

            if let Some(named_flows) = &mut self.named_flows {
                if let Some(current_flow_name) =
                    jobj.get("currentFlowName").and_then(|v| v.as_str())
                {
                    if let Some(current_flow) = named_flows.remove(current_flow_name) {
                        self.current_flow = current_flow;
                    }
                }
            }
        } else {
            // Old format: a single implicit flow stored at the top level.
            self.named_flows = None;
            self.current_flow.name = DEFAULT_FLOW_NAME.to_string();

            self.current_flow.callstack.load_json(
                &tree,
                jobj.get("callstackThreads")
                    .and_then(|v| v.as_object())
                    .ok_or_else(|| {
                        StoryError::BadJson("loading callstack threads".to_string())
                    })?,
            )?;

            if let Some(joutput) = jobj.get("outputStream").and_then(|v| v.as_array()) {
                self.current_flow.output_stream = json_read::jarray_to_rt_obj_list(joutput)?;
            }

            if let Some(jchoices) = jobj.get("currentChoices").and_then(|v| v.as_array()) {
                self.current_flow.current_choices = Vec::with_capacity(jchoices.len());
                for jchoice in jchoices {
                    let jchoice = jchoice.as_object().ok_or_else(|| {
                        StoryError::BadJson("Choice is not an object".to_string())
                    })?;
                    self.current_flow
                        .current_choices
                        .push(Choice::from_json(jchoice, &tree, None)?);
                }
            }

            self.current_flow
                .load_flow_choice_threads(jobj.get("choiceThreads"), &tree)?;
        }

        self.output_stream_dirty();

        if let Some(jvars) = jobj.get("variablesState") {
            self.variables_state.load_json(jvars.as_object().ok_or_else(|| {
                StoryError::BadJson("Invalid variables state object".to_string())
            })?)?;
        }

        if let Some(jeval) = jobj.get("evalStack").and_then(|v| v.as_array()) {
            self.evaluation_stack = json_read::jarray_to_rt_obj_list(jeval)?;
        }

        if let Some(jdivert) = jobj.get("currentDivertTarget").and_then(|v| v.as_str()) {
            let divert_path = Path::from_components_string(jdivert);
            self.diverted_pointer = tree.pointer_at_path(&divert_path)?;
        }

        if let Some(jvisits) = jobj.get("visitCounts") {
            self.visit_counts = json_read::jobject_to_int_hashmap(
                jvisits
                    .as_object()
                    .ok_or_else(|| StoryError::BadJson("Invalid visit counts object".to_string()))?,
            )?;
        }

        if let Some(jturns) = jobj.get("turnIndices") {
            self.turn_indices = json_read::jobject_to_int_hashmap(
                jturns
                    .as_object()
                    .ok_or_else(|| StoryError::BadJson("Invalid turn indices object".to_string()))?,
            )?;
        }

        self.current_turn_index = jobj
            .get("turnIdx")
            .and_then(|v| v.as_i64())
            .ok_or_else(|| StoryError::BadJson("Invalid current turn index".to_string()))?
            as i32;

        self.story_seed = jobj
            .get("storySeed")
            .and_then(|v| v.as_i64())
            .ok_or_else(|| StoryError::BadJson("Invalid story seed".to_string()))?
            as i32;

        // Not optional in the format, but some writers omit it.
        self.previous_random = jobj
            .get("previousRandom")
            .and_then(|v| v.as_i64())
            .unwrap_or(0) as i32;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whitespace_cleaning() {
        assert_eq!(
            "two words",
            StoryState::clean_output_whitespace("  two   words  ")
        );
        assert_eq!(
            "line\nline",
            StoryState::clean_output_whitespace(" line \n  line")
        );
    }

    #[test]
    fn splits_head_and_tail_newlines() {
        let pieces = StoryState::try_splitting_head_tail_whitespace("\n  text \n").unwrap();
        let strings: Vec<String> = pieces
            .iter()
            .map(|p| p.as_string_value().unwrap().string.clone())
            .collect();
        assert_eq!(vec!["\n", " text ", "\n"], strings);

        assert!(StoryState::try_splitting_head_tail_whitespace("plain text").is_none());
    }

    #[test]
    fn visit_count_requires_counting_flag() {
        let json = r##"{"inkVersion":21,"root":[["^Line.","\n","done",null],"done",{"hello":["end",{"#f":1}]}],"listDefs":{}}"##;
        let (_, tree, lists) = json_read::load_from_string(json).unwrap();
        let tree = Rc::new(tree);
        let state = StoryState::new(tree.clone(), Rc::new(lists));

        let hello = tree
            .content_at_path(&Path::from_components_string("hello"))
            .node
            .unwrap();
        assert_eq!(0, state.visit_count_for_container(hello).unwrap());

        // the root container carries no counting flag, so its read count
        // is unknown
        let err = state.visit_count_for_container(ROOT).unwrap_err();
        assert!(err.get_message().contains("unknown"));
    }
}
