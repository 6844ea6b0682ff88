use crate::{
    control_command::CommandType,
    ink_list::InkList,
    ink_list_item::InkListItem,
    node::{DivertData, NodeId, NodeKind},
    pointer::{self, Pointer},
    push_pop::PushPopType,
    rt_obj::RtObj,
    story::Story,
    story_error::StoryError,
    story_state::StoryState,
    value_type::ValueType,
};
use rand::{rngs::StdRng, Rng, SeedableRng};

/// # Control logic
/// Evaluation of the flow-control and logic nodes of the content tree.
impl Story {
    pub(crate) fn perform_logic_and_flow_control(
        &mut self,
        content_node: Option<NodeId>,
    ) -> Result<bool, StoryError> {
        let tree = self.tree.clone();

        let node = match content_node {
            Some(node) => node,
            None => return Ok(false),
        };

        match tree.kind(node) {
            // Divert
            NodeKind::Divert(divert) => {
                if divert.is_conditional {
                    let o = self.get_state_mut().pop_evaluation_stack()?;
                    if !self.is_truthy(&o)? {
                        return Ok(true);
                    }
                }

                if let Some(var_name) = &divert.variable_divert_name {
                    let var_contents = {
                        let state = self.get_state();
                        state.variables_state.get_variable_with_name(
                            var_name,
                            -1,
                            state.get_callstack(),
                        )
                    };

                    match var_contents {
                        Some(ValueType::DivertTarget(target)) => {
                            let p = tree.pointer_at_path(&target)?;
                            self.get_state_mut().diverted_pointer = p;
                        }
                        Some(var_contents) => {
                            let error_message = format!(
                                "Tried to divert to a target from a variable, but the variable ({}) didn't contain a divert target, it ",
                                var_name
                            );

                            let error_message =
                                if let ValueType::Int(int_content) = &var_contents {
                                    if *int_content == 0 {
                                        format!("{}was empty/null (the value 0).", error_message)
                                    } else {
                                        format!("{}contained '{}'.", error_message, var_contents)
                                    }
                                } else {
                                    error_message
                                };

                            return Err(StoryError::InvalidStoryState(error_message));
                        }
                        None => {
                            return Err(StoryError::InvalidStoryState(format!("Tried to divert using a target from a variable that could not be found ({})", var_name)));
                        }
                    }
                } else if divert.is_external {
                    let target = divert
                        .target_path
                        .as_ref()
                        .map(|p| p.get_components_string().to_owned())
                        .unwrap_or_default();
                    self.call_external_function(&target, divert.external_args)?;
                    return Ok(true);
                } else {
                    let p = self.divert_target_pointer(node, divert)?;
                    self.get_state_mut().diverted_pointer = p;
                }

                if divert.pushes_to_stack {
                    let output_len = self.get_state().get_output_stream().len() as i32;
                    self.get_state_mut().get_callstack_mut().push(
                        divert.stack_push_type,
                        0,
                        output_len,
                    );
                }

                Ok(true)
            }

            NodeKind::Command(command_type) => {
                match command_type {
                    CommandType::EvalStart => {
                        if self.get_state().get_in_expression_evaluation() {
                            return Err(StoryError::InvalidStoryState(
                                "Already in expression evaluation?".to_owned(),
                            ));
                        }

                        self.get_state_mut().set_in_expression_evaluation(true);
                    }
                    CommandType::EvalOutput => {
                        // If the expression turned out to be empty, there may
                        // not be anything on the stack
                        if !self.get_state().evaluation_stack.is_empty() {
                            let output = self.get_state_mut().pop_evaluation_stack()?;

                            // Functions may evaluate to Void, in which case we
                            // skip output
                            if !matches!(output, RtObj::Void) {
                                let text =
                                    RtObj::Value(ValueType::new_string(&output.to_string()));

                                self.get_state_mut().push_to_output_stream(text);
                            }
                        }
                    }
                    CommandType::EvalEnd => {
                        if !self.get_state().get_in_expression_evaluation() {
                            return Err(StoryError::InvalidStoryState(
                                "Not in expression evaluation mode".to_owned(),
                            ));
                        }
                        self.get_state_mut().set_in_expression_evaluation(false);
                    }
                    CommandType::Duplicate => {
                        let obj = self
                            .get_state()
                            .peek_evaluation_stack()
                            .cloned()
                            .ok_or_else(|| {
                                StoryError::InvalidStoryState(
                                    "Evaluation stack is empty when duplicating".to_owned(),
                                )
                            })?;
                        self.get_state_mut().push_evaluation_stack(obj);
                    }
                    CommandType::PopEvaluatedValue => {
                        self.get_state_mut().pop_evaluation_stack()?;
                    }
                    CommandType::PopFunction | CommandType::PopTunnel => {
                        let pop_type = if CommandType::PopFunction == *command_type {
                            PushPopType::Function
                        } else {
                            PushPopType::Tunnel
                        };

                        // Tunnel onwards is allowed to specify an optional
                        // override divert to go to immediately after returning:
                        // ->-> target
                        let mut override_tunnel_return_target = None;
                        if pop_type == PushPopType::Tunnel {
                            let popped = self.get_state_mut().pop_evaluation_stack()?;

                            match popped {
                                RtObj::Value(ValueType::DivertTarget(target)) => {
                                    override_tunnel_return_target = Some(target);
                                }
                                RtObj::Void => {}
                                _ => {
                                    return Err(StoryError::InvalidStoryState(
                                        "Expected void if ->-> doesn't override target".to_owned(),
                                    ));
                                }
                            }
                        }

                        if self.get_state_mut().try_exit_function_evaluation_from_game() {
                            return Ok(true);
                        } else if self.get_state().get_callstack().current_element().push_pop_type
                            != pop_type
                            || !self.get_state().get_callstack().can_pop()
                        {
                            let name_for = |t: PushPopType| match t {
                                PushPopType::Function => "function return statement (~ return)",
                                PushPopType::Tunnel => "tunnel onwards statement (->->)",
                                PushPopType::FunctionEvaluationFromGame => {
                                    "function evaluation from game"
                                }
                            };

                            let mut expected = name_for(
                                self.get_state().get_callstack().current_element().push_pop_type,
                            );
                            if !self.get_state().get_callstack().can_pop() {
                                expected = "end of flow (-> END or choice)";
                            }

                            return Err(StoryError::InvalidStoryState(format!(
                                "Found {}, when expected {}",
                                name_for(pop_type),
                                expected
                            )));
                        } else {
                            self.get_state_mut().pop_callstack(None)?;

                            // Does tunnel onwards override by diverting to a
                            // new ->-> target?
                            if let Some(target) = override_tunnel_return_target {
                                let p = tree.pointer_at_path(&target)?;
                                self.get_state_mut().diverted_pointer = p;
                            }
                        }
                    }
                    CommandType::BeginString => {
                        self.get_state_mut()
                            .push_to_output_stream(RtObj::Command(CommandType::BeginString));

                        if !self.get_state().get_in_expression_evaluation() {
                            return Err(StoryError::InvalidStoryState(
                                "Expected to be in an expression when evaluating a string"
                                    .to_owned(),
                            ));
                        }

                        self.get_state_mut().set_in_expression_evaluation(false);
                    }
                    CommandType::EndString => {
                        // We're iterating backward through the content, so
                        // collect the pieces first, then build the string in
                        // the right order afterwards.
                        let mut content_stack_for_string: Vec<String> = Vec::new();
                        let mut content_to_retain: Vec<RtObj> = Vec::new();

                        let mut output_count_consumed = 0;

                        for obj in self.get_state().get_output_stream().iter().rev() {
                            output_count_consumed += 1;

                            if let RtObj::Command(CommandType::BeginString) = obj {
                                break;
                            }

                            if let RtObj::Tag(_) = obj {
                                content_to_retain.push(obj.clone());
                            }

                            if let Some(sv) = obj.as_string_value() {
                                content_stack_for_string.push(sv.string.clone());
                            }
                        }

                        // Consume the content that was produced for this string
                        self.get_state_mut()
                            .pop_from_output_stream(output_count_consumed);

                        // Rescue the tags that we want actually to keep on the
                        // output stack rather than consume as part of the
                        // string we're building. At the time of writing, this
                        // only applies to Tag objects generated by choices,
                        // which are pushed to the stack during string
                        // generation.
                        for rescued_tag in content_to_retain {
                            self.get_state_mut().push_to_output_stream(rescued_tag);
                        }

                        // Build string out of the content we collected
                        let mut sb = String::new();

                        for s in content_stack_for_string.iter().rev() {
                            sb.push_str(s);
                        }

                        // Return to expression evaluation (from content mode)
                        self.get_state_mut().set_in_expression_evaluation(true);
                        self.get_state_mut()
                            .push_evaluation_stack(RtObj::Value(ValueType::new_string(&sb)));
                    }
                    CommandType::NoOp => {}
                    CommandType::ChoiceCount => {
                        let choice_count = self.get_state().get_generated_choices().len();
                        self.get_state_mut()
                            .push_evaluation_stack(RtObj::Value(ValueType::Int(
                                choice_count as i32,
                            )));
                    }
                    CommandType::Turns => {
                        let current_turn = self.get_state().current_turn_index;
                        self.get_state_mut()
                            .push_evaluation_stack(RtObj::Value(ValueType::Int(current_turn + 1)));
                    }
                    CommandType::TurnsSince | CommandType::ReadCount => {
                        let target = self.get_state_mut().pop_evaluation_stack()?;

                        let target_path = match &target {
                            RtObj::Value(ValueType::DivertTarget(p)) => p.clone(),
                            _ => {
                                let mut extra_note = "".to_owned();
                                if let RtObj::Value(ValueType::Int(_)) = &target {
                                    extra_note = format!(". Did you accidentally pass a read count ('knot_name') instead of a target {}",
                                            "('-> knot_name')?");
                                }

                                return Err(StoryError::InvalidStoryState(format!("TURNS_SINCE expected a divert target (knot, stitch, label name), but saw {} {}", target
                                        , extra_note)));
                            }
                        };

                        let container = tree
                            .content_at_path(&target_path)
                            .correct_node()
                            .filter(|n| tree.is_container(*n));

                        let either_count = match container {
                            Some(container) => {
                                if *command_type == CommandType::TurnsSince {
                                    self.get_state().turns_since_for_container(container)?
                                } else {
                                    self.get_state().visit_count_for_container(container)?
                                }
                            }
                            None => {
                                let either_count = if *command_type == CommandType::TurnsSince {
                                    -1 // turn count, default to never/unknown
                                } else {
                                    0 // visit count, assume 0 to default to allowing entry
                                };

                                self.add_error(
                                    &format!(
                                        "Failed to find container for {} lookup at {}",
                                        command_type, target_path
                                    ),
                                    true,
                                );

                                either_count
                            }
                        };

                        self.get_state_mut()
                            .push_evaluation_stack(RtObj::Value(ValueType::Int(either_count)));
                    }
                    CommandType::Random => {
                        let o = self.get_state_mut().pop_evaluation_stack()?;
                        let max_int = o.as_value().and_then(|v| v.get_int());

                        let o = self.get_state_mut().pop_evaluation_stack()?;
                        let min_int = o.as_value().and_then(|v| v.get_int());

                        let min_value = min_int.ok_or_else(|| {
                            StoryError::InvalidStoryState(
                                "Invalid value for the minimum parameter of RANDOM(min, max)"
                                    .to_owned(),
                            )
                        })?;

                        let max_value = max_int.ok_or_else(|| {
                            StoryError::InvalidStoryState(
                                "Invalid value for the maximum parameter of RANDOM(min, max)"
                                    .to_owned(),
                            )
                        })?;

                        let random_range = max_value - min_value + 1;

                        if random_range <= 0 {
                            return Err(StoryError::InvalidStoryState(format!(
                                "RANDOM was called with minimum as {} and maximum as {}. The maximum must be larger",
                                min_value, max_value
                            )));
                        }

                        let result_seed =
                            self.get_state().story_seed + self.get_state().previous_random;

                        let mut rng = StdRng::seed_from_u64(result_seed as u64);
                        let next_random = rng.gen::<u32>();

                        let chosen_value = (next_random % random_range as u32) as i32 + min_value;

                        self.get_state_mut()
                            .push_evaluation_stack(RtObj::Value(ValueType::Int(chosen_value)));

                        self.get_state_mut().previous_random += 1;
                    }
                    CommandType::SeedRandom => {
                        let o = self.get_state_mut().pop_evaluation_stack()?;
                        let seed = o.as_value().and_then(|v| v.get_int()).ok_or_else(|| {
                            StoryError::InvalidStoryState(
                                "Invalid value passed to SEED_RANDOM".to_owned(),
                            )
                        })?;

                        // Story seed affects both RANDOM and shuffle behaviour
                        self.get_state_mut().story_seed = seed;
                        self.get_state_mut().previous_random = 0;

                        // SEED_RANDOM returns nothing.
                        self.get_state_mut().push_evaluation_stack(RtObj::Void);
                    }
                    CommandType::VisitIndex => {
                        let cpc = self
                            .get_state()
                            .get_current_pointer()
                            .container
                            .ok_or_else(|| {
                                StoryError::InvalidStoryState(
                                    "No current container for visit index".to_owned(),
                                )
                            })?;
                        let count = self.get_state().visit_count_for_container(cpc)? - 1; // index not count
                        self.get_state_mut()
                            .push_evaluation_stack(RtObj::Value(ValueType::Int(count)));
                    }
                    CommandType::SequenceShuffleIndex => {
                        let shuffle_index = self.next_sequence_shuffle_index()?;
                        self.get_state_mut()
                            .push_evaluation_stack(RtObj::Value(ValueType::Int(shuffle_index)));
                    }
                    CommandType::StartThread => {
                        // Handled in main step function
                    }
                    CommandType::Done => {
                        // We may exist in the context of the initial
                        // act of creating the thread, or in the context of
                        // evaluating the content.
                        if self.get_state().get_callstack().can_pop_thread() {
                            self.get_state_mut().get_callstack_mut().pop_thread()?;
                        }
                        // In normal flow - allow safe exit without warning
                        else {
                            self.get_state_mut().did_safe_exit = true;

                            // Stop flow in current thread
                            self.get_state_mut().set_current_pointer(pointer::NULL);
                        }
                    }
                    CommandType::End => self.get_state_mut().force_end(),
                    CommandType::ListFromInt => {
                        let o = self.get_state_mut().pop_evaluation_stack()?;
                        let int_val = o.as_value().and_then(|v| v.get_int());

                        let o = self.get_state_mut().pop_evaluation_stack()?;
                        let list_name_val = match o.as_value() {
                            Some(ValueType::String(s)) => Some(s.string.clone()),
                            _ => None,
                        };

                        let int_val = int_val.ok_or_else(|| {
                            StoryError::InvalidStoryState("Passed non-integer when creating a list element from a numerical value.".to_owned())
                        })?;

                        let list_name = list_name_val.ok_or_else(|| {
                            StoryError::InvalidStoryState("Expected list name when creating a list element from a numerical value.".to_owned())
                        })?;

                        let generated_list_value =
                            match self.list_definitions.get_list_definition(&list_name) {
                                Some(found_list_def) => {
                                    match found_list_def.get_item_with_value(int_val) {
                                        Some(found_item) => ValueType::List(
                                            InkList::from_single_element(
                                                found_item.clone(),
                                                int_val,
                                            ),
                                        ),
                                        None => ValueType::List(InkList::new()),
                                    }
                                }
                                None => {
                                    return Err(StoryError::InvalidStoryState(format!(
                                        "Failed to find List called {}",
                                        list_name
                                    )))
                                }
                            };

                        self.get_state_mut()
                            .push_evaluation_stack(RtObj::Value(generated_list_value));
                    }
                    CommandType::ListRange => {
                        let max = self.get_state_mut().pop_evaluation_stack()?;
                        let min = self.get_state_mut().pop_evaluation_stack()?;
                        let target = self.get_state_mut().pop_evaluation_stack()?;

                        let result = match (
                            target.as_value().and_then(|v| v.get_list()),
                            min.as_value(),
                            max.as_value(),
                        ) {
                            (Some(target_list), Some(min), Some(max)) => {
                                target_list.list_with_subrange(min, max)
                            }
                            _ => {
                                return Err(StoryError::InvalidStoryState(
                                    "Expected List, minimum and maximum for LIST_RANGE".to_owned(),
                                ))
                            }
                        };

                        self.get_state_mut()
                            .push_evaluation_stack(RtObj::Value(ValueType::List(result)));
                    }
                    CommandType::ListRandom => {
                        let o = self.get_state_mut().pop_evaluation_stack()?;
                        let list = o.as_value().and_then(|v| v.get_list()).ok_or_else(|| {
                            StoryError::InvalidStoryState(
                                "Expected list for LIST_RANDOM".to_owned(),
                            )
                        })?;

                        let new_list = {
                            // List was empty: return empty list
                            if list.items.is_empty() {
                                InkList::new()
                            }
                            // Non-empty source list
                            else {
                                // Generate a random index for the element to
                                // take
                                let result_seed = self.get_state().story_seed
                                    + self.get_state().previous_random;
                                let mut rng = StdRng::seed_from_u64(result_seed as u64);
                                let next_random = rng.gen::<u32>();
                                let list_item_index = (next_random as usize) % list.items.len();

                                // Iterate through to get the random element,
                                // sorted for predictability
                                let mut sorted: Vec<(&InkListItem, &i32)> =
                                    list.items.iter().collect();
                                sorted.sort_by(|a, b| b.1.cmp(a.1));
                                let (random_item, random_value) = sorted[list_item_index];

                                // Origin list is simply the origin of the one
                                // element
                                let origin_name = random_item
                                    .get_origin_name()
                                    .cloned()
                                    .unwrap_or_default();
                                let mut new_list =
                                    InkList::from_origin(&origin_name, &self.list_definitions)?;
                                new_list.items.insert(random_item.clone(), *random_value);

                                self.get_state_mut().previous_random = next_random as i32;

                                new_list
                            }
                        };

                        self.get_state_mut()
                            .push_evaluation_stack(RtObj::Value(ValueType::List(new_list)));
                    }
                    CommandType::BeginTag => self
                        .get_state_mut()
                        .push_to_output_stream(RtObj::Command(CommandType::BeginTag)),
                    CommandType::EndTag => {
                        // EndTag has 2 modes:
                        //  - When in string evaluation (for choices)
                        //  - Normal
                        //
                        // The only way you could have an EndTag in the middle
                        // of string evaluation is if we're currently generating
                        // text for a choice. In that case the ink runs twice:
                        // once to generate the choice text (string evaluation
                        // on, with the final string pushed to the evaluation
                        // stack, ready to be popped to make a Choice), and once
                        // when generating text after choosing the choice.
                        //
                        // Tags can't be written manually within strings, so
                        // when we see one here we know it must be part of
                        // choice content. Therefore, when the tag has been
                        // generated, we push it onto the evaluation stack in
                        // the exact same way as the string for the choice
                        // content.
                        if self.get_state().in_string_evaluation() {
                            let mut content_stack_for_tag: Vec<String> = Vec::new();
                            let mut output_count_consumed = 0;

                            for obj in self.get_state().get_output_stream().iter().rev() {
                                output_count_consumed += 1;

                                if let RtObj::Command(cmd) = obj {
                                    if *cmd == CommandType::BeginTag {
                                        break;
                                    } else {
                                        return Err(StoryError::InvalidStoryState("Unexpected ControlCommand while extracting tag from choice".to_owned()));
                                    }
                                }

                                if let Some(sv) = obj.as_string_value() {
                                    content_stack_for_tag.push(sv.string.clone());
                                }
                            }

                            // Consume the content that was produced for this
                            // string
                            self.get_state_mut()
                                .pop_from_output_stream(output_count_consumed);

                            let mut sb = String::new();
                            for str_val in content_stack_for_tag.iter().rev() {
                                sb.push_str(str_val);
                            }

                            let choice_tag =
                                RtObj::Tag(StoryState::clean_output_whitespace(&sb));
                            // Pushing to the evaluation stack means it gets
                            // picked up when a Choice is generated from the
                            // next Choice Point.
                            self.get_state_mut().push_evaluation_stack(choice_tag);
                        }
                        // Otherwise! Simply push EndTag, so that in the output
                        // stream we have a structure of:
                        // [BeginTag, "the tag content", EndTag]
                        else {
                            self.get_state_mut()
                                .push_to_output_stream(RtObj::Command(CommandType::EndTag));
                        }
                    }
                }

                Ok(true)
            }

            // Variable assignment
            NodeKind::VariableAssignment(var_ass) => {
                let state = self.get_state_mut();
                let assigned_val = state.pop_evaluation_stack()?.into_value().ok_or_else(|| {
                    StoryError::InvalidStoryState(
                        "Expected a value to assign to a variable".to_owned(),
                    )
                })?;

                // When in temporary evaluation, don't create new variables
                // purely within the temporary context, but attempt to create
                // them globally
                state.variables_state.assign(
                    var_ass,
                    assigned_val,
                    &mut state.current_flow.callstack,
                )?;

                Ok(true)
            }

            // Variable reference
            NodeKind::VariableReference(var_ref) => {
                let found_value;

                // Explicit read count value
                if let Some(path_for_count) = &var_ref.path_for_count {
                    let container = tree
                        .content_at_path(path_for_count)
                        .correct_node()
                        .filter(|n| tree.is_container(*n))
                        .ok_or_else(|| {
                            StoryError::InvalidStoryState(format!(
                                "Failed to find container for read count at {}",
                                path_for_count
                            ))
                        })?;
                    let count = self.get_state().visit_count_for_container(container)?;
                    found_value = ValueType::Int(count);
                }
                // Normal variable reference
                else {
                    let name = var_ref.name.as_deref().ok_or_else(|| {
                        StoryError::InvalidStoryState(
                            "Variable reference with no name or count path".to_owned(),
                        )
                    })?;

                    let resolved = {
                        let state = self.get_state();
                        state.variables_state.get_variable_with_name(
                            name,
                            -1,
                            state.get_callstack(),
                        )
                    };

                    match resolved {
                        Some(v) => found_value = v,
                        None => {
                            self.add_error(&format!("Variable not found: '{}'. Using default value of 0 (false). This can happen with temporary variables if the declaration hasn't yet been hit. Globals are always given a default value on load if a value doesn't exist in the save state.", name), true);

                            found_value = ValueType::Int(0);
                        }
                    }
                }

                self.get_state_mut()
                    .push_evaluation_stack(RtObj::Value(found_value));

                Ok(true)
            }

            // Native function call
            NodeKind::NativeCall(func) => {
                let params = self
                    .get_state_mut()
                    .pop_evaluation_stack_multiple(func.get_number_of_parameters())?;

                let mut value_params = Vec::with_capacity(params.len());
                for p in params {
                    match p.into_value() {
                        Some(v) => value_params.push(v),
                        None => {
                            return Err(StoryError::InvalidStoryState(
                                "Expected a value parameter for a native function call".to_owned(),
                            ))
                        }
                    }
                }

                let result = func.call(value_params, &self.list_definitions)?;
                self.get_state_mut().push_evaluation_stack(RtObj::Value(result));

                Ok(true)
            }

            _ => Ok(false),
        }
    }

    // A divert target resolves relative to the divert node itself. When the
    // target path ends in an index, the pointer lands inside the parent
    // container at that index; otherwise it points at the start of the target
    // container.
    pub(crate) fn divert_target_pointer(
        &self,
        divert_node: NodeId,
        divert: &DivertData,
    ) -> Result<Pointer, StoryError> {
        let target_path = match &divert.target_path {
            Some(p) => p,
            None => return Ok(pointer::NULL),
        };

        let target = self
            .tree
            .resolve_path(divert_node, target_path)
            .node
            .ok_or_else(|| {
                StoryError::InvalidStoryState(format!(
                    "Divert resolution failed: {}",
                    target_path
                ))
            })?;

        if let Some(component) = target_path.last_component() {
            if let Some(index) = component.index() {
                return Ok(Pointer::new(self.tree.parent(target), index as i32));
            }
        }

        if self.tree.is_container(target) {
            return Ok(Pointer::start_of(target));
        }

        Ok(pointer::NULL)
    }
}
