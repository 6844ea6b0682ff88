use crate::{
    node::{NodeId, ROOT},
    path::Path,
    push_pop::PushPopType,
    story::Story,
    story_error::StoryError,
    value_type::ValueType,
};

/// # Navigation
/// Methods to access specific sections of the story.
impl Story {
    /// Change the current position of the story to the given path. From
    /// here you can call [`cont()`](Story::cont) to evaluate the
    /// next line.
    ///
    /// The path string is a dot-separated path as used internally by the
    /// engine. These examples should work:
    ///
    /// ```ink
    ///    myKnot
    ///    myKnot.myStitch
    /// ```
    ///
    /// Note however that this won't necessarily work:
    ///
    /// ```ink
    ///    myKnot.myStitch.myLabelledChoice
    /// ```
    ///
    /// ...because of the way that content is nested within a weave
    /// structure.
    ///
    /// Usually you would reset the callstack beforehand, which means that
    /// any tunnels, threads or functions you were in at the time of
    /// calling will be discarded. This is different from the
    /// behaviour of
    /// [`choose_choice_index`](Story::choose_choice_index), which
    /// will always keep the callstack, since the choices are known to come
    /// from a correct state, and their source thread is known.
    ///
    /// You have the option of passing `false` to the `reset_call_stack`
    /// parameter if you don't want this behaviour, leaving any active
    /// threads, tunnels or function calls intact.
    ///
    /// Not reseting the call stack is potentially dangerous! If you're in
    /// the middle of a tunnel, it'll redirect only the inner-most
    /// tunnel, meaning that when you tunnel-return using `->->`,
    /// it'll return to where you were before. This may be what you
    /// want though. However, if you're in the middle of a function,
    /// `choose_path_string` will throw an error.
    pub fn choose_path_string(
        &mut self,
        path: &str,
        reset_call_stack: bool,
        args: Option<&[ValueType]>,
    ) -> Result<(), StoryError> {
        self.if_async_we_cant("call ChoosePathString right now")?;

        if reset_call_stack {
            self.reset_callstack()?;
        } else {
            // choose_path_string is potentially dangerous since you can call
            // it when the stack is pretty much in any state. Let's catch one
            // of the worst offenders.
            if self.get_state().get_callstack().current_element().push_pop_type
                == PushPopType::Function
            {
                let mut func_detail = "".to_owned();
                let container = self
                    .get_state()
                    .get_callstack()
                    .current_element()
                    .current_pointer
                    .container;
                if let Some(container) = container {
                    func_detail = format!("({})", self.tree.path_of(container));
                }

                return Err(StoryError::InvalidStoryState(format!("Story was running a function {func_detail} when you called ChoosePathString({}) - this is almost certainly not what you want! Full stack trace: \n{}", path, self.get_state().get_callstack().get_callstack_trace(&self.tree))));
            }
        }

        self.get_state_mut()
            .pass_arguments_to_evaluation_stack(args)?;
        self.choose_path(&Path::from_components_string(path), true)?;

        Ok(())
    }

    /// Evaluates a function defined in ink, and gathers the (possibly
    /// multi-line) text the function produces while executing. This output
    /// text is any text written as normal content within the function,
    /// as opposed to the ink function's return value, which is specified by
    /// `~ return` in the ink.
    pub fn evaluate_function(
        &mut self,
        func_name: &str,
        args: Option<&[ValueType]>,
        text_output: &mut String,
    ) -> Result<Option<ValueType>, StoryError> {
        self.if_async_we_cant("evaluate a function")?;

        if func_name.trim().is_empty() {
            return Err(StoryError::InvalidStoryState(
                "Function is empty or white space.".to_owned(),
            ));
        }

        // Get the content that we need to run
        let func_container = match self.knot_container_with_name(func_name) {
            Some(c) => c,
            None => {
                return Err(StoryError::BadArgument(format!(
                    "Function doesn't exist: '{}'",
                    func_name
                )))
            }
        };

        // Snapshot the output stream
        let output_stream_before = self.get_state().get_output_stream().clone();
        self.get_state_mut().reset_output(None);

        // State will temporarily replace the callstack in order to evaluate
        self.get_state_mut()
            .start_function_evaluation_from_game(func_container, args)?;

        // Evaluate the function, and collect the string output
        while self.can_continue() {
            let text = self.cont()?;

            text_output.push_str(&text);
        }

        // Restore the output stream in case this was called
        // during main story evaluation.
        self.get_state_mut()
            .reset_output(Some(output_stream_before));

        // Finish evaluation, and see whether anything was produced
        self.get_state_mut()
            .complete_function_evaluation_from_game()
    }

    pub(crate) fn visit_changed_containers_due_to_divert(&mut self) -> Result<(), StoryError> {
        let tree = self.tree.clone();
        let previous_pointer = self.get_state().get_previous_pointer();
        let pointer = self.get_state().get_current_pointer();

        // Unless we're pointing *directly* at a piece of content, we don't do
        // counting here. Otherwise, the main stepping function will do the
        // counting.
        if pointer.is_null() || pointer.index == -1 {
            return Ok(());
        }

        // First, find the previously open set of containers
        self.prev_containers.clear();

        if !previous_pointer.is_null() {
            let mut prev_ancestor = previous_pointer
                .resolve(&tree)
                .filter(|n| tree.is_container(*n))
                .or(previous_pointer.container);

            while let Some(prev_anc) = prev_ancestor {
                self.prev_containers.push(prev_anc);
                prev_ancestor = tree.parent(prev_anc);
            }
        }

        // If the new node is a container itself, it will be visited
        // automatically at the next actual content step. However, we need to
        // walk up the new ancestry to see if there are more new containers
        let mut current_child_of_container = match pointer.resolve(&tree) {
            Some(n) => n,
            None => return Ok(()),
        };

        let mut current_container_ancestor = tree.parent(current_child_of_container);

        let mut all_children_entered_at_start = true;

        while let Some(current_container) = current_container_ancestor {
            let counting_at_start_only = tree
                .container(current_container)
                .map(|c| c.counting_at_start_only)
                .unwrap_or(false);

            if !self.prev_containers.contains(&current_container) || counting_at_start_only {
                // Check whether this ancestor container is being entered at
                // the start, by checking whether the child node is the first.
                let entering_at_start = tree
                    .container(current_container)
                    .and_then(|c| c.content.first())
                    .map(|first_child| {
                        *first_child == current_child_of_container
                            && all_children_entered_at_start
                    })
                    .unwrap_or(false);

                // Don't count it as entering at start if we're entering
                // randomly somewhere within a container B that happens to be
                // nested at index 0 of container A. It only counts
                // if we're diverting directly to the first leaf node.
                if !entering_at_start {
                    all_children_entered_at_start = false;
                }

                // Mark a visit to this container
                self.visit_container(current_container, entering_at_start)?;

                current_child_of_container = current_container;
                current_container_ancestor = tree.parent(current_container);
            } else {
                break;
            }
        }

        Ok(())
    }

    pub(crate) fn knot_container_with_name(&self, name: &str) -> Option<NodeId> {
        self.tree
            .container(ROOT)
            .and_then(|root| root.named_content.get(name).copied())
    }

    /// Gets the visit/read count of a particular container at the given
    /// path. For a knot or stitch, that path string will be in the
    /// form:
    ///
    /// ```ink
    ///     knot
    ///     knot.stitch
    /// ```
    pub fn get_visit_count_at_path_string(&self, path_string: &str) -> Result<i32, StoryError> {
        self.get_state().visit_count_at_path_string(path_string)
    }
}
