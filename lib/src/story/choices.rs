use crate::{
    choice::Choice,
    node::{ChoicePointData, NodeId, NodeKind},
    path::Path,
    rt_obj::RtObj,
    story::Story,
    story_error::StoryError,
};

/// # Choices
/// Methods to get and select choices.
impl Story {
    /// Chooses the [`Choice`](crate::choice::Choice) from the
    /// `currentChoices` list with the given index. Internally, this
    /// sets the current content path to what the
    /// [`Choice`](crate::choice::Choice) points to, ready
    /// to continue story evaluation.
    pub fn choose_choice_index(&mut self, choice_index: usize) -> Result<(), StoryError> {
        let choices = self.get_current_choices();
        if choice_index >= choices.len() {
            return Err(StoryError::BadArgument("choice out of range".to_owned()));
        }

        // Replace callstack with the one from the thread at the choosing
        // point, so that we can jump into the right place in the flow.
        // This is important in case the flow was forked by a new thread, which
        // can create multiple leading edges for the story, each of
        // which has its own context.
        let choice_to_choose = &choices[choice_index];
        if let Some(thread) = choice_to_choose.thread_at_generation.clone() {
            self.get_state_mut()
                .get_callstack_mut()
                .set_current_thread(thread);
        }

        let target_path = choice_to_choose.target_path.clone();
        self.choose_path(&target_path, true)?;

        Ok(())
    }

    pub(crate) fn choose_path(
        &mut self,
        p: &Path,
        incrementing_turn_index: bool,
    ) -> Result<(), StoryError> {
        self.get_state_mut()
            .set_chosen_path(p, incrementing_turn_index)?;

        // Take a note of newly visited containers for read counts etc
        self.visit_changed_containers_due_to_divert()?;

        Ok(())
    }

    pub(crate) fn process_choice(
        &mut self,
        choice_point: NodeId,
    ) -> Result<Option<Choice>, StoryError> {
        let tree = self.tree.clone();

        let data = match tree.kind(choice_point) {
            NodeKind::ChoicePoint(data) => data,
            _ => {
                return Err(StoryError::InvalidStoryState(
                    "Expected a choice point node".to_owned(),
                ))
            }
        };

        let mut show_choice = true;

        // Don't create choice if choice point doesn't pass conditional
        if data.has_condition {
            let condition_value = self.get_state_mut().pop_evaluation_stack()?;
            if !self.is_truthy(&condition_value)? {
                show_choice = false;
            }
        }

        let mut start_text = String::new();
        let mut choice_only_text = String::new();
        let mut tags: Vec<String> = Vec::with_capacity(0);

        if data.has_choice_only_content {
            choice_only_text = self.pop_choice_string_and_tags(&mut tags)?;
        }

        if data.has_start_content {
            start_text = self.pop_choice_string_and_tags(&mut tags)?;
        }

        // Don't create choice if player has already read this content
        if data.once_only {
            let target = self.choice_target(choice_point, data).ok_or_else(|| {
                StoryError::InvalidStoryState(
                    "Failed to find target content for a once-only choice".to_owned(),
                )
            })?;

            let visit_count = self.get_state().visit_count_for_container(target)?;
            if visit_count > 0 {
                show_choice = false;
            }
        }

        // We go through the full process of creating the choice above so
        // that we consume the content for it, since otherwise it'll
        // be shown on the output stream.
        if !show_choice {
            return Ok(None);
        }

        start_text.push_str(&choice_only_text);

        let thread = self.get_state_mut().get_callstack_mut().fork_thread();
        let original_thread_index = thread.thread_index;

        let choice = Choice {
            text: start_text.trim().to_string(),
            source_path: tree.path_of(choice_point).to_string(),
            index: 0,
            tags,
            target_path: self.path_on_choice(choice_point, data),
            is_invisible_default: data.is_invisible_default,
            thread_at_generation: Some(thread),
            original_thread_index,
        };

        Ok(Some(choice))
    }

    pub(crate) fn try_follow_default_invisible_choice(&mut self) -> Result<(), StoryError> {
        let invisible_choices: Vec<Choice> = match self.get_state().get_current_choices() {
            Some(all_choices) => {
                let invisible: Vec<Choice> = all_choices
                    .iter()
                    .filter(|c| c.is_invisible_default)
                    .cloned()
                    .collect();

                // Is a default invisible choice the ONLY choice?
                if invisible.is_empty() || all_choices.len() > invisible.len() {
                    return Ok(());
                }

                invisible
            }
            None => return Ok(()),
        };

        let choice = &invisible_choices[0];

        // Invisible choice may have been generated on a different thread,
        // in which case we need to restore it before we continue
        if let Some(thread) = choice.thread_at_generation.clone() {
            self.get_state_mut()
                .get_callstack_mut()
                .set_current_thread(thread);
        }

        // If there's a chance that this state will be rolled back to before
        // the invisible choice then make sure that the choice thread is
        // left intact, and it isn't re-entered in an old state.
        if self.state_snapshot_at_last_new_line.is_some() {
            let fork_thread = self.get_state_mut().get_callstack_mut().fork_thread();
            self.get_state_mut()
                .get_callstack_mut()
                .set_current_thread(fork_thread);
        }

        let target_path = choice.target_path.clone();
        self.choose_path(&target_path, false)
    }

    // The compiled path on a choice point may be relative; resolve it to a
    // global path the first time a choice is generated from it.
    fn path_on_choice(&self, choice_point: NodeId, data: &ChoicePointData) -> Path {
        if data.path_on_choice.is_relative() {
            if let Some(target) = self
                .tree
                .resolve_path(choice_point, &data.path_on_choice)
                .correct_node()
            {
                return self.tree.path_of(target).clone();
            }
        }

        data.path_on_choice.clone()
    }

    fn choice_target(&self, choice_point: NodeId, data: &ChoicePointData) -> Option<NodeId> {
        self.tree
            .resolve_path(choice_point, &data.path_on_choice)
            .correct_node()
            .filter(|n| self.tree.is_container(*n))
    }

    fn pop_choice_string_and_tags(
        &mut self,
        tags: &mut Vec<String>,
    ) -> Result<String, StoryError> {
        let obj = self.get_state_mut().pop_evaluation_stack()?;
        let choice_str = match obj.as_string_value() {
            Some(sv) => sv.string.clone(),
            None => {
                return Err(StoryError::InvalidStoryState(
                    "Expected a string value for choice content".to_owned(),
                ))
            }
        };

        while matches!(
            self.get_state().peek_evaluation_stack(),
            Some(RtObj::Tag(_))
        ) {
            if let RtObj::Tag(text) = self.get_state_mut().pop_evaluation_stack()? {
                tags.insert(0, text); // popped in reverse order
            }
        }

        Ok(choice_str)
    }
}
