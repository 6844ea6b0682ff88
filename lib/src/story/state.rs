use crate::{
    path::Path, story::Story, story_error::StoryError, story_state::StoryState,
    value_type::ValueType,
};

/// # State
/// Methods to read and write story state.
impl Story {
    #[inline]
    pub(crate) fn get_state(&self) -> &StoryState {
        &self.state
    }

    #[inline]
    pub(crate) fn get_state_mut(&mut self) -> &mut StoryState {
        &mut self.state
    }

    pub(crate) fn reset_globals(&mut self) -> Result<(), StoryError> {
        let has_global_decl = self
            .knot_container_with_name("global decl")
            .is_some();

        if has_global_decl {
            let original_pointer = self.get_state().get_current_pointer();

            self.choose_path(&Path::from_components_string("global decl"), false)?;

            // Continue, but without validating external bindings,
            // since we may be doing this reset at initialisation time.
            self.continue_internal(0.0)?;

            self.get_state_mut().set_current_pointer(original_pointer);
        }

        self.get_state_mut()
            .variables_state
            .snapshot_default_globals();

        Ok(())
    }

    /// Set the value of a named global ink variable.
    /// The types available are the standard ink types.
    pub fn set_variable(
        &mut self,
        variable_name: &str,
        value_type: &ValueType,
    ) -> Result<(), StoryError> {
        let notify_observers = self
            .get_state_mut()
            .variables_state
            .set(variable_name, value_type.clone())?;

        if notify_observers {
            self.notify_variable_changed(variable_name, value_type);
        }

        Ok(())
    }

    /// Get the value of a named global ink variable.
    /// The types available are the standard ink types.
    pub fn get_variable(&self, variable_name: &str) -> Option<ValueType> {
        self.get_state().variables_state.get(variable_name).cloned()
    }

    pub(crate) fn restore_state_snapshot(&mut self) {
        // Patched state had temporarily hijacked our
        // VariablesState and set its own callstack on it,
        // so we need to restore that.
        // If we're in the middle of saving, we may also
        // need to give the VariablesState the old patch.
        if let Some(mut snapshot) = self.state_snapshot_at_last_new_line.take() {
            snapshot.restore_after_patch();
            self.state = snapshot;
        }

        // If save completed while the above snapshot was
        // active, we need to apply any changes made since
        // the save was started but before the snapshot was made.
        if !self.async_saving {
            self.get_state_mut().apply_any_patch();
        }
    }

    pub(crate) fn state_snapshot(&mut self) {
        // tmp_state contains the new state and current state is stored in
        // the snapshot
        let mut tmp_state = self.state.copy_and_start_patching();
        std::mem::swap(&mut tmp_state, &mut self.state);
        self.state_snapshot_at_last_new_line = Some(tmp_state);
    }

    pub(crate) fn discard_snapshot(&mut self) {
        // Normally we want to integrate the patch
        // into the main global/counts dictionaries.
        // However, if we're in the middle of async
        // saving, we simply stay in a "patching" state,
        // albeit with the newer cloned patch.

        if !self.async_saving {
            self.get_state_mut().apply_any_patch();
        }

        // No longer need the snapshot.
        self.state_snapshot_at_last_new_line = None;
    }

    /// Exports the current state to JSON format, in order to save the game.
    pub fn save_state(&mut self) -> Result<String, StoryError> {
        self.get_state_mut().to_json()
    }

    /// Loads a previously saved state in JSON format.
    pub fn load_state(&mut self, json_state: &str) -> Result<(), StoryError> {
        self.get_state_mut().load_json(json_state)
    }

    /// Serializes the state as it stands now, while allowing the story to
    /// keep being advanced in the meantime. Changes made while the returned
    /// JSON is being written out elsewhere accumulate in a patch, which is
    /// folded back into the main state when
    /// [`background_save_complete`](Story::background_save_complete) is
    /// called.
    pub fn copy_state_for_background_thread_save(&mut self) -> Result<String, StoryError> {
        self.if_async_we_cant("start saving on a background thread")?;

        if self.async_saving {
            return Err(StoryError::InvalidStoryState("Story is already in background saving mode, can't call CopyStateForBackgroundThreadSave again!".to_owned()));
        }

        // The state we're about to return is the old one. The story itself
        // continues on a patched copy so that the returned state stays
        // stable while it's being serialized.
        let mut state_to_save = self.state.copy_and_start_patching();
        std::mem::swap(&mut state_to_save, &mut self.state);

        self.async_saving = true;

        state_to_save.to_json()
    }

    /// See [`copy_state_for_background_thread_save`](Story::copy_state_for_background_thread_save).
    /// This method releases the "frozen" save state, applying its patch
    /// that it was using to keep track of any changes made since it was
    /// started.
    pub fn background_save_complete(&mut self) {
        // If the story is currently in a snapshot state (lookahead after a
        // newline), the patch is kept until the snapshot is resolved.
        if self.state_snapshot_at_last_new_line.is_none() {
            self.get_state_mut().apply_any_patch();
        }

        self.async_saving = false;
    }

    /// Reset the story back to its initial state as it was when it was
    /// first constructed.
    pub fn reset_state(&mut self) -> Result<(), StoryError> {
        self.if_async_we_cant("ResetState")?;

        self.state = StoryState::new(self.tree.clone(), self.list_definitions.clone());

        self.reset_globals()?;

        Ok(())
    }
}
