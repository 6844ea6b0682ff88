//! [`Story`] is the entry point to load and run a compiled story.
use crate::{
    list_definitions_origin::ListDefinitionsOrigin,
    node::ContentTree,
    node::NodeId,
    story::{
        errors::ErrorHandler, external_functions::ExternalFunctionDef,
        variable_observer::VariableObserver,
    },
    story_state::StoryState,
};
use std::{cell::RefCell, collections::HashMap, rc::Rc};

/// The current version of the ink story file format.
pub const INK_VERSION_CURRENT: i32 = 21;
/// The minimum legacy version of ink that can be loaded by the current version
/// of the code.
pub const INK_VERSION_MINIMUM_COMPATIBLE: i32 = 18;

#[derive(PartialEq)]
pub(crate) enum OutputStateChange {
    NoChange,
    ExtendedBeyondNewline,
    NewlineRemoved,
}

/// A `Story` is the core struct representing a complete compiled narrative,
/// managing evaluation and state.
pub struct Story {
    tree: Rc<ContentTree>,
    state: StoryState,
    temporary_evaluation_container: Option<NodeId>,
    recursive_continue_count: usize,
    async_continue_active: bool,
    async_saving: bool,
    prev_containers: Vec<NodeId>,
    list_definitions: Rc<ListDefinitionsOrigin>,
    pub(crate) on_error: Option<Rc<RefCell<dyn ErrorHandler>>>,
    pub(crate) state_snapshot_at_last_new_line: Option<StoryState>,
    pub(crate) variable_observers: HashMap<String, Vec<Rc<RefCell<dyn VariableObserver>>>>,
    pub(crate) has_validated_externals: bool,
    pub(crate) allow_external_function_fallbacks: bool,
    pub(crate) saw_lookahead_unsafe_function_after_new_line: bool,
    pub(crate) externals: HashMap<String, ExternalFunctionDef>,
}

mod misc {
    use crate::{
        json_read,
        rt_obj::RtObj,
        story::{Story, INK_VERSION_CURRENT},
        story_error::StoryError,
        story_state::StoryState,
        value_type::ValueType,
    };
    use rand::{rngs::StdRng, Rng, SeedableRng};
    use std::{collections::HashMap, rc::Rc};

    impl Story {
        /// Construct a `Story` out of a JSON string that was compiled with
        /// `inklecate`.
        pub fn new(json_string: &str) -> Result<Self, StoryError> {
            let (version, tree, list_definitions) = json_read::load_from_string(json_string)?;

            let tree = Rc::new(tree);
            let list_definitions = Rc::new(list_definitions);

            let mut story = Story {
                tree: tree.clone(),
                state: StoryState::new(tree, list_definitions.clone()),
                temporary_evaluation_container: None,
                recursive_continue_count: 0,
                async_continue_active: false,
                async_saving: false,
                saw_lookahead_unsafe_function_after_new_line: false,
                state_snapshot_at_last_new_line: None,
                on_error: None,
                prev_containers: Vec::new(),
                list_definitions,
                variable_observers: HashMap::with_capacity(0),
                has_validated_externals: false,
                allow_external_function_fallbacks: false,
                externals: HashMap::with_capacity(0),
            };

            story.reset_globals()?;

            if version != INK_VERSION_CURRENT {
                story.add_error(&format!("WARNING: Version of ink used to build story ({}) doesn't match current version ({}) of engine. Non-critical, but recommend synchronising.", version, INK_VERSION_CURRENT), true);
            }

            Ok(story)
        }

        /// Creates a string representing the hierarchy of objects and
        /// containers in a story.
        pub fn build_string_of_hierarchy(&self) -> String {
            let current = self.get_state().get_current_pointer().resolve(&self.tree);
            self.tree.build_string_of_hierarchy(current)
        }

        pub(crate) fn is_truthy(&self, obj: &RtObj) -> Result<bool, StoryError> {
            match obj {
                RtObj::Value(ValueType::DivertTarget(target_path)) => {
                    Err(StoryError::InvalidStoryState(format!("Shouldn't use a divert target (to {target_path}) as a conditional value. Did you intend a function call 'likeThis()' or a read count check 'likeThis'? (no arrows)")))
                }
                RtObj::Value(value) => value.is_truthy(),
                _ => Ok(false),
            }
        }

        pub(crate) fn if_async_we_cant(&self, activity_str: &str) -> Result<(), StoryError> {
            if self.async_continue_active {
                return Err(StoryError::InvalidStoryState(format!("Can't {activity_str}. Story is in the middle of a ContinueAsync(). Make more continue_async() calls or a single cont() call beforehand.")));
            }

            Ok(())
        }

        pub(crate) fn next_sequence_shuffle_index(&mut self) -> Result<i32, StoryError> {
            let popped = self.get_state_mut().pop_evaluation_stack()?;
            let num_elements = popped
                .as_value()
                .and_then(|v| v.get_int())
                .ok_or_else(|| {
                    StoryError::InvalidStoryState(
                        "Expected number of elements in sequence for shuffle index".to_owned(),
                    )
                })?;

            let seq_container = self
                .get_state()
                .get_current_pointer()
                .container
                .ok_or_else(|| {
                    StoryError::InvalidStoryState(
                        "No current container for shuffle index".to_owned(),
                    )
                })?;

            let popped = self.get_state_mut().pop_evaluation_stack()?;
            let seq_count = popped
                .as_value()
                .and_then(|v| v.get_int())
                .ok_or_else(|| {
                    StoryError::InvalidStoryState(
                        "Expected sequence count value for shuffle index".to_owned(),
                    )
                })?;

            let loop_index = seq_count / num_elements;
            let iteration_index = seq_count % num_elements;

            // Generate the same shuffle based on:
            // - The hash of this container, to make sure it's consistent each time the
            //   runtime returns to the sequence
            // - How many times the runtime has looped around this full shuffle
            let seq_path_str = self.tree.path_of(seq_container).get_components_string();
            let sequence_hash: i32 = seq_path_str.chars().map(|c| c as i32).sum();
            let random_seed = sequence_hash + loop_index + self.get_state().story_seed;

            let mut rng = StdRng::seed_from_u64(random_seed as u64);

            let mut unpicked_indices: Vec<i32> = (0..num_elements).collect();

            for i in 0..=iteration_index {
                let chosen = rng.gen::<i32>().rem_euclid(unpicked_indices.len() as i32);
                let chosen_index = unpicked_indices[chosen as usize];
                unpicked_indices.retain(|&x| x != chosen_index);

                if i == iteration_index {
                    return Ok(chosen_index);
                }
            }

            Err(StoryError::InvalidStoryState(
                "Should never reach here".to_owned(),
            ))
        }
    }
}

mod choices;
mod control_logic;
pub mod errors;
pub mod external_functions;
mod flow;
mod navigation;
mod progress;
mod state;
mod tags;
pub mod variable_observer;
