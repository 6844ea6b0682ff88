//! A runtime for compiled [Ink](https://github.com/inkle/ink) stories, the
//! scripting language for writing interactive narrative.
//! `inkrun` loads the JSON bytecode produced by the ink compiler and plays
//! it back: stepping content, offering choices, and saving and restoring
//! state.

mod callstack;
pub mod choice;
mod control_command;
mod flow;
pub mod ink_list;
pub mod ink_list_item;
mod json_read;
mod json_write;
mod list_definition;
mod list_definitions_origin;
mod native_function_call;
mod node;
pub mod path;
mod pointer;
mod push_pop;
mod rt_obj;
mod state_patch;
pub mod story;
pub mod story_error;
mod story_state;
pub mod value_type;
mod variables_state;
