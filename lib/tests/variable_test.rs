use std::{cell::RefCell, fs, rc::Rc};

use inkrun::{
    story::{variable_observer::VariableObserver, Story},
    story_error::StoryError,
    value_type::ValueType,
};

mod common;

#[test]
fn global_variable_test() -> Result<(), StoryError> {
    let json_string = fs::read_to_string("tests/data/variables/globals.ink.json").unwrap();
    let mut story = Story::new(&json_string).unwrap();

    assert_eq!(Some(ValueType::Int(5)), story.get_variable("x"));

    let mut text: Vec<String> = Vec::new();
    common::next_all(&mut story, &mut text)?;
    assert_eq!("x is 5.", text[0]);

    Ok(())
}

#[test]
fn set_variable_test() -> Result<(), StoryError> {
    let json_string = fs::read_to_string("tests/data/variables/globals.ink.json").unwrap();
    let mut story = Story::new(&json_string).unwrap();

    story.set_variable("x", &ValueType::Int(10))?;
    assert_eq!(Some(ValueType::Int(10)), story.get_variable("x"));

    let mut text: Vec<String> = Vec::new();
    common::next_all(&mut story, &mut text)?;
    assert_eq!("x is 10.", text[0]);

    Ok(())
}

struct Recorder {
    pub changes: Vec<(String, ValueType)>,
}

impl VariableObserver for Recorder {
    fn changed(&mut self, variable_name: &str, value: &ValueType) {
        self.changes.push((variable_name.to_string(), value.clone()));
    }
}

#[test]
fn variable_observer_test() -> Result<(), StoryError> {
    let json_string = fs::read_to_string("tests/data/variables/reassign.ink.json").unwrap();
    let mut story = Story::new(&json_string).unwrap();

    let recorder = Rc::new(RefCell::new(Recorder { changes: Vec::new() }));
    story.observe_variable("x", recorder.clone())?;

    let mut text: Vec<String> = Vec::new();
    common::next_all(&mut story, &mut text)?;
    assert_eq!("Done.", text[0]);

    let changes = &recorder.borrow().changes;
    assert_eq!(1, changes.len());
    assert_eq!("x", changes[0].0);
    assert_eq!(ValueType::Int(10), changes[0].1);

    Ok(())
}

#[test]
fn observe_undeclared_variable_test() {
    let json_string = fs::read_to_string("tests/data/variables/reassign.ink.json").unwrap();
    let mut story = Story::new(&json_string).unwrap();

    let recorder = Rc::new(RefCell::new(Recorder { changes: Vec::new() }));
    assert!(story.observe_variable("nope", recorder).is_err());
}
