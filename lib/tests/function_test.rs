use std::{cell::RefCell, fs, rc::Rc};

use inkrun::{
    story::{external_functions::ExternalFunction, Story},
    story_error::StoryError,
    value_type::ValueType,
};

mod common;

#[test]
fn evaluate_function_test() -> Result<(), StoryError> {
    let json_string = fs::read_to_string("tests/data/functions/add.ink.json").unwrap();
    let mut story = Story::new(&json_string).unwrap();

    let args = [ValueType::Int(1), ValueType::Int(2)];
    let mut text_output = String::new();
    let result = story.evaluate_function("add", Some(&args), &mut text_output)?;

    assert_eq!(Some(ValueType::Int(3)), result);
    assert!(text_output.is_empty());

    // The main flow is untouched by the evaluation.
    let line = story.cont()?;
    assert_eq!("Main.", line.trim());

    Ok(())
}

#[test]
fn evaluate_missing_function_test() {
    let json_string = fs::read_to_string("tests/data/functions/add.ink.json").unwrap();
    let mut story = Story::new(&json_string).unwrap();

    let mut text_output = String::new();
    assert!(story
        .evaluate_function("nope", None, &mut text_output)
        .is_err());
    assert!(story.evaluate_function(" ", None, &mut text_output).is_err());
}

struct Multiply;

impl ExternalFunction for Multiply {
    fn call(&mut self, _func_name: &str, args: Vec<ValueType>) -> Option<ValueType> {
        let a = args[0].get_int().unwrap();
        let b = args[1].get_int().unwrap();
        Some(ValueType::Int(a * b))
    }
}

#[test]
fn external_function_test() -> Result<(), StoryError> {
    let json_string = fs::read_to_string("tests/data/functions/external.ink.json").unwrap();
    let mut story = Story::new(&json_string).unwrap();

    story.bind_external_function("multiply", Rc::new(RefCell::new(Multiply)), true)?;

    let line = story.cont()?;
    assert_eq!("6", line.trim());

    Ok(())
}

#[test]
fn unbound_external_function_test() {
    let json_string = fs::read_to_string("tests/data/functions/external.ink.json").unwrap();
    let mut story = Story::new(&json_string).unwrap();

    story.set_allow_external_function_fallbacks(false);

    // No binding and no ink fallback, the story cannot start.
    assert!(story.cont().is_err());
}

#[test]
fn rebind_external_function_test() -> Result<(), StoryError> {
    let json_string = fs::read_to_string("tests/data/functions/external.ink.json").unwrap();
    let mut story = Story::new(&json_string).unwrap();

    story.bind_external_function("multiply", Rc::new(RefCell::new(Multiply)), true)?;
    assert!(story
        .bind_external_function("multiply", Rc::new(RefCell::new(Multiply)), true)
        .is_err());

    story.unbind_external_function("multiply")?;
    assert!(story.unbind_external_function("multiply").is_err());

    Ok(())
}
