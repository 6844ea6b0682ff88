use std::fs;

use inkrun::{story::Story, story_error::StoryError, value_type::ValueType};

mod common;

#[test]
fn condition_true_test() -> Result<(), StoryError> {
    let json_string = fs::read_to_string("tests/data/conditional/ifelse.ink.json").unwrap();
    let mut story = Story::new(&json_string).unwrap();

    let mut text: Vec<String> = Vec::new();
    common::next_all(&mut story, &mut text)?;
    assert_eq!(1, text.len());
    assert_eq!("Positive.", text[0]);

    Ok(())
}

#[test]
fn condition_false_test() -> Result<(), StoryError> {
    let json_string = fs::read_to_string("tests/data/conditional/ifelse.ink.json").unwrap();
    let mut story = Story::new(&json_string).unwrap();

    story.set_variable("x", &ValueType::Int(-1))?;

    let mut text: Vec<String> = Vec::new();
    common::next_all(&mut story, &mut text)?;
    assert_eq!(1, text.len());
    assert_eq!("Negative.", text[0]);

    Ok(())
}
