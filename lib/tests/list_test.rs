use std::fs;

use inkrun::{story::Story, story_error::StoryError, value_type::ValueType};

mod common;

#[test]
fn list_value_print_test() -> Result<(), StoryError> {
    let json_string = fs::read_to_string("tests/data/lists/listvar.ink.json").unwrap();
    let mut story = Story::new(&json_string).unwrap();

    let mut text: Vec<String> = Vec::new();
    common::next_all(&mut story, &mut text)?;
    assert_eq!("red, blue", text[0]);

    Ok(())
}

#[test]
fn list_variable_value_test() -> Result<(), StoryError> {
    let json_string = fs::read_to_string("tests/data/lists/listvar.ink.json").unwrap();
    let story = Story::new(&json_string).unwrap();

    let value = story.get_variable("c");
    match value {
        Some(ValueType::List(list)) => {
            assert_eq!(2, list.items.len());
        }
        _ => panic!("expected a list value"),
    }

    Ok(())
}
