use std::fs;

use inkrun::{story::Story, story_error::StoryError};

mod common;

#[test]
fn two_choices_test() -> Result<(), StoryError> {
    let json_string = fs::read_to_string("tests/data/choices/basic.ink.json").unwrap();
    let mut story = Story::new(&json_string).unwrap();

    let mut text: Vec<String> = Vec::new();
    common::next_all(&mut story, &mut text)?;
    assert_eq!("Test conditional choices", text[0]);

    let choices = story.get_current_choices();
    assert_eq!(2, choices.len());
    assert_eq!("one", choices[0].text);
    assert_eq!("two", choices[1].text);
    assert_eq!(0, choices[0].index);
    assert_eq!(1, choices[1].index);

    story.choose_choice_index(0)?;

    let mut text: Vec<String> = Vec::new();
    common::next_all(&mut story, &mut text)?;
    assert_eq!(1, text.len());
    assert_eq!("one", text[0]);
    assert!(common::is_ended(&story));

    Ok(())
}

#[test]
fn choice_out_of_range_test() -> Result<(), StoryError> {
    let json_string = fs::read_to_string("tests/data/choices/basic.ink.json").unwrap();
    let mut story = Story::new(&json_string).unwrap();

    let mut text: Vec<String> = Vec::new();
    common::next_all(&mut story, &mut text)?;

    assert!(story.choose_choice_index(5).is_err());

    Ok(())
}

#[test]
fn play_through_with_scripted_choices_test() -> Result<(), StoryError> {
    let mut errors: Vec<String> = Vec::new();
    let text = common::play_through("tests/data/choices/basic.ink.json", &[1], &mut errors)?;

    assert!(errors.is_empty());
    assert_eq!("two\n", text.last().unwrap());

    Ok(())
}
