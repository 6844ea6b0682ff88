#![allow(dead_code)]

use std::fs;

use inkrun::{story::Story, story_error::StoryError};
use rand::Rng;

/// Builds a story from a fixture path relative to the crate directory.
pub fn load_story(path: &str) -> Story {
    let json = fs::read_to_string(path).unwrap();
    Story::new(&json).unwrap()
}

/// Advances the story as far as it will go, collecting the trimmed
/// non-empty lines into `text`. Panics on story runtime errors.
pub fn next_all(story: &mut Story, text: &mut Vec<String>) -> Result<(), StoryError> {
    while story.can_continue() {
        let line = story.cont()?;
        let trimmed = line.trim();

        if !trimmed.is_empty() {
            text.push(trimmed.to_string());
        }
    }

    if story.has_error() {
        panic!("story errors: {}", story.get_current_errors().join("\n"));
    }

    Ok(())
}

/// True once no content remains and no choices are on offer.
pub fn is_ended(story: &Story) -> bool {
    !story.can_continue() && story.get_current_choices().is_empty()
}

/// Plays a story to the end. Choices are taken from `picks` while they
/// last, then at random. Returns the transcript (story lines plus the text
/// of every offered choice); runtime errors are collected into `errors`
/// instead of stopping the playthrough.
pub fn play_through(
    path: &str,
    picks: &[usize],
    errors: &mut Vec<String>,
) -> Result<Vec<String>, StoryError> {
    let mut story = load_story(path);
    let mut transcript = Vec::new();
    let mut scripted = picks.iter().copied();

    loop {
        while story.can_continue() {
            transcript.push(story.cont()?);
        }

        if story.has_error() {
            errors.extend(story.get_current_errors().iter().cloned());
        }

        let choices = story.get_current_choices();
        if choices.is_empty() {
            return Ok(transcript);
        }

        for choice in &choices {
            transcript.push(format!("{}\n", choice.text));
        }

        let pick = match scripted.next() {
            Some(i) => i,
            None => rand::thread_rng().gen_range(0..choices.len()),
        };
        story.choose_choice_index(pick)?;
    }
}
