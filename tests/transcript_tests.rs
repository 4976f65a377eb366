// Tests for the transcript aggregator: fragment buffering, turn commits,
// translation rules, and session-log snapshots.

use lingua_live::session::{greeting_for, MessageRole, TranscriptAggregator};

#[test]
fn test_turn_complete_with_empty_buffers_appends_nothing() {
    let mut agg = TranscriptAggregator::new();

    assert_eq!(agg.commit_turn(), 0);
    assert!(agg.is_empty());
}

#[test]
fn test_turn_complete_with_input_only_appends_one_user_message() {
    let mut agg = TranscriptAggregator::new();
    agg.push_input("Hello");

    assert_eq!(agg.commit_turn(), 1);

    let messages = agg.messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].role, MessageRole::User);
    assert_eq!(messages[0].text, "Hello");
    assert!(messages[0].translation.is_none());
}

#[test]
fn test_turn_commits_user_before_tutor() {
    let mut agg = TranscriptAggregator::new();
    agg.push_input("Hola, ");
    agg.push_input("¿cómo estás?");
    agg.push_output("¡Muy bien, ");
    agg.push_output("gracias!");

    assert_eq!(agg.commit_turn(), 2);

    let messages = agg.messages();
    assert_eq!(messages[0].role, MessageRole::User);
    assert_eq!(messages[0].text, "Hola, ¿cómo estás?");
    assert_eq!(messages[1].role, MessageRole::Tutor);
    assert_eq!(messages[1].text, "¡Muy bien, gracias!");
}

#[test]
fn test_buffers_clear_between_turns() {
    let mut agg = TranscriptAggregator::new();

    agg.push_input("first");
    agg.commit_turn();

    agg.push_output("second");
    assert_eq!(agg.commit_turn(), 1);

    let messages = agg.messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[1].role, MessageRole::Tutor);
    assert_eq!(messages[1].text, "second");
}

#[test]
fn test_greeting_seeds_a_tutor_message() {
    let agg = TranscriptAggregator::with_greeting(greeting_for("spanish"));

    assert_eq!(agg.len(), 1);
    assert_eq!(agg.messages()[0].role, MessageRole::Tutor);
    assert!(!agg.messages()[0].text.is_empty());
}

#[test]
fn test_translation_is_appended_once() {
    let mut agg = TranscriptAggregator::new();
    agg.push_output("Guten Tag");
    agg.commit_turn();

    agg.set_translation(0, "Good day".to_string()).unwrap();
    assert_eq!(agg.messages()[0].translation.as_deref(), Some("Good day"));

    let second = agg.set_translation(0, "Hello".to_string());
    assert!(second.is_err(), "A second translation must be rejected");
    assert_eq!(agg.messages()[0].translation.as_deref(), Some("Good day"));
}

#[test]
fn test_translation_rejects_bad_index() {
    let mut agg = TranscriptAggregator::new();
    assert!(agg.set_translation(3, "x".to_string()).is_err());
}

#[test]
fn test_snapshot_requires_more_than_the_greeting() {
    let agg = TranscriptAggregator::with_greeting("Hello!");
    assert!(
        agg.snapshot("s1".to_string(), "spanish".to_string()).is_none(),
        "Greeting-only transcript must not be logged"
    );

    let empty = TranscriptAggregator::new();
    assert!(empty.snapshot("s2".to_string(), "spanish".to_string()).is_none());
}

#[test]
fn test_snapshot_captures_messages_and_language() {
    let mut agg = TranscriptAggregator::with_greeting("¡Hola!");
    agg.push_input("Buenos días");
    agg.commit_turn();

    let log = agg
        .snapshot("session-7".to_string(), "spanish".to_string())
        .expect("Transcript with an exchange should snapshot");

    assert_eq!(log.id, "session-7");
    assert_eq!(log.language, "spanish");
    assert_eq!(log.messages.len(), 2);
}

#[test]
fn test_greeting_falls_back_to_english() {
    assert_eq!(greeting_for("klingon"), greeting_for("english"));
    assert_ne!(greeting_for("spanish"), greeting_for("french"));
}
