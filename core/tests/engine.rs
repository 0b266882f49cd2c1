use proofline_core::{
    activate_rule, change_language, set_language, CheckClient, CheckError, CommandError,
    DocumentState, Editor, Engine, FixOutcome, IgnoredRule, IgnoredRules, LinkOutcome,
    MemoryEditor, Navigation, PopupLink, ProblemId, RawMatch, Region, Settings,
    LANGUAGE_SETTING, NO_FURTHER_PROBLEMS,
};
use serde_json::json;

const DOC: &str = "doc";

fn raw(offset: usize, length: usize, rule: &str, category: &str, replacements: &[&str]) -> RawMatch {
    let replacements: Vec<_> = replacements.iter().map(|r| json!({ "value": r })).collect();
    serde_json::from_value(json!({
        "offset": offset,
        "length": length,
        "message": format!("{rule} here"),
        "replacements": replacements,
        "rule": {
            "id": rule,
            "category": { "name": category },
            "urls": [{ "value": "https://example.org/rules" }]
        }
    }))
    .unwrap()
}

fn typo(offset: usize, length: usize, replacements: &[&str]) -> RawMatch {
    raw(offset, length, "MORFOLOGIK_RULE_EN_US", "TYPOS", replacements)
}

fn engine() -> Engine<&'static str> {
    Engine::new(&Settings::default()).unwrap()
}

/// Checks the whole document (or selection) with a canned response.
fn check(engine: &mut Engine<&'static str>, editor: &mut MemoryEditor, matches: Vec<RawMatch>) -> usize {
    check_with(engine, editor, matches, &IgnoredRules::in_memory())
}

fn check_with(
    engine: &mut Engine<&'static str>,
    editor: &mut MemoryEditor,
    matches: Vec<RawMatch>,
    ignored: &IgnoredRules,
) -> usize {
    let plan = engine.prepare_check(editor, &Settings::default(), ignored);
    engine.complete_check(editor, &DOC, &plan, Ok(matches)).unwrap()
}

/// Feeds the editor's pending edits back to the engine, as a host would.
fn pump(engine: &mut Engine<&'static str>, editor: &mut MemoryEditor) {
    for change in editor.take_changes() {
        engine.on_text_changed(&DOC, &change);
    }
    engine.on_modified(editor, &DOC);
}

fn offsets(engine: &Engine<&'static str>) -> Vec<usize> {
    engine.problems(&DOC).iter().map(|p| p.offset).collect()
}

#[test]
fn applying_single_fix_rewrites_text_and_empties_set() {
    let mut editor = MemoryEditor::new("Teh cat sat.");
    let mut engine = engine();
    assert_eq!(check(&mut engine, &mut editor, vec![typo(0, 3, &["The"])]), 1);
    assert_eq!(engine.problems(&DOC)[0].original_content, "Teh");

    assert_eq!(
        engine.goto_next(&mut editor, &DOC, true),
        Navigation::Selected(ProblemId(0))
    );
    assert_eq!(editor.selection(), Some(Region::new(0, 3)));
    assert!(editor.popup().unwrap().starts_with("MORFOLOGIK_RULE_EN_US here"));

    let outcome = engine.apply_fix(&mut editor, &DOC).unwrap();
    assert_eq!(
        outcome,
        FixOutcome::Applied {
            problem: ProblemId(0),
            caret: 3
        }
    );
    pump(&mut engine, &mut editor);

    assert_eq!(editor.text(), "The cat sat.");
    assert!(engine.problems(&DOC).is_empty());
    assert_eq!(engine.state(&DOC), DocumentState::Idle);
    assert_eq!(editor.selection(), Some(Region::caret(3)));
    assert_eq!(editor.marker_count(), 0);
}

#[test]
fn ignoring_clears_whole_equality_class() {
    let mut editor = MemoryEditor::new("Teh cat sat on mat. Teh dog ran fsat.");
    let mut engine = engine();
    check(
        &mut engine,
        &mut editor,
        vec![typo(0, 3, &["The"]), typo(20, 3, &["The"]), typo(32, 4, &["sat"])],
    );
    assert_eq!(engine.state(&DOC), DocumentState::HasProblems { active: 3 });

    engine.goto_next(&mut editor, &DOC, true);
    let outcome = engine.ignore(&mut editor, &DOC).unwrap();
    assert_eq!(outcome.ignored, vec![ProblemId(0), ProblemId(1)]);
    assert_eq!(outcome.caret, 0);

    assert_eq!(editor.text(), "Teh cat sat on mat. Teh dog ran fsat.");
    assert_eq!(offsets(&engine), vec![32]);
    assert_eq!(editor.marker_count(), 1);

    assert_eq!(
        engine.goto_next(&mut editor, &DOC, true),
        Navigation::Selected(ProblemId(2))
    );
}

#[test]
fn navigation_picks_nearest_problem_in_each_direction() {
    let mut editor = MemoryEditor::new("a".repeat(120));
    let mut engine = engine();
    check(
        &mut engine,
        &mut editor,
        vec![typo(10, 3, &[]), typo(60, 3, &[]), typo(90, 3, &[])],
    );

    editor.set_selection(Region::caret(50));
    assert_eq!(
        engine.goto_next(&mut editor, &DOC, true),
        Navigation::Selected(ProblemId(1))
    );
    assert_eq!(editor.selection(), Some(Region::new(60, 63)));

    editor.set_selection(Region::caret(50));
    assert_eq!(
        engine.goto_next(&mut editor, &DOC, false),
        Navigation::Selected(ProblemId(0))
    );

    editor.show_panel();
    editor.set_selection(Region::caret(95));
    assert_eq!(engine.goto_next(&mut editor, &DOC, true), Navigation::Exhausted);
    assert_eq!(editor.last_status(), Some(NO_FURTHER_PROBLEMS));
    assert!(!editor.panel_visible());
}

#[test]
fn navigation_skips_resolved_problems() {
    let mut editor = MemoryEditor::new("Teh cat sat on teh mat.");
    let mut engine = engine();
    check(&mut engine, &mut editor, vec![typo(0, 3, &["The"]), typo(15, 3, &["the"])]);

    // not pumped yet, so the fixed problem is still registered
    editor.edit(Region::new(0, 3), "The");
    assert_eq!(engine.problems(&DOC).len(), 2);
    assert_eq!(editor.selection(), None);
    assert_eq!(
        engine.goto_next(&mut editor, &DOC, true),
        Navigation::Selected(ProblemId(1))
    );
}

#[test]
fn failed_check_leaves_previous_results() {
    let mut editor = MemoryEditor::new("Teh cat sat.");
    let mut engine = engine();
    check(&mut engine, &mut editor, vec![typo(0, 3, &["The"])]);

    let plan = engine.prepare_check(&editor, &Settings::default(), &IgnoredRules::in_memory());
    let err = engine
        .complete_check(
            &mut editor,
            &DOC,
            &plan,
            Err(CheckError::Decode("unexpected end of input".into())),
        )
        .unwrap_err();
    assert!(matches!(err, CheckError::Decode(_)));
    assert_eq!(offsets(&engine), vec![0]);
    assert_eq!(editor.marker_count(), 1);
    assert!(editor
        .last_status()
        .unwrap()
        .starts_with("Could not check document"));
}

#[tokio::test]
async fn unreachable_checker_leaves_previous_results() {
    let mut editor = MemoryEditor::new("Teh cat sat.");
    let mut engine = engine();
    check(&mut engine, &mut editor, vec![typo(0, 3, &["The"])]);

    let client = CheckClient::new("http://127.0.0.1:1/v2/check", "proofline-test");
    let plan = engine.prepare_check(&editor, &Settings::default(), &IgnoredRules::in_memory());
    let result = client
        .check(&plan.text, &plan.language, &plan.disabled_rules)
        .await;
    let err = engine
        .complete_check(&mut editor, &DOC, &plan, result)
        .unwrap_err();
    assert!(matches!(err, CheckError::Http(_)));
    assert_eq!(engine.problems(&DOC).len(), 1);
}

#[test]
fn malformed_match_fails_the_check() {
    let mut editor = MemoryEditor::new("Teh cat sat.");
    let mut engine = engine();
    check(&mut engine, &mut editor, vec![typo(0, 3, &["The"])]);

    let broken: RawMatch = serde_json::from_value(json!({"offset": 4, "length": 3})).unwrap();
    let plan = engine.prepare_check(&editor, &Settings::default(), &IgnoredRules::in_memory());
    let err = engine
        .complete_check(&mut editor, &DOC, &plan, Ok(vec![typo(0, 3, &[]), broken]))
        .unwrap_err();
    assert!(matches!(err, CheckError::InvalidMatch { index: 1, .. }));
    assert_eq!(engine.problems(&DOC).len(), 1);
}

#[test]
fn checker_offsets_count_utf16_units() {
    let mut editor = MemoryEditor::new("I 😀 Teh cat.");
    let mut engine = engine();
    assert_eq!(check(&mut engine, &mut editor, vec![typo(5, 3, &["The"])]), 1);
    assert_eq!(engine.problems(&DOC)[0].original_content, "Teh");
    assert_eq!(engine.problems(&DOC)[0].region(), Region::new(4, 7));

    engine.goto_next(&mut editor, &DOC, true);
    engine.apply_fix(&mut editor, &DOC).unwrap();
    pump(&mut engine, &mut editor);
    assert_eq!(editor.text(), "I 😀 The cat.");
    assert!(engine.problems(&DOC).is_empty());
}

#[test]
fn selection_check_shifts_and_discards_outside_matches() {
    let mut editor = MemoryEditor::new("Hello wrld. Teh end.");
    let mut engine = engine();
    editor.set_selection(Region::new(12, 20));

    let plan = engine.prepare_check(&editor, &Settings::default(), &IgnoredRules::in_memory());
    assert_eq!(plan.text, "Teh end.");
    assert_eq!(plan.language, "auto");

    let active = engine
        .complete_check(
            &mut editor,
            &DOC,
            &plan,
            Ok(vec![typo(0, 3, &["The"]), typo(5, 10, &[])]),
        )
        .unwrap();
    assert_eq!(active, 1);
    let problem = &engine.problems(&DOC)[0];
    assert_eq!(problem.region(), Region::new(12, 15));
    assert_eq!(problem.original_content, "Teh");
}

#[test]
fn ids_follow_offset_order_and_recheck_replaces_wholesale() {
    let mut editor = MemoryEditor::new("Teh cat sat on teh mat.");
    let mut engine = engine();
    check(&mut engine, &mut editor, vec![typo(15, 3, &["the"]), typo(0, 3, &["The"])]);
    let ids: Vec<_> = engine.problems(&DOC).iter().map(|p| (p.id, p.offset)).collect();
    assert_eq!(ids, vec![(ProblemId(0), 0), (ProblemId(1), 15)]);

    check(&mut engine, &mut editor, vec![typo(8, 3, &[])]);
    assert_eq!(offsets(&engine), vec![8]);
    assert_eq!(editor.marker_count(), 1);

    check(&mut engine, &mut editor, vec![]);
    assert!(!engine.registry().contains(&DOC));
    assert_eq!(editor.marker_count(), 0);
}

#[test]
fn ignored_rules_are_sent_and_filtered() {
    let mut editor = MemoryEditor::new("Teh  cat sat.");
    let mut engine = engine();
    let mut ignored = IgnoredRules::in_memory();
    ignored.add(IgnoredRule {
        id: "WHITESPACE_RULE".into(),
        description: "Whitespace repetition".into(),
    });

    let plan = engine.prepare_check(&editor, &Settings::default(), &ignored);
    assert_eq!(plan.disabled_rules, vec!["WHITESPACE_RULE".to_string()]);

    let active = check_with(
        &mut engine,
        &mut editor,
        vec![
            typo(0, 3, &["The"]),
            raw(3, 2, "WHITESPACE_RULE", "TYPOGRAPHY", &[" "]),
        ],
        &ignored,
    );
    assert_eq!(active, 1);
}

#[test]
fn matches_in_ignored_scopes_are_dropped() {
    let mut editor = MemoryEditor::new("// teh note\nTeh code");
    editor.add_scope(Region::new(0, 11), "comment.line.double-slash");
    let mut engine = engine();
    check(&mut engine, &mut editor, vec![typo(3, 3, &["the"]), typo(12, 3, &["The"])]);
    assert_eq!(offsets(&engine), vec![12]);
    assert!(engine.hover(&editor, &DOC, 4).is_none());
}

#[test]
fn multiple_replacements_go_through_choice() {
    let mut editor = MemoryEditor::new("Teh cat sat.");
    let mut engine = engine();
    check(&mut engine, &mut editor, vec![typo(0, 3, &["The", "Tea", "Ten"])]);
    engine.goto_next(&mut editor, &DOC, true);

    let outcome = engine.apply_fix(&mut editor, &DOC).unwrap();
    assert_eq!(
        outcome,
        FixOutcome::Choose {
            problem: ProblemId(0),
            replacements: vec!["The".into(), "Tea".into(), "Ten".into()],
        }
    );
    assert_eq!(editor.text(), "Teh cat sat.");

    editor.set_selection(Region::caret(7));
    let cancelled = engine
        .choose_replacement(&mut editor, &DOC, ProblemId(0), None)
        .unwrap();
    assert_eq!(cancelled, FixOutcome::Cancelled { problem: ProblemId(0) });
    assert_eq!(editor.selection(), Some(Region::new(0, 3)));

    let err = engine
        .choose_replacement(&mut editor, &DOC, ProblemId(0), Some(3))
        .unwrap_err();
    assert_eq!(
        err,
        CommandError::ReplacementOutOfRange {
            problem: ProblemId(0),
            index: 3,
            available: 3
        }
    );
    assert_eq!(editor.text(), "Teh cat sat.");
    assert_eq!(engine.problems(&DOC).len(), 1);

    let applied = engine
        .choose_replacement(&mut editor, &DOC, ProblemId(0), Some(1))
        .unwrap();
    assert_eq!(
        applied,
        FixOutcome::Applied {
            problem: ProblemId(0),
            caret: 3
        }
    );
    pump(&mut engine, &mut editor);
    assert_eq!(editor.text(), "Tea cat sat.");
    assert!(engine.problems(&DOC).is_empty());
}

#[test]
fn fix_after_edit_shifts_remaining_problems() {
    let mut editor = MemoryEditor::new("Teh cat sat on teh mat.");
    let mut engine = engine();
    check(
        &mut engine,
        &mut editor,
        vec![typo(0, 3, &["The quick"]), typo(15, 3, &["the"])],
    );
    engine.goto_next(&mut editor, &DOC, true);
    engine.apply_fix(&mut editor, &DOC).unwrap();
    pump(&mut engine, &mut editor);

    assert_eq!(editor.text(), "The quick cat sat on teh mat.");
    assert_eq!(offsets(&engine), vec![21]);
    assert_eq!(
        engine.goto_next(&mut editor, &DOC, true),
        Navigation::Selected(ProblemId(1))
    );
    assert_eq!(editor.selection(), Some(Region::new(21, 24)));
}

#[test]
fn commands_without_selection_are_rejected() {
    let mut editor = MemoryEditor::new("Teh cat sat.");
    let mut engine = engine();
    check(&mut engine, &mut editor, vec![typo(0, 3, &[])]);

    editor.set_selection(Region::caret(5));
    assert_eq!(
        engine.apply_fix(&mut editor, &DOC),
        Err(CommandError::NoProblemSelected)
    );
    assert_eq!(editor.last_status(), Some("no language problem selected"));
    assert_eq!(engine.ignore(&mut editor, &DOC), Err(CommandError::NoProblemSelected));

    engine.goto_next(&mut editor, &DOC, false);
    assert_eq!(
        engine.apply_fix(&mut editor, &DOC),
        Err(CommandError::NoReplacements(ProblemId(0)))
    );
    assert_eq!(engine.problems(&DOC).len(), 1);
    assert_eq!(editor.text(), "Teh cat sat.");
}

#[test]
fn deactivating_rule_drops_all_its_problems() {
    let mut editor = MemoryEditor::new("Teh cat sat on teh mat , ok.");
    let mut engine = engine();
    check(
        &mut engine,
        &mut editor,
        vec![
            typo(0, 3, &["The"]),
            typo(15, 3, &["the"]),
            raw(22, 2, "COMMA_PARENTHESIS_WHITESPACE", "TYPOGRAPHY", &[","]),
        ],
    );
    let mut rules = IgnoredRules::in_memory();

    editor.set_selection(Region::new(0, 28));
    assert_eq!(
        engine.deactivate_rule(&mut editor, &DOC, &mut rules),
        Err(CommandError::MultipleProblemsSelected)
    );

    engine.goto_next(&mut editor, &DOC, true);
    let rule = engine.deactivate_rule(&mut editor, &DOC, &mut rules).unwrap();
    assert_eq!(rule.id, "MORFOLOGIK_RULE_EN_US");
    assert_eq!(rule.description, "MORFOLOGIK_RULE_EN_US here");
    assert!(rules.contains("MORFOLOGIK_RULE_EN_US"));
    assert_eq!(offsets(&engine), vec![22]);

    let activated = activate_rule(&mut editor, &mut rules, "MORFOLOGIK_RULE_EN_US").unwrap();
    assert_eq!(activated, rule);
    assert_eq!(
        activate_rule(&mut editor, &mut rules, "MORFOLOGIK_RULE_EN_US"),
        Err(CommandError::UnknownRule("MORFOLOGIK_RULE_EN_US".into()))
    );
}

#[test]
fn hover_card_truncates_and_links_replacements() {
    let mut editor = MemoryEditor::new("Teh cat sat.");
    let mut engine = engine();
    check(
        &mut engine,
        &mut editor,
        vec![typo(0, 3, &["The", "Tea", "Ten", "Tee", "Toe"])],
    );

    let card = engine.hover(&editor, &DOC, 1).unwrap();
    assert_eq!(card.replacements.len(), 3);
    assert_eq!(card.replacements[1].1, PopupLink::replace(ProblemId(0), 1));
    assert_eq!(card.show_all, Some(PopupLink::show_all(ProblemId(0))));
    let text = card.render_markdown(|link| link.to_string());
    assert!(text.contains("[Tea](replace:0/1)"));
    assert!(text.contains("[show all](showall:0)"));
    assert!(engine.hover(&editor, &DOC, 8).is_none());

    let link: PopupLink = "showall:0".parse().unwrap();
    match engine.follow_link(&mut editor, &DOC, &link).unwrap() {
        LinkOutcome::Expanded(card) => {
            assert_eq!(card.replacements.len(), 5);
            assert!(card.show_all.is_none());
        }
        other => panic!("expected expanded card, got {other:?}"),
    }
    assert!(editor.popup().unwrap().contains("[Toe](replace:0/4)"));

    let link: PopupLink = "view:1/2,replace:0/4".parse().unwrap();
    assert_eq!(
        engine.follow_link(&mut editor, &DOC, &link).unwrap(),
        LinkOutcome::Applied {
            problem: ProblemId(0),
            caret: 3
        }
    );
    assert!(editor.popup().is_none());
    pump(&mut engine, &mut editor);
    assert_eq!(editor.text(), "Toe cat sat.");
}

#[test]
fn bad_links_change_nothing() {
    let mut editor = MemoryEditor::new("Teh cat sat.");
    let mut engine = engine();
    check(&mut engine, &mut editor, vec![typo(0, 3, &["The"])]);

    let unknown: PopupLink = "replace:7/0".parse().unwrap();
    assert_eq!(
        engine.follow_link(&mut editor, &DOC, &unknown),
        Err(CommandError::UnknownProblem(ProblemId(7)))
    );
    let out_of_range: PopupLink = "replace:0/2".parse().unwrap();
    assert!(matches!(
        engine.follow_link(&mut editor, &DOC, &out_of_range),
        Err(CommandError::ReplacementOutOfRange { index: 2, .. })
    ));
    assert_eq!(editor.text(), "Teh cat sat.");
    assert_eq!(engine.problems(&DOC).len(), 1);
}

#[test]
fn language_override_is_per_document() {
    let mut editor = MemoryEditor::new("Hallo Welt");
    assert_eq!(set_language(&mut editor, "de-de"), Ok(Some("de-DE")));
    assert_eq!(editor.setting(LANGUAGE_SETTING).as_deref(), Some("de-DE"));

    let engine = engine();
    let plan = engine.prepare_check(&editor, &Settings::default(), &IgnoredRules::in_memory());
    assert_eq!(plan.language, "de-DE");

    assert_eq!(change_language(&mut editor, 0), Ok(None));
    assert_eq!(editor.setting(LANGUAGE_SETTING), None);
    assert!(matches!(
        set_language(&mut editor, "klingon"),
        Err(CommandError::UnknownLanguage(_))
    ));
    assert!(change_language(&mut editor, 10_000).is_err());
}

#[test]
fn closing_document_evicts_its_problems() {
    let mut editor = MemoryEditor::new("Teh cat sat.");
    let mut engine = engine();
    check(&mut engine, &mut editor, vec![typo(0, 3, &["The"])]);
    engine.close_document(&DOC);
    assert!(!engine.registry().contains(&DOC));
    assert_eq!(engine.state(&DOC), DocumentState::Idle);
}
