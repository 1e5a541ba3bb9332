//! Board document round-trip tests

use mb_core::{
    board_from_json, board_to_json, load_board, save_board, Action, ActionKind, Board, Color, Row,
};
use serde_json::json;

fn sample_board() -> Board {
    let mut board = Board::with_id("board_sample", "Sample");

    let mut main = Row::with_id("row_main", "Main");
    main.add_action(
        Action::new(ActionKind::MouseClick, "click")
            .with_id("a1")
            .with_coordinates(100, 200)
            .with_button("right")
            .with_delays(10, 20),
    );
    main.add_action(
        Action::new(ActionKind::WaitPixelColor, "wait red")
            .with_id("a2")
            .with_coordinates(5, 6)
            .with_color(Color::rgb(255, 0, 0).with_tolerance(3))
            .with_meta("timeout_ms", 1500)
            .with_meta("any_change", false),
    );
    main.add_action(
        Action::new(ActionKind::KeyPress, "copy")
            .with_id("a3")
            .with_key("ctrl+c")
            .disabled(),
    );

    let mut sub = Row::with_id("row_sub", "Sub");
    sub.enabled = false;
    sub.add_action(
        Action::new(ActionKind::DbSearch, "lookup")
            .with_id("b1")
            .with_meta("database", "people")
            .with_meta("search_value", json!({"nested": [1, 2, 3]})),
    );

    board.add_row(main);
    board.add_row(sub);
    board
}

#[test]
fn test_save_load_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("board.json");
    let board = sample_board();

    save_board(&board, &path).unwrap();
    let loaded = load_board(&path).unwrap();

    assert_eq!(loaded.id, board.id);
    assert_eq!(loaded.name, board.name);
    assert_eq!(loaded.rows, board.rows);
}

#[test]
fn test_document_carries_version_and_app() {
    let json = board_to_json(&sample_board()).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();

    assert_eq!(value["app"], json!("macroboard"));
    assert!(value["version"].is_string());
    assert_eq!(value["rows"][0]["actions"][0]["action_type"], json!("MOUSE_CLICK"));
    assert_eq!(value["rows"][0]["actions"][1]["color"]["tolerance"], json!(3));
}

#[test]
fn test_load_with_missing_fields_uses_defaults() {
    let board = board_from_json(
        r#"{
            "rows": [
                {"id": "r1", "name": "Row", "actions": [
                    {"id": "x", "action_type": "LOG", "metadata": {"message": "hi"}}
                ]}
            ]
        }"#,
    )
    .unwrap();

    assert_eq!(board.id, "board_1");
    assert!(board.rows[0].enabled);
    assert_eq!(board.rows[0].actions[0].metadata["message"], json!("hi"));
}

#[test]
fn test_load_rejects_unknown_kind() {
    let result = board_from_json(
        r#"{"rows": [{"id": "r1", "actions": [{"id": "x", "action_type": "NOPE"}]}]}"#,
    );
    assert!(result.is_err());
}

#[test]
fn test_load_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let err = load_board(dir.path().join("absent.json")).unwrap_err();
    assert!(err.to_string().contains("failed to read board"));
}

#[test]
fn test_load_tolerates_byte_order_mark() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bom.json");
    let json = board_to_json(&sample_board()).unwrap();
    std::fs::write(&path, format!("\u{feff}{}", json)).unwrap();

    let loaded = load_board(&path).unwrap();
    assert_eq!(loaded.rows.len(), 2);
}
