use chrono::NaiveDate;
use memvra::export::{self, format_filename, ExportData};
use memvra::git::WorkingState;
use memvra::memory::{Memory, MemoryKind, Project, Session};
use memvra::scanner::TechStack;

fn memory(kind: MemoryKind, content: &str) -> Memory {
    Memory {
        id: format!("id-{}", content.len()),
        content: content.into(),
        kind,
        importance: kind.default_importance(),
        source: "user".into(),
        related_files: vec![],
        created_at: Default::default(),
        updated_at: Default::default(),
    }
}

fn sample_data() -> ExportData {
    let day = NaiveDate::from_ymd_opt(2026, 7, 14).unwrap();
    ExportData {
        project: Project {
            name: "testapp".into(),
            file_count: 12,
            chunk_count: 48,
            ..Default::default()
        },
        stack: TechStack {
            project_name: "testapp".into(),
            language: "Go".into(),
            framework: "Gin".into(),
            database: "PostgreSQL".into(),
            ..Default::default()
        },
        memories: vec![
            memory(MemoryKind::Note, "a note"),
            memory(MemoryKind::Decision, "Use PostgreSQL"),
            memory(MemoryKind::Todo, "add rate limiting"),
            memory(MemoryKind::Convention, "Use camelCase"),
            memory(MemoryKind::Constraint, "Never store secrets in code"),
        ],
        sessions: vec![
            Session {
                question: "latest work".into(),
                response_summary: "wired the auth middleware".into(),
                model_used: "claude".into(),
                created_at: day.and_hms_opt(15, 0, 0),
                ..Default::default()
            },
            Session {
                question: "earlier work".into(),
                model_used: "gemini".into(),
                created_at: day.and_hms_opt(9, 0, 0),
                ..Default::default()
            },
        ],
        git_state: WorkingState {
            branch: "feature/auth".into(),
            staged: vec!["internal/auth.go".into()],
            modified: vec!["main.go".into()],
            untracked: vec![],
            diff_stat: " 2 files changed".into(),
        },
    }
}

fn empty_data() -> ExportData {
    ExportData {
        project: Project {
            name: "empty".into(),
            ..Default::default()
        },
        ..Default::default()
    }
}

fn section_order(rendered: &str) -> Vec<usize> {
    [
        "Architectural Decisions",
        "Coding Conventions",
        "Constraints",
        "Notes",
        "TODOs",
    ]
    .iter()
    .filter_map(|h| rendered.find(h))
    .collect()
}

#[test]
fn claude_export_contents_and_layout() {
    let rendered = export::get("claude").unwrap().export(&sample_data()).unwrap();

    for expected in [
        "testapp",
        "Memvra",
        "Project Profile",
        "Go",
        "Gin",
        "PostgreSQL",
        "Architectural Decisions",
        "Use PostgreSQL",
        "Coding Conventions",
        "Use camelCase",
        "Constraints",
        "Never store secrets in code",
        "Notes",
        "TODOs",
        "Work in Progress",
        "feature/auth",
        "internal/auth.go",
        "Recent Activity",
        "wired the auth middleware",
        "claude",
        "gemini",
    ] {
        assert!(rendered.contains(expected), "missing {expected:?}");
    }

    // Active work context renders before the profile.
    assert!(rendered.find("Work in Progress").unwrap() < rendered.find("Project Profile").unwrap());

    // Memory sections keep their fixed order.
    let order = section_order(&rendered);
    assert_eq!(order.len(), 5);
    assert!(order.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn cursor_export_is_plain_text() {
    let rendered = export::get("cursor").unwrap().export(&sample_data()).unwrap();

    for expected in [
        "AI Rules",
        "testapp",
        "Go",
        "Gin",
        "PostgreSQL",
        "Architectural Decisions",
        "Coding Conventions",
        "Constraints",
        "Memvra",
        "Work in Progress",
        "feature/auth",
        "Recent Activity",
        "wired the auth middleware",
    ] {
        assert!(rendered.contains(expected), "missing {expected:?}");
    }
}

#[test]
fn markdown_export_has_stack_table() {
    let rendered = export::get("markdown")
        .unwrap()
        .export(&sample_data())
        .unwrap();
    assert!(rendered.contains("# testapp — Project Context"));
    assert!(rendered.contains("| Language | Go |"));
    assert!(rendered.contains("| Database | PostgreSQL |"));

    let order = section_order(&rendered);
    assert_eq!(order.len(), 5);
    assert!(order.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn json_export_schema_and_chronology() {
    let rendered = export::get("json").unwrap().export(&sample_data()).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&rendered).unwrap();

    assert_eq!(parsed["project"]["name"], "testapp");
    assert_eq!(parsed["project"]["file_count"], 12);
    assert_eq!(parsed["stack"]["language"], "Go");
    assert_eq!(parsed["work_in_progress"]["branch"], "feature/auth");

    // Sessions are exported oldest-first.
    let activity = parsed["recent_activity"].as_array().unwrap();
    assert_eq!(activity.len(), 2);
    assert_eq!(activity[0]["question"], "earlier work");
    assert_eq!(activity[1]["question"], "latest work");

    let memories = parsed["memories"].as_object().unwrap();
    assert_eq!(memories["decision"].as_array().unwrap().len(), 1);
    assert_eq!(memories["decision"][0]["content"], "Use PostgreSQL");
    assert!(memories["decision"][0]["importance"].is_number());
    assert_eq!(memories["decision"][0]["source"], "user");
}

#[test]
fn empty_project_omits_wip_and_activity() {
    for format in export::valid_formats() {
        let rendered = export::get(format).unwrap().export(&empty_data()).unwrap();
        assert!(
            !rendered.contains("Work in Progress"),
            "{format} rendered WIP for empty state"
        );
        assert!(
            !rendered.contains("Recent Activity"),
            "{format} rendered activity for empty state"
        );
    }
}

#[test]
fn clean_tree_with_branch_is_not_wip() {
    // A branch alone (no staged/modified/untracked) is not work in progress.
    let mut data = empty_data();
    data.git_state.branch = "main".into();
    let rendered = export::get("claude").unwrap().export(&data).unwrap();
    assert!(!rendered.contains("Work in Progress"));
}

#[test]
fn unknown_format_is_invalid_input() {
    assert!(export::get("pdf").is_err());
}

#[test]
fn canonical_filenames() {
    assert_eq!(format_filename("claude"), Some("CLAUDE.md"));
    assert_eq!(format_filename("cursor"), Some(".cursorrules"));
    assert_eq!(format_filename("markdown"), Some("PROJECT_CONTEXT.md"));
    assert_eq!(format_filename("json"), Some("memvra-context.json"));
    assert_eq!(format_filename("pdf"), None);
}
