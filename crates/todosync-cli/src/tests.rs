use std::path::{Path, PathBuf};

use pretty_assertions::assert_eq;
use tempfile::{tempdir, TempDir};
use todosync_core::sync::SyncCursor;
use todosync_core::{EntryFields, EntryFilter, EntrySort, LocalId, SyncReport};

use crate::cli::{CompletionShell, ExportFormat, ListSort};
use crate::commands::common::{
    default_editor, entry_preview, format_relative_time, normalize_content, open_store,
    parse_editor_entry, parse_entry_id, render_editor_entry, require_entry,
};
use crate::commands::completions::run_completions;
use crate::commands::config::{
    missing_profile_fields, profile_view, validate_profile, ProfileUpdate,
};
use crate::commands::delete::run_delete;
use crate::commands::done::run_set_complete;
use crate::commands::edit::run_edit;
use crate::commands::export::run_export;
use crate::commands::list::{list_entries, ListOptions};
use crate::commands::status::last_sync_label;
use crate::commands::sync::format_sync_report;
use crate::config_profiles::CliProfile;
use crate::error::CliError;
use crate::sync_profile::{sync_target_for_profile, ProfileCredentials};

fn temp_db() -> (TempDir, PathBuf) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("todosync.db");
    (dir, path)
}

async fn seed(path: &Path, titles: &[&str]) -> Vec<LocalId> {
    let store = open_store(path).await.unwrap();
    let mut ids = Vec::new();
    for title in titles {
        ids.push(store.insert(EntryFields::titled(*title)).await.unwrap());
    }
    ids
}

#[test]
fn normalize_content_trims_and_rejects_empty() {
    assert_eq!(normalize_content("  hello  "), Some("hello".to_string()));
    assert_eq!(normalize_content(" \n\t "), None);
}

#[test]
fn default_editor_is_defined() {
    assert!(!default_editor().is_empty());
}

#[test]
fn parse_entry_id_requires_number() {
    assert!(matches!(parse_entry_id(" \n "), Err(CliError::EmptyEntryId)));
    assert!(matches!(
        parse_entry_id("abc"),
        Err(CliError::InvalidEntryId(value)) if value == "abc"
    ));
    assert_eq!(parse_entry_id(" 12 ").unwrap(), LocalId::new(12));
}

#[test]
fn editor_buffer_round_trips_title_and_notes() {
    let buffer = render_editor_entry("Call plumber", "before noon\nask for quote");
    assert_eq!(buffer, "Call plumber\n\nbefore noon\nask for quote\n");
    assert_eq!(
        parse_editor_entry(&buffer),
        Some((
            "Call plumber".to_string(),
            "before noon\nask for quote".to_string()
        ))
    );
    assert_eq!(
        parse_editor_entry("Buy milk\n"),
        Some(("Buy milk".to_string(), String::new()))
    );
    assert_eq!(parse_editor_entry("   \nnotes only"), None);
}

#[test]
fn format_relative_time_units() {
    let now = 10_000_000;
    assert_eq!(format_relative_time(now - 30_000, now), "just now");
    assert_eq!(format_relative_time(now - 120_000, now), "2m ago");
    assert_eq!(format_relative_time(now - 2 * 60 * 60_000, now), "2h ago");
}

#[test]
fn last_sync_label_hides_initial_cursor() {
    assert_eq!(last_sync_label(SyncCursor::INITIAL), None);
    assert_eq!(
        last_sync_label(SyncCursor::new(0.5)).as_deref(),
        Some("1970-01-01 00:00:00 UTC")
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn entry_preview_truncates_with_ellipsis() {
    let (_dir, path) = temp_db();
    let ids = seed(&path, &["This is a very long title that should be shortened"]).await;
    let store = open_store(&path).await.unwrap();
    let entry = store.get(ids[0]).await.unwrap().unwrap();

    assert_eq!(entry_preview(&entry, 20), "This is a very lo...");
}

#[tokio::test(flavor = "multi_thread")]
async fn list_entries_filters_sorts_and_limits() {
    let (_dir, path) = temp_db();
    let ids = seed(&path, &["banana", "apple", "cherry pie"]).await;
    run_set_complete(&ids[1].to_string(), true, &path)
        .await
        .unwrap();

    let open = list_entries(
        &ListOptions {
            complete: Some(false),
            sort: ListSort::Title.into(),
            ..ListOptions::default()
        },
        &path,
    )
    .await
    .unwrap();
    let titles: Vec<_> = open.iter().map(|entry| entry.title.as_str()).collect();
    assert_eq!(titles, vec!["banana", "cherry pie"]);

    let searched = list_entries(
        &ListOptions {
            search: Some(" PIE ".to_string()),
            ..ListOptions::default()
        },
        &path,
    )
    .await
    .unwrap();
    assert_eq!(searched.len(), 1);

    let limited = list_entries(
        &ListOptions {
            sort: ListSort::Newest.into(),
            limit: Some(1),
            ..ListOptions::default()
        },
        &path,
    )
    .await
    .unwrap();
    assert_eq!(limited.len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn edit_with_flags_updates_fields_and_marks_dirty() {
    let (_dir, path) = temp_db();
    let ids = seed(&path, &["draft"]).await;
    let id = ids[0].to_string();

    run_edit(&id, Some(" final ".to_string()), Some("notes".to_string()), &path)
        .await
        .unwrap();

    let store = open_store(&path).await.unwrap();
    let entry = require_entry(&store, &id).await.unwrap();
    assert_eq!(entry.title, "final");
    assert_eq!(entry.notes, "notes");
    assert!(entry.is_dirty());

    let error = run_edit(&id, Some("  ".to_string()), None, &path)
        .await
        .unwrap_err();
    assert!(matches!(error, CliError::EmptyEditedContent));
}

#[tokio::test(flavor = "multi_thread")]
async fn delete_hides_entry_and_reports_missing_ids() {
    let (_dir, path) = temp_db();
    let ids = seed(&path, &["one", "two"]).await;

    run_delete(&ids[0].to_string(), &path).await.unwrap();

    let store = open_store(&path).await.unwrap();
    let visible = store
        .query(&EntryFilter::all(), EntrySort::default())
        .await
        .unwrap();
    assert_eq!(visible.len(), 1);
    assert_eq!(store.pending_summary().await.unwrap().deleting, 1);

    let error = run_delete(&ids[0].to_string(), &path).await.unwrap_err();
    assert!(matches!(error, CliError::EntryNotFound(_)));
}

#[tokio::test(flavor = "multi_thread")]
async fn export_writes_markdown_checklist() {
    let (dir, path) = temp_db();
    let ids = seed(&path, &["Buy milk", "Walk dog"]).await;
    run_set_complete(&ids[1].to_string(), true, &path)
        .await
        .unwrap();
    let output = dir.path().join("entries.md");

    run_export(ExportFormat::Markdown, Some(&output), &path)
        .await
        .unwrap();

    assert_eq!(
        std::fs::read_to_string(output).unwrap(),
        "- [ ] Buy milk\n- [x] Walk dog\n"
    );
}

#[test]
fn completions_write_script_to_file() {
    let dir = tempdir().unwrap();
    let output = dir.path().join("todosync.bash");

    run_completions(CompletionShell::Bash, Some(&output)).unwrap();

    let script = std::fs::read_to_string(output).unwrap();
    assert!(script.contains("todosync"));
}

#[test]
fn profile_update_sets_scheme_and_keeps_unset_fields() {
    let mut profile = CliProfile {
        account: Some("alice".to_string()),
        ..CliProfile::default()
    };

    ProfileUpdate {
        server: Some("localhost:3000".to_string()),
        insecure: true,
        access_token: Some(" tok ".to_string()),
        ..ProfileUpdate::default()
    }
    .apply(&mut profile);

    assert_eq!(profile.server.as_deref(), Some("localhost:3000"));
    assert_eq!(profile.use_https, Some(false));
    assert_eq!(profile.account.as_deref(), Some("alice"));
    assert_eq!(profile.access_token.as_deref(), Some("tok"));
    assert!(missing_profile_fields(&profile).is_empty());
}

#[test]
fn token_endpoint_requires_api_key_and_scheme() {
    let profile = CliProfile {
        token_endpoint: Some("https://auth.example.com/token".to_string()),
        ..CliProfile::default()
    };
    assert!(validate_profile(&profile).is_err());

    let profile = CliProfile {
        token_endpoint: Some("auth.example.com/token".to_string()),
        api_key: Some("key".to_string()),
        ..CliProfile::default()
    };
    assert!(validate_profile(&profile).is_err());
}

#[test]
fn profile_view_redacts_secrets() {
    let profile = CliProfile {
        server: Some("https://todo.example.com/".to_string()),
        access_token: Some("secret-token".to_string()),
        api_key: Some("secret-key".to_string()),
        ..CliProfile::default()
    };

    let view = profile_view("default", true, &profile);
    let rendered = serde_json::to_string(&view).unwrap();

    assert!(!rendered.contains("secret-token"));
    assert!(!rendered.contains("secret-key"));
    assert_eq!(view.api_key, Some("[REDACTED]"));
    assert_eq!(view.sync_interval_secs, 900);
}

#[test]
fn sync_target_without_server_is_not_configured() {
    if std::env::var_os("TODOSYNC_SERVER").is_some() {
        return;
    }
    let error = sync_target_for_profile("default".to_string(), &CliProfile::default()).unwrap_err();
    assert!(matches!(error, CliError::SyncNotConfigured));
}

#[test]
fn sync_target_picks_credentials_from_profile() {
    if std::env::var_os("TODOSYNC_SERVER").is_some() || std::env::var_os("TODOSYNC_TOKEN").is_some()
    {
        return;
    }

    let anonymous = sync_target_for_profile(
        "home".to_string(),
        &CliProfile {
            server: Some("http://localhost:3000".to_string()),
            ..CliProfile::default()
        },
    )
    .unwrap();
    assert!(anonymous.account.is_none());
    assert!(matches!(
        anonymous.credentials,
        ProfileCredentials::Anonymous(_)
    ));

    let with_token = sync_target_for_profile(
        "home".to_string(),
        &CliProfile {
            server: Some("todo.example.com".to_string()),
            access_token: Some("tok".to_string()),
            ..CliProfile::default()
        },
    )
    .unwrap();
    assert_eq!(with_token.base_url, "https://todo.example.com");
    assert_eq!(with_token.account.unwrap().name, "home");
    assert!(matches!(
        with_token.credentials,
        ProfileCredentials::Static(_)
    ));
}

#[test]
fn sync_report_formatting_mentions_credentials() {
    let report = SyncReport {
        auth_errors: 1,
        invalid_credentials: true,
        ..SyncReport::default()
    };
    let rendered = format_sync_report(&report);
    assert!(rendered.starts_with("Sync error:"));
    assert!(rendered.contains("rejected the configured credentials"));
}
