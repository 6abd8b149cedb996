//! End-to-end: instruction → model → interpreter → hand-off → resume.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use pacs_voice_core::command::{FilterParams, RotateDirection};
use pacs_voice_core::config::{EngineConfig, SequencingConfig};
use pacs_voice_core::entity::{Study, StudyCatalog};
use pacs_voice_core::handoff::Readiness;
use pacs_voice_core::model::LanguageModel;
use pacs_voice_core::surface::{Action, Navigation, RecordingSink};
use pacs_voice_core::{Flow, Session, Surface};

/// Replies with canned responses in order.
struct Canned(Mutex<VecDeque<String>>);

impl Canned {
    fn new(replies: &[&str]) -> Self {
        Self(Mutex::new(replies.iter().map(|r| r.to_string()).collect()))
    }
}

impl LanguageModel for Canned {
    fn generate(
        &self,
        _prompt: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<String>> + Send + '_>> {
        let next = self.0.lock().unwrap().pop_front();
        Box::pin(async move { next.ok_or_else(|| anyhow::anyhow!("out of replies")) })
    }

    fn name(&self) -> String {
        "canned".into()
    }
}

fn setup(replies: &[&str]) -> (Arc<RecordingSink>, Session) {
    let config = EngineConfig {
        sequencing: SequencingConfig::immediate(),
        ..Default::default()
    };
    let page = vec![
        Study::new("1.2.840.1", "Neptune"),
        Study::new("1.2.840.2", "Horse"),
    ];
    let sink = Arc::new(RecordingSink::with_visible(page.clone()));
    let catalog = StudyCatalog::new();
    catalog.replace(page.clone(), page);
    let session = Session::new(
        &config,
        sink.clone(),
        Some(Arc::new(Canned::new(replies))),
        catalog,
    );
    (sink, session)
}

fn query(nav: &Navigation) -> String {
    nav.url
        .split_once('?')
        .map(|(_, q)| format!("?{q}"))
        .unwrap_or_default()
}

#[tokio::test]
async fn list_hands_off_remaining_steps_to_viewer_once() {
    let (sink, session) = setup(&[r#"{
        "command": "run_sequence",
        "steps": [
            { "command": "open_study_index", "index": 2 },
            { "command": "rotate_view", "direction": "right", "angle": 180 },
            { "command": "play_cine" }
        ]
    }"#]);

    let flow = session
        .handle_instruction(Surface::List, "open the second one, flip it and play")
        .await
        .unwrap();
    let Flow::Navigated(nav) = flow else {
        panic!("expected navigation, got {flow:?}");
    };
    assert_eq!(nav.surface, Surface::Viewer);
    assert_eq!(nav.study_instance_uid.as_deref(), Some("1.2.840.2"));
    assert!(nav.pending_commands.is_some());
    assert!(nav.url.starts_with("/viewer/dicomweb?"));
    assert_eq!(
        sink.take(),
        vec![(Surface::List, Action::Navigate(nav.clone()))]
    );

    let search = query(&nav);
    let flow = session
        .mount(Surface::Viewer, &search, &Readiness::fixed())
        .await
        .unwrap();
    assert_eq!(flow, Flow::Completed);
    assert_eq!(
        sink.take(),
        vec![
            (Surface::Viewer, Action::ClearPending),
            (Surface::Viewer, Action::RotateStep { direction: RotateDirection::Right }),
            (Surface::Viewer, Action::RotateStep { direction: RotateDirection::Right }),
            (Surface::Viewer, Action::SetCine { playing: true }),
        ]
    );

    // A remount with the same query must not replay anything.
    session
        .mount(Surface::Viewer, &search, &Readiness::fixed())
        .await
        .unwrap();
    assert!(sink.take().is_empty());
}

#[tokio::test]
async fn viewer_sends_list_steps_back() {
    let (sink, session) = setup(&[r#"{
        "command": "run_sequence",
        "steps": [
            { "command": "reset_view" },
            { "command": "filter", "patientName": "Kim" }
        ]
    }"#]);

    let Flow::Navigated(nav) = session
        .handle_instruction(Surface::Viewer, "reset and then show me Kim's studies")
        .await
        .unwrap()
    else {
        panic!("expected navigation");
    };
    assert_eq!(nav.surface, Surface::List);
    assert_eq!(
        sink.take(),
        vec![
            (Surface::Viewer, Action::ResetView),
            (Surface::Viewer, Action::Navigate(nav.clone())),
        ]
    );

    session
        .mount(Surface::List, &query(&nav), &Readiness::fixed())
        .await
        .unwrap();
    assert_eq!(
        sink.take(),
        vec![
            (Surface::List, Action::ClearPending),
            (
                Surface::List,
                Action::ApplyFilter(FilterParams {
                    patient_name: Some("Kim".into()),
                    ..Default::default()
                })
            ),
        ]
    );
}

#[tokio::test]
async fn spoken_macro_is_recorded_then_replayed() {
    let (sink, session) = setup(&[
        r#"{"command":"define_macro","macroName":"triage","steps":[
            {"command":"clear_filters"},
            {"command":"sort","sortBy":"studyDate","sortDirection":"descending"}
        ]}"#,
        r#"{"command":"perform_macro","macroName":"triage"}"#,
    ]);

    session
        .handle_instruction(Surface::List, "remember triage as clear filters then newest first")
        .await
        .unwrap();
    assert!(sink.take().is_empty());

    session
        .handle_instruction(Surface::List, "do triage")
        .await
        .unwrap();
    let kinds: Vec<Action> = sink.take().into_iter().map(|(_, a)| a).collect();
    assert_eq!(kinds.len(), 2);
    assert_eq!(kinds[0], Action::ClearFilters);
}
