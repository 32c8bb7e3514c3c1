use super::*;
use crate::credentials::MockCredentialProvider;
use crate::image::{MockSceneImageGenerator, NO_IMAGE_DATA};
use crate::scene::{PacingPoint, SceneStatus};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

fn scene(number: u32, prompt: &str) -> Scene {
    Scene::new(number, format!("Scene {number}"), prompt.to_string(), None)
}

fn analysis(scenes: Vec<Scene>) -> ScriptAnalysisResult {
    ScriptAnalysisResult {
        title: "The Office".into(),
        genre: "Drama".into(),
        pacing: vec![PacingPoint {
            label: "Opening".into(),
            value: 40,
        }],
        scenes,
    }
}

fn loaded(scenes: Vec<Scene>) -> (StoryboardState, Vec<SceneId>) {
    let mut state = StoryboardState::default();
    let analysis = analysis(scenes);
    let ids = analysis.scene_ids();
    state.load_analysis(analysis);
    (state, ids)
}

fn key_selected() -> MockCredentialProvider {
    let mut credentials = MockCredentialProvider::new();
    credentials
        .expect_has_selected_credential()
        .returning(|| true);
    credentials
}

/// Records call order and how many calls overlap.
#[derive(Default)]
struct RecordingGenerator {
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

#[async_trait]
impl SceneImageGenerator for RecordingGenerator {
    async fn generate_image(
        &self,
        visual_prompt: &str,
        _size: ImageSize,
        _genre: &str,
    ) -> crate::error::Result<String> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(visual_prompt.to_string());

        tokio::time::sleep(Duration::from_millis(10)).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(format!("data:image/png;base64,{}", visual_prompt.len()))
    }
}

#[test]
fn begin_generation_marks_scene_and_clears_error() {
    let failed = scene(1, "wide").into_failed("old error".into());
    let (mut state, ids) = loaded(vec![failed]);

    let job = state.begin_generation(ids[0]).unwrap();
    assert_eq!(job.visual_prompt, "wide");
    assert_eq!(job.genre, "Drama");
    assert_eq!(job.size, ImageSize::OneK);

    let scene = state.scene(ids[0]).unwrap();
    assert!(scene.is_generating);
    assert!(scene.error.is_none());

    // Already in flight.
    assert!(state.begin_generation(ids[0]).is_none());
}

#[test]
fn completion_sets_exactly_one_of_image_or_error() {
    let (mut state, ids) = loaded(vec![scene(1, "a"), scene(2, "b")]);

    state.begin_generation(ids[0]);
    let outcome = state.complete_generation(ids[0], Ok("data:image/png;base64,AA".into()));
    assert_eq!(outcome, GenerationOutcome::Succeeded);
    let done = state.scene(ids[0]).unwrap();
    assert!(!done.is_generating);
    assert!(done.image_url.is_some());
    assert!(done.error.is_none());

    state.begin_generation(ids[1]);
    state.complete_generation(
        ids[1],
        Err(StoryboardError::ImageGenerationFailure("quota".into())),
    );
    let failed = state.scene(ids[1]).unwrap();
    assert!(!failed.is_generating);
    assert!(failed.image_url.is_none());
    assert_eq!(failed.error.as_deref(), Some("Image generation failed: quota"));
}

#[tokio::test]
async fn scenario_b_no_image_data_fails_scene() {
    let (mut state, ids) = loaded(vec![scene(1, "wide")]);

    let mut images = MockSceneImageGenerator::new();
    images.expect_generate_image().times(1).returning(|_, _, _| {
        Err(StoryboardError::ImageGenerationFailure(
            NO_IMAGE_DATA.to_string(),
        ))
    });
    let mut credentials = key_selected();
    credentials.expect_select_credential().never();

    let outcome = state
        .request_single_generation(ids[0], &images, &credentials)
        .await;
    assert!(matches!(outcome, GenerationOutcome::Failed(ref m) if m.contains("no image data")));

    let scene = state.scene(ids[0]).unwrap();
    assert_eq!(scene.status(), SceneStatus::Failed);
    assert!(!scene.is_generating);
    assert!(scene.error.as_deref().unwrap().contains("no image data"));
}

#[tokio::test]
async fn authorization_failure_prompts_for_credentials() {
    let (mut state, ids) = loaded(vec![scene(1, "wide")]);

    let mut images = MockSceneImageGenerator::new();
    images.expect_generate_image().returning(|_, _, _| {
        Err(StoryboardError::AuthorizationRequired(
            "Requested entity was not found.".into(),
        ))
    });
    let mut credentials = key_selected();
    credentials
        .expect_select_credential()
        .times(1)
        .returning(|| true);

    let outcome = state
        .request_single_generation(ids[0], &images, &credentials)
        .await;
    assert_eq!(outcome, GenerationOutcome::AuthorizationRequired);

    let scene = state.scene(ids[0]).unwrap();
    assert_eq!(scene.error.as_deref(), Some(REAUTHORIZE_MESSAGE));
    assert!(!scene.is_generating);
}

#[tokio::test]
async fn declined_reselection_is_reported() {
    let (mut state, ids) = loaded(vec![scene(1, "wide")]);

    let mut images = MockSceneImageGenerator::new();
    images.expect_generate_image().returning(|_, _, _| {
        Err(StoryboardError::AuthorizationRequired(
            "Requested entity was not found.".into(),
        ))
    });
    let mut credentials = key_selected();
    credentials
        .expect_select_credential()
        .times(1)
        .returning(|| false);

    let outcome = state
        .request_single_generation(ids[0], &images, &credentials)
        .await;
    assert_eq!(outcome, GenerationOutcome::ReauthorizationDeclined);
    assert_eq!(
        state.scene(ids[0]).unwrap().error.as_deref(),
        Some(REAUTHORIZE_MESSAGE)
    );
}

#[tokio::test]
async fn generate_all_stops_when_rejected_key_is_not_replaced() {
    let (mut state, ids) = loaded(vec![scene(1, "a"), scene(2, "b"), scene(3, "c")]);

    let mut images = MockSceneImageGenerator::new();
    images.expect_generate_image().times(1).returning(|_, _, _| {
        Err(StoryboardError::AuthorizationRequired(
            "Requested entity was not found.".into(),
        ))
    });
    let mut credentials = key_selected();
    credentials
        .expect_select_credential()
        .times(1)
        .returning(|| false);

    let summary = state.request_generate_all(&images, &credentials).await;
    assert_eq!(
        summary,
        GenerateAllSummary {
            succeeded: 0,
            failed: 1,
            skipped: 0,
            aborted: true,
        }
    );
    assert_eq!(state.scene(ids[1]).unwrap().status(), SceneStatus::Idle);
    assert_eq!(state.scene(ids[2]).unwrap().status(), SceneStatus::Idle);
}

#[tokio::test]
async fn generic_failure_does_not_prompt() {
    let (mut state, ids) = loaded(vec![scene(1, "wide")]);

    let mut images = MockSceneImageGenerator::new();
    images.expect_generate_image().returning(|_, _, _| {
        Err(StoryboardError::ImageGenerationFailure(
            "Internal error encountered.".into(),
        ))
    });
    let mut credentials = key_selected();
    credentials.expect_select_credential().never();

    let outcome = state
        .request_single_generation(ids[0], &images, &credentials)
        .await;
    assert!(matches!(outcome, GenerationOutcome::Failed(_)));
    assert_ne!(
        state.scene(ids[0]).unwrap().error.as_deref(),
        Some(REAUTHORIZE_MESSAGE)
    );
}

#[tokio::test]
async fn missing_credential_leaves_scene_untouched() {
    let (mut state, ids) = loaded(vec![scene(1, "wide").into_failed("earlier".into())]);

    let mut images = MockSceneImageGenerator::new();
    images.expect_generate_image().never();
    let mut credentials = MockCredentialProvider::new();
    credentials
        .expect_has_selected_credential()
        .returning(|| false);
    credentials
        .expect_select_credential()
        .times(1)
        .returning(|| false);

    let outcome = state
        .request_single_generation(ids[0], &images, &credentials)
        .await;
    assert_eq!(outcome, GenerationOutcome::CredentialNotSelected);

    let scene = state.scene(ids[0]).unwrap();
    assert!(!scene.is_generating);
    assert_eq!(scene.error.as_deref(), Some("earlier"));
}

#[tokio::test]
async fn generating_scene_is_not_requested_again() {
    let (mut state, ids) = loaded(vec![scene(1, "wide")]);
    state.begin_generation(ids[0]);

    let mut images = MockSceneImageGenerator::new();
    images.expect_generate_image().never();
    let mut credentials = MockCredentialProvider::new();
    credentials.expect_has_selected_credential().never();

    let outcome = state
        .request_single_generation(ids[0], &images, &credentials)
        .await;
    assert_eq!(outcome, GenerationOutcome::Skipped);
}

#[tokio::test]
async fn regeneration_replaces_previous_frame() {
    let (mut state, ids) = loaded(vec![scene(1, "wide").into_succeeded("data:old".into())]);

    let mut images = MockSceneImageGenerator::new();
    images
        .expect_generate_image()
        .returning(|_, _, _| Ok("data:new".into()));
    let credentials = key_selected();

    state
        .request_single_generation(ids[0], &images, &credentials)
        .await;
    assert_eq!(
        state.scene(ids[0]).unwrap().image_url.as_deref(),
        Some("data:new")
    );
}

#[tokio::test]
async fn scenario_c_generate_all_is_sequential_and_skips_done_scenes() {
    let (mut state, _) = loaded(vec![
        scene(1, "first"),
        scene(2, "already done").into_succeeded("data:done".into()),
        scene(3, "third"),
    ]);

    let images = RecordingGenerator::default();
    let credentials = key_selected();

    let summary = state.request_generate_all(&images, &credentials).await;
    assert_eq!(
        summary,
        GenerateAllSummary {
            succeeded: 2,
            failed: 0,
            skipped: 1,
            aborted: false,
        }
    );

    assert_eq!(*images.prompts.lock().unwrap(), ["first", "third"]);
    assert_eq!(images.max_in_flight.load(Ordering::SeqCst), 1);

    let analysis = state.analysis().unwrap();
    assert!(analysis.scenes.iter().all(Scene::has_image));
    assert_eq!(analysis.scenes[1].image_url.as_deref(), Some("data:done"));
}

#[tokio::test]
async fn generate_all_twice_does_not_regenerate() {
    let (mut state, _) = loaded(vec![scene(1, "a"), scene(2, "b")]);

    let mut images = MockSceneImageGenerator::new();
    images
        .expect_generate_image()
        .times(2)
        .returning(|prompt, _, _| Ok(format!("data:image/png;base64,{prompt}")));
    let credentials = key_selected();

    let first = state.request_generate_all(&images, &credentials).await;
    assert_eq!(first.succeeded, 2);

    let second = state.request_generate_all(&images, &credentials).await;
    assert_eq!(second.succeeded, 0);
    assert_eq!(second.skipped, 2);
}

#[tokio::test]
async fn generate_all_continues_past_failures() {
    let (mut state, ids) = loaded(vec![scene(1, "bad"), scene(2, "good")]);

    let mut images = MockSceneImageGenerator::new();
    images.expect_generate_image().times(2).returning(|prompt, _, _| {
        if prompt == "bad" {
            Err(StoryboardError::ImageGenerationFailure("blocked".into()))
        } else {
            Ok("data:image/png;base64,AA".into())
        }
    });
    let credentials = key_selected();

    let summary = state.request_generate_all(&images, &credentials).await;
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.succeeded, 1);
    assert_eq!(state.scene(ids[0]).unwrap().status(), SceneStatus::Failed);
    assert_eq!(state.scene(ids[1]).unwrap().status(), SceneStatus::Succeeded);
}

#[tokio::test]
async fn generate_all_stops_without_credentials() {
    let (mut state, _) = loaded(vec![scene(1, "a"), scene(2, "b")]);

    let mut images = MockSceneImageGenerator::new();
    images.expect_generate_image().never();
    let mut credentials = MockCredentialProvider::new();
    credentials
        .expect_has_selected_credential()
        .returning(|| false);
    credentials
        .expect_select_credential()
        .times(1)
        .returning(|| false);

    let summary = state.request_generate_all(&images, &credentials).await;
    assert!(summary.aborted);
    assert_eq!(summary.succeeded + summary.failed, 0);
}

#[tokio::test]
async fn generate_all_without_project_does_nothing() {
    let mut state = StoryboardState::default();
    let mut images = MockSceneImageGenerator::new();
    images.expect_generate_image().never();
    let credentials = MockCredentialProvider::new();

    let summary = state.request_generate_all(&images, &credentials).await;
    assert_eq!(summary, GenerateAllSummary::default());
}

#[tokio::test]
async fn requested_size_is_forwarded() {
    let (mut state, ids) = loaded(vec![scene(1, "wide")]);
    state.set_image_size(ImageSize::FourK);

    let mut images = MockSceneImageGenerator::new();
    images
        .expect_generate_image()
        .withf(|prompt, size, genre| {
            prompt.to_string() == "wide" && *size == ImageSize::FourK && genre.to_string() == "Drama"
        })
        .times(1)
        .returning(|_, _, _| Ok("data:image/png;base64,AA".into()));
    let credentials = key_selected();

    let outcome = state
        .request_single_generation(ids[0], &images, &credentials)
        .await;
    assert_eq!(outcome, GenerationOutcome::Succeeded);
}

#[test]
fn abandon_project_discards_everything() {
    let (mut state, ids) = loaded(vec![scene(1, "a")]);
    state.abandon_project();

    assert!(state.analysis().is_none());
    assert!(state.scene(ids[0]).is_none());
    assert!(state.begin_generation(ids[0]).is_none());
}

#[test]
fn loading_a_new_analysis_replaces_the_old_one() {
    let (mut state, old_ids) = loaded(vec![scene(1, "a")]);
    let replacement = analysis(vec![scene(1, "b")]);
    let new_id = replacement.scenes[0].id;
    state.load_analysis(replacement);

    assert!(state.scene(old_ids[0]).is_none());
    assert_eq!(state.scene(new_id).unwrap().visual_prompt, "b");
}
