//! Terminal rendering and line input for the CLI.

use crate::scene::{PacingPoint, Scene, SceneStatus, ScriptAnalysisResult};
use std::fmt::Write as _;
use std::io::{self, BufRead, Write};

const CHART_WIDTH: usize = 40;

/// Print `prompt` to stderr and read one line from stdin. `None` on EOF.
pub async fn prompt_line(prompt: &str) -> io::Result<Option<String>> {
    let prompt = prompt.to_string();
    tokio::task::spawn_blocking(move || {
        let mut stderr = io::stderr();
        write!(stderr, "{}", prompt)?;
        stderr.flush()?;

        let mut line = String::new();
        let read = io::stdin().lock().read_line(&mut line)?;
        if read == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
    })
    .await
    .map_err(io::Error::other)?
}

/// Horizontal bar per pacing point, scaled to 100.
pub fn pacing_chart(points: &[PacingPoint]) -> String {
    let label_width = points
        .iter()
        .map(|p| p.label.chars().count())
        .max()
        .unwrap_or(0);

    let mut out = String::new();
    for point in points {
        let filled = (point.value as usize * CHART_WIDTH).div_ceil(100);
        let _ = writeln!(
            out,
            "{:<width$} | {}{} {:>3}",
            point.label,
            "█".repeat(filled),
            " ".repeat(CHART_WIDTH - filled),
            point.value,
            width = label_width
        );
    }
    out
}

pub fn scene_line(scene: &Scene) -> String {
    let marker = match scene.status() {
        SceneStatus::Idle => "[ ]",
        SceneStatus::Generating => "[~]",
        SceneStatus::Succeeded => "[x]",
        SceneStatus::Failed => "[!]",
    };

    let mut line = format!(
        "{} SHOT {:<3} {}",
        marker, scene.scene_number, scene.description
    );
    if let Some(error) = &scene.error {
        let _ = write!(line, "  ({})", error);
    }
    line
}

pub fn render_analysis(analysis: &ScriptAnalysisResult) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", analysis.title);
    let _ = writeln!(
        out,
        "Genre: {} | {} scenes",
        analysis.genre,
        analysis.scenes.len()
    );

    if !analysis.pacing.is_empty() {
        let _ = writeln!(out, "\nPacing");
        out.push_str(&pacing_chart(&analysis.pacing));
    }

    let _ = writeln!(out, "\nScenes");
    for scene in &analysis.scenes {
        let _ = writeln!(out, "{}", scene_line(scene));
        let _ = writeln!(out, "      camera: {}", scene.visual_prompt);
        if let Some(dialogue) = &scene.dialogue_preview {
            let _ = writeln!(out, "      \"{}\"", dialogue);
        }
    }
    out
}
