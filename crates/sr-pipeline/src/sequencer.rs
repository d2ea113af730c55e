//! Slide-audio sequencing.
//!
//! Visuals and narration carry their slide index in the file name
//! (`slide_07.png`, `slide_7.mp3`). [`parse_slide_index`] extracts it,
//! [`plan`] pairs and orders the two sets, and [`scan`] feeds [`plan`] from
//! the job's directories.
//!
//! Pairing rules:
//!
//! - an indexed visual pairs with the narration of equal index;
//! - an unindexed visual pairs with the narration of identical file stem;
//! - a clip with no narration keeps its embedded audio;
//! - a still image with no narration is skipped;
//! - when a clip and an image share an index, the clip wins; unindexed
//!   visuals sharing a file stem follow the same rule.
//!
//! Entries are ordered by index ascending; unindexed entries follow, ordered
//! by file name.

use std::collections::{BTreeMap, BTreeSet};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use serde::Serialize;
use sr_core::error::SegmentLabel;
use sr_core::{Error, Result};

const SLIDE_MARKER: &str = "slide_";

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "webp"];
const CLIP_EXTENSIONS: &[&str] = &["mp4", "mov", "m4v", "mkv", "webm", "avi"];
const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "m4a", "aac", "ogg", "flac", "mp4"];

/// Extract the slide index from a file name.
///
/// The index is the first run of ASCII digits after the first `slide_`
/// marker (matched case-insensitively). Names without a marker, without
/// digits after it, or with an index that overflows `u32` yield `None`.
///
/// ```
/// use sr_pipeline::parse_slide_index;
/// assert_eq!(parse_slide_index("slide_07.png"), Some(7));
/// assert_eq!(parse_slide_index("Slide_3_anim.mp4"), Some(3));
/// assert_eq!(parse_slide_index("cover.png"), None);
/// ```
pub fn parse_slide_index(name: &str) -> Option<u32> {
    let lower = name.to_ascii_lowercase();
    let start = lower.find(SLIDE_MARKER)? + SLIDE_MARKER.len();
    let rest = &lower[start..];
    let digits_at = rest.find(|c: char| c.is_ascii_digit())?;
    let digits: String = rest[digits_at..]
        .chars()
        .take_while(char::is_ascii_digit)
        .collect();
    digits.parse().ok()
}

/// How a visual contributes its picture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VisualKind {
    /// Static image held for the narration's duration.
    Image,
    /// Pre-rendered animation clip with an intrinsic duration.
    Clip,
}

/// Classify a visual file by extension.
pub fn classify_visual(path: &Path) -> Option<VisualKind> {
    let ext = lowercase_extension(path)?;
    if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
        Some(VisualKind::Image)
    } else if CLIP_EXTENSIONS.contains(&ext.as_str()) {
        Some(VisualKind::Clip)
    } else {
        None
    }
}

/// Whether a file is a narration candidate by extension.
pub fn is_audio(path: &Path) -> bool {
    lowercase_extension(path).is_some_and(|ext| AUDIO_EXTENSIONS.contains(&ext.as_str()))
}

fn lowercase_extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(OsStr::to_str)
        .map(str::to_ascii_lowercase)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// A discovered visual file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Visual {
    pub index: Option<u32>,
    pub path: PathBuf,
    pub kind: VisualKind,
}

impl Visual {
    /// Classify and index `path`; `None` for non-visual files.
    pub fn from_path(path: PathBuf) -> Option<Self> {
        let kind = classify_visual(&path)?;
        let index = parse_slide_index(&file_name(&path));
        Some(Self { index, path, kind })
    }
}

/// A discovered narration file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Narration {
    pub index: Option<u32>,
    pub path: PathBuf,
}

impl Narration {
    /// Index `path`; `None` for non-audio files.
    pub fn from_path(path: PathBuf) -> Option<Self> {
        if !is_audio(&path) {
            return None;
        }
        let index = parse_slide_index(&file_name(&path));
        Some(Self { index, path })
    }
}

/// Audio source chosen for a sequenced segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "source", content = "path", rename_all = "snake_case")]
pub enum SegmentAudio {
    /// Synthesized narration for this slide.
    Narration(PathBuf),
    /// The clip's own audio (or silence if it has none).
    Embedded,
}

/// One ordered slide contribution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SequenceEntry {
    pub index: Option<u32>,
    pub visual: PathBuf,
    pub kind: VisualKind,
    pub audio: SegmentAudio,
}

impl SequenceEntry {
    pub fn label(&self) -> SegmentLabel {
        SegmentLabel(self.index)
    }

    /// Whether this entry proceeds without narration.
    pub fn uses_embedded_audio(&self) -> bool {
        self.audio == SegmentAudio::Embedded
    }
}

/// Why a visual was left out of the sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// A static image has nothing to set its duration.
    StaticImageWithoutAudio,
    /// Another visual with the same index (or, unindexed, the same file
    /// stem) was preferred.
    DuplicateIndex,
}

/// A visual excluded from the sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedVisual {
    pub index: Option<u32>,
    pub path: PathBuf,
    pub reason: SkipReason,
}

/// Result of sequencing a job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SequencePlan {
    pub entries: Vec<SequenceEntry>,
    pub skipped: Vec<SkippedVisual>,
}

impl SequencePlan {
    pub fn indices(&self) -> Vec<Option<u32>> {
        self.entries.iter().map(|e| e.index).collect()
    }
}

/// Ordering key: indexed entries ascending, then unindexed by file name.
fn order_key(index: Option<u32>, path: &Path) -> (bool, u32, String) {
    (index.is_none(), index.unwrap_or(u32::MAX), file_name(path))
}

/// Pair and order visuals with narration.
///
/// # Errors
///
/// [`Error::NoMatchableContent`] when there are no visuals, or when no visual
/// pairs with any narration.
pub fn plan(mut visuals: Vec<Visual>, mut narrations: Vec<Narration>) -> Result<SequencePlan> {
    if visuals.is_empty() {
        return Err(Error::NoMatchableContent("no visual segments found".into()));
    }

    visuals.sort_by(|a, b| {
        order_key(a.index, &a.path)
            .cmp(&order_key(b.index, &b.path))
            // Clips sort ahead of images sharing an index so they win the slot.
            .then_with(|| (a.kind == VisualKind::Image).cmp(&(b.kind == VisualKind::Image)))
    });
    narrations.sort_by(|a, b| order_key(a.index, &a.path).cmp(&order_key(b.index, &b.path)));

    let mut by_index: BTreeMap<u32, PathBuf> = BTreeMap::new();
    let mut by_stem: BTreeMap<String, PathBuf> = BTreeMap::new();
    for n in narrations {
        match n.index {
            Some(i) => {
                if by_index.contains_key(&i) {
                    tracing::warn!(index = i, path = %n.path.display(), "Duplicate narration for slide; keeping the first");
                } else {
                    by_index.insert(i, n.path);
                }
            }
            None => {
                by_stem.entry(file_stem(&n.path)).or_insert(n.path);
            }
        }
    }

    let clip_stems: BTreeSet<String> = visuals
        .iter()
        .filter(|v| v.index.is_none() && v.kind == VisualKind::Clip)
        .map(|v| file_stem(&v.path))
        .collect();

    let mut out = SequencePlan::default();
    let mut last_index: Option<u32> = None;
    let mut seen_stems: BTreeSet<String> = BTreeSet::new();

    for visual in visuals {
        let duplicate = match visual.index {
            Some(i) => last_index.replace(i) == Some(i),
            None => {
                let stem = file_stem(&visual.path);
                (visual.kind == VisualKind::Image && clip_stems.contains(&stem))
                    || !seen_stems.insert(stem)
            }
        };
        if duplicate {
            tracing::warn!(index = ?visual.index, path = %visual.path.display(), "Duplicate visual for slide; skipped");
            out.skipped.push(SkippedVisual {
                index: visual.index,
                path: visual.path,
                reason: SkipReason::DuplicateIndex,
            });
            continue;
        }

        let narration = match visual.index {
            Some(i) => by_index.get(&i).cloned(),
            None => by_stem.get(&file_stem(&visual.path)).cloned(),
        };

        let audio = match (narration, visual.kind) {
            (Some(path), _) => SegmentAudio::Narration(path),
            (None, VisualKind::Clip) => {
                tracing::info!(index = ?visual.index, path = %visual.path.display(), "Clip has no narration; using embedded audio");
                SegmentAudio::Embedded
            }
            (None, VisualKind::Image) => {
                tracing::warn!(index = ?visual.index, path = %visual.path.display(), "Static slide has no narration; skipped");
                out.skipped.push(SkippedVisual {
                    index: visual.index,
                    path: visual.path,
                    reason: SkipReason::StaticImageWithoutAudio,
                });
                continue;
            }
        };

        out.entries.push(SequenceEntry {
            index: visual.index,
            visual: visual.path,
            kind: visual.kind,
            audio,
        });
    }

    if !out.entries.iter().any(|e| !e.uses_embedded_audio()) {
        return Err(Error::NoMatchableContent(
            "no visual segment pairs with any narration".into(),
        ));
    }

    Ok(out)
}

/// List regular files in `dir`, sorted by name. A missing directory is empty.
async fn list_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(rd) => rd,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(dir = %dir.display(), "Directory does not exist");
            return Ok(Vec::new());
        }
        Err(e) => return Err(e.into()),
    };

    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

/// Scan the job's visual and narration directories and build the plan.
pub async fn scan(visual_dir: &Path, audio_dir: &Path) -> Result<SequencePlan> {
    let visuals: Vec<Visual> = list_files(visual_dir)
        .await?
        .into_iter()
        .filter_map(Visual::from_path)
        .collect();
    let narrations: Vec<Narration> = list_files(audio_dir)
        .await?
        .into_iter()
        .filter_map(Narration::from_path)
        .collect();

    tracing::debug!(
        visuals = visuals.len(),
        narrations = narrations.len(),
        "Scanned job inputs"
    );

    plan(visuals, narrations)
}
