//! Generative transformation catalogue and typed configuration
//!
//! Each operation the hosting provider offers gets its own fragment type.
//! A [`TransformationConfig`] holds at most one fragment per kind, and
//! [`merge_config`] folds freshly edited fragments into the accumulated
//! config field by field.

use crate::types::Dimensions;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Known transformation operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TransformationKind {
    Restore,
    RemoveBackground,
    Fill,
    Remove,
    Replace,
    Recolor,
}

impl TransformationKind {
    pub const ALL: [Self; 6] = [
        Self::Restore,
        Self::RemoveBackground,
        Self::Fill,
        Self::Remove,
        Self::Replace,
        Self::Recolor,
    ];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Restore => "restore",
            Self::RemoveBackground => "removeBackground",
            Self::Fill => "fill",
            Self::Remove => "remove",
            Self::Replace => "replace",
            Self::Recolor => "recolor",
        }
    }

    #[must_use]
    pub fn title(&self) -> &'static str {
        match self {
            Self::Restore => "Restore Image",
            Self::RemoveBackground => "Background Replacement",
            Self::Fill => "Generative Fill",
            Self::Remove => "Object Remove",
            Self::Replace => "Object Replace",
            Self::Recolor => "Object Recolor",
        }
    }

    #[must_use]
    pub fn subtitle(&self) -> &'static str {
        match self {
            Self::Restore => "Refine images by removing noise and imperfections.",
            Self::RemoveBackground => {
                "Removes the background of the image using AI and merges it with the new background."
            },
            Self::Fill => "Enhance an image's dimensions using AI outpainting.",
            Self::Remove => "Identify and eliminate objects from images.",
            Self::Replace => {
                "Identify and eliminate objects from images and replace them with new objects."
            },
            Self::Recolor => "Identify and recolor objects from the image.",
        }
    }

    /// Credits charged when a transformed image is saved
    #[must_use]
    pub fn credit_cost(&self) -> u32 {
        match self {
            Self::RemoveBackground => 5,
            _ => 1,
        }
    }

    /// Fragment a fresh form starts from
    #[must_use]
    pub fn default_config(&self) -> TransformationConfig {
        let mut config = TransformationConfig::default();
        match self {
            Self::Restore => config.restore = Some(RestoreFragment { improve: Some(100) }),
            Self::RemoveBackground => config.remove_background = Some(RemoveBackgroundFragment {}),
            Self::Fill => config.fill = Some(FillFragment::default()),
            Self::Remove => {
                config.remove = Some(RemoveFragment {
                    prompt: Some(String::new()),
                    remove_shadow: Some(true),
                    multiple: Some(true),
                });
            },
            Self::Replace => {
                config.replace = Some(ReplaceFragment {
                    from: Some(String::new()),
                    to: Some(String::new()),
                    preserve_geometry: Some(true),
                });
            },
            Self::Recolor => {
                config.recolor = Some(RecolorFragment {
                    prompt: Some(String::new()),
                    to: Some(String::new()),
                    multiple: Some(true),
                });
            },
        }
        config
    }
}

impl fmt::Display for TransformationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransformationKind {
    type Err = crate::error::ImaginariumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| {
                crate::error::ImaginariumError::invalid_request(format!(
                    "unknown transformation type: {s}"
                ))
            })
    }
}

/// Output sizes offered by generative fill
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AspectRatio {
    #[serde(rename = "1:1")]
    Square,
    #[serde(rename = "3:4")]
    StandardPortrait,
    #[serde(rename = "16:9")]
    Landscape,
    #[serde(rename = "9:16")]
    PhonePortrait,
}

impl AspectRatio {
    pub const ALL: [Self; 4] = [
        Self::Square,
        Self::StandardPortrait,
        Self::Landscape,
        Self::PhonePortrait,
    ];

    #[must_use]
    pub fn key(&self) -> &'static str {
        match self {
            Self::Square => "1:1",
            Self::StandardPortrait => "3:4",
            Self::Landscape => "16:9",
            Self::PhonePortrait => "9:16",
        }
    }

    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Square => "Square (1:1)",
            Self::StandardPortrait => "Standard Portrait (3:4)",
            Self::Landscape => "Landscape (16:9)",
            Self::PhonePortrait => "Phone Portrait (9:16)",
        }
    }

    #[must_use]
    pub fn dimensions(&self) -> Dimensions {
        match self {
            Self::Square => Dimensions::new(1000, 1000),
            Self::StandardPortrait => Dimensions::new(1000, 1334),
            Self::Landscape => Dimensions::new(1778, 1000),
            Self::PhonePortrait => Dimensions::new(1000, 1778),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreFragment {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub improve: Option<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveBackgroundFragment {}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FillFragment {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aspect_ratio: Option<AspectRatio>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveFragment {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remove_shadow: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub multiple: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplaceFragment {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preserve_geometry: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecolorFragment {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub multiple: Option<bool>,
}

/// Field-wise merge where the incoming side wins when it has a value
trait Merge {
    fn merge(self, incoming: Self) -> Self;
}

impl Merge for RestoreFragment {
    fn merge(self, incoming: Self) -> Self {
        Self {
            improve: incoming.improve.or(self.improve),
        }
    }
}

impl Merge for RemoveBackgroundFragment {
    fn merge(self, _incoming: Self) -> Self {
        self
    }
}

impl Merge for FillFragment {
    fn merge(self, incoming: Self) -> Self {
        Self {
            aspect_ratio: incoming.aspect_ratio.or(self.aspect_ratio),
        }
    }
}

impl Merge for RemoveFragment {
    fn merge(self, incoming: Self) -> Self {
        Self {
            prompt: incoming.prompt.or(self.prompt),
            remove_shadow: incoming.remove_shadow.or(self.remove_shadow),
            multiple: incoming.multiple.or(self.multiple),
        }
    }
}

impl Merge for ReplaceFragment {
    fn merge(self, incoming: Self) -> Self {
        Self {
            from: incoming.from.or(self.from),
            to: incoming.to.or(self.to),
            preserve_geometry: incoming.preserve_geometry.or(self.preserve_geometry),
        }
    }
}

impl Merge for RecolorFragment {
    fn merge(self, incoming: Self) -> Self {
        Self {
            prompt: incoming.prompt.or(self.prompt),
            to: incoming.to.or(self.to),
            multiple: incoming.multiple.or(self.multiple),
        }
    }
}

fn merge_slot<T: Merge>(current: Option<T>, incoming: Option<T>) -> Option<T> {
    match (current, incoming) {
        (Some(current), Some(incoming)) => Some(current.merge(incoming)),
        (current, incoming) => incoming.or(current),
    }
}

/// One fragment of any kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransformationFragment {
    Restore(RestoreFragment),
    RemoveBackground(RemoveBackgroundFragment),
    Fill(FillFragment),
    Remove(RemoveFragment),
    Replace(ReplaceFragment),
    Recolor(RecolorFragment),
}

impl TransformationFragment {
    #[must_use]
    pub fn kind(&self) -> TransformationKind {
        match self {
            Self::Restore(_) => TransformationKind::Restore,
            Self::RemoveBackground(_) => TransformationKind::RemoveBackground,
            Self::Fill(_) => TransformationKind::Fill,
            Self::Remove(_) => TransformationKind::Remove,
            Self::Replace(_) => TransformationKind::Replace,
            Self::Recolor(_) => TransformationKind::Recolor,
        }
    }
}

/// Accumulated per-operation configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformationConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restore: Option<RestoreFragment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remove_background: Option<RemoveBackgroundFragment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill: Option<FillFragment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remove: Option<RemoveFragment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replace: Option<ReplaceFragment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recolor: Option<RecolorFragment>,
}

impl TransformationConfig {
    /// Config holding a single fragment
    #[must_use]
    pub fn from_fragment(fragment: TransformationFragment) -> Self {
        let mut config = Self::default();
        config.insert(fragment);
        config
    }

    /// Set the slot for the fragment's kind, replacing what was there
    pub fn insert(&mut self, fragment: TransformationFragment) {
        match fragment {
            TransformationFragment::Restore(f) => self.restore = Some(f),
            TransformationFragment::RemoveBackground(f) => self.remove_background = Some(f),
            TransformationFragment::Fill(f) => self.fill = Some(f),
            TransformationFragment::Remove(f) => self.remove = Some(f),
            TransformationFragment::Replace(f) => self.replace = Some(f),
            TransformationFragment::Recolor(f) => self.recolor = Some(f),
        }
    }

    /// Kinds present in this config, in rendering order
    #[must_use]
    pub fn kinds(&self) -> Vec<TransformationKind> {
        let mut kinds = Vec::new();
        if self.restore.is_some() {
            kinds.push(TransformationKind::Restore);
        }
        if self.remove_background.is_some() {
            kinds.push(TransformationKind::RemoveBackground);
        }
        if self.fill.is_some() {
            kinds.push(TransformationKind::Fill);
        }
        if self.remove.is_some() {
            kinds.push(TransformationKind::Remove);
        }
        if self.replace.is_some() {
            kinds.push(TransformationKind::Replace);
        }
        if self.recolor.is_some() {
            kinds.push(TransformationKind::Recolor);
        }
        kinds
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.kinds().is_empty()
    }

    /// Deep-merge `incoming` over `self`
    #[must_use]
    pub fn merged_with(self, incoming: Self) -> Self {
        Self {
            restore: merge_slot(self.restore, incoming.restore),
            remove_background: merge_slot(self.remove_background, incoming.remove_background),
            fill: merge_slot(self.fill, incoming.fill),
            remove: merge_slot(self.remove, incoming.remove),
            replace: merge_slot(self.replace, incoming.replace),
            recolor: merge_slot(self.recolor, incoming.recolor),
        }
    }

    /// Render as the provider's effect segments followed by a size limit
    ///
    /// Generative fill pads to its aspect ratio's size when one is chosen,
    /// otherwise to `dimensions`.
    #[must_use]
    pub fn to_transformation(&self, dimensions: Dimensions) -> String {
        let mut segments = Vec::new();
        let mut size = dimensions;

        if let Some(restore) = &self.restore {
            segments.push("e_gen_restore".to_string());
            if let Some(improve) = restore.improve {
                segments.push(format!("e_improve:{improve}"));
            }
        }
        if self.remove_background.is_some() {
            segments.push("e_background_removal".to_string());
        }
        if let Some(fill) = &self.fill {
            if let Some(ratio) = fill.aspect_ratio {
                size = ratio.dimensions();
            }
            segments.push(format!(
                "b_gen_fill,c_pad,w_{},h_{}",
                size.width, size.height
            ));
        }
        if let Some(remove) = &self.remove {
            let mut params = vec![format!(
                "prompt_({})",
                escape_prompt(remove.prompt.as_deref().unwrap_or_default())
            )];
            if remove.multiple.unwrap_or(false) {
                params.push("multiple_true".to_string());
            }
            if remove.remove_shadow.unwrap_or(false) {
                params.push("remove-shadow_true".to_string());
            }
            segments.push(format!("e_gen_remove:{}", params.join(";")));
        }
        if let Some(replace) = &self.replace {
            let mut params = vec![
                format!(
                    "from_{}",
                    escape_prompt(replace.from.as_deref().unwrap_or_default())
                ),
                format!(
                    "to_{}",
                    escape_prompt(replace.to.as_deref().unwrap_or_default())
                ),
            ];
            if replace.preserve_geometry.unwrap_or(false) {
                params.push("preserve-geometry_true".to_string());
            }
            segments.push(format!("e_gen_replace:{}", params.join(";")));
        }
        if let Some(recolor) = &self.recolor {
            let color = recolor.to.as_deref().unwrap_or_default();
            let mut params = vec![
                format!(
                    "prompt_({})",
                    escape_prompt(recolor.prompt.as_deref().unwrap_or_default())
                ),
                format!("to-color_{}", escape_prompt(color.trim_start_matches('#'))),
            ];
            if recolor.multiple.unwrap_or(false) {
                params.push("multiple_true".to_string());
            }
            segments.push(format!("e_gen_recolor:{}", params.join(";")));
        }

        segments.push(format!("c_limit,w_{},h_{}", size.width, size.height));
        segments.join("/")
    }
}

/// Remove and replace share one provider action; the toggle picks which
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EditMode {
    #[default]
    Remove,
    Replace,
}

/// Merge an edited fragment set into the accumulated config
///
/// In replace mode any `remove` fragment is stale and dropped. In remove mode
/// a `replace` fragment is stale: it is dropped and the result carries a
/// `remove` fragment with the last entered prompt. Only applies to the
/// remove/replace pair; other kinds merge untouched.
#[must_use]
pub fn merge_config(
    current: Option<TransformationConfig>,
    incoming: TransformationConfig,
    mode: EditMode,
    last_prompt: &str,
) -> TransformationConfig {
    let mut current = current.unwrap_or_default();
    let mut incoming = incoming;

    match mode {
        EditMode::Replace => {
            current.remove = None;
            incoming.remove = None;
        },
        EditMode::Remove => {
            let had_replace = current.replace.take().is_some() | incoming.replace.take().is_some();
            if had_replace {
                let remove = incoming.remove.take().unwrap_or_default();
                incoming.remove = Some(RemoveFragment {
                    prompt: Some(last_prompt.to_string()),
                    ..remove
                });
            }
        },
    }

    current.merged_with(incoming)
}

/// Form-side state for a single generative transformation
///
/// Edits accumulate in `pending`; [`TransformationDraft::apply`] merges them
/// into `applied`, the config that is rendered and eventually saved.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformationDraft {
    kind: TransformationKind,
    mode: EditMode,
    prompt: String,
    pending: Option<TransformationConfig>,
    applied: Option<TransformationConfig>,
}

impl TransformationDraft {
    /// Start a draft; restore and background removal need no input so their
    /// defaults are pending right away
    #[must_use]
    pub fn new(kind: TransformationKind) -> Self {
        let pending = matches!(
            kind,
            TransformationKind::Restore | TransformationKind::RemoveBackground
        )
        .then(|| kind.default_config());
        Self {
            kind,
            mode: EditMode::Remove,
            prompt: String::new(),
            pending,
            applied: None,
        }
    }

    /// Resume editing a saved record
    #[must_use]
    pub fn resume(
        kind: TransformationKind,
        applied: Option<TransformationConfig>,
        prompt: Option<String>,
        replacement: Option<&str>,
    ) -> Self {
        let mut draft = Self::new(kind);
        draft.applied = applied;
        draft.prompt = prompt.unwrap_or_default();
        if replacement.is_some_and(|to| !to.is_empty()) {
            draft.mode = EditMode::Replace;
        }
        draft
    }

    #[must_use]
    pub fn kind(&self) -> TransformationKind {
        self.kind
    }

    #[must_use]
    pub fn mode(&self) -> EditMode {
        self.mode
    }

    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    #[must_use]
    pub fn pending(&self) -> Option<&TransformationConfig> {
        self.pending.as_ref()
    }

    #[must_use]
    pub fn applied(&self) -> Option<&TransformationConfig> {
        self.applied.as_ref()
    }

    /// Something is waiting to be applied
    #[must_use]
    pub fn can_apply(&self) -> bool {
        self.pending.is_some()
    }

    fn pending_mut(&mut self) -> &mut TransformationConfig {
        self.pending.get_or_insert_with(TransformationConfig::default)
    }

    /// Object prompt for remove or recolor
    pub fn set_prompt(&mut self, prompt: &str) {
        self.prompt = prompt.to_string();
        let text = Some(prompt.to_string());
        match self.kind {
            TransformationKind::Recolor => {
                let slot = self.pending_mut().recolor.get_or_insert_with(Default::default);
                slot.prompt = text;
            },
            _ => {
                let slot = self.pending_mut().remove.get_or_insert_with(Default::default);
                slot.prompt = text;
            },
        }
    }

    /// Replacement color for recolor
    pub fn set_color(&mut self, color: &str) {
        let slot = self.pending_mut().recolor.get_or_insert_with(Default::default);
        slot.to = Some(color.to_string());
    }

    /// Replacement object; the source object is the last prompt
    pub fn set_replacement(&mut self, to: &str) {
        let from = Some(self.prompt.clone());
        let slot = self.pending_mut().replace.get_or_insert_with(Default::default);
        slot.from = from;
        slot.to = Some(to.to_string());
    }

    /// Choose the generative fill output size
    pub fn select_aspect_ratio(&mut self, ratio: AspectRatio) {
        let mut config = self.kind.default_config();
        if let Some(fill) = config.fill.as_mut() {
            fill.aspect_ratio = Some(ratio);
        }
        self.pending = Some(config);
    }

    /// Flip between remove and replace; the applied config is discarded
    pub fn toggle_mode(&mut self) {
        self.mode = match self.mode {
            EditMode::Remove => EditMode::Replace,
            EditMode::Replace => EditMode::Remove,
        };
        self.applied = None;
    }

    /// Merge pending edits into the applied config and return it
    pub fn apply(&mut self) -> Option<&TransformationConfig> {
        let incoming = self.pending.take()?;
        let merged = merge_config(self.applied.take(), incoming, self.mode, &self.prompt);
        tracing::debug!(kind = %self.kind, kinds = ?merged.kinds(), "Applied transformation config");
        self.applied = Some(merged);
        self.applied.as_ref()
    }
}

/// Escape text for use inside a transformation path segment
fn escape_prompt(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.trim().chars() {
        match ch {
            ' ' => out.push_str("%20"),
            '/' => out.push_str("%2F"),
            ',' => out.push_str("%2C"),
            ';' => out.push_str("%3B"),
            '%' => out.push_str("%25"),
            '?' => out.push_str("%3F"),
            '#' => out.push_str("%23"),
            '&' => out.push_str("%26"),
            _ => out.push(ch),
        }
    }
    out
}
