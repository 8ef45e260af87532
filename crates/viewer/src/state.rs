use serde::Serialize;

use sequence::FrameNumber;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum LoadPhase {
    Loading,
    LoadingWithPreview,
    Loaded,
    Error,
}

/// Observable snapshot of the active view. Only [`reduce`] changes it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewerState {
    pub image_loaded: bool,
    pub image_error: bool,
    pub low_res_loaded: bool,
    pub low_res_visible: bool,
    pub is_dragging: bool,
    pub first_load_complete: bool,
    pub show_guide: bool,
    pub zoom_level: f32,
    pub current_frame: FrameNumber,
    pub total_frames: u32,
}

impl ViewerState {
    pub fn new(current_frame: FrameNumber, total_frames: u32, zoom_level: f32, show_guide: bool) -> Self {
        Self {
            image_loaded: false,
            image_error: false,
            low_res_loaded: false,
            low_res_visible: true,
            is_dragging: false,
            first_load_complete: false,
            show_guide,
            zoom_level,
            current_frame,
            total_frames,
        }
    }

    pub fn phase(&self) -> LoadPhase {
        if self.image_error {
            LoadPhase::Error
        } else if self.image_loaded {
            LoadPhase::Loaded
        } else if self.low_res_loaded {
            LoadPhase::LoadingWithPreview
        } else {
            LoadPhase::Loading
        }
    }

    pub fn guide_visible(&self) -> bool { self.show_guide && self.first_load_complete }

    /// Position of the current frame in the sequence, 0 to 100.
    pub fn progress(&self) -> f32 {
        if self.total_frames == 0 {
            return 0.0;
        }
        self.current_frame.get() as f32 / self.total_frames as f32 * 100.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ViewerAction {
    ImageLoading,
    LowResLoaded,
    ImageLoaded,
    ImageError,
    SetDragging(bool),
    FirstLoadComplete,
    HideGuide,
    SetZoom(f32),
    SetFrame(FrameNumber),
}

pub fn reduce(state: ViewerState, action: ViewerAction) -> ViewerState {
    match action {
        ViewerAction::ImageLoading => ViewerState {
            image_loaded: false,
            image_error: false,
            low_res_loaded: false,
            low_res_visible: true,
            ..state
        },
        ViewerAction::LowResLoaded => ViewerState { low_res_loaded: true, ..state },
        ViewerAction::ImageLoaded => {
            ViewerState { image_loaded: true, image_error: false, low_res_visible: false, ..state }
        }
        ViewerAction::ImageError => ViewerState { image_error: true, ..state },
        ViewerAction::SetDragging(is_dragging) => ViewerState { is_dragging, ..state },
        ViewerAction::FirstLoadComplete => ViewerState { first_load_complete: true, ..state },
        ViewerAction::HideGuide => ViewerState { show_guide: false, ..state },
        ViewerAction::SetZoom(zoom_level) => ViewerState { zoom_level, ..state },
        ViewerAction::SetFrame(current_frame) => ViewerState { current_frame, ..state },
    }
}
