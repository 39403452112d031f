//! Sequential tour playback.

use std::sync::Arc;

use tracing::{info, warn};
use waymark_protocols::{EditorMode, Tour, TransitionError};

use crate::locator::Locator;
use crate::picker::SharedStore;
use crate::render::RenderTarget;

/// Where playback stands after a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    /// Step `index` is on screen; `anchored` is false when its element was
    /// not found and the step is shown centered.
    Shown { index: usize, anchored: bool },
    Finished,
}

/// Renders one tour at a time, one step at a time, in stored order.
pub struct TourPlayer {
    locator: Locator,
    render: Arc<dyn RenderTarget>,
    store: SharedStore,
    tour: Option<Tour>,
    index: usize,
}

impl TourPlayer {
    pub fn new(locator: Locator, render: Arc<dyn RenderTarget>, store: SharedStore) -> Self {
        Self {
            locator,
            render,
            store,
            tour: None,
            index: 0,
        }
    }

    /// The playing tour and the current step index.
    pub fn current(&self) -> Option<(&Tour, usize)> {
        self.tour.as_ref().map(|t| (t, self.index))
    }

    pub fn is_playing(&self) -> bool {
        self.tour.is_some()
    }

    /// Enter `viewing` and show the first step.
    pub async fn start(&mut self, tour: Tour) -> Result<StepStatus, TransitionError> {
        self.store.lock().transition(EditorMode::Viewing)?;
        self.render.hide_editor();
        info!("Starting tour '{}' ({} steps)", tour.id, tour.steps.len());
        self.tour = Some(tour);
        self.index = 0;
        Ok(self.show().await)
    }

    pub async fn next(&mut self) -> StepStatus {
        let Some(total) = self.tour.as_ref().map(|t| t.steps.len()) else {
            return StepStatus::Finished;
        };
        if self.index + 1 >= total {
            self.close();
            return StepStatus::Finished;
        }
        self.index += 1;
        self.show().await
    }

    pub async fn previous(&mut self) -> StepStatus {
        if self.tour.is_none() {
            return StepStatus::Finished;
        }
        self.index = self.index.saturating_sub(1);
        self.show().await
    }

    /// Stop playback and return to `idle`.
    pub fn close(&mut self) {
        if let Some(tour) = self.tour.take() {
            info!("Closing tour '{}'", tour.id);
        }
        self.index = 0;
        self.render.clear_step();
        let mut store = self.store.lock();
        if store.mode() == EditorMode::Viewing {
            let _ = store.transition(EditorMode::Idle);
        }
    }

    async fn show(&mut self) -> StepStatus {
        let Some(step) = self
            .tour
            .as_ref()
            .and_then(|t| t.steps.get(self.index))
            .cloned()
        else {
            self.close();
            return StepStatus::Finished;
        };
        let total = self.tour.as_ref().map_or(0, |t| t.steps.len());

        let anchor = match self.locator.locate(&step.selector).await {
            Some(node) => Some(self.locator.document().read().bounding_client_rect(node)),
            None => {
                warn!(
                    "Step {} element '{}' not found, showing unanchored",
                    self.index + 1,
                    step.selector
                );
                None
            }
        };

        self.render.render_step(&step, self.index, total, anchor);
        StepStatus::Shown {
            index: self.index,
            anchored: anchor.is_some(),
        }
    }
}
