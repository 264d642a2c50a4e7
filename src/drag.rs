//! Drag and drop of application cards between stage columns.
//!
//! The controller only tracks a single gesture. A press becomes a drag once the pointer
//! has travelled further than the activation distance, so plain clicks never move cards.
//! Dropping resolves a target stage; the card's position on screen follows the
//! repository cache, which changes only after the store accepts the update.

use tracing::{debug, warn};

use crate::error::Result;
use crate::models::{Application, ApplicationPatch, Stage};
use crate::repository::ApplicationRepository;

pub const DEFAULT_ACTIVATION_DISTANCE: u16 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Point {
    pub x: u16,
    pub y: u16,
}

impl Point {
    pub fn new(x: u16, y: u16) -> Self {
        Self { x, y }
    }

    fn distance_sq(self, other: Point) -> u32 {
        let dx = u32::from(self.x.abs_diff(other.x));
        let dy = u32::from(self.y.abs_diff(other.y));
        dx * dx + dy * dy
    }
}

/// What lies under the pointer on release.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropTarget {
    Column(Stage),
    Card(i64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragState {
    Idle,
    /// Pointer is down on a card but has not moved far enough yet.
    Pressed { id: i64, origin: Point },
    Dragging { id: i64, origin: Point, current: Point },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropOutcome {
    /// No drag was active, the target was invalid, or the card disappeared meanwhile.
    Discarded,
    /// Dropped back onto its own column.
    Unchanged { id: i64 },
    Move { id: i64, from: Stage, to: Stage },
}

#[derive(Debug)]
pub struct DragController {
    state: DragState,
    activation_distance: u16,
}

impl Default for DragController {
    fn default() -> Self {
        Self::new(DEFAULT_ACTIVATION_DISTANCE)
    }
}

impl DragController {
    pub fn new(activation_distance: u16) -> Self {
        Self {
            state: DragState::Idle,
            activation_distance,
        }
    }

    pub fn state(&self) -> DragState {
        self.state
    }

    /// Card currently being dragged, for the overlay.
    pub fn active(&self) -> Option<(i64, Point)> {
        match self.state {
            DragState::Dragging { id, current, .. } => Some((id, current)),
            _ => None,
        }
    }

    /// Pointer went down on a card. Ignored while another gesture is in progress.
    pub fn press(&mut self, id: i64, at: Point) -> bool {
        if self.state != DragState::Idle {
            return false;
        }
        self.state = DragState::Pressed { id, origin: at };
        true
    }

    pub fn motion(&mut self, at: Point) {
        let threshold = u32::from(self.activation_distance).pow(2);
        self.state = match self.state {
            DragState::Pressed { id, origin } if origin.distance_sq(at) > threshold => {
                debug!(id, "drag started");
                DragState::Dragging {
                    id,
                    origin,
                    current: at,
                }
            }
            DragState::Dragging { id, origin, .. } => DragState::Dragging {
                id,
                origin,
                current: at,
            },
            other => other,
        };
    }

    pub fn cancel(&mut self) {
        self.state = DragState::Idle;
    }

    /// Pointer released. Always returns the controller to idle before deciding what the
    /// drop means.
    pub fn release(&mut self, target: Option<DropTarget>, apps: &[Application]) -> DropOutcome {
        let state = std::mem::replace(&mut self.state, DragState::Idle);
        let DragState::Dragging { id, .. } = state else {
            return DropOutcome::Discarded;
        };
        let Some(dragged) = apps.iter().find(|app| app.id == id) else {
            return DropOutcome::Discarded;
        };
        let Some(to) = target.and_then(|t| resolve_stage(t, apps)) else {
            debug!(id, "dropped outside any column");
            return DropOutcome::Discarded;
        };
        if to == dragged.status {
            DropOutcome::Unchanged { id }
        } else {
            DropOutcome::Move {
                id,
                from: dragged.status,
                to,
            }
        }
    }
}

/// Stage a drop target belongs to. A card counts as its own column.
pub fn resolve_stage(target: DropTarget, apps: &[Application]) -> Option<Stage> {
    match target {
        DropTarget::Column(stage) => Some(stage),
        DropTarget::Card(id) => apps.iter().find(|app| app.id == id).map(|app| app.status),
    }
}

/// Commit a drop through the repository. Only `Move` touches the store; on failure the
/// cache keeps its pre-drag state and the error is handed back for display.
pub fn commit(outcome: DropOutcome, repo: &mut ApplicationRepository<'_>) -> Result<Option<Application>> {
    let DropOutcome::Move { id, from, to } = outcome else {
        return Ok(None);
    };
    match repo.update(id, ApplicationPatch::status(to)) {
        Ok(app) => Ok(Some(app)),
        Err(e) => {
            warn!(id, %from, %to, "failed to update application status: {}", e);
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewApplication;
    use crate::pipeline::group_by_stage;
    use crate::repository::tests::{MemoryFiles, ScriptedStore};

    fn dragging(controller: &mut DragController, id: i64) {
        assert!(controller.press(id, Point::new(10, 10)));
        controller.motion(Point::new(20, 10));
        assert_eq!(controller.active().map(|(active, _)| active), Some(id));
    }

    fn repo_with_card<'a>(store: &'a ScriptedStore, files: &'a MemoryFiles) -> (ApplicationRepository<'a>, i64) {
        let owner = store.inner.create_user("owner@example.com", "h", "s").unwrap();
        let mut repo = ApplicationRepository::new(store, files);
        repo.load(owner).unwrap();
        let id = repo.add(NewApplication::new("Ada", "Eng", 2)).unwrap().id;
        (repo, id)
    }

    #[test]
    fn small_motion_does_not_start_a_drag() {
        let mut controller = DragController::new(3);
        controller.press(1, Point::new(5, 5));
        controller.motion(Point::new(6, 6));
        assert!(controller.active().is_none());
        assert!(matches!(controller.state(), DragState::Pressed { id: 1, .. }));

        // Travelling exactly the activation distance is not enough.
        controller.motion(Point::new(8, 5));
        assert!(controller.active().is_none());
        assert!(matches!(controller.state(), DragState::Pressed { id: 1, .. }));

        controller.motion(Point::new(9, 5));
        assert!(matches!(controller.state(), DragState::Dragging { id: 1, .. }));
    }

    #[test]
    fn default_distance_needs_more_than_two_cells() {
        let mut controller = DragController::default();
        controller.press(1, Point::new(5, 5));
        controller.motion(Point::new(7, 5));
        assert!(controller.active().is_none());
        controller.motion(Point::new(8, 5));
        assert!(controller.active().is_some());
    }

    #[test]
    fn only_one_gesture_at_a_time() {
        let mut controller = DragController::default();
        assert!(controller.press(1, Point::new(0, 0)));
        assert!(!controller.press(2, Point::new(0, 0)));
    }

    #[test]
    fn click_without_drag_is_discarded() {
        let store = ScriptedStore::new();
        let files = MemoryFiles::default();
        let (repo, id) = repo_with_card(&store, &files);

        let mut controller = DragController::default();
        controller.press(id, Point::new(1, 1));
        let outcome = controller.release(Some(DropTarget::Column(Stage::Offer)), repo.applications());
        assert_eq!(outcome, DropOutcome::Discarded);
        assert_eq!(controller.state(), DragState::Idle);
    }

    #[test]
    fn drop_on_same_column_issues_no_update() {
        let store = ScriptedStore::new();
        let files = MemoryFiles::default();
        let (mut repo, id) = repo_with_card(&store, &files);
        let calls = store.calls.get();

        let mut controller = DragController::default();
        dragging(&mut controller, id);
        let outcome = controller.release(Some(DropTarget::Column(Stage::Applied)), repo.applications());
        assert_eq!(outcome, DropOutcome::Unchanged { id });

        assert_eq!(commit(outcome, &mut repo).unwrap(), None);
        assert_eq!(store.calls.get(), calls);
    }

    #[test]
    fn drop_outside_columns_changes_nothing() {
        let store = ScriptedStore::new();
        let files = MemoryFiles::default();
        let (mut repo, id) = repo_with_card(&store, &files);
        let before = repo.applications().to_vec();
        let calls = store.calls.get();

        let mut controller = DragController::default();
        dragging(&mut controller, id);
        let outcome = controller.release(None, repo.applications());
        assert_eq!(outcome, DropOutcome::Discarded);
        commit(outcome, &mut repo).unwrap();

        assert_eq!(repo.applications(), before.as_slice());
        assert_eq!(store.calls.get(), calls);
        assert_eq!(group_by_stage(repo.applications())[&Stage::Applied].len(), 1);
    }

    #[test]
    fn drop_on_other_column_moves_card() {
        let store = ScriptedStore::new();
        let files = MemoryFiles::default();
        let (mut repo, id) = repo_with_card(&store, &files);

        let mut controller = DragController::default();
        dragging(&mut controller, id);
        let outcome = controller.release(Some(DropTarget::Column(Stage::Interview)), repo.applications());
        assert_eq!(
            outcome,
            DropOutcome::Move {
                id,
                from: Stage::Applied,
                to: Stage::Interview
            }
        );

        let moved = commit(outcome, &mut repo).unwrap().unwrap();
        assert_eq!(moved.status, Stage::Interview);
        assert_eq!(repo.get(id).unwrap().status, Stage::Interview);
    }

    #[test]
    fn drop_on_card_uses_that_cards_column() {
        let store = ScriptedStore::new();
        let files = MemoryFiles::default();
        let (mut repo, id) = repo_with_card(&store, &files);
        let other = repo.add(NewApplication::new("Grace", "PM", 6)).unwrap();
        repo.update(other.id, ApplicationPatch::status(Stage::Offer)).unwrap();

        let mut controller = DragController::default();
        dragging(&mut controller, id);
        let outcome = controller.release(Some(DropTarget::Card(other.id)), repo.applications());
        assert!(matches!(outcome, DropOutcome::Move { to: Stage::Offer, .. }));
    }

    #[test]
    fn failed_commit_snaps_back() {
        let store = ScriptedStore::new();
        let files = MemoryFiles::default();
        let (mut repo, id) = repo_with_card(&store, &files);

        let mut controller = DragController::default();
        dragging(&mut controller, id);
        let outcome = controller.release(Some(DropTarget::Column(Stage::Rejected)), repo.applications());

        store.fail_next.set(true);
        assert!(commit(outcome, &mut repo).is_err());
        assert_eq!(controller.state(), DragState::Idle);
        let groups = group_by_stage(repo.applications());
        assert_eq!(groups[&Stage::Applied].len(), 1);
        assert!(groups[&Stage::Rejected].is_empty());
    }
}
