use thiserror::Error;

use crate::audit::{AuditCategory, AuditContext, AuditOutcome, AuditSink};
use crate::domain::selection::SelectionState;
use crate::flows::states::{
    terminal_step_number, TransitionOutcome, WizardAction, WizardEvent, WizardScreen, WizardStep,
};

pub trait FlowDefinition {
    fn initial_step(&self) -> WizardStep;
    fn transition(
        &self,
        current: WizardStep,
        event: WizardEvent,
        selection: &SelectionState,
    ) -> Result<TransitionOutcome, FlowTransitionError>;
}

/// The custom event-package wizard graph:
/// `EventBasics → VenueChoice → {VenueSelection | ServiceSelection} → … → Review → Confirmed`.
#[derive(Clone, Copy, Debug, Default)]
pub struct EventPackageFlow;

impl FlowDefinition for EventPackageFlow {
    fn initial_step(&self) -> WizardStep {
        WizardStep::EventBasics
    }

    fn transition(
        &self,
        current: WizardStep,
        event: WizardEvent,
        selection: &SelectionState,
    ) -> Result<TransitionOutcome, FlowTransitionError> {
        transition_event_package(current, event, selection)
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FlowTransitionError {
    #[error("missing required fields before leaving {state:?}: {missing_fields:?}")]
    MissingRequiredFields { state: WizardStep, missing_fields: Vec<String> },
    #[error("invalid transition from {state:?} using event {event:?}")]
    InvalidTransition { state: WizardStep, event: WizardEvent },
}

/// Pure transition function. Forward moves are gated on the fields the current
/// screen collects; the selection itself is never modified here.
pub fn transition_event_package(
    current: WizardStep,
    event: WizardEvent,
    selection: &SelectionState,
) -> Result<TransitionOutcome, FlowTransitionError> {
    use WizardAction::{PrepareCheckout, ResetSelection, ShowConfirmation};
    use WizardEvent::{Next, PaymentConfirmed, Previous, Restart};
    use WizardStep::{
        Confirmed, EventBasics, Review, ServiceSelection, VenueChoice, VenueSelection,
    };

    let venue_branch = selection.needs_venue == Some(true);

    let (to, actions) = match (current, event) {
        (_, Restart) => (EventBasics, vec![ResetSelection]),

        (EventBasics, Next) => {
            let missing = selection.missing_event_basics();
            if !missing.is_empty() {
                return Err(missing_fields(current, missing));
            }
            (VenueChoice, Vec::new())
        }
        (VenueChoice, Next) => match selection.needs_venue {
            Some(true) => (VenueSelection, Vec::new()),
            Some(false) => (ServiceSelection, Vec::new()),
            None => return Err(missing_fields(current, vec!["needs_venue".to_string()])),
        },
        (VenueSelection, Next) => {
            if selection.venue_details.venue_type.is_none() {
                return Err(missing_fields(current, vec!["venue_details.type".to_string()]));
            }
            (ServiceSelection, Vec::new())
        }
        (ServiceSelection, Next) => (Review, vec![PrepareCheckout]),
        (Review, PaymentConfirmed) => (Confirmed, vec![ShowConfirmation]),

        (VenueChoice, Previous) => (EventBasics, Vec::new()),
        (VenueSelection, Previous) => (VenueChoice, Vec::new()),
        (ServiceSelection, Previous) if venue_branch => (VenueSelection, Vec::new()),
        (ServiceSelection, Previous) => (VenueChoice, Vec::new()),
        (Review, Previous) => (ServiceSelection, Vec::new()),

        _ => return Err(FlowTransitionError::InvalidTransition { state: current, event }),
    };

    Ok(TransitionOutcome { from: current, to, event, actions })
}

fn missing_fields(state: WizardStep, missing_fields: Vec<String>) -> FlowTransitionError {
    FlowTransitionError::MissingRequiredFields { state, missing_fields }
}

/// Tracks the current screen of one planner session.
///
/// Back navigation re-enters the exact screen recorded on the way forward.
#[derive(Clone, Debug)]
pub struct WizardController<F = EventPackageFlow> {
    flow: F,
    current: WizardStep,
    history: Vec<WizardStep>,
}

impl Default for WizardController<EventPackageFlow> {
    fn default() -> Self {
        Self::new(EventPackageFlow)
    }
}

impl<F> WizardController<F>
where
    F: FlowDefinition,
{
    pub fn new(flow: F) -> Self {
        let current = flow.initial_step();
        Self { flow, current, history: Vec::new() }
    }

    pub fn current_step(&self) -> WizardStep {
        self.current
    }

    pub fn step_number(&self, selection: &SelectionState) -> Option<u8> {
        self.current.number(selection.needs_venue)
    }

    pub fn terminal_step_number(&self, selection: &SelectionState) -> u8 {
        terminal_step_number(selection.needs_venue)
    }

    pub fn is_review(&self, selection: &SelectionState) -> bool {
        self.step_number(selection) == Some(self.terminal_step_number(selection))
    }

    pub fn screen(&self, selection: &SelectionState) -> WizardScreen {
        self.current.screen(selection.needs_venue)
    }

    pub fn next(
        &mut self,
        selection: &SelectionState,
    ) -> Result<TransitionOutcome, FlowTransitionError> {
        self.apply(WizardEvent::Next, selection)
    }

    pub fn previous(
        &mut self,
        selection: &SelectionState,
    ) -> Result<TransitionOutcome, FlowTransitionError> {
        self.apply(WizardEvent::Previous, selection)
    }

    pub fn confirm_payment(
        &mut self,
        selection: &SelectionState,
    ) -> Result<TransitionOutcome, FlowTransitionError> {
        self.apply(WizardEvent::PaymentConfirmed, selection)
    }

    pub fn restart(
        &mut self,
        selection: &SelectionState,
    ) -> Result<TransitionOutcome, FlowTransitionError> {
        self.apply(WizardEvent::Restart, selection)
    }

    pub fn apply(
        &mut self,
        event: WizardEvent,
        selection: &SelectionState,
    ) -> Result<TransitionOutcome, FlowTransitionError> {
        let mut outcome = self.flow.transition(self.current, event, selection)?;

        match event {
            WizardEvent::Next => self.history.push(self.current),
            WizardEvent::Previous => {
                if let Some(previous) = self.history.pop() {
                    outcome.to = previous;
                }
            }
            WizardEvent::PaymentConfirmed | WizardEvent::Restart => self.history.clear(),
        }

        self.current = outcome.to;
        Ok(outcome)
    }

    pub fn apply_with_audit<S>(
        &mut self,
        event: WizardEvent,
        selection: &SelectionState,
        sink: &S,
        audit: &AuditContext,
    ) -> Result<TransitionOutcome, FlowTransitionError>
    where
        S: AuditSink + ?Sized,
    {
        let result = self.apply(event, selection);
        match &result {
            Ok(outcome) => sink.emit(
                audit
                    .event("wizard.transition_applied", AuditCategory::Wizard, AuditOutcome::Success)
                    .with_metadata("from", format!("{:?}", outcome.from))
                    .with_metadata("to", format!("{:?}", outcome.to))
                    .with_metadata("event", format!("{:?}", outcome.event)),
            ),
            Err(error) => sink.emit(
                audit
                    .event(
                        "wizard.transition_rejected",
                        AuditCategory::Wizard,
                        AuditOutcome::Rejected,
                    )
                    .with_metadata("state", format!("{:?}", self.current))
                    .with_metadata("error", error.to_string()),
            ),
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use crate::audit::{AuditContext, InMemoryAuditSink};
    use crate::domain::selection::SelectionState;
    use crate::domain::service::{DecorThemeId, EventTypeId, VenueTypeId};
    use crate::flows::engine::{
        transition_event_package, FlowTransitionError, WizardController,
    };
    use crate::flows::states::{WizardAction, WizardEvent, WizardStep};

    fn basics() -> SelectionState {
        SelectionState {
            event_type: Some(EventTypeId::new("wedding")),
            date: NaiveDate::from_ymd_opt(2026, 11, 21),
            start_time: "17:00".to_string(),
            end_time: "23:30".to_string(),
            location: "Udaipur".to_string(),
            ..SelectionState::default()
        }
    }

    fn walk_to_review(
        controller: &mut WizardController,
        selection: &SelectionState,
    ) -> Vec<WizardStep> {
        let mut visited = vec![controller.current_step()];
        while !controller.is_review(selection) {
            controller.next(selection).expect("forward path should be open");
            visited.push(controller.current_step());
        }
        visited
    }

    #[test]
    fn venue_branch_reaches_review_at_step_five() {
        let mut selection = basics();
        selection.needs_venue = Some(true);
        selection.venue_details.venue_type = Some(VenueTypeId::new("lawn"));
        let mut controller = WizardController::default();

        let visited = walk_to_review(&mut controller, &selection);

        assert_eq!(
            visited,
            vec![
                WizardStep::EventBasics,
                WizardStep::VenueChoice,
                WizardStep::VenueSelection,
                WizardStep::ServiceSelection,
                WizardStep::Review,
            ]
        );
        assert_eq!(controller.step_number(&selection), Some(5));
        assert!(controller.screen(&selection).is_review);
    }

    #[test]
    fn no_venue_branch_reaches_review_at_step_four() {
        let mut selection = basics();
        selection.needs_venue = Some(false);
        let mut controller = WizardController::default();

        let visited = walk_to_review(&mut controller, &selection);

        assert_eq!(
            visited,
            vec![
                WizardStep::EventBasics,
                WizardStep::VenueChoice,
                WizardStep::ServiceSelection,
                WizardStep::Review,
            ]
        );
        assert_eq!(controller.step_number(&selection), Some(4));
    }

    #[test]
    fn event_basics_gate_lists_missing_fields() {
        let mut selection = basics();
        selection.start_time.clear();
        selection.location = "  ".to_string();
        let mut controller = WizardController::default();

        let error = controller.next(&selection).expect_err("blank fields must block");

        assert_eq!(
            error,
            FlowTransitionError::MissingRequiredFields {
                state: WizardStep::EventBasics,
                missing_fields: vec!["location".to_string(), "start_time".to_string()],
            }
        );
        assert_eq!(controller.current_step(), WizardStep::EventBasics);
    }

    #[test]
    fn undecided_venue_blocks_progression() {
        let selection = basics();
        let mut controller = WizardController::default();
        controller.next(&selection).expect("basics complete");

        let error = controller.next(&selection).expect_err("needs_venue undecided");
        assert!(matches!(
            error,
            FlowTransitionError::MissingRequiredFields { state: WizardStep::VenueChoice, .. }
        ));
        assert_eq!(controller.current_step(), WizardStep::VenueChoice);
    }

    #[test]
    fn venue_selection_requires_a_venue_type() {
        let mut selection = basics();
        selection.needs_venue = Some(true);
        let mut controller = WizardController::default();
        controller.next(&selection).expect("basics");
        controller.next(&selection).expect("venue choice");

        let error = controller.next(&selection).expect_err("venue type missing");
        assert_eq!(
            error,
            FlowTransitionError::MissingRequiredFields {
                state: WizardStep::VenueSelection,
                missing_fields: vec!["venue_details.type".to_string()],
            }
        );
    }

    #[test]
    fn service_selection_has_no_hard_gate() {
        let mut selection = basics();
        selection.needs_venue = Some(false);
        assert!(selection.selected_services.is_empty());

        let outcome =
            transition_event_package(WizardStep::ServiceSelection, WizardEvent::Next, &selection)
                .expect("empty services may proceed");
        assert_eq!(outcome.to, WizardStep::Review);
        assert_eq!(outcome.actions, vec![WizardAction::PrepareCheckout]);
    }

    #[test]
    fn back_then_forward_preserves_selection_at_every_step() {
        let mut selection = basics();
        selection.needs_venue = Some(true);
        selection.venue_details.venue_type = Some(VenueTypeId::new("resort"));
        selection.selected_services.decor.theme = Some(DecorThemeId::new("floral"));
        let snapshot = selection.clone();
        let mut controller = WizardController::default();

        while !controller.is_review(&selection) {
            let before = controller.current_step();
            let forward = controller.next(&selection).expect("forward").to;
            let back = controller.previous(&selection).expect("back").to;
            assert_eq!(back, before);
            let again = controller.next(&selection).expect("forward again").to;
            assert_eq!(again, forward);
            assert_eq!(selection, snapshot);
        }
    }

    #[test]
    fn back_navigation_follows_the_recorded_path() {
        let mut selection = basics();
        selection.needs_venue = Some(false);
        let mut controller = WizardController::default();
        walk_to_review(&mut controller, &selection);

        assert_eq!(controller.previous(&selection).expect("back").to, WizardStep::ServiceSelection);
        assert_eq!(controller.previous(&selection).expect("back").to, WizardStep::VenueChoice);
        assert_eq!(controller.previous(&selection).expect("back").to, WizardStep::EventBasics);
        assert!(matches!(
            controller.previous(&selection),
            Err(FlowTransitionError::InvalidTransition { state: WizardStep::EventBasics, .. })
        ));
    }

    #[test]
    fn pure_predecessor_matches_the_branch() {
        let mut selection = basics();
        selection.needs_venue = Some(true);
        let back = transition_event_package(
            WizardStep::ServiceSelection,
            WizardEvent::Previous,
            &selection,
        )
        .expect("back from services");
        assert_eq!(back.to, WizardStep::VenueSelection);

        selection.needs_venue = Some(false);
        let back = transition_event_package(
            WizardStep::ServiceSelection,
            WizardEvent::Previous,
            &selection,
        )
        .expect("back from services");
        assert_eq!(back.to, WizardStep::VenueChoice);
    }

    #[test]
    fn review_cannot_advance_without_payment() {
        let mut selection = basics();
        selection.needs_venue = Some(false);
        let mut controller = WizardController::default();
        walk_to_review(&mut controller, &selection);

        assert!(matches!(
            controller.next(&selection),
            Err(FlowTransitionError::InvalidTransition { state: WizardStep::Review, .. })
        ));

        let confirmed = controller.confirm_payment(&selection).expect("payment confirmed");
        assert_eq!(confirmed.to, WizardStep::Confirmed);
        assert_eq!(confirmed.actions, vec![WizardAction::ShowConfirmation]);
        assert!(controller.previous(&selection).is_err());
    }

    #[test]
    fn payment_confirmation_is_only_valid_from_review() {
        let selection = basics();
        let mut controller = WizardController::default();
        assert!(controller.confirm_payment(&selection).is_err());
        assert_eq!(controller.current_step(), WizardStep::EventBasics);
    }

    #[test]
    fn restart_returns_to_step_one_and_requests_reset() {
        let mut selection = basics();
        selection.needs_venue = Some(false);
        let mut controller = WizardController::default();
        walk_to_review(&mut controller, &selection);
        controller.confirm_payment(&selection).expect("confirmed");

        let outcome = controller.restart(&selection).expect("restart");
        assert_eq!(outcome.to, WizardStep::EventBasics);
        assert_eq!(outcome.actions, vec![WizardAction::ResetSelection]);
        assert_eq!(controller.step_number(&selection), Some(1));
    }

    #[test]
    fn transitions_emit_audit_events() {
        let sink = InMemoryAuditSink::default();
        let audit = AuditContext::new(None, "req-7", "wizard");
        let mut controller = WizardController::default();

        controller
            .apply_with_audit(WizardEvent::Next, &SelectionState::default(), &sink, &audit)
            .expect_err("empty basics rejected");
        controller
            .apply_with_audit(WizardEvent::Next, &basics(), &sink, &audit)
            .expect("basics accepted");

        assert_eq!(
            sink.event_types(),
            vec!["wizard.transition_rejected", "wizard.transition_applied"]
        );
        assert_eq!(sink.events()[1].metadata.get("to").map(String::as_str), Some("VenueChoice"));
    }
}
