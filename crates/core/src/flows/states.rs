use serde::{Deserialize, Serialize};

/// Named wizard screens. Numbering is derived from the venue answer, see
/// [`WizardStep::number`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WizardStep {
    EventBasics,
    VenueChoice,
    VenueSelection,
    ServiceSelection,
    Review,
    Confirmed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum WizardEvent {
    Next,
    Previous,
    PaymentConfirmed,
    Restart,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum WizardAction {
    PrepareCheckout,
    ShowConfirmation,
    ResetSelection,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub from: WizardStep,
    pub to: WizardStep,
    pub event: WizardEvent,
    pub actions: Vec<WizardAction>,
}

/// What the presentation layer needs to render the current step.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct WizardScreen {
    pub step: WizardStep,
    pub number: Option<u8>,
    pub total_steps: u8,
    pub title: &'static str,
    pub is_review: bool,
    pub can_go_back: bool,
}

impl WizardStep {
    /// User-visible step index. `Confirmed` sits after the last numbered step.
    pub fn number(self, needs_venue: Option<bool>) -> Option<u8> {
        let venue_branch = needs_venue == Some(true);
        match self {
            Self::EventBasics => Some(1),
            Self::VenueChoice => Some(2),
            Self::VenueSelection => Some(3),
            Self::ServiceSelection => Some(if venue_branch { 4 } else { 3 }),
            Self::Review => Some(terminal_step_number(needs_venue)),
            Self::Confirmed => None,
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Self::EventBasics => "Event details",
            Self::VenueChoice => "Do you need a venue?",
            Self::VenueSelection => "Choose your venue",
            Self::ServiceSelection => "Select services",
            Self::Review => "Review & pay",
            Self::Confirmed => "Booking confirmed",
        }
    }

    pub fn screen(self, needs_venue: Option<bool>) -> WizardScreen {
        let number = self.number(needs_venue);
        WizardScreen {
            step: self,
            number,
            total_steps: terminal_step_number(needs_venue),
            title: self.title(),
            is_review: is_review_step(number, needs_venue),
            can_go_back: !matches!(self, Self::EventBasics | Self::Confirmed),
        }
    }
}

/// The review step is the last numbered one: 5 with a venue, 4 without.
pub fn terminal_step_number(needs_venue: Option<bool>) -> u8 {
    if needs_venue == Some(true) {
        5
    } else {
        4
    }
}

pub fn is_review_step(number: Option<u8>, needs_venue: Option<bool>) -> bool {
    number == Some(terminal_step_number(needs_venue))
}
