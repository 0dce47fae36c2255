use crate::domain::booking::Booking;
use crate::domain::selection::SelectionState;
use crate::flows::{FlowDefinition, FlowTransitionError, TransitionOutcome, WizardController};

/// Terminal view of a saved booking.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConfirmationPresenter {
    booking: Booking,
}

impl ConfirmationPresenter {
    pub fn new(booking: Booking) -> Self {
        Self { booking }
    }

    pub fn booking(&self) -> &Booking {
        &self.booking
    }

    pub fn summary_lines(&self) -> Vec<String> {
        let booking = &self.booking;
        vec![
            format!("Booking ID: {}", booking.id),
            format!("Payment ID: {}", booking.payment_id),
            format!("Total amount: {}", booking.total_amount),
            format!("Advance paid: {}", booking.advance_amount),
            format!("Remaining (due later): {}", booking.remaining_amount),
            format!("Payment status: {}", booking.payment_status.as_str()),
        ]
    }

    /// Clears the selection back to defaults, keeping contact details, and
    /// sends the wizard back to the first screen.
    pub fn reset_to_step1<F>(
        self,
        selection: &mut SelectionState,
        wizard: &mut WizardController<F>,
    ) -> Result<TransitionOutcome, FlowTransitionError>
    where
        F: FlowDefinition,
    {
        selection.reset_preserving_contact();
        wizard.restart(selection)
    }
}
