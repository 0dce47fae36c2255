pub mod engine;
pub mod states;

pub use engine::{
    transition_event_package, EventPackageFlow, FlowDefinition, FlowTransitionError,
    WizardController,
};
pub use states::{
    is_review_step, terminal_step_number, TransitionOutcome, WizardAction, WizardEvent,
    WizardScreen, WizardStep,
};
