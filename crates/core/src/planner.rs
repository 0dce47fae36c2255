use std::sync::Arc;

use crate::audit::{AuditCategory, AuditContext, AuditOutcome, AuditSink, NoopAuditSink};
use crate::confirmation::ConfirmationPresenter;
use crate::cpq::catalog::Catalog;
use crate::cpq::pricing::{DeterministicPricingEngine, PriceQuote, PricingEngine};
use crate::domain::booking::{Booking, UserId};
use crate::domain::selection::{SelectionState, SessionId};
use crate::errors::{ApplicationError, DomainError};
use crate::flows::{
    FlowTransitionError, TransitionOutcome, WizardController, WizardEvent, WizardScreen,
    WizardStep,
};
use crate::payment::{CheckoutError, PaymentBackend, PaymentCollector, PaymentOrchestrator};

/// One user's planning session: the selection, the wizard position and the
/// quote, kept consistent with each other.
pub struct PlannerSession<P = DeterministicPricingEngine> {
    catalog: Arc<Catalog>,
    pricing: P,
    selection: SelectionState,
    wizard: WizardController,
    quote: PriceQuote,
    confirmation: Option<ConfirmationPresenter>,
    /// A payment of this session went through but its booking was not saved.
    awaiting_save: bool,
    audit: AuditContext,
    audit_sink: Arc<dyn AuditSink>,
}

impl PlannerSession<DeterministicPricingEngine> {
    pub fn new(id: SessionId, catalog: Arc<Catalog>) -> Self {
        Self::with_pricing(id, catalog, DeterministicPricingEngine)
    }

    /// Session over a catalog supplied as JSON, validated before use.
    pub fn from_catalog_json(id: SessionId, raw: &str) -> Result<Self, ApplicationError> {
        let catalog = Catalog::from_json(raw).map_err(DomainError::from)?;
        Ok(Self::new(id, Arc::new(catalog)))
    }
}

impl<P> PlannerSession<P>
where
    P: PricingEngine,
{
    pub fn with_pricing(id: SessionId, catalog: Arc<Catalog>, pricing: P) -> Self {
        let selection = SelectionState::default();
        let quote = pricing.price(&selection, &catalog);
        let correlation_id = id.0.clone();
        Self {
            catalog,
            pricing,
            selection,
            wizard: WizardController::default(),
            quote,
            confirmation: None,
            awaiting_save: false,
            audit: AuditContext::new(Some(id), correlation_id, "planner"),
            audit_sink: Arc::new(NoopAuditSink),
        }
    }

    pub fn with_audit_sink(mut self, audit_sink: Arc<dyn AuditSink>) -> Self {
        self.audit_sink = audit_sink;
        self
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn selection(&self) -> &SelectionState {
        &self.selection
    }

    pub fn quote(&self) -> &PriceQuote {
        &self.quote
    }

    pub fn confirmation(&self) -> Option<&ConfirmationPresenter> {
        self.confirmation.as_ref()
    }

    pub fn awaiting_save(&self) -> bool {
        self.awaiting_save
    }

    pub fn current_step(&self) -> WizardStep {
        self.wizard.current_step()
    }

    pub fn step_number(&self) -> Option<u8> {
        self.wizard.step_number(&self.selection)
    }

    pub fn is_review(&self) -> bool {
        self.wizard.is_review(&self.selection)
    }

    pub fn screen(&self) -> WizardScreen {
        self.wizard.screen(&self.selection)
    }

    /// Applies one edit to the selection and reprices it.
    pub fn update<F>(&mut self, mutate: F) -> &PriceQuote
    where
        F: FnOnce(&mut SelectionState),
    {
        mutate(&mut self.selection);
        self.reprice();
        &self.quote
    }

    pub fn next(&mut self) -> Result<TransitionOutcome, FlowTransitionError> {
        self.navigate(WizardEvent::Next)
    }

    pub fn previous(&mut self) -> Result<TransitionOutcome, FlowTransitionError> {
        self.navigate(WizardEvent::Previous)
    }

    /// Pays the advance for the reviewed selection. On success the wizard moves
    /// to its confirmed screen.
    pub async fn checkout<B, C>(
        &mut self,
        orchestrator: &PaymentOrchestrator<B>,
        collector: &C,
        user_id: Option<&UserId>,
    ) -> Result<&ConfirmationPresenter, ApplicationError>
    where
        B: PaymentBackend,
        C: PaymentCollector + ?Sized,
    {
        if self.awaiting_save {
            return Err(CheckoutError::Precondition(
                "this session already paid; retry saving the booking instead".to_owned(),
            )
            .into());
        }
        if !self.is_review() {
            return Err(CheckoutError::Precondition(
                "checkout is only available from the review step".to_owned(),
            )
            .into());
        }

        let result = orchestrator
            .checkout(&self.selection, &self.quote, user_id, collector, &self.audit)
            .await;
        let booking = match result {
            Ok(booking) => booking,
            Err(error) => {
                self.awaiting_save = matches!(error, CheckoutError::Persistence { .. });
                return Err(error.into());
            }
        };
        self.confirm(booking)
    }

    /// Saves the booking for this session's paid-but-unsaved payment and
    /// confirms it. Nothing is charged.
    pub async fn retry_persistence<B>(
        &mut self,
        orchestrator: &PaymentOrchestrator<B>,
    ) -> Result<&ConfirmationPresenter, ApplicationError>
    where
        B: PaymentBackend,
    {
        if !self.awaiting_save {
            return Err(CheckoutError::Precondition(
                "this session has no payment waiting to be saved".to_owned(),
            )
            .into());
        }

        let booking = orchestrator.retry_persistence(&self.audit).await?;
        self.awaiting_save = false;
        self.confirm(booking)
    }

    /// Starts over. After a confirmed booking this is the presenter's reset.
    pub fn restart(&mut self) -> Result<TransitionOutcome, FlowTransitionError> {
        if self.awaiting_save {
            return Err(self.held_at_review(WizardEvent::Restart));
        }
        let outcome = match self.confirmation.take() {
            Some(confirmation) => confirmation.reset_to_step1(&mut self.selection, &mut self.wizard),
            None => {
                self.selection.reset_preserving_contact();
                self.wizard.restart(&self.selection)
            }
        }?;
        self.reprice();
        Ok(outcome)
    }

    fn confirm(&mut self, booking: Booking) -> Result<&ConfirmationPresenter, ApplicationError> {
        self.apply(WizardEvent::PaymentConfirmed).map_err(DomainError::from)?;
        Ok(self.confirmation.insert(ConfirmationPresenter::new(booking)))
    }

    /// A paid session stays on review until its booking is saved.
    fn navigate(&mut self, event: WizardEvent) -> Result<TransitionOutcome, FlowTransitionError> {
        if self.awaiting_save {
            return Err(self.held_at_review(event));
        }
        self.apply(event)
    }

    fn held_at_review(&self, event: WizardEvent) -> FlowTransitionError {
        FlowTransitionError::InvalidTransition { state: self.wizard.current_step(), event }
    }

    fn apply(&mut self, event: WizardEvent) -> Result<TransitionOutcome, FlowTransitionError> {
        self.wizard.apply_with_audit(event, &self.selection, self.audit_sink.as_ref(), &self.audit)
    }

    fn reprice(&mut self) {
        self.quote = self.pricing.price(&self.selection, &self.catalog);
        self.audit_sink.emit(
            self.audit
                .event("pricing.quote_recomputed", AuditCategory::Pricing, AuditOutcome::Success)
                .with_metadata("subtotal", self.quote.subtotal.to_string())
                .with_metadata("total", self.quote.total.to_string())
                .with_metadata("advance", self.quote.advance_amount.to_string()),
        );
    }
}
