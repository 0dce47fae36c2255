use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};

use crate::audit::{AuditCategory, AuditContext, AuditOutcome, AuditSink, NoopAuditSink};
use crate::config::CheckoutConfig;
use crate::cpq::pricing::PriceQuote;
use crate::domain::booking::{Booking, PackageDetails, PaymentStatus, UserId};
use crate::domain::payment::{OrderId, PaymentId};
use crate::domain::selection::SelectionState;
use crate::payment::gateway::{
    CreateOrderRequest, GatewayCheckout, GatewayOutcome, OrderTicket, PaymentBackend,
    PaymentCollector, PersistBookingRequest, Prefill, VerifyPaymentRequest,
};
use crate::payment::CheckoutError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CheckoutSettings {
    pub minimum_payable_total: i64,
}

impl Default for CheckoutSettings {
    fn default() -> Self {
        Self { minimum_payable_total: 1 }
    }
}

impl From<&CheckoutConfig> for CheckoutSettings {
    fn from(config: &CheckoutConfig) -> Self {
        Self { minimum_payable_total: config.minimum_payable_total }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutPhase {
    Idle,
    CreatingOrder,
    AwaitingGatewayResult,
    Verifying,
    Persisting,
    Confirmed,
    PaidButNotSaved,
}

impl CheckoutPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::CreatingOrder => "creating_order",
            Self::AwaitingGatewayResult => "awaiting_gateway_result",
            Self::Verifying => "verifying",
            Self::Persisting => "persisting",
            Self::Confirmed => "confirmed",
            Self::PaidButNotSaved => "paid_but_not_saved",
        }
    }
}

/// An order the backend issued for one checkout attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CheckoutOrder {
    pub ticket: OrderTicket,
    pub user_id: UserId,
    pub package_details: PackageDetails,
}

impl CheckoutOrder {
    pub fn gateway_checkout(&self) -> GatewayCheckout {
        GatewayCheckout {
            key: self.ticket.key.clone(),
            amount: self.ticket.amount,
            currency: self.ticket.currency.clone(),
            order_id: self.ticket.order_id.clone(),
            prefill: Prefill::from(&self.package_details.selection.contact_info),
        }
    }
}

/// A verified payment whose booking write failed. Kept for reconciliation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnsavedPayment {
    pub order: CheckoutOrder,
    pub payment_id: PaymentId,
    pub signature: String,
}

type PaymentTriple = (OrderId, PaymentId, String);

/// Drives one booking attempt from order creation to a saved booking.
pub struct PaymentOrchestrator<B> {
    backend: B,
    settings: CheckoutSettings,
    audit_sink: Arc<dyn AuditSink>,
    in_flight: AtomicBool,
    phase: Mutex<CheckoutPhase>,
    confirmed: Mutex<HashMap<PaymentTriple, Booking>>,
    unsaved: Mutex<Option<UnsavedPayment>>,
}

struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<B> PaymentOrchestrator<B>
where
    B: PaymentBackend,
{
    pub fn new(backend: B, settings: CheckoutSettings) -> Self {
        Self {
            backend,
            settings,
            audit_sink: Arc::new(NoopAuditSink),
            in_flight: AtomicBool::new(false),
            phase: Mutex::new(CheckoutPhase::Idle),
            confirmed: Mutex::new(HashMap::new()),
            unsaved: Mutex::new(None),
        }
    }

    pub fn with_audit_sink(mut self, audit_sink: Arc<dyn AuditSink>) -> Self {
        self.audit_sink = audit_sink;
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// True while any backend call or gateway handoff is outstanding.
    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    pub fn phase(&self) -> CheckoutPhase {
        *lock(&self.phase)
    }

    pub fn unsaved_payment(&self) -> Option<UnsavedPayment> {
        lock(&self.unsaved).clone()
    }

    pub async fn create_order(
        &self,
        selection: &SelectionState,
        quote: &PriceQuote,
        user_id: Option<&UserId>,
        audit: &AuditContext,
    ) -> Result<CheckoutOrder, CheckoutError> {
        let _guard = self.begin()?;
        self.issue_order(selection, quote, user_id, audit).await
    }

    /// Verifies a gateway result and saves the booking. Replaying a triple that
    /// already produced a booking returns it without touching the backend.
    pub async fn confirm_payment(
        &self,
        order: &CheckoutOrder,
        payment_id: PaymentId,
        signature: String,
        audit: &AuditContext,
    ) -> Result<Booking, CheckoutError> {
        let _guard = self.begin()?;
        self.verify_and_persist(order, payment_id, signature, audit).await
    }

    pub async fn checkout<C>(
        &self,
        selection: &SelectionState,
        quote: &PriceQuote,
        user_id: Option<&UserId>,
        collector: &C,
        audit: &AuditContext,
    ) -> Result<Booking, CheckoutError>
    where
        C: PaymentCollector + ?Sized,
    {
        let _guard = self.begin()?;
        let order = self.issue_order(selection, quote, user_id, audit).await?;

        self.set_phase(CheckoutPhase::AwaitingGatewayResult, audit);
        match collector.collect(order.gateway_checkout()).await {
            GatewayOutcome::Paid { payment_id, signature } => {
                self.verify_and_persist(&order, payment_id, signature, audit).await
            }
            GatewayOutcome::Dismissed => Err(self.fail(
                CheckoutError::Gateway("payment window was closed before completion".to_owned()),
                audit,
            )),
            GatewayOutcome::Failed { reason } => Err(self.fail(CheckoutError::Gateway(reason), audit)),
        }
    }

    /// Re-sends the booking write for a payment that was verified but not saved.
    /// The gateway is never charged again.
    pub async fn retry_persistence(&self, audit: &AuditContext) -> Result<Booking, CheckoutError> {
        let _guard = self.begin()?;
        let Some(unsaved) = self.unsaved_payment() else {
            return Err(CheckoutError::Precondition(
                "there is no unsaved payment to retry".to_owned(),
            ));
        };
        self.persist(&unsaved.order, unsaved.payment_id, unsaved.signature, audit).await
    }

    fn begin(&self) -> Result<InFlightGuard<'_>, CheckoutError> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| InFlightGuard(&self.in_flight))
            .map_err(|_| CheckoutError::InFlight)
    }

    async fn issue_order(
        &self,
        selection: &SelectionState,
        quote: &PriceQuote,
        user_id: Option<&UserId>,
        audit: &AuditContext,
    ) -> Result<CheckoutOrder, CheckoutError> {
        let user_id = match self.check_preconditions(selection, quote, user_id) {
            Ok(user_id) => user_id,
            Err(error) => {
                self.audit_sink.emit(
                    audit
                        .event(
                            "payment.precondition_failed",
                            AuditCategory::Payment,
                            AuditOutcome::Rejected,
                        )
                        .with_metadata("error", error.to_string()),
                );
                return Err(error);
            }
        };

        self.set_phase(CheckoutPhase::CreatingOrder, audit);
        let request = CreateOrderRequest {
            amount: quote.advance_amount,
            user_id,
            package_details: PackageDetails::capture(selection, quote),
        };

        let ticket = match self.backend.create_order(&request).await {
            Ok(ticket) => ticket,
            Err(error) => return Err(self.fail(CheckoutError::OrderCreation(error.to_string()), audit)),
        };
        if ticket.order_id.0.trim().is_empty() || ticket.key.trim().is_empty() {
            return Err(self.fail(
                CheckoutError::OrderCreation("response is missing orderId or key".to_owned()),
                audit,
            ));
        }
        if ticket.amount != request.amount {
            return Err(self.fail(
                CheckoutError::OrderCreation(format!(
                    "order amount {} does not match the advance {}",
                    ticket.amount, request.amount
                )),
                audit,
            ));
        }

        self.audit_sink.emit(
            audit
                .event("payment.order_created", AuditCategory::Payment, AuditOutcome::Success)
                .with_metadata("order_id", ticket.order_id.0.clone())
                .with_metadata("amount", ticket.amount.to_string()),
        );

        Ok(CheckoutOrder {
            ticket,
            user_id: request.user_id,
            package_details: request.package_details,
        })
    }

    fn check_preconditions(
        &self,
        selection: &SelectionState,
        quote: &PriceQuote,
        user_id: Option<&UserId>,
    ) -> Result<UserId, CheckoutError> {
        if let Some(unsaved) = lock(&self.unsaved).as_ref() {
            return Err(CheckoutError::Precondition(format!(
                "payment {} is waiting to be saved; retry saving it before paying again",
                unsaved.payment_id
            )));
        }
        if !selection.terms_accepted {
            return Err(CheckoutError::Precondition(
                "terms and conditions must be accepted before payment".to_owned(),
            ));
        }
        let user_id = match user_id {
            Some(user_id) if !user_id.0.trim().is_empty() => user_id.clone(),
            _ => {
                return Err(CheckoutError::Precondition("sign in before paying".to_owned()));
            }
        };
        if quote.total < self.settings.minimum_payable_total {
            return Err(CheckoutError::Precondition(format!(
                "total {} is below the minimum payable total {}",
                quote.total, self.settings.minimum_payable_total
            )));
        }
        Ok(user_id)
    }

    async fn verify_and_persist(
        &self,
        order: &CheckoutOrder,
        payment_id: PaymentId,
        signature: String,
        audit: &AuditContext,
    ) -> Result<Booking, CheckoutError> {
        let triple = (order.ticket.order_id.clone(), payment_id.clone(), signature.clone());
        let replayed = lock(&self.confirmed).get(&triple).cloned();
        if let Some(booking) = replayed {
            self.set_phase(CheckoutPhase::Confirmed, audit);
            self.audit_sink.emit(
                audit
                    .event(
                        "payment.verification_replayed",
                        AuditCategory::Payment,
                        AuditOutcome::Success,
                    )
                    .with_metadata("booking_id", booking.id.0.clone()),
            );
            return Ok(booking);
        }

        self.set_phase(CheckoutPhase::Verifying, audit);
        let request = VerifyPaymentRequest {
            order_id: order.ticket.order_id.clone(),
            payment_id: payment_id.clone(),
            signature: signature.clone(),
        };
        match self.backend.verify_payment(&request).await {
            Ok(response) if response.success => {}
            Ok(_) => {
                return Err(self.fail(
                    CheckoutError::Verification("the payment signature was rejected".to_owned()),
                    audit,
                ))
            }
            Err(error) => {
                return Err(self.fail(CheckoutError::Verification(error.to_string()), audit))
            }
        }

        self.audit_sink.emit(
            audit
                .event("payment.verified", AuditCategory::Payment, AuditOutcome::Success)
                .with_metadata("order_id", order.ticket.order_id.0.clone())
                .with_metadata("payment_id", payment_id.0.clone()),
        );

        self.persist(order, payment_id, signature, audit).await
    }

    async fn persist(
        &self,
        order: &CheckoutOrder,
        payment_id: PaymentId,
        signature: String,
        audit: &AuditContext,
    ) -> Result<Booking, CheckoutError> {
        self.set_phase(CheckoutPhase::Persisting, audit);
        let quote = &order.package_details.quote;
        let request = PersistBookingRequest {
            user_id: order.user_id.clone(),
            package_details: order.package_details.clone(),
            payment_id: payment_id.clone(),
            total_amount: quote.total,
            advance_amount: quote.advance_amount,
            remaining_amount: quote.remaining_amount,
            payment_status: PaymentStatus::AdvancePaid,
        };

        match self.backend.persist_booking(&request).await {
            Ok(booking) => {
                *lock(&self.unsaved) = None;
                lock(&self.confirmed).insert(
                    (order.ticket.order_id.clone(), payment_id, signature),
                    booking.clone(),
                );
                self.set_phase(CheckoutPhase::Confirmed, audit);
                self.audit_sink.emit(
                    audit
                        .event(
                            "payment.booking_persisted",
                            AuditCategory::Persistence,
                            AuditOutcome::Success,
                        )
                        .with_metadata("booking_id", booking.id.0.clone()),
                );
                Ok(booking)
            }
            Err(error) => {
                let order_id = order.ticket.order_id.clone();
                *lock(&self.unsaved) = Some(UnsavedPayment {
                    order: order.clone(),
                    payment_id: payment_id.clone(),
                    signature,
                });
                self.set_phase(CheckoutPhase::PaidButNotSaved, audit);
                self.audit_sink.emit(
                    audit
                        .event(
                            "payment.booking_not_saved",
                            AuditCategory::Persistence,
                            AuditOutcome::Failed,
                        )
                        .with_metadata("order_id", order_id.0.clone())
                        .with_metadata("payment_id", payment_id.0.clone())
                        .with_metadata("error", error.to_string()),
                );
                Err(CheckoutError::Persistence { order_id, payment_id, message: error.to_string() })
            }
        }
    }

    fn set_phase(&self, next: CheckoutPhase, audit: &AuditContext) {
        let previous = std::mem::replace(&mut *lock(&self.phase), next);
        if previous != next {
            self.audit_sink.emit(
                audit
                    .event("payment.phase_changed", AuditCategory::Payment, AuditOutcome::Success)
                    .with_metadata("from", previous.as_str())
                    .with_metadata("to", next.as_str()),
            );
        }
    }

    fn fail(&self, error: CheckoutError, audit: &AuditContext) -> CheckoutError {
        let stage = self.phase();
        self.set_phase(CheckoutPhase::Idle, audit);
        self.audit_sink.emit(
            audit
                .event("payment.failed", AuditCategory::Payment, AuditOutcome::Failed)
                .with_metadata("stage", stage.as_str())
                .with_metadata("error", error.to_string()),
        );
        error
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use chrono::Utc;

    use super::{CheckoutPhase, CheckoutSettings, PaymentOrchestrator};
    use crate::audit::{AuditContext, InMemoryAuditSink};
    use crate::cpq::catalog::Catalog;
    use crate::cpq::pricing::{price_selection, PriceQuote};
    use crate::domain::booking::{Booking, BookingId, UserId};
    use crate::domain::payment::{OrderId, PaymentId};
    use crate::domain::selection::SelectionState;
    use crate::domain::service::{DecorThemeId, EventTypeId};
    use crate::payment::gateway::{
        BackendError, ChannelPaymentCollector, CreateOrderRequest, GatewayCheckout,
        GatewayOutcome, OrderTicket, PaymentBackend, PaymentCollector, PersistBookingRequest,
        VerifyPaymentRequest, VerifyPaymentResponse,
    };
    use crate::payment::CheckoutError;

    #[derive(Default)]
    struct FakeBackend {
        calls: Mutex<Vec<&'static str>>,
        create_error: Option<BackendError>,
        blank_key: bool,
        ticket_amount: Option<i64>,
        reject_signature: bool,
        persist_failures: AtomicUsize,
        requested_amounts: Mutex<Vec<i64>>,
    }

    impl FakeBackend {
        fn calls(&self) -> Vec<&'static str> {
            self.calls.lock().expect("calls lock").clone()
        }

        fn record(&self, call: &'static str) {
            self.calls.lock().expect("calls lock").push(call);
        }
    }

    #[async_trait]
    impl PaymentBackend for FakeBackend {
        async fn create_order(
            &self,
            request: &CreateOrderRequest,
        ) -> Result<OrderTicket, BackendError> {
            self.record("create_order");
            self.requested_amounts.lock().expect("amounts lock").push(request.amount);
            if let Some(error) = &self.create_error {
                return Err(error.clone());
            }
            Ok(OrderTicket {
                order_id: OrderId("order_test".to_owned()),
                key: if self.blank_key { String::new() } else { "rzp_test".to_owned() },
                amount: self.ticket_amount.unwrap_or(request.amount),
                currency: "INR".to_owned(),
            })
        }

        async fn verify_payment(
            &self,
            _request: &VerifyPaymentRequest,
        ) -> Result<VerifyPaymentResponse, BackendError> {
            self.record("verify_payment");
            Ok(VerifyPaymentResponse { success: !self.reject_signature })
        }

        async fn persist_booking(
            &self,
            request: &PersistBookingRequest,
        ) -> Result<Booking, BackendError> {
            self.record("persist_booking");
            let remaining_failures = self.persist_failures.load(Ordering::SeqCst);
            if remaining_failures > 0 {
                self.persist_failures.store(remaining_failures - 1, Ordering::SeqCst);
                return Err(BackendError::Status { status: 503, body: "unavailable".to_owned() });
            }
            Ok(Booking {
                id: BookingId("booking_1".to_owned()),
                user_id: request.user_id.clone(),
                order_id: OrderId("order_test".to_owned()),
                payment_id: request.payment_id.clone(),
                package_details: request.package_details.clone(),
                total_amount: request.total_amount,
                advance_amount: request.advance_amount,
                remaining_amount: request.remaining_amount,
                payment_status: request.payment_status,
                created_at: Utc::now(),
            })
        }
    }

    struct FixedCollector(GatewayOutcome);

    #[async_trait]
    impl PaymentCollector for FixedCollector {
        async fn collect(&self, _checkout: GatewayCheckout) -> GatewayOutcome {
            self.0.clone()
        }
    }

    fn paid() -> FixedCollector {
        FixedCollector(GatewayOutcome::Paid {
            payment_id: PaymentId("pay_1".to_owned()),
            signature: "sig".to_owned(),
        })
    }

    fn ready_selection() -> (SelectionState, PriceQuote) {
        let mut selection = SelectionState {
            event_type: Some(EventTypeId::new("wedding")),
            terms_accepted: true,
            ..SelectionState::default()
        };
        selection.selected_services.decor.theme = Some(DecorThemeId::new("floral"));
        let quote = price_selection(&selection, &Catalog::standard());
        (selection, quote)
    }

    fn user() -> UserId {
        UserId("user_42".to_owned())
    }

    fn audit() -> AuditContext {
        AuditContext::new(None, "req-1", "checkout")
    }

    fn orchestrator(backend: FakeBackend) -> PaymentOrchestrator<FakeBackend> {
        PaymentOrchestrator::new(backend, CheckoutSettings::default())
    }

    #[tokio::test]
    async fn successful_checkout_charges_the_advance_and_saves_one_booking() {
        let orchestrator = orchestrator(FakeBackend::default());
        let (selection, quote) = ready_selection();

        let booking = orchestrator
            .checkout(&selection, &quote, Some(&user()), &paid(), &audit())
            .await
            .expect("checkout succeeds");

        assert_eq!(booking.total_amount, 15_750);
        assert_eq!(booking.advance_amount, 3_150);
        assert_eq!(booking.remaining_amount, 12_600);
        assert_eq!(
            orchestrator.backend().calls(),
            vec!["create_order", "verify_payment", "persist_booking"]
        );
        assert_eq!(
            *orchestrator.backend().requested_amounts.lock().expect("amounts lock"),
            vec![3_150]
        );
        assert_eq!(orchestrator.phase(), CheckoutPhase::Confirmed);
        assert!(!orchestrator.is_busy());
    }

    #[tokio::test]
    async fn unaccepted_terms_fail_before_any_request() {
        let orchestrator = orchestrator(FakeBackend::default());
        let (mut selection, quote) = ready_selection();
        selection.terms_accepted = false;

        let error = orchestrator
            .create_order(&selection, &quote, Some(&user()), &audit())
            .await
            .expect_err("terms required");

        assert!(matches!(error, CheckoutError::Precondition(_)));
        assert!(orchestrator.backend().calls().is_empty());
        assert_eq!(orchestrator.phase(), CheckoutPhase::Idle);
    }

    #[tokio::test]
    async fn missing_identity_fails_before_any_request() {
        let orchestrator = orchestrator(FakeBackend::default());
        let (selection, quote) = ready_selection();

        let anonymous = orchestrator.create_order(&selection, &quote, None, &audit()).await;
        let blank = orchestrator
            .create_order(&selection, &quote, Some(&UserId("  ".to_owned())), &audit())
            .await;

        assert!(matches!(anonymous, Err(CheckoutError::Precondition(_))));
        assert!(matches!(blank, Err(CheckoutError::Precondition(_))));
        assert!(orchestrator.backend().calls().is_empty());
    }

    #[tokio::test]
    async fn zero_total_respects_minimum_payable_total() {
        let selection = SelectionState { terms_accepted: true, ..SelectionState::default() };
        let quote = price_selection(&selection, &Catalog::standard());
        assert_eq!(quote.total, 0);

        let strict = orchestrator(FakeBackend::default());
        let error = strict
            .create_order(&selection, &quote, Some(&user()), &audit())
            .await
            .expect_err("zero total rejected by default");
        assert!(matches!(error, CheckoutError::Precondition(ref message) if message.contains("minimum")));
        assert!(strict.backend().calls().is_empty());

        let lenient = PaymentOrchestrator::new(
            FakeBackend::default(),
            CheckoutSettings { minimum_payable_total: 0 },
        );
        lenient
            .create_order(&selection, &quote, Some(&user()), &audit())
            .await
            .expect("zero total allowed when configured");
        assert_eq!(lenient.backend().calls(), vec!["create_order"]);
    }

    #[tokio::test]
    async fn order_creation_failure_returns_to_idle() {
        let orchestrator = orchestrator(FakeBackend {
            create_error: Some(BackendError::Timeout),
            ..FakeBackend::default()
        });
        let (selection, quote) = ready_selection();

        let error = orchestrator
            .checkout(&selection, &quote, Some(&user()), &paid(), &audit())
            .await
            .expect_err("order creation fails");

        assert!(matches!(error, CheckoutError::OrderCreation(_)));
        assert_eq!(orchestrator.backend().calls(), vec!["create_order"]);
        assert_eq!(orchestrator.phase(), CheckoutPhase::Idle);
    }

    #[tokio::test]
    async fn ticket_without_key_is_an_order_creation_failure() {
        let orchestrator =
            orchestrator(FakeBackend { blank_key: true, ..FakeBackend::default() });
        let (selection, quote) = ready_selection();

        let error = orchestrator
            .create_order(&selection, &quote, Some(&user()), &audit())
            .await
            .expect_err("blank key is malformed");

        assert!(matches!(error, CheckoutError::OrderCreation(_)));
    }

    #[tokio::test]
    async fn ticket_for_a_different_amount_never_reaches_the_gateway() {
        let orchestrator =
            orchestrator(FakeBackend { ticket_amount: Some(1), ..FakeBackend::default() });
        let (selection, quote) = ready_selection();

        let error = orchestrator
            .checkout(&selection, &quote, Some(&user()), &paid(), &audit())
            .await
            .expect_err("amount mismatch is malformed");

        assert!(
            matches!(error, CheckoutError::OrderCreation(ref message) if message.contains("3150"))
        );
        assert_eq!(orchestrator.backend().calls(), vec!["create_order"]);
        assert_eq!(orchestrator.phase(), CheckoutPhase::Idle);
    }

    #[tokio::test]
    async fn dismissed_gateway_skips_verification() {
        let orchestrator = orchestrator(FakeBackend::default());
        let (selection, quote) = ready_selection();

        let error = orchestrator
            .checkout(
                &selection,
                &quote,
                Some(&user()),
                &FixedCollector(GatewayOutcome::Dismissed),
                &audit(),
            )
            .await
            .expect_err("dismissed payment fails");

        assert!(matches!(error, CheckoutError::Gateway(_)));
        assert_eq!(orchestrator.backend().calls(), vec!["create_order"]);
        assert_eq!(orchestrator.phase(), CheckoutPhase::Idle);
    }

    #[tokio::test]
    async fn rejected_signature_is_a_verification_failure() {
        let orchestrator =
            orchestrator(FakeBackend { reject_signature: true, ..FakeBackend::default() });
        let (selection, quote) = ready_selection();

        let error = orchestrator
            .checkout(&selection, &quote, Some(&user()), &paid(), &audit())
            .await
            .expect_err("verification rejected");

        assert!(matches!(error, CheckoutError::Verification(_)));
        assert_eq!(orchestrator.backend().calls(), vec!["create_order", "verify_payment"]);
        assert_eq!(orchestrator.phase(), CheckoutPhase::Idle);
    }

    #[tokio::test]
    async fn persistence_failure_is_reported_separately_and_can_be_retried() {
        let orchestrator = orchestrator(FakeBackend {
            persist_failures: AtomicUsize::new(1),
            ..FakeBackend::default()
        });
        let (selection, quote) = ready_selection();

        let error = orchestrator
            .checkout(&selection, &quote, Some(&user()), &paid(), &audit())
            .await
            .expect_err("booking write fails");

        assert_eq!(
            error,
            CheckoutError::Persistence {
                order_id: OrderId("order_test".to_owned()),
                payment_id: PaymentId("pay_1".to_owned()),
                message: "backend responded with status 503: unavailable".to_owned(),
            }
        );
        assert_eq!(orchestrator.phase(), CheckoutPhase::PaidButNotSaved);
        assert!(orchestrator.unsaved_payment().is_some());

        let blocked = orchestrator
            .checkout(&selection, &quote, Some(&user()), &paid(), &audit())
            .await
            .expect_err("new payment blocked until saved");
        assert!(matches!(blocked, CheckoutError::Precondition(_)));

        let booking = orchestrator.retry_persistence(&audit()).await.expect("retry saves");
        assert_eq!(booking.payment_id, PaymentId("pay_1".to_owned()));
        assert_eq!(orchestrator.phase(), CheckoutPhase::Confirmed);
        assert!(orchestrator.unsaved_payment().is_none());
        assert_eq!(
            orchestrator.backend().calls(),
            vec!["create_order", "verify_payment", "persist_booking", "persist_booking"]
        );
    }

    #[tokio::test]
    async fn retry_without_unsaved_payment_is_a_precondition_error() {
        let orchestrator = orchestrator(FakeBackend::default());
        let error = orchestrator.retry_persistence(&audit()).await.expect_err("nothing to retry");
        assert!(matches!(error, CheckoutError::Precondition(_)));
    }

    #[tokio::test]
    async fn confirming_the_same_payment_twice_creates_one_booking() {
        let orchestrator = orchestrator(FakeBackend::default());
        let (selection, quote) = ready_selection();
        let order = orchestrator
            .create_order(&selection, &quote, Some(&user()), &audit())
            .await
            .expect("order issued");

        let first = orchestrator
            .confirm_payment(&order, PaymentId("pay_9".to_owned()), "sig".to_owned(), &audit())
            .await
            .expect("first confirmation");
        let second = orchestrator
            .confirm_payment(&order, PaymentId("pay_9".to_owned()), "sig".to_owned(), &audit())
            .await
            .expect("replayed confirmation");

        assert_eq!(first, second);
        assert_eq!(
            orchestrator.backend().calls(),
            vec!["create_order", "verify_payment", "persist_booking"]
        );
    }

    #[tokio::test]
    async fn second_invocation_while_in_flight_is_rejected_without_requests() {
        let orchestrator = orchestrator(FakeBackend::default());
        let (selection, quote) = ready_selection();
        let (collector, mut receiver) = ChannelPaymentCollector::new(1);
        let audit = audit();
        let user = user();

        let gateway = async {
            let pending = receiver.recv().await.expect("checkout handed to gateway");
            assert!(orchestrator.is_busy());
            assert_eq!(orchestrator.phase(), CheckoutPhase::AwaitingGatewayResult);

            let duplicate =
                orchestrator.create_order(&selection, &quote, Some(&user), &audit).await;
            assert_eq!(duplicate, Err(CheckoutError::InFlight));

            pending.resolve(GatewayOutcome::Paid {
                payment_id: PaymentId("pay_2".to_owned()),
                signature: "sig".to_owned(),
            });
        };

        let (result, ()) = tokio::join!(
            orchestrator.checkout(&selection, &quote, Some(&user), &collector, &audit),
            gateway
        );

        result.expect("checkout completes");
        assert_eq!(
            orchestrator.backend().calls(),
            vec!["create_order", "verify_payment", "persist_booking"]
        );
        assert!(!orchestrator.is_busy());
    }

    #[tokio::test]
    async fn phase_changes_are_audited() {
        let sink = InMemoryAuditSink::default();
        let orchestrator =
            orchestrator(FakeBackend::default()).with_audit_sink(Arc::new(sink.clone()));
        let (selection, quote) = ready_selection();

        orchestrator
            .checkout(&selection, &quote, Some(&user()), &paid(), &audit())
            .await
            .expect("checkout succeeds");

        let phases: Vec<String> = sink
            .events()
            .into_iter()
            .filter(|event| event.event_type == "payment.phase_changed")
            .filter_map(|event| event.metadata.get("to").cloned())
            .collect();
        assert_eq!(
            phases,
            vec!["creating_order", "awaiting_gateway_result", "verifying", "persisting", "confirmed"]
        );
        assert!(sink.event_types().contains(&"payment.booking_persisted".to_owned()));
    }
}
