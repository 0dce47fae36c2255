pub mod audit;
pub mod config;
pub mod confirmation;
pub mod cpq;
pub mod domain;
pub mod errors;
pub mod flows;
pub mod payment;
pub mod planner;

pub use audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
pub use confirmation::ConfirmationPresenter;
pub use cpq::{price_selection, Catalog, DeterministicPricingEngine, PriceQuote, PricingEngine};
pub use domain::booking::{Booking, BookingId, PackageDetails, PaymentStatus, UserId};
pub use domain::payment::{OrderId, PaymentId, PaymentOrder, PaymentOrderStatus};
pub use domain::selection::{SelectionState, SessionId};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use flows::{FlowTransitionError, WizardController, WizardStep};
pub use payment::{CheckoutError, CheckoutPhase, PaymentOrchestrator};
pub use planner::PlannerSession;
