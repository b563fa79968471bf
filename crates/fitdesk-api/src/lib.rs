//! # fitdesk-api
//!
//! Clients for the FitDesk payment and membership backends, plus the checkout
//! flow that ties them to [`fitdesk_checkout`].
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        CheckoutFlow                          │
//! │  ┌──────────────┐   ┌───────────────┐   ┌─────────────────┐  │
//! │  │ PaymentInput │──▶│  BinResolver  │──▶│   PaymentApi    │  │
//! │  │  (resolver)  │   │ (seq tickets) │   │   (Strategy)    │  │
//! │  └──────────────┘   └───────────────┘   └─────────────────┘  │
//! │          │                                      ▲            │
//! │          ▼                                      │            │
//! │  build_payment_request ◀── MembershipApi (prices, proration) │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! `PaymentApi` and `MembershipApi` have HTTP implementations for the real
//! backend and in-memory mocks for tests and demos.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use fitdesk_api::{ApiConfig, CheckoutFlow, HttpMembershipApi, HttpPaymentApi};
//!
//! let config = ApiConfig::from_env().with_token(session_token);
//! let payments = Arc::new(HttpPaymentApi::new(config.clone())?);
//! let membership = Arc::new(HttpMembershipApi::new(config)?);
//!
//! let flow = CheckoutFlow::upgrade(payments, membership, session, plan);
//! let amount = flow.refresh_charge_amount().await?;
//!
//! let (shown, ticket) = flow.on_card_number(&mut input, "4111 1111 1111 1111");
//! if let Some(ticket) = ticket {
//!     flow.resolve_payment_method(&mut input, &ticket).await?;
//! }
//! let outcome = flow.submit(&input, None).await?;
//! ```

mod bin_lookup;
mod config;
mod error;
mod flow;
mod http;
mod membership;
mod mock;
mod payment;

pub use bin_lookup::{BinLookupTracker, BinResolver, BinTicket};
pub use config::ApiConfig;
pub use error::{ApiError, Result};
pub use flow::{CheckoutFlow, CheckoutKind, SubmissionState};
pub use http::IDEMPOTENCY_HEADER;
pub use membership::{HttpMembershipApi, MembershipApi};
pub use mock::{MockMembershipApi, MockPaymentApi};
pub use payment::{CardToken, CardTokenRequest, HttpPaymentApi, PaymentApi};
