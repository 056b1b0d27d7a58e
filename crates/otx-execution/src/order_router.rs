//! Broker Transport: deterministic delegation boundary between the gateway's
//! gate checks and a `BrokerAdapter`.
//!
//! # Purpose
//! This module defines the thin, immutable boundary through which submit,
//! cancel, and replace calls pass once `BrokerGateway`'s integrity/risk/
//! reconcile gates have cleared. It isolates that gate-enforcement layer
//! from broker-specific implementations, keeping the transport deterministic
//! and free of strategy, risk, or accounting concerns.
//!
//! # Why This Boundary Exists
//! - Separates gate enforcement (`BrokerGateway`) from order delivery (`BrokerAdapter`)
//! - Provides a single choke-point for logging, metrics, and pre-flight validation
//! - Enables pluggable broker adapters without changes to the gate layer
//!
//! # Why It Must Remain Thin
//! - Preserves deterministic behavior required for backtesting and simulation
//! - Avoids embedding business logic that belongs in risk or strategy modules
//! - Keeps the transport layer verifiable and low-risk
//!
//! # Pluggable Adapters
//! The `BrokerAdapter` trait lets any broker implementation be injected into
//! `BrokerTransport`, which stays agnostic to the underlying broker and
//! simply translates internal `ExecutionIntent` types into broker-agnostic
//! request structs. The only adapter shipped here is `MockBroker`, used by
//! the unit tests below; the paper broker (C3) and the order-routing
//! pipeline (C5) are built on `otx_broker::BrokerGateway` instead, not on
//! this trait — this repo has no live-broker adapter.

use crate::types::ExecutionIntent;

/// Convenience alias so all public items in this module can use `Result<T>`
/// without spelling out the error type everywhere.
type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;

/// Broker-agnostic order submission request
#[derive(Debug, Clone)]
pub struct BrokerSubmitRequest {
    /// Internal order identifier
    pub order_id: String,
    /// Instrument identifier (symbol)
    pub symbol: String,
    /// Order quantity (positive for buy, negative for sell)
    pub quantity: i32,
    /// Order type (market, limit, etc.) - simplified for boundary
    pub order_type: String,
    /// Limit price (if applicable)
    pub limit_price: Option<f64>,
    /// Time in force
    pub time_in_force: String,
}

/// Broker-agnostic order submission response
#[derive(Debug, Clone)]
pub struct BrokerSubmitResponse {
    /// Broker-assigned order identifier
    pub broker_order_id: String,
    /// Timestamp of submission acknowledgment
    pub submitted_at: u64,
    /// Status of the submission
    pub status: String,
}

/// Broker-agnostic order cancellation response
#[derive(Debug, Clone)]
pub struct BrokerCancelResponse {
    /// Broker-assigned order identifier
    pub broker_order_id: String,
    /// Timestamp of cancellation acknowledgment
    pub cancelled_at: u64,
    /// Status of the cancellation
    pub status: String,
}

/// Broker-agnostic order replacement request
#[derive(Debug, Clone)]
pub struct BrokerReplaceRequest {
    /// Existing broker-assigned order identifier
    pub broker_order_id: String,
    /// New quantity (positive for buy, negative for sell)
    pub quantity: i32,
    /// New limit price (if applicable)
    pub limit_price: Option<f64>,
    /// New time in force
    pub time_in_force: String,
}

/// Broker-agnostic order replacement response
#[derive(Debug, Clone)]
pub struct BrokerReplaceResponse {
    /// Broker-assigned order identifier (may be new if replaced)
    pub broker_order_id: String,
    /// Timestamp of replacement acknowledgment
    pub replaced_at: u64,
    /// Status of the replacement
    pub status: String,
}

/// Trait that all broker adapters must implement
///
/// This trait defines the minimal interface required for order routing.
/// Implementations handle the actual communication with broker systems
/// (REST APIs, FIX connections, etc.) while remaining opaque to the router.
pub trait BrokerAdapter {
    /// Submit a new order to the broker
    fn submit_order(&self, req: BrokerSubmitRequest) -> Result<BrokerSubmitResponse>;

    /// Cancel an existing order
    fn cancel_order(&self, order_id: &str) -> Result<BrokerCancelResponse>;

    /// Replace/modify an existing order
    fn replace_order(&self, req: BrokerReplaceRequest) -> Result<BrokerReplaceResponse>;
}

/// Deterministic transport that delegates to a broker adapter
///
/// This struct serves as the immutable boundary layer between internal
/// execution intents and external broker systems. It performs minimal,
/// deterministic transformations and delegates all broker-specific
/// communication to the injected `BrokerAdapter`.
pub struct BrokerTransport<B: BrokerAdapter> {
    broker: B,
}

impl<B: BrokerAdapter> BrokerTransport<B> {
    /// Create a new order router with the given broker adapter
    pub fn new(broker: B) -> Self {
        Self { broker }
    }

    /// Route an execution intent as a new order submission
    ///
    /// # Arguments
    /// * `intent` - Internal execution intent from the execution engine
    ///
    /// # Returns
    /// * `Ok(BrokerSubmitResponse)` - Broker acknowledgment
    /// * `Err` - Routing or broker error
    pub fn route_submit(&self, intent: ExecutionIntent) -> Result<BrokerSubmitResponse> {
        // Convert internal intent to broker-agnostic request
        let req = BrokerSubmitRequest {
            order_id: intent.order_id,
            symbol: intent.symbol,
            quantity: intent.quantity,
            order_type: intent.order_type,
            limit_price: intent.limit_price,
            time_in_force: intent.time_in_force,
        };

        // Delegate to broker adapter
        self.broker.submit_order(req)
    }

    /// Route an order cancellation request
    ///
    /// # Arguments
    /// * `order_id` - Internal order identifier to cancel
    ///
    /// # Returns
    /// * `Ok(BrokerCancelResponse)` - Broker acknowledgment
    /// * `Err` - Routing or broker error
    pub fn route_cancel(&self, order_id: &str) -> Result<BrokerCancelResponse> {
        self.broker.cancel_order(order_id)
    }

    /// Route an execution intent as an order replacement
    ///
    /// # Arguments
    /// * `intent` - Internal execution intent containing updated parameters
    ///
    /// # Returns
    /// * `Ok(BrokerReplaceResponse)` - Broker acknowledgment
    /// * `Err` - Routing or broker error
    pub fn route_replace(&self, intent: ExecutionIntent) -> Result<BrokerReplaceResponse> {
        // Convert internal intent to broker-agnostic replace request
        let req = BrokerReplaceRequest {
            broker_order_id: intent.order_id, // Note: This assumes internal ID matches broker ID
            quantity: intent.quantity,
            limit_price: intent.limit_price,
            time_in_force: intent.time_in_force,
        };

        self.broker.replace_order(req)
    }
}
