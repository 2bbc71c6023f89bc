//! Check-in coordinator.
//!
//! Given a scanned QR token and the identity of the scanner, decides
//! `valid`, `used`, `invalid` or `error` and records exactly one scan-log
//! entry for the attempt. Admission goes through an optimistic
//! compare-and-set on the ticket's `check_in_count`; on a lost race the
//! ticket is re-read and the decision re-made from the voided/exhausted
//! checks, so the N+1-th concurrent scan of an N-entry ticket sees `used`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::models::ticket::Holder;
use crate::models::{ScanLogEntry, ScanResult, ScanSource, Ticket, TicketStatus};
use crate::services::scanner_auth::ScannerIdentity;
use crate::services::token::{TicketClaims, TokenCodec, TokenError};
use crate::store::{ScanLog, StoreError, TicketStore};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Ticket details returned to the gate on a `valid` scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdmittedTicket {
    pub id: Uuid,
    pub ticket_type_id: Uuid,
    pub holder_name: Option<String>,
    pub holder_email: Option<String>,
    pub holder_phone: Option<String>,
    pub remaining_entries: i32,
}

impl From<&Ticket> for AdmittedTicket {
    fn from(ticket: &Ticket) -> Self {
        let Holder { name, email, phone } = ticket.holder();
        Self {
            id: ticket.id,
            ticket_type_id: ticket.ticket_type_id,
            holder_name: name,
            holder_email: email,
            holder_phone: phone,
            remaining_entries: ticket.remaining_entries(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanOutcome {
    pub result: ScanResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ticket: Option<AdmittedTicket>,
    pub scan_time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Why a credential did not admit. These are business outcomes, not faults.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Rejection {
    InvalidToken(TokenError),
    TicketNotFound,
    CodeMismatch,
    TicketVoided(TicketStatus),
    TicketExhausted,
}

impl Rejection {
    fn result(&self) -> ScanResult {
        match self {
            Rejection::TicketExhausted => ScanResult::Used,
            _ => ScanResult::Invalid,
        }
    }

    fn message(&self) -> &'static str {
        match self {
            Rejection::InvalidToken(_) => "Ticket code not recognised",
            Rejection::TicketNotFound => "Ticket not found",
            Rejection::CodeMismatch => "Ticket code does not match",
            Rejection::TicketVoided(TicketStatus::Refunded) => "Ticket has been refunded",
            Rejection::TicketVoided(_) => "Ticket has been cancelled",
            Rejection::TicketExhausted => "Ticket already used",
        }
    }
}

#[derive(Debug, thiserror::Error)]
enum CheckInFailure {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("gave up after {0} conflicting attempts")]
    Contention(u32),
}

enum Decision {
    Admitted {
        ticket: Ticket,
        entry: ScanLogEntry,
        attempts: u32,
    },
    Rejected {
        ticket_id: Option<Uuid>,
        rejection: Rejection,
        attempts: u32,
    },
}

pub struct CheckInCoordinator {
    codec: TokenCodec,
    tickets: Arc<dyn TicketStore>,
    scan_log: Arc<dyn ScanLog>,
    max_attempts: u32,
}

impl CheckInCoordinator {
    pub fn new(
        codec: TokenCodec,
        tickets: Arc<dyn TicketStore>,
        scan_log: Arc<dyn ScanLog>,
        max_attempts: u32,
    ) -> Self {
        Self {
            codec,
            tickets,
            scan_log,
            max_attempts: max_attempts.max(1),
        }
    }

    #[tracing::instrument(
        name = "check_in",
        skip_all,
        fields(scanner_id = %scanner.scanner_id, source = ?source)
    )]
    pub async fn attempt_check_in(
        &self,
        token: &str,
        scanner: &ScannerIdentity,
        source: ScanSource,
    ) -> ScanOutcome {
        let claims = match self.codec.decode::<TicketClaims>(token) {
            Ok(claims) => claims,
            Err(err) => {
                let rejection = Rejection::InvalidToken(err);
                return self.reject(None, rejection, 0, scanner, source).await;
            }
        };

        match self.decide(&claims, scanner, source).await {
            Ok(Decision::Admitted {
                ticket,
                entry,
                attempts,
            }) => {
                info!(
                    ticket_id = %ticket.id,
                    scanner_id = %scanner.scanner_id,
                    result = "valid",
                    attempts,
                    count = ticket.check_in_count,
                    "Ticket admitted"
                );
                ScanOutcome {
                    result: ScanResult::Valid,
                    ticket: Some(AdmittedTicket::from(&ticket)),
                    scan_time: entry.scan_time,
                    message: Some("Check-in successful".to_string()),
                }
            }
            Ok(Decision::Rejected {
                ticket_id,
                rejection,
                attempts,
            }) => {
                self.reject(ticket_id, rejection, attempts, scanner, source)
                    .await
            }
            Err(err) => {
                error!(
                    ticket_id = %claims.ticket_id,
                    scanner_id = %scanner.scanner_id,
                    result = "error",
                    error = %err,
                    "Check-in failed"
                );
                self.fail(Some(claims.ticket_id), scanner, source).await
            }
        }
    }

    /// Re-reads and re-evaluates the ticket after every lost race, up to
    /// `max_attempts` times.
    async fn decide(
        &self,
        claims: &TicketClaims,
        scanner: &ScannerIdentity,
        source: ScanSource,
    ) -> Result<Decision, CheckInFailure> {
        for attempt in 1..=self.max_attempts {
            let Some(ticket) = self.tickets.find_ticket(claims.ticket_id).await? else {
                return Ok(Decision::Rejected {
                    ticket_id: None,
                    rejection: Rejection::TicketNotFound,
                    attempts: attempt,
                });
            };

            if let Err(rejection) = evaluate(&ticket, claims) {
                return Ok(Decision::Rejected {
                    ticket_id: Some(ticket.id),
                    rejection,
                    attempts: attempt,
                });
            }

            let entry = ScanLogEntry::record(
                Some(ticket.id),
                scanner.scanner_id,
                ScanResult::Valid,
                source,
            );
            match self
                .tickets
                .commit_check_in(ticket.id, ticket.check_in_count, &entry)
                .await?
            {
                Some(ticket) => {
                    return Ok(Decision::Admitted {
                        ticket,
                        entry,
                        attempts: attempt,
                    })
                }
                None => {
                    debug!(
                        ticket_id = %ticket.id,
                        observed = ticket.check_in_count,
                        attempt,
                        "Concurrent check-in won, re-evaluating"
                    );
                }
            }
        }

        Err(CheckInFailure::Contention(self.max_attempts))
    }

    async fn reject(
        &self,
        ticket_id: Option<Uuid>,
        rejection: Rejection,
        attempts: u32,
        scanner: &ScannerIdentity,
        source: ScanSource,
    ) -> ScanOutcome {
        let result = rejection.result();
        let entry = ScanLogEntry::record(ticket_id, scanner.scanner_id, result, source);

        if let Err(err) = self.scan_log.append(&entry).await {
            error!(error = %err, ?result, "Failed to record rejected scan");
            return self.fail(ticket_id, scanner, source).await;
        }

        let scanner_id = scanner.scanner_id;
        match &rejection {
            Rejection::InvalidToken(err) => warn!(
                %scanner_id,
                result = "invalid",
                attempts,
                reason = %err,
                "Rejected unauthenticated token"
            ),
            Rejection::TicketExhausted => info!(
                ticket_id = ?ticket_id,
                %scanner_id,
                result = "used",
                attempts,
                "Ticket already used"
            ),
            other => warn!(
                ticket_id = ?ticket_id,
                %scanner_id,
                result = "invalid",
                attempts,
                reason = ?other,
                "Ticket rejected"
            ),
        }

        ScanOutcome {
            result,
            ticket: None,
            scan_time: entry.scan_time,
            message: Some(rejection.message().to_string()),
        }
    }

    async fn fail(
        &self,
        ticket_id: Option<Uuid>,
        scanner: &ScannerIdentity,
        source: ScanSource,
    ) -> ScanOutcome {
        let entry = ScanLogEntry::record(ticket_id, scanner.scanner_id, ScanResult::Error, source);
        if let Err(err) = self.scan_log.append(&entry).await {
            error!(error = %err, "Failed to record errored scan");
        }

        ScanOutcome {
            result: ScanResult::Error,
            ticket: None,
            scan_time: entry.scan_time,
            message: Some("Check-in temporarily unavailable, please retry".to_string()),
        }
    }
}

/// Credential first, then voided, then exhausted.
fn evaluate(ticket: &Ticket, claims: &TicketClaims) -> Result<(), Rejection> {
    if !constant_time_eq::constant_time_eq(
        ticket.unique_code.as_bytes(),
        claims.unique_code.as_bytes(),
    ) {
        return Err(Rejection::CodeMismatch);
    }
    if ticket.status.is_voided() {
        return Err(Rejection::TicketVoided(ticket.status));
    }
    if ticket.is_exhausted() {
        return Err(Rejection::TicketExhausted);
    }
    Ok(())
}
