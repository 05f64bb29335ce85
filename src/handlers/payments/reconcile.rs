//! Payment reconciliation.
//!
//! Both confirmation paths (the buyer's verify poll and the gateway webhook)
//! funnel into `finalize_payment`, so there is exactly one place where a
//! payment can move to a terminal state and exactly one place where a ticket
//! is issued. The status transition and the ticket INSERT commit in the same
//! Immediate transaction; a SUCCESS payment without its ticket can never be
//! observed.

use rusqlite::{Connection, TransactionBehavior};

use crate::db::{queries, AppState};
use crate::error::{msg, OptionExt, Result};
use crate::id::{gen_scan_code, EntityType};
use crate::models::{Payment, PaymentStatus, Ticket, TicketStatus};
use crate::notify::{spawn_notification, NotifyEvent};
use crate::payments::{ChargeStatus, GatewayCharge};
use crate::scan::ScanKey;

/// What `finalize_payment` did, so callers fire side effects only on the
/// actual transition, never on an idempotent re-read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// No state change (already terminal, or gateway still pending)
    None,
    /// PENDING moved to SUCCESS and a ticket was issued
    Confirmed,
    /// PENDING moved to FAILED
    Failed,
}

#[derive(Debug)]
pub struct Finalized {
    pub payment: Payment,
    pub ticket: Option<Ticket>,
    pub transition: Transition,
}

/// Apply a gateway-reported charge state to our payment ledger.
///
/// Idempotent: a payment already in a terminal state is returned as-is, and
/// the loser of a concurrent verify/webhook race observes the winner's commit
/// and does nothing. A gateway "pending" leaves the row PENDING.
pub fn finalize_payment(
    conn: &mut Connection,
    scan_key: &ScanKey,
    charge: &GatewayCharge,
) -> Result<Finalized> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let mut payment =
        queries::get_payment_by_reference(&tx, &charge.reference).or_not_found(msg::PAYMENT_NOT_FOUND)?;

    match payment.status {
        PaymentStatus::Success => {
            let ticket = queries::get_ticket_by_payment(&tx, &payment.id)?;
            return Ok(Finalized {
                payment,
                ticket,
                transition: Transition::None,
            });
        }
        PaymentStatus::Failed => {
            return Ok(Finalized {
                payment,
                ticket: None,
                transition: Transition::None,
            });
        }
        PaymentStatus::Pending => {}
    }

    match charge.status {
        ChargeStatus::Pending => Ok(Finalized {
            payment,
            ticket: None,
            transition: Transition::None,
        }),
        ChargeStatus::Failed => {
            queries::try_mark_payment_failed(&tx, &payment.id)?;
            tx.commit()?;
            payment.status = PaymentStatus::Failed;
            Ok(Finalized {
                payment,
                ticket: None,
                transition: Transition::Failed,
            })
        }
        ChargeStatus::Success => {
            if charge.amount_cents != payment.amount_cents {
                tracing::warn!(
                    "Amount mismatch for {}: charged {}, expected {}",
                    payment.reference,
                    charge.amount_cents,
                    payment.amount_cents
                );
                queries::try_mark_payment_failed(&tx, &payment.id)?;
                tx.commit()?;
                payment.status = PaymentStatus::Failed;
                return Ok(Finalized {
                    payment,
                    ticket: None,
                    transition: Transition::Failed,
                });
            }

            // The intent-time guard cannot see sibling intents: two pending
            // payments for one buyer both passed it. Re-check here, inside
            // the issuing transaction, so only one of them gets a ticket.
            if queries::buyer_has_live_ticket(
                &tx,
                &payment.buyer_id,
                &payment.event_id,
                payment.ticket_type_id.as_deref(),
            )? {
                tracing::warn!(
                    "Paid charge {} duplicates a live ticket for buyer {}",
                    payment.reference,
                    payment.buyer_id
                );
                queries::try_mark_payment_failed(&tx, &payment.id)?;
                tx.commit()?;
                payment.status = PaymentStatus::Failed;
                return Ok(Finalized {
                    payment,
                    ticket: None,
                    transition: Transition::Failed,
                });
            }

            // The buyer paid, but the last slot may have gone to someone else
            // while the charge was in flight.
            if !queries::reserve_slot(&tx, &payment.event_id, payment.ticket_type_id.as_deref())? {
                tracing::warn!(
                    "Paid charge {} lost the last slot for event {}",
                    payment.reference,
                    payment.event_id
                );
                queries::try_mark_payment_failed(&tx, &payment.id)?;
                tx.commit()?;
                payment.status = PaymentStatus::Failed;
                return Ok(Finalized {
                    payment,
                    ticket: None,
                    transition: Transition::Failed,
                });
            }

            let paid_at = charge.paid_at.unwrap_or_else(queries::now);
            queries::try_mark_payment_success(&tx, &payment.id, paid_at)?;

            // Best effort: the cap was checked at quote time, and the money
            // is already collected.
            if let Some(promo_id) = &payment.promo_code_id {
                if !queries::redeem_promo_code(&tx, promo_id)? {
                    tracing::warn!("Promo {} exhausted at redemption time", promo_id);
                }
            }

            let ticket = issue_ticket(&tx, scan_key, &payment)?;
            tx.commit()?;

            payment.status = PaymentStatus::Success;
            payment.paid_at = Some(paid_at);
            tracing::info!(
                "Payment {} confirmed, ticket {} issued",
                payment.reference,
                ticket.id
            );
            Ok(Finalized {
                payment,
                ticket: Some(ticket),
                transition: Transition::Confirmed,
            })
        }
    }
}

/// Issue the ticket for a successful payment.
///
/// The ticket id is generated up front so the scan credential embeds the real
/// id and the row is written in a single INSERT.
pub fn issue_ticket(conn: &Connection, scan_key: &ScanKey, payment: &Payment) -> Result<Ticket> {
    let ticket_id = EntityType::Ticket.gen_id();
    let scan_credential =
        scan_key.sign_credential(&ticket_id, &payment.event_id, &payment.buyer_id)?;

    let ticket = Ticket {
        id: ticket_id,
        buyer_id: payment.buyer_id.clone(),
        event_id: payment.event_id.clone(),
        ticket_type_id: payment.ticket_type_id.clone(),
        payment_id: payment.id.clone(),
        scan_code: gen_scan_code(),
        scan_credential,
        status: TicketStatus::Active,
        scanned_at: None,
        created_at: queries::now(),
    };
    queries::insert_ticket(conn, &ticket)?;
    Ok(ticket)
}

/// Post-commit side effects of a finalize. All fire-and-forget; none of them
/// can unwind the committed transaction.
pub fn apply_side_effects(state: &AppState, finalized: &Finalized) {
    match finalized.transition {
        Transition::None => {}
        Transition::Failed => {
            spawn_notification(
                state.notify_webhook_url.clone(),
                NotifyEvent::new(
                    "payment_failed",
                    &finalized.payment.buyer_id,
                    &finalized.payment.event_id,
                    None,
                ),
            );
        }
        Transition::Confirmed => {
            state
                .cache
                .invalidate_prefix(&format!("event:{}", finalized.payment.event_id));

            if let Some(ticket) = &finalized.ticket {
                schedule_reminder(state, ticket);
                spawn_notification(
                    state.notify_webhook_url.clone(),
                    NotifyEvent::new(
                        "ticket_issued",
                        &ticket.buyer_id,
                        &ticket.event_id,
                        Some(&ticket.id),
                    ),
                );
            }
        }
    }
}

/// Write the reminder row for a freshly issued ticket, when the event defines
/// a reminder offset. Failures are logged, never surfaced to the buyer.
fn schedule_reminder(state: &AppState, ticket: &Ticket) {
    let result = (|| -> Result<()> {
        let conn = state.db.get()?;
        let Some(event) = queries::get_event_by_id(&conn, &ticket.event_id)? else {
            return Ok(());
        };
        if let Some(offset_mins) = event.reminder_offset_mins {
            let remind_at = event.starts_at - offset_mins * 60;
            queries::schedule_reminder(&conn, ticket, remind_at)?;
        }
        Ok(())
    })();

    if let Err(e) = result {
        tracing::warn!("Failed to schedule reminder for {}: {}", ticket.id, e);
    }
}
