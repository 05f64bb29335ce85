use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::id::EntityType;
use crate::models::*;
use crate::util::hash_api_key;

use super::from_row::{
    query_all, query_one, FromRow, EVENT_COLS, PAYMENT_COLS, PROMO_CODE_COLS, TICKET_COLS,
    TICKET_TYPE_COLS, USER_COLS, WAITLIST_COLS,
};

pub fn now() -> i64 {
    Utc::now().timestamp()
}

// ============ Users ============

/// Generate an API key with bx_ prefix. Returned once at creation; only the
/// hash is stored.
pub fn generate_api_key() -> String {
    format!("bx_{}", Uuid::new_v4().as_simple())
}

/// Create a user. Returns the user together with the plaintext API key.
pub fn create_user(conn: &Connection, input: &CreateUser) -> Result<(User, String)> {
    let id = EntityType::User.gen_id();
    let now = now();
    let email = input.email.trim().to_lowercase();
    let api_key = generate_api_key();
    let api_key_hash = hash_api_key(&api_key);

    conn.execute(
        "INSERT INTO users (id, email, name, api_key_hash, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![&id, &email, &input.name, &api_key_hash, now],
    )?;

    Ok((
        User {
            id,
            email,
            name: input.name.clone(),
            api_key_hash,
            created_at: now,
        },
        api_key,
    ))
}

pub fn get_user_by_id(conn: &Connection, id: &str) -> Result<Option<User>> {
    query_one(
        conn,
        &format!("SELECT {} FROM users WHERE id = ?1", USER_COLS),
        &[&id],
    )
}

pub fn get_user_by_api_key(conn: &Connection, api_key: &str) -> Result<Option<User>> {
    let hash = hash_api_key(api_key);
    query_one(
        conn,
        &format!("SELECT {} FROM users WHERE api_key_hash = ?1", USER_COLS),
        &[&hash],
    )
}

// ============ Events ============

pub fn create_event(conn: &Connection, organizer_id: &str, input: &CreateEvent) -> Result<Event> {
    if input.capacity < 0 {
        return Err(AppError::BadRequest("Capacity must be non-negative".into()));
    }
    let id = EntityType::Event.gen_id();
    let now = now();

    conn.execute(
        "INSERT INTO events (id, organizer_id, title, price_cents, capacity, sold_count, reminder_offset_mins, starts_at, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6, ?7, ?8)",
        params![
            &id,
            organizer_id,
            &input.title,
            input.price_cents,
            input.capacity,
            input.reminder_offset_mins,
            input.starts_at,
            now
        ],
    )?;

    Ok(Event {
        id,
        organizer_id: organizer_id.to_string(),
        title: input.title.clone(),
        price_cents: input.price_cents,
        capacity: input.capacity,
        sold_count: 0,
        reminder_offset_mins: input.reminder_offset_mins,
        starts_at: input.starts_at,
        created_at: now,
    })
}

pub fn get_event_by_id(conn: &Connection, id: &str) -> Result<Option<Event>> {
    query_one(
        conn,
        &format!("SELECT {} FROM events WHERE id = ?1", EVENT_COLS),
        &[&id],
    )
}

// ============ Ticket types ============

pub fn create_ticket_type(
    conn: &Connection,
    event_id: &str,
    input: &CreateTicketType,
) -> Result<TicketType> {
    if input.capacity < 0 {
        return Err(AppError::BadRequest("Capacity must be non-negative".into()));
    }
    let id = EntityType::TicketType.gen_id();
    let now = now();

    conn.execute(
        "INSERT INTO ticket_types (id, event_id, name, price_cents, capacity, sold_count, sort_order, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6, ?7)",
        params![
            &id,
            event_id,
            &input.name,
            input.price_cents,
            input.capacity,
            input.sort_order,
            now
        ],
    )?;

    Ok(TicketType {
        id,
        event_id: event_id.to_string(),
        name: input.name.clone(),
        price_cents: input.price_cents,
        capacity: input.capacity,
        sold_count: 0,
        sort_order: input.sort_order,
        created_at: now,
    })
}

pub fn get_ticket_type_by_id(conn: &Connection, id: &str) -> Result<Option<TicketType>> {
    query_one(
        conn,
        &format!("SELECT {} FROM ticket_types WHERE id = ?1", TICKET_TYPE_COLS),
        &[&id],
    )
}

pub fn list_ticket_types(conn: &Connection, event_id: &str) -> Result<Vec<TicketType>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM ticket_types WHERE event_id = ?1 ORDER BY sort_order, created_at",
            TICKET_TYPE_COLS
        ),
        &[&event_id],
    )
}

// ============ Capacity guard ============

/// Atomically reserve one admission slot. The conditional UPDATE is the
/// capacity check and the reservation in one statement, so two concurrent
/// purchases can never both claim the last slot.
///
/// Returns false when the event (or tier) is at capacity.
pub fn reserve_slot(
    conn: &Connection,
    event_id: &str,
    ticket_type_id: Option<&str>,
) -> Result<bool> {
    let affected = match ticket_type_id {
        Some(tier_id) => conn.execute(
            "UPDATE ticket_types SET sold_count = sold_count + 1
             WHERE id = ?1 AND event_id = ?2 AND sold_count < capacity",
            params![tier_id, event_id],
        )?,
        None => conn.execute(
            "UPDATE events SET sold_count = sold_count + 1
             WHERE id = ?1 AND sold_count < capacity",
            params![event_id],
        )?,
    };
    Ok(affected > 0)
}

/// Return a previously reserved slot. The floor guard keeps a double release
/// from driving the counter negative.
pub fn release_slot(
    conn: &Connection,
    event_id: &str,
    ticket_type_id: Option<&str>,
) -> Result<bool> {
    let affected = match ticket_type_id {
        Some(tier_id) => conn.execute(
            "UPDATE ticket_types SET sold_count = sold_count - 1
             WHERE id = ?1 AND event_id = ?2 AND sold_count > 0",
            params![tier_id, event_id],
        )?,
        None => conn.execute(
            "UPDATE events SET sold_count = sold_count - 1
             WHERE id = ?1 AND sold_count > 0",
            params![event_id],
        )?,
    };
    Ok(affected > 0)
}

/// Whether an event has no admission left. With tiers, the event is sold out
/// only when every tier is; without tiers the event-level counter governs.
pub fn is_event_sold_out(conn: &Connection, event: &Event) -> Result<bool> {
    let tier_count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM ticket_types WHERE event_id = ?1",
        params![&event.id],
        |row| row.get(0),
    )?;
    if tier_count == 0 {
        return Ok(event.sold_count >= event.capacity);
    }
    let open_tiers: i64 = conn.query_row(
        "SELECT COUNT(*) FROM ticket_types WHERE event_id = ?1 AND sold_count < capacity",
        params![&event.id],
        |row| row.get(0),
    )?;
    Ok(open_tiers == 0)
}

// ============ Promo codes ============

pub fn create_promo_code(
    conn: &Connection,
    creator_id: &str,
    input: &CreatePromoCode,
) -> Result<PromoCode> {
    let code = input.code.trim().to_uppercase();
    if code.is_empty() {
        return Err(AppError::BadRequest("Promo code must not be empty".into()));
    }
    match input.discount_type {
        DiscountType::Percentage if !(1..=100).contains(&input.discount_value) => {
            return Err(AppError::BadRequest(
                "Percentage discount must be between 1 and 100".into(),
            ));
        }
        DiscountType::Fixed if input.discount_value <= 0 => {
            return Err(AppError::BadRequest(
                "Fixed discount must be positive".into(),
            ));
        }
        _ => {}
    }

    let id = EntityType::PromoCode.gen_id();
    let now = now();

    let inserted = conn.execute(
        "INSERT INTO promo_codes (id, creator_id, event_id, code, discount_type, discount_value, max_uses, used_count, active, expires_at, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0, 1, ?8, ?9)",
        params![
            &id,
            creator_id,
            &input.event_id,
            &code,
            input.discount_type.to_string(),
            input.discount_value,
            input.max_uses,
            input.expires_at,
            now
        ],
    );
    match inserted {
        Ok(_) => {}
        Err(rusqlite::Error::SqliteFailure(e, _))
            if e.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            return Err(AppError::Conflict("Promo code already exists".into()));
        }
        Err(e) => return Err(e.into()),
    }

    Ok(PromoCode {
        id,
        creator_id: creator_id.to_string(),
        event_id: input.event_id.clone(),
        code,
        discount_type: input.discount_type,
        discount_value: input.discount_value,
        max_uses: input.max_uses,
        used_count: 0,
        active: true,
        expires_at: input.expires_at,
        created_at: now,
    })
}

/// Look up a promo code in a creator's namespace. Input is normalized to
/// uppercase to match storage.
pub fn get_promo_code(conn: &Connection, creator_id: &str, code: &str) -> Result<Option<PromoCode>> {
    let code = code.trim().to_uppercase();
    query_one(
        conn,
        &format!(
            "SELECT {} FROM promo_codes WHERE creator_id = ?1 AND code = ?2",
            PROMO_CODE_COLS
        ),
        &[&creator_id, &code],
    )
}

pub fn get_promo_code_by_id(conn: &Connection, id: &str) -> Result<Option<PromoCode>> {
    query_one(
        conn,
        &format!("SELECT {} FROM promo_codes WHERE id = ?1", PROMO_CODE_COLS),
        &[&id],
    )
}

/// Consume one use of a promo code. Conditional on the usage cap so the
/// counter can never exceed max_uses even under concurrent redemptions.
pub fn redeem_promo_code(conn: &Connection, id: &str) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE promo_codes SET used_count = used_count + 1
         WHERE id = ?1 AND active = 1 AND (max_uses IS NULL OR used_count < max_uses)",
        params![id],
    )?;
    Ok(affected > 0)
}

pub fn deactivate_promo_code(conn: &Connection, id: &str) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE promo_codes SET active = 0 WHERE id = ?1 AND active = 1",
        params![id],
    )?;
    Ok(affected > 0)
}

// ============ Payments ============

pub fn create_payment(conn: &Connection, input: &CreatePayment) -> Result<Payment> {
    let id = EntityType::Payment.gen_id();
    let reference = crate::id::gen_payment_reference();
    let now = now();

    conn.execute(
        "INSERT INTO payments (id, reference, buyer_id, event_id, ticket_type_id, promo_code_id, amount_cents, discount_cents, status, paid_at, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            &id,
            &reference,
            &input.buyer_id,
            &input.event_id,
            &input.ticket_type_id,
            &input.promo_code_id,
            input.amount_cents,
            input.discount_cents,
            input.status.to_string(),
            input.paid_at,
            now
        ],
    )?;

    Ok(Payment {
        id,
        reference,
        buyer_id: input.buyer_id.clone(),
        event_id: input.event_id.clone(),
        ticket_type_id: input.ticket_type_id.clone(),
        promo_code_id: input.promo_code_id.clone(),
        amount_cents: input.amount_cents,
        discount_cents: input.discount_cents,
        status: input.status,
        paid_at: input.paid_at,
        created_at: now,
    })
}

pub fn get_payment_by_reference(conn: &Connection, reference: &str) -> Result<Option<Payment>> {
    query_one(
        conn,
        &format!("SELECT {} FROM payments WHERE reference = ?1", PAYMENT_COLS),
        &[&reference],
    )
}

/// Move a payment from PENDING to SUCCESS. Conditional on the current state,
/// so the caller that observes true is the single winner; every other caller
/// sees false and must re-read.
pub fn try_mark_payment_success(conn: &Connection, payment_id: &str, paid_at: i64) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE payments SET status = 'success', paid_at = ?1
         WHERE id = ?2 AND status = 'pending'",
        params![paid_at, payment_id],
    )?;
    Ok(affected > 0)
}

/// Move a payment from PENDING to FAILED.
pub fn try_mark_payment_failed(conn: &Connection, payment_id: &str) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE payments SET status = 'failed' WHERE id = ?1 AND status = 'pending'",
        params![payment_id],
    )?;
    Ok(affected > 0)
}

// ============ Tickets ============

pub fn get_ticket_by_id(conn: &Connection, id: &str) -> Result<Option<Ticket>> {
    query_one(
        conn,
        &format!("SELECT {} FROM tickets WHERE id = ?1", TICKET_COLS),
        &[&id],
    )
}

pub fn get_ticket_by_payment(conn: &Connection, payment_id: &str) -> Result<Option<Ticket>> {
    query_one(
        conn,
        &format!("SELECT {} FROM tickets WHERE payment_id = ?1", TICKET_COLS),
        &[&payment_id],
    )
}

/// Insert a fully formed ticket row. The id and scan credential are generated
/// by the caller before the write, so issuance is a single INSERT and the
/// credential always embeds the real ticket id.
pub fn insert_ticket(conn: &Connection, ticket: &Ticket) -> Result<()> {
    conn.execute(
        "INSERT INTO tickets (id, buyer_id, event_id, ticket_type_id, payment_id, scan_code, scan_credential, status, scanned_at, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            &ticket.id,
            &ticket.buyer_id,
            &ticket.event_id,
            &ticket.ticket_type_id,
            &ticket.payment_id,
            &ticket.scan_code,
            &ticket.scan_credential,
            ticket.status.to_string(),
            ticket.scanned_at,
            ticket.created_at
        ],
    )?;
    Ok(())
}

/// Whether a buyer already holds a non-cancelled ticket for an event (per
/// tier for tiered purchases). Guards against duplicate purchases at
/// initialize time.
pub fn buyer_has_live_ticket(
    conn: &Connection,
    buyer_id: &str,
    event_id: &str,
    ticket_type_id: Option<&str>,
) -> Result<bool> {
    let count: i64 = match ticket_type_id {
        Some(tier_id) => conn.query_row(
            "SELECT COUNT(*) FROM tickets
             WHERE buyer_id = ?1 AND event_id = ?2 AND ticket_type_id = ?3
               AND status != 'cancelled'",
            params![buyer_id, event_id, tier_id],
            |row| row.get(0),
        )?,
        None => conn.query_row(
            "SELECT COUNT(*) FROM tickets
             WHERE buyer_id = ?1 AND event_id = ?2 AND status != 'cancelled'",
            params![buyer_id, event_id],
            |row| row.get(0),
        )?,
    };
    Ok(count > 0)
}

/// Redeem a ticket at the door. Conditional on ACTIVE, so a replayed
/// credential finds the ticket already USED and is rejected.
pub fn try_mark_ticket_used(conn: &Connection, ticket_id: &str, scanned_at: i64) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE tickets SET status = 'used', scanned_at = ?1
         WHERE id = ?2 AND status = 'active'",
        params![scanned_at, ticket_id],
    )?;
    Ok(affected > 0)
}

pub fn try_cancel_ticket(conn: &Connection, ticket_id: &str) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE tickets SET status = 'cancelled' WHERE id = ?1 AND status = 'active'",
        params![ticket_id],
    )?;
    Ok(affected > 0)
}

// ============ Waitlist ============

pub fn get_waitlist_entry(
    conn: &Connection,
    event_id: &str,
    buyer_id: &str,
) -> Result<Option<WaitlistEntry>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM waitlist_entries WHERE event_id = ?1 AND buyer_id = ?2",
            WAITLIST_COLS
        ),
        &[&event_id, &buyer_id],
    )
}

/// Append a buyer to an event's waitlist.
///
/// Immediate mode so position assignment and the insert are atomic; two
/// concurrent joins cannot claim the same position.
pub fn join_waitlist(
    conn: &mut Connection,
    event_id: &str,
    buyer_id: &str,
) -> Result<WaitlistEntry> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let already: Option<i64> = tx
        .query_row(
            "SELECT 1 FROM waitlist_entries WHERE event_id = ?1 AND buyer_id = ?2",
            params![event_id, buyer_id],
            |row| row.get(0),
        )
        .optional()?;
    if already.is_some() {
        return Err(AppError::Conflict("Already on the waitlist".into()));
    }

    let position: i64 = tx.query_row(
        "SELECT COALESCE(MAX(position), 0) + 1 FROM waitlist_entries WHERE event_id = ?1",
        params![event_id],
        |row| row.get(0),
    )?;

    let id = EntityType::WaitlistEntry.gen_id();
    let now = now();
    tx.execute(
        "INSERT INTO waitlist_entries (id, event_id, buyer_id, position, notified, created_at)
         VALUES (?1, ?2, ?3, ?4, 0, ?5)",
        params![&id, event_id, buyer_id, position, now],
    )?;
    tx.commit()?;

    Ok(WaitlistEntry {
        id,
        event_id: event_id.to_string(),
        buyer_id: buyer_id.to_string(),
        position,
        notified: false,
        created_at: now,
    })
}

/// Remove a buyer from the waitlist and close the positional gap, keeping
/// positions contiguous from 1. Both statements commit together.
pub fn leave_waitlist(conn: &mut Connection, event_id: &str, buyer_id: &str) -> Result<bool> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let position: Option<i64> = tx
        .query_row(
            "SELECT position FROM waitlist_entries WHERE event_id = ?1 AND buyer_id = ?2",
            params![event_id, buyer_id],
            |row| row.get(0),
        )
        .optional()?;
    let Some(position) = position else {
        return Ok(false);
    };

    tx.execute(
        "DELETE FROM waitlist_entries WHERE event_id = ?1 AND buyer_id = ?2",
        params![event_id, buyer_id],
    )?;
    tx.execute(
        "UPDATE waitlist_entries SET position = position - 1
         WHERE event_id = ?1 AND position > ?2",
        params![event_id, position],
    )?;
    tx.commit()?;
    Ok(true)
}

/// The lowest-positioned entrant not yet offered a slot.
pub fn next_unnotified_entry(conn: &Connection, event_id: &str) -> Result<Option<WaitlistEntry>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM waitlist_entries
             WHERE event_id = ?1 AND notified = 0
             ORDER BY position LIMIT 1",
            WAITLIST_COLS
        ),
        &[&event_id],
    )
}

pub fn mark_waitlist_notified(conn: &Connection, entry_id: &str) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE waitlist_entries SET notified = 1 WHERE id = ?1 AND notified = 0",
        params![entry_id],
    )?;
    Ok(affected > 0)
}

// ============ Reminders ============

#[derive(Debug, Clone)]
pub struct DueReminder {
    pub id: String,
    pub ticket_id: String,
    pub event_id: String,
    pub buyer_id: String,
    pub remind_at: i64,
}

impl FromRow for DueReminder {
    fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(DueReminder {
            id: row.get(0)?,
            ticket_id: row.get(1)?,
            event_id: row.get(2)?,
            buyer_id: row.get(3)?,
            remind_at: row.get(4)?,
        })
    }
}

pub fn schedule_reminder(conn: &Connection, ticket: &Ticket, remind_at: i64) -> Result<()> {
    let id = EntityType::Reminder.gen_id();
    conn.execute(
        "INSERT INTO reminders (id, ticket_id, event_id, buyer_id, remind_at, sent, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6)",
        params![
            &id,
            &ticket.id,
            &ticket.event_id,
            &ticket.buyer_id,
            remind_at,
            now()
        ],
    )?;
    Ok(())
}

pub fn due_reminders(conn: &Connection, as_of: i64, limit: i64) -> Result<Vec<DueReminder>> {
    query_all(
        conn,
        "SELECT id, ticket_id, event_id, buyer_id, remind_at FROM reminders
         WHERE sent = 0 AND remind_at <= ?1
         ORDER BY remind_at LIMIT ?2",
        params![as_of, limit],
    )
}

pub fn mark_reminder_sent(conn: &Connection, id: &str) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE reminders SET sent = 1 WHERE id = ?1 AND sent = 0",
        params![id],
    )?;
    Ok(affected > 0)
}

// ============ Availability ============

/// Advisory snapshot of remaining admission. The authoritative check is the
/// conditional reserve_slot update at purchase time.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Availability {
    pub event_id: String,
    pub capacity: i64,
    pub sold_count: i64,
    pub remaining: i64,
    pub sold_out: bool,
    pub tiers: Vec<TierAvailability>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct TierAvailability {
    pub ticket_type_id: String,
    pub name: String,
    pub price_cents: i64,
    pub capacity: i64,
    pub sold_count: i64,
    pub remaining: i64,
}

pub fn event_availability(conn: &Connection, event_id: &str) -> Result<Option<Availability>> {
    let Some(event) = get_event_by_id(conn, event_id)? else {
        return Ok(None);
    };
    let tiers = list_ticket_types(conn, event_id)?;

    if tiers.is_empty() {
        let remaining = (event.capacity - event.sold_count).max(0);
        return Ok(Some(Availability {
            event_id: event.id,
            capacity: event.capacity,
            sold_count: event.sold_count,
            remaining,
            sold_out: remaining == 0,
            tiers: Vec::new(),
        }));
    }

    let tier_avail: Vec<TierAvailability> = tiers
        .into_iter()
        .map(|t| {
            let remaining = (t.capacity - t.sold_count).max(0);
            TierAvailability {
                ticket_type_id: t.id,
                name: t.name,
                price_cents: t.price_cents,
                capacity: t.capacity,
                sold_count: t.sold_count,
                remaining,
            }
        })
        .collect();

    let capacity: i64 = tier_avail.iter().map(|t| t.capacity).sum();
    let sold: i64 = tier_avail.iter().map(|t| t.sold_count).sum();
    let remaining: i64 = tier_avail.iter().map(|t| t.remaining).sum();
    Ok(Some(Availability {
        event_id: event.id,
        capacity,
        sold_count: sold,
        remaining,
        sold_out: remaining == 0,
        tiers: tier_avail,
    }))
}
