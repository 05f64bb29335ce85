//! Row mapping trait and helpers for reducing boilerplate in queries.

use rusqlite::{Connection, OptionalExtension, Row, ToSql};

use crate::models::*;

/// Parse a string column into an enum type, converting parse errors to rusqlite errors.
///
/// Graceful handling instead of panicking when the database contains an
/// invalid enum value (corruption, bad migration).
fn parse_enum<T: std::str::FromStr>(row: &Row, col: usize, col_name: &str) -> rusqlite::Result<T> {
    row.get::<_, String>(col)?.parse::<T>().map_err(|_| {
        rusqlite::Error::InvalidColumnType(col, col_name.to_string(), rusqlite::types::Type::Text)
    })
}

/// Trait for constructing a type from a database row.
///
/// Implementing this trait allows using the `query_one` and `query_all`
/// helper functions, reducing repetitive row mapping closures.
pub trait FromRow: Sized {
    fn from_row(row: &Row) -> rusqlite::Result<Self>;
}

/// Query for a single optional result.
pub fn query_one<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> crate::error::Result<Option<T>> {
    conn.query_row(sql, params, T::from_row)
        .optional()
        .map_err(Into::into)
}

/// Query for multiple results.
pub fn query_all<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> crate::error::Result<Vec<T>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, T::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ============ SQL SELECT Constants ============

pub const USER_COLS: &str = "id, email, name, api_key_hash, created_at";

pub const EVENT_COLS: &str = "id, organizer_id, title, price_cents, capacity, sold_count, reminder_offset_mins, starts_at, created_at";

pub const TICKET_TYPE_COLS: &str =
    "id, event_id, name, price_cents, capacity, sold_count, sort_order, created_at";

pub const PROMO_CODE_COLS: &str = "id, creator_id, event_id, code, discount_type, discount_value, max_uses, used_count, active, expires_at, created_at";

pub const PAYMENT_COLS: &str = "id, reference, buyer_id, event_id, ticket_type_id, promo_code_id, amount_cents, discount_cents, status, paid_at, created_at";

pub const TICKET_COLS: &str = "id, buyer_id, event_id, ticket_type_id, payment_id, scan_code, scan_credential, status, scanned_at, created_at";

pub const WAITLIST_COLS: &str = "id, event_id, buyer_id, position, notified, created_at";

// ============ FromRow Implementations ============

impl FromRow for User {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(User {
            id: row.get(0)?,
            email: row.get(1)?,
            name: row.get(2)?,
            api_key_hash: row.get(3)?,
            created_at: row.get(4)?,
        })
    }
}

impl FromRow for Event {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Event {
            id: row.get(0)?,
            organizer_id: row.get(1)?,
            title: row.get(2)?,
            price_cents: row.get(3)?,
            capacity: row.get(4)?,
            sold_count: row.get(5)?,
            reminder_offset_mins: row.get(6)?,
            starts_at: row.get(7)?,
            created_at: row.get(8)?,
        })
    }
}

impl FromRow for TicketType {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(TicketType {
            id: row.get(0)?,
            event_id: row.get(1)?,
            name: row.get(2)?,
            price_cents: row.get(3)?,
            capacity: row.get(4)?,
            sold_count: row.get(5)?,
            sort_order: row.get(6)?,
            created_at: row.get(7)?,
        })
    }
}

impl FromRow for PromoCode {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(PromoCode {
            id: row.get(0)?,
            creator_id: row.get(1)?,
            event_id: row.get(2)?,
            code: row.get(3)?,
            discount_type: parse_enum(row, 4, "discount_type")?,
            discount_value: row.get(5)?,
            max_uses: row.get(6)?,
            used_count: row.get(7)?,
            active: row.get::<_, i32>(8)? != 0,
            expires_at: row.get(9)?,
            created_at: row.get(10)?,
        })
    }
}

impl FromRow for Payment {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Payment {
            id: row.get(0)?,
            reference: row.get(1)?,
            buyer_id: row.get(2)?,
            event_id: row.get(3)?,
            ticket_type_id: row.get(4)?,
            promo_code_id: row.get(5)?,
            amount_cents: row.get(6)?,
            discount_cents: row.get(7)?,
            status: parse_enum(row, 8, "status")?,
            paid_at: row.get(9)?,
            created_at: row.get(10)?,
        })
    }
}

impl FromRow for Ticket {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Ticket {
            id: row.get(0)?,
            buyer_id: row.get(1)?,
            event_id: row.get(2)?,
            ticket_type_id: row.get(3)?,
            payment_id: row.get(4)?,
            scan_code: row.get(5)?,
            scan_credential: row.get(6)?,
            status: parse_enum(row, 7, "status")?,
            scanned_at: row.get(8)?,
            created_at: row.get(9)?,
        })
    }
}

impl FromRow for WaitlistEntry {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(WaitlistEntry {
            id: row.get(0)?,
            event_id: row.get(1)?,
            buyer_id: row.get(2)?,
            position: row.get(3)?,
            notified: row.get::<_, i32>(4)? != 0,
            created_at: row.get(5)?,
        })
    }
}
