use rusqlite::Connection;

/// Initialize the database schema.
pub fn init_db(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA foreign_keys = ON;

        -- Users (buyers and organizers; organizer-ship lives on events)
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            api_key_hash TEXT NOT NULL UNIQUE,
            created_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_users_api_key ON users(api_key_hash);

        -- Events (purchase-relevant fields only; content CRUD is external)
        -- sold_count is the atomic admission counter: incremented only via the
        -- conditional reserve_slot update, decremented on cancellation.
        CREATE TABLE IF NOT EXISTS events (
            id TEXT PRIMARY KEY,
            organizer_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            title TEXT NOT NULL,
            price_cents INTEGER NOT NULL DEFAULT 0,
            capacity INTEGER NOT NULL,
            sold_count INTEGER NOT NULL DEFAULT 0,
            reminder_offset_mins INTEGER,
            starts_at INTEGER NOT NULL,
            created_at INTEGER NOT NULL,
            CHECK (sold_count >= 0),
            CHECK (sold_count <= capacity)
        );
        CREATE INDEX IF NOT EXISTS idx_events_organizer ON events(organizer_id);

        -- Ticket types (tiers). When any exist for an event, tier-level
        -- price/capacity replace the event-level ones.
        CREATE TABLE IF NOT EXISTS ticket_types (
            id TEXT PRIMARY KEY,
            event_id TEXT NOT NULL REFERENCES events(id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            price_cents INTEGER NOT NULL,
            capacity INTEGER NOT NULL,
            sold_count INTEGER NOT NULL DEFAULT 0,
            sort_order INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL,
            UNIQUE(event_id, name),
            CHECK (sold_count >= 0),
            CHECK (sold_count <= capacity)
        );
        CREATE INDEX IF NOT EXISTS idx_ticket_types_event ON ticket_types(event_id, sort_order);

        -- Promo codes, unique per creator namespace, stored uppercase
        CREATE TABLE IF NOT EXISTS promo_codes (
            id TEXT PRIMARY KEY,
            creator_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            event_id TEXT REFERENCES events(id) ON DELETE CASCADE,
            code TEXT NOT NULL,
            discount_type TEXT NOT NULL CHECK (discount_type IN ('percentage', 'fixed')),
            discount_value INTEGER NOT NULL,
            max_uses INTEGER,
            used_count INTEGER NOT NULL DEFAULT 0,
            active INTEGER NOT NULL DEFAULT 1,
            expires_at INTEGER,
            created_at INTEGER NOT NULL,
            UNIQUE(creator_id, code)
        );
        CREATE INDEX IF NOT EXISTS idx_promo_codes_lookup ON promo_codes(creator_id, code);

        -- Payments: one row per purchase attempt, keyed by the unique
        -- external reference the gateway echoes back. Status transitions are
        -- conditional updates (WHERE status = 'pending'), so each terminal
        -- state is entered at most once.
        CREATE TABLE IF NOT EXISTS payments (
            id TEXT PRIMARY KEY,
            reference TEXT NOT NULL UNIQUE,
            buyer_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            event_id TEXT NOT NULL REFERENCES events(id) ON DELETE CASCADE,
            ticket_type_id TEXT REFERENCES ticket_types(id) ON DELETE SET NULL,
            promo_code_id TEXT REFERENCES promo_codes(id) ON DELETE SET NULL,
            amount_cents INTEGER NOT NULL,
            discount_cents INTEGER NOT NULL DEFAULT 0,
            status TEXT NOT NULL CHECK (status IN ('pending', 'success', 'failed')),
            paid_at INTEGER,
            created_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_payments_reference ON payments(reference);
        CREATE INDEX IF NOT EXISTS idx_payments_buyer ON payments(buyer_id);

        -- Tickets: UNIQUE(payment_id) enforces exactly one ticket per payment.
        CREATE TABLE IF NOT EXISTS tickets (
            id TEXT PRIMARY KEY,
            buyer_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            event_id TEXT NOT NULL REFERENCES events(id) ON DELETE CASCADE,
            ticket_type_id TEXT REFERENCES ticket_types(id) ON DELETE SET NULL,
            payment_id TEXT NOT NULL UNIQUE REFERENCES payments(id) ON DELETE CASCADE,
            scan_code TEXT NOT NULL UNIQUE,
            scan_credential TEXT NOT NULL,
            status TEXT NOT NULL CHECK (status IN ('active', 'used', 'cancelled')),
            scanned_at INTEGER,
            created_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_tickets_event ON tickets(event_id);
        CREATE INDEX IF NOT EXISTS idx_tickets_buyer_event ON tickets(buyer_id, event_id);
        CREATE INDEX IF NOT EXISTS idx_tickets_scan_code ON tickets(scan_code);

        -- Waitlist: positions per event are 1-based and contiguous after
        -- every mutation; leave() renumbers inside one transaction.
        CREATE TABLE IF NOT EXISTS waitlist_entries (
            id TEXT PRIMARY KEY,
            event_id TEXT NOT NULL REFERENCES events(id) ON DELETE CASCADE,
            buyer_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            position INTEGER NOT NULL,
            notified INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL,
            UNIQUE(event_id, buyer_id)
        );
        CREATE INDEX IF NOT EXISTS idx_waitlist_event_position ON waitlist_entries(event_id, position);

        -- Reminders written fire-and-forget on issuance, drained by the
        -- background sweep task.
        CREATE TABLE IF NOT EXISTS reminders (
            id TEXT PRIMARY KEY,
            ticket_id TEXT NOT NULL REFERENCES tickets(id) ON DELETE CASCADE,
            event_id TEXT NOT NULL REFERENCES events(id) ON DELETE CASCADE,
            buyer_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            remind_at INTEGER NOT NULL,
            sent INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_reminders_due ON reminders(sent, remind_at);
        "#,
    )?;
    Ok(())
}
