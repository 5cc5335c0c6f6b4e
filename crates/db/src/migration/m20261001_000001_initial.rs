//! Initial database migration.
//!
//! Creates bookings, payments, the append-only ledger, refunds, refund
//! discrepancies and notification dedup markers, plus the ledger triggers.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        // ============================================================
        // PART 1: BOOKINGS & PAYMENTS
        // ============================================================
        db.execute_unprepared(BOOKINGS_SQL).await?;
        db.execute_unprepared(PAYMENTS_SQL).await?;

        // ============================================================
        // PART 2: LEDGER
        // ============================================================
        db.execute_unprepared(LEDGER_ENTRIES_SQL).await?;

        // ============================================================
        // PART 3: REFUNDS
        // ============================================================
        db.execute_unprepared(REFUNDS_SQL).await?;
        db.execute_unprepared(REFUND_DISCREPANCIES_SQL).await?;

        // ============================================================
        // PART 4: NOTIFICATION DEDUP
        // ============================================================
        db.execute_unprepared(PROCESSED_EVENTS_SQL).await?;

        // ============================================================
        // PART 5: TRIGGERS & FUNCTIONS
        // ============================================================
        db.execute_unprepared(TRIGGERS_SQL).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(DROP_ALL_SQL).await?;
        Ok(())
    }
}

const BOOKINGS_SQL: &str = r"
CREATE TABLE bookings (
    id UUID PRIMARY KEY,
    status VARCHAR(16) NOT NULL DEFAULT 'pending',
    professional_id UUID NOT NULL,
    service_id UUID NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_booking_status
        CHECK (status IN ('pending', 'confirmed', 'cancelled', 'completed'))
);

CREATE INDEX idx_bookings_professional ON bookings(professional_id, created_at DESC);
";

const PAYMENTS_SQL: &str = r"
CREATE TABLE payments (
    id UUID PRIMARY KEY,
    booking_id UUID NOT NULL UNIQUE REFERENCES bookings(id) ON DELETE RESTRICT,
    processor_payment_id VARCHAR(64) UNIQUE,
    status VARCHAR(16) NOT NULL DEFAULT 'pending',
    gross_amount NUMERIC(19, 4) NOT NULL,
    refund_status VARCHAR(16) NOT NULL DEFAULT 'none',
    refunded_amount NUMERIC(19, 4) NOT NULL DEFAULT 0,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    approved_at TIMESTAMPTZ,
    CONSTRAINT chk_payment_status
        CHECK (status IN ('pending', 'approved', 'rejected', 'refunded', 'cancelled')),
    CONSTRAINT chk_refund_status
        CHECK (refund_status IN ('none', 'partial', 'refunded')),
    CONSTRAINT chk_gross_positive CHECK (gross_amount > 0),
    CONSTRAINT chk_refunded_bounds
        CHECK (refunded_amount >= 0 AND refunded_amount <= gross_amount),
    CONSTRAINT chk_approved_at CHECK (status <> 'approved' OR approved_at IS NOT NULL)
);

CREATE INDEX idx_payments_status ON payments(status, updated_at DESC);
";

const LEDGER_ENTRIES_SQL: &str = r"
CREATE TABLE ledger_entries (
    id UUID PRIMARY KEY,
    transaction_id UUID NOT NULL REFERENCES payments(id) ON DELETE RESTRICT,
    entry_type VARCHAR(6) NOT NULL,
    account_code VARCHAR(64) NOT NULL,
    amount NUMERIC(19, 4) NOT NULL,
    reverses UUID REFERENCES ledger_entries(id),
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_entry_type CHECK (entry_type IN ('DEBIT', 'CREDIT')),
    CONSTRAINT chk_amount_non_negative CHECK (amount >= 0)
);

-- One revenue and one payout line per transaction, ever
CREATE UNIQUE INDEX uq_ledger_entries_tx_account_type
    ON ledger_entries(transaction_id, account_code, entry_type);

-- Revenue reports scan CREDIT lines by time
CREATE INDEX idx_ledger_entries_created ON ledger_entries(created_at, entry_type);
CREATE INDEX idx_ledger_entries_account ON ledger_entries(account_code, created_at);
";

const REFUNDS_SQL: &str = r"
CREATE TABLE refunds (
    id UUID PRIMARY KEY,
    payment_id UUID NOT NULL REFERENCES payments(id) ON DELETE RESTRICT,
    amount NUMERIC(19, 4) NOT NULL,
    method VARCHAR(16) NOT NULL,
    processor_refund_id VARCHAR(64) UNIQUE,
    proof_key TEXT,
    proof_checksum CHAR(64),
    proof_content_type VARCHAR(127),
    proof_size BIGINT,
    actor_id UUID NOT NULL,
    reason TEXT,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_refund_amount_positive CHECK (amount > 0),
    CONSTRAINT chk_refund_method CHECK (
        (method = 'automated' AND processor_refund_id IS NOT NULL)
        OR (method = 'manual' AND proof_key IS NOT NULL AND proof_checksum IS NOT NULL)
    )
);

CREATE INDEX idx_refunds_payment ON refunds(payment_id, created_at);
";

const REFUND_DISCREPANCIES_SQL: &str = r"
CREATE TABLE refund_discrepancies (
    id UUID PRIMARY KEY,
    payment_id UUID NOT NULL REFERENCES payments(id) ON DELETE RESTRICT,
    amount NUMERIC(19, 4) NOT NULL,
    processor_refund_id VARCHAR(64) NOT NULL,
    detail TEXT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    resolved_at TIMESTAMPTZ
);

CREATE INDEX idx_refund_discrepancies_open
    ON refund_discrepancies(payment_id) WHERE resolved_at IS NULL;
";

const PROCESSED_EVENTS_SQL: &str = r"
CREATE TABLE processed_events (
    request_id VARCHAR(128) PRIMARY KEY,
    processor_payment_id VARCHAR(64) NOT NULL,
    outcome VARCHAR(32) NOT NULL,
    processed_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE INDEX idx_processed_events_payment ON processed_events(processor_payment_id);
";

const TRIGGERS_SQL: &str = r"
-- ============================================================
-- FUNCTION: check_ledger_balance
-- Ensures double-entry balance (debit = credit) per transaction at commit
-- ============================================================
CREATE OR REPLACE FUNCTION check_ledger_balance()
RETURNS TRIGGER AS $$
DECLARE
    total_debit NUMERIC(19, 4);
    total_credit NUMERIC(19, 4);
BEGIN
    SELECT
        COALESCE(SUM(amount) FILTER (WHERE entry_type = 'DEBIT'), 0),
        COALESCE(SUM(amount) FILTER (WHERE entry_type = 'CREDIT'), 0)
    INTO total_debit, total_credit
    FROM ledger_entries
    WHERE transaction_id = NEW.transaction_id;

    IF total_debit <> total_credit THEN
        RAISE EXCEPTION 'Transaction is not balanced. Debit: %, Credit: %',
            total_debit, total_credit;
    END IF;

    RETURN NEW;
END;
$$ LANGUAGE plpgsql;

CREATE CONSTRAINT TRIGGER trg_check_ledger_balance
AFTER INSERT ON ledger_entries
DEFERRABLE INITIALLY DEFERRED
FOR EACH ROW
EXECUTE FUNCTION check_ledger_balance();

-- ============================================================
-- FUNCTION: prevent_ledger_mutation
-- Ledger entries are immutable; corrections are new reversing entries
-- ============================================================
CREATE OR REPLACE FUNCTION prevent_ledger_mutation()
RETURNS TRIGGER AS $$
BEGIN
    RAISE EXCEPTION 'Ledger entries are immutable. Create a reversing entry instead.';
END;
$$ LANGUAGE plpgsql;

CREATE TRIGGER trg_prevent_ledger_mutation
BEFORE UPDATE OR DELETE ON ledger_entries
FOR EACH ROW
EXECUTE FUNCTION prevent_ledger_mutation();
";

const DROP_ALL_SQL: &str = r"
DROP TABLE IF EXISTS processed_events CASCADE;
DROP TABLE IF EXISTS refund_discrepancies CASCADE;
DROP TABLE IF EXISTS refunds CASCADE;
DROP TABLE IF EXISTS ledger_entries CASCADE;
DROP TABLE IF EXISTS payments CASCADE;
DROP TABLE IF EXISTS bookings CASCADE;
DROP FUNCTION IF EXISTS check_ledger_balance() CASCADE;
DROP FUNCTION IF EXISTS prevent_ledger_mutation() CASCADE;
";
