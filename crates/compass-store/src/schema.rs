/// SQL DDL for the compass-store database.
/// WAL mode + foreign keys enabled at connection time.
pub const SCHEMA_VERSION: u32 = 1;

pub const CREATE_TABLES: &str = r#"
CREATE TABLE IF NOT EXISTS wants (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'draft',
    stream_started_at TEXT,
    stream_timer_seconds INTEGER NOT NULL DEFAULT 600,
    stream_text TEXT,
    stream_completed_at TEXT,
    future_self_text TEXT,
    future_self_completed_at TEXT,
    envy TEXT,
    regrets TEXT,
    plan_5y TEXT,
    reverse_completed_at TEXT,
    completed_at TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS wants_chunks (
    id TEXT PRIMARY KEY,
    wants_id TEXT NOT NULL REFERENCES wants(id) ON DELETE CASCADE,
    exercise TEXT NOT NULL,
    text TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS journal_entries (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    date TEXT NOT NULL,
    slot TEXT NOT NULL,
    answers TEXT NOT NULL,
    mood_score INTEGER,
    energy_score INTEGER,
    created_at TEXT NOT NULL,
    UNIQUE(user_id, date, slot)
);

CREATE TABLE IF NOT EXISTS weekly_reviews (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    week_start TEXT NOT NULL,
    week_end TEXT NOT NULL,
    completed_steps TEXT NOT NULL DEFAULT '[]',
    failed_steps TEXT NOT NULL DEFAULT '[]',
    reflection TEXT,
    ai_analysis TEXT,
    status TEXT NOT NULL DEFAULT 'in_progress',
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS steps (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    level TEXT NOT NULL,
    title TEXT NOT NULL,
    description TEXT,
    planned_date TEXT,
    done_date TEXT,
    status TEXT NOT NULL DEFAULT 'planned',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS profiles (
    user_id TEXT PRIMARY KEY,
    total_xp INTEGER NOT NULL DEFAULT 0,
    current_level INTEGER NOT NULL DEFAULT 1,
    current_streak INTEGER NOT NULL DEFAULT 0,
    longest_streak INTEGER NOT NULL DEFAULT 0,
    last_activity_date TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS uq_wants_user_draft
    ON wants(user_id) WHERE status = 'draft';
CREATE INDEX IF NOT EXISTS idx_wants_user_updated ON wants(user_id, updated_at DESC);
CREATE INDEX IF NOT EXISTS idx_wants_user_created ON wants(user_id, created_at DESC);
CREATE INDEX IF NOT EXISTS idx_wants_chunks_parent ON wants_chunks(wants_id, created_at);
CREATE INDEX IF NOT EXISTS idx_journal_user_date ON journal_entries(user_id, date DESC);
CREATE INDEX IF NOT EXISTS idx_reviews_user_created ON weekly_reviews(user_id, created_at DESC);
CREATE INDEX IF NOT EXISTS idx_steps_user_created ON steps(user_id, created_at);
CREATE INDEX IF NOT EXISTS idx_steps_user_planned ON steps(user_id, planned_date);

CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER NOT NULL
);
"#;

pub const PRAGMAS: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;
PRAGMA busy_timeout = 5000;
PRAGMA synchronous = NORMAL;
"#;
