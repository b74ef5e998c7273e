pub const SCHEMA: &str = r#"
-- Subscriptions: one row per (owner, rounded location)
CREATE TABLE IF NOT EXISTS subscriptions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    owner_id INTEGER NOT NULL,
    x REAL NOT NULL,             -- longitude, rounded to 4 decimals
    y REAL NOT NULL,             -- latitude, rounded to 4 decimals
    label TEXT NOT NULL,
    sweep_days TEXT NOT NULL,    -- JSON array of weekday names
    sweep_schedule TEXT NOT NULL,
    sweep_time TEXT,
    street_name TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    UNIQUE(owner_id, x, y)
);

CREATE INDEX IF NOT EXISTS idx_subscriptions_owner ON subscriptions(owner_id);
"#;

