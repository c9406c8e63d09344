pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS logs (
  id BIGINT PRIMARY KEY,
  ts TIMESTAMP NOT NULL,
  severity TEXT NOT NULL,
  text_payload TEXT,
  resource TEXT NOT NULL
);

CREATE SEQUENCE IF NOT EXISTS logs_id_seq;

CREATE INDEX IF NOT EXISTS idx_logs_ts ON logs(ts);
CREATE INDEX IF NOT EXISTS idx_logs_severity ON logs(severity);
"#;
