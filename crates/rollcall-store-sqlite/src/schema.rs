//! SQL schema for the Rollcall SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! the `PRAGMA user_version` number.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS students (
    student_id  TEXT PRIMARY KEY,
    number      TEXT NOT NULL UNIQUE,  -- human-assigned, e.g. 'S001'
    rfid_tag    TEXT UNIQUE,           -- raw card value; NULL until assigned
    first_name  TEXT NOT NULL,
    last_name   TEXT NOT NULL,
    email       TEXT NOT NULL,
    photo_url   TEXT,
    created_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS lecturers (
    lecturer_id TEXT PRIMARY KEY,
    staff_id    TEXT NOT NULL UNIQUE,  -- 'SMAF/' + 4 digits
    first_name  TEXT NOT NULL,
    last_name   TEXT NOT NULL,
    email       TEXT NOT NULL,
    department  TEXT NOT NULL,
    created_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS courses (
    course_id   TEXT PRIMARY KEY,
    code        TEXT NOT NULL UNIQUE,
    name        TEXT NOT NULL,
    lecturer_id TEXT REFERENCES lecturers(lecturer_id),  -- NULL = unassigned
    description TEXT,
    created_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS enrollments (
    enrollment_id TEXT PRIMARY KEY,
    student_id    TEXT NOT NULL REFERENCES students(student_id),
    course_id     TEXT NOT NULL REFERENCES courses(course_id),
    UNIQUE (student_id, course_id)
);

-- Session rows are never deleted; stopping a session only flips is_active
-- and stamps end_time.
CREATE TABLE IF NOT EXISTS sessions (
    session_id  TEXT PRIMARY KEY,
    course_id   TEXT NOT NULL REFERENCES courses(course_id),
    lecturer_id TEXT NOT NULL REFERENCES lecturers(lecturer_id),
    start_time  TEXT NOT NULL,         -- ISO 8601 UTC
    end_time    TEXT,
    is_active   INTEGER NOT NULL DEFAULT 0
);

-- Attendance logs are strictly append-only.
-- No UPDATE or DELETE is ever issued against this table.
-- The composite unique key is the exactly-once guarantee; the application
-- pre-check is an optimization only.
CREATE TABLE IF NOT EXISTS attendance_logs (
    log_id      TEXT PRIMARY KEY,
    student_id  TEXT NOT NULL REFERENCES students(student_id),
    course_id   TEXT NOT NULL REFERENCES courses(course_id),
    session_id  TEXT REFERENCES sessions(session_id),
    timestamp   TEXT NOT NULL,         -- ISO 8601 UTC; server-assigned
    status      TEXT NOT NULL DEFAULT 'present',
    UNIQUE (student_id, session_id)
);

CREATE INDEX IF NOT EXISTS sessions_active_idx    ON sessions(is_active);
CREATE INDEX IF NOT EXISTS sessions_course_idx    ON sessions(course_id);
CREATE INDEX IF NOT EXISTS logs_session_idx       ON attendance_logs(session_id);
CREATE INDEX IF NOT EXISTS logs_timestamp_idx     ON attendance_logs(timestamp);
CREATE INDEX IF NOT EXISTS enrollments_course_idx ON enrollments(course_id);

PRAGMA user_version = 1;
";
