//! [`SqliteStore`] — the SQLite implementation of [`AttendanceStore`].

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension as _;
use tokio::sync::broadcast;
use uuid::Uuid;

use rollcall_core::{
  attendance::{AttendanceEntry, AttendanceLog, NewAttendanceLog},
  identity::{
    Course, Enrollment, Lecturer, NewCourse, NewLecturer, NewStudent, StaffId,
    Student,
  },
  session::{NewSession, Session},
  store::{AttendanceInsert, AttendanceStore, AttendanceTotal, StoreEvent},
};

use crate::{
  encode::{
    COURSE_COLS, LOG_COLS, RawCourse, RawEntry, RawLecturer, RawSession,
    RawStudent, SESSION_COLS, STUDENT_COLS, encode_dt, encode_status,
    encode_uuid, read_course, read_log, read_session, read_student,
  },
  schema::SCHEMA,
  Error, Result,
};

/// Buffered events per subscriber before it is considered lagged and must
/// re-fetch.
const EVENT_BUFFER: usize = 256;

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Rollcall store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted and all
/// clones share one change-feed channel, so every client handle observes the
/// same event stream.
#[derive(Clone)]
pub struct SqliteStore {
  conn:   tokio_rusqlite::Connection,
  events: broadcast::Sender<StoreEvent>,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    Self::with_conn(conn).await
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    Self::with_conn(conn).await
  }

  async fn with_conn(conn: tokio_rusqlite::Connection) -> Result<Self> {
    let (events, _) = broadcast::channel(EVENT_BUFFER);
    let store = Self { conn, events };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  fn emit(&self, event: StoreEvent) {
    // No receivers is fine; the feed is best-effort fan-out.
    let _ = self.events.send(event);
  }
}

// ─── AttendanceStore impl ────────────────────────────────────────────────────

impl AttendanceStore for SqliteStore {
  type Error = Error;

  // ── Registry writes ───────────────────────────────────────────────────────

  async fn add_student(&self, input: NewStudent) -> Result<Student> {
    let student = Student {
      student_id: Uuid::new_v4(),
      number:     input.number,
      rfid_tag:   input.rfid_tag,
      first_name: input.first_name,
      last_name:  input.last_name,
      email:      input.email,
      photo_url:  input.photo_url,
      created_at: Utc::now(),
    };

    let row = (
      encode_uuid(student.student_id),
      student.number.clone(),
      student.rfid_tag.clone(),
      student.first_name.clone(),
      student.last_name.clone(),
      student.email.clone(),
      student.photo_url.clone(),
      encode_dt(student.created_at),
    );

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO students
             (student_id, number, rfid_tag, first_name, last_name, email,
              photo_url, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
          rusqlite::params![
            row.0, row.1, row.2, row.3, row.4, row.5, row.6, row.7
          ],
        )?;
        Ok(())
      })
      .await?;

    Ok(student)
  }

  async fn add_lecturer(&self, input: NewLecturer) -> Result<Lecturer> {
    let lecturer = Lecturer {
      lecturer_id: Uuid::new_v4(),
      staff_id:    input.staff_id,
      first_name:  input.first_name,
      last_name:   input.last_name,
      email:       input.email,
      department:  input.department,
      created_at:  Utc::now(),
    };

    let row = (
      encode_uuid(lecturer.lecturer_id),
      lecturer.staff_id.to_string(),
      lecturer.first_name.clone(),
      lecturer.last_name.clone(),
      lecturer.email.clone(),
      lecturer.department.clone(),
      encode_dt(lecturer.created_at),
    );

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO lecturers
             (lecturer_id, staff_id, first_name, last_name, email,
              department, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
          rusqlite::params![row.0, row.1, row.2, row.3, row.4, row.5, row.6],
        )?;
        Ok(())
      })
      .await?;

    Ok(lecturer)
  }

  async fn add_course(&self, input: NewCourse) -> Result<Course> {
    let course = Course {
      course_id:   Uuid::new_v4(),
      code:        input.code,
      name:        input.name,
      lecturer_id: input.lecturer_id,
      description: input.description,
      created_at:  Utc::now(),
    };

    let row = (
      encode_uuid(course.course_id),
      course.code.clone(),
      course.name.clone(),
      course.lecturer_id.map(encode_uuid),
      course.description.clone(),
      encode_dt(course.created_at),
    );

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO courses
             (course_id, code, name, lecturer_id, description, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          rusqlite::params![row.0, row.1, row.2, row.3, row.4, row.5],
        )?;
        Ok(())
      })
      .await?;

    Ok(course)
  }

  async fn add_enrollment(
    &self,
    student_id: Uuid,
    course_id: Uuid,
  ) -> Result<Enrollment> {
    let enrollment = Enrollment {
      enrollment_id: Uuid::new_v4(),
      student_id,
      course_id,
    };

    let id_str      = encode_uuid(enrollment.enrollment_id);
    let student_str = encode_uuid(student_id);
    let course_str  = encode_uuid(course_id);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO enrollments (enrollment_id, student_id, course_id)
           VALUES (?1, ?2, ?3)",
          rusqlite::params![id_str, student_str, course_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(enrollment)
  }

  async fn claim_course(
    &self,
    course_id: Uuid,
    lecturer_id: Uuid,
  ) -> Result<Option<Course>> {
    let course_str   = encode_uuid(course_id);
    let lecturer_str = encode_uuid(lecturer_id);

    // Conditional at the store layer: only an unassigned row is updated.
    let claimed = self
      .conn
      .call(move |conn| {
        let changed = conn.execute(
          "UPDATE courses SET lecturer_id = ?2
           WHERE course_id = ?1 AND lecturer_id IS NULL",
          rusqlite::params![course_str, lecturer_str],
        )?;
        Ok(changed > 0)
      })
      .await?;

    if !claimed {
      return Ok(None);
    }
    self.get_course(course_id).await
  }

  // ── Point queries ──────────────────────────────────────────────────────────

  async fn student_by_tag(&self, tag: &str) -> Result<Option<Student>> {
    let tag = tag.to_owned();
    let raw: Option<RawStudent> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {STUDENT_COLS} FROM students WHERE rfid_tag = ?1"),
            rusqlite::params![tag],
            |row| read_student(row, 0),
          )
          .optional()?)
      })
      .await?;

    raw.map(RawStudent::into_student).transpose()
  }

  async fn student_by_number(&self, number: &str) -> Result<Option<Student>> {
    let number = number.to_owned();
    let raw: Option<RawStudent> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {STUDENT_COLS} FROM students WHERE number = ?1"),
            rusqlite::params![number],
            |row| read_student(row, 0),
          )
          .optional()?)
      })
      .await?;

    raw.map(RawStudent::into_student).transpose()
  }

  async fn lecturer_by_staff_id(
    &self,
    staff_id: &StaffId,
  ) -> Result<Option<Lecturer>> {
    let id_str = staff_id.to_string();
    let raw: Option<RawLecturer> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT lecturer_id, staff_id, first_name, last_name, email,
                    department, created_at
             FROM lecturers WHERE staff_id = ?1",
            rusqlite::params![id_str],
            |row| {
              Ok(RawLecturer {
                lecturer_id: row.get(0)?,
                staff_id:    row.get(1)?,
                first_name:  row.get(2)?,
                last_name:   row.get(3)?,
                email:       row.get(4)?,
                department:  row.get(5)?,
                created_at:  row.get(6)?,
              })
            },
          )
          .optional()?)
      })
      .await?;

    raw.map(RawLecturer::into_lecturer).transpose()
  }

  async fn get_course(&self, course_id: Uuid) -> Result<Option<Course>> {
    let id_str = encode_uuid(course_id);
    let raw: Option<RawCourse> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {COURSE_COLS} FROM courses WHERE course_id = ?1"),
            rusqlite::params![id_str],
            read_course,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawCourse::into_course).transpose()
  }

  async fn get_session(&self, session_id: Uuid) -> Result<Option<Session>> {
    let id_str = encode_uuid(session_id);
    let raw: Option<RawSession> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {SESSION_COLS} FROM sessions WHERE session_id = ?1"),
            rusqlite::params![id_str],
            read_session,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawSession::into_session).transpose()
  }

  // ── Filtered queries ───────────────────────────────────────────────────────

  async fn list_students(&self) -> Result<Vec<Student>> {
    let raws: Vec<RawStudent> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {STUDENT_COLS} FROM students ORDER BY last_name, first_name"
        ))?;
        let rows = stmt
          .query_map([], |row| read_student(row, 0))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawStudent::into_student).collect()
  }

  async fn list_courses(&self) -> Result<Vec<Course>> {
    let raws: Vec<RawCourse> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn
          .prepare(&format!("SELECT {COURSE_COLS} FROM courses ORDER BY code"))?;
        let rows = stmt
          .query_map([], read_course)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawCourse::into_course).collect()
  }

  async fn courses_for_lecturer(&self, lecturer_id: Uuid) -> Result<Vec<Course>> {
    let id_str = encode_uuid(lecturer_id);
    let raws: Vec<RawCourse> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {COURSE_COLS} FROM courses WHERE lecturer_id = ?1
           ORDER BY code"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![id_str], read_course)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawCourse::into_course).collect()
  }

  async fn roster(&self, course_id: Uuid) -> Result<Vec<Student>> {
    let id_str = encode_uuid(course_id);
    let raws: Vec<RawStudent> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {STUDENT_COLS_PREFIXED} FROM enrollments e
           JOIN students s ON s.student_id = e.student_id
           WHERE e.course_id = ?1
           ORDER BY s.last_name, s.first_name",
          STUDENT_COLS_PREFIXED = prefixed_student_cols()
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![id_str], |row| read_student(row, 0))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawStudent::into_student).collect()
  }

  async fn is_enrolled(&self, student_id: Uuid, course_id: Uuid) -> Result<bool> {
    let student_str = encode_uuid(student_id);
    let course_str  = encode_uuid(course_id);

    let found = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT 1 FROM enrollments
               WHERE student_id = ?1 AND course_id = ?2",
              rusqlite::params![student_str, course_str],
              |_| Ok(()),
            )
            .optional()?
            .is_some(),
        )
      })
      .await?;

    Ok(found)
  }

  async fn active_sessions(&self) -> Result<Vec<Session>> {
    let raws: Vec<RawSession> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {SESSION_COLS} FROM sessions WHERE is_active = 1
           ORDER BY start_time DESC"
        ))?;
        let rows = stmt
          .query_map([], read_session)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawSession::into_session).collect()
  }

  // ── Session writes ─────────────────────────────────────────────────────────

  async fn insert_session(&self, input: NewSession) -> Result<Session> {
    let session = Session {
      session_id:  Uuid::new_v4(),
      course_id:   input.course_id,
      lecturer_id: input.lecturer_id,
      start_time:  Utc::now(),
      end_time:    None,
      is_active:   true,
    };

    let id_str       = encode_uuid(session.session_id);
    let course_str   = encode_uuid(session.course_id);
    let lecturer_str = encode_uuid(session.lecturer_id);
    let start_str    = encode_dt(session.start_time);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO sessions
             (session_id, course_id, lecturer_id, start_time, end_time,
              is_active)
           VALUES (?1, ?2, ?3, ?4, NULL, 1)",
          rusqlite::params![id_str, course_str, lecturer_str, start_str],
        )?;
        Ok(())
      })
      .await?;

    self.emit(StoreEvent::SessionStarted(session.clone()));
    Ok(session)
  }

  async fn deactivate_all_sessions(&self, now: DateTime<Utc>) -> Result<Vec<Uuid>> {
    let now_str = encode_dt(now);

    let swept: Vec<String> = self
      .conn
      .call(move |conn| {
        let ids = {
          let mut stmt = conn
            .prepare("SELECT session_id FROM sessions WHERE is_active = 1")?;
          stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?
        };
        conn.execute(
          "UPDATE sessions SET is_active = 0, end_time = ?1
           WHERE is_active = 1",
          rusqlite::params![now_str],
        )?;
        Ok(ids)
      })
      .await?;

    let ids = swept
      .iter()
      .map(|s| Uuid::parse_str(s))
      .collect::<Result<Vec<_>, _>>()
      .map_err(Error::Uuid)?;

    for session_id in &ids {
      self.emit(StoreEvent::SessionClosed { session_id: *session_id });
    }
    Ok(ids)
  }

  async fn finish_session(&self, session_id: Uuid, now: DateTime<Utc>) -> Result<()> {
    let id_str  = encode_uuid(session_id);
    let now_str = encode_dt(now);

    let changed = self
      .conn
      .call(move |conn| {
        let changed = conn.execute(
          "UPDATE sessions SET is_active = 0, end_time = ?2
           WHERE session_id = ?1 AND is_active = 1",
          rusqlite::params![id_str, now_str],
        )?;
        Ok(changed > 0)
      })
      .await?;

    if changed {
      self.emit(StoreEvent::SessionClosed { session_id });
    }
    Ok(())
  }

  // ── Attendance ─────────────────────────────────────────────────────────────

  async fn attendance_for(
    &self,
    student_id: Uuid,
    session_id: Uuid,
  ) -> Result<Option<AttendanceLog>> {
    let student_str = encode_uuid(student_id);
    let session_str = encode_uuid(session_id);

    let raw = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!(
              "SELECT {LOG_COLS} FROM attendance_logs
               WHERE student_id = ?1 AND session_id = ?2"
            ),
            rusqlite::params![student_str, session_str],
            |row| read_log(row, 0),
          )
          .optional()?)
      })
      .await?;

    raw.map(|r| r.into_log()).transpose()
  }

  async fn insert_attendance(
    &self,
    input: NewAttendanceLog,
  ) -> Result<AttendanceInsert> {
    let log = AttendanceLog {
      log_id:     Uuid::new_v4(),
      student_id: input.student_id,
      course_id:  input.course_id,
      session_id: input.session_id,
      timestamp:  Utc::now(),
      status:     input.status,
    };

    let id_str      = encode_uuid(log.log_id);
    let student_str = encode_uuid(log.student_id);
    let course_str  = encode_uuid(log.course_id);
    let session_str = log.session_id.map(encode_uuid);
    let ts_str      = encode_dt(log.timestamp);
    let status_str  = encode_status(log.status).to_owned();

    // The unique constraint on (student_id, session_id) is the authority:
    // classify its violation as Duplicate, propagate everything else.
    let inserted = self
      .conn
      .call(move |conn| {
        let result = conn.execute(
          "INSERT INTO attendance_logs
             (log_id, student_id, course_id, session_id, timestamp, status)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          rusqlite::params![
            id_str, student_str, course_str, session_str, ts_str, status_str
          ],
        );
        match result {
          Ok(_) => Ok(true),
          Err(rusqlite::Error::SqliteFailure(e, _))
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
          {
            Ok(false)
          }
          Err(e) => Err(e.into()),
        }
      })
      .await?;

    if !inserted {
      return Ok(AttendanceInsert::Duplicate);
    }

    self.emit(StoreEvent::AttendanceRecorded {
      log_id:     log.log_id,
      session_id: log.session_id,
    });
    Ok(AttendanceInsert::Inserted(log))
  }

  async fn logs_for_session(&self, session_id: Uuid) -> Result<Vec<AttendanceEntry>> {
    let id_str = encode_uuid(session_id);

    let raws: Vec<RawEntry> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {log_cols}, {student_cols}
           FROM attendance_logs a
           JOIN students s ON s.student_id = a.student_id
           WHERE a.session_id = ?1
           ORDER BY a.timestamp DESC, a.log_id DESC",
          log_cols = prefixed_log_cols(),
          student_cols = prefixed_student_cols(),
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![id_str], |row| {
            Ok(RawEntry {
              log:     read_log(row, 0)?,
              student: read_student(row, 6)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawEntry::into_entry).collect()
  }

  async fn log_entry(&self, log_id: Uuid) -> Result<Option<AttendanceEntry>> {
    let id_str = encode_uuid(log_id);

    let raw: Option<RawEntry> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!(
              "SELECT {log_cols}, {student_cols}
               FROM attendance_logs a
               JOIN students s ON s.student_id = a.student_id
               WHERE a.log_id = ?1",
              log_cols = prefixed_log_cols(),
              student_cols = prefixed_student_cols(),
            ),
            rusqlite::params![id_str],
            |row| {
              Ok(RawEntry {
                log:     read_log(row, 0)?,
                student: read_student(row, 6)?,
              })
            },
          )
          .optional()?)
      })
      .await?;

    raw.map(RawEntry::into_entry).transpose()
  }

  // ── Report reads ───────────────────────────────────────────────────────────

  async fn sessions_held(&self, course_id: Uuid) -> Result<u64> {
    let id_str = encode_uuid(course_id);
    let count: i64 = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          "SELECT COUNT(*) FROM sessions WHERE course_id = ?1",
          rusqlite::params![id_str],
          |row| row.get(0),
        )?)
      })
      .await?;
    Ok(count as u64)
  }

  async fn attendance_totals(&self, course_id: Uuid) -> Result<Vec<AttendanceTotal>> {
    let id_str = encode_uuid(course_id);

    let raws: Vec<(RawStudent, i64)> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {student_cols}, COUNT(a.log_id) AS attended
           FROM enrollments e
           JOIN students s ON s.student_id = e.student_id
           LEFT JOIN attendance_logs a
             ON a.student_id = s.student_id AND a.course_id = e.course_id
           WHERE e.course_id = ?1
           GROUP BY s.student_id
           ORDER BY s.last_name, s.first_name",
          student_cols = prefixed_student_cols(),
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![id_str], |row| {
            Ok((read_student(row, 0)?, row.get::<_, i64>(8)?))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws
      .into_iter()
      .map(|(raw, attended)| {
        Ok(AttendanceTotal {
          student:  raw.into_student()?,
          attended: attended as u64,
        })
      })
      .collect()
  }

  // ── Change feed ────────────────────────────────────────────────────────────

  fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
    self.events.subscribe()
  }
}

// ─── Column helpers ──────────────────────────────────────────────────────────

/// [`STUDENT_COLS`] qualified with the `s.` alias used by join queries.
fn prefixed_student_cols() -> String {
  STUDENT_COLS
    .split(',')
    .map(|c| format!("s.{}", c.trim()))
    .collect::<Vec<_>>()
    .join(", ")
}

/// [`LOG_COLS`] qualified with the `a.` alias used by join queries.
fn prefixed_log_cols() -> String {
  LOG_COLS
    .split(',')
    .map(|c| format!("a.{}", c.trim()))
    .collect::<Vec<_>>()
    .join(", ")
}
