//! Property tests: arbitrary order sequences never leave a package with more
//! than one current entry, and never leave the flag on a deleted entry.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, TimeZone as _, Utc};
use chrono_tz::Tz;
use proptest::prelude::*;
use roster_core::{
  Engine,
  order::{CourseItem, OrderItem, OrderKind},
  package::{PackageMetadata, PackageType, QuantityType},
  time::start_of_day,
};
use rusqlite::Connection;

use crate::{SqliteBackend, schema::SCHEMA};

const COURSES: [&str; 2] = ["math", "physics"];

#[derive(Debug, Clone)]
enum Step {
  Enroll { course: usize, start: i64, len: i64 },
  Withdraw { course: usize, at: i64, complete: bool },
  Requantify { course: usize, at: i64, slots: i32, complete: bool },
  VoidLast,
  Advance { days: i64 },
  Promote,
}

fn step() -> impl Strategy<Value = Step> {
  let course = 0..COURSES.len();
  prop_oneof![
    (course.clone(), -60i64..60, 1i64..60)
      .prop_map(|(course, start, len)| Step::Enroll { course, start, len }),
    (course.clone(), -60i64..60, any::<bool>())
      .prop_map(|(course, at, complete)| Step::Withdraw { course, at, complete }),
    (course, -60i64..60, 1i32..5, any::<bool>()).prop_map(|(course, at, slots, complete)| {
      Step::Requantify {
        course,
        at,
        slots,
        complete,
      }
    }),
    Just(Step::VoidLast),
    (1i64..20).prop_map(|days| Step::Advance { days }),
    Just(Step::Promote),
  ]
}

struct World {
  conn:    Connection,
  engine:  Engine<SqliteBackend>,
  clock:   Arc<Mutex<DateTime<Utc>>>,
  applied: Vec<OrderItem>,
  serial:  usize,
}

impl World {
  fn new() -> Self {
    let conn = Connection::open_in_memory().expect("in-memory db");
    conn.execute_batch(SCHEMA).expect("schema");
    SqliteBackend
      .put_package_metadata(
        &conn,
        &PackageMetadata {
          product_id:   "product".into(),
          name:         "Weekly".into(),
          package_type: PackageType::Frequency,
          start_at:     None,
          end_at:       None,
        },
      )
      .expect("catalog");
    SqliteBackend
      .put_quantity_type(&conn, PackageType::Frequency, QuantityType::SlotPerWeek)
      .expect("quantity type");

    let clock = Arc::new(Mutex::new(
      Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap(),
    ));
    let shared = Arc::clone(&clock);
    Self {
      conn,
      engine: Engine::with_clock(SqliteBackend, move || *shared.lock().unwrap()),
      clock,
      applied: Vec::new(),
      serial: 0,
    }
  }

  fn now(&self) -> DateTime<Utc> { *self.clock.lock().unwrap() }

  fn order(&mut self, kind: OrderKind, course: usize, at: i64) -> OrderItem {
    self.serial += 1;
    let effective_at = self.now() + Duration::days(at);
    OrderItem {
      order_id: format!("order-{}", self.serial),
      kind,
      is_cancel: false,
      student_id: "student".into(),
      location_id: "location".into(),
      product_id: "product".into(),
      effective_at,
      timezone: Tz::UTC,
      start_at: None,
      end_at: None,
      product_start_at: None,
      is_one_time: false,
      courses: vec![CourseItem {
        course_id: COURSES[course].into(),
        name:      String::new(),
        slots:     Some(1),
        weight:    None,
      }],
      origin_courses: Vec::new(),
      recorded_by: None,
    }
  }

  /// Run `f` in a transaction that only commits on success.
  fn attempt<T>(
    &mut self,
    f: impl FnOnce(&Engine<SqliteBackend>, &Connection) -> roster_core::Result<T>,
  ) -> Option<T> {
    let tx = self.conn.transaction().expect("begin");
    let outcome = f(&self.engine, &tx).ok();
    if outcome.is_some() {
      tx.commit().expect("commit");
    }
    outcome
  }

  fn apply(&mut self, order: OrderItem) {
    if self
      .attempt(|engine, conn| engine.apply_order(conn, &order))
      .is_some()
    {
      self.applied.push(order);
    }
  }

  fn run(&mut self, step: Step) {
    match step {
      Step::Enroll { course, start, len } => {
        let mut order = self.order(OrderKind::New, course, start);
        order.end_at = Some(order.effective_at + Duration::days(len));
        self.apply(order);
      }
      Step::Withdraw {
        course,
        at,
        complete,
      } => {
        let mut order = self.order(OrderKind::Withdrawal, course, at);
        if complete {
          order.product_start_at = Some(start_of_day(order.effective_at, Tz::UTC));
        }
        self.apply(order);
      }
      Step::Requantify {
        course,
        at,
        slots,
        complete,
      } => {
        let mut order = self.order(OrderKind::Update, course, at);
        order.origin_courses = order.courses.clone();
        order.courses[0].slots = Some(slots + 1);
        if complete {
          order.product_start_at = Some(start_of_day(order.effective_at, Tz::UTC));
        }
        self.apply(order);
      }
      Step::VoidLast => {
        if let Some(order) = self.applied.pop() {
          self.attempt(|engine, conn| engine.void_order(conn, &order));
        }
      }
      Step::Advance { days } => *self.clock.lock().unwrap() += Duration::days(days),
      Step::Promote => {
        let due = self
          .attempt(|engine, conn| engine.due_for_promotion(conn, Duration::days(30)))
          .unwrap_or_default();
        for package_id in due {
          self.attempt(|engine, conn| engine.promote_package(conn, package_id));
        }
      }
    }
  }

  fn max_current_per_package(&self) -> i64 {
    self
      .conn
      .query_row(
        "SELECT COALESCE(MAX(n), 0) FROM (
           SELECT COUNT(*) AS n FROM timeline_entries
           WHERE is_current = 1 GROUP BY package_id
         )",
        [],
        |row| row.get(0),
      )
      .expect("count current entries")
  }

  fn deleted_current(&self) -> i64 {
    self
      .conn
      .query_row(
        "SELECT COUNT(*) FROM timeline_entries WHERE is_current = 1 AND deleted_at IS NOT NULL",
        [],
        |row| row.get(0),
      )
      .expect("count deleted current entries")
  }
}

proptest! {
  #![proptest_config(ProptestConfig::with_cases(64))]

  /// Property: at most one live current entry per package after every step.
  #[test]
  fn prop_at_most_one_current_entry(steps in prop::collection::vec(step(), 1..24)) {
    let mut world = World::new();
    for step in steps {
      world.run(step);
      prop_assert!(world.max_current_per_package() <= 1);
      prop_assert_eq!(world.deleted_current(), 0);
    }
  }
}
