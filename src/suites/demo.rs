use anyhow::anyhow;
use std::sync::atomic::{AtomicU32, Ordering};
use std::thread;
use std::time::Duration;

use crate::models::{CaseError, CaseMeta, FnCase, Priority, TestCase};
use crate::task::{TaskError, TestTask};
use crate::utils::{assert_not_raises, assert_raises};
use crate::verify_eq;

const PROJECT: &str = "Demo Shop";

fn meta(module: &str, title: &str, priority: Priority) -> CaseMeta {
    CaseMeta::new(title)
        .with_project(PROJECT)
        .with_module(module)
        .with_priority(priority)
        .with_designer("qa")
}

pub(super) fn build() -> Result<TestTask, TaskError> {
    let mut task = TestTask::new("demo");

    task.add_case(TestCase::from_fn(
        meta("account", "login page loads", Priority::P0),
        |_| Ok(()),
    ));

    task.add_case(TestCase::from_fn(
        meta("cart", "cart total includes tax", Priority::P1)
            .with_description("Fails on purpose: tax is not applied"),
        |_| {
            let subtotal = 100;
            let total = subtotal;
            verify_eq!(total, 108);
            Ok(())
        },
    ));

    task.add_case(TestCase::new(
        meta("checkout", "payment is captured", Priority::P1),
        FnCase::new(|_| Ok(())).with_setup(|_| {
            Err(CaseError::Other(
                anyhow!("connection refused").context("payment sandbox unreachable"),
            ))
        }),
    ));

    task.add_case(TestCase::from_fn(
        meta("reports", "monthly export", Priority::P2)
            .with_description("Takes three seconds; times out with --timeout 1 or 2"),
        |_| {
            thread::sleep(Duration::from_secs(3));
            Ok(())
        },
    ));

    task.add_case(TestCase::from_fn(
        meta("search", "parser rejects garbage", Priority::P2),
        |_| {
            assert_raises(|| "12ab".parse::<u32>(), |_| true)?;
            assert_not_raises(|| "42".parse::<u32>(), |_| true)
        },
    ));

    let calls = AtomicU32::new(0);
    task.add_case(TestCase::from_fn(
        meta("search", "search index warms up", Priority::P1)
            .with_description("Fails on the first attempt only; passes with a retry strategy"),
        move |_| {
            let attempt = calls.fetch_add(1, Ordering::SeqCst) + 1;
            crate::verify!(attempt > 1, "index still cold on attempt {attempt}");
            Ok(())
        },
    ));

    task.add_case(TestCase::from_fn(
        meta("import", "legacy importer", Priority::P3),
        |_| {
            let rows: Vec<u32> = Vec::new();
            // out of bounds: panics inside the case thread, recorded as Block
            let header = rows[0];
            verify_eq!(header, 1);
            Ok(())
        },
    ));

    task.add_case(TestCase::from_fn(
        meta("cart", "coupon stacking", Priority::P2).incomplete(),
        |_| Err(CaseError::other("not written yet")),
    ));

    Ok(task)
}
