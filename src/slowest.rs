//! Ranking of slow tests
//!
//! A test that ran more than once (for example when failures were rerun) is
//! ranked by the median of its elapsed times, so one slow outlier does not
//! dominate the ranking.

use crate::execution::{Execution, TestCase};
use std::collections::HashMap;
use std::time::Duration;

/// The tests of `exec` that took at least `threshold`, slowest first.
///
/// A zero threshold disables the ranking and returns nothing.
pub fn test_cases_from_exec(exec: &Execution, threshold: Duration) -> Vec<TestCase> {
    if threshold.is_zero() {
        return Vec::new();
    }

    let mut tests: Vec<TestCase> = exec
        .packages()
        .iter()
        .filter_map(|name| exec.package(name))
        .flat_map(|pkg| aggregate_test_cases(pkg.test_cases()))
        .collect();

    // Stable, so tests with equal times keep the order they were seen in.
    tests.sort_by(|a, b| b.elapsed.cmp(&a.elapsed));
    let end = tests.partition_point(|tc| tc.elapsed >= threshold);
    tests.truncate(end);
    tests
}

/// Collapse repeated runs of the same test into one case carrying the median
/// elapsed time. Tests are returned in the order they were first seen.
pub fn aggregate_test_cases<'a, I>(cases: I) -> Vec<TestCase>
where
    I: IntoIterator<Item = &'a TestCase>,
{
    let mut order: Vec<&str> = Vec::new();
    let mut groups: HashMap<&str, Vec<&TestCase>> = HashMap::new();
    for tc in cases {
        let name = tc.test.as_str();
        groups
            .entry(name)
            .or_insert_with(|| {
                order.push(name);
                Vec::new()
            })
            .push(tc);
    }

    order
        .into_iter()
        .filter_map(|name| groups.remove(name))
        .map(|group| {
            let mut tc = group[0].clone();
            if group.len() > 1 {
                let elapsed: Vec<Duration> = group.iter().map(|tc| tc.elapsed).collect();
                tc.elapsed = median(elapsed);
            }
            tc
        })
        .collect()
}

/// The middle value of `times`, or the lower of the two middle values when
/// there is an even number of them.
pub fn median(mut times: Vec<Duration>) -> Duration {
    if times.is_empty() {
        return Duration::ZERO;
    }
    times.sort();
    times[(times.len() - 1) / 2]
}
