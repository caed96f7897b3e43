//! Helpers shared by unit tests.

use std::thread;
use std::time::{Duration, Instant};

/// Poll `condition` until it holds or two seconds pass.
pub(crate) fn wait_until(condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}
