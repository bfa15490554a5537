//! The periodic timer task: a named thread that sweeps the timer pool at
//! the configured frequency with the global lock held.

use std::sync::atomic::Ordering;
use std::sync::{Arc, Weak};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::net::NetShared;

pub use timer_wheel::PoolStats;

/// Spawn the timer task. The thread holds only a weak reference to the
/// stack so that dropping the last [`Net`](crate::net::Net) handle shuts it
/// down.
pub(crate) fn spawn_task(
    shared: &Arc<NetShared>,
    period: Duration,
) -> std::io::Result<JoinHandle<()>> {
    let weak: Weak<NetShared> = Arc::downgrade(shared);

    std::thread::Builder::new()
        .name("net-tmr".into())
        .spawn(move || {
            log::debug!("timer task running, sweep period {period:?}");

            loop {
                std::thread::sleep(period);

                let Some(shared) = weak.upgrade() else {
                    break;
                };

                if shared.stop.load(Ordering::Relaxed) {
                    break;
                }

                let Ok(mut stack) = shared.lock.acquire("tmr_task") else {
                    break;
                };

                let tmr = Arc::clone(&shared.tmr);
                tmr.sweep(&mut stack);
            }

            log::debug!("timer task exiting");
        })
}
