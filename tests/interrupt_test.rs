//! Ctrl-C during write-back. Kept in its own test binary because it sends
//! SIGINT to the whole process.
#![cfg(unix)]

use lastfm_playcount_sync::{
    apply_decisions, CancellationState, LibraryTrack, MediaLibrary, Reconciliation, Result,
    SyncError, UpdateDecision,
};
use std::process::Command;
use std::thread;
use std::time::{Duration, Instant};

/// A library whose first write behaves like a user pressing Ctrl-C while a
/// slow, blocking update is in flight.
struct CtrlCOnFirstWrite {
    cancel: CancellationState,
    writes: usize,
}

impl MediaLibrary for CtrlCOnFirstWrite {
    fn list_tracks(&self) -> Result<Vec<Result<LibraryTrack>>> {
        Ok(Vec::new())
    }

    fn set_play_count(&mut self, _track: &LibraryTrack, _play_count: u64) -> Result<()> {
        self.writes += 1;
        if self.writes == 1 {
            let status = Command::new("kill")
                .args(["-INT", &std::process::id().to_string()])
                .status()
                .unwrap();
            assert!(status.success());

            // Block this thread the way a running osascript does.
            let deadline = Instant::now() + Duration::from_secs(5);
            while !self.cancel.is_cancelled() && Instant::now() < deadline {
                thread::sleep(Duration::from_millis(10));
            }
        }
        Ok(())
    }
}

fn apply(id: &str, count: u64) -> Reconciliation {
    Reconciliation {
        track: LibraryTrack::new(id, "The Beatles", format!("Track {id}"), 1),
        decision: UpdateDecision::Apply(count),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_ctrl_c_stops_write_back_between_tracks() {
    let cancel = CancellationState::new();
    cancel.cancel_on_ctrl_c().unwrap();

    let reconciliations = vec![apply("1", 10), apply("2", 20), apply("3", 30)];
    let mut library = CtrlCOnFirstWrite {
        cancel: cancel.clone(),
        writes: 0,
    };

    let result = apply_decisions(&mut library, &reconciliations, false, &cancel);

    assert!(cancel.is_cancelled());
    assert!(matches!(result, Err(SyncError::Interrupted)));
    assert_eq!(library.writes, 1);
}
