use chrono::Utc;
use marquee_core::events::SeatBroadcaster;
use marquee_core::keys;
use marquee_core::lease::{AcquireOutcome, LeaseStore};
use marquee_core::{CoreError, CoreResult};
use marquee_shared::{OccupiedSeat, SeatStatus, SeatUpdate};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// A granted hold and when it lapses (epoch millis).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeatHold {
    pub seat_number: String,
    pub expires_at: i64,
}

/// Hold, release and inspect seat leases.
///
/// Stateless: every decision is taken by the lease store, so any number of
/// managers in any number of processes may run against the same store.
pub struct SeatLeaseManager {
    store: Arc<dyn LeaseStore>,
    broadcaster: Arc<dyn SeatBroadcaster>,
    hold_ttl: Duration,
}

fn expires_at(ttl: Duration) -> i64 {
    Utc::now().timestamp_millis() + ttl.as_millis() as i64
}

/// Longest seat number the booking schema stores.
pub const MAX_SEAT_NUMBER_LEN: usize = 10;

fn require(value: &str, field: &str) -> CoreResult<()> {
    if value.trim().is_empty() {
        return Err(CoreError::ValidationError(format!("{} must not be empty", field)));
    }
    Ok(())
}

pub(crate) fn validate_seat_number(seat_number: &str) -> CoreResult<()> {
    require(seat_number, "seat_number")?;
    if seat_number.chars().count() > MAX_SEAT_NUMBER_LEN {
        return Err(CoreError::ValidationError(format!(
            "seat_number {} exceeds {} characters",
            seat_number, MAX_SEAT_NUMBER_LEN
        )));
    }
    Ok(())
}

/// Non-empty list of valid seat numbers, each named once.
pub(crate) fn validate_seat_list(seat_numbers: &[String]) -> CoreResult<()> {
    if seat_numbers.is_empty() {
        return Err(CoreError::ValidationError("seat_numbers must not be empty".to_string()));
    }
    let mut seen = HashSet::new();
    for seat in seat_numbers {
        validate_seat_number(seat)?;
        if !seen.insert(seat.as_str()) {
            return Err(CoreError::ValidationError(format!("seat {} requested twice", seat)));
        }
    }
    Ok(())
}

impl SeatLeaseManager {
    pub fn new(store: Arc<dyn LeaseStore>, broadcaster: Arc<dyn SeatBroadcaster>, hold_ttl: Duration) -> Self {
        Self { store, broadcaster, hold_ttl }
    }

    pub fn hold_ttl(&self) -> Duration {
        self.hold_ttl
    }

    /// Transition: AVAILABLE → HELD
    ///
    /// Calling again while already holding the seat is denied like any other
    /// contention and does not extend the lease.
    pub async fn hold(&self, show_id: i64, seat_number: &str, user_id: &str) -> CoreResult<SeatHold> {
        validate_seat_number(seat_number)?;
        require(user_id, "user_id")?;

        let booked_key = keys::booked(show_id, seat_number);
        if self.store.exists(&booked_key).await? {
            debug!("Hold on show {} seat {} refused: already booked", show_id, seat_number);
            return Err(CoreError::SeatNotAvailable(seat_number.to_string()));
        }

        let hold_key = keys::hold(show_id, seat_number);
        match self.store.acquire(&hold_key, &booked_key, user_id, self.hold_ttl).await? {
            AcquireOutcome::Acquired => {
                let expires_at = expires_at(self.hold_ttl);
                info!("Seat {} of show {} held by {} until {}", seat_number, show_id, user_id, expires_at);
                self.broadcaster.publish(SeatUpdate::held(show_id, user_id, seat_number, expires_at));
                Ok(SeatHold { seat_number: seat_number.to_string(), expires_at })
            }
            AcquireOutcome::AlreadyHeld => Err(CoreError::AlreadyHeld(seat_number.to_string())),
            // Booked between the check above and the acquire
            AcquireOutcome::Blocked => Err(CoreError::SeatNotAvailable(seat_number.to_string())),
        }
    }

    /// All-or-nothing hold of several seats, acquired in request order.
    ///
    /// On the first denial the seats acquired by this call are released again
    /// (only where still held by `user_id`) and the denial is returned.
    pub async fn hold_all(&self, show_id: i64, seat_numbers: &[String], user_id: &str) -> CoreResult<Vec<SeatHold>> {
        validate_seat_list(seat_numbers)?;

        let mut acquired = Vec::with_capacity(seat_numbers.len());
        for seat in seat_numbers {
            match self.hold(show_id, seat, user_id).await {
                Ok(hold) => acquired.push(hold),
                Err(err) => {
                    let taken: Vec<String> = acquired.into_iter().map(|h| h.seat_number).collect();
                    if !taken.is_empty() {
                        warn!(
                            "Batch hold for {} on show {} failed at seat {} ({}), rolling back {:?}",
                            user_id, show_id, seat, err.code(), taken
                        );
                        self.release_all(show_id, &taken, user_id).await;
                    }
                    return Err(err);
                }
            }
        }
        Ok(acquired)
    }

    /// Transition: HELD → AVAILABLE. Only the current holder may release.
    pub async fn release(&self, show_id: i64, seat_number: &str, user_id: &str) -> CoreResult<()> {
        let hold_key = keys::hold(show_id, seat_number);
        if !self.store.release_if_holder(&hold_key, user_id).await? {
            return Err(CoreError::NotHolder {
                seat: seat_number.to_string(),
                user: user_id.to_string(),
            });
        }

        info!("Seat {} of show {} released by {}", seat_number, show_id, user_id);
        self.broadcaster.publish(SeatUpdate::available(show_id, user_id, vec![seat_number.to_string()]));
        Ok(())
    }

    /// Best-effort release of every seat still held by `user_id`. Seats held by
    /// someone else, already expired or failing in the store are skipped and
    /// logged. Returns the seats actually released.
    pub async fn release_all(&self, show_id: i64, seat_numbers: &[String], user_id: &str) -> Vec<String> {
        let mut released = Vec::new();
        for seat in seat_numbers {
            let hold_key = keys::hold(show_id, seat);
            match self.store.release_if_holder(&hold_key, user_id).await {
                Ok(true) => released.push(seat.clone()),
                Ok(false) => debug!("Seat {} of show {} no longer held by {}", seat, show_id, user_id),
                Err(e) => warn!("Failed to release seat {} of show {} for {}: {}", seat, show_id, user_id, e),
            }
        }

        if !released.is_empty() {
            info!("Released seats {:?} of show {} for {}", released, show_id, user_id);
            self.broadcaster.publish(SeatUpdate::available(show_id, user_id, released.clone()));
        }
        released
    }

    pub async fn is_held(&self, show_id: i64, seat_number: &str) -> CoreResult<bool> {
        self.store.exists(&keys::hold(show_id, seat_number)).await
    }

    pub async fn is_booked(&self, show_id: i64, seat_number: &str) -> CoreResult<bool> {
        self.store.exists(&keys::booked(show_id, seat_number)).await
    }

    /// Current holder of the lease, if any.
    pub async fn holder(&self, show_id: i64, seat_number: &str) -> CoreResult<Option<String>> {
        self.store.get(&keys::hold(show_id, seat_number)).await
    }

    pub async fn remaining_ttl(&self, show_id: i64, seat_number: &str) -> CoreResult<Option<Duration>> {
        self.store.remaining_ttl(&keys::hold(show_id, seat_number)).await
    }

    /// Fresh snapshot of held and booked seats of a show, ordered by seat.
    /// Keys that vanish between the scan and the read are skipped.
    pub async fn list_occupied(&self, show_id: i64) -> CoreResult<Vec<OccupiedSeat>> {
        let now = Utc::now().timestamp_millis();
        let mut occupied = Vec::new();

        let booked_prefix = keys::booked_prefix(show_id);
        let mut booked_seats = HashSet::new();
        for key in self.store.scan_prefix(&booked_prefix).await? {
            let Some(seat) = keys::seat_number(&key, &booked_prefix) else { continue };
            let Some(holder) = self.store.get(&key).await? else { continue };
            booked_seats.insert(seat.to_string());
            occupied.push(OccupiedSeat {
                show_id,
                user_id: holder,
                seat_number: seat.to_string(),
                status: SeatStatus::Booked,
                expires_at: 0,
            });
        }

        let hold_prefix = keys::hold_prefix(show_id);
        for key in self.store.scan_prefix(&hold_prefix).await? {
            let Some(seat) = keys::seat_number(&key, &hold_prefix) else { continue };
            // A booked marker supersedes any lease on the same seat
            if booked_seats.contains(seat) {
                continue;
            }
            let Some(holder) = self.store.get(&key).await? else { continue };
            let Some(ttl) = self.store.remaining_ttl(&key).await? else { continue };
            occupied.push(OccupiedSeat {
                show_id,
                user_id: holder,
                seat_number: seat.to_string(),
                status: SeatStatus::Held,
                expires_at: now + ttl.as_millis() as i64,
            });
        }

        occupied.sort_by(|a, b| a.seat_number.cmp(&b.seat_number));
        Ok(occupied)
    }
}
