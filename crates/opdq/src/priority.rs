//! Priority scoring for token requests.

use crate::token::{PaymentStatus, TokenSource};

/// Score granted by the emergency override and the EMERGENCY source tag.
const EMERGENCY_SCORE: i32 = 1000;

/// Compute a token's priority score. Pure and total; higher wins.
///
/// The emergency flag is an absolute override. The EMERGENCY source bonus is
/// intentionally kept even though it overlaps with the flag: a request can be
/// tagged with the emergency source while the flag is off, and it must still
/// outrank everything else.
pub fn score(source: TokenSource, payment_status: PaymentStatus, is_emergency: bool) -> i32 {
    if is_emergency {
        return EMERGENCY_SCORE;
    }

    let mut score = 0;

    if payment_status == PaymentStatus::Paid {
        score += 300;
    }

    score += match source {
        TokenSource::FollowUp => 200,
        TokenSource::WalkIn => 100,
        TokenSource::Online => 50,
        TokenSource::Emergency => EMERGENCY_SCORE,
    };

    score
}
