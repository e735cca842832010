use crate::tod::Tod;

/// Decodes a time limit expression against the winner's time.
///
/// - `"+5:00"`: five minutes after the winner
/// - `"+5%"` or `"5%"`: five percent of the winner's time after the winner
/// - `"1:10:00"`: an absolute limit, or a down time if it is shorter than
///   the winner's time
///
/// Returns `None`, with a warning, when the expression cannot be applied.
pub fn decode_limit(expr: &str, winner: Option<Tod>) -> Option<Tod> {
    let expr = expr.trim();
    if expr.is_empty() {
        return None;
    }

    let mut down = expr.contains('+');
    let value = expr.replace('+', "");
    let limit = if value.contains('%') {
        down = true;
        winner.and_then(|w| {
            let pct: f64 = value.replace('%', "").trim().parse().ok()?;
            Tod::from_secs_f64((0.01 * pct * w.as_seconds()).trunc())
        })
    } else {
        let limit = value.trim().parse::<Tod>().ok();
        if let (Some(limit), Some(winner)) = (limit, winner) {
            if limit < winner {
                down = true;
            }
        }
        limit
    };

    let decoded = match limit {
        Some(limit) if down => winner.map(|w| w + limit),
        Some(limit) => Some(limit),
        None => None,
    };
    if decoded.is_none() {
        tracing::warn!(limit = expr, "unable to decode time limit");
    }
    decoded
}
