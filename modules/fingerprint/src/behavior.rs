use rand::Rng;

/// A single point on a simulated mouse path, with the delay (ms) to hold
/// before moving to it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MousePoint {
    pub x: f64,
    pub y: f64,
    pub delay_ms: u64,
}

/// Cumulative per-session cost of looking human: each completed action
/// nudges the fatigue and cognitive-delay multipliers up, and the thermal
/// accumulator up; thermal cools back down between actions.
///
/// Grounded on `rootsignal-scout/src/pipeline/scraper.rs`'s
/// `rand::rng().random_range(..)` jitter idiom, generalized into a
/// stateful per-session model (SPEC_FULL.md §4.5).
pub struct MotionState {
    mission_index: u32,
    thermal: f64,
    last_action_at: std::time::Instant,
}

const THERMAL_COOLING_TAU_S: f64 = 75.0;
const THERMAL_PER_ACTION: f64 = 0.08;
const THERMAL_CEILING: f64 = 1.0;

impl MotionState {
    pub fn new() -> Self {
        Self {
            mission_index: 0,
            thermal: 0.0,
            last_action_at: std::time::Instant::now(),
        }
    }

    /// Grows ~2% per completed mission; multiplies delay/jitter envelopes so
    /// a long-lived worker visibly "tires" rather than acting identically on
    /// mission #1 and mission #500.
    pub fn fatigue_multiplier(&self) -> f64 {
        1.0 + 0.02 * self.mission_index as f64
    }

    /// Grows ~1.5% per completed mission; applied to think-time delays
    /// between perceiving a page and acting on it.
    pub fn cognitive_delay_multiplier(&self) -> f64 {
        1.0 + 0.015 * self.mission_index as f64
    }

    /// Exponential decay since the last action, then adds this action's
    /// heat. Callers throttle (slow down / pause) as this approaches
    /// `THERMAL_CEILING`.
    pub fn record_action(&mut self) -> f64 {
        let elapsed = self.last_action_at.elapsed().as_secs_f64();
        let decay = (-elapsed / THERMAL_COOLING_TAU_S).exp();
        self.thermal = (self.thermal * decay + THERMAL_PER_ACTION).min(THERMAL_CEILING);
        self.last_action_at = std::time::Instant::now();
        self.thermal
    }

    pub fn thermal(&self) -> f64 {
        self.thermal
    }

    pub fn is_overheated(&self) -> bool {
        self.thermal >= THERMAL_CEILING
    }

    pub fn complete_mission(&mut self) {
        self.mission_index += 1;
    }

    pub fn mission_index(&self) -> u32 {
        self.mission_index
    }
}

impl Default for MotionState {
    fn default() -> Self {
        Self::new()
    }
}

/// Steps per pixel of travel (SPEC_FULL.md §4.5: "~1 step per 10 px").
const STEP_PX: f64 = 10.0;
/// Floor on step count regardless of distance.
const MIN_STEPS: usize = 20;
/// Micro-tremor oscillation frequency range, Hz (SPEC_FULL.md §4.5).
const TREMOR_HZ_MIN: f64 = 8.0;
const TREMOR_HZ_MAX: f64 = 12.0;
/// Sub-pixel tremor amplitude at zero velocity.
const TREMOR_BASE_AMPLITUDE_PX: f64 = 0.3;
/// Extra tremor amplitude added per px/ms of instantaneous velocity.
const TREMOR_VELOCITY_GAIN: f64 = 0.4;

/// Generate a quadratic-Bezier mouse path from `(x0,y0)` to `(x1,y1)` with a
/// randomized control point offset (saccadic jitter) and an ease-in/ease-out
/// delay envelope, scaled by the session's fatigue multiplier. Step count is
/// proportional to travel distance; a periodic sub-pixel micro-tremor (8-12
/// Hz) is layered on top, its amplitude growing with the path's
/// instantaneous velocity (SPEC_FULL.md §4.5).
pub fn mouse_path(x0: f64, y0: f64, x1: f64, y1: f64, motion: &MotionState) -> Vec<MousePoint> {
    let mut rng = rand::rng();

    let dx = x1 - x0;
    let dy = y1 - y0;
    let dist = (dx * dx + dy * dy).sqrt();
    let steps = ((dist / STEP_PX).ceil() as usize).max(MIN_STEPS);

    // Control point offset perpendicular to the straight line, proportional
    // to distance so short hops don't overshoot and long hops still arc.
    let bow = dist * 0.15 * (rng.random_range(0..1000) as f64 / 1000.0 - 0.5);
    let (perp_x, perp_y) = if dist > 0.0 { (-dy / dist, dx / dist) } else { (0.0, 0.0) };
    let cx = (x0 + x1) / 2.0 + perp_x * bow;
    let cy = (y0 + y1) / 2.0 + perp_y * bow;

    let fatigue = motion.fatigue_multiplier();
    let tremor_hz = rng.random_range((TREMOR_HZ_MIN * 100.0) as u32..(TREMOR_HZ_MAX * 100.0) as u32) as f64 / 100.0;
    let tremor_phase = rng.random_range(0..1000) as f64 / 1000.0 * std::f64::consts::TAU;

    let mut points = Vec::with_capacity(steps);
    let mut prev = (x0, y0);
    let mut elapsed_ms: f64 = 0.0;
    for i in 1..=steps {
        let t = i as f64 / steps as f64;
        // ease-in/ease-out via smoothstep
        let eased = t * t * (3.0 - 2.0 * t);
        let x = (1.0 - eased).powi(2) * x0 + 2.0 * (1.0 - eased) * eased * cx + eased.powi(2) * x1;
        let y = (1.0 - eased).powi(2) * y0 + 2.0 * (1.0 - eased) * eased * cy + eased.powi(2) * y1;

        let base_delay = rng.random_range(8..18) as f64;
        let delay_ms = base_delay * fatigue;

        // Instantaneous velocity over this step, used to scale the tremor:
        // faster segments of the path tremor harder, same as a real saccade.
        let step_dist = ((x - prev.0).powi(2) + (y - prev.1).powi(2)).sqrt();
        let velocity = if delay_ms > 0.0 { step_dist / delay_ms } else { 0.0 };
        let amplitude = TREMOR_BASE_AMPLITUDE_PX + TREMOR_VELOCITY_GAIN * velocity;

        elapsed_ms += delay_ms;
        let phase = tremor_phase + tremor_hz * (elapsed_ms / 1000.0) * std::f64::consts::TAU;
        let tremor_x = amplitude * phase.sin();
        let tremor_y = amplitude * phase.cos();

        prev = (x, y);
        points.push(MousePoint {
            x: x + tremor_x,
            y: y + tremor_y,
            delay_ms: delay_ms as u64,
        });
    }
    points
}

/// One keystroke: the character and the delay before typing it.
#[derive(Debug, Clone, Copy)]
pub struct Keystroke {
    pub ch: char,
    pub delay_ms: u64,
    /// True if this keystroke is a typo that gets backspaced and retyped.
    pub is_typo: bool,
}

/// Typing-WPM model: ~40-70 WPM base rate, a 3% per-character typo rate
/// (typo char, then a backspace + correct char), and a 10% chance of a
/// longer inter-burst pause every few characters (SPEC_FULL.md §4.5).
pub fn typing_model(text: &str, motion: &MotionState) -> Vec<Keystroke> {
    let mut rng = rand::rng();
    let wpm = rng.random_range(40..70) as f64;
    // Average ms per character at this WPM, assuming 5 chars/word.
    let base_ms_per_char = 60_000.0 / (wpm * 5.0);
    let fatigue = motion.fatigue_multiplier();

    let mut keystrokes = Vec::new();
    let mut since_pause = 0u32;
    for ch in text.chars() {
        let jitter = rng.random_range(0..1000) as f64 / 1000.0 * 0.6 + 0.7;
        let mut delay_ms = (base_ms_per_char * jitter * fatigue) as u64;

        since_pause += 1;
        if since_pause >= 4 && rng.random_range(0..100) < 10 {
            delay_ms += rng.random_range(150..450);
            since_pause = 0;
        }

        if rng.random_range(0..100) < 3 {
            let typo_ch = random_nearby_key(ch, &mut rng);
            keystrokes.push(Keystroke { ch: typo_ch, delay_ms, is_typo: true });
            keystrokes.push(Keystroke {
                ch: '\u{8}', // backspace
                delay_ms: rng.random_range(80..200),
                is_typo: true,
            });
            keystrokes.push(Keystroke {
                ch,
                delay_ms: rng.random_range(60..160),
                is_typo: false,
            });
        } else {
            keystrokes.push(Keystroke { ch, delay_ms, is_typo: false });
        }
    }
    keystrokes
}

fn random_nearby_key(ch: char, rng: &mut impl Rng) -> char {
    const QWERTY_ROWS: &[&str] = &["qwertyuiop", "asdfghjkl", "zxcvbnm"];
    let lower = ch.to_ascii_lowercase();
    for row in QWERTY_ROWS {
        if let Some(pos) = row.find(lower) {
            let neighbors: Vec<char> = [pos.checked_sub(1), Some(pos + 1)]
                .into_iter()
                .flatten()
                .filter_map(|i| row.as_bytes().get(i).map(|b| *b as char))
                .collect();
            if !neighbors.is_empty() {
                return neighbors[rng.random_range(0..neighbors.len())];
            }
        }
    }
    ch
}

/// One scroll chunk: pixels to scroll and the delay before performing it.
#[derive(Debug, Clone, Copy)]
pub struct ScrollChunk {
    pub delta_y: i32,
    pub delay_ms: u64,
}

/// Scroll in 50-150px chunks with a 10% chance of an inter-chunk pause,
/// until `total_px` has been covered.
pub fn scrolling_model(total_px: i32, motion: &MotionState) -> Vec<ScrollChunk> {
    let mut rng = rand::rng();
    let fatigue = motion.fatigue_multiplier();
    let mut remaining = total_px;
    let mut chunks = Vec::new();
    while remaining > 0 {
        let chunk = rng.random_range(50..150).min(remaining);
        let mut delay_ms = (rng.random_range(40..120) as f64 * fatigue) as u64;
        if rng.random_range(0..100) < 10 {
            delay_ms += rng.random_range(200..600);
        }
        chunks.push(ScrollChunk { delta_y: chunk, delay_ms });
        remaining -= chunk;
    }
    chunks
}

/// Build a proxy username that pins this session to one "carrier" (mobile
/// network egress) and session id, so a worker's egress IP stays stable for
/// the duration of one mission (SPEC_FULL.md §4.2, §4.5).
pub fn proxy_username(base: &str, carrier: &str, session_id: &str) -> String {
    format!("{base}-carrier-{carrier}-session-{session_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mouse_path_starts_near_origin_and_ends_near_target() {
        let motion = MotionState::new();
        let path = mouse_path(0.0, 0.0, 100.0, 50.0, &motion);
        assert!(path.len() >= 20);
        let last = path.last().unwrap();
        assert!((last.x - 100.0).abs() < 5.0);
        assert!((last.y - 50.0).abs() < 5.0);
    }

    #[test]
    fn mouse_path_step_count_is_floored_at_twenty_for_short_hops() {
        let motion = MotionState::new();
        let path = mouse_path(0.0, 0.0, 5.0, 0.0, &motion);
        assert_eq!(path.len(), 20);
    }

    #[test]
    fn mouse_path_step_count_scales_with_distance_for_long_hops() {
        let motion = MotionState::new();
        let path = mouse_path(0.0, 0.0, 2000.0, 0.0, &motion);
        assert!(path.len() >= 200);
    }

    #[test]
    fn mouse_path_delay_grows_with_fatigue() {
        let mut tired = MotionState::new();
        for _ in 0..50 {
            tired.complete_mission();
        }
        let fresh = MotionState::new();
        assert!(tired.fatigue_multiplier() > fresh.fatigue_multiplier());
    }

    #[test]
    fn thermal_accumulates_and_caps_at_ceiling() {
        let mut motion = MotionState::new();
        for _ in 0..50 {
            motion.record_action();
        }
        assert!(motion.thermal() <= THERMAL_CEILING);
        assert!(motion.is_overheated());
    }

    #[test]
    fn typing_model_produces_one_entry_or_typo_triplet_per_char() {
        let motion = MotionState::new();
        let keystrokes = typing_model("abc", &motion);
        assert!(keystrokes.len() >= 3);
        let final_chars: Vec<char> = keystrokes
            .iter()
            .filter(|k| !k.is_typo)
            .map(|k| k.ch)
            .collect();
        assert_eq!(final_chars, vec!['a', 'b', 'c']);
    }

    #[test]
    fn scrolling_model_covers_total_distance() {
        let motion = MotionState::new();
        let chunks = scrolling_model(500, &motion);
        let total: i32 = chunks.iter().map(|c| c.delta_y).sum();
        assert_eq!(total, 500);
    }

    #[test]
    fn proxy_username_embeds_carrier_and_session() {
        let u = proxy_username("acct123", "verizon", "mission-7");
        assert_eq!(u, "acct123-carrier-verizon-session-mission-7");
    }
}
