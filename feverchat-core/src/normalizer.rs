use crate::config::SamplingCfg;
use unicode_normalization::UnicodeNormalization;

/// Unicode NFC normalization + BOM strip + CRLF -> LF + trim
pub fn clean_text(s: &str) -> String {
    let mut t = s.nfc().collect::<String>();
    if t.starts_with('\u{FEFF}') {
        t.remove(0);
    }
    if t.contains("\r\n") {
        t = t.replace("\r\n", "\n");
    }
    t.trim().to_string()
}

/// The question as it will be stored and sent; `None` when nothing is left.
pub fn normalize_question(input: &str) -> Option<String> {
    let q = clean_text(input);
    if q.is_empty() { None } else { Some(q) }
}

fn clamp_round_f32(x: f32, lo: f32, hi: f32, dp: u32) -> f32 {
    let clamped = if x.is_finite() { x.clamp(lo, hi) } else { lo };
    let p = 10f32.powi(dp as i32);
    (clamped * p).round() / p
}

/// Clamp sampling parameters into the ranges both server APIs accept.
pub fn normalize_sampling(s: SamplingCfg) -> SamplingCfg {
    SamplingCfg {
        temperature: clamp_round_f32(s.temperature, 0.0, 2.0, 3),
        top_p: clamp_round_f32(s.top_p, 0.0, 1.0, 4),
        frequency_penalty: clamp_round_f32(s.frequency_penalty, -2.0, 2.0, 3),
        presence_penalty: clamp_round_f32(s.presence_penalty, -2.0, 2.0, 3),
        repeat_penalty: clamp_round_f32(s.repeat_penalty, 0.0, 2.0, 3),
    }
}
