// src/price.rs
//! BRL price extraction from noisy promo text.
//!
//! Regional convention: `.` is the thousands separator, `,` the decimal
//! separator ("1.799,90" == 1799.90). Extraction is a total function: garbled
//! input yields `None`, never an error.

use once_cell::sync::Lazy;
use regex::Regex;

/// Number token in BRL notation: grouped thousands with optional cents, or a
/// plain run of 3+ digits with optional cents.
const NUM: &str = r"\d{1,3}(?:\.\d{3})*(?:,\d{2})?|\d{3,}(?:,\d{2})?";

static URL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"https?://\S+").expect("url regex"));

/// Currency marker + number + cash-payment qualifier. The cash price is
/// conventionally the lowest quoted figure when list/installment prices also
/// appear.
static CASH_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)r\$\s*({NUM})\s*(?:[àa]\s*vista|no\s*pix)"
    ))
    .expect("cash price regex")
});

/// Any price-prefixed number (fallback pass): the currency marker, or a
/// permissive price phrase ("de 1.999 por 1.699", "valor: 550") for offers
/// that omit the marker. A bare number with neither is never a candidate.
static PRICE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)(?:r\$|\b(?:por|pre[çc]o|valor|de)\b)\s*:?\s*({NUM})"
    ))
    .expect("price regex")
});

/// Negative context: figures near these terms are coupons, discounts,
/// installment counts or shipping, not real prices.
static IGNORE_CONTEXT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:cupom|desconto|off|cashback|moedas?|pontos?|em\s+\d+x|parcelas?|frete|resgate)\b")
        .expect("ignore context regex")
});

/// Bytes of surrounding text inspected for negative-context terms around a
/// fallback candidate (~60 chars each side).
const CONTEXT_WINDOW: usize = 60;

/// Normalize a BRL number token to a float, rejecting values outside the
/// sanity band (too small to be a price, implausibly large).
fn to_float_brl(raw: &str) -> Option<f64> {
    let s = raw.trim().replace('.', "").replace(',', ".");
    let v: f64 = s.parse().ok()?;
    if v > 10.0 && v < 1_000_000.0 {
        Some(v)
    } else {
        None
    }
}

fn snap_left(text: &str, mut i: usize) -> usize {
    while i > 0 && !text.is_char_boundary(i) {
        i -= 1;
    }
    i
}

fn snap_right(text: &str, mut i: usize) -> usize {
    while i < text.len() && !text.is_char_boundary(i) {
        i += 1;
    }
    i
}

/// True if the fixed-width window around `[start, end)` contains a
/// negative-context term.
fn has_ignore_context(text: &str, start: usize, end: usize) -> bool {
    let lo = snap_left(text, start.saturating_sub(CONTEXT_WINDOW));
    let hi = snap_right(text, (end + CONTEXT_WINDOW).min(text.len()));
    IGNORE_CONTEXT_RE.is_match(&text[lo..hi])
}

/// Extract the best-guess price from free text, or `None`.
///
/// Strategy: strip URLs (their numeric paths are a major false-positive
/// source), prefer explicitly cash-qualified amounts, fall back to any
/// currency-marked or price-phrase-prefixed amount whose surrounding context
/// carries no coupon or installment phrasing. Multi-candidate messages
/// resolve to the minimum.
pub fn extract(text: &str) -> Option<f64> {
    let scrubbed = URL_RE.replace_all(text, " ");

    // Primary pass: cash-qualified amounts.
    let cash: Vec<f64> = CASH_RE
        .captures_iter(&scrubbed)
        .filter_map(|c| to_float_brl(&c[1]))
        .collect();
    if let Some(min) = min_of(&cash) {
        return Some(min);
    }

    // Fallback pass: any prefixed amount, context-screened.
    let mut vals = Vec::new();
    for caps in PRICE_RE.captures_iter(&scrubbed) {
        let m = caps.get(0).expect("whole match");
        if has_ignore_context(&scrubbed, m.start(), m.end()) {
            continue;
        }
        if let Some(v) = to_float_brl(&caps[1]) {
            vals.push(v);
        }
    }
    min_of(&vals)
}

fn min_of(vals: &[f64]) -> Option<f64> {
    vals.iter().copied().fold(None, |acc, v| match acc {
        Some(m) if m <= v => Some(m),
        _ => Some(v),
    })
}
