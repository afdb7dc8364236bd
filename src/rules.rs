// src/rules.rs
//! Built-in rule table, in priority order. First match wins, so the more
//! specific entries (B760M, i5-14600K) sit above their family rules, and the
//! category-independent blocks sit above everything.
//!
//! Thresholds are half-open bands `[low, high)`: `low` guards against
//! implausible captures (currency-stripped percentages, coupon values),
//! `high` is the "too expensive" cut.

use anyhow::{anyhow, Result};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::classify::{FanTier, Predicate, PricePolicy, Rule, RuleAction};

fn re(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| anyhow!("rule pattern `{pattern}`: {e}"))
}

fn all(patterns: &[&str]) -> Result<Predicate> {
    Ok(Predicate::All(
        patterns.iter().map(|p| re(p)).collect::<Result<_>>()?,
    ))
}

fn any(patterns: &[&str]) -> Result<Predicate> {
    Ok(Predicate::Any(
        patterns.iter().map(|p| re(p)).collect::<Result<_>>()?,
    ))
}

fn band(low: f64, high: f64) -> RuleAction {
    RuleAction::Price(PricePolicy::Band { low, high })
}

/// The ordered table. Any pattern failing to compile aborts startup.
pub fn builtin_rules() -> Result<Vec<Rule>> {
    let mut rules = Vec::new();

    // -- category-independent blocks, always first --
    rules.push(Rule {
        key: "block:cat",
        title: "Categoria bloqueada",
        predicate: any(&[r"(?i)\b(celular|smartphone|iphone|android|notebook|laptop|macbook)\b"])?,
        exclude: None,
        action: RuleAction::Block { reason: "celular/notebook etc." },
    });
    rules.push(Rule {
        key: "block:kit",
        title: "PC Gamer bloqueado",
        predicate: any(&[r"(?i)\b(pc\s*gamer|setup\s*completo|kit\s*completo)\b"])?,
        exclude: None,
        action: RuleAction::Block { reason: "bundle price is not attributable" },
    });

    // -- specific priorities above their families --
    rules.push(Rule {
        key: "mobo:b760m",
        title: "B760M",
        predicate: all(&[r"(?i)\bb760m\b"])?,
        exclude: None,
        action: band(300.0, 1000.0),
    });
    rules.push(Rule {
        key: "cpu:i5-14600k",
        title: "i5-14600K",
        predicate: all(&[r"(?i)\bi5[-\s]*14600k\b"])?,
        exclude: None,
        action: band(400.0, 1000.0),
    });

    // -- GPUs --
    rules.push(Rule {
        key: "gpu:rtx5060",
        title: "RTX 5060",
        predicate: all(&[r"(?i)\brtx\s*5060\b"])?,
        exclude: Some(any(&[r"(?i)\brtx\s*5060\s*ti\b"])?),
        action: band(1500.0, 1900.0),
    });
    rules.push(Rule {
        key: "gpu:rtx5070",
        title: "RTX 5070/5070 Ti",
        predicate: all(&[r"(?i)\brtx\s*5070(\s*ti)?\b"])?,
        exclude: None,
        action: band(2500.0, 3700.0),
    });

    // -- CPUs; the low-tier AMD veto keeps Ryzen 3/5 from reaching the
    //    generic AMD rule --
    rules.push(Rule {
        key: "cpu:amd:block",
        title: "CPU AMD inferior",
        predicate: any(&[r"(?i)\b(ryzen\s*(?:3|5)|5600g?t?)\b"])?,
        exclude: None,
        action: RuleAction::Block { reason: "Ryzen 3/5 bloqueado" },
    });
    rules.push(Rule {
        key: "cpu:intel",
        title: "CPU Intel sup.",
        predicate: all(&[r"(?i)\b(i(?:5|7|9)[-\s]*(?:12|13|14)\d{2,3}k?f?)\b"])?,
        exclude: None,
        action: band(400.0, 900.0),
    });
    rules.push(Rule {
        key: "cpu:amd",
        title: "CPU AMD sup.",
        predicate: all(&[r"(?i)\b(ryzen\s*(?:7\s*5700x?|7\s*5800x3?d?|9\s*5900x|9\s*5950x))\b"])?,
        exclude: None,
        action: band(400.0, 900.0),
    });

    // -- motherboards --
    rules.push(Rule {
        key: "mobo:a520",
        title: "A520 bloqueada",
        predicate: any(&[r"(?i)\ba520m?\b"])?,
        exclude: None,
        action: RuleAction::Block { reason: "A520 bloqueada" },
    });
    rules.push(Rule {
        key: "mobo:am4",
        title: "B550/X570",
        predicate: any(&[r"(?i)\bb550m?\b", r"(?i)\bx570\b"])?,
        exclude: None,
        action: band(300.0, 550.0),
    });
    rules.push(Rule {
        key: "mobo:lga1700",
        title: "LGA1700",
        predicate: any(&[r"(?i)\b(h610m?|b660m?|b760m?|z690|z790)\b"])?,
        exclude: None,
        action: band(300.0, 550.0),
    });

    // -- case: price cap depends on advertised fan count --
    rules.push(Rule {
        key: "case",
        title: "Gabinete",
        predicate: all(&[r"(?i)\bgabinete\b"])?,
        exclude: None,
        action: RuleAction::Price(PricePolicy::FanTiered(vec![
            FanTier { min_fans: 4, max_price: 220.0 },
            FanTier { min_fans: 3, max_price: 160.0 },
        ])),
    });

    // -- coolers: water first, then air with water excluded --
    rules.push(Rule {
        key: "cooler:water",
        title: "Water Cooler",
        predicate: all(&[r"(?i)\bwater\s*cooler\b"])?,
        exclude: None,
        action: band(50.0, 150.0),
    });
    rules.push(Rule {
        key: "cooler:air",
        title: "Cooler (ar)",
        predicate: all(&[r"(?i)\bcooler\b"])?,
        exclude: Some(any(&[r"(?i)\bwater\s*cooler\b"])?),
        action: band(50.0, 150.0),
    });

    // -- storage & memory --
    rules.push(Rule {
        key: "ssd:m2:1tb",
        title: "SSD M.2 1TB",
        predicate: all(&[r"(?i)\bssd\b", r"(?i)\bm\.?2\b|\bnvme\b", r"(?i)\b1\s*tb\b"])?,
        exclude: None,
        action: band(100.0, 460.0),
    });
    rules.push(Rule {
        key: "ram:16",
        title: "DDR4 16GB",
        predicate: all(&[r"(?i)\bddr4\b", r"(?i)\b16\s*gb\b"])?,
        exclude: None,
        action: band(50.0, 300.0),
    });
    rules.push(Rule {
        key: "ram:8",
        title: "DDR4 8GB",
        predicate: all(&[r"(?i)\bddr4\b", r"(?i)\b8\s*gb\b"])?,
        exclude: None,
        action: band(30.0, 150.0),
    });

    // -- peripherals & household --
    rules.push(Rule {
        key: "cadeira",
        title: "Cadeira Gamer",
        predicate: all(&[r"(?i)\bcadeira\b"])?,
        exclude: None,
        action: band(100.0, 500.0),
    });
    rules.push(Rule {
        key: "dualsense",
        title: "Controle PS5 DualSense",
        predicate: any(&[r"(?i)\b(dualsense|controle\s*ps5|controle\s*playstation\s*5)\b"])?,
        exclude: None,
        action: band(200.0, 300.0),
    });
    rules.push(Rule {
        key: "wifi_bt",
        title: "Adaptador WiFi/Bluetooth",
        predicate: any(&[
            r"(?i)\b(adaptador\s*wifi|adaptador\s*bluetooth|wifi\s*bluetooth|placa\s*wifi)\b",
        ])?,
        exclude: None,
        action: band(20.0, 250.0),
    });
    rules.push(Rule {
        key: "ar_premium",
        title: "Ar Condicionado Premium",
        predicate: any(&[
            r"(?i)\b(daikin\s+ecoswing|fujitsu\s+premium|samsung\s+windfree|elgin\s+eco\s+ii|gree\s+g[-\s]*top)\b",
        ])?,
        exclude: None,
        action: band(1000.0, 1850.0),
    });
    rules.push(Rule {
        key: "ar_condicionado",
        title: "Ar Condicionado",
        predicate: any(&[r"(?i)\b(ar\s*condicionado|split|inverter)\b"])?,
        exclude: None,
        action: band(800.0, 1850.0),
    });
    rules.push(Rule {
        key: "tenis_nike",
        title: "Tênis Nike",
        predicate: all(&[r"(?i)\b(tênis|tenis)\s*(nike|air\s*max|air\s*force|jordan)\b"])?,
        exclude: None,
        action: band(80.0, 250.0),
    });
    rules.push(Rule {
        key: "webcam_4k",
        title: "Webcam 4K",
        predicate: any(&[r"(?i)\bwebcam\b.*\b4k\b", r"(?i)\b4k\b.*\bwebcam\b"])?,
        exclude: None,
        action: band(80.0, 250.0),
    });

    Ok(rules)
}

static FANS_HINT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:(\d+)\s*(?:fans?|coolers?|ventoinhas?)|(\d+)\s*x\s*120\s*mm|(\d+)\s*x\s*fan)")
        .expect("fan hint regex")
});

/// Highest advertised fan count in `text` ("3 fans", "4x120mm", "4 x fan").
pub fn count_fans(text: &str) -> u32 {
    let mut n = 0u32;
    for caps in FANS_HINT.captures_iter(text) {
        for g in caps.iter().skip(1).flatten() {
            if let Ok(v) = g.as_str().parse::<u32>() {
                n = n.max(v);
            }
        }
    }
    n
}

/// Sub-threshold urgency decorations prepended to the rendered alert.
pub fn urgency_header(category_key: &str, price: Option<f64>) -> Option<&'static str> {
    let price = price?;
    if category_key == "gpu:rtx5060" && price < 1900.0 {
        return Some("Corre!🔥 ");
    }
    if category_key.starts_with("cpu:") && price < 900.0 {
        return Some("Corre!🔥 ");
    }
    if category_key == "ar_premium" && price < 1850.0 {
        return Some("Oportunidade🔥 ");
    }
    None
}
