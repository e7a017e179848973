/// Round `value` to `decimals` decimal places (half away from zero).
///
/// # Examples
///
/// ```
/// use report_core::formatting::round_to;
///
/// assert_eq!(round_to(66.666_666, 1), 66.7);
/// assert_eq!(round_to(200.0, 1), 200.0);
/// assert_eq!(round_to(-1.25, 1), -1.3);
/// ```
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10_f64.powi(decimals as i32);
    (value * factor).round() / factor
}

/// Format a cost total for people: sign, `$`, thousands separators and one
/// decimal place.
///
/// # Examples
///
/// ```
/// use report_core::formatting::format_currency;
///
/// assert_eq!(format_currency(1234.5), "$1,234.5");
/// assert_eq!(format_currency(1234567.0), "$1,234,567.0");
/// assert_eq!(format_currency(-9876.54), "-$9,876.5");
/// assert_eq!(format_currency(-0.04), "$0.0");
/// ```
pub fn format_currency(value: f64) -> String {
    let rounded = round_to(value, 1);
    let sign = if rounded < 0.0 { "-" } else { "" };
    let fixed = format!("{:.1}", rounded.abs());
    match fixed.split_once('.') {
        Some((whole, tenths)) => format!("{}${}.{}", sign, group_thousands(whole), tenths),
        None => format!("{}${}", sign, group_thousands(&fixed)),
    }
}

/// Format a cost amount the way report values show it: a dollar sign followed
/// by the amount rounded to one decimal, without trailing `.0`.
///
/// # Examples
///
/// ```
/// use report_core::formatting::format_amount;
///
/// assert_eq!(format_amount(120.0), "$120");
/// assert_eq!(format_amount(12.34), "$12.3");
/// assert_eq!(format_amount(0.0), "$0");
/// ```
pub fn format_amount(amount: f64) -> String {
    format!("${}", round_to(amount, 1))
}

/// Express `b` relative to `a` as a percentage string: `100 - 100 * b / a`,
/// one decimal place, `%`-suffixed.
///
/// A zero `b` always yields `"0%"`. Callers must not pass a zero `a` with a
/// non-zero `b`.
///
/// # Examples
///
/// ```
/// use report_core::formatting::percentage;
///
/// assert_eq!(percentage(120.0, 100.0), "16.7%");
/// assert_eq!(percentage(50.0, 0.0), "0%");
/// assert_eq!(percentage(100.0, 150.0), "-50.0%");
/// ```
pub fn percentage(a: f64, b: f64) -> String {
    if b == 0.0 {
        return "0%".to_string();
    }
    format!("{:.1}%", 100.0 - (100.0 * b / a))
}

// ── Internal helpers ──────────────────────────────────────────────────────────

/// `1234567` → `1,234,567`.
fn group_thousands(digits: &str) -> String {
    let len = digits.len();
    let mut grouped = String::with_capacity(len + len / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    grouped
}

// ── Tests ──────────────────────────────────────────────────────────────────────
