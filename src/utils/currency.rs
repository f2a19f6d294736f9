/// Currency utility functions for handling Naira conversions
///
/// Rows carry naira amounts; Paystack expects kobo (1 Naira = 100 kobo).

/// Convert Naira to kobo (multiply by 100)
pub fn naira_to_kobo(naira: f64) -> i64 {
    (naira * 100.0).round() as i64
}

/// Convert kobo to Naira (divide by 100)
pub fn kobo_to_naira(kobo: i64) -> f64 {
    kobo as f64 / 100.0
}

/// Format a naira amount with thousands separators, e.g. `₦1,250,000` or `₦500.50`
pub fn format_naira(naira: f64) -> String {
    let kobo = naira_to_kobo(naira.abs());
    let whole = (kobo / 100).to_string();
    let fraction = kobo % 100;

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, c) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    let sign = if naira < 0.0 { "-" } else { "" };
    if fraction == 0 {
        format!("{}₦{}", sign, grouped)
    } else {
        format!("{}₦{}.{:02}", sign, grouped, fraction)
    }
}
