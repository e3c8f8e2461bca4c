/// Format a flow amount for display.
/// Large flows are rounded to whole numbers with thousands separators,
/// small flows keep one decimal place.
pub fn format_flow_amount(amount: f64) -> String {
    if !amount.is_finite() {
        return "--".to_string();
    }
    if amount.abs() < 100.0 {
        return format!("{:.1}", amount);
    }

    let rounded = format!("{:.0}", amount.abs());
    let mut grouped = String::with_capacity(rounded.len() + rounded.len() / 3);
    for (i, c) in rounded.chars().enumerate() {
        if i > 0 && (rounded.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    if amount < 0.0 {
        format!("-{}", grouped)
    } else {
        grouped
    }
}

/// Format an age in minutes as "just now", "5m ago", "2h ago" or "3d ago".
pub fn format_age(minutes: i64) -> String {
    if minutes < 1 {
        // Also covers clock skew
        "just now".to_string()
    } else if minutes < 60 {
        format!("{}m ago", minutes)
    } else if minutes < 1440 {
        let hours = minutes / 60;
        if minutes % 60 >= 30 {
            format!("{}h ago", hours + 1)
        } else {
            format!("{}h ago", hours)
        }
    } else {
        let days = minutes / 1440;
        if (minutes % 1440) / 60 >= 12 {
            format!("{}d ago", days + 1)
        } else {
            format!("{}d ago", days)
        }
    }
}
